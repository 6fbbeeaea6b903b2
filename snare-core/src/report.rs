// Report generation for scan results

use serde::{Deserialize, Serialize};
use snare_scanner::{Origin, ResultKind, ScanResult, Statistics};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

pub fn generate_report(
    format: ReportFormat,
    results: &[ScanResult],
    statistics: &Statistics,
    source: &str,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(results, statistics, source)),
        ReportFormat::Json => generate_json_report(results, statistics, source),
        ReportFormat::Markdown => Ok(generate_markdown_report(results, statistics, source)),
    }
}

pub fn generate_text_report(results: &[ScanResult], statistics: &Statistics, source: &str) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                           SNARE KEYWORD SCAN REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Source:       {}\n", source));
    report.push_str(&format!(
        "Generated:    {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Matches:      {}\n", statistics.total));
    report.push_str(&format!(
        "Keywords:     {}\n",
        if statistics.keywords.is_empty() {
            "none".to_string()
        } else {
            statistics.keywords.join(", ")
        }
    ));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');

    for (kind, count) in &statistics.by_type {
        report.push_str(&format!("  {:<20} {}\n", kind.display_name(), count));
    }
    if statistics.by_type.is_empty() {
        report.push_str("  No keywords found.\n");
    }
    report.push('\n');

    if !results.is_empty() {
        report.push_str(RULE);
        report.push_str("MATCHES\n");
        report.push_str(RULE);
        report.push('\n');

        for (idx, result) in results.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, result.keyword));
            report.push_str(&format!("Type:         {}\n", result.kind.display_name()));
            report.push_str(&format!("Severity:     {}\n", result.kind.severity().as_str()));
            match &result.origin {
                Origin::Node { location, .. } => {
                    report.push_str(&format!("Selector:     {}\n", location.selector));
                    report.push_str(&format!("XPath:        {}\n", location.xpath));
                }
                Origin::Network {
                    url,
                    channel,
                    method,
                } => {
                    report.push_str(&format!("Request:      {} {}\n", method, url));
                    report.push_str(&format!("Channel:      {}\n", channel.as_str()));
                }
            }
            report.push_str(&format!("Content:      {}\n\n", single_line(&result.content)));
        }
    }

    report.push_str(RULE);
    report.push_str("\nGenerated by Snare - keyword tripwires for HTML documents\n\n");

    report
}

pub fn generate_json_report(
    results: &[ScanResult],
    statistics: &Statistics,
    source: &str,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Snare",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "source": source
            },
            "statistics": statistics,
            "results": results
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_markdown_report(
    results: &[ScanResult],
    statistics: &Statistics,
    source: &str,
) -> String {
    let mut report = String::new();

    report.push_str("# Snare Keyword Scan Report\n\n");
    report.push_str(&format!("- **Source:** {}\n", source));
    report.push_str(&format!("- **Matches:** {}\n", statistics.total));
    report.push_str(&format!(
        "- **Keywords:** {}\n\n",
        statistics
            .keywords
            .iter()
            .map(|k| format!("`{}`", k))
            .collect::<Vec<_>>()
            .join(", ")
    ));

    report.push_str("## Summary\n\n");
    report.push_str("| Type | Count |\n|---|---|\n");
    for (kind, count) in &statistics.by_type {
        report.push_str(&format!("| {} | {} |\n", kind.display_name(), count));
    }
    report.push('\n');

    if results.is_empty() {
        report.push_str("_No keywords found._\n");
        return report;
    }

    report.push_str("## Matches\n\n");
    report.push_str("| # | Keyword | Type | Where | Content |\n|---|---|---|---|---|\n");
    for (idx, result) in results.iter().enumerate() {
        report.push_str(&format!(
            "| {} | {} | {} | `{}` | {} |\n",
            idx + 1,
            escape_cell(&result.keyword),
            result.kind.display_name(),
            result.where_label().replace('`', "'"),
            escape_cell(&single_line(&result.content))
        ));
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Results of one kind, in report order
pub fn results_of_kind(results: &[ScanResult], kind: ResultKind) -> Vec<&ScanResult> {
    results.iter().filter(|r| r.kind == kind).collect()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
