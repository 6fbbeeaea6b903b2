// Tests for report generation functionality

use snare_core::report::{
    ReportFormat, generate_json_report, generate_markdown_report, generate_report,
    generate_text_report, results_of_kind, save_report,
};
use snare_scanner::{
    Channel, Document, KeywordSet, ResultKind, ScanResult, Statistics, TreeScanner,
};
use tempfile::TempDir;

async fn sample_results() -> Vec<ScanResult> {
    let doc = Document::parse(
        r#"<body><p>Weekly casino | poker night</p><a href="/casino">go</a></body>"#,
    );
    let mut results = TreeScanner::new()
        .scan(&doc, &KeywordSet::from_raw(["casino", "poker"]))
        .await
        .unwrap();
    results.push(ScanResult::from_network(
        ResultKind::RequestUrl,
        "casino",
        "https://ads.example.com/casino",
        Channel::Fetch,
        "GET",
        "https://ads.example.com/casino".to_string(),
    ));
    results
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("txt"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("markdown"), Some(ReportFormat::Markdown));
    assert_eq!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown));
}

#[test]
fn test_report_format_from_str_case_insensitive() {
    assert_eq!(ReportFormat::from_str("TEXT"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("Json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("MD"), Some(ReportFormat::Markdown));
}

#[test]
fn test_report_format_from_str_invalid() {
    assert_eq!(ReportFormat::from_str("csv"), None);
    assert_eq!(ReportFormat::from_str(""), None);
}

// ============================================================================
// Text Report Tests
// ============================================================================

#[tokio::test]
async fn test_text_report_lists_every_match() {
    let results = sample_results().await;
    let stats = Statistics::from_results(&results);

    let report = generate_text_report(&results, &stats, "https://example.com/");

    assert!(report.contains("SNARE KEYWORD SCAN REPORT"));
    assert!(report.contains("Source:       https://example.com/"));
    assert!(report.contains(&format!("Matches:      {}", results.len())));
    assert!(report.contains("Keywords:     casino, poker"));
    for idx in 1..=results.len() {
        assert!(report.contains(&format!("[{}] ", idx)));
    }
    assert!(report.contains("Request:      GET https://ads.example.com/casino"));
    assert!(report.contains("Channel:      fetch"));
}

#[test]
fn test_text_report_empty() {
    let report = generate_text_report(&[], &Statistics::default(), "local");

    assert!(report.contains("Matches:      0"));
    assert!(report.contains("Keywords:     none"));
    assert!(report.contains("No keywords found."));
    assert!(!report.contains("MATCHES"));
}

// ============================================================================
// JSON Report Tests
// ============================================================================

#[tokio::test]
async fn test_json_report_structure() {
    let results = sample_results().await;
    let stats = Statistics::from_results(&results);

    let json = generate_json_report(&results, &stats, "page.html").unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let report = &value["report"];
    assert_eq!(report["metadata"]["generator"], "Snare");
    assert_eq!(report["metadata"]["source"], "page.html");
    assert_eq!(report["statistics"]["total"], results.len());
    assert_eq!(report["statistics"]["by_type"]["request_url"], 1);
    assert_eq!(report["results"].as_array().unwrap().len(), results.len());

    let network = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["type"] == "request_url")
        .unwrap();
    assert_eq!(network["origin"], "network");
    assert_eq!(network["channel"], "fetch");
}

#[tokio::test]
async fn test_json_report_results_deserialize() {
    let results = sample_results().await;
    let stats = Statistics::from_results(&results);

    let json = generate_json_report(&results, &stats, "page.html").unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let parsed: Vec<ScanResult> =
        serde_json::from_value(value["report"]["results"].clone()).unwrap();

    assert_eq!(parsed, results);
}

// ============================================================================
// Markdown Report Tests
// ============================================================================

#[tokio::test]
async fn test_markdown_report_table() {
    let results = sample_results().await;
    let stats = Statistics::from_results(&results);

    let report = generate_markdown_report(&results, &stats, "https://example.com/");

    assert!(report.starts_with("# Snare Keyword Scan Report"));
    assert!(report.contains("- **Keywords:** `casino`, `poker`"));
    assert!(report.contains("| Request URL | 1 |"));
    // Pipes inside content must not break the table
    assert!(report.contains("Weekly casino \\| poker night"));
}

#[test]
fn test_markdown_report_empty() {
    let report = generate_markdown_report(&[], &Statistics::default(), "local");
    assert!(report.contains("_No keywords found._"));
    assert!(!report.contains("## Matches"));
}

// ============================================================================
// Dispatch and Output Tests
// ============================================================================

#[tokio::test]
async fn test_generate_report_dispatch() {
    let results = sample_results().await;
    let stats = Statistics::from_results(&results);

    let text = generate_report(ReportFormat::Text, &results, &stats, "x").unwrap();
    let json = generate_report(ReportFormat::Json, &results, &stats, "x").unwrap();
    let markdown = generate_report(ReportFormat::Markdown, &results, &stats, "x").unwrap();

    assert!(text.contains("SNARE KEYWORD SCAN REPORT"));
    assert!(json.trim_start().starts_with('{'));
    assert!(markdown.starts_with('#'));
}

#[tokio::test]
async fn test_results_of_kind() {
    let results = sample_results().await;

    let links = results_of_kind(&results, ResultKind::LinkHref);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].keyword, "casino");
    assert!(results_of_kind(&results, ResultKind::Form).is_empty());
}

#[test]
fn test_save_report() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.txt");

    save_report("hello report", &path).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello report");
}
