use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use snare_core::report::{self, ReportFormat};
use snare_core::session::{ScanResponse, Session, fetch_document};
use snare_core::storage::{self, SqliteStorage, Storage};
use snare_scanner::{Document, MatchMode, NetworkBoundary, Statistics};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DB_FILE_NAME: &str = "snare.db";

/// Where the page to scan comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ScanInput {
    Url(Url),
    File(PathBuf),
}

impl ScanInput {
    pub fn label(&self) -> String {
        match self {
            ScanInput::Url(url) => url.to_string(),
            ScanInput::File(path) => path.display().to_string(),
        }
    }
}

/// Everything a scan run needs, decoupled from clap
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub input: ScanInput,
    pub keywords: Vec<String>,
    pub mode: MatchMode,
    pub annotate: Option<PathBuf>,
    pub timeout_secs: u64,
}

/// Pick the scan input from the `--url`/`--file` pair
pub fn scan_input(url: Option<&Url>, file: Option<&PathBuf>) -> Result<ScanInput, String> {
    if let Some(path) = file {
        Ok(ScanInput::File(path.clone()))
    } else if let Some(url) = url {
        Ok(ScanInput::Url(url.clone()))
    } else {
        Err("Either --url or --file must be provided".to_string())
    }
}

/// Flatten repeated and comma separated keyword arguments
pub fn split_keywords<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|value| {
            value
                .as_ref()
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Open the database at `path`, creating its directory when missing
pub fn open_storage(path: &Path) -> Result<SqliteStorage> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteStorage::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Create the config directory and a fresh database inside it.
///
/// An existing database is kept unless `force` is set.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let db_path = dir.join(DB_FILE_NAME);

    if SqliteStorage::exists(&db_path) {
        if !force {
            bail!(
                "Database already exists at {} (use --force to overwrite)",
                db_path.display()
            );
        }
        SqliteStorage::drop(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
    }

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    open_storage(&db_path)?;
    Ok(db_path)
}

async fn load_document(input: &ScanInput, boundary: &NetworkBoundary) -> Result<Document> {
    match input {
        ScanInput::Url(url) => fetch_document(boundary, url.as_str())
            .await
            .with_context(|| format!("Failed to fetch {}", url)),
        ScanInput::File(path) => {
            let html = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let document = Document::parse(&html);
            // Local files are stored under their file:// URL
            match fs::canonicalize(path).ok().and_then(|p| Url::from_file_path(p).ok()) {
                Some(url) => Ok(document.with_url(url.as_str())),
                None => Ok(document),
            }
        }
    }
}

/// Run one scan end to end. Returns the session so callers can inspect the
/// (possibly annotated) document.
pub async fn run_scan(
    request: &ScanRequest,
    storage: Option<Arc<dyn Storage>>,
) -> Result<(ScanResponse, Session)> {
    let mut session = Session::new(Document::new()).with_mode(request.mode);
    if let Some(storage) = storage {
        session = session.with_storage(storage);
    }

    if request.keywords.is_empty() {
        session.load_keywords();
    } else {
        session.set_keywords(&request.keywords);
    }
    if session.keywords().is_empty() {
        bail!("No keywords given. Pass -k or run `snare keywords set` first");
    }

    let mut boundary = NetworkBoundary::reqwest(request.timeout_secs)?;
    session.start_interception(&mut boundary);
    let document = load_document(&request.input, &boundary).await;
    let document = match document {
        Ok(document) => document,
        Err(e) => {
            session.stop_interception(&mut boundary);
            return Err(e);
        }
    };
    session.replace_document(document);

    let response = session.start_scan().await;
    session.stop_interception(&mut boundary);

    if !response.success {
        bail!(
            "Scan failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(path) = &request.annotate {
        let summary = session.toggle_annotation(true);
        fs::write(path, session.document().to_html())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(
            "Annotated {} elements into {}",
            summary.annotated,
            path.display()
        );
    }

    Ok((response, session))
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn db_path(args: &ArgMatches) -> PathBuf {
    args.get_one::<String>("db")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| expand_path("~/.config/snare/snare.db"))
}

fn emit_report(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            report::save_report(content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  SNARE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir = args
        .get_one::<String>("PATH")
        .map(|p| expand_path(p))
        .context("No config directory given")?;
    let force = args.get_flag("force");

    println!(
        "{} Target: {}",
        "→".blue(),
        dir.display().to_string().bright_white()
    );

    let db_path = init_config(&dir, force)?;

    println!(
        "{} Database initialized: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub fn handle_keywords_set(args: &ArgMatches) -> Result<()> {
    let raw: Vec<String> = args
        .get_many::<String>("KEYWORD")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let storage: Arc<dyn Storage> = Arc::new(open_storage(&db_path(args))?);

    let mut session = Session::new(Document::new()).with_storage(storage);
    let keywords = session.set_keywords(split_keywords(raw));

    println!(
        "{} Stored {} keywords",
        "✓".green().bold(),
        keywords.len().to_string().cyan()
    );
    for keyword in keywords.iter() {
        println!("  {} {}", "•".yellow(), keyword);
    }
    Ok(())
}

pub fn handle_keywords_list(args: &ArgMatches) -> Result<()> {
    let storage = open_storage(&db_path(args))?;
    let keywords = storage::load_keywords(&storage)?.unwrap_or_default();

    if keywords.is_empty() {
        println!("No keywords stored. Use `snare keywords set` to add some.");
    }
    for keyword in keywords {
        println!("{}", keyword);
    }
    Ok(())
}

pub fn handle_keywords_clear(args: &ArgMatches) -> Result<()> {
    let storage = open_storage(&db_path(args))?;
    storage.remove(storage::KEYWORDS_KEY)?;
    println!("{} Keywords cleared", "✓".green().bold());
    Ok(())
}

pub async fn handle_scan(args: &ArgMatches) -> Result<()> {
    let input = scan_input(args.get_one::<Url>("url"), args.get_one::<PathBuf>("file"))
        .map_err(anyhow::Error::msg)?;
    let keywords = args
        .get_many::<String>("keyword")
        .map(split_keywords)
        .unwrap_or_default();
    let request = ScanRequest {
        input,
        keywords,
        mode: if args.get_flag("tolerant") {
            MatchMode::Tolerant
        } else {
            MatchMode::Exact
        },
        annotate: args.get_one::<PathBuf>("annotate").cloned(),
        timeout_secs: args.get_one::<u64>("timeout").copied().unwrap_or(10),
    };

    let storage: Option<Arc<dyn Storage>> = match open_storage(&db_path(args)) {
        Ok(storage) => Some(Arc::new(storage)),
        Err(e) => {
            tracing::warn!("Continuing without storage: {:#}", e);
            None
        }
    };

    let progress = spinner(&format!("Scanning {}", request.input.label()));
    let outcome = run_scan(&request, storage).await;
    progress.finish_and_clear();
    let (response, _session) = outcome?;

    println!(
        "{} Scan complete: {} matches",
        "✓".green().bold(),
        response.results.len().to_string().cyan()
    );
    if let Some(path) = &request.annotate {
        println!(
            "{} Annotated page: {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }
    println!();

    let content = report::generate_report(
        report_format(args),
        &response.results,
        &response.statistics,
        &request.input.label(),
    )?;
    emit_report(&content, args.get_one::<PathBuf>("output"))
}

pub fn handle_results(args: &ArgMatches) -> Result<()> {
    let storage = open_storage(&db_path(args))?;

    let Some(origin) = args.get_one::<String>("ORIGIN") else {
        let origins = storage::stored_origins(&storage)?;
        if origins.is_empty() {
            println!("No stored results.");
        }
        for origin in origins {
            println!("{}", origin);
        }
        return Ok(());
    };

    let Some(record) = storage::load_page(&storage, origin)? else {
        bail!("No stored results for {}", origin);
    };

    let statistics: &Statistics = &record.statistics;
    let label = format!(
        "{} (scanned {})",
        record.url,
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let content =
        report::generate_report(report_format(args), &record.results, statistics, &label)?;
    print!("{}", content);
    Ok(())
}

pub fn handle_clear(args: &ArgMatches) -> Result<()> {
    let storage = open_storage(&db_path(args))?;
    let origin = args
        .get_one::<String>("ORIGIN")
        .context("No origin given")?;

    let key = storage::origin_key(origin);
    if storage.get(&key)?.is_none() {
        println!("No stored results for {}", origin);
        return Ok(());
    }
    storage.remove(&key)?;
    println!("{} Cleared results for {}", "✓".green().bold(), origin);
    Ok(())
}
