use snare::handlers::*;
use snare_core::storage::{self, MemoryStorage, SqliteStorage, Storage};
use snare_scanner::{MatchMode, ResultKind};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use url::Url;

const PAGE: &str = r#"<html><head></head><body>
    <h1>Spin the casino wheel</h1>
    <span>Jackpot</span>
    <form><input name="q" placeholder="search poker rooms"></form>
</body></html>"#;

fn page_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", PAGE).unwrap();
    file
}

fn file_request(path: PathBuf, keywords: &[&str]) -> ScanRequest {
    ScanRequest {
        input: ScanInput::File(path),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        mode: MatchMode::Exact,
        annotate: None,
        timeout_secs: 5,
    }
}

// ============================================================================
// Argument Helpers
// ============================================================================

#[test]
fn test_scan_input_prefers_file() {
    let url = Url::parse("https://example.com").unwrap();
    let path = PathBuf::from("page.html");

    assert_eq!(
        scan_input(Some(&url), Some(&path)).unwrap(),
        ScanInput::File(path.clone())
    );
    assert_eq!(scan_input(Some(&url), None).unwrap(), ScanInput::Url(url));
}

#[test]
fn test_scan_input_requires_a_source() {
    let result = scan_input(None, None);
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("--url or --file"));
}

#[test]
fn test_split_keywords() {
    assert_eq!(
        split_keywords(["casino", "poker, dice ", ",,", " "]),
        vec!["casino", "poker", "dice"]
    );
    assert!(split_keywords(Vec::<String>::new()).is_empty());
}

#[test]
fn test_expand_path_keeps_plain_paths() {
    assert_eq!(expand_path("/tmp/snare.db"), PathBuf::from("/tmp/snare.db"));
    assert!(!expand_path("~/snare.db").to_string_lossy().starts_with('~'));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_config_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("nested").join("snare");

    let db_path = init_config(&dir, false).unwrap();

    assert_eq!(db_path, dir.join(DB_FILE_NAME));
    assert!(db_path.exists());
}

#[test]
fn test_init_config_refuses_to_overwrite_without_force() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = init_config(temp_dir.path(), false).unwrap();
    {
        let storage = SqliteStorage::new(&db_path).unwrap();
        storage::save_keywords(&storage, &["casino".to_string()]).unwrap();
    }

    let err = init_config(temp_dir.path(), false).unwrap_err();
    assert!(err.to_string().contains("--force"));

    init_config(temp_dir.path(), true).unwrap();
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage::load_keywords(&storage).unwrap(), None);
}

#[test]
fn test_open_storage_creates_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a").join("b").join("snare.db");

    open_storage(&path).unwrap();
    assert!(path.exists());
}

// ============================================================================
// Scan Tests
// ============================================================================

#[tokio::test]
async fn test_run_scan_on_local_file() {
    let file = page_file();
    let request = file_request(file.path().to_path_buf(), &["casino", "poker"]);

    let (response, session) = run_scan(&request, None).await.unwrap();

    assert!(response.success);
    let kinds: Vec<ResultKind> = response.results.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![ResultKind::Text, ResultKind::Attribute, ResultKind::Form]);
    assert!(session.document().url().unwrap().starts_with("file://"));
}

#[tokio::test]
async fn test_run_scan_uses_stored_keywords() {
    let file = page_file();
    let storage = Arc::new(MemoryStorage::new());
    storage::save_keywords(storage.as_ref(), &["wheel".to_string()]).unwrap();

    let request = file_request(file.path().to_path_buf(), &[]);
    let (response, _session) = run_scan(&request, Some(storage.clone())).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].keyword, "wheel");
    assert_eq!(storage::stored_origins(storage.as_ref()).unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_scan_without_any_keywords_fails() {
    let file = page_file();
    let request = file_request(file.path().to_path_buf(), &[]);

    let err = run_scan(&request, Some(Arc::new(MemoryStorage::new())))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No keywords"));
}

#[tokio::test]
async fn test_run_scan_missing_file() {
    let request = file_request(PathBuf::from("/definitely/not/here.html"), &["casino"]);

    let err = run_scan(&request, None).await.unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}

#[tokio::test]
async fn test_run_scan_writes_annotated_page() {
    let file = page_file();
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("annotated.html");

    let mut request = file_request(file.path().to_path_buf(), &["casino"]);
    request.annotate = Some(out.clone());
    run_scan(&request, None).await.unwrap();

    let html = std::fs::read_to_string(&out).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("snare-highlight"));
    assert!(html.contains("data-snare-injected"));
}

#[tokio::test]
async fn test_run_scan_tolerant_mode() {
    let file = page_file();
    let mut request = file_request(file.path().to_path_buf(), &["jackpt"]);

    let (exact, _) = run_scan(&request, None).await.unwrap();
    assert!(exact.results.is_empty());

    request.mode = MatchMode::Tolerant;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let (tolerant, _) = run_scan(&request, Some(storage)).await.unwrap();
    assert_eq!(tolerant.results.len(), 1);
}
