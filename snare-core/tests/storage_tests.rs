// Tests for key-value storage

use serde_json::json;
use snare_core::storage::{
    self, KEYWORDS_KEY, MemoryStorage, PageRecord, SqliteStorage, Storage, origin_key,
};
use snare_scanner::{Channel, ResultKind, ScanResult};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, SqliteStorage) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = SqliteStorage::new(&db_path).unwrap();
    (temp_dir, db)
}

fn network_result(keyword: &str, url: &str) -> ScanResult {
    ScanResult::from_network(
        ResultKind::RequestUrl,
        keyword,
        url,
        Channel::Fetch,
        "GET",
        url.to_string(),
    )
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!SqliteStorage::exists(&db_path));
    let db = SqliteStorage::new(&db_path);
    assert!(db.is_ok());
    assert!(SqliteStorage::exists(&db_path));
}

#[test]
fn test_database_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = SqliteStorage::new(&db_path).unwrap();
    drop(db);
    SqliteStorage::drop(&db_path).unwrap();
    assert!(!SqliteStorage::exists(&db_path));
}

#[test]
fn test_reopen_keeps_values() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let db = SqliteStorage::new(&db_path).unwrap();
        db.set("answer", json!(42)).unwrap();
    }

    let db = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(db.get("answer").unwrap(), Some(json!(42)));
}

// ============================================================================
// Key-Value Tests
// ============================================================================

#[test]
fn test_get_missing_key() {
    let (_temp_dir, db) = create_test_db();
    assert_eq!(db.get("nope").unwrap(), None);
}

#[test]
fn test_set_overwrites() {
    let (_temp_dir, db) = create_test_db();

    db.set("k", json!({"a": 1})).unwrap();
    db.set("k", json!({"a": 2})).unwrap();

    assert_eq!(db.get("k").unwrap(), Some(json!({"a": 2})));
    assert_eq!(db.keys().unwrap(), vec!["k".to_string()]);
    assert!(db.updated_at("k").unwrap().is_some());
}

#[test]
fn test_remove_and_keys() {
    let (_temp_dir, db) = create_test_db();

    db.set("b", json!(1)).unwrap();
    db.set("a", json!(2)).unwrap();
    assert_eq!(db.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

    db.remove("a").unwrap();
    db.remove("missing").unwrap();
    assert_eq!(db.keys().unwrap(), vec!["b".to_string()]);
    assert_eq!(db.updated_at("a").unwrap(), None);
}

#[test]
fn test_memory_storage_matches_sqlite_behaviour() {
    let memory = MemoryStorage::new();
    let sqlite = SqliteStorage::in_memory().unwrap();
    let backends: [&dyn Storage; 2] = [&memory, &sqlite];

    for backend in backends {
        backend.set("x", json!(["one", "two"])).unwrap();
        assert_eq!(backend.get("x").unwrap(), Some(json!(["one", "two"])));
        backend.remove("x").unwrap();
        assert_eq!(backend.get("x").unwrap(), None);
        assert!(backend.keys().unwrap().is_empty());
    }
}

// ============================================================================
// Keyword and Page Record Tests
// ============================================================================

#[test]
fn test_keywords_round_trip() {
    let (_temp_dir, db) = create_test_db();

    assert_eq!(storage::load_keywords(&db).unwrap(), None);

    let keywords = vec!["Casino".to_string(), "poker".to_string()];
    storage::save_keywords(&db, &keywords).unwrap();

    assert_eq!(storage::load_keywords(&db).unwrap(), Some(keywords));
    assert_eq!(
        db.get(KEYWORDS_KEY).unwrap(),
        Some(json!(["Casino", "poker"]))
    );
}

#[test]
fn test_malformed_keywords_surface_as_error() {
    let db = MemoryStorage::new();
    db.set(KEYWORDS_KEY, json!({"not": "a list"})).unwrap();
    assert!(storage::load_keywords(&db).is_err());
}

#[test]
fn test_page_record_round_trip() {
    let (_temp_dir, db) = create_test_db();

    let record = PageRecord::new(
        "https://example.com/promo",
        vec![
            network_result("casino", "https://example.com/promo"),
            network_result("poker", "https://example.com/promo"),
        ],
    );
    assert_eq!(record.statistics.total, 2);

    storage::save_page(&db, &record).unwrap();
    let loaded = storage::load_page(&db, "https://example.com/other")
        .unwrap()
        .unwrap();

    assert_eq!(loaded, record);
    assert_eq!(
        storage::stored_origins(&db).unwrap(),
        vec!["https://example.com".to_string()]
    );
}

#[test]
fn test_origin_key() {
    assert_eq!(
        origin_key("https://example.com/a/b?c=d"),
        "results:https://example.com"
    );
    assert_eq!(
        origin_key("http://example.com:8080/"),
        "results:http://example.com:8080"
    );
    assert_eq!(origin_key("local"), "results:local");
    assert_eq!(origin_key(" page.html "), "results:page.html");
}
