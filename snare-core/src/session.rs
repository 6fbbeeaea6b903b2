// Command coordination: one scanner, one annotator, one interceptor and the
// document they share.

use crate::storage::{self, PageRecord, Storage};
use serde::{Deserialize, Serialize};
use snare_scanner::transport::HttpRequest;
use snare_scanner::{
    Annotator, Document, KeywordSet, MatchMode, NetworkBoundary, RenderSummary, ResultStore,
    ScanError, ScanResult, Statistics, TrafficInterceptor, TransportError, TreeScanner,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a scan or results query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub success: bool,
    pub results: Vec<ScanResult>,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResponse {
    pub fn ok(results: Vec<ScanResult>) -> Self {
        let statistics = Statistics::from_results(&results);
        Self {
            success: true,
            results,
            statistics,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            statistics: Statistics::default(),
            error: Some(error.to_string()),
        }
    }
}

/// Label a document is stored under when it has no URL
pub const LOCAL_ORIGIN: &str = "local";

pub struct Session {
    document: Document,
    scanner: TreeScanner,
    annotator: Annotator,
    interceptor: TrafficInterceptor,
    keywords: KeywordSet,
    store: ResultStore,
    storage: Option<Arc<dyn Storage>>,
    annotate: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("keywords", &self.keywords)
            .field("store", &self.store)
            .field("annotate", &self.annotate)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            scanner: TreeScanner::new(),
            annotator: Annotator::new(),
            interceptor: TrafficInterceptor::new(KeywordSet::new()),
            keywords: KeywordSet::new(),
            store: ResultStore::new(),
            storage: None,
            annotate: false,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.set_mode(mode);
        self
    }

    pub fn set_mode(&mut self, mode: MatchMode) {
        self.scanner.set_mode(mode);
        self.interceptor.set_mode(mode);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Swap in a new document. Markers on the old one are torn down first and
    /// results from it are dropped.
    pub fn replace_document(&mut self, document: Document) -> Document {
        self.annotator.clear(&mut self.document);
        self.store.clear();
        self.scanner.clear();
        std::mem::replace(&mut self.document, document)
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    pub fn interceptor(&self) -> &TrafficInterceptor {
        &self.interceptor
    }

    pub fn is_annotating(&self) -> bool {
        self.annotate
    }

    /// Origin label used for persisted results
    pub fn origin(&self) -> String {
        self.document
            .url()
            .map(String::from)
            .unwrap_or_else(|| LOCAL_ORIGIN.to_string())
    }

    /// Normalize and apply a raw keyword list
    pub fn set_keywords<I, S>(&mut self, raw: I) -> KeywordSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = KeywordSet::from_raw(raw);
        self.interceptor.set_keywords(self.keywords.clone());
        info!("Active keywords: {}", self.keywords.len());

        if let Some(storage) = &self.storage
            && let Err(e) = storage::save_keywords(storage.as_ref(), &self.keywords.to_vec())
        {
            warn!("Failed to persist keywords: {}", e);
        }
        self.keywords.clone()
    }

    /// Restore the persisted keyword set. Falls back to the current set when
    /// nothing is stored or storage fails.
    pub fn load_keywords(&mut self) -> KeywordSet {
        let Some(storage) = &self.storage else {
            return self.keywords.clone();
        };

        match storage::load_keywords(storage.as_ref()) {
            Ok(Some(stored)) => {
                self.keywords = KeywordSet::from_raw(stored);
                self.interceptor.set_keywords(self.keywords.clone());
                debug!("Loaded {} keywords from storage", self.keywords.len());
            }
            Ok(None) => debug!("No stored keywords"),
            Err(e) => warn!("Failed to load keywords: {}", e),
        }
        self.keywords.clone()
    }

    /// Attach traffic inspection to `boundary`
    pub fn start_interception(&mut self, boundary: &mut NetworkBoundary) {
        self.interceptor.start(boundary);
    }

    pub fn stop_interception(&mut self, boundary: &mut NetworkBoundary) {
        self.interceptor.stop(boundary);
    }

    /// Scan the document and merge in whatever the interceptor has seen
    pub async fn start_scan(&mut self) -> ScanResponse {
        if self.keywords.is_empty() {
            return ScanResponse::failed(ScanError::NoKeywords);
        }

        let tree_results = match self.scanner.scan(&self.document, &self.keywords).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Scan failed: {}", e);
                return ScanResponse::failed(e);
            }
        };

        self.interceptor.flush().await;
        self.store.clear();
        self.store.extend(tree_results);
        self.store.extend(self.interceptor.results());

        if self.annotate {
            self.annotator.render(&mut self.document, self.store.all());
        }

        let results = self.store.to_vec();
        self.persist(&results);
        info!("Scan finished with {} results", results.len());
        ScanResponse::ok(results)
    }

    /// Show or hide markers for the last scan's results
    pub fn toggle_annotation(&mut self, enabled: bool) -> RenderSummary {
        self.annotate = enabled;
        if enabled {
            self.annotator.enable();
            self.annotator.render(&mut self.document, self.store.all())
        } else {
            self.annotator.disable(&mut self.document);
            RenderSummary::default()
        }
    }

    pub fn clear_results(&mut self) {
        self.store.clear();
        self.scanner.clear();
        self.interceptor.clear();
        self.annotator.clear(&mut self.document);

        if let Some(storage) = &self.storage
            && let Err(e) = storage.remove(&storage::origin_key(&self.origin()))
        {
            warn!("Failed to remove stored results: {}", e);
        }
    }

    /// Last computed results, without rescanning
    pub fn get_results(&self) -> ScanResponse {
        ScanResponse::ok(self.store.to_vec())
    }

    fn persist(&self, results: &[ScanResult]) {
        let Some(storage) = &self.storage else {
            return;
        };
        let record = PageRecord::new(&self.origin(), results.to_vec());
        if let Err(e) = storage::save_page(storage.as_ref(), &record) {
            warn!("Failed to persist results for {}: {}", record.url, e);
        }
    }
}

/// GET `url` through `boundary` and parse the body as a document
pub async fn fetch_document(
    boundary: &NetworkBoundary,
    url: &str,
) -> Result<Document, TransportError> {
    let response = boundary.fetch(HttpRequest::get(url)).await?;
    if !response.is_success() {
        warn!("{} answered with status {}", url, response.status);
    }
    let html = String::from_utf8_lossy(&response.body);
    Ok(Document::parse(&html).with_url(url))
}
