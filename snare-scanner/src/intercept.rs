// Keyword inspection of outbound traffic.
//
// The interceptor decorates whatever primitives a NetworkBoundary has
// installed. Callers see the same responses and events they would without
// it; matching happens on the side.

use crate::keywords::KeywordSet;
use crate::matcher::{MatchMode, matches};
use crate::result::{Channel, PREVIEW_LEN, ResultKind, ScanResult, truncate};
use crate::store::ResultStore;
use crate::transport::{
    FetchPrimitive, HttpRequest, HttpResponse, NetworkBoundary, RequestEvent, RequestPrimitive,
    Result,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the interceptor and the wrappers it installs
struct Inspector {
    active: AtomicBool,
    keywords: RwLock<KeywordSet>,
    mode: RwLock<MatchMode>,
    store: Mutex<ResultStore>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Inspector {
    fn new(keywords: KeywordSet, mode: MatchMode) -> Self {
        Self {
            active: AtomicBool::new(false),
            keywords: RwLock::new(keywords),
            mode: RwLock::new(mode),
            store: Mutex::new(ResultStore::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn matching_keywords(&self, text: &str) -> Vec<String> {
        let mode = *self.mode.read().unwrap_or_else(PoisonError::into_inner);
        let keywords = self.keywords.read().unwrap_or_else(PoisonError::into_inner);
        keywords
            .iter()
            .filter(|k| matches(text, k, mode))
            .map(String::from)
            .collect()
    }

    fn record(
        &self,
        kind: ResultKind,
        text: &str,
        url: &str,
        method: &str,
        channel: Channel,
        content: &str,
    ) {
        let hits = self.matching_keywords(text);
        if hits.is_empty() {
            return;
        }

        let mut store = guard(&self.store);
        for keyword in hits {
            let result = ScanResult::from_network(
                kind,
                &keyword,
                url,
                channel,
                method,
                truncate(content, PREVIEW_LEN),
            );
            if store.add(result) {
                info!(
                    "Keyword '{}' found in {} of {} {}",
                    keyword,
                    kind.display_name(),
                    method,
                    url
                );
            }
        }
    }

    /// URL and body checks, run before the call is dispatched
    fn inspect_request(&self, request: &HttpRequest, channel: Channel) {
        if !self.is_active() {
            return;
        }

        self.record(
            ResultKind::RequestUrl,
            &request.url,
            &request.url,
            &request.method,
            channel,
            &request.url,
        );

        if let Some(body) = &request.body {
            let text = body.normalize();
            self.record(
                ResultKind::RequestBody,
                &text,
                &request.url,
                &request.method,
                channel,
                &text,
            );
        }
    }

    /// Best-effort response check; bodies that are not text are ignored
    fn inspect_response(&self, url: &str, method: &str, channel: Channel, response: &HttpResponse) {
        if !self.is_active() {
            return;
        }

        match response.text() {
            Ok(text) => self.record(ResultKind::Response, &text, url, method, channel, &text),
            Err(e) => debug!("Skipping response from {}: {}", url, e),
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = guard(&self.pending);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

struct InterceptedFetch {
    inner: Arc<dyn FetchPrimitive>,
    inspector: Arc<Inspector>,
}

#[async_trait]
impl FetchPrimitive for InterceptedFetch {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.inspector.inspect_request(&request, Channel::Fetch);

        let url = request.url.clone();
        let method = request.method.clone();
        let response = self.inner.fetch(request).await?;

        if self.inspector.is_active() {
            let inspector = self.inspector.clone();
            let observed = response.clone();
            let handle = tokio::spawn(async move {
                inspector.inspect_response(&url, &method, Channel::Fetch, &observed);
            });
            self.inspector.track(handle);
        }

        Ok(response)
    }
}

struct InterceptedRequest {
    inner: Arc<dyn RequestPrimitive>,
    inspector: Arc<Inspector>,
}

impl RequestPrimitive for InterceptedRequest {
    fn send(&self, request: HttpRequest) -> mpsc::UnboundedReceiver<RequestEvent> {
        self.inspector.inspect_request(&request, Channel::Request);

        let url = request.url.clone();
        let method = request.method.clone();
        let mut upstream = self.inner.send(request);
        let (tx, rx) = mpsc::unbounded_channel();
        let inspector = self.inspector.clone();

        // Events are forwarded first; the body is only looked at once the
        // caller already has it.
        let handle = tokio::spawn(async move {
            while let Some(event) = upstream.recv().await {
                let loaded = match &event {
                    RequestEvent::Load(response) => Some(response.clone()),
                    _ => None,
                };
                if tx.send(event).is_err() {
                    debug!("Request listener for {} dropped", url);
                }
                if let Some(response) = loaded {
                    inspector.inspect_response(&url, &method, Channel::Request, &response);
                }
            }
        });
        self.inspector.track(handle);

        rx
    }
}

type SavedPrimitives = (Arc<dyn FetchPrimitive>, Arc<dyn RequestPrimitive>);

/// Installs keyword-inspecting wrappers on a [`NetworkBoundary`].
///
/// Results accumulate in an internal [`ResultStore`] until cleared.
pub struct TrafficInterceptor {
    inspector: Arc<Inspector>,
    saved: Option<SavedPrimitives>,
}

impl TrafficInterceptor {
    pub fn new(keywords: KeywordSet) -> Self {
        Self::with_mode(keywords, MatchMode::default())
    }

    pub fn with_mode(keywords: KeywordSet, mode: MatchMode) -> Self {
        Self {
            inspector: Arc::new(Inspector::new(keywords, mode)),
            saved: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    /// Wrap the boundary's primitives. Calling it again while active does nothing.
    pub fn start(&mut self, boundary: &mut NetworkBoundary) {
        if self.saved.is_some() {
            debug!("Traffic interception already active");
            return;
        }

        let fetch = Arc::new(InterceptedFetch {
            inner: boundary.fetch_primitive().clone(),
            inspector: self.inspector.clone(),
        });
        let request = Arc::new(InterceptedRequest {
            inner: boundary.request_primitive().clone(),
            inspector: self.inspector.clone(),
        });

        let original_fetch = boundary.install_fetch(fetch);
        let original_request = boundary.install_request(request);
        self.saved = Some((original_fetch, original_request));
        self.inspector.active.store(true, Ordering::SeqCst);
        info!("Traffic interception started");
    }

    /// Put the original primitives back exactly as they were
    pub fn stop(&mut self, boundary: &mut NetworkBoundary) {
        let Some((fetch, request)) = self.saved.take() else {
            debug!("Traffic interception not active");
            return;
        };

        self.inspector.active.store(false, Ordering::SeqCst);
        boundary.install_fetch(fetch);
        boundary.install_request(request);
        info!("Traffic interception stopped");
    }

    pub fn set_keywords(&self, keywords: KeywordSet) {
        *self
            .inspector
            .keywords
            .write()
            .unwrap_or_else(PoisonError::into_inner) = keywords;
    }

    pub fn set_mode(&self, mode: MatchMode) {
        *self
            .inspector
            .mode
            .write()
            .unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn results(&self) -> Vec<ScanResult> {
        guard(&self.inspector.store).to_vec()
    }

    pub fn clear(&self) {
        guard(&self.inspector.store).clear();
    }

    /// Wait for every response inspection started so far
    pub async fn flush(&self) {
        loop {
            let batch: Vec<JoinHandle<()>> = guard(&self.inspector.pending).drain(..).collect();
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    debug!("Response inspection task failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ReqwestFetch, RequestBody};
    use std::sync::atomic::AtomicUsize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Canned primitive that counts calls and never touches the network
    struct StubFetch {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    impl StubFetch {
        fn new(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FetchPrimitive for StubFetch {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                url: request.url,
                status: 200,
                headers: Vec::new(),
                body: self.body.clone(),
            })
        }
    }

    struct StubRequest {
        body: Vec<u8>,
    }

    impl RequestPrimitive for StubRequest {
        fn send(&self, request: HttpRequest) -> mpsc::UnboundedReceiver<RequestEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(RequestEvent::Progress(self.body.len()));
            let _ = tx.send(RequestEvent::Load(HttpResponse {
                url: request.url,
                status: 200,
                headers: Vec::new(),
                body: self.body.clone(),
            }));
            rx
        }
    }

    fn keywords(words: &[&str]) -> KeywordSet {
        KeywordSet::from_raw(words.iter().copied())
    }

    fn stub_boundary(body: &[u8]) -> NetworkBoundary {
        NetworkBoundary::new(
            Arc::new(StubFetch::new(body)),
            Arc::new(StubRequest {
                body: body.to_vec(),
            }),
        )
    }

    fn kinds(results: &[ScanResult]) -> Vec<ResultKind> {
        results.iter().map(|r| r.kind).collect()
    }

    // ============================================================================
    // Install / uninstall
    // ============================================================================

    #[test]
    fn test_stop_restores_original_primitives() {
        let mut boundary = stub_boundary(b"");
        let original_fetch = boundary.fetch_primitive().clone();
        let original_request = boundary.request_primitive().clone();

        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);
        assert!(interceptor.is_active());
        assert!(!Arc::ptr_eq(boundary.fetch_primitive(), &original_fetch));
        assert!(!Arc::ptr_eq(boundary.request_primitive(), &original_request));

        interceptor.stop(&mut boundary);
        assert!(!interceptor.is_active());
        assert!(Arc::ptr_eq(boundary.fetch_primitive(), &original_fetch));
        assert!(Arc::ptr_eq(boundary.request_primitive(), &original_request));
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut boundary = stub_boundary(b"");
        let original_fetch = boundary.fetch_primitive().clone();

        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.stop(&mut boundary);
        assert!(Arc::ptr_eq(boundary.fetch_primitive(), &original_fetch));

        interceptor.start(&mut boundary);
        let wrapper = boundary.fetch_primitive().clone();
        interceptor.start(&mut boundary);
        assert!(Arc::ptr_eq(boundary.fetch_primitive(), &wrapper));

        interceptor.stop(&mut boundary);
        interceptor.stop(&mut boundary);
        assert!(Arc::ptr_eq(boundary.fetch_primitive(), &original_fetch));
    }

    // ============================================================================
    // Fetch channel
    // ============================================================================

    #[tokio::test]
    async fn test_fetch_url_body_and_response_are_inspected() {
        let mut boundary = stub_boundary(b"<p>Best casino bonus</p>");
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);

        let request = HttpRequest::post(
            "https://api.example.com/casino/track",
            RequestBody::Form(vec![("ref".into(), "casino-ad".into())]),
        );
        let response = boundary.fetch(request).await.unwrap();
        assert_eq!(response.body, b"<p>Best casino bonus</p>");

        interceptor.flush().await;
        let results = interceptor.results();
        assert_eq!(
            kinds(&results),
            vec![
                ResultKind::RequestUrl,
                ResultKind::RequestBody,
                ResultKind::Response
            ]
        );
        assert_eq!(results[1].content, "ref=casino-ad");
        assert!(
            results
                .iter()
                .all(|r| r.where_label() == "POST https://api.example.com/casino/track (fetch)")
        );
    }

    #[tokio::test]
    async fn test_json_body_is_serialized_before_matching() {
        let mut boundary = stub_boundary(b"nothing");
        let mut interceptor = TrafficInterceptor::new(keywords(&["jackpot"]));
        interceptor.start(&mut boundary);

        let request = HttpRequest::post(
            "https://api.example.com/events",
            RequestBody::Json(serde_json::json!({"event": "jackpot"})),
        );
        boundary.fetch(request).await.unwrap();
        interceptor.flush().await;

        let results = interceptor.results();
        assert_eq!(kinds(&results), vec![ResultKind::RequestBody]);
        assert_eq!(results[0].content, r#"{"event":"jackpot"}"#);
    }

    #[tokio::test]
    async fn test_long_previews_are_truncated() {
        let body = format!("casino{}", "x".repeat(400));
        let mut boundary = stub_boundary(body.as_bytes());
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);

        boundary
            .fetch(HttpRequest::get("https://example.com/page"))
            .await
            .unwrap();
        interceptor.flush().await;

        let results = interceptor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content.chars().count(), PREVIEW_LEN + 3);
        assert!(results[0].content.ends_with("..."));
    }

    #[tokio::test]
    async fn test_unreadable_response_is_ignored() {
        let mut boundary = stub_boundary(&[0xff, 0xfe, 0xfd]);
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);

        let response = boundary
            .fetch(HttpRequest::get("https://example.com/casino.bin"))
            .await
            .unwrap();
        interceptor.flush().await;

        assert_eq!(response.body, vec![0xff, 0xfe, 0xfd]);
        assert_eq!(kinds(&interceptor.results()), vec![ResultKind::RequestUrl]);
    }

    #[tokio::test]
    async fn test_repeated_calls_are_deduplicated() {
        let mut boundary = stub_boundary(b"");
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);

        for _ in 0..3 {
            boundary
                .fetch(HttpRequest::get("https://casino.example.com/"))
                .await
                .unwrap();
        }
        interceptor.flush().await;
        assert_eq!(interceptor.results().len(), 1);
    }

    #[tokio::test]
    async fn test_no_results_after_stop() {
        let stub = Arc::new(StubFetch::new(b"casino"));
        let mut boundary = NetworkBoundary::new(stub.clone(), Arc::new(StubRequest { body: vec![] }));
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));

        interceptor.start(&mut boundary);
        let wrapper = boundary.fetch_primitive().clone();
        interceptor.stop(&mut boundary);

        let response = boundary
            .fetch(HttpRequest::get("https://casino.example.com/"))
            .await
            .unwrap();
        // A wrapper someone kept hold of passes calls through untouched
        wrapper
            .fetch(HttpRequest::get("https://casino.example.com/other"))
            .await
            .unwrap();
        interceptor.flush().await;

        assert_eq!(response.body, b"casino");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert!(interceptor.results().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_and_mode_updates_apply_to_later_calls() {
        let mut boundary = stub_boundary(b"");
        let mut interceptor = TrafficInterceptor::new(keywords(&["poker"]));
        interceptor.start(&mut boundary);

        let request = || {
            HttpRequest::post(
                "https://example.com/spin",
                RequestBody::Text("jackpot".to_string()),
            )
        };

        boundary.fetch(request()).await.unwrap();
        assert!(interceptor.results().is_empty());

        interceptor.set_keywords(keywords(&["jackpt"]));
        boundary.fetch(request()).await.unwrap();
        assert!(interceptor.results().is_empty());

        interceptor.set_mode(MatchMode::Tolerant);
        boundary.fetch(request()).await.unwrap();
        interceptor.flush().await;

        let results = interceptor.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].keyword, "jackpt");
        assert_eq!(results[0].kind, ResultKind::RequestBody);

        interceptor.clear();
        assert!(interceptor.results().is_empty());
    }

    // ============================================================================
    // Request channel
    // ============================================================================

    #[tokio::test]
    async fn test_request_events_are_forwarded_then_inspected() {
        let mut boundary = stub_boundary(b"welcome to the casino");
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);

        let mut events = boundary.send(HttpRequest::get("https://example.com/feed"));
        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            received.push(event);
        }
        interceptor.flush().await;

        assert_eq!(received.len(), 2);
        assert!(matches!(&received[1], RequestEvent::Load(r) if r.body == b"welcome to the casino"));

        let results = interceptor.results();
        assert_eq!(kinds(&results), vec![ResultKind::Response]);
        assert_eq!(results[0].where_label(), "GET https://example.com/feed (request)");
    }

    #[tokio::test]
    async fn test_same_url_on_both_channels_is_two_results() {
        let mut boundary = stub_boundary(b"");
        let mut interceptor = TrafficInterceptor::new(keywords(&["casino"]));
        interceptor.start(&mut boundary);

        boundary
            .fetch(HttpRequest::get("https://casino.example.com/"))
            .await
            .unwrap();
        let mut events = boundary.send(HttpRequest::get("https://casino.example.com/"));
        while events.recv().await.is_some() {}
        interceptor.flush().await;

        assert_eq!(interceptor.results().len(), 2);
    }

    // ============================================================================
    // Real HTTP
    // ============================================================================

    #[tokio::test]
    async fn test_intercepts_live_http_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/landing"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html>Play roulette now</html>"),
            )
            .mount(&server)
            .await;

        let mut boundary = NetworkBoundary::new(
            Arc::new(ReqwestFetch::new().unwrap()),
            Arc::new(StubRequest { body: vec![] }),
        );
        let mut interceptor = TrafficInterceptor::new(keywords(&["roulette"]));
        interceptor.start(&mut boundary);

        let response = boundary
            .fetch(HttpRequest::get(&format!("{}/landing", server.uri())))
            .await
            .unwrap();
        interceptor.flush().await;

        assert_eq!(response.status, 200);
        let results = interceptor.results();
        assert_eq!(kinds(&results), vec![ResultKind::Response]);
        assert_eq!(results[0].content, "<html>Play roulette now</html>");
    }
}
