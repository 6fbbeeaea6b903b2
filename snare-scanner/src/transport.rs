// Network boundary: the two asynchronous call primitives every outbound
// request goes through, and their reqwest-backed implementations.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Form(Vec<(String, String)>),
    Json(Value),
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Flatten the body into the text that keyword matching runs against
    pub fn normalize(&self) -> String {
        match self {
            RequestBody::Text(text) => text.clone(),
            RequestBody::Form(pairs) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish(),
            RequestBody::Json(value) => value.to_string(),
            RequestBody::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: &str, body: RequestBody) -> Self {
        Self::new("POST", url).with_body(body)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8; fails on invalid sequences
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone())
            .map_err(|e| TransportError::Other(format!("Response body is not text: {}", e)))
    }
}

/// Events emitted by an in-flight [`RequestPrimitive`] call
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    /// Total bytes received so far
    Progress(usize),
    Load(HttpResponse),
    Error(String),
}

/// Promise-style primitive: one call, one response
#[async_trait]
pub trait FetchPrimitive: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Event-style primitive: the outcome arrives on the returned channel.
///
/// Implementations spawn onto the current tokio runtime.
pub trait RequestPrimitive: Send + Sync {
    fn send(&self, request: HttpRequest) -> mpsc::UnboundedReceiver<RequestEvent>;
}

fn default_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent("Snare/0.1 (https://github.com/trapdoorsec/snare)")
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
        .pool_idle_timeout(Duration::from_secs(90))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(TransportError::from)
}

fn build_request(client: &Client, request: &HttpRequest) -> Result<reqwest::RequestBuilder> {
    let url = Url::parse(&request.url)
        .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| TransportError::Other(format!("Invalid method: {}", request.method)))?;

    let mut builder = client.request(method, url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder = match &request.body {
        None => builder,
        Some(RequestBody::Text(text)) => builder.body(text.clone()),
        Some(RequestBody::Form(pairs)) => builder.form(pairs),
        Some(RequestBody::Json(value)) => builder.json(value),
        Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
    };
    Ok(builder)
}

fn response_head(response: &reqwest::Response) -> (String, u16, Vec<(String, String)>) {
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    (response.url().to_string(), response.status().as_u16(), headers)
}

#[derive(Clone)]
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(default_client(timeout_secs)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchPrimitive for ReqwestFetch {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("fetch {} {}", request.method, request.url);
        let response = build_request(&self.client, &request)?.send().await?;
        let (url, status, headers) = response_head(&response);
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

#[derive(Clone)]
pub struct ReqwestRequest {
    client: Client,
}

impl ReqwestRequest {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(default_client(timeout_secs)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

async fn stream_response(
    client: &Client,
    request: &HttpRequest,
    tx: &mpsc::UnboundedSender<RequestEvent>,
) -> Result<HttpResponse> {
    let mut response = build_request(client, request)?.send().await?;
    let (url, status, headers) = response_head(&response);

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if tx.send(RequestEvent::Progress(body.len())).is_err() {
            return Err(TransportError::ChannelClosed);
        }
    }
    Ok(HttpResponse {
        url,
        status,
        headers,
        body,
    })
}

impl RequestPrimitive for ReqwestRequest {
    fn send(&self, request: HttpRequest) -> mpsc::UnboundedReceiver<RequestEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();

        tokio::spawn(async move {
            debug!("request {} {}", request.method, request.url);
            let outcome = stream_response(&client, &request, &tx).await;

            let event = match outcome {
                Ok(response) => RequestEvent::Load(response),
                Err(TransportError::ChannelClosed) => return,
                Err(e) => {
                    warn!("request to {} failed: {}", request.url, e);
                    RequestEvent::Error(e.to_string())
                }
            };
            let _ = tx.send(event);
        });

        rx
    }
}

/// The installed pair of network primitives. Whoever owns this owns the
/// network; interception swaps the slots in place.
#[derive(Clone)]
pub struct NetworkBoundary {
    fetch: Arc<dyn FetchPrimitive>,
    request: Arc<dyn RequestPrimitive>,
}

impl NetworkBoundary {
    pub fn new(fetch: Arc<dyn FetchPrimitive>, request: Arc<dyn RequestPrimitive>) -> Self {
        Self { fetch, request }
    }

    /// Boundary backed by one shared reqwest client
    pub fn reqwest(timeout_secs: u64) -> Result<Self> {
        let client = default_client(timeout_secs)?;
        Ok(Self::new(
            Arc::new(ReqwestFetch::with_client(client.clone())),
            Arc::new(ReqwestRequest::with_client(client)),
        ))
    }

    pub fn fetch_primitive(&self) -> &Arc<dyn FetchPrimitive> {
        &self.fetch
    }

    pub fn request_primitive(&self) -> &Arc<dyn RequestPrimitive> {
        &self.request
    }

    /// Install a fetch primitive, returning the one it replaces
    pub fn install_fetch(&mut self, fetch: Arc<dyn FetchPrimitive>) -> Arc<dyn FetchPrimitive> {
        std::mem::replace(&mut self.fetch, fetch)
    }

    /// Install a request primitive, returning the one it replaces
    pub fn install_request(
        &mut self,
        request: Arc<dyn RequestPrimitive>,
    ) -> Arc<dyn RequestPrimitive> {
        std::mem::replace(&mut self.request, request)
    }

    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.fetch.fetch(request).await
    }

    pub fn send(&self, request: HttpRequest) -> mpsc::UnboundedReceiver<RequestEvent> {
        self.request.send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_bodies() {
        assert_eq!(RequestBody::Text("plain".into()).normalize(), "plain");
        assert_eq!(
            RequestBody::Form(vec![
                ("q".into(), "casino night".into()),
                ("page".into(), "2".into())
            ])
            .normalize(),
            "q=casino+night&page=2"
        );
        assert_eq!(
            RequestBody::Json(serde_json::json!({"term": "casino"})).normalize(),
            r#"{"term":"casino"}"#
        );
        assert_eq!(
            RequestBody::Bytes(vec![b'o', b'k', 0xff]).normalize(),
            "ok\u{fffd}"
        );
    }

    #[test]
    fn test_response_text_rejects_invalid_utf8() {
        let response = HttpResponse {
            url: "http://localhost/".into(),
            status: 200,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: vec![0xff, 0xfe],
        };
        assert!(response.text().is_err());
        assert!(response.is_success());
        assert_eq!(response.header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_reqwest_fetch_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string("q=dice"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let fetch = ReqwestFetch::new().unwrap();
        let request = HttpRequest::post(
            &format!("{}/search", server.uri()),
            RequestBody::Form(vec![("q".into(), "dice".into())]),
        );
        let response = fetch.fetch(request).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.text().unwrap(), "created");
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let fetch = ReqwestFetch::new().unwrap();
        let err = fetch.fetch(HttpRequest::get("not a url")).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_request_primitive_emits_load() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("feed body"))
            .mount(&server)
            .await;

        let boundary = NetworkBoundary::reqwest(5).unwrap();
        let mut events = boundary.send(HttpRequest::get(&format!("{}/feed", server.uri())));

        let mut loaded = None;
        let mut progress = 0;
        while let Some(event) = events.recv().await {
            match event {
                RequestEvent::Progress(bytes) => progress = bytes,
                RequestEvent::Load(response) => loaded = Some(response),
                RequestEvent::Error(e) => panic!("unexpected error: {}", e),
            }
        }

        let response = loaded.expect("load event");
        assert_eq!(response.body, b"feed body");
        assert_eq!(progress, response.body.len());
    }

    #[tokio::test]
    async fn test_request_primitive_reports_errors() {
        let boundary = NetworkBoundary::reqwest(5).unwrap();
        let mut events = boundary.send(HttpRequest::get("::bad::"));
        match events.recv().await {
            Some(RequestEvent::Error(message)) => assert!(message.contains("Invalid URL")),
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(events.recv().await.is_none());
    }

    #[test]
    fn test_install_returns_previous() {
        let boundary = NetworkBoundary::reqwest(5).unwrap();
        let mut swapped = boundary.clone();
        let replacement: Arc<dyn FetchPrimitive> = Arc::new(ReqwestFetch::new().unwrap());

        let previous = swapped.install_fetch(replacement.clone());
        assert!(Arc::ptr_eq(&previous, boundary.fetch_primitive()));
        assert!(Arc::ptr_eq(swapped.fetch_primitive(), &replacement));
    }
}
