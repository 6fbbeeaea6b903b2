use crate::dom::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum characters kept in a tree result excerpt
pub const EXCERPT_LEN: usize = 100;
/// Maximum characters kept in a request/response body preview
pub const PREVIEW_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Text,
    Attribute,
    LinkHref,
    Image,
    Form,
    RequestUrl,
    RequestBody,
    Response,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Text => "text",
            ResultKind::Attribute => "attribute",
            ResultKind::LinkHref => "link_href",
            ResultKind::Image => "image",
            ResultKind::Form => "form",
            ResultKind::RequestUrl => "request_url",
            ResultKind::RequestBody => "request_body",
            ResultKind::Response => "response",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ResultKind::Text => "Text content",
            ResultKind::Attribute => "Element attribute",
            ResultKind::LinkHref => "Link address",
            ResultKind::Image => "Image",
            ResultKind::Form => "Form field",
            ResultKind::RequestUrl => "Request URL",
            ResultKind::RequestBody => "Request body",
            ResultKind::Response => "Response body",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ResultKind::Text | ResultKind::Attribute => Severity::Default,
            ResultKind::LinkHref | ResultKind::Form => Severity::Warning,
            ResultKind::Image => Severity::Info,
            ResultKind::RequestUrl | ResultKind::RequestBody | ResultKind::Response => {
                Severity::Info
            }
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ResultKind::RequestUrl | ResultKind::RequestBody | ResultKind::Response
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Default,
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "default",
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }

    /// Modifier class added next to the base highlight class
    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Default => "snare-highlight--default",
            Severity::Info => "snare-highlight--info",
            Severity::Warning => "snare-highlight--warning",
        }
    }
}

/// Which network primitive observed a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Promise-style call that resolves to a response
    Fetch,
    /// Event-style request object that reports completion through events
    Request,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Fetch => "fetch",
            Channel::Request => "request",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub selector: String,
    pub xpath: String,
    pub rect: Rect,
}

impl Location {
    pub fn placeholder() -> Self {
        Self {
            selector: "unknown".to_string(),
            xpath: "unknown".to_string(),
            rect: Rect::default(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.selector == "unknown" && self.xpath == "unknown"
    }
}

/// Where a result came from. Tree results hold a non-owning node handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum Origin {
    Node {
        source: NodeId,
        location: Location,
    },
    Network {
        url: String,
        channel: Channel,
        method: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub keyword: String,
    #[serde(flatten)]
    pub origin: Origin,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ScanResult {
    pub fn from_node(
        kind: ResultKind,
        keyword: &str,
        source: NodeId,
        location: Location,
        content: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            keyword: keyword.to_string(),
            origin: Origin::Node { source, location },
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn from_network(
        kind: ResultKind,
        keyword: &str,
        url: &str,
        channel: Channel,
        method: &str,
        content: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            keyword: keyword.to_string(),
            origin: Origin::Network {
                url: url.to_string(),
                channel,
                method: method.to_string(),
            },
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn source(&self) -> Option<NodeId> {
        match self.origin {
            Origin::Node { source, .. } => Some(source),
            Origin::Network { .. } => None,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match &self.origin {
            Origin::Node { location, .. } => Some(location),
            Origin::Network { .. } => None,
        }
    }

    /// Two results are duplicates when kind, keyword and origin handle agree
    pub fn same_identity(&self, other: &ScanResult) -> bool {
        if self.kind != other.kind || self.keyword != other.keyword {
            return false;
        }
        match (&self.origin, &other.origin) {
            (Origin::Node { source: a, .. }, Origin::Node { source: b, .. }) => a == b,
            (
                Origin::Network {
                    url: url_a,
                    channel: channel_a,
                    ..
                },
                Origin::Network {
                    url: url_b,
                    channel: channel_b,
                    ..
                },
            ) => url_a == url_b && channel_a == channel_b,
            _ => false,
        }
    }

    /// Short human label for where the match was found
    pub fn where_label(&self) -> String {
        match &self.origin {
            Origin::Node { location, .. } => location.selector.clone(),
            Origin::Network {
                url,
                channel,
                method,
            } => format!("{} {} ({})", method, url, channel.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub keyword_count: usize,
    pub keywords: Vec<String>,
    pub by_type: BTreeMap<ResultKind, usize>,
}

impl Statistics {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        let mut by_type = BTreeMap::new();

        for result in results {
            if !keywords.contains(&result.keyword) {
                keywords.push(result.keyword.clone());
            }
            *by_type.entry(result.kind).or_insert(0) += 1;
        }
        keywords.sort();

        Self {
            total: results.len(),
            keyword_count: keywords.len(),
            keywords,
            by_type,
        }
    }

    pub fn count(&self, kind: ResultKind) -> usize {
        self.by_type.get(&kind).copied().unwrap_or(0)
    }
}

/// Cut `text` to at most `max` characters, appending `...` when shortened
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}
