use crate::dom::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Traversal error: {0}")]
    Traversal(#[from] DomError),

    #[error("No keywords configured")]
    NoKeywords,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Node {0} does not exist")]
    MissingNode(NodeId),

    #[error("Node {0} is no longer attached to the document")]
    Detached(NodeId),

    #[error("Node {0} is not an element")]
    NotElement(NodeId),

    #[error("Cannot append node {child} to {parent}")]
    InvalidAppend { parent: NodeId, child: NodeId },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request channel closed before completion")]
    ChannelClosed,

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
