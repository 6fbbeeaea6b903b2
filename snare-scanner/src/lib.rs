pub mod annotator;
pub mod dom;
pub mod error;
pub mod intercept;
pub mod keywords;
pub mod matcher;
pub mod result;
pub mod scanner;
pub mod store;
pub mod transport;

pub use annotator::{Annotator, AnnotatorState, RenderSummary};
pub use dom::{Document, NodeId};
pub use error::{DomError, ScanError, TransportError};
pub use intercept::TrafficInterceptor;
pub use keywords::KeywordSet;
pub use matcher::{MatchMode, matches};
pub use result::{Channel, Location, Origin, ResultKind, ScanResult, Severity, Statistics};
pub use scanner::{ScanOptions, ScanState, TreeScanner};
pub use store::ResultStore;
pub use transport::{
    FetchPrimitive, HttpRequest, HttpResponse, NetworkBoundary, RequestBody, RequestEvent,
    RequestPrimitive,
};
