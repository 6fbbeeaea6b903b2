// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{ScanInput, ScanRequest, init_config, run_scan, scan_input, split_keywords};
