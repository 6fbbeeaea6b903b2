use colored::Colorize;

pub mod report;
pub mod session;
pub mod storage;

pub use report::ReportFormat;
pub use session::{ScanResponse, Session, fetch_document};
pub use storage::{MemoryStorage, PageRecord, SqliteStorage, Storage, StorageError, origin_key};

const BANNER: &str = r#"
   _____ _   _____    ____  ______
  / ___// | / /   |  / __ \/ ____/
  \__ \/  |/ / /| | / /_/ / __/
 ___/ / /|  / ___ |/ _, _/ /___
/____/_/ |_/_/  |_/_/ |_/_____/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_red());
    println!(
        "  {} {}\n",
        "keyword tripwires for HTML and HTTP".dimmed(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
