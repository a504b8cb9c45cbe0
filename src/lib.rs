pub mod config;
pub mod extractor;
pub mod links;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod scroll;
pub mod session;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::{CrawlMode, CrawlPlan, CrawlReport, CrawlStats, Pipeline};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
