use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The rendering engine could not be started or has gone away.
    #[error("Browser unavailable: {0}")]
    Browser(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Element not found within wait budget: {selector}")]
    ElementTimeout { selector: String },

    #[error("Page session error: {0}")]
    Session(String),

    #[error("Task timed out: {key}")]
    TaskTimeout { key: String },

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("No entry URL could be crawled: {0}")]
    EntryUnreachable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Navigation { .. }
                | AppError::ElementTimeout { .. }
                | AppError::Session(_)
                | AppError::TaskTimeout { .. }
        )
    }

    /// Failures that abort the whole run instead of a single unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Browser(_) | AppError::EntryUnreachable(_) | AppError::Cancelled
        )
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
