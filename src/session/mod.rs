//! The rendered-page boundary.
//!
//! Everything the crawl needs from a browser goes through [`PageSession`]: navigate, wait
//! for an element, query elements, scroll, and sleep. Element handles are owned snapshots,
//! so reading text or attributes never goes back to the browser.

pub mod chrome;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::Result;

pub use chrome::{BrowserPool, ChromeSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Present,
    TimedOut,
}

/// One element matched by a structural selector, captured at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementHandle {
    /// `None` when the element has no text nodes at all.
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl ElementHandle {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A controllable rendered page. One session drives one URL at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<WaitOutcome>;

    /// Matches in document order.
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    fn read_text(&self, element: &ElementHandle) -> Option<String> {
        element.text.clone()
    }

    fn read_attribute(&self, element: &ElementHandle, name: &str) -> Option<String> {
        element.attributes.get(name).cloned()
    }

    async fn scroll_by(&self, amount: i64) -> Result<()>;

    async fn wait(&self, duration: Duration);

    async fn close(&self) -> Result<()>;
}

/// Hands out fresh page sessions, one per unit of crawl work.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}
