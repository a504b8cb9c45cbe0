use serde::{Deserialize, Serialize};
use std::fmt;

pub mod product;

// Re-exports for convenience
pub use product::*;

/// A top-level catalog section the crawl starts from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryNode {
    pub url: String,
    pub label: String,
}

impl CategoryNode {
    /// Builds a node from a URL, using its last path segment as the label.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let label = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches(".html")
            .to_string();
        Self { url, label }
    }
}

/// A sub-category listing page discovered on a category page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SubCategoryRef(pub String);

/// A product page discovered on a sub-category listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProductRef(pub String);

impl SubCategoryRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ProductRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubCategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do with a record that carries validation issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuspectPolicy {
    /// Leave suspect records out of the output.
    Drop,
    /// Keep suspect records, with their issues attached.
    Flag,
}
