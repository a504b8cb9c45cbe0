use serde::{Deserialize, Serialize};
use std::fmt;

/// Field contents exactly as read from a rendered product page.
///
/// `None` means the selector matched nothing on the page; `Some("")` means the element
/// exists but is empty. List fields follow the same rule: `None` is "no such element",
/// `Some(vec![])` is "element present, nothing in it".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProductFields {
    pub name: Option<String>,
    /// Dedicated pack-size element, on pages that have one.
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub images: Option<Vec<String>>,
    pub barcode: Option<String>,
    pub labels: Option<Vec<String>>,
}

/// A validated product, as written to the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub quantity: Option<String>,
    pub price: Option<f64>,
    pub images: Vec<String>,
    pub barcode: Option<String>,
    pub labels: Vec<String>,
    pub store_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ValidationIssue>,
}

impl ProductRecord {
    pub fn is_suspect(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// A structured validation failure attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// The code is not thirteen digits or its check digit does not match.
    InvalidBarcode { raw: String },
    /// Price text was present but held no number.
    UnparseablePrice { raw: String },
    NegativePrice { raw: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::InvalidBarcode { raw } => write!(f, "invalid barcode '{}'", raw),
            ValidationIssue::UnparseablePrice { raw } => write!(f, "unparseable price '{}'", raw),
            ValidationIssue::NegativePrice { raw } => write!(f, "negative price '{}'", raw),
        }
    }
}
