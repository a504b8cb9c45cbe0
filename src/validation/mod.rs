//! Turns raw product-page fields into output records.
//!
//! Validation never rewrites a bad value into a good-looking one: a malformed barcode or a
//! price that cannot be read is reported as a [`ValidationIssue`] on the record, and the
//! caller decides (see [`SuspectPolicy`](crate::models::SuspectPolicy)) whether such records
//! are kept or dropped. Only a record without a name cannot be built at all.

pub mod barcode;
pub mod price;
pub mod quantity;

pub use barcode::{BarcodeCheck, is_valid_ean13, verify_barcode};
pub use price::PriceParser;
pub use quantity::{Quantity, QuantityParser};

use thiserror::Error;

use crate::models::{ProductRecord, RawProductFields, ValidationIssue};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("product page at {store_url} has no name")]
    MissingName { store_url: String },
}

pub struct RecordValidator {
    price: PriceParser,
    quantity: QuantityParser,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self {
            price: PriceParser::new(),
            quantity: QuantityParser::new(),
        }
    }

    pub fn validate(
        &self,
        raw: RawProductFields,
        store_url: &str,
    ) -> Result<ProductRecord, ValidationFailure> {
        let title = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ValidationFailure::MissingName {
                store_url: store_url.to_string(),
            })?;

        let mut flags = Vec::new();

        let (name, title_quantity) = self.quantity.split_title(title);
        let quantity = raw
            .quantity
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(str::to_string)
            .or(title_quantity)
            .map(|q| self.quantity.parse(&q).normalized());

        let price = match raw.price.as_deref() {
            Some(text) => self.price.parse(text).unwrap_or_else(|issue| {
                flags.push(issue);
                None
            }),
            None => None,
        };

        let barcode = raw
            .barcode
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| {
                let check = verify_barcode(text);
                if let BarcodeCheck::Invalid(raw) = &check {
                    flags.push(ValidationIssue::InvalidBarcode { raw: raw.clone() });
                }
                check.display_value()
            });

        let images = raw
            .images
            .unwrap_or_default()
            .into_iter()
            .map(|src| src.trim().to_string())
            .filter(|src| !src.is_empty())
            .collect();

        let labels = raw
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();

        Ok(ProductRecord {
            name,
            quantity,
            price,
            images,
            barcode,
            labels,
            store_url: store_url.to_string(),
            flags,
        })
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}
