use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

use crate::models::ValidationIssue;

/// Turns displayed price text ("฿1,299.00", "51.00 THB") into a plain number.
///
/// Once currency markers and whitespace are gone, the whole remaining text must be one
/// amount; a number buried in other text is never taken as the price.
pub struct PriceParser {
    currency_regex: Regex,
    amount_regex: Regex,
}

impl PriceParser {
    pub fn new() -> Self {
        PriceParser {
            currency_regex: Regex::new(r"(?i)฿|\bTHB\b|\bbaht\b").unwrap(),
            amount_regex: Regex::new(r"^(-)?(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)$").unwrap(),
        }
    }

    /// `Ok(None)` for blank text, an issue for text that holds no usable price.
    pub fn parse(&self, text: &str) -> Result<Option<f64>, ValidationIssue> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let unparseable = || ValidationIssue::UnparseablePrice {
            raw: trimmed.to_string(),
        };

        let compact: String = self
            .currency_regex
            .replace_all(trimmed, "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let captures = self.amount_regex.captures(&compact).ok_or_else(unparseable)?;

        if captures.get(1).is_some() {
            return Err(ValidationIssue::NegativePrice { raw: trimmed.to_string() });
        }

        let amount = captures
            .get(2)
            .map(|m| m.as_str().replace(',', ""))
            .and_then(|s| Decimal::from_str(&s).ok())
            .and_then(|d| d.to_f64())
            .ok_or_else(unparseable)?;

        Ok(Some(amount))
    }
}

impl Default for PriceParser {
    fn default() -> Self {
        Self::new()
    }
}
