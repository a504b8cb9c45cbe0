pub const EAN13_PREFIX: &str = "EAN-13";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeCheck {
    /// Thirteen digits with a matching check digit.
    Valid(String),
    Invalid(String),
}

impl BarcodeCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, BarcodeCheck::Valid(_))
    }

    /// Output form, `"EAN-13 <digits>"` for valid codes and the raw code otherwise.
    pub fn display_value(&self) -> String {
        match self {
            BarcodeCheck::Valid(digits) => format!("{} {}", EAN13_PREFIX, digits),
            BarcodeCheck::Invalid(raw) => raw.clone(),
        }
    }
}

/// Weighted-sum-mod-10 check over the first twelve digits.
pub fn is_valid_ean13(code: &str) -> bool {
    if code.len() != 13 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = code.bytes().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10 == digits[12]
}

/// Accepts `"EAN-13 <digits>"` or SKU text such as `"SKU 0000093468015"`.
pub fn verify_barcode(raw: &str) -> BarcodeCheck {
    let trimmed = raw.trim();
    let code = match trimmed.strip_prefix(EAN13_PREFIX) {
        Some(rest) => rest.trim(),
        None => trimmed.split_whitespace().last().unwrap_or_default(),
    };

    if is_valid_ean13(code) {
        BarcodeCheck::Valid(code.to_string())
    } else {
        BarcodeCheck::Invalid(trimmed.to_string())
    }
}
