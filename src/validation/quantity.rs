use regex::Regex;

/// A pack size such as "100g" split into its number and unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub raw: String,
    pub magnitude: Option<f64>,
    pub unit: Option<String>,
}

impl Quantity {
    /// Compact form ("100 g" becomes "100g"); unparsed text is returned verbatim.
    pub fn normalized(&self) -> String {
        match (self.magnitude, &self.unit) {
            (Some(magnitude), Some(unit)) => format!("{}{}", magnitude, unit),
            _ => self.raw.clone(),
        }
    }
}

pub struct QuantityParser {
    quantity_regex: Regex,
    title_suffix_regex: Regex,
    title_tag_regex: Regex,
}

impl QuantityParser {
    pub fn new() -> Self {
        QuantityParser {
            quantity_regex: Regex::new(r"^(\d+(?:\.\d+)?)\s*(\p{L}+)\.?$").unwrap(),
            // Titles end with the pack size, e.g. "Tops Fresh Milk 1000ml"
            title_suffix_regex: Regex::new(r"\s\d+[a-zA-Z]+\.?$").unwrap(),
            title_tag_regex: Regex::new(r"^\([^)]*\)\s*").unwrap(),
        }
    }

    pub fn parse(&self, text: &str) -> Quantity {
        let raw = text.trim().to_string();
        match self.quantity_regex.captures(&raw) {
            Some(captures) => Quantity {
                magnitude: captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()),
                unit: captures.get(2).map(|m| m.as_str().to_string()),
                raw,
            },
            None => Quantity {
                raw,
                magnitude: None,
                unit: None,
            },
        }
    }

    /// Splits a product title into the bare name and its trailing pack size, if any.
    ///
    /// A leading promotional tag in parentheses is dropped from the name.
    pub fn split_title(&self, title: &str) -> (String, Option<String>) {
        let title = title.trim();
        let (name, quantity) = if self.title_suffix_regex.is_match(title) {
            let mut words: Vec<&str> = title.split_whitespace().collect();
            let token = words.pop().unwrap_or_default();
            let quantity: String = token.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            (words.join(" "), Some(quantity))
        } else {
            (title.to_string(), None)
        };

        let name = self.title_tag_regex.replace(&name, "").into_owned();
        (name, quantity)
    }
}

impl Default for QuantityParser {
    fn default() -> Self {
        Self::new()
    }
}
