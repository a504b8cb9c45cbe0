use crate::Result;
use crate::config::SelectorConfig;
use crate::models::RawProductFields;
use crate::session::PageSession;

/// Reads product attributes off a rendered product page.
pub struct FieldExtractor {
    selectors: SelectorConfig,
}

impl FieldExtractor {
    pub fn new(selectors: SelectorConfig) -> Self {
        Self { selectors }
    }

    pub async fn extract(&self, session: &dyn PageSession) -> Result<RawProductFields> {
        let quantity = match &self.selectors.product_quantity {
            Some(selector) => self.first_text(session, selector).await?,
            None => None,
        };

        Ok(RawProductFields {
            name: self.first_text(session, &self.selectors.product_name).await?,
            quantity,
            price: self.first_text(session, &self.selectors.product_price).await?,
            images: self
                .all_attributes(session, &self.selectors.product_images, "src")
                .await?,
            barcode: self.first_text(session, &self.selectors.product_sku).await?,
            labels: self
                .all_attributes(session, &self.selectors.product_labels, "alt")
                .await?,
        })
    }

    /// Text of the first match; an element without text reads as empty, no element as `None`.
    async fn first_text(&self, session: &dyn PageSession, selector: &str) -> Result<Option<String>> {
        let elements = session.query_selector_all(selector).await?;
        Ok(elements
            .first()
            .map(|element| session.read_text(element).unwrap_or_default()))
    }

    async fn all_attributes(
        &self,
        session: &dyn PageSession,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<Vec<String>>> {
        let elements = session.query_selector_all(selector).await?;
        if elements.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            elements
                .iter()
                .filter_map(|element| session.read_attribute(element, attribute))
                .collect(),
        ))
    }
}
