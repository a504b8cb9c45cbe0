use url::Url;

use crate::Result;

/// Resolves hrefs found on catalog pages to canonical absolute URLs.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    base: Url,
}

impl LinkResolver {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base_url.trim_end_matches('/'))?,
        })
    }

    /// Absolute hrefs are kept; relative ones are placed under the site prefix, so
    /// `/fruit` becomes `<base>/fruit` rather than losing the base path.
    pub fn resolve(&self, href: &str) -> Result<Url> {
        let href = href.trim();
        let mut url = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base_path = self.base.path().trim_end_matches('/');
                let path = if href.starts_with('/') && !href.starts_with(&format!("{}/", base_path)) {
                    format!("{}{}", base_path, href)
                } else {
                    href.to_string()
                };
                let mut root = self.base.clone();
                root.set_path(&format!("{}/", base_path));
                root.join(&path)?
            }
            Err(e) => return Err(e.into()),
        };
        url.set_fragment(None);
        Ok(url)
    }
}
