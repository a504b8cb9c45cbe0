use async_trait::async_trait;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{Html, Selector};
use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ElementHandle, PageSession, SessionFactory, WaitOutcome};
use crate::config::BrowserConfig;
use crate::{AppError, Result};

/// Headless Chrome instances handing out tabs round-robin.
pub struct BrowserPool {
    config: BrowserConfig,
    browsers: Vec<Browser>,
    current_index: AtomicUsize,
}

impl BrowserPool {
    pub fn new(config: BrowserConfig) -> Result<Self> {
        let mut browsers = Vec::new();

        for _ in 0..config.pool_size {
            let mut launch_options = LaunchOptions::default_builder()
                .headless(config.headless)
                .sandbox(false) // Often needed in containerized environments
                .idle_browser_timeout(Duration::from_secs(600))
                .args(vec![
                    OsStr::new("--no-sandbox"),
                    OsStr::new("--disable-dev-shm-usage"),
                    OsStr::new("--disable-gpu"),
                    OsStr::new("--disable-extensions"),
                    OsStr::new("--disable-background-timer-throttling"),
                    OsStr::new("--disable-backgrounding-occluded-windows"),
                    OsStr::new("--disable-renderer-backgrounding"),
                ])
                .build()
                .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

            if let Some(chrome_path) = &config.chrome_path {
                launch_options.path = Some(std::path::PathBuf::from(chrome_path));
            }

            let browser = Browser::new(launch_options)
                .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;

            browsers.push(browser);
        }

        tracing::info!("Launched {} headless browser(s)", browsers.len());

        Ok(Self {
            config,
            browsers,
            current_index: AtomicUsize::new(0),
        })
    }

    fn next_browser(&self) -> &Browser {
        let index = self.current_index.fetch_add(1, Ordering::Relaxed) % self.browsers.len();
        &self.browsers[index]
    }
}

#[async_trait]
impl SessionFactory for BrowserPool {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let tab = self
            .next_browser()
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;

        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| AppError::Session(format!("Failed to set user agent: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(self.config.navigation_timeout_ms));

        Ok(Box::new(ChromeSession { tab }))
    }
}

/// One Chrome tab. DevTools calls block, so they run on the blocking pool.
pub struct ChromeSession {
    tab: Arc<Tab>,
}

impl ChromeSession {
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(tab))
            .await
            .map_err(|e| AppError::Internal(format!("Browser task panicked: {}", e)))?
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| AppError::Navigation {
                    url: url.clone(),
                    message: e.to_string(),
                })
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<WaitOutcome> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            match tab.wait_for_element_with_custom_timeout(&selector, timeout) {
                Ok(_) => Ok(WaitOutcome::Present),
                Err(e) => wait_outcome(&selector, e),
            }
        })
        .await
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let html_content = self
            .blocking(|tab| {
                tab.get_content()
                    .map_err(|e| AppError::Session(format!("Failed to get page content: {}", e)))
            })
            .await?;

        let css_selector = Selector::parse(selector)
            .map_err(|e| AppError::Session(format!("Invalid CSS selector '{}': {:?}", selector, e)))?;
        Ok(snapshot_elements(&html_content, &css_selector))
    }

    async fn scroll_by(&self, amount: i64) -> Result<()> {
        let script = format!("window.scrollBy(0, {})", amount);
        self.blocking(move |tab| {
            tab.evaluate(&script, false)
                .map(|_| ())
                .map_err(|e| AppError::Session(format!("Scroll failed: {}", e)))
        })
        .await
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&self) -> Result<()> {
        self.blocking(|tab| {
            tab.close(true)
                .map(|_| ())
                .map_err(|e| AppError::Session(format!("Failed to close tab: {}", e)))
        })
        .await
    }
}

/// Only an expired wait counts as "not there"; a dropped connection or a bad selector is a session failure.
fn wait_outcome(selector: &str, error: anyhow::Error) -> Result<WaitOutcome> {
    if error.is::<Timeout>() || error.is::<NoElementFound>() {
        tracing::debug!("Wait for '{}' ended without a match: {}", selector, error);
        return Ok(WaitOutcome::TimedOut);
    }
    Err(AppError::Session(format!("Waiting for '{}' failed: {}", selector, error)))
}

/// Captures text and attributes of every element matching `selector`, in document order.
pub(crate) fn snapshot_elements(html_content: &str, selector: &Selector) -> Vec<ElementHandle> {
    let document = Html::parse_document(html_content);

    document
        .select(selector)
        .map(|element| {
            let mut text_nodes = element.text().peekable();
            let text = if text_nodes.peek().is_none() {
                None
            } else {
                Some(text_nodes.collect::<Vec<_>>().join(" ").trim().to_string())
            };

            ElementHandle {
                text,
                attributes: element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            }
        })
        .collect()
}
