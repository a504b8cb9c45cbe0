use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

use crate::models::SuspectPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    pub validation: ValidationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Prefix every product and listing URL lives under; relative links resolve against it.
    pub base_url: String,
    pub categories: Vec<String>,
    pub demo_categories: Vec<String>,
    pub demo_sub_category_limit: usize,
    pub demo_product_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub category_region: String,
    pub category_link: String,
    pub product_link: String,
    pub product_name: String,
    pub product_quantity: Option<String>,
    pub product_images: String,
    pub product_sku: String,
    pub product_price: String,
    pub product_labels: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            category_region: "div .plp-carousels div .plp-carousel".to_string(),
            category_link: ".plp-carousel__link".to_string(),
            product_link: ".product-item-inner-wrap".to_string(),
            product_name: ".product-Details-name .product-tile__name".to_string(),
            product_quantity: None,
            product_images: ".img-zoom-container img".to_string(),
            product_sku: ".product-Details-sku".to_string(),
            product_price: ".product-Details-current-price".to_string(),
            product_labels: ".product-Details-common-description img:not(.product-Details-ui.image)"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub initial_wait_ms: u64,
    pub settle_ms: u64,
    pub step_px: i64,
    pub deadline_ms: u64,
    pub stable_reads: usize,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            initial_wait_ms: 3_000,
            settle_ms: 2_000,
            step_px: 900,
            deadline_ms: 300_000,
            stable_reads: 3,
        }
    }
}

impl ScrollConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub pool_size: usize,
    pub user_agent: String,
    pub navigation_timeout_ms: u64,
    pub element_timeout_ms: u64,
    pub category_settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            pool_size: 2,
            user_agent: "CatalogCrawler/0.1".to_string(),
            navigation_timeout_ms: 30_000,
            element_timeout_ms: 30_000,
            category_settle_ms: 5_000,
        }
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_concurrent: usize,
    pub retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub cache_ttl_secs: u64,
    pub task_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            retry_attempts: 1,
            retry_base_delay_ms: 1_000,
            cache_ttl_secs: 2 * 24 * 60 * 60,
            task_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub suspect_policy: SuspectPolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    pub file_name: String,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "data".to_string(),
            file_name: "products.json".to_string(),
            format: OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "catalog_crawler=info".to_string(),
            directory: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "CRAWLER_"
            .add_source(Environment::with_prefix("CRAWLER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate site configuration
        if Url::parse(&self.site.base_url).is_err() {
            return Err(ConfigError::Message("Invalid site base_url format".into()));
        }

        if self.site.categories.is_empty() {
            return Err(ConfigError::Message("At least one category URL is required".into()));
        }

        if self.site.demo_sub_category_limit == 0 || self.site.demo_product_limit == 0 {
            return Err(ConfigError::Message("Demo limits must be greater than 0".into()));
        }

        // Validate scroll configuration
        if self.scroll.stable_reads < 2 {
            return Err(ConfigError::Message("Scroll stable_reads must be at least 2".into()));
        }

        if self.scroll.deadline_ms == 0 {
            return Err(ConfigError::Message("Scroll deadline_ms must be greater than 0".into()));
        }

        if self.scroll.step_px <= 0 {
            return Err(ConfigError::Message("Scroll step_px must be greater than 0".into()));
        }

        // Validate browser configuration
        if self.browser.pool_size == 0 {
            return Err(ConfigError::Message("Browser pool_size must be greater than 0".into()));
        }

        // Validate orchestrator configuration
        if self.orchestrator.max_concurrent == 0 {
            return Err(ConfigError::Message(
                "Orchestrator max_concurrent must be greater than 0".into(),
            ));
        }

        if self.orchestrator.task_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Orchestrator task_timeout_secs must be greater than 0".into(),
            ));
        }

        // Validate output configuration
        if self.output.file_name.trim().is_empty() {
            return Err(ConfigError::Message("Output file_name must not be empty".into()));
        }

        Ok(())
    }
}
