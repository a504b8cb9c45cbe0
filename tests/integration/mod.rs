// Integration tests for the catalog crawler
// A fake in-memory storefront stands in for the browser so whole runs can be driven end to end.

pub mod stage_tests;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use catalog_crawler::{
    AppConfig, AppError, Result,
    config::{
        BrowserConfig, LoggingConfig, OrchestratorConfig, OutputConfig, ScrollConfig, SelectorConfig,
        SiteConfig, ValidationConfig,
    },
    models::SuspectPolicy,
    session::{ElementHandle, PageSession, SessionFactory, WaitOutcome},
};

pub const BASE: &str = "https://shop.test/en";

/// Checksum-valid EAN-13 codes for fake products.
pub const BARCODES: [&str; 11] = [
    "8850000000010",
    "8850000000027",
    "8850000000034",
    "8850000000041",
    "8850000000058",
    "8850000000065",
    "8850000000072",
    "8850000000089",
    "8850000000096",
    "8850000000102",
    "8850000000119",
];

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// Test configuration for integration tests
pub fn test_config(policy: SuspectPolicy) -> AppConfig {
    AppConfig {
        site: SiteConfig {
            base_url: BASE.to_string(),
            categories: vec![url("/snacks")],
            demo_categories: vec![url("/snacks")],
            demo_sub_category_limit: 1,
            demo_product_limit: 2,
        },
        selectors: SelectorConfig::default(),
        scroll: ScrollConfig {
            initial_wait_ms: 0,
            settle_ms: 100,
            step_px: 900,
            deadline_ms: 60_000,
            stable_reads: 3,
        },
        browser: BrowserConfig {
            element_timeout_ms: 1_000,
            category_settle_ms: 0,
            ..BrowserConfig::default()
        },
        orchestrator: OrchestratorConfig {
            max_concurrent: 3,
            retry_attempts: 1,
            retry_base_delay_ms: 1,
            cache_ttl_secs: 60,
            task_timeout_secs: 30,
        },
        validation: ValidationConfig {
            suspect_policy: policy,
        },
        output: OutputConfig::default(),
        logging: LoggingConfig::default(),
    }
}

#[derive(Debug, Clone)]
pub struct FakeProduct {
    pub name: String,
    pub price: Option<String>,
    pub sku: String,
    pub images: Vec<String>,
    pub labels: Vec<String>,
}

impl FakeProduct {
    pub fn valid(name: &str, price: &str, barcode_index: usize) -> Self {
        Self {
            name: name.to_string(),
            price: Some(price.to_string()),
            sku: format!("SKU {}", BARCODES[barcode_index]),
            images: vec![format!("https://assets.shop.test/{}.jpg", barcode_index)],
            labels: vec![],
        }
    }

    pub fn with_sku(mut self, sku: &str) -> Self {
        self.sku = sku.to_string();
        self
    }

    pub fn without_price(mut self) -> Self {
        self.price = None;
        self
    }
}

#[derive(Debug, Clone)]
pub enum FakeListing {
    /// Links that become visible after each scroll; the last batch ends the list.
    Batches(Vec<Vec<String>>),
    /// One more link per scroll, forever.
    Endless(String),
}

#[derive(Default)]
pub struct Catalog {
    selectors: SelectorConfig,
    categories: HashMap<String, Vec<String>>,
    listings: HashMap<String, FakeListing>,
    products: HashMap<String, FakeProduct>,
    unreachable: HashSet<String>,
    flaky: Mutex<HashSet<String>>,
    hanging: HashSet<String>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

/// Builds a storefront keyed by absolute URL; links on its pages are site-relative.
#[derive(Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, path: &str, sub_categories: &[&str]) -> Self {
        let hrefs = sub_categories.iter().map(|s| s.to_string()).collect();
        self.catalog.categories.insert(url(path), hrefs);
        self
    }

    pub fn listing(mut self, path: &str, batches: &[&[&str]]) -> Self {
        let batches = batches
            .iter()
            .map(|batch| batch.iter().map(|s| s.to_string()).collect())
            .collect();
        self.catalog
            .listings
            .insert(url(path), FakeListing::Batches(batches));
        self
    }

    pub fn endless_listing(mut self, path: &str, link_prefix: &str) -> Self {
        self.catalog
            .listings
            .insert(url(path), FakeListing::Endless(link_prefix.to_string()));
        self
    }

    pub fn product(mut self, path: &str, product: FakeProduct) -> Self {
        self.catalog.products.insert(url(path), product);
        self
    }

    pub fn unreachable(mut self, path: &str) -> Self {
        self.catalog.unreachable.insert(url(path));
        self
    }

    /// The first navigation to `path` fails with a network error.
    pub fn flaky(self, path: &str) -> Self {
        self.catalog.flaky.lock().unwrap().insert(url(path));
        self
    }

    /// Waiting for any element on `path` never returns.
    pub fn hanging(mut self, path: &str) -> Self {
        self.catalog.hanging.insert(url(path));
        self
    }

    pub fn build(self) -> FakeCatalog {
        FakeCatalog(Arc::new(self.catalog))
    }
}

/// The snacks category: two listings growing to 5 and 3 products over three scrolls.
pub fn snacks_catalog() -> CatalogBuilder {
    CatalogBuilder::new()
        .category("/snacks", &["/snacks/chips", "/snacks/nuts"])
        .listing(
            "/snacks/chips",
            &[&["/chips-a", "/chips-b"], &["/chips-c", "/chips-d"], &["/chips-e"]],
        )
        .listing("/snacks/nuts", &[&["/nuts-a"], &["/nuts-b"], &["/nuts-c"]])
        .product("/chips-a", FakeProduct::valid("Chips A 50g", "฿25.00", 0))
        .product("/chips-b", FakeProduct::valid("Chips B 75g", "฿32.00", 1))
        .product("/chips-c", FakeProduct::valid("(Promo) Chips C 50g", "฿19.50", 2))
        .product("/chips-d", FakeProduct::valid("Chips D", "฿1,250.00", 3))
        .product("/chips-e", FakeProduct::valid("Chips E 150g", "฿45.00", 4))
        .product("/nuts-a", FakeProduct::valid("Cashew 200g", "฿120.00", 5))
        .product("/nuts-b", FakeProduct::valid("Almond 200g", "฿135.00", 6))
        .product("/nuts-c", FakeProduct::valid("Peanut 500g", "฿60.00", 7))
}

#[derive(Clone)]
pub struct FakeCatalog(Arc<Catalog>);

impl FakeCatalog {
    pub fn sessions_opened(&self) -> usize {
        self.0.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.0.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn navigations_to(&self, path: &str) -> usize {
        let target = url(path);
        self.0
            .navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|visited| **visited == target)
            .count()
    }

    /// A session not handed out through the factory, for driving single stages.
    pub fn session(&self) -> FakeSession {
        FakeSession::new(Arc::clone(&self.0))
    }
}

#[async_trait]
impl SessionFactory for FakeCatalog {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        self.0.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.session()))
    }
}

pub struct FakeSession {
    catalog: Arc<Catalog>,
    current: Mutex<Option<String>>,
    scrolls: AtomicUsize,
}

impl FakeSession {
    fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            current: Mutex::new(None),
            scrolls: AtomicUsize::new(0),
        }
    }

    fn current(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    fn links(hrefs: impl IntoIterator<Item = String>) -> Vec<ElementHandle> {
        hrefs
            .into_iter()
            .map(|href| ElementHandle::default().with_attribute("href", href))
            .collect()
    }

    fn visible_listing(&self, listing: &FakeListing) -> Vec<String> {
        let scrolls = self.scrolls.load(Ordering::SeqCst);
        match listing {
            FakeListing::Batches(batches) => batches
                .iter()
                .take(scrolls + 1)
                .flatten()
                .cloned()
                .collect(),
            FakeListing::Endless(prefix) => (0..=scrolls).map(|i| format!("{}-{}", prefix, i)).collect(),
        }
    }

    fn product_elements(&self, product: &FakeProduct, selector: &str) -> Vec<ElementHandle> {
        let selectors = &self.catalog.selectors;
        if selector == selectors.product_name {
            vec![ElementHandle::with_text(&product.name)]
        } else if selector == selectors.product_price {
            product.price.iter().map(ElementHandle::with_text).collect()
        } else if selector == selectors.product_sku {
            vec![ElementHandle::with_text(&product.sku)]
        } else if selector == selectors.product_images {
            product
                .images
                .iter()
                .map(|src| ElementHandle::default().with_attribute("src", src))
                .collect()
        } else if selector == selectors.product_labels {
            product
                .labels
                .iter()
                .map(|alt| ElementHandle::default().with_attribute("alt", alt))
                .collect()
        } else {
            vec![]
        }
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.catalog.navigations.lock().unwrap().push(url.to_string());

        let flaked = self.catalog.flaky.lock().unwrap().remove(url);
        if flaked || self.catalog.unreachable.contains(url) {
            return Err(AppError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }

        *self.current.lock().unwrap() = Some(url.to_string());
        self.scrolls.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<WaitOutcome> {
        let Some(current) = self.current() else {
            return Ok(WaitOutcome::TimedOut);
        };
        if self.catalog.hanging.contains(&current) {
            std::future::pending::<()>().await;
        }
        let selectors = &self.catalog.selectors;

        let present = (self.catalog.categories.contains_key(&current) && selector == selectors.category_region)
            || self
                .catalog
                .products
                .get(&current)
                .is_some_and(|product| selector == selectors.product_price && product.price.is_some());

        Ok(if present {
            WaitOutcome::Present
        } else {
            WaitOutcome::TimedOut
        })
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let Some(current) = self.current() else {
            return Ok(vec![]);
        };
        let selectors = &self.catalog.selectors;

        if let Some(hrefs) = self.catalog.categories.get(&current) {
            if selector == selectors.category_link {
                return Ok(Self::links(hrefs.iter().cloned()));
            }
        }
        if let Some(listing) = self.catalog.listings.get(&current) {
            if selector == selectors.product_link {
                return Ok(Self::links(self.visible_listing(listing)));
            }
        }
        if let Some(product) = self.catalog.products.get(&current) {
            return Ok(self.product_elements(product, selector));
        }
        Ok(vec![])
    }

    async fn scroll_by(&self, _amount: i64) -> Result<()> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&self) -> Result<()> {
        self.catalog.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
