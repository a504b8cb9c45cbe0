//! The three-stage crawl: category pages → sub-category listings → product pages.
//!
//! [`CrawlSteps`] holds the per-URL work as plain async functions over a [`PageSession`];
//! they know nothing about retries or caching. [`Pipeline`] sequences them across the
//! category tree, hands every unit of work to an [`Orchestrator`], deduplicates product URLs
//! for the run and applies the suspect-record policy.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, SelectorConfig, SiteConfig};
use crate::extractor::FieldExtractor;
use crate::links::LinkResolver;
use crate::models::{CategoryNode, ProductRecord, ProductRef, SubCategoryRef, SuspectPolicy};
use crate::orchestrator::{Orchestrator, Stage, TaskKey};
use crate::scroll::{ScrollEngine, ScrollSettings};
use crate::session::{PageSession, SessionFactory, WaitOutcome};
use crate::validation::RecordValidator;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// One category, one listing, a handful of products.
    Demo,
    /// Every configured category.
    Full,
}

/// Which categories to crawl and how much of each.
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub mode: CrawlMode,
    pub categories: Vec<CategoryNode>,
    pub sub_category_limit: Option<usize>,
    pub product_limit: Option<usize>,
}

impl CrawlPlan {
    pub fn for_mode(mode: CrawlMode, site: &SiteConfig) -> Self {
        match mode {
            CrawlMode::Full => Self {
                mode,
                categories: site.categories.iter().map(CategoryNode::from_url).collect(),
                sub_category_limit: None,
                product_limit: None,
            },
            CrawlMode::Demo => {
                let urls = if site.demo_categories.is_empty() {
                    &site.categories[..site.categories.len().min(1)]
                } else {
                    &site.demo_categories[..]
                };
                Self {
                    mode,
                    categories: urls.iter().map(CategoryNode::from_url).collect(),
                    sub_category_limit: Some(site.demo_sub_category_limit),
                    product_limit: Some(site.demo_product_limit),
                }
            }
        }
    }
}

/// Product links found on one listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub products: Vec<ProductRef>,
    /// The scroll deadline passed before the item count settled.
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtractOutcome {
    Extracted(ProductRecord),
    Rejected { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub categories: usize,
    pub categories_failed: usize,
    pub sub_categories: usize,
    pub listings_failed: usize,
    pub partial_listings: usize,
    pub product_urls: usize,
    pub duplicates_skipped: usize,
    pub accepted: usize,
    pub flagged: usize,
    pub dropped: usize,
    pub rejected: usize,
    pub products_failed: usize,
    pub cancelled: bool,
}

impl CrawlStats {
    /// Product pages that produced no output record.
    pub fn skipped(&self) -> usize {
        self.dropped + self.rejected + self.products_failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub mode: CrawlMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<ProductRecord>,
    pub stats: CrawlStats,
}

/// Product URLs already claimed in this run.
#[derive(Debug, Clone, Default)]
pub struct SeenUrls {
    urls: Arc<Mutex<HashSet<String>>>,
}

impl SeenUrls {
    /// `true` if the URL had not been claimed before.
    pub async fn insert(&self, url: &str) -> bool {
        let mut urls = self.urls.lock().await;
        urls.insert(url.to_string())
    }

    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }
}

/// Per-URL crawl work, independent of any orchestration.
pub struct CrawlSteps {
    selectors: SelectorConfig,
    links: LinkResolver,
    scroll: ScrollEngine,
    extractor: FieldExtractor,
    validator: RecordValidator,
    element_timeout: Duration,
    category_settle: Duration,
    initial_listing_wait: Duration,
}

impl CrawlSteps {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            selectors: config.selectors.clone(),
            links: LinkResolver::new(&config.site.base_url)?,
            scroll: ScrollEngine::new(ScrollSettings::from(&config.scroll)),
            extractor: FieldExtractor::new(config.selectors.clone()),
            validator: RecordValidator::new(),
            element_timeout: config.browser.element_timeout(),
            category_settle: Duration::from_millis(config.browser.category_settle_ms),
            initial_listing_wait: Duration::from_millis(config.scroll.initial_wait_ms),
        })
    }

    pub fn links(&self) -> &LinkResolver {
        &self.links
    }

    /// Stage 1: sub-category listing URLs linked from a category page.
    pub async fn find_category_pages(
        &self,
        session: &dyn PageSession,
        url: &str,
    ) -> Result<Vec<SubCategoryRef>> {
        let url = self.links.resolve(url)?;
        info!("Finding sub-category pages on {}", url);

        session.navigate(url.as_str()).await?;
        self.require(session, &self.selectors.category_region).await?;
        session.wait(self.category_settle).await;

        let elements = session.query_selector_all(&self.selectors.category_link).await?;
        let hrefs = elements
            .iter()
            .filter_map(|element| session.read_attribute(element, "href"));

        Ok(self.resolve_unique(hrefs).into_iter().map(SubCategoryRef).collect())
    }

    /// Stage 2: product URLs on a listing page, after scrolling it to convergence.
    pub async fn find_product_pages(&self, session: &dyn PageSession, url: &str) -> Result<Listing> {
        let url = self.links.resolve(url)?;
        info!("Scraping product links from {}", url);

        session.navigate(url.as_str()).await?;
        session.wait(self.initial_listing_wait).await;

        let (hrefs, summary) = self
            .scroll
            .collect_links(session, &self.selectors.product_link)
            .await?;

        if summary.is_partial() {
            warn!(
                "Listing {} hit the scroll deadline after {:?} with {} products",
                url, summary.elapsed, summary.final_count
            );
        } else {
            debug!(
                "Listing {} settled at {} products after {} scroll(s)",
                url, summary.final_count, summary.scrolls
            );
        }

        Ok(Listing {
            products: self.resolve_unique(hrefs).into_iter().map(ProductRef).collect(),
            partial: summary.is_partial(),
        })
    }

    /// Stage 3: fields of one product page, validated into a record.
    pub async fn extract_product_info(
        &self,
        session: &dyn PageSession,
        url: &str,
    ) -> Result<ExtractOutcome> {
        let url = self.links.resolve(url)?;
        info!("Extracting product data from {}", url);

        session.navigate(url.as_str()).await?;
        // Price only renders client-side; nothing else is worth reading before it appears
        self.require(session, &self.selectors.product_price).await?;

        let raw = self.extractor.extract(session).await?;
        Ok(match self.validator.validate(raw, url.as_str()) {
            Ok(record) => ExtractOutcome::Extracted(record),
            Err(failure) => ExtractOutcome::Rejected {
                reason: failure.to_string(),
            },
        })
    }

    async fn require(&self, session: &dyn PageSession, selector: &str) -> Result<()> {
        match session.wait_for_selector(selector, self.element_timeout).await? {
            WaitOutcome::Present => Ok(()),
            WaitOutcome::TimedOut => Err(AppError::ElementTimeout {
                selector: selector.to_string(),
            }),
        }
    }

    fn resolve_unique(&self, hrefs: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut seen = HashSet::new();
        hrefs
            .into_iter()
            .filter_map(|href| match self.links.resolve(&href) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    debug!("Skipping unusable link '{}': {}", href, e);
                    None
                }
            })
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

/// Runs crawl plans against a session factory through an orchestrator.
pub struct Pipeline<F: SessionFactory, O: Orchestrator> {
    steps: CrawlSteps,
    factory: F,
    orchestrator: O,
    policy: SuspectPolicy,
    cancel: CancellationToken,
}

impl<F: SessionFactory, O: Orchestrator> Pipeline<F, O> {
    pub fn new(config: &AppConfig, factory: F, orchestrator: O) -> Result<Self> {
        Ok(Self {
            steps: CrawlSteps::new(config)?,
            factory,
            orchestrator,
            policy: config.validation.suspect_policy,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    pub async fn run(&self, plan: &CrawlPlan) -> Result<CrawlReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let (records, stats) = self.crawl(run_id, plan).await?;

        info!(
            "Crawl {} finished: {} records, {} flagged, {} skipped",
            run_id,
            records.len(),
            stats.flagged,
            stats.skipped()
        );

        Ok(CrawlReport {
            run_id,
            mode: plan.mode,
            started_at,
            finished_at: Utc::now(),
            records,
            stats,
        })
    }

    #[tracing::instrument(name = "crawl", skip(self, plan), fields(mode = ?plan.mode))]
    async fn crawl(&self, run_id: Uuid, plan: &CrawlPlan) -> Result<(Vec<ProductRecord>, CrawlStats)> {
        let seen = SeenUrls::default();
        let mut stats = CrawlStats::default();
        let mut records = Vec::new();
        let mut products_left = plan.product_limit;

        for category in &plan.categories {
            stats.categories += 1;

            let sub_categories = match self.categories(&category.url).await {
                Ok(found) => found,
                Err(AppError::Cancelled) => {
                    stats.cancelled = true;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Category '{}' failed: {}", category.label, e);
                    stats.categories_failed += 1;
                    continue;
                }
            };

            let sub_categories: Vec<_> = match plan.sub_category_limit {
                Some(limit) => sub_categories.into_iter().take(limit).collect(),
                None => sub_categories,
            };
            info!(
                "Category '{}' has {} sub-categories",
                category.label,
                sub_categories.len()
            );
            stats.sub_categories += sub_categories.len();

            // Stage 2: all listings of this category, claiming product URLs as they come in
            let listings = join_all(
                sub_categories
                    .iter()
                    .map(|sub| self.claim_products(sub, &seen)),
            )
            .await;

            let mut products = Vec::new();
            for (sub, listing) in sub_categories.iter().zip(listings) {
                match listing {
                    Ok((claimed, duplicates, partial)) => {
                        stats.duplicates_skipped += duplicates;
                        stats.partial_listings += usize::from(partial);
                        products.extend(claimed);
                    }
                    Err(AppError::Cancelled) => stats.cancelled = true,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("Listing {} failed: {}", sub, e);
                        stats.listings_failed += 1;
                    }
                }
            }

            if let Some(left) = products_left.as_mut() {
                products.truncate(*left);
                *left -= products.len();
            }
            stats.product_urls += products.len();

            // Stage 3
            let outcomes = join_all(products.iter().map(|product| self.product(product))).await;
            for (product, outcome) in products.iter().zip(outcomes) {
                match outcome {
                    Ok(ExtractOutcome::Extracted(record)) => self.admit(record, &mut records, &mut stats),
                    Ok(ExtractOutcome::Rejected { reason }) => {
                        warn!("Rejected {}: {}", product, reason);
                        stats.rejected += 1;
                    }
                    Err(AppError::Cancelled) => stats.cancelled = true,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("Product {} failed: {}", product, e);
                        stats.products_failed += 1;
                    }
                }
            }

            if stats.cancelled || products_left == Some(0) {
                break;
            }
        }

        if stats.cancelled {
            warn!("Crawl cancelled; keeping {} records collected so far", records.len());
        } else if stats.categories > 0 && stats.categories_failed == stats.categories {
            return Err(AppError::EntryUnreachable(format!(
                "all {} categories failed",
                stats.categories
            )));
        }

        debug!("Run claimed {} unique product URLs", seen.len().await);
        Ok((records, stats))
    }

    fn admit(&self, record: ProductRecord, records: &mut Vec<ProductRecord>, stats: &mut CrawlStats) {
        if !record.is_suspect() {
            stats.accepted += 1;
            records.push(record);
            return;
        }

        let issues: Vec<String> = record.flags.iter().map(ToString::to_string).collect();
        match self.policy {
            SuspectPolicy::Flag => {
                warn!("Flagged {}: {}", record.store_url, issues.join(", "));
                stats.flagged += 1;
                records.push(record);
            }
            SuspectPolicy::Drop => {
                warn!("Dropped {}: {}", record.store_url, issues.join(", "));
                stats.dropped += 1;
            }
        }
    }

    /// Listing URLs claimed by this run, with the count of already-seen ones.
    async fn claim_products(
        &self,
        sub: &SubCategoryRef,
        seen: &SeenUrls,
    ) -> Result<(Vec<ProductRef>, usize, bool)> {
        let listing = self.listing(sub.as_str()).await?;

        let mut claimed = Vec::new();
        let mut duplicates = 0;
        for product in listing.products {
            if seen.insert(product.as_str()).await {
                claimed.push(product);
            } else {
                duplicates += 1;
            }
        }
        Ok((claimed, duplicates, listing.partial))
    }

    async fn categories(&self, url: &str) -> Result<Vec<SubCategoryRef>> {
        let url = url.to_string();
        self.submit(TaskKey::new(Stage::CategoryPage, &url), move || {
            let url = url.clone();
            async move {
                let session = OpenSession::new(self.factory.open().await?);
                let result = self.steps.find_category_pages(session.page(), &url).await;
                session.close().await;
                result
            }
        })
        .await
    }

    async fn listing(&self, url: &str) -> Result<Listing> {
        let url = url.to_string();
        self.submit(TaskKey::new(Stage::ListingPage, &url), move || {
            let url = url.clone();
            async move {
                let session = OpenSession::new(self.factory.open().await?);
                let result = self.steps.find_product_pages(session.page(), &url).await;
                session.close().await;
                result
            }
        })
        .await
    }

    async fn product(&self, product: &ProductRef) -> Result<ExtractOutcome> {
        let url = product.as_str().to_string();
        self.submit(TaskKey::new(Stage::ProductPage, &url), move || {
            let url = url.clone();
            async move {
                let session = OpenSession::new(self.factory.open().await?);
                let result = self.steps.extract_product_info(session.page(), &url).await;
                session.close().await;
                result
            }
        })
        .await
    }

    /// Hands work to the orchestrator, abandoning it if the run is cancelled.
    async fn submit<T, W, Fut>(&self, key: TaskKey, work: W) -> Result<T>
    where
        T: Clone + Serialize + DeserializeOwned + Send + 'static,
        W: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            result = self.orchestrator.submit(key, work) => result,
        }
    }
}

/// Closes its page when the crawl step finishes, or in the background if the step is
/// dropped part way through (task timeout, cancellation).
struct OpenSession {
    session: Arc<dyn PageSession>,
    closed: bool,
}

impl OpenSession {
    fn new(session: Box<dyn PageSession>) -> Self {
        Self {
            session: Arc::from(session),
            closed: false,
        }
    }

    fn page(&self) -> &dyn PageSession {
        self.session.as_ref()
    }

    async fn close(mut self) {
        self.closed = true;
        close_page(&self.session).await;
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(&self.session);
                handle.spawn(async move { close_page(&session).await });
            }
            Err(_) => warn!("Page session dropped outside the runtime; it was not closed"),
        }
    }
}

async fn close_page(session: &Arc<dyn PageSession>) {
    if let Err(e) = session.close().await {
        debug!("Closing page session failed: {}", e);
    }
}
