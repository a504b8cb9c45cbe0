//! Infinite-scroll convergence.
//!
//! A listing that loads more items as the viewport moves never says it is finished. The
//! engine keeps scrolling until the number of rendered items has been the same for
//! `stable_reads` consecutive reads, or until the wall-clock deadline passes, whichever comes
//! first. Both outcomes are terminal and both hand back whatever was collected.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use crate::Result;
use crate::config::ScrollConfig;
use crate::session::PageSession;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Reads tokio's clock, so paused test time drives it too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// The operations the engine drives on a listing.
#[async_trait]
pub trait ScrollTarget: Send + Sync {
    async fn count(&self) -> Result<usize>;
    async fn advance(&self) -> Result<()>;
    async fn settle(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Stable,
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceSummary {
    pub state: PollState,
    pub final_count: usize,
    pub reads: usize,
    pub scrolls: usize,
    pub elapsed: Duration,
}

impl ConvergenceSummary {
    pub fn is_partial(&self) -> bool {
        self.state == PollState::DeadlineExceeded
    }
}

/// The last `capacity` counts; stable once they are all equal.
#[derive(Debug)]
pub struct StabilityWindow {
    capacity: usize,
    reads: VecDeque<usize>,
}

impl StabilityWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reads: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, count: usize) -> bool {
        if self.reads.len() == self.capacity {
            self.reads.pop_front();
        }
        self.reads.push_back(count);
        self.is_stable()
    }

    pub fn is_stable(&self) -> bool {
        self.reads.len() == self.capacity && self.reads.iter().all(|c| Some(c) == self.reads.back())
    }
}

#[derive(Debug, Clone)]
pub struct ScrollSettings {
    pub settle: Duration,
    pub deadline: Duration,
    pub step_px: i64,
    pub stable_reads: usize,
}

impl From<&ScrollConfig> for ScrollSettings {
    fn from(config: &ScrollConfig) -> Self {
        Self {
            settle: config.settle(),
            deadline: config.deadline(),
            step_px: config.step_px,
            stable_reads: config.stable_reads,
        }
    }
}

pub struct ScrollEngine<C: Clock = TokioClock> {
    settings: ScrollSettings,
    clock: C,
}

impl ScrollEngine<TokioClock> {
    pub fn new(settings: ScrollSettings) -> Self {
        Self::with_clock(settings, TokioClock)
    }
}

impl<C: Clock> ScrollEngine<C> {
    pub fn with_clock(settings: ScrollSettings, clock: C) -> Self {
        Self { settings, clock }
    }

    pub fn settings(&self) -> &ScrollSettings {
        &self.settings
    }

    /// Scrolls `target` until its item count converges or the deadline passes.
    pub async fn converge<T: ScrollTarget + ?Sized>(&self, target: &T) -> Result<ConvergenceSummary> {
        let started = self.clock.now();
        let mut window = StabilityWindow::new(self.settings.stable_reads);
        let mut state = PollState::Polling;
        let mut reads = 0;
        let mut scrolls = 0;
        let mut count = 0;

        while state == PollState::Polling {
            count = target.count().await?;
            reads += 1;
            tracing::trace!("Listing shows {} items after {} scroll(s)", count, scrolls);

            if window.record(count) {
                state = PollState::Stable;
                continue;
            }

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= self.settings.deadline {
                state = PollState::DeadlineExceeded;
                continue;
            }

            target.advance().await?;
            scrolls += 1;

            // Never sleep past the deadline
            let remaining = self.settings.deadline - elapsed;
            target.settle(self.settings.settle.min(remaining)).await;
        }

        Ok(ConvergenceSummary {
            state,
            final_count: count,
            reads,
            scrolls,
            elapsed: self.clock.now().saturating_duration_since(started),
        })
    }

    /// Converges a listing page and returns its item links, deduplicated in page order.
    pub async fn collect_links(
        &self,
        session: &dyn PageSession,
        link_selector: &str,
    ) -> Result<(Vec<String>, ConvergenceSummary)> {
        let listing = ListingScroller {
            session,
            link_selector,
            step_px: self.settings.step_px,
        };
        let summary = self.converge(&listing).await?;

        let mut seen = HashSet::new();
        let links = session
            .query_selector_all(link_selector)
            .await?
            .iter()
            .filter_map(|element| session.read_attribute(element, "href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty() && seen.insert(href.clone()))
            .collect();

        Ok((links, summary))
    }
}

/// Adapts a page session showing a listing to the engine's operations.
pub struct ListingScroller<'a> {
    session: &'a dyn PageSession,
    link_selector: &'a str,
    step_px: i64,
}

#[async_trait]
impl ScrollTarget for ListingScroller<'_> {
    async fn count(&self) -> Result<usize> {
        Ok(self.session.query_selector_all(self.link_selector).await?.len())
    }

    async fn advance(&self) -> Result<()> {
        self.session.scroll_by(self.step_px).await
    }

    async fn settle(&self, duration: Duration) {
        self.session.wait(duration).await
    }
}
