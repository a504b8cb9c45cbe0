use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use catalog_crawler::orchestrator::TaskRunner;
use catalog_crawler::session::BrowserPool;
use catalog_crawler::utils::logging::init_tracing;
use catalog_crawler::{AppConfig, CrawlMode, CrawlPlan, Pipeline, output};

#[derive(Parser, Debug)]
#[command(name = "catalog-crawler", version, about = "Crawls a grocery catalog into validated product records")]
struct Cli {
    /// `demo` crawls one category with small limits; `full` crawls every configured category
    #[arg(value_enum)]
    mode: CrawlMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging);

    info!("Starting catalog crawler in {:?} mode", cli.mode);

    let browsers = BrowserPool::new(config.browser.clone()).context("Failed to start the browser")?;
    let runner = TaskRunner::new(config.orchestrator.clone());
    let pipeline = Pipeline::new(&config, browsers, runner)?;

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing with what has been collected");
            cancel.cancel();
        }
    });

    let plan = CrawlPlan::for_mode(cli.mode, &config.site);
    let report = match pipeline.run(&plan).await {
        Ok(report) => report,
        Err(e) => {
            error!("Crawl aborted: {}", e);
            return Err(e.into());
        }
    };

    let path = output::write_records(&config.output, &report.records).await?;

    let stats = &report.stats;
    info!(
        "Run {} done in {}s: {} records ({} flagged) written to {}",
        report.run_id,
        (report.finished_at - report.started_at).num_seconds(),
        report.records.len(),
        stats.flagged,
        path.display()
    );
    info!(
        "Skipped {} products ({} dropped, {} rejected, {} failed), {} duplicates, {} partial listings",
        stats.skipped(),
        stats.dropped,
        stats.rejected,
        stats.products_failed,
        stats.duplicates_skipped,
        stats.partial_listings
    );

    Ok(())
}
