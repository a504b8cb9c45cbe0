use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Installs the global subscriber: console always, plus a daily log file when a
/// directory is configured. `RUST_LOG` overrides the configured level.
///
/// Keep the returned guard alive for the life of the process or buffered file
/// output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let (writer, guard) = non_blocking(rolling::daily(directory, "catalog-crawler.log"));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();

    if let Err(e) = installed {
        // Tests and embedders may have installed their own subscriber already
        eprintln!("Tracing subscriber already set: {}", e);
    }

    guard
}
