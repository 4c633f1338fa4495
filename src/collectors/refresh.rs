use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use crate::collectors::tle_fetcher::{CatalogSource, FetchError};
use crate::config::{Config, ConfigError};
use crate::predictors::batch::{self, RunError};
use crate::predictors::snapshot::{Snapshot, SnapshotPublisher};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("catalog fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("bad grid: {0}")]
    Config(#[from] ConfigError),
    #[error("run failed: {0}")]
    Run(#[from] RunError),
    #[error("run task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Loads a fresh catalog and runs the pipeline on it off the async threads.
///
/// This is the only place "now" is read; the grid is built from it and
/// passed down.
pub async fn build_snapshot(source: &CatalogSource, config: &Config) -> Result<Snapshot, RefreshError> {
    let catalog = source.load().await?;
    let grid = config.time_grid(Utc::now())?;
    let run_config = config.run_config();
    let snapshot = tokio::task::spawn_blocking(move || batch::run(catalog, &grid, &run_config)).await??;
    Ok(snapshot)
}

/// Rebuilds and publishes a snapshot every `every`. A failed refresh is
/// logged and the previously published snapshot stays current.
pub async fn run_refresh_loop(source: CatalogSource, config: Config, mut publisher: SnapshotPublisher, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // first tick fires immediately; the caller already published a snapshot
    ticker.tick().await;

    loop {
        ticker.tick().await;
        info!("Refreshing catalog");
        match build_snapshot(&source, &config).await {
            Ok(snapshot) => {
                publisher.publish(snapshot);
            }
            Err(e) => error!(error = %e, "Refresh failed, keeping previous snapshot"),
        }
    }
}
