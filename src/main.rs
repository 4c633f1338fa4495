use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use debris_tracker::api;
use debris_tracker::collectors::refresh;
use debris_tracker::config::Config;
use debris_tracker::predictors::snapshot::{Snapshot, SnapshotPublisher};
use debris_tracker::utils;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    utils::logging::init(config.log_format);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }
    info!(
        threshold_km = config.threshold_km,
        instants = config.grid_count,
        step_minutes = config.grid_step_minutes,
        max_objects = ?config.max_objects,
        "debris-tracker initialized"
    );

    let source = config.source();
    let snapshot = match refresh::build_snapshot(&source, &config).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Initial screening run failed");
            return ExitCode::FAILURE;
        }
    };

    for failure in snapshot.failures.iter().take(5) {
        warn!(error = %failure, "Skipped element set");
    }
    for (i, event) in snapshot.events.iter().take(5).enumerate() {
        info!(
            "Close approach {}: {} #{} / {} #{} at {} ({:.2} km)",
            i + 1,
            event.a.name,
            event.a.index,
            event.b.name,
            event.b.index,
            event.time.to_rfc3339(),
            event.distance_km
        );
    }

    let mut publisher = SnapshotPublisher::new(Snapshot::empty(snapshot.grid.clone()));
    publisher.publish(snapshot);
    let state = api::server::AppState { snapshots: publisher.subscribe() };

    if let Some(every) = config.refresh_interval() {
        tokio::spawn(refresh::run_refresh_loop(source, config.clone(), publisher, every));
    }

    match api::server::run_server(state, config.bind).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "API server failed");
            ExitCode::FAILURE
        }
    }
}
