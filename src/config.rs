use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, DurationRound, Utc};
use clap::Parser;
use thiserror::Error;

use crate::collectors::tle_fetcher::{CatalogSource, CELESTRAK_ACTIVE_TLE_URL};
use crate::core::time_grid::{TimeGrid, TimeGridError};
use crate::predictors::batch::{FailurePolicy, RunConfig};
use crate::predictors::conjunctions::{ScreeningConfig, DEFAULT_THRESHOLD_KM};
use crate::utils::logging::LogFormat;

/// Upper bound on grid instants per run; every object is propagated at each.
pub const MAX_GRID_COUNT: usize = 100_000;
/// One week.
pub const MAX_REFRESH_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold must be positive, got {0} km")]
    Threshold(f64),
    #[error("grid step must be at least one minute and representable as a duration")]
    GridStep,
    #[error("grid count must be at most {max}, got {0}", max = MAX_GRID_COUNT)]
    GridCount(usize),
    #[error("max objects must be at least 2 to form a pair")]
    MaxObjects,
    #[error("refresh interval must be between 1 and {max} minutes", max = MAX_REFRESH_MINUTES)]
    RefreshInterval,
    #[error(transparent)]
    Grid(#[from] TimeGridError),
}

/// Orbital close-approach screening service.
#[derive(Debug, Clone, Parser)]
#[command(name = "debris-tracker", version, about)]
pub struct Config {
    /// Read element sets from a local TLE file instead of the network
    #[arg(long, env = "DEBRIS_TLE_FILE")]
    pub tle_file: Option<PathBuf>,

    /// Element-set feed URL
    #[arg(long, env = "DEBRIS_TLE_URL", default_value = CELESTRAK_ACTIVE_TLE_URL)]
    pub tle_url: String,

    /// Report pairs closer than this many kilometres
    #[arg(long, env = "DEBRIS_THRESHOLD_KM", default_value_t = DEFAULT_THRESHOLD_KM)]
    pub threshold_km: f64,

    /// First grid instant (RFC 3339); defaults to the start of the current UTC hour
    #[arg(long, env = "DEBRIS_GRID_START")]
    pub grid_start: Option<DateTime<Utc>>,

    /// Number of grid instants
    #[arg(long, env = "DEBRIS_GRID_COUNT", default_value_t = 24)]
    pub grid_count: usize,

    /// Minutes between grid instants
    #[arg(long, env = "DEBRIS_GRID_STEP_MINUTES", default_value_t = 60)]
    pub grid_step_minutes: i64,

    /// Screen at most this many objects (bounds the quadratic pair count)
    #[arg(long, env = "DEBRIS_MAX_OBJECTS")]
    pub max_objects: Option<usize>,

    /// Abort the run on the first malformed element set
    #[arg(long, env = "DEBRIS_FAIL_FAST")]
    pub fail_fast: bool,

    /// Rebuild the snapshot every N minutes; single run if unset
    #[arg(long, env = "DEBRIS_REFRESH_MINUTES")]
    pub refresh_minutes: Option<u64>,

    /// API listen address
    #[arg(long, env = "DEBRIS_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Log output format
    #[arg(long, env = "DEBRIS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold_km.is_finite() && self.threshold_km > 0.0) {
            return Err(ConfigError::Threshold(self.threshold_km));
        }
        self.grid_step()?;
        if self.grid_count > MAX_GRID_COUNT {
            return Err(ConfigError::GridCount(self.grid_count));
        }
        if matches!(self.max_objects, Some(n) if n < 2) {
            return Err(ConfigError::MaxObjects);
        }
        if matches!(self.refresh_minutes, Some(m) if m == 0 || m > MAX_REFRESH_MINUTES) {
            return Err(ConfigError::RefreshInterval);
        }
        Ok(())
    }

    fn grid_step(&self) -> Result<Duration, ConfigError> {
        if self.grid_step_minutes < 1 {
            return Err(ConfigError::GridStep);
        }
        Duration::try_minutes(self.grid_step_minutes).ok_or(ConfigError::GridStep)
    }

    /// Refresh period, or `None` for a single run.
    pub fn refresh_interval(&self) -> Option<StdDuration> {
        self.refresh_minutes
            .map(|m| StdDuration::from_secs(m.min(MAX_REFRESH_MINUTES).saturating_mul(60)))
    }

    pub fn source(&self) -> CatalogSource {
        match &self.tle_file {
            Some(path) => CatalogSource::File(path.clone()),
            None => CatalogSource::Http(self.tle_url.clone()),
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            screening: ScreeningConfig {
                threshold_km: self.threshold_km,
                max_objects: self.max_objects,
            },
            failure_policy: if self.fail_fast {
                FailurePolicy::Abort
            } else {
                FailurePolicy::SkipAndContinue
            },
        }
    }

    /// Grid for a run started at `now`. `grid_start` wins when set.
    pub fn time_grid(&self, now: DateTime<Utc>) -> Result<TimeGrid, ConfigError> {
        let start = match self.grid_start {
            Some(start) => start,
            None => now.duration_trunc(Duration::hours(1)).unwrap_or(now),
        };
        if self.grid_count > MAX_GRID_COUNT {
            return Err(ConfigError::GridCount(self.grid_count));
        }
        Ok(TimeGrid::uniform(start, self.grid_count, self.grid_step()?)?)
    }
}
