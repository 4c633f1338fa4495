//! Pairwise proximity screening.
//!
//! Every unordered pair of trajectories is compared at every grid index, so
//! the cost is O(n² · T) for n objects and T instants. This dominates a run;
//! callers that need interactive latency over large catalogs should bound n
//! (`ScreeningConfig::max_objects`, [`filter_by_altitude_band`]) before screening.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::core::geodesy::distance_km;
use crate::core::orbit::{Frame, ObjectId, Trajectory};

/// Default close-approach threshold (km).
pub const DEFAULT_THRESHOLD_KM: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    Length { expected: usize, got: usize },
    Frame { expected: Frame, got: Frame },
    Grid,
}

impl std::fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Incompatibility::Length { expected, got } => write!(f, "{got} samples, expected {expected}"),
            Incompatibility::Frame { expected, got } => write!(f, "frame {got:?}, expected {expected:?}"),
            Incompatibility::Grid => write!(f, "sampled on a different time grid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreeningError {
    #[error("threshold must be a positive distance, got {0} km")]
    InvalidThreshold(f64),
    #[error("incompatible trajectory set: trajectory {position} is {reason}")]
    IncompatibleTrajectorySet { position: usize, reason: Incompatibility },
}

/// Two objects closer than the threshold at one grid instant.
/// `a.index < b.index`; each unordered pair appears once per instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloseApproachEvent {
    pub a: ObjectId,
    pub b: ObjectId,
    pub time_index: usize,
    pub time: DateTime<Utc>,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningConfig {
    pub threshold_km: f64,
    /// Screen only the first `max_objects` trajectories.
    pub max_objects: Option<usize>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            threshold_km: DEFAULT_THRESHOLD_KM,
            max_objects: None,
        }
    }
}

impl ScreeningConfig {
    pub fn with_threshold(threshold_km: f64) -> Self {
        Self {
            threshold_km,
            ..Self::default()
        }
    }
}

fn check_batch(trajectories: &[Trajectory], threshold_km: f64) -> Result<(), ScreeningError> {
    if !(threshold_km.is_finite() && threshold_km > 0.0) {
        return Err(ScreeningError::InvalidThreshold(threshold_km));
    }
    let Some(first) = trajectories.first() else {
        return Ok(());
    };
    for (position, t) in trajectories.iter().enumerate().skip(1) {
        let reason = if t.len() != first.len() {
            Incompatibility::Length { expected: first.len(), got: t.len() }
        } else if t.frame() != first.frame() {
            Incompatibility::Frame { expected: first.frame(), got: t.frame() }
        } else if !t.grid().same_grid(first.grid()) {
            Incompatibility::Grid
        } else {
            continue;
        };
        return Err(ScreeningError::IncompatibleTrajectorySet { position, reason });
    }
    Ok(())
}

fn screen_pair(a: &Trajectory, b: &Trajectory, threshold_km: f64, out: &mut Vec<CloseApproachEvent>) {
    let (first, second) = if a.object().index <= b.object().index { (a, b) } else { (b, a) };
    for (time_index, (pa, pb)) in first.positions().iter().zip(second.positions()).enumerate() {
        let d = distance_km(pa, pb);
        if d < threshold_km {
            out.push(CloseApproachEvent {
                a: first.object().clone(),
                b: second.object().clone(),
                time_index,
                // grid length equals position count, checked by check_batch
                time: first.grid().instants()[time_index],
                distance_km: d,
            });
        }
    }
}

fn screen_row(trajectories: &[Trajectory], i: usize, threshold_km: f64) -> Vec<CloseApproachEvent> {
    let mut out = Vec::new();
    for j in (i + 1)..trajectories.len() {
        screen_pair(&trajectories[i], &trajectories[j], threshold_km, &mut out);
    }
    out
}

fn capped(trajectories: &[Trajectory], max_objects: Option<usize>) -> &[Trajectory] {
    match max_objects {
        Some(max) if max < trajectories.len() => &trajectories[..max],
        _ => trajectories,
    }
}

/// Screen every unordered pair for separations strictly below `threshold_km`.
pub fn screen(trajectories: &[Trajectory], threshold_km: f64) -> Result<Vec<CloseApproachEvent>, ScreeningError> {
    screen_with(trajectories, &ScreeningConfig::with_threshold(threshold_km))
}

/// Sequential screening. Pairs are visited in `(i, j)` order with `i < j`;
/// events of one pair are contiguous and ascending in time index.
pub fn screen_with(
    trajectories: &[Trajectory],
    config: &ScreeningConfig,
) -> Result<Vec<CloseApproachEvent>, ScreeningError> {
    check_batch(trajectories, config.threshold_km)?;
    let set = capped(trajectories, config.max_objects);
    let mut events = Vec::new();
    for i in 0..set.len() {
        events.extend(screen_row(set, i, config.threshold_km));
    }
    Ok(events)
}

/// Same result and order as [`screen_with`], with rows of the pair space
/// spread across the rayon pool.
pub fn screen_parallel(
    trajectories: &[Trajectory],
    config: &ScreeningConfig,
) -> Result<Vec<CloseApproachEvent>, ScreeningError> {
    check_batch(trajectories, config.threshold_km)?;
    let set = capped(trajectories, config.max_objects);
    let threshold_km = config.threshold_km;
    Ok((0..set.len())
        .into_par_iter()
        .flat_map_iter(|i| screen_row(set, i, threshold_km))
        .collect())
}

/// Keeps trajectories whose altitude falls inside `band_km` at any sample.
pub fn filter_by_altitude_band(trajectories: Vec<Trajectory>, band_km: RangeInclusive<f64>) -> Vec<Trajectory> {
    trajectories
        .into_iter()
        .filter(|t| t.altitudes_km().iter().any(|h| band_km.contains(h)))
        .collect()
}
