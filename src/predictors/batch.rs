use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::orbit::{propagate, PropagationError, Trajectory};
use crate::core::time_grid::TimeGrid;
use crate::core::tle::{Catalog, OrbitalElementRecord};
use crate::predictors::conjunctions::{screen_parallel, ScreeningConfig, ScreeningError};
use crate::predictors::snapshot::Snapshot;

/// What to do with a record that fails to propagate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Drop the record and keep the rest of the catalog.
    #[default]
    SkipAndContinue,
    /// Fail the whole batch on the first bad record.
    Abort,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Propagation(#[from] PropagationError),
    #[error(transparent)]
    Screening(#[from] ScreeningError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPropagation {
    /// Successful trajectories in input order.
    pub trajectories: Vec<Trajectory>,
    pub failures: Vec<PropagationError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunConfig {
    pub screening: ScreeningConfig,
    pub failure_policy: FailurePolicy,
}

/// Propagate every record over `grid`, one rayon task per record.
///
/// Under [`FailurePolicy::Abort`] the error returned is the first failing
/// record in input order.
pub fn propagate_catalog(
    records: &[OrbitalElementRecord],
    grid: &TimeGrid,
    policy: FailurePolicy,
) -> Result<BatchPropagation, PropagationError> {
    let results: Vec<Result<Trajectory, PropagationError>> =
        records.par_iter().map(|record| propagate(record, grid)).collect();

    let mut batch = BatchPropagation::default();
    for result in results {
        match result {
            Ok(trajectory) => batch.trajectories.push(trajectory),
            Err(e) if policy == FailurePolicy::Abort => return Err(e),
            Err(e) => {
                debug!(index = e.index(), error = %e, "Skipping record");
                batch.failures.push(e);
            }
        }
    }

    if !batch.failures.is_empty() {
        warn!(
            skipped = batch.failures.len(),
            kept = batch.trajectories.len(),
            "Some element sets could not be propagated"
        );
    }
    Ok(batch)
}

/// Propagate a catalog snapshot and screen the result.
///
/// The returned snapshot is unpublished (generation 0).
pub fn run(catalog: Catalog, grid: &TimeGrid, config: &RunConfig) -> Result<Snapshot, RunError> {
    if catalog.is_empty() {
        info!("Empty catalog, nothing to screen");
        return Ok(Snapshot::empty(grid.clone()));
    }

    let batch = propagate_catalog(catalog.records(), grid, config.failure_policy)?;
    let events = screen_parallel(&batch.trajectories, &config.screening)?;
    let screened_objects = config
        .screening
        .max_objects
        .map_or(batch.trajectories.len(), |max| max.min(batch.trajectories.len()));

    info!(
        records = catalog.len(),
        propagated = batch.trajectories.len(),
        screened = screened_objects,
        instants = grid.len(),
        events = events.len(),
        "Screening run complete"
    );

    Ok(Snapshot {
        generation: 0,
        grid: grid.clone(),
        catalog,
        trajectories: batch.trajectories,
        failures: batch.failures,
        events,
        screened_objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tle::fixtures::*;
    use chrono::{Duration, TimeZone, Utc};

    fn grid() -> TimeGrid {
        let start = Utc.with_ymd_and_hms(2008, 9, 20, 12, 0, 0).unwrap();
        TimeGrid::uniform(start, 24, Duration::hours(1)).unwrap()
    }

    fn mixed_catalog() -> Catalog {
        Catalog::from_entries(vec![
            (ISS_NAME, ISS_L1, ISS_L2),
            ("BROKEN", ISS_L1_BAD_CHECKSUM, ISS_L2),
            (LEO_NAME, LEO_L1, LEO_L2),
        ])
    }

    #[test]
    fn skip_and_continue_keeps_good_records() {
        let catalog = mixed_catalog();
        let batch = propagate_catalog(catalog.records(), &grid(), FailurePolicy::SkipAndContinue).unwrap();
        assert_eq!(batch.trajectories.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].index(), 1);
        let kept: Vec<usize> = batch.trajectories.iter().map(|t| t.object().index).collect();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn abort_policy_returns_first_failure() {
        let catalog = mixed_catalog();
        let err = propagate_catalog(catalog.records(), &grid(), FailurePolicy::Abort).unwrap_err();
        assert_eq!(err.index(), 1);

        let err = run(
            mixed_catalog(),
            &grid(),
            &RunConfig { failure_policy: FailurePolicy::Abort, ..RunConfig::default() },
        )
        .unwrap_err();
        assert!(matches!(err, RunError::Propagation(_)));
    }

    #[test]
    fn empty_catalog_is_an_empty_snapshot() {
        let snapshot = run(Catalog::default(), &grid(), &RunConfig::default()).unwrap();
        assert!(snapshot.trajectories.is_empty());
        assert!(snapshot.events.is_empty());
        assert!(snapshot.failures.is_empty());
    }

    #[test]
    fn duplicate_names_stay_distinct_objects() {
        // Same element set published twice under one name: co-located at every instant.
        let catalog = Catalog::from_entries(vec![
            ("DEBRIS", ISS_L1, ISS_L2),
            ("DEBRIS", ISS_L1, ISS_L2),
            (LEO_NAME, LEO_L1, LEO_L2),
        ]);
        let snapshot = run(catalog, &grid(), &RunConfig::default()).unwrap();
        assert_eq!(snapshot.trajectories.len(), 3);

        let pair_events: Vec<_> = snapshot
            .events
            .iter()
            .filter(|e| (e.a.index, e.b.index) == (0, 1))
            .collect();
        assert_eq!(pair_events.len(), 24);
        assert!(pair_events.iter().all(|e| e.distance_km == 0.0));
        assert!(pair_events.iter().all(|e| e.a.name == e.b.name && e.a.index != e.b.index));
    }

    #[test]
    fn run_applies_catalog_cap_to_screening() {
        let catalog = Catalog::from_entries(vec![
            (LEO_NAME, LEO_L1, LEO_L2),
            ("A", ISS_L1, ISS_L2),
            ("B", ISS_L1, ISS_L2),
        ]);
        let config = RunConfig {
            screening: ScreeningConfig { max_objects: Some(2), ..ScreeningConfig::default() },
            ..RunConfig::default()
        };
        let snapshot = run(catalog, &grid(), &config).unwrap();
        assert_eq!(snapshot.trajectories.len(), 3);
        assert_eq!(snapshot.screened_objects, 2);
        assert!(snapshot.events.iter().all(|e| e.b.index < 2));
        assert!(snapshot.trajectory(2).is_some());
    }

    #[test]
    fn run_is_reproducible() {
        let a = run(mixed_catalog(), &grid(), &RunConfig::default()).unwrap();
        let b = run(mixed_catalog(), &grid(), &RunConfig::default()).unwrap();
        assert_eq!(a.trajectories, b.trajectories);
        assert_eq!(a.events, b.events);
    }
}
