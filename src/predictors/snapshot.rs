use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::core::orbit::{PropagationError, Trajectory};
use crate::core::time_grid::TimeGrid;
use crate::core::tle::Catalog;
use crate::predictors::conjunctions::CloseApproachEvent;

/// Complete, immutable result of one propagation and screening run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Incremented for every published snapshot; 0 for one never published.
    pub generation: u64,
    pub grid: TimeGrid,
    pub catalog: Catalog,
    /// One per successfully propagated record, in catalog order.
    pub trajectories: Vec<Trajectory>,
    /// Records skipped under skip-and-continue.
    pub failures: Vec<PropagationError>,
    pub events: Vec<CloseApproachEvent>,
    /// Trajectories that took part in screening after any cap.
    pub screened_objects: usize,
}

impl Snapshot {
    pub fn empty(grid: TimeGrid) -> Self {
        Self {
            generation: 0,
            grid,
            catalog: Catalog::default(),
            trajectories: Vec::new(),
            failures: Vec::new(),
            events: Vec::new(),
            screened_objects: 0,
        }
    }

    /// Trajectory of the record at catalog `index`, if it propagated.
    pub fn trajectory(&self, index: usize) -> Option<&Trajectory> {
        self.trajectories
            .binary_search_by_key(&index, |t| t.object().index)
            .ok()
            .map(|pos| &self.trajectories[pos])
    }
}

/// Publishes snapshots by swapping an `Arc`; readers never see a partial one.
pub struct SnapshotPublisher {
    tx: watch::Sender<Arc<Snapshot>>,
    generation: u64,
}

impl SnapshotPublisher {
    pub fn new(initial: Snapshot) -> Self {
        let generation = initial.generation;
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx, generation }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    /// Stamps the next generation on `snapshot` and makes it current.
    pub fn publish(&mut self, mut snapshot: Snapshot) -> Arc<Snapshot> {
        self.generation += 1;
        snapshot.generation = self.generation;
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(snapshot.clone());
        info!(
            generation = self.generation,
            objects = snapshot.trajectories.len(),
            events = snapshot.events.len(),
            "Published snapshot"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn readers_keep_their_snapshot_across_publish() {
        let mut publisher = SnapshotPublisher::new(Snapshot::empty(TimeGrid::empty()));
        let mut rx = publisher.subscribe();
        let held = rx.borrow().clone();
        assert_eq!(held.generation, 0);

        let next = Snapshot {
            screened_objects: 5,
            ..Snapshot::empty(TimeGrid::empty())
        };
        publisher.publish(next);

        rx.changed().await.unwrap();
        let current = rx.borrow_and_update().clone();
        assert_eq!(current.generation, 1);
        assert_eq!(current.screened_objects, 5);
        // the earlier snapshot is untouched
        assert_eq!(held.generation, 0);
        assert_eq!(held.screened_objects, 0);
    }

    #[test]
    fn generations_increase() {
        let mut publisher = SnapshotPublisher::new(Snapshot::empty(TimeGrid::empty()));
        publisher.publish(Snapshot::empty(TimeGrid::empty()));
        let second = publisher.publish(Snapshot::empty(TimeGrid::empty()));
        assert_eq!(second.generation, 2);
        assert_eq!(publisher.latest().generation, 2);
    }
}
