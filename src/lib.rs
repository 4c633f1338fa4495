//! Orbital close-approach screening.
//!
//! Element sets are propagated with SGP4 over a shared [`TimeGrid`] and every
//! pair of resulting trajectories is screened for separations under a
//! threshold. The propagation and screening core is pure; catalog sources,
//! the refresh loop and the HTTP API are thin layers around it.

pub mod api;
pub mod collectors;
pub mod config;
pub mod core;
pub mod predictors;
pub mod utils;

pub use crate::core::orbit::{propagate, propagate_with, Frame, ObjectId, PropagationError, Trajectory};
pub use crate::core::time_grid::TimeGrid;
pub use crate::core::tle::{Catalog, ElementSetError, OrbitalElementRecord};
pub use crate::predictors::batch::{propagate_catalog, run, FailurePolicy, RunConfig};
pub use crate::predictors::conjunctions::{
    screen, screen_parallel, screen_with, CloseApproachEvent, ScreeningConfig, ScreeningError,
};
pub use crate::predictors::snapshot::{Snapshot, SnapshotPublisher};
