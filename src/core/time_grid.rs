use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeGridError {
    #[error("instant {index} is not later than the one before it")]
    NotIncreasing { index: usize },
    #[error("grid step must be positive")]
    NonPositiveStep,
    #[error("grid end overflows the supported date range")]
    OutOfRange,
}

/// Strictly increasing UTC instants shared by every trajectory of a run.
///
/// Cloning is cheap: clones share the same backing slice, so trajectories
/// built from one grid can be compared index-for-index.
#[derive(Debug, Clone)]
pub struct TimeGrid {
    instants: Arc<[DateTime<Utc>]>,
}

impl TimeGrid {
    pub fn new(instants: Vec<DateTime<Utc>>) -> Result<Self, TimeGridError> {
        if let Some(pos) = instants.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TimeGridError::NotIncreasing { index: pos + 1 });
        }
        Ok(Self { instants: instants.into() })
    }

    /// `count` instants starting at `start`, `step` apart.
    pub fn uniform(start: DateTime<Utc>, count: usize, step: Duration) -> Result<Self, TimeGridError> {
        if step <= Duration::zero() {
            return Err(TimeGridError::NonPositiveStep);
        }
        // the last instant must exist before anything is allocated
        if let Some(last) = count.checked_sub(1) {
            i32::try_from(last)
                .ok()
                .and_then(|n| step.checked_mul(n))
                .and_then(|span| start.checked_add_signed(span))
                .ok_or(TimeGridError::OutOfRange)?;
        }
        let mut instants = Vec::with_capacity(count);
        let mut t = start;
        for i in 0..count {
            if i > 0 {
                t = t.checked_add_signed(step).ok_or(TimeGridError::OutOfRange)?;
            }
            instants.push(t);
        }
        Ok(Self { instants: instants.into() })
    }

    pub fn empty() -> Self {
        Self { instants: Arc::from(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    pub fn instants(&self) -> &[DateTime<Utc>] {
        &self.instants
    }

    pub fn get(&self, index: usize) -> Option<DateTime<Utc>> {
        self.instants.get(index).copied()
    }

    /// True when both grids hold the same instants.
    pub fn same_grid(&self, other: &TimeGrid) -> bool {
        Arc::ptr_eq(&self.instants, &other.instants) || self.instants == other.instants
    }
}

impl PartialEq for TimeGrid {
    fn eq(&self, other: &Self) -> bool {
        self.same_grid(other)
    }
}
