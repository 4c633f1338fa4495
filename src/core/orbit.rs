use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::geodesy::{self, Geodetic};
use crate::core::time_grid::TimeGrid;
use crate::core::tle::{ElementSetError, OrbitalElementRecord};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    #[error("malformed element set #{index} ({name}): {source}")]
    MalformedElementSet {
        index: usize,
        name: String,
        #[source]
        source: ElementSetError,
    },
}

impl PropagationError {
    pub fn index(&self) -> usize {
        match self {
            PropagationError::MalformedElementSet { index, .. } => *index,
        }
    }
}

/// Reference frame of a trajectory's Cartesian positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// True-equator mean-equinox inertial frame, as SGP4 produces it.
    Teme,
    /// TEME rotated by Greenwich mean sidereal time.
    EarthFixed,
}

/// Identity of a tracked object within one catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId {
    pub index: usize,
    pub name: String,
    pub norad_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagateOptions {
    /// Derive geodetic subpoints alongside Cartesian positions.
    pub subpoints: bool,
}

impl Default for PropagateOptions {
    fn default() -> Self {
        Self { subpoints: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trajectory has {got} {what} for a grid of {expected} instants")]
pub struct TrajectoryShapeError {
    pub what: &'static str,
    pub got: usize,
    pub expected: usize,
}

/// Positions of one object over one time grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    object: ObjectId,
    frame: Frame,
    grid: TimeGrid,
    positions_km: Vec<[f64; 3]>,
    velocities_km_s: Vec<[f64; 3]>,
    subpoints: Option<Vec<Geodetic>>,
}

impl Trajectory {
    /// Builds a trajectory from externally computed samples.
    /// Every sample vector must match the grid length.
    pub fn from_samples(
        object: ObjectId,
        frame: Frame,
        grid: TimeGrid,
        positions_km: Vec<[f64; 3]>,
        velocities_km_s: Vec<[f64; 3]>,
        subpoints: Option<Vec<Geodetic>>,
    ) -> Result<Self, TrajectoryShapeError> {
        let expected = grid.len();
        let check = |what, got| {
            if got == expected {
                Ok(())
            } else {
                Err(TrajectoryShapeError { what, got, expected })
            }
        };
        check("positions", positions_km.len())?;
        check("velocities", velocities_km_s.len())?;
        if let Some(sp) = &subpoints {
            check("subpoints", sp.len())?;
        }
        Ok(Self {
            object,
            frame,
            grid,
            positions_km,
            velocities_km_s,
            subpoints,
        })
    }

    pub fn object(&self) -> &ObjectId {
        &self.object
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.positions_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions_km.is_empty()
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions_km
    }

    pub fn velocities(&self) -> &[[f64; 3]] {
        &self.velocities_km_s
    }

    pub fn subpoints(&self) -> Option<&[Geodetic]> {
        self.subpoints.as_deref()
    }

    /// Altitude at each sample: geodetic when subpoints exist, else radius above the equator.
    pub fn altitudes_km(&self) -> Vec<f64> {
        match &self.subpoints {
            Some(sp) => sp.iter().map(|g| g.altitude_km).collect(),
            None => self
                .positions_km
                .iter()
                .map(|p| geodesy::norm(p) - geodesy::WGS84_A_KM)
                .collect(),
        }
    }

    /// Rotates a TEME trajectory into the Earth-fixed frame. Already Earth-fixed
    /// trajectories are returned unchanged.
    pub fn to_earth_fixed(&self) -> Trajectory {
        if self.frame == Frame::EarthFixed {
            return self.clone();
        }
        let positions_km = self
            .grid
            .instants()
            .iter()
            .zip(&self.positions_km)
            .map(|(t, p)| geodesy::teme_to_earth_fixed(p, geodesy::gmst(*t)))
            .collect();
        // Velocities keep the inertial rotation only; Earth-rate terms are not applied.
        let velocities_km_s = self
            .grid
            .instants()
            .iter()
            .zip(&self.velocities_km_s)
            .map(|(t, v)| geodesy::teme_to_earth_fixed(v, geodesy::gmst(*t)))
            .collect();
        Trajectory {
            object: self.object.clone(),
            frame: Frame::EarthFixed,
            grid: self.grid.clone(),
            positions_km,
            velocities_km_s,
            subpoints: self.subpoints.clone(),
        }
    }
}

fn minutes_since_epoch(epoch: NaiveDateTime, t: DateTime<Utc>) -> f64 {
    let diff = t.naive_utc() - epoch;
    diff.num_milliseconds() as f64 / 60_000.0
}

/// Propagate one record over `grid` with subpoints.
pub fn propagate(record: &OrbitalElementRecord, grid: &TimeGrid) -> Result<Trajectory, PropagationError> {
    propagate_with(record, grid, &PropagateOptions::default())
}

/// Propagate one record over `grid` using SGP4.
///
/// Pure: the result depends only on the record text and the grid instants.
pub fn propagate_with(
    record: &OrbitalElementRecord,
    grid: &TimeGrid,
    options: &PropagateOptions,
) -> Result<Trajectory, PropagationError> {
    let malformed = |source: ElementSetError| PropagationError::MalformedElementSet {
        index: record.index,
        name: record.name.clone(),
        source,
    };

    let elements = record.parse_elements().map_err(malformed)?;
    let constants = sgp4::Constants::from_elements(&elements).map_err(|e| {
        malformed(ElementSetError::Divergence {
            minutes: 0.0,
            reason: e.to_string(),
        })
    })?;

    let mut positions_km = Vec::with_capacity(grid.len());
    let mut velocities_km_s = Vec::with_capacity(grid.len());
    let mut subpoints = options.subpoints.then(|| Vec::with_capacity(grid.len()));

    for &t in grid.instants() {
        let minutes = minutes_since_epoch(elements.datetime, t);
        let prediction = constants.propagate(minutes).map_err(|e| {
            malformed(ElementSetError::Divergence {
                minutes,
                reason: e.to_string(),
            })
        })?;
        let finite = prediction
            .position
            .iter()
            .chain(prediction.velocity.iter())
            .all(|c| c.is_finite());
        if !finite {
            return Err(malformed(ElementSetError::Divergence {
                minutes,
                reason: "non-finite state vector".to_string(),
            }));
        }

        if let Some(sp) = subpoints.as_mut() {
            let fixed = geodesy::teme_to_earth_fixed(&prediction.position, geodesy::gmst(t));
            sp.push(geodesy::earth_fixed_to_geodetic(&fixed));
        }
        positions_km.push(prediction.position);
        velocities_km_s.push(prediction.velocity);
    }

    Ok(Trajectory {
        object: ObjectId {
            index: record.index,
            name: record.name.clone(),
            norad_id: elements.norad_id,
        },
        frame: Frame::Teme,
        grid: grid.clone(),
        positions_km,
        velocities_km_s,
        subpoints,
    })
}
