use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::orbit::{ObjectId, Trajectory};
use crate::core::tle::OrbitalElementRecord;
use crate::predictors::conjunctions::CloseApproachEvent;
use crate::predictors::snapshot::Snapshot;

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub generation: u64,
    pub records: usize,
    pub propagated: usize,
    pub skipped: usize,
    pub events: usize,
}

#[derive(Debug, Serialize)]
pub struct SatelliteDto {
    pub index: usize,
    pub norad_id: Option<u64>,
    pub name: String,
    pub epoch: Option<DateTime<Utc>>,
    pub line1: String,
    pub line2: String,
    pub propagated: bool,
}

#[derive(Debug, Serialize)]
pub struct TrajectoryPointDto {
    pub time: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_km: Option<f64>,
    pub x_km: f64,
    pub y_km: f64,
    pub z_km: f64,
}

#[derive(Debug, Serialize)]
pub struct TrajectoryDto {
    pub object: ObjectId,
    pub points: Vec<TrajectoryPointDto>,
}

#[derive(Debug, Serialize)]
pub struct ConjunctionDto {
    pub time: DateTime<Utc>,
    pub time_index: usize,
    pub satellite_1: ObjectId,
    pub satellite_2: ObjectId,
    /// Rounded to 0.01 km.
    pub distance_km: f64,
}

impl HealthDto {
    pub fn from_snapshot(s: &Snapshot) -> Self {
        Self {
            status: "ok",
            generation: s.generation,
            records: s.catalog.len(),
            propagated: s.trajectories.len(),
            skipped: s.failures.len(),
            events: s.events.len(),
        }
    }
}

pub fn satellites(s: &Snapshot) -> Vec<SatelliteDto> {
    s.catalog
        .records()
        .iter()
        .map(|r: &OrbitalElementRecord| SatelliteDto {
            index: r.index,
            norad_id: r.catalog_number(),
            name: r.name.clone(),
            epoch: r.epoch(),
            line1: r.line1.clone(),
            line2: r.line2.clone(),
            propagated: s.trajectory(r.index).is_some(),
        })
        .collect()
}

impl From<&Trajectory> for TrajectoryDto {
    fn from(t: &Trajectory) -> Self {
        let points = t
            .grid()
            .instants()
            .iter()
            .zip(t.positions())
            .enumerate()
            .map(|(i, (time, p))| {
                let sub = t.subpoints().map(|sp| sp[i]);
                TrajectoryPointDto {
                    time: *time,
                    lat: sub.map(|g| g.latitude_deg),
                    lon: sub.map(|g| g.longitude_deg),
                    alt_km: sub.map(|g| g.altitude_km),
                    x_km: p[0],
                    y_km: p[1],
                    z_km: p[2],
                }
            })
            .collect();
        Self {
            object: t.object().clone(),
            points,
        }
    }
}

impl From<&CloseApproachEvent> for ConjunctionDto {
    fn from(e: &CloseApproachEvent) -> Self {
        Self {
            time: e.time,
            time_index: e.time_index,
            satellite_1: e.a.clone(),
            satellite_2: e.b.clone(),
            distance_km: (e.distance_km * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orbit::Frame;
    use crate::core::time_grid::TimeGrid;
    use chrono::{Duration, TimeZone};

    fn id(index: usize) -> ObjectId {
        ObjectId { index, name: format!("SAT {index}"), norad_id: 40_000 + index as u64 }
    }

    #[test]
    fn conjunction_distance_is_rounded() {
        let event = CloseApproachEvent {
            a: id(0),
            b: id(1),
            time_index: 3,
            time: Utc.with_ymd_and_hms(2024, 4, 4, 3, 0, 0).unwrap(),
            distance_km: 4.23789,
        };
        let dto = ConjunctionDto::from(&event);
        assert_eq!(dto.distance_km, 4.24);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["satellite_1"]["index"], 0);
        assert_eq!(json["satellite_2"]["norad_id"], 40_001);
        assert_eq!(json["time"], "2024-04-04T03:00:00Z");
    }

    #[test]
    fn failed_records_still_list_catalog_fields() {
        use crate::core::tle::fixtures::*;
        use crate::core::tle::Catalog;
        use crate::predictors::batch::{run, RunConfig};

        let catalog = Catalog::from_entries(vec![
            (ISS_NAME, ISS_L1, ISS_L2),
            ("BROKEN", ISS_L1_BAD_CHECKSUM, ISS_L2),
        ]);
        let grid = TimeGrid::uniform(Utc.with_ymd_and_hms(2008, 9, 20, 12, 0, 0).unwrap(), 2, Duration::hours(1)).unwrap();
        let snapshot = run(catalog, &grid, &RunConfig::default()).unwrap();

        let list = satellites(&snapshot);
        assert_eq!(list.len(), 2);
        assert!(list[0].propagated);
        let broken = &list[1];
        assert!(!broken.propagated);
        assert_eq!(broken.norad_id, Some(25544));
        assert_eq!(broken.line1, ISS_L1_BAD_CHECKSUM);
        assert_eq!(broken.epoch, list[0].epoch);
        let json = serde_json::to_value(broken).unwrap();
        assert!(json["epoch"].as_str().unwrap().starts_with("2008-09-20T12:25:40"));
        assert_eq!(json["line2"], ISS_L2);
    }

    #[test]
    fn trajectory_points_without_subpoints_have_null_geodetics() {
        let grid = TimeGrid::uniform(Utc.with_ymd_and_hms(2024, 4, 4, 0, 0, 0).unwrap(), 2, Duration::hours(1)).unwrap();
        let t = Trajectory::from_samples(
            id(2),
            Frame::Teme,
            grid,
            vec![[7000.0, 1.0, 2.0], [6999.0, 3.0, 4.0]],
            vec![[0.0; 3]; 2],
            None,
        )
        .unwrap();
        let json = serde_json::to_value(TrajectoryDto::from(&t)).unwrap();
        assert_eq!(json["points"].as_array().unwrap().len(), 2);
        assert!(json["points"][0]["lat"].is_null());
        assert_eq!(json["points"][1]["x_km"], 6999.0);
    }
}
