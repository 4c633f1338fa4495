use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Json, Router};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::types::{satellites, ConjunctionDto, HealthDto, TrajectoryDto};
use crate::predictors::snapshot::Snapshot;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: watch::Receiver<Arc<Snapshot>>, // latest published run
}

impl AppState {
    fn current(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/satellites", get(list_satellites))
        .route("/satellites/:index/trajectory", get(get_trajectory))
        .route("/conjunctions", get(list_conjunctions))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.current();
    (StatusCode::OK, Json(HealthDto::from_snapshot(&snapshot)))
}

async fn list_satellites(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.current();
    (StatusCode::OK, Json(satellites(&snapshot)))
}

async fn get_trajectory(Path(index): Path<usize>, State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.current();
    match snapshot.trajectory(index) {
        Some(t) => (StatusCode::OK, Json(serde_json::json!(TrajectoryDto::from(t)))),
        None if index < snapshot.catalog.len() => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "element set could not be propagated"})),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "index not in current catalog"})),
        ),
    }
}

async fn list_conjunctions(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.current();
    let out: Vec<ConjunctionDto> = snapshot.events.iter().map(ConjunctionDto::from).collect();
    (StatusCode::OK, Json(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time_grid::TimeGrid;
    use crate::core::tle::fixtures::*;
    use crate::core::tle::Catalog;
    use crate::predictors::batch::{run, RunConfig};
    use crate::predictors::snapshot::SnapshotPublisher;
    use axum::response::Response;
    use chrono::{Duration, TimeZone, Utc};

    // The publisher is returned so the watch channel stays open.
    fn serving_mixed_catalog() -> (SnapshotPublisher, AppState) {
        let catalog = Catalog::from_entries(vec![
            (ISS_NAME, ISS_L1, ISS_L2),
            ("BROKEN", ISS_L1_BAD_CHECKSUM, ISS_L2),
            (LEO_NAME, LEO_L1, LEO_L2),
        ]);
        let grid = TimeGrid::uniform(Utc.with_ymd_and_hms(2008, 9, 20, 12, 0, 0).unwrap(), 3, Duration::hours(1)).unwrap();
        let snapshot = run(catalog, &grid, &RunConfig::default()).unwrap();
        let mut publisher = SnapshotPublisher::new(Snapshot::empty(grid));
        publisher.publish(snapshot);
        let state = AppState { snapshots: publisher.subscribe() };
        (publisher, state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn trajectory_for_propagated_record() {
        let (_publisher, state) = serving_mixed_catalog();
        let response = get_trajectory(Path(0), State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["points"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn trajectory_for_skipped_record_is_unprocessable() {
        let (_publisher, state) = serving_mixed_catalog();
        let response = get_trajectory(Path(1), State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "element set could not be propagated");
    }

    #[tokio::test]
    async fn trajectory_outside_catalog_is_not_found() {
        let (_publisher, state) = serving_mixed_catalog();
        for index in [3, 99] {
            let response = get_trajectory(Path(index), State(state.clone())).await.into_response();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
