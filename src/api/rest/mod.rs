pub mod areas;
pub mod branches;
pub mod orders;
pub mod restaurants;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::geo::Coordinate;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(areas::router())
        .merge(branches::router())
        .merge(orders::router())
        .merge(restaurants::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Coordinates as clients send them: degrees unless `in_radians` is set.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeoPointInput {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub in_radians: bool,
}

impl GeoPointInput {
    pub fn to_coordinate(self) -> Result<Coordinate, AppError> {
        let coordinate = if self.in_radians {
            Coordinate::from_radians(self.lat, self.lng)?
        } else {
            Coordinate::from_degrees(self.lat, self.lng)?
        };
        Ok(coordinate)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    areas: usize,
    branches: usize,
    orders: usize,
    active_lifecycles: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        areas: state.store.list_service_areas().await?.len(),
        branches: state.store.list_all_branches().await?.len(),
        orders: state.store.list_orders().await?.len(),
        active_lifecycles: state.active_lifecycles.len(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
