use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::GeoPointInput;
use crate::error::AppError;
use crate::models::area::ServiceArea;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/areas", post(create_area).get(list_areas))
}

#[derive(Deserialize)]
pub struct CreateAreaRequest {
    pub name: String,
    pub location: GeoPointInput,
}

async fn create_area(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAreaRequest>,
) -> Result<Json<ServiceArea>, AppError> {
    let name = payload.name.trim();
    if !(2..=100).contains(&name.chars().count()) {
        return Err(AppError::BadRequest(
            "name must be 2 to 100 characters".to_string(),
        ));
    }

    let area = ServiceArea {
        id: Uuid::new_v4(),
        name: name.to_string(),
        location: payload.location.to_coordinate()?,
        created_at: Utc::now(),
    };

    state.store.insert_area(area.clone()).await?;
    Ok(Json(area))
}

async fn list_areas(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ServiceArea>>, AppError> {
    Ok(Json(state.store.list_service_areas().await?))
}
