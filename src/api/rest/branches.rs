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
use crate::models::branch::Branch;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/branches", post(create_branch).get(list_branches))
}

#[derive(Deserialize)]
pub struct CreateBranchRequest {
    pub restaurant_id: Uuid,
    pub area_id: Option<Uuid>,
    pub location: GeoPointInput,
}

async fn create_branch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBranchRequest>,
) -> Result<Json<Branch>, AppError> {
    if state.store.get_restaurant(payload.restaurant_id).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "restaurant {} does not exist",
            payload.restaurant_id
        )));
    }

    if let Some(area_id) = payload.area_id {
        let known = state
            .store
            .list_service_areas()
            .await?
            .iter()
            .any(|area| area.id == area_id);
        if !known {
            return Err(AppError::BadRequest(format!("area {area_id} does not exist")));
        }
    }

    let branch = Branch {
        id: Uuid::new_v4(),
        restaurant_id: payload.restaurant_id,
        area_id: payload.area_id,
        location: payload.location.to_coordinate()?,
        created_at: Utc::now(),
    };

    state.store.insert_branch(branch.clone()).await?;
    Ok(Json(branch))
}

async fn list_branches(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Branch>>, AppError> {
    Ok(Json(state.store.list_all_branches().await?))
}
