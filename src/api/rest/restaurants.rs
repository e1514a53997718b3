use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::GeoPointInput;
use crate::engine::proximity::{available_restaurants, nearby_areas};
use crate::error::AppError;
use crate::models::branch::AvailableRestaurant;
use crate::models::restaurant::{MenuItem, Restaurant, RestaurantDetail};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/restaurants", get(list_restaurants).post(create_restaurant))
        .route("/restaurants/available", get(list_available))
        .route("/restaurants/:id", get(get_restaurant))
        .route("/restaurants/:id/items", get(list_items).post(create_item))
}

#[derive(Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if !(2..=100).contains(&name.chars().count()) {
        return Err(AppError::BadRequest(
            "name must be 2 to 100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String, AppError> {
    if description.chars().count() > 500 {
        return Err(AppError::BadRequest(
            "description must be at most 500 characters".to_string(),
        ));
    }
    Ok(description.to_string())
}

async fn create_restaurant(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRestaurantRequest>,
) -> Result<Json<Restaurant>, AppError> {
    let restaurant = Restaurant {
        id: Uuid::new_v4(),
        name: validate_name(&payload.name)?,
        description: validate_description(&payload.description)?,
        created_at: Utc::now(),
    };

    state.store.insert_restaurant(restaurant.clone()).await?;
    Ok(Json(restaurant))
}

async fn list_restaurants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Restaurant>>, AppError> {
    Ok(Json(state.store.list_restaurants().await?))
}

async fn fetch_restaurant(state: &AppState, id: Uuid) -> Result<Restaurant, AppError> {
    state
        .store
        .get_restaurant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {} not found", id)))
}

async fn get_restaurant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RestaurantDetail>, AppError> {
    let restaurant = fetch_restaurant(&state, id).await?;
    let branches = state
        .store
        .list_all_branches()
        .await?
        .into_iter()
        .filter(|branch| branch.restaurant_id == id)
        .collect();
    let items = state.store.list_items(id).await?;

    Ok(Json(RestaurantDetail {
        restaurant,
        branches,
        items,
    }))
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<Json<MenuItem>, AppError> {
    let restaurant = fetch_restaurant(&state, id).await?;
    if !(payload.price.is_finite() && payload.price > 0.0) {
        return Err(AppError::BadRequest("price must be > 0".to_string()));
    }

    let item = MenuItem {
        id: Uuid::new_v4(),
        restaurant_id: restaurant.id,
        name: validate_name(&payload.name)?,
        description: validate_description(&payload.description)?,
        price: payload.price,
        created_at: Utc::now(),
    };

    state.store.insert_item(item.clone()).await?;
    Ok(Json(item))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    fetch_restaurant(&state, id).await?;
    Ok(Json(state.store.list_items(id).await?))
}

/// Restaurants with a serviceable branch in one of the nearest areas that lie
/// within the proximity threshold of the point.
async fn list_available(
    State(state): State<Arc<AppState>>,
    Query(point): Query<GeoPointInput>,
) -> Result<Json<Vec<AvailableRestaurant>>, AppError> {
    let target = point.to_coordinate()?;
    let policy = state.router.policy();

    let areas = state.store.list_service_areas().await?;
    let area_ids: Vec<Uuid> = nearby_areas(
        &target,
        &areas,
        policy.proximity_threshold_m,
        policy.nearest_area_count,
    )
    .iter()
    .map(|area| area.id)
    .collect();
    let branches = state.store.list_branches(&area_ids).await?;
    let restaurants: HashMap<Uuid, Restaurant> = state
        .store
        .list_restaurants()
        .await?
        .into_iter()
        .map(|restaurant| (restaurant.id, restaurant))
        .collect();

    Ok(Json(available_restaurants(
        &target,
        &branches,
        &restaurants,
        policy.proximity_threshold_m,
    )))
}
