use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::GeoPointInput;
use crate::engine::lifecycle::{cancel_order, start_lifecycle};
use crate::error::AppError;
use crate::models::order::{Order, OrderDraft, OrderItem, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub destination: GeoPointInput,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub customer_id: Option<Uuid>,
}

/// Routes the order; a `Rejected` outcome is a normal response and is not
/// persisted. A `Pending` order is stored and its lifecycle started.
async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::BadRequest("item quantity must be > 0".to_string()));
    }

    // Items must exist and, when the branch is known, come from its restaurant.
    let branch = state.store.get_branch(payload.branch_id).await?;
    for line in &payload.items {
        let item = state
            .store
            .get_item(line.item_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("item {} does not exist", line.item_id)))?;
        if let Some(branch) = branch.as_ref().filter(|b| b.restaurant_id != item.restaurant_id) {
            return Err(AppError::BadRequest(format!(
                "item {} is not on the menu of branch {}",
                item.id, branch.id
            )));
        }
    }

    let draft = OrderDraft {
        customer_id: payload.customer_id,
        branch_id: payload.branch_id,
        destination: payload.destination.to_coordinate()?,
        items: payload.items,
    };

    let start = Instant::now();
    let decision = state.router.route_order(state.store.as_ref(), &draft).await?;

    let outcome = match decision.status {
        OrderStatus::Pending => "pending",
        _ => "rejected",
    };
    state
        .metrics
        .routing_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .orders_routed_total
        .with_label_values(&[outcome])
        .inc();

    let order = Order::from_draft(draft, decision.status);

    if decision.status == OrderStatus::Pending {
        state.store.insert_order(order.clone()).await?;
        let _lifecycle = start_lifecycle(state.clone(), order.id)?;
        info!(order_id = %order.id, branch_id = %order.branch_id, "order placed");
    } else {
        info!(customer_id = %order.customer_id, branch_id = %order.branch_id, "order rejected");
    }

    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .store
        .list_orders()
        .await?
        .into_iter()
        .filter(|order| query.customer_id.is_none_or(|id| order.customer_id == id))
        .collect();

    Ok(Json(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .store
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(cancel_order(&state, id).await?))
}
