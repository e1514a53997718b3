use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::geo::GeoError;
use crate::models::order::OrderStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidCoordinate(#[from] GeoError),

    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("lifecycle started for order {order_id} in status {status:?}, expected Pending")]
    LifecycleNotPending { order_id: Uuid, status: OrderStatus },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::IllegalTransition { from, to } => AppError::IllegalTransition { from, to },
            StoreError::Backend(msg) => AppError::Persistence(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_)
            | AppError::IllegalTransition { .. }
            | AppError::LifecycleNotPending { .. } => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
