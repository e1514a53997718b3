use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::geo::Coordinate;

/// Coarse geographic zone used as the first-pass routing filter.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceArea {
    pub id: Uuid,
    pub name: String,
    pub location: Coordinate,
    pub created_at: DateTime<Utc>,
}
