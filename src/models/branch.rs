use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::models::restaurant::Restaurant;

#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub area_id: Option<Uuid>,
    pub location: Coordinate,
    pub created_at: DateTime<Utc>,
}

/// A restaurant that can deliver to a point, and the branch that would serve it.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableRestaurant {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub branch: Branch,
    pub distance_m: f64,
}
