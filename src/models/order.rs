use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Accepted,
    PickedUp,
    Delivered,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Forward one step along the success path, or sideways into `Cancelled`
    /// from any non-terminal state. `Rejected` is only ever assigned by routing,
    /// never written as a transition.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Accepted)
                | (Accepted, PickedUp)
                | (PickedUp, Delivered)
                | (Pending | Accepted | PickedUp, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub item_id: Uuid,
    pub quantity: u32,
}

/// An order as submitted, before routing has decided whether it is serviceable.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub destination: Coordinate,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub destination: Coordinate,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn from_draft(draft: OrderDraft, status: OrderStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: draft.customer_id,
            branch_id: draft.branch_id,
            destination: draft.destination,
            items: draft.items,
            status,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Published on every persisted status write.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}
