pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::area::ServiceArea;
use crate::models::branch::Branch;
use crate::models::order::{Order, OrderStatus};
use crate::models::restaurant::{MenuItem, Restaurant};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence collaborator. Single-row reads and writes must be
/// last-write-visible; nothing here needs cross-row transactions.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn list_service_areas(&self) -> Result<Vec<ServiceArea>, StoreError>;

    /// Branches whose `area_id` is in `area_ids`, in insertion order.
    async fn list_branches(&self, area_ids: &[Uuid]) -> Result<Vec<Branch>, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Validates the move against the current row and writes it atomically,
    /// stamping `updated_at`. Returns the updated order.
    async fn write_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, StoreError>;

    async fn insert_area(&self, area: ServiceArea) -> Result<(), StoreError>;

    async fn insert_branch(&self, branch: Branch) -> Result<(), StoreError>;

    async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, StoreError>;

    async fn list_all_branches(&self) -> Result<Vec<Branch>, StoreError>;

    async fn insert_restaurant(&self, restaurant: Restaurant) -> Result<(), StoreError>;

    async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError>;

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError>;

    async fn insert_item(&self, item: MenuItem) -> Result<(), StoreError>;

    async fn get_item(&self, id: Uuid) -> Result<Option<MenuItem>, StoreError>;

    /// Menu of one restaurant, in insertion order.
    async fn list_items(&self, restaurant_id: Uuid) -> Result<Vec<MenuItem>, StoreError>;

    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;
}
