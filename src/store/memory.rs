use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::area::ServiceArea;
use crate::models::branch::Branch;
use crate::models::order::{Order, OrderStatus};
use crate::models::restaurant::{MenuItem, Restaurant};
use crate::store::{Store, StoreError};

/// In-process store. Areas and branches keep insertion order so that
/// distance ties resolve the same way on every call.
#[derive(Default)]
pub struct MemoryStore {
    areas: RwLock<Vec<ServiceArea>>,
    branches: RwLock<Vec<Branch>>,
    restaurants: RwLock<Vec<Restaurant>>,
    items: RwLock<Vec<MenuItem>>,
    orders: DashMap<Uuid, Order>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_service_areas(&self) -> Result<Vec<ServiceArea>, StoreError> {
        Ok(self.areas.read().map_err(poisoned)?.clone())
    }

    async fn list_branches(&self, area_ids: &[Uuid]) -> Result<Vec<Branch>, StoreError> {
        let branches = self.branches.read().map_err(poisoned)?;

        Ok(branches
            .iter()
            .filter(|branch| {
                branch
                    .area_id
                    .is_some_and(|area_id| area_ids.contains(&area_id))
            })
            .cloned()
            .collect())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn write_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "order", id })?;

        if !order.status.can_transition_to(status) {
            return Err(StoreError::IllegalTransition {
                from: order.status,
                to: status,
            });
        }

        order.status = status;
        order.updated_at = Some(Utc::now());

        Ok(order.clone())
    }

    async fn insert_area(&self, area: ServiceArea) -> Result<(), StoreError> {
        self.areas.write().map_err(poisoned)?.push(area);
        Ok(())
    }

    async fn insert_branch(&self, branch: Branch) -> Result<(), StoreError> {
        self.branches.write().map_err(poisoned)?.push(branch);
        Ok(())
    }

    async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, StoreError> {
        let branches = self.branches.read().map_err(poisoned)?;
        Ok(branches.iter().find(|branch| branch.id == id).cloned())
    }

    async fn list_all_branches(&self) -> Result<Vec<Branch>, StoreError> {
        Ok(self.branches.read().map_err(poisoned)?.clone())
    }

    async fn insert_restaurant(&self, restaurant: Restaurant) -> Result<(), StoreError> {
        self.restaurants.write().map_err(poisoned)?.push(restaurant);
        Ok(())
    }

    async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError> {
        let restaurants = self.restaurants.read().map_err(poisoned)?;
        Ok(restaurants.iter().find(|r| r.id == id).cloned())
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        Ok(self.restaurants.read().map_err(poisoned)?.clone())
    }

    async fn insert_item(&self, item: MenuItem) -> Result<(), StoreError> {
        self.items.write().map_err(poisoned)?.push(item);
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<MenuItem>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    async fn list_items(&self, restaurant_id: Uuid) -> Result<Vec<MenuItem>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items
            .iter()
            .filter(|item| item.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }
}
