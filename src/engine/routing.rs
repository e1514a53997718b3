use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::proximity::{filter_serviceable, nearest_areas};
use crate::error::AppError;
use crate::models::area::ServiceArea;
use crate::models::branch::Branch;
use crate::models::order::{OrderDraft, OrderStatus};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingPolicy {
    pub proximity_threshold_m: f64,
    pub nearest_area_count: usize,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            proximity_threshold_m: 5000.0,
            nearest_area_count: 4,
        }
    }
}

/// Outcome of routing a draft. `Rejected` is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingDecision {
    pub status: OrderStatus,
    pub branch_id: Option<Uuid>,
}

impl RoutingDecision {
    fn rejected() -> Self {
        Self {
            status: OrderStatus::Rejected,
            branch_id: None,
        }
    }

    fn pending(branch_id: Uuid) -> Self {
        Self {
            status: OrderStatus::Pending,
            branch_id: Some(branch_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRouter {
    policy: RoutingPolicy,
}

impl OrderRouter {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Pure routing decision over a snapshot of areas and their branches.
    pub fn route(
        &self,
        draft: &OrderDraft,
        all_areas: &[ServiceArea],
        branches_by_area: &HashMap<Uuid, Vec<Branch>>,
    ) -> RoutingDecision {
        let nearest = nearest_areas(
            &draft.destination,
            all_areas,
            self.policy.nearest_area_count,
        );
        self.decide(draft, &nearest, branches_by_area)
    }

    /// Reads the snapshot from `store` and routes against it. Read failures are
    /// returned unchanged; routing is cheap to re-run.
    pub async fn route_order(
        &self,
        store: &dyn Store,
        draft: &OrderDraft,
    ) -> Result<RoutingDecision, AppError> {
        let areas = store.list_service_areas().await?;
        let nearest = nearest_areas(
            &draft.destination,
            &areas,
            self.policy.nearest_area_count,
        );

        let area_ids: Vec<Uuid> = nearest.iter().map(|area| area.id).collect();
        let mut branches_by_area: HashMap<Uuid, Vec<Branch>> = HashMap::new();
        for branch in store.list_branches(&area_ids).await? {
            if let Some(area_id) = branch.area_id {
                branches_by_area.entry(area_id).or_default().push(branch);
            }
        }

        Ok(self.decide(draft, &nearest, &branches_by_area))
    }

    fn decide(
        &self,
        draft: &OrderDraft,
        nearest: &[ServiceArea],
        branches_by_area: &HashMap<Uuid, Vec<Branch>>,
    ) -> RoutingDecision {
        let candidates: Vec<Branch> = nearest
            .iter()
            .filter_map(|area| branches_by_area.get(&area.id))
            .flatten()
            .cloned()
            .collect();

        let serviceable = filter_serviceable(
            &draft.destination,
            &candidates,
            self.policy.proximity_threshold_m,
        );

        debug!(
            areas = nearest.len(),
            candidates = candidates.len(),
            serviceable = serviceable.len(),
            "resolved branch candidates"
        );

        if serviceable.iter().any(|branch| branch.id == draft.branch_id) {
            info!(branch_id = %draft.branch_id, "order routed to branch");
            RoutingDecision::pending(draft.branch_id)
        } else {
            info!(branch_id = %draft.branch_id, "requested branch cannot serve destination");
            RoutingDecision::rejected()
        }
    }
}
