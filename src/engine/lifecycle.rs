use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Order, OrderStatus, StatusChange};
use crate::state::AppState;
use crate::store::StoreError;

/// Waits between lifecycle checkpoints, measured in abstract time-units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDurations {
    pub time_unit: Duration,
    pub accept_units: u32,
    pub pickup_units: u32,
    pub deliver_units: u32,
}

impl Default for StageDurations {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_secs(1),
            accept_units: 15,
            pickup_units: 30,
            deliver_units: 60,
        }
    }
}

impl StageDurations {
    /// Independent waits before the Accepted, PickedUp and Delivered checkpoints.
    /// Saturates at `Duration::MAX`; use [`Self::checked_waits`] to reject
    /// configurations that overflow.
    pub fn waits(&self) -> [Duration; 3] {
        [self.accept_units, self.pickup_units, self.deliver_units]
            .map(|units| self.time_unit.saturating_mul(units))
    }

    /// `None` when any stage, or the whole lifecycle, does not fit in a `Duration`.
    pub fn checked_waits(&self) -> Option<[Duration; 3]> {
        let accept = self.time_unit.checked_mul(self.accept_units)?;
        let pickup = self.time_unit.checked_mul(self.pickup_units)?;
        let deliver = self.time_unit.checked_mul(self.deliver_units)?;
        accept.checked_add(pickup)?.checked_add(deliver)?;
        Some([accept, pickup, deliver])
    }
}

#[derive(Debug)]
pub struct LifecycleFailure {
    pub order_id: Uuid,
    pub error: AppError,
}

/// Pure transition function. Terminal states never move; a pending cancel
/// wins over the scheduled advance.
pub fn next_status(current: OrderStatus, cancel_requested: bool) -> OrderStatus {
    use OrderStatus::*;

    if current.is_terminal() {
        return current;
    }
    if cancel_requested {
        return Cancelled;
    }

    match current {
        Pending => Accepted,
        Accepted => PickedUp,
        PickedUp => Delivered,
        terminal => terminal,
    }
}

/// Spawns the lifecycle task for a freshly placed order. At most one task
/// runs per order; failures go to the supervisor channel.
pub fn start_lifecycle(state: Arc<AppState>, order_id: Uuid) -> Result<JoinHandle<()>, AppError> {
    if !state.active_lifecycles.insert(order_id) {
        return Err(AppError::Conflict(format!(
            "lifecycle already running for order {order_id}"
        )));
    }
    state.metrics.active_lifecycles.inc();

    Ok(tokio::spawn(async move {
        let outcome = drive_order(state.clone(), order_id).await;

        state.active_lifecycles.remove(&order_id);
        state.metrics.active_lifecycles.dec();

        match outcome {
            Ok(status) => info!(order_id = %order_id, status = ?status, "order lifecycle finished"),
            Err(err) => {
                let failure = LifecycleFailure {
                    order_id,
                    error: err,
                };
                if state.lifecycle_failures_tx.send(failure).await.is_err() {
                    error!(order_id = %order_id, "lifecycle supervisor gone; failure dropped");
                }
            }
        }
    }))
}

/// Advances a `Pending` order to `Delivered`, re-reading the row before every
/// write and stopping as soon as it observes `Cancelled`. A failed write ends
/// the run and leaves the order at its last persisted status.
pub async fn drive_order(state: Arc<AppState>, order_id: Uuid) -> Result<OrderStatus, AppError> {
    let order = fetch_order(&state, order_id).await?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::LifecycleNotPending {
            order_id,
            status: order.status,
        });
    }

    info!(order_id = %order_id, "order lifecycle started");
    let mut current = OrderStatus::Pending;

    for wait in state.stages.waits() {
        sleep(wait).await;

        let observed = fetch_order(&state, order_id).await?.status;
        if observed == OrderStatus::Cancelled {
            info!(order_id = %order_id, reached = ?current, "cancellation observed");
            return Ok(OrderStatus::Cancelled);
        }
        if observed != current {
            return Err(AppError::IllegalTransition {
                from: observed,
                to: next_status(current, false),
            });
        }

        let next = next_status(observed, false);
        match state.store.write_order_status(order_id, next).await {
            Ok(updated) => {
                current = updated.status;
                publish_status(&state, &updated);
            }
            // Cancelled between our read and our write; the write never landed.
            Err(StoreError::IllegalTransition {
                from: OrderStatus::Cancelled,
                ..
            }) => {
                info!(order_id = %order_id, reached = ?current, "cancellation observed");
                return Ok(OrderStatus::Cancelled);
            }
            Err(err) => {
                warn!(order_id = %order_id, to = ?next, error = %err, "status write failed");
                return Err(err.into());
            }
        }
    }

    Ok(current)
}

/// External cancellation. The running lifecycle task notices at its next
/// checkpoint.
pub async fn cancel_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    let order = fetch_order(state, order_id).await?;

    let target = next_status(order.status, true);
    if target == order.status {
        return Err(AppError::IllegalTransition {
            from: order.status,
            to: OrderStatus::Cancelled,
        });
    }

    let updated = state.store.write_order_status(order_id, target).await?;
    publish_status(state, &updated);
    info!(order_id = %order_id, previous = ?order.status, "order cancelled");

    Ok(updated)
}

pub async fn run_lifecycle_supervisor(
    state: Arc<AppState>,
    mut failures: mpsc::Receiver<LifecycleFailure>,
) {
    info!("lifecycle supervisor started");

    while let Some(failure) = failures.recv().await {
        state.metrics.lifecycle_failures_total.inc();

        match &failure.error {
            AppError::LifecycleNotPending { .. } | AppError::IllegalTransition { .. } => error!(
                order_id = %failure.order_id,
                error = %failure.error,
                "lifecycle precondition violated"
            ),
            _ => error!(
                order_id = %failure.order_id,
                error = %failure.error,
                "order lifecycle aborted"
            ),
        }
    }

    warn!("lifecycle supervisor stopped: failure channel closed");
}

fn publish_status(state: &AppState, order: &Order) {
    state
        .metrics
        .lifecycle_transitions_total
        .with_label_values(&[&format!("{:?}", order.status)])
        .inc();

    let _ = state.status_events_tx.send(StatusChange {
        order_id: order.id,
        status: order.status,
        changed_at: order.updated_at.unwrap_or_else(Utc::now),
    });
}

async fn fetch_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::broadcast;
    use tokio::time::{Instant, sleep};
    use uuid::Uuid;

    use super::{StageDurations, cancel_order, drive_order, next_status, start_lifecycle};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::geo::Coordinate;
    use crate::models::area::ServiceArea;
    use crate::models::branch::Branch;
    use crate::models::order::{Order, OrderDraft, OrderStatus, StatusChange};
    use crate::models::restaurant::{MenuItem, Restaurant};
    use crate::state::AppState;
    use crate::store::{MemoryStore, Store, StoreError};

    const UNIT: Duration = Duration::from_secs(1);

    fn order(status: OrderStatus) -> Order {
        Order::from_draft(
            OrderDraft {
                customer_id: Uuid::new_v4(),
                branch_id: Uuid::new_v4(),
                destination: Coordinate::from_degrees(23.7942, 90.4041).unwrap(),
                items: vec![],
            },
            status,
        )
    }

    async fn setup(store: Arc<dyn Store>, status: OrderStatus) -> (Arc<AppState>, Uuid) {
        let (state, _failures) = AppState::new(&Config::default(), store);
        let order = order(status);
        let id = order.id;
        state.store.insert_order(order).await.unwrap();
        (Arc::new(state), id)
    }

    fn drain(rx: &mut broadcast::Receiver<StatusChange>) -> Vec<OrderStatus> {
        let mut seen = Vec::new();
        while let Ok(change) = rx.try_recv() {
            seen.push(change.status);
        }
        seen
    }

    async fn status_of(state: &AppState, id: Uuid) -> OrderStatus {
        state.store.get_order(id).await.unwrap().unwrap().status
    }

    #[test]
    fn oversized_stage_durations_do_not_overflow() {
        let huge = StageDurations {
            time_unit: Duration::from_secs(u64::MAX / 2),
            ..StageDurations::default()
        };

        assert_eq!(huge.checked_waits(), None);
        assert_eq!(huge.waits(), [Duration::MAX; 3]);
        assert_eq!(
            StageDurations::default().checked_waits(),
            Some([UNIT * 15, UNIT * 30, UNIT * 60])
        );
    }

    #[test]
    fn transition_function_follows_success_path() {
        assert_eq!(next_status(OrderStatus::Pending, false), OrderStatus::Accepted);
        assert_eq!(next_status(OrderStatus::Accepted, false), OrderStatus::PickedUp);
        assert_eq!(next_status(OrderStatus::PickedUp, false), OrderStatus::Delivered);
    }

    #[test]
    fn transition_function_prefers_cancellation() {
        for status in [OrderStatus::Pending, OrderStatus::Accepted, OrderStatus::PickedUp] {
            assert_eq!(next_status(status, true), OrderStatus::Cancelled);
        }
    }

    #[test]
    fn transition_function_never_leaves_terminal_states() {
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Rejected,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(next_status(status, false), status);
            assert_eq!(next_status(status, true), status);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn uninterrupted_order_is_delivered_after_105_units() {
        let (state, id) = setup(Arc::new(MemoryStore::new()), OrderStatus::Pending).await;
        let mut events = state.status_events_tx.subscribe();

        let start = Instant::now();
        let outcome = drive_order(state.clone(), id).await.unwrap();

        assert_eq!(outcome, OrderStatus::Delivered);
        assert_eq!(start.elapsed(), UNIT * 105);
        assert_eq!(status_of(&state, id).await, OrderStatus::Delivered);
        assert_eq!(
            drain(&mut events),
            vec![
                OrderStatus::Accepted,
                OrderStatus::PickedUp,
                OrderStatus::Delivered
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn starting_on_a_non_pending_order_is_refused() {
        let (state, id) = setup(Arc::new(MemoryStore::new()), OrderStatus::Accepted).await;

        let err = drive_order(state.clone(), id).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::LifecycleNotPending {
                status: OrderStatus::Accepted,
                ..
            }
        ));
        assert_eq!(status_of(&state, id).await, OrderStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_checkpoint_never_accepts() {
        let (state, id) = setup(Arc::new(MemoryStore::new()), OrderStatus::Pending).await;
        let mut events = state.status_events_tx.subscribe();

        let task = tokio::spawn(drive_order(state.clone(), id));
        sleep(UNIT * 10).await;
        cancel_order(&state, id).await.unwrap();

        assert_eq!(task.await.unwrap().unwrap(), OrderStatus::Cancelled);
        assert_eq!(drain(&mut events), vec![OrderStatus::Cancelled]);
        assert_eq!(status_of(&state, id).await, OrderStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_after_acceptance_never_picks_up() {
        let (state, id) = setup(Arc::new(MemoryStore::new()), OrderStatus::Pending).await;
        let mut events = state.status_events_tx.subscribe();

        let task = tokio::spawn(drive_order(state.clone(), id));
        sleep(UNIT * 20).await;
        assert_eq!(status_of(&state, id).await, OrderStatus::Accepted);
        cancel_order(&state, id).await.unwrap();

        assert_eq!(task.await.unwrap().unwrap(), OrderStatus::Cancelled);
        assert_eq!(
            drain(&mut events),
            vec![OrderStatus::Accepted, OrderStatus::Cancelled]
        );
        assert_eq!(status_of(&state, id).await, OrderStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_terminal_order_is_illegal() {
        let (state, id) = setup(Arc::new(MemoryStore::new()), OrderStatus::Pending).await;
        drive_order(state.clone(), id).await.unwrap();

        let err = cancel_order(&state, id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::IllegalTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn one_orders_cancellation_does_not_affect_another() {
        let (state, first) = setup(Arc::new(MemoryStore::new()), OrderStatus::Pending).await;
        let second_order = order(OrderStatus::Pending);
        let second = second_order.id;
        state.store.insert_order(second_order).await.unwrap();

        let a = tokio::spawn(drive_order(state.clone(), first));
        let b = tokio::spawn(drive_order(state.clone(), second));
        sleep(UNIT * 50).await;
        cancel_order(&state, first).await.unwrap();

        assert_eq!(a.await.unwrap().unwrap(), OrderStatus::Cancelled);
        assert_eq!(b.await.unwrap().unwrap(), OrderStatus::Delivered);
    }

    /// What happens to a lifecycle write aimed at a given status.
    enum WriteIntercept {
        Fail(OrderStatus),
        /// A cancel lands after the driver's read but before its write.
        CancelBefore(OrderStatus),
    }

    /// Delegates to a `MemoryStore`, intercepting one lifecycle write.
    struct InterceptingStore {
        inner: MemoryStore,
        intercept: WriteIntercept,
    }

    impl InterceptingStore {
        fn new(intercept: WriteIntercept) -> Self {
            Self {
                inner: MemoryStore::new(),
                intercept,
            }
        }
    }

    #[async_trait]
    impl Store for InterceptingStore {
        async fn list_service_areas(&self) -> Result<Vec<ServiceArea>, StoreError> {
            self.inner.list_service_areas().await
        }

        async fn list_branches(&self, area_ids: &[Uuid]) -> Result<Vec<Branch>, StoreError> {
            self.inner.list_branches(area_ids).await
        }

        async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
            self.inner.get_order(id).await
        }

        async fn write_order_status(
            &self,
            id: Uuid,
            status: OrderStatus,
        ) -> Result<Order, StoreError> {
            match self.intercept {
                WriteIntercept::Fail(target) if target == status => {
                    return Err(StoreError::Backend("disk full".to_string()));
                }
                WriteIntercept::CancelBefore(target) if target == status => {
                    self.inner
                        .write_order_status(id, OrderStatus::Cancelled)
                        .await?;
                }
                _ => {}
            }
            self.inner.write_order_status(id, status).await
        }

        async fn insert_area(&self, area: ServiceArea) -> Result<(), StoreError> {
            self.inner.insert_area(area).await
        }

        async fn insert_branch(&self, branch: Branch) -> Result<(), StoreError> {
            self.inner.insert_branch(branch).await
        }

        async fn get_branch(&self, id: Uuid) -> Result<Option<Branch>, StoreError> {
            self.inner.get_branch(id).await
        }

        async fn list_all_branches(&self) -> Result<Vec<Branch>, StoreError> {
            self.inner.list_all_branches().await
        }

        async fn insert_restaurant(&self, restaurant: Restaurant) -> Result<(), StoreError> {
            self.inner.insert_restaurant(restaurant).await
        }

        async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError> {
            self.inner.get_restaurant(id).await
        }

        async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
            self.inner.list_restaurants().await
        }

        async fn insert_item(&self, item: MenuItem) -> Result<(), StoreError> {
            self.inner.insert_item(item).await
        }

        async fn get_item(&self, id: Uuid) -> Result<Option<MenuItem>, StoreError> {
            self.inner.get_item(id).await
        }

        async fn list_items(&self, restaurant_id: Uuid) -> Result<Vec<MenuItem>, StoreError> {
            self.inner.list_items(restaurant_id).await
        }

        async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
            self.inner.insert_order(order).await
        }

        async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_between_read_and_write_wins() {
        let store = Arc::new(InterceptingStore::new(WriteIntercept::CancelBefore(
            OrderStatus::PickedUp,
        )));
        let (state, id) = setup(store, OrderStatus::Pending).await;
        let mut events = state.status_events_tx.subscribe();

        let outcome = drive_order(state.clone(), id).await.unwrap();

        assert_eq!(outcome, OrderStatus::Cancelled);
        assert_eq!(drain(&mut events), vec![OrderStatus::Accepted]);
        sleep(UNIT * 200).await;
        assert_eq!(status_of(&state, id).await, OrderStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_stops_at_last_persisted_status() {
        let store = Arc::new(InterceptingStore::new(WriteIntercept::Fail(
            OrderStatus::PickedUp,
        )));
        let (state, id) = setup(store, OrderStatus::Pending).await;

        let err = drive_order(state.clone(), id).await.unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        sleep(UNIT * 200).await;
        assert_eq!(status_of(&state, id).await, OrderStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn start_lifecycle_reports_failures_to_supervisor_channel() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (state, mut failures) = AppState::new(&Config::default(), store);
        let state = Arc::new(state);
        let accepted = order(OrderStatus::Accepted);
        let id = accepted.id;
        state.store.insert_order(accepted).await.unwrap();

        start_lifecycle(state.clone(), id).unwrap().await.unwrap();

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.order_id, id);
        assert!(matches!(failure.error, AppError::LifecycleNotPending { .. }));
        assert!(state.active_lifecycles.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_lifecycle_per_order() {
        let (state, id) = setup(Arc::new(MemoryStore::new()), OrderStatus::Pending).await;

        let first = start_lifecycle(state.clone(), id).unwrap();
        let second = start_lifecycle(state.clone(), id);

        assert!(matches!(second, Err(AppError::Conflict(_))));
        first.await.unwrap();
        assert_eq!(status_of(&state, id).await, OrderStatus::Delivered);
    }
}
