use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::lifecycle::{LifecycleFailure, StageDurations};
use crate::engine::routing::OrderRouter;
use crate::models::order::StatusChange;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub router: OrderRouter,
    pub stages: StageDurations,
    pub active_lifecycles: DashSet<Uuid>,
    pub lifecycle_failures_tx: mpsc::Sender<LifecycleFailure>,
    pub status_events_tx: broadcast::Sender<StatusChange>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
    ) -> (Self, mpsc::Receiver<LifecycleFailure>) {
        let (lifecycle_failures_tx, failures_rx) = mpsc::channel(config.failure_queue_size);
        let (status_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        (
            Self {
                store,
                router: OrderRouter::new(config.routing),
                stages: config.stages,
                active_lifecycles: DashSet::new(),
                lifecycle_failures_tx,
                status_events_tx,
                metrics: Metrics::new(),
            },
            failures_rx,
        )
    }
}
