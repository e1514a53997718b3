use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_routed_total: IntCounterVec,
    pub routing_latency_seconds: HistogramVec,
    pub lifecycle_transitions_total: IntCounterVec,
    pub active_lifecycles: IntGauge,
    pub lifecycle_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_routed_total = IntCounterVec::new(
            Opts::new("orders_routed_total", "Routed orders by outcome"),
            &["outcome"],
        )
        .expect("valid orders_routed_total metric");

        let routing_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "routing_latency_seconds",
                "Latency of order routing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid routing_latency_seconds metric");

        let lifecycle_transitions_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_transitions_total",
                "Persisted order status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid lifecycle_transitions_total metric");

        let active_lifecycles =
            IntGauge::new("active_lifecycles", "Order lifecycle tasks currently running")
                .expect("valid active_lifecycles metric");

        let lifecycle_failures_total = IntCounter::new(
            "lifecycle_failures_total",
            "Lifecycle tasks that ended with an error",
        )
        .expect("valid lifecycle_failures_total metric");

        registry
            .register(Box::new(orders_routed_total.clone()))
            .expect("register orders_routed_total");
        registry
            .register(Box::new(routing_latency_seconds.clone()))
            .expect("register routing_latency_seconds");
        registry
            .register(Box::new(lifecycle_transitions_total.clone()))
            .expect("register lifecycle_transitions_total");
        registry
            .register(Box::new(active_lifecycles.clone()))
            .expect("register active_lifecycles");
        registry
            .register(Box::new(lifecycle_failures_total.clone()))
            .expect("register lifecycle_failures_total");

        Self {
            registry,
            orders_routed_total,
            routing_latency_seconds,
            lifecycle_transitions_total,
            active_lifecycles,
            lifecycle_failures_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
