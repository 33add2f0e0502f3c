use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

/// Metric handles recorded by the dispatch coordinator, labelled with the
/// strategy that owns it. Without an installed recorder every call is a no-op.
#[derive(Clone)]
pub struct DispatchMetrics {
    dispatches_total: Counter,
    immediate_dispatches_total: Counter,
    queued_requests_total: Counter,
    completed_transfers_total: Counter,
    requeued_requests_total: Counter,
    invariant_violations_total: Counter,
    queue_depth: Gauge,
    queue_wait: Histogram,
}

impl DispatchMetrics {
    pub fn new(strategy: &str) -> Self {
        let label = strategy.to_string();
        Self {
            dispatches_total: counter!("wafer_dispatches_total", "strategy" => label.clone()),
            immediate_dispatches_total: counter!(
                "wafer_immediate_dispatches_total",
                "strategy" => label.clone()
            ),
            queued_requests_total: counter!(
                "wafer_queued_requests_total",
                "strategy" => label.clone()
            ),
            completed_transfers_total: counter!(
                "wafer_completed_transfers_total",
                "strategy" => label.clone()
            ),
            requeued_requests_total: counter!(
                "wafer_requeued_requests_total",
                "strategy" => label.clone()
            ),
            invariant_violations_total: counter!(
                "wafer_invariant_violations_total",
                "strategy" => label.clone()
            ),
            queue_depth: gauge!("wafer_queue_depth", "strategy" => label.clone()),
            queue_wait: histogram!("wafer_queue_wait_seconds", "strategy" => label),
        }
    }

    pub fn record_dispatch(&self, from_queue: bool, wait_seconds: f64) {
        self.dispatches_total.increment(1);
        if from_queue {
            self.queue_wait.record(wait_seconds);
        } else {
            self.immediate_dispatches_total.increment(1);
        }
    }

    pub fn record_queued(&self, depth: usize) {
        self.queued_requests_total.increment(1);
        self.queue_depth.set(depth as f64);
    }

    pub fn update_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }

    pub fn record_completion(&self) {
        self.completed_transfers_total.increment(1);
    }

    pub fn record_requeue(&self) {
        self.requeued_requests_total.increment(1);
    }

    pub fn record_violation(&self) {
        self.invariant_violations_total.increment(1);
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new("unlabelled")
    }
}

impl std::fmt::Debug for DispatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMetrics").finish_non_exhaustive()
    }
}
