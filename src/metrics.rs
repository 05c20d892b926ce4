use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub const BATCHES_TOTAL: &str = "card_enricher_batches_total";
pub const ITEMS_TOTAL: &str = "card_enricher_items_total";
pub const REMOTE_CALL_DURATION: &str = "card_enricher_remote_call_duration_seconds";
pub const EVENTS_DROPPED_TOTAL: &str = "card_enricher_events_dropped_total";

/// Install the Prometheus recorder. Returns `None` if one is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder install failed: {}", e);
            None
        }
    }
}

pub fn batch_started() {
    counter!(BATCHES_TOTAL).increment(1);
}

/// `outcome` is "success" or an error kind.
pub fn item_finished(outcome: &'static str) {
    counter!(ITEMS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn event_dropped() {
    counter!(EVENTS_DROPPED_TOTAL).increment(1);
}

/// Records the elapsed time of one catalog call when dropped.
pub struct RemoteCallTimer {
    start: Instant,
    operation: &'static str,
}

impl RemoteCallTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for RemoteCallTimer {
    fn drop(&mut self) {
        histogram!(REMOTE_CALL_DURATION, "operation" => self.operation)
            .record(self.start.elapsed().as_secs_f64());
    }
}
