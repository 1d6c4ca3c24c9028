//! Settings the request hoop reads on every request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::observability::{LoggingConfig, TraceExportConfig};

static SLOW_REQUEST_THRESHOLD_MS: AtomicU64 = AtomicU64::new(1_000);
static PROPAGATE_PARENT: AtomicBool = AtomicBool::new(false);

pub(super) fn apply(logging: &LoggingConfig, traces: &TraceExportConfig) {
    SLOW_REQUEST_THRESHOLD_MS.store(logging.slow_request_threshold_ms, Ordering::Relaxed);
    PROPAGATE_PARENT.store(traces.propagates_parent(), Ordering::Relaxed);
}

pub(super) fn slow_request_threshold_ms() -> u64 {
    SLOW_REQUEST_THRESHOLD_MS.load(Ordering::Relaxed)
}

pub(super) fn otel_parent_propagation_enabled() -> bool {
    PROPAGATE_PARENT.load(Ordering::Relaxed)
}
