//! `CacheMetrics` over the `metrics` facade.
//!
//! Whatever exporter the binary installs receives the series; with none
//! installed the calls are no-ops.

use std::time::Duration;

use crate::domain::ports::{CacheMetrics, Outcome};

const CYCLES_TOTAL: &str = "fleetcache_agent_cycles_total";
const CYCLE_SECONDS: &str = "fleetcache_agent_cycle_seconds";
const ON_DEMAND_TOTAL: &str = "fleetcache_on_demand_total";
const ON_DEMAND_SECONDS: &str = "fleetcache_on_demand_seconds";

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub const fn new() -> Self {
        Self
    }
}

impl CacheMetrics for MetricsRecorder {
    fn record_cycle(&self, provider: &str, kind: &str, outcome: Outcome, elapsed: Duration) {
        ::metrics::counter!(
            CYCLES_TOTAL,
            "provider" => provider.to_string(),
            "kind" => kind.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        ::metrics::histogram!(
            CYCLE_SECONDS,
            "provider" => provider.to_string(),
            "kind" => kind.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    fn record_on_demand(&self, provider: &str, kind: &str, outcome: Outcome, elapsed: Duration) {
        ::metrics::counter!(
            ON_DEMAND_TOTAL,
            "provider" => provider.to_string(),
            "kind" => kind.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        ::metrics::histogram!(
            ON_DEMAND_SECONDS,
            "provider" => provider.to_string(),
            "kind" => kind.to_string()
        )
        .record(elapsed.as_secs_f64());
    }
}
