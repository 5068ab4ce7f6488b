//! Metrics hook port.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a scheduled cycle or on-demand refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    Miss,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::Miss => "miss",
        }
    }
}

/// Receives cycle and refresh results tagged by provider and resource kind.
pub trait CacheMetrics: Send + Sync {
    fn record_cycle(&self, provider: &str, kind: &str, outcome: Outcome, elapsed: Duration);

    fn record_on_demand(&self, provider: &str, kind: &str, outcome: Outcome, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    fn record_cycle(&self, _provider: &str, _kind: &str, _outcome: Outcome, _elapsed: Duration) {}

    fn record_on_demand(&self, _provider: &str, _kind: &str, _outcome: Outcome, _elapsed: Duration) {}
}
