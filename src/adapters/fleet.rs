//! Fleet membership fed by static configuration or an external discovery loop.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::ports::FleetMembership;

/// Pod index fixed at startup; fleet size updatable by whatever watches the
/// deployment.
#[derive(Debug)]
pub struct StaticFleet {
    pod_index: usize,
    pod_count: AtomicUsize,
}

impl StaticFleet {
    pub fn new(pod_index: usize, pod_count: usize) -> Self {
        Self {
            pod_index,
            pod_count: AtomicUsize::new(pod_count.max(1)),
        }
    }

    /// Record a newly observed fleet size; takes effect on the next tick.
    pub fn set_pod_count(&self, pod_count: usize) {
        let previous = self.pod_count.swap(pod_count.max(1), Ordering::AcqRel);
        if previous != pod_count {
            tracing::info!(previous, pod_count, "Fleet size changed");
        }
    }
}

impl FleetMembership for StaticFleet {
    fn pod_index(&self) -> usize {
        self.pod_index
    }

    fn pod_count(&self) -> usize {
        self.pod_count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_count_never_zero() {
        let fleet = StaticFleet::new(0, 0);
        assert_eq!(fleet.pod_count(), 1);
        fleet.set_pod_count(4);
        assert_eq!(fleet.pod_count(), 4);
        fleet.set_pod_count(0);
        assert_eq!(fleet.pod_count(), 1);
    }
}
