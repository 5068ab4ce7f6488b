//! Fleet membership port.

/// Source of this pod's index and the currently observed fleet size.
///
/// Values are eventually consistent; pods may briefly disagree during scaling
/// events, which costs at most one interval of duplicate or missed polling.
pub trait FleetMembership: Send + Sync {
    /// Zero-based index of this pod.
    fn pod_index(&self) -> usize;

    /// Number of pods currently in the fleet.
    fn pod_count(&self) -> usize;
}
