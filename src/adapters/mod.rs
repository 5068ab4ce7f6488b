//! Adapters implementing the domain ports.

pub mod cache;
pub mod fleet;
pub mod memory;
pub mod metrics;

pub use cache::CachedProviderCache;
pub use fleet::StaticFleet;
pub use memory::InMemoryProviderCache;
pub use self::metrics::MetricsRecorder;
