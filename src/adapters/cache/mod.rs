//! In-memory caching layer for hot-path cache reads.
//!
//! Uses `moka` for TTL-based concurrent caching with write-through
//! invalidation. Wraps the `ProviderCache` port as a decorator.

pub mod cached_provider_cache;

pub use cached_provider_cache::CachedProviderCache;
