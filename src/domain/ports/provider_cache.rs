//! Provider cache port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CacheData, RelationshipFilter};

/// Shared read/write cache every agent writes into and every reader hydrates from.
///
/// Unknown namespaces and ids read as empty rather than failing. Glob patterns
/// use `*`, `?`, `[...]` and `\` escapes over the colon-delimited id scheme; a
/// malformed pattern matches only an id equal to it literally. Store failures
/// are returned, never swallowed.
#[async_trait]
pub trait ProviderCache: Send + Sync {
    /// Write entries, replacing any existing entry with the same id.
    async fn upsert(&self, namespace: &str, entries: Vec<CacheData>) -> DomainResult<()>;

    /// Write entries on top of existing ones: attributes overlaid, relationships unioned.
    async fn merge(&self, namespace: &str, entries: Vec<CacheData>) -> DomainResult<()>;

    /// Remove ids; missing ids are ignored.
    async fn evict(&self, namespace: &str, ids: &[String]) -> DomainResult<()>;

    /// Read one entry.
    async fn get(
        &self,
        namespace: &str,
        id: &str,
        filter: &RelationshipFilter,
    ) -> DomainResult<Option<CacheData>>;

    /// Read many entries; absent ids are skipped.
    async fn get_all(
        &self,
        namespace: &str,
        ids: &[String],
        filter: &RelationshipFilter,
    ) -> DomainResult<Vec<CacheData>>;

    /// Ids in a namespace matching a glob pattern, sorted.
    async fn filter_identifiers(&self, namespace: &str, glob: &str) -> DomainResult<Vec<String>>;

    /// The subset of candidate ids currently present.
    async fn existing_identifiers(
        &self,
        namespace: &str,
        candidates: &[String],
    ) -> DomainResult<Vec<String>>;
}
