//! Cached wrapper for ProviderCache using moka TTL cache.
//!
//! Caches single-entity reads (5s TTL) for hydrating readers, which fetch the
//! same server groups and load balancers repeatedly while expanding
//! relationships. Every write invalidates the ids it touches and bumps a
//! write generation; a read that overlapped a write does not keep what it
//! fetched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CacheData, RelationshipFilter};
use crate::domain::ports::ProviderCache;

/// Default TTL for cached entries.
const ENTRY_CACHE_TTL_SECS: u64 = 5;

/// Maximum number of cached entries.
const ENTRY_CACHE_MAX_CAPACITY: u64 = 10_000;

type EntryKey = (String, String);

/// Read-through provider cache decorator.
///
/// Entries are cached unfiltered and filtered per read. Entries carrying
/// their own TTL are never cached here, so expiry stays exact. Identifier
/// queries always go to the inner store.
pub struct CachedProviderCache<C: ProviderCache> {
    inner: Arc<C>,
    entries: Cache<EntryKey, Arc<CacheData>>,
    generation: AtomicU64,
}

impl<C: ProviderCache> CachedProviderCache<C> {
    /// Create a new cached provider cache with default TTL.
    pub fn new(inner: Arc<C>) -> Self {
        Self::with_ttl(inner, Duration::from_secs(ENTRY_CACHE_TTL_SECS))
    }

    /// Create with custom TTL.
    pub fn with_ttl(inner: Arc<C>, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(ENTRY_CACHE_MAX_CAPACITY)
            .time_to_live(ttl)
            .build();

        Self {
            inner,
            entries,
            generation: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    fn key(namespace: &str, id: &str) -> EntryKey {
        (namespace.to_string(), id.to_string())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Called after the inner write: bump first, then drop the ids.
    async fn invalidate<'a, I>(&self, namespace: &str, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for id in ids {
            self.entries.invalidate(&Self::key(namespace, id)).await;
        }
    }

    /// Keep `data` fetched at `seen`; dropped again if a write landed since.
    async fn remember(&self, namespace: &str, data: &CacheData, seen: u64) {
        if data.ttl.is_some() || self.generation() != seen {
            return;
        }
        let key = Self::key(namespace, &data.id);
        self.entries.insert(key.clone(), Arc::new(data.clone())).await;
        if self.generation() != seen {
            self.entries.invalidate(&key).await;
        }
    }
}

#[async_trait]
impl<C: ProviderCache + 'static> ProviderCache for CachedProviderCache<C> {
    async fn upsert(&self, namespace: &str, entries: Vec<CacheData>) -> DomainResult<()> {
        let ids: Vec<String> = entries.iter().map(|d| d.id.clone()).collect();
        let result = self.inner.upsert(namespace, entries).await;
        // invalidate even on failure: the write may have partially landed
        self.invalidate(namespace, ids.iter().map(String::as_str)).await;
        result
    }

    async fn merge(&self, namespace: &str, entries: Vec<CacheData>) -> DomainResult<()> {
        let ids: Vec<String> = entries.iter().map(|d| d.id.clone()).collect();
        let result = self.inner.merge(namespace, entries).await;
        self.invalidate(namespace, ids.iter().map(String::as_str)).await;
        result
    }

    async fn evict(&self, namespace: &str, ids: &[String]) -> DomainResult<()> {
        let result = self.inner.evict(namespace, ids).await;
        self.invalidate(namespace, ids.iter().map(String::as_str)).await;
        result
    }

    async fn get(
        &self,
        namespace: &str,
        id: &str,
        filter: &RelationshipFilter,
    ) -> DomainResult<Option<CacheData>> {
        if let Some(cached) = self.entries.get(&Self::key(namespace, id)).await {
            return Ok(Some(cached.filtered(filter)));
        }

        // Cache miss - fetch unfiltered from inner
        let seen = self.generation();
        let result = self.inner.get(namespace, id, &RelationshipFilter::All).await?;
        if let Some(ref data) = result {
            self.remember(namespace, data, seen).await;
        }
        Ok(result.map(|data| data.filtered(filter)))
    }

    async fn get_all(
        &self,
        namespace: &str,
        ids: &[String],
        filter: &RelationshipFilter,
    ) -> DomainResult<Vec<CacheData>> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.entries.get(&Self::key(namespace, id)).await {
                Some(cached) => found.push(cached.filtered(filter)),
                None => missing.push(id.clone()),
            }
        }

        if !missing.is_empty() {
            let seen = self.generation();
            let fetched = self
                .inner
                .get_all(namespace, &missing, &RelationshipFilter::All)
                .await?;
            for data in fetched {
                self.remember(namespace, &data, seen).await;
                found.push(data.filtered(filter));
            }
        }
        Ok(found)
    }

    async fn filter_identifiers(&self, namespace: &str, glob: &str) -> DomainResult<Vec<String>> {
        self.inner.filter_identifiers(namespace, glob).await
    }

    async fn existing_identifiers(
        &self,
        namespace: &str,
        candidates: &[String],
    ) -> DomainResult<Vec<String>> {
        self.inner.existing_identifiers(namespace, candidates).await
    }
}
