//! Accumulates one poll cycle's upserts and evictions per namespace.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde_json::Value;

use crate::domain::models::{Attributes, CacheData, CacheResult, Relationships};

/// Builder for a single entry.
#[derive(Debug, Clone)]
pub struct CacheDataBuilder {
    id: String,
    attributes: Attributes,
    relationships: Relationships,
    ttl: Option<Duration>,
}

impl CacheDataBuilder {
    fn new(id: String) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
            relationships: Relationships::new(),
            ttl: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes(&mut self, attributes: Attributes) -> &mut Self {
        self.attributes.extend(attributes);
        self
    }

    /// Add one related id; repeated calls accumulate.
    pub fn relationship(&mut self, namespace: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.relationships
            .entry(namespace.into())
            .or_default()
            .insert(id.into());
        self
    }

    pub fn relationships<I, S>(&mut self, namespace: &str, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships
            .entry(namespace.to_string())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn ttl(&mut self, ttl: Duration) -> &mut Self {
        self.ttl = Some(ttl);
        self
    }

    fn build(self) -> CacheData {
        CacheData {
            id: self.id,
            attributes: self.attributes,
            relationships: self.relationships,
            ttl: self.ttl,
        }
    }
}

/// Entries and evictions for one namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceBuilder {
    keep: BTreeMap<String, CacheDataBuilder>,
    evict: BTreeSet<String>,
}

impl NamespaceBuilder {
    /// Builder for the entry with `id`, created on first use.
    pub fn keep(&mut self, id: impl Into<String>) -> &mut CacheDataBuilder {
        let id = id.into();
        self.keep
            .entry(id.clone())
            .or_insert_with(|| CacheDataBuilder::new(id))
    }

    /// Request explicit eviction of `id`.
    pub fn evict(&mut self, id: impl Into<String>) -> &mut Self {
        self.evict.insert(id.into());
        self
    }

    pub fn evict_all<I, S>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evict.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn keep_count(&self) -> usize {
        self.keep.len()
    }

    pub fn evict_count(&self) -> usize {
        self.evict.len()
    }
}

/// Collects a cycle's output; [`CacheResultBuilder::build`] freezes it.
///
/// Each namespace has its own builder so entries written under one namespace
/// never leak into another. An id both kept and evicted in the same namespace
/// is kept.
#[derive(Debug, Clone, Default)]
pub struct CacheResultBuilder {
    namespaces: BTreeMap<String, NamespaceBuilder>,
}

impl CacheResultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for `namespace`, created on first use.
    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut NamespaceBuilder {
        self.namespaces.entry(namespace.into()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces
            .values()
            .all(|ns| ns.keep.is_empty() && ns.evict.is_empty())
    }

    pub fn build(self) -> CacheResult {
        let mut cache_results = BTreeMap::new();
        let mut evictions = BTreeMap::new();

        for (namespace, builder) in self.namespaces {
            let NamespaceBuilder { keep, evict } = builder;
            let evicted: Vec<String> = evict
                .into_iter()
                .filter(|id| !keep.contains_key(id))
                .collect();
            let entries: Vec<CacheData> = keep.into_values().map(CacheDataBuilder::build).collect();

            if !evicted.is_empty() {
                evictions.insert(namespace.clone(), evicted);
            }
            cache_results.insert(namespace, entries);
        }

        CacheResult::from_parts(cache_results, evictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaces_are_independent() {
        let mut builder = CacheResultBuilder::new();
        builder
            .namespace("serverGroups")
            .keep("sg-1")
            .attribute("name", "app-v001")
            .relationship("instances", "i-1");
        builder.namespace("instances").keep("i-1").attribute("state", "running");

        let result = builder.build();
        assert_eq!(result.entries("serverGroups").len(), 1);
        assert_eq!(result.entries("instances").len(), 1);
        assert!(result.entries("serverGroups")[0].attributes.get("state").is_none());
        assert!(result.entries("instances")[0].relationships.is_empty());
    }

    #[test]
    fn test_keep_accumulates_on_same_id() {
        let mut builder = CacheResultBuilder::new();
        builder
            .namespace("loadBalancers")
            .keep("lb-1")
            .relationship("serverGroups", "sg-1");
        builder
            .namespace("loadBalancers")
            .keep("lb-1")
            .relationship("serverGroups", "sg-2")
            .attribute("scheme", json!("internal"));

        let result = builder.build();
        let entry = &result.entries("loadBalancers")[0];
        assert_eq!(entry.related("serverGroups").count(), 2);
        assert_eq!(entry.attribute_str("scheme"), Some("internal"));
    }

    #[test]
    fn test_kept_id_is_not_evicted() {
        let mut builder = CacheResultBuilder::new();
        let ns = builder.namespace("images");
        ns.keep("img-1");
        ns.evict("img-1").evict("img-2");

        let result = builder.build();
        assert_eq!(result.evictions_for("images"), ["img-2".to_string()]);
    }

    #[test]
    fn test_touched_namespace_survives_empty() {
        let mut builder = CacheResultBuilder::new();
        builder.namespace("clusters");
        assert!(builder.is_empty());

        let result = builder.build();
        assert!(result.cache_results().contains_key("clusters"));
        assert!(result.entries("clusters").is_empty());
    }
}
