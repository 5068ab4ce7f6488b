//! Cache data model: entries, authority, relationship filters and poll results.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::errors::DomainError;

/// Attribute bag of a cache entry.
pub type Attributes = Map<String, Value>;

/// Directed relationships from one entry, keyed by target namespace.
pub type Relationships = BTreeMap<String, BTreeSet<String>>;

/// Whether an agent owns the id-space of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    /// Sole source of truth for its key range; may evict.
    Authoritative,
    /// Supplements entries owned by another agent; never evicts.
    Informative,
}

impl Authority {
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::Authoritative)
    }
}

/// A namespace an agent produces, with the authority it holds over it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentDataType {
    pub namespace: String,
    pub authority: Authority,
}

impl AgentDataType {
    pub fn authoritative(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            authority: Authority::Authoritative,
        }
    }

    pub fn informative(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            authority: Authority::Informative,
        }
    }
}

/// One cached entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheData {
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub relationships: Relationships,
    /// Time-to-live from the moment the entry is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
}

impl CacheData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
            relationships: Relationships::new(),
            ttl: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_relationship(mut self, namespace: impl Into<String>, id: impl Into<String>) -> Self {
        self.relationships
            .entry(namespace.into())
            .or_default()
            .insert(id.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Related ids in one namespace; empty when none are recorded.
    pub fn related(&self, namespace: &str) -> impl Iterator<Item = &String> {
        self.relationships.get(namespace).into_iter().flatten()
    }

    /// String attribute lookup.
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Copy of this entry keeping only the relationship namespaces the filter allows.
    pub fn filtered(&self, filter: &RelationshipFilter) -> Self {
        let relationships = self
            .relationships
            .iter()
            .filter(|(namespace, _)| filter.includes(namespace))
            .map(|(namespace, ids)| (namespace.clone(), ids.clone()))
            .collect();
        Self {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
            relationships,
            ttl: self.ttl,
        }
    }

    /// Overlay another entry for the same id: attributes are replaced key by
    /// key, relationships are unioned.
    pub fn merge_from(&mut self, other: Self) {
        self.attributes.extend(other.attributes);
        for (namespace, ids) in other.relationships {
            self.relationships.entry(namespace).or_default().extend(ids);
        }
        if other.ttl.is_some() {
            self.ttl = other.ttl;
        }
    }
}

/// Which relationship namespaces a read should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RelationshipFilter {
    #[default]
    All,
    None,
    Only(BTreeSet<String>),
}

impl RelationshipFilter {
    pub fn only<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(namespaces.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, namespace: &str) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Only(set) => set.contains(namespace),
        }
    }
}

/// How many relationship hops a hydrating read expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    /// The entity alone, relationship collections left empty.
    None,
    /// Related entities identified by name, without their attributes.
    #[default]
    NamesOnly,
    /// Related entities read in full, one hop, reverse direction at `None`.
    Full,
}

impl FromStr for Detail {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "names_only" | "names-only" => Ok(Self::NamesOnly),
            "full" => Ok(Self::Full),
            other => Err(DomainError::ValidationFailed(format!(
                "Invalid detail level: {other}"
            ))),
        }
    }
}

/// Everything one poll cycle produced: per-namespace entries to upsert and
/// per-namespace ids to evict explicitly.
///
/// Built by [`crate::services::CacheResultBuilder`]; immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheResult {
    cache_results: BTreeMap<String, Vec<CacheData>>,
    evictions: BTreeMap<String, Vec<String>>,
}

impl CacheResult {
    pub(crate) fn from_parts(
        cache_results: BTreeMap<String, Vec<CacheData>>,
        evictions: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            cache_results,
            evictions,
        }
    }

    /// Entries for a namespace; empty when the cycle produced none.
    pub fn entries(&self, namespace: &str) -> &[CacheData] {
        self.cache_results
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Explicit evictions for a namespace.
    pub fn evictions_for(&self, namespace: &str) -> &[String] {
        self.evictions
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn cache_results(&self) -> &BTreeMap<String, Vec<CacheData>> {
        &self.cache_results
    }

    pub fn evictions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.evictions
    }

    /// Ids produced for a namespace.
    pub fn ids(&self, namespace: &str) -> BTreeSet<&str> {
        self.entries(namespace).iter().map(|d| d.id.as_str()).collect()
    }

    pub fn total_entries(&self) -> usize {
        self.cache_results.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cache_results.values().all(Vec::is_empty) && self.evictions.values().all(Vec::is_empty)
    }
}
