//! In-process `ProviderCache` backed by per-namespace concurrent maps.
//!
//! Locks are taken per namespace shard and per id, never across the whole
//! store, and no map guard is held across an `.await`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CacheData, RelationshipFilter};
use crate::domain::ports::ProviderCache;

#[derive(Debug, Clone)]
struct StoredEntry {
    data: CacheData,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(data: CacheData) -> Self {
        let expires_at = data.ttl.map(|ttl| Instant::now() + ttl);
        Self { data, expires_at }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type NamespaceMap = Arc<DashMap<String, StoredEntry>>;

/// Reference `ProviderCache` for tests, the CLI and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryProviderCache {
    namespaces: DashMap<String, NamespaceMap>,
}

impl InMemoryProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&self, namespace: &str) -> Option<NamespaceMap> {
        self.namespaces.get(namespace).map(|ns| Arc::clone(ns.value()))
    }

    fn namespace_or_create(&self, namespace: &str) -> NamespaceMap {
        if let Some(ns) = self.namespace(namespace) {
            return ns;
        }
        Arc::clone(self.namespaces.entry(namespace.to_string()).or_default().value())
    }

    fn live(&self, namespace: &str, id: &str) -> Option<CacheData> {
        let ns = self.namespace(namespace)?;
        let now = Instant::now();
        {
            let entry = ns.get(id)?;
            if entry.is_live(now) {
                return Some(entry.data.clone());
            }
        }
        ns.remove_if(id, |_, entry| !entry.is_live(now));
        None
    }

    /// Number of live entries in a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        let now = Instant::now();
        self.namespace(namespace)
            .map_or(0, |ns| ns.iter().filter(|e| e.is_live(now)).count())
    }

    /// Namespaces that have ever been written.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ProviderCache for InMemoryProviderCache {
    async fn upsert(&self, namespace: &str, entries: Vec<CacheData>) -> DomainResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let ns = self.namespace_or_create(namespace);
        for data in entries {
            ns.insert(data.id.clone(), StoredEntry::new(data));
        }
        Ok(())
    }

    async fn merge(&self, namespace: &str, entries: Vec<CacheData>) -> DomainResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let ns = self.namespace_or_create(namespace);
        let now = Instant::now();
        for data in entries {
            let mut slot = ns
                .entry(data.id.clone())
                .or_insert_with(|| StoredEntry::new(CacheData::new(data.id.clone())));
            if !slot.is_live(now) {
                *slot = StoredEntry::new(CacheData::new(data.id.clone()));
            }
            let refresh_ttl = data.ttl.is_some();
            slot.data.merge_from(data);
            if refresh_ttl {
                slot.expires_at = slot.data.ttl.map(|ttl| now + ttl);
            }
        }
        Ok(())
    }

    async fn evict(&self, namespace: &str, ids: &[String]) -> DomainResult<()> {
        if let Some(ns) = self.namespace(namespace) {
            for id in ids {
                ns.remove(id);
            }
        }
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        id: &str,
        filter: &RelationshipFilter,
    ) -> DomainResult<Option<CacheData>> {
        Ok(self.live(namespace, id).map(|data| data.filtered(filter)))
    }

    async fn get_all(
        &self,
        namespace: &str,
        ids: &[String],
        filter: &RelationshipFilter,
    ) -> DomainResult<Vec<CacheData>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.live(namespace, id))
            .map(|data| data.filtered(filter))
            .collect())
    }

    async fn filter_identifiers(&self, namespace: &str, glob: &str) -> DomainResult<Vec<String>> {
        let Some(ns) = self.namespace(namespace) else {
            return Ok(Vec::new());
        };
        let matcher = GlobMatcher::new(glob);
        let now = Instant::now();
        let mut ids: Vec<String> = ns
            .iter()
            .filter(|entry| entry.is_live(now) && matcher.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn existing_identifiers(
        &self,
        namespace: &str,
        candidates: &[String],
    ) -> DomainResult<Vec<String>> {
        let Some(ns) = self.namespace(namespace) else {
            return Ok(Vec::new());
        };
        let now = Instant::now();
        Ok(candidates
            .iter()
            .filter(|id| ns.get(id.as_str()).is_some_and(|entry| entry.is_live(now)))
            .cloned()
            .collect())
    }
}

/// Glob over cache identifiers: `*` any run, `?` one char, `[...]` a class
/// (`[!...]` or `[^...]` negated), `\` escapes the next char.
///
/// A pattern that fails to translate matches only the identical string.
#[derive(Debug)]
pub enum GlobMatcher {
    Pattern(Regex),
    Literal(String),
}

impl GlobMatcher {
    pub fn new(glob: &str) -> Self {
        translate_glob(glob)
            .and_then(|source| Regex::new(&source).ok())
            .map_or_else(|| Self::Literal(glob.to_string()), Self::Pattern)
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Pattern(regex) => regex.is_match(candidate),
            Self::Literal(literal) => literal == candidate,
        }
    }
}

fn translate_glob(glob: &str) -> Option<String> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                let escaped = chars.next()?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => {
                let mut class = String::from("[");
                let mut first = true;
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        ']' if !first => {
                            closed = true;
                            break;
                        }
                        '!' | '^' if first => class.push('^'),
                        '\\' => push_class_literal(&mut class, chars.next()?),
                        '-' => class.push('-'),
                        _ => push_class_literal(&mut class, c),
                    }
                    first = false;
                }
                if !closed {
                    return None;
                }
                class.push(']');
                out.push_str(&class);
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Some(out)
}

fn push_class_literal(class: &mut String, c: char) {
    if matches!(c, '[' | ']' | '\\' | '&' | '~' | '^' | '-') {
        class.push('\\');
    }
    class.push(c);
}
