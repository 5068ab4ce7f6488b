//! Writes a finished poll cycle into the provider cache.
//!
//! Per namespace: entries first, then evictions. Authoritative namespaces are
//! replaced and diffed against the agent's key range; informative namespaces
//! are merged and never evicted from.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    escape_glob, CacheData, CacheResult, Keys, Namespace, OnDemandRecord, RelationshipFilter,
};
use crate::domain::ports::{CachingAgent, PollContext, ProviderCache};

/// What one apply step did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub upserted: usize,
    pub merged: usize,
    pub evicted: usize,
    /// Entries left alone because an on-demand refresh newer than the cycle owns them.
    pub deferred_to_on_demand: usize,
    /// Explicit evictions dropped because the agent is not authoritative.
    pub ignored_evictions: usize,
    pub on_demand_cleared: usize,
}

pub struct CacheApplier<C: ProviderCache> {
    cache: Arc<C>,
}

impl<C: ProviderCache> CacheApplier<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Apply `result` on behalf of `agent`.
    ///
    /// A store failure stops the apply and is returned; writes already made
    /// stay, and the next cycle rewrites the full key range.
    pub async fn apply(
        &self,
        agent: &dyn CachingAgent,
        result: &CacheResult,
        ctx: &PollContext,
    ) -> DomainResult<ApplyReport> {
        let mut report = ApplyReport::default();
        let provider = agent.provider_name();

        let mut declared = BTreeSet::new();
        for data_type in agent.provided_data_types() {
            let namespace = data_type.namespace.as_str();
            declared.insert(namespace);
            let entries = result.entries(namespace);

            if data_type.authority.is_authoritative() {
                self.apply_authoritative(agent, provider, namespace, result, ctx, &mut report)
                    .await?;
            } else {
                if !entries.is_empty() {
                    self.cache.merge(namespace, entries.to_vec()).await?;
                    report.merged += entries.len();
                }
                let ignored = result.evictions_for(namespace).len();
                if ignored > 0 {
                    warn!(
                        agent = agent.agent_type(),
                        namespace,
                        ignored,
                        "Informative agent requested evictions; ignoring"
                    );
                    report.ignored_evictions += ignored;
                }
            }
        }

        // namespaces the agent never declared are supplementary data at most
        for (namespace, entries) in result.cache_results() {
            if declared.contains(namespace.as_str()) || entries.is_empty() {
                continue;
            }
            debug!(
                agent = agent.agent_type(),
                namespace = namespace.as_str(),
                count = entries.len(),
                "Merging entries for undeclared namespace"
            );
            self.cache.merge(namespace, entries.clone()).await?;
            report.merged += entries.len();
        }
        for (namespace, ids) in result.evictions() {
            if !declared.contains(namespace.as_str()) {
                report.ignored_evictions += ids.len();
            }
        }

        Ok(report)
    }

    async fn apply_authoritative(
        &self,
        agent: &dyn CachingAgent,
        provider: &str,
        namespace: &str,
        result: &CacheResult,
        ctx: &PollContext,
        report: &mut ApplyReport,
    ) -> DomainResult<()> {
        let entries = result.entries(namespace);
        let produced = result.ids(namespace);
        let records = self.on_demand_records(provider, namespace).await?;
        let fresher: BTreeSet<&str> = records
            .iter()
            .filter(|(_, record)| record.cache_time > ctx.started_at)
            .map(|(_, record)| record.entity_id.as_str())
            .collect();

        let to_write: Vec<CacheData> = entries
            .iter()
            .filter(|data| !fresher.contains(data.id.as_str()))
            .cloned()
            .collect();
        report.deferred_to_on_demand += entries.len() - to_write.len();
        if !to_write.is_empty() {
            report.upserted += to_write.len();
            self.cache.upsert(namespace, to_write).await?;
        }

        let mut stale: BTreeSet<String> = result.evictions_for(namespace).iter().cloned().collect();
        match agent.key_pattern(namespace) {
            Some(pattern) => {
                let existing = self.cache.filter_identifiers(namespace, &pattern).await?;
                stale.extend(
                    existing
                        .into_iter()
                        .filter(|id| !produced.contains(id.as_str())),
                );
            }
            None => debug!(
                agent = agent.agent_type(),
                namespace, "No key pattern; skipping authoritative diff"
            ),
        }
        // refreshed after this cycle polled; the cycle's view is older
        let shielded = stale.len();
        stale.retain(|id| !fresher.contains(id.as_str()));
        report.deferred_to_on_demand += shielded - stale.len();

        if !stale.is_empty() {
            let stale: Vec<String> = stale.iter().cloned().collect();
            self.cache.evict(namespace, &stale).await?;
            report.evicted += stale.len();
            debug!(
                agent = agent.agent_type(),
                namespace,
                evicted = stale.len(),
                "Evicted stale entries"
            );
        }

        let mut processed = Vec::new();
        let mut superseded = Vec::new();
        for (record_id, mut record) in records {
            let entity = record.entity_id.as_str();
            if record.cache_time > ctx.started_at {
                if produced.contains(entity) {
                    record.processed_count += 1;
                    processed.push(record.to_cache_data());
                }
            } else if produced.contains(entity) || stale.contains(entity) {
                superseded.push(record_id);
            }
        }
        if !processed.is_empty() {
            self.cache
                .upsert(Namespace::OnDemand.as_str(), processed)
                .await?;
        }
        if !superseded.is_empty() {
            report.on_demand_cleared += superseded.len();
            self.cache
                .evict(Namespace::OnDemand.as_str(), &superseded)
                .await?;
        }
        Ok(())
    }

    /// On-demand records this provider holds for entities of `namespace`,
    /// paired with their record ids.
    async fn on_demand_records(
        &self,
        provider: &str,
        namespace: &str,
    ) -> DomainResult<Vec<(String, OnDemandRecord)>> {
        let pattern = format!(
            "{}*",
            escape_glob(&Keys::on_demand(provider, &format!("{provider}:{namespace}:")))
        );
        let records_ns = Namespace::OnDemand.as_str();
        let ids = self.cache.filter_identifiers(records_ns, &pattern).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .cache
            .get_all(records_ns, &ids, &RelationshipFilter::None)
            .await?
            .into_iter()
            .filter_map(|data| {
                let record = OnDemandRecord::from_cache_data(&data)?;
                (record.namespace == namespace).then_some((data.id, record))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryProviderCache;
    use crate::domain::models::AgentDataType;
    use crate::services::CacheResultBuilder;
    use async_trait::async_trait;

    struct ImageAgent {
        types: Vec<AgentDataType>,
    }

    impl ImageAgent {
        fn authoritative() -> Self {
            Self {
                types: vec![AgentDataType::authoritative("images")],
            }
        }

        fn informative() -> Self {
            Self {
                types: vec![AgentDataType::informative("images")],
            }
        }
    }

    #[async_trait]
    impl CachingAgent for ImageAgent {
        fn agent_type(&self) -> &str {
            "prod/us-east-1/ImageCachingAgent"
        }

        fn provider_name(&self) -> &str {
            "aws"
        }

        fn provided_data_types(&self) -> &[AgentDataType] {
            &self.types
        }

        fn key_pattern(&self, namespace: &str) -> Option<String> {
            (namespace == "images").then(|| Keys::image_pattern("aws", "prod", "us-east-1"))
        }

        async fn load_data(&self, _ctx: &PollContext) -> DomainResult<CacheResult> {
            Ok(CacheResult::default())
        }
    }

    fn images(ids: &[&str]) -> CacheResult {
        let mut builder = CacheResultBuilder::new();
        let ns = builder.namespace("images");
        for id in ids {
            ns.keep(Keys::image("aws", "prod", "us-east-1", id));
        }
        builder.build()
    }

    fn ctx() -> PollContext {
        PollContext::new("prod/us-east-1/ImageCachingAgent", 0, 1)
    }

    #[tokio::test]
    async fn test_authoritative_diff_evicts_missing_ids() {
        let cache = Arc::new(InMemoryProviderCache::new());
        let applier = CacheApplier::new(cache.clone());
        let agent = ImageAgent::authoritative();
        let other_region = Keys::image("aws", "prod", "eu-west-1", "ami-9");
        cache.upsert("images", vec![CacheData::new(&other_region)]).await.unwrap();

        applier.apply(&agent, &images(&["ami-1", "ami-2"]), &ctx()).await.unwrap();
        let report = applier.apply(&agent, &images(&["ami-2"]), &ctx()).await.unwrap();

        assert_eq!(report.evicted, 1);
        let ids = cache.filter_identifiers("images", "*").await.unwrap();
        assert_eq!(
            ids,
            vec![other_region, Keys::image("aws", "prod", "us-east-1", "ami-2")]
        );
    }

    #[tokio::test]
    async fn test_informative_never_evicts() {
        let cache = Arc::new(InMemoryProviderCache::new());
        let applier = CacheApplier::new(cache.clone());
        applier
            .apply(&ImageAgent::authoritative(), &images(&["ami-1"]), &ctx())
            .await
            .unwrap();

        let mut builder = CacheResultBuilder::new();
        builder.namespace("images").evict(Keys::image("aws", "prod", "us-east-1", "ami-1"));
        let report = applier
            .apply(&ImageAgent::informative(), &builder.build(), &ctx())
            .await
            .unwrap();

        assert_eq!(report.ignored_evictions, 1);
        assert_eq!(cache.len("images"), 1);
    }

    #[tokio::test]
    async fn test_newer_on_demand_entry_is_not_overwritten() {
        let cache = Arc::new(InMemoryProviderCache::new());
        let applier = CacheApplier::new(cache.clone());
        let id = Keys::image("aws", "prod", "us-east-1", "ami-1");

        let started = ctx();
        let mut fresh = CacheData::new(&id);
        fresh.attributes.insert("source".into(), serde_json::json!("on-demand"));
        cache.upsert("images", vec![fresh]).await.unwrap();
        let mut record = OnDemandRecord::new("aws", "images", &id, "image");
        record.cache_time = started.started_at + chrono::Duration::seconds(5);
        cache.upsert("onDemand", vec![record.to_cache_data()]).await.unwrap();

        let report = applier.apply(&ImageAgent::authoritative(), &images(&["ami-1"]), &started).await.unwrap();
        assert_eq!(report.deferred_to_on_demand, 1);
        let read = cache.get("images", &id, &RelationshipFilter::All).await.unwrap().unwrap();
        assert_eq!(read.attribute_str("source"), Some("on-demand"));

        let later = PollContext {
            started_at: record.cache_time + chrono::Duration::seconds(1),
            ..ctx()
        };
        let report = applier.apply(&ImageAgent::authoritative(), &images(&["ami-1"]), &later).await.unwrap();
        assert_eq!(report.on_demand_cleared, 1);
        assert_eq!(cache.len("onDemand"), 0);
        let read = cache.get("images", &id, &RelationshipFilter::All).await.unwrap().unwrap();
        assert!(read.attribute_str("source").is_none());
    }

    #[tokio::test]
    async fn test_older_cycle_keeps_entity_refreshed_since_it_polled() {
        let cache = Arc::new(InMemoryProviderCache::new());
        let applier = CacheApplier::new(cache.clone());
        let agent = ImageAgent::authoritative();
        let started = ctx();

        // appeared after the cycle listed the provider
        let added = Keys::image("aws", "prod", "us-east-1", "ami-2");
        cache.upsert("images", vec![CacheData::new(&added)]).await.unwrap();
        let mut record = OnDemandRecord::new("aws", "images", &added, "image");
        record.cache_time = started.started_at + chrono::Duration::seconds(5);
        cache.upsert("onDemand", vec![record.to_cache_data()]).await.unwrap();

        let report = applier.apply(&agent, &images(&["ami-1"]), &started).await.unwrap();
        assert_eq!(report.upserted, 1);
        assert_eq!(report.evicted, 0);
        assert_eq!(report.deferred_to_on_demand, 1);
        assert!(cache.get("images", &added, &RelationshipFilter::None).await.unwrap().is_some());
        assert_eq!(cache.len("onDemand"), 1);

        // a cycle that started later than the refresh and no longer sees it evicts both
        let later = PollContext {
            started_at: record.cache_time + chrono::Duration::seconds(1),
            ..ctx()
        };
        let report = applier.apply(&agent, &images(&["ami-1"]), &later).await.unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(report.on_demand_cleared, 1);
        assert!(cache.get("images", &added, &RelationshipFilter::None).await.unwrap().is_none());
        assert_eq!(cache.len("onDemand"), 0);
    }

    #[tokio::test]
    async fn test_records_of_other_namespaces_are_ignored() {
        let cache = Arc::new(InMemoryProviderCache::new());
        let applier = CacheApplier::new(cache.clone());
        let started = ctx();

        let sg = Keys::server_group("aws", "prod", "us-east-1", "api-v001");
        let mut record = OnDemandRecord::new("aws", "serverGroups", &sg, "serverGroup");
        record.cache_time = started.started_at + chrono::Duration::seconds(5);
        cache.upsert("onDemand", vec![record.to_cache_data()]).await.unwrap();

        let report = applier
            .apply(&ImageAgent::authoritative(), &images(&["ami-1"]), &started)
            .await
            .unwrap();
        assert_eq!(report.deferred_to_on_demand, 0);
        assert_eq!(report.on_demand_cleared, 0);
        assert_eq!(cache.len("onDemand"), 1);
    }
}
