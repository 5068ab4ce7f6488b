//! Bookkeeping written next to an on-demand refresh.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use super::cache::CacheData;
use super::keys::{Keys, Namespace};

/// Marks an entity as refreshed out of band at `cache_time`.
///
/// A scheduled cycle that started before `cache_time` must not overwrite or
/// evict the entity; one that started after supersedes the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDemandRecord {
    pub provider: String,
    pub entity_id: String,
    pub namespace: String,
    pub cache_time: DateTime<Utc>,
    pub processed_count: u64,
    pub requested_by: String,
}

impl OnDemandRecord {
    pub fn new(
        provider: impl Into<String>,
        namespace: impl Into<String>,
        entity_id: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            entity_id: entity_id.into(),
            namespace: namespace.into(),
            cache_time: Utc::now(),
            processed_count: 0,
            requested_by: requested_by.into(),
        }
    }

    pub fn id(&self) -> String {
        Keys::on_demand(&self.provider, &self.entity_id)
    }

    pub fn to_cache_data(&self) -> CacheData {
        let mut data = CacheData::new(self.id()).with_relationship(&self.namespace, &self.entity_id);
        data.attributes
            .insert("cacheTime".into(), json!(self.cache_time.timestamp_millis()));
        data.attributes
            .insert("processedCount".into(), json!(self.processed_count));
        data.attributes
            .insert("requestedBy".into(), json!(self.requested_by));
        data.attributes.insert("namespace".into(), json!(self.namespace));
        data.attributes.insert("entityId".into(), json!(self.entity_id));
        data
    }

    /// Read a record back; `None` when the entry is not an on-demand record.
    pub fn from_cache_data(data: &CacheData) -> Option<Self> {
        let fields = Keys::parse(&data.id)?;
        if fields.get("type").map(String::as_str) != Some(Namespace::OnDemand.as_str()) {
            return None;
        }
        let millis = data.attributes.get("cacheTime")?.as_i64()?;
        Some(Self {
            provider: fields.get("provider")?.clone(),
            entity_id: fields.get("id")?.clone(),
            namespace: data.attribute_str("namespace").unwrap_or_default().to_string(),
            cache_time: Utc.timestamp_millis_opt(millis).single()?,
            processed_count: data
                .attributes
                .get("processedCount")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or_default(),
            requested_by: data.attribute_str("requestedBy").unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_survives_cache_encoding() {
        let record = OnDemandRecord::new(
            "aws",
            "serverGroups",
            "aws:serverGroups:app:prod:us-east-1:app-v001",
            "serverGroup",
        );
        let data = record.to_cache_data();
        assert_eq!(data.id, "aws:onDemand:aws:serverGroups:app:prod:us-east-1:app-v001");

        let back = OnDemandRecord::from_cache_data(&data).unwrap();
        assert_eq!(back.entity_id, record.entity_id);
        assert_eq!(back.namespace, "serverGroups");
        assert_eq!(back.requested_by, "serverGroup");
        assert_eq!(back.cache_time.timestamp_millis(), record.cache_time.timestamp_millis());
    }

    #[test]
    fn test_plain_entry_is_not_a_record() {
        assert!(OnDemandRecord::from_cache_data(&CacheData::new("aws:images:prod:us-east-1:ami-1")).is_none());
    }
}
