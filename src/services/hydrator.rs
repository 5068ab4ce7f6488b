//! Builds domain objects from cache entries by bounded relationship expansion.
//!
//! Load balancers and server groups reference each other, so expansion is
//! bounded structurally: every `Full` read asks for the reverse direction at
//! `Detail::None`, and `NamesOnly` never reads related entries at all. No
//! visited-set is needed for termination.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    escape_glob, CacheData, Cluster, Detail, Instance, Keys, LoadBalancer, Namespace, RelationshipFilter,
    ServerGroup, ServerGroupName,
};
use crate::domain::ports::ProviderCache;

const CLUSTERS: &str = Namespace::Clusters.as_str();
const SERVER_GROUPS: &str = Namespace::ServerGroups.as_str();
const LOAD_BALANCERS: &str = Namespace::LoadBalancers.as_str();
const INSTANCES: &str = Namespace::Instances.as_str();
const SECURITY_GROUPS: &str = Namespace::SecurityGroups.as_str();

type Fields = BTreeMap<&'static str, String>;

fn parse(id: &str) -> Fields {
    Keys::parse(id).unwrap_or_default()
}

fn field(fields: &Fields, name: &str) -> String {
    fields.get(name).cloned().unwrap_or_default()
}

fn related_ids(data: &CacheData, namespace: &str) -> Vec<String> {
    data.related(namespace).cloned().collect()
}

fn relationship_filter(detail: Detail, namespaces: &[&str]) -> RelationshipFilter {
    match detail {
        Detail::None => RelationshipFilter::None,
        Detail::NamesOnly | Detail::Full => RelationshipFilter::only(namespaces.iter().copied()),
    }
}

fn server_group_stub(id: &str) -> ServerGroup {
    let fields = parse(id);
    let name = fields.get("serverGroup").cloned().unwrap_or_else(|| id.to_string());
    let cluster = fields
        .get("cluster")
        .cloned()
        .unwrap_or_else(|| ServerGroupName::parse(&name).cluster);
    ServerGroup {
        id: id.to_string(),
        account: field(&fields, "account"),
        region: field(&fields, "region"),
        cluster,
        name,
        ..ServerGroup::default()
    }
}

fn unexpanded_server_group(data: CacheData) -> ServerGroup {
    ServerGroup {
        attributes: data.attributes,
        ..server_group_stub(&data.id)
    }
}

fn load_balancer_stub(id: &str) -> LoadBalancer {
    let fields = parse(id);
    LoadBalancer {
        id: id.to_string(),
        account: field(&fields, "account"),
        region: field(&fields, "region"),
        vpc_id: fields.get("vpcId").filter(|vpc| !vpc.is_empty()).cloned(),
        name: fields.get("loadBalancer").cloned().unwrap_or_else(|| id.to_string()),
        ..LoadBalancer::default()
    }
}

fn instance_stub(id: &str) -> Instance {
    let fields = parse(id);
    Instance {
        id: id.to_string(),
        account: field(&fields, "account"),
        region: field(&fields, "region"),
        instance_id: fields.get("instanceId").cloned().unwrap_or_else(|| id.to_string()),
        ..Instance::default()
    }
}

fn security_group_name(id: &str) -> String {
    parse(id)
        .get("securityGroup")
        .cloned()
        .unwrap_or_else(|| id.to_string())
}

/// Read-side entry point: one method per domain concept, each taking a
/// [`Detail`].
pub struct ResourceHydrator<C: ProviderCache> {
    cache: Arc<C>,
}

impl<C: ProviderCache> ResourceHydrator<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub async fn get_cluster(&self, id: &str, detail: Detail) -> DomainResult<Option<Cluster>> {
        let filter = relationship_filter(detail, &[SERVER_GROUPS, LOAD_BALANCERS]);
        let Some(data) = self.cache.get(CLUSTERS, id, &filter).await? else {
            return Ok(None);
        };

        let fields = parse(id);
        let mut cluster = Cluster {
            id: data.id.clone(),
            application: field(&fields, "application"),
            account: field(&fields, "account"),
            name: fields.get("cluster").cloned().unwrap_or_else(|| id.to_string()),
            ..Cluster::default()
        };

        let sg_ids = related_ids(&data, SERVER_GROUPS);
        let lb_ids = related_ids(&data, LOAD_BALANCERS);
        match detail {
            Detail::None => {}
            Detail::NamesOnly => {
                cluster.server_groups = sg_ids.iter().map(|id| server_group_stub(id)).collect();
                cluster.load_balancers = lb_ids.iter().map(|id| load_balancer_stub(id)).collect();
            }
            Detail::Full => {
                // server groups come back with names of their relations only
                let (server_groups, load_balancers) = futures::try_join!(
                    self.read_server_groups(&sg_ids, Detail::NamesOnly),
                    self.read_load_balancers(&lb_ids, Detail::None),
                )?;
                cluster.server_groups = server_groups;
                cluster.load_balancers = load_balancers;
            }
        }
        Ok(Some(cluster))
    }

    pub async fn get_server_group(&self, id: &str, detail: Detail) -> DomainResult<Option<ServerGroup>> {
        let ids = [id.to_string()];
        Ok(self.read_server_groups(&ids, detail).await?.pop())
    }

    pub async fn get_load_balancer(&self, id: &str, detail: Detail) -> DomainResult<Option<LoadBalancer>> {
        let ids = [id.to_string()];
        Ok(self.read_load_balancers(&ids, detail).await?.pop())
    }

    pub async fn get_instance(&self, id: &str, detail: Detail) -> DomainResult<Option<Instance>> {
        let ids = [id.to_string()];
        Ok(self.read_instances(&ids, detail).await?.pop())
    }

    /// Server groups of one cluster, optionally narrowed to a region.
    pub async fn get_server_groups_in_cluster(
        &self,
        provider: &str,
        account: &str,
        cluster: &str,
        region: Option<&str>,
        detail: Detail,
    ) -> DomainResult<Vec<ServerGroup>> {
        let region = region.map_or_else(|| "*".to_string(), escape_glob);
        let pattern = format!(
            "{}:{SERVER_GROUPS}:{}:{}:{region}:*",
            escape_glob(provider),
            escape_glob(cluster),
            escape_glob(account),
        );
        let ids = self.cache.filter_identifiers(SERVER_GROUPS, &pattern).await?;
        self.read_server_groups(&ids, detail).await
    }

    async fn read_server_groups(&self, ids: &[String], detail: Detail) -> DomainResult<Vec<ServerGroup>> {
        let filter = relationship_filter(detail, &[LOAD_BALANCERS, INSTANCES, SECURITY_GROUPS]);
        let entries = self.cache.get_all(SERVER_GROUPS, ids, &filter).await?;

        let mut server_groups = Vec::with_capacity(entries.len());
        for data in entries {
            let mut sg = server_group_stub(&data.id);
            let lb_ids = related_ids(&data, LOAD_BALANCERS);
            let instance_ids = related_ids(&data, INSTANCES);
            sg.security_groups = data.related(SECURITY_GROUPS).map(|id| security_group_name(id)).collect();

            match detail {
                Detail::None => {}
                Detail::NamesOnly => {
                    sg.load_balancers = lb_ids.iter().map(|id| load_balancer_stub(id)).collect();
                    sg.instances = instance_ids.iter().map(|id| instance_stub(id)).collect();
                }
                Detail::Full => {
                    // the load balancers' own server groups stay unexpanded
                    let (load_balancers, instances) = futures::try_join!(
                        self.read_load_balancers(&lb_ids, Detail::None),
                        self.read_instances(&instance_ids, Detail::None),
                    )?;
                    sg.load_balancers = load_balancers;
                    sg.instances = instances
                        .into_iter()
                        .map(|mut instance| {
                            instance.server_group = Some(sg.name.clone());
                            instance
                        })
                        .collect();
                }
            }
            sg.attributes = data.attributes;
            server_groups.push(sg);
        }
        Ok(server_groups)
    }

    async fn read_load_balancers(&self, ids: &[String], detail: Detail) -> DomainResult<Vec<LoadBalancer>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = relationship_filter(detail, &[SERVER_GROUPS]);
        let entries = self.cache.get_all(LOAD_BALANCERS, ids, &filter).await?;

        let mut load_balancers = Vec::with_capacity(entries.len());
        for data in entries {
            let mut lb = load_balancer_stub(&data.id);
            let sg_ids = related_ids(&data, SERVER_GROUPS);
            match detail {
                Detail::None => {}
                Detail::NamesOnly => {
                    lb.server_groups = sg_ids.iter().map(|id| server_group_stub(id)).collect();
                }
                Detail::Full => {
                    // reverse direction at None: no load balancers come back
                    lb.server_groups = self
                        .cache
                        .get_all(SERVER_GROUPS, &sg_ids, &RelationshipFilter::None)
                        .await?
                        .into_iter()
                        .map(unexpanded_server_group)
                        .collect();
                }
            }
            lb.attributes = data.attributes;
            load_balancers.push(lb);
        }
        Ok(load_balancers)
    }

    async fn read_instances(&self, ids: &[String], detail: Detail) -> DomainResult<Vec<Instance>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = relationship_filter(detail, &[SERVER_GROUPS]);
        let entries = self.cache.get_all(INSTANCES, ids, &filter).await?;
        Ok(entries
            .into_iter()
            .map(|data| {
                let mut instance = instance_stub(&data.id);
                instance.server_group = data
                    .related(SERVER_GROUPS)
                    .next()
                    .map(|id| server_group_stub(id).name);
                instance.attributes = data.attributes;
                instance
            })
            .collect())
    }
}
