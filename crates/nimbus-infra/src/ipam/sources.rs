//! Production reserved-range sources
//!
//! Three read the declarative store (legacy tenant configs, tenant
//! clusters, node pools) and one reads the provider's live subnet
//! inventory. Each source reports only ranges it can positively recognize;
//! unparseable stored values are skipped with a warning rather than
//! wedging every allocation in the installation.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::ListParams;
use kube::{Api, Client};
use nimbus_common::crd::{NetworkStatus, NodePool, TenantCluster, TenantConfig};
use nimbus_common::Result;
use tracing::warn;

use super::cidr::Cidr;
use super::collector::ReservedRangeSource;
use crate::aws::NetworkClient;

/// The four production sources: legacy configs, clusters, node pools and
/// the provider's live subnet inventory.
pub fn default_sources(
    client: Client,
    network: Arc<dyn NetworkClient>,
) -> Vec<Arc<dyn ReservedRangeSource>> {
    vec![
        Arc::new(LegacyConfigRanges::new(client.clone())),
        Arc::new(ClusterRanges::new(client.clone())),
        Arc::new(NodePoolRanges::new(client)),
        Arc::new(SubnetInventoryRanges::new(network)),
    ]
}

fn parse_claimed(source: &'static str, raw: &str, out: &mut Vec<Cidr>) {
    match raw.parse() {
        Ok(cidr) => out.push(cidr),
        Err(e) => warn!(source, cidr = raw, error = %e, "skipping unparseable claimed range"),
    }
}

fn status_ranges(source: &'static str, network: Option<&NetworkStatus>, out: &mut Vec<Cidr>) {
    if let Some(network) = network {
        for raw in network.cidrs() {
            parse_claimed(source, raw, out);
        }
    }
}

/// Ranges claimed by legacy single-CR tenants.
///
/// Legacy objects own their whole parent block, so the spec block is
/// reserved in addition to any allocated zone subnets.
pub struct LegacyConfigRanges {
    api: Api<TenantConfig>,
}

impl LegacyConfigRanges {
    /// Source over all legacy TenantConfig objects
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ReservedRangeSource for LegacyConfigRanges {
    fn name(&self) -> &'static str {
        "legacy-configs"
    }

    async fn collect(&self) -> Result<Vec<Cidr>> {
        let mut ranges = Vec::new();
        for config in self.api.list(&ListParams::default()).await? {
            if !config.spec.network.parent_cidr.is_empty() {
                parse_claimed(self.name(), &config.spec.network.parent_cidr, &mut ranges);
            }
            status_ranges(
                self.name(),
                config.status.as_ref().and_then(|s| s.network.as_ref()),
                &mut ranges,
            );
        }
        Ok(ranges)
    }
}

/// Zone subnets already allocated to tenant clusters.
///
/// Only status allocations count; a cluster's parent block itself is not
/// reserved, otherwise no cluster could ever allocate inside its own block.
pub struct ClusterRanges {
    api: Api<TenantCluster>,
}

impl ClusterRanges {
    /// Source over all TenantCluster objects
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ReservedRangeSource for ClusterRanges {
    fn name(&self) -> &'static str {
        "tenant-clusters"
    }

    async fn collect(&self) -> Result<Vec<Cidr>> {
        let mut ranges = Vec::new();
        for cluster in self.api.list(&ListParams::default()).await? {
            status_ranges(
                self.name(),
                cluster.status.as_ref().and_then(|s| s.network.as_ref()),
                &mut ranges,
            );
        }
        Ok(ranges)
    }
}

/// Zone subnets already allocated to node pools
pub struct NodePoolRanges {
    api: Api<NodePool>,
}

impl NodePoolRanges {
    /// Source over node pools in every namespace
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ReservedRangeSource for NodePoolRanges {
    fn name(&self) -> &'static str {
        "node-pools"
    }

    async fn collect(&self) -> Result<Vec<Cidr>> {
        let mut ranges = Vec::new();
        for pool in self.api.list(&ListParams::default()).await? {
            status_ranges(
                self.name(),
                pool.status.as_ref().and_then(|s| s.network.as_ref()),
                &mut ranges,
            );
        }
        Ok(ranges)
    }
}

/// Subnets that actually exist at the provider, whoever created them
pub struct SubnetInventoryRanges {
    network: Arc<dyn NetworkClient>,
}

impl SubnetInventoryRanges {
    /// Source over the provider's live subnet inventory
    pub fn new(network: Arc<dyn NetworkClient>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl ReservedRangeSource for SubnetInventoryRanges {
    fn name(&self) -> &'static str {
        "subnet-inventory"
    }

    async fn collect(&self) -> Result<Vec<Cidr>> {
        let mut ranges = Vec::new();
        for raw in self.network.subnet_cidrs().await? {
            parse_claimed(self.name(), &raw, &mut ranges);
        }
        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_common::{ProviderError, ProviderErrorKind};

    struct FakeNetwork {
        cidrs: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl NetworkClient for FakeNetwork {
        async fn subnet_cidrs(&self) -> std::result::Result<Vec<String>, ProviderError> {
            if self.fail {
                return Err(ProviderError::new(
                    ProviderErrorKind::Other,
                    "describe_subnets",
                    "*",
                    "throttled",
                ));
            }
            Ok(self.cidrs.clone())
        }
    }

    #[tokio::test]
    async fn inventory_source_parses_live_subnets() {
        let source = SubnetInventoryRanges::new(Arc::new(FakeNetwork {
            cidrs: vec![
                "10.100.8.0/27".to_string(),
                "garbage".to_string(),
                "10.100.8.32/27".to_string(),
            ],
            fail: false,
        }));

        let ranges = source.collect().await.expect("collect succeeds");
        // The malformed entry is skipped, the rest survive.
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].to_string(), "10.100.8.0/27");
    }

    #[tokio::test]
    async fn inventory_source_propagates_provider_errors() {
        let source = SubnetInventoryRanges::new(Arc::new(FakeNetwork {
            cidrs: vec![],
            fail: true,
        }));
        let err = source.collect().await.unwrap_err();
        assert!(err.to_string().contains("throttled"));
    }
}
