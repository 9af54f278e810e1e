//! Dependent-resource checks before control-plane teardown
//!
//! A control plane with live node pools must not be deleted; the check
//! runs first on every deletion pass and defers teardown until the pools
//! are gone.

use async_trait::async_trait;
use kube::api::ListParams;
use kube::{Api, Client};
use nimbus_common::crd::NodePool;
use nimbus_common::Result;

#[cfg(test)]
use mockall::automock;

/// Counts resources that must disappear before a cluster can be deleted
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DependentChecker: Send + Sync {
    /// Number of node pools still attached to the named cluster
    async fn live_node_pools(&self, cluster: &str) -> Result<usize>;
}

/// Kube-backed dependent checker over NodePool objects
pub struct NodePoolDependents {
    api: Api<NodePool>,
}

impl NodePoolDependents {
    /// Checker over node pools in every namespace
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl DependentChecker for NodePoolDependents {
    async fn live_node_pools(&self, cluster: &str) -> Result<usize> {
        let pools = self.api.list(&ListParams::default()).await?;
        Ok(pools
            .items
            .iter()
            .filter(|pool| pool.spec.cluster == cluster)
            .count())
    }
}
