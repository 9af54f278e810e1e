//! Legacy TenantConfig Custom Resource Definition
//!
//! The single-CR generation that predates the TenantCluster/NodePool split.
//! Existing objects are no longer reconciled, but their claimed address
//! ranges must stay reserved, so the subnet allocator reads them as one of
//! its range sources.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{NetworkSpec, NetworkStatus};

/// Specification for a legacy TenantConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "nimbus.dev",
    version = "v1alpha1",
    kind = "TenantConfig",
    plural = "tenantconfigs",
    status = "TenantConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigSpec {
    /// Network block claimed by this legacy cluster
    #[serde(default)]
    pub network: NetworkSpec,
}

/// Status for a legacy TenantConfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigStatus {
    /// Subnets the legacy cluster allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkStatus>,
}
