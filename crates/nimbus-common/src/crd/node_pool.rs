//! NodePool Custom Resource Definition
//!
//! A NodePool is an independently scalable group of worker instances
//! attached to a TenantCluster's control plane. Live node pools defer
//! control-plane deletion, and their allocated subnets are consulted as a
//! reserved-range source.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{NetworkStatus, ScalingBounds};

/// Specification for a NodePool
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "nimbus.dev",
    version = "v1alpha1",
    kind = "NodePool",
    plural = "nodepools",
    shortname = "np",
    status = "NodePoolStatus",
    namespaced,
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.cluster"}"#,
    printcolumn = r#"{"name":"Min","type":"integer","jsonPath":".spec.scaling.min"}"#,
    printcolumn = r#"{"name":"Max","type":"integer","jsonPath":".spec.scaling.max"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolSpec {
    /// Name of the TenantCluster this pool belongs to
    pub cluster: String,

    /// Worker instance type
    pub instance_type: String,

    /// Machine image id
    pub image_id: String,

    /// Data volume size in GB
    pub data_volume_size_gb: u32,

    /// Autoscaling bounds for this pool
    pub scaling: ScalingBounds,

    /// Availability zones the pool spans; defaults to the cluster's zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
}

impl NodePoolSpec {
    /// Validate the pool specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.cluster.is_empty() {
            return Err(crate::Error::configuration(
                "cluster",
                "owning cluster name cannot be empty",
            ));
        }
        if self.instance_type.is_empty() {
            return Err(crate::Error::configuration(
                "instanceType",
                "instance type cannot be empty",
            ));
        }
        self.scaling.validate()
    }
}

/// Status for a NodePool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolStatus {
    /// The generation of the spec that was last processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Subnets allocated to this pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_requires_owner_and_instance_type() {
        let spec = NodePoolSpec {
            cluster: "a1b2c".to_string(),
            instance_type: "m5.large".to_string(),
            image_id: "ami-0".to_string(),
            data_volume_size_gb: 100,
            scaling: ScalingBounds { min: 1, max: 4 },
            availability_zones: vec![],
        };
        assert!(spec.validate().is_ok());

        let mut no_owner = spec.clone();
        no_owner.cluster.clear();
        assert!(no_owner.validate().is_err());

        let mut no_type = spec;
        no_type.instance_type.clear();
        assert!(no_type.validate().is_err());
    }
}
