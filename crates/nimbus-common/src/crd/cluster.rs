//! TenantCluster Custom Resource Definition
//!
//! A TenantCluster describes the desired control plane of one cloud-hosted
//! Kubernetes tenant cluster: instance shape, volumes, software version,
//! target availability zones and the parent network block. The engine reads
//! the spec and never writes it; the invoking scheduler persists selected
//! observed facts into the status sub-resource between passes.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{NetworkSpec, NetworkStatus, ScalingBounds};

/// Specification for a TenantCluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "nimbus.dev",
    version = "v1alpha1",
    kind = "TenantCluster",
    plural = "tenantclusters",
    shortname = "tc",
    status = "TenantClusterStatus",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.releaseVersion"}"#,
    printcolumn = r#"{"name":"Zones","type":"string","jsonPath":".spec.availabilityZones"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantClusterSpec {
    /// Software version tag rolled out to the cluster
    pub release_version: String,

    /// Availability zones the cluster must span
    pub availability_zones: Vec<String>,

    /// Network configuration (parent block for subnet allocation)
    pub network: NetworkSpec,

    /// Control-plane instance configuration
    pub master: MasterSpec,

    /// Worker autoscaling-group bounds
    pub scaling: ScalingBounds,
}

/// Control-plane instance configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasterSpec {
    /// Machine image id
    pub image_id: String,

    /// Instance type
    pub instance_type: String,

    /// Root volume size in GB
    pub root_volume_size_gb: u32,

    /// Data volume size in GB (survives instance replacement)
    pub data_volume_size_gb: u32,

    /// Whether detailed instance monitoring is enabled
    #[serde(default)]
    pub detailed_monitoring: bool,
}

impl TenantClusterSpec {
    /// Validate the cluster specification.
    ///
    /// Violations are configuration-class errors: never retried, the spec
    /// must be changed.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.release_version.is_empty() {
            return Err(crate::Error::configuration(
                "releaseVersion",
                "release version cannot be empty",
            ));
        }
        if self.availability_zones.is_empty() {
            return Err(crate::Error::configuration(
                "availabilityZones",
                "at least one availability zone is required",
            ));
        }
        let well_formed = self
            .network
            .parent_cidr
            .split_once('/')
            .is_some_and(|(addr, prefix)| {
                addr.parse::<std::net::Ipv4Addr>().is_ok()
                    && prefix.parse::<u8>().is_ok_and(|p| p <= 32)
            });
        if !well_formed {
            return Err(crate::Error::configuration(
                "network.parentCidr",
                format!(
                    "{:?} is not a CIDR block (expected address/prefix)",
                    self.network.parent_cidr
                ),
            ));
        }
        if self.master.image_id.is_empty() {
            return Err(crate::Error::configuration(
                "master.imageId",
                "image id cannot be empty",
            ));
        }
        if self.master.instance_type.is_empty() {
            return Err(crate::Error::configuration(
                "master.instanceType",
                "instance type cannot be empty",
            ));
        }
        self.scaling.validate()
    }
}

/// Status for a TenantCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantClusterStatus {
    /// The generation of the spec that was last processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Authoritative subnet allocation, written back by the scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkStatus>,

    /// Software version currently running, as reported by the stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_spec() -> TenantClusterSpec {
        TenantClusterSpec {
            release_version: "14.2.0".to_string(),
            availability_zones: vec!["eu-central-1a".to_string(), "eu-central-1b".to_string()],
            network: NetworkSpec {
                parent_cidr: "10.100.8.0/24".to_string(),
            },
            master: MasterSpec {
                image_id: "ami-0123456789abcdef0".to_string(),
                instance_type: "m5.xlarge".to_string(),
                root_volume_size_gb: 50,
                data_volume_size_gb: 100,
                detailed_monitoring: true,
            },
            scaling: ScalingBounds { min: 3, max: 10 },
        }
    }

    #[test]
    fn valid_spec_passes_validation() {
        assert!(valid_spec().validate().is_ok());
    }

    #[test]
    fn rejects_empty_zone_list() {
        let mut spec = valid_spec();
        spec.availability_zones.clear();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("availability zone"));
    }

    #[test]
    fn rejects_bare_address_as_parent_cidr() {
        let mut spec = valid_spec();
        spec.network.parent_cidr = "10.100.8.0".to_string();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_inverted_scaling_bounds() {
        let mut spec = valid_spec();
        spec.scaling = ScalingBounds { min: 5, max: 2 };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn spec_serializes_camel_case() {
        let json = serde_json::to_value(valid_spec()).unwrap();
        assert!(json.get("releaseVersion").is_some());
        assert!(json.get("availabilityZones").is_some());
        assert_eq!(json["network"]["parentCidr"], "10.100.8.0/24");
        assert_eq!(json["master"]["dataVolumeSizeGb"], 100);
    }
}
