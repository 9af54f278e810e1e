//! Shared types used across the nimbus CRDs

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Autoscaling-group bounds for a pool of instances
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScalingBounds {
    /// Minimum instance count
    pub min: u32,
    /// Maximum instance count
    pub max: u32,
}

impl ScalingBounds {
    /// Validate that the bounds are usable
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max == 0 {
            return Err(crate::Error::configuration(
                "scaling.max",
                "maximum instance count must be at least 1",
            ));
        }
        if self.min > self.max {
            return Err(crate::Error::configuration(
                "scaling",
                format!("min ({}) must not exceed max ({})", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Network configuration for a tenant cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Parent address block that zone subnets are carved out of
    pub parent_cidr: String,
}

/// Subnets allocated to a single availability zone, as persisted in status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneNetworkStatus {
    /// CIDR of the public subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_cidr: Option<String>,

    /// Provider id of the public subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_subnet_id: Option<String>,

    /// CIDR of the private subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_cidr: Option<String>,

    /// Provider id of the private subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_subnet_id: Option<String>,
}

/// Authoritative network allocation state written back after each pass
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Provider id of the VPC backing this cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,

    /// Per-zone subnet allocation
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub zones: BTreeMap<String, ZoneNetworkStatus>,
}

impl NetworkStatus {
    /// All CIDRs recorded in this status, public and private, in zone order
    pub fn cidrs(&self) -> impl Iterator<Item = &str> {
        self.zones.values().flat_map(|z| {
            z.public_cidr
                .as_deref()
                .into_iter()
                .chain(z.private_cidr.as_deref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_bounds_validation() {
        assert!(ScalingBounds { min: 1, max: 3 }.validate().is_ok());
        assert!(ScalingBounds { min: 3, max: 3 }.validate().is_ok());
        assert!(ScalingBounds { min: 4, max: 3 }.validate().is_err());
        assert!(ScalingBounds { min: 0, max: 0 }.validate().is_err());
    }

    #[test]
    fn network_status_cidrs_iterates_public_and_private() {
        let mut status = NetworkStatus::default();
        status.zones.insert(
            "eu-central-1a".to_string(),
            ZoneNetworkStatus {
                public_cidr: Some("10.1.0.0/27".to_string()),
                private_cidr: Some("10.1.0.32/27".to_string()),
                ..Default::default()
            },
        );
        status.zones.insert(
            "eu-central-1b".to_string(),
            ZoneNetworkStatus {
                public_cidr: Some("10.1.0.64/27".to_string()),
                ..Default::default()
            },
        );

        let cidrs: Vec<_> = status.cidrs().collect();
        assert_eq!(cidrs, vec!["10.1.0.0/27", "10.1.0.32/27", "10.1.0.64/27"]);
    }
}
