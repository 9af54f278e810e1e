//! Stack shape and the stack-output contract

use nimbus_common::crd::TenantCluster;
use nimbus_common::Result;

use super::status::StackFacts;

/// Prefix of every tenant-cluster stack name
pub const STACK_NAME_PREFIX: &str = "nimbus-tenant-";

/// Output key: machine image id
pub const OUTPUT_IMAGE_ID: &str = "ImageID";
/// Output key: master instance type
pub const OUTPUT_INSTANCE_TYPE: &str = "InstanceType";
/// Output key: data volume size in GB
pub const OUTPUT_DATA_VOLUME_SIZE: &str = "DataVolumeSizeGB";
/// Output key: software version tag
pub const OUTPUT_VERSION_TAG: &str = "VersionTag";
/// Output key: VPC id
pub const OUTPUT_VPC_ID: &str = "VPCID";
/// Output key: VPC peering connection id
pub const OUTPUT_PEERING_ID: &str = "VPCPeeringConnectionID";
/// Output key: worker autoscaling-group name
pub const OUTPUT_WORKER_ASG_NAME: &str = "WorkerASGName";

/// Stack name for a tenant cluster
pub fn stack_name(cluster_id: &str) -> String {
    format!("{STACK_NAME_PREFIX}{cluster_id}")
}

/// The shape of a provider stack, either currently observed or desired.
///
/// Identity-bearing fields (name, image id) must survive a pure scale
/// operation unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackState {
    /// Stack name
    pub name: String,
    /// Machine image id
    pub image_id: String,
    /// Master instance type
    pub instance_type: String,
    /// Whether detailed instance monitoring is enabled
    pub detailed_monitoring: bool,
    /// Root volume size in GB
    pub root_volume_size_gb: u32,
    /// Data volume size in GB
    pub data_volume_size_gb: u32,
    /// Software version tag
    pub version_tag: String,
}

impl StackState {
    /// The shape the desired spec asks for
    pub fn desired(cluster_id: &str, cluster: &TenantCluster) -> Self {
        Self {
            name: stack_name(cluster_id),
            image_id: cluster.spec.master.image_id.clone(),
            instance_type: cluster.spec.master.instance_type.clone(),
            detailed_monitoring: cluster.spec.master.detailed_monitoring,
            root_volume_size_gb: cluster.spec.master.root_volume_size_gb,
            data_volume_size_gb: cluster.spec.master.data_volume_size_gb,
            version_tag: cluster.spec.release_version.clone(),
        }
    }

    /// The shape a ready stack reports through its outputs.
    ///
    /// Only watched fields come from outputs; the rest keep their defaults.
    pub fn from_outputs(facts: &StackFacts) -> Result<Self> {
        let data_volume_size_gb = facts
            .output(OUTPUT_DATA_VOLUME_SIZE)?
            .parse()
            .map_err(|e| {
                nimbus_common::Error::execution_failed(
                    "parse_stack_outputs",
                    format!("output {OUTPUT_DATA_VOLUME_SIZE} is not a number: {e}"),
                )
            })?;
        Ok(Self {
            name: facts.stack_name().to_string(),
            image_id: facts.output(OUTPUT_IMAGE_ID)?.to_string(),
            instance_type: facts.output(OUTPUT_INSTANCE_TYPE)?.to_string(),
            detailed_monitoring: false,
            root_volume_size_gb: 0,
            data_volume_size_gb,
            version_tag: facts.output(OUTPUT_VERSION_TAG)?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::status::StatusClass;
    use std::collections::BTreeMap;

    #[test]
    fn stack_name_is_prefixed() {
        assert_eq!(stack_name("a1b2c"), "nimbus-tenant-a1b2c");
    }

    #[test]
    fn from_outputs_reads_watched_fields() {
        let outputs: BTreeMap<String, String> = [
            (OUTPUT_IMAGE_ID, "ami-001"),
            (OUTPUT_INSTANCE_TYPE, "m5.xlarge"),
            (OUTPUT_DATA_VOLUME_SIZE, "100"),
            (OUTPUT_VERSION_TAG, "14.2.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let facts = StackFacts::existing("nimbus-tenant-a1b2c", "CREATE_COMPLETE", outputs);

        let state = StackState::from_outputs(&facts).expect("outputs parse");
        assert_eq!(state.name, "nimbus-tenant-a1b2c");
        assert_eq!(state.image_id, "ami-001");
        assert_eq!(state.instance_type, "m5.xlarge");
        assert_eq!(state.data_volume_size_gb, 100);
        assert_eq!(state.version_tag, "14.2.0");
    }

    #[test]
    fn from_outputs_fails_on_missing_key() {
        let facts = StackFacts::existing("nimbus-tenant-a1b2c", "CREATE_COMPLETE", BTreeMap::new());
        let err = StackState::from_outputs(&facts).unwrap_err();
        assert!(err.to_string().contains(OUTPUT_IMAGE_ID));
        assert_eq!(facts.class(), StatusClass::Ready);
    }

    #[test]
    fn from_outputs_fails_on_garbage_volume_size() {
        let outputs: BTreeMap<String, String> = [
            (OUTPUT_IMAGE_ID, "ami-001"),
            (OUTPUT_INSTANCE_TYPE, "m5.xlarge"),
            (OUTPUT_DATA_VOLUME_SIZE, "a-lot"),
            (OUTPUT_VERSION_TAG, "14.2.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let facts = StackFacts::existing("nimbus-tenant-a1b2c", "CREATE_COMPLETE", outputs);

        let err = StackState::from_outputs(&facts).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }
}
