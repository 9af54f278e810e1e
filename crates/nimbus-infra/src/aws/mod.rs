//! Narrow provider-client interfaces
//!
//! The engine consumes the cloud SDK through method subsets sized to what
//! the reconciliation actually needs, so test doubles can substitute them.
//! The real adapters over the SDK clients live in [`sdk`]; they are the
//! only place provider errors are classified.

use std::collections::BTreeMap;

use async_trait::async_trait;
use nimbus_common::crd::ScalingBounds;
use nimbus_common::ProviderError;

#[cfg(test)]
use mockall::automock;

pub mod sdk;

/// Result alias for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A provider stack as described by the provider: raw status plus outputs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteStack {
    /// Provider status string (e.g. `CREATE_COMPLETE`)
    pub status: String,
    /// Published output key/value pairs
    pub outputs: BTreeMap<String, String>,
}

/// Lifecycle state of a provider instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    /// True once the instance has come to rest (stopped or gone)
    pub fn is_settled(self) -> bool {
        matches!(self, InstanceState::Stopped | InstanceState::Terminated)
    }
}

/// A provider instance: id plus lifecycle state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteInstance {
    /// Provider instance id
    pub id: String,
    /// Current lifecycle state
    pub state: InstanceState,
}

/// A volume attached to an instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachedVolume {
    /// Provider volume id
    pub id: String,
    /// Device name the volume is attached at
    pub device: String,
}

/// Declarative-stack operations (describe / create / update / delete)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StackClient: Send + Sync {
    /// Describe a stack by name. `Ok(None)` means the stack does not exist;
    /// the not-exists condition never surfaces as an error from describe.
    async fn describe_stack(&self, name: &str) -> ProviderResult<Option<RemoteStack>>;

    /// Submit an asynchronous stack creation
    async fn create_stack(&self, name: &str, template_body: &str, protect: bool)
        -> ProviderResult<()>;

    /// Submit an asynchronous stack update
    async fn update_stack(&self, name: &str, template_body: &str) -> ProviderResult<()>;

    /// Request stack deletion
    async fn delete_stack(&self, name: &str) -> ProviderResult<()>;

    /// Toggle termination protection
    async fn set_termination_protection(&self, name: &str, enabled: bool) -> ProviderResult<()>;
}

/// Instance and volume operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Find non-terminated instances carrying the given tag
    async fn find_instances_by_tag(&self, key: &str, value: &str)
        -> ProviderResult<Vec<RemoteInstance>>;

    /// Current lifecycle state of one instance
    async fn instance_state(&self, id: &str) -> ProviderResult<InstanceState>;

    /// Request a controlled shutdown
    async fn stop_instance(&self, id: &str) -> ProviderResult<()>;

    /// Terminate an instance
    async fn terminate_instance(&self, id: &str) -> ProviderResult<()>;

    /// Data volumes attached to the instance (the root volume is excluded)
    async fn attached_data_volumes(&self, instance_id: &str)
        -> ProviderResult<Vec<AttachedVolume>>;

    /// Detach a volume. Implementations must not force the detachment.
    async fn detach_volume(&self, volume_id: &str) -> ProviderResult<()>;
}

/// Autoscaling-group reads
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScalingClient: Send + Sync {
    /// Bounds of the named group; `Ok(None)` when the group does not exist
    async fn describe_group_bounds(&self, name: &str) -> ProviderResult<Option<ScalingBounds>>;
}

/// Network inventory reads
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// CIDR blocks of every subnet visible to the account
    async fn subnet_cidrs(&self) -> ProviderResult<Vec<String>>;
}
