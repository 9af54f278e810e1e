//! AWS SDK adapters for the narrow client traits
//!
//! Each adapter wraps one SDK client and is the single classification site
//! for that service's errors: every failure leaves here as a
//! [`ProviderError`] with an explicit kind, so nothing downstream inspects
//! provider error strings.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::Capability;
use aws_sdk_ec2::types::{Filter, InstanceStateName};
use nimbus_common::crd::ScalingBounds;
use nimbus_common::{ProviderError, ProviderErrorKind};
use tracing::debug;

use super::{
    AttachedVolume, ComputeClient, InstanceState, NetworkClient, ProviderResult, RemoteInstance,
    RemoteStack, ScalingClient, StackClient,
};

/// Root device name excluded from data-volume detachment
const ROOT_DEVICE: &str = "/dev/xvda";

/// All real clients bundled for construction from the ambient credentials
pub struct AwsClients {
    /// CloudFormation-backed stack operations
    pub stacks: Arc<dyn StackClient>,
    /// EC2-backed instance and volume operations
    pub compute: Arc<dyn ComputeClient>,
    /// Autoscaling-group reads
    pub scaling: Arc<dyn ScalingClient>,
    /// Subnet inventory reads
    pub network: Arc<dyn NetworkClient>,
}

impl AwsClients {
    /// Build all adapters from the default credential chain
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let ec2 = aws_sdk_ec2::Client::new(&config);
        Self {
            stacks: Arc::new(CloudFormationStacks::new(aws_sdk_cloudformation::Client::new(
                &config,
            ))),
            compute: Arc::new(Ec2Compute::new(ec2.clone())),
            scaling: Arc::new(AutoScalingGroups::new(aws_sdk_autoscaling::Client::new(
                &config,
            ))),
            network: Arc::new(Ec2Network::new(ec2)),
        }
    }
}

/// Classify a CloudFormation failure.
///
/// CloudFormation reports both "stack does not exist" and "operation
/// already in progress" as a generic `ValidationError`; the message text is
/// the only discriminator the service provides, so the containment checks
/// live here and nowhere else.
fn classify_cloudformation(code: Option<&str>, message: &str) -> ProviderErrorKind {
    match code {
        Some("AlreadyExistsException") => ProviderErrorKind::AlreadyExists,
        Some("OperationInProgressException") => ProviderErrorKind::UpdateInProgress,
        Some("ValidationError") if message.contains("does not exist") => ProviderErrorKind::NotFound,
        Some("ValidationError") if message.contains("DELETE_IN_PROGRESS") => {
            ProviderErrorKind::DeleteInProgress
        }
        Some("ValidationError") if message.contains("IN_PROGRESS") => {
            ProviderErrorKind::UpdateInProgress
        }
        _ => ProviderErrorKind::Other,
    }
}

/// Classify an EC2 failure by its structured error code
fn classify_ec2(code: Option<&str>) -> ProviderErrorKind {
    match code {
        Some(c) if c.ends_with(".NotFound") => ProviderErrorKind::NotFound,
        Some("IncorrectInstanceState") | Some("IncorrectState") | Some("VolumeInUse") => {
            ProviderErrorKind::ResourceNotReady
        }
        _ => ProviderErrorKind::Other,
    }
}

fn provider_error<E>(
    classify: fn(Option<&str>, &str) -> ProviderErrorKind,
    operation: &'static str,
    resource: &str,
    err: E,
) -> ProviderError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{err:?}"));
    ProviderError::new(classify(err.code(), &message), operation, resource, message)
}

/// CloudFormation-backed [`StackClient`]
pub struct CloudFormationStacks {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationStacks {
    /// Wrap a CloudFormation client
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackClient for CloudFormationStacks {
    async fn describe_stack(&self, name: &str) -> ProviderResult<Option<RemoteStack>> {
        let resp = match self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let classified = provider_error(classify_cloudformation, "describe_stack", name, err);
                if classified.kind == ProviderErrorKind::NotFound {
                    return Ok(None);
                }
                return Err(classified);
            }
        };

        let Some(stack) = resp.stacks().first() else {
            return Ok(None);
        };

        let outputs: BTreeMap<String, String> = stack
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
            .collect();

        Ok(Some(RemoteStack {
            status: stack
                .stack_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            outputs,
        }))
    }

    async fn create_stack(
        &self,
        name: &str,
        template_body: &str,
        protect: bool,
    ) -> ProviderResult<()> {
        debug!(stack = name, protect, "submitting stack creation");
        self.client
            .create_stack()
            .stack_name(name)
            .template_body(template_body)
            .enable_termination_protection(protect)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(|e| provider_error(classify_cloudformation, "create_stack", name, e))?;
        Ok(())
    }

    async fn update_stack(&self, name: &str, template_body: &str) -> ProviderResult<()> {
        debug!(stack = name, "submitting stack update");
        self.client
            .update_stack()
            .stack_name(name)
            .template_body(template_body)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(|e| provider_error(classify_cloudformation, "update_stack", name, e))?;
        Ok(())
    }

    async fn delete_stack(&self, name: &str) -> ProviderResult<()> {
        debug!(stack = name, "requesting stack deletion");
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| provider_error(classify_cloudformation, "delete_stack", name, e))?;
        Ok(())
    }

    async fn set_termination_protection(&self, name: &str, enabled: bool) -> ProviderResult<()> {
        self.client
            .update_termination_protection()
            .stack_name(name)
            .enable_termination_protection(enabled)
            .send()
            .await
            .map_err(|e| provider_error(classify_cloudformation, "set_termination_protection", name, e))?;
        Ok(())
    }
}

fn ec2_classify(code: Option<&str>, _message: &str) -> ProviderErrorKind {
    classify_ec2(code)
}

fn map_instance_state(name: Option<&InstanceStateName>) -> Option<InstanceState> {
    match name? {
        InstanceStateName::Pending => Some(InstanceState::Pending),
        InstanceStateName::Running => Some(InstanceState::Running),
        InstanceStateName::Stopping => Some(InstanceState::Stopping),
        InstanceStateName::Stopped => Some(InstanceState::Stopped),
        InstanceStateName::ShuttingDown => Some(InstanceState::ShuttingDown),
        InstanceStateName::Terminated => Some(InstanceState::Terminated),
        _ => None,
    }
}

/// EC2-backed [`ComputeClient`]
pub struct Ec2Compute {
    client: aws_sdk_ec2::Client,
}

impl Ec2Compute {
    /// Wrap an EC2 client
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComputeClient for Ec2Compute {
    async fn find_instances_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> ProviderResult<Vec<RemoteInstance>> {
        let resp = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name(format!("tag:{key}"))
                    .values(value)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values("pending")
                    .values("running")
                    .values("stopping")
                    .values("stopped")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "find_instances_by_tag", value, e))?;

        let mut instances = Vec::new();
        for reservation in resp.reservations() {
            for instance in reservation.instances() {
                let (Some(id), Some(state)) = (
                    instance.instance_id(),
                    map_instance_state(instance.state().and_then(|s| s.name())),
                ) else {
                    continue;
                };
                instances.push(RemoteInstance {
                    id: id.to_string(),
                    state,
                });
            }
        }
        Ok(instances)
    }

    async fn instance_state(&self, id: &str) -> ProviderResult<InstanceState> {
        let resp = self
            .client
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "instance_state", id, e))?;

        resp.reservations()
            .iter()
            .flat_map(|r| r.instances())
            .find_map(|i| map_instance_state(i.state().and_then(|s| s.name())))
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::NotFound,
                    "instance_state",
                    id,
                    "instance not found",
                )
            })
    }

    async fn stop_instance(&self, id: &str) -> ProviderResult<()> {
        debug!(instance = id, "requesting controlled shutdown");
        self.client
            .stop_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "stop_instance", id, e))?;
        Ok(())
    }

    async fn terminate_instance(&self, id: &str) -> ProviderResult<()> {
        debug!(instance = id, "terminating instance");
        self.client
            .terminate_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "terminate_instance", id, e))?;
        Ok(())
    }

    async fn attached_data_volumes(
        &self,
        instance_id: &str,
    ) -> ProviderResult<Vec<AttachedVolume>> {
        let resp = self
            .client
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name("attachment.instance-id")
                    .values(instance_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "attached_data_volumes", instance_id, e))?;

        let mut volumes = Vec::new();
        for volume in resp.volumes() {
            let Some(id) = volume.volume_id() else {
                continue;
            };
            for attachment in volume.attachments() {
                let Some(device) = attachment.device() else {
                    continue;
                };
                if device == ROOT_DEVICE {
                    continue;
                }
                volumes.push(AttachedVolume {
                    id: id.to_string(),
                    device: device.to_string(),
                });
            }
        }
        Ok(volumes)
    }

    async fn detach_volume(&self, volume_id: &str) -> ProviderResult<()> {
        debug!(volume = volume_id, "detaching volume");
        // Detachment is never forced: forcing on a running instance risks
        // data corruption.
        self.client
            .detach_volume()
            .volume_id(volume_id)
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "detach_volume", volume_id, e))?;
        Ok(())
    }
}

/// Autoscaling-backed [`ScalingClient`]
pub struct AutoScalingGroups {
    client: aws_sdk_autoscaling::Client,
}

impl AutoScalingGroups {
    /// Wrap an autoscaling client
    pub fn new(client: aws_sdk_autoscaling::Client) -> Self {
        Self { client }
    }
}

fn asg_classify(code: Option<&str>, _message: &str) -> ProviderErrorKind {
    match code {
        Some(c) if c.ends_with("NotFound") => ProviderErrorKind::NotFound,
        _ => ProviderErrorKind::Other,
    }
}

#[async_trait]
impl ScalingClient for AutoScalingGroups {
    async fn describe_group_bounds(&self, name: &str) -> ProviderResult<Option<ScalingBounds>> {
        let resp = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .map_err(|e| provider_error(asg_classify, "describe_group_bounds", name, e))?;

        Ok(resp.auto_scaling_groups().first().map(|g| ScalingBounds {
            min: g.min_size().unwrap_or(0).max(0) as u32,
            max: g.max_size().unwrap_or(0).max(0) as u32,
        }))
    }
}

/// EC2-backed [`NetworkClient`]
pub struct Ec2Network {
    client: aws_sdk_ec2::Client,
}

impl Ec2Network {
    /// Wrap an EC2 client
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkClient for Ec2Network {
    async fn subnet_cidrs(&self) -> ProviderResult<Vec<String>> {
        let resp = self
            .client
            .describe_subnets()
            .send()
            .await
            .map_err(|e| provider_error(ec2_classify, "subnet_cidrs", "*", e))?;

        Ok(resp
            .subnets()
            .iter()
            .filter_map(|s| s.cidr_block().map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudformation_classification_table() {
        assert_eq!(
            classify_cloudformation(Some("AlreadyExistsException"), "stack exists"),
            ProviderErrorKind::AlreadyExists
        );
        assert_eq!(
            classify_cloudformation(
                Some("ValidationError"),
                "Stack with id nimbus-tenant-x does not exist"
            ),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            classify_cloudformation(
                Some("ValidationError"),
                "Stack is in DELETE_IN_PROGRESS state and can not be updated"
            ),
            ProviderErrorKind::DeleteInProgress
        );
        assert_eq!(
            classify_cloudformation(
                Some("ValidationError"),
                "Stack is in UPDATE_IN_PROGRESS state and can not be updated"
            ),
            ProviderErrorKind::UpdateInProgress
        );
        assert_eq!(
            classify_cloudformation(Some("Throttling"), "rate exceeded"),
            ProviderErrorKind::Other
        );
        assert_eq!(
            classify_cloudformation(None, "connection reset"),
            ProviderErrorKind::Other
        );
    }

    #[test]
    fn ec2_classification_table() {
        assert_eq!(
            classify_ec2(Some("InvalidInstanceID.NotFound")),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            classify_ec2(Some("InvalidVolume.NotFound")),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            classify_ec2(Some("IncorrectInstanceState")),
            ProviderErrorKind::ResourceNotReady
        );
        assert_eq!(classify_ec2(Some("VolumeInUse")), ProviderErrorKind::ResourceNotReady);
        assert_eq!(classify_ec2(Some("RequestLimitExceeded")), ProviderErrorKind::Other);
        assert_eq!(classify_ec2(None), ProviderErrorKind::Other);
    }
}
