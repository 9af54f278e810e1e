//! Stack lifecycle control
//!
//! The orchestrator of a reconciliation pass. It completes the subnet
//! allocation, reads the stack status, asks change detection for the one
//! transition that is due, and executes exactly one action before handing
//! control back to the invoking scheduler. Recognized transitional provider
//! conditions end the pass cleanly; they are never errors.
//!
//! Provider-side ordering constraints are enforced here: subnets before
//! rendering, controlled shutdown and volume detachment before instance
//! termination, termination-protection removal and a dependent check before
//! stack deletion.

use std::sync::Arc;

use kube::ResourceExt;
use nimbus_common::crd::{ScalingBounds, TenantCluster};
use nimbus_common::{Error, ProviderErrorKind, Result};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use crate::aws::{ComputeClient, InstanceState, ScalingClient, StackClient};
use crate::config::EngineConfig;
use crate::dependents::DependentChecker;
use crate::detect::{self, StackChange};
use crate::ipam::{assign_subnets, Cidr, Collector};
use crate::snapshot::ObservedSnapshot;
use crate::stack::state::{
    stack_name, StackState, OUTPUT_PEERING_ID, OUTPUT_VPC_ID, OUTPUT_WORKER_ASG_NAME,
};
use crate::stack::status::{StatusClass, StatusReader};
use crate::template::{StackParameters, TemplateRenderer};

/// How a creation/update pass ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran to completion (which may mean: nothing was due)
    Done,
    /// A transitional condition ended the pass early; the next pass retries
    Canceled,
}

/// How a deletion pass ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The infrastructure is gone; the scheduler may drop the finalizer
    Deleted,
    /// Deletion is deferred or still in flight; the finalizer must stay
    KeepFinalizer,
}

/// Collaborators the controller is constructed over
pub struct StackControllerDeps {
    /// Declarative-stack operations
    pub stacks: Arc<dyn StackClient>,
    /// Instance and volume operations
    pub compute: Arc<dyn ComputeClient>,
    /// Autoscaling-group reads
    pub scaling: Arc<dyn ScalingClient>,
    /// External template renderer
    pub renderer: Arc<dyn TemplateRenderer>,
    /// Dependent-resource checks
    pub dependents: Arc<dyn DependentChecker>,
    /// Reserved-range collection for subnet allocation
    pub collector: Collector,
}

/// Drives a tenant cluster's stack through its lifecycle
pub struct StackController {
    stacks: Arc<dyn StackClient>,
    compute: Arc<dyn ComputeClient>,
    scaling: Arc<dyn ScalingClient>,
    renderer: Arc<dyn TemplateRenderer>,
    dependents: Arc<dyn DependentChecker>,
    collector: Collector,
    reader: StatusReader,
    config: EngineConfig,
}

impl StackController {
    /// Create a controller. Value-level configuration is validated here;
    /// a bad value is fatal and never retried.
    pub fn new(deps: StackControllerDeps, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let reader = StatusReader::new(Arc::clone(&deps.stacks));
        Ok(Self {
            stacks: deps.stacks,
            compute: deps.compute,
            scaling: deps.scaling,
            renderer: deps.renderer,
            dependents: deps.dependents,
            collector: deps.collector,
            reader,
            config,
        })
    }

    /// Reconcile the cluster's stack towards the desired spec.
    ///
    /// Executes at most one of create, update or scale per pass.
    #[instrument(skip_all, fields(cluster = %tenant.name_any()))]
    pub async fn ensure_created(
        &self,
        tenant: &TenantCluster,
        snapshot: &mut ObservedSnapshot,
    ) -> Result<PassOutcome> {
        let cluster_id = tenant.name_any();
        tenant.spec.validate()?;
        self.ensure_subnets(tenant, snapshot).await?;

        let name = stack_name(&cluster_id);
        let facts = self.reader.describe(&name).await?;
        match facts.class() {
            StatusClass::Absent => self.create(&cluster_id, tenant, snapshot, &name).await,
            StatusClass::Transitioning => {
                info!(
                    status = facts.raw_status().unwrap_or("-"),
                    "stack is mid-transition, canceling pass"
                );
                Ok(PassOutcome::Canceled)
            }
            StatusClass::Failed => Err(Error::execution_failed(
                "ensure_created",
                format!(
                    "stack {name} is in terminal status {}",
                    facts.raw_status().unwrap_or("-")
                ),
            )),
            StatusClass::Ready => {
                let current = StackState::from_outputs(&facts)?;
                snapshot.vpc_id = facts.output(OUTPUT_VPC_ID).ok().map(str::to_string);
                snapshot.peering_id = facts.output(OUTPUT_PEERING_ID).ok().map(str::to_string);
                let asg_name = facts.output(OUTPUT_WORKER_ASG_NAME).ok().map(str::to_string);
                if let Some(asg) = &asg_name {
                    snapshot.bounds = self.scaling.describe_group_bounds(asg).await?;
                }
                snapshot.worker_asg_name = asg_name;
                snapshot.stack = Some(current.clone());

                let desired = StackState::desired(&cluster_id, tenant);
                match detect::plan(
                    &desired,
                    &current,
                    &tenant.spec.scaling,
                    snapshot.bounds.as_ref(),
                ) {
                    StackChange::None => {
                        debug!("stack matches desired state");
                        Ok(PassOutcome::Done)
                    }
                    StackChange::Update { state, reason } => {
                        info!(%reason, "stack update due");
                        match self.replace_master(&cluster_id).await {
                            Ok(()) => {}
                            Err(e) if e.is_transitional() => {
                                info!(error = %e, "master not ready for replacement, canceling pass");
                                return Ok(PassOutcome::Canceled);
                            }
                            Err(e) => return Err(e),
                        }
                        self.submit_update(&cluster_id, state, tenant.spec.scaling, snapshot)
                            .await
                    }
                    StackChange::Scale { state, reason } => {
                        info!(%reason, "stack scale due");
                        self.submit_update(&cluster_id, state, tenant.spec.scaling, snapshot)
                            .await
                    }
                }
            }
        }
    }

    /// Tear the cluster's stack down once nothing depends on it.
    #[instrument(skip_all, fields(cluster = %tenant.name_any()))]
    pub async fn ensure_deleted(&self, tenant: &TenantCluster) -> Result<DeleteOutcome> {
        let cluster_id = tenant.name_any();

        if self.config.capabilities.node_pools {
            let pools = self.dependents.live_node_pools(&cluster_id).await?;
            if pools > 0 {
                info!(pools, "live node pools attached, deferring deletion");
                return Ok(DeleteOutcome::KeepFinalizer);
            }
        }

        let name = stack_name(&cluster_id);
        let facts = self.reader.describe(&name).await?;
        match facts.class() {
            StatusClass::Absent => {
                info!(stack = %name, "stack already gone");
                return Ok(DeleteOutcome::Deleted);
            }
            StatusClass::Transitioning => {
                // A delete or update from a previous pass is still running;
                // deletion is not re-submitted while in flight.
                info!(
                    stack = %name,
                    status = facts.raw_status().unwrap_or("-"),
                    "stack mid-transition, retrying deletion next pass"
                );
                return Ok(DeleteOutcome::KeepFinalizer);
            }
            StatusClass::Failed | StatusClass::Ready => {}
        }

        match self.stacks.set_termination_protection(&name, false).await {
            Ok(()) => {}
            Err(e) if e.kind == ProviderErrorKind::NotFound => return Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_transitional() => return Ok(DeleteOutcome::KeepFinalizer),
            Err(e) => return Err(e.into()),
        }

        match self.stacks.delete_stack(&name).await {
            Ok(()) => {
                info!(stack = %name, "stack deletion requested");
                Ok(DeleteOutcome::KeepFinalizer)
            }
            Err(e) if e.kind == ProviderErrorKind::NotFound => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_transitional() => Ok(DeleteOutcome::KeepFinalizer),
            Err(e) => Err(e.into()),
        }
    }

    /// Complete the AZ mapping before anything reads it.
    ///
    /// Re-invocation with a complete mapping is a no-op and skips the
    /// reserved-range collection entirely.
    async fn ensure_subnets(
        &self,
        tenant: &TenantCluster,
        snapshot: &mut ObservedSnapshot,
    ) -> Result<()> {
        for zone in &tenant.spec.availability_zones {
            snapshot.zones.entry(zone.clone()).or_default().required_by_cr = true;
        }
        let complete = tenant
            .spec
            .availability_zones
            .iter()
            .all(|z| snapshot.zones.get(z).is_some_and(|s| s.is_complete()));
        if complete {
            return Ok(());
        }

        let parent: Cidr = tenant
            .spec
            .network
            .parent_cidr
            .parse()
            .map_err(|e| Error::configuration("network.parentCidr", format!("{e}")))?;
        info!(parent = %parent, "completing subnet allocation");
        let reserved = self.collector.collect().await?;
        snapshot.zones = assign_subnets(
            parent,
            &tenant.spec.availability_zones,
            &snapshot.zones,
            &reserved,
            &self.config.subnet_scheme,
        )?;
        Ok(())
    }

    async fn create(
        &self,
        cluster_id: &str,
        tenant: &TenantCluster,
        snapshot: &ObservedSnapshot,
        name: &str,
    ) -> Result<PassOutcome> {
        let desired = StackState::desired(cluster_id, tenant);
        let body = self
            .renderer
            .render(&self.parameters(cluster_id, desired, tenant.spec.scaling, snapshot))?;

        info!(stack = name, "creating stack");
        match self.stacks.create_stack(name, &body, true).await {
            Ok(()) => {}
            Err(e) if e.is_transitional() => {
                info!(kind = ?e.kind, "stack creation already underway, canceling pass");
                return Ok(PassOutcome::Canceled);
            }
            Err(e) => return Err(e.into()),
        }
        self.confirm_creation(name).await
    }

    /// Best-effort confirmation window after a create. Elapsing the window
    /// is not an error; the next pass re-checks the status.
    async fn confirm_creation(&self, name: &str) -> Result<PassOutcome> {
        let deadline = Instant::now() + self.config.create_confirmation_timeout;
        loop {
            if Instant::now() >= deadline {
                info!(stack = name, "creation not confirmed within window, ending pass");
                return Ok(PassOutcome::Done);
            }
            sleep(self.config.poll_interval).await;

            let facts = self.reader.describe(name).await?;
            match facts.class() {
                StatusClass::Ready => {
                    info!(stack = name, "stack creation complete");
                    return Ok(PassOutcome::Done);
                }
                StatusClass::Failed => {
                    return Err(Error::execution_failed(
                        "create_stack",
                        format!(
                            "stack {name} failed to create: {}",
                            facts.raw_status().unwrap_or("-")
                        ),
                    ));
                }
                StatusClass::Absent | StatusClass::Transitioning => {}
            }
        }
    }

    /// Retire the master instance ahead of a stack update.
    ///
    /// Ordering is mandatory: controlled shutdown, wait until stopped,
    /// detach data volumes (never forced), then terminate. Forcing a detach
    /// on a running instance risks data corruption; terminating before
    /// detaching risks orphaned mounts.
    async fn replace_master(&self, cluster_id: &str) -> Result<()> {
        let tag = format!("{cluster_id}-master");
        let instances = self.compute.find_instances_by_tag("Name", &tag).await?;
        let instance = match instances.as_slice() {
            [] => {
                // A previous pass already terminated it; the stack update
                // brings up the replacement.
                debug!("no live master instance found");
                return Ok(());
            }
            [one] => one.clone(),
            many => {
                return Err(Error::execution_failed(
                    "find_master_instance",
                    format!(
                        "expected exactly one instance tagged {tag}, found {}",
                        many.len()
                    ),
                ));
            }
        };

        if instance.state != InstanceState::Stopped {
            info!(instance = %instance.id, "stopping master instance");
            self.compute.stop_instance(&instance.id).await?;
        }
        self.wait_for_settled(&instance.id).await?;

        for volume in self.compute.attached_data_volumes(&instance.id).await? {
            info!(volume = %volume.id, device = %volume.device, "detaching data volume");
            self.compute.detach_volume(&volume.id).await?;
        }

        info!(instance = %instance.id, "terminating master instance");
        match self.compute.terminate_instance(&instance.id).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind == ProviderErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_for_settled(&self, id: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.instance_stop_timeout;
        loop {
            match self.compute.instance_state(id).await {
                Ok(state) if state.is_settled() => return Ok(()),
                Ok(state) => debug!(instance = id, ?state, "waiting for instance to stop"),
                Err(e) if e.kind == ProviderErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                return Err(Error::execution_failed(
                    "wait_for_instance_stop",
                    format!(
                        "instance {id} did not stop within {:?}",
                        self.config.instance_stop_timeout
                    ),
                ));
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn submit_update(
        &self,
        cluster_id: &str,
        state: StackState,
        bounds: ScalingBounds,
        snapshot: &ObservedSnapshot,
    ) -> Result<PassOutcome> {
        let name = state.name.clone();
        let body = self
            .renderer
            .render(&self.parameters(cluster_id, state, bounds, snapshot))?;
        match self.stacks.update_stack(&name, &body).await {
            Ok(()) => {
                info!(stack = %name, "stack update submitted");
                Ok(PassOutcome::Done)
            }
            Err(e) if e.is_transitional() => {
                info!(kind = ?e.kind, "stack busy, canceling pass");
                Ok(PassOutcome::Canceled)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parameters(
        &self,
        cluster_id: &str,
        state: StackState,
        bounds: ScalingBounds,
        snapshot: &ObservedSnapshot,
    ) -> StackParameters {
        StackParameters {
            cluster_id: cluster_id.to_string(),
            state,
            bounds,
            zones: snapshot.zones.clone(),
            route53_enabled: self.config.capabilities.route53,
            encrypter: self.config.capabilities.encrypter,
        }
    }
}
