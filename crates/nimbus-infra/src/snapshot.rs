//! Per-pass observed infrastructure snapshot
//!
//! Created by the invoking scheduler at the start of a reconciliation pass,
//! threaded through the engine as an explicit `&mut` parameter, and
//! discarded at the end. Only the zone mapping is persisted back into the
//! declarative store's status (via [`ObservedSnapshot::network_status`]);
//! everything else is a per-pass cache.

use std::collections::BTreeMap;

use nimbus_common::crd::{NetworkStatus, ScalingBounds, ZoneNetworkStatus};
use tracing::warn;

use crate::ipam::Cidr;
use crate::stack::StackState;

/// One subnet slot of a zone: CIDR and provider id fill in independently
/// (the CIDR at allocation time, the id once the provider reports it).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubnetRef {
    /// Allocated address range, if any
    pub cidr: Option<Cidr>,
    /// Provider subnet id, once known
    pub id: Option<String>,
}

impl SubnetRef {
    fn from_status(cidr: Option<&str>, id: Option<&str>, zone: &str) -> Self {
        let parsed = cidr.and_then(|raw| match raw.parse() {
            Ok(c) => Some(c),
            Err(e) => {
                // A corrupt stored CIDR must not wedge the pass; the
                // allocator will treat the slot as unassigned.
                warn!(zone, cidr = raw, error = %e, "ignoring unparseable stored subnet");
                None
            }
        });
        Self {
            cidr: parsed,
            id: id.map(str::to_string),
        }
    }
}

/// Subnets belonging to a single availability zone
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneSubnets {
    /// Public subnet slot
    pub public: SubnetRef,
    /// Private subnet slot
    pub private: SubnetRef,
    /// Whether the current desired spec requires this zone
    pub required_by_cr: bool,
}

impl ZoneSubnets {
    /// True when both slots carry an allocated CIDR
    pub fn is_complete(&self) -> bool {
        self.public.cidr.is_some() && self.private.cidr.is_some()
    }
}

/// In-memory cache of infrastructure facts discovered during one pass
#[derive(Clone, Debug, Default)]
pub struct ObservedSnapshot {
    /// Current shape of the provider stack; `None` until the stack exists
    /// and reports ready
    pub stack: Option<StackState>,

    /// Current worker autoscaling-group bounds; `None` until the stack has
    /// reported its scaling group
    pub bounds: Option<ScalingBounds>,

    /// Provider id of the VPC, once the stack reports it
    pub vpc_id: Option<String>,

    /// Provider id of the VPC peering connection, when peering is enabled
    pub peering_id: Option<String>,

    /// Name of the worker autoscaling group, from the stack outputs
    pub worker_asg_name: Option<String>,

    /// AZ mapping: zone name to allocated subnets
    pub zones: BTreeMap<String, ZoneSubnets>,
}

impl ObservedSnapshot {
    /// Empty snapshot for a pass over an object with no recorded state
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the zone mapping from previously persisted status.
    ///
    /// Allocation is monotonic: anything recorded here is never reassigned.
    pub fn from_network_status(status: &NetworkStatus) -> Self {
        let zones = status
            .zones
            .iter()
            .map(|(zone, z)| {
                (
                    zone.clone(),
                    ZoneSubnets {
                        public: SubnetRef::from_status(
                            z.public_cidr.as_deref(),
                            z.public_subnet_id.as_deref(),
                            zone,
                        ),
                        private: SubnetRef::from_status(
                            z.private_cidr.as_deref(),
                            z.private_subnet_id.as_deref(),
                            zone,
                        ),
                        required_by_cr: false,
                    },
                )
            })
            .collect();
        Self {
            vpc_id: status.vpc_id.clone(),
            zones,
            ..Self::default()
        }
    }

    /// The authoritative allocation state to persist back into the
    /// declarative store. The only snapshot fields that survive the pass.
    pub fn network_status(&self) -> NetworkStatus {
        NetworkStatus {
            vpc_id: self.vpc_id.clone(),
            zones: self
                .zones
                .iter()
                .map(|(zone, z)| {
                    (
                        zone.clone(),
                        ZoneNetworkStatus {
                            public_cidr: z.public.cidr.map(|c| c.to_string()),
                            public_subnet_id: z.public.id.clone(),
                            private_cidr: z.private.cidr.map(|c| c.to_string()),
                            private_subnet_id: z.private.id.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// All CIDRs currently claimed by zones in this snapshot
    pub fn claimed_cidrs(&self) -> Vec<Cidr> {
        self.zones
            .values()
            .flat_map(|z| z.public.cidr.into_iter().chain(z.private.cidr))
            .collect()
    }
}
