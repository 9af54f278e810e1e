//! Subnet allocation: CIDR math, reserved-range collection, zone assignment

mod allocator;
mod cidr;
mod collector;
mod sources;

pub use allocator::{assign_subnets, SubnetScheme};
pub use cidr::{Cidr, CidrError, RangeSet};
pub use collector::{Collector, ReservedRangeSource};
pub use sources::{
    default_sources, ClusterRanges, LegacyConfigRanges, NodePoolRanges, SubnetInventoryRanges,
};
