//! Deterministic subnet assignment across availability zones
//!
//! Pure allocation logic: given the parent block, the zones the spec
//! requires, the mapping carried over from previous passes and the fleet's
//! reserved ranges, fill the gaps. Same inputs, same output; a second run
//! over its own result is a no-op.

use std::collections::BTreeMap;

use nimbus_common::Error;
use tracing::debug;

use super::cidr::{Cidr, RangeSet};
use crate::snapshot::{SubnetRef, ZoneSubnets};

/// How a parent block is carved into per-zone subnets.
///
/// Each required zone consumes two chunks of `chunk_prefix` size, public
/// first. The rule used to be a hard-coded /24-to-/27 pairing; it is
/// configuration now so other housing schemes are a value change away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubnetScheme {
    /// Prefix length of each allocated chunk
    pub chunk_prefix: u8,
}

impl Default for SubnetScheme {
    fn default() -> Self {
        Self { chunk_prefix: 27 }
    }
}

impl SubnetScheme {
    /// Validate the scheme against the parent block it will carve
    pub fn validate(&self, parent: &Cidr) -> Result<(), Error> {
        if self.chunk_prefix > 28 {
            return Err(Error::configuration(
                "subnet_scheme.chunk_prefix",
                format!("chunk prefix /{} is too small to hold instances", self.chunk_prefix),
            ));
        }
        if self.chunk_prefix <= parent.prefix() {
            return Err(Error::configuration(
                "subnet_scheme.chunk_prefix",
                format!(
                    "chunk prefix /{} does not subdivide parent {}",
                    self.chunk_prefix, parent
                ),
            ));
        }
        Ok(())
    }
}

/// Assign public/private subnet pairs to every required zone that lacks one.
///
/// Zones are processed in lexicographic order and each unfilled slot takes
/// the first chunk that collides with neither the reserved set nor a chunk
/// claimed earlier (by persisted state or within this call). Zones present
/// in `existing` but not required are carried through untouched; nothing is
/// ever de-allocated.
pub fn assign_subnets(
    parent: Cidr,
    required_zones: &[String],
    existing: &BTreeMap<String, ZoneSubnets>,
    reserved: &RangeSet,
    scheme: &SubnetScheme,
) -> Result<BTreeMap<String, ZoneSubnets>, Error> {
    scheme.validate(&parent)?;

    let mut mapping = existing.clone();
    for zone in required_zones {
        mapping.entry(zone.clone()).or_default().required_by_cr = true;
    }

    let mut claimed: Vec<Cidr> = mapping
        .values()
        .flat_map(|z| z.public.cidr.into_iter().chain(z.private.cidr))
        .collect();

    let chunk_count = parent.subnet_count(scheme.chunk_prefix);

    // BTreeMap iteration gives the lexicographic zone order that makes the
    // allocation deterministic.
    for (zone, subnets) in mapping.iter_mut() {
        if !subnets.required_by_cr || subnets.is_complete() {
            continue;
        }

        for slot in [&mut subnets.public, &mut subnets.private] {
            if slot.cidr.is_some() {
                continue;
            }
            let free = (0..chunk_count)
                .filter_map(|i| parent.nth_subnet(scheme.chunk_prefix, i))
                .find(|chunk| {
                    !reserved.overlaps(chunk) && !claimed.iter().any(|c| c.overlaps(chunk))
                });
            match free {
                Some(chunk) => {
                    debug!(zone = %zone, subnet = %chunk, "assigned subnet chunk");
                    *slot = SubnetRef {
                        cidr: Some(chunk),
                        id: None,
                    };
                    claimed.push(chunk);
                }
                None => {
                    return Err(Error::capacity(
                        parent.to_string(),
                        format!(
                            "no free /{} chunk left for zone {} ({} required zones)",
                            scheme.chunk_prefix,
                            zone,
                            required_zones.len()
                        ),
                    ));
                }
            }
        }
    }

    Ok(mapping)
}
