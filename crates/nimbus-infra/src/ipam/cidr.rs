//! IPv4 CIDR arithmetic for subnet allocation
//!
//! Small value types over `std::net::Ipv4Addr`: a `Cidr` block and the
//! canonical `RangeSet` of reserved blocks. All math is u32 arithmetic on
//! the network address.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing a CIDR string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrError {
    /// The string is not in address/prefix form
    #[error("{0:?} is not a CIDR block (expected address/prefix)")]
    Malformed(String),

    /// The prefix length is out of range
    #[error("prefix length {0} is out of range (0-32)")]
    PrefixOutOfRange(u8),
}

/// An IPv4 network in CIDR notation.
///
/// The address is always stored masked to the network address, so two
/// `Cidr`s spelling the same network compare equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cidr {
    addr: u32,
    prefix: u8,
}

impl Cidr {
    /// Create a CIDR from an address and prefix length, masking host bits
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, CidrError> {
        if prefix > 32 {
            return Err(CidrError::PrefixOutOfRange(prefix));
        }
        let raw = u32::from(addr);
        Ok(Self {
            addr: raw & Self::mask(prefix),
            prefix,
        })
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        }
    }

    /// Network address of this block
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.addr)
    }

    /// Prefix length of this block
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// First address of the block, as u32
    fn first(&self) -> u32 {
        self.addr
    }

    /// Last address of the block, as u32
    fn last(&self) -> u32 {
        self.addr | !Self::mask(self.prefix)
    }

    /// True when `other` lies entirely within this block
    pub fn contains(&self, other: &Cidr) -> bool {
        self.first() <= other.first() && other.last() <= self.last()
    }

    /// True when the two blocks share any address
    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }

    /// The `index`-th subnet of this block at `new_prefix`.
    ///
    /// Returns `None` when `new_prefix` is not longer than this block's
    /// prefix or the index runs past the end of the block.
    pub fn nth_subnet(&self, new_prefix: u8, index: u32) -> Option<Cidr> {
        if new_prefix <= self.prefix || new_prefix > 32 {
            return None;
        }
        let count = 1u64 << (new_prefix - self.prefix);
        if u64::from(index) >= count {
            return None;
        }
        let step = 1u32 << (32 - new_prefix);
        Some(Cidr {
            addr: self.addr + index * step,
            prefix: new_prefix,
        })
    }

    /// Number of subnets of `new_prefix` size this block houses,
    /// saturating at `u32::MAX` for a /0 parent split into /32s
    pub fn subnet_count(&self, new_prefix: u8) -> u32 {
        if new_prefix <= self.prefix || new_prefix > 32 {
            0
        } else {
            let count = 1u64 << (new_prefix - self.prefix);
            count.min(u64::from(u32::MAX)) as u32
        }
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::Malformed(s.to_string()))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| CidrError::Malformed(s.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| CidrError::Malformed(s.to_string()))?;
        Cidr::new(addr, prefix)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

impl fmt::Debug for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cidr({self})")
    }
}

/// A canonical set of reserved address blocks.
///
/// Canonical form is sorted, deduplicated, and free of blocks contained in
/// another block, independent of insertion order. Adjacent siblings stay
/// distinct: the set preserves the blocks as claimed, it only drops
/// redundancy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<Cidr>,
}

impl RangeSet {
    /// Build a canonical set from arbitrary blocks
    pub fn new(mut ranges: Vec<Cidr>) -> Self {
        ranges.sort();
        ranges.dedup();

        let mut canonical: Vec<Cidr> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match canonical.last() {
                // Sorted order guarantees a containing block sorts first,
                // so one look-back suffices to absorb sub-ranges.
                Some(prev) if prev.contains(&range) => {}
                _ => canonical.push(range),
            }
        }
        Self { ranges: canonical }
    }

    /// True when `cidr` overlaps any reserved block
    pub fn overlaps(&self, cidr: &Cidr) -> bool {
        self.ranges.iter().any(|r| r.overlaps(cidr))
    }

    /// Iterate the canonical blocks in address order
    pub fn iter(&self) -> impl Iterator<Item = &Cidr> {
        self.ranges.iter()
    }

    /// Number of canonical blocks
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True when no blocks are reserved
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl FromIterator<Cidr> for RangeSet {
    fn from_iter<T: IntoIterator<Item = Cidr>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Cidr {
        s.parse().expect("test cidr")
    }

    #[test]
    fn parse_and_display_round_trip() {
        let c = cidr("10.100.8.0/24");
        assert_eq!(c.to_string(), "10.100.8.0/24");
        assert_eq!(c.prefix(), 24);
        assert_eq!(c.network(), Ipv4Addr::new(10, 100, 8, 0));
    }

    #[test]
    fn host_bits_are_masked() {
        assert_eq!(cidr("10.0.0.77/24"), cidr("10.0.0.0/24"));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!("10.0.0.0".parse::<Cidr>(), Err(CidrError::Malformed(_))));
        assert!(matches!("banana/24".parse::<Cidr>(), Err(CidrError::Malformed(_))));
        assert!(matches!("10.0.0.0/33".parse::<Cidr>(), Err(CidrError::PrefixOutOfRange(33))));
    }

    #[test]
    fn containment_and_overlap() {
        let parent = cidr("10.0.0.0/24");
        let sub = cidr("10.0.0.128/25");
        let sibling = cidr("10.0.1.0/24");

        assert!(parent.contains(&sub));
        assert!(!sub.contains(&parent));
        assert!(parent.overlaps(&sub));
        assert!(!parent.overlaps(&sibling));
    }

    #[test]
    fn nth_subnet_walks_chunks_in_order() {
        let parent = cidr("10.100.8.0/24");
        assert_eq!(parent.nth_subnet(27, 0), Some(cidr("10.100.8.0/27")));
        assert_eq!(parent.nth_subnet(27, 1), Some(cidr("10.100.8.32/27")));
        assert_eq!(parent.nth_subnet(27, 7), Some(cidr("10.100.8.224/27")));
        assert_eq!(parent.nth_subnet(27, 8), None);
        assert_eq!(parent.subnet_count(27), 8);
    }

    #[test]
    fn nth_subnet_rejects_shorter_prefixes() {
        let parent = cidr("10.100.8.0/24");
        assert_eq!(parent.nth_subnet(24, 0), None);
        assert_eq!(parent.nth_subnet(16, 0), None);
        assert_eq!(parent.subnet_count(16), 0);
    }

    #[test]
    fn range_set_absorbs_contained_ranges() {
        // Scenario: two /24s from one source, an overlapping /25 from another.
        let set = RangeSet::new(vec![
            cidr("10.0.0.0/24"),
            cidr("10.0.1.0/24"),
            cidr("10.0.0.128/25"),
        ]);
        let canonical: Vec<String> = set.iter().map(|c| c.to_string()).collect();
        assert_eq!(canonical, vec!["10.0.0.0/24", "10.0.1.0/24"]);
    }

    #[test]
    fn range_set_is_input_order_independent() {
        let a = RangeSet::new(vec![cidr("10.0.0.128/25"), cidr("10.0.1.0/24"), cidr("10.0.0.0/24")]);
        let b = RangeSet::new(vec![cidr("10.0.1.0/24"), cidr("10.0.0.0/24"), cidr("10.0.0.128/25")]);
        assert_eq!(a, b);
    }

    #[test]
    fn range_set_keeps_adjacent_siblings_distinct() {
        let set = RangeSet::new(vec![cidr("10.0.0.0/25"), cidr("10.0.0.128/25")]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn range_set_overlap_queries() {
        let set = RangeSet::new(vec![cidr("10.0.0.0/24")]);
        assert!(set.overlaps(&cidr("10.0.0.64/27")));
        assert!(!set.overlaps(&cidr("10.0.1.0/27")));
        assert!(RangeSet::default().is_empty());
    }
}
