//! Subnet Allocator
//!
//! Partitions a parent network into equally sized candidate subnets. Ranges
//! already claimed elsewhere can be excluded, the remaining candidates can
//! be shuffled so independent clusters don't all pick the same blocks, and
//! callers take the first N that are left.

use super::network::{blocks_overlap, parse_cidr};
use crate::error::{Error, Result};
use ipnet::Ipv4Net;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

// =============================================================================
// Constants
// =============================================================================

/// Network subnets are carved from unless `--network` says otherwise
pub const DEFAULT_NETWORK_CIDR: &str = "10.33.0.0/16";

/// Default prefix length of each location's subnet
pub const DEFAULT_SUBNET_PREFIX_LENGTH: u8 = 28;

pub const MIN_SUBNET_PREFIX_LENGTH: u8 = 23;
pub const MAX_SUBNET_PREFIX_LENGTH: u8 = 29;

// =============================================================================
// Subnets
// =============================================================================

/// Candidate subnets of a parent network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnets {
    cidr: Ipv4Net,
    new_prefix: u8,
    ranges: Vec<Ipv4Net>,
}

impl Subnets {
    /// Split `cidr` into every subnet of length `new_prefix`
    pub fn new(cidr: Ipv4Net, new_prefix: u8) -> Result<Self> {
        Self::validate(new_prefix)?;

        let ranges: Vec<Ipv4Net> = cidr
            .subnets(new_prefix)
            .map_err(|_| {
                Error::Net(format!(
                    "cannot split {} into /{} subnets: prefix is shorter than the network's",
                    cidr, new_prefix
                ))
            })?
            .collect();

        debug!("{} yields {} /{} subnets", cidr, ranges.len(), new_prefix);
        Ok(Self {
            cidr,
            new_prefix,
            ranges,
        })
    }

    pub fn parse(cidr: &str, new_prefix: u8) -> Result<Self> {
        Self::new(parse_cidr(cidr)?, new_prefix)
    }

    /// Subnet prefix lengths must lie in 23..=29
    pub fn validate(new_prefix: u8) -> Result<()> {
        if !(MIN_SUBNET_PREFIX_LENGTH..=MAX_SUBNET_PREFIX_LENGTH).contains(&new_prefix) {
            return Err(Error::Net(format!(
                "prefix length for subnets must be between {}-{}: {}",
                MIN_SUBNET_PREFIX_LENGTH, MAX_SUBNET_PREFIX_LENGTH, new_prefix
            )));
        }
        Ok(())
    }

    pub fn cidr(&self) -> Ipv4Net {
        self.cidr
    }

    pub fn new_prefix(&self) -> u8 {
        self.new_prefix
    }

    /// Remaining candidates, in current order
    pub fn ranges(&self) -> &[Ipv4Net] {
        &self.ranges
    }

    /// Drop every candidate equal to or overlapping any of `excluded`
    pub fn exclude(&mut self, excluded: &[Ipv4Net]) -> &mut Self {
        let before = self.ranges.len();
        self.ranges
            .retain(|r| !excluded.iter().any(|e| blocks_overlap(r, e)));
        debug!(
            "Excluded {} of {} candidate subnets",
            before - self.ranges.len(),
            before
        );
        self
    }

    /// The first `n` remaining candidates
    pub fn slice(&self, n: usize) -> Result<Vec<Ipv4Net>> {
        if n > self.ranges.len() {
            return Err(Error::Net(format!(
                "need {} /{} subnets in {}, only {} available",
                n,
                self.new_prefix,
                self.cidr,
                self.ranges.len()
            )));
        }
        Ok(self.ranges[..n].to_vec())
    }

    /// Randomly permute the candidates
    pub fn shuffle(&mut self) -> &mut Self {
        self.shuffle_with(&mut rand::thread_rng())
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &mut Self {
        self.ranges.shuffle(rng);
        self
    }

    pub fn get(&self, index: usize) -> Option<&Ipv4Net> {
        self.ranges.get(index)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ipv4Net> {
        self.ranges.iter()
    }
}

impl std::ops::Index<usize> for Subnets {
    type Output = Ipv4Net;

    fn index(&self, index: usize) -> &Self::Output {
        &self.ranges[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn cidr(s: &str) -> Ipv4Net {
        parse_cidr(s).unwrap()
    }

    #[test]
    fn test_prefix_bounds() {
        for prefix in MIN_SUBNET_PREFIX_LENGTH..=MAX_SUBNET_PREFIX_LENGTH {
            assert!(Subnets::parse("10.33.0.0/16", prefix).is_ok(), "/{}", prefix);
        }

        for prefix in [0u8, 16, 22, 30, 32] {
            let err = Subnets::parse("10.33.0.0/16", prefix).unwrap_err();
            assert_matches!(err, Error::Net(_));
            assert_eq!(
                err.to_string(),
                format!("prefix length for subnets must be between 23-29: {}", prefix)
            );
        }
    }

    #[test]
    fn test_prefix_shorter_than_network() {
        assert_matches!(Subnets::parse("10.33.0.0/25", 24), Err(Error::Net(_)));
    }

    #[test]
    fn test_ranges_partition_parent() {
        let parent = cidr("10.33.0.0/16");
        for prefix in MIN_SUBNET_PREFIX_LENGTH..=MAX_SUBNET_PREFIX_LENGTH {
            let subnets = Subnets::new(parent, prefix).unwrap();
            assert_eq!(subnets.len(), 1 << (prefix - 16));
            for pair in subnets.ranges().windows(2) {
                assert!(!blocks_overlap(&pair[0], &pair[1]));
                assert!(pair[0].broadcast() < pair[1].network());
            }
            assert!(subnets.iter().all(|r| parent.contains(r)));
        }
    }

    #[test]
    fn test_exclude_is_stable_and_complete() {
        let mut subnets = Subnets::parse("10.33.0.0/22", 24).unwrap();
        let excluded = [cidr("10.33.1.0/24"), cidr("10.33.2.128/25")];
        subnets.exclude(&excluded);

        assert_eq!(
            subnets.ranges(),
            &[cidr("10.33.0.0/24"), cidr("10.33.3.0/24")]
        );

        let taken = subnets.slice(2).unwrap();
        for r in &taken {
            assert!(excluded.iter().all(|e| !blocks_overlap(r, e)));
        }
    }

    #[test]
    fn test_exclude_larger_block() {
        let mut subnets = Subnets::parse("10.33.0.0/16", 28).unwrap();
        subnets.exclude(&[cidr("10.33.0.0/17")]);
        assert_eq!(subnets.len(), 2048);
        assert_eq!(subnets[0], cidr("10.33.128.0/28"));
    }

    #[test]
    fn test_slice_insufficient_supply() {
        let mut subnets = Subnets::parse("10.33.0.0/23", 24).unwrap();
        assert_eq!(subnets.slice(2).unwrap().len(), 2);
        subnets.exclude(&[cidr("10.33.0.0/24")]);
        assert_matches!(subnets.slice(2), Err(Error::Net(_)));
        assert_eq!(subnets.slice(0).unwrap(), Vec::<Ipv4Net>::new());
    }

    #[test]
    fn test_shuffle_preserves_set() {
        let original = Subnets::parse("10.33.0.0/16", 28).unwrap();
        let mut shuffled = original.clone();
        shuffled.shuffle_with(&mut StdRng::seed_from_u64(42));

        let a: BTreeSet<_> = original.iter().collect();
        let b: BTreeSet<_> = shuffled.iter().collect();
        assert_eq!(a, b);
        assert_ne!(original.ranges(), shuffled.ranges());
    }

    #[test]
    fn test_index_and_get() {
        let subnets = Subnets::parse("10.33.0.0/23", 24).unwrap();
        assert_eq!(subnets[1], cidr("10.33.1.0/24"));
        assert!(subnets.get(2).is_none());
    }
}
