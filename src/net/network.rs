//! IPv4 network ranges

use crate::error::{Error, Result};
use ipnet::Ipv4Net;
use std::str::FromStr;

/// Parse a CIDR string; the address must be the network address
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Net> {
    let net = Ipv4Net::from_str(cidr.trim()).map_err(|e| Error::InvalidCidr {
        cidr: cidr.to_string(),
        reason: e.to_string(),
    })?;

    if net != net.trunc() {
        return Err(Error::InvalidCidr {
            cidr: cidr.to_string(),
            reason: format!("host bits set (did you mean {}?)", net.trunc()),
        });
    }
    Ok(net)
}

/// Check if two CIDR blocks share any address
pub fn blocks_overlap(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

/// An address range and its size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    pub cidr: Ipv4Net,
    /// Number of addresses in the range
    pub size: u64,
}

impl Network {
    pub fn new(cidr: Ipv4Net) -> Self {
        Self {
            size: 1u64 << (32 - u32::from(cidr.prefix_len())),
            cidr,
        }
    }

    pub fn parse(cidr: &str) -> Result<Self> {
        parse_cidr(cidr).map(Self::new)
    }

    /// `other` lies entirely inside this network
    pub fn contains(&self, other: &Ipv4Net) -> bool {
        self.cidr.contains(other)
    }

    pub fn overlaps(&self, other: &Ipv4Net) -> bool {
        blocks_overlap(&self.cidr, other)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cidr)
    }
}
