//! Network Module
//!
//! CIDR arithmetic for cluster networks: parsing and overlap checks,
//! subnet allocation, and discovery of subnets used by sibling clusters.

pub mod discovery;
pub mod network;
pub mod subnets;

pub use discovery::*;
pub use network::*;
pub use subnets::*;
