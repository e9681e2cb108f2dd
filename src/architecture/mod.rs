//! Architectures
//!
//! Policies describing each supported cluster topology, the registry that
//! resolves them by name, and the configure driver that turns a policy and
//! a set of options into a cluster directory.

pub mod bdr;
pub mod bdr_always_on;
pub mod configure;
pub mod hostnames;
pub mod m1;
pub mod options;
pub mod pgd_always_on;
pub mod platform;
pub mod policy;
pub mod registry;

pub use bdr_always_on::BdrAlwaysOn;
pub use configure::*;
pub use hostnames::*;
pub use m1::M1;
pub use options::*;
pub use pgd_always_on::PgdAlwaysOn;
pub use platform::*;
pub use policy::*;
pub use registry::*;
