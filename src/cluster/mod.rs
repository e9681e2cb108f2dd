//! Cluster Object Model
//!
//! The in-memory form of a cluster configuration: the [`Cluster`]
//! aggregate, its [`Location`]s and [`Instance`]s, variable scopes
//! ([`Group`]) and the persisted YAML schema.

pub mod aggregate;
pub mod config;
pub mod group;
pub mod instance;
pub mod instances;
pub mod location;

pub use aggregate::*;
pub use config::*;
pub use group::*;
pub use instance::*;
pub use instances::*;
pub use location::*;
