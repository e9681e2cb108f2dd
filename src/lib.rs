//! Cluster Forge - Postgres Cluster Configuration Compiler
//!
//! Generates and rewrites the `config.yml` that describes a Postgres, BDR or
//! PGD deployment: which instances exist, where they live, which roles they
//! play and which variables apply to them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              cluster-forge CLI                               │
//! ├──────────────────────────────────────┬──────────────────────────────────────┤
//! │             configure                │             reconfigure              │
//! │  ┌────────────────┐ ┌─────────────┐  │  ┌────────────────┐ ┌─────────────┐  │
//! │  │  Architecture  │ │  Platform   │  │  │ Transmogrifier │ │   Check /   │  │
//! │  │    Policies    │ │   Policy    │  │  │    Pipeline    │ │  Describe   │  │
//! │  └───────┬────────┘ └──────┬──────┘  │  └───────┬────────┘ └──────┬──────┘  │
//! │          │                 │         │          │                 │         │
//! │          └────────┬────────┘         │          └────────┬────────┘         │
//! ├───────────────────┼──────────────────┴───────────────────┼──────────────────┤
//! │                   │        Cluster Model                 │                  │
//! │                   └──────► Cluster / Location ◄──────────┘                  │
//! │                            Instance / Group                                  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │   Subnets allocator   │   Hostnames   │   Credentials   │   Image lookup     │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`architecture`]: Architecture policies, registry and the configure step
//! - [`cluster`]: Cluster, location, instance and variable-group model
//! - [`net`]: CIDR parsing and subnet allocation
//! - [`transmogrifier`]: Changes applied to existing configurations
//! - [`domain`]: Ports for external systems and shared value helpers
//! - [`error`]: Error types and handling

pub mod architecture;
pub mod cluster;
pub mod domain;
pub mod error;
pub mod net;
pub mod transmogrifier;

// Re-export commonly used types
pub use architecture::{
    configure, lookup_architecture, register_architecture, ArchitecturePolicy, ConfigureArgs,
    Configurator,
};

pub use cluster::{Cluster, Group, Instance, Instances, Location};

pub use domain::ports::{CredentialStore, ImageLookup, Platform, Value, VarMap};

pub use error::{Error, Result};

pub use net::Subnets;

pub use transmogrifier::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
