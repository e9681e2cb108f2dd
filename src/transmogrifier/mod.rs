//! Transmogrifiers
//!
//! Reconfiguration of existing clusters. See [`framework`] for the model and
//! [`pipeline`] for how a run is assembled and applied.

pub mod architecture_change;
pub mod bdr4pgd5;
pub mod common;
pub mod framework;
pub mod pipeline;
pub mod replace_2q;
pub mod repositories;
pub mod report;

pub use architecture_change::ArchitectureChange;
pub use bdr4pgd5::Bdr4Pgd5;
pub use common::Common;
pub use framework::*;
pub use pipeline::*;
pub use replace_2q::Replace2qRepositories;
pub use repositories::Repositories;
pub use report::*;
