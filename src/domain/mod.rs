//! Domain layer - Port definitions and shared value types
//!
//! This module defines the traits (ports) external adapters implement,
//! following hexagonal architecture principles.

pub mod credentials;
pub mod ports;

pub use credentials::*;
pub use ports::*;
