//! Error types for cluster-forge
//!
//! Provides structured error types for every stage of the compiler:
//! argument validation, architecture policy, the cluster object graph,
//! subnet allocation and the reconfiguration pipeline.

use thiserror::Error;

/// Unified error type for the compiler
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Invalid or insufficient input to produce or change a cluster
    #[error("{0}")]
    Configure(String),

    /// Requested architecture name is not registered
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    // =========================================================================
    // Policy Errors
    // =========================================================================
    /// An architecture-level invariant was violated
    #[error("{0}")]
    Architecture(String),

    // =========================================================================
    // Object Graph Errors
    // =========================================================================
    /// Structural conflict inside the cluster (e.g. duplicate names)
    #[error("{0}")]
    Cluster(String),

    /// An instance references a location that does not exist
    #[error("{0}")]
    Instance(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    #[error("{0}")]
    Net(String),

    #[error("Invalid CIDR {cidr}: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    // =========================================================================
    // Reconfiguration Errors
    // =========================================================================
    /// A reconfiguration batch cannot proceed
    #[error("{0}")]
    Transmogrifier(String),

    // =========================================================================
    // IO / Parse Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Top-level failure class, used by the CLI to pick an exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configure,
    Architecture,
    Cluster,
    Instance,
    Net,
    Transmogrifier,
    UnsupportedArchitecture,
    Other,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configure(_) => ErrorKind::Configure,
            Error::Architecture(_) => ErrorKind::Architecture,
            Error::Cluster(_) => ErrorKind::Cluster,
            Error::Instance(_) => ErrorKind::Instance,
            Error::Net(_) | Error::InvalidCidr { .. } => ErrorKind::Net,
            Error::Transmogrifier(_) => ErrorKind::Transmogrifier,
            Error::UnsupportedArchitecture(_) => ErrorKind::UnsupportedArchitecture,
            Error::Io(_) | Error::Yaml(_) | Error::Json(_) | Error::Glob(_) => ErrorKind::Other,
        }
    }

    /// Process exit code for this error; each failure class gets its own
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configure => 2,
            ErrorKind::Architecture => 3,
            ErrorKind::Cluster => 4,
            ErrorKind::Instance => 5,
            ErrorKind::Net => 6,
            ErrorKind::Transmogrifier => 7,
            ErrorKind::UnsupportedArchitecture => 8,
            ErrorKind::Other => 1,
        }
    }

    /// Check if this error was caused by user input rather than the environment
    pub fn is_user_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Other)
    }
}

/// Result type alias for the compiler
pub type Result<T> = std::result::Result<T, Error>;
