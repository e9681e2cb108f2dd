//! Domain Ports - Core trait definitions for the cluster compiler
//!
//! These traits define the boundaries between the configuration engine and
//! external systems (cloud image catalogues, credential stores). Adapters
//! implement these traits to provide concrete functionality.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub use serde_yaml::Value;

/// Ordered mapping of variable name to arbitrary YAML value
pub type VarMap = IndexMap<String, Value>;

/// Convert a [`VarMap`] into a YAML mapping, keeping its order
pub fn map_value(vars: VarMap) -> Value {
    Value::Mapping(
        vars.into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect(),
    )
}

/// YAML sequence of strings
pub fn string_seq<S: AsRef<str>>(items: &[S]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::from(s.as_ref())).collect())
}

/// Strings of a YAML sequence; `None` unless every element is a string
pub fn as_string_vec(value: &Value) -> Option<Vec<String>> {
    value
        .as_sequence()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

// =============================================================================
// Platforms
// =============================================================================

/// Platform the cluster's instances are provisioned on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Aws,
    Bare,
    Docker,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Aws, Platform::Bare, Platform::Docker];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Aws => "aws",
            Platform::Bare => "bare",
            Platform::Docker => "docker",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aws" => Ok(Platform::Aws),
            "bare" => Ok(Platform::Bare),
            "docker" => Ok(Platform::Docker),
            other => Err(Error::Configure(format!("Unknown platform: {}", other))),
        }
    }
}

// =============================================================================
// Image Lookup Port
// =============================================================================

/// Name filters used to find a machine image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFilter {
    /// Image name (may contain the provider's wildcards)
    pub name: String,
    /// Owning account, if the catalogue needs one
    pub owner: Option<String>,
}

/// A resolved machine image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageId {
    pub image_id: String,
}

/// Cloud image catalogue
///
/// Implementations must fail when the filters match no image or more than
/// one image; [`ensure_single_image`] does that check for them.
pub trait ImageLookup {
    fn lookup_image(&self, filter: &ImageFilter) -> Result<ImageId>;
}

/// Reduce a list of catalogue matches to exactly one image
pub fn ensure_single_image(filter: &ImageFilter, mut matches: Vec<ImageId>) -> Result<ImageId> {
    match matches.len() {
        0 => Err(Error::Architecture(format!(
            "No image found matching {}",
            filter.name
        ))),
        1 => Ok(matches.remove(0)),
        n => Err(Error::Architecture(format!(
            "{} images found matching {}; please specify one",
            n, filter.name
        ))),
    }
}

// =============================================================================
// Credential Store Port
// =============================================================================

/// Storage for secrets that belong to a cluster (e.g. the vault password)
pub trait CredentialStore {
    /// Name of the backend, recorded in cluster_vars as `keyring_backend`
    fn backend(&self) -> &str;

    fn store(&self, cluster_dir: &Path, name: &str, secret: &str) -> Result<()>;

    fn show(&self, cluster_dir: &Path, name: &str) -> Result<String>;

    fn delete(&self, cluster_dir: &Path, name: &str) -> Result<()>;

    fn exists(&self, cluster_dir: &Path, name: &str) -> bool;
}
