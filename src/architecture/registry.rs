//! Architecture registry
//!
//! Maps architecture names to policy constructors. The built-in
//! architectures are registered on first use; more can be added at runtime.

use super::bdr_always_on::BdrAlwaysOn;
use super::m1::M1;
use super::pgd_always_on::PgdAlwaysOn;
use super::policy::ArchitecturePolicy;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::OnceLock;
use tracing::debug;

/// Builds a fresh policy instance
pub type PolicyConstructor = fn() -> Box<dyn ArchitecturePolicy>;

static REGISTRY: OnceLock<RwLock<IndexMap<String, PolicyConstructor>>> = OnceLock::new();

fn registry() -> &'static RwLock<IndexMap<String, PolicyConstructor>> {
    REGISTRY.get_or_init(|| {
        let mut builtins: IndexMap<String, PolicyConstructor> = IndexMap::new();
        builtins.insert(M1::NAME.to_string(), || Box::new(M1));
        builtins.insert(BdrAlwaysOn::NAME.to_string(), || Box::new(BdrAlwaysOn));
        builtins.insert(PgdAlwaysOn::NAME.to_string(), || Box::new(PgdAlwaysOn));
        RwLock::new(builtins)
    })
}

/// Register (or replace) an architecture
pub fn register_architecture(name: impl Into<String>, constructor: PolicyConstructor) {
    let name = name.into();
    debug!("Registering architecture {}", name);
    registry().write().insert(name, constructor);
}

/// Policy for `name`
pub fn lookup_architecture(name: &str) -> Result<Box<dyn ArchitecturePolicy>> {
    let constructor = registry()
        .read()
        .get(name)
        .copied()
        .ok_or_else(|| Error::UnsupportedArchitecture(name.to_string()))?;
    Ok(constructor())
}

pub fn is_registered(name: &str) -> bool {
    registry().read().contains_key(name)
}

/// Registered names, built-ins first
pub fn architecture_names() -> Vec<String> {
    registry().read().keys().cloned().collect()
}
