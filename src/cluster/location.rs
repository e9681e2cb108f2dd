//! Deployment sites

use super::group::Group;
use crate::domain::ports::{Value, VarMap};

/// A named deployment site (region/zone) grouping one or more instances
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    /// Variables scoped to this location, named `location_<name>`
    pub group: Group,
    /// Persisted location keys such as `subnet`, `region` or `az`
    pub settings: VarMap,
    /// Location hosts only a witness node
    pub witness_only: bool,
}

impl Location {
    pub(crate) fn new(name: impl Into<String>, settings: VarMap) -> Self {
        let name = name.into();
        Self {
            group: Group::new(format!("location_{}", name)),
            name,
            settings,
            witness_only: false,
        }
    }

    /// Name of the BDR/PGD node subgroup for this location
    pub fn sub_group_name(&self) -> String {
        format!("{}_subgroup", self.name)
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Subnet assigned to this location, if any
    pub fn subnet(&self) -> Option<&str> {
        self.settings.get("subnet").and_then(Value::as_str)
    }
}
