//! A single node in the cluster

use crate::domain::ports::{Value, VarMap};
use serde::{Deserialize, Serialize};

/// Role tags with special meaning to the compiler
pub mod roles {
    pub const PRIMARY: &str = "primary";
    pub const REPLICA: &str = "replica";
    pub const BARMAN: &str = "barman";
    pub const BDR: &str = "bdr";
    pub const WITNESS: &str = "witness";
    pub const SUBSCRIBER_ONLY: &str = "subscriber-only";
    pub const STANDBY: &str = "standby";
    pub const HARP_PROXY: &str = "harp-proxy";
    pub const PGD_PROXY: &str = "pgd-proxy";
    pub const ETCD: &str = "etcd";
}

/// Classification of a BDR node derived from its roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BdrNodeKind {
    Witness,
    SubscriberOnly,
    Standby,
    Data,
}

impl BdrNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BdrNodeKind::Witness => "witness",
            BdrNodeKind::SubscriberOnly => "subscriber-only",
            BdrNodeKind::Standby => "standby",
            BdrNodeKind::Data => "data",
        }
    }
}

impl std::fmt::Display for BdrNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One node of a cluster
///
/// Instances are owned by their [`Cluster`](super::Cluster) and refer to
/// their location by name. Create them with `Cluster::add_instance`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub name: String,
    pub location: String,
    pub roles: Vec<String>,
    pub host_vars: VarMap,
    /// Everything else persisted on the instance entry, including `node`
    pub settings: VarMap,
}

impl Instance {
    pub(crate) fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        host_vars: VarMap,
        settings: VarMap,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            roles: Vec::new(),
            host_vars,
            settings,
        }
    }

    /// Add a role tag unless the instance already has it
    pub fn add_role(&mut self, role: impl Into<String>) {
        let role = role.into();
        if !self.has_role(&role) {
            self.roles.push(role);
        }
    }

    pub fn remove_role(&mut self, role: &str) -> bool {
        let before = self.roles.len();
        self.roles.retain(|r| r != role);
        before != self.roles.len()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Node ordinal from settings
    pub fn node(&self) -> Option<u64> {
        self.settings.get("node").and_then(Value::as_u64)
    }

    /// First match wins: witness, subscriber-only, standby, else data
    pub fn bdr_node_kind(&self) -> BdrNodeKind {
        if self.has_role(roles::WITNESS) {
            BdrNodeKind::Witness
        } else if self.has_role(roles::SUBSCRIBER_ONLY) {
            BdrNodeKind::SubscriberOnly
        } else if self.has_role(roles::STANDBY) {
            BdrNodeKind::Standby
        } else {
            BdrNodeKind::Data
        }
    }

    pub fn host_var(&self, key: &str) -> Option<&Value> {
        self.host_vars.get(key)
    }

    pub fn set_host_var(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.host_vars.insert(key.into(), value.into());
    }

    pub fn remove_host_var(&mut self, key: &str) -> Option<Value> {
        self.host_vars.shift_remove(key)
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), value.into());
    }
}
