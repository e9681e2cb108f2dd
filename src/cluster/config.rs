//! Persisted cluster configuration (`config.yml`)
//!
//! The on-disk schema, plus the canonical top-level key order the file is
//! written in so that successive runs produce small, readable diffs.

use crate::domain::ports::{Value, VarMap};
use serde::{Deserialize, Deserializer, Serialize};

/// Top-level keys, in the order they are written; other keys follow
pub const TOP_LEVEL_KEY_ORDER: &[&str] = &[
    "architecture",
    "cluster_name",
    "cluster_tags",
    "cluster_vars",
    "locations",
    "instance_defaults",
    "instances",
];

/// The whole configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub architecture: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    #[serde(default)]
    pub cluster_vars: VarMap,

    #[serde(default)]
    pub locations: Vec<LocationEntry>,

    #[serde(default)]
    pub instance_defaults: VarMap,

    #[serde(default)]
    pub instances: Vec<InstanceEntry>,

    /// Every other top-level key (`cluster_tags`, `ec2_ami`, ...)
    #[serde(flatten)]
    pub extra: VarMap,
}

/// One entry under `locations`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub witness_only: bool,

    #[serde(default, skip_serializing_if = "VarMap::is_empty")]
    pub vars: VarMap,

    #[serde(flatten)]
    pub settings: VarMap,
}

/// One entry under `instances`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEntry {
    #[serde(rename = "Name")]
    pub name: String,

    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<u64>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub role: Vec<String>,

    #[serde(default, skip_serializing_if = "VarMap::is_empty")]
    pub vars: VarMap,

    #[serde(flatten)]
    pub settings: VarMap,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Accept `role: primary` as well as `role: [primary, barman]`
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(role) => vec![role],
        OneOrMany::Many(roles) => roles,
    })
}

/// Rewrite a top-level mapping so known keys come first, in canonical order
pub fn reorder_keys(value: Value) -> Value {
    let Value::Mapping(mut mapping) = value else {
        return value;
    };

    let mut ordered = serde_yaml::Mapping::new();
    for key in TOP_LEVEL_KEY_ORDER {
        if let Some(v) = mapping.shift_remove(*key) {
            ordered.insert(Value::from(*key), v);
        }
    }
    for (k, v) in mapping {
        ordered.insert(k, v);
    }
    Value::Mapping(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_keys() {
        let value: Value = serde_yaml::from_str(
            "instances: []\nzeta: 1\ncluster_vars: {}\narchitecture: M1\nlocations: []\n",
        )
        .unwrap();
        let reordered = reorder_keys(value);
        let keys: Vec<&str> = reordered
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["architecture", "cluster_vars", "locations", "instances", "zeta"]);
    }

    #[test]
    fn test_instance_entry_accepts_single_role() {
        let entry: InstanceEntry = serde_yaml::from_str(
            "Name: one\nlocation: a\nnode: 2\nrole: primary\nbackup: two\n",
        )
        .unwrap();
        assert_eq!(entry.role, vec!["primary"]);
        assert_eq!(entry.node, Some(2));
        assert_eq!(entry.settings.get("backup"), Some(&Value::from("two")));
    }

    #[test]
    fn test_location_entry_settings_are_flattened() {
        let entry: LocationEntry =
            serde_yaml::from_str("Name: first\nsubnet: 10.33.0.0/28\nregion: eu-west-1\n").unwrap();
        assert_eq!(entry.name, "first");
        assert!(!entry.witness_only);
        assert_eq!(entry.settings.len(), 2);
    }
}
