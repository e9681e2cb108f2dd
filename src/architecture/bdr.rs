//! Settings shared by the BDR-based architectures

use super::options::{ProbeScheme, ProxyRouting};
use crate::domain::ports::{map_value, Value, VarMap};

pub const DEFAULT_BDR_DATABASE: &str = "bdrdb";
pub const DEFAULT_BDR_NODE_GROUP: &str = "bdrgroup";
pub const DEFAULT_PGD_PROXY_PORT: u64 = 6432;

/// `harp_http_options` / `pgd_http_options` for an enabled probe
///
/// `{enable: true}`, plus `secure: true` when https was requested.
pub fn probe_options(scheme: ProbeScheme) -> Value {
    let mut options = VarMap::new();
    options.insert("enable".into(), Value::from(true));
    if scheme == ProbeScheme::Https {
        options.insert("secure".into(), Value::from(true));
    }
    map_value(options)
}

/// `default_pgd_proxy_options`
pub fn default_pgd_proxy_options() -> Value {
    let mut options = VarMap::new();
    options.insert("listen_port".into(), Value::from(DEFAULT_PGD_PROXY_PORT));
    map_value(options)
}

/// One location's PGD subgroup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgroupSpec {
    pub location: String,
    pub name: String,
    pub witness_only: bool,
}

/// `bdr_node_groups`: the top group followed by one subgroup per location
///
/// Global routing elects one write leader for the top group; local routing
/// elects one per data location.
pub fn bdr_node_groups(top: &str, subgroups: &[SubgroupSpec], routing: ProxyRouting) -> Value {
    let global = routing == ProxyRouting::Global;

    let mut top_options = VarMap::new();
    top_options.insert("enable_proxy_routing".into(), Value::from(global));
    top_options.insert("enable_raft".into(), Value::from(true));

    let mut top_group = VarMap::new();
    top_group.insert("name".into(), Value::from(top));
    top_group.insert("options".into(), map_value(top_options));

    let mut groups = vec![map_value(top_group)];
    for sub in subgroups {
        let mut options = VarMap::new();
        options.insert("location".into(), Value::from(sub.location.as_str()));
        options.insert(
            "enable_proxy_routing".into(),
            Value::from(!global && !sub.witness_only),
        );
        options.insert("enable_raft".into(), Value::from(!global));

        let mut group = VarMap::new();
        group.insert("name".into(), Value::from(sub.name.as_str()));
        group.insert("parent_group_name".into(), Value::from(top));
        group.insert("options".into(), map_value(options));
        groups.push(map_value(group));
    }
    Value::Sequence(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_options() {
        assert_eq!(
            probe_options(ProbeScheme::Http),
            serde_yaml::from_str::<Value>("{enable: true}").unwrap()
        );
        assert_eq!(
            probe_options(ProbeScheme::Https),
            serde_yaml::from_str::<Value>("{enable: true, secure: true}").unwrap()
        );
    }

    #[test]
    fn test_node_groups_local_routing() {
        let subgroups = vec![
            SubgroupSpec {
                location: "first".into(),
                name: "first_subgroup".into(),
                witness_only: false,
            },
            SubgroupSpec {
                location: "w".into(),
                name: "w_subgroup".into(),
                witness_only: true,
            },
        ];
        let groups = bdr_node_groups("bdrgroup", &subgroups, ProxyRouting::Local);
        let groups = groups.as_sequence().unwrap();
        assert_eq!(groups.len(), 3);

        assert_eq!(groups[0]["name"], Value::from("bdrgroup"));
        assert_eq!(groups[0]["options"]["enable_proxy_routing"], Value::from(false));

        assert_eq!(groups[1]["parent_group_name"], Value::from("bdrgroup"));
        assert_eq!(groups[1]["options"]["location"], Value::from("first"));
        assert_eq!(groups[1]["options"]["enable_proxy_routing"], Value::from(true));
        assert_eq!(groups[2]["options"]["enable_proxy_routing"], Value::from(false));
    }

    #[test]
    fn test_node_groups_global_routing() {
        let subgroups = vec![SubgroupSpec {
            location: "a".into(),
            name: "a_subgroup".into(),
            witness_only: false,
        }];
        let groups = bdr_node_groups("top", &subgroups, ProxyRouting::Global);
        assert_eq!(groups[0]["options"]["enable_proxy_routing"], Value::from(true));
        assert_eq!(groups[1]["options"]["enable_proxy_routing"], Value::from(false));
        assert_eq!(groups[1]["options"]["enable_raft"], Value::from(false));
    }
}
