//! BDR-Always-ON (BDR4 with HARP) to PGD-Always-ON (PGD5 with PGD Proxy)
//!
//! The upgrade replaces HARP with PGD Proxy, organises the BDR nodes into
//! one subgroup per location, moves CAMO partner pairs into commit scopes
//! and points the repositories at PGD5 packages.

use super::framework::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};
use super::replace_2q::bdr_major;
use super::repositories::EDB_REPOSITORIES;
use super::report::{ChangeDescription, CheckResult};
use crate::architecture::bdr::{
    bdr_node_groups, default_pgd_proxy_options, SubgroupSpec, DEFAULT_BDR_NODE_GROUP,
};
use crate::architecture::options::ProxyRouting;
use crate::architecture::{BdrAlwaysOn, PgdAlwaysOn};
use crate::cluster::{roles, BdrNodeKind, Cluster};
use crate::domain::ports::{as_string_vec, map_value, string_seq, Value, VarMap};
use crate::error::{Error, Result};
use tracing::debug;

const TARGET_BDR_VERSION: u32 = 5;
const CAMO_PARTNER: &str = "bdr_node_camo_partner";
const CAMO_SCOPE: &str = "camo";

#[derive(Debug, Clone)]
pub struct Bdr4Pgd5 {
    target_architecture: String,
    routing: Option<ProxyRouting>,
}

impl Bdr4Pgd5 {
    pub fn from_args(args: &ReconfigureArgs) -> Result<Self> {
        let target_architecture = args.architecture.clone().ok_or_else(|| {
            Error::Configure(format!(
                "Upgrading BDR4 to PGD5 needs --architecture {}",
                PgdAlwaysOn::NAME
            ))
        })?;
        Ok(Self {
            target_architecture,
            routing: args.pgd_proxy_routing,
        })
    }

    fn top_group(cluster: &Cluster) -> String {
        cluster
            .var_str("bdr_node_group")
            .unwrap_or(DEFAULT_BDR_NODE_GROUP)
            .to_string()
    }

    /// One subgroup for every location that holds BDR nodes
    fn subgroups(cluster: &Cluster) -> Vec<SubgroupSpec> {
        cluster
            .locations
            .iter()
            .filter_map(|l| {
                let bdr = cluster.instances.in_location(&l.name).with_role(roles::BDR);
                if bdr.is_empty() {
                    return None;
                }
                let witness_only = l.witness_only
                    || bdr.iter().all(|i| i.bdr_node_kind() == BdrNodeKind::Witness);
                Some(SubgroupSpec {
                    location: l.name.clone(),
                    name: l.sub_group_name(),
                    witness_only,
                })
            })
            .collect()
    }

    /// Locations with more than one BDR node
    fn multi_node_locations(cluster: &Cluster) -> Vec<(String, usize)> {
        cluster
            .locations
            .iter()
            .filter_map(|l| {
                let n = cluster.instances.in_location(&l.name).with_role(roles::BDR).len();
                (n >= 2).then(|| (l.name.clone(), n))
            })
            .collect()
    }

    fn harp_vars(cluster: &Cluster) -> Vec<String> {
        cluster
            .vars
            .keys()
            .filter(|k| k.starts_with("harp_"))
            .cloned()
            .collect()
    }

    fn camo_instances(cluster: &Cluster) -> Vec<&str> {
        cluster
            .instances
            .iter()
            .filter(|i| i.host_var(CAMO_PARTNER).is_some())
            .map(|i| i.name.as_str())
            .collect()
    }

    /// Reasons the upgrade cannot be applied to the cluster as it stands
    fn blockers(&self, cluster: &Cluster) -> Vec<String> {
        let mut blockers = Vec::new();
        if cluster.vars.contains_key("bdr_node_groups") {
            blockers.push(
                "Can't reconfigure BDR4 clusters with bdr_node_groups defined".to_string(),
            );
        }
        match bdr_major(cluster) {
            Some(4) => {}
            Some(source) => blockers.push(format!(
                "Don't know how to convert bdr_version from {} to {}",
                source, TARGET_BDR_VERSION
            )),
            None => blockers.push(format!(
                "Don't know how to convert bdr_version from {} to {}",
                cluster.var_string("bdr_version").unwrap_or_else(|| "(unset)".into()),
                TARGET_BDR_VERSION
            )),
        }
        blockers
    }
}

impl Transmogrifier for Bdr4Pgd5 {
    fn kind(&self) -> TransmogrifierKind {
        TransmogrifierKind::Bdr4Pgd5
    }

    fn is_applicable(&self, cluster: &Cluster) -> bool {
        self.target_architecture == PgdAlwaysOn::NAME && cluster.architecture != PgdAlwaysOn::NAME
    }

    fn is_ready(&self, _cluster: &Cluster) -> bool {
        self.routing.is_some()
    }

    fn check(&self, cluster: &Cluster) -> CheckResult {
        let mut result = CheckResult::new();
        if cluster.architecture != BdrAlwaysOn::NAME {
            result.error(format!(
                "Only {} clusters can be upgraded to {} (this cluster is {})",
                BdrAlwaysOn::NAME,
                PgdAlwaysOn::NAME,
                cluster.architecture
            ));
            return result;
        }
        for blocker in self.blockers(cluster) {
            result.error(blocker);
        }

        let multi = Self::multi_node_locations(cluster);
        for (location, n) in &multi {
            result.warning(format!(
                "Location {} has {} BDR nodes; PGD Proxy will route writes to one write \
                 leader among them",
                location, n
            ));
        }
        // Unset routing is treated as global
        let routing = self.routing.unwrap_or(ProxyRouting::Global);
        if multi.len() > 1 && routing == ProxyRouting::Global {
            let names: Vec<&str> = multi.iter().map(|(l, _)| l.as_str()).collect();
            result.error(format!(
                "With global routing there is a single write leader for the whole cluster, \
                 but locations {} each have several BDR nodes; use --pgd-proxy-routing local",
                names.join(", ")
            ));
        }
        result
    }

    fn description(&self, cluster: &Cluster) -> ChangeDescription {
        // Unset routing is described as global, matching `check`
        let routing = self.routing.unwrap_or(ProxyRouting::Global);
        let mut d = ChangeDescription::new("Upgrade BDR4 to PGD5");
        d.item(format!(
            "Change architecture from {} to {}",
            cluster.architecture, PgdAlwaysOn::NAME
        ));
        d.item(format!(
            "Change bdr_version from {} to {}",
            cluster.var_string("bdr_version").unwrap_or_else(|| "(unset)".into()),
            TARGET_BDR_VERSION
        ));
        d.item("Change failover_manager from harp to pgd");

        let harp = Self::harp_vars(cluster);
        if !harp.is_empty() {
            d.item(format!("Remove HARP settings: {}", harp.join(", ")));
        }

        let mut groups = ChangeDescription::new(format!(
            "Create BDR node groups ({} routing)",
            routing
        ));
        groups.item(Self::top_group(cluster));
        for sub in Self::subgroups(cluster) {
            groups.item(format!("{} (location {})", sub.name, sub.location));
        }
        d.nested(groups);

        let proxies = cluster.instances.with_role(roles::HARP_PROXY);
        if !proxies.is_empty() {
            let mut convert = ChangeDescription::new("Convert HARP proxies to PGD proxies");
            for name in proxies.names() {
                convert.item(name);
            }
            d.nested(convert);
        }

        let repos = cluster
            .vars
            .get(EDB_REPOSITORIES)
            .and_then(as_string_vec)
            .unwrap_or_default();
        if repos.iter().any(|r| r == "postgres_distributed_4") {
            d.item("Replace postgres_distributed_4 with postgres_distributed in edb_repositories");
        }

        let camo = Self::camo_instances(cluster);
        if !camo.is_empty() {
            d.item(format!(
                "Replace {} on {} with a CAMO commit scope; review the commit scope rule \
                 before deploying",
                CAMO_PARTNER,
                camo.join(", ")
            ));
        }
        d
    }

    fn apply(&self, cluster: &mut Cluster) -> Result<()> {
        if let Some(blocker) = self.blockers(cluster).into_iter().next() {
            return Err(Error::Configure(blocker));
        }
        let routing = self.routing.ok_or_else(|| {
            Error::Transmogrifier("Upgrading to PGD5 needs --pgd-proxy-routing".into())
        })?;

        let top = Self::top_group(cluster);
        let subgroups = Self::subgroups(cluster);
        let etcd_for_harp = cluster.var_str("harp_consensus_protocol") == Some("etcd");

        // cluster_vars
        cluster.architecture = self.target_architecture.clone();
        cluster.set_var("bdr_version", TARGET_BDR_VERSION.to_string());
        cluster.set_var("failover_manager", "pgd");
        if let Some(probes) = cluster.vars.get("harp_http_options").cloned() {
            cluster.set_var("pgd_http_options", probes);
        }
        for key in Self::harp_vars(cluster) {
            cluster.vars.shift_remove(&key);
        }
        cluster.set_var("bdr_node_groups", bdr_node_groups(&top, &subgroups, routing));
        if !cluster.vars.contains_key("default_pgd_proxy_options") {
            cluster.set_var("default_pgd_proxy_options", default_pgd_proxy_options());
        }

        if let Some(repos) = cluster.vars.get(EDB_REPOSITORIES).and_then(as_string_vec) {
            let repos: Vec<String> = repos
                .into_iter()
                .map(|r| match r.as_str() {
                    "postgres_distributed_4" => "postgres_distributed".to_string(),
                    _ => r,
                })
                .collect();
            cluster.set_var(EDB_REPOSITORIES, string_seq(&repos));
        }

        // instances
        let child_groups: Vec<(String, String)> = cluster
            .locations
            .iter()
            .map(|l| (l.name.clone(), l.sub_group_name()))
            .collect();
        let mut camo_locations: Vec<String> = Vec::new();

        for instance in cluster.instances.iter_mut() {
            for role in instance.roles.iter_mut() {
                if role == roles::HARP_PROXY {
                    *role = roles::PGD_PROXY.to_string();
                }
            }
            if etcd_for_harp {
                instance.remove_role(roles::ETCD);
            }
            let harp_host_vars: Vec<String> = instance
                .host_vars
                .keys()
                .filter(|k| k.starts_with("harp_"))
                .cloned()
                .collect();
            for key in harp_host_vars {
                instance.remove_host_var(&key);
            }

            if instance.has_role(roles::BDR) {
                if let Some((_, sub)) = child_groups.iter().find(|(l, _)| *l == instance.location) {
                    instance.set_host_var("bdr_child_group", sub.as_str());
                }
            }
            if instance.remove_host_var(CAMO_PARTNER).is_some()
                && !camo_locations.contains(&instance.location)
            {
                camo_locations.push(instance.location.clone());
            }
        }

        if !camo_locations.is_empty() {
            move_camo_to_commit_scopes(cluster, &camo_locations);
        }

        debug!(
            "Upgraded {} to {} with {} subgroups",
            cluster.name,
            PgdAlwaysOn::NAME,
            subgroups.len()
        );
        Ok(())
    }
}

/// Define a CAMO commit scope for each subgroup that had CAMO partners and
/// make it the subgroup's default
fn move_camo_to_commit_scopes(cluster: &mut Cluster, locations: &[String]) {
    let mut scopes = Vec::new();
    for location in locations {
        let sub = format!("{}_subgroup", location);
        let mut scope = VarMap::new();
        scope.insert("name".into(), Value::from(CAMO_SCOPE));
        scope.insert("origin".into(), Value::from(sub.as_str()));
        scope.insert(
            "rule".into(),
            Value::from(format!(
                "ALL ({}) CAMO DEGRADE ON (timeout=3600s) TO ASYNC",
                sub
            )),
        );
        scopes.push(map_value(scope));
    }
    cluster.set_var("bdr_commit_scopes", Value::Sequence(scopes));

    if let Some(Value::Sequence(groups)) = cluster.vars.get_mut("bdr_node_groups") {
        for group in groups.iter_mut() {
            let is_camo_group = group
                .get("name")
                .and_then(Value::as_str)
                .map(|name| locations.iter().any(|l| format!("{}_subgroup", l) == name))
                .unwrap_or(false);
            if !is_camo_group {
                continue;
            }
            if let Some(Value::Mapping(options)) = group.get_mut("options") {
                options.insert(
                    Value::from("default_commit_scope"),
                    Value::from(CAMO_SCOPE),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const GOLD: &str = r#"
architecture: BDR-Always-ON
cluster_name: gold
cluster_vars:
  bdr_version: '4'
  bdr_node_group: bdrgroup
  failover_manager: harp
  harp_consensus_protocol: etcd
  harp_http_options:
    enable: true
  postgres_flavour: epas
  edb_repositories:
  - postgres_distributed_4
  - enterprise
locations:
- Name: first
- Name: second
- Name: third
  witness_only: true
instances:
- Name: zero
  location: first
  node: 1
  role: [bdr, etcd]
  vars:
    bdr_node_camo_partner: one
- Name: one
  location: first
  node: 2
  role: [bdr, etcd]
  vars:
    bdr_node_camo_partner: zero
- Name: two
  location: first
  node: 3
  role: [harp-proxy]
  vars:
    harp_proxy_port: 6432
- Name: three
  location: second
  node: 4
  role: [bdr]
- Name: four
  location: second
  node: 5
  role: [bdr]
- Name: five
  location: third
  node: 6
  role: [bdr, witness, etcd]
"#;

    fn gold() -> Cluster {
        Cluster::from_yaml_str("gold", GOLD).unwrap()
    }

    fn upgrade(routing: Option<ProxyRouting>) -> Bdr4Pgd5 {
        Bdr4Pgd5::from_args(&ReconfigureArgs {
            architecture: Some(PgdAlwaysOn::NAME.into()),
            pgd_proxy_routing: routing,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_needs_target_architecture() {
        assert_matches!(
            Bdr4Pgd5::from_args(&ReconfigureArgs::default()),
            Err(Error::Configure(_))
        );
    }

    #[test]
    fn test_ready_only_with_routing() {
        let cluster = gold();
        assert!(!upgrade(None).is_ready(&cluster));
        assert!(upgrade(Some(ProxyRouting::Local)).is_ready(&cluster));
    }

    #[test]
    fn test_check_global_routing_with_multi_node_locations() {
        let cluster = gold();
        let result = upgrade(Some(ProxyRouting::Global)).check(&cluster);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("first, second"));

        let local = upgrade(Some(ProxyRouting::Local)).check(&cluster);
        assert_eq!(local.warnings.len(), 2);
        assert!(!local.has_errors());
    }

    #[test]
    fn test_check_unset_routing_counts_as_global() {
        let cluster = gold();
        let result = upgrade(None).check(&cluster);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("first, second"));
    }

    #[test]
    fn test_check_rejects_other_architectures() {
        let m1 = Cluster::new("c", "M1", "aws");
        let result = upgrade(Some(ProxyRouting::Local)).check(&m1);
        assert!(result.has_errors());
    }

    #[test]
    fn test_apply() {
        let mut cluster = gold();
        upgrade(Some(ProxyRouting::Local)).apply(&mut cluster).unwrap();

        assert_eq!(cluster.architecture, "PGD-Always-ON");
        assert_eq!(cluster.var_str("bdr_version"), Some("5"));
        assert_eq!(cluster.var_str("failover_manager"), Some("pgd"));
        assert!(cluster.vars.keys().all(|k| !k.starts_with("harp_")));
        assert_eq!(
            cluster.vars["pgd_http_options"],
            serde_yaml::from_str::<Value>("{enable: true}").unwrap()
        );
        assert_eq!(
            as_string_vec(&cluster.vars["edb_repositories"]).unwrap(),
            vec!["postgres_distributed", "enterprise"]
        );

        let groups = cluster.vars["bdr_node_groups"].as_sequence().unwrap();
        let names: Vec<_> = groups.iter().map(|g| g["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["bdrgroup", "first_subgroup", "second_subgroup", "third_subgroup"]);
        assert_eq!(groups[1]["options"]["default_commit_scope"], Value::from("camo"));
        assert!(groups[2]["options"].get("default_commit_scope").is_none());
        assert_eq!(groups[3]["options"]["enable_proxy_routing"], Value::from(false));

        let proxy = cluster.instance("two").unwrap();
        assert_eq!(proxy.roles, vec!["pgd-proxy"]);
        assert!(proxy.host_var("harp_proxy_port").is_none());
        assert!(proxy.host_var("bdr_child_group").is_none());

        let zero = cluster.instance("zero").unwrap();
        assert_eq!(zero.roles, vec!["bdr"]);
        assert!(zero.host_var(CAMO_PARTNER).is_none());
        assert_eq!(zero.host_var("bdr_child_group"), Some(&Value::from("first_subgroup")));

        let scopes = cluster.vars["bdr_commit_scopes"].as_sequence().unwrap();
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0]["origin"], Value::from("first_subgroup"));
    }

    #[test]
    fn test_apply_refuses_existing_node_groups() {
        let mut cluster = gold();
        cluster.set_var("bdr_node_groups", Value::Sequence(vec![]));
        let err = upgrade(Some(ProxyRouting::Local)).apply(&mut cluster).unwrap_err();
        assert_matches!(err, Error::Configure(_));
        assert_eq!(
            err.to_string(),
            "Can't reconfigure BDR4 clusters with bdr_node_groups defined"
        );
    }

    #[test]
    fn test_apply_refuses_version_not_below_target() {
        for version in ["5", "6"] {
            let mut cluster = gold();
            cluster.set_var("bdr_version", version);
            let err = upgrade(Some(ProxyRouting::Local)).apply(&mut cluster).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Don't know how to convert bdr_version from {} to 5", version)
            );
        }
    }

    #[test]
    fn test_description_mentions_camo() {
        let cluster = gold();
        let text = upgrade(Some(ProxyRouting::Local)).description(&cluster).to_string();
        assert!(text.starts_with("Upgrade BDR4 to PGD5\n"));
        assert!(text.contains("* Create BDR node groups (local routing)\n  * bdrgroup\n"));
        assert!(text.contains("  * two\n"));
        assert!(text.contains("bdr_node_camo_partner on zero, one"));

        let mut plain = gold();
        for instance in plain.instances.iter_mut() {
            instance.remove_host_var(CAMO_PARTNER);
        }
        let text = upgrade(Some(ProxyRouting::Local)).description(&plain).to_string();
        assert!(!text.contains("CAMO"));
    }
}
