//! PGD-Always-ON: PGD5 with PGD Proxy
//!
//! Every data location becomes a PGD subgroup of one top-level group. A
//! location with exactly two data nodes also gets a witness so that it can
//! keep a Raft majority. Proxies are either co-hosted on the data nodes or
//! run on dedicated instances.

use super::bdr::{
    bdr_node_groups, default_pgd_proxy_options, probe_options, SubgroupSpec,
    DEFAULT_BDR_DATABASE, DEFAULT_BDR_NODE_GROUP,
};
use super::hostnames::NameAllocator;
use super::options::{ConfigureArgs, PostgresFlavour, ProxyRouting};
use super::policy::{reject_option, ArchitecturePolicy};
use crate::cluster::{roles, Cluster};
use crate::domain::ports::{Value, VarMap};
use crate::error::{Error, Result};

pub const DEFAULT_DATA_NODES_PER_LOCATION: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct PgdAlwaysOn;

impl PgdAlwaysOn {
    pub const NAME: &'static str = "PGD-Always-ON";

    fn routing(args: &ConfigureArgs) -> Result<ProxyRouting> {
        args.pgd_proxy_routing.ok_or_else(|| {
            Error::Configure("PGD-Always-ON requires --pgd-proxy-routing (global or local)".into())
        })
    }

    fn data_nodes(args: &ConfigureArgs) -> usize {
        args.data_nodes_per_location
            .unwrap_or(DEFAULT_DATA_NODES_PER_LOCATION)
    }

    fn instances_per_data_location(args: &ConfigureArgs) -> usize {
        let n = Self::data_nodes(args);
        n + usize::from(n == 2) + args.add_proxy_nodes_per_location
    }

    fn data_locations(&self, args: &ConfigureArgs) -> Vec<String> {
        self.location_names(args)
            .into_iter()
            .filter(|l| Some(l) != args.witness_only_location.as_ref())
            .collect()
    }
}

impl ArchitecturePolicy for PgdAlwaysOn {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_flavour(&self) -> PostgresFlavour {
        PostgresFlavour::Pgextended
    }

    fn supported_flavours(&self) -> &'static [PostgresFlavour] {
        &[
            PostgresFlavour::Postgresql,
            PostgresFlavour::Pgextended,
            PostgresFlavour::Epas,
            PostgresFlavour::Edbpge,
        ]
    }

    fn default_location_names(&self, _args: &ConfigureArgs) -> Vec<String> {
        vec!["first".into()]
    }

    fn validate_arguments(&self, args: &ConfigureArgs) -> Result<()> {
        Self::routing(args)?;

        if args.data_nodes_per_location == Some(0) {
            return Err(Error::Configure(
                "--data-nodes-per-location must be at least 1".into(),
            ));
        }
        if args.witness_only_location.is_some() && self.data_locations(args).is_empty() {
            return Err(Error::Configure(
                "A witness-only location needs at least one other location for data nodes".into(),
            ));
        }

        reject_option(Self::NAME, "--layout", args.layout.is_some())?;
        reject_option(
            Self::NAME,
            "--harp-consensus-protocol",
            args.harp_consensus_protocol.is_some(),
        )?;
        reject_option(Self::NAME, "--enable-harp-probes", args.enable_harp_probes.is_some())?;
        reject_option(Self::NAME, "--cohost-proxies", args.cohost_proxies)?;
        reject_option(
            Self::NAME,
            "--failover-manager",
            args.failover_manager.is_some() || args.enable_efm,
        )?;
        reject_option(
            Self::NAME,
            "--num-cascaded-replicas",
            args.num_cascaded_replicas > 0,
        )?;
        Ok(())
    }

    fn num_instances(&self, args: &ConfigureArgs) -> usize {
        let data_locations = self.data_locations(args).len();
        let witness_only = usize::from(args.witness_only_location.is_some());
        data_locations * Self::instances_per_data_location(args) + 1 + witness_only
    }

    fn add_instances(
        &self,
        cluster: &mut Cluster,
        args: &ConfigureArgs,
        names: &mut NameAllocator<'_>,
    ) -> Result<()> {
        let n = Self::data_nodes(args);
        let proxies = args.add_proxy_nodes_per_location;
        let mut barman: Option<String> = None;

        for (index, location) in self.data_locations(args).iter().enumerate() {
            let child_group = child_group_var(cluster, location)?;
            let data = names.take_n(n)?;
            let witness = if n == 2 { Some(names.take()?) } else { None };
            if index == 0 {
                barman = Some(names.take()?);
            }

            let mut settings = VarMap::new();
            if let (0, Some(b)) = (index, &barman) {
                settings.insert("backup".into(), Value::from(b.as_str()));
            }

            for name in &data {
                let node =
                    cluster.add_instance(name, location, child_group.clone(), settings.clone())?;
                node.add_role(roles::BDR);
                if proxies == 0 {
                    node.add_role(roles::PGD_PROXY);
                }
            }
            if let Some(name) = witness {
                let node =
                    cluster.add_instance(&name, location, child_group.clone(), VarMap::new())?;
                node.add_role(roles::BDR);
                node.add_role(roles::WITNESS);
            }
            if let (0, Some(b)) = (index, &barman) {
                cluster
                    .add_instance(b, location, VarMap::new(), VarMap::new())?
                    .add_role(roles::BARMAN);
            }
            for name in names.take_n(proxies)? {
                cluster
                    .add_instance(&name, location, VarMap::new(), VarMap::new())?
                    .add_role(roles::PGD_PROXY);
            }
        }

        if let Some(location) = &args.witness_only_location {
            let child_group = child_group_var(cluster, location)?;
            if let Some(l) = cluster.get_location_by_name_mut(location) {
                l.witness_only = true;
            }
            let name = names.take()?;
            let witness = cluster.add_instance(&name, location, child_group, VarMap::new())?;
            witness.add_role(roles::BDR);
            witness.add_role(roles::WITNESS);
        }
        Ok(())
    }

    fn update_cluster_vars(&self, cluster: &mut Cluster, args: &ConfigureArgs) -> Result<()> {
        let routing = Self::routing(args)?;

        let subgroups: Vec<SubgroupSpec> = cluster
            .locations
            .iter()
            .map(|l| SubgroupSpec {
                location: l.name.clone(),
                name: l.sub_group_name(),
                witness_only: l.witness_only,
            })
            .collect();

        cluster.set_var("bdr_version", "5");
        cluster.set_var("bdr_database", DEFAULT_BDR_DATABASE);
        cluster.set_var("bdr_node_group", DEFAULT_BDR_NODE_GROUP);
        cluster.set_var("failover_manager", "pgd");
        cluster.set_var(
            "bdr_node_groups",
            bdr_node_groups(DEFAULT_BDR_NODE_GROUP, &subgroups, routing),
        );
        cluster.set_var("default_pgd_proxy_options", default_pgd_proxy_options());
        if let Some(scheme) = args.enable_pgd_probes {
            cluster.set_var("pgd_http_options", probe_options(scheme));
        }
        Ok(())
    }
}

/// Host vars placing an instance in its location's subgroup
fn child_group_var(cluster: &Cluster, location: &str) -> Result<VarMap> {
    let location = cluster.get_location_by_name(location).ok_or_else(|| {
        Error::Architecture(format!("Location {} has not been added", location))
    })?;
    let mut vars = VarMap::new();
    vars.insert(
        "bdr_child_group".into(),
        Value::from(location.sub_group_name()),
    );
    Ok(vars)
}
