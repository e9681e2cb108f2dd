//! BDR-Always-ON: BDR4 with HARP
//!
//! Each data location has two BDR nodes, an optional logical standby, a
//! barman server and (unless co-hosted) two HARP proxies. A separate
//! witness-only location holds the BDR witness.

use super::bdr::{probe_options, DEFAULT_BDR_DATABASE, DEFAULT_BDR_NODE_GROUP};
use super::hostnames::NameAllocator;
use super::options::{BdrLayout, ConfigureArgs, HarpConsensus, PostgresFlavour};
use super::policy::{reject_option, ArchitecturePolicy};
use crate::cluster::{roles, Cluster};
use crate::domain::ports::{Value, VarMap};
use crate::error::{Error, Result};

const DEFAULT_LOCATION_NAMES: [&str; 3] = ["first", "second", "third"];

#[derive(Debug, Clone, Copy, Default)]
pub struct BdrAlwaysOn;

impl BdrAlwaysOn {
    pub const NAME: &'static str = "BDR-Always-ON";

    fn layout(args: &ConfigureArgs) -> Result<BdrLayout> {
        args.layout.ok_or_else(|| {
            Error::Configure(
                "BDR-Always-ON requires --layout (bronze, silver, gold or platinum)".into(),
            )
        })
    }

    fn consensus(args: &ConfigureArgs) -> Result<HarpConsensus> {
        args.harp_consensus_protocol.ok_or_else(|| {
            Error::Configure(
                "BDR-Always-ON requires --harp-consensus-protocol (etcd or bdr)".into(),
            )
        })
    }

    /// The location reserved for the witness
    fn witness_location(&self, args: &ConfigureArgs) -> Option<String> {
        args.witness_only_location
            .clone()
            .or_else(|| self.location_names(args).last().cloned())
    }

    fn instances_per_data_location(layout: BdrLayout, cohost_proxies: bool) -> usize {
        let standby = usize::from(layout.has_standby());
        let proxies = if cohost_proxies { 0 } else { 2 };
        2 + standby + 1 + proxies
    }
}

impl ArchitecturePolicy for BdrAlwaysOn {
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
        ]
    }

    fn default_location_names(&self, args: &ConfigureArgs) -> Vec<String> {
        let data = args.layout.map(|l| l.data_locations()).unwrap_or(1);
        DEFAULT_LOCATION_NAMES[..data + 1]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn validate_arguments(&self, args: &ConfigureArgs) -> Result<()> {
        let layout = Self::layout(args)?;
        Self::consensus(args)?;

        let names = self.location_names(args);
        let expected = layout.data_locations() + 1;
        if names.len() != expected {
            return Err(Error::Configure(format!(
                "The {:?} layout needs {} locations ({} for data, one for the witness), got {}",
                layout,
                expected,
                expected - 1,
                names.len()
            )));
        }

        reject_option(Self::NAME, "--pgd-proxy-routing", args.pgd_proxy_routing.is_some())?;
        reject_option(Self::NAME, "--enable-pgd-probes", args.enable_pgd_probes.is_some())?;
        reject_option(
            Self::NAME,
            "--data-nodes-per-location",
            args.data_nodes_per_location.is_some(),
        )?;
        reject_option(
            Self::NAME,
            "--add-proxy-nodes-per-location",
            args.add_proxy_nodes_per_location > 0,
        )?;
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
        let layout = match args.layout {
            Some(layout) => layout,
            None => return 0,
        };
        layout.data_locations() * Self::instances_per_data_location(layout, args.cohost_proxies) + 1
    }

    fn add_instances(
        &self,
        cluster: &mut Cluster,
        args: &ConfigureArgs,
        names: &mut NameAllocator<'_>,
    ) -> Result<()> {
        let layout = Self::layout(args)?;
        let etcd = Self::consensus(args)? == HarpConsensus::Etcd;
        let witness_location = self.witness_location(args);

        for location in self.location_names(args) {
            if Some(&location) == witness_location.as_ref() {
                continue;
            }

            let data = names.take_n(2)?;
            let standby = if layout.has_standby() {
                Some(names.take()?)
            } else {
                None
            };
            let barman = names.take()?;

            let mut backup = VarMap::new();
            backup.insert("backup".into(), Value::from(barman.as_str()));

            for name in &data {
                let node = cluster.add_instance(name, &location, VarMap::new(), backup.clone())?;
                node.add_role(roles::BDR);
                if args.cohost_proxies {
                    node.add_role(roles::HARP_PROXY);
                }
                if etcd {
                    node.add_role(roles::ETCD);
                }
            }
            if let Some(name) = standby {
                let node = cluster.add_instance(&name, &location, VarMap::new(), backup.clone())?;
                node.add_role(roles::BDR);
                node.add_role(roles::STANDBY);
            }
            cluster
                .add_instance(&barman, &location, VarMap::new(), VarMap::new())?
                .add_role(roles::BARMAN);

            if !args.cohost_proxies {
                for name in names.take_n(2)? {
                    cluster
                        .add_instance(&name, &location, VarMap::new(), VarMap::new())?
                        .add_role(roles::HARP_PROXY);
                }
            }
        }

        if let Some(location) = witness_location {
            if let Some(l) = cluster.get_location_by_name_mut(&location) {
                l.witness_only = true;
            }
            let name = names.take()?;
            let witness = cluster.add_instance(&name, &location, VarMap::new(), VarMap::new())?;
            witness.add_role(roles::BDR);
            witness.add_role(roles::WITNESS);
            if etcd {
                witness.add_role(roles::ETCD);
            }
        }
        Ok(())
    }

    fn update_cluster_vars(&self, cluster: &mut Cluster, args: &ConfigureArgs) -> Result<()> {
        let consensus = Self::consensus(args)?;
        cluster.set_var("bdr_version", "4");
        cluster.set_var("bdr_database", DEFAULT_BDR_DATABASE);
        cluster.set_var("bdr_node_group", DEFAULT_BDR_NODE_GROUP);
        cluster.set_var("failover_manager", "harp");
        cluster.set_var("harp_consensus_protocol", consensus.as_str());
        if let Some(scheme) = args.enable_harp_probes {
            cluster.set_var("harp_http_options", probe_options(scheme));
        }
        Ok(())
    }
}
