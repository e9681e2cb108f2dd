//! M1: single-primary streaming replication
//!
//! The first location holds the primary, one replica and a barman server.
//! Every further location holds one replica of the primary plus any
//! cascaded replicas fed from it.

use super::hostnames::NameAllocator;
use super::options::{ConfigureArgs, FailoverManager, PostgresFlavour};
use super::policy::{reject_option, ArchitecturePolicy};
use crate::cluster::{roles, Cluster};
use crate::domain::ports::{Value, VarMap};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct M1;

impl M1 {
    pub const NAME: &'static str = "M1";

    /// Failover manager after applying `--enable-efm` and flavour defaults
    pub fn failover_manager(args: &ConfigureArgs) -> FailoverManager {
        match (args.failover_manager, args.enable_efm) {
            (Some(fm), _) => fm,
            (None, true) => FailoverManager::Efm,
            (None, false) if args.postgres_flavour == Some(PostgresFlavour::Epas) => {
                FailoverManager::Efm
            }
            (None, false) => FailoverManager::Repmgr,
        }
    }
}

fn settings(pairs: &[(&str, &str)]) -> VarMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

impl ArchitecturePolicy for M1 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_flavour(&self) -> PostgresFlavour {
        PostgresFlavour::Postgresql
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
        vec!["main".into(), "dr".into()]
    }

    fn validate_arguments(&self, args: &ConfigureArgs) -> Result<()> {
        if args.enable_efm && args.failover_manager.is_some() {
            return Err(Error::Configure(
                "--enable-efm cannot be combined with --failover-manager; \
                 use --failover-manager efm instead"
                    .into(),
            ));
        }
        if args.num_cascaded_replicas > 0 && self.location_names(args).len() < 2 {
            return Err(Error::Configure(
                "--num-cascaded-replicas needs at least two locations".into(),
            ));
        }

        reject_option(Self::NAME, "--layout", args.layout.is_some())?;
        reject_option(
            Self::NAME,
            "--harp-consensus-protocol",
            args.harp_consensus_protocol.is_some(),
        )?;
        reject_option(Self::NAME, "--pgd-proxy-routing", args.pgd_proxy_routing.is_some())?;
        reject_option(
            Self::NAME,
            "--witness-only-location",
            args.witness_only_location.is_some(),
        )?;
        reject_option(Self::NAME, "--enable-harp-probes", args.enable_harp_probes.is_some())?;
        reject_option(Self::NAME, "--enable-pgd-probes", args.enable_pgd_probes.is_some())?;
        Ok(())
    }

    fn num_instances(&self, args: &ConfigureArgs) -> usize {
        let locations = self.location_names(args).len();
        let patroni = Self::failover_manager(args) == FailoverManager::Patroni;
        3 + locations.saturating_sub(1) * (1 + args.num_cascaded_replicas) + usize::from(patroni)
    }

    fn add_instances(
        &self,
        cluster: &mut Cluster,
        args: &ConfigureArgs,
        names: &mut NameAllocator<'_>,
    ) -> Result<()> {
        let locations = self.location_names(args);
        let (first, others) = locations
            .split_first()
            .ok_or_else(|| Error::Architecture("M1 needs at least one location".into()))?;
        let patroni = Self::failover_manager(args) == FailoverManager::Patroni;

        let primary = names.take()?;
        let replica = names.take()?;
        let barman = names.take()?;

        let backup = settings(&[("backup", barman.as_str())]);
        let p = cluster.add_instance(&primary, first, VarMap::new(), backup)?;
        p.add_role(roles::PRIMARY);
        if patroni {
            p.add_role(roles::ETCD);
        }

        let upstream = settings(&[("upstream", primary.as_str())]);
        let r = cluster.add_instance(&replica, first, VarMap::new(), upstream)?;
        r.add_role(roles::REPLICA);
        if patroni {
            r.add_role(roles::ETCD);
        }

        cluster
            .add_instance(&barman, first, VarMap::new(), VarMap::new())?
            .add_role(roles::BARMAN);

        if patroni {
            let etcd = names.take()?;
            cluster
                .add_instance(&etcd, first, VarMap::new(), VarMap::new())?
                .add_role(roles::ETCD);
        }

        for location in others {
            let replica = names.take()?;
            let upstream = settings(&[("upstream", primary.as_str())]);
            cluster
                .add_instance(&replica, location, VarMap::new(), upstream)?
                .add_role(roles::REPLICA);

            for _ in 0..args.num_cascaded_replicas {
                let cascaded = names.take()?;
                let upstream = settings(&[("upstream", replica.as_str())]);
                cluster
                    .add_instance(&cascaded, location, VarMap::new(), upstream)?
                    .add_role(roles::REPLICA);
            }
        }
        Ok(())
    }

    fn update_cluster_vars(&self, cluster: &mut Cluster, args: &ConfigureArgs) -> Result<()> {
        let fm = Self::failover_manager(args);
        cluster.set_var("failover_manager", fm.as_str());
        if fm == FailoverManager::Patroni {
            cluster.set_var("etcd_location", self.location_names(args)[0].clone());
        }
        Ok(())
    }
}
