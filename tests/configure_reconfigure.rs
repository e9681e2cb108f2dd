//! End-to-end: configure a BDR-Always-ON cluster, then upgrade it to
//! PGD-Always-ON through the reconfigure pipeline.

use assert_matches::assert_matches;
use cluster_forge::architecture::{config_path, BdrLayout, HarpConsensus, ProbeScheme, ProxyRouting};
use cluster_forge::cluster::roles;
use cluster_forge::domain::ports::as_string_vec;
use cluster_forge::transmogrifier::pipeline;
use cluster_forge::{configure, Cluster, ConfigureArgs, Error, ReconfigureArgs, Value};
use std::fs;
use tempfile::TempDir;

fn gold_args() -> ConfigureArgs {
    let mut args = ConfigureArgs::new("BDR-Always-ON");
    args.layout = Some(BdrLayout::Gold);
    args.harp_consensus_protocol = Some(HarpConsensus::Etcd);
    args.enable_harp_probes = Some(ProbeScheme::Http);
    args.platform = Some("docker".into());
    args.no_shuffle_subnets = true;
    args
}

fn to_pgd(routing: ProxyRouting) -> ReconfigureArgs {
    ReconfigureArgs {
        architecture: Some("PGD-Always-ON".into()),
        pgd_proxy_routing: Some(routing),
        ..Default::default()
    }
}

#[test]
fn test_configure_then_upgrade_to_pgd() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("golden");
    let configured = configure(gold_args(), &dir, false).unwrap();

    assert_eq!(configured.instances.len(), 11);
    assert_eq!(configured.instances.with_role(roles::HARP_PROXY).len(), 4);
    assert_eq!(configured.var_str("failover_manager"), Some("harp"));

    let mut cluster = Cluster::from_yaml(config_path(&dir)).unwrap();
    assert_eq!(cluster, configured);

    let transmogrifiers =
        pipeline::transmogrifiers_from_args(&to_pgd(ProxyRouting::Local)).unwrap();
    let description = pipeline::describe(&cluster, &transmogrifiers);
    assert!(description.contains("Replace 2ndQuadrant repositories"));
    assert!(description.contains("Upgrade BDR4 to PGD5"));

    let result = pipeline::apply(&mut cluster, &transmogrifiers).unwrap();
    assert_eq!(result.warnings.len(), 2);

    assert_eq!(cluster.architecture, "PGD-Always-ON");
    assert_eq!(cluster.var_str("bdr_version"), Some("5"));
    assert_eq!(cluster.var_str("failover_manager"), Some("pgd"));
    assert!(cluster.vars.contains_key("pgd_http_options"));
    assert!(cluster.vars.keys().all(|k| !k.starts_with("harp_")));
    assert_eq!(
        as_string_vec(&cluster.vars["edb_repositories"]).unwrap(),
        vec!["postgres_distributed", "standard", "postgres_extended"]
    );
    assert!(cluster.instances.with_role(roles::HARP_PROXY).is_empty());
    assert!(cluster.instances.with_role(roles::ETCD).is_empty());
    assert_eq!(cluster.instances.with_role(roles::PGD_PROXY).len(), 4);
    for bdr in cluster.instances.with_role(roles::BDR).iter() {
        assert_eq!(
            bdr.host_var("bdr_child_group"),
            Some(&Value::from(format!("{}_subgroup", bdr.location)))
        );
    }

    cluster.write(config_path(&dir)).unwrap();
    let reloaded = Cluster::from_yaml(config_path(&dir)).unwrap();
    assert_eq!(reloaded, cluster);

    let group = reloaded.inventory_group();
    assert!(group.find("first_subgroup").is_some());

    // A second run has nothing left to do
    let again = pipeline::transmogrifiers_from_args(&to_pgd(ProxyRouting::Local)).unwrap();
    assert_eq!(pipeline::describe(&reloaded, &again), "No changes\n");
}

#[test]
fn test_global_routing_is_refused() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("golden");
    configure(gold_args(), &dir, false).unwrap();
    let before = fs::read_to_string(config_path(&dir)).unwrap();

    let mut cluster = Cluster::from_yaml(config_path(&dir)).unwrap();
    let original = cluster.clone();
    let transmogrifiers =
        pipeline::transmogrifiers_from_args(&to_pgd(ProxyRouting::Global)).unwrap();
    let err = pipeline::apply(&mut cluster, &transmogrifiers).unwrap_err();

    assert_matches!(err, Error::Transmogrifier(_));
    assert_eq!(err.exit_code(), 7);
    assert_eq!(cluster, original);
    assert_eq!(fs::read_to_string(config_path(&dir)).unwrap(), before);
}

#[test]
fn test_set_repositories_on_m1() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("single");
    let mut args = ConfigureArgs::new("M1");
    args.platform = Some("docker".into());
    args.postgres_flavour = Some(cluster_forge::architecture::PostgresFlavour::Epas);
    let mut cluster = configure(args, &dir, false).unwrap();

    let changes = ReconfigureArgs {
        edb_repositories: Some(vec![]),
        ..Default::default()
    };
    let transmogrifiers = pipeline::transmogrifiers_from_args(&changes).unwrap();
    pipeline::apply(&mut cluster, &transmogrifiers).unwrap();
    assert_eq!(
        as_string_vec(&cluster.vars["edb_repositories"]).unwrap(),
        vec!["enterprise"]
    );
}
