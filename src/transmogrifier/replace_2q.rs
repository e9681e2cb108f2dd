//! Replace 2ndQuadrant repositories with EDB repositories
//!
//! Clusters without `tpa_2q_repositories` or `edb_repositories` get the
//! 2ndQuadrant repositories implied by their flavour and BDR version.
//! This sets the equivalent EDB repositories explicitly instead.

use super::common::known_flavour;
use super::framework::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};
use super::repositories::EDB_REPOSITORIES;
use super::report::{ChangeDescription, CheckResult};
use crate::architecture::options::PostgresFlavour;
use crate::cluster::Cluster;
use crate::domain::ports::{string_seq, Value};
use crate::error::{Error, Result};

pub const TPA_2Q_REPOSITORIES: &str = "tpa_2q_repositories";

/// Major BDR version from a `bdr_version` value such as `4` or `"3.7"`
pub fn bdr_major(cluster: &Cluster) -> Option<u32> {
    cluster
        .var_string("bdr_version")
        .and_then(|v| v.split('.').next().and_then(|m| m.trim().parse().ok()))
}

/// EDB repositories equivalent to the implicit 2ndQuadrant ones
pub fn replacement_repositories(
    bdr_major: Option<u32>,
    flavour: PostgresFlavour,
) -> Option<&'static [&'static str]> {
    use PostgresFlavour::*;
    let repos: &'static [&'static str] = match (bdr_major, flavour) {
        (Some(3), Postgresql) => &["bdr_3_7_postgres", "standard"],
        (Some(3), Pgextended) => &[
            "bdr_3_7_postgres_extended",
            "standard",
            "postgres_extended",
        ],
        (Some(3), Epas) => &["bdr_3_7_epas", "enterprise"],
        (Some(4), Postgresql) => &["postgres_distributed_4", "standard"],
        (Some(4), Pgextended) => &["postgres_distributed_4", "standard", "postgres_extended"],
        (Some(4), Epas) => &["postgres_distributed_4", "enterprise"],
        (None, Pgextended) => &["standard", "postgres_extended"],
        (None, Epas) => &["enterprise"],
        _ => return None,
    };
    Some(repos)
}

#[derive(Debug, Clone, Default)]
pub struct Replace2qRepositories;

impl Replace2qRepositories {
    pub fn from_args(_args: &ReconfigureArgs) -> Result<Self> {
        Ok(Self)
    }

    fn target(cluster: &Cluster) -> Option<&'static [&'static str]> {
        replacement_repositories(bdr_major(cluster), known_flavour(cluster)?)
    }
}

fn implicit_2q(cluster: &Cluster) -> bool {
    match cluster.vars.get(TPA_2Q_REPOSITORIES) {
        None | Some(Value::Null) => true,
        Some(Value::Sequence(repos)) => repos.is_empty(),
        Some(_) => false,
    }
}

impl Transmogrifier for Replace2qRepositories {
    fn kind(&self) -> TransmogrifierKind {
        TransmogrifierKind::Replace2qRepositories
    }

    fn is_applicable(&self, cluster: &Cluster) -> bool {
        implicit_2q(cluster)
            && !cluster.vars.contains_key(EDB_REPOSITORIES)
            && known_flavour(cluster).is_some()
            && (Self::target(cluster).is_some() || bdr_major(cluster) == Some(5))
    }

    fn check(&self, cluster: &Cluster) -> CheckResult {
        let mut result = CheckResult::new();
        if bdr_major(cluster) == Some(5) {
            result.error(
                "bdr_version 5 clusters do not use 2ndQuadrant repositories; nothing to replace",
            );
        }
        result
    }

    fn description(&self, cluster: &Cluster) -> ChangeDescription {
        let target = Self::target(cluster).unwrap_or_default();
        ChangeDescription::new("Replace 2ndQuadrant repositories").with_item(format!(
            "Set edb_repositories to [{}]",
            target.join(", ")
        ))
    }

    fn apply(&self, cluster: &mut Cluster) -> Result<()> {
        let target = Self::target(cluster).ok_or_else(|| {
            Error::Transmogrifier(
                "No EDB replacement for this cluster's 2ndQuadrant repositories".into(),
            )
        })?;
        cluster.vars.shift_remove(TPA_2Q_REPOSITORIES);
        cluster.set_var(EDB_REPOSITORIES, string_seq(target));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transmogrifier::pipeline::{self, BoxedTransmogrifier};
    use crate::transmogrifier::repositories::current_repositories;
    use std::collections::BTreeSet;

    fn bdr_cluster(version: &str, flavour: &str) -> Cluster {
        let mut cluster = Cluster::new("c", "BDR-Always-ON", "aws");
        cluster.set_var("bdr_version", version);
        cluster.set_var("postgres_flavour", flavour);
        cluster
    }

    #[test]
    fn test_epas_bdr4() {
        let mut cluster = bdr_cluster("4", "epas");
        let t = Replace2qRepositories;
        assert!(t.is_applicable(&cluster));
        assert!(t.check(&cluster).is_clean());

        t.apply(&mut cluster).unwrap();
        let repos: BTreeSet<String> = current_repositories(&cluster).unwrap().into_iter().collect();
        let expected: BTreeSet<String> = ["postgres_distributed_4", "enterprise"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(repos, expected);
        assert!(!t.is_applicable(&cluster));
    }

    #[test]
    fn test_numeric_version_and_legacy_flavour() {
        let mut cluster = Cluster::new("c", "BDR-Always-ON", "aws");
        cluster.set_var("bdr_version", Value::from(3));
        cluster.set_var("postgresql_flavour", "2q");
        assert_eq!(bdr_major(&cluster), Some(3));
        assert_eq!(
            Replace2qRepositories::target(&cluster),
            Some(&["bdr_3_7_postgres_extended", "standard", "postgres_extended"][..])
        );
    }

    #[test]
    fn test_bdr5_is_an_error() {
        let cluster = bdr_cluster("5", "pgextended");
        let result = Replace2qRepositories.check(&cluster);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_not_applicable_with_explicit_repositories() {
        let mut explicit = bdr_cluster("4", "pgextended");
        explicit.set_var(TPA_2Q_REPOSITORIES, string_seq(&["products/bdr_enterprise_3_7/release"]));
        assert!(!Replace2qRepositories.is_applicable(&explicit));

        let mut empty = bdr_cluster("4", "pgextended");
        empty.set_var(TPA_2Q_REPOSITORIES, Value::Sequence(vec![]));
        assert!(Replace2qRepositories.is_applicable(&empty));

        let mut edb = bdr_cluster("4", "pgextended");
        edb.set_var(EDB_REPOSITORIES, string_seq(&["standard"]));
        assert!(!Replace2qRepositories.is_applicable(&edb));
    }

    #[test]
    fn test_unmapped_combination() {
        let mut m1 = Cluster::new("c", "M1", "aws");
        m1.set_var("postgres_flavour", "postgresql");
        assert!(!Replace2qRepositories.is_applicable(&m1));

        let ts: Vec<BoxedTransmogrifier> = vec![Box::new(Replace2qRepositories)];
        assert_eq!(pipeline::describe(&m1, &ts), "No changes\n");
        assert!(!pipeline::check(&m1, &ts).unwrap().has_errors());
    }
}
