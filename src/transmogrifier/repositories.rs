//! Set `edb_repositories`

use super::common::{effective_flavour, known_flavour};
use super::framework::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};
use super::report::{ChangeDescription, CheckResult};
use crate::architecture::options::PostgresFlavour;
use crate::cluster::Cluster;
use crate::domain::ports::{as_string_vec, string_seq};
use crate::error::{Error, Result};

pub const EDB_REPOSITORIES: &str = "edb_repositories";

/// Repositories a flavour needs when nothing more specific is known
pub fn default_repositories(flavour: PostgresFlavour) -> Vec<String> {
    match flavour {
        PostgresFlavour::Epas => vec!["enterprise".to_string()],
        PostgresFlavour::Postgresql | PostgresFlavour::Pgextended | PostgresFlavour::Edbpge => {
            vec!["standard".to_string()]
        }
    }
}

pub fn current_repositories(cluster: &Cluster) -> Option<Vec<String>> {
    cluster.vars.get(EDB_REPOSITORIES).and_then(as_string_vec)
}

/// Sets an explicit repository list, or derives one from the flavour
#[derive(Debug, Clone, Default)]
pub struct Repositories {
    explicit: Option<Vec<String>>,
}

impl Repositories {
    pub fn from_args(args: &ReconfigureArgs) -> Result<Self> {
        Ok(Self {
            explicit: args.edb_repositories.clone().filter(|r| !r.is_empty()),
        })
    }

    fn target(&self, cluster: &Cluster) -> Option<Vec<String>> {
        self.explicit
            .clone()
            .or_else(|| known_flavour(cluster).map(default_repositories))
    }
}

impl Transmogrifier for Repositories {
    fn kind(&self) -> TransmogrifierKind {
        TransmogrifierKind::Repositories
    }

    fn is_applicable(&self, cluster: &Cluster) -> bool {
        match &self.explicit {
            Some(repos) => current_repositories(cluster).as_ref() != Some(repos),
            None => !cluster.vars.contains_key(EDB_REPOSITORIES),
        }
    }

    fn check(&self, cluster: &Cluster) -> CheckResult {
        let mut result = CheckResult::new();
        if self.target(cluster).is_none() {
            result.error(format!(
                "Cannot derive edb_repositories from postgres_flavour {}; \
                 please name the repositories with --edb-repositories",
                effective_flavour(cluster).unwrap_or_else(|| "(unset)".into())
            ));
        }
        if cluster.vars.contains_key("tpa_2q_repositories") {
            result.warning(
                "tpa_2q_repositories is still set; review it or use --replace-2q-repositories",
            );
        }
        result
    }

    fn description(&self, cluster: &Cluster) -> ChangeDescription {
        let target = self.target(cluster).unwrap_or_default();
        ChangeDescription::new("Repositories")
            .with_item(format!("Set edb_repositories to [{}]", target.join(", ")))
    }

    fn apply(&self, cluster: &mut Cluster) -> Result<()> {
        let target = self.target(cluster).ok_or_else(|| {
            Error::Transmogrifier("Cannot determine edb_repositories for this cluster".into())
        })?;
        cluster.set_var(EDB_REPOSITORIES, string_seq(&target));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(flavour: &str) -> Cluster {
        let mut cluster = Cluster::new("c", "M1", "aws");
        cluster.set_var("postgres_flavour", flavour);
        cluster
    }

    #[test]
    fn test_derived_from_flavour() {
        let t = Repositories::from_args(&ReconfigureArgs {
            edb_repositories: Some(vec![]),
            ..Default::default()
        })
        .unwrap();

        let mut epas = cluster("epas");
        assert!(t.is_applicable(&epas));
        assert!(t.check(&epas).is_clean());
        t.apply(&mut epas).unwrap();
        assert_eq!(current_repositories(&epas), Some(vec!["enterprise".to_string()]));
        assert!(!t.is_applicable(&epas));

        let mut pge = cluster("edbpge");
        t.apply(&mut pge).unwrap();
        assert_eq!(current_repositories(&pge), Some(vec!["standard".to_string()]));
    }

    #[test]
    fn test_unknown_flavour_fails_check() {
        let t = Repositories::default();
        let odd = cluster("mystery");
        assert!(t.check(&odd).has_errors());
    }

    #[test]
    fn test_explicit_list() {
        let t = Repositories::from_args(&ReconfigureArgs {
            edb_repositories: Some(vec!["standard".into(), "postgres_extended".into()]),
            ..Default::default()
        })
        .unwrap();

        let mut c = cluster("pgextended");
        c.set_var("edb_repositories", string_seq(&["standard"]));
        assert!(t.is_applicable(&c));
        assert_eq!(
            t.description(&c).to_string(),
            "Repositories\n* Set edb_repositories to [standard, postgres_extended]\n"
        );
        t.apply(&mut c).unwrap();
        assert!(!t.is_applicable(&c));
    }
}
