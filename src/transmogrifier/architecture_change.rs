//! Change a cluster's architecture

use super::framework::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};
use super::report::{ChangeDescription, CheckResult};
use crate::architecture::registry::is_registered;
use crate::architecture::{BdrAlwaysOn, PgdAlwaysOn};
use crate::cluster::Cluster;
use crate::error::{Error, Result};

/// Architecture conversions that can be carried out, and the transmogrifier
/// doing the real work for each
const CONVERSIONS: &[(&str, &str, TransmogrifierKind)] = &[(
    BdrAlwaysOn::NAME,
    PgdAlwaysOn::NAME,
    TransmogrifierKind::Bdr4Pgd5,
)];

fn conversion(from: &str, to: &str) -> Option<TransmogrifierKind> {
    CONVERSIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, kind)| *kind)
}

#[derive(Debug, Clone)]
pub struct ArchitectureChange {
    target: String,
}

impl ArchitectureChange {
    pub fn from_args(args: &ReconfigureArgs) -> Result<Self> {
        let target = args.architecture.clone().ok_or_else(|| {
            Error::Configure(
                "--pgd-proxy-routing can only be used together with --architecture".into(),
            )
        })?;
        Ok(Self { target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Transmogrifier for ArchitectureChange {
    fn kind(&self) -> TransmogrifierKind {
        TransmogrifierKind::ArchitectureChange
    }

    /// Converting to PGD-Always-ON needs the BDR4 to PGD5 upgrade first
    fn requires(&self) -> Vec<TransmogrifierKind> {
        let mut requires = self.kind().requires().to_vec();
        if self.target == PgdAlwaysOn::NAME {
            requires.push(TransmogrifierKind::Bdr4Pgd5);
        }
        requires
    }

    fn is_applicable(&self, cluster: &Cluster) -> bool {
        cluster.architecture != self.target
    }

    fn check(&self, cluster: &Cluster) -> CheckResult {
        let mut result = CheckResult::new();
        if !is_registered(&self.target) {
            result.error(format!("Unknown architecture: {}", self.target));
        } else if conversion(&cluster.architecture, &self.target).is_none() {
            result.error(format!(
                "Don't know how to convert architecture from {} to {}",
                cluster.architecture, self.target
            ));
        }
        result
    }

    fn description(&self, cluster: &Cluster) -> ChangeDescription {
        ChangeDescription::new("Architecture").with_item(format!(
            "Change architecture from {} to {}",
            cluster.architecture, self.target
        ))
    }

    fn apply(&self, cluster: &mut Cluster) -> Result<()> {
        cluster.architecture = self.target.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn change_to(target: &str) -> ArchitectureChange {
        ArchitectureChange::from_args(&ReconfigureArgs {
            architecture: Some(target.into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_target() {
        assert_matches!(
            ArchitectureChange::from_args(&ReconfigureArgs::default()),
            Err(Error::Configure(_))
        );
    }

    #[test]
    fn test_pgd_target_requires_upgrade() {
        let t = change_to("PGD-Always-ON");
        assert_eq!(
            t.all_required(),
            vec![
                TransmogrifierKind::Common,
                TransmogrifierKind::Replace2qRepositories,
                TransmogrifierKind::Bdr4Pgd5
            ]
        );
        assert_eq!(change_to("M1").requires(), vec![TransmogrifierKind::Common]);
    }

    #[test]
    fn test_unknown_conversion_path() {
        let m1 = Cluster::new("c", "M1", "aws");
        let t = change_to("PGD-Always-ON");
        assert!(t.is_applicable(&m1));
        let result = t.check(&m1);
        assert_eq!(
            result.errors,
            vec!["Don't know how to convert architecture from M1 to PGD-Always-ON".to_string()]
        );

        let bdr = Cluster::new("c", "BDR-Always-ON", "aws");
        assert!(t.check(&bdr).is_clean());

        assert!(change_to("Imaginary").check(&bdr).has_errors());
    }

    #[test]
    fn test_apply_sets_architecture() {
        let mut bdr = Cluster::new("c", "BDR-Always-ON", "aws");
        let t = change_to("PGD-Always-ON");
        t.apply(&mut bdr).unwrap();
        assert_eq!(bdr.architecture, "PGD-Always-ON");
        assert!(!t.is_applicable(&bdr));
    }
}
