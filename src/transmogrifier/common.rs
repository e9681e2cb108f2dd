//! Normalisation applied to every reconfigured cluster
//!
//! Older configurations spell the flavour variable `postgresql_flavour`
//! and call the extended distribution `2q`.

use super::framework::{ReconfigureArgs, Transmogrifier, TransmogrifierKind};
use super::report::{ChangeDescription, CheckResult};
use crate::architecture::options::PostgresFlavour;
use crate::cluster::Cluster;
use crate::domain::ports::Value;
use crate::error::Result;

const LEGACY_KEY: &str = "postgresql_flavour";
const KEY: &str = "postgres_flavour";

fn normalize(flavour: &str) -> &str {
    match flavour {
        "2q" => "pgextended",
        other => other,
    }
}

/// The cluster's flavour as it will read once normalised
pub fn effective_flavour(cluster: &Cluster) -> Option<String> {
    cluster
        .var_str(KEY)
        .or_else(|| cluster.var_str(LEGACY_KEY))
        .map(|f| normalize(f).to_string())
}

/// Parsed flavour; `None` when unset or unknown
pub fn known_flavour(cluster: &Cluster) -> Option<PostgresFlavour> {
    effective_flavour(cluster).and_then(|f| PostgresFlavour::from_var(&f))
}

#[derive(Debug, Clone, Default)]
pub struct Common;

impl Common {
    pub fn from_args(_args: &ReconfigureArgs) -> Result<Self> {
        Ok(Self)
    }
}

impl Transmogrifier for Common {
    fn kind(&self) -> TransmogrifierKind {
        TransmogrifierKind::Common
    }

    fn is_applicable(&self, cluster: &Cluster) -> bool {
        cluster.vars.contains_key(LEGACY_KEY) || cluster.var_str(KEY) == Some("2q")
    }

    fn check(&self, cluster: &Cluster) -> CheckResult {
        let mut result = CheckResult::new();
        if let (Some(legacy), Some(current)) = (cluster.var_str(LEGACY_KEY), cluster.var_str(KEY)) {
            if normalize(legacy) != normalize(current) {
                result.error(format!(
                    "cluster_vars sets both {}={} and {}={}; remove one of them",
                    LEGACY_KEY, legacy, KEY, current
                ));
            }
        }
        result
    }

    fn description(&self, cluster: &Cluster) -> ChangeDescription {
        let mut d = ChangeDescription::new("Normalise cluster_vars");
        if cluster.vars.contains_key(LEGACY_KEY) {
            d.item(format!("Rename {} to {}", LEGACY_KEY, KEY));
        }
        if effective_flavour(cluster).as_deref() == Some("pgextended")
            && (cluster.var_str(KEY) == Some("2q") || cluster.var_str(LEGACY_KEY) == Some("2q"))
        {
            d.item("Change postgres_flavour from 2q to pgextended");
        }
        d
    }

    fn apply(&self, cluster: &mut Cluster) -> Result<()> {
        let legacy = cluster.vars.shift_remove(LEGACY_KEY);
        if let (Some(value), false) = (legacy, cluster.vars.contains_key(KEY)) {
            cluster.vars.insert(KEY.to_string(), value);
        }
        if cluster.var_str(KEY) == Some("2q") {
            cluster.set_var(KEY, Value::from("pgextended"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with(vars: &[(&str, &str)]) -> Cluster {
        let mut cluster = Cluster::new("c", "M1", "aws");
        for (k, v) in vars {
            cluster.set_var(*k, *v);
        }
        cluster
    }

    #[test]
    fn test_renames_legacy_key() {
        let mut cluster = cluster_with(&[("postgresql_flavour", "2q")]);
        assert!(Common.is_applicable(&cluster));
        assert_eq!(effective_flavour(&cluster).as_deref(), Some("pgextended"));
        assert_eq!(
            Common.description(&cluster).to_string(),
            "Normalise cluster_vars\n\
             * Rename postgresql_flavour to postgres_flavour\n\
             * Change postgres_flavour from 2q to pgextended\n"
        );

        Common.apply(&mut cluster).unwrap();
        assert!(!cluster.vars.contains_key("postgresql_flavour"));
        assert_eq!(cluster.var_str("postgres_flavour"), Some("pgextended"));
        assert!(!Common.is_applicable(&cluster));
    }

    #[test]
    fn test_conflicting_keys() {
        let cluster = cluster_with(&[
            ("postgresql_flavour", "epas"),
            ("postgres_flavour", "postgresql"),
        ]);
        assert!(Common.check(&cluster).has_errors());

        let agreeing = cluster_with(&[
            ("postgresql_flavour", "2q"),
            ("postgres_flavour", "pgextended"),
        ]);
        assert!(Common.check(&agreeing).is_clean());
    }

    #[test]
    fn test_nothing_to_do() {
        let cluster = cluster_with(&[("postgres_flavour", "epas")]);
        assert!(!Common.is_applicable(&cluster));
        assert_eq!(known_flavour(&cluster), Some(PostgresFlavour::Epas));
    }
}
