//! Transmogrifier framework
//!
//! A transmogrifier is one self-contained change to an existing cluster
//! configuration. Each kind declares the command-line options that select
//! it and the kinds it depends on; a reconfigure run builds every selected
//! kind plus its dependencies and applies them in dependency order.

use super::report::{ChangeDescription, CheckResult};
use crate::architecture::options::ProxyRouting;
use crate::cluster::Cluster;
use crate::error::Result;
use std::fmt;

// =============================================================================
// Reconfigure Arguments
// =============================================================================

/// Options accepted by `reconfigure` that select changes
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconfigureArgs {
    /// Convert the cluster to this architecture
    #[arg(long, visible_alias = "target-architecture")]
    pub architecture: Option<String>,

    /// PGD proxy routing scope after converting to PGD-Always-ON
    #[arg(long, value_enum)]
    pub pgd_proxy_routing: Option<ProxyRouting>,

    /// Set edb_repositories; with no values, derive them from postgres_flavour
    #[arg(long, num_args = 0.., value_name = "REPO")]
    pub edb_repositories: Option<Vec<String>>,

    /// Replace implicit 2ndQuadrant repositories with EDB repositories
    #[arg(long = "replace-2q-repositories")]
    pub replace_2q_repositories: bool,
}

impl ReconfigureArgs {
    /// Whether the option named by `flag` was given
    pub fn supplied(&self, flag: &str) -> bool {
        match flag {
            "--architecture" => self.architecture.is_some(),
            "--pgd-proxy-routing" => self.pgd_proxy_routing.is_some(),
            "--edb-repositories" => self.edb_repositories.is_some(),
            "--replace-2q-repositories" => self.replace_2q_repositories,
            _ => false,
        }
    }
}

// =============================================================================
// Kinds
// =============================================================================

/// A command-line option consumed by a transmogrifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub flag: &'static str,
    pub aliases: &'static [&'static str],
    pub default: Option<&'static str>,
    pub help: &'static str,
    /// Supplying the option selects the transmogrifier
    pub trigger: bool,
}

/// Every transmogrifier, in the order they run when unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransmogrifierKind {
    Common,
    Replace2qRepositories,
    Repositories,
    Bdr4Pgd5,
    ArchitectureChange,
}

const REPLACE_2Q_OPTIONS: &[OptionSpec] = &[OptionSpec {
    flag: "--replace-2q-repositories",
    aliases: &[],
    default: None,
    help: "Replace implicit 2ndQuadrant repositories with EDB repositories",
    trigger: true,
}];

const REPOSITORIES_OPTIONS: &[OptionSpec] = &[OptionSpec {
    flag: "--edb-repositories",
    aliases: &[],
    default: None,
    help: "Set edb_repositories, or derive them from postgres_flavour",
    trigger: true,
}];

const BDR4PGD5_OPTIONS: &[OptionSpec] = &[OptionSpec {
    flag: "--pgd-proxy-routing",
    aliases: &[],
    default: None,
    help: "PGD proxy routing scope (global or local)",
    trigger: false,
}];

const ARCHITECTURE_OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        flag: "--architecture",
        aliases: &["--target-architecture"],
        default: None,
        help: "Convert the cluster to this architecture",
        trigger: true,
    },
    OptionSpec {
        flag: "--pgd-proxy-routing",
        aliases: &[],
        default: None,
        help: "PGD proxy routing scope (global or local)",
        trigger: true,
    },
];

impl TransmogrifierKind {
    pub const ALL: [TransmogrifierKind; 5] = [
        TransmogrifierKind::Common,
        TransmogrifierKind::Replace2qRepositories,
        TransmogrifierKind::Repositories,
        TransmogrifierKind::Bdr4Pgd5,
        TransmogrifierKind::ArchitectureChange,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransmogrifierKind::Common => "common",
            TransmogrifierKind::Replace2qRepositories => "replace-2q-repositories",
            TransmogrifierKind::Repositories => "repositories",
            TransmogrifierKind::Bdr4Pgd5 => "bdr4pgd5",
            TransmogrifierKind::ArchitectureChange => "architecture",
        }
    }

    /// Kinds that must run before this one
    pub fn requires(&self) -> &'static [TransmogrifierKind] {
        use TransmogrifierKind::*;
        match self {
            Common => &[],
            Replace2qRepositories | Repositories | ArchitectureChange => &[Common],
            Bdr4Pgd5 => &[Common, Replace2qRepositories],
        }
    }

    /// Transitive requirements, dependencies before dependents
    pub fn all_required(&self) -> Vec<TransmogrifierKind> {
        closure(self.requires().iter().copied())
    }

    pub fn options(&self) -> &'static [OptionSpec] {
        match self {
            TransmogrifierKind::Common => &[],
            TransmogrifierKind::Replace2qRepositories => REPLACE_2Q_OPTIONS,
            TransmogrifierKind::Repositories => REPOSITORIES_OPTIONS,
            TransmogrifierKind::Bdr4Pgd5 => BDR4PGD5_OPTIONS,
            TransmogrifierKind::ArchitectureChange => ARCHITECTURE_OPTIONS,
        }
    }

    /// Selected by `args`
    pub fn is_triggered(&self, args: &ReconfigureArgs) -> bool {
        self.options()
            .iter()
            .any(|o| o.trigger && args.supplied(o.flag))
    }
}

impl fmt::Display for TransmogrifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Every kind reachable from `start`, in post-order
pub fn closure(start: impl IntoIterator<Item = TransmogrifierKind>) -> Vec<TransmogrifierKind> {
    fn visit(kind: TransmogrifierKind, out: &mut Vec<TransmogrifierKind>) {
        if out.contains(&kind) {
            return;
        }
        for dep in kind.requires() {
            visit(*dep, out);
        }
        out.push(kind);
    }

    let mut out = Vec::new();
    for kind in start {
        visit(kind, &mut out);
    }
    out
}

// =============================================================================
// Transmogrifier
// =============================================================================

pub trait Transmogrifier: fmt::Debug {
    fn kind(&self) -> TransmogrifierKind;

    /// Direct requirements of this instance
    fn requires(&self) -> Vec<TransmogrifierKind> {
        self.kind().requires().to_vec()
    }

    fn all_required(&self) -> Vec<TransmogrifierKind> {
        closure(self.requires())
    }

    /// Whether there is anything for this transmogrifier to change
    fn is_applicable(&self, cluster: &Cluster) -> bool;

    /// Whether every option the change needs has been supplied
    fn is_ready(&self, _cluster: &Cluster) -> bool {
        true
    }

    /// Problems that would prevent the change, and things to review
    fn check(&self, cluster: &Cluster) -> CheckResult;

    fn description(&self, cluster: &Cluster) -> ChangeDescription;

    fn apply(&self, cluster: &mut Cluster) -> Result<()>;
}
