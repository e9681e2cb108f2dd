//! Options accepted by `configure`
//!
//! One flat option set shared by every architecture; each policy validates
//! the subset it understands and rejects the rest.

use crate::net::{DEFAULT_NETWORK_CIDR, DEFAULT_SUBNET_PREFIX_LENGTH};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Option Values
// =============================================================================

/// Postgres distribution to deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostgresFlavour {
    Postgresql,
    Pgextended,
    Epas,
    Edbpge,
}

impl PostgresFlavour {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostgresFlavour::Postgresql => "postgresql",
            PostgresFlavour::Pgextended => "pgextended",
            PostgresFlavour::Epas => "epas",
            PostgresFlavour::Edbpge => "edbpge",
        }
    }

    /// Parse a `postgres_flavour` value as found in cluster_vars
    pub fn from_var(value: &str) -> Option<Self> {
        match value {
            "postgresql" => Some(PostgresFlavour::Postgresql),
            "pgextended" => Some(PostgresFlavour::Pgextended),
            "epas" => Some(PostgresFlavour::Epas),
            "edbpge" => Some(PostgresFlavour::Edbpge),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostgresFlavour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failover manager for M1 clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailoverManager {
    Repmgr,
    Efm,
    Patroni,
}

impl FailoverManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverManager::Repmgr => "repmgr",
            FailoverManager::Efm => "efm",
            FailoverManager::Patroni => "patroni",
        }
    }
}

/// BDR-Always-ON layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BdrLayout {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BdrLayout {
    /// Locations holding data nodes (the witness gets its own location)
    pub fn data_locations(&self) -> usize {
        match self {
            BdrLayout::Bronze | BdrLayout::Silver => 1,
            BdrLayout::Gold | BdrLayout::Platinum => 2,
        }
    }

    /// Layout includes a logical standby in each data location
    pub fn has_standby(&self) -> bool {
        matches!(self, BdrLayout::Silver | BdrLayout::Platinum)
    }
}

/// Consensus protocol used by HARP
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HarpConsensus {
    Etcd,
    Bdr,
}

impl HarpConsensus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarpConsensus::Etcd => "etcd",
            HarpConsensus::Bdr => "bdr",
        }
    }
}

/// Scope of PGD proxy write-leader routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyRouting {
    Global,
    Local,
}

impl ProxyRouting {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyRouting::Global => "global",
            ProxyRouting::Local => "local",
        }
    }
}

impl std::fmt::Display for ProxyRouting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheme for HARP/PGD health probe endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbeScheme {
    Http,
    Https,
}

// =============================================================================
// Configure Arguments
// =============================================================================

/// Everything `configure` can be told
#[derive(clap::Args, Debug, Clone)]
pub struct ConfigureArgs {
    /// Architecture to configure (M1, BDR-Always-ON, PGD-Always-ON)
    #[arg(short = 'a', long)]
    pub architecture: String,

    /// Platform to provision on (aws, bare, docker)
    #[arg(long)]
    pub platform: Option<String>,

    /// Cloud region for all locations
    #[arg(long)]
    pub region: Option<String>,

    /// Instance type for all instances
    #[arg(long)]
    pub instance_type: Option<String>,

    /// Operating system distribution
    #[arg(long)]
    pub os: Option<String>,

    /// Operating system version
    #[arg(long)]
    pub os_version: Option<String>,

    /// Machine image name, overriding the platform default
    #[arg(long)]
    pub image: Option<String>,

    /// Owner tag for cloud resources
    #[arg(long, env = "USER")]
    pub owner: Option<String>,

    /// Network to allocate location subnets from
    #[arg(long, env = "CLUSTER_FORGE_NETWORK", default_value = DEFAULT_NETWORK_CIDR)]
    pub network: String,

    /// Prefix length of each location's subnet (23-29)
    #[arg(long, default_value_t = DEFAULT_SUBNET_PREFIX_LENGTH)]
    pub subnet_prefix: u8,

    /// Directories of other clusters whose subnets must not be reused
    #[arg(long, num_args = 1..)]
    pub exclude_subnets_from: Vec<PathBuf>,

    /// Allocate subnets in address order instead of randomly
    #[arg(long)]
    pub no_shuffle_subnets: bool,

    /// File of "hostname [ip]" lines to name instances from
    #[arg(long)]
    pub hostnames_from: Option<PathBuf>,

    /// Only use hostnames matching this glob pattern
    #[arg(long, requires = "hostnames_from")]
    pub hostnames_pattern: Option<String>,

    /// Names of the cluster's locations
    #[arg(long, num_args = 1..)]
    pub location_names: Vec<String>,

    /// Location that holds only a witness node
    #[arg(long)]
    pub witness_only_location: Option<String>,

    /// Postgres distribution
    #[arg(long, value_enum)]
    pub postgres_flavour: Option<PostgresFlavour>,

    /// Postgres major version
    #[arg(long)]
    pub postgres_version: Option<String>,

    /// Failover manager (M1)
    #[arg(long, value_enum)]
    pub failover_manager: Option<FailoverManager>,

    /// Shorthand for --failover-manager efm (M1)
    #[arg(long)]
    pub enable_efm: bool,

    /// Cascaded replicas per secondary location (M1)
    #[arg(long, default_value_t = 0)]
    pub num_cascaded_replicas: usize,

    /// Cluster layout (BDR-Always-ON)
    #[arg(long, value_enum)]
    pub layout: Option<BdrLayout>,

    /// HARP consensus protocol (BDR-Always-ON)
    #[arg(long, value_enum)]
    pub harp_consensus_protocol: Option<HarpConsensus>,

    /// Run proxies on the BDR nodes instead of separate instances
    #[arg(long)]
    pub cohost_proxies: bool,

    /// Enable HARP health probes, optionally over https
    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "http")]
    pub enable_harp_probes: Option<ProbeScheme>,

    /// Data nodes in each location (PGD-Always-ON)
    #[arg(long)]
    pub data_nodes_per_location: Option<usize>,

    /// Dedicated PGD proxy instances per location; 0 co-hosts them
    #[arg(long, default_value_t = 0)]
    pub add_proxy_nodes_per_location: usize,

    /// PGD proxy routing scope (PGD-Always-ON)
    #[arg(long, value_enum)]
    pub pgd_proxy_routing: Option<ProxyRouting>,

    /// Enable PGD proxy health probes, optionally over https
    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "http")]
    pub enable_pgd_probes: Option<ProbeScheme>,

    /// Create a local package repository directory for the cluster
    #[arg(long)]
    pub enable_local_repo: bool,
}

impl ConfigureArgs {
    /// Arguments for `architecture` with every option at its default
    pub fn new(architecture: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            platform: None,
            region: None,
            instance_type: None,
            os: None,
            os_version: None,
            image: None,
            owner: None,
            network: DEFAULT_NETWORK_CIDR.to_string(),
            subnet_prefix: DEFAULT_SUBNET_PREFIX_LENGTH,
            exclude_subnets_from: Vec::new(),
            no_shuffle_subnets: false,
            hostnames_from: None,
            hostnames_pattern: None,
            location_names: Vec::new(),
            witness_only_location: None,
            postgres_flavour: None,
            postgres_version: None,
            failover_manager: None,
            enable_efm: false,
            num_cascaded_replicas: 0,
            layout: None,
            harp_consensus_protocol: None,
            cohost_proxies: false,
            enable_harp_probes: None,
            data_nodes_per_location: None,
            add_proxy_nodes_per_location: 0,
            pgd_proxy_routing: None,
            enable_pgd_probes: None,
            enable_local_repo: false,
        }
    }
}
