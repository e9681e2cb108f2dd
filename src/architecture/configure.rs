//! Configure driver
//!
//! Turns an architecture policy plus options into a complete cluster
//! configuration and writes it into a new cluster directory.
//!
//! ```text
//! ArgsParsed -> Validated -> InstancesDerived -> SubnetsAllocated
//!            -> ClusterVarsDerived -> Persisted
//! ```
//!
//! Any failure before `Persisted` leaves the filesystem untouched.

use super::hostnames::{is_valid_hostname, Hostnames};
use super::options::ConfigureArgs;
use super::platform::{local_repo_path, setup_local_repo, PlatformPolicy, DEFAULT_REGION};
use super::policy::ArchitecturePolicy;
use super::registry::lookup_architecture;
use crate::cluster::Cluster;
use crate::domain::credentials::{generate_password, FileCredentialStore};
use crate::domain::ports::{map_value, CredentialStore, ImageLookup, Platform, Value, VarMap};
use crate::error::{Error, Result};
use crate::net::{blocks_overlap, parse_cidr, subnets_from, Subnets};
use ipnet::Ipv4Net;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.yml";

/// Name under which the vault password is stored
pub const VAULT_PASSWORD_NAME: &str = "vault_pass";

/// Postgres major version used unless `--postgres-version` is given
pub const DEFAULT_POSTGRES_VERSION: &str = "15";

/// Progress of a configure run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigureStage {
    ArgsParsed,
    Validated,
    InstancesDerived,
    SubnetsAllocated,
    ClusterVarsDerived,
    Persisted,
}

/// Everything validation resolved, carried into the later stages
#[derive(Debug)]
struct Plan {
    platform: Platform,
    network: Ipv4Net,
    location_names: Vec<String>,
    os: Option<String>,
    os_version: Option<String>,
    hostnames: Hostnames,
}

pub struct Configurator {
    policy: Box<dyn ArchitecturePolicy>,
    args: ConfigureArgs,
    images: Option<Box<dyn ImageLookup>>,
    credentials: Box<dyn CredentialStore>,
}

impl std::fmt::Debug for Configurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configurator")
            .field("architecture", &self.policy.name())
            .field("credentials", &self.credentials.backend())
            .field("images", &self.images.is_some())
            .finish()
    }
}

impl Configurator {
    /// Look up the architecture named in `args`
    pub fn new(args: ConfigureArgs) -> Result<Self> {
        let policy = lookup_architecture(&args.architecture)?;
        Ok(Self::with_policy(policy, args))
    }

    pub fn with_policy(policy: Box<dyn ArchitecturePolicy>, args: ConfigureArgs) -> Self {
        debug!("stage={:?} architecture={}", ConfigureStage::ArgsParsed, policy.name());
        Self {
            policy,
            args,
            images: None,
            credentials: Box::new(FileCredentialStore::new()),
        }
    }

    pub fn with_image_lookup(mut self, images: Box<dyn ImageLookup>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_credential_store(mut self, credentials: Box<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    // =========================================================================
    // Driver
    // =========================================================================

    /// Generate the configuration and write it into `cluster_dir`
    ///
    /// Refuses to touch an existing, non-empty directory unless `force`.
    pub fn configure(&self, cluster_dir: &Path, force: bool) -> Result<Cluster> {
        if !force && dir_has_entries(cluster_dir)? {
            return Err(Error::Configure(format!(
                "{} already exists and is not empty; use --force to overwrite it",
                cluster_dir.display()
            )));
        }

        let cluster = self.build(cluster_dir)?;
        self.persist(&cluster, cluster_dir)?;
        info!(
            "Configured {} cluster {} with {} instances in {}",
            cluster.architecture,
            cluster.name,
            cluster.instances.len(),
            cluster_dir.display()
        );
        Ok(cluster)
    }

    /// Generate the configuration without writing anything
    pub fn build(&self, cluster_dir: &Path) -> Result<Cluster> {
        let name = cluster_name(cluster_dir)?;
        let plan = self.validate()?;
        debug!("stage={:?}", ConfigureStage::Validated);

        let mut cluster = self.derive_instances(&name, &plan)?;
        debug!(
            "stage={:?} instances={}",
            ConfigureStage::InstancesDerived,
            cluster.instances.len()
        );

        self.allocate_subnets(&mut cluster, &plan, cluster_dir)?;
        debug!("stage={:?}", ConfigureStage::SubnetsAllocated);

        self.derive_cluster_vars(&mut cluster, &plan)?;
        debug!("stage={:?}", ConfigureStage::ClusterVarsDerived);

        Ok(cluster)
    }

    fn validate(&self) -> Result<Plan> {
        let args = &self.args;
        let policy = self.policy.as_ref();

        let platform = match &args.platform {
            Some(p) => p.parse::<Platform>()?,
            None => policy.default_platform(),
        };
        if !policy.supported_platforms().contains(&platform) {
            return Err(Error::Architecture(format!(
                "{} does not support platform {}",
                policy.name(),
                platform
            )));
        }

        Subnets::validate(args.subnet_prefix)?;
        let network = parse_cidr(&args.network)?;

        policy.validate_arguments(args)?;
        policy.flavour(args)?;

        let location_names = policy.location_names(args);
        if location_names.is_empty() {
            return Err(Error::Configure("At least one location is required".into()));
        }
        for (i, location) in location_names.iter().enumerate() {
            if !is_valid_location_name(location) {
                return Err(Error::Configure(format!("Invalid location name: {}", location)));
            }
            if location_names[..i].contains(location) {
                return Err(Error::Configure(format!("Duplicate location name: {}", location)));
            }
        }
        if let Some(witness) = &args.witness_only_location {
            if !location_names.contains(witness) {
                return Err(Error::Configure(format!(
                    "--witness-only-location {} is not one of the locations ({})",
                    witness,
                    location_names.join(", ")
                )));
            }
        }

        let (os, os_version) = PlatformPolicy::for_platform(platform)
            .resolve_os(args.os.as_deref(), args.os_version.as_deref());
        if args.enable_local_repo {
            local_repo_path(Path::new("."), platform, os.as_deref(), os_version.as_deref())?;
        }

        let hostnames = policy.hostnames(args)?;

        Ok(Plan {
            platform,
            network,
            location_names,
            os,
            os_version,
            hostnames,
        })
    }

    fn derive_instances(&self, name: &str, plan: &Plan) -> Result<Cluster> {
        let mut cluster = Cluster::new(name, self.policy.name(), plan.platform.as_str());
        for location in &plan.location_names {
            cluster.add_location(location, VarMap::new())?;
        }

        let mut names = plan.hostnames.allocator();
        self.policy
            .add_instances(&mut cluster, &self.args, &mut names)?;

        let expected = self.policy.num_instances(&self.args);
        if cluster.instances.len() != expected {
            return Err(Error::Architecture(format!(
                "{} created {} instances but declared {}",
                self.policy.name(),
                cluster.instances.len(),
                expected
            )));
        }

        for instance in cluster.instances.iter_mut() {
            if let Some(ip) = plan.hostnames.address_of(&instance.name) {
                instance.set_setting("ip_address", ip.to_string());
            }
        }
        Ok(cluster)
    }

    fn allocate_subnets(
        &self,
        cluster: &mut Cluster,
        plan: &Plan,
        cluster_dir: &Path,
    ) -> Result<()> {
        if plan.platform == Platform::Bare {
            return Ok(());
        }

        let used: Vec<Ipv4Net> = subnets_from(
            &self.args.exclude_subnets_from,
            &[cluster_dir.to_path_buf()],
        )?
        .into_iter()
        // a sibling's VPC cidr spans the whole network and says nothing
        // about which of its subnets are taken
        .filter(|s| s.prefix_len() > plan.network.prefix_len() && blocks_overlap(s, &plan.network))
        .collect();

        let mut subnets = Subnets::new(plan.network, self.args.subnet_prefix)?;
        subnets.exclude(&used);
        if !self.args.no_shuffle_subnets {
            subnets.shuffle();
        }
        let chosen = subnets.slice(cluster.locations.len())?;

        let region = self.args.region.as_deref().unwrap_or(DEFAULT_REGION);
        for (index, (location, subnet)) in cluster.locations.iter_mut().zip(chosen).enumerate() {
            location.set_setting("subnet", subnet.to_string());
            if plan.platform == Platform::Aws {
                location.set_setting("region", region);
                location.set_setting("az", format!("{}{}", region, availability_zone(index)));
            }
            debug!("Location {} gets subnet {}", location.name, subnet);
        }

        if plan.platform == Platform::Aws {
            let mut vpc = VarMap::new();
            vpc.insert("Name".into(), Value::from("Test"));
            vpc.insert("cidr".into(), Value::from(plan.network.to_string()));
            let mut vpcs = VarMap::new();
            vpcs.insert(region.to_string(), map_value(vpc));
            cluster.settings.insert("ec2_vpc".into(), map_value(vpcs));
        }
        Ok(())
    }

    fn derive_cluster_vars(&self, cluster: &mut Cluster, plan: &Plan) -> Result<()> {
        let args = &self.args;
        let flavour = self.policy.flavour(args)?;

        cluster.set_var("postgres_flavour", flavour.as_str());
        cluster.set_var(
            "postgres_version",
            args.postgres_version
                .as_deref()
                .unwrap_or(DEFAULT_POSTGRES_VERSION),
        );
        cluster.set_var("keyring_backend", self.credentials.backend());
        self.policy.update_cluster_vars(cluster, args)?;

        let platform = PlatformPolicy::for_platform(plan.platform);
        cluster.instance_defaults = platform.instance_defaults(
            plan.os.as_deref(),
            plan.os_version.as_deref(),
            args.instance_type.as_deref(),
            args.image.as_deref(),
        );

        if let (Some(os), Some(version)) = (&plan.os, &plan.os_version) {
            if let Some(filter) = platform.image_filter(os, version, args.image.as_deref()) {
                let mut ami = VarMap::new();
                ami.insert("Name".into(), Value::from(filter.name.as_str()));
                if let Some(owner) = &filter.owner {
                    ami.insert("Owner".into(), Value::from(owner.as_str()));
                }
                if let Some(images) = &self.images {
                    let image = images.lookup_image(&filter)?;
                    debug!("Resolved {} to {}", filter.name, image.image_id);
                    cluster
                        .instance_defaults
                        .insert("image".into(), Value::from(image.image_id));
                }
                cluster.settings.insert("ec2_ami".into(), map_value(ami));
            }
        }

        if let Some(owner) = &args.owner {
            let mut tags = VarMap::new();
            tags.insert("Owner".into(), Value::from(owner.as_str()));
            cluster.settings.insert("cluster_tags".into(), map_value(tags));
        }
        Ok(())
    }

    fn persist(&self, cluster: &Cluster, cluster_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(cluster_dir)?;

        if !self.credentials.exists(cluster_dir, VAULT_PASSWORD_NAME) {
            self.credentials
                .store(cluster_dir, VAULT_PASSWORD_NAME, &generate_password())?;
            debug!("Stored vault password with {} backend", self.credentials.backend());
        }

        if self.args.enable_local_repo {
            let platform = cluster.platform.parse::<Platform>()?;
            let (os, os_version) = PlatformPolicy::for_platform(platform)
                .resolve_os(self.args.os.as_deref(), self.args.os_version.as_deref());
            let path =
                setup_local_repo(cluster_dir, platform, os.as_deref(), os_version.as_deref())?;
            info!("Created local repository {}", path.display());
        }

        cluster.write(config_path(cluster_dir))?;
        debug!("stage={:?}", ConfigureStage::Persisted);
        Ok(())
    }
}

/// Look up the architecture and configure `cluster_dir`
pub fn configure(args: ConfigureArgs, cluster_dir: &Path, force: bool) -> Result<Cluster> {
    Configurator::new(args)?.configure(cluster_dir, force)
}

pub fn config_path(cluster_dir: &Path) -> PathBuf {
    cluster_dir.join(CONFIG_FILE)
}

fn cluster_name(cluster_dir: &Path) -> Result<String> {
    cluster_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Configure(format!(
                "Cannot derive a cluster name from {}",
                cluster_dir.display()
            ))
        })
}

fn dir_has_entries(dir: &Path) -> Result<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_valid_location_name(name: &str) -> bool {
    is_valid_hostname(&name.replace('_', "-"))
}

fn availability_zone(index: usize) -> char {
    const ZONES: [char; 3] = ['a', 'b', 'c'];
    ZONES[index % ZONES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::options::{BdrLayout, HarpConsensus, ProxyRouting};
    use crate::domain::ports::{ensure_single_image, ImageFilter, ImageId};
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    struct OneImage;

    impl ImageLookup for OneImage {
        fn lookup_image(&self, filter: &ImageFilter) -> Result<ImageId> {
            let found = if filter.name.starts_with("debian-12") {
                vec![ImageId {
                    image_id: "ami-0123".into(),
                }]
            } else {
                vec![]
            };
            ensure_single_image(filter, found)
        }
    }

    fn pgd_args() -> ConfigureArgs {
        let mut args = ConfigureArgs::new("PGD-Always-ON");
        args.pgd_proxy_routing = Some(ProxyRouting::Local);
        args.location_names = vec!["a".into(), "b".into()];
        args.no_shuffle_subnets = true;
        args
    }

    #[test]
    fn test_configure_writes_config() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("speedy");

        let cluster = Configurator::new(pgd_args())
            .unwrap()
            .with_image_lookup(Box::new(OneImage))
            .configure(&dir, false)
            .unwrap();

        assert_eq!(cluster.name, "speedy");
        assert_eq!(cluster.instances.len(), 3 + 1 + 3);
        assert_eq!(cluster.locations[0].subnet(), Some("10.33.0.0/28"));
        assert_eq!(cluster.locations[1].subnet(), Some("10.33.0.16/28"));
        assert_eq!(
            cluster.locations[1].setting("az"),
            Some(&Value::from("eu-west-1b"))
        );
        assert_eq!(cluster.instance_defaults["image"], Value::from("ami-0123"));
        assert_eq!(cluster.settings["ec2_ami"]["Name"], Value::from("debian-12-amd64-*"));
        assert_eq!(cluster.var_str("postgres_flavour"), Some("pgextended"));
        assert_eq!(cluster.var_str("keyring_backend"), Some("legacy"));

        let reloaded = Cluster::from_yaml(dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(reloaded, cluster);
        assert!(FileCredentialStore::new().exists(&dir, VAULT_PASSWORD_NAME));
    }

    #[test]
    fn test_refuses_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("taken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("notes.txt"), "mine").unwrap();

        let err = configure(pgd_args(), &dir, false).unwrap_err();
        assert_matches!(err, Error::Configure(_));
        assert!(!dir.join(CONFIG_FILE).exists());

        configure(pgd_args(), &dir, true).unwrap();
        assert!(dir.join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("broken");

        let mut args = pgd_args();
        args.witness_only_location = Some("nowhere".into());
        assert_matches!(configure(args, &dir, false), Err(Error::Configure(_)));

        let mut args = pgd_args();
        args.subnet_prefix = 30;
        assert_matches!(configure(args, &dir, false), Err(Error::Net(_)));

        let mut args = pgd_args();
        args.platform = Some("bare".into());
        args.enable_local_repo = true;
        assert_matches!(configure(args, &dir, false), Err(Error::Architecture(_)));

        assert!(!dir.exists());
    }

    #[test]
    fn test_unknown_architecture() {
        let tmp = TempDir::new().unwrap();
        let err = configure(ConfigureArgs::new("M9"), &tmp.path().join("x"), false).unwrap_err();
        assert_matches!(err, Error::UnsupportedArchitecture(_));
    }

    #[test]
    fn test_excludes_sibling_subnets() {
        let tmp = TempDir::new().unwrap();
        let sibling = tmp.path().join("sibling");
        fs::create_dir_all(&sibling).unwrap();
        fs::write(
            sibling.join(CONFIG_FILE),
            "architecture: M1\nlocations:\n- Name: main\n  subnet: 10.33.0.0/28\n",
        )
        .unwrap();

        let mut args = pgd_args();
        args.exclude_subnets_from = vec![tmp.path().to_path_buf()];
        let cluster = configure(args, &tmp.path().join("new"), false).unwrap();

        assert_eq!(cluster.locations[0].subnet(), Some("10.33.0.16/28"));
        assert_eq!(cluster.locations[1].subnet(), Some("10.33.0.32/28"));
    }

    #[test]
    fn test_bare_platform_with_hostnames_file() {
        let tmp = TempDir::new().unwrap();
        let hosts = tmp.path().join("hosts");
        fs::write(
            &hosts,
            "alpha 192.168.0.1\nbeta 192.168.0.2\ngamma 192.168.0.3\ndelta 192.168.0.4\n\
             epsilon 192.168.0.5\nzeta 192.168.0.6\n",
        )
        .unwrap();

        let mut args = ConfigureArgs::new("BDR-Always-ON");
        args.layout = Some(BdrLayout::Bronze);
        args.harp_consensus_protocol = Some(HarpConsensus::Bdr);
        args.platform = Some("bare".into());
        args.hostnames_from = Some(hosts);

        let cluster = configure(args, &tmp.path().join("metal"), false).unwrap();
        assert_eq!(cluster.platform, "bare");
        assert_eq!(cluster.instances.len(), 6);
        assert_eq!(
            cluster.instance("alpha").unwrap().setting("ip_address"),
            Some(&Value::from("192.168.0.1"))
        );
        assert!(cluster.locations.iter().all(|l| l.subnet().is_none()));
        assert!(!cluster.settings.contains_key("ec2_ami"));
    }
}
