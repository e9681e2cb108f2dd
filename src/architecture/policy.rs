//! Architecture Policy
//!
//! An architecture describes a cluster topology: which locations exist,
//! how many instances each one gets, which roles they play and which
//! cluster_vars follow from the options. The generic configure driver asks
//! the policy for each of these in turn.

use super::hostnames::{Hostnames, NameAllocator};
use super::options::{ConfigureArgs, PostgresFlavour};
use crate::cluster::Cluster;
use crate::domain::ports::Platform;
use crate::error::{Error, Result};

pub trait ArchitecturePolicy: Send + Sync {
    /// Name recorded as `architecture` in config.yml
    fn name(&self) -> &'static str;

    fn supported_platforms(&self) -> &'static [Platform] {
        &Platform::ALL
    }

    fn default_platform(&self) -> Platform {
        Platform::Aws
    }

    fn default_flavour(&self) -> PostgresFlavour;

    fn supported_flavours(&self) -> &'static [PostgresFlavour];

    /// Locations used when `--location-names` is not given
    fn default_location_names(&self, args: &ConfigureArgs) -> Vec<String>;

    fn location_names(&self, args: &ConfigureArgs) -> Vec<String> {
        if args.location_names.is_empty() {
            self.default_location_names(args)
        } else {
            args.location_names.clone()
        }
    }

    /// Reject option combinations this architecture cannot honour
    fn validate_arguments(&self, args: &ConfigureArgs) -> Result<()>;

    /// Total instances `add_instances` will create
    fn num_instances(&self, args: &ConfigureArgs) -> usize;

    /// Names for the instances, in creation order
    fn hostnames(&self, args: &ConfigureArgs) -> Result<Hostnames> {
        let n = self.num_instances(args);
        match &args.hostnames_from {
            Some(path) => Hostnames::from_file(path, args.hostnames_pattern.as_deref(), n),
            None => Ok(Hostnames::words(n)),
        }
    }

    /// Create instances in the cluster's (already added) locations
    fn add_instances(
        &self,
        cluster: &mut Cluster,
        args: &ConfigureArgs,
        names: &mut NameAllocator<'_>,
    ) -> Result<()>;

    /// Set architecture-specific cluster_vars
    fn update_cluster_vars(&self, cluster: &mut Cluster, args: &ConfigureArgs) -> Result<()>;

    /// Flavour from `--postgres-flavour`, checked against what is supported
    fn flavour(&self, args: &ConfigureArgs) -> Result<PostgresFlavour> {
        let flavour = args.postgres_flavour.unwrap_or_else(|| self.default_flavour());
        if !self.supported_flavours().contains(&flavour) {
            return Err(Error::Configure(format!(
                "{} does not support postgres_flavour {}",
                self.name(),
                flavour
            )));
        }
        Ok(flavour)
    }
}

/// Reject an option that this architecture does not use
pub(crate) fn reject_option(architecture: &str, flag: &str, given: bool) -> Result<()> {
    if given {
        return Err(Error::Configure(format!(
            "{} is not supported by the {} architecture",
            flag, architecture
        )));
    }
    Ok(())
}
