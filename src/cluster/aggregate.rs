//! The cluster aggregate
//!
//! Owns locations and instances, enforces name uniqueness, and converts to
//! and from the persisted `config.yml` schema.

use super::config::{reorder_keys, ClusterConfig, InstanceEntry, LocationEntry};
use super::group::Group;
use super::instance::Instance;
use super::instances::Instances;
use super::location::Location;
use crate::domain::ports::{Value, VarMap};
use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Platform assumed when a configuration file does not name one
pub const DEFAULT_PLATFORM: &str = "aws";

/// Aggregate root of the configuration model
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub name: String,
    pub architecture: String,
    pub platform: String,
    /// Root variable scope, named after the cluster
    pub group: Group,
    /// `cluster_vars`
    pub vars: VarMap,
    /// `instance_defaults`, without `platform`
    pub instance_defaults: VarMap,
    /// Other top-level keys (`cluster_tags`, `ec2_ami`, ...)
    pub settings: VarMap,
    pub locations: Vec<Location>,
    pub instances: Instances,
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        architecture: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            group: Group::new(name.clone()),
            name,
            architecture: architecture.into(),
            platform: platform.into(),
            vars: VarMap::new(),
            instance_defaults: VarMap::new(),
            settings: VarMap::new(),
            locations: Vec::new(),
            instances: Instances::new(),
        }
    }

    // =========================================================================
    // Locations
    // =========================================================================

    /// Add a location; names must be unique within the cluster
    pub fn add_location(&mut self, name: &str, settings: VarMap) -> Result<&mut Location> {
        if self.get_location_by_name(name).is_some() {
            return Err(Error::Cluster(format!(
                "Location {} already exists in cluster {}",
                name, self.name
            )));
        }
        self.locations.push(Location::new(name, settings));
        let last = self.locations.len() - 1;
        Ok(&mut self.locations[last])
    }

    pub fn get_location_by_name(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }

    pub fn get_location_by_name_mut(&mut self, name: &str) -> Option<&mut Location> {
        self.locations.iter_mut().find(|l| l.name == name)
    }

    pub fn location_names(&self) -> Vec<&str> {
        self.locations.iter().map(|l| l.name.as_str()).collect()
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Add an instance in an existing location
    ///
    /// `settings.node` defaults to one more than the largest ordinal in use.
    pub fn add_instance(
        &mut self,
        name: &str,
        location_name: &str,
        host_vars: VarMap,
        mut settings: VarMap,
    ) -> Result<&mut Instance> {
        if self.get_location_by_name(location_name).is_none() {
            return Err(Error::Instance(format!(
                "Instance {} refers to unknown location {}",
                name, location_name
            )));
        }
        if self.instances.contains(name) {
            return Err(Error::Cluster(format!(
                "Instance {} already exists in cluster {}",
                name, self.name
            )));
        }

        match settings.get("node") {
            None => {
                let next = self.instances.max_node().unwrap_or(0) + 1;
                settings.insert("node".into(), Value::from(next));
            }
            Some(node) if node.as_u64().is_none() => {
                return Err(Error::Instance(format!(
                    "Instance {} has node {:?}; node must be a non-negative integer",
                    name, node
                )));
            }
            Some(_) => {}
        }

        self.instances
            .push(Instance::new(name, location_name, host_vars, settings));
        self.instances
            .get_mut(name)
            .ok_or_else(|| Error::Cluster(format!("Instance {} vanished after insert", name)))
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    pub fn instance_mut(&mut self, name: &str) -> Option<&mut Instance> {
        self.instances.get_mut(name)
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// String value of a cluster var
    pub fn var_str(&self, key: &str) -> Option<&str> {
        self.vars.get(key).and_then(Value::as_str)
    }

    /// Scalar cluster var as a string; numbers such as `bdr_version: 4` included
    pub fn var_string(&self, key: &str) -> Option<String> {
        match self.vars.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Root group with every location group attached beneath it
    ///
    /// A location group also gets a subgroup for each `bdr_child_group`
    /// its instances belong to.
    pub fn inventory_group(&self) -> Group {
        let mut root = self.group.clone();
        for location in &self.locations {
            let mut group = location.group.clone();
            for instance in self.instances.in_location(&location.name).iter() {
                if let Some(child) = instance.host_var("bdr_child_group").and_then(Value::as_str) {
                    if group.find(child).is_none() {
                        group.add_subgroup(child);
                    }
                }
            }
            root.push_subgroup(group);
        }
        root
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Convert to the persisted schema
    pub fn to_config(&self) -> ClusterConfig {
        let locations = self
            .locations
            .iter()
            .map(|l| LocationEntry {
                name: l.name.clone(),
                witness_only: l.witness_only,
                vars: l.group.group_vars.clone(),
                settings: l.settings.clone(),
            })
            .collect();

        let instances = self
            .instances
            .iter()
            .map(|i| {
                let mut settings = i.settings.clone();
                let node = settings.shift_remove("node").and_then(|v| v.as_u64());
                InstanceEntry {
                    name: i.name.clone(),
                    location: i.location.clone(),
                    node,
                    role: i.roles.clone(),
                    vars: i.host_vars.clone(),
                    settings,
                }
            })
            .collect();

        let mut instance_defaults = VarMap::new();
        instance_defaults.insert("platform".into(), Value::from(self.platform.clone()));
        instance_defaults.extend(self.instance_defaults.clone());

        ClusterConfig {
            architecture: self.architecture.clone(),
            cluster_name: Some(self.name.clone()),
            cluster_vars: self.vars.clone(),
            locations,
            instance_defaults,
            instances,
            extra: self.settings.clone(),
        }
    }

    /// Rebuild a cluster from the persisted schema
    ///
    /// Locations are created before instances since instances refer to
    /// them by name.
    pub fn from_config(default_name: &str, config: ClusterConfig) -> Result<Self> {
        let ClusterConfig {
            architecture,
            cluster_name,
            cluster_vars,
            locations,
            mut instance_defaults,
            instances,
            extra,
        } = config;

        let platform = match instance_defaults.shift_remove("platform") {
            Some(Value::String(p)) => p,
            Some(other) => {
                return Err(Error::Configure(format!(
                    "instance_defaults.platform must be a string, got {:?}",
                    other
                )))
            }
            None => DEFAULT_PLATFORM.to_string(),
        };

        let name = cluster_name.unwrap_or_else(|| default_name.to_string());
        let mut cluster = Cluster::new(name, architecture, platform);
        cluster.vars = cluster_vars;
        cluster.instance_defaults = instance_defaults;
        cluster.settings = extra;

        for entry in locations {
            let location = cluster.add_location(&entry.name, entry.settings)?;
            location.witness_only = entry.witness_only;
            location.group.add_group_vars(entry.vars);
        }

        for entry in instances {
            let mut settings = VarMap::new();
            if let Some(node) = entry.node {
                settings.insert("node".into(), Value::from(node));
            }
            settings.extend(entry.settings);

            let instance =
                cluster.add_instance(&entry.name, &entry.location, entry.vars, settings)?;
            for role in entry.role {
                instance.add_role(role);
            }
        }

        Ok(cluster)
    }

    /// Serialize to YAML with canonical top-level key order
    pub fn to_yaml(&self) -> Result<String> {
        let value = serde_yaml::to_value(self.to_config())?;
        let body = serde_yaml::to_string(&reorder_keys(value))?;
        Ok(format!("---\n{}", body))
    }

    /// Parse YAML text; `default_name` is used when `cluster_name` is absent
    pub fn from_yaml_str(default_name: &str, text: &str) -> Result<Self> {
        let config: ClusterConfig = serde_yaml::from_str(text)?;
        Self::from_config(default_name, config)
    }

    /// Load `config.yml`; the cluster name defaults to its directory's name
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let default_name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or("cluster");

        let cluster = Self::from_yaml_str(default_name, &text)?;
        debug!(
            "Loaded cluster {} from {} ({} locations, {} instances)",
            cluster.name,
            path.display(),
            cluster.locations.len(),
            cluster.instances.len()
        );
        Ok(cluster)
    }

    /// Write the YAML to `path` via a temporary file and an atomic rename
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(yaml.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        info!("Wrote cluster configuration to {}", path.display());
        Ok(())
    }
}
