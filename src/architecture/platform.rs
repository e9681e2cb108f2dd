//! Platform defaults
//!
//! Operating system, machine image and instance sizing defaults for each
//! platform, and the optional local package repository.

use crate::domain::ports::{map_value, ImageFilter, Platform, Value, VarMap};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Region used for aws locations when `--region` is not given
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Instance type used for aws instances when `--instance-type` is not given
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";

/// Distribution and login defaults for one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsDefaults {
    pub os: &'static str,
    pub os_version: &'static str,
    pub user: &'static str,
}

/// Platform-specific configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformPolicy {
    pub platform: Platform,
}

impl PlatformPolicy {
    pub fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }

    /// OS defaults; bare metal has none since the hosts already exist
    pub fn os_defaults(&self) -> Option<OsDefaults> {
        match self.platform {
            Platform::Aws => Some(OsDefaults {
                os: "Debian",
                os_version: "12",
                user: "admin",
            }),
            Platform::Docker => Some(OsDefaults {
                os: "Rocky",
                os_version: "9",
                user: "root",
            }),
            Platform::Bare => None,
        }
    }

    /// Resolve (os, os_version), letting explicit values win
    pub fn resolve_os(
        &self,
        os: Option<&str>,
        os_version: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        let defaults = self.os_defaults();
        let os = os
            .map(str::to_string)
            .or_else(|| defaults.as_ref().map(|d| d.os.to_string()));
        let version = os_version
            .map(str::to_string)
            .or_else(|| defaults.as_ref().map(|d| d.os_version.to_string()));
        (os, version)
    }

    /// Image filter for aws, e.g. `debian-12-amd64-*`
    pub fn image_filter(
        &self,
        os: &str,
        os_version: &str,
        image: Option<&str>,
    ) -> Option<ImageFilter> {
        if self.platform != Platform::Aws {
            return None;
        }
        let (name, owner) = match image {
            Some(name) => (name.to_string(), None),
            None => match os.to_ascii_lowercase().as_str() {
                "debian" => (
                    format!("debian-{}-amd64-*", os_version),
                    Some("136693071363".to_string()),
                ),
                "rocky" => (
                    format!("Rocky-{}-EC2-Base-*.x86_64*", os_version),
                    Some("792107900819".to_string()),
                ),
                "ubuntu" => (
                    format!("ubuntu/images/hvm-ssd/ubuntu-*-{}-amd64-server-*", os_version),
                    Some("099720109477".to_string()),
                ),
                other => (format!("{}-{}-*", other, os_version), None),
            },
        };
        Some(ImageFilter { name, owner })
    }

    /// `instance_defaults` entries other than `platform`
    pub fn instance_defaults(
        &self,
        os: Option<&str>,
        os_version: Option<&str>,
        instance_type: Option<&str>,
        image: Option<&str>,
    ) -> VarMap {
        let mut defaults = VarMap::new();
        match self.platform {
            Platform::Aws => {
                defaults.insert(
                    "type".into(),
                    Value::from(instance_type.unwrap_or(DEFAULT_INSTANCE_TYPE)),
                );
            }
            Platform::Docker => {
                let image = match (image, os, os_version) {
                    (Some(image), _, _) => image.to_string(),
                    (None, Some(os), Some(v)) => format!("tpa/{}:{}", os.to_ascii_lowercase(), v),
                    (None, Some(os), None) => format!("tpa/{}", os.to_ascii_lowercase()),
                    (None, None, _) => "tpa/rocky:9".to_string(),
                };
                defaults.insert("image".into(), Value::from(image));
            }
            Platform::Bare => {}
        }

        let mut vars = VarMap::new();
        if let Some(d) = self.os_defaults() {
            vars.insert("ansible_user".into(), Value::from(d.user));
        }
        if !vars.is_empty() {
            defaults.insert("vars".into(), map_value(vars));
        }
        defaults
    }
}

/// Where the cluster's local package repository lives
///
/// Fails when the target OS version cannot be determined, which happens on
/// bare metal unless `--os-version` was given.
pub fn local_repo_path(
    cluster_dir: &Path,
    platform: Platform,
    os: Option<&str>,
    os_version: Option<&str>,
) -> Result<PathBuf> {
    match (os, os_version) {
        (Some(os), Some(version)) => Ok(cluster_dir
            .join("local-repo")
            .join(os)
            .join(version)),
        _ => Err(Error::Architecture(format!(
            "Cannot set up a local repository on platform {} without knowing the target \
             OS; please specify --os and --os-version",
            platform
        ))),
    }
}

/// Create the local repository directory
pub fn setup_local_repo(
    cluster_dir: &Path,
    platform: Platform,
    os: Option<&str>,
    os_version: Option<&str>,
) -> Result<PathBuf> {
    let path = local_repo_path(cluster_dir, platform, os, os_version)?;
    std::fs::create_dir_all(&path)?;
    Ok(path)
}
