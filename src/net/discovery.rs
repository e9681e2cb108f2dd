//! Subnet discovery across sibling clusters
//!
//! Clusters configured independently may still share one address space.
//! Before allocating, scan the other clusters' configuration files and
//! collect every subnet they already use so it can be excluded.

use super::network::parse_cidr;
use crate::domain::ports::Value;
use crate::error::Result;
use ipnet::Ipv4Net;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Collect subnets used by cluster configurations under `dirs`
///
/// Each directory is scanned for `config.yml` and `*/config.yml`. Files
/// below any of `exclude_paths` (normally the cluster being configured)
/// are skipped, as are files that cannot be read or parsed.
pub fn subnets_from(dirs: &[PathBuf], exclude_paths: &[PathBuf]) -> Result<Vec<Ipv4Net>> {
    let excluded: Vec<PathBuf> = exclude_paths.iter().map(|p| normalize(p)).collect();
    let mut found = Vec::new();

    for dir in dirs {
        let escaped = glob::Pattern::escape(&dir.to_string_lossy());
        for pattern in [format!("{}/config.yml", escaped), format!("{}/*/config.yml", escaped)] {
            for entry in glob::glob(&pattern)? {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Skipping unreadable path while scanning {}: {}", dir.display(), e);
                        continue;
                    }
                };

                let normalized = normalize(&path);
                if excluded.iter().any(|e| normalized.starts_with(e)) {
                    debug!("Not scanning excluded {}", path.display());
                    continue;
                }

                found.extend(subnets_in_file(&path));
            }
        }
    }

    found.sort();
    found.dedup();
    debug!("Discovered {} subnets in use", found.len());
    Ok(found)
}

/// Subnets named by one configuration file; problems are logged, not fatal
fn subnets_in_file(path: &Path) -> Vec<Ipv4Net> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    let doc: Value = match serde_yaml::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Cannot parse {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut cidrs: Vec<&str> = Vec::new();
    if let Some(locations) = doc.get("locations").and_then(Value::as_sequence) {
        cidrs.extend(
            locations
                .iter()
                .filter_map(|l| l.get("subnet").and_then(Value::as_str)),
        );
    }
    if let Some(vpcs) = doc.get("ec2_vpc").and_then(Value::as_mapping) {
        cidrs.extend(vpcs.values().filter_map(|v| v.get("cidr").and_then(Value::as_str)));
    }

    cidrs
        .into_iter()
        .filter_map(|c| match parse_cidr(c) {
            Ok(net) => Some(net),
            Err(e) => {
                warn!("Ignoring subnet in {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
