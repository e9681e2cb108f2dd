//! Credential generation and the `legacy` file-based credential store

use super::ports::CredentialStore;
use crate::error::{Error, Result};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Minimum length of generated passwords
pub const MIN_PASSWORD_LENGTH: usize = 32;

/// Characters that survive unquoted in YAML scalars and shell words
const PASSWORD_SYMBOLS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.+=";

/// Generate a random password of [`MIN_PASSWORD_LENGTH`] characters
pub fn generate_password() -> String {
    generate_password_of(MIN_PASSWORD_LENGTH)
}

/// Generate a random password; lengths below the minimum are raised to it
pub fn generate_password_of(length: usize) -> String {
    let length = length.max(MIN_PASSWORD_LENGTH);
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_SYMBOLS[rng.gen_range(0..PASSWORD_SYMBOLS.len())] as char)
        .collect()
}

// =============================================================================
// File Credential Store
// =============================================================================

/// Stores each secret as a file under `<cluster_dir>/vault/`
#[derive(Debug, Clone, Default)]
pub struct FileCredentialStore;

impl FileCredentialStore {
    pub const BACKEND: &'static str = "legacy";

    pub fn new() -> Self {
        Self
    }

    fn secret_path(cluster_dir: &Path, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::Configure(format!("Invalid credential name: {}", name)));
        }
        Ok(cluster_dir.join("vault").join(name))
    }
}

impl CredentialStore for FileCredentialStore {
    fn backend(&self) -> &str {
        Self::BACKEND
    }

    fn store(&self, cluster_dir: &Path, name: &str, secret: &str) -> Result<()> {
        let path = Self::secret_path(cluster_dir, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, secret)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        debug!("Stored credential {} in {}", name, path.display());
        Ok(())
    }

    fn show(&self, cluster_dir: &Path, name: &str) -> Result<String> {
        let path = Self::secret_path(cluster_dir, name)?;
        let secret = fs::read_to_string(&path)?;
        Ok(secret.trim_end().to_string())
    }

    fn delete(&self, cluster_dir: &Path, name: &str) -> Result<()> {
        let path = Self::secret_path(cluster_dir, name)?;
        fs::remove_file(path)?;
        Ok(())
    }

    fn exists(&self, cluster_dir: &Path, name: &str) -> bool {
        Self::secret_path(cluster_dir, name)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_password() {
        let password = generate_password();
        assert_eq!(password.len(), MIN_PASSWORD_LENGTH);
        assert!(password.bytes().all(|b| PASSWORD_SYMBOLS.contains(&b)));

        assert_eq!(generate_password_of(8).len(), MIN_PASSWORD_LENGTH);
        assert_eq!(generate_password_of(48).len(), 48);
        assert_ne!(generate_password(), generate_password());
    }

    #[test]
    fn test_password_is_plain_yaml_scalar() {
        let password = generate_password();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&format!("p: {}", password)).unwrap();
        assert_eq!(parsed["p"].as_str(), Some(password.as_str()));
    }

    #[test]
    fn test_file_store_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let store = FileCredentialStore::new();

        assert!(!store.exists(tmp.path(), "vault_pass"));
        store.store(tmp.path(), "vault_pass", "s3cret").unwrap();
        assert!(store.exists(tmp.path(), "vault_pass"));
        assert_eq!(store.show(tmp.path(), "vault_pass").unwrap(), "s3cret");

        store.delete(tmp.path(), "vault_pass").unwrap();
        assert!(!store.exists(tmp.path(), "vault_pass"));
        assert!(store.show(tmp.path(), "vault_pass").is_err());
    }

    #[test]
    fn test_file_store_rejects_paths() {
        let tmp = TempDir::new().unwrap();
        let store = FileCredentialStore::new();
        assert!(store.store(tmp.path(), "../escape", "x").is_err());
        assert!(store.store(tmp.path(), "", "x").is_err());
    }
}
