//! Configuration read by hook processes, stored next to each bare repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const HOOK_CONFIG_FILE: &str = "gatehouse-hook.toml";
/// Overrides where hooks look for their configuration.
pub const ENV_HOOK_CONFIG: &str = "GATEHOUSE_HOOK_CONFIG";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    pub server_url: String,
    pub secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl HookConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
    }

    /// Writes the config readable by the owner only, since it holds the secret.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize hook config: {e}")))?;
        fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Resolves the config path: explicit override first, then the
    /// repository git is running the hook for.
    #[must_use]
    pub fn locate() -> PathBuf {
        locate_from(
            std::env::var_os(ENV_HOOK_CONFIG).map(PathBuf::from),
            std::env::var_os("GIT_DIR").map(PathBuf::from),
        )
    }
}

fn locate_from(explicit: Option<PathBuf>, git_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    // git runs hooks from the repository directory for bare repositories.
    git_dir.unwrap_or_else(|| PathBuf::from(".")).join(HOOK_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(HOOK_CONFIG_FILE);
        let config = HookConfig {
            server_url: "http://127.0.0.1:8080".to_string(),
            secret: "s3cret".to_string(),
            timeout_secs: 3,
        };
        config.save(&path).unwrap();

        assert_eq!(HookConfig::load(&path).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_timeout_defaults() {
        let config: HookConfig =
            toml::from_str("server_url = \"http://x\"\nsecret = \"s\"\n").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_missing_or_invalid_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(HOOK_CONFIG_FILE);
        assert!(matches!(HookConfig::load(&path), Err(Error::Config(_))));

        fs::write(&path, "server_url = ").unwrap();
        assert!(matches!(HookConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_locate() {
        assert_eq!(
            locate_from(Some("/etc/hook.toml".into()), Some("/repos/1.git".into())),
            PathBuf::from("/etc/hook.toml")
        );
        assert_eq!(
            locate_from(None, Some("/repos/1.git".into())),
            PathBuf::from("/repos/1.git").join(HOOK_CONFIG_FILE)
        );
        assert_eq!(locate_from(None, None), PathBuf::from(".").join(HOOK_CONFIG_FILE));
    }
}
