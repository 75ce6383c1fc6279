//! Configuration management for drop-cli.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use zerok_drop_types::{DEFAULT_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES, MIN_EXPIRATION_MINUTES};

const CONFIG_FILE: &str = "config.json";

/// Relay used when nothing is configured.
pub const DEFAULT_RELAY_URL: &str = "http://localhost:8080";

/// Settings stored locally between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Relay base URL; also the origin of generated share links.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    /// Expiration applied when `upload` is not given `--expires`.
    #[serde(default = "default_expiration_minutes")]
    pub default_expiration_minutes: u32,
}

fn default_relay_url() -> String {
    DEFAULT_RELAY_URL.to_string()
}

fn default_expiration_minutes() -> u32 {
    DEFAULT_EXPIRATION_MINUTES
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            default_expiration_minutes: default_expiration_minutes(),
        }
    }
}

impl CliConfig {
    /// Load the configuration, or defaults if none was saved.
    pub async fn load_or_default(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Failed to read configuration")?;
        serde_json::from_str(&contents).context("Invalid configuration")
    }

    /// Save the configuration to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save configuration")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.relay_url.starts_with("http://") || self.relay_url.starts_with("https://")) {
            anyhow::bail!("Relay URL must start with http:// or https://");
        }
        if !(MIN_EXPIRATION_MINUTES..=MAX_EXPIRATION_MINUTES)
            .contains(&self.default_expiration_minutes)
        {
            anyhow::bail!(
                "Expiration must be between {} and {} minutes",
                MIN_EXPIRATION_MINUTES,
                MAX_EXPIRATION_MINUTES
            );
        }
        Ok(())
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
