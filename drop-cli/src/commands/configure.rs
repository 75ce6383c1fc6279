//! Show or change the stored settings.

use anyhow::Result;
use std::path::Path;

use crate::config::CliConfig;

/// Run the config command. With no changes, prints the current settings.
pub async fn run(data_dir: &Path, relay: Option<String>, expires: Option<u32>) -> Result<()> {
    let mut config = CliConfig::load_or_default(data_dir).await?;
    let changed = relay.is_some() || expires.is_some();

    if let Some(relay) = relay {
        config.relay_url = relay.trim_end_matches('/').to_string();
    }
    if let Some(minutes) = expires {
        config.default_expiration_minutes = minutes;
    }

    if changed {
        config.validate()?;
        config.save(data_dir).await?;
        println!("Configuration saved.");
        println!();
    }

    println!("Data dir:   {}", data_dir.display());
    println!("Relay:      {}", config.relay_url);
    println!("Expiration: {} minutes", config.default_expiration_minutes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn show_without_config() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), None, None).await.is_ok());
        assert!(!dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn set_relay_and_expiration() {
        let dir = tempdir().unwrap();
        run(dir.path(), Some("https://relay.example/".into()), Some(90))
            .await
            .unwrap();

        let config = CliConfig::load_or_default(dir.path()).await.unwrap();
        assert_eq!(config.relay_url, "https://relay.example");
        assert_eq!(config.default_expiration_minutes, 90);
    }

    #[tokio::test]
    async fn invalid_values_are_not_saved() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), Some("relay.example".into()), None)
            .await
            .is_err());
        assert!(!dir.path().join("config.json").exists());
    }
}
