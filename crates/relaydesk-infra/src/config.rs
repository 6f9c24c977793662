//! Configuration loader for Relaydesk.
//!
//! Reads `config.toml` from the data directory (`~/.relaydesk/` in production)
//! and deserializes it into [`RelayConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use relaydesk_types::config::RelayConfig;

/// Load relay configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
pub async fn load_relay_config(data_dir: &Path) -> RelayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RelayConfig::default()
        }
    }
}

/// Resolve the data directory: `RELAYDESK_DATA_DIR` env var, then
/// `~/.relaydesk`, then `./.relaydesk` as a last resort.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RELAYDESK_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".relaydesk");
    }

    PathBuf::from(".relaydesk")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_relay_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_relay_config(tmp.path()).await;
        assert_eq!(config.max_file_bytes, 512 * 1024 * 1024);
        assert_eq!(config.archive_dir, "archives");
    }

    #[tokio::test]
    async fn load_relay_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
max_file_bytes = 1048576
event_queue_capacity = 128
archive_dir = "closed-chats"
"#,
        )
        .await
        .unwrap();

        let config = load_relay_config(tmp.path()).await;
        assert_eq!(config.max_file_bytes, 1_048_576);
        assert_eq!(config.event_queue_capacity, 128);
        assert_eq!(config.archive_dir, "closed-chats");
        assert_eq!(config.database_file, "relaydesk.db");
    }

    #[tokio::test]
    async fn load_relay_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_relay_config(tmp.path()).await;
        assert_eq!(config.max_file_bytes, 512 * 1024 * 1024);
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var("RELAYDESK_DATA_DIR", "/tmp/test-relaydesk");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-relaydesk"));
        unsafe {
            std::env::remove_var("RELAYDESK_DATA_DIR");
        }
    }
}
