//! Configuration types for the Relaydesk server.
//!
//! `RelayConfig` represents the top-level `config.toml` that controls the
//! file relay bound, per-connection queue depth, and on-disk layout.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Relaydesk server.
///
/// Loaded from `~/.relaydesk/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Maximum decoded size of an operator file push, in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Outbound event queue depth per connection. A connection whose queue
    /// is full drops events rather than stalling the relay.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Directory name for closed-session artifacts, under the data dir.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// SQLite database file name, under the data dir.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl RelayConfig {
    /// Queue depth actually used for per-connection channels. Never zero:
    /// a zero-capacity channel cannot be constructed, and the value comes
    /// from a user-editable file.
    pub fn queue_capacity(&self) -> usize {
        self.event_queue_capacity.max(1)
    }
}

fn default_max_file_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_event_queue_capacity() -> usize {
    64
}

fn default_archive_dir() -> String {
    "archives".to_string()
}

fn default_database_file() -> String {
    "relaydesk.db".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            event_queue_capacity: default_event_queue_capacity(),
            archive_dir: default_archive_dir(),
            database_file: default_database_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.max_file_bytes, 512 * 1024 * 1024);
        assert_eq!(config.event_queue_capacity, 64);
        assert_eq!(config.archive_dir, "archives");
        assert_eq!(config.database_file, "relaydesk.db");
    }

    #[test]
    fn test_relay_config_deserialize_with_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_file_bytes, 512 * 1024 * 1024);
        assert_eq!(config.archive_dir, "archives");
    }

    #[test]
    fn test_relay_config_deserialize_with_values() {
        let toml_str = r#"
max_file_bytes = 1048576
event_queue_capacity = 16
archive_dir = "closed"
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_file_bytes, 1_048_576);
        assert_eq!(config.event_queue_capacity, 16);
        assert_eq!(config.archive_dir, "closed");
        // Unspecified fields keep their defaults
        assert_eq!(config.database_file, "relaydesk.db");
    }

    #[test]
    fn test_queue_capacity_never_zero() {
        let config: RelayConfig = toml::from_str("event_queue_capacity = 0").unwrap();
        assert_eq!(config.event_queue_capacity, 0);
        assert_eq!(config.queue_capacity(), 1);

        let config: RelayConfig = toml::from_str("event_queue_capacity = 16").unwrap();
        assert_eq!(config.queue_capacity(), 16);
    }

    #[test]
    fn test_relay_config_serde_roundtrip() {
        let config = RelayConfig {
            max_file_bytes: 1024,
            event_queue_capacity: 8,
            archive_dir: "a".to_string(),
            database_file: "b.db".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_file_bytes, 1024);
        assert_eq!(parsed.event_queue_capacity, 8);
    }
}
