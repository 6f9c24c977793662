//! Application state wiring the relay to its infrastructure.
//!
//! `AppState` holds the concrete relay instance used by both CLI commands and
//! the WebSocket server. The relay is generic over its storage ports, but
//! AppState pins it to the SQLite store and filesystem archive sink.

use std::path::PathBuf;
use std::sync::Arc;

use relaydesk_core::relay::RelayService;
use relaydesk_infra::archive::FsArchiveSink;
use relaydesk_infra::config::{load_relay_config, resolve_data_dir};
use relaydesk_infra::sqlite::pool::DatabasePool;
use relaydesk_infra::sqlite::session::SqliteSessionStore;
use relaydesk_types::config::RelayConfig;

/// Concrete type alias for the relay generics pinned to infra implementations.
pub type ConcreteRelayService = RelayService<SqliteSessionStore, FsArchiveSink>;

/// Shared application state for CLI commands and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ConcreteRelayService>,
    pub config: RelayConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: resolve the data directory, open the
    /// database, construct the relay and hydrate it from the store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_relay_config(&data_dir).await;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join(&config.database_file).display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let store = SqliteSessionStore::new(db_pool.clone());
        let sink = FsArchiveSink::new(data_dir.join(&config.archive_dir));

        let relay = RelayService::new(store, sink, config.max_file_bytes);
        relay.load().await;

        Ok(Self {
            relay: Arc::new(relay),
            config,
            data_dir,
            db_pool,
        })
    }

    /// The archive directory the relay writes closed sessions into.
    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join(&self.config.archive_dir)
    }
}
