//! Transcript archival port and its in-memory test double.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use relaydesk_types::error::ArchiveError;
use relaydesk_types::session::SessionArchive;

/// Destination for closed-session transcripts.
///
/// A successful write is the point of no return for a close: the relay
/// only purges a session after its artifact exists.
pub trait ArchiveSink: Send + Sync {
    /// Write one transcript artifact and return where it landed.
    fn write(
        &self,
        archive: &SessionArchive,
    ) -> impl std::future::Future<Output = Result<PathBuf, ArchiveError>> + Send;
}

/// In-memory [`ArchiveSink`] that collects artifacts for assertions.
#[derive(Default)]
pub struct MemoryArchiveSink {
    archives: tokio::sync::Mutex<Vec<SessionArchive>>,
    failing: AtomicBool,
}

impl MemoryArchiveSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for exercising abort paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything written so far, in write order.
    pub async fn archived(&self) -> Vec<SessionArchive> {
        self.archives.lock().await.clone()
    }
}

impl ArchiveSink for MemoryArchiveSink {
    async fn write(&self, archive: &SessionArchive) -> Result<PathBuf, ArchiveError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArchiveError::Io("archive sink is failing".to_string()));
        }
        let path = PathBuf::from(format!("{}.json", archive.artifact_stem()));
        self.archives.lock().await.push(archive.clone());
        Ok(path)
    }
}
