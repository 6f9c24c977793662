//! Filesystem archive sink for closed-session transcripts.
//!
//! Each closed session becomes one pretty-printed JSON file under the archive
//! directory, named from the identity and the closing timestamp. Artifacts are
//! append-only: the relay writes each one once and never touches it again.

use std::path::{Path, PathBuf};

use relaydesk_core::archive::ArchiveSink;
use relaydesk_types::error::ArchiveError;
use relaydesk_types::session::SessionArchive;

/// Writes archive artifacts as JSON files under a directory.
pub struct FsArchiveSink {
    dir: PathBuf,
}

impl FsArchiveSink {
    /// Create a sink rooted at `dir`. The directory is created on first write.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Count the artifacts currently on disk. A missing directory means no
    /// session has been closed yet.
    pub async fn artifact_count(&self) -> usize {
        let mut count = 0;
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                count += 1;
            }
        }
        count
    }
}

impl ArchiveSink for FsArchiveSink {
    async fn write(&self, archive: &SessionArchive) -> Result<PathBuf, ArchiveError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ArchiveError::Io(e.to_string()))?;

        let path = self.dir.join(format!("{}.json", archive.artifact_stem()));
        let json = serde_json::to_string_pretty(archive)
            .map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ArchiveError::Io(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Archive artifact written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use relaydesk_types::identity::VisitorIdentity;
    use relaydesk_types::session::VisitorSession;
    use relaydesk_types::transcript::{LinePayload, SpeakerRole, TranscriptLine};

    fn archive_for(name: &str) -> SessionArchive {
        let mut session = VisitorSession::new(VisitorIdentity::derive(name), name.to_string());
        session.history.push(TranscriptLine::new(
            SpeakerRole::Visitor,
            LinePayload::Text("hola".to_string()),
        ));
        session.history.push(TranscriptLine::new(
            SpeakerRole::Operator,
            LinePayload::Text("hola ana".to_string()),
        ));
        let closed_at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 45).unwrap();
        SessionArchive::from_session(&session, closed_at)
    }

    #[tokio::test]
    async fn test_write_creates_named_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsArchiveSink::new(dir.path().join("archives"));

        let path = sink.write(&archive_for("Ana")).await.unwrap();

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("ana_2024-03-15T10-30-45.json")
        );
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_artifact_roundtrips_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsArchiveSink::new(dir.path().to_path_buf());

        let archive = archive_for("Ana");
        let path = sink.write(&archive).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: SessionArchive = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.identity, archive.identity);
        assert_eq!(parsed.history, archive.history);
    }

    #[tokio::test]
    async fn test_artifact_count() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsArchiveSink::new(dir.path().join("archives"));

        assert_eq!(sink.artifact_count().await, 0);
        sink.write(&archive_for("Ana")).await.unwrap();
        sink.write(&archive_for("Bob")).await.unwrap();
        assert_eq!(sink.artifact_count().await, 2);
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be.
        let blocked = dir.path().join("blocked");
        tokio::fs::write(&blocked, "not a directory").await.unwrap();
        let sink = FsArchiveSink::new(blocked);

        let err = sink.write(&archive_for("Ana")).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }
}
