//! Session configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use synctext_core::DEFAULT_MERGE_THRESHOLD;

/// Everything a [`crate::session::SyncSession`] needs to know about its
/// environment: who we are, where the shared runtime state lives, and
/// the engine's tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Participant identifier (also names the document file and socket).
    pub participant: String,
    /// Directory holding this participant's document file.
    pub data_dir: PathBuf,
    /// Directory holding the shared registry and the peer sockets.
    pub runtime_dir: PathBuf,
    /// How often the document file is checked for modification.
    pub poll_interval: Duration,
    /// Sleep between transport receive retries when nothing arrived.
    pub idle_backoff: Duration,
    /// Buffered-operation count that forces a merge.
    pub merge_threshold: usize,
    /// Registry capacity.
    pub max_participants: usize,
    /// Notification ring capacity.
    pub notification_capacity: usize,
}

impl SessionConfig {
    /// Defaults matching the reference deployment: document in the
    /// working directory, shared state under the system temp dir, 2 s
    /// polling.
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            data_dir: PathBuf::from("."),
            runtime_dir: std::env::temp_dir().join("synctext"),
            poll_interval: Duration::from_secs(2),
            idle_backoff: Duration::from_millis(100),
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            max_participants: 5,
            notification_capacity: 5,
        }
    }

    /// Config for testing: isolated directories under `root`, fast
    /// polling so tests converge quickly.
    pub fn for_testing(participant: impl Into<String>, root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            runtime_dir: root.join("run"),
            poll_interval: Duration::from_millis(50),
            idle_backoff: Duration::from_millis(20),
            ..Self::new(participant)
        }
    }

    /// This participant's document file.
    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}_doc.txt", self.participant))
    }

    /// The datagram socket of any participant, ours included.
    pub fn socket_path(&self, participant: &str) -> PathBuf {
        self.runtime_dir.join(format!("{participant}.sock"))
    }

    /// The shared registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.runtime_dir.join("registry.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("alice");
        assert_eq!(config.participant, "alice");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.idle_backoff, Duration::from_millis(100));
        assert_eq!(config.merge_threshold, 5);
        assert_eq!(config.max_participants, 5);
        assert_eq!(config.notification_capacity, 5);
    }

    #[test]
    fn test_paths_derive_from_participant() {
        let config = SessionConfig::for_testing("alice", Path::new("/tmp/st"));
        assert_eq!(
            config.document_path(),
            PathBuf::from("/tmp/st/data/alice_doc.txt")
        );
        assert_eq!(
            config.socket_path("bob"),
            PathBuf::from("/tmp/st/run/bob.sock")
        );
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/tmp/st/run/registry.json")
        );
    }
}
