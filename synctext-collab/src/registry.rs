//! Shared participant registry.
//!
//! A capacity-bounded "who is online" table shared by all participant
//! processes, stored as a JSON file in the runtime directory. The
//! registry is process-external state the engine does not own: it is
//! consulted only at registration and at broadcast fan-out time.
//! Registration is idempotent; re-registering an existing identifier is
//! a no-op. An unreadable table is treated as empty and rebuilt, the
//! same way the reference deployment resets a corrupted table.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryTable {
    participants: Vec<String>,
}

/// Registry errors. Setup-time failures are fatal to the caller;
/// everything else degrades to an empty roster.
#[derive(Debug)]
pub enum RegistryError {
    /// Reading or writing the table failed.
    Io(String),
    /// The table is full and the identifier is not already present.
    Full { capacity: usize },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(e) => write!(f, "registry I/O error: {e}"),
            RegistryError::Full { capacity } => {
                write!(f, "registry full ({capacity} participants)")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Handle to the shared participant table.
pub struct Registry {
    path: PathBuf,
    capacity: usize,
}

impl Registry {
    pub fn new(path: PathBuf, capacity: usize) -> Self {
        Self { path, capacity }
    }

    fn load(&self) -> RegistryTable {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return RegistryTable::default();
        };
        match serde_json::from_str::<RegistryTable>(&raw) {
            Ok(table) if table.participants.len() <= self.capacity => table,
            Ok(_) | Err(_) => {
                log::warn!(
                    "registry at {} unreadable or over capacity, starting fresh",
                    self.path.display()
                );
                RegistryTable::default()
            }
        }
    }

    fn store(&self, table: &RegistryTable) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| RegistryError::Io(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(table)
            .map_err(|e| RegistryError::Io(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| RegistryError::Io(e.to_string()))
    }

    /// Register a participant, returning the full roster afterwards.
    /// Idempotent: an already-present identifier is re-admitted even
    /// when the table is full.
    pub fn register(&self, participant: &str) -> Result<Vec<String>, RegistryError> {
        let mut table = self.load();
        if !table.participants.iter().any(|p| p == participant) {
            if table.participants.len() >= self.capacity {
                return Err(RegistryError::Full {
                    capacity: self.capacity,
                });
            }
            table.participants.push(participant.to_string());
            self.store(&table)?;
        }
        Ok(table.participants)
    }

    /// Current roster; an absent or unreadable table reads as empty.
    pub fn participants(&self) -> Vec<String> {
        self.load().participants
    }

    /// Broadcast targets: everyone but `me`.
    pub fn peers_except(&self, me: &str) -> Vec<String> {
        self.load()
            .participants
            .into_iter()
            .filter(|p| p != me)
            .collect()
    }
}
