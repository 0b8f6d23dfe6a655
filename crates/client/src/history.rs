// crates/client/src/history.rs
//! Durable per-agent conversation history with quota enforcement.
//!
//! Each agent's turns live in their own JSON file wrapped in a versioned
//! envelope. Loads fail open: anything unreadable, structurally wrong, or
//! from a different envelope version yields an empty history instead of an
//! error. Saves trim to the most recent turns and enforce a global byte
//! quota across all agents, evicting the least-recently-updated histories
//! first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope format revision. Bump on any incompatible change to the
/// stored shape; old files are then discarded on load.
const ENVELOPE_VERSION: u32 = 1;

/// Most recent turns kept per agent.
pub const MAX_TURNS_PER_AGENT: usize = 100;

/// Aggregate on-disk budget across all agents.
pub const MAX_TOTAL_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History write failed: {0}")]
    Io(#[from] io::Error),

    #[error("History serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("History quota exceeded even after eviction")]
    QuotaExceeded,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    timestamp: DateTime<Utc>,
    data: Vec<Turn>,
}

/// File-backed history store rooted at one directory.
pub struct HistoryStore {
    root: PathBuf,
    max_turns: usize,
    max_total_bytes: u64,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_turns: MAX_TURNS_PER_AGENT,
            max_total_bytes: MAX_TOTAL_BYTES,
        }
    }

    /// Store rooted at the platform data directory
    /// (`~/.local/share/ragline/history` on Linux).
    pub fn default_location() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("ragline").join("history"))
    }

    #[cfg(test)]
    fn with_limits(root: impl Into<PathBuf>, max_turns: usize, max_total_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_turns,
            max_total_bytes,
        }
    }

    /// Load an agent's turns. Missing files, corrupt JSON, and version
    /// mismatches all read as empty history.
    pub fn load(&self, agent_id: &str) -> Vec<Turn> {
        let path = self.path_for(agent_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(agent_id, error = %e, "failed to read history file");
                }
                return Vec::new();
            }
        };
        match serde_json::from_str::<Envelope>(&raw) {
            Ok(envelope) if envelope.version == ENVELOPE_VERSION => envelope.data,
            Ok(envelope) => {
                tracing::warn!(agent_id, version = envelope.version, "discarding history with unknown envelope version");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(agent_id, error = %e, "discarding malformed history file");
                Vec::new()
            }
        }
    }

    /// Persist an agent's turns, keeping only the most recent
    /// `max_turns`. If the write would exceed the global byte quota, the
    /// least-recently-updated other histories are evicted and the save is
    /// retried once.
    pub fn save(&self, agent_id: &str, turns: &[Turn]) -> Result<(), HistoryError> {
        fs::create_dir_all(&self.root)?;

        let start = turns.len().saturating_sub(self.max_turns);
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            timestamp: Utc::now(),
            data: turns[start..].to_vec(),
        };
        let payload = serde_json::to_vec(&envelope)?;
        let path = self.path_for(agent_id);

        if self.projected_usage(&path, payload.len() as u64)? > self.max_total_bytes {
            self.evict_for(&path, payload.len() as u64)?;
            if self.projected_usage(&path, payload.len() as u64)? > self.max_total_bytes {
                return Err(HistoryError::QuotaExceeded);
            }
        }

        fs::write(&path, payload)?;
        Ok(())
    }

    /// Remove one agent's history. Missing files are fine.
    pub fn clear(&self, agent_id: &str) -> Result<(), HistoryError> {
        match fs::remove_file(self.path_for(agent_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, agent_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_id(agent_id)))
    }

    /// Total bytes after the pending write replaces `target`'s current file.
    fn projected_usage(&self, target: &Path, incoming: u64) -> Result<u64, HistoryError> {
        let mut total = incoming;
        for entry in self.history_files()? {
            if entry.path != target {
                total += entry.len;
            }
        }
        Ok(total)
    }

    /// Delete other histories, least recently updated first, until the
    /// pending write fits.
    fn evict_for(&self, target: &Path, incoming: u64) -> Result<(), HistoryError> {
        let mut victims: Vec<_> = self
            .history_files()?
            .into_iter()
            .filter(|e| e.path != target)
            .collect();
        victims.sort_by_key(|e| e.updated);

        let mut others: u64 = victims.iter().map(|e| e.len).sum();
        for victim in victims {
            if incoming + others <= self.max_total_bytes {
                break;
            }
            tracing::info!(path = %victim.path.display(), "evicting history to stay under quota");
            fs::remove_file(&victim.path)?;
            others -= victim.len;
        }
        Ok(())
    }

    fn history_files(&self) -> Result<Vec<HistoryFile>, HistoryError> {
        let mut files = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let meta = entry.metadata()?;
            // Envelope timestamp is authoritative for eviction order, so
            // copying files around cannot reorder the queue.
            let updated = fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<Envelope>(&raw).ok())
                .map(|env| env.timestamp)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            files.push(HistoryFile {
                path,
                len: meta.len(),
                updated,
            });
        }
        Ok(files)
    }
}

struct HistoryFile {
    path: PathBuf,
    len: u64,
    updated: DateTime<Utc>,
}

/// Keep agent ids filesystem-safe without losing uniqueness for typical
/// UUID or slug identifiers.
fn sanitize_id(agent_id: &str) -> String {
    agent_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
