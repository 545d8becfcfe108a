// src/checkpoint.rs
//! Durable per-identity "last seen" markers, kept in one JSON document that is
//! rewritten wholesale on every mutation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::CheckpointError;

const DOCUMENT_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(alias = "lastSeenPostId")]
    pub last_seen_id: Option<String>,
    pub last_seen_timestamp: Option<i64>,
    #[serde(default, alias = "lastCheckTime")]
    pub last_checked_at_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    version: u32,
    users: BTreeMap<String, Checkpoint>,
}

/// Why a state file was discarded on load.
#[derive(Debug, thiserror::Error)]
enum CorruptState {
    #[error("state file is not valid JSON: {0}")]
    Unparsable(#[from] serde_json::Error),
    #[error("state file uses the legacy single-user shape")]
    Legacy,
    #[error("state file has an unrecognized shape")]
    UnknownShape,
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    users: BTreeMap<String, Checkpoint>,
}

impl CheckpointStore {
    /// Empty store bound to `path`, without touching the disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            users: BTreeMap::new(),
        }
    }

    /// Load the document at `path`. Never fails: a missing, unreadable,
    /// corrupt or legacy file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        let raw = match fs::read_to_string(&store.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %store.path.display(), "no existing state file, starting fresh");
                return store;
            }
            Err(e) => {
                tracing::error!(path = %store.path.display(), error = %e, "failed to read state file, starting with empty state");
                return store;
            }
        };

        match decode(&raw) {
            Ok(users) => {
                tracing::info!(path = %store.path.display(), identities = users.len(), "state loaded");
                store.users = users;
            }
            Err(CorruptState::Legacy) => {
                tracing::warn!(
                    path = %store.path.display(),
                    "legacy single-user state found, previous checkpoint discarded"
                );
            }
            Err(e) => {
                tracing::error!(path = %store.path.display(), error = %e, "state file unusable, starting with empty state");
            }
        }
        store
    }

    /// Stored checkpoint, or a fresh one that is inserted so later
    /// mutations land in the same entry.
    pub fn get(&mut self, identity: &str) -> Checkpoint {
        self.users.entry(identity.to_string()).or_default().clone()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Checkpoint> {
        self.users.clone()
    }

    pub async fn record_seen(
        &mut self,
        identity: &str,
        id: &str,
        timestamp: i64,
    ) -> Result<(), CheckpointError> {
        let cp = self.users.entry(identity.to_string()).or_default();
        cp.last_seen_id = Some(id.to_string());
        // never move the marker backwards in time
        cp.last_seen_timestamp = Some(
            cp.last_seen_timestamp
                .map_or(timestamp, |t| t.max(timestamp)),
        );
        cp.last_checked_at_ms = now_ms();
        self.persist().await
    }

    pub async fn record_checked(&mut self, identity: &str) -> Result<(), CheckpointError> {
        self.users.entry(identity.to_string()).or_default().last_checked_at_ms = now_ms();
        self.persist().await
    }

    async fn persist(&self) -> Result<(), CheckpointError> {
        let doc = Document {
            version: DOCUMENT_VERSION,
            users: self.users.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        let io_err = |source: std::io::Error| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &bytes).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

/// Structural probe over the raw JSON, then a typed parse of the current shape.
fn decode(raw: &str) -> Result<BTreeMap<String, Checkpoint>, CorruptState> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let Some(obj) = value.as_object() else {
        return Err(CorruptState::UnknownShape);
    };
    if obj.get("users").is_some_and(|u| u.is_object()) {
        let doc: Document = serde_json::from_value(value)?;
        return Ok(doc.users);
    }
    if obj.contains_key("lastSeenPostId") || obj.contains_key("lastSeenId") {
        return Err(CorruptState::Legacy);
    }
    Err(CorruptState::UnknownShape)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
