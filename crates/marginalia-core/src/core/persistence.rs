//! Conversation persistence.
//!
//! Each conversation is stored as one JSON snapshot holding the node arena
//! plus the `root` and `current_node` pointers. Thread annotations travel
//! inside their anchor nodes.
//!
//! ## Schema v1
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "id": "…",
//!   "title": "…",
//!   "created_at": "2025-12-17T03:21:09Z",
//!   "updated_at": "2025-12-17T03:25:40Z",
//!   "root": "…",
//!   "current_node": "…",
//!   "nodes": [{ "id": "…", "role": "user", "content": "…", "parent_id": null, "children": [], "timestamp": "…" }]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::{MessageNode, NodeId};
use crate::config::paths;

/// Current schema version for new snapshots.
pub const SCHEMA_VERSION: u32 = 1;

/// Serialized form of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub schema_version: u32,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub root: Option<NodeId>,
    #[serde(default)]
    pub current_node: Option<NodeId>,
    #[serde(default)]
    pub nodes: Vec<MessageNode>,
}

impl ConversationSnapshot {
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
            message_count: self.nodes.len(),
            thread_count: self.nodes.iter().map(|n| n.thread_annotations.len()).sum(),
        }
    }
}

/// Listing entry for a stored conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub thread_count: usize,
}

/// Durable storage for conversations.
pub trait PersistenceStore: Send + Sync {
    fn save(&self, snapshot: &ConversationSnapshot) -> Result<()>;

    /// Loads a conversation. Fails if it does not exist.
    fn load(&self, conversation_id: &str) -> Result<ConversationSnapshot>;

    /// Lists stored conversations, most recently updated first.
    fn list(&self) -> Result<Vec<ConversationSummary>>;

    /// Removes a conversation. Returns `false` if there was nothing to remove.
    fn delete(&self, conversation_id: &str) -> Result<bool>;
}

/// Stores each conversation as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<home>/conversations`.
    pub fn default_location() -> Self {
        Self::new(paths::conversations_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, conversation_id: &str) -> Result<PathBuf> {
        let valid = !conversation_id.is_empty()
            && conversation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("Invalid conversation id '{conversation_id}'");
        }
        Ok(self.dir.join(format!("{conversation_id}.json")))
    }
}

impl PersistenceStore for JsonFileStore {
    fn save(&self, snapshot: &ConversationSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.id)?;
        fs::create_dir_all(&self.dir).with_context(|| {
            format!(
                "Failed to create conversations directory {}",
                self.dir.display()
            )
        })?;

        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize conversation")?;

        // Write to a temp file and rename so a crash never leaves half a file.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        debug!(conversation = %snapshot.id, nodes = snapshot.nodes.len(), "conversation saved");
        Ok(())
    }

    fn load(&self, conversation_id: &str) -> Result<ConversationSnapshot> {
        let path = self.path_for(conversation_id)?;
        if !path.exists() {
            bail!("Conversation '{conversation_id}' not found");
        }
        read_snapshot(&path)
    }

    fn list(&self) -> Result<Vec<ConversationSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir).context("Failed to read conversations directory")? {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match read_snapshot(&path) {
                Ok(snapshot) => summaries.push(snapshot.summary()),
                // Skip unreadable files (best-effort)
                Err(e) => warn!(path = %path.display(), "skipping conversation file: {e:#}"),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    fn delete(&self, conversation_id: &str) -> Result<bool> {
        let path = self.path_for(conversation_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }
}

fn read_snapshot(path: &Path) -> Result<ConversationSnapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: ConversationSnapshot = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if snapshot.schema_version > SCHEMA_VERSION {
        bail!(
            "{} uses schema version {}, newer than supported version {}",
            path.display(),
            snapshot.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(snapshot)
}

/// In-memory store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, ConversationSnapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, ConversationSnapshot>>> {
        self.snapshots
            .lock()
            .map_err(|e| anyhow!("memory store lock poisoned: {e}"))
    }
}

impl PersistenceStore for MemoryStore {
    fn save(&self, snapshot: &ConversationSnapshot) -> Result<()> {
        self.lock()?.insert(snapshot.id.clone(), snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, conversation_id: &str) -> Result<ConversationSnapshot> {
        self.lock()?
            .get(conversation_id)
            .cloned()
            .with_context(|| format!("Conversation '{conversation_id}' not found"))
    }

    fn list(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<_> = self
            .lock()?
            .values()
            .map(ConversationSnapshot::summary)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    fn delete(&self, conversation_id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(conversation_id).is_some())
    }
}
