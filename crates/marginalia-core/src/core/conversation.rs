//! A conversation: the persisted unit wrapping one [`ConversationTree`].

use chrono::{DateTime, Utc};
use tracing::warn;

use super::persistence::{ConversationSnapshot, SCHEMA_VERSION};
use super::tree::ConversationTree;

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tree: ConversationTree,
}

impl Conversation {
    /// Creates an empty conversation with a fresh id.
    pub fn new(title: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.and_then(normalize_title),
            created_at: Utc::now(),
            tree: ConversationTree::new(),
        }
    }

    /// Captures the conversation for a store. `updated_at` is set to now.
    pub fn snapshot(&self) -> ConversationSnapshot {
        let mut nodes: Vec<_> = self.tree.nodes().cloned().collect();
        nodes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        ConversationSnapshot {
            schema_version: SCHEMA_VERSION,
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
            root: self.tree.root().cloned(),
            current_node: self.tree.current_node().cloned(),
            nodes,
        }
    }

    /// Restores a conversation, logging (not rejecting) structural problems.
    pub fn from_snapshot(snapshot: ConversationSnapshot) -> Self {
        let tree =
            ConversationTree::from_parts(snapshot.nodes, snapshot.root, snapshot.current_node);
        for violation in tree.check_invariants() {
            warn!(conversation = %snapshot.id, "loaded tree is inconsistent: {violation}");
        }
        Self {
            id: snapshot.id,
            title: snapshot.title,
            created_at: snapshot.created_at,
            tree,
        }
    }

    /// Title for listings, falling back to a short id.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| short_conversation_id(&self.id))
    }
}

pub(crate) fn normalize_title(title: String) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Returns a shortened conversation id for display.
pub fn short_conversation_id(id: &str) -> String {
    if id.len() > 8 {
        format!("{}…", id.get(..8).unwrap_or(id))
    } else {
        id.to_string()
    }
}
