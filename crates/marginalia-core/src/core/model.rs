//! Data model shared by the tree and the thread engine.
//!
//! Ids are opaque UUID v4 strings wrapped in newtypes so node ids and thread
//! ids cannot be mixed up at call sites.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a [`MessageNode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

/// Identifier of a [`ThreadAnnotation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

macro_rules! opaque_id {
    ($name:ident) => {
        impl $name {
            /// Generates a fresh random id.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a shortened id for display.
            pub fn short(&self) -> &str {
                self.0.get(..8).unwrap_or(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(NodeId);
opaque_id!(ThreadId);

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => anyhow::bail!("Unknown role '{other}' (expected user, assistant or system)"),
        }
    }
}

/// A single message in the conversation tree.
///
/// Nodes are only handed out by shared reference outside this crate; links
/// (`parent_id`, `children`) are maintained exclusively by
/// [`ConversationTree`](super::tree::ConversationTree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    pub id: NodeId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thread_annotations: Vec<ThreadAnnotation>,
}

impl MessageNode {
    pub(crate) fn new(id: NodeId, role: Role, content: String, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            role,
            content,
            parent_id,
            children: Vec::new(),
            timestamp: Utc::now(),
            thread_annotations: Vec::new(),
        }
    }

    /// Looks up an annotation anchored to this node.
    pub fn annotation(&self, thread_id: &ThreadId) -> Option<&ThreadAnnotation> {
        self.thread_annotations.iter().find(|a| &a.id == thread_id)
    }
}

/// A selection thread anchored to a run of text inside a message.
///
/// The anchor is "the `match_index`-th literal occurrence of `selection_text`"
/// in the anchor's plain text, which stays valid because message text never
/// changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadAnnotation {
    pub id: ThreadId,
    pub anchor_message_id: NodeId,
    pub selection_text: String,
    pub match_index: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_message_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<NodeId>,
}

impl ThreadAnnotation {
    /// Creates a draft annotation (no thread messages yet).
    pub fn draft(anchor: NodeId, selection_text: impl Into<String>, match_index: usize) -> Self {
        Self {
            id: ThreadId::generate(),
            anchor_message_id: anchor,
            selection_text: selection_text.into(),
            match_index,
            created_at: Utc::now(),
            root_message_id: None,
            last_message_id: None,
        }
    }

    /// A draft thread has never had a message sent in it.
    pub fn is_draft(&self) -> bool {
        self.root_message_id.is_none()
    }

    /// Whether this annotation anchors the same occurrence as the given pair.
    pub fn same_anchor(&self, selection_text: &str, match_index: usize) -> bool {
        self.selection_text == selection_text && self.match_index == match_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_case_insensitively() {
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert_eq!(" assistant ".parse::<Role>().unwrap(), Role::Assistant);
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_draft_annotation_omits_thread_bounds_when_serialized() {
        let annotation = ThreadAnnotation::draft(NodeId::from("n1"), "cat", 1);
        let json = serde_json::to_value(&annotation).unwrap();

        assert!(annotation.is_draft());
        assert!(json.get("root_message_id").is_none());
        assert_eq!(json["anchor_message_id"], "n1");
        assert_eq!(json["match_index"], 1);
    }

    #[test]
    fn test_short_id_handles_short_strings() {
        assert_eq!(NodeId::from("abc").short(), "abc");
        assert_eq!(NodeId::from("0123456789").short(), "01234567");
    }
}
