//! Selection threads layered over the conversation tree.
//!
//! A thread is a side conversation anchored to one occurrence of a selected
//! piece of text inside a message. Thread messages are ordinary tree nodes:
//! the thread root is a child of the anchor and every later message is a child
//! of the previous one. The annotation only records where the chain starts and
//! ends, so the anchor message and the main chain are never touched.
//!
//! The engine owns the [`Conversation`] it works on. Structural operations
//! report problems through the [`Notifier`] and return sentinels; persistence
//! is best-effort and never rolls back an in-memory change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::conversation::Conversation;
use super::highlight::build_ranges;
use super::model::{MessageNode, NodeId, Role, ThreadAnnotation, ThreadId};
use super::notify::{Notice, Notifier, TracingNotifier};
use super::occurrence::{nth_occurrence, resolve_occurrence};
use super::persistence::PersistenceStore;
use super::render::{ChainView, RenderedNode, Renderer};
use super::text::{PlainTextAccessor, TextAccessor};
use super::tree::ConversationTree;
use crate::config::Config;

/// UI-side state: which thread, if any, the user is currently inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSession {
    active_thread: Option<ThreadId>,
}

impl ThreadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_thread(&self) -> Option<&ThreadId> {
        self.active_thread.as_ref()
    }

    pub fn is_active(&self, thread_id: &ThreadId) -> bool {
        self.active_thread.as_ref() == Some(thread_id)
    }
}

/// A located thread: the annotation together with the node it hangs off.
#[derive(Debug, Clone, Copy)]
pub struct ThreadRef<'a> {
    pub anchor_message_id: &'a NodeId,
    pub annotation: &'a ThreadAnnotation,
}

#[derive(Debug, Clone, Copy)]
struct EngineSettings {
    autosave: bool,
    cleanup_drafts_on_exit: bool,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            autosave: config.autosave,
            cleanup_drafts_on_exit: config.threads.cleanup_drafts_on_exit,
        }
    }
}

pub struct ThreadAnnotationEngine {
    conversation: Conversation,
    /// thread id -> anchor node id
    index: HashMap<ThreadId, NodeId>,
    store: Arc<dyn PersistenceStore>,
    notifier: Arc<dyn Notifier>,
    text: Arc<dyn TextAccessor>,
    settings: EngineSettings,
}

impl ThreadAnnotationEngine {
    pub fn new(conversation: Conversation, store: Arc<dyn PersistenceStore>) -> Self {
        let mut engine = Self {
            conversation,
            index: HashMap::new(),
            store,
            notifier: Arc::new(TracingNotifier),
            text: Arc::new(PlainTextAccessor),
            settings: EngineSettings::from(&Config::default()),
        };
        engine.rebuild_index();
        engine
    }

    /// Loads a stored conversation and wraps it in an engine.
    pub fn open(store: Arc<dyn PersistenceStore>, conversation_id: &str) -> Result<Self> {
        let snapshot = store
            .load(conversation_id)
            .with_context(|| format!("Failed to open conversation '{conversation_id}'"))?;
        Ok(Self::new(Conversation::from_snapshot(snapshot), store))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_text_accessor(mut self, text: Arc<dyn TextAccessor>) -> Self {
        self.text = text;
        self
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.settings = EngineSettings::from(config);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tree(&self) -> &ConversationTree {
        &self.conversation.tree
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    /// Saves the conversation regardless of the autosave setting.
    pub fn save(&self) -> Result<()> {
        self.store
            .save(&self.conversation.snapshot())
            .with_context(|| format!("Failed to save conversation '{}'", self.conversation.id))
    }

    // ========================================================================
    // Main conversation
    // ========================================================================

    /// Appends a message to the main conversation and makes it current.
    ///
    /// `None` parent continues from the current node, or from the root when
    /// nothing is checked out. Unknown parents and thread messages are
    /// rejected.
    pub fn append_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        parent: Option<&NodeId>,
    ) -> Option<NodeId> {
        let tree = &self.conversation.tree;
        let parent = match parent {
            Some(requested) => Some(requested),
            None => tree.current_node().or_else(|| {
                let root = tree.root();
                if root.is_some() {
                    debug!("no current node; continuing from root");
                }
                root
            }),
        }
        .cloned();

        if let Some(parent) = &parent {
            if !tree.contains(parent) {
                self.notify(Notice::warning("Parent message not found"));
                return None;
            }
            if self.is_thread_message(parent) {
                self.notify(Notice::warning(
                    "Thread messages cannot be continued from the main conversation",
                ));
                return None;
            }
        }

        let id = self
            .conversation
            .tree
            .insert(role, content, parent.as_ref())
            .id
            .clone();
        self.persist();
        Some(id)
    }

    /// Moves the current node (branch switch). Unknown ids and thread
    /// messages are reported.
    pub fn checkout(&mut self, id: &NodeId) -> bool {
        if !self.conversation.tree.contains(id) {
            self.notify(Notice::warning("Message not found"));
            return false;
        }
        if self.is_thread_message(id) {
            self.notify(Notice::warning("Thread messages cannot be checked out"));
            return false;
        }
        self.conversation.tree.checkout(id);
        self.persist();
        true
    }

    /// Renders the active chain of the main conversation.
    pub fn render_main(&self, renderer: &mut dyn Renderer) {
        let nodes = self
            .conversation
            .tree
            .get_chain()
            .into_iter()
            .map(|node| self.rendered_node(node))
            .collect();
        renderer.render(&ChainView {
            thread: None,
            nodes,
        });
    }

    // ========================================================================
    // Thread creation and lookup
    // ========================================================================

    /// Creates a draft thread on the `match_index`-th occurrence of
    /// `selection_text` in the anchor's plain text.
    ///
    /// An annotation for the same occurrence is reused rather than duplicated.
    pub fn create_annotation(
        &mut self,
        anchor: &NodeId,
        selection_text: &str,
        match_index: usize,
    ) -> Option<ThreadId> {
        if selection_text.is_empty() {
            self.notify(Notice::warning("Selection is empty"));
            return None;
        }
        let Some(node) = self.conversation.tree.get(anchor) else {
            self.notify(Notice::warning("Message not found"));
            return None;
        };
        if let Some(existing) = node
            .thread_annotations
            .iter()
            .find(|a| a.same_anchor(selection_text, match_index))
        {
            debug!(thread = %existing.id, "reusing existing annotation");
            return Some(existing.id.clone());
        }
        let resolves = nth_occurrence(&self.text.plain_text(node), selection_text, match_index)
            .is_some();
        if !resolves {
            self.notify(Notice::warning("Selection not found in message"));
            return None;
        }

        let annotation = ThreadAnnotation::draft(anchor.clone(), selection_text, match_index);
        let thread_id = annotation.id.clone();
        let node = self.conversation.tree.get_mut(anchor)?;
        node.thread_annotations.push(annotation);
        self.index.insert(thread_id.clone(), anchor.clone());
        info!(thread = %thread_id, anchor = %anchor, match_index, "thread created");

        self.persist();
        Some(thread_id)
    }

    /// Like [`create_annotation`](Self::create_annotation), but picks the
    /// occurrence closest to a byte offset reported by the UI.
    pub fn create_from_selection(
        &mut self,
        anchor: &NodeId,
        selection_text: &str,
        approximate_offset: usize,
    ) -> Option<ThreadId> {
        let match_index = match self.conversation.tree.get(anchor) {
            Some(node) => resolve_occurrence(
                &self.text.plain_text(node),
                selection_text,
                approximate_offset,
            ),
            None => 0,
        };
        self.create_annotation(anchor, selection_text, match_index)
    }

    pub fn find_thread(&self, thread_id: &ThreadId) -> Option<ThreadRef<'_>> {
        let anchor = self.index.get(thread_id)?;
        let node = self.conversation.tree.get(anchor)?;
        node.annotation(thread_id).map(|annotation| ThreadRef {
            anchor_message_id: &node.id,
            annotation,
        })
    }

    /// Thread messages oldest first. Drafts yield an empty chain.
    pub fn collect_thread_chain(&self, annotation: &ThreadAnnotation) -> Vec<&MessageNode> {
        let (Some(root), Some(last)) = (&annotation.root_message_id, &annotation.last_message_id)
        else {
            return Vec::new();
        };

        let mut chain = Vec::new();
        let mut reached_root = false;
        for node in self.conversation.tree.ancestors(last) {
            if node.id == annotation.anchor_message_id {
                break;
            }
            chain.push(node);
            if &node.id == root {
                reached_root = true;
                break;
            }
        }
        if !reached_root {
            warn!(thread = %annotation.id, "thread chain does not reach its root message");
        }
        chain.reverse();
        chain
    }

    /// Threads anchored to a message, in creation order.
    pub fn threads_for(&self, anchor: &NodeId) -> &[ThreadAnnotation] {
        self.conversation
            .tree
            .get(anchor)
            .map_or(&[], |node| node.thread_annotations.as_slice())
    }

    pub fn thread_count(&self, anchor: &NodeId) -> usize {
        self.threads_for(anchor).len()
    }

    pub fn thread_ids(&self) -> impl Iterator<Item = &ThreadId> {
        self.index.keys()
    }

    /// Every thread in the conversation, oldest first.
    pub fn threads(&self) -> Vec<ThreadRef<'_>> {
        let mut threads: Vec<_> = self
            .conversation
            .tree
            .nodes()
            .flat_map(|node| {
                node.thread_annotations.iter().map(|annotation| ThreadRef {
                    anchor_message_id: &node.id,
                    annotation,
                })
            })
            .collect();
        threads.sort_by(|a, b| {
            a.annotation
                .created_at
                .cmp(&b.annotation.created_at)
                .then_with(|| a.annotation.id.cmp(&b.annotation.id))
        });
        threads
    }

    // ========================================================================
    // Thread lifecycle
    // ========================================================================

    /// Makes `thread_id` the active thread and renders its chain.
    pub fn enter_thread(
        &mut self,
        session: &mut ThreadSession,
        thread_id: &ThreadId,
        renderer: &mut dyn Renderer,
    ) -> bool {
        if self.find_thread(thread_id).is_none() {
            self.notify(Notice::warning("Thread not found"));
            return false;
        }
        if session
            .active_thread
            .as_ref()
            .is_some_and(|active| active != thread_id)
        {
            self.exit_thread(session);
        }
        session.active_thread = Some(thread_id.clone());
        debug!(thread = %thread_id, "entered thread");

        if let Some(view) = self.thread_view(thread_id) {
            renderer.render(&view);
        }
        true
    }

    /// Leaves the active thread. A draft left behind is discarded unless
    /// cleanup is disabled in the config.
    pub fn exit_thread(&mut self, session: &mut ThreadSession) {
        let cleanup = self.settings.cleanup_drafts_on_exit;
        self.exit_thread_with(session, cleanup);
    }

    fn exit_thread_with(&mut self, session: &mut ThreadSession, cleanup: bool) {
        let Some(thread_id) = session.active_thread.take() else {
            return;
        };
        debug!(thread = %thread_id, cleanup, "exited thread");
        if !cleanup {
            return;
        }

        let is_draft = self
            .find_thread(&thread_id)
            .is_some_and(|thread| thread.annotation.is_draft());
        if is_draft && self.remove_annotation(&thread_id).is_some() {
            info!(thread = %thread_id, "discarded draft thread");
            self.persist();
        }
    }

    /// Appends a message to a thread and returns its id.
    ///
    /// The first message turns a draft into a real thread. The main
    /// conversation's current node is left where it was.
    pub fn send_in_thread(
        &mut self,
        thread_id: &ThreadId,
        role: Role,
        content: impl Into<String>,
    ) -> Option<NodeId> {
        let Some(thread) = self.find_thread(thread_id) else {
            self.notify(Notice::warning("Thread not found"));
            return None;
        };
        let anchor = thread.anchor_message_id.clone();
        let parent = match &thread.annotation.last_message_id {
            Some(last) if self.conversation.tree.contains(last) => last.clone(),
            Some(last) => {
                warn!(thread = %thread_id, last = %last, "thread tail is missing; appending to anchor");
                anchor
            }
            None => anchor,
        };

        let tree = &mut self.conversation.tree;
        let previous_current = tree.current_node().cloned();
        let id = tree.insert(role, content, Some(&parent)).id.clone();
        tree.set_current_node(previous_current);

        if let Some(annotation) = self.annotation_mut(thread_id) {
            if annotation.root_message_id.is_none() {
                annotation.root_message_id = Some(id.clone());
            }
            annotation.last_message_id = Some(id.clone());
        }
        debug!(thread = %thread_id, message = %id, "thread message sent");

        self.persist();
        Some(id)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Deletes a thread with all of its messages.
    pub fn delete_thread(&mut self, session: &mut ThreadSession, thread_id: &ThreadId) -> bool {
        if !self.delete_thread_inner(session, thread_id) {
            self.notify(Notice::warning("Thread not found"));
            return false;
        }
        info!(thread = %thread_id, "thread deleted");
        self.persist();
        true
    }

    /// Deletes a message. Threads anchored to it go first; threads whose
    /// bounds referenced it are repaired.
    pub fn delete_message(&mut self, session: &mut ThreadSession, id: &NodeId) -> bool {
        if !self.conversation.tree.contains(id) {
            self.notify(Notice::warning("Message not found"));
            return false;
        }
        self.delete_message_inner(session, id);
        info!(message = %id, "message deleted");
        self.persist();
        true
    }

    fn delete_thread_inner(&mut self, session: &mut ThreadSession, thread_id: &ThreadId) -> bool {
        let Some(thread) = self.find_thread(thread_id) else {
            return false;
        };
        let chain: Vec<NodeId> = self
            .collect_thread_chain(thread.annotation)
            .into_iter()
            .map(|node| node.id.clone())
            .collect();

        // Tail first, so each deletion removes a leaf of the thread.
        for id in chain.iter().rev() {
            self.delete_message_inner(session, id);
        }
        self.remove_annotation(thread_id);

        if session.is_active(thread_id) {
            self.exit_thread_with(session, false);
        }
        true
    }

    fn delete_message_inner(&mut self, session: &mut ThreadSession, id: &NodeId) {
        let anchored: Vec<ThreadId> = self
            .threads_for(id)
            .iter()
            .map(|annotation| annotation.id.clone())
            .collect();
        for thread_id in &anchored {
            self.delete_thread_inner(session, thread_id);
        }

        let Some(node) = self.conversation.tree.get(id) else {
            return;
        };
        let parent = node.parent_id.clone();
        let children = node.children.clone();
        if self.conversation.tree.delete_by_id(id) {
            self.repair_thread_bounds(id, parent.as_ref(), &children);
        }
    }

    /// Fixes annotations whose root or last message was `deleted`.
    ///
    /// Called after the tree has already reparented `children` to `parent`.
    fn repair_thread_bounds(
        &mut self,
        deleted: &NodeId,
        parent: Option<&NodeId>,
        children: &[NodeId],
    ) {
        let mut fixes = Vec::new();
        for node in self.conversation.tree.nodes() {
            for annotation in &node.thread_annotations {
                let root_hit = annotation.root_message_id.as_ref() == Some(deleted);
                let last_hit = annotation.last_message_id.as_ref() == Some(deleted);

                let bounds = if root_hit && last_hit {
                    None
                } else if last_hit {
                    parent
                        .filter(|p| **p != annotation.anchor_message_id)
                        .map(|p| (annotation.root_message_id.clone(), p.clone()))
                } else if root_hit {
                    annotation.last_message_id.as_ref().and_then(|last| {
                        self.conversation
                            .tree
                            .ancestors(last)
                            .find(|n| children.contains(&n.id))
                            .map(|next| (Some(next.id.clone()), last.clone()))
                    })
                } else {
                    continue;
                };
                fixes.push((annotation.id.clone(), bounds));
            }
        }

        for (thread_id, bounds) in fixes {
            let Some(annotation) = self.annotation_mut(&thread_id) else {
                continue;
            };
            match bounds {
                Some((root, last)) => {
                    annotation.root_message_id = root;
                    annotation.last_message_id = Some(last);
                }
                None => {
                    annotation.root_message_id = None;
                    annotation.last_message_id = None;
                }
            }
            debug!(thread = %thread_id, deleted = %deleted, "repaired thread bounds");
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn rebuild_index(&mut self) {
        self.index = self
            .conversation
            .tree
            .nodes()
            .flat_map(|node| {
                node.thread_annotations
                    .iter()
                    .map(|annotation| (annotation.id.clone(), node.id.clone()))
            })
            .collect();
    }

    /// True when `id` sits inside some thread's subtree.
    fn is_thread_message(&self, id: &NodeId) -> bool {
        let tree = &self.conversation.tree;
        let thread_roots: HashSet<&NodeId> = self
            .index
            .iter()
            .filter_map(|(thread_id, anchor)| {
                tree.get(anchor)?
                    .annotation(thread_id)?
                    .root_message_id
                    .as_ref()
            })
            .collect();
        if thread_roots.is_empty() {
            return false;
        }
        tree.ancestors(id).any(|node| thread_roots.contains(&node.id))
    }

    fn annotation_mut(&mut self, thread_id: &ThreadId) -> Option<&mut ThreadAnnotation> {
        let anchor = self.index.get(thread_id)?;
        self.conversation
            .tree
            .get_mut(anchor)?
            .thread_annotations
            .iter_mut()
            .find(|annotation| &annotation.id == thread_id)
    }

    fn remove_annotation(&mut self, thread_id: &ThreadId) -> Option<ThreadAnnotation> {
        let anchor = self.index.remove(thread_id)?;
        let node = self.conversation.tree.get_mut(&anchor)?;
        let position = node
            .thread_annotations
            .iter()
            .position(|annotation| &annotation.id == thread_id)?;
        Some(node.thread_annotations.remove(position))
    }

    fn thread_view(&self, thread_id: &ThreadId) -> Option<ChainView<'_>> {
        let thread = self.find_thread(thread_id)?;
        let nodes = self
            .collect_thread_chain(thread.annotation)
            .into_iter()
            .map(|node| self.rendered_node(node))
            .collect();
        Some(ChainView {
            thread: Some(thread.annotation),
            nodes,
        })
    }

    fn rendered_node<'a>(&self, node: &'a MessageNode) -> RenderedNode<'a> {
        let text = self.text.plain_text(node).into_owned();
        let highlights = build_ranges(&text, &node.thread_annotations);
        RenderedNode {
            node,
            text,
            highlights,
            thread_count: node.thread_annotations.len(),
        }
    }

    fn persist(&self) {
        if !self.settings.autosave {
            return;
        }
        if let Err(e) = self.save() {
            warn!("autosave failed: {e:#}");
            self.notify(Notice::error(format!("Failed to save conversation: {e:#}")));
        }
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }
}
