//! Background conversation loading.
//!
//! Loads run on the blocking pool. When the user switches again before a load
//! finishes, the earlier result is dropped instead of overwriting the newer one.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::conversation::Conversation;
use super::generation::Generation;
use super::persistence::PersistenceStore;

pub struct ConversationSwitcher {
    store: Arc<dyn PersistenceStore>,
    generation: Generation,
}

impl ConversationSwitcher {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            store,
            generation: Generation::new(),
        }
    }

    /// Loads `conversation_id` off the async runtime.
    ///
    /// Returns `Ok(None)` when a later switch started while this one was in
    /// flight.
    pub async fn switch_to(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let token = self.generation.begin();
        let store = Arc::clone(&self.store);
        let id = conversation_id.to_string();

        let snapshot = tokio::task::spawn_blocking(move || store.load(&id))
            .await
            .context("Conversation load task failed")??;

        let loaded = self
            .generation
            .apply_if_current(token, || Conversation::from_snapshot(snapshot));
        if loaded.is_none() {
            debug!(conversation = conversation_id, "discarding superseded load");
        }
        Ok(loaded)
    }

    /// Makes every in-flight load stale.
    pub fn cancel_pending(&self) {
        self.generation.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::model::Role;
    use crate::core::persistence::{ConversationSnapshot, ConversationSummary, MemoryStore};

    /// Delays loads of "slow-*" ids so a later switch can overtake them.
    struct SlowStore {
        inner: MemoryStore,
    }

    impl PersistenceStore for SlowStore {
        fn save(&self, snapshot: &ConversationSnapshot) -> Result<()> {
            self.inner.save(snapshot)
        }

        fn load(&self, conversation_id: &str) -> Result<ConversationSnapshot> {
            if conversation_id.starts_with("slow-") {
                std::thread::sleep(Duration::from_millis(150));
            }
            self.inner.load(conversation_id)
        }

        fn list(&self) -> Result<Vec<ConversationSummary>> {
            self.inner.list()
        }

        fn delete(&self, conversation_id: &str) -> Result<bool> {
            self.inner.delete(conversation_id)
        }
    }

    fn stored(store: &SlowStore, id: &str) {
        let mut conversation = Conversation::new(Some(id.to_string()));
        conversation.id = id.to_string();
        conversation.tree.insert(Role::User, "hello", None);
        store.save(&conversation.snapshot()).unwrap();
    }

    fn switcher() -> ConversationSwitcher {
        let store = SlowStore {
            inner: MemoryStore::new(),
        };
        stored(&store, "slow-one");
        stored(&store, "fast-two");
        ConversationSwitcher::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_switch_loads_conversation() {
        let switcher = switcher();

        let conversation = switcher.switch_to("fast-two").await.unwrap().unwrap();

        assert_eq!(conversation.id, "fast-two");
        assert_eq!(conversation.tree.len(), 1);
    }

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let switcher = switcher();

        let (first, second) = tokio::join!(
            switcher.switch_to("slow-one"),
            switcher.switch_to("fast-two")
        );

        assert!(first.unwrap().is_none());
        assert_eq!(second.unwrap().unwrap().id, "fast-two");
    }

    #[tokio::test]
    async fn test_cancel_pending_drops_result() {
        let switcher = switcher();

        let (loaded, ()) = tokio::join!(switcher.switch_to("slow-one"), async {
            tokio::task::yield_now().await;
            switcher.cancel_pending();
        });

        assert!(loaded.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_conversation_is_an_error() {
        let switcher = switcher();

        let err = switcher.switch_to("nope").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
