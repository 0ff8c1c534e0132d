//! CLI command handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use marginalia_core::config::Config;
use marginalia_core::core::annotations::ThreadAnnotationEngine;
use marginalia_core::core::conversation::Conversation;
use marginalia_core::core::model::{NodeId, ThreadId};
use marginalia_core::core::notify::{Notice, NoticeLevel, Notifier};
use marginalia_core::core::persistence::{JsonFileStore, PersistenceStore};
use marginalia_core::core::render::MarkupRenderer;
use marginalia_core::core::text::MarkdownTextAccessor;

pub mod config;
pub mod conversations;
pub mod messages;
pub mod threads;

/// Prints engine notices to stderr so they never mix with command output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        let label = match notice.level {
            NoticeLevel::Info => "note",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("{label}: {notice}");
    }
}

fn store() -> Arc<dyn PersistenceStore> {
    Arc::new(JsonFileStore::default_location())
}

/// Accepts a full id or an unambiguous prefix of one (e.g. the short ids the
/// CLI prints).
fn resolve_prefix<'a>(
    kind: &str,
    input: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Result<String> {
    if input.is_empty() {
        bail!("{kind} id must not be empty");
    }
    let matches: Vec<&str> = candidates
        .into_iter()
        .filter(|candidate| candidate.starts_with(input))
        .collect();
    if matches.contains(&input) {
        return Ok(input.to_string());
    }
    match matches.as_slice() {
        [] => bail!("{kind} '{input}' not found"),
        [only] => Ok((*only).to_string()),
        _ => bail!("{kind} id '{input}' is ambiguous ({} matches)", matches.len()),
    }
}

fn resolve_conversation(store: &dyn PersistenceStore, input: &str) -> Result<String> {
    let summaries = store.list().context("list conversations")?;
    resolve_prefix(
        "Conversation",
        input,
        summaries.iter().map(|summary| summary.id.as_str()),
    )
}

fn resolve_message(engine: &ThreadAnnotationEngine, input: &str) -> Result<NodeId> {
    resolve_prefix(
        "Message",
        input,
        engine.tree().nodes().map(|node| node.id.as_str()),
    )
    .map(NodeId::from)
}

fn resolve_thread(engine: &ThreadAnnotationEngine, input: &str) -> Result<ThreadId> {
    resolve_prefix("Thread", input, engine.thread_ids().map(ThreadId::as_str)).map(ThreadId::from)
}

fn configure(
    conversation: Conversation,
    store: Arc<dyn PersistenceStore>,
    config: &Config,
) -> ThreadAnnotationEngine {
    ThreadAnnotationEngine::new(conversation, store)
        .with_notifier(Arc::new(StderrNotifier))
        .with_text_accessor(Arc::new(MarkdownTextAccessor))
        .with_config(config)
}

fn open_engine(input: &str, config: &Config) -> Result<ThreadAnnotationEngine> {
    let store = store();
    let id = resolve_conversation(store.as_ref(), input)?;
    let snapshot = store
        .load(&id)
        .with_context(|| format!("load conversation '{id}'"))?;
    tracing::debug!(conversation = %id, "opened conversation");
    Ok(configure(Conversation::from_snapshot(snapshot), store, config))
}

/// Saves once at the end of a command when per-mutation saves are off.
fn finish(engine: &ThreadAnnotationEngine, config: &Config) -> Result<()> {
    if config.autosave {
        return Ok(());
    }
    engine.save()
}

fn renderer(config: &Config) -> MarkupRenderer {
    MarkupRenderer::new(
        config.highlight.open_marker.as_str(),
        config.highlight.close_marker.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefix_prefers_exact_match() {
        let ids = ["abc", "abcdef", "xyz"];

        assert_eq!(resolve_prefix("Thread", "abc", ids).unwrap(), "abc");
        assert_eq!(resolve_prefix("Thread", "abcd", ids).unwrap(), "abcdef");
        assert_eq!(resolve_prefix("Thread", "x", ids).unwrap(), "xyz");
    }

    #[test]
    fn test_resolve_prefix_reports_missing_and_ambiguous() {
        let ids = ["abc1", "abc2"];

        let missing = resolve_prefix("Thread", "zzz", ids).unwrap_err();
        assert!(missing.to_string().contains("not found"));
        let ambiguous = resolve_prefix("Thread", "abc", ids).unwrap_err();
        assert!(ambiguous.to_string().contains("ambiguous"));
        assert!(resolve_prefix("Thread", "", ids).is_err());
    }
}
