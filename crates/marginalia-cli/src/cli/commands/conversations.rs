//! Conversation command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use marginalia_core::config::Config;
use marginalia_core::core::conversation::{Conversation, short_conversation_id};
use marginalia_core::core::switcher::ConversationSwitcher;

use super::{configure, renderer, resolve_conversation, store};

pub fn list() -> Result<()> {
    let summaries = store().list().context("list conversations")?;
    if summaries.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }
    for summary in summaries {
        let title = summary
            .title
            .clone()
            .unwrap_or_else(|| short_conversation_id(&summary.id));
        let updated = summary.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "{}  {}  {}  {} messages, {} threads",
            title, summary.id, updated, summary.message_count, summary.thread_count
        );
    }
    Ok(())
}

pub fn new(title: Option<String>) -> Result<()> {
    let conversation = Conversation::new(title);
    store()
        .save(&conversation.snapshot())
        .context("save new conversation")?;
    println!("{}", conversation.id);
    Ok(())
}

pub async fn show(input: &str, config: &Config) -> Result<()> {
    let store = store();
    let id = resolve_conversation(store.as_ref(), input)?;

    let switcher = ConversationSwitcher::new(Arc::clone(&store));
    let conversation = switcher
        .switch_to(&id)
        .await?
        .with_context(|| format!("load of conversation '{id}' was superseded"))?;

    println!("# {}", conversation.display_title());
    let engine = configure(conversation, store, config);
    let mut view = renderer(config);
    engine.render_main(&mut view);
    if view.lines().is_empty() {
        println!("Conversation is empty.");
    } else {
        println!("{}", view.into_output());
    }
    Ok(())
}
