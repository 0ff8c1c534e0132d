//! Thread command handlers.

use anyhow::{Context, Result, bail};
use marginalia_core::config::Config;
use marginalia_core::core::annotations::ThreadSession;
use marginalia_core::core::model::Role;

use super::{finish, open_engine, renderer, resolve_message, resolve_thread};

pub fn list(conversation: &str, config: &Config) -> Result<()> {
    let engine = open_engine(conversation, config)?;
    let threads = engine.threads();
    if threads.is_empty() {
        println!("No threads found.");
        return Ok(());
    }
    for thread in threads {
        let annotation = thread.annotation;
        let status = match engine.collect_thread_chain(annotation).len() {
            _ if annotation.is_draft() => "draft".to_string(),
            1 => "1 message".to_string(),
            n => format!("{n} messages"),
        };
        println!(
            "{}  on {}  \"{}\" (occurrence {})  {}",
            annotation.id,
            thread.anchor_message_id.short(),
            annotation.selection_text,
            annotation.match_index + 1,
            status
        );
    }
    Ok(())
}

pub struct CreateOptions<'a> {
    pub conversation: &'a str,
    pub anchor: &'a str,
    pub selection: &'a str,
    pub offset: usize,
    pub message: Option<&'a str>,
    pub config: &'a Config,
}

/// Enters a thread on the selection, optionally sends the first message, then
/// exits. A thread left without messages is cleaned up as a draft.
pub fn create(options: CreateOptions<'_>) -> Result<()> {
    let CreateOptions {
        conversation,
        anchor,
        selection,
        offset,
        message,
        config,
    } = options;

    let mut engine = open_engine(conversation, config)?;
    let anchor = resolve_message(&engine, anchor)?;
    let Some(thread_id) = engine.create_from_selection(&anchor, selection, offset) else {
        bail!("Could not start a thread on message '{anchor}'");
    };

    let mut session = ThreadSession::new();
    let mut view = renderer(config);
    engine.enter_thread(&mut session, &thread_id, &mut view);
    if let Some(text) = message {
        engine
            .send_in_thread(&thread_id, Role::User, text)
            .with_context(|| format!("send first message in thread '{thread_id}'"))?;
    }
    engine.exit_thread(&mut session);
    finish(&engine, config)?;

    if engine.find_thread(&thread_id).is_some() {
        println!("{thread_id}");
    } else {
        println!("Draft thread discarded (no message sent).");
    }
    Ok(())
}

pub fn reply(
    conversation: &str,
    thread: &str,
    text: &str,
    role: &str,
    config: &Config,
) -> Result<()> {
    let role: Role = role.parse()?;
    let mut engine = open_engine(conversation, config)?;
    let thread_id = resolve_thread(&engine, thread)?;

    let id = engine
        .send_in_thread(&thread_id, role, text)
        .with_context(|| format!("reply in thread '{thread_id}'"))?;
    finish(&engine, config)?;
    println!("{id}");
    Ok(())
}

pub fn show(conversation: &str, thread: &str, config: &Config) -> Result<()> {
    let mut engine = open_engine(conversation, config)?;
    let thread_id = resolve_thread(&engine, thread)?;

    let mut session = ThreadSession::new();
    let mut view = renderer(config);
    if !engine.enter_thread(&mut session, &thread_id, &mut view) {
        bail!("Thread '{thread_id}' could not be opened");
    }
    println!("{}", view.into_output());
    engine.exit_thread(&mut session);
    finish(&engine, config)
}

pub fn delete(conversation: &str, thread: &str, config: &Config) -> Result<()> {
    let mut engine = open_engine(conversation, config)?;
    let thread_id = resolve_thread(&engine, thread)?;

    let mut session = ThreadSession::new();
    if !engine.delete_thread(&mut session, &thread_id) {
        bail!("Thread '{thread_id}' could not be deleted");
    }
    finish(&engine, config)?;
    println!("Deleted thread {thread_id}");
    Ok(())
}
