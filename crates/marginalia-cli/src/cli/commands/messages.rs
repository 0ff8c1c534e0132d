//! Message command handlers.

use anyhow::{Result, bail};
use marginalia_core::config::Config;
use marginalia_core::core::annotations::ThreadSession;
use marginalia_core::core::model::Role;

use super::{finish, open_engine, resolve_message};

pub fn add(
    conversation: &str,
    text: &str,
    role: &str,
    parent: Option<&str>,
    config: &Config,
) -> Result<()> {
    let role: Role = role.parse()?;
    let mut engine = open_engine(conversation, config)?;
    let parent = parent
        .map(|input| resolve_message(&engine, input))
        .transpose()?;

    let Some(id) = engine.append_message(role, text, parent.as_ref()) else {
        bail!("Message could not be added to conversation '{conversation}'");
    };
    finish(&engine, config)?;
    println!("{id}");
    Ok(())
}

pub fn delete(conversation: &str, message: &str, config: &Config) -> Result<()> {
    let mut engine = open_engine(conversation, config)?;
    let id = resolve_message(&engine, message)?;

    let mut session = ThreadSession::new();
    if !engine.delete_message(&mut session, &id) {
        bail!("Message '{id}' could not be deleted");
    }
    finish(&engine, config)?;
    println!("Deleted message {id}");
    Ok(())
}

pub fn checkout(conversation: &str, message: &str, config: &Config) -> Result<()> {
    let mut engine = open_engine(conversation, config)?;
    let id = resolve_message(&engine, message)?;

    if !engine.checkout(&id) {
        bail!("Message '{id}' could not be checked out");
    }
    finish(&engine, config)?;
    println!("Checked out {id}");
    Ok(())
}
