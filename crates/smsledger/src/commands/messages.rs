//! Store-backed inspection and override commands.

use anyhow::{Context, Result};
use smsledger_core::{Classification, MessageId, MessageStore, view};

use super::open_store;
use crate::format::{format_group, format_message};
use crate::settings::Settings;

/// Print the sender view, optionally narrowed to one verdict and a search query.
pub async fn cmd_list(
    settings: &Settings,
    classification: Option<Classification>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let store = open_store(settings).await?;
    let messages = match classification {
        Some(classification) => store.list_by_classification(classification).await?,
        None => store.list_all().await?,
    };
    store.close().await;

    let mut groups = view::build(messages);
    if let Some(query) = search {
        groups = view::filter(groups, query);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for group in &groups {
        println!("{}", format_group(group));
    }
    Ok(())
}

/// Print one conversation, oldest first.
pub async fn cmd_show(settings: &Settings, address: &str, mark_read: bool) -> Result<()> {
    let store = open_store(settings).await?;
    let messages = store.list_by_address(address).await?;

    if messages.is_empty() {
        store.close().await;
        println!("No messages from {address}.");
        return Ok(());
    }

    for message in messages.iter().rev() {
        println!("{}", format_message(message));
    }

    if mark_read {
        for message in messages.iter().filter(|m| !m.read) {
            store.set_read(&message.id, true).await?;
        }
    }
    store.close().await;
    Ok(())
}

/// Manually override a stored verdict.
pub async fn cmd_reclassify(
    settings: &Settings,
    id: &str,
    classification: Classification,
) -> Result<()> {
    let store = open_store(settings).await?;
    let id = MessageId::from(id);

    store
        .update_classification(&id, classification)
        .await
        .with_context(|| format!("Failed to reclassify {id}"))?;
    let updated = store.get_by_id(&id).await?;
    store.close().await;

    if let Some(message) = updated {
        tracing::info!(message_id = %id, %classification, "Classification overridden");
        println!("{}", format_message(&message));
    }
    Ok(())
}
