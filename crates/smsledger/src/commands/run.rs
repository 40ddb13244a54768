//! `run`: ingest the inbox backfill and live messages from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use smsledger_core::{
    ClassifierClient, CoordinatorState, IngestionCoordinator, JsonSource, start_ingestion,
};
use tokio::io::BufReader;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{info, warn};

use super::open_store;
use crate::format::format_message;
use crate::settings::Settings;

/// Run the ingestion pipeline until stdin closes or Ctrl-C.
///
/// The store opens while both feeds are already being accepted; events that
/// arrive first are buffered by the coordinator.
pub async fn cmd_run(settings: &Settings, backfill: Option<PathBuf>) -> Result<()> {
    let classifier = ClassifierClient::http(&settings.classifier_config()?)
        .context("Failed to create classifier client")?;
    let coordinator = IngestionCoordinator::spawn(classifier, settings.coordinator_config());
    let handle = coordinator.handle();
    let mut committed = handle.subscribe();

    let source = JsonSource::new(backfill, BufReader::new(tokio::io::stdin()));
    let (store, session) = tokio::join!(
        open_store(settings),
        start_ingestion(&source, &handle, settings.backfill_max_count),
    );

    let store = match store {
        Ok(store) => store,
        Err(e) => {
            coordinator.shutdown().await.ok();
            return Err(e);
        }
    };
    handle.attach_store(Arc::new(store))?;
    let mut session = session.context("Failed to start ingestion")?;
    info!(
        backfilled = session.backfilled(),
        classifier = %settings.classifier_url,
        "Listening for messages on stdin"
    );

    let mut count = 0usize;
    loop {
        tokio::select! {
            record = committed.recv() => match record {
                Ok(message) => {
                    count += 1;
                    println!("{}", format_message(&message));
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Output fell behind"),
                Err(RecvError::Closed) => break,
            },
            () = session.closed() => {
                info!("Live feed ended");
                break;
            }
            _ = handle.wait_for(CoordinatorState::Stopped) => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    // Flush records committed before the loop ended.
    if handle.snapshot().await.is_ok() {
        loop {
            match committed.try_recv() {
                Ok(message) => {
                    count += 1;
                    println!("{}", format_message(&message));
                }
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Output fell behind"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    session.unsubscribe().await;
    coordinator
        .shutdown()
        .await
        .context("Ingestion stopped")?;

    info!(committed = count, "Done");
    Ok(())
}
