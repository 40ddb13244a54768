//! Event sources feeding the coordinator.
//!
//! A source offers two feeds: a one-shot listing of the existing inbox and a
//! live stream of newly received messages. [`start_ingestion`] wires both
//! into a [`CoordinatorHandle`].

mod channel;
mod json;

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::message::{Feed, RawEvent};
use crate::Result;

pub use channel::ChannelSource;
pub use json::JsonSource;

/// Default number of inbox messages taken from the bulk listing.
pub const DEFAULT_BACKFILL_MAX_COUNT: usize = 50;

/// A provider of raw SMS events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// List up to `max_count` inbox messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] if the inbox cannot be read.
    async fn list(&self, max_count: usize) -> Result<Vec<RawEvent>>;

    /// Start delivering newly received messages.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] if the stream cannot be opened.
    async fn subscribe(&self) -> Result<LiveFeed>;
}

/// An open live stream.
#[derive(Debug)]
pub struct LiveFeed {
    /// Events in delivery order. Closes once unsubscribed.
    pub events: mpsc::UnboundedReceiver<RawEvent>,
    /// Teardown capability for the stream.
    pub subscription: Subscription,
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Unsubscribe capability returned by a live stream.
///
/// Dropping it unsubscribes as well.
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    /// Wrap the action that tears the stream down.
    #[must_use]
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Stop the live stream. Idempotent.
    pub fn unsubscribe(&self) {
        let teardown = self
            .teardown
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Both feeds of a source, connected to a coordinator.
#[derive(Debug)]
pub struct IngestionSession {
    subscription: Subscription,
    forwarder: Option<JoinHandle<()>>,
    backfilled: usize,
}

impl IngestionSession {
    /// Number of events submitted from the bulk listing.
    #[must_use]
    pub const fn backfilled(&self) -> usize {
        self.backfilled
    }

    /// Wait until the live stream ends on its own (or the coordinator stops).
    pub async fn closed(&mut self) {
        if let Some(forwarder) = self.forwarder.as_mut() {
            let _ = forwarder.await;
            self.forwarder = None;
        }
    }

    /// Stop the live stream and wait for the forwarder to finish.
    pub async fn unsubscribe(mut self) {
        self.subscription.unsubscribe();
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
    }
}

/// Connect a source's live stream and bulk listing to the coordinator.
///
/// The live stream is opened first so nothing delivered while the listing is
/// read is lost; messages seen on both feeds collapse through dedup. The
/// listing is submitted oldest first.
///
/// # Errors
///
/// Returns [`crate::Error::SourceUnavailable`] if either feed cannot be
/// opened; the coordinator's state is unaffected and the call may be retried.
pub async fn start_ingestion(
    source: &dyn EventSource,
    coordinator: &CoordinatorHandle,
    max_count: usize,
) -> Result<IngestionSession> {
    let LiveFeed {
        mut events,
        subscription,
    } = source.subscribe().await?;

    let live = coordinator.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if live.submit(Feed::Live, event).is_err() {
                warn!("Coordinator stopped, dropping live feed");
                return;
            }
        }
        debug!("Live feed closed");
    });

    let mut listing = match source.list(max_count).await {
        Ok(listing) => listing,
        Err(e) => {
            subscription.unsubscribe();
            forwarder.abort();
            return Err(e);
        }
    };
    listing.truncate(max_count);

    let backfilled = listing.len();
    for event in listing.into_iter().rev() {
        coordinator.submit(Feed::Backfill, event)?;
    }
    info!(backfilled, "Ingestion started");

    Ok(IngestionSession {
        subscription,
        forwarder: Some(forwarder),
        backfilled,
    })
}
