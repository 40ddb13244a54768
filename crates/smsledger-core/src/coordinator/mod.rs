//! Ingestion coordinator.
//!
//! Receives raw events from the bulk listing and the live stream through one
//! [`CoordinatorHandle`], deduplicates them against the message store,
//! classifies new ones, and commits each logical message exactly once.
//!
//! # Lifecycle
//!
//! The coordinator starts [`Uninitialized`](CoordinatorState::Uninitialized):
//! the store is still opening, so every event is buffered in a
//! [`PendingQueue`](crate::PendingQueue) and the caller returns immediately.
//! [`CoordinatorHandle::attach_store`] is the ready signal; buffered events
//! are drained FIFO (`Draining`) and the coordinator settles in `Ready`.
//!
//! # Message Flow
//!
//! ```text
//! backfill ─┐                          ┌─> PendingQueue (store not ready)
//!           ├─> CoordinatorHandle ─> task
//! live ─────┘                          └─> lookup ─> classify ─> upsert ─> subscribers
//! ```
//!
//! All processing happens on a single task, so at most one message is ever
//! between its dedup lookup and its commit.

mod handle;
mod pipeline;
mod state;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::classifier::ClassifierClient;
use crate::{Error, Result};

use handle::Command;
use pipeline::Pipeline;

pub use handle::CoordinatorHandle;
pub use state::CoordinatorState;

/// Coordinator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Consecutive storage failures tolerated before stopping. `0` never stops.
    pub max_consecutive_store_failures: u32,
    /// Buffer size of the committed-record broadcast channel.
    pub subscriber_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_consecutive_store_failures: 5,
            subscriber_capacity: 256,
        }
    }
}

/// A running ingestion coordinator task.
#[derive(Debug)]
pub struct IngestionCoordinator {
    handle: CoordinatorHandle,
    task: JoinHandle<Result<()>>,
}

impl IngestionCoordinator {
    /// Spawn the coordinator on the current tokio runtime.
    #[must_use]
    pub fn spawn(classifier: ClassifierClient, config: CoordinatorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CoordinatorState::Uninitialized);
        let (committed, _) = broadcast::channel(config.subscriber_capacity.max(1));

        let pipeline = Pipeline::new(config, classifier, state_tx, committed.clone());
        let task = tokio::spawn(run(pipeline, rx));

        Self {
            handle: CoordinatorHandle::new(tx, state_rx, committed),
            task,
        }
    }

    /// A new handle to this coordinator.
    #[must_use]
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Stop after the queued commands and wait for the task.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the coordinator, if any.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown();
        self.join().await
    }

    /// Wait for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if storage kept failing, or
    /// [`Error::CoordinatorStopped`] if the task panicked.
    pub async fn join(self) -> Result<()> {
        self.task.await.map_err(|_| Error::CoordinatorStopped)?
    }
}

async fn run(mut pipeline: Pipeline, mut rx: mpsc::UnboundedReceiver<Command>) -> Result<()> {
    info!("Ingestion coordinator started");

    let result = loop {
        let Some(command) = rx.recv().await else {
            info!("Ingestion coordinator shutting down (channel closed)");
            break Ok(());
        };

        match command {
            Command::Event { feed, event } => {
                if let Err(e) = pipeline.accept(feed, event).await {
                    break Err(e);
                }
            }
            Command::AttachStore(store) => {
                if let Err(e) = pipeline.attach_store(store).await {
                    break Err(e);
                }
            }
            Command::SetClassification {
                id,
                classification,
                reply,
            } => {
                let _ = reply.send(pipeline.set_classification(&id, classification).await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(pipeline.snapshot());
            }
            Command::Shutdown => {
                info!("Ingestion coordinator shutting down");
                break Ok(());
            }
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Ingestion coordinator stopped");
    }
    pipeline.stop();
    result
}
