//! Handle for talking to the coordinator task.
//!
//! The handle is cheap to clone and is the single intake path for both feeds.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::state::CoordinatorState;
use crate::message::{Classification, Feed, Message, MessageId, RawEvent};
use crate::store::MessageStore;
use crate::{Error, Result};

/// Requests processed by the coordinator task, in arrival order.
pub(crate) enum Command {
    Event {
        feed: Feed,
        event: RawEvent,
    },
    AttachStore(Arc<dyn MessageStore>),
    SetClassification {
        id: MessageId,
        classification: Classification,
        reply: oneshot::Sender<Result<Message>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Message>>,
    },
    Shutdown,
}

/// Handle to the ingestion coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CoordinatorState>,
    committed: broadcast::Sender<Message>,
}

impl CoordinatorHandle {
    pub(crate) const fn new(
        tx: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<CoordinatorState>,
        committed: broadcast::Sender<Message>,
    ) -> Self {
        Self {
            tx,
            state,
            committed,
        }
    }

    /// Hand a raw event to the coordinator. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorStopped`] if the coordinator has shut down.
    pub fn submit(&self, feed: Feed, event: RawEvent) -> Result<()> {
        self.send(Command::Event { feed, event })
    }

    /// Signal that the message store is open.
    ///
    /// Events submitted before this call are drained first, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorStopped`] if the coordinator has shut down.
    pub fn attach_store(&self, store: Arc<dyn MessageStore>) -> Result<()> {
        self.send(Command::AttachStore(store))
    }

    /// Manually reclassify a stored message, bypassing the classifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no message has this id,
    /// [`Error::StoreNotReady`] before the store is attached, or a storage error.
    pub async fn set_classification(
        &self,
        id: &MessageId,
        classification: Classification,
    ) -> Result<Message> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetClassification {
            id: id.clone(),
            classification,
            reply,
        })?;
        rx.await.map_err(|_| Error::CoordinatorStopped)?
    }

    /// Messages committed or merged so far, newest first.
    ///
    /// Answered after every previously submitted command has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorStopped`] if the coordinator has shut down.
    pub async fn snapshot(&self) -> Result<Vec<Message>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| Error::CoordinatorStopped)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Wait until the coordinator reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorStopped`] if the coordinator stops first.
    pub async fn wait_for(&self, target: CoordinatorState) -> Result<()> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| *s == target || *s == CoordinatorState::Stopped)
            .await
            .map_err(|_| Error::CoordinatorStopped)?;

        if *reached == target {
            Ok(())
        } else {
            Err(Error::CoordinatorStopped)
        }
    }

    /// Receive every record committed from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.committed.subscribe()
    }

    /// Ask the coordinator to stop after the commands already queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::CoordinatorStopped)
    }
}
