//! Per-message dedup, classify, and commit path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::CoordinatorConfig;
use super::state::CoordinatorState;
use crate::classifier::ClassifierClient;
use crate::message::{Classification, Feed, Message, MessageId, RawEvent};
use crate::queue::PendingQueue;
use crate::store::MessageStore;
use crate::{Error, Result};

/// Sequential state owned by the coordinator task.
///
/// Only one message is ever between lookup and commit, which keeps the
/// check-then-write dedup race-free.
pub(crate) struct Pipeline {
    config: CoordinatorConfig,
    classifier: ClassifierClient,
    store: Option<Arc<dyn MessageStore>>,
    queue: PendingQueue,
    working_set: HashMap<MessageId, Message>,
    consecutive_failures: u32,
    state: watch::Sender<CoordinatorState>,
    committed: broadcast::Sender<Message>,
}

impl Pipeline {
    pub(crate) fn new(
        config: CoordinatorConfig,
        classifier: ClassifierClient,
        state: watch::Sender<CoordinatorState>,
        committed: broadcast::Sender<Message>,
    ) -> Self {
        Self {
            config,
            classifier,
            store: None,
            queue: PendingQueue::new(),
            working_set: HashMap::new(),
            consecutive_failures: 0,
            state,
            committed,
        }
    }

    /// Take in one raw event: buffer it, or process it when the store is ready.
    ///
    /// Only an escalated storage failure is returned as an error.
    pub(crate) async fn accept(&mut self, feed: Feed, event: RawEvent) -> Result<()> {
        let message = event.into_message(Utc::now().timestamp_millis());

        if self.store.is_none() {
            debug!(message_id = %message.id, %feed, queued = self.queue.len() + 1, "Store not ready, buffering message");
            self.queue.enqueue(message);
            return Ok(());
        }

        debug!(message_id = %message.id, %feed, "Processing message");
        self.process(message).await
    }

    /// Handle the store's ready signal: drain buffered messages in order, then go ready.
    pub(crate) async fn attach_store(&mut self, store: Arc<dyn MessageStore>) -> Result<()> {
        if self.store.is_some() {
            warn!("Message store already attached, ignoring ready signal");
            return Ok(());
        }

        self.store = Some(store);
        self.set_state(CoordinatorState::Draining);

        let pending = self.queue.drain_all();
        info!(pending = pending.len(), "Message store ready, draining buffered messages");
        for message in pending {
            self.process(message).await?;
        }

        self.set_state(CoordinatorState::Ready);
        Ok(())
    }

    /// Manual override: change a stored verdict without calling the classifier.
    pub(crate) async fn set_classification(
        &mut self,
        id: &MessageId,
        classification: Classification,
    ) -> Result<Message> {
        let store = self.store.clone().ok_or(Error::StoreNotReady)?;

        store.update_classification(id, classification).await?;
        let updated = store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        info!(message_id = %id, %classification, "Classification overridden");
        self.working_set.insert(updated.id.clone(), updated.clone());
        self.publish(&updated);
        Ok(updated)
    }

    /// Messages committed or merged so far, newest first.
    pub(crate) fn snapshot(&self) -> Vec<Message> {
        let mut messages: Vec<_> = self.working_set.values().cloned().collect();
        messages.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        messages
    }

    pub(crate) fn stop(&self) {
        self.set_state(CoordinatorState::Stopped);
    }

    async fn process(&mut self, message: Message) -> Result<()> {
        let Some(store) = self.store.clone() else {
            self.queue.enqueue(message);
            return Ok(());
        };

        match store.get_by_id(&message.id).await {
            Ok(Some(existing)) if existing.is_classified() => {
                debug!(message_id = %existing.id, classification = %existing.classification, "Already classified, skipping");
                self.working_set.insert(existing.id.clone(), existing);
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => return self.storage_failure(&message.id, e),
        }

        let classification = self
            .classifier
            .classify(&message.body, &message.address)
            .await;
        let record = message.with_classification(classification);

        if let Err(e) = store.upsert(&record).await {
            return self.storage_failure(&record.id, e);
        }

        self.consecutive_failures = 0;
        info!(message_id = %record.id, address = %record.address, %classification, "Message committed");
        self.working_set.insert(record.id.clone(), record.clone());
        self.publish(&record);
        Ok(())
    }

    /// Skip the message; escalate once storage has failed too many times in a row.
    fn storage_failure(&mut self, id: &MessageId, e: Error) -> Result<()> {
        if !e.is_storage() {
            warn!(message_id = %id, error = %e, "Message skipped");
            return Ok(());
        }

        self.consecutive_failures += 1;
        warn!(
            message_id = %id,
            error = %e,
            consecutive_failures = self.consecutive_failures,
            "Storage failure, skipping message"
        );

        let limit = self.config.max_consecutive_store_failures;
        if limit > 0 && self.consecutive_failures >= limit {
            error!(failures = self.consecutive_failures, "Message store unusable, stopping ingestion");
            return Err(Error::StoreUnavailable {
                failures: self.consecutive_failures,
                last_error: e.to_string(),
            });
        }
        Ok(())
    }

    fn publish(&self, message: &Message) {
        // No subscribers is fine.
        let _ = self.committed.send(message.clone());
    }

    fn set_state(&self, state: CoordinatorState) {
        debug!(%state, "Coordinator state changed");
        self.state.send_replace(state);
    }
}
