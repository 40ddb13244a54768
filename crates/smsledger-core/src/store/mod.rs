//! Durable message storage.
//!
//! The store is keyed by the logical [`MessageId`], not by arrival order, so
//! the same physical message delivered by both the bulk listing and the live
//! stream collapses to one row.
//!
//! [`MessageStore`] is the seam the ingestion coordinator depends on;
//! [`SqliteMessageStore`] is the production implementation.

mod repository;

use async_trait::async_trait;

use crate::Result;
use crate::message::{Classification, Message, MessageId};

pub use repository::SqliteMessageStore;

/// Keyed table of classified messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert or replace the row keyed by `message.id`.
    ///
    /// Applying the same record twice leaves the store as applying it once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unclassified`] for an `UNSET` record, or a
    /// storage error if the write fails.
    async fn upsert(&self, message: &Message) -> Result<()>;

    /// Point lookup. `None` when no row has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn get_by_id(&self, id: &MessageId) -> Result<Option<Message>>;

    /// All messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn list_all(&self) -> Result<Vec<Message>>;

    /// Change only the classification of an existing row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `id` is absent.
    async fn update_classification(
        &self,
        id: &MessageId,
        classification: Classification,
    ) -> Result<()>;

    /// Change only the read flag of an existing row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `id` is absent.
    async fn set_read(&self, id: &MessageId, read: bool) -> Result<()>;

    /// Messages from one sender, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn list_by_address(&self, address: &str) -> Result<Vec<Message>> {
        let mut messages = self.list_all().await?;
        messages.retain(|m| m.address == address);
        Ok(messages)
    }

    /// Messages with one verdict, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn list_by_classification(
        &self,
        classification: Classification,
    ) -> Result<Vec<Message>> {
        let mut messages = self.list_all().await?;
        messages.retain(|m| m.classification == classification);
        Ok(messages)
    }
}
