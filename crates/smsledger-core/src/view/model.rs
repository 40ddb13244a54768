//! Sender view models.

use serde::Serialize;

use crate::message::{Classification, Message};

/// All messages from one sender, newest first.
///
/// Derived from the store on demand; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderGroup {
    /// Sender identifier shared by every message in the group.
    pub address: String,
    /// Messages ordered by descending date. Never empty.
    pub messages: Vec<Message>,
}

impl SenderGroup {
    /// Most recent message.
    #[must_use]
    pub fn latest(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Date of the most recent message.
    #[must_use]
    pub fn latest_date(&self) -> i64 {
        self.latest().map_or(i64::MIN, |m| m.date)
    }

    /// Verdict shown for the conversation: the latest message's, HAM if unresolved.
    #[must_use]
    pub fn display_classification(&self) -> Classification {
        match self.latest().map(|m| m.classification) {
            Some(Classification::Spam) => Classification::Spam,
            _ => Classification::Ham,
        }
    }

    /// Number of SPAM messages in the group.
    #[must_use]
    pub fn spam_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.classification.is_spam())
            .count()
    }

    /// Number of unread messages in the group.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.read).count()
    }

    /// Case-insensitive substring match on the address or any message body.
    ///
    /// An empty query matches every group.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.address.to_lowercase().contains(&needle)
            || self
                .messages
                .iter()
                .any(|m| m.body.to_lowercase().contains(&needle))
    }
}
