//! In-process event source.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{EventSource, LiveFeed, Subscription};
use crate::message::RawEvent;
use crate::{Error, Result};

type Subscribers = Arc<Mutex<Vec<(u64, mpsc::UnboundedSender<RawEvent>)>>>;

/// Event source backed by memory: a fixed inbox plus pushed live events.
///
/// Used to embed the pipeline behind a platform bridge, and in tests.
#[derive(Debug, Default)]
pub struct ChannelSource {
    inbox: Mutex<Vec<RawEvent>>,
    subscribers: Subscribers,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl ChannelSource {
    /// Create a source whose inbox listing returns `inbox` (newest first).
    #[must_use]
    pub fn new(inbox: Vec<RawEvent>) -> Self {
        Self {
            inbox: Mutex::new(inbox),
            ..Self::default()
        }
    }

    /// Deliver a live event to every subscriber. Returns how many received it.
    pub fn push(&self, event: RawEvent) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return 0;
        };
        subscribers.retain(|(_, tx)| !tx.is_closed());
        subscribers
            .iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Simulate the platform refusing access (e.g. missing permission).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of open live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map_or(0, |s| s.len())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable("SMS access denied".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn list(&self, max_count: usize) -> Result<Vec<RawEvent>> {
        self.check_available()?;
        let inbox = self
            .inbox
            .lock()
            .map_err(|_| Error::SourceUnavailable("inbox lock poisoned".into()))?;
        Ok(inbox.iter().take(max_count).cloned().collect())
    }

    async fn subscribe(&self) -> Result<LiveFeed> {
        self.check_available()?;

        let (tx, events) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .map_err(|_| Error::SourceUnavailable("subscriber lock poisoned".into()))?
            .push((id, tx));

        let subscribers = Arc::clone(&self.subscribers);
        let subscription = Subscription::new(move || {
            if let Ok(mut subscribers) = subscribers.lock() {
                subscribers.retain(|(sub_id, _)| *sub_id != id);
            }
        });

        Ok(LiveFeed {
            events,
            subscription,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_respects_max_count() {
        let source = ChannelSource::new(vec![
            RawEvent::new("A", "3", 3),
            RawEvent::new("A", "2", 2),
            RawEvent::new("A", "1", 1),
        ]);

        let listing = source.list(2).await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].date, Some(3));
    }

    #[tokio::test]
    async fn test_push_reaches_subscribers_until_unsubscribed() {
        let source = ChannelSource::default();
        let mut feed = source.subscribe().await.unwrap();
        assert_eq!(source.subscriber_count(), 1);

        assert_eq!(source.push(RawEvent::new("B", "hi", 1)), 1);
        assert_eq!(feed.events.recv().await.unwrap().body.as_deref(), Some("hi"));

        feed.subscription.unsubscribe();
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.push(RawEvent::new("B", "again", 2)), 0);
        assert!(feed.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let source = ChannelSource::default();
        source.set_available(false);

        assert!(matches!(
            source.list(10).await,
            Err(Error::SourceUnavailable(_))
        ));
        assert!(matches!(
            source.subscribe().await,
            Err(Error::SourceUnavailable(_))
        ));
    }
}
