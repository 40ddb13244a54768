//! Buffer for messages that arrive before the store is ready.

use std::collections::VecDeque;

use crate::message::Message;

/// FIFO of messages received while the message store is still opening.
///
/// Holds no classification state; it only preserves arrival order.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<Message>,
}

impl PendingQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the back.
    pub fn enqueue(&mut self, message: Message) {
        self.items.push_back(message);
    }

    /// Remove and return every buffered message in arrival order.
    pub fn drain_all(&mut self) -> Vec<Message> {
        self.items.drain(..).collect()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RawEvent;

    #[test]
    fn test_drain_preserves_arrival_order() {
        let mut queue = PendingQueue::new();
        assert!(queue.is_empty());

        for (address, date) in [("A", 3), ("B", 1), ("C", 2)] {
            queue.enqueue(RawEvent::new(address, "x", date).into_message(0));
        }
        assert_eq!(queue.len(), 3);

        let drained: Vec<_> = queue
            .drain_all()
            .into_iter()
            .map(|m| m.address)
            .collect();
        assert_eq!(drained, ["A", "B", "C"]);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }
}
