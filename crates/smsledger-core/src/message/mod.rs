//! Message model.
//!
//! A [`RawEvent`] arrives from an event source, becomes an unclassified
//! [`Message`] in memory, and is committed once it carries a SPAM/HAM
//! [`Classification`].

mod model;

pub use model::{Classification, Feed, Message, MessageId, RawEvent};
