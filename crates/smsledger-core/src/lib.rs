//! # smsledger-core
//!
//! Core logic for the `SmsLedger` SMS spam filter.
//!
//! This crate provides:
//! - Message model and identity derivation
//! - Local storage (`SQLite`)
//! - Spam classifier client with fail-open verdicts
//! - **Ingestion Coordinator** - exactly-once classification across the
//!   inbox backfill and the live stream
//! - Event sources (in-process and JSON)
//! - Sender-grouped views with search

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod classifier;
pub mod coordinator;
mod error;
pub mod message;
mod queue;
pub mod source;
pub mod store;
pub mod view;

pub use classifier::{
    ClassifierClient, ClassifierConfig, ClassifierError, ClassifierTransport, HttpTransport,
    PredictRequest, PredictResponse,
};
pub use coordinator::{CoordinatorConfig, CoordinatorHandle, CoordinatorState, IngestionCoordinator};
pub use error::{Error, Result};
pub use message::{Classification, Feed, Message, MessageId, RawEvent};
pub use queue::PendingQueue;
pub use source::{
    ChannelSource, DEFAULT_BACKFILL_MAX_COUNT, EventSource, IngestionSession, JsonSource, LiveFeed,
    Subscription, start_ingestion,
};
pub use store::{MessageStore, SqliteMessageStore};
pub use view::SenderGroup;
