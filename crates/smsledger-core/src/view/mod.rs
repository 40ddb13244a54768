//! Sender-grouped presentation of stored messages.
//!
//! Pure projection: rebuilt from the store's contents on every read, with a
//! search filter that composes after grouping.
//!
//! # Example
//!
//! ```ignore
//! use smsledger_core::view;
//!
//! let groups = view::build(store.list_all().await?);
//! for group in view::filter(groups, "otp") {
//!     println!("{} ({})", group.address, group.display_classification());
//! }
//! ```

mod builder;
mod model;

pub use builder::{build, filter};
pub use model::SenderGroup;
