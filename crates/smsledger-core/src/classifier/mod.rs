//! Spam classification.
//!
//! [`ClassifierClient`] wraps a [`ClassifierTransport`] and always yields a
//! verdict: invalid input, transport errors, timeouts, non-success statuses,
//! and unrecognised responses all resolve to HAM. Availability of the inbox is
//! preferred over classification accuracy when the service is degraded.

mod client;
mod http;

pub use client::{
    ClassifierClient, ClassifierConfig, ClassifierError, ClassifierTransport, PredictRequest,
    PredictResponse,
};
pub use http::HttpTransport;
