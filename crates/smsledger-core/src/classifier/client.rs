//! Classifier client with a fail-open verdict policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::http::HttpTransport;
use crate::message::Classification;

/// Errors that can occur while calling the classification service.
///
/// These never escape [`ClassifierClient::classify`]; they are logged and
/// mapped to HAM.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    /// Connection or request failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call exceeded its time budget.
    #[error("Classifier call timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("Classifier returned HTTP status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("Malformed classifier response: {0}")]
    Malformed(String),
}

/// Request body sent to the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictRequest {
    /// Message text.
    pub message: String,
    /// Sender identifier.
    pub sender: String,
}

/// Response body returned by the classification service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PredictResponse {
    /// `"SPAM"` or `"HAM"`.
    #[serde(default)]
    pub prediction: Option<String>,
}

/// One request/response exchange with a classification backend.
#[async_trait]
pub trait ClassifierTransport: Send + Sync {
    /// Send a single prediction request.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, non-success statuses, or
    /// undecodable responses.
    async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, ClassifierError>;
}

/// Classifier connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Prediction endpoint URL.
    pub endpoint: String,
    /// Upper bound for one classify call.
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/predict".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Stateless wrapper around a classification backend.
///
/// Makes at most one call per [`classify`](Self::classify) and never retries.
#[derive(Clone)]
pub struct ClassifierClient {
    transport: Arc<dyn ClassifierTransport>,
    timeout: Duration,
    fallbacks: Arc<AtomicU64>,
}

impl std::fmt::Debug for ClassifierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierClient")
            .field("timeout", &self.timeout)
            .field("fallbacks", &self.fallback_count())
            .finish_non_exhaustive()
    }
}

impl ClassifierClient {
    /// Create a client over any transport.
    #[must_use]
    pub fn new(transport: Arc<dyn ClassifierTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            fallbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a client that talks HTTP to `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn http(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let transport = HttpTransport::new(config)?;
        debug!(endpoint = transport.endpoint(), timeout = ?config.timeout, "Classifier client created");
        Ok(Self::new(Arc::new(transport), config.timeout))
    }

    /// Classify a message. Always produces a verdict.
    ///
    /// Empty input is HAM without a network call. Any failure is logged and
    /// mapped to HAM so the message can still be persisted.
    pub async fn classify(&self, body: &str, sender: &str) -> Classification {
        if body.is_empty() {
            warn!(sender, "Empty message body, defaulting to HAM");
            return Classification::Ham;
        }
        if sender.is_empty() {
            warn!("Empty sender, defaulting to HAM");
            return Classification::Ham;
        }

        match self.try_classify(body, sender).await {
            Ok(classification) => {
                debug!(sender, %classification, "Classified message");
                classification
            }
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                match &e {
                    ClassifierError::Status(422) => {
                        warn!(sender, error = %e, "Classifier rejected request format, defaulting to HAM");
                    }
                    ClassifierError::Status(_) => {
                        warn!(sender, error = %e, "Classifier server error, defaulting to HAM");
                    }
                    _ => warn!(sender, error = %e, "Classifier unavailable, defaulting to HAM"),
                }
                Classification::Ham
            }
        }
    }

    /// Number of calls that fell back to HAM because of a failure.
    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    async fn try_classify(&self, body: &str, sender: &str) -> Result<Classification, ClassifierError> {
        let request = PredictRequest {
            message: body.to_string(),
            sender: sender.to_string(),
        };

        let response = tokio::time::timeout(self.timeout, self.transport.predict(&request))
            .await
            .map_err(|_| ClassifierError::Timeout)??;

        Ok(verdict(&response))
    }
}

/// Map a response to a verdict; anything unrecognised is HAM.
fn verdict(response: &PredictResponse) -> Classification {
    match response.prediction.as_deref().map(Classification::parse) {
        Some(Classification::Spam) => Classification::Spam,
        Some(Classification::Ham) => Classification::Ham,
        _ => {
            warn!(prediction = ?response.prediction, "Unexpected classifier response, defaulting to HAM");
            Classification::Ham
        }
    }
}
