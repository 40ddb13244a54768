//! HTTP transport for the classification service.

use async_trait::async_trait;
use reqwest::header::ACCEPT;

use super::client::{
    ClassifierConfig, ClassifierError, ClassifierTransport, PredictRequest, PredictResponse,
};

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Posts JSON prediction requests to a classifier endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for `config.endpoint` with `config.timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The endpoint this transport posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ClassifierTransport for HttpTransport {
    async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, ClassifierError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClassifierError::Malformed(e.to_string()))
    }
}
