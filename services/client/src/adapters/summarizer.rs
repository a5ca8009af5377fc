//! services/client/src/adapters/summarizer.rs
//!
//! This module contains the adapter for the remote summarization API.
//! It implements the `SummarizationService` port from the `core` crate.

use async_trait::async_trait;
use open_blinkist_core::domain::{BookSummary, SummaryRequest};
use open_blinkist_core::ports::{PortError, PortResult, SummarizationService};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SummarizationService` port over HTTP.
///
/// The adapter sets no timeout of its own; the controller bounds every call.
#[derive(Clone)]
pub struct HttpSummarizer {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpSummarizer {
    /// Creates a new `HttpSummarizer` for the API rooted at `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Asks `GET /health` whether the API is up.
    pub async fn check_health(&self) -> PortResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid health payload: {}", e)))?;
        Ok(health.status == "healthy")
    }
}

fn map_transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout
    } else if e.is_connect() || e.is_request() {
        PortError::Network(e.to_string())
    } else {
        PortError::Unexpected(e.to_string())
    }
}

//=========================================================================================
// `SummarizationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SummarizationService for HttpSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> PortResult<BookSummary> {
        debug!("POST {} for '{}'", self.endpoint(), request.book_name);
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Remote {
                status: status.as_u16(),
            });
        }

        response
            .json::<BookSummary>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid summary payload: {}", e)))
    }

    fn endpoint(&self) -> String {
        format!("{}/summarize_book", self.base_url)
    }
}
