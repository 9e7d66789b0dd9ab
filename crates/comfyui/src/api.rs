//! REST client for the backend's HTTP endpoints.
//!
//! Wraps graph submission, queue clearing, interruption, the readiness
//! probe, and the one-time startup weights-preparation call using
//! [`reqwest`].

use serde::Deserialize;

/// HTTP client for a single backend instance.
#[derive(Debug)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response from the `/prompt` endpoint after a graph is queued.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued graph. Execution
    /// messages on the progress channel carry this id.
    pub prompt_id: String,
    /// Position in the execution queue.
    pub number: i32,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApi {
    /// Create an API client for `api_url`, e.g. `http://127.0.0.1:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Submit a bound graph for execution.
    ///
    /// Sends `POST /prompt` with the graph JSON and the client id of
    /// an already-open progress channel.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Drop every pending job from the backend queue.
    ///
    /// Part of the per-request pre-flight reset: nothing queued by a
    /// previous request may survive into this one.
    pub async fn clear_queue(&self) -> Result<(), ComfyUIApiError> {
        let body = serde_json::json!({ "clear": true });

        let response = self
            .client
            .post(format!("{}/queue", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Interrupt whatever is executing right now.
    ///
    /// Sends `POST /interrupt`. Not prompt-scoped; used when a request
    /// times out and its execution must be abandoned.
    pub async fn interrupt(&self) -> Result<(), ComfyUIApiError> {
        let response = self
            .client
            .post(format!("{}/interrupt", self.api_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Probe whether the backend is up and answering.
    ///
    /// Sends `GET /system_stats`, discarding the body.
    pub async fn ping(&self) -> Result<(), ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Ask the backend to make the given checkpoint weights available.
    ///
    /// Invoked once at process startup, never per request. The backend
    /// downloads anything missing before the first graph runs.
    pub async fn prepare_weights(&self, weights: &[String]) -> Result<(), ComfyUIApiError> {
        let body = serde_json::json!({ "weights": weights });

        let response = self
            .client
            .post(format!("{}/weights", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ComfyUIApiError::ApiError`]
    /// with the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
