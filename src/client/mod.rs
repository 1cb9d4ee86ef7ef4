//! HTTP client for the generation backend.
//!
//! The backend is an opaque service: it takes either a JSON body with the
//! raw text or a multipart form of files, and answers with a success flag
//! and a human-readable message. Nothing here cancels server-side work;
//! aborting a request is local bookkeeping only.

use crate::tracker::UploadedFile;
use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Timed out waiting for the backend")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

/// Backend reply to a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    custom_text: &'a str,
}

/// The calls a generation flow makes against the backend. Trait seam so
/// the orchestration can be exercised without a network.
#[async_trait]
pub trait GenerateApi: Send + Sync {
    async fn generate_text(&self, text: &str) -> Result<GenerateResponse, ClientError>;

    async fn generate_documents(
        &self,
        files: &[UploadedFile],
    ) -> Result<GenerateResponse, ClientError>;
}

/// Reqwest-backed client for the generation endpoint.
pub struct GenerationClient {
    client: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    /// Create a client. `request_timeout` is the client-side abort for the
    /// whole call; generation jobs can legitimately run for many minutes.
    #[must_use]
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio-generation/generate", self.base_url)
    }

    async fn parse_response(response: reqwest::Response) -> Result<GenerateResponse, ClientError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Api(format!("HTTP {status}: {text}")));
        }

        serde_json::from_str(&text)
            .map_err(|e| ClientError::Api(format!("Failed to parse response: {e}\nBody: {text}")))
    }
}

#[async_trait]
impl GenerateApi for GenerationClient {
    async fn generate_text(&self, text: &str) -> Result<GenerateResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&TextRequest { custom_text: text })
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn generate_documents(
        &self,
        files: &[UploadedFile],
    ) -> Result<GenerateResponse, ClientError> {
        let mut form = multipart::Form::new();
        for file in files {
            let bytes = tokio::fs::read(&file.path).await?;
            let part = multipart::Part::bytes(bytes)
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| {
                    ClientError::Api(format!("Invalid MIME type {}: {e}", file.mime_type))
                })?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
