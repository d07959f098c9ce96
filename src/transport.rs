use crate::transcript::TurnMessage;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

/// Raw chunks of a streamed response body, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// Body of a successful chat response
pub enum ChatBody {
    Stream(ByteStream),
    /// The response carried no body at all
    Empty,
}

impl std::fmt::Debug for ChatBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatBody::Stream(_) => f.write_str("ChatBody::Stream(..)"),
            ChatBody::Empty => f.write_str("ChatBody::Empty"),
        }
    }
}

/// Export endpoint result
#[derive(Debug, Clone)]
pub struct ExportResponse {
    pub bytes: Bytes,
    /// Filename suggested by the server, if any
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportRequest<'a> {
    pub messages: &'a [TurnMessage],
}

/// Boundary between the client core and the inference backend
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// `GET /models`
    async fn fetch_models(&self) -> Result<Vec<String>, TransportError>;

    /// `POST /chat?message=..&model=..`, returning the streamed body
    async fn open_chat(&self, message: &str, model: &str) -> Result<ChatBody, TransportError>;

    /// `POST /export` with the full transcript
    async fn export(&self, messages: &[TurnMessage]) -> Result<ExportResponse, TransportError>;
}

/// Upper bound on `GET /models`; chat streams have none
pub const MODELS_TIMEOUT: Duration = Duration::from_secs(15);

/// reqwest-backed transport talking to a fixed origin
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    models_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        // No overall timeout: a reply stream lives as long as the server keeps it open
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            models_timeout: MODELS_TIMEOUT,
        })
    }

    pub fn with_models_timeout(mut self, timeout: Duration) -> Self {
        self.models_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status { status, body })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn fetch_models(&self) -> Result<Vec<String>, TransportError> {
        let response = self
            .client
            .get(self.url("models"))
            .timeout(self.models_timeout)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let models: ModelsResponse = response.json().await?;
        Ok(models.models)
    }

    async fn open_chat(&self, message: &str, model: &str) -> Result<ChatBody, TransportError> {
        let response = self
            .client
            .post(self.url("chat"))
            .query(&[("message", message), ("model", model)])
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(ChatBody::Empty);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();
        Ok(ChatBody::Stream(stream))
    }

    async fn export(&self, messages: &[TurnMessage]) -> Result<ExportResponse, TransportError> {
        let response = self
            .client
            .post(self.url("export"))
            .json(&ExportRequest { messages })
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_filename);
        let bytes = response.bytes().await?;

        Ok(ExportResponse { bytes, filename })
    }
}

/// Extract `filename=` from a `Content-Disposition` header value
pub fn attachment_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_from_content_disposition() {
        assert_eq!(
            attachment_filename("attachment; filename=chat_history_20250101_120000.json"),
            Some("chat_history_20250101_120000.json".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; filename=\"quoted.json\""),
            Some("quoted.json".to_string())
        );
        assert_eq!(attachment_filename("inline"), None);
        assert_eq!(attachment_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("http://localhost:8000/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
        assert_eq!(transport.url("models"), "http://localhost:8000/models");
    }
}
