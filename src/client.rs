//! HTTP client for the generation server
//!
//! One POST per request; the event-stream body is handed to a
//! [`StreamIngestor`] as it arrives.

use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::fileset::FileSet;
use crate::ingest::{IngestOutcome, StreamIngestor};
use crate::protocol::ProtocolMode;
use crate::session::SessionToken;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    description: &'a str,
}

pub struct GenerationClient {
    http: Client,
    url: String,
    protocol: ProtocolMode,
}

impl GenerationClient {
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            url: config.generate_url(),
            protocol: config.protocol,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request a generation and stream it into `files`, calling `on_update`
    /// after every applied frame.
    ///
    /// On error `files` keeps whatever was published before the failure.
    pub async fn generate<F>(
        &self,
        description: &str,
        session: SessionToken,
        files: &mut FileSet,
        on_update: F,
    ) -> Result<IngestOutcome, GenerationError>
    where
        F: FnMut(&FileSet),
    {
        info!("requesting generation from {}", self.url);
        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(&GenerateRequest { description })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(status, &body);
            warn!("generation request failed: {}", err);
            return Err(err);
        }

        let empty = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "0")
            .unwrap_or(false);
        if empty {
            return Err(GenerationError::MissingBody);
        }

        debug!("streaming response ({})", status);
        StreamIngestor::new(self.protocol)
            .with_session(session)
            .run(response.bytes_stream(), files, on_update)
            .await
    }
}

/// Error for a non-2xx response: the body's `detail` field if present,
/// otherwise the status reason.
pub fn status_error(status: StatusCode, body: &str) -> GenerationError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        });

    let message = detail.unwrap_or_else(|| {
        format!(
            "Failed to generate code: {}",
            status.canonical_reason().unwrap_or(status.as_str())
        )
    });

    GenerationError::Status {
        status: status.as_u16(),
        message,
    }
}
