//! Error types for generation requests
//!
//! Transform degradations and a missing root component are not errors at this
//! level: they are reported as diagnostics and preview state respectively.

use thiserror::Error;

/// Violations of the event-stream wire protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An incremental chunk line was not valid JSON.
    #[error("failed to parse server response: {source} (line: {line})")]
    MalformedChunk {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// A payload of the other wire variant arrived after the mode was fixed.
    #[error("stream is in {expected} mode but received a {found} payload")]
    ModeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The stream ended before a terminal snapshot payload arrived.
    #[error("stream ended without a final payload")]
    MissingFinalPayload,

    /// `final.code` could not be decoded into a path -> content map.
    #[error("final payload carries an invalid file map: {0}")]
    InvalidFileMap(String),

    /// Valid JSON that matches neither wire variant.
    #[error("unrecognized payload: {0}")]
    UnrecognizedPayload(String),
}

/// Terminal failure of one generation request.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Transport-level failure (connect, read, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response; message comes from the body's `detail` or the status text
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("no response body received")]
    MissingBody,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A newer request took over the FileSet before this one finished.
    #[error("generation superseded by a newer request")]
    Superseded,
}

impl GenerationError {
    /// Protocol and network failures abort the request; neither is retried here.
    pub fn is_protocol(&self) -> bool {
        matches!(self, GenerationError::Protocol(_))
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Network(err.to_string())
    }
}

/// Errors while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown protocol mode '{0}' (expected incremental, snapshot or auto)")]
    UnknownProtocol(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}
