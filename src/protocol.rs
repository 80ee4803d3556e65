//! Event-stream wire protocol
//!
//! Generation responses arrive as newline-delimited `data: <json>` lines in one
//! of two shapes:
//!
//! ```text
//! data: {"code": "<delta>", "file": "<path>"}                  incremental
//! data: {"final": {"description": "...", "code": <file map>}}  snapshot
//! ```
//!
//! This module is synchronous and knows nothing about transport. It turns raw
//! byte chunks into complete lines and classifies payloads; `ingest` drives it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ProtocolError};

pub const DATA_PREFIX: &str = "data: ";

/// Payloads that only keep the connection open.
const KEEPALIVE_SENTINELS: &[&str] = &["keep-alive", "keepalive", "ping", "[KEEPALIVE]"];

// ═══════════════════════════════════════════════════════════════════════════════
// MODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Which wire variant a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVariant {
    Incremental,
    Snapshot,
}

impl WireVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireVariant::Incremental => "incremental",
            WireVariant::Snapshot => "final-snapshot",
        }
    }
}

impl fmt::Display for WireVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured protocol handling. `Auto` locks onto the first recognised payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    #[default]
    Incremental,
    #[serde(alias = "final", alias = "final-snapshot")]
    Snapshot,
    Auto,
}

impl ProtocolMode {
    /// The variant this mode is fixed to, if it is not `Auto`.
    pub fn fixed_variant(&self) -> Option<WireVariant> {
        match self {
            ProtocolMode::Incremental => Some(WireVariant::Incremental),
            ProtocolMode::Snapshot => Some(WireVariant::Snapshot),
            ProtocolMode::Auto => None,
        }
    }
}

impl FromStr for ProtocolMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" | "chunks" => Ok(ProtocolMode::Incremental),
            "snapshot" | "final" | "final-snapshot" => Ok(ProtocolMode::Snapshot),
            "auto" => Ok(ProtocolMode::Auto),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolMode::Incremental => "incremental",
            ProtocolMode::Snapshot => "snapshot",
            ProtocolMode::Auto => "auto",
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// A decoded stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    IncrementalChunk {
        file: String,
        code_delta: String,
    },
    FinalSnapshot {
        description: String,
        files: Vec<(String, String)>,
    },
}

#[derive(Deserialize)]
struct ChunkPayload {
    code: String,
    file: String,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    #[serde(rename = "final")]
    snapshot: SnapshotPayload,
}

#[derive(Deserialize)]
struct SnapshotPayload {
    #[serde(default)]
    description: String,
    code: Value,
}

/// Extract the JSON payload of a `data: ` line.
///
/// Returns `None` for blank lines, lines without the prefix, and keep-alives.
pub fn data_payload(line: &str) -> Option<&str> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() || KEEPALIVE_SENTINELS.contains(&payload) {
        return None;
    }
    Some(payload)
}

/// Shape of a payload, used by `Auto` to pick the variant. `None` for non-JSON
/// or JSON of neither shape.
pub fn sniff(payload: &str) -> Option<WireVariant> {
    let value: Value = serde_json::from_str(payload).ok()?;
    variant_of(&value)
}

/// Payloads that open like a JSON object must parse as one, even before the
/// wire variant is known.
pub fn check_object(payload: &str) -> Result<(), ProtocolError> {
    if !payload.trim_start().starts_with('{') {
        return Ok(());
    }
    serde_json::from_str::<Value>(payload)
        .map(|_| ())
        .map_err(|source| ProtocolError::MalformedChunk {
            line: payload.to_string(),
            source,
        })
}

fn variant_of(value: &Value) -> Option<WireVariant> {
    let obj = value.as_object()?;
    if obj.contains_key("final") {
        Some(WireVariant::Snapshot)
    } else if obj.contains_key("file") && obj.contains_key("code") {
        Some(WireVariant::Incremental)
    } else {
        None
    }
}

/// Decode a payload on an incremental stream.
pub fn parse_chunk(payload: &str) -> Result<StreamFrame, ProtocolError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|source| ProtocolError::MalformedChunk {
            line: payload.to_string(),
            source,
        })?;

    if variant_of(&value) == Some(WireVariant::Snapshot) {
        return Err(ProtocolError::ModeMismatch {
            expected: WireVariant::Incremental.as_str(),
            found: WireVariant::Snapshot.as_str(),
        });
    }

    let chunk: ChunkPayload = serde_json::from_value(value)
        .map_err(|_| ProtocolError::UnrecognizedPayload(payload.to_string()))?;

    Ok(StreamFrame::IncrementalChunk {
        file: chunk.file,
        code_delta: chunk.code,
    })
}

/// Decode a payload on a snapshot stream.
///
/// Non-JSON lines and JSON without a `final` key are informational and yield
/// `Ok(None)`. A chunk-shaped payload is a mode mismatch.
pub fn parse_snapshot(payload: &str) -> Result<Option<StreamFrame>, ProtocolError> {
    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return Ok(None);
    };

    match variant_of(&value) {
        Some(WireVariant::Snapshot) => {}
        Some(WireVariant::Incremental) => {
            return Err(ProtocolError::ModeMismatch {
                expected: WireVariant::Snapshot.as_str(),
                found: WireVariant::Incremental.as_str(),
            })
        }
        None => return Ok(None),
    }

    let envelope: SnapshotEnvelope = serde_json::from_value(value)
        .map_err(|e| ProtocolError::InvalidFileMap(e.to_string()))?;

    Ok(Some(StreamFrame::FinalSnapshot {
        description: envelope.snapshot.description,
        files: decode_file_map(envelope.snapshot.code)?,
    }))
}

/// `final.code` is either a JSON-encoded string or an object. Non-string
/// values are kept as pretty-printed JSON text.
fn decode_file_map(code: Value) -> Result<Vec<(String, String)>, ProtocolError> {
    let map = match code {
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| ProtocolError::InvalidFileMap(e.to_string()))?,
        other => other,
    };

    let Value::Object(entries) = map else {
        return Err(ProtocolError::InvalidFileMap(
            "expected an object mapping paths to contents".to_string(),
        ));
    };

    entries
        .into_iter()
        .map(|(path, content)| {
            let text = match content {
                Value::String(s) => s,
                other => serde_json::to_string_pretty(&other)
                    .map_err(|e| ProtocolError::InvalidFileMap(e.to_string()))?,
            };
            Ok((path, text))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINE REASSEMBLY
// ═══════════════════════════════════════════════════════════════════════════════

/// Reassembles lines from arbitrarily fragmented byte chunks.
///
/// Incomplete UTF-8 sequences at a chunk boundary are held back until the
/// rest arrives; the last incomplete line is held back until a newline or
/// [`LineBuffer::finish`].
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending_bytes: Vec<u8>,
    partial: String,
    /// Prefix of `partial` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed (without terminators).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(bytes);
        let text = self.decode_available();
        self.partial.push_str(&text);

        let mut lines = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.partial[from..].find('\n') {
            let end = from + pos;
            let line = &self.partial[consumed..end];
            lines.push(line.strip_suffix('\r').unwrap_or(line).to_string());
            consumed = end + 1;
            from = consumed;
        }
        if consumed > 0 {
            self.partial.drain(..consumed);
        }
        self.scanned = self.partial.len();
        lines
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.partial.push_str(&tail);
            self.pending_bytes.clear();
        }
        self.scanned = 0;
        let rest = std::mem::take(&mut self.partial);
        let rest = rest.trim_end_matches('\r');
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    fn decode_available(&mut self) -> String {
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(s) => {
                    text.push_str(s);
                    self.pending_bytes.clear();
                    return text;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid]));
                    match e.error_len() {
                        // Truncated sequence: wait for the next chunk.
                        None => {
                            self.pending_bytes.drain(..valid);
                            return text;
                        }
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}
