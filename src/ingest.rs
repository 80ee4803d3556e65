//! Stream ingestion into a live FileSet
//!
//! [`StreamIngestor`] consumes the byte chunks of one generation response,
//! applies every recognised frame to a caller-owned [`FileSet`] and publishes
//! the updated set after each applied frame. Ingestion is single-consumer:
//! frames are applied strictly in arrival order.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, error, info, warn};

use crate::error::{GenerationError, ProtocolError};
use crate::fileset::{FileChange, FileSet};
use crate::protocol::{self, LineBuffer, ProtocolMode, StreamFrame, WireVariant};
use crate::session::SessionToken;

/// Whether the ingestor wants more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Complete,
}

/// Summary of a successfully finished ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub variant: WireVariant,
    pub frames_applied: usize,
    pub description: Option<String>,
}

pub struct StreamIngestor {
    mode: ProtocolMode,
    variant: Option<WireVariant>,
    lines: LineBuffer,
    session: Option<SessionToken>,
    frames_applied: usize,
    description: Option<String>,
    complete: bool,
}

impl StreamIngestor {
    pub fn new(mode: ProtocolMode) -> Self {
        Self {
            mode,
            variant: mode.fixed_variant(),
            lines: LineBuffer::new(),
            session: None,
            frames_applied: 0,
            description: None,
            complete: false,
        }
    }

    /// Tie this ingestor to a session; it stops applying frames once superseded.
    pub fn with_session(mut self, session: SessionToken) -> Self {
        self.session = Some(session);
        self
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// The resolved wire variant; `None` while `Auto` has not locked yet.
    pub fn variant(&self) -> Option<WireVariant> {
        self.variant
    }

    pub fn frames_applied(&self) -> usize {
        self.frames_applied
    }

    /// Drive the ingestor over a byte stream until completion, error or
    /// supersession. The stream is dropped on every exit path, including a
    /// supersession that happens while the stream is stalled.
    pub async fn run<S, B, E, F>(
        mut self,
        stream: S,
        files: &mut FileSet,
        mut on_update: F,
    ) -> Result<IngestOutcome, GenerationError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        F: FnMut(&FileSet),
    {
        let mut stream = std::pin::pin!(stream);

        loop {
            let next = match &self.session {
                Some(session) => tokio::select! {
                    biased;
                    _ = session.superseded() => {
                        info!("session {} superseded while waiting, dropping stream", session.id());
                        return Err(GenerationError::Superseded);
                    }
                    item = stream.next() => item,
                },
                None => stream.next().await,
            };
            let Some(item) = next else {
                break;
            };
            self.ensure_current()?;
            let chunk = item.map_err(|e| {
                error!("stream read failed: {}", e);
                GenerationError::Network(e.to_string())
            })?;

            if self.feed(chunk.as_ref(), files, &mut on_update)? == Progress::Complete {
                debug!("terminal payload applied, releasing stream");
                return Ok(self.outcome());
            }
        }

        self.finish(files, &mut on_update)
    }

    /// Feed one chunk of raw bytes.
    pub fn feed<F>(
        &mut self,
        bytes: &[u8],
        files: &mut FileSet,
        on_update: &mut F,
    ) -> Result<Progress, GenerationError>
    where
        F: FnMut(&FileSet),
    {
        if self.complete {
            return Ok(Progress::Complete);
        }

        for line in self.lines.push(bytes) {
            if self.handle_line(&line, files, on_update)? == Progress::Complete {
                self.complete = true;
                return Ok(Progress::Complete);
            }
        }
        Ok(Progress::Continue)
    }

    /// Handle end of stream: flush the held-back line, then decide whether
    /// the stream ended legitimately.
    pub fn finish<F>(
        &mut self,
        files: &mut FileSet,
        on_update: &mut F,
    ) -> Result<IngestOutcome, GenerationError>
    where
        F: FnMut(&FileSet),
    {
        if !self.complete {
            if let Some(line) = self.lines.finish() {
                if self.handle_line(&line, files, on_update)? == Progress::Complete {
                    self.complete = true;
                }
            }
        }

        if self.complete {
            return Ok(self.outcome());
        }

        match self.variant {
            Some(WireVariant::Incremental) => {
                info!(
                    "stream finished after {} chunk(s), {} file(s)",
                    self.frames_applied,
                    files.len()
                );
                Ok(self.outcome())
            }
            _ => {
                warn!("stream ended without a final payload");
                Err(ProtocolError::MissingFinalPayload.into())
            }
        }
    }

    fn handle_line<F>(
        &mut self,
        line: &str,
        files: &mut FileSet,
        on_update: &mut F,
    ) -> Result<Progress, GenerationError>
    where
        F: FnMut(&FileSet),
    {
        let Some(payload) = protocol::data_payload(line) else {
            return Ok(Progress::Continue);
        };

        let variant = match self.variant {
            Some(v) => v,
            None => match protocol::sniff(payload) {
                Some(v) => {
                    info!("protocol resolved to {}", v);
                    self.variant = Some(v);
                    v
                }
                None => {
                    protocol::check_object(payload).map_err(|e| {
                        error!("{}", e);
                        e
                    })?;
                    warn!("skipping unrecognized line before protocol resolved");
                    return Ok(Progress::Continue);
                }
            },
        };

        let frame = match variant {
            WireVariant::Incremental => protocol::parse_chunk(payload).map_err(|e| {
                error!("{}", e);
                e
            })?,
            WireVariant::Snapshot => match protocol::parse_snapshot(payload)? {
                Some(frame) => frame,
                None => {
                    debug!("skipping informational line");
                    return Ok(Progress::Continue);
                }
            },
        };

        self.apply(frame, files, on_update)
    }

    fn apply<F>(
        &mut self,
        frame: StreamFrame,
        files: &mut FileSet,
        on_update: &mut F,
    ) -> Result<Progress, GenerationError>
    where
        F: FnMut(&FileSet),
    {
        self.ensure_current()?;

        match frame {
            StreamFrame::IncrementalChunk { file, code_delta } => {
                if files.append(&file, &code_delta) == FileChange::Rejected {
                    return Err(ProtocolError::UnrecognizedPayload(format!(
                        "invalid file path {:?}",
                        file
                    ))
                    .into());
                }
                self.frames_applied += 1;
                on_update(files);
                Ok(Progress::Continue)
            }
            StreamFrame::FinalSnapshot {
                description,
                files: entries,
            } => {
                info!("final snapshot with {} file(s)", entries.len());
                files.replace_all(entries);
                self.frames_applied += 1;
                self.description = Some(description);
                on_update(files);
                Ok(Progress::Complete)
            }
        }
    }

    fn ensure_current(&self) -> Result<(), GenerationError> {
        match &self.session {
            Some(session) if !session.is_current() => {
                info!("session {} superseded, dropping stream", session.id());
                Err(GenerationError::Superseded)
            }
            _ => Ok(()),
        }
    }

    fn outcome(&self) -> IngestOutcome {
        IngestOutcome {
            variant: self.variant.unwrap_or(WireVariant::Incremental),
            frames_applied: self.frames_applied,
            description: self.description.clone(),
        }
    }
}
