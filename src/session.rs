//! Generation sessions and the preview state machine
//!
//! A [`SessionTracker`] hands out one [`SessionToken`] per generation
//! request. Starting a new request invalidates every older token, so a late
//! chunk from a superseded stream is never applied to the active FileSet.
//!
//! [`PreviewSession`] drives the sandbox preview:
//!
//! ```text
//! Idle -> Building -> Rendered
//!             |  ^        |
//!             v  |        v
//!             Error <-----+
//! ```
//!
//! `Building` is re-entered on every FileSet change while the preview is
//! shown; a new build always supersedes the previous one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::document::{RenderOutput, RenderStatus, SandboxRenderer};
use crate::fileset::FileSet;

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATION SESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SessionTracker {
    current: Arc<watch::Sender<u64>>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        let (current, _) = watch::channel(0);
        Self {
            current: Arc::new(current),
        }
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, superseding all earlier tokens.
    pub fn begin(&self) -> SessionToken {
        let mut id = 0;
        self.current.send_modify(|current| {
            *current += 1;
            id = *current;
        });
        debug!("generation session {} started", id);
        SessionToken {
            id,
            current: self.current.subscribe(),
        }
    }

    /// Invalidate every outstanding token without starting a new session.
    pub fn cancel_all(&self) {
        let id = self.current_id();
        self.current.send_modify(|current| *current += 1);
        debug!("generation session {} cancelled", id);
    }

    pub fn current_id(&self) -> u64 {
        *self.current.borrow()
    }
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    id: u64,
    current: watch::Receiver<u64>,
}

impl SessionToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        *self.current.borrow() == self.id
    }

    /// Resolves once a newer session starts or the tracker cancels this one.
    /// Never resolves if the tracker is dropped first.
    pub async fn superseded(&self) {
        let mut current = self.current.clone();
        if current.wait_for(|id| *id != self.id).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PREVIEW STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Code,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum PreviewState {
    Idle,
    Building,
    Rendered,
    Error(String),
}

/// Message posted by a sandbox document to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    Ready { build: u64 },
    Failed { build: u64, message: String },
}

impl SandboxEvent {
    /// Decode a `postMessage` payload. Unknown messages yield `None`.
    pub fn from_message(value: &serde_json::Value) -> Option<Self> {
        let build = value.get("build").and_then(|b| b.as_u64())?;
        match value.get("type").and_then(|t| t.as_str())? {
            "preview-ready" => Some(SandboxEvent::Ready { build }),
            "preview-error" => Some(SandboxEvent::Failed {
                build,
                message: value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            _ => None,
        }
    }

    pub fn build(&self) -> u64 {
        match self {
            SandboxEvent::Ready { build } | SandboxEvent::Failed { build, .. } => *build,
        }
    }
}

pub struct PreviewSession {
    renderer: SandboxRenderer,
    view: View,
    state: PreviewState,
    last: Option<RenderOutput>,
}

impl PreviewSession {
    pub fn new(renderer: SandboxRenderer) -> Self {
        Self {
            renderer,
            view: View::Code,
            state: PreviewState::Idle,
            last: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn renderer(&self) -> &SandboxRenderer {
        &self.renderer
    }

    /// Most recent build, if the preview has been shown.
    pub fn last_render(&self) -> Option<&RenderOutput> {
        self.last.as_ref()
    }

    pub fn document(&self) -> Option<&str> {
        self.last.as_ref().map(|out| out.document.as_str())
    }

    /// Switch to the preview view and build from `files`.
    pub fn show_preview(&mut self, files: &FileSet) -> &PreviewState {
        self.view = View::Preview;
        self.rebuild(files)
    }

    /// Switch back to the code view; the sandbox is torn down.
    pub fn show_code(&mut self) {
        self.view = View::Code;
        self.state = PreviewState::Idle;
        self.last = None;
    }

    /// Rebuild if the preview is displayed. The code view ignores changes.
    pub fn on_files_changed(&mut self, files: &FileSet) -> &PreviewState {
        if self.view == View::Preview {
            self.rebuild(files);
        }
        &self.state
    }

    /// Forget the current build, e.g. when a new generation request starts.
    pub fn reset(&mut self) {
        self.state = PreviewState::Idle;
        self.last = None;
    }

    /// Apply a sandbox message. Messages from superseded builds are dropped.
    pub fn handle_event(&mut self, event: SandboxEvent) -> &PreviewState {
        let current = self.last.as_ref().map(|out| out.build);
        if current != Some(event.build()) {
            debug!(
                "ignoring sandbox event for build {} (current {:?})",
                event.build(),
                current
            );
            return &self.state;
        }

        match event {
            SandboxEvent::Ready { build } => {
                info!("preview build {} rendered", build);
                self.state = PreviewState::Rendered;
            }
            SandboxEvent::Failed { build, message } => {
                warn!("preview build {} failed: {}", build, message);
                self.state = PreviewState::Error(message);
            }
        }
        &self.state
    }

    fn rebuild(&mut self, files: &FileSet) -> &PreviewState {
        self.state = PreviewState::Building;
        let output = self.renderer.render(files);
        if let RenderStatus::RootMissing { message } = &output.status {
            self.state = PreviewState::Error(message.clone());
        }
        self.last = Some(output);
        &self.state
    }
}
