//! # Codegen Preview
//!
//! Ingests a streamed, multi-file source tree from a remote generator and
//! renders a live preview of it inside an isolated sandbox document.
//!
//! ## Data Flow
//!
//! ```text
//! network stream -> StreamIngestor -> FileSet -> build_tree        (navigation)
//!                                            \-> SandboxRenderer   (preview)
//!                                                  |- transpile per file
//!                                                  \- shim + ordered units + init
//! ```
//!
//! ## Invariants
//!
//! 1. **Arrival Order**: frames are applied to the FileSet strictly in the
//!    order they are read, and each application is published before the next.
//! 2. **Supersession**: a stream whose session token is no longer current
//!    never touches the FileSet again.
//! 3. **Per-Unit Failure**: the transformer never fails; a unit it cannot
//!    handle degrades to diagnostics and, at worst, a runtime error caught
//!    inside that unit.
//! 4. **Scoped Registry**: the component registry belongs to one assembly and
//!    is rebuilt from empty for every document.

pub mod cache;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod exports;
pub mod fileset;
pub mod imports;
pub mod ingest;
pub mod lexer;
pub mod lowering;
pub mod markup;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod syntax;
pub mod telemetry;
pub mod transform;
pub mod tree;
pub mod types;

#[cfg(feature = "napi")]
pub mod bindings;

#[cfg(test)]
mod ingest_tests;
#[cfg(test)]
mod transform_tests;

pub use cache::TransformCache;
pub use client::GenerationClient;
pub use config::{Config, RendererConfig};
pub use document::{iframe_html, RenderOutput, RenderStatus, SandboxPolicy, SandboxRenderer};
pub use error::{ConfigError, GenerationError, ProtocolError};
pub use fileset::{FileChange, FileSet, GeneratedFile};
pub use ingest::{IngestOutcome, StreamIngestor};
pub use protocol::{ProtocolMode, StreamFrame, WireVariant};
pub use registry::ComponentRegistry;
pub use session::{PreviewSession, PreviewState, SandboxEvent, SessionToken, SessionTracker};
pub use telemetry::init_tracing;
pub use transform::{transpile, Diagnostic, Stage, TranspiledUnit, UnitKind};
pub use tree::{build_tree, DirectoryNode};

#[cfg(feature = "napi")]
pub use bindings::{build_tree_native, render_preview_native, transpile_file_native};
