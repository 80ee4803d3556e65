//! codegen-preview - stream generated projects and preview them
//!
//! ## Commands
//!
//! - `generate`: request a generation, stream it to disk and/or a preview document
//! - `preview`: render a preview document for a project on disk
//! - `tree`: print the directory tree of a project on disk
//! - `transpile`: print the transformed unit for one source file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use codegen_preview::{
    build_tree, init_tracing, iframe_html, transpile, Config, DirectoryNode, FileSet,
    GenerationClient, ProtocolMode, RenderOutput, RenderStatus, SandboxRenderer, SessionTracker,
};

#[derive(Parser)]
#[command(name = "codegen-preview")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stream generated source trees and render live previews", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// JSON configuration file (environment variables still apply on top)
    #[arg(short, long, global = true, env = "PREVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a project from a description
    Generate {
        description: String,

        /// Generation server base URL
        #[arg(long)]
        api_url: Option<String>,

        /// Wire protocol: incremental, snapshot or auto
        #[arg(long)]
        protocol: Option<ProtocolMode>,

        /// Directory to write the generated files into
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write a preview document here once generation completes
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Render a preview document for a project directory
    Preview {
        dir: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Wrap the document in a sandboxed iframe element
        #[arg(long)]
        iframe: bool,
    },

    /// Print the directory tree of a project
    Tree {
        dir: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Transform one source file and print the result as JSON
    Transpile {
        file: PathBuf,

        /// Treat the file as the application root
        #[arg(long)]
        root: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            description,
            api_url,
            protocol,
            out,
            html,
        } => {
            let mut config = config;
            if let Some(url) = api_url {
                config.api_url = url;
            }
            if let Some(mode) = protocol {
                config.protocol = mode;
            }
            cmd_generate(&config, &description, out.as_deref(), html.as_deref()).await
        }
        Commands::Preview { dir, out, iframe } => cmd_preview(&config, &dir, out.as_deref(), iframe),
        Commands::Tree { dir, json_output } => cmd_tree(&dir, json_output),
        Commands::Transpile { file, root } => cmd_transpile(&file, root),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let base = match path {
        Some(p) => Config::from_file(p)
            .with_context(|| format!("Failed to load configuration from {}", p.display()))?,
        None => Config::default(),
    };
    base.apply_env(|key| std::env::var(key).ok())
        .context("Invalid configuration in environment")
}

async fn cmd_generate(
    config: &Config,
    description: &str,
    out: Option<&Path>,
    html: Option<&Path>,
) -> Result<()> {
    if description.trim().is_empty() {
        bail!("Description must not be empty");
    }

    let client = GenerationClient::new(config)?;
    let tracker = SessionTracker::new();
    let session = tracker.begin();
    let mut files = FileSet::new();

    let mut seen_files = 0;
    let mut seen_messages = 0;
    let on_update = |files: &FileSet| {
        let messages = files.status_messages();
        for message in messages.iter().skip(seen_messages) {
            info!("status: {}", message);
        }
        seen_messages = messages.len();
        if files.len() != seen_files {
            seen_files = files.len();
            info!("{} file(s) received", seen_files);
        }
    };

    let result = tokio::select! {
        result = client.generate(description, session, &mut files, on_update) => result,
        _ = tokio::signal::ctrl_c() => {
            tracker.cancel_all();
            warn!("interrupted, discarding the stream");
            bail!("Generation cancelled");
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            if !files.is_empty() {
                warn!("{} partial file(s) left unwritten", files.len());
            }
            return Err(err).context("Generation failed");
        }
    };

    info!(
        "generation complete: {} frame(s), {} file(s) via {} protocol",
        outcome.frames_applied,
        files.len(),
        outcome.variant
    );
    if let Some(description) = &outcome.description {
        info!("server description: {}", description);
    }

    print_tree(&build_tree(&files), 0);

    if let Some(dir) = out {
        let written = files
            .write_to(dir)
            .with_context(|| format!("Failed to write files to {}", dir.display()))?;
        info!("wrote {} file(s) to {}", written, dir.display());
    }

    if let Some(path) = html {
        let output = SandboxRenderer::new(config.renderer.clone()).render(&files);
        report_render(&output);
        std::fs::write(path, &output.document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("preview written to {}", path.display());
    }

    Ok(())
}

fn cmd_preview(config: &Config, dir: &Path, out: Option<&Path>, iframe: bool) -> Result<()> {
    let files = FileSet::load_dir(dir)
        .with_context(|| format!("Failed to load project from {}", dir.display()))?;
    let output = SandboxRenderer::new(config.renderer.clone()).render(&files);
    report_render(&output);

    let html = if iframe {
        iframe_html(&output.document, &config.renderer.sandbox, &config.renderer.title)
    } else {
        output.document
    };

    match out {
        Some(path) => {
            std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("preview written to {}", path.display());
        }
        None => println!("{}", html),
    }
    Ok(())
}

fn cmd_tree(dir: &Path, json: bool) -> Result<()> {
    let files = FileSet::load_dir(dir)
        .with_context(|| format!("Failed to load project from {}", dir.display()))?;
    let tree = build_tree(&files);
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&tree, 0);
    }
    Ok(())
}

fn cmd_transpile(file: &Path, root: bool) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let path = file.to_string_lossy().replace('\\', "/");
    let unit = transpile(&path, &source, root);
    println!("{}", serde_json::to_string_pretty(&unit)?);
    Ok(())
}

fn report_render(output: &RenderOutput) {
    for (path, diagnostic) in output.diagnostics() {
        warn!("{} ({:?}): {}", path, diagnostic.stage, diagnostic.message);
    }
    match &output.status {
        RenderStatus::Mountable { root, root_path } => {
            info!("root component {} from {}", root, root_path)
        }
        RenderStatus::RootMissing { message } => warn!("{}", message),
    }
}

fn print_tree(nodes: &[DirectoryNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        if node.is_directory() {
            println!("{}{}/", indent, node.name());
            print_tree(node.children(), depth + 1);
        } else {
            println!("{}{}", indent, node.name());
        }
    }
}
