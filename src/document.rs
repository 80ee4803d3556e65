//! # Sandbox Document Assembly
//!
//! Turns a FileSet snapshot into one self-contained HTML document that runs
//! the generated application inside an isolated frame.
//!
//! ## Key Invariants
//!
//! 1. **Fresh Registry**: every assembly starts from an empty registry, both
//!    the renderer's own mirror and the one the document creates at runtime.
//! 2. **Deterministic Order**: units run as data, types, components, root,
//!    entry. Ties keep FileSet insertion order.
//! 3. **Unit Isolation**: each unit is evaluated from a string inside its own
//!    try/catch, so a failing unit (syntax errors included) never prevents
//!    the others from registering.
//! 4. **Total**: assembly never fails. A missing root yields a document that
//!    shows the problem in place of the application.
//!
//! ## Document Layout
//! - runtime scripts (`React`, `ReactDOM` globals)
//! - the shim: registry, markup factory, error panel, host messaging
//! - stylesheets from every `.css` file
//! - one `runUnit` script per unit, in order
//! - the init script that mounts the root after a macrotask boundary

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::TransformCache;
use crate::config::RendererConfig;
use crate::fileset::{FileSet, GeneratedFile, STATUS_LOG_PATH};
use crate::imports::module_name;
use crate::registry::ComponentRegistry;
use crate::transform::{Diagnostic, Stage, TranspiledUnit, UnitKind};

lazy_static! {
    static ref STYLE_CLOSE_RE: Regex = Regex::new(r"(?i)</style").unwrap();
    static ref TOOLING_RE: Regex = Regex::new(
        r"^(?:package(?:-lock)?\.json|tsconfig(?:\.[\w-]+)?\.json|[\w.-]+\.config\.(?:js|cjs|mjs|ts|cts|mts))$"
    )
    .unwrap();
}

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "ts", "tsx"];

const SHIM_JS: &str = include_str!("runtime/shim.js");
const INIT_JS: &str = include_str!("runtime/init.js");

// ═══════════════════════════════════════════════════════════════════════════════
// SANDBOX POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Capabilities granted to the preview frame beyond script execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxPolicy {
    pub allow_same_origin: bool,
    pub allow_forms: bool,
    pub allow_modals: bool,
    pub allow_popups: bool,
}

impl SandboxPolicy {
    /// Value of the iframe `sandbox` attribute.
    pub fn attribute(&self) -> String {
        let mut tokens = vec!["allow-scripts"];
        if self.allow_same_origin {
            tokens.push("allow-same-origin");
        }
        if self.allow_forms {
            tokens.push("allow-forms");
        }
        if self.allow_modals {
            tokens.push("allow-modals");
        }
        if self.allow_popups {
            tokens.push("allow-popups");
        }
        tokens.join(" ")
    }
}

/// An `<iframe>` element that loads `document` under `policy`.
pub fn iframe_html(document: &str, policy: &SandboxPolicy, title: &str) -> String {
    format!(
        "<iframe title=\"{}\" sandbox=\"{}\" srcdoc=\"{}\"></iframe>",
        escape_html(title),
        policy.attribute(),
        escape_html(document)
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RenderStatus {
    /// The root unit registers `root`; the document will try to mount it.
    Mountable {
        root: String,
        #[serde(rename = "rootPath")]
        root_path: String,
    },
    /// The document shows `message` instead of the application.
    RootMissing { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedUnit {
    pub kind: UnitKind,
    #[serde(flatten)]
    pub unit: TranspiledUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    /// Monotonic per renderer; echoed by the document's host messages.
    pub build: u64,
    pub document: String,
    pub status: RenderStatus,
    /// Units in execution order.
    pub units: Vec<RenderedUnit>,
    /// Paths of the stylesheets that were inlined.
    pub styles: Vec<String>,
}

impl RenderOutput {
    pub fn diagnostics(&self) -> impl Iterator<Item = (&str, &Diagnostic)> {
        self.units.iter().flat_map(|u| {
            u.unit
                .diagnostics
                .iter()
                .map(move |d| (u.unit.source_path.as_str(), d))
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SandboxRenderer {
    config: RendererConfig,
    cache: TransformCache,
    registry: ComponentRegistry,
    builds: u64,
}

impl SandboxRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            cache: TransformCache::new(),
            registry: ComponentRegistry::new(),
            builds: 0,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Names registered by the most recent assembly.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    /// The root file of `files`, by the configured naming convention.
    pub fn find_root<'a>(&self, files: &'a FileSet) -> Option<&'a GeneratedFile> {
        let candidates = &self.config.root_candidates;
        candidates
            .iter()
            .find_map(|c| files.get(c))
            .or_else(|| {
                candidates.iter().find_map(|c| {
                    let suffix = format!("/{}", c);
                    files.iter().find(|f| f.path().ends_with(&suffix))
                })
            })
    }

    /// Assemble a document for `files`.
    pub fn render(&mut self, files: &FileSet) -> RenderOutput {
        self.builds += 1;
        self.registry.reset();
        self.cache.begin_pass();

        let root_path = self.find_root(files).map(|f| f.path().to_string());
        let mut units: Vec<(usize, RenderedUnit)> = Vec::new();
        let mut styles: Vec<(&str, &str)> = Vec::new();

        for (position, file) in files.iter().enumerate() {
            let path = file.path();
            if path == STATUS_LOG_PATH || TOOLING_RE.is_match(file.name()) {
                continue;
            }
            let ext = file.extension().unwrap_or_default();

            if ext == "css" {
                styles.push((path, file.content()));
                continue;
            }

            let kind = UnitKind::classify(path, root_path.as_deref());
            let unit = if ext == "json" {
                data_unit(path, file.content())
            } else if SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
                self.cache
                    .transpile(path, file.content(), kind == UnitKind::Root)
            } else {
                debug!("not part of the preview: {}", path);
                continue;
            };
            units.push((position, RenderedUnit { kind, unit }));
        }

        units.sort_by_key(|(position, u)| (u.kind, *position));
        let units: Vec<RenderedUnit> = units.into_iter().map(|(_, u)| u).collect();

        for rendered in &units {
            let unit = &rendered.unit;
            if let Some(name) = unit.registered_name() {
                self.registry.register(name, &unit.source_path);
            }
            if unit.has_default_export {
                self.registry.register(&unit.module_name, &unit.source_path);
            }
        }

        let status = self.resolve_status(&units, root_path.as_deref());
        let root_name = match &status {
            RenderStatus::Mountable { root, .. } => Some(root.as_str()),
            RenderStatus::RootMissing { .. } => None,
        };
        let document = self.assemble(&units, &styles, root_name);

        let evicted = self.cache.sweep();
        info!(
            "build {}: {} unit(s), {} stylesheet(s), {} registered name(s)",
            self.builds,
            units.len(),
            styles.len(),
            self.registry.len()
        );
        debug!(
            "transform cache: {} hit(s), {} miss(es), {} evicted",
            self.cache.hits(),
            self.cache.misses(),
            evicted
        );

        RenderOutput {
            build: self.builds,
            document,
            status,
            units,
            styles: styles.iter().map(|(p, _)| p.to_string()).collect(),
        }
    }

    fn resolve_status(&self, units: &[RenderedUnit], root_path: Option<&str>) -> RenderStatus {
        let root = root_path.and_then(|path| {
            units
                .iter()
                .find(|u| u.unit.source_path == path)
                .and_then(|u| u.unit.registered_name())
                .map(|name| (name.to_string(), path.to_string()))
        });

        match root {
            Some((root, root_path)) => RenderStatus::Mountable { root, root_path },
            None => {
                let available =
                    serde_json::to_string(self.registry.names()).unwrap_or_else(|_| "[]".into());
                let message = format!("Root component not found. Available components: {}", available);
                warn!("{}", message);
                RenderStatus::RootMissing { message }
            }
        }
    }

    fn assemble(&self, units: &[RenderedUnit], styles: &[(&str, &str)], root: Option<&str>) -> String {
        let config = &self.config;
        let mut html = String::with_capacity(
            SHIM_JS.len() + units.iter().map(|u| u.unit.runnable_code.len() + 128).sum::<usize>(),
        );

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\" />\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(&config.title)));
        for src in &config.runtime_scripts {
            html.push_str(&format!(
                "<script crossorigin src=\"{}\"></script>\n",
                escape_html(src)
            ));
        }

        let shim = SHIM_JS
            .replace("__MOUNT_ID__", &script_string(&config.mount_id))
            .replace("__BUILD__", &self.builds.to_string());
        html.push_str(&format!("<script>\n{}</script>\n", shim));

        html.push_str(&format!("<style>\n{}\n</style>\n", escape_style(&config.base_styles)));
        for (path, css) in styles {
            html.push_str(&format!(
                "<style data-source=\"{}\">\n{}\n</style>\n",
                escape_html(path),
                escape_style(css)
            ));
        }
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<div id=\"{}\"></div>\n", escape_html(&config.mount_id)));

        for rendered in units {
            html.push_str(&format!(
                "<script>__preview.runUnit({}, {}, {});</script>\n",
                script_string(&rendered.unit.source_path),
                script_string(rendered.kind.as_str()),
                script_string(&rendered.unit.runnable_code)
            ));
        }

        let root_literal = root.map(script_string).unwrap_or_else(|| "null".to_string());
        let init = INIT_JS.replace("__ROOT_NAME__", &root_literal);
        html.push_str(&format!("<script>\n{}</script>\n", init));
        html.push_str("</body>\n</html>\n");
        html
    }
}

/// A unit registering a JSON file's parsed value under its module name.
fn data_unit(path: &str, content: &str) -> TranspiledUnit {
    let module = module_name(path);
    let mut unit = TranspiledUnit {
        source_path: path.to_string(),
        module_name: module.clone(),
        runnable_code: String::new(),
        declared_export_name: None,
        has_default_export: false,
        named_exports: Vec::new(),
        is_root: false,
        diagnostics: Vec::new(),
    };

    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => {
            let key = script_string(&module);
            unit.runnable_code = format!(
                "const __data = {};\n__registry.register({key}, __data);\n__registry.exportFrom({key}, \"default\", __data);\n",
                value
            );
            unit.has_default_export = true;
        }
        Err(e) => {
            warn!("{} is not valid JSON: {}", path, e);
            unit.diagnostics
                .push(Diagnostic::new(Stage::Syntax, format!("invalid JSON: {}", e)));
        }
    }
    unit
}

/// JSON string literal that is also safe inside an inline `<script>`.
fn script_string(s: &str) -> String {
    serde_json::to_string(s)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn escape_style(css: &str) -> String {
    STYLE_CLOSE_RE.replace_all(css, "<\\/style").into_owned()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
