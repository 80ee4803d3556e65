//! Source transformer
//!
//! Turns one generated source file into a self-contained runnable unit in a
//! fixed sequence of stages:
//!
//! 1. AST lowering: type erasure plus markup lowering ([`crate::lowering`])
//! 2. import resolution against the runtime registry
//! 3. export normalization plus the registration epilogue
//! 4. root wrapping (root unit only)
//!
//! and finally a syntax check over the result. A source the parser rejects
//! takes the text-level passes instead: type erasure, then imports and
//! exports, then markup lowering. A stage that cannot handle part of its input
//! leaves that part unchanged and records a diagnostic; the transformer itself
//! never fails. It is a pure function of its inputs.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::exports::{normalize_exports, ExportSummary};
use crate::imports::{module_name, resolve_imports};
use crate::lowering::{lower_source, LowerError};
use crate::markup::lower_markup;
use crate::syntax::check_unit_syntax;
use crate::types::erase_types;

lazy_static! {
    static ref DECLARED_APP_RE: Regex =
        Regex::new(r"(?m)(?:^|[;\s])(?:function|class|const|let|var)\s+App\b").unwrap();
}

/// Binding name tried for a root file that has no default export.
pub const FALLBACK_ROOT_NAME: &str = "App";

const TYPED_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    TypeErasure,
    Imports,
    Exports,
    Markup,
    Syntax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspiledUnit {
    pub source_path: String,
    /// Registry key other units import this one by.
    pub module_name: String,
    pub runnable_code: String,
    /// Identifier bound by the default export, if one was detected.
    pub declared_export_name: Option<String>,
    pub has_default_export: bool,
    pub named_exports: Vec<String>,
    pub is_root: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranspiledUnit {
    /// Name the unit's default export is registered under, preferring the
    /// declared identifier over the module name.
    pub fn registered_name(&self) -> Option<&str> {
        self.declared_export_name.as_deref().or(if self.has_default_export {
            Some(self.module_name.as_str())
        } else {
            None
        })
    }

    /// True if any stage had to leave input untransformed.
    pub fn is_degraded(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Execution category of a unit. Units run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    /// Parsed JSON registered as a value.
    Data,
    /// Type and model modules.
    Types,
    Component,
    Root,
    /// `main`/`index` bootstrap script.
    Entry,
}

const TYPE_SEGMENTS: &[&str] = &["types", "models", "interfaces", "typings", "@types"];

impl UnitKind {
    pub fn classify(path: &str, root_path: Option<&str>) -> Self {
        if root_path == Some(path) {
            return UnitKind::Root;
        }

        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".json") {
            return UnitKind::Data;
        }
        if lower.ends_with(".d.ts") {
            return UnitKind::Types;
        }

        let segments: Vec<&str> = lower.split('/').collect();
        let (file, dirs) = match segments.split_last() {
            Some((file, dirs)) => (*file, dirs),
            None => return UnitKind::Component,
        };
        let stem = file.split('.').next().unwrap_or(file);

        if TYPE_SEGMENTS.contains(&stem) || dirs.iter().any(|d| TYPE_SEGMENTS.contains(d)) {
            return UnitKind::Types;
        }
        if (stem == "main" || stem == "index") && (dirs.is_empty() || dirs == ["src"]) {
            return UnitKind::Entry;
        }
        UnitKind::Component
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Data => "data",
            UnitKind::Types => "types",
            UnitKind::Component => "component",
            UnitKind::Root => "root",
            UnitKind::Entry => "entry",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

fn is_typed(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| TYPED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Transform one source file. `is_root` selects the root wrapper.
pub fn transpile(path: &str, source: &str, is_root: bool) -> TranspiledUnit {
    let module = module_name(path);
    let mut diagnostics = Vec::new();

    let mut unchecked_depth = None;

    let (mut code, exports) = match lower_source(path, source) {
        Ok(lowered) => {
            diagnostics.extend(
                lowered
                    .diagnostics
                    .into_iter()
                    .map(|m| Diagnostic::new(Stage::TypeErasure, m)),
            );
            let code = resolve_imports(&lowered.code);
            normalize_exports(&code, &module)
        }
        Err(err) => {
            match err {
                LowerError::TooDeep(depth) => {
                    debug!("{} nests {} levels deep, using text passes", path, depth);
                    unchecked_depth = Some(depth);
                }
                LowerError::Parse(errors) => {
                    debug!("{} did not parse ({} error(s)), using text passes", path, errors.len());
                }
            }
            let (code, exports, markup_errors) = text_passes(path, source, &module);
            diagnostics.extend(
                markup_errors
                    .into_iter()
                    .map(|m| Diagnostic::new(Stage::Markup, m)),
            );
            (code, exports)
        }
    };

    let mut declared = exports.default_name.clone();
    if is_root && declared.is_none() && !exports.has_default && DECLARED_APP_RE.is_match(&code) {
        declared = Some(FALLBACK_ROOT_NAME.to_string());
    }

    let mut unit = TranspiledUnit {
        source_path: path.to_string(),
        module_name: module,
        runnable_code: String::new(),
        declared_export_name: declared,
        has_default_export: exports.has_default,
        named_exports: exports.named_exports(),
        is_root,
        diagnostics: Vec::new(),
    };

    if is_root {
        match unit.registered_name() {
            Some(name) => {
                code = wrap_root(&code, name, unit.declared_export_name.as_deref());
            }
            None => diagnostics.push(Diagnostic::new(
                Stage::Exports,
                "root file has no default export and declares no App component",
            )),
        }
    }

    match unchecked_depth {
        Some(depth) => diagnostics.push(Diagnostic::new(
            Stage::Syntax,
            format!("syntax not checked: source nests {} levels deep", depth),
        )),
        None => diagnostics.extend(
            check_unit_syntax(&code)
                .into_iter()
                .map(|m| Diagnostic::new(Stage::Syntax, m)),
        ),
    }

    if diagnostics.is_empty() {
        debug!("transpiled {} as module {:?}", path, unit.module_name);
    } else {
        for d in &diagnostics {
            warn!("{} ({:?}): {}", path, d.stage, d.message);
        }
    }

    unit.runnable_code = code;
    unit.diagnostics = diagnostics;
    unit
}

/// Fallback for sources the parser rejects. Returns the code, the detected
/// exports and the markup diagnostics.
fn text_passes(path: &str, source: &str, module: &str) -> (String, ExportSummary, Vec<String>) {
    let code = if is_typed(path) {
        erase_types(source)
    } else {
        source.to_string()
    };
    let code = resolve_imports(&code);
    let (code, exports) = normalize_exports(&code, module);
    let (code, markup_errors) = lower_markup(&code);
    (code, exports, markup_errors)
}

/// Guard the root unit so a failure is logged with context and still
/// surfaces to the caller.
fn wrap_root(code: &str, root_name: &str, binding: Option<&str>) -> String {
    let key = js_string(root_name);
    let mut out = String::with_capacity(code.len() + 512);
    out.push_str("try {\n");
    out.push_str(code);
    if !code.ends_with('\n') {
        out.push('\n');
    }
    if let Some(local) = binding {
        out.push_str(&format!(
            "if (typeof {local} !== 'undefined') {{ __registry.register({key}, {local}); }}\n"
        ));
    }
    out.push_str(&format!(
        "if (__registry.lookup({key}) !== undefined) {{\n  console.log(\"Registered root component \" + {key});\n}} else {{\n  console.error(\"Root component \" + {key} + \" was not registered\");\n}}\n"
    ));
    out.push_str(&format!(
        "}} catch (error) {{\n  console.error(\"Failed to evaluate root component \" + {key} + \":\", error);\n  throw error;\n}}\n"
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_typed() {
        assert!(is_typed("src/App.tsx"));
        assert!(is_typed("types.d.ts"));
        assert!(!is_typed("src/main.jsx"));
        assert!(!is_typed("Makefile"));
    }

    #[test]
    fn test_classify() {
        let root = Some("src/App.tsx");
        assert_eq!(UnitKind::classify("src/App.tsx", root), UnitKind::Root);
        assert_eq!(UnitKind::classify("src/types/user.ts", root), UnitKind::Types);
        assert_eq!(UnitKind::classify("src/types.ts", root), UnitKind::Types);
        assert_eq!(UnitKind::classify("global.d.ts", root), UnitKind::Types);
        assert_eq!(UnitKind::classify("src/data/items.json", root), UnitKind::Data);
        assert_eq!(UnitKind::classify("src/main.tsx", root), UnitKind::Entry);
        assert_eq!(UnitKind::classify("index.js", root), UnitKind::Entry);
        assert_eq!(
            UnitKind::classify("src/components/index.ts", root),
            UnitKind::Component
        );
        assert_eq!(UnitKind::classify("src/components/Card.tsx", root), UnitKind::Component);
        assert!(UnitKind::Types < UnitKind::Component && UnitKind::Root < UnitKind::Entry);
    }

    #[test]
    fn test_registered_name_prefers_declared() {
        let unit = transpile("src/App.tsx", "export default function Shell() { return null; }", false);
        assert_eq!(unit.registered_name(), Some("Shell"));
        let anon = transpile("src/Card.jsx", "export default () => null;", false);
        assert_eq!(anon.registered_name(), Some("Card"));
        let none = transpile("src/util.js", "export const x = 1;", false);
        assert_eq!(none.registered_name(), None);
    }

    #[test]
    fn test_root_wrapper() {
        let unit = transpile("src/App.jsx", "export default function App() { return null; }", true);
        assert!(unit.runnable_code.starts_with("try {\n"));
        assert!(unit
            .runnable_code
            .contains("if (typeof App !== 'undefined') { __registry.register(\"App\", App); }"));
        assert!(unit.runnable_code.contains("throw error;"));
        assert!(unit.diagnostics.is_empty(), "{:?}", unit.diagnostics);
    }

    #[test]
    fn test_root_without_default_export_uses_app_binding() {
        let unit = transpile("App.js", "function App() { return null; }", true);
        assert_eq!(unit.declared_export_name.as_deref(), Some("App"));
        assert!(unit.runnable_code.contains("__registry.register(\"App\", App)"));
    }

    #[test]
    fn test_root_without_any_component() {
        let unit = transpile("App.js", "const x = 1;", true);
        assert_eq!(unit.registered_name(), None);
        assert!(unit
            .diagnostics
            .iter()
            .any(|d| d.stage == Stage::Exports));
    }
}
