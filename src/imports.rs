//! Stage 2: module import resolution
//!
//! Static imports are rewritten into lookups against the runtime registry,
//! because units are evaluated as plain function bodies with no module
//! loader behind them.
//!
//! ```text
//! import React, { useState } from 'react'   => const { useState } = React;
//! import Button from './Button'             => const Button = __registry.lookup("Button");
//! import { Card as C } from '../ui/Card'    => const C = __registry.named("Card", "Card");
//! import * as api from './api'              => const api = __registry.module("api");
//! import './index.css'                      => (dropped)
//! import styles from './App.module.css'      => const styles = __registry.styles();
//! import dayjs from 'dayjs'                 => const dayjs = __registry.external("dayjs", "default");
//! ```

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::lexer::is_valid_identifier;

lazy_static! {
    static ref IMPORT_FROM_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+(?P<clause>[\w$*{}\s,]+?)\s+from\s+['"](?P<src>[^'"\n]+)['"][ \t]*;?"#
    )
    .unwrap();
    static ref IMPORT_BARE_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*import\s+['"](?P<src>[^'"\n]+)['"][ \t]*;?"#).unwrap();
}

const STYLE_EXTENSIONS: &[&str] = &[".css", ".scss", ".sass", ".less"];
const SCRIPT_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".js", ".mjs", ".json"];

/// Where an import points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// Provided by the runtime as a global (`React` or `ReactDOM`).
    Framework(&'static str),
    /// Another generated file, identified by its module name.
    Local(String),
    /// A stylesheet; its content is injected separately.
    Style,
    /// A third-party package that cannot be loaded in the sandbox.
    Package(String),
}

impl ImportSource {
    pub fn classify(spec: &str) -> Self {
        match spec {
            "react" | "react/jsx-runtime" | "react/jsx-dev-runtime" => {
                return ImportSource::Framework("React")
            }
            "react-dom" | "react-dom/client" => return ImportSource::Framework("ReactDOM"),
            _ => {}
        }

        let lower = spec.to_ascii_lowercase();
        if STYLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return ImportSource::Style;
        }

        if spec.starts_with("./")
            || spec.starts_with("../")
            || spec.starts_with('/')
            || spec.starts_with("@/")
            || spec.starts_with("~/")
            || spec == "."
            || spec == ".."
        {
            return ImportSource::Local(module_name(spec));
        }

        ImportSource::Package(spec.to_string())
    }
}

/// Registry key for a module path: the file stem, or the directory name for
/// `index` files.
///
/// `./components/Button.tsx` -> `Button`, `./components` -> `components`,
/// `./components/index` -> `components`.
pub fn module_name(spec: &str) -> String {
    let trimmed = spec.trim_end_matches('/');
    let segments: Vec<&str> = trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != ".." && *s != "@" && *s != "~")
        .collect();

    let Some(last) = segments.last() else {
        return "index".to_string();
    };

    let mut stem = *last;
    for ext in SCRIPT_EXTENSIONS {
        if let Some(s) = stem.strip_suffix(ext) {
            stem = s;
            break;
        }
    }
    if let Some(s) = stem.strip_suffix(".d") {
        stem = s;
    }

    if stem == "index" && segments.len() > 1 {
        return segments[segments.len() - 2].to_string();
    }
    stem.to_string()
}

/// Parsed import clause: `Default, { a, b as c }` or `* as ns`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportClause {
    pub default: Option<String>,
    pub namespace: Option<String>,
    /// `(imported, local)` pairs.
    pub named: Vec<(String, String)>,
    pub type_only: bool,
}

impl ImportClause {
    pub fn parse(clause: &str) -> Self {
        let mut result = ImportClause::default();
        let mut rest = clause.trim();

        if let Some(stripped) = rest.strip_prefix("type ") {
            result.type_only = true;
            rest = stripped.trim();
        }

        let (outside, inside) = match (rest.find('{'), rest.rfind('}')) {
            (Some(open), Some(close)) if close > open => (
                format!("{} {}", &rest[..open], &rest[close + 1..]),
                Some(&rest[open + 1..close]),
            ),
            _ => (rest.to_string(), None),
        };

        if let Some(inner) = inside {
            for spec in inner.split(',') {
                let spec = spec.trim();
                if spec.is_empty() || spec.starts_with("type ") {
                    continue;
                }
                let (imported, local) = match spec.split_once(" as ") {
                    Some((i, l)) => (i.trim(), l.trim()),
                    None => (spec, spec),
                };
                if is_valid_identifier(local) {
                    result.named.push((imported.to_string(), local.to_string()));
                }
            }
        }

        for part in outside.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(ns) = part.strip_prefix('*') {
                let ns = ns.trim().trim_start_matches("as").trim();
                if is_valid_identifier(ns) {
                    result.namespace = Some(ns.to_string());
                }
            } else if is_valid_identifier(part) {
                result.default = Some(part.to_string());
            }
        }

        result
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Rewrite every static import in `code`.
pub fn resolve_imports(code: &str) -> String {
    let code = IMPORT_FROM_RE.replace_all(code, |caps: &Captures| {
        let clause = ImportClause::parse(&caps["clause"]);
        let source = ImportSource::classify(caps["src"].trim());
        let lead = leading_ws(&caps[0]);
        let rewritten = rewrite_import(&clause, &source);
        if rewritten.is_empty() {
            String::new()
        } else {
            format!("{}{}", lead, rewritten)
        }
    });

    // Side-effect imports: stylesheets are injected separately, local scripts
    // already run in dependency order and packages cannot be loaded.
    IMPORT_BARE_RE.replace_all(&code, "").into_owned()
}

fn leading_ws(text: &str) -> &str {
    let trimmed = text.trim_start_matches(&[' ', '\t'][..]);
    &text[..text.len() - trimmed.len()]
}

fn rewrite_import(clause: &ImportClause, source: &ImportSource) -> String {
    if clause.type_only {
        return String::new();
    }

    let mut lines = Vec::new();
    match source {
        // Stylesheets are injected as <style> blocks; bound names map each
        // class key to itself.
        ImportSource::Style => {
            for local in clause.default.iter().chain(clause.namespace.iter()) {
                lines.push(format!("const {} = __registry.styles();", local));
            }
            if !clause.named.is_empty() {
                let bindings: Vec<String> = clause
                    .named
                    .iter()
                    .map(|(imported, local)| {
                        if imported == local {
                            local.clone()
                        } else {
                            format!("{}: {}", imported, local)
                        }
                    })
                    .collect();
                lines.push(format!("const {{ {} }} = __registry.styles();", bindings.join(", ")));
            }
        }
        ImportSource::Framework(global) => {
            if let Some(default) = &clause.default {
                if default != global {
                    lines.push(format!("const {} = {};", default, global));
                }
            }
            if let Some(ns) = &clause.namespace {
                if ns != global {
                    lines.push(format!("const {} = {};", ns, global));
                }
            }
            if !clause.named.is_empty() {
                let bindings: Vec<String> = clause
                    .named
                    .iter()
                    .map(|(imported, local)| {
                        if imported == local {
                            local.clone()
                        } else {
                            format!("{}: {}", imported, local)
                        }
                    })
                    .collect();
                lines.push(format!("const {{ {} }} = {};", bindings.join(", "), global));
            }
        }
        ImportSource::Local(module) => {
            let module = js_string(module);
            if let Some(default) = &clause.default {
                lines.push(format!("const {} = __registry.lookup({});", default, module));
            }
            if let Some(ns) = &clause.namespace {
                lines.push(format!("const {} = __registry.module({});", ns, module));
            }
            for (imported, local) in &clause.named {
                if imported == "default" {
                    lines.push(format!("const {} = __registry.lookup({});", local, module));
                } else {
                    lines.push(format!(
                        "const {} = __registry.named({}, {});",
                        local,
                        module,
                        js_string(imported)
                    ));
                }
            }
        }
        ImportSource::Package(pkg) => {
            let pkg = js_string(pkg);
            if let Some(default) = &clause.default {
                lines.push(format!(
                    "const {} = __registry.external({}, \"default\");",
                    default, pkg
                ));
            }
            if let Some(ns) = &clause.namespace {
                lines.push(format!("const {} = __registry.external({}, \"*\");", ns, pkg));
            }
            for (imported, local) in &clause.named {
                lines.push(format!(
                    "const {} = __registry.external({}, {});",
                    local,
                    pkg,
                    js_string(imported)
                ));
            }
        }
    }
    lines.join(" ")
}
