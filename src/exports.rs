//! Stage 3: export normalization
//!
//! Export syntax is removed (units are function bodies, not modules) and
//! replaced by registration calls appended to the end of the unit, so a
//! binding is registered only after its declaration has run.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::imports::{ImportClause, ImportSource};
use crate::lexer::is_valid_identifier;

lazy_static! {
    static ref DEFAULT_FUNCTION_RE: Regex = Regex::new(
        r"(?m)^([ \t]*)export\s+default\s+(async\s+)?function(\s*\*)?\s*([A-Za-z_$][\w$]*)?\s*\("
    )
    .unwrap();
    static ref DEFAULT_CLASS_RE: Regex =
        Regex::new(r"(?m)^([ \t]*)export\s+default\s+class\b\s*([A-Za-z_$][\w$]*)?").unwrap();
    static ref DEFAULT_DECL_RE: Regex =
        Regex::new(r"(?m)^([ \t]*)export\s+default\s+(const|let|var)\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref DEFAULT_IDENT_RE: Regex =
        Regex::new(r"(?m)^([ \t]*)export\s+default\s+([A-Za-z_$][\w$.]*)[ \t]*;?[ \t]*$").unwrap();
    static ref DEFAULT_EXPR_RE: Regex = Regex::new(r"(?m)^([ \t]*)export\s+default\s+").unwrap();
    static ref NAMED_DECL_RE: Regex =
        Regex::new(r"(?m)^([ \t]*)export\s+(const|let|var)\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref NAMED_FUNCTION_RE: Regex = Regex::new(
        r"(?m)^([ \t]*)export\s+(async\s+)?function(\s*\*)?\s*([A-Za-z_$][\w$]*)"
    )
    .unwrap();
    static ref NAMED_CLASS_RE: Regex =
        Regex::new(r"(?m)^([ \t]*)export\s+class\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref REEXPORT_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*export\s+(?P<what>\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"](?P<src>[^'"\n]+)['"][ \t]*;?"#
    )
    .unwrap();
    static ref EXPORT_LIST_RE: Regex =
        Regex::new(r"(?m)^[ \t]*export\s*\{(?P<list>[^}]*)\}[ \t]*;?").unwrap();
}

/// Binding introduced for a default export that has no name of its own.
pub const ANONYMOUS_DEFAULT: &str = "__default_export";

/// One binding this unit exposes to other units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportBinding {
    /// `exported` is reachable as `local` in this unit.
    Local { exported: String, local: String },
    /// `exported` forwards `imported` from another module.
    Forward {
        exported: String,
        module: String,
        imported: String,
    },
    /// Every export of another module.
    ForwardAll { module: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Identifier bound by the default export, when the source named one.
    pub default_name: Option<String>,
    /// Whether the unit has a default export at all.
    pub has_default: bool,
    pub bindings: Vec<ExportBinding>,
}

impl ExportSummary {
    /// Names other units can import by name (defaults excluded).
    pub fn named_exports(&self) -> Vec<String> {
        self.bindings
            .iter()
            .filter_map(|b| match b {
                ExportBinding::Local { exported, .. } | ExportBinding::Forward { exported, .. }
                    if exported != "default" =>
                {
                    Some(exported.clone())
                }
                _ => None,
            })
            .collect()
    }
}

/// Binding name for an anonymous default export of `module`.
fn fallback_name(module: &str) -> String {
    let cleaned: String = module
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if is_valid_identifier(&cleaned) {
        cleaned
    } else {
        format!("_{}", cleaned)
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Rewrite exports in `code` for the unit registered as `module`.
/// Returns the rewritten code, registration epilogue included.
pub fn normalize_exports(code: &str, module: &str) -> (String, ExportSummary) {
    let mut summary = ExportSummary::default();
    let mut code = code.to_string();

    // Forwarding exports first, so the brace lists below don't see them.
    code = REEXPORT_RE
        .replace_all(&code, |caps: &Captures| {
            let source = ImportSource::classify(caps["src"].trim());
            let target = match source {
                ImportSource::Local(m) => m,
                _ => return String::new(),
            };
            let what = caps["what"].trim();
            if let Some(list) = what.strip_prefix('{') {
                let clause = ImportClause::parse(&format!("{{{}", list));
                for (imported, exported) in clause.named {
                    summary.bindings.push(ExportBinding::Forward {
                        exported,
                        module: target.clone(),
                        imported,
                    });
                }
            } else if let Some(alias) = what.split_whitespace().nth(2) {
                summary.bindings.push(ExportBinding::Local {
                    exported: alias.to_string(),
                    local: format!("__registry.module({})", js_string(&target)),
                });
            } else {
                summary
                    .bindings
                    .push(ExportBinding::ForwardAll { module: target });
            }
            String::new()
        })
        .into_owned();

    code = DEFAULT_FUNCTION_RE
        .replace_all(&code, |caps: &Captures| {
            let name = caps
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| fallback_name(module));
            summary.has_default = true;
            summary.default_name = Some(name.clone());
            format!(
                "{}{}function{} {}(",
                &caps[1],
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str().trim()),
                name
            )
        })
        .into_owned();

    code = DEFAULT_CLASS_RE
        .replace_all(&code, |caps: &Captures| {
            summary.has_default = true;
            match caps.get(2).map(|m| m.as_str()) {
                Some(name) if name != "extends" => {
                    summary.default_name = Some(name.to_string());
                    format!("{}class {}", &caps[1], name)
                }
                heritage => {
                    let name = fallback_name(module);
                    summary.default_name = Some(name.clone());
                    let suffix = if heritage.is_some() { " extends" } else { "" };
                    format!("{}class {}{}", &caps[1], name, suffix)
                }
            }
        })
        .into_owned();

    code = DEFAULT_DECL_RE
        .replace_all(&code, |caps: &Captures| {
            summary.has_default = true;
            summary.default_name = Some(caps[3].to_string());
            format!("{}{} {}", &caps[1], &caps[2], &caps[3])
        })
        .into_owned();

    code = DEFAULT_IDENT_RE
        .replace_all(&code, |caps: &Captures| {
            let target = caps[2].to_string();
            summary.has_default = true;
            if is_valid_identifier(&target) {
                summary.default_name = Some(target);
                caps[1].to_string()
            } else {
                // member expression such as `export default Foo.Bar`
                format!("{}const {} = {};", &caps[1], ANONYMOUS_DEFAULT, target)
            }
        })
        .into_owned();

    code = DEFAULT_EXPR_RE
        .replace_all(&code, |caps: &Captures| {
            summary.has_default = true;
            format!("{}const {} = ", &caps[1], ANONYMOUS_DEFAULT)
        })
        .into_owned();

    code = NAMED_DECL_RE
        .replace_all(&code, |caps: &Captures| {
            let name = caps[3].to_string();
            summary.bindings.push(ExportBinding::Local {
                exported: name.clone(),
                local: name,
            });
            format!("{}{} {}", &caps[1], &caps[2], &caps[3])
        })
        .into_owned();

    code = NAMED_FUNCTION_RE
        .replace_all(&code, |caps: &Captures| {
            let name = caps[4].to_string();
            summary.bindings.push(ExportBinding::Local {
                exported: name.clone(),
                local: name.clone(),
            });
            format!(
                "{}{}function{} {}",
                &caps[1],
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str().trim()),
                name
            )
        })
        .into_owned();

    code = NAMED_CLASS_RE
        .replace_all(&code, |caps: &Captures| {
            let name = caps[2].to_string();
            summary.bindings.push(ExportBinding::Local {
                exported: name.clone(),
                local: name.clone(),
            });
            format!("{}class {}", &caps[1], name)
        })
        .into_owned();

    code = EXPORT_LIST_RE
        .replace_all(&code, |caps: &Captures| {
            for spec in caps["list"].split(',') {
                let spec = spec.trim();
                if spec.is_empty() || spec.starts_with("type ") {
                    continue;
                }
                let (local, exported) = match spec.split_once(" as ") {
                    Some((l, e)) => (l.trim(), e.trim()),
                    None => (spec, spec),
                };
                if exported == "default" {
                    summary.has_default = true;
                    summary.default_name = Some(local.to_string());
                } else if is_valid_identifier(local) {
                    summary.bindings.push(ExportBinding::Local {
                        exported: exported.to_string(),
                        local: local.to_string(),
                    });
                }
            }
            String::new()
        })
        .into_owned();

    let epilogue = registration_epilogue(module, &summary);
    if !epilogue.is_empty() {
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&epilogue);
    }

    (code, summary)
}

/// Registration statements for everything the unit exports.
///
/// The default export is registered under its own name and under the
/// module name, so both `lookup("Header")` forms resolve.
fn registration_epilogue(module: &str, summary: &ExportSummary) -> String {
    let module_key = js_string(module);
    let mut lines = Vec::new();

    if summary.has_default {
        let local = summary
            .default_name
            .clone()
            .unwrap_or_else(|| ANONYMOUS_DEFAULT.to_string());
        if local != ANONYMOUS_DEFAULT && local != module {
            lines.push(format!("__registry.register({}, {});", js_string(&local), local));
        }
        lines.push(format!("__registry.register({}, {});", module_key, local));
        lines.push(format!(
            "__registry.exportFrom({}, \"default\", {});",
            module_key, local
        ));
    }

    for binding in &summary.bindings {
        match binding {
            ExportBinding::Local { exported, local } => lines.push(format!(
                "__registry.exportFrom({}, {}, {});",
                module_key,
                js_string(exported),
                local
            )),
            ExportBinding::Forward {
                exported,
                module: source,
                imported,
            } => {
                let value = if imported == "default" {
                    format!("__registry.lookup({})", js_string(source))
                } else {
                    format!(
                        "__registry.named({}, {})",
                        js_string(source),
                        js_string(imported)
                    )
                };
                lines.push(format!(
                    "__registry.exportFrom({}, {}, {});",
                    module_key,
                    js_string(exported),
                    value
                ));
            }
            ExportBinding::ForwardAll { module: source } => lines.push(format!(
                "__registry.reexport({}, {});",
                module_key,
                js_string(source)
            )),
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_function() {
        let (code, summary) = normalize_exports("export default function App() {\n  return null;\n}", "App");
        assert_eq!(
            code,
            "function App() {\n  return null;\n}\n__registry.register(\"App\", App);\n__registry.exportFrom(\"App\", \"default\", App);"
        );
        assert_eq!(summary.default_name.as_deref(), Some("App"));
    }

    #[test]
    fn test_default_registered_under_module_and_name() {
        let (code, _) = normalize_exports("export default function Header() {}", "Nav");
        assert!(code.contains("__registry.register(\"Header\", Header);"));
        assert!(code.contains("__registry.register(\"Nav\", Header);"));
    }

    #[test]
    fn test_anonymous_default_function() {
        let (code, summary) = normalize_exports("export default function () {}", "Footer");
        assert!(code.starts_with("function Footer() {}"));
        assert_eq!(summary.default_name.as_deref(), Some("Footer"));
    }

    #[test]
    fn test_default_identifier_statement() {
        let src = "const App = () => null;\n\nexport default App;\n";
        let (code, summary) = normalize_exports(src, "App");
        assert!(!code.contains("export"));
        assert!(code.starts_with("const App = () => null;\n\n\n"));
        assert_eq!(summary.default_name.as_deref(), Some("App"));
    }

    #[test]
    fn test_default_expression() {
        let (code, summary) = normalize_exports("export default memo(Card);", "Card");
        assert!(code.starts_with("const __default_export = memo(Card);"));
        assert_eq!(summary.default_name, None);
        assert!(summary.has_default);
        assert!(code.contains("__registry.register(\"Card\", __default_export);"));
    }

    #[test]
    fn test_named_exports() {
        let src = "export const a = 1;\nexport function b() {}\nexport async function c() {}\nexport class D {}\nconst e = 2;\nexport { e, a as alias };";
        let (code, summary) = normalize_exports(src, "utils");
        assert!(code.starts_with(
            "const a = 1;\nfunction b() {}\nasync function c() {}\nclass D {}\nconst e = 2;\n"
        ));
        assert_eq!(summary.named_exports(), vec!["a", "b", "c", "D", "e", "alias"]);
        assert!(code.contains("__registry.exportFrom(\"utils\", \"alias\", a);"));
        assert!(!summary.has_default);
    }

    #[test]
    fn test_reexports() {
        let src = "export { Button, default as Card } from './Card';\nexport * from './hooks';";
        let (code, summary) = normalize_exports(src, "components");
        assert!(code.contains(
            "__registry.exportFrom(\"components\", \"Button\", __registry.named(\"Card\", \"Button\"));"
        ));
        assert!(code.contains(
            "__registry.exportFrom(\"components\", \"Card\", __registry.lookup(\"Card\"));"
        ));
        assert!(code.contains("__registry.reexport(\"components\", \"hooks\");"));
        assert_eq!(summary.named_exports(), vec!["Button", "Card"]);
    }

    #[test]
    fn test_no_exports_no_epilogue() {
        let (code, summary) = normalize_exports("const x = 1;", "x");
        assert_eq!(code, "const x = 1;");
        assert_eq!(summary, ExportSummary::default());
    }

    #[test]
    fn test_anonymous_default_class_with_heritage() {
        let (code, summary) = normalize_exports("export default class extends Base {}", "Widget");
        assert!(code.starts_with("class Widget extends Base {}"));
        assert_eq!(summary.default_name.as_deref(), Some("Widget"));
    }

    #[test]
    fn test_default_const() {
        let (code, summary) = normalize_exports("export default const theme = {};", "theme");
        assert!(code.starts_with("const theme = {};"));
        assert_eq!(summary.default_name.as_deref(), Some("theme"));
        assert!(!code.contains("register(\"theme\", theme);\n__registry.register(\"theme\""));
    }
}
