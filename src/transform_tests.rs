//! Source transformer tests over the whole pipeline
//!
//! Stage-level behaviour is covered next to each stage; these tests check
//! that the stages compose into runnable units.

#[cfg(test)]
mod tests {
    use crate::transform::{transpile, Stage, UnitKind};

    /// Drop whitespace outside double-quoted strings so assertions do not
    /// depend on printer layout.
    fn squash(code: &str) -> String {
        let mut out = String::with_capacity(code.len());
        let mut in_string = false;
        let mut escaped = false;
        for c in code.chars() {
            if in_string {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
            } else if c == '"' {
                in_string = true;
                out.push(c);
            } else if !c.is_whitespace() {
                out.push(c);
            }
        }
        out
    }

    fn has(code: &str, fragment: &str) -> bool {
        squash(code).contains(&squash(fragment))
    }

    const TODO_LIST: &str = r#"import React, { useState } from 'react';
import Button from './components/Button';
import type { Item } from './types';
import { formatDate } from '../utils/format';

interface Props {
  title: string;
  items?: Item[];
}

export default function TodoList({ title, items = [] }: Props) {
  const [count, setCount] = useState<number>(0);
  return (
    <div className="list">
      <h2>{title}</h2>
      {items.map((item: Item) => <p key={item.id}>{item.name}</p>)}
      <Button onClick={() => setCount(count + 1)}>Clicked {count} times</Button>
      <small>{formatDate(new Date())}</small>
    </div>
  );
}
"#;

    #[test]
    fn test_minimal_root_component() {
        let unit = transpile(
            "App.tsx",
            "export default function App(){return <div>Hi</div>}",
            true,
        );
        assert!(unit.is_root);
        assert_eq!(unit.module_name, "App");
        assert_eq!(unit.declared_export_name.as_deref(), Some("App"));
        assert!(
            has(&unit.runnable_code, r#"function App() { return __h("div", null, ["Hi"]); }"#),
            "{}",
            unit.runnable_code
        );
        assert!(unit
            .runnable_code
            .contains("__registry.register(\"App\", App);"));
        assert!(unit.diagnostics.is_empty(), "{:?}", unit.diagnostics);
    }

    #[test]
    fn test_typed_component_becomes_runnable() {
        let unit = transpile("src/TodoList.tsx", TODO_LIST, false);
        let code = &unit.runnable_code;

        assert!(unit.diagnostics.is_empty(), "{:?}\n{}", unit.diagnostics, code);
        assert!(!code.contains("import "));
        assert!(!code.contains("interface"));
        assert!(!code.contains(": Props"));
        assert!(code.contains("const { useState } = React;"));
        assert!(code.contains("const Button = __registry.lookup(\"Button\");"));
        assert!(code.contains("const formatDate = __registry.named(\"format\", \"formatDate\");"));
        assert!(code.contains("useState(0)"));
        assert!(has(code, r#"__h("div", { className: "list" }, ["#));
        assert!(has(code, r#"__h("p", { key: item.id }, [item.name])"#));
        assert!(has(code, r#"["Clicked ", count, " times"]"#));
        assert!(code.contains("__registry.register(\"TodoList\", TodoList);"));
        assert_eq!(unit.declared_export_name.as_deref(), Some("TodoList"));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let first = transpile("src/TodoList.tsx", TODO_LIST, false);
        let second = transpile("src/TodoList.tsx", TODO_LIST, false);
        assert_eq!(first, second);
        assert_eq!(first.runnable_code.as_bytes(), second.runnable_code.as_bytes());
    }

    #[test]
    fn test_entry_script() {
        let source = "import React from 'react';\nimport ReactDOM from 'react-dom/client';\nimport App from './App';\nimport './index.css';\n\nReactDOM.createRoot(document.getElementById('root')!).render(\n  <React.StrictMode>\n    <App />\n  </React.StrictMode>\n);\n";
        let unit = transpile("src/main.tsx", source, false);
        assert_eq!(UnitKind::classify("src/main.tsx", Some("src/App.tsx")), UnitKind::Entry);
        assert!(unit.diagnostics.is_empty(), "{:?}", unit.diagnostics);
        assert!(unit
            .runnable_code
            .contains("const App = __registry.lookup(\"App\");"));
        assert!(has(&unit.runnable_code, "ReactDOM.createRoot(document.getElementById("));
        assert!(!unit.runnable_code.contains(")!"));
        assert!(has(
            &unit.runnable_code,
            ".render(__h(React.StrictMode, null, [__h(App, null, [])]));"
        ));
        assert!(!unit.runnable_code.contains("index.css"));
        assert!(!unit.has_default_export);
    }

    #[test]
    fn test_plain_javascript_skips_type_erasure() {
        let source = "export const pick = (a, b) => a ? b : { b: a };\n";
        let unit = transpile("src/pick.js", source, false);
        assert!(squash(&unit.runnable_code).starts_with(&squash("const pick = (a, b) => a ? b : { b: a };")));
        assert_eq!(unit.named_exports, vec!["pick".to_string()]);
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_broken_markup_degrades_with_diagnostics() {
        let unit = transpile("src/Broken.jsx", "export default function Broken() {\n  return <div>oops;\n}\n", false);
        let stages: Vec<Stage> = unit.diagnostics.iter().map(|d| d.stage).collect();
        assert!(stages.contains(&Stage::Markup), "{:?}", unit.diagnostics);
        assert!(stages.contains(&Stage::Syntax), "{:?}", unit.diagnostics);
        assert!(unit.is_degraded());
        // Registration still happens; the failure surfaces when the unit runs
        assert_eq!(unit.registered_name(), Some("Broken"));
    }

    #[test]
    fn test_enum_and_parameter_properties() {
        let source = "export enum Status { Idle, Busy }\nexport class Api {\n  constructor(private base: string, readonly retries: number = 3) {}\n  get(path: string): Promise<Response> { return fetch(this.base + path); }\n}\n";
        let unit = transpile("src/api.ts", source, false);
        let code = &unit.runnable_code;
        assert!(unit.diagnostics.is_empty(), "{:?}\n{}", unit.diagnostics, code);
        assert!(has(code, "const Status = Object.freeze({ Idle: 0, Busy: 1 });"), "{}", code);
        assert!(has(code, "constructor(base, retries = 3) { this.base = base; this.retries = retries; }"), "{}", code);
        assert!(has(code, "get(path) { return fetch(this.base + path); }"));
        assert!(code.contains("__registry.exportFrom(\"api\", \"Status\", Status);"));
        let mut named = unit.named_exports.clone();
        named.sort();
        assert_eq!(named, vec!["Api".to_string(), "Status".to_string()]);
    }

    #[test]
    fn test_generic_async_arrow() {
        let source = "export const load = async <T,>(url: string): Promise<T> => {\n  const res = await fetch(url);\n  return res.json() as Promise<T>;\n};\n";
        let unit = transpile("src/load.tsx", source, false);
        assert!(unit.diagnostics.is_empty(), "{:?}", unit.diagnostics);
        assert!(has(&unit.runnable_code, "const load = async (url) => { const res = await fetch(url); return res.json(); };"), "{}", unit.runnable_code);
    }

    #[test]
    fn test_deep_markup_degrades_without_overflow() {
        let source = format!(
            "export default function Deep() {{ return {}x{}; }}",
            "<b>{".repeat(5000),
            "}</b>".repeat(5000)
        );
        let unit = transpile("src/Deep.jsx", &source, false);
        assert!(unit
            .diagnostics
            .iter()
            .any(|d| d.stage == Stage::Markup && d.message.contains("nested deeper than")));
        assert!(unit
            .diagnostics
            .iter()
            .any(|d| d.stage == Stage::Syntax && d.message.starts_with("syntax not checked")));
        assert_eq!(unit.registered_name(), Some("Deep"));
    }

    #[test]
    fn test_arbitrary_input_never_panics() {
        let inputs = [
            "",
            "<",
            "<<<>>>{{{",
            ")))]]]}}}",
            "`unterminated ${",
            "/* open comment",
            "const s = 'unterminated",
            "export default",
            "export { a as }",
            "import from;",
            "enum {",
            "interface",
            "function f(a: { b: [}) {}",
            "x = <A b={<B c={<C",
            "const re = /[/]/; const t = a </b>;",
        ];
        for input in inputs {
            for (path, root) in [("App.tsx", true), ("x.jsx", false)] {
                let unit = transpile(path, input, root);
                assert_eq!(unit.source_path, path);
            }
        }
    }
}
