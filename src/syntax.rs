//! Syntax check for transformed units
//!
//! Parses runnable code the way the sandbox will evaluate it: as the body of
//! a plain (non-module) function. Any parse error means the unit will fail to
//! load, which is reported as a diagnostic instead of being discovered only
//! in the browser.

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Parameters every unit body is evaluated with.
pub const UNIT_PARAMS: &[&str] = &["React", "ReactDOM", "__h", "__Fragment", "__registry"];

/// Parse `code` as a function body. Returns one message per syntax error.
pub fn check_unit_syntax(code: &str) -> Vec<String> {
    let wrapped = format!(
        "(function ({}) {{\n{}\n}});",
        UNIT_PARAMS.join(", "),
        code
    );

    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_module(false)
        .with_typescript(false)
        .with_jsx(false);
    let ret = Parser::new(&allocator, &wrapped, source_type).parse();

    ret.errors.iter().map(|e| e.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_body() {
        let errors = check_unit_syntax(
            "function App() { return __h(\"div\", null, [\"Hi\"]); }\n__registry.register(\"App\", App);",
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_return_allowed_at_body_level() {
        assert!(check_unit_syntax("return;").is_empty());
    }

    #[test]
    fn test_leftover_markup_rejected() {
        assert!(!check_unit_syntax("const a = <div>;").is_empty());
    }

    #[test]
    fn test_leftover_annotation_rejected() {
        assert!(!check_unit_syntax("function f(a: number) {}").is_empty());
    }
}
