//! Markup parsing and lowering
//!
//! Recognises JSX-style markup embedded in script text and lowers each
//! element to a call of the hyperscript factory:
//!
//! ```text
//! <div className="a">Hi {name}</div>
//!   => __h("div", {className: "a"}, ["Hi ", name])
//! ```
//!
//! The walker in this module is also used by type erasure, which swaps every
//! markup region for a placeholder before touching the surrounding code.
//!
//! Rules:
//! - Lowercase tag names are intrinsic and emitted as string literals.
//! - Capitalized and member (`a.b`) tags are emitted as identifiers.
//! - Fragments lower to the fragment marker `__Fragment`.
//! - Children are always an array; empty or self-closing elements get `[]`.
//! - An element that fails to parse is left in place and reported once.
//! - Nesting deeper than [`MAX_MARKUP_DEPTH`] stops markup recognition for
//!   the rest of the unit.

use lazy_static::lazy_static;
use regex::Regex;

use crate::lexer::{
    self, is_ident_char, is_ident_start, is_valid_identifier, read_word, skip_block_comment,
    skip_line_comment, skip_number, skip_regex, skip_string, skip_template, skip_ws, starts_with,
    Tracker,
};

pub const FACTORY: &str = "__h";
pub const FRAGMENT: &str = "__Fragment";
const PLACEHOLDER_PREFIX: &str = "__PREVIEW_MARKUP_";

/// Elements plus expression containers that may enclose each other.
pub const MAX_MARKUP_DEPTH: usize = 64;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"__PREVIEW_MARKUP_(\d+)__").unwrap();
    static ref ENTITY_RE: Regex = Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// AST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// `None` for a fragment.
    pub name: Option<String>,
    pub attrs: Vec<Attr>,
    pub children: Vec<Child>,
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Named { name: String, value: AttrValue },
    Spread(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Quoted literal; raw text between the quotes plus the quote char.
    Str(String, char),
    /// Raw source between `{` and `}`.
    Expr(String),
    Element(Box<Element>),
    /// Attribute present without a value.
    Bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Text(String),
    Expr(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupError {
    pub offset: usize,
    pub message: String,
    pub too_deep: bool,
}

impl MarkupError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            too_deep: false,
        }
    }

    fn too_deep(offset: usize) -> Self {
        Self {
            offset,
            message: format!("markup nested deeper than {} levels", MAX_MARKUP_DEPTH),
            too_deep: true,
        }
    }
}

/// A run of code or a parsed markup region.
#[derive(Debug, Clone)]
pub enum Segment {
    Code(String),
    Markup(Element),
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALKER
// ═══════════════════════════════════════════════════════════════════════════════

/// True if the `<` at `i` opens markup given the previous token.
pub fn is_markup_start(chars: &[char], i: usize, tracker: &Tracker) -> bool {
    if chars.get(i) != Some(&'<') || !tracker.expression_position() {
        return false;
    }
    match chars.get(i + 1) {
        Some(&'>') => true,
        Some(&c) => is_ident_start(c),
        None => false,
    }
}

/// Split `code` into code runs and markup regions.
///
/// Markup that fails to parse stays inside a code run; each failure is
/// appended to `diagnostics`.
pub fn segment(code: &str, diagnostics: &mut Vec<String>) -> Vec<Segment> {
    let chars: Vec<char> = code.chars().collect();
    let mut segments = Vec::new();
    // Only fails in stop-at-brace mode.
    let _ = walk(&chars, 0, false, 0, &mut segments, diagnostics);
    segments
}

fn report(diagnostics: &mut Vec<String>, e: &MarkupError) {
    let message = format!("markup at offset {}: {}", e.offset, e.message);
    if !diagnostics.contains(&message) {
        diagnostics.push(message);
    }
}

/// Walk code from `start`. With `until_close`, stops at the first unmatched
/// `}` and returns its index; otherwise runs to the end.
///
/// `nesting` counts the elements and containers enclosing `start`.
fn walk(
    chars: &[char],
    start: usize,
    until_close: bool,
    nesting: usize,
    segments: &mut Vec<Segment>,
    diagnostics: &mut Vec<String>,
) -> Result<usize, MarkupError> {
    let mut i = start;
    let mut code_start = start;
    let mut depth = 0usize;
    let mut tracker = Tracker::new();
    // Markup starting before this index sits inside a region that already failed.
    let mut markup_from = start;
    let mut markup_disabled = false;

    let flush = |segments: &mut Vec<Segment>, from: usize, to: usize| {
        if to > from {
            segments.push(Segment::Code(chars[from..to].iter().collect()));
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if starts_with(chars, i, "//") {
            i = skip_line_comment(chars, i);
            continue;
        }
        if starts_with(chars, i, "/*") {
            i = skip_block_comment(chars, i);
            continue;
        }
        if c == '"' || c == '\'' {
            i = skip_string(chars, i);
            tracker.value();
            continue;
        }
        if c == '`' {
            i = skip_template(chars, i);
            tracker.value();
            continue;
        }
        if c == '/' && tracker.expression_position() {
            if let Some(end) = skip_regex(chars, i) {
                i = end;
                tracker.value();
                continue;
            }
        }
        if !markup_disabled && i >= markup_from && is_markup_start(chars, i, &tracker) {
            match parse_element(chars, i, nesting) {
                Ok((element, end)) => {
                    flush(segments, code_start, i);
                    segments.push(Segment::Markup(element));
                    i = end;
                    code_start = i;
                    tracker.value();
                    continue;
                }
                Err(e) if e.too_deep && until_close => return Err(e),
                Err(e) => {
                    report(diagnostics, &e);
                    if e.too_deep {
                        markup_disabled = true;
                    } else {
                        markup_from = e.offset.max(i) + 1;
                    }
                }
            }
        }
        if is_ident_start(c) {
            let (word, end) = read_word(chars, i);
            tracker.word(&word);
            i = end;
            continue;
        }
        if c.is_ascii_digit() {
            i = skip_number(chars, i);
            tracker.value();
            continue;
        }

        match c {
            '{' | '(' | '[' => depth += 1,
            '}' if depth == 0 && until_close => {
                flush(segments, code_start, i);
                return Ok(i);
            }
            '}' | ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        tracker.punct(c);
        i += 1;
    }

    if until_close {
        return Err(MarkupError::new(start, "unterminated expression container"));
    }
    flush(segments, code_start, chars.len());
    Ok(chars.len())
}

/// `i` just after a `{`; returns the raw expression text and the index of the closing `}`.
fn expression_container(
    chars: &[char],
    i: usize,
    nesting: usize,
) -> Result<(String, usize), MarkupError> {
    let mut scratch = Vec::new();
    let mut ignored = Vec::new();
    let close = walk(chars, i, true, nesting, &mut scratch, &mut ignored)?;
    Ok((chars[i..close].iter().collect(), close))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

fn is_tag_char(c: char) -> bool {
    is_ident_char(c) || matches!(c, '.' | '-' | ':')
}

fn read_tag_name(chars: &[char], i: usize) -> (String, usize) {
    let mut end = i;
    while end < chars.len() && is_tag_char(chars[end]) {
        end += 1;
    }
    (chars[i..end].iter().collect(), end)
}

/// Parse one element starting at the `<` at `start`. Returns the element and
/// the index just past it.
fn parse_element(
    chars: &[char],
    start: usize,
    nesting: usize,
) -> Result<(Element, usize), MarkupError> {
    if nesting >= MAX_MARKUP_DEPTH {
        return Err(MarkupError::too_deep(start));
    }
    let nesting = nesting + 1;
    let mut i = skip_ws(chars, start + 1);

    if chars.get(i) == Some(&'>') {
        let (children, end) = parse_children(chars, i + 1, None, nesting)?;
        return Ok((
            Element {
                name: None,
                attrs: Vec::new(),
                children,
                self_closing: false,
            },
            end,
        ));
    }

    let (name, after_name) = read_tag_name(chars, i);
    if name.is_empty() {
        return Err(MarkupError::new(i, "expected a tag name"));
    }
    i = after_name;

    let mut attrs = Vec::new();
    loop {
        i = skip_ws(chars, i);
        match chars.get(i) {
            None => return Err(MarkupError::new(start, format!("unterminated <{}> tag", name))),
            Some('/') if chars.get(i + 1) == Some(&'>') => {
                return Ok((
                    Element {
                        name: Some(name),
                        attrs,
                        children: Vec::new(),
                        self_closing: true,
                    },
                    i + 2,
                ));
            }
            Some('>') => {
                let (children, end) = parse_children(chars, i + 1, Some(&name), nesting)?;
                return Ok((
                    Element {
                        name: Some(name),
                        attrs,
                        children,
                        self_closing: false,
                    },
                    end,
                ));
            }
            Some('{') => {
                let (raw, close) = expression_container(chars, i + 1, nesting)?;
                let inner = raw.trim();
                let Some(spread) = inner.strip_prefix("...") else {
                    return Err(MarkupError::new(i, "expected a spread attribute"));
                };
                attrs.push(Attr::Spread(spread.trim().to_string()));
                i = close + 1;
            }
            Some(&c) if is_ident_start(c) => {
                let (attr_name, after) = read_tag_name(chars, i);
                i = skip_ws(chars, after);
                let value = if chars.get(i) == Some(&'=') {
                    i = skip_ws(chars, i + 1);
                    let (value, end) = parse_attr_value(chars, i, nesting)?;
                    i = end;
                    value
                } else {
                    AttrValue::Bool
                };
                attrs.push(Attr::Named {
                    name: attr_name,
                    value,
                });
            }
            Some(&c) => {
                return Err(MarkupError::new(
                    i,
                    format!("unexpected '{}' in <{}> tag", c, name),
                ))
            }
        }
    }
}

fn parse_attr_value(
    chars: &[char],
    i: usize,
    nesting: usize,
) -> Result<(AttrValue, usize), MarkupError> {
    match chars.get(i) {
        Some(&q) if q == '"' || q == '\'' => {
            let mut j = i + 1;
            while j < chars.len() && chars[j] != q {
                j += 1;
            }
            if j >= chars.len() {
                return Err(MarkupError::new(i, "unterminated attribute string"));
            }
            Ok((AttrValue::Str(chars[i + 1..j].iter().collect(), q), j + 1))
        }
        Some('{') => {
            let (raw, close) = expression_container(chars, i + 1, nesting)?;
            Ok((AttrValue::Expr(raw), close + 1))
        }
        Some('<') => {
            let (el, end) = parse_element(chars, i, nesting)?;
            Ok((AttrValue::Element(Box::new(el)), end))
        }
        _ => Err(MarkupError::new(i, "expected an attribute value")),
    }
}

/// Parse children up to and including the closing tag for `name`
/// (`None` for a fragment).
fn parse_children(
    chars: &[char],
    start: usize,
    name: Option<&str>,
    nesting: usize,
) -> Result<(Vec<Child>, usize), MarkupError> {
    let mut children = Vec::new();
    let mut i = start;

    loop {
        match chars.get(i) {
            None => {
                return Err(MarkupError::new(
                    start,
                    format!("missing closing tag for <{}>", name.unwrap_or("")),
                ))
            }
            Some('<') if chars.get(i + 1) == Some(&'/') => {
                let j = skip_ws(chars, i + 2);
                let (closing, after) = read_tag_name(chars, j);
                let after = skip_ws(chars, after);
                if chars.get(after) != Some(&'>') {
                    return Err(MarkupError::new(i, "malformed closing tag"));
                }
                if closing != name.unwrap_or("") {
                    return Err(MarkupError::new(
                        i,
                        format!(
                            "expected </{}> but found </{}>",
                            name.unwrap_or(""),
                            closing
                        ),
                    ));
                }
                return Ok((children, after + 1));
            }
            Some('<') => {
                let (el, end) = parse_element(chars, i, nesting)?;
                children.push(Child::Element(el));
                i = end;
            }
            Some('{') => {
                let (raw, close) = expression_container(chars, i + 1, nesting)?;
                if !is_empty_expression(&raw) {
                    children.push(Child::Expr(raw));
                }
                i = close + 1;
            }
            Some(_) => {
                let mut j = i;
                while j < chars.len() && chars[j] != '<' && chars[j] != '{' {
                    j += 1;
                }
                children.push(Child::Text(chars[i..j].iter().collect()));
                i = j;
            }
        }
    }
}

/// `{}` and `{/* comment */}` produce no child.
fn is_empty_expression(raw: &str) -> bool {
    let chars: Vec<char> = raw.chars().collect();
    lexer::skip_trivia(&chars, 0) >= chars.len()
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

fn is_intrinsic(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && !name.contains('.')
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn prop_key(name: &str) -> String {
    if is_valid_identifier(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

impl Element {
    /// Lower to a factory call. `expr` maps embedded expression source.
    pub fn lower(&self, expr: &mut dyn FnMut(&str) -> String) -> String {
        let tag = match &self.name {
            None => FRAGMENT.to_string(),
            Some(n) if is_intrinsic(n) => js_string(n),
            Some(n) => n.clone(),
        };

        let props = if self.attrs.is_empty() {
            "null".to_string()
        } else {
            let parts: Vec<String> = self
                .attrs
                .iter()
                .map(|attr| match attr {
                    Attr::Spread(e) => format!("...{}", expr(e).trim()),
                    Attr::Named { name, value } => {
                        let v = match value {
                            AttrValue::Str(s, _) => js_string(&decode_entities(s)),
                            AttrValue::Expr(e) => {
                                let lowered = expr(e);
                                let lowered = lowered.trim();
                                if lowered.is_empty() {
                                    "undefined".to_string()
                                } else {
                                    lowered.to_string()
                                }
                            }
                            AttrValue::Element(el) => el.lower(expr),
                            AttrValue::Bool => "true".to_string(),
                        };
                        format!("{}: {}", prop_key(name), v)
                    }
                })
                .collect();
            format!("{{{}}}", parts.join(", "))
        };

        let children: Vec<String> = self
            .children
            .iter()
            .filter_map(|child| match child {
                Child::Text(raw) => jsx_text(raw).map(|t| js_string(&t)),
                Child::Expr(e) => Some(expr(e).trim().to_string()),
                Child::Element(el) => Some(el.lower(expr)),
            })
            .collect();

        format!("{}({}, {}, [{}])", FACTORY, tag, props, children.join(", "))
    }

    /// Print back as markup source. `expr` maps embedded expression source.
    pub fn print(&self, expr: &mut dyn FnMut(&str) -> String) -> String {
        let name = self.name.as_deref().unwrap_or("");
        let mut out = format!("<{}", name);

        for attr in &self.attrs {
            out.push(' ');
            match attr {
                Attr::Spread(e) => out.push_str(&format!("{{...{}}}", expr(e))),
                Attr::Named { name, value } => {
                    out.push_str(name);
                    match value {
                        AttrValue::Str(s, q) => out.push_str(&format!("={}{}{}", q, s, q)),
                        AttrValue::Expr(e) => out.push_str(&format!("={{{}}}", expr(e))),
                        AttrValue::Element(el) => {
                            out.push('=');
                            out.push_str(&el.print(expr));
                        }
                        AttrValue::Bool => {}
                    }
                }
            }
        }

        if self.self_closing {
            out.push_str(" />");
            return out;
        }
        out.push('>');

        for child in &self.children {
            match child {
                Child::Text(t) => out.push_str(t),
                Child::Expr(e) => out.push_str(&format!("{{{}}}", expr(e))),
                Child::Element(el) => out.push_str(&el.print(expr)),
            }
        }

        out.push_str(&format!("</{}>", name));
        out
    }
}

/// Apply markup whitespace rules to a raw text child.
///
/// Lines are trimmed where they touch a line break, whitespace-only lines are
/// dropped and the survivors are joined with single spaces.
pub fn jsx_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let mut kept = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ").replace('\r', "");
        let mut text = line.as_str();
        if idx != 0 {
            text = text.trim_start();
        }
        if idx != last {
            text = text.trim_end();
        }
        if !text.is_empty() {
            kept.push(text.to_string());
        }
    }

    if kept.is_empty() {
        None
    } else {
        Some(decode_entities(&kept.join(" ")))
    }
}

/// Decode the HTML entities commonly written in markup text.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "times" => '×',
        "middot" => '·',
        "bull" => '•',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        "laquo" => '«',
        "raquo" => '»',
        "deg" => '°',
        "euro" => '€',
        "pound" => '£',
        _ => return None,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lower every markup region in `code`. Returns the new code and one
/// message per region that could not be parsed.
pub fn lower_markup(code: &str) -> (String, Vec<String>) {
    let mut diagnostics = Vec::new();
    let out = lower_with(code, &mut diagnostics);
    (out, diagnostics)
}

fn lower_with(code: &str, diagnostics: &mut Vec<String>) -> String {
    let segments = segment(code, diagnostics);
    let mut out = String::with_capacity(code.len());
    for seg in segments {
        match seg {
            Segment::Code(text) => out.push_str(&text),
            Segment::Markup(el) => {
                let mut nested = |e: &str| lower_with(e, diagnostics);
                out.push_str(&el.lower(&mut nested));
            }
        }
    }
    out
}

/// Replace every markup region with a placeholder identifier.
pub fn extract(code: &str) -> (String, Vec<Element>) {
    let mut ignored = Vec::new();
    let mut elements = Vec::new();
    let mut out = String::with_capacity(code.len());
    for seg in segment(code, &mut ignored) {
        match seg {
            Segment::Code(text) => out.push_str(&text),
            Segment::Markup(el) => {
                out.push_str(&format!("{}{}__", PLACEHOLDER_PREFIX, elements.len()));
                elements.push(el);
            }
        }
    }
    (out, elements)
}

/// Put extracted markup back, printing each element through `expr`.
pub fn restore(
    code: &str,
    elements: &[Element],
    expr: &mut dyn FnMut(&str) -> String,
) -> String {
    if elements.is_empty() {
        return code.to_string();
    }
    PLACEHOLDER_RE
        .replace_all(code, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| elements.get(idx))
                .map(|el| el.print(expr))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(code: &str) -> String {
        let (out, diags) = lower_markup(code);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        out
    }

    #[test]
    fn test_lower_simple_element() {
        assert_eq!(
            lower("const a = <div>Hi</div>;"),
            r#"const a = __h("div", null, ["Hi"]);"#
        );
    }

    #[test]
    fn test_lower_attributes() {
        let out = lower(r#"x = <input type="text" disabled value={v} data-id='7' />"#);
        assert_eq!(
            out,
            r#"x = __h("input", {type: "text", disabled: true, value: v, "data-id": "7"}, [])"#
        );
    }

    #[test]
    fn test_lower_component_and_member_tags() {
        assert_eq!(
            lower("return <Card.Body><Button /></Card.Body>"),
            "return __h(Card.Body, null, [__h(Button, null, [])])"
        );
    }

    #[test]
    fn test_lower_fragment() {
        assert_eq!(
            lower("(<><a/><b/></>)"),
            r#"(__h(__Fragment, null, [__h("a", null, []), __h("b", null, [])]))"#
        );
    }

    #[test]
    fn test_lower_spread_and_nested_expression() {
        let out = lower("f(<ul {...rest}>{items.map(i => <li key={i}>{i}</li>)}</ul>)");
        assert_eq!(
            out,
            r#"f(__h("ul", {...rest}, [items.map(i => __h("li", {key: i}, [i]))]))"#
        );
    }

    #[test]
    fn test_whitespace_rules() {
        let out = lower("x = <p>\n    Hello\n    world  \n  <b>bold</b> tail\n</p>");
        assert_eq!(
            out,
            r#"x = __h("p", null, ["Hello world", __h("b", null, ["bold"]), " tail"])"#
        );
    }

    #[test]
    fn test_entities_and_apostrophes() {
        let out = lower("x = <p>Don't &amp; won&#39;t</p>");
        assert_eq!(out, r#"x = __h("p", null, ["Don't & won't"])"#);
    }

    #[test]
    fn test_comment_child_dropped() {
        assert_eq!(
            lower("x = <div>{/* note */}</div>"),
            r#"x = __h("div", null, [])"#
        );
    }

    #[test]
    fn test_comparison_not_markup() {
        let code = "if (a < b && c > d) { x = a<b; }";
        assert_eq!(lower(code), code);
    }

    #[test]
    fn test_conditional_markup() {
        assert_eq!(
            lower("{cond && <span>ok</span>}"),
            r#"{cond && __h("span", null, ["ok"])}"#
        );
        assert_eq!(
            lower("x = c ? <A /> : <B />"),
            "x = c ? __h(A, null, []) : __h(B, null, [])"
        );
    }

    #[test]
    fn test_strings_not_markup() {
        let code = r#"const s = "<div>"; const t = `<p>${x}</p>`;"#;
        assert_eq!(lower(code), code);
    }

    #[test]
    fn test_unclosed_element_reported_and_left() {
        let (out, diags) = lower_markup("const a = <div>oops");
        assert_eq!(out, "const a = <div>oops");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("missing closing tag"));
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let (_, diags) = lower_markup("x = <div></span>");
        assert!(diags[0].contains("expected </div>"));
    }

    #[test]
    fn test_failed_region_reported_once() {
        let (out, diags) = lower_markup("x = <div><p><i></span></p></div>;");
        assert_eq!(out, "x = <div><p><i></span></p></div>;");
        assert_eq!(diags.len(), 1, "{:?}", diags);
        assert!(diags[0].contains("expected </i> but found </span>"));
    }

    #[test]
    fn test_markup_within_depth_limit_lowers() {
        let depth = MAX_MARKUP_DEPTH - 1;
        let code = format!("x = {}{}", "<b>".repeat(depth), "</b>".repeat(depth));
        let out = lower(&code);
        assert_eq!(out.matches("__h(\"b\"").count(), depth);
    }

    #[test]
    fn test_deep_markup_reported_without_recursing() {
        let depth = 5_000;
        let code = format!("x = {}{}", "<b>{".repeat(depth), "}</b>".repeat(depth));
        let (out, diags) = lower_markup(&code);
        assert_eq!(out, code);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("nested deeper than"));

        let (_, elements) = extract(&code);
        assert!(elements.is_empty());
    }

    #[test]
    fn test_element_attribute_value() {
        assert_eq!(
            lower("x = <Route element=<Home /> />"),
            "x = __h(Route, {element: __h(Home, null, [])}, [])"
        );
    }

    #[test]
    fn test_extract_and_restore() {
        let (code, elements) = extract("const a = <b x={1}>t</b>;");
        assert_eq!(code, "const a = __PREVIEW_MARKUP_0__;");
        let restored = restore(&code, &elements, &mut |e: &str| e.to_string());
        assert_eq!(restored, "const a = <b x={1}>t</b>;");
    }

    #[test]
    fn test_jsx_text() {
        assert_eq!(jsx_text("  \n  "), None);
        assert_eq!(jsx_text(" a "), Some(" a ".to_string()));
        assert_eq!(jsx_text("a\n  b"), Some("a b".to_string()));
    }
}
