//! Stage 1: type erasure
//!
//! Strips type-level syntax from typed script sources so the remaining text is
//! plain script. Markup regions are swapped out for placeholders first, so
//! only the code between them is scanned; expressions embedded in markup are
//! erased recursively before the markup is put back.
//!
//! Handled:
//! - parameter, variable, class field and return annotations
//! - optional (`?:`) and definite (`!:`) markers
//! - `interface`, `type` aliases, `declare` statements, `import type`/`export type`
//! - `as` / `satisfies` casts and non-null assertions
//! - generic arguments on calls, declarations and class headers
//! - access modifiers, `abstract` classes and `implements` clauses
//! - constructor parameter properties, turned into `this.x = x;` assignments
//! - `enum` declarations, lowered to frozen object literals

use crate::lexer::{
    find_balanced_end, is_ident_char, is_ident_start, is_valid_identifier, read_word, skip_block_comment,
    skip_line_comment, skip_number, skip_regex, skip_string, skip_template, skip_ws, starts_with,
    word_at, Tracker,
};
use crate::markup;

const MODIFIERS: &[&str] = &["private", "public", "protected", "readonly", "override"];
const TYPE_PREFIXES: &[&str] = &["typeof", "keyof", "readonly", "unique", "infer", "asserts"];
const DECLARE_TARGETS: &[&str] = &[
    "const",
    "let",
    "var",
    "function",
    "class",
    "module",
    "namespace",
    "global",
    "enum",
    "type",
    "interface",
    "abstract",
    "async",
];

/// Erase type syntax from `code`.
pub fn erase_types(code: &str) -> String {
    let (text, elements) = markup::extract(code);
    let erased = Eraser::new(&text).run();
    markup::restore(&erased, &elements, &mut |expr: &str| erase_types(expr))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a type expression appears. Only return position changes parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeMode {
    Annotation,
    Return,
}

/// Skip a type expression starting at (or after whitespace from) `start`.
/// Returns the index just after the last char of the type, or `None` if no
/// type starts there.
fn skip_type(chars: &[char], start: usize, mode: TypeMode) -> Option<usize> {
    let mut i = skip_ws(chars, start);

    if let Some(&c) = chars.get(i) {
        if (c == '|' || c == '&') && chars.get(i + 1) != Some(&c) {
            i = skip_ws(chars, i + 1);
        }
    }

    loop {
        i = skip_postfix_type(chars, i, mode)?;
        let j = skip_ws(chars, i);
        match chars.get(j) {
            Some(&c) if (c == '|' || c == '&') && chars.get(j + 1) != Some(&c) => {
                i = skip_ws(chars, j + 1);
            }
            _ => {
                if word_at(chars, j).as_deref() == Some("is") {
                    return skip_type(chars, j + 2, mode);
                }
                if word_at(chars, j).as_deref() == Some("extends") && mode == TypeMode::Annotation
                {
                    // conditional type: A extends B ? C : D
                    let k = skip_type(chars, j + "extends".len(), mode)?;
                    let q = skip_ws(chars, k);
                    if chars.get(q) != Some(&'?') {
                        return Some(i);
                    }
                    let t = skip_type(chars, q + 1, mode)?;
                    let colon = skip_ws(chars, t);
                    if chars.get(colon) != Some(&':') {
                        return Some(i);
                    }
                    return skip_type(chars, colon + 1, mode);
                }
                return Some(i);
            }
        }
    }
}

fn skip_postfix_type(chars: &[char], start: usize, mode: TypeMode) -> Option<usize> {
    let mut i = skip_primary_type(chars, start, mode)?;
    while chars.get(i) == Some(&'[') {
        i = if chars.get(i + 1) == Some(&']') {
            i + 2
        } else {
            find_balanced_end(chars, i, '[', ']')?
        };
    }
    Some(i)
}

fn skip_primary_type(chars: &[char], i: usize, mode: TypeMode) -> Option<usize> {
    let c = *chars.get(i)?;
    match c {
        '(' => {
            let end = find_balanced_end(chars, i, '(', ')')?;
            let arrow = skip_ws(chars, end);
            if mode != TypeMode::Return && starts_with(chars, arrow, "=>") {
                skip_type(chars, arrow + 2, mode)
            } else {
                Some(end)
            }
        }
        '{' => find_balanced_end(chars, i, '{', '}'),
        '[' => find_balanced_end(chars, i, '[', ']'),
        '<' => {
            // generic function type: <T>(x: T) => U
            let params = skip_type_args(chars, i)?;
            let open = skip_ws(chars, params);
            if chars.get(open) != Some(&'(') {
                return None;
            }
            let close = find_balanced_end(chars, open, '(', ')')?;
            let arrow = skip_ws(chars, close);
            if !starts_with(chars, arrow, "=>") {
                return None;
            }
            skip_type(chars, arrow + 2, mode)
        }
        '"' | '\'' => Some(skip_string(chars, i)),
        '`' => Some(skip_template(chars, i)),
        '-' if chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
            Some(skip_number(chars, i + 1))
        }
        d if d.is_ascii_digit() => Some(skip_number(chars, i)),
        s if is_ident_start(s) => {
            let (word, mut j) = read_word(chars, i);
            if TYPE_PREFIXES.contains(&word.as_str()) {
                let next = skip_ws(chars, j);
                if next > j {
                    return skip_postfix_type(chars, next, mode);
                }
            }
            if word == "new" {
                let open = skip_ws(chars, j);
                return skip_primary_type(chars, open, TypeMode::Annotation);
            }
            while chars.get(j) == Some(&'.') && chars.get(j + 1).is_some_and(|&n| is_ident_start(n))
            {
                j = read_word(chars, j + 1).1;
            }
            if chars.get(j) == Some(&'<') {
                j = skip_type_args(chars, j)?;
            }
            Some(j)
        }
        _ => None,
    }
}

/// `i` at `<`. Skips a type argument or parameter list, returning the index
/// after `>`. Fails unless every entry is a valid type.
fn skip_type_args(chars: &[char], i: usize) -> Option<usize> {
    let mut j = i + 1;
    loop {
        j = skip_ws(chars, j);
        if chars.get(j) == Some(&'>') {
            return Some(j + 1);
        }
        j = skip_type(chars, j, TypeMode::Annotation)?;
        j = skip_ws(chars, j);
        if word_at(chars, j).as_deref() == Some("extends") {
            j = skip_type(chars, j + "extends".len(), TypeMode::Annotation)?;
            j = skip_ws(chars, j);
        }
        if chars.get(j) == Some(&'=') && chars.get(j + 1) != Some(&'>') {
            j = skip_type(chars, j + 1, TypeMode::Annotation)?;
            j = skip_ws(chars, j);
        }
        match chars.get(j) {
            Some(',') => j += 1,
            Some('>') => return Some(j + 1),
            _ => return None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERASER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Top,
    Paren,
    Bracket,
    Brace,
    ClassBody,
}

#[derive(Debug, Clone)]
struct Frame {
    scope: Scope,
    /// Open `?` waiting for their `:` at this level.
    ternary: u32,
    /// Opened as a destructuring pattern right after `const`/`let`/`var`.
    pattern: bool,
}

/// Progress through `const name` for variable annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decl {
    None,
    Keyword,
    Binding,
}

struct Eraser {
    chars: Vec<char>,
    i: usize,
    out: String,
    stack: Vec<Frame>,
    tracker: Tracker,
    decl: Decl,
    /// Stack depth at which the current declaration list lives.
    decl_depth: Option<usize>,
    pending_class: bool,
    /// Text to emit once the scan reaches the given index.
    pending_insert: Option<(usize, String)>,
    /// Last significant char written to `out`.
    last: Option<char>,
}

impl Eraser {
    fn new(code: &str) -> Self {
        Self {
            chars: code.chars().collect(),
            i: 0,
            out: String::with_capacity(code.len()),
            stack: vec![Frame {
                scope: Scope::Top,
                ternary: 0,
                pattern: false,
            }],
            tracker: Tracker::new(),
            decl: Decl::None,
            decl_depth: None,
            pending_class: false,
            pending_insert: None,
            last: None,
        }
    }

    fn run(mut self) -> String {
        while self.i < self.chars.len() {
            self.step();
        }
        self.out
    }

    fn frame(&mut self) -> &mut Frame {
        let idx = self.stack.len() - 1;
        &mut self.stack[idx]
    }

    fn scope(&self) -> Scope {
        self.stack.last().map(|f| f.scope).unwrap_or(Scope::Top)
    }

    fn copy_to(&mut self, end: usize) {
        let end = end.min(self.chars.len());
        for idx in self.i..end {
            self.out.push(self.chars[idx]);
        }
        if let Some(c) = self.chars[self.i..end].iter().rev().find(|c| !c.is_whitespace()) {
            self.last = Some(*c);
        }
        self.i = end;
    }

    fn peek_non_ws(&self, from: usize) -> Option<char> {
        self.chars.get(skip_ws(&self.chars, from)).copied()
    }

    fn step(&mut self) {
        if self.pending_insert.as_ref().is_some_and(|(at, _)| self.i >= *at) {
            if let Some((_, text)) = self.pending_insert.take() {
                self.out.push_str(&text);
            }
        }
        let c = self.chars[self.i];

        if c.is_whitespace() {
            self.out.push(c);
            self.i += 1;
            return;
        }
        if starts_with(&self.chars, self.i, "//") {
            let end = skip_line_comment(&self.chars, self.i);
            let last = self.last;
            self.copy_to(end);
            self.last = last;
            return;
        }
        if starts_with(&self.chars, self.i, "/*") {
            let end = skip_block_comment(&self.chars, self.i);
            let last = self.last;
            self.copy_to(end);
            self.last = last;
            return;
        }
        if c == '"' || c == '\'' {
            let end = skip_string(&self.chars, self.i);
            self.copy_to(end);
            self.value();
            return;
        }
        if c == '`' {
            let end = skip_template(&self.chars, self.i);
            self.copy_to(end);
            self.value();
            return;
        }
        if c == '/' && self.tracker.expression_position() {
            if let Some(end) = skip_regex(&self.chars, self.i) {
                self.copy_to(end);
                self.value();
                return;
            }
        }
        if is_ident_start(c) {
            self.word();
            return;
        }
        if c.is_ascii_digit() {
            let end = skip_number(&self.chars, self.i);
            self.copy_to(end);
            self.value();
            return;
        }

        match c {
            '(' | '[' | '{' => self.open(c),
            ')' | ']' | '}' => self.close(c),
            '?' => self.question(),
            ':' => self.colon(),
            '!' => {
                let next = self.chars.get(self.i + 1).copied();
                let spaced = self.i > 0 && self.chars[self.i - 1].is_whitespace();
                if self.tracker.is_value() && next != Some('=') && !spaced {
                    // non-null assertion or definite assignment
                    self.i += 1;
                } else {
                    self.punct(c);
                }
            }
            '<' if self.tracker.expression_position() => {
                // generic arrow: <T,>(x: T) => x
                match skip_type_args(&self.chars, self.i) {
                    Some(end) if self.peek_non_ws(end) == Some('(') => self.i = end,
                    _ => self.punct(c),
                }
            }
            ';' => {
                self.decl_depth = None;
                self.decl = Decl::None;
                self.punct(c);
            }
            ',' => {
                let in_decl_list = self.decl_depth == Some(self.stack.len());
                self.punct(c);
                if in_decl_list {
                    self.decl = Decl::Keyword;
                }
            }
            _ => self.punct(c),
        }
    }

    fn punct(&mut self, c: char) {
        self.out.push(c);
        self.last = Some(c);
        self.tracker.punct(c);
        self.decl = Decl::None;
        self.i += 1;
    }

    fn value(&mut self) {
        self.tracker.value();
        self.decl = Decl::None;
    }

    fn open(&mut self, c: char) {
        let pattern = c != '(' && self.decl == Decl::Keyword;
        let scope = match c {
            '(' => Scope::Paren,
            '[' => Scope::Bracket,
            _ if self.pending_class => Scope::ClassBody,
            _ => Scope::Brace,
        };
        if c == '{' {
            self.pending_class = false;
        }
        self.stack.push(Frame {
            scope,
            ternary: 0,
            pattern,
        });
        self.punct(c);
    }

    fn close(&mut self, c: char) {
        let popped = if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        };
        if let Some(depth) = self.decl_depth {
            if self.stack.len() < depth {
                self.decl_depth = None;
            }
        }
        self.punct(c);
        if popped.is_some_and(|f| f.pattern) {
            self.decl = Decl::Binding;
        }
    }

    fn question(&mut self) {
        let next = self.chars.get(self.i + 1).copied();
        if next == Some('.') && !self.chars.get(self.i + 2).is_some_and(|d| d.is_ascii_digit()) {
            self.out.push_str("?.");
            self.i += 2;
            self.last = Some('.');
            self.tracker.punct('.');
            return;
        }
        if next == Some('?') {
            self.punct('?');
            self.punct('?');
            return;
        }

        let optional_marker = matches!(self.scope(), Scope::Paren | Scope::ClassBody)
            && self.last.is_some_and(|l| is_ident_char(l) || l == ']' || l == '}')
            && matches!(self.peek_non_ws(self.i + 1), Some(':' | ',' | ')' | ';' | '='))
            && !(self.peek_non_ws(self.i + 1) == Some('=') && self.scope() == Scope::Paren);
        if optional_marker {
            self.i += 1;
            return;
        }

        self.frame().ternary += 1;
        self.punct('?');
    }

    fn colon(&mut self) {
        if self.frame().ternary > 0 {
            self.frame().ternary -= 1;
            self.punct(':');
            return;
        }

        let last = self.last;
        let ident_like = last.is_some_and(is_ident_char);
        let mode = if last == Some(')') {
            Some(TypeMode::Return)
        } else if self.decl == Decl::Binding {
            Some(TypeMode::Annotation)
        } else {
            match self.scope() {
                Scope::Paren if ident_like || matches!(last, Some('}' | ']')) => {
                    Some(TypeMode::Annotation)
                }
                Scope::ClassBody if ident_like => Some(TypeMode::Annotation),
                _ => None,
            }
        };

        if let Some(mode) = mode {
            if let Some(end) = skip_type(&self.chars, self.i + 1, mode) {
                self.i = end;
                return;
            }
        }
        self.punct(':');
    }

    fn word(&mut self) {
        let start = self.i;
        let (word, end) = read_word(&self.chars, start);
        let after_dot = self.last == Some('.') && !self.out.ends_with("...");
        let next = self.peek_non_ws(end);

        if !after_dot && next != Some(':') && self.keyword(&word, end) {
            return;
        }

        if word == "constructor" && !after_dot && self.scope() == Scope::ClassBody && next == Some('(') {
            self.parameter_properties(end);
        }

        self.out.push_str(&word);
        self.i = end;
        self.last = word.chars().last();

        if word == "async" && !after_dot && next == Some('<') {
            // generic async arrow: async <T,>(x: T) => x
            let open = skip_ws(&self.chars, end);
            if let Some(close) = skip_type_args(&self.chars, open) {
                if self.peek_non_ws(close) == Some('(') {
                    self.out.push(' ');
                    self.i = close;
                }
            }
        } else if self.chars.get(end) == Some(&'<') {
            if let Some(close) = skip_type_args(&self.chars, end) {
                let follow = self.peek_non_ws(close);
                if self.pending_class || matches!(follow, Some('(' | '{')) {
                    self.i = close;
                }
            }
        }

        match word.as_str() {
            "const" | "let" | "var" if !after_dot => {
                self.decl = Decl::Keyword;
                self.decl_depth = Some(self.stack.len());
            }
            "class" if !after_dot => {
                self.pending_class = true;
                self.decl = Decl::None;
            }
            _ => {
                self.decl = if self.decl == Decl::Keyword {
                    Decl::Binding
                } else {
                    Decl::None
                };
            }
        }
        self.tracker.word(&word);
    }

    /// Handle a type-level keyword. Returns true if the word was consumed.
    fn keyword(&mut self, word: &str, end: usize) -> bool {
        let next_word = word_at(&self.chars, skip_ws(&self.chars, end));
        let has_gap = skip_ws(&self.chars, end) > end;

        match word {
            "import" => self.import_statement(end),
            "export" => self.export_statement(end),
            "interface" if has_gap && next_word.is_some() => {
                let Some(open) = self.find_body_open(end) else {
                    return false;
                };
                self.retract_prefixes();
                let close = find_balanced_end(&self.chars, open, '{', '}').unwrap_or(self.chars.len());
                self.drop_to(close);
                true
            }
            "type" if has_gap && next_word.is_some() => self.type_alias(end),
            "declare" if next_word.as_deref().is_some_and(|w| DECLARE_TARGETS.contains(&w)) => {
                self.retract_prefixes();
                let stop = self.statement_end(end);
                self.drop_to(stop);
                true
            }
            "enum" if has_gap && next_word.is_some() => self.enum_declaration(end),
            "const" if next_word.as_deref() == Some("enum") => {
                let enum_at = skip_ws(&self.chars, end);
                self.enum_declaration(enum_at + "enum".len())
            }
            "abstract" if next_word.as_deref() == Some("class") => {
                self.i = skip_ws(&self.chars, end);
                true
            }
            "implements" if self.pending_class => {
                let mut j = end;
                while j < self.chars.len() && self.chars[j] != '{' {
                    j += 1;
                }
                self.i = j;
                true
            }
            "as" | "satisfies" if self.tracker.is_value() && has_gap => {
                match skip_type(&self.chars, end, TypeMode::Annotation) {
                    Some(type_end) => {
                        while self.out.ends_with(&[' ', '\t'][..]) {
                            self.out.pop();
                        }
                        self.i = type_end;
                        true
                    }
                    None => false,
                }
            }
            w if MODIFIERS.contains(&w)
                && matches!(self.scope(), Scope::ClassBody | Scope::Paren)
                && has_gap
                && self
                    .peek_non_ws(end)
                    .is_some_and(|c| is_ident_start(c) || c == '[' || c == '#') =>
            {
                self.i = skip_ws(&self.chars, end);
                true
            }
            _ => false,
        }
    }

    /// Schedule `this.x = x;` for each `constructor(private x)` style
    /// parameter, after the `super(...)` call when the body has one.
    fn parameter_properties(&mut self, end: usize) {
        let open = skip_ws(&self.chars, end);
        let Some(params_end) = find_balanced_end(&self.chars, open, '(', ')') else {
            return;
        };
        let params: String = self.chars[open + 1..params_end - 1].iter().collect();
        let names: Vec<String> = split_top_level(&params)
            .iter()
            .filter_map(|param| parameter_property(param))
            .collect();
        if names.is_empty() {
            return;
        }

        let body_open = skip_ws(&self.chars, params_end);
        if self.chars.get(body_open) != Some(&'{') {
            return;
        }
        let Some(body_end) = find_balanced_end(&self.chars, body_open, '{', '}') else {
            return;
        };
        let body: String = self.chars[body_open..body_end].iter().collect();
        let at = super_call_end(&self.chars, body_open, &body).unwrap_or(body_open + 1);

        let assignments: String = names
            .iter()
            .map(|name| format!(" this.{} = {};", name, name))
            .collect();
        self.pending_insert = Some((at, assignments));
    }

    fn import_statement(&mut self, end: usize) -> bool {
        match self.peek_non_ws(end) {
            Some('(' | '.') | None => return false,
            _ => {}
        }
        let stop = self.module_statement_end(end);
        let clause_start = skip_ws(&self.chars, end);
        let type_only = word_at(&self.chars, clause_start).as_deref() == Some("type")
            && {
                let after = skip_ws(&self.chars, clause_start + 4);
                let follow = word_at(&self.chars, after);
                after > clause_start + 4
                    && follow.as_deref() != Some("from")
                    && (follow.is_some() || matches!(self.chars.get(after), Some('{' | '*')))
            };

        if type_only {
            self.drop_to(stop);
        } else {
            self.copy_to(stop);
            self.tracker.punct(';');
            self.decl = Decl::None;
        }
        true
    }

    fn export_statement(&mut self, end: usize) -> bool {
        let after = skip_ws(&self.chars, end);
        let next_word = word_at(&self.chars, after);

        if next_word.as_deref() == Some("type") {
            let brace = skip_ws(&self.chars, after + 4);
            if matches!(self.chars.get(brace), Some('{' | '*')) {
                let stop = self.module_statement_end(end);
                self.drop_to(stop);
                return true;
            }
            return false;
        }

        if matches!(self.chars.get(after), Some('{' | '*')) {
            let stop = self.module_statement_end(end);
            self.copy_to(stop);
            self.tracker.punct(';');
            return true;
        }
        false
    }

    fn type_alias(&mut self, end: usize) -> bool {
        let name_at = skip_ws(&self.chars, end);
        let (_, mut j) = read_word(&self.chars, name_at);
        j = skip_ws(&self.chars, j);
        if self.chars.get(j) == Some(&'<') {
            match skip_type_args(&self.chars, j) {
                Some(k) => j = skip_ws(&self.chars, k),
                None => return false,
            }
        }
        if self.chars.get(j) != Some(&'=') || matches!(self.chars.get(j + 1), Some('=' | '>')) {
            return false;
        }
        let Some(type_end) = skip_type(&self.chars, j + 1, TypeMode::Annotation) else {
            return false;
        };
        self.retract_prefixes();
        let mut stop = type_end;
        let semi = skip_ws(&self.chars, stop);
        if self.chars.get(semi) == Some(&';') {
            stop = semi + 1;
        }
        self.drop_to(stop);
        true
    }

    fn enum_declaration(&mut self, end: usize) -> bool {
        let name_at = skip_ws(&self.chars, end);
        let (name, after_name) = read_word(&self.chars, name_at);
        let open = skip_ws(&self.chars, after_name);
        if name.is_empty() || self.chars.get(open) != Some(&'{') {
            return false;
        }
        let Some(close) = find_balanced_end(&self.chars, open, '{', '}') else {
            return false;
        };
        let body: String = self.chars[open + 1..close - 1].iter().collect();

        let retracted_declare = self.out.trim_end().ends_with("declare");
        if retracted_declare {
            self.retract_prefixes();
        }

        self.out
            .push_str(&format!("const {} = Object.freeze({{{}}});", name, enum_members(&body)));
        self.last = Some(';');
        self.tracker.punct(';');
        self.decl = Decl::None;
        self.i = close;
        true
    }

    /// Remove `export`/`declare`/`default` already written before a dropped declaration.
    fn retract_prefixes(&mut self) {
        loop {
            let trimmed_len = self.out.trim_end().len();
            let trimmed = &self.out[..trimmed_len];
            let Some(kw) = ["export", "declare", "default"]
                .into_iter()
                .find(|kw| {
                    trimmed.ends_with(kw)
                        && !trimmed[..trimmed.len() - kw.len()]
                            .chars()
                            .last()
                            .is_some_and(is_ident_char)
                })
            else {
                break;
            };
            self.out.truncate(trimmed_len - kw.len());
        }
        self.last = self.out.trim_end().chars().last();
    }

    /// Drop source up to `stop`, keeping line breaks so line numbers survive.
    fn drop_to(&mut self, stop: usize) {
        let stop = stop.min(self.chars.len());
        let newlines = self.chars[self.i..stop].iter().filter(|&&c| c == '\n').count();
        for _ in 0..newlines {
            self.out.push('\n');
        }
        self.i = stop;
        self.tracker.punct(';');
        self.decl = Decl::None;
    }

    /// First `{` of a declaration body, skipping generics and heritage clauses.
    fn find_body_open(&self, from: usize) -> Option<usize> {
        let mut j = from;
        while j < self.chars.len() {
            match self.chars[j] {
                '{' => return Some(j),
                '<' => j = skip_type_args(&self.chars, j).unwrap_or(j + 1),
                ';' => return None,
                _ => j += 1,
            }
        }
        None
    }

    /// End of a `declare ...` statement: a braced body, `;`, or end of line.
    fn statement_end(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.chars.len() {
            match self.chars[j] {
                '{' => return find_balanced_end(&self.chars, j, '{', '}').unwrap_or(self.chars.len()),
                '(' => j = find_balanced_end(&self.chars, j, '(', ')').unwrap_or(self.chars.len()),
                ';' => return j + 1,
                '\n' => return j,
                '"' | '\'' => j = skip_string(&self.chars, j),
                _ => j += 1,
            }
        }
        j
    }

    /// End of an import/export statement: after the module string (and `;`),
    /// or after a `;`, or at the newline ending a braced clause without `from`.
    fn module_statement_end(&self, from: usize) -> usize {
        let mut j = from;
        let mut closed_brace = false;
        while j < self.chars.len() {
            match self.chars[j] {
                '{' => {
                    j = find_balanced_end(&self.chars, j, '{', '}').unwrap_or(self.chars.len());
                    closed_brace = true;
                }
                '"' | '\'' => {
                    j = skip_string(&self.chars, j);
                    let mut k = j;
                    while k < self.chars.len() && matches!(self.chars[k], ' ' | '\t') {
                        k += 1;
                    }
                    return if self.chars.get(k) == Some(&';') { k + 1 } else { j };
                }
                ';' => return j + 1,
                '\n' if closed_brace => {
                    let next = skip_ws(&self.chars, j);
                    if word_at(&self.chars, next).as_deref() != Some("from") {
                        return j;
                    }
                    j += 1;
                }
                _ => j += 1,
            }
        }
        j
    }
}

/// `A, B = 5, C = "c"` -> `A: 0, B: 5, C: "c"`. Auto-numbering continues
/// from the last numeric initializer.
fn enum_members(body: &str) -> String {
    let mut next_value: Option<f64> = Some(0.0);
    let mut members = Vec::new();

    for raw in split_top_level(body) {
        let member = raw.trim();
        if member.is_empty() {
            continue;
        }
        let (name, init) = match member.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim())),
            None => (member, None),
        };
        let key = if name.starts_with('"') || name.starts_with('\'') || is_valid_identifier(name) {
            name.to_string()
        } else {
            format!("\"{}\"", name)
        };

        let value = match init {
            Some(v) => {
                next_value = v.parse::<f64>().ok().map(|n| n + 1.0);
                v.to_string()
            }
            None => match next_value {
                Some(n) => {
                    next_value = Some(n + 1.0);
                    format_number(n)
                }
                None => "undefined".to_string(),
            },
        };
        members.push(format!("{}: {}", key, value));
    }

    if members.is_empty() {
        String::new()
    } else {
        format!(" {} ", members.join(", "))
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Name bound by a parameter carrying an access or `readonly` modifier.
fn parameter_property(param: &str) -> Option<String> {
    let chars: Vec<char> = param.chars().collect();
    let mut i = skip_ws(&chars, 0);
    let mut modified = false;
    while let Some(word) = word_at(&chars, i) {
        if !MODIFIERS.contains(&word.as_str()) {
            break;
        }
        modified = true;
        i = skip_ws(&chars, i + word.chars().count());
    }
    let name = word_at(&chars, i)?;
    (modified && is_valid_identifier(&name)).then_some(name)
}

/// Index just past a `super(...)` call (and its `;`) inside a body that
/// starts at `body_open`.
fn super_call_end(chars: &[char], body_open: usize, body: &str) -> Option<usize> {
    let offset = body.find("super(").or_else(|| body.find("super ("))?;
    let call = body_open + body[..offset].chars().count() + "super".len();
    let open = skip_ws(chars, call);
    let end = find_balanced_end(chars, open, '(', ')')?;
    let after = skip_ws(chars, end);
    Some(if chars.get(after) == Some(&';') { after + 1 } else { end })
}

fn split_top_level(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' | '`' => {
                let end = if c == '`' {
                    skip_template(&chars, i)
                } else {
                    skip_string(&chars, i)
                };
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '/' if starts_with(&chars, i, "//") => {
                i = skip_line_comment(&chars, i);
                continue;
            }
            '/' if starts_with(&chars, i, "/*") => {
                i = skip_block_comment(&chars, i);
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    parts.push(current);
    parts
}
