//! Lexical helpers shared by the transform stages
//!
//! None of this is a tokenizer in the compiler sense. The stages walk source
//! text character by character and only need to step over strings, comments,
//! template literals and regex literals as opaque units, and to know whether
//! the previous significant token leaves the walker in expression position.

/// Keywords after which an expression (and thus markup or a regex) may start.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
    "default",
];

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Check if string is a valid JavaScript identifier
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_char),
        _ => false,
    }
}

/// Read an identifier starting at `i`. Returns the word and the index after it.
pub fn read_word(chars: &[char], i: usize) -> (String, usize) {
    let mut end = i;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    (chars[i..end].iter().collect(), end)
}

/// Index of the first non-whitespace char at or after `i`.
pub fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Like [`skip_ws`] but also steps over comments.
pub fn skip_trivia(chars: &[char], mut i: usize) -> usize {
    loop {
        i = skip_ws(chars, i);
        if starts_with(chars, i, "//") {
            i = skip_line_comment(chars, i);
        } else if starts_with(chars, i, "/*") {
            i = skip_block_comment(chars, i);
        } else {
            return i;
        }
    }
}

pub fn starts_with(chars: &[char], i: usize, pat: &str) -> bool {
    let mut j = i;
    for p in pat.chars() {
        if j >= chars.len() || chars[j] != p {
            return false;
        }
        j += 1;
    }
    true
}

/// Word starting at `i`, if any.
pub fn word_at(chars: &[char], i: usize) -> Option<String> {
    if i < chars.len() && is_ident_start(chars[i]) {
        Some(read_word(chars, i).0)
    } else {
        None
    }
}

/// `i` at an opening quote; returns the index after the closing quote.
/// Unterminated strings end at the line break.
pub fn skip_string(chars: &[char], i: usize) -> usize {
    let quote = chars[i];
    let mut j = i + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            '\n' => return j,
            _ => j += 1,
        }
    }
    chars.len()
}

pub fn skip_line_comment(chars: &[char], i: usize) -> usize {
    let mut j = i;
    while j < chars.len() && chars[j] != '\n' {
        j += 1;
    }
    j
}

pub fn skip_block_comment(chars: &[char], i: usize) -> usize {
    let mut j = i + 2;
    while j + 1 < chars.len() {
        if chars[j] == '*' && chars[j + 1] == '/' {
            return j + 2;
        }
        j += 1;
    }
    chars.len()
}

/// `i` at a backtick; returns the index after the closing backtick.
pub fn skip_template(chars: &[char], i: usize) -> usize {
    let mut j = i + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '`' => return j + 1,
            '$' if j + 1 < chars.len() && chars[j + 1] == '{' => {
                j = find_balanced_end(chars, j + 1, '{', '}').unwrap_or(chars.len());
            }
            _ => j += 1,
        }
    }
    chars.len()
}

/// `i` at a `/` in expression position. Returns the index after the regex
/// literal and its flags, or `None` when no literal closes on this line.
pub fn skip_regex(chars: &[char], i: usize) -> Option<usize> {
    let mut j = i + 1;
    let mut in_class = false;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\n' => return None,
            '[' => {
                in_class = true;
                j += 1;
            }
            ']' => {
                in_class = false;
                j += 1;
            }
            '/' if !in_class => {
                j += 1;
                while j < chars.len() && is_ident_char(chars[j]) {
                    j += 1;
                }
                return Some(j);
            }
            _ => j += 1,
        }
    }
    None
}

/// Find the end of a balanced group, handling strings, comments and template literals.
/// `i` must point at `open`. Returns the index after the matching `close`.
pub fn find_balanced_end(chars: &[char], i: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut j = i;
    while j < chars.len() {
        let c = chars[j];
        if c == '"' || c == '\'' {
            j = skip_string(chars, j);
            continue;
        }
        if c == '`' {
            j = skip_template(chars, j);
            continue;
        }
        if starts_with(chars, j, "//") {
            j = skip_line_comment(chars, j);
            continue;
        }
        if starts_with(chars, j, "/*") {
            j = skip_block_comment(chars, j);
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(j + 1);
            }
        }
        j += 1;
    }
    None
}

/// Skip a numeric literal (including `1_000`, `0xff`, `1e-3`, `10n`).
pub fn skip_number(chars: &[char], i: usize) -> usize {
    let mut j = i;
    while j < chars.len() {
        let c = chars[j];
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            j += 1;
        } else if (c == '-' || c == '+') && j > i && matches!(chars[j - 1], 'e' | 'E') {
            j += 1;
        } else {
            break;
        }
    }
    j
}

/// Kind of the previous significant token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prev {
    Start,
    Punct(char),
    Keyword,
    Value,
}

/// Tracks whether the walker currently sits in expression position.
#[derive(Debug, Clone)]
pub struct Tracker {
    prev: Prev,
}

impl Default for Tracker {
    fn default() -> Self {
        Self { prev: Prev::Start }
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prev(&self) -> &Prev {
        &self.prev
    }

    pub fn word(&mut self, word: &str) {
        self.prev = if EXPRESSION_KEYWORDS.contains(&word) {
            Prev::Keyword
        } else {
            Prev::Value
        };
    }

    pub fn value(&mut self) {
        self.prev = Prev::Value;
    }

    pub fn punct(&mut self, c: char) {
        self.prev = match c {
            ')' | ']' => Prev::Value,
            _ => Prev::Punct(c),
        };
    }

    /// True when a `/` would start a regex and a `<` could start markup.
    pub fn expression_position(&self) -> bool {
        match self.prev {
            Prev::Start | Prev::Keyword => true,
            Prev::Punct(c) => !matches!(c, '.'),
            Prev::Value => false,
        }
    }

    pub fn is_value(&self) -> bool {
        self.prev == Prev::Value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_find_balanced_end() {
        assert_eq!(find_balanced_end(&chars("{hello}"), 0, '{', '}'), Some(7));
        assert_eq!(find_balanced_end(&chars("{obj.map(x => x)}"), 0, '{', '}'), Some(17));
        assert_eq!(
            find_balanced_end(&chars("{'string with { brace'}"), 0, '{', '}'),
            Some(23)
        );
        assert_eq!(find_balanced_end(&chars("{`a ${b} }`}"), 0, '{', '}'), Some(12));
        assert_eq!(find_balanced_end(&chars("{ unterminated"), 0, '{', '}'), None);
    }

    #[test]
    fn test_skip_regex() {
        let src = chars("/a[/]b/gi.test(x)");
        assert_eq!(skip_regex(&src, 0), Some(9));
        assert_eq!(skip_regex(&chars("/ 2\n/"), 0), None);
    }

    #[test]
    fn test_tracker_expression_position() {
        let mut t = Tracker::new();
        assert!(t.expression_position());
        t.word("return");
        assert!(t.expression_position());
        t.word("count");
        assert!(!t.expression_position());
        t.punct('(');
        assert!(t.expression_position());
        t.punct(')');
        assert!(!t.expression_position());
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("App"));
        assert!(is_valid_identifier("$x_1"));
        assert!(!is_valid_identifier("aria-label"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier(""));
    }
}
