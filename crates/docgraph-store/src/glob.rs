//! Case-insensitive, anchored glob patterns for `where` clauses.

use regex::Regex;

use crate::{StoreError, StoreResult};

/// Characters that turn a `where` value into a glob pattern.
const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Returns true if the value contains any glob metacharacter.
pub fn is_glob(value: &str) -> bool {
    value.contains(GLOB_META)
}

/// A compiled glob pattern.
///
/// Supports `*` (any run), `?` (one character), `[abc]` / `[!abc]` / `[a-z]`
/// character classes, `{a,b}` alternation and `\` escapes. Matching is a
/// full match and ignores case.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob pattern.
    pub fn new(pattern: &str) -> StoreResult<Self> {
        let translated = translate(pattern)?;
        let regex = Regex::new(&format!("(?i)^(?:{translated})$")).map_err(|err| {
            StoreError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Tests a string against the pattern.
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobPattern {}

fn translate(pattern: &str) -> StoreResult<String> {
    let invalid = |reason: &str| StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();
    let mut alternation_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => return Err(invalid("trailing escape")),
            },
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                let mut empty = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        ']' if !empty => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | ']' | '^' | '&' | '~' => {
                            out.push('\\');
                            out.push(inner);
                        }
                        _ => out.push(inner),
                    }
                    empty = false;
                }
                if !closed {
                    return Err(invalid("unclosed character class"));
                }
                out.push(']');
            }
            '{' => {
                alternation_depth += 1;
                out.push_str("(?:");
            }
            ',' if alternation_depth > 0 => out.push('|'),
            '}' if alternation_depth > 0 => {
                alternation_depth -= 1;
                out.push(')');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    if alternation_depth > 0 {
        return Err(invalid("unclosed alternation"));
    }
    Ok(out)
}
