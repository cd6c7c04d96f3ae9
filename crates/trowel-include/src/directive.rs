//! Directive scanning.

use serde_json::{Map, Value};

/// A piece of a source document.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    /// Literal text, copied to the output as-is
    Text(&'a str),

    /// `@@include('path', {...})`
    Include {
        /// Path as written, relative to the including file
        path: String,
        /// Extra context values visible inside the inclusion
        context: Option<Map<String, Value>>,
        /// 1-based line of the directive
        line: usize,
    },

    /// `@@name` or `@@dotted.name`
    Variable {
        /// Name without the prefix
        name: &'a str,
        /// Original text including the prefix
        raw: &'a str,
    },
}

/// Errors that can occur when scanning directives.
#[derive(Debug, thiserror::Error)]
pub enum DirectiveError {
    #[error("Unterminated include directive at line {line}")]
    Unterminated { line: usize },

    #[error("Invalid include arguments at line {line}: {message}")]
    InvalidArguments { line: usize, message: String },
}

/// Split `source` into text, include, and variable segments.
///
/// A doubled prefix (`@@@@`) is an escape for a literal prefix.
pub fn parse_directives<'a>(
    source: &'a str,
    prefix: &str,
) -> Result<Vec<Segment<'a>>, DirectiveError> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(offset) = source[pos..].find(prefix) {
        let start = pos + offset;
        let after = start + prefix.len();

        if start > text_start {
            segments.push(Segment::Text(&source[text_start..start]));
        }

        // Escaped prefix
        if source[after..].starts_with(prefix) {
            segments.push(Segment::Text(&source[start..after]));
            pos = after + prefix.len();
            text_start = pos;
            continue;
        }

        let name_len = identifier_len(&source[after..]);
        if name_len == 0 {
            // Lone prefix, keep it as text
            pos = after;
            text_start = start;
            continue;
        }

        let name = &source[after..after + name_len];
        if name == "include" {
            if let Some(end) = include_open(source, after + name_len) {
                let line = line_at(source, start);
                let (segment, next) = parse_include(source, end, line)?;
                segments.push(segment);
                pos = next;
                text_start = next;
                continue;
            }
        }

        segments.push(Segment::Variable {
            name,
            raw: &source[start..after + name_len],
        });
        pos = after + name_len;
        text_start = pos;
    }

    if text_start < source.len() {
        segments.push(Segment::Text(&source[text_start..]));
    }

    Ok(segments)
}

/// Length of a (possibly dotted) identifier at the start of `s`.
///
/// Trailing dots are not part of the name, so `@@page_name.` ends a sentence.
fn identifier_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }

    let mut len = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_' || **b == b'.')
        .count();

    while len > 0 && bytes[len - 1] == b'.' {
        len -= 1;
    }
    len
}

/// Position just past the `(` that opens an include's argument list.
fn include_open(source: &str, pos: usize) -> Option<usize> {
    let rest = &source[pos..];
    let trimmed = rest.trim_start();
    trimmed
        .starts_with('(')
        .then(|| pos + (rest.len() - trimmed.len()) + 1)
}

/// Parse `'path'[, {json}])` starting just after the opening parenthesis.
fn parse_include(
    source: &str,
    mut pos: usize,
    line: usize,
) -> Result<(Segment<'static>, usize), DirectiveError> {
    pos = skip_whitespace(source, pos);

    let quote = match source[pos..].chars().next() {
        Some(q @ ('\'' | '"')) => q,
        Some(_) => {
            return Err(DirectiveError::InvalidArguments {
                line,
                message: "expected a quoted path".to_string(),
            })
        }
        None => return Err(DirectiveError::Unterminated { line }),
    };
    pos += 1;

    let path_len = source[pos..]
        .find(quote)
        .ok_or(DirectiveError::Unterminated { line })?;
    let path = source[pos..pos + path_len].to_string();
    pos = skip_whitespace(source, pos + path_len + 1);

    let mut context = None;
    if source[pos..].starts_with(',') {
        pos = skip_whitespace(source, pos + 1);
        if !source[pos..].starts_with('{') {
            return Err(DirectiveError::InvalidArguments {
                line,
                message: "expected a JSON object after the path".to_string(),
            });
        }

        let len = balanced_object_len(&source[pos..]).ok_or(DirectiveError::Unterminated { line })?;
        let value: Value = serde_json::from_str(&source[pos..pos + len]).map_err(|e| {
            DirectiveError::InvalidArguments {
                line,
                message: e.to_string(),
            }
        })?;
        let Value::Object(map) = value else {
            return Err(DirectiveError::InvalidArguments {
                line,
                message: "include context must be an object".to_string(),
            });
        };
        context = Some(map);
        pos = skip_whitespace(source, pos + len);
    }

    if !source[pos..].starts_with(')') {
        return Err(DirectiveError::Unterminated { line });
    }

    Ok((
        Segment::Include {
            path,
            context,
            line,
        },
        pos + 1,
    ))
}

/// Byte length of the `{...}` object at the start of `s`, honoring JSON strings.
fn balanced_object_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn skip_whitespace(source: &str, pos: usize) -> usize {
    let rest = &source[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

fn line_at(source: &str, pos: usize) -> usize {
    source[..pos].matches('\n').count() + 1
}
