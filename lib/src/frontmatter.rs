//! YAML-style front matter: a `---` line, flat `key: value` lines, and a
//! closing `---` or `...` line.

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::report::Diagnostic;

pub const UNTERMINATED: &str = "frontmatter-unterminated";
pub const SYNTAX: &str = "frontmatter-syntax";
pub const DUPLICATE_KEY: &str = "frontmatter-duplicate-key";
pub const TYPE: &str = "frontmatter-type";
pub const TITLE: &str = "frontmatter-title";

/// Keys whose values must be booleans.
const BOOLEAN_KEYS: &[&str] = &["showsocial"];

/// Where the front matter block of a document lies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    /// The document has no front matter.
    None,
    /// `lines` spans the key/value lines; the body starts at `body`.
    Block { lines: Range<usize>, body: usize },
    /// The opening `---` is never closed.
    Unterminated,
}

/// Locates the front matter block in `text`.
pub fn split(text: &str) -> Split {
    let mut lines = text.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end_matches(['\n', '\r']) == "---" => {
            let start = first.len();
            let mut offset = start;
            for line in lines {
                let content = line.trim_end_matches(['\n', '\r']);
                if content == "---" || content == "..." {
                    return Split::Block { lines: start..offset, body: offset + line.len() };
                }

                offset += line.len();
            }

            Split::Unterminated
        }
        _ => Split::None,
    }
}

/// A flat front matter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::String(_) => "string",
        }
    }

    /// Parses a single value the way a YAML 1.1 loader reads a flat scalar.
    pub fn parse(value: &str) -> Result<Scalar, String> {
        let value = value.trim();
        if let Some(quote @ ('"' | '\'')) = value.chars().next() {
            return parse_quoted(value, quote).map(Scalar::String);
        }

        let value = match value.find(" #") {
            Some(i) => value[..i].trim_end(),
            None => value,
        };

        let scalar = match value {
            "" | "~" | "null" | "Null" | "NULL" => Scalar::Null,
            "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" | "on" | "On" | "ON" => Scalar::Bool(true),
            "false" | "False" | "FALSE" | "no" | "No" | "NO" | "off" | "Off" | "OFF" => Scalar::Bool(false),
            _ if looks_numeric(value) => match value.parse::<i64>() {
                Ok(int) => Scalar::Int(int),
                Err(_) => value.parse::<f64>()
                    .map(Scalar::Float)
                    .unwrap_or_else(|_| Scalar::String(value.into())),
            },
            _ => Scalar::String(value.into()),
        };

        Ok(scalar)
    }
}

fn looks_numeric(value: &str) -> bool {
    let digits = value.trim_start_matches(['-', '+']).trim_start_matches('.');
    digits.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
}

fn parse_quoted(value: &str, quote: char) -> Result<String, String> {
    let mut output = String::with_capacity(value.len());
    let mut chars = value[1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if quote == '"' => match chars.next() {
                Some((_, 'n')) => output.push('\n'),
                Some((_, 't')) => output.push('\t'),
                Some((_, c @ ('"' | '\\' | '/'))) => output.push(c),
                Some((_, c)) => return Err(format!("unknown escape `\\{c}`")),
                None => break,
            },
            '\'' if quote == '\'' && value[1 + i + 1..].starts_with('\'') => {
                output.push('\'');
                chars.next();
            }
            c if c == quote => {
                let rest = value[1 + i + 1..].trim();
                if !rest.is_empty() && !rest.starts_with('#') {
                    return Err(format!("unexpected `{rest}` after quoted string"));
                }

                return Ok(output);
            }
            c => output.push(c),
        }
    }

    Err("unterminated quoted string".into())
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => b.fmt(f),
            Scalar::Int(i) => i.fmt(f),
            Scalar::Float(x) => x.fmt(f),
            Scalar::String(s) => s.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub value: Scalar,
    pub line: usize,
}

/// Parsed front matter, in document order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FrontMatter {
    pub fields: Vec<Field>,
}

impl FrontMatter {
    /// Parses the key/value lines of a block. `first_line` is the document
    /// line number of the block's first key/value line. Problems are pushed
    /// to `diagnostics`; the fields that did parse are kept.
    pub fn parse(block: &str, first_line: usize, diagnostics: &mut Vec<Diagnostic>) -> Self {
        let mut front_matter = FrontMatter::default();
        for (i, line) in block.lines().enumerate() {
            let line_num = first_line + i;
            let trimmed = line.trim_end();
            if trimmed.trim_start().is_empty() || trimmed.trim_start().starts_with('#') {
                continue;
            }

            if trimmed.starts_with([' ', '\t']) {
                diagnostics.push(Diagnostic::error(SYNTAX, line_num,
                    "nested or continued values are not supported"));
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                diagnostics.push(Diagnostic::error(SYNTAX, line_num,
                    format!("expected `key: value`, found `{trimmed}`")));
                continue;
            };

            let valid_key = !key.is_empty() && key.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

            if !valid_key {
                diagnostics.push(Diagnostic::error(SYNTAX, line_num,
                    format!("invalid key `{key}`")));
                continue;
            }

            if !value.is_empty() && !value.starts_with([' ', '\t']) {
                diagnostics.push(Diagnostic::error(SYNTAX, line_num,
                    format!("expected a space after `{key}:`")));
                continue;
            }

            let value = match Scalar::parse(value) {
                Ok(value) => value,
                Err(message) => {
                    diagnostics.push(Diagnostic::error(SYNTAX, line_num,
                        format!("invalid value for `{key}`: {message}")));
                    continue;
                }
            };

            if let Some(first) = front_matter.field(key) {
                diagnostics.push(Diagnostic::error(DUPLICATE_KEY, line_num,
                    format!("duplicate key `{key}` (first set on line {})", first.line)));
                continue;
            }

            front_matter.fields.push(Field { key: key.into(), value, line: line_num });
        }

        front_matter
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.field(key).map(|f| &f.value)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(|v| v.as_str())
    }

    /// Whether social media badges are shown. Defaults to `false`.
    pub fn showsocial(&self) -> bool {
        self.get("showsocial").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Checks field types and the presence of a title. `line` is used for
    /// problems that have no field to point at.
    pub fn validate(&self, line: usize, diagnostics: &mut Vec<Diagnostic>) {
        for field in &self.fields {
            if BOOLEAN_KEYS.contains(&field.key.as_str()) && field.value.as_bool().is_none() {
                diagnostics.push(Diagnostic::error(TYPE, field.line, format!(
                    "`{}` must be a boolean, found {} `{}`",
                    field.key, field.value.kind(), field.value
                )));
            }
        }

        match self.field("title") {
            None => diagnostics.push(Diagnostic::warning(TITLE, line, "missing `title`")),
            Some(field) => match &field.value {
                Scalar::String(s) if !s.trim().is_empty() => {}
                Scalar::Null | Scalar::String(_) => {
                    diagnostics.push(Diagnostic::warning(TITLE, field.line, "empty `title`"))
                }
                value => diagnostics.push(Diagnostic::warning(TITLE, field.line,
                    format!("`title` is a {}, not a string", value.kind()))),
            },
        }
    }
}
