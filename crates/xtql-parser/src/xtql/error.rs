//! Error types for the XTQL compiler

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Location in the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Byte offset into the input
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl Position {
    /// Resolve a byte offset to line and column.
    ///
    /// Offsets past the end of the input clamp to the end.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let mut offset = offset.min(input.len());
        while !input.is_char_boundary(offset) {
            offset -= 1;
        }

        let before = &input[..offset];
        let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;

        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Category of a parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// Malformed token: bad number, bad escape, unterminated string, stray character
    Lexical,
    /// Closing delimiter that doesn't match, or has nothing to close
    UnbalancedDelimiter,
    /// Input ended inside a form
    UnexpectedEof,
    /// Input has no forms at all (empty, whitespace or comments only)
    EmptyQuery,
    /// More than one top-level form
    TrailingInput,
    /// Collections nested deeper than the configured limit
    NestingTooDeep,
    /// Well-formed EDN that isn't a valid query, tail or clause
    InvalidQuery,
    /// Well-formed EDN that isn't a valid expression or binding
    InvalidExpression,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::Lexical => "lexical error",
            ParseErrorKind::UnbalancedDelimiter => "unbalanced delimiter",
            ParseErrorKind::UnexpectedEof => "unexpected end of input",
            ParseErrorKind::EmptyQuery => "empty query",
            ParseErrorKind::TrailingInput => "trailing input",
            ParseErrorKind::NestingTooDeep => "nesting too deep",
            ParseErrorKind::InvalidQuery => "invalid query",
            ParseErrorKind::InvalidExpression => "invalid expression",
        };
        f.write_str(s)
    }
}

/// A parse failure with the position of the first offending token
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("{message} at {position}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub position: Position,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }

    /// Build an error at a byte offset of `input`
    pub fn at(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        offset: usize,
    ) -> Self {
        Self::new(kind, message, Position::from_offset(input, offset))
    }
}

/// Errors from compiling raw bytes
#[derive(Debug, Error)]
pub enum CompileError {
    /// The query text failed to parse
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The input bytes are not UTF-8
    #[error("invalid UTF-8 in query at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },

    /// The input exceeds `CompileOptions::max_input_bytes`
    #[error("query is {len} bytes, exceeding the {max} byte limit")]
    InputTooLarge { len: usize, max: usize },

    /// JSON serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CompileError {
    /// The parse error, if this is one
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            CompileError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_first_line() {
        let pos = Position::from_offset("(from :users)", 6);
        assert_eq!(pos, Position { offset: 6, line: 1, column: 7 });
    }

    #[test]
    fn test_position_later_line() {
        let input = "(-> (from :t [a])\n    (limit x))";
        let offset = input.find('x').unwrap();
        let pos = Position::from_offset(input, offset);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 12);
    }

    #[test]
    fn test_position_counts_chars_not_bytes() {
        let input = "\"日本\" ?";
        let offset = input.find('?').unwrap();
        let pos = Position::from_offset(input, offset);
        assert_eq!(pos.column, 6);
        assert_eq!(pos.offset, offset);
    }

    #[test]
    fn test_position_clamps_past_end() {
        let pos = Position::from_offset("abc", 99);
        assert_eq!(pos.offset, 3);
        assert_eq!(pos.column, 4);
    }

    #[test]
    fn test_display() {
        let err = ParseError::at(ParseErrorKind::EmptyQuery, "empty query", "", 0);
        assert_eq!(err.to_string(), "empty query at 1:1");
    }

    #[test]
    fn test_serialize_error() {
        let err = ParseError::at(ParseErrorKind::TrailingInput, "unexpected form", "a b", 2);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "trailing_input");
        assert_eq!(json["position"]["column"], 3);
    }
}
