//! Compiler entry points: query text in, JSON document out.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::xtql::error;
use crate::xtql::{to_document, CompileError, JsonDocument, ParseError, Parser, DEFAULT_MAX_DEPTH};

/// Default cap on query size: 64 MiB
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024 * 1024;

/// Limits applied to a single compilation
///
/// Deserializes from JSON with any field omitted:
///
/// ```rust
/// use xtql_parser::CompileOptions;
///
/// let options: CompileOptions = serde_json::from_str(r#"{"max_depth": 32}"#).unwrap();
/// assert_eq!(options.max_depth, 32);
/// assert_eq!(options.max_input_bytes, CompileOptions::default().max_input_bytes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Largest accepted query, in bytes
    pub max_input_bytes: usize,
    /// Deepest accepted collection nesting
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Compile an XTQL query with default options
///
/// # Example
///
/// ```rust
/// let doc = xtql_parser::compile("(from :users [name])").unwrap();
/// assert_eq!(
///     doc.to_json_string(),
///     r#"{"bind":[{"name":{"xt:lvar":"name"}}],"from":"users"}"#
/// );
/// ```
pub fn compile(query: &str) -> Result<JsonDocument, ParseError> {
    compile_with(query, &CompileOptions::default())
}

/// Compile an XTQL query with explicit limits
///
/// `max_input_bytes` isn't checked here; a `&str` has already been
/// materialized by the caller. Use [`compile_bytes`] to enforce it.
pub fn compile_with(query: &str, options: &CompileOptions) -> Result<JsonDocument, ParseError> {
    let start = Instant::now();

    let parsed = Parser::new(query)
        .with_max_depth(options.max_depth)
        .parse()
        .inspect_err(|e| {
            debug!(kind = %e.kind, position = %e.position, "xtql parse failed: {}", e.message)
        })?;
    let doc = to_document(&parsed);

    debug!(
        bytes = query.len(),
        operator = parsed.operator(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "compiled xtql query"
    );
    Ok(doc)
}

/// Compile raw bytes, checking size and UTF-8 first
pub fn compile_bytes(query: &[u8], options: &CompileOptions) -> error::Result<JsonDocument> {
    if query.len() > options.max_input_bytes {
        warn!(
            len = query.len(),
            max = options.max_input_bytes,
            "rejecting oversized xtql query"
        );
        return Err(CompileError::InputTooLarge {
            len: query.len(),
            max: options.max_input_bytes,
        });
    }

    let text = std::str::from_utf8(query).map_err(|e| {
        warn!(valid_up_to = e.valid_up_to(), "rejecting non-UTF-8 xtql query");
        CompileError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        }
    })?;

    Ok(compile_with(text, options)?)
}

/// Compile to compact JSON text
pub fn compile_to_string(query: &str) -> error::Result<String> {
    let doc = compile(query)?;
    Ok(serde_json::to_string(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xtql::ParseErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_example() {
        let doc = compile("(from :users [name])").unwrap();
        assert_eq!(
            doc.to_json_string(),
            r#"{"bind":[{"name":{"xt:lvar":"name"}}],"from":"users"}"#
        );
    }

    #[test]
    fn test_compile_to_string_matches_document() {
        let text = compile_to_string("(-> (from :t [a]) (limit 1))").unwrap();
        let doc = compile("(-> (from :t [a]) (limit 1))").unwrap();
        assert_eq!(text, doc.to_json_string());
    }

    #[test]
    fn test_parse_errors_lift_into_compile_result() {
        fn same_output(query: &str) -> error::Result<bool> {
            let doc = compile_bytes(query.as_bytes(), &CompileOptions::default())?;
            Ok(compile_to_string(query)? == doc.to_json_string())
        }

        assert!(same_output("(from :t [a])").unwrap());
        assert!(matches!(same_output("(from :t"), Err(CompileError::Parse(_))));
    }

    #[test]
    fn test_compile_bytes_rejects_invalid_utf8() {
        let err = compile_bytes(b"(from :t [\xff])", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidUtf8 { valid_up_to: 10 }));
    }

    #[test]
    fn test_compile_bytes_rejects_oversized() {
        let options = CompileOptions {
            max_input_bytes: 8,
            ..CompileOptions::default()
        };
        let err = compile_bytes(b"(from :users [name])", &options).unwrap_err();
        assert!(matches!(err, CompileError::InputTooLarge { len: 20, max: 8 }));
    }

    #[test]
    fn test_compile_bytes_parse_error() {
        let err = compile_bytes(b"   ", &CompileOptions::default()).unwrap_err();
        assert_eq!(err.as_parse_error().map(|e| e.kind), Some(ParseErrorKind::EmptyQuery));
    }

    #[test]
    fn test_max_depth_option() {
        let options = CompileOptions {
            max_depth: 2,
            ..CompileOptions::default()
        };
        let err = compile_with("(from :t [{:a [[1]]}])", &options).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);
        assert!(compile("(from :t [{:a [[1]]}])").is_ok());
    }

    #[test]
    fn test_options_from_empty_json() {
        let options: CompileOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
    }
}
