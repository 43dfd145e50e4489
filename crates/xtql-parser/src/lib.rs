//! XTQL query compiler
//!
//! Compiles XTQL, XTDB's EDN query language, into its JSON form. The
//! compiler is a pure function of the query text and can be called from
//! Rust, from C through [`ffi`], or from the browser with the `wasm` feature.
//!
//! # Grammar
//!
//! ```text
//! query  ::= (from :table [bind...]) | (from :table {:bind [...] :for-valid-time tf})
//!          | (-> query tail...) | (unify clause...) | (rel rows [bind...])
//! tail   ::= where | with | without | return | aggregate | order-by
//!          | limit | offset | unnest
//! clause ::= from | rel | where | with | join | left-join | unnest
//! expr   ::= symbol | $param | :keyword | literal | [expr...] | {k expr}
//!          | #{expr...} | #tag expr | (f expr...) | (q query) | (exists? query)
//! ```
//!
//! # Example
//!
//! ```rust
//! let doc = xtql_parser::compile("(-> (from :users [name age]) (where (> age 18)))").unwrap();
//! assert_eq!(doc.as_value()[0]["from"], "users");
//! assert_eq!(doc.as_value()[1]["where"][0]["xt:call"], ">");
//! ```

pub mod compiler;
pub mod ffi;
pub mod logging;
pub mod xtql;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export main types
pub use compiler::{
    compile, compile_bytes, compile_to_string, compile_with, CompileOptions,
    DEFAULT_MAX_INPUT_BYTES,
};
pub use xtql::{CompileError, JsonDocument, ParseError, ParseErrorKind, Position};

// Re-export FFI types for C consumers
pub use ffi::{XtqlCompileResultC, XtqlStatus};
