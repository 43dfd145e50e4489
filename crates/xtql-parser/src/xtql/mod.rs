//! XTQL lexer, reader, parser and JSON emitter
//!
//! Each stage is a plain value built for one query:
//! [`Lexer`] yields tokens, [`Reader`] builds EDN forms, [`Parser`] builds the
//! typed [`Query`], and [`json::to_document`] renders it.

pub mod ast;
pub mod error;
pub mod json;
mod keywords;
mod lexer;
pub mod parser;
pub mod reader;
mod token;

pub use ast::{
    Binding, Clause, Direction, Expr, FromQuery, Join, NullOrdering, OrderSpec, Query, Rel, Tail,
    TemporalFilter,
};
pub use error::{CompileError, ParseError, ParseErrorKind, Position};
pub use json::{to_document, JsonDocument};
pub use keywords::{resolve_tag, ClauseOp, QueryOp, SubqueryOp, TailOp, TemporalOp};
pub use lexer::Lexer;
pub use parser::{Parser, DEFAULT_MAX_DEPTH};
pub use reader::{Form, FormKind, Reader, Span};
pub use token::{Token, TokenKind};
