//! Operator and tag tables for XTQL
//!
//! Uses compile-time perfect hashing (phf) for O(1) lookup. The tables are
//! immutable statics, so concurrent compilations share them freely.

use phf::phf_map;

use super::TokenKind;

/// Operators that start a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    /// `(from :table ...)`
    From,
    /// `(-> query tail...)`
    Pipeline,
    /// `(unify clause...)`
    Unify,
    /// `(rel rows bind-specs)`
    Rel,
}

/// Operators valid as pipeline tails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOp {
    Where,
    With,
    Without,
    Return,
    Aggregate,
    OrderBy,
    Limit,
    Offset,
    Unnest,
}

/// Operators valid inside `unify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseOp {
    From,
    Rel,
    Where,
    With,
    Join,
    LeftJoin,
    Unnest,
}

/// Temporal filter constructors for `:for-valid-time` / `:for-system-time`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalOp {
    At,
    From,
    To,
    In,
}

/// Expression forms that embed a whole query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryOp {
    /// `(q query)` - scalar subquery
    Scalar,
    /// `(exists? query)`
    Exists,
    /// `(pull query)`
    Pull,
    /// `(pull* query)`
    PullMany,
}

impl SubqueryOp {
    /// JSON key the subquery is emitted under
    pub fn json_key(&self) -> &'static str {
        match self {
            SubqueryOp::Scalar => "xt:q",
            SubqueryOp::Exists => "xt:exists",
            SubqueryOp::Pull => "xt:pull",
            SubqueryOp::PullMany => "xt:pullMany",
        }
    }
}

/// Symbols that read as literals rather than symbols
static LITERALS: phf::Map<&'static str, TokenKind> = phf_map! {
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "nil" => TokenKind::Nil,
};

static QUERY_OPS: phf::Map<&'static str, QueryOp> = phf_map! {
    "from" => QueryOp::From,
    "->" => QueryOp::Pipeline,
    "unify" => QueryOp::Unify,
    "rel" => QueryOp::Rel,
};

static TAIL_OPS: phf::Map<&'static str, TailOp> = phf_map! {
    "where" => TailOp::Where,
    "with" => TailOp::With,
    "without" => TailOp::Without,
    "return" => TailOp::Return,
    "aggregate" => TailOp::Aggregate,
    "order-by" => TailOp::OrderBy,
    "limit" => TailOp::Limit,
    "offset" => TailOp::Offset,
    "unnest" => TailOp::Unnest,
};

static CLAUSE_OPS: phf::Map<&'static str, ClauseOp> = phf_map! {
    "from" => ClauseOp::From,
    "rel" => ClauseOp::Rel,
    "where" => ClauseOp::Where,
    "with" => ClauseOp::With,
    "join" => ClauseOp::Join,
    "left-join" => ClauseOp::LeftJoin,
    "unnest" => ClauseOp::Unnest,
};

static TEMPORAL_OPS: phf::Map<&'static str, TemporalOp> = phf_map! {
    "at" => TemporalOp::At,
    "from" => TemporalOp::From,
    "to" => TemporalOp::To,
    "in" => TemporalOp::In,
};

static SUBQUERY_OPS: phf::Map<&'static str, SubqueryOp> = phf_map! {
    "q" => SubqueryOp::Scalar,
    "exists?" => SubqueryOp::Exists,
    "pull" => SubqueryOp::Pull,
    "pull*" => SubqueryOp::PullMany,
};

/// Reader tags with a dedicated XTDB type name
static TAGS: phf::Map<&'static str, &'static str> = phf_map! {
    "inst" => "xt:instant",
    "time/instant" => "xt:instant",
    "time/date" => "xt:date",
    "time/date-time" => "xt:timestamp",
    "time/duration" => "xt:duration",
    "uuid" => "xt:uuid",
    "xt/keyword" => "xt:keyword",
};

/// Look up whether a symbol is a literal (true/false/nil)
#[inline]
pub fn lookup_literal(text: &str) -> Option<TokenKind> {
    LITERALS.get(text).copied()
}

#[inline]
pub fn lookup_query_op(text: &str) -> Option<QueryOp> {
    QUERY_OPS.get(text).copied()
}

#[inline]
pub fn lookup_tail_op(text: &str) -> Option<TailOp> {
    TAIL_OPS.get(text).copied()
}

#[inline]
pub fn lookup_clause_op(text: &str) -> Option<ClauseOp> {
    CLAUSE_OPS.get(text).copied()
}

#[inline]
pub fn lookup_temporal_op(text: &str) -> Option<TemporalOp> {
    TEMPORAL_OPS.get(text).copied()
}

#[inline]
pub fn lookup_subquery_op(text: &str) -> Option<SubqueryOp> {
    SUBQUERY_OPS.get(text).copied()
}

/// Resolve a reader tag to its XTDB type name.
///
/// Unknown tags are passed through unchanged.
#[inline]
pub fn resolve_tag(tag: &str) -> &str {
    TAGS.get(tag).copied().unwrap_or(tag)
}
