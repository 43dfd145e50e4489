//! AST types for parsed XTQL queries
//!
//! The parser produces these from reader forms; [`super::json`] turns them
//! into the JSON document. Every node here has a JSON mapping.

use std::borrow::Cow;
use std::fmt;

use super::keywords::SubqueryOp;

/// A fully parsed XTQL query
///
/// # Example
///
/// ```text
/// (-> (from :users [name age])
///     (where (> age 18))
///     (limit 10))
/// ```
///
/// Parses to a `Pipeline` whose head is a `From` over `users` and whose
/// tails are `Where` and `Limit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Query<'a> {
    /// `(from :table ...)`
    From(FromQuery<'a>),
    /// `(-> head tail...)`
    Pipeline {
        head: Box<Query<'a>>,
        tails: Vec<Tail<'a>>,
    },
    /// `(unify clause...)`
    Unify(Vec<Clause<'a>>),
    /// `(rel rows bind-specs)`
    Rel(Rel<'a>),
}

impl Query<'_> {
    /// The operator that introduced this query
    pub fn operator(&self) -> &'static str {
        match self {
            Query::From(_) => "from",
            Query::Pipeline { .. } => "->",
            Query::Unify(_) => "unify",
            Query::Rel(_) => "rel",
        }
    }
}

/// A table scan
#[derive(Debug, Clone, PartialEq)]
pub struct FromQuery<'a> {
    /// Table name, without the leading colon
    pub table: &'a str,
    /// Column bindings
    pub bind: Vec<Binding<'a>>,
    /// `:for-valid-time`
    pub for_valid_time: Option<TemporalFilter<'a>>,
    /// `:for-system-time`
    pub for_system_time: Option<TemporalFilter<'a>>,
}

/// Literal relation
#[derive(Debug, Clone, PartialEq)]
pub struct Rel<'a> {
    /// Rows: usually a vector of maps, or a parameter
    pub rows: Expr<'a>,
    pub bind: Vec<Binding<'a>>,
}

/// A named output: `{column expr}`, or a bare symbol `x` which binds
/// column `x` to logic variable `x`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<'a> {
    pub column: String,
    pub expr: Expr<'a>,
}

impl<'a> Binding<'a> {
    pub fn new(column: impl Into<String>, expr: Expr<'a>) -> Self {
        Self {
            column: column.into(),
            expr,
        }
    }

    /// Binding of a column to the logic variable of the same name
    pub fn var(name: &'a str) -> Self {
        Self::new(name, Expr::Var(name))
    }
}

/// Temporal filter for valid or system time
#[derive(Debug, Clone, PartialEq)]
pub enum TemporalFilter<'a> {
    /// `(at t)`
    At(Expr<'a>),
    /// `(from t)`
    From(Expr<'a>),
    /// `(to t)`
    To(Expr<'a>),
    /// `(in from to)`
    In(Expr<'a>, Expr<'a>),
    /// `:all-time`
    AllTime,
}

/// Pipeline tail operator
#[derive(Debug, Clone, PartialEq)]
pub enum Tail<'a> {
    Where(Vec<Expr<'a>>),
    With(Vec<Binding<'a>>),
    Without(Vec<&'a str>),
    Return(Vec<Binding<'a>>),
    Aggregate(Vec<Binding<'a>>),
    OrderBy(Vec<OrderSpec<'a>>),
    Limit(u64),
    Offset(u64),
    Unnest(Binding<'a>),
}

/// Clause inside `unify`
#[derive(Debug, Clone, PartialEq)]
pub enum Clause<'a> {
    From(FromQuery<'a>),
    Rel(Rel<'a>),
    Where(Vec<Expr<'a>>),
    With(Vec<Binding<'a>>),
    Join(Join<'a>),
    LeftJoin(Join<'a>),
    Unnest(Binding<'a>),
}

/// `join` / `left-join` body
#[derive(Debug, Clone, PartialEq)]
pub struct Join<'a> {
    pub query: Box<Query<'a>>,
    pub bind: Vec<Binding<'a>>,
    /// Present only when the options map named `:args`
    pub args: Option<Vec<Binding<'a>>>,
}

/// One `order-by` entry
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec<'a> {
    pub val: Expr<'a>,
    pub dir: Option<Direction>,
    pub nulls: Option<NullOrdering>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    First,
    Last,
}

impl NullOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            NullOrdering::First => "first",
            NullOrdering::Last => "last",
        }
    }
}

/// Scalar and collection expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    /// Logic variable (a bare symbol)
    Var(&'a str),
    /// Query parameter, name without `$`
    Param(&'a str),
    /// Keyword, name without `:`
    Keyword(&'a str),
    Str(Cow<'a, str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Vector(Vec<Expr<'a>>),
    /// Map literal; keys already resolved to strings, in source order
    Map(Vec<(String, Expr<'a>)>),
    Set(Vec<Expr<'a>>),
    /// `#tag value`; the tag is kept as written
    Tagged {
        tag: &'a str,
        value: Box<Expr<'a>>,
    },
    /// `(f args...)`
    Call {
        function: &'a str,
        args: Vec<Expr<'a>>,
    },
    /// `(q query)`, `(exists? query)`, `(pull query)`, `(pull* query)`
    Subquery {
        op: SubqueryOp,
        query: Box<Query<'a>>,
        args: Option<Vec<Binding<'a>>>,
    },
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for NullOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
