//! Recursive-descent parser for XTQL
//!
//! Converts the reader's forms into the typed AST. The reader has already
//! checked delimiters, literals and nesting depth; this stage checks the
//! shape of queries, tails, clauses and expressions.
//!
//! # Grammar
//!
//! ```text
//! query     ::= (from TABLE bind-specs) | (from TABLE from-opts)
//!             | (-> query tail*) | (unify clause+) | (rel rows bind-specs)
//! tail      ::= (where expr+) | (with item+) | (without COLUMN+)
//!             | (return item+) | (aggregate item+) | (order-by spec+)
//!             | (limit N) | (offset N) | (unnest {col expr})
//! clause    ::= (from ...) | (rel ...) | (where expr+) | (with item+)
//!             | (join query bind-specs|opts) | (left-join query bind-specs|opts)
//!             | (unnest {var expr})
//! from-opts ::= {:bind [...] :for-valid-time tf :for-system-time tf}
//! tf        ::= (at e) | (from e) | (to e) | (in e e) | :all-time
//! ```
//!
//! # Example
//!
//! ```rust
//! use xtql_parser::xtql::{Parser, Query};
//!
//! let query = Parser::parse_str("(from :users [name])").unwrap();
//! match query {
//!     Query::From(from) => assert_eq!(from.table, "users"),
//!     _ => unreachable!(),
//! }
//! ```

use std::collections::HashSet;

use super::ast::{
    Binding, Clause, Direction, Expr, FromQuery, Join, NullOrdering, OrderSpec, Query, Rel, Tail,
    TemporalFilter,
};
use super::error::{ParseError, ParseErrorKind};
use super::keywords::{
    lookup_clause_op, lookup_query_op, lookup_subquery_op, lookup_tail_op, lookup_temporal_op,
    ClauseOp, QueryOp, TailOp, TemporalOp,
};
use super::reader::{Form, FormKind, Reader, Span};

/// Default bound on collection nesting
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// A list form split into operator and arguments
struct OpForm<'a> {
    name: &'a str,
    args: Vec<Form<'a>>,
    span: Span,
}

/// Map entries with their keys resolved to strings
type Entries<'a> = Vec<(String, Span, Form<'a>)>;

/// A parser for XTQL
///
/// Holds no state beyond the input and limits, so a parser can be built
/// per call on any thread.
pub struct Parser<'a> {
    input: &'a str,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser over the given input
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse from a string directly
    pub fn parse_str(input: &'a str) -> Result<Query<'a>, ParseError> {
        Parser::new(input).parse()
    }

    /// Parse the input into a query
    pub fn parse(self) -> Result<Query<'a>, ParseError> {
        let form = Reader::new(self.input, self.max_depth).read()?;
        self.query(form)
    }

    fn error(&self, kind: ParseErrorKind, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::at(kind, message, self.input, span.start)
    }

    fn query_error(&self, message: impl Into<String>, span: Span) -> ParseError {
        self.error(ParseErrorKind::InvalidQuery, message, span)
    }

    fn expr_error(&self, message: impl Into<String>, span: Span) -> ParseError {
        self.error(ParseErrorKind::InvalidExpression, message, span)
    }

    // ========================================================================
    // Operator forms
    // ========================================================================

    fn operator_form(&self, form: Form<'a>, what: &str) -> Result<OpForm<'a>, ParseError> {
        let span = form.span;
        let described = form.describe();

        let items = match form.kind {
            FormKind::List(items) => items,
            _ => {
                return Err(self.query_error(
                    format!("expected a {} form, found {}", what, described),
                    span,
                ))
            }
        };

        let mut items = items.into_iter();
        let Some(head) = items.next() else {
            return Err(self.query_error(format!("empty list where a {} was expected", what), span));
        };
        let Some(name) = head.as_symbol() else {
            return Err(self.query_error(
                format!("{} operator must be a symbol, found {}", what, head.describe()),
                head.span,
            ));
        };

        Ok(OpForm {
            name,
            args: items.collect(),
            span,
        })
    }

    /// Require exactly `N` arguments
    fn exact<const N: usize>(&self, op: OpForm<'a>) -> Result<[Form<'a>; N], ParseError> {
        let OpForm { name, args, span } = op;
        let found = args.len();
        args.try_into().map_err(|_| {
            self.query_error(
                format!(
                    "'{}' expects {} argument{}, found {}",
                    name,
                    N,
                    if N == 1 { "" } else { "s" },
                    found
                ),
                span,
            )
        })
    }

    fn at_least(&self, op: &OpForm<'a>, min: usize) -> Result<(), ParseError> {
        if op.args.len() < min {
            return Err(self.query_error(
                format!(
                    "'{}' expects at least {} argument{}, found {}",
                    op.name,
                    min,
                    if min == 1 { "" } else { "s" },
                    op.args.len()
                ),
                op.span,
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn query(&self, form: Form<'a>) -> Result<Query<'a>, ParseError> {
        let op = self.operator_form(form, "query")?;

        let Some(query_op) = lookup_query_op(op.name) else {
            let message = if lookup_tail_op(op.name).is_some() {
                format!(
                    "'{}' is a pipeline tail, not a query; use it inside (-> query ...)",
                    op.name
                )
            } else {
                format!(
                    "unknown query operator '{}'; expected from, ->, unify or rel",
                    op.name
                )
            };
            return Err(self.query_error(message, op.span));
        };

        match query_op {
            QueryOp::From => Ok(Query::From(self.from_query(op)?)),
            QueryOp::Rel => Ok(Query::Rel(self.rel(op)?)),
            QueryOp::Pipeline => {
                self.at_least(&op, 1)?;
                let mut args = op.args.into_iter();
                let Some(first) = args.next() else {
                    return Err(self.query_error("'->' requires a source query", op.span));
                };
                let head = Box::new(self.query(first)?);
                let tails = args.map(|f| self.tail(f)).collect::<Result<Vec<_>, _>>()?;
                Ok(Query::Pipeline { head, tails })
            }
            QueryOp::Unify => {
                self.at_least(&op, 1)?;
                let clauses = op
                    .args
                    .into_iter()
                    .map(|f| self.clause(f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Query::Unify(clauses))
            }
        }
    }

    fn from_query(&self, op: OpForm<'a>) -> Result<FromQuery<'a>, ParseError> {
        let [table, spec] = self.exact::<2>(op)?;

        let Some(table_name) = table.as_keyword() else {
            return Err(self.query_error(
                format!("table must be a keyword like :users, found {}", table.describe()),
                table.span,
            ));
        };

        let mut from = FromQuery {
            table: table_name,
            bind: Vec::new(),
            for_valid_time: None,
            for_system_time: None,
        };

        let span = spec.span;
        let described = spec.describe();
        match spec.kind {
            FormKind::Vector(items) => from.bind = self.bind_items(items)?,
            FormKind::Map(pairs) => {
                for (key, key_span, value) in self.entries(pairs, None)? {
                    match key.as_str() {
                        "bind" => from.bind = self.bind_vector(value)?,
                        "for-valid-time" => from.for_valid_time = Some(self.temporal(value)?),
                        "for-system-time" => from.for_system_time = Some(self.temporal(value)?),
                        _ => {
                            return Err(self.query_error(
                                format!(
                                    "unknown from option ':{}'; expected :bind, :for-valid-time or :for-system-time",
                                    key
                                ),
                                key_span,
                            ))
                        }
                    }
                }
            }
            _ => {
                return Err(self.query_error(
                    format!(
                        "expected a bind vector or options map after the table, found {}",
                        described
                    ),
                    span,
                ))
            }
        }

        Ok(from)
    }

    fn rel(&self, op: OpForm<'a>) -> Result<Rel<'a>, ParseError> {
        let [rows, bind] = self.exact::<2>(op)?;
        Ok(Rel {
            rows: self.expr(rows)?,
            bind: self.bind_vector(bind)?,
        })
    }

    fn temporal(&self, form: Form<'a>) -> Result<TemporalFilter<'a>, ParseError> {
        if form.as_keyword() == Some("all-time") {
            return Ok(TemporalFilter::AllTime);
        }
        if !matches!(form.kind, FormKind::List(_)) {
            return Err(self.query_error(
                format!(
                    "expected a temporal filter like (at t), (in from to) or :all-time, found {}",
                    form.describe()
                ),
                form.span,
            ));
        }

        let op = self.operator_form(form, "temporal filter")?;
        let Some(temporal_op) = lookup_temporal_op(op.name) else {
            return Err(self.query_error(
                format!(
                    "unknown temporal filter '{}'; expected at, from, to or in",
                    op.name
                ),
                op.span,
            ));
        };

        Ok(match temporal_op {
            TemporalOp::At => {
                let [t] = self.exact::<1>(op)?;
                TemporalFilter::At(self.expr(t)?)
            }
            TemporalOp::From => {
                let [t] = self.exact::<1>(op)?;
                TemporalFilter::From(self.expr(t)?)
            }
            TemporalOp::To => {
                let [t] = self.exact::<1>(op)?;
                TemporalFilter::To(self.expr(t)?)
            }
            TemporalOp::In => {
                let [from, to] = self.exact::<2>(op)?;
                TemporalFilter::In(self.expr(from)?, self.expr(to)?)
            }
        })
    }

    // ========================================================================
    // Pipeline tails
    // ========================================================================

    fn tail(&self, form: Form<'a>) -> Result<Tail<'a>, ParseError> {
        let op = self.operator_form(form, "pipeline tail")?;
        let name = op.name;

        let Some(tail_op) = lookup_tail_op(name) else {
            let message = if lookup_clause_op(name).is_some() {
                format!("'{}' is only valid inside unify", name)
            } else {
                format!("unknown pipeline tail '{}'", name)
            };
            return Err(self.query_error(message, op.span));
        };

        Ok(match tail_op {
            TailOp::Where => {
                self.at_least(&op, 1)?;
                Tail::Where(self.exprs(op.args)?)
            }
            TailOp::With => Tail::With(self.projections(op)?),
            TailOp::Return => Tail::Return(self.projections(op)?),
            TailOp::Aggregate => Tail::Aggregate(self.projections(op)?),
            TailOp::Without => {
                self.at_least(&op, 1)?;
                let columns = op
                    .args
                    .iter()
                    .map(|f| {
                        f.as_keyword().ok_or_else(|| {
                            self.query_error(
                                format!("without expects column keywords, found {}", f.describe()),
                                f.span,
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Tail::Without(columns)
            }
            TailOp::OrderBy => {
                self.at_least(&op, 1)?;
                let specs = op
                    .args
                    .into_iter()
                    .map(|f| self.order_spec(f))
                    .collect::<Result<Vec<_>, _>>()?;
                Tail::OrderBy(specs)
            }
            TailOp::Limit => {
                let [n] = self.exact::<1>(op)?;
                Tail::Limit(self.non_negative(n, name)?)
            }
            TailOp::Offset => {
                let [n] = self.exact::<1>(op)?;
                Tail::Offset(self.non_negative(n, name)?)
            }
            TailOp::Unnest => {
                let [binding] = self.exact::<1>(op)?;
                Tail::Unnest(self.unnest_binding(binding)?)
            }
        })
    }

    fn non_negative(&self, form: Form<'a>, op: &str) -> Result<u64, ParseError> {
        match form.kind {
            FormKind::Int(n) if n >= 0 => Ok(n as u64),
            _ => Err(self.query_error(
                format!("'{}' expects a non-negative integer, found {}", op, form.describe()),
                form.span,
            )),
        }
    }

    fn order_spec(&self, form: Form<'a>) -> Result<OrderSpec<'a>, ParseError> {
        let span = form.span;
        let pairs = match form.kind {
            FormKind::Map(pairs) => pairs,
            _ => {
                return Ok(OrderSpec {
                    val: self.expr(form)?,
                    dir: None,
                    nulls: None,
                })
            }
        };

        let mut val = None;
        let mut dir = None;
        let mut nulls = None;

        for (key, key_span, value) in self.entries(pairs, None)? {
            match key.as_str() {
                "val" => val = Some(self.expr(value)?),
                "dir" => {
                    dir = Some(match value.as_keyword() {
                        Some("asc") => Direction::Asc,
                        Some("desc") => Direction::Desc,
                        _ => {
                            return Err(self.query_error(
                                "order-by :dir must be :asc or :desc",
                                value.span,
                            ))
                        }
                    })
                }
                "nulls" => {
                    nulls = Some(match value.as_keyword() {
                        Some("first") => NullOrdering::First,
                        Some("last") => NullOrdering::Last,
                        _ => {
                            return Err(self.query_error(
                                "order-by :nulls must be :first or :last",
                                value.span,
                            ))
                        }
                    })
                }
                _ => {
                    return Err(self.query_error(
                        format!(
                            "unknown order-by option ':{}'; expected :val, :dir or :nulls",
                            key
                        ),
                        key_span,
                    ))
                }
            }
        }

        let Some(val) = val else {
            return Err(self.query_error("order-by map requires :val", span));
        };

        Ok(OrderSpec { val, dir, nulls })
    }

    fn unnest_binding(&self, form: Form<'a>) -> Result<Binding<'a>, ParseError> {
        let span = form.span;
        let entries = match form.kind {
            FormKind::Map(pairs) => self.entries(pairs, None)?,
            FormKind::NamespacedMap(ns, pairs) => self.entries(pairs, Some(ns))?,
            _ => Vec::new(),
        };

        let mut entries = entries.into_iter();
        match (entries.next(), entries.next()) {
            (Some((column, _, value)), None) => Ok(Binding::new(column, self.expr(value)?)),
            _ => Err(self.query_error(
                "unnest expects a map with a single {column expr} entry",
                span,
            )),
        }
    }

    // ========================================================================
    // Unify clauses
    // ========================================================================

    fn clause(&self, form: Form<'a>) -> Result<Clause<'a>, ParseError> {
        let op = self.operator_form(form, "unify clause")?;

        let Some(clause_op) = lookup_clause_op(op.name) else {
            let message = if lookup_tail_op(op.name).is_some() {
                format!("'{}' is a pipeline tail and can't be used inside unify", op.name)
            } else {
                format!("unknown unify clause '{}'", op.name)
            };
            return Err(self.query_error(message, op.span));
        };

        Ok(match clause_op {
            ClauseOp::From => Clause::From(self.from_query(op)?),
            ClauseOp::Rel => Clause::Rel(self.rel(op)?),
            ClauseOp::Where => {
                self.at_least(&op, 1)?;
                Clause::Where(self.exprs(op.args)?)
            }
            ClauseOp::With => Clause::With(self.projections(op)?),
            ClauseOp::Join => Clause::Join(self.join(op)?),
            ClauseOp::LeftJoin => Clause::LeftJoin(self.join(op)?),
            ClauseOp::Unnest => {
                let [binding] = self.exact::<1>(op)?;
                Clause::Unnest(self.unnest_binding(binding)?)
            }
        })
    }

    fn join(&self, op: OpForm<'a>) -> Result<Join<'a>, ParseError> {
        let name = op.name;
        let [query, spec] = self.exact::<2>(op)?;
        let query = Box::new(self.query(query)?);

        let span = spec.span;
        let described = spec.describe();
        let (bind, args) = match spec.kind {
            FormKind::Vector(items) => (self.bind_items(items)?, None),
            FormKind::Map(pairs) => {
                let mut bind = Vec::new();
                let mut args = None;
                for (key, key_span, value) in self.entries(pairs, None)? {
                    match key.as_str() {
                        "bind" => bind = self.bind_vector(value)?,
                        "args" => args = Some(self.bind_vector(value)?),
                        _ => {
                            return Err(self.query_error(
                                format!("unknown {} option ':{}'; expected :bind or :args", name, key),
                                key_span,
                            ))
                        }
                    }
                }
                (bind, args)
            }
            _ => {
                return Err(self.query_error(
                    format!("'{}' expects a bind vector or options map, found {}", name, described),
                    span,
                ))
            }
        };

        Ok(Join { query, bind, args })
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Arguments of with/return/aggregate: symbols or maps
    fn projections(&self, op: OpForm<'a>) -> Result<Vec<Binding<'a>>, ParseError> {
        self.at_least(&op, 1)?;
        self.bind_items(op.args)
    }

    fn bind_vector(&self, form: Form<'a>) -> Result<Vec<Binding<'a>>, ParseError> {
        match form.kind {
            FormKind::Vector(items) => self.bind_items(items),
            _ => Err(self.expr_error(
                format!("expected a vector of bindings, found {}", form.describe()),
                form.span,
            )),
        }
    }

    fn bind_items(&self, items: Vec<Form<'a>>) -> Result<Vec<Binding<'a>>, ParseError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let span = item.span;
            let described = item.describe();
            match item.kind {
                FormKind::Symbol(name) => out.push(Binding::var(name)),
                FormKind::Map(pairs) => {
                    for (column, _, value) in self.entries(pairs, None)? {
                        out.push(Binding::new(column, self.expr(value)?));
                    }
                }
                FormKind::NamespacedMap(ns, pairs) => {
                    for (column, _, value) in self.entries(pairs, Some(ns))? {
                        out.push(Binding::new(column, self.expr(value)?));
                    }
                }
                _ => {
                    return Err(self.expr_error(
                        format!("expected a symbol or map binding, found {}", described),
                        span,
                    ))
                }
            }
        }
        Ok(out)
    }

    /// Resolve map keys to strings, rejecting duplicates
    fn entries(
        &self,
        pairs: Vec<(Form<'a>, Form<'a>)>,
        namespace: Option<&str>,
    ) -> Result<Entries<'a>, ParseError> {
        let mut seen = HashSet::with_capacity(pairs.len());
        let mut out = Vec::with_capacity(pairs.len());

        for (key, value) in pairs {
            let name = self.map_key(&key, namespace)?;
            if !seen.insert(name.clone()) {
                return Err(self.expr_error(format!("duplicate key '{}' in map", name), key.span));
            }
            out.push((name, key.span, value));
        }

        Ok(out)
    }

    fn map_key(&self, key: &Form<'a>, namespace: Option<&str>) -> Result<String, ParseError> {
        let name = match &key.kind {
            FormKind::Keyword(k) => *k,
            FormKind::Symbol(s) => *s,
            FormKind::Str(s) => s.as_ref(),
            _ => {
                return Err(self.expr_error(
                    format!(
                        "map keys must be keywords, symbols or strings, found {}",
                        key.describe()
                    ),
                    key.span,
                ))
            }
        };

        Ok(match namespace {
            Some(ns) if !name.contains('/') => format!("{}/{}", ns, name),
            _ => name.to_string(),
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn exprs(&self, forms: Vec<Form<'a>>) -> Result<Vec<Expr<'a>>, ParseError> {
        forms.into_iter().map(|f| self.expr(f)).collect()
    }

    fn expr(&self, form: Form<'a>) -> Result<Expr<'a>, ParseError> {
        let span = form.span;
        Ok(match form.kind {
            FormKind::Symbol(s) => Expr::Var(s),
            FormKind::Param(p) => Expr::Param(p),
            FormKind::Keyword(k) => Expr::Keyword(k),
            FormKind::Str(s) => Expr::Str(s),
            FormKind::Int(n) => Expr::Int(n),
            FormKind::Float(n) => Expr::Float(n),
            FormKind::Bool(b) => Expr::Bool(b),
            FormKind::Nil => Expr::Nil,
            FormKind::Vector(items) => Expr::Vector(self.exprs(items)?),
            FormKind::Set(items) => Expr::Set(self.exprs(items)?),
            FormKind::Map(pairs) => Expr::Map(self.map_literal(pairs, None)?),
            FormKind::NamespacedMap(ns, pairs) => Expr::Map(self.map_literal(pairs, Some(ns))?),
            FormKind::Tagged(tag, value) => Expr::Tagged {
                tag,
                value: Box::new(self.expr(*value)?),
            },
            FormKind::List(items) => self.call(items, span)?,
        })
    }

    fn map_literal(
        &self,
        pairs: Vec<(Form<'a>, Form<'a>)>,
        namespace: Option<&str>,
    ) -> Result<Vec<(String, Expr<'a>)>, ParseError> {
        self.entries(pairs, namespace)?
            .into_iter()
            .map(|(key, _, value)| Ok((key, self.expr(value)?)))
            .collect()
    }

    fn call(&self, items: Vec<Form<'a>>, span: Span) -> Result<Expr<'a>, ParseError> {
        let mut items = items.into_iter();
        let Some(head) = items.next() else {
            return Err(self.expr_error("empty list is not a valid expression", span));
        };
        let Some(function) = head.as_symbol() else {
            return Err(self.expr_error(
                format!("call head must be a symbol, found {}", head.describe()),
                head.span,
            ));
        };

        let Some(op) = lookup_subquery_op(function) else {
            return Ok(Expr::Call {
                function,
                args: self.exprs(items.collect())?,
            });
        };

        let (query, options) = match (items.next(), items.next(), items.next()) {
            (Some(query), options, None) => (query, options),
            _ => {
                return Err(self.expr_error(
                    format!("'{}' expects a query and an optional options map", function),
                    span,
                ))
            }
        };

        let query = Box::new(self.query(query)?);
        let args = match options {
            None => None,
            Some(options) => {
                let options_span = options.span;
                let FormKind::Map(pairs) = options.kind else {
                    return Err(self.expr_error(
                        format!("'{}' options must be a map", function),
                        options_span,
                    ));
                };
                let mut args = None;
                for (key, key_span, value) in self.entries(pairs, None)? {
                    if key != "args" {
                        return Err(self.expr_error(
                            format!("unknown {} option ':{}'; expected :args", function, key),
                            key_span,
                        ));
                    }
                    args = Some(self.bind_vector(value)?);
                }
                args
            }
        };

        Ok(Expr::Subquery { op, query, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xtql::keywords::SubqueryOp;
    use pretty_assertions::assert_eq;
    use std::borrow::Cow;

    fn parse(input: &str) -> Query<'_> {
        Parser::parse_str(input).unwrap()
    }

    fn parse_err(input: &str) -> ParseError {
        Parser::parse_str(input).unwrap_err()
    }

    #[test]
    fn test_simple_from() {
        let query = parse("(from :users [name {:xt/id id}])");
        assert_eq!(
            query,
            Query::From(FromQuery {
                table: "users",
                bind: vec![Binding::var("name"), Binding::new("xt/id", Expr::Var("id"))],
                for_valid_time: None,
                for_system_time: None,
            })
        );
    }

    #[test]
    fn test_from_with_options() {
        let query = parse(
            "(from :docs {:bind [a] :for-valid-time (in #inst \"2020-01-01\" nil) :for-system-time :all-time})",
        );
        let Query::From(from) = query else {
            panic!("expected from");
        };
        assert_eq!(from.bind, vec![Binding::var("a")]);
        assert_eq!(from.for_system_time, Some(TemporalFilter::AllTime));
        assert!(matches!(
            from.for_valid_time,
            Some(TemporalFilter::In(Expr::Tagged { .. }, Expr::Nil))
        ));
    }

    #[test]
    fn test_namespaced_bind_map() {
        let Query::From(from) = parse("(from :users [#:xt{:id id :valid-from vf}])") else {
            panic!("expected from");
        };
        let columns: Vec<_> = from.bind.iter().map(|b| b.column.as_str()).collect();
        assert_eq!(columns, vec!["xt/id", "xt/valid-from"]);
    }

    #[test]
    fn test_pipeline() {
        let query = parse("(-> (from :users [age]) (where (> age 18)) (order-by {:val age :dir :desc}) (limit 5))");
        let Query::Pipeline { head, tails } = query else {
            panic!("expected pipeline");
        };
        assert_eq!(head.operator(), "from");
        assert_eq!(tails.len(), 3);
        assert_eq!(
            tails[0],
            Tail::Where(vec![Expr::Call {
                function: ">",
                args: vec![Expr::Var("age"), Expr::Int(18)],
            }])
        );
        assert_eq!(
            tails[1],
            Tail::OrderBy(vec![OrderSpec {
                val: Expr::Var("age"),
                dir: Some(Direction::Desc),
                nulls: None,
            }])
        );
        assert_eq!(tails[2], Tail::Limit(5));
    }

    #[test]
    fn test_unify_with_join() {
        let query = parse(
            "(unify (from :orders [customer-id]) (left-join (from :customers [{:xt/id customer-id} name]) [name]))",
        );
        let Query::Unify(clauses) = query else {
            panic!("expected unify");
        };
        assert_eq!(clauses.len(), 2);
        let Clause::LeftJoin(join) = &clauses[1] else {
            panic!("expected left-join");
        };
        assert_eq!(join.bind, vec![Binding::var("name")]);
        assert!(join.args.is_none());
    }

    #[test]
    fn test_subquery_with_args() {
        let Query::Pipeline { tails, .. } =
            parse("(-> (from :a [x]) (where (exists? (from :b [{:x x}]) {:args [x]})))")
        else {
            panic!("expected pipeline");
        };
        let Tail::Where(exprs) = &tails[0] else {
            panic!("expected where");
        };
        let Expr::Subquery { op, args, .. } = &exprs[0] else {
            panic!("expected subquery");
        };
        assert_eq!(*op, SubqueryOp::Exists);
        assert_eq!(args.as_deref(), Some(&[Binding::var("x")][..]));
    }

    #[test]
    fn test_expression_literals() {
        let Query::Rel(rel) = parse(r#"(rel [{:a 1 :b "two" :c #{1.5 nil} :d $p}] [a])"#) else {
            panic!("expected rel");
        };
        assert_eq!(
            rel.rows,
            Expr::Vector(vec![Expr::Map(vec![
                ("a".to_string(), Expr::Int(1)),
                ("b".to_string(), Expr::Str(Cow::Borrowed("two"))),
                ("c".to_string(), Expr::Set(vec![Expr::Float(1.5), Expr::Nil])),
                ("d".to_string(), Expr::Param("p")),
            ])])
        );
    }

    #[test]
    fn test_unknown_query_operator() {
        let err = parse_err("(select :users)");
        assert_eq!(err.kind, ParseErrorKind::InvalidQuery);
        assert!(err.message.contains("unknown query operator 'select'"));
    }

    #[test]
    fn test_tail_as_query_hint() {
        let err = parse_err("(where (> a 1))");
        assert!(err.message.contains("pipeline tail"), "{}", err.message);
    }

    #[test]
    fn test_join_outside_unify() {
        let err = parse_err("(-> (from :a [x]) (join (from :b [x]) [x]))");
        assert!(err.message.contains("only valid inside unify"), "{}", err.message);
        assert_eq!(err.position.offset, 18);
    }

    #[test]
    fn test_tail_inside_unify() {
        let err = parse_err("(unify (from :a [x]) (limit 1))");
        assert!(err.message.contains("can't be used inside unify"), "{}", err.message);
    }

    #[test]
    fn test_arity_errors() {
        let err = parse_err("(from :users)");
        assert_eq!(err.message, "'from' expects 2 arguments, found 1");
        let err = parse_err("(-> (from :a [x]) (limit))");
        assert_eq!(err.message, "'limit' expects 1 argument, found 0");
        let err = parse_err("(unify)");
        assert_eq!(err.message, "'unify' expects at least 1 argument, found 0");
    }

    #[test]
    fn test_table_must_be_keyword() {
        let err = parse_err("(from users [a])");
        assert_eq!(err.position.offset, 6);
    }

    #[test]
    fn test_negative_limit() {
        let err = parse_err("(-> (from :a [x]) (limit -1))");
        assert!(err.message.contains("non-negative integer"));
    }

    #[test]
    fn test_duplicate_keys() {
        let err = parse_err("(from :a [{:x a :x b}])");
        assert_eq!(err.kind, ParseErrorKind::InvalidExpression);
        assert!(err.message.contains("duplicate key 'x'"));
    }

    #[test]
    fn test_unknown_from_option() {
        let err = parse_err("(from :a {:bind [x] :at-time 1})");
        assert!(err.message.contains("unknown from option ':at-time'"));
    }

    #[test]
    fn test_order_by_requires_val() {
        let err = parse_err("(-> (from :a [x]) (order-by {:dir :asc}))");
        assert!(err.message.contains("requires :val"));
    }

    #[test]
    fn test_unnest_single_entry() {
        assert!(Parser::parse_str("(-> (from :a [xs]) (unnest {:x xs}))").is_ok());
        let err = parse_err("(-> (from :a [xs]) (unnest {:x xs :y xs}))");
        assert!(err.message.contains("single"));
    }

    #[test]
    fn test_empty_call() {
        let err = parse_err("(-> (from :a [x]) (where ()))");
        assert_eq!(err.kind, ParseErrorKind::InvalidExpression);
    }

    #[test]
    fn test_non_list_query() {
        let err = parse_err("[1 2 3]");
        assert_eq!(err.message, "expected a query form, found vector");
    }
}
