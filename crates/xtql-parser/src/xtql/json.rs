//! JSON rendering of the XTQL AST
//!
//! Output objects are `serde_json::Map`, which keeps keys sorted, so the
//! same query always renders to the same bytes.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Number, Value};

use super::ast::{
    Binding, Clause, Expr, FromQuery, Join, OrderSpec, Query, Rel, Tail, TemporalFilter,
};
use super::keywords::resolve_tag;

/// A compiled query document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JsonDocument(Value);

impl JsonDocument {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Compact single-line rendering
    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    /// Indented rendering for humans
    pub fn to_pretty_string(&self) -> String {
        format!("{:#}", self.0)
    }
}

impl fmt::Display for JsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<JsonDocument> for Value {
    fn from(doc: JsonDocument) -> Self {
        doc.0
    }
}

/// Render a parsed query
pub fn to_document(query: &Query<'_>) -> JsonDocument {
    JsonDocument(query_value(query))
}

fn query_value(query: &Query<'_>) -> Value {
    match query {
        Query::From(from) => from_value(from),
        Query::Pipeline { head, tails } => {
            let mut stages = Vec::with_capacity(tails.len() + 1);
            stages.push(query_value(head));
            stages.extend(tails.iter().map(tail_value));
            Value::Array(stages)
        }
        Query::Unify(clauses) => {
            json!({ "unify": clauses.iter().map(clause_value).collect::<Vec<_>>() })
        }
        Query::Rel(rel) => rel_value(rel),
    }
}

fn from_value(from: &FromQuery<'_>) -> Value {
    let mut obj = Map::new();
    obj.insert("from".into(), Value::from(from.table));
    obj.insert("bind".into(), bindings_value(&from.bind));
    if let Some(tf) = &from.for_valid_time {
        obj.insert("forValidTime".into(), temporal_value(tf));
    }
    if let Some(tf) = &from.for_system_time {
        obj.insert("forSystemTime".into(), temporal_value(tf));
    }
    Value::Object(obj)
}

fn rel_value(rel: &Rel<'_>) -> Value {
    json!({
        "rel": expr_value(&rel.rows),
        "bind": bindings_value(&rel.bind),
    })
}

fn temporal_value(filter: &TemporalFilter<'_>) -> Value {
    match filter {
        TemporalFilter::At(t) => json!({ "at": expr_value(t) }),
        TemporalFilter::From(t) => json!({ "from": expr_value(t) }),
        TemporalFilter::To(t) => json!({ "to": expr_value(t) }),
        TemporalFilter::In(from, to) => json!({ "in": [expr_value(from), expr_value(to)] }),
        TemporalFilter::AllTime => Value::from("allTime"),
    }
}

fn tail_value(tail: &Tail<'_>) -> Value {
    match tail {
        Tail::Where(exprs) => json!({ "where": exprs_value(exprs) }),
        Tail::With(items) => json!({ "with": bindings_value(items) }),
        Tail::Without(columns) => json!({ "without": columns }),
        Tail::Return(items) => json!({ "return": bindings_value(items) }),
        Tail::Aggregate(items) => json!({ "aggregate": bindings_value(items) }),
        Tail::OrderBy(specs) => {
            json!({ "orderBy": specs.iter().map(order_value).collect::<Vec<_>>() })
        }
        Tail::Limit(n) => json!({ "limit": n }),
        Tail::Offset(n) => json!({ "offset": n }),
        Tail::Unnest(binding) => json!({ "unnest": binding_value(binding) }),
    }
}

fn clause_value(clause: &Clause<'_>) -> Value {
    match clause {
        Clause::From(from) => from_value(from),
        Clause::Rel(rel) => rel_value(rel),
        Clause::Where(exprs) => json!({ "where": exprs_value(exprs) }),
        Clause::With(items) => json!({ "with": bindings_value(items) }),
        Clause::Join(join) => join_value("join", join),
        Clause::LeftJoin(join) => join_value("leftJoin", join),
        Clause::Unnest(binding) => json!({ "unnest": binding_value(binding) }),
    }
}

fn join_value(key: &str, join: &Join<'_>) -> Value {
    let mut obj = Map::new();
    obj.insert(key.into(), query_value(&join.query));
    obj.insert("bind".into(), bindings_value(&join.bind));
    if let Some(args) = &join.args {
        obj.insert("args".into(), bindings_value(args));
    }
    Value::Object(obj)
}

fn order_value(spec: &OrderSpec<'_>) -> Value {
    let mut obj = Map::new();
    obj.insert("val".into(), expr_value(&spec.val));
    if let Some(dir) = spec.dir {
        obj.insert("dir".into(), Value::from(dir.as_str()));
    }
    if let Some(nulls) = spec.nulls {
        obj.insert("nulls".into(), Value::from(nulls.as_str()));
    }
    Value::Object(obj)
}

fn binding_value(binding: &Binding<'_>) -> Value {
    let mut obj = Map::new();
    obj.insert(binding.column.clone(), expr_value(&binding.expr));
    Value::Object(obj)
}

fn bindings_value(bindings: &[Binding<'_>]) -> Value {
    Value::Array(bindings.iter().map(binding_value).collect())
}

fn exprs_value(exprs: &[Expr<'_>]) -> Value {
    Value::Array(exprs.iter().map(expr_value).collect())
}

fn expr_value(expr: &Expr<'_>) -> Value {
    match expr {
        Expr::Var(name) => json!({ "xt:lvar": name }),
        Expr::Param(name) => json!({ "xt:param": format!("${}", name) }),
        Expr::Keyword(name) => Value::from(*name),
        Expr::Str(s) => Value::from(s.as_ref()),
        Expr::Int(n) => Value::from(*n),
        // The reader rejects non-finite floats
        Expr::Float(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Nil => Value::Null,
        Expr::Vector(items) => exprs_value(items),
        Expr::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), expr_value(v)))
                .collect(),
        ),
        Expr::Set(items) => json!({ "@type": "xt:set", "@value": exprs_value(items) }),
        Expr::Tagged { tag, value } => json!({
            "@type": resolve_tag(tag),
            "@value": expr_value(value),
        }),
        Expr::Call { function, args } => json!({
            "xt:call": function,
            "args": exprs_value(args),
        }),
        Expr::Subquery { op, query, args } => {
            let mut obj = Map::new();
            obj.insert(op.json_key().into(), query_value(query));
            if let Some(args) = args {
                obj.insert("args".into(), bindings_value(args));
            }
            Value::Object(obj)
        }
    }
}
