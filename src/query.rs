//! Query tree produced by the compiler.
//!
//! Each variant mirrors one clause of the search engine's query DSL and
//! renders itself with [`Query::to_json`]. Whether a clause carries a boost is
//! decided by its variant: leaf clauses and nested scopes do, `bool` does not.

use crate::criteria::Literal;
use serde_json::{json, Map, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    QueryString(QueryStringQuery),
    Range(RangeQuery),
    Fuzzy(FuzzyQuery),
    Bool(BoolQuery),
    Nested(NestedQuery),
}

impl Query {
    pub fn is_boostable(&self) -> bool {
        !matches!(self, Query::Bool(_))
    }

    pub fn boost(&self) -> Option<f32> {
        match self {
            Query::QueryString(q) => q.boost,
            Query::Range(q) => q.boost,
            Query::Fuzzy(q) => q.boost,
            Query::Nested(q) => q.boost,
            Query::Bool(_) => None,
        }
    }

    /// Sets the boost if this clause supports one. Returns whether it was applied.
    pub fn set_boost(&mut self, boost: f32) -> bool {
        let slot = match self {
            Query::QueryString(q) => &mut q.boost,
            Query::Range(q) => &mut q.boost,
            Query::Fuzzy(q) => &mut q.boost,
            Query::Nested(q) => &mut q.boost,
            Query::Bool(_) => return false,
        };
        *slot = Some(boost);
        true
    }

    pub fn as_bool(&self) -> Option<&BoolQuery> {
        match self {
            Query::Bool(q) => Some(q),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::QueryString(q) => q.to_json(),
            Query::Range(q) => q.to_json(),
            Query::Fuzzy(q) => q.to_json(),
            Query::Bool(q) => q.to_json(),
            Query::Nested(q) => q.to_json(),
        }
    }
}

/// Boosts render from their shortest `f32` text so `1.1` stays `1.1`.
fn insert_boost(body: &mut Map<String, Value>, boost: Option<f32>) {
    let rendered = boost
        .and_then(|boost| boost.to_string().parse::<f64>().ok())
        .and_then(Number::from_f64);
    if let Some(number) = rendered {
        body.insert("boost".to_string(), Value::Number(number));
    }
}

fn literal_to_json(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => json!(b),
        Literal::Integer(n) => json!(n),
        Literal::Float(x) => json!(x),
        Literal::Text(s) => json!(s),
    }
}

/// How the terms of a query string are combined when no operator is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOperator {
    And,
    Or,
}

impl DefaultOperator {
    fn as_str(self) -> &'static str {
        match self {
            DefaultOperator::And => "and",
            DefaultOperator::Or => "or",
        }
    }
}

/// Free-text match on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStringQuery {
    pub query: String,
    pub field: String,
    pub default_operator: Option<DefaultOperator>,
    pub analyze_wildcard: bool,
    pub boost: Option<f32>,
}

impl QueryStringQuery {
    pub fn new(query: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            field: field.into(),
            default_operator: None,
            analyze_wildcard: false,
            boost: None,
        }
    }

    pub fn default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = Some(operator);
        self
    }

    pub fn analyze_wildcard(mut self, analyze: bool) -> Self {
        self.analyze_wildcard = analyze;
        self
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), json!(self.query));
        body.insert("fields".to_string(), json!([self.field]));
        if let Some(operator) = self.default_operator {
            body.insert("default_operator".to_string(), json!(operator.as_str()));
        }
        if self.analyze_wildcard {
            body.insert("analyze_wildcard".to_string(), json!(true));
        }
        insert_boost(&mut body, self.boost);
        json!({ "query_string": Value::Object(body) })
    }
}

/// One end of a range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub value: Literal,
    pub inclusive: bool,
}

/// Range over a field's native values. A missing bound leaves that side open.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
    pub boost: Option<f32>,
}

impl RangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            lower: None,
            upper: None,
            boost: None,
        }
    }

    pub fn gt(self, value: Literal) -> Self {
        self.with_lower(value, false)
    }

    pub fn gte(self, value: Literal) -> Self {
        self.with_lower(value, true)
    }

    pub fn lt(self, value: Literal) -> Self {
        self.with_upper(value, false)
    }

    pub fn lte(self, value: Literal) -> Self {
        self.with_upper(value, true)
    }

    /// Inclusive on both ends; a null bound stays open.
    pub fn between(self, from: Literal, to: Literal) -> Self {
        self.with_lower(from, true).with_upper(to, true)
    }

    fn with_lower(mut self, value: Literal, inclusive: bool) -> Self {
        self.lower = (!value.is_null()).then_some(RangeBound { value, inclusive });
        self
    }

    fn with_upper(mut self, value: Literal, inclusive: bool) -> Self {
        self.upper = (!value.is_null()).then_some(RangeBound { value, inclusive });
        self
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(lower) = &self.lower {
            let key = if lower.inclusive { "gte" } else { "gt" };
            body.insert(key.to_string(), literal_to_json(&lower.value));
        }
        if let Some(upper) = &self.upper {
            let key = if upper.inclusive { "lte" } else { "lt" };
            body.insert(key.to_string(), literal_to_json(&upper.value));
        }
        insert_boost(&mut body, self.boost);

        let mut range = Map::new();
        range.insert(self.field.clone(), Value::Object(body));
        json!({ "range": Value::Object(range) })
    }
}

/// Approximate match on a literal term.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    pub field: String,
    pub value: String,
    pub boost: Option<f32>,
}

impl FuzzyQuery {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            boost: None,
        }
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("value".to_string(), json!(self.value));
        insert_boost(&mut body, self.boost);

        let mut fuzzy = Map::new();
        fuzzy.insert(self.field.clone(), Value::Object(body));
        json!({ "fuzzy": Value::Object(fuzzy) })
    }
}

/// Boolean combination of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub must: Vec<Query>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should(mut self, query: impl Into<Query>) -> Self {
        self.should.push(query.into());
        self
    }

    pub fn must_not(mut self, query: impl Into<Query>) -> Self {
        self.must_not.push(query.into());
        self
    }

    pub fn must(mut self, query: impl Into<Query>) -> Self {
        self.must.push(query.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.should.is_empty() && self.must_not.is_empty() && self.must.is_empty()
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("should", &self.should),
            ("must_not", &self.must_not),
            ("must", &self.must),
        ] {
            if !clauses.is_empty() {
                let rendered = clauses.iter().map(Query::to_json).collect();
                body.insert(key.to_string(), Value::Array(rendered));
            }
        }
        json!({ "bool": Value::Object(body) })
    }
}

/// Restricts a clause to one nested sub-document scope.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedQuery {
    pub path: String,
    pub query: Box<Query>,
    pub boost: Option<f32>,
}

impl NestedQuery {
    pub fn new(path: impl Into<String>, query: impl Into<Query>) -> Self {
        Self {
            path: path.into(),
            query: Box::new(query.into()),
            boost: None,
        }
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("path".to_string(), json!(self.path));
        body.insert("query".to_string(), self.query.to_json());
        insert_boost(&mut body, self.boost);
        json!({ "nested": Value::Object(body) })
    }
}

impl From<QueryStringQuery> for Query {
    fn from(query: QueryStringQuery) -> Self {
        Query::QueryString(query)
    }
}

impl From<RangeQuery> for Query {
    fn from(query: RangeQuery) -> Self {
        Query::Range(query)
    }
}

impl From<FuzzyQuery> for Query {
    fn from(query: FuzzyQuery) -> Self {
        Query::Fuzzy(query)
    }
}

impl From<BoolQuery> for Query {
    fn from(query: BoolQuery) -> Self {
        Query::Bool(query)
    }
}

impl From<NestedQuery> for Query {
    fn from(query: NestedQuery) -> Self {
        Query::Nested(query)
    }
}
