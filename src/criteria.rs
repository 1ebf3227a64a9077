//! The criteria model: a chain of filter nodes handed to the query compiler.
//!
//! A chain reads left to right. Every node after the first is combined with
//! what came before it, either conjunctively (the default), disjunctively
//! (`or`) or as an exclusion (`not`):
//!
//! ```text
//! where name is "foo"  or  age > 30  and not  status is "closed"
//! └──── node 0 ─────┘  └─ node 1 ─┘  └────── node 2 ─────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the segments of a field path.
pub const PATH_SEPARATOR: char = '.';

/// A reference to the attribute a node filters on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Simple(String),
    /// A path that may cross into a nested sub-document. When `nested` is set,
    /// the segment before the first `.` names the nested scope.
    Nested { name: String, nested: bool },
}

impl Field {
    pub fn simple(name: impl Into<String>) -> Self {
        Field::Simple(name.into())
    }

    pub fn nested(name: impl Into<String>, nested: bool) -> Self {
        Field::Nested {
            name: name.into(),
            nested,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Field::Simple(name) | Field::Nested { name, .. } => name,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Field::Nested { nested: true, .. })
    }

    /// The nested scope this field lives in, if it is marked nested.
    ///
    /// A name without a separator is its own scope.
    pub fn nested_root(&self) -> Option<&str> {
        match self {
            Field::Nested { name, nested: true } => name.split(PATH_SEPARATOR).next(),
            _ => None,
        }
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::simple(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::Simple(name)
    }
}

/// A value carried by a condition entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}

/// The operator of a condition entry, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKey {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Expression,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Between,
    Fuzzy,
    In,
    NotIn,
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKey::Equals => "EQUALS",
            OperationKey::Contains => "CONTAINS",
            OperationKey::StartsWith => "STARTS_WITH",
            OperationKey::EndsWith => "ENDS_WITH",
            OperationKey::Expression => "EXPRESSION",
            OperationKey::Less => "LESS",
            OperationKey::LessEqual => "LESS_EQUAL",
            OperationKey::Greater => "GREATER",
            OperationKey::GreaterEqual => "GREATER_EQUAL",
            OperationKey::Between => "BETWEEN",
            OperationKey::Fuzzy => "FUZZY",
            OperationKey::In => "IN",
            OperationKey::NotIn => "NOT_IN",
        };
        f.write_str(name)
    }
}

/// One condition on a field. Each operator carries the payload shape it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriteriaEntry {
    Equals(Literal),
    Contains(Literal),
    StartsWith(Literal),
    EndsWith(Literal),
    Expression(Literal),
    Less(Literal),
    LessEqual(Literal),
    Greater(Literal),
    GreaterEqual(Literal),
    /// Lower and upper bound, both inclusive. A null bound leaves that side open.
    Between(Literal, Literal),
    Fuzzy(Literal),
    In(Vec<Literal>),
    NotIn(Vec<Literal>),
}

impl CriteriaEntry {
    pub fn key(&self) -> OperationKey {
        match self {
            CriteriaEntry::Equals(_) => OperationKey::Equals,
            CriteriaEntry::Contains(_) => OperationKey::Contains,
            CriteriaEntry::StartsWith(_) => OperationKey::StartsWith,
            CriteriaEntry::EndsWith(_) => OperationKey::EndsWith,
            CriteriaEntry::Expression(_) => OperationKey::Expression,
            CriteriaEntry::Less(_) => OperationKey::Less,
            CriteriaEntry::LessEqual(_) => OperationKey::LessEqual,
            CriteriaEntry::Greater(_) => OperationKey::Greater,
            CriteriaEntry::GreaterEqual(_) => OperationKey::GreaterEqual,
            CriteriaEntry::Between(..) => OperationKey::Between,
            CriteriaEntry::Fuzzy(_) => OperationKey::Fuzzy,
            CriteriaEntry::In(_) => OperationKey::In,
            CriteriaEntry::NotIn(_) => OperationKey::NotIn,
        }
    }

    /// An entry without a value compiles to nothing.
    pub fn is_null(&self) -> bool {
        match self {
            CriteriaEntry::Equals(v)
            | CriteriaEntry::Contains(v)
            | CriteriaEntry::StartsWith(v)
            | CriteriaEntry::EndsWith(v)
            | CriteriaEntry::Expression(v)
            | CriteriaEntry::Less(v)
            | CriteriaEntry::LessEqual(v)
            | CriteriaEntry::Greater(v)
            | CriteriaEntry::GreaterEqual(v)
            | CriteriaEntry::Fuzzy(v) => v.is_null(),
            CriteriaEntry::Between(lower, upper) => lower.is_null() && upper.is_null(),
            CriteriaEntry::In(_) | CriteriaEntry::NotIn(_) => false,
        }
    }
}

/// A single link of a criteria chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    field: Field,
    entries: Vec<CriteriaEntry>,
    boost: Option<f32>,
    or: bool,
    negating: bool,
}

impl Criteria {
    pub fn new(field: impl Into<Field>) -> Self {
        Self {
            field: field.into(),
            entries: Vec::new(),
            boost: None,
            or: false,
            negating: false,
        }
    }

    /// Marks this node as OR-ed with the previous one.
    pub fn disjunctive(mut self) -> Self {
        self.or = true;
        self
    }

    pub fn negate(mut self) -> Self {
        self.negating = true;
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn with_entry(mut self, entry: CriteriaEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn add_entry(&mut self, entry: CriteriaEntry) {
        self.entries.push(entry);
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn entries(&self) -> &[CriteriaEntry] {
        &self.entries
    }

    pub fn boost(&self) -> Option<f32> {
        self.boost
    }

    pub fn is_or(&self) -> bool {
        self.or
    }

    pub fn is_negating(&self) -> bool {
        self.negating
    }
}

/// An ordered chain of criteria nodes.
///
/// Built fluently from [`CriteriaChain::where_field`]; condition methods such
/// as [`is`](CriteriaChain::is) or [`between`](CriteriaChain::between) apply
/// to the most recently added node and do nothing on an empty chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaChain {
    nodes: Vec<Criteria>,
}

impl CriteriaChain {
    pub fn where_field(field: impl Into<Field>) -> Self {
        Self {
            nodes: vec![Criteria::new(field)],
        }
    }

    pub fn from_nodes(nodes: Vec<Criteria>) -> Self {
        Self { nodes }
    }

    pub fn push(&mut self, criteria: Criteria) {
        self.nodes.push(criteria);
    }

    pub fn nodes(&self) -> &[Criteria] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Criteria> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Starts a new node AND-ed with the previous one.
    pub fn and(mut self, field: impl Into<Field>) -> Self {
        self.nodes.push(Criteria::new(field));
        self
    }

    /// Starts a new node OR-ed with the previous one.
    pub fn or(mut self, field: impl Into<Field>) -> Self {
        self.nodes.push(Criteria::new(field).disjunctive());
        self
    }

    /// Negates the current node.
    pub fn not(self) -> Self {
        self.with_last(|node| node.negating = true)
    }

    pub fn boost(self, boost: f32) -> Self {
        self.with_last(|node| node.boost = Some(boost))
    }

    pub fn is(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Equals(value.into()))
    }

    pub fn contains(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Contains(value.into()))
    }

    pub fn starts_with(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::StartsWith(value.into()))
    }

    pub fn ends_with(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::EndsWith(value.into()))
    }

    pub fn expression(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Expression(value.into()))
    }

    pub fn fuzzy(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Fuzzy(value.into()))
    }

    pub fn between(self, lower: impl Into<Literal>, upper: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Between(lower.into(), upper.into()))
    }

    pub fn less_than(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Less(value.into()))
    }

    pub fn less_than_equal(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::LessEqual(value.into()))
    }

    pub fn greater_than(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::Greater(value.into()))
    }

    pub fn greater_than_equal(self, value: impl Into<Literal>) -> Self {
        self.entry(CriteriaEntry::GreaterEqual(value.into()))
    }

    pub fn is_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        self.entry(CriteriaEntry::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        self.entry(CriteriaEntry::NotIn(values.into_iter().map(Into::into).collect()))
    }

    pub fn entry(self, entry: CriteriaEntry) -> Self {
        self.with_last(|node| node.entries.push(entry))
    }

    fn with_last(mut self, f: impl FnOnce(&mut Criteria)) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            f(node);
        }
        self
    }
}

impl<'a> IntoIterator for &'a CriteriaChain {
    type Item = &'a Criteria;
    type IntoIter = std::slice::Iter<'a, Criteria>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
