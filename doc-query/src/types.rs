//! Core types shared by the normalizer, compiler and assembler.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::DataError;

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operator {
    /// Equal: `=`
    Eq,
    /// Not equal: `!=` (also written `<>`)
    Ne,
    /// Greater than: `>`
    Gt,
    /// Less than: `<`
    Lt,
    /// Greater than or equal: `>=`
    Gte,
    /// Less than or equal: `<=`
    Lte,
    /// Pattern match, wildcards supplied by the caller: `like`
    Like,
    /// Negated pattern match: `not like`
    NotLike,
    /// Membership: `in`
    In,
    /// Negated membership: `not in`
    NotIn,
    /// Inclusive range: `between`
    Between,
    /// Presence check against `"set"` / `"not set"`: `is`
    Is,
    /// Negated presence check: `is not`
    IsNot,
    /// Nested-set subtree below a node: `descendant of`
    DescendantOf,
    /// Nested-set path above a node: `ancestor of`
    AncestorOf,
}

impl Operator {
    /// Every supported operator, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Lt,
        Self::Gte,
        Self::Lte,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::NotIn,
        Self::Between,
        Self::Is,
        Self::IsNot,
        Self::DescendantOf,
        Self::AncestorOf,
    ];

    /// Parse operator text.
    ///
    /// Case-insensitive; surrounding whitespace and repeated inner spaces are
    /// ignored.
    ///
    /// ```
    /// use doc_query::Operator;
    ///
    /// assert_eq!(Operator::parse("NOT  In"), Some(Operator::NotIn));
    /// assert_eq!(Operator::parse("<>"), Some(Operator::Ne));
    /// assert_eq!(Operator::parse("regexp"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();

        match normalized.as_str() {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "not like" => Some(Self::NotLike),
            "in" => Some(Self::In),
            "not in" => Some(Self::NotIn),
            "between" => Some(Self::Between),
            "is" => Some(Self::Is),
            "is not" => Some(Self::IsNot),
            "descendant of" => Some(Self::DescendantOf),
            "ancestor of" => Some(Self::AncestorOf),
            _ => None,
        }
    }

    /// Canonical text form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Between => "between",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::DescendantOf => "descendant of",
            Self::AncestorOf => "ancestor of",
        }
    }

    /// Operators whose match should include rows where the column is NULL.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        matches!(self, Self::Ne | Self::NotLike | Self::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DataError::UnknownOperator(s.to_string()))
    }
}

/// Bound parameter values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    String(String),
    /// List, expanded by `in`/`not in` and `between`
    Array(Vec<Value>),
}

impl Value {
    /// Convert from a JSON value. Objects are not valid values.
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Option<Self> {
        match json {
            JsonValue::Null => Some(Self::Null),
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            JsonValue::String(s) => Some(Self::String(s.clone())),
            JsonValue::Array(arr) => arr
                .iter()
                .map(Self::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            JsonValue::Object(_) => None,
        }
    }

    /// Convert into a JSON value.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Whether this is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

/// One normalized filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Entity the field belongs to.
    pub entity: String,
    /// Field name.
    pub field: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Right-hand value.
    pub value: Value,
}

impl FilterClause {
    /// Create a clause.
    pub fn new(
        entity: impl Into<String>,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Clauses combined with OR; the group as a whole is ANDed with the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrGroup {
    /// Alternatives; at least one must hold.
    pub clauses: Vec<FilterClause>,
}

impl OrGroup {
    /// Group from clauses.
    pub const fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    /// Whether the group holds no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Canonical filter input: ANDed clauses plus OR groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    /// ANDed clauses.
    pub clauses: Vec<FilterClause>,
    /// OR groups, each ANDed with `clauses`.
    pub or_groups: Vec<OrGroup>,
}

impl FilterSet {
    /// Empty set (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ANDed clause.
    pub fn and(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Add an OR group. Empty groups are dropped.
    pub fn or_group(mut self, group: OrGroup) -> Self {
        if !group.is_empty() {
            self.or_groups.push(group);
        }
        self
    }

    /// Append every clause and group of `other`.
    pub fn extend(&mut self, other: Self) {
        self.clauses.extend(other.clauses);
        self.or_groups
            .extend(other.or_groups.into_iter().filter(|g| !g.is_empty()));
    }

    /// Whether there is nothing to filter on.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.or_groups.is_empty()
    }

    /// Total number of clauses, including those inside OR groups.
    pub fn len(&self) -> usize {
        self.clauses.len() + self.or_groups.iter().map(|g| g.clauses.len()).sum::<usize>()
    }

    /// Iterate over every clause, main set first.
    pub fn iter(&self) -> impl Iterator<Item = &FilterClause> {
        self.clauses
            .iter()
            .chain(self.or_groups.iter().flat_map(|g| g.clauses.iter()))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

impl SortDir {
    /// SQL keyword.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parse `asc` / `desc`, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }
}

/// A compiled boolean expression with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Predicate must be embedded in a statement"]
pub struct Predicate {
    /// Boolean SQL with placeholders; empty when nothing is constrained.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<Value>,
}

impl Predicate {
    /// Whether the predicate constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// A complete statement ready for the record store.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "Statement must be executed"]
pub struct Statement {
    /// Full SELECT text.
    pub sql: String,
    /// Values in placeholder order.
    pub params: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse_round_trips_canonical_text() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
    }

    #[test]
    fn test_operator_parse_is_lenient_about_spacing_and_case() {
        assert_eq!(Operator::parse(" LIKE "), Some(Operator::Like));
        assert_eq!(Operator::parse("Not Like"), Some(Operator::NotLike));
        assert_eq!(Operator::parse("descendant   of"), Some(Operator::DescendantOf));
    }

    #[test]
    fn test_operator_from_str_rejects_unknown() {
        let err = "regexp".parse::<Operator>().unwrap_err();
        assert_eq!(err, DataError::UnknownOperator("regexp".into()));
    }

    #[test]
    fn test_negative_operators() {
        assert!(Operator::Ne.is_negative());
        assert!(Operator::NotIn.is_negative());
        assert!(Operator::NotLike.is_negative());
        assert!(!Operator::In.is_negative());
        assert!(!Operator::IsNot.is_negative());
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_json(&json!(3)), Some(Value::Int(3)));
        assert_eq!(Value::from_json(&json!(1.5)), Some(Value::Float(1.5)));
        assert_eq!(
            Value::from_json(&json!(["a", 1])),
            Some(Value::Array(vec![Value::from("a"), Value::Int(1)]))
        );
        assert_eq!(Value::from_json(&json!({"a": 1})), None);
        assert_eq!(Value::from_json(&json!([{"a": 1}])), None);
    }

    #[test]
    fn test_value_serializes_untagged() {
        let v = Value::Array(vec![Value::Null, Value::Int(1), Value::from("x")]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"[null,1,"x"]"#);
        assert_eq!(v.to_json(), json!([null, 1, "x"]));
    }

    #[test]
    fn test_filter_set_len_counts_or_groups() {
        let set = FilterSet::new()
            .and(FilterClause::new("Event", "subject", Operator::Eq, "x"))
            .or_group(OrGroup::new(vec![
                FilterClause::new("Event", "status", Operator::Eq, "Open"),
                FilterClause::new("Event", "status", Operator::Eq, "Closed"),
            ]))
            .or_group(OrGroup::default());

        assert_eq!(set.len(), 3);
        assert_eq!(set.or_groups.len(), 1);
        assert_eq!(set.iter().count(), 3);
    }
}
