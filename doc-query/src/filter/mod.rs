//! Filter input, normalization and compilation.
//!
//! Filters arrive in several surface shapes (see [`normalize`]) and leave as a
//! [`Predicate`](crate::Predicate): SQL text with every literal bound.

mod between;
mod compile;
mod normalize;

pub(crate) use compile::Compiler;
pub use normalize::{normalize, normalize_clauses};

use serde_json::Value as JsonValue;

use crate::dialect::Dialect;
use crate::types::{FilterClause, FilterSet, Predicate, Value};

/// Caller-supplied filters: raw JSON in any accepted shape, or an already
/// normalized [`FilterSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FilterInput {
    /// No filters.
    #[default]
    None,
    /// Any accepted JSON shape, including JSON text inside a string.
    Json(JsonValue),
    /// Already canonical.
    Set(FilterSet),
}

impl FilterInput {
    /// Whether nothing was supplied.
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None | Self::Json(JsonValue::Null))
    }
}

impl From<JsonValue> for FilterInput {
    fn from(json: JsonValue) -> Self {
        Self::Json(json)
    }
}

impl From<FilterSet> for FilterInput {
    fn from(set: FilterSet) -> Self {
        Self::Set(set)
    }
}

impl From<FilterClause> for FilterInput {
    fn from(clause: FilterClause) -> Self {
        Self::Set(FilterSet::new().and(clause))
    }
}

/// JSON text, as sent by clients that serialize filters into a query string.
impl From<&str> for FilterInput {
    fn from(text: &str) -> Self {
        Self::Json(JsonValue::String(text.to_string()))
    }
}

impl<T: Into<Self>> From<Option<T>> for FilterInput {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::None, Into::into)
    }
}

/// Allocates placeholders and collects bound values in text order.
pub(crate) struct Binder<D: Dialect> {
    dialect: D,
    params: Vec<Value>,
}

impl<D: Dialect> Binder<D> {
    pub(crate) const fn new(dialect: D) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Continue after parameters that precede this fragment in the text.
    pub(crate) const fn with_params(dialect: D, params: Vec<Value>) -> Self {
        Self { dialect, params }
    }

    pub(crate) fn dialect(&self) -> D {
        self.dialect
    }

    /// Bind one value and return its placeholder.
    pub(crate) fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.param(self.params.len())
    }

    /// Index the next placeholder will get.
    pub(crate) fn next_idx(&self) -> usize {
        self.params.len() + 1
    }

    /// `column IN (...)` / `column NOT IN (...)`.
    pub(crate) fn in_list(&mut self, column: &str, values: &[Value], negated: bool) -> String {
        let idx = self.next_idx();
        let (sql, params) = if negated {
            self.dialect.not_in_clause(column, values, idx)
        } else {
            self.dialect.in_clause(column, values, idx)
        };
        self.params.extend(params);
        sql
    }

    /// Current position, for [`rewind`](Self::rewind).
    pub(crate) fn mark(&self) -> usize {
        self.params.len()
    }

    /// Drop every value bound since `mark`.
    pub(crate) fn rewind(&mut self, mark: usize) {
        self.params.truncate(mark);
    }

    pub(crate) fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// A compiled condition before it is rendered into a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Cond {
    /// Matches every row; contributes nothing to the WHERE clause.
    True,
    /// Matches no row.
    False,
    Sql(String),
}

impl Cond {
    /// `1=0` for [`Cond::False`], empty for [`Cond::True`].
    pub(crate) fn into_sql(self) -> String {
        match self {
            Self::True => String::new(),
            Self::False => "1=0".to_string(),
            Self::Sql(sql) => sql,
        }
    }

    pub(crate) fn into_predicate(self, params: Vec<Value>) -> Predicate {
        match self {
            Self::True => Predicate::default(),
            cond => Predicate {
                sql: cond.into_sql(),
                params,
            },
        }
    }
}
