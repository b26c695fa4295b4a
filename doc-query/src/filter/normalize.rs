//! Shape detection for filter input.
//!
//! Accepted shapes, tried in this order:
//!
//! | Shape | Example | Clauses |
//! |-------|---------|---------|
//! | null | `null` | none |
//! | JSON text | `"{\"name\": \"DocType\"}"` | parsed, then re-dispatched |
//! | Mapping | `{"name": "DocType"}` | `name = 'DocType'` |
//! | Mapping with operator | `{"name": ["like", "J%"]}` | `name like 'J%'` |
//! | Single tuple | `["DocType", "name", "like", "J%"]` | one clause |
//! | List | `[["name", "in", "a,b"], {"istable": 1}]` | one clause per item |
//!
//! List items are 4-tuples `[entity, field, op, value]`, 3-tuples
//! `[field, op, value]`, 2-tuples `[field, value]` or mappings.

use serde_json::{Map, Value as JsonValue};
use tracing::trace;

use crate::config::QueryOptions;
use crate::error::DataError;
use crate::sanitize::parse_column;
use crate::types::{FilterClause, FilterSet, Operator, OrGroup, Value};

use super::FilterInput;

/// Normalize `filters` and `or_filters` on `entity` into a [`FilterSet`].
///
/// `or_filters` becomes a single OR group, dropped when it yields no clauses.
///
/// # Example
///
/// ```
/// use doc_query::{FilterInput, Operator, QueryOptions, normalize};
/// use serde_json::json;
///
/// let set = normalize(
///     "DocField",
///     &FilterInput::from(json!({"parent": "DocType"})),
///     &FilterInput::from(json!([{"fieldtype": "Table"}, {"fieldtype": "Select"}])),
///     &QueryOptions::default(),
/// ).unwrap();
///
/// assert_eq!(set.clauses.len(), 1);
/// assert_eq!(set.or_groups[0].clauses.len(), 2);
/// assert_eq!(set.or_groups[0].clauses[0].operator, Operator::Eq);
/// ```
pub fn normalize(
    entity: &str,
    filters: &FilterInput,
    or_filters: &FilterInput,
    options: &QueryOptions,
) -> Result<FilterSet, DataError> {
    let mut set = match filters {
        FilterInput::Set(set) => set.clone(),
        input => FilterSet {
            clauses: normalize_clauses(entity, input, options)?,
            or_groups: Vec::new(),
        },
    };

    match or_filters {
        // A pre-built set passed as OR filters ORs every clause it holds.
        FilterInput::Set(or_set) => {
            set = set.or_group(OrGroup::new(or_set.iter().cloned().collect()));
        },
        input => {
            set = set.or_group(OrGroup::new(normalize_clauses(entity, input, options)?));
        },
    }

    trace!(
        entity,
        clauses = set.clauses.len(),
        or_groups = set.or_groups.len(),
        "normalized filters"
    );
    Ok(set)
}

/// Normalize one filter input into a flat list of clauses.
pub fn normalize_clauses(
    entity: &str,
    input: &FilterInput,
    options: &QueryOptions,
) -> Result<Vec<FilterClause>, DataError> {
    let mut clauses = Vec::new();
    match input {
        FilterInput::None => {},
        FilterInput::Set(set) => clauses.extend(set.iter().cloned()),
        FilterInput::Json(json) => {
            Normalizer { entity, options }.collect(json, &mut clauses, false)?;
        },
    }
    Ok(clauses)
}

/// Value of an operator given without one, as in `{"name": ["not in"]}`.
static NO_VALUE: JsonValue = JsonValue::Null;

struct Normalizer<'a> {
    entity: &'a str,
    options: &'a QueryOptions,
}

impl Normalizer<'_> {
    fn collect(
        &self,
        json: &JsonValue,
        out: &mut Vec<FilterClause>,
        from_text: bool,
    ) -> Result<(), DataError> {
        match json {
            JsonValue::Null => Ok(()),
            JsonValue::String(text) => {
                if from_text {
                    return Err(DataError::InvalidFilter(
                        "JSON text must decode to a list or mapping".to_string(),
                    ));
                }
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(());
                }
                let parsed: JsonValue = serde_json::from_str(trimmed)
                    .map_err(|e| DataError::InvalidFilter(format!("invalid JSON text: {e}")))?;
                trace!(entity = self.entity, "decoded filters from JSON text");
                self.collect(&parsed, out, true)
            },
            JsonValue::Object(map) => self.mapping(map, out),
            JsonValue::Array(items) if is_single_tuple(items) => {
                trace!(entity = self.entity, "single tuple filter");
                out.push(self.tuple(items)?);
                Ok(())
            },
            JsonValue::Array(items) => {
                for item in items {
                    match item {
                        JsonValue::Object(map) => self.mapping(map, out)?,
                        JsonValue::Array(tuple) => out.push(self.tuple(tuple)?),
                        other => {
                            return Err(DataError::InvalidFilter(format!(
                                "list items must be tuples or mappings, got `{other}`"
                            )));
                        },
                    }
                }
                Ok(())
            },
            other => Err(DataError::InvalidFilter(format!(
                "expected a list or mapping, got `{other}`"
            ))),
        }
    }

    /// `{field: value}` or `{field: [op, value]}`, one clause per key.
    fn mapping(
        &self,
        map: &Map<String, JsonValue>,
        out: &mut Vec<FilterClause>,
    ) -> Result<(), DataError> {
        for (field, value) in map {
            let (entity, field) = self.field(self.entity, field)?;
            let clause = match value {
                JsonValue::Array(spec) => {
                    let (op, value) = match spec.as_slice() {
                        [JsonValue::String(op)] => (op.parse::<Operator>()?, &NO_VALUE),
                        [JsonValue::String(op), value] => (op.parse::<Operator>()?, value),
                        _ => {
                            return Err(DataError::InvalidFilter(format!(
                                "`{field}` must map to a value or to [operator, value]"
                            )));
                        },
                    };
                    let value = convert_value(&field, op, value)?;
                    FilterClause::new(entity, field, op, value)
                },
                value => {
                    let value = convert_value(&field, Operator::Eq, value)?;
                    FilterClause::new(entity, field, Operator::Eq, value)
                },
            };
            out.push(clause);
        }
        Ok(())
    }

    fn tuple(&self, items: &[JsonValue]) -> Result<FilterClause, DataError> {
        let (entity, field, op, value) = match items {
            [entity, field, op, value] => (Some(entity), field, Some(op), value),
            [field, op, value] => (None, field, Some(op), value),
            [field, value] => (None, field, None, value),
            _ => {
                return Err(DataError::InvalidFilter(format!(
                    "filter tuples have 2 to 4 items, got {}",
                    items.len()
                )));
            },
        };

        let entity = match entity {
            Some(entity) => {
                let entity = expect_str(entity, "entity")?;
                self.options.resolve_qualifier(entity, self.entity)
            },
            None => self.entity,
        };
        let (entity, field) = self.field(entity, expect_str(field, "field")?)?;
        let op = match op {
            Some(op) => expect_str(op, "operator")?.parse::<Operator>()?,
            None => Operator::Eq,
        };
        let value = convert_value(&field, op, value)?;
        Ok(FilterClause::new(entity, field, op, value))
    }

    /// Split `entity.field` / `` `tabEntity`.`field` ``; bare fields keep `entity`.
    fn field(&self, entity: &str, field: &str) -> Result<(String, String), DataError> {
        let col = parse_column(field)?;
        let entity = col
            .qualifier
            .as_deref()
            .map_or(entity, |q| self.options.resolve_qualifier(q, self.entity));
        Ok((entity.to_string(), col.field))
    }
}

/// A flat list of 3 or 4 items starting with a string is one tuple, not a
/// list of tuples.
fn is_single_tuple(items: &[JsonValue]) -> bool {
    matches!(items.len(), 3 | 4) && matches!(items.first(), Some(JsonValue::String(_)))
}

fn expect_str<'j>(json: &'j JsonValue, what: &str) -> Result<&'j str, DataError> {
    json.as_str()
        .ok_or_else(|| DataError::InvalidFilter(format!("{what} must be a string, got `{json}`")))
}

/// Convert a JSON value into the canonical value for `op`.
fn convert_value(field: &str, op: Operator, json: &JsonValue) -> Result<Value, DataError> {
    let value = Value::from_json(json).ok_or_else(|| DataError::InvalidValue {
        field: field.to_string(),
        reason: "objects are not valid filter values".to_string(),
    })?;
    canonical_value(field, op, value)
}

/// Bring `value` into the shape `op` compiles from.
///
/// `in` takes a list (comma-separated text is split) and `is` takes exactly
/// `"set"` or `"not set"`. Applied to every clause, however it was built.
pub(super) fn canonical_value(field: &str, op: Operator, value: Value) -> Result<Value, DataError> {
    match op {
        Operator::In | Operator::NotIn => Ok(Value::Array(match value {
            Value::Null => Vec::new(),
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Value::from)
                .collect(),
            Value::Array(items) => items,
            scalar => vec![scalar],
        })),
        Operator::Is | Operator::IsNot => match &value {
            Value::Null => Ok(Value::from("not set")),
            Value::String(s) if s.trim().eq_ignore_ascii_case("set") => Ok(Value::from("set")),
            Value::String(s) if s.trim().eq_ignore_ascii_case("not set") => {
                Ok(Value::from("not set"))
            },
            _ => Err(DataError::InvalidValue {
                field: field.to_string(),
                reason: format!("`{op}` expects \"set\" or \"not set\""),
            }),
        },
        Operator::Between => Ok(value),
        Operator::DescendantOf | Operator::AncestorOf => match value {
            Value::String(_) => Ok(value),
            _ => Err(DataError::InvalidValue {
                field: field.to_string(),
                reason: format!("`{op}` expects a node name"),
            }),
        },
        _ => match value {
            Value::Array(_) => Err(DataError::InvalidValue {
                field: field.to_string(),
                reason: format!("`{op}` takes a single value, not a list"),
            }),
            value => Ok(value),
        },
    }
}
