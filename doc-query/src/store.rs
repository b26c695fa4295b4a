//! The record-store capability consumed by the query assembler.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, StoreError};
use crate::schema::EntitySchema;
use crate::types::Value;

/// Backend that owns the data and its connection pool.
///
/// Implementations decide isolation, timeouts and cancellation; this crate
/// never retries a failed call.
pub trait RecordStore: Send + Sync {
    /// Execute a parametrized statement and return raw row tuples, columns in
    /// SELECT order.
    fn execute_parametrized(&self, sql: &str, params: &[Value])
    -> Result<Vec<Vec<Value>>, StoreError>;

    /// Schema of `entity`. Unknown entities are reported as
    /// [`DataError::UnknownEntity`](crate::DataError::UnknownEntity).
    fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn execute_parametrized(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        (**self).execute_parametrized(sql, params)
    }

    fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error> {
        (**self).get_schema(entity)
    }
}

/// A result row keyed by the requested field keys, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Zip keys with a raw tuple.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the tuple is not exactly as wide as `keys`.
    pub fn from_tuple(keys: &[String], values: Vec<Value>) -> Result<Self, StoreError> {
        if keys.len() != values.len() {
            return Err(StoreError::new(format!(
                "row has {} values for {} selected fields",
                values.len(),
                keys.len()
            )));
        }
        Ok(Self {
            columns: keys.iter().cloned().zip(values).collect(),
        })
    }

    /// Value under `key` (first match when keys repeat).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    /// `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Convert to a JSON object.
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (key, value) in &self.columns {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
