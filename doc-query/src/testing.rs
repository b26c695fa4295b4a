//! Fixtures shared by unit tests.

use std::collections::HashMap;

use crate::error::{DataError, Error, StoreError};
use crate::schema::{EntitySchema, FieldDef, FieldType};
use crate::store::RecordStore;
use crate::types::Value;

/// Schema-only store: every statement returns no rows.
pub(crate) struct SchemaStore {
    schemas: HashMap<String, EntitySchema>,
}

impl SchemaStore {
    pub(crate) fn new(schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        Self {
            schemas: schemas.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// `DocType` with its `DocField` child table, `Event`, and a
    /// `Department` tree referenced by `Employee`.
    pub(crate) fn frappe() -> Self {
        Self::new([
            EntitySchema::new("DocType")
                .field(FieldDef::new("issingle", FieldType::Check))
                .field(FieldDef::new("istable", FieldType::Check))
                .field(FieldDef::new("module", FieldType::Data)),
            EntitySchema::new("DocField")
                .child()
                .field(FieldDef::new("fieldname", FieldType::Data))
                .field(FieldDef::new("fieldtype", FieldType::Select))
                .field(FieldDef::new("label", FieldType::Data)),
            EntitySchema::new("Event")
                .field(FieldDef::new("subject", FieldType::Data))
                .field(FieldDef::new("starts_on", FieldType::Datetime))
                .field(FieldDef::new("ends_on", FieldType::Date))
                .field(FieldDef::new("event_type", FieldType::Select)),
            EntitySchema::new("Department")
                .field(FieldDef::new("lft", FieldType::Int))
                .field(FieldDef::new("rgt", FieldType::Int))
                .field(FieldDef::link("parent_department", "Department")),
            EntitySchema::new("Employee")
                .field(FieldDef::link("department", "Department"))
                .field(FieldDef::link("user", "User"))
                .field(FieldDef::new("age", FieldType::Int))
                .field(FieldDef::new("salary", FieldType::Currency)),
            EntitySchema::new("User").field(FieldDef::new("full_name", FieldType::Data)),
        ])
    }
}

impl RecordStore for SchemaStore {
    fn execute_parametrized(
        &self,
        _sql: &str,
        _params: &[Value],
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        Ok(Vec::new())
    }

    fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error> {
        self.schemas
            .get(entity)
            .cloned()
            .ok_or_else(|| DataError::UnknownEntity(entity.to_string()).into())
    }
}
