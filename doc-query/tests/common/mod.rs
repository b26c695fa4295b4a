//! In-memory SQLite record store shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use doc_query::{EntitySchema, Error, FieldType, RecordStore, Row, StoreError, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};

/// Timestamps are stored with microseconds so text comparison matches time order.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Schemas of the fixture entities, in the shape a metadata service returns.
const SCHEMAS: &str = r#"[
    {"name": "DocType", "fields": [
        {"name": "issingle", "field_type": "Check"},
        {"name": "istable", "field_type": "Check"},
        {"name": "module", "field_type": "Data"}
    ]},
    {"name": "DocField", "is_child": true, "sort_field": "idx", "sort_order": "asc", "fields": [
        {"name": "fieldname", "field_type": "Data"},
        {"name": "fieldtype", "field_type": "Select"},
        {"name": "label", "field_type": "Data"}
    ]},
    {"name": "Event", "fields": [
        {"name": "subject", "field_type": "Data"},
        {"name": "starts_on", "field_type": "Datetime"},
        {"name": "event_type", "field_type": "Select"}
    ]},
    {"name": "Department", "fields": [
        {"name": "lft", "field_type": "Int"},
        {"name": "rgt", "field_type": "Int"},
        {"name": "parent_department", "field_type": "Link", "options": "Department"}
    ]}
]"#;

/// The fixed instant tests run at.
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|d| d.and_hms_opt(10, 30, 0))
        .unwrap()
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    schemas: HashMap<String, EntitySchema>,
}

impl SqliteStore {
    /// Empty tables for every fixture entity.
    pub fn new() -> Self {
        let schemas: Vec<EntitySchema> = serde_json::from_str(SCHEMAS).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        for schema in &schemas {
            conn.execute_batch(&create_table(schema)).unwrap();
        }
        Self {
            conn: Mutex::new(conn),
            schemas: schemas.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Store seeded with doctypes, their fields and a department tree.
    pub fn seeded() -> Self {
        let store = Self::new();
        for (name, issingle, istable, module) in [
            ("DocType", 0, 0, "Core"),
            ("DocField", 0, 1, "Core"),
            ("Event", 0, 0, "Desk"),
            ("ToDo", 0, 0, "Desk"),
            ("Journal Entry", 0, 0, "Accounts"),
            ("System Settings", 1, 0, "Core"),
        ] {
            store.insert(
                "DocType",
                name,
                &[
                    ("issingle", Value::Int(issingle)),
                    ("istable", Value::Int(istable)),
                    ("module", Value::from(module)),
                ],
            );
        }
        store.set_owner("DocType", "ToDo", "test1@example.com");

        for (idx, (parent, fieldname, fieldtype)) in [
            ("DocType", "module", "Link"),
            ("DocType", "issingle", "Check"),
            ("DocType", "fields", "Table"),
            ("DocType", "document_type", "Select"),
            ("Event", "starts_on", "Datetime"),
            ("Event", "event_type", "Select"),
        ]
        .into_iter()
        .enumerate()
        {
            store.insert(
                "DocField",
                &format!("{parent}-{fieldname}"),
                &[
                    ("parent", Value::from(parent)),
                    ("parenttype", Value::from("DocType")),
                    ("parentfield", Value::from("fields")),
                    ("idx", Value::Int(i64::try_from(idx).unwrap())),
                    ("fieldname", Value::from(fieldname)),
                    ("fieldtype", Value::from(fieldtype)),
                ],
            );
        }

        // All Departments
        // ├── Sales
        // │   └── Retail
        // └── Research
        for (name, lft, rgt, parent) in [
            ("All Departments", 1, 8, None),
            ("Sales", 2, 5, Some("All Departments")),
            ("Retail", 3, 4, Some("Sales")),
            ("Research", 6, 7, Some("All Departments")),
        ] {
            store.insert(
                "Department",
                name,
                &[
                    ("lft", Value::Int(lft)),
                    ("rgt", Value::Int(rgt)),
                    ("parent_department", Value::from(parent)),
                ],
            );
        }
        store
    }

    /// Insert a record with standard fields filled in.
    pub fn insert(&self, entity: &str, name: &str, values: &[(&str, Value)]) {
        let stamp = now().format(DATETIME_FORMAT).to_string();
        let mut columns = vec!["name", "owner", "creation", "modified", "modified_by", "docstatus"];
        let mut params = vec![
            SqlValue::Text(name.to_string()),
            SqlValue::Text("Administrator".to_string()),
            SqlValue::Text(stamp.clone()),
            SqlValue::Text(stamp),
            SqlValue::Text("Administrator".to_string()),
            SqlValue::Integer(0),
        ];
        for (column, value) in values {
            columns.push(*column);
            params.push(to_sql(value).unwrap());
        }
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        let sql = format!(
            "INSERT INTO \"tab{entity}\" ({}) VALUES ({})",
            quoted.join(", "),
            placeholders.join(", ")
        );
        self.conn
            .lock()
            .unwrap()
            .execute(&sql, params_from_iter(params.iter()))
            .unwrap();
    }

    pub fn set_owner(&self, entity: &str, name: &str, owner: &str) {
        self.conn
            .lock()
            .unwrap()
            .execute(
                &format!("UPDATE \"tab{entity}\" SET \"owner\" = ?1 WHERE \"name\" = ?2"),
                [owner, name],
            )
            .unwrap();
    }

    /// Insert an event starting at `starts_on`.
    pub fn create_event(&self, name: &str, starts_on: NaiveDateTime) {
        self.insert(
            "Event",
            name,
            &[
                ("subject", Value::from("_Test Event")),
                ("event_type", Value::from("Public")),
                ("starts_on", Value::from(starts_on.format(DATETIME_FORMAT).to_string())),
            ],
        );
    }
}

impl RecordStore for SqliteStore {
    fn execute_parametrized(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::new("connection lock poisoned"))?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::from_source(format!("cannot prepare `{sql}`"), e))?;
        let columns = stmt.column_count();
        let bound = params.iter().map(to_sql).collect::<Result<Vec<_>, _>>()?;

        let mut rows = stmt
            .query(params_from_iter(bound.iter()))
            .map_err(|e| StoreError::from_source("query failed", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| StoreError::from_source("fetch failed", e))?
        {
            let mut values = Vec::with_capacity(columns);
            for i in 0..columns {
                let value: SqlValue = row
                    .get(i)
                    .map_err(|e| StoreError::from_source("column read failed", e))?;
                values.push(from_sql(value));
            }
            out.push(values);
        }
        Ok(out)
    }

    fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error> {
        self.schemas
            .get(entity)
            .cloned()
            .ok_or_else(|| doc_query::DataError::UnknownEntity(entity.to_string()).into())
    }
}

fn create_table(schema: &EntitySchema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .into_iter()
        .map(|column| {
            let sql_type = match schema.get(column).map(|f| f.field_type) {
                Some(FieldType::Int | FieldType::Check) => "INTEGER",
                Some(FieldType::Float | FieldType::Currency) => "REAL",
                _ => "TEXT",
            };
            if column == "name" {
                format!("\"name\" {sql_type} PRIMARY KEY")
            } else {
                format!("\"{column}\" {sql_type}")
            }
        })
        .collect();
    format!("CREATE TABLE \"tab{}\" ({});", schema.name, columns.join(", "))
}

fn to_sql(value: &Value) -> Result<SqlValue, StoreError> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => return Err(StoreError::new(format!("SQLite cannot bind {other:?}"))),
    })
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Int(i),
        SqlValue::Real(f) => Value::Float(f),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// The `name` of every row, in result order.
pub fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

/// Whether some row equals `expected` exactly.
pub fn contains(rows: &[Row], expected: &serde_json::Value) -> bool {
    rows.iter().any(|row| &row.to_json() == expected)
}
