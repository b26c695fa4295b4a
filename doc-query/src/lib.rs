// =============================================================================
// CRATE-LEVEL QUALITY LINTS (following Tokio/Serde standards)
// =============================================================================
#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
// =============================================================================
// CLIPPY CONFIGURATION
// =============================================================================
#![allow(clippy::doc_markdown)] // Entity names such as DocType read as code in docs
#![allow(clippy::missing_errors_doc)] // # Errors sections only on entry points
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)] // Builder methods
#![allow(clippy::must_use_candidate)]
#![allow(clippy::format_push_string)] // SQL is assembled with push_str(&format!(..))

//! # doc-query - permission-aware queries over document record stores
//!
//! Builds one parametrized SELECT per call from caller-supplied filters in
//! several surface shapes, a sanitized field list and the actor's permission
//! conditions, then runs it through a [`RecordStore`].
//!
//! ## Quick Start
//!
//! ```
//! use doc_query::prelude::*;
//! # struct Store;
//! # impl RecordStore for Store {
//! #     fn execute_parametrized(&self, _: &str, _: &[Value]) -> Result<Vec<Vec<Value>>, StoreError> { Ok(vec![]) }
//! #     fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error> {
//! #         Ok(EntitySchema::new(entity).field(FieldDef::new("istable", FieldType::Check)))
//! #     }
//! # }
//! use serde_json::json;
//!
//! let ctx = ExecutionContext::new(&Store, &AllowAll, Actor::new("Administrator"));
//! let stmt = DatabaseQuery::new(Sqlite, "DocType")
//!     .fields(["name", "istable"])
//!     .filters(json!({"name": ["like", "J%"]}))
//!     .or_filters(json!([["istable", "=", 1], ["istable", "is", "not set"]]))
//!     .build(&ctx)
//!     .unwrap();
//!
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT \"tabDocType\".\"name\", \"tabDocType\".\"istable\" FROM \"tabDocType\" \
//!      WHERE \"tabDocType\".\"name\" LIKE ?1 AND \
//!      (\"tabDocType\".\"istable\" = ?2 OR \"tabDocType\".\"istable\" IS NULL) \
//!      ORDER BY \"tabDocType\".\"modified\" DESC LIMIT 20"
//! );
//! ```
//!
//! ## Filter shapes
//!
//! | Shape | Example |
//! |-------|---------|
//! | mapping | `{"name": "DocField"}` |
//! | mapping with operator | `{"name": ["like", "J%"]}` |
//! | 3-tuple | `["name", "in", "DocType,DocField"]` |
//! | 4-tuple | `["DocField", "fieldtype", "=", "Table"]` |
//! | list of the above | `[["name", "=", "x"], {"istable": 1}]` |
//! | JSON text of the above | `"{\"name\": \"DocField\"}"` |
//!
//! Every literal is bound as a parameter. Field and entity names are checked
//! against the schema; requested output fields must pass the [`sanitize`]
//! grammar.

mod config;
mod dialect;
mod error;
mod filter;
mod permission;
mod query;
mod sanitize;
mod schema;
mod scope;
mod store;
mod types;

#[cfg(test)]
mod testing;

pub use config::QueryOptions;
pub use dialect::{Dialect, MariaDb, Postgres, Sqlite};
pub use error::{ConfigError, DataError, Error, PermissionError, Result, StoreError};
pub use filter::{FilterInput, normalize, normalize_clauses};
pub use permission::{
    Action, Actor, AllowAll, PermissionConditions, PermissionContext, PermissionService,
    RolePermissions, RoleRule, UserRestriction, inject,
};
pub use query::{DatabaseQuery, ExecutionContext, compile_filter_condition};
pub use sanitize::{
    Arg, Call, ColumnRef, Expr, FieldExpr, Function, Literal, OrderItem, is_valid_entity_name,
    parse_column, parse_group_by, parse_order_by, sanitize,
};
pub use schema::{EntitySchema, FieldDef, FieldLookup, FieldType, STANDARD_FIELDS, SortOrder};
pub use store::{RecordStore, Row};
pub use types::{
    FilterClause, FilterSet, Operator, OrGroup, Predicate, SortDir, Statement, Value,
};

/// Prelude module for convenient imports.
///
/// ```
/// use doc_query::prelude::*;
/// let query = DatabaseQuery::new(Postgres, "DocType").fields(["name"]);
/// # let _ = query;
/// ```
pub mod prelude {
    pub use crate::{
        Actor, AllowAll, DatabaseQuery, Dialect, EntitySchema, Error, ExecutionContext, FieldDef,
        FieldType, FilterClause, FilterInput, FilterSet, MariaDb, Operator, OrGroup,
        PermissionConditions, PermissionContext, PermissionService, Postgres, QueryOptions,
        RecordStore, RolePermissions, Row, Sqlite, Statement, StoreError, Value,
        compile_filter_condition,
    };
}

// ============================================================================
// API Contract Tests (compile-time assertions)
// ============================================================================
