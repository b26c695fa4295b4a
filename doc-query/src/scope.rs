//! Per-call name resolution: schemas, columns and child-table joins.
//!
//! A [`Scope`] is built fresh for every query and dropped with it. Schemas are
//! fetched from the record store at most once per scope.

use std::collections::HashMap;
use std::rc::Rc;

use crate::config::QueryOptions;
use crate::dialect::Dialect;
use crate::error::{DataError, Result};
use crate::sanitize::{ColumnRef, check_entity_name};
use crate::schema::{EntitySchema, FieldType};
use crate::store::RecordStore;
use crate::types::Value;

/// A validated column of the main entity or of a joined child table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Column {
    pub(crate) entity: String,
    pub(crate) table: String,
    pub(crate) field: String,
    pub(crate) field_type: FieldType,
    /// Link target for `Link` fields.
    pub(crate) options: Option<String>,
}

impl Column {
    /// Fully qualified, quoted column.
    pub(crate) fn sql<D: Dialect>(&self, dialect: &D) -> String {
        format!(
            "{}.{}",
            dialect.quote_ident(&self.table),
            dialect.quote_ident(&self.field)
        )
    }
}

pub(crate) struct Scope<'s> {
    store: &'s dyn RecordStore,
    options: &'s QueryOptions,
    main: Rc<EntitySchema>,
    cache: HashMap<String, Rc<EntitySchema>>,
    joins: Vec<Rc<EntitySchema>>,
}

impl<'s> Scope<'s> {
    /// Load the main entity's schema.
    pub(crate) fn new(store: &'s dyn RecordStore, options: &'s QueryOptions, entity: &str) -> Result<Self> {
        check_entity_name(entity)?;
        let main = Rc::new(store.get_schema(entity)?);
        Ok(Self {
            store,
            options,
            main,
            cache: HashMap::new(),
            joins: Vec::new(),
        })
    }

    pub(crate) fn main(&self) -> &EntitySchema {
        &self.main
    }

    pub(crate) const fn options(&self) -> &QueryOptions {
        self.options
    }

    /// Whether `entity` is a child table joined into the FROM clause.
    pub(crate) fn is_joined(&self, entity: &str) -> bool {
        self.joins.iter().any(|j| j.name == entity)
    }

    /// Schema of any entity, main or not. Does not register a join.
    pub(crate) fn schema(&mut self, entity: &str) -> Result<Rc<EntitySchema>> {
        if entity == self.main.name {
            return Ok(Rc::clone(&self.main));
        }
        if let Some(schema) = self.cache.get(entity) {
            return Ok(Rc::clone(schema));
        }
        check_entity_name(entity)?;
        let schema = Rc::new(self.store.get_schema(entity)?);
        self.cache.insert(entity.to_string(), Rc::clone(&schema));
        Ok(schema)
    }

    /// Resolve `entity.field`, registering a join for child tables.
    pub(crate) fn resolve(&mut self, entity: &str, field: &str) -> Result<Column> {
        let col = self.column(entity, field)?;
        if col.entity != self.main.name && !self.is_joined(&col.entity) {
            let schema = self.schema(&col.entity)?;
            self.joins.push(schema);
        }
        Ok(col)
    }

    /// Resolve `entity.field` without joining anything. Columns of child
    /// tables that are not joined must be reached through a subquery.
    pub(crate) fn column(&mut self, entity: &str, field: &str) -> Result<Column> {
        let schema = self.schema(entity)?;
        if schema.name != self.main.name && !schema.is_child {
            return Err(DataError::UnsupportedJoin {
                entity: self.main.name.clone(),
                joined: schema.name.clone(),
                reason: "only child tables can be joined",
            }
            .into());
        }

        let lookup = schema.get(field).ok_or_else(|| DataError::UnknownField {
            entity: schema.name.clone(),
            field: field.to_string(),
        })?;
        Ok(Column {
            entity: schema.name.clone(),
            table: self.options.table_name(&schema.name),
            field: lookup.name.to_string(),
            field_type: lookup.field_type,
            options: lookup.options.map(str::to_string),
        })
    }

    /// Resolve a parsed column reference; unqualified columns belong to the
    /// main entity.
    pub(crate) fn resolve_ref(&mut self, col: &ColumnRef) -> Result<Column> {
        let entity = self.entity_of(col).to_string();
        self.resolve(&entity, &col.field)
    }

    /// Entity a column reference points at.
    pub(crate) fn entity_of<'c>(&'c self, col: &'c ColumnRef) -> &'c str {
        col.qualifier.as_deref().map_or(self.main.name.as_str(), |q| {
            self.options.resolve_qualifier(q, &self.main.name)
        })
    }

    /// Quoted table name of the main entity.
    pub(crate) fn main_table<D: Dialect>(&self, dialect: &D) -> String {
        dialect.quote_ident(&self.options.table_name(&self.main.name))
    }

    /// Condition tying rows of `child` to the main row they belong to,
    /// binding the parent entity name through `bind`.
    pub(crate) fn parent_link<D: Dialect>(
        &self,
        dialect: &D,
        child: &str,
        bind: impl FnOnce(Value) -> String,
    ) -> String {
        let main = self.main_table(dialect);
        let table = dialect.quote_ident(&self.options.table_name(child));
        let parenttype = bind(Value::from(self.main.name.as_str()));
        format!(
            "{table}.{parent} = {main}.{name} AND {table}.{ptype} = {parenttype}",
            parent = dialect.quote_ident("parent"),
            name = dialect.quote_ident("name"),
            ptype = dialect.quote_ident("parenttype"),
        )
    }

    /// `LEFT JOIN` clauses for every registered child table, binding the
    /// parent entity name through `bind`.
    pub(crate) fn join_clauses<D: Dialect>(
        &self,
        dialect: &D,
        mut bind: impl FnMut(Value) -> String,
    ) -> String {
        let mut sql = String::new();
        for child in &self.joins {
            let table = dialect.quote_ident(&self.options.table_name(&child.name));
            let on = self.parent_link(dialect, &child.name, &mut bind);
            sql.push_str(&format!(" LEFT JOIN {table} ON {on}"));
        }
        sql
    }
}
