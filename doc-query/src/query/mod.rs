//! Query entry points: [`DatabaseQuery`] and [`compile_filter_condition`].

mod assemble;

use std::fmt;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::config::QueryOptions;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::filter::{Binder, Compiler, FilterInput, normalize};
use crate::permission::{self, Actor, PermissionService};
use crate::scope::Scope;
use crate::store::{RecordStore, Row};
use crate::types::{FilterSet, Predicate, Statement};

/// Everything a call needs besides its own arguments.
///
/// Built by the caller per request; nothing in it is cached between calls.
pub struct ExecutionContext<'a> {
    /// Executes statements and supplies schemas.
    pub store: &'a dyn RecordStore,
    /// Consulted once per call unless permissions are ignored.
    pub permissions: &'a dyn PermissionService,
    /// Identity the query runs as.
    pub actor: Actor,
    /// Reference instant for date filters such as `between` without bounds.
    pub now: NaiveDateTime,
    /// Table prefix, page lengths and input limits.
    pub options: QueryOptions,
}

impl<'a> ExecutionContext<'a> {
    /// Context for `actor` at the current local time with default options.
    pub fn new(
        store: &'a dyn RecordStore,
        permissions: &'a dyn PermissionService,
        actor: Actor,
    ) -> Self {
        Self {
            store,
            permissions,
            actor,
            now: chrono::Local::now().naive_local(),
            options: QueryOptions::default(),
        }
    }

    /// Pin the reference instant.
    #[must_use]
    pub const fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Replace the options.
    #[must_use]
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("actor", &self.actor)
            .field("now", &self.now)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for a permission-checked read of one entity.
///
/// ```
/// use doc_query::{DatabaseQuery, Sqlite};
/// use serde_json::json;
///
/// let query = DatabaseQuery::new(Sqlite, "DocType")
///     .fields(["name", "issingle"])
///     .filters(json!({"name": ["like", "J%"]}))
///     .order_by("name asc")
///     .limit_page_length(None);
/// # let _ = query;
/// ```
#[derive(Debug, Clone)]
#[must_use = "DatabaseQuery does nothing until built or executed"]
pub struct DatabaseQuery<D: Dialect> {
    dialect: D,
    entity: String,
    fields: Vec<String>,
    filters: FilterInput,
    or_filters: FilterInput,
    order_by: Option<String>,
    group_by: Option<String>,
    limit_start: u64,
    /// `None` until set; then the explicit page length (`Some(None)` = unlimited).
    limit_page_length: Option<Option<u64>>,
    distinct: bool,
    ignore_permissions: bool,
}

impl<D: Dialect> DatabaseQuery<D> {
    /// Query on `entity`, returning `name` for the first page by default.
    pub fn new(dialect: D, entity: impl Into<String>) -> Self {
        Self {
            dialect,
            entity: entity.into(),
            fields: Vec::new(),
            filters: FilterInput::None,
            or_filters: FilterInput::None,
            order_by: None,
            group_by: None,
            limit_start: 0,
            limit_page_length: None,
            distinct: false,
            ignore_permissions: false,
        }
    }

    /// Output fields, each sanitized separately. Empty means `["name"]`.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// ANDed filters, in any accepted shape.
    pub fn filters(mut self, filters: impl Into<FilterInput>) -> Self {
        self.filters = filters.into();
        self
    }

    /// Filters ORed together as one group.
    pub fn or_filters(mut self, or_filters: impl Into<FilterInput>) -> Self {
        self.or_filters = or_filters.into();
        self
    }

    /// `column [asc|desc], ...`. Defaults to the entity's sort field.
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// `column, ...`.
    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    /// Rows to skip.
    pub const fn limit_start(mut self, start: u64) -> Self {
        self.limit_start = start;
        self
    }

    /// Page length; `None` returns every row, `Some(0)` none.
    pub const fn limit_page_length(mut self, length: Option<u64>) -> Self {
        self.limit_page_length = Some(length);
        self
    }

    /// `SELECT DISTINCT`.
    pub const fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Skip the permission service entirely.
    pub const fn ignore_permissions(mut self, ignore: bool) -> Self {
        self.ignore_permissions = ignore;
        self
    }

    /// Build the statement without executing it.
    ///
    /// # Errors
    ///
    /// [`DataError`](crate::DataError) for rejected fields, filters or clauses;
    /// [`PermissionError`](crate::PermissionError) when the actor may not read
    /// the entity or a requested field; [`StoreError`](crate::StoreError) when
    /// a schema cannot be loaded.
    pub fn build(&self, ctx: &ExecutionContext<'_>) -> Result<Statement> {
        assemble::prepare(self, ctx).map(|prepared| prepared.statement)
    }

    /// Build, execute and shape rows keyed by the requested field keys.
    ///
    /// # Errors
    ///
    /// As [`build`](Self::build), plus [`StoreError`](crate::StoreError) from
    /// execution.
    pub fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<Vec<Row>> {
        let prepared = assemble::prepare(self, ctx)?;
        let Statement { sql, params } = &prepared.statement;
        let rows = ctx.store.execute_parametrized(sql, params)?;
        debug!(entity = %self.entity, rows = rows.len(), "query executed");
        let rows = rows
            .into_iter()
            .map(|values| Row::from_tuple(&prepared.keys, values))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Permission-aware WHERE predicate for `entity`, without a full query.
///
/// `filters` and `extra_filters` are both ANDed; the actor's row restrictions
/// follow them.
///
/// ```
/// use doc_query::{Actor, AllowAll, ExecutionContext, Sqlite, compile_filter_condition};
/// # use doc_query::{EntitySchema, Error, RecordStore, StoreError, Value};
/// # struct Store;
/// # impl RecordStore for Store {
/// #     fn execute_parametrized(&self, _: &str, _: &[Value]) -> Result<Vec<Vec<Value>>, StoreError> { Ok(vec![]) }
/// #     fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error> { Ok(EntitySchema::new(entity)) }
/// # }
/// use serde_json::json;
///
/// let ctx = ExecutionContext::new(&Store, &AllowAll, Actor::new("Administrator"));
/// let predicate = compile_filter_condition(
///     Sqlite, &ctx, "DocType", json!({"owner": "Administrator"}), None::<serde_json::Value>, false,
/// ).unwrap();
/// assert_eq!(predicate.sql, "\"tabDocType\".\"owner\" = ?1");
/// ```
///
/// # Errors
///
/// As [`DatabaseQuery::build`].
pub fn compile_filter_condition<D: Dialect>(
    dialect: D,
    ctx: &ExecutionContext<'_>,
    entity: &str,
    filters: impl Into<FilterInput>,
    extra_filters: impl Into<FilterInput>,
    ignore_permissions: bool,
) -> Result<Predicate> {
    let options = &ctx.options;
    let mut scope = Scope::new(ctx.store, options, entity)?;

    let mut set = normalize(entity, &filters.into(), &FilterInput::None, options)?;
    set.extend(normalize(entity, &extra_filters.into(), &FilterInput::None, options)?);

    let conditions = permission::resolve(ctx, entity, ignore_permissions)?;
    let row_filter = conditions.as_ref().map(|c| &c.row_filter);
    options.check_filter_count(set.len() + row_filter.map_or(0, FilterSet::len))?;
    permission::check_readable(
        conditions.as_ref(),
        &ctx.actor,
        entity,
        set.iter().filter(|c| c.entity == entity).map(|c| c.field.as_str()),
    )?;

    let mut sets = vec![&set];
    sets.extend(row_filter);
    let mut binder = Binder::new(dialect);
    let cond = Compiler::new(&mut scope, &mut binder, ctx.now).compile_all(&sets)?;
    let predicate = cond.into_predicate(binder.into_params());

    debug!(
        entity,
        sql = %predicate.sql,
        params = predicate.params.len(),
        "compiled filter condition"
    );
    Ok(predicate)
}
