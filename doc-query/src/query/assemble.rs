//! Statement assembly for [`DatabaseQuery`].
//!
//! Parameters are bound strictly in the order their placeholders appear in
//! the text (SELECT, JOIN, WHERE, ORDER BY), so the output is valid for
//! positional `?` placeholders as well as numbered ones. Selected, grouped
//! and sorted columns are resolved once up front so child-table joins are
//! known before the FROM clause is rendered.

use tracing::debug;

use super::{DatabaseQuery, ExecutionContext};
use crate::dialect::Dialect;
use crate::error::{DataError, Result};
use crate::filter::{Binder, Compiler, normalize};
use crate::permission::{self, PermissionConditions};
use crate::sanitize::{Arg, Call, ColumnRef, Expr, OrderItem, parse_group_by, parse_order_by, sanitize};
use crate::scope::Scope;
use crate::types::{FilterSet, SortDir, Statement};

/// A statement and the row keys its SELECT list produces.
pub(super) struct Prepared {
    pub(super) statement: Statement,
    pub(super) keys: Vec<String>,
}

pub(super) fn prepare<D: Dialect>(q: &DatabaseQuery<D>, ctx: &ExecutionContext<'_>) -> Result<Prepared> {
    let options = &ctx.options;
    let dialect = q.dialect;
    let mut scope = Scope::new(ctx.store, options, &q.entity)?;
    let main = scope.main().name.clone();

    let fields = if q.fields.is_empty() {
        sanitize(&["name"])?
    } else {
        sanitize(&q.fields)?
    };
    let order = match non_blank(q.order_by.as_deref()) {
        Some(text) => Some(parse_order_by(text)?),
        None => None,
    };
    let group = match non_blank(q.group_by.as_deref()) {
        Some(text) => parse_group_by(text)?,
        None => Vec::new(),
    };
    let filters = normalize(&q.entity, &q.filters, &q.or_filters, options)?;

    let conditions = permission::resolve(ctx, &q.entity, q.ignore_permissions)?;
    let row_filter = conditions.as_ref().map(|c| &c.row_filter);
    options.check_filter_count(filters.len() + row_filter.map_or(0, FilterSet::len))?;

    let refs: Vec<&ColumnRef> = fields
        .iter()
        .flat_map(|f| f.expr.columns())
        .chain(order.iter().flatten().flat_map(|o| o.expr.columns()))
        .chain(group.iter())
        .collect();
    permission::check_readable(
        conditions.as_ref(),
        &ctx.actor,
        &main,
        refs.iter()
            .filter(|col| scope.entity_of(col) == main)
            .map(|col| col.field.as_str())
            .chain(filters.iter().filter(|c| c.entity == main).map(|c| c.field.as_str())),
    )?;

    // Only selected, grouped and sorted child columns are joined; filters on
    // other child tables compile to EXISTS subqueries.
    for col in &refs {
        scope.resolve_ref(col)?;
    }

    let mut binder = Binder::new(dialect);
    let mut keys = Vec::with_capacity(fields.len());
    let mut select = Vec::with_capacity(fields.len());
    for field in &fields {
        let sql = match &field.expr {
            Expr::Star => {
                let table = scope.main_table(&dialect);
                for column in readable_columns(&scope, conditions.as_ref()) {
                    select.push(format!("{table}.{}", dialect.quote_ident(&column)));
                    keys.push(column);
                }
                continue;
            },
            Expr::Column(col) => scope.resolve_ref(col)?.sql(&dialect),
            Expr::Call(call) => render_call(&mut scope, &mut binder, call)?,
        };
        select.push(match &field.alias {
            Some(alias) => format!("{sql} AS {}", dialect.quote_ident(alias)),
            None => sql,
        });
        keys.push(field.key().to_string());
    }

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        if q.distinct { "DISTINCT " } else { "" },
        select.join(", "),
        scope.main_table(&dialect)
    );
    let joins = scope.join_clauses(&dialect, |value| binder.bind(value));
    sql.push_str(&joins);

    let mut sets = vec![&filters];
    sets.extend(row_filter);
    let predicate = Compiler::new(&mut scope, &mut binder, ctx.now)
        .compile_all(&sets)?
        .into_sql();
    if !predicate.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }

    if !group.is_empty() {
        let columns = group
            .iter()
            .map(|col| scope.resolve_ref(col).map(|c| c.sql(&dialect)))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&columns.join(", "));
    }

    let aggregating = fields.iter().any(|f| f.expr.is_aggregate());
    match &order {
        Some(items) => {
            let items = render_order(&mut scope, &mut binder, items, q.order_by.as_deref())?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        },
        // A default sort would break aggregates without GROUP BY and
        // SELECT DISTINCT on Postgres.
        None if !q.distinct && !(aggregating && group.is_empty()) => {
            let (sort_field, dir) = (scope.main().sort_field.clone(), SortDir::from(scope.main().sort_order));
            let sort = scope.resolve(&main, &sort_field)?;
            sql.push_str(&format!(" ORDER BY {} {}", sort.sql(&dialect), dir.as_sql()));
        },
        None => {},
    }

    let page_length = options.effective_page_length(
        q.limit_page_length.unwrap_or(options.default_page_length),
    );
    sql.push_str(&dialect.limit_clause(page_length, q.limit_start));

    let params = binder.into_params();
    debug!(entity = %main, sql = %sql, params = params.len(), "assembled query");
    Ok(Prepared {
        statement: Statement { sql, params },
        keys,
    })
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Columns `*` expands to: every main-entity column the actor may read.
fn readable_columns(scope: &Scope<'_>, conditions: Option<&PermissionConditions>) -> Vec<String> {
    scope
        .main()
        .columns()
        .into_iter()
        .filter(|column| conditions.is_none_or(|c| c.can_read(column)))
        .map(str::to_string)
        .collect()
}

fn render_call<D: Dialect>(scope: &mut Scope<'_>, binder: &mut Binder<D>, call: &Call) -> Result<String> {
    let dialect = binder.dialect();
    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(match arg {
            Arg::Star => "*".to_string(),
            Arg::Column(col) => scope.resolve_ref(col)?.sql(&dialect),
            Arg::Literal(literal) => binder.bind(literal.to_value()),
        });
    }
    Ok(dialect.render_call(call.func, call.distinct, &args))
}

fn render_order<D: Dialect>(
    scope: &mut Scope<'_>,
    binder: &mut Binder<D>,
    items: &[OrderItem],
    text: Option<&str>,
) -> Result<Vec<String>> {
    let dialect = binder.dialect();
    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        let expr = match &item.expr {
            Expr::Column(col) => scope.resolve_ref(col)?.sql(&dialect),
            Expr::Call(call) => render_call(scope, binder, call)?,
            Expr::Star => {
                return Err(DataError::InvalidClause {
                    clause: "order_by",
                    expr: text.unwrap_or_default().to_string(),
                    reason: "cannot sort by `*`".to_string(),
                }
                .into());
            },
        };
        rendered.push(format!("{expr} {}", item.dir.as_sql()));
    }
    Ok(rendered)
}
