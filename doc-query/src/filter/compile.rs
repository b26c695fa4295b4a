//! Condition compiler: normalized clauses to parametrized SQL.

use chrono::NaiveDateTime;
use tracing::trace;

use super::between::{self, Bounds};
use super::normalize::canonical_value;
use super::{Binder, Cond};
use crate::dialect::Dialect;
use crate::error::{DataError, Result};
use crate::scope::{Column, Scope};
use crate::types::{FilterClause, FilterSet, Operator, OrGroup, Value};

/// Compiles filter sets against a [`Scope`], binding every literal.
pub(crate) struct Compiler<'c, 's, D: Dialect> {
    scope: &'c mut Scope<'s>,
    binder: &'c mut Binder<D>,
    now: NaiveDateTime,
}

impl<'c, 's, D: Dialect> Compiler<'c, 's, D> {
    pub(crate) fn new(scope: &'c mut Scope<'s>, binder: &'c mut Binder<D>, now: NaiveDateTime) -> Self {
        Self { scope, binder, now }
    }

    /// Compile one filter set.
    pub(crate) fn compile_set(&mut self, set: &FilterSet) -> Result<Cond> {
        self.compile_all(&[set])
    }

    /// AND together every clause and OR group of `sets`.
    ///
    /// When any member can never match, everything bound here is dropped and
    /// the result is [`Cond::False`].
    pub(crate) fn compile_all(&mut self, sets: &[&FilterSet]) -> Result<Cond> {
        let mark = self.binder.mark();
        let mut parts = Vec::new();
        let mut never = false;

        for set in sets {
            for clause in &set.clauses {
                match self.compile_clause(clause)? {
                    Cond::True => {},
                    Cond::False => never = true,
                    Cond::Sql(sql) => parts.push(sql),
                }
            }
            for group in &set.or_groups {
                match self.compile_group(group)? {
                    Cond::True => {},
                    Cond::False => never = true,
                    Cond::Sql(sql) => parts.push(sql),
                }
            }
        }

        if never {
            self.binder.rewind(mark);
            return Ok(Cond::False);
        }
        Ok(match parts.len() {
            0 => Cond::True,
            _ => Cond::Sql(parts.join(" AND ")),
        })
    }

    fn compile_group(&mut self, group: &OrGroup) -> Result<Cond> {
        let mark = self.binder.mark();
        let mut parts = Vec::new();
        let mut always = false;

        for clause in &group.clauses {
            match self.compile_clause(clause)? {
                Cond::True => always = true,
                Cond::False => {},
                Cond::Sql(sql) => parts.push(sql),
            }
        }

        if always {
            self.binder.rewind(mark);
            return Ok(Cond::True);
        }
        Ok(match parts.len() {
            0 => Cond::False,
            1 => Cond::Sql(parts.remove(0)),
            _ => Cond::Sql(format!("({})", parts.join(" OR "))),
        })
    }

    fn compile_clause(&mut self, clause: &FilterClause) -> Result<Cond> {
        let col = self.scope.column(&clause.entity, &clause.field)?;
        if col.entity != self.scope.main().name && !self.scope.is_joined(&col.entity) {
            return self.exists(&col, clause);
        }
        self.compile_on(&col, clause)
    }

    /// Match main rows having at least one child row that satisfies `clause`.
    fn exists(&mut self, col: &Column, clause: &FilterClause) -> Result<Cond> {
        let mark = self.binder.mark();
        let dialect = self.binder.dialect();
        let table = dialect.quote_ident(&col.table);
        let binder = &mut *self.binder;
        let link = self.scope.parent_link(&dialect, &col.entity, |value| binder.bind(value));
        match self.compile_on(col, clause)? {
            Cond::Sql(sql) => Ok(Cond::Sql(format!(
                "EXISTS (SELECT 1 FROM {table} WHERE {link} AND {sql})"
            ))),
            cond => {
                self.binder.rewind(mark);
                Ok(cond)
            },
        }
    }

    fn compile_on(&mut self, col: &Column, clause: &FilterClause) -> Result<Cond> {
        let dialect = self.binder.dialect();
        let column = col.sql(&dialect);
        let op = clause.operator;

        // Negative matches must also catch rows where the column is NULL.
        let target = if op.is_negative() {
            format!("COALESCE({column}, {})", col.field_type.null_fallback())
        } else {
            column.clone()
        };

        trace!(entity = %col.entity, field = %col.field, op = %op, "compiling clause");

        let cond = match op {
            Operator::Eq if clause.value.is_null() => Cond::Sql(format!("{column} IS NULL")),
            Operator::Ne if clause.value.is_null() => Cond::Sql(format!("{column} IS NOT NULL")),
            Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Lt
            | Operator::Gte
            | Operator::Lte => {
                let value = coerce(col, clause.value.clone())?;
                let placeholder = self.binder.bind(value);
                Cond::Sql(format!("{target} {} {placeholder}", comparison_sql(op)))
            },
            Operator::Like | Operator::NotLike => {
                let placeholder = self.binder.bind(clause.value.clone());
                let like = dialect.like_op(op == Operator::NotLike);
                Cond::Sql(format!("{target} {like} {placeholder}"))
            },
            Operator::In | Operator::NotIn => {
                let value = canonical_value(&col.field, op, clause.value.clone())?;
                self.membership(col, &target, op, value)?
            },
            Operator::Between => self.between(col, &column, &clause.value)?,
            Operator::Is | Operator::IsNot => {
                let value = canonical_value(&col.field, op, clause.value.clone())?;
                presence(col, &column, op, &value)
            },
            Operator::DescendantOf | Operator::AncestorOf => {
                self.tree(col, &column, op, &clause.value)?
            },
        };
        Ok(cond)
    }

    fn membership(&mut self, col: &Column, target: &str, op: Operator, value: Value) -> Result<Cond> {
        let values = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            scalar => vec![scalar],
        };
        let negated = op == Operator::NotIn;
        if values.is_empty() {
            // `in` over nothing matches nothing; `not in` over nothing matches everything
            return Ok(if negated { Cond::True } else { Cond::False });
        }

        let max = self.scope.options().max_in_values;
        if values.len() > max {
            return Err(DataError::LimitExceeded {
                what: "number of `in` values",
                max,
            }
            .into());
        }

        let values = values
            .into_iter()
            .map(|v| coerce(col, v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Cond::Sql(self.binder.in_list(target, &values, negated)))
    }

    fn between(&mut self, col: &Column, column: &str, value: &Value) -> Result<Cond> {
        Ok(match between::resolve(&col.field, col.field_type, value, self.now)? {
            Bounds::Range(from, to) => {
                let from = self.binder.bind(coerce(col, from)?);
                let to = self.binder.bind(coerce(col, to)?);
                Cond::Sql(format!("{column} BETWEEN {from} AND {to}"))
            },
            Bounds::From(from) => {
                let from = self.binder.bind(coerce(col, from)?);
                Cond::Sql(format!("{column} >= {from}"))
            },
            Bounds::Never => Cond::False,
        })
    }

    /// Nested-set lookup over the `lft`/`rgt` columns of the tree entity.
    fn tree(&mut self, col: &Column, column: &str, op: Operator, value: &Value) -> Result<Cond> {
        let tree_entity = if col.field == "name" {
            col.entity.clone()
        } else {
            col.options.clone().ok_or_else(|| DataError::InvalidValue {
                field: col.field.clone(),
                reason: format!("`{op}` needs `name` or a Link field"),
            })?
        };

        let tree = self.scope.schema(&tree_entity)?;
        if !(tree.has_field("lft") && tree.has_field("rgt")) {
            return Err(DataError::InvalidValue {
                field: col.field.clone(),
                reason: format!("`{tree_entity}` is not a tree: it has no `lft`/`rgt` columns"),
            }
            .into());
        }

        let dialect = self.binder.dialect();
        let table = dialect.quote_ident(&self.scope.options().table_name(&tree.name));
        let name = dialect.quote_ident("name");
        let lft = dialect.quote_ident("lft");
        let rgt = dialect.quote_ident("rgt");

        let node_lft = format!(
            "(SELECT {lft} FROM {table} WHERE {name} = {})",
            self.binder.bind(value.clone())
        );
        let node_rgt = format!(
            "(SELECT {rgt} FROM {table} WHERE {name} = {})",
            self.binder.bind(value.clone())
        );
        let (lft_cmp, rgt_cmp) = if op == Operator::DescendantOf {
            (">", "<")
        } else {
            ("<", ">")
        };

        Ok(Cond::Sql(format!(
            "{column} IN (SELECT {name} FROM {table} WHERE {lft} {lft_cmp} {node_lft} AND {rgt} {rgt_cmp} {node_rgt})"
        )))
    }
}

const fn comparison_sql(op: Operator) -> &'static str {
    match op {
        Operator::Ne => "!=",
        Operator::Gt => ">",
        Operator::Lt => "<",
        Operator::Gte => ">=",
        Operator::Lte => "<=",
        _ => "=",
    }
}

/// `is set` / `is not set`. Empty strings count as unset on text fields.
fn presence(col: &Column, column: &str, op: Operator, value: &Value) -> Cond {
    let wants_set = (value.as_str() == Some("set")) == (op == Operator::Is);
    let sql = match (wants_set, col.field_type.is_text()) {
        (true, true) => format!("({column} IS NOT NULL AND {column} != '')"),
        (true, false) => format!("{column} IS NOT NULL"),
        (false, true) => format!("({column} IS NULL OR {column} = '')"),
        (false, false) => format!("{column} IS NULL"),
    };
    Cond::Sql(sql)
}

/// Numeric strings become numbers on numeric fields.
fn coerce(col: &Column, value: Value) -> Result<Value, DataError> {
    if !col.field_type.is_numeric() {
        return Ok(value);
    }
    match value {
        Value::String(s) => {
            let text = s.trim();
            let parsed = if col.field_type.is_integer() {
                text.parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| text.parse::<f64>().map(Value::Float))
            } else {
                text.parse::<f64>().map(Value::Float)
            };
            parsed.map_err(|_| DataError::InvalidValue {
                field: col.field.clone(),
                reason: format!("expected a number, got `{s}`"),
            })
        },
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        other => Ok(other),
    }
}
