//! Row- and column-level access control.
//!
//! A [`PermissionService`] answers, for one actor and one entity, which rows
//! the actor may read (a [`FilterSet`] ANDed into every query) and which
//! columns (an allow-list, `None` meaning all). Denial is an error, never an
//! empty result.
//!
//! | Conditions | Effect |
//! |------------|--------|
//! | `Err(NoAccess)` | query fails with [`PermissionError`] |
//! | empty `row_filter` | no extra WHERE terms |
//! | `readable_fields: Some(set)` | any other column of the entity is rejected |

mod roles;

pub use roles::{RolePermissions, RoleRule, UserRestriction};

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::{PermissionError, Result};
use crate::filter::{Binder, Compiler, Cond};
use crate::scope::Scope;
use crate::types::{FilterSet, Predicate};
use crate::ExecutionContext;

/// The identity a query runs as, passed explicitly with every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// User identifier, compared against the `owner` column.
    pub id: String,
    /// Roles held by the user.
    pub roles: BTreeSet<String>,
}

impl Actor {
    /// Actor without roles.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Add roles.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Whether the actor holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// What the actor is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Action {
    /// SELECT
    Read,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
        }
    }
}

/// Question put to the [`PermissionService`], built fresh for each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionContext<'a> {
    /// Who is asking.
    pub actor: &'a Actor,
    /// Entity being queried.
    pub entity: &'a str,
    /// What they want to do with it.
    pub action: Action,
}

impl<'a> PermissionContext<'a> {
    /// Read access to `entity`.
    pub const fn read(actor: &'a Actor, entity: &'a str) -> Self {
        Self {
            actor,
            entity,
            action: Action::Read,
        }
    }
}

/// Restrictions granted for one actor and entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionConditions {
    /// ANDed into every query on the entity.
    pub row_filter: FilterSet,
    /// Readable columns; `None` allows every column.
    pub readable_fields: Option<BTreeSet<String>>,
}

impl PermissionConditions {
    /// Every row and every column.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Whether `field` may be read. `name` always may.
    pub fn can_read(&self, field: &str) -> bool {
        field == "name"
            || self
                .readable_fields
                .as_ref()
                .is_none_or(|fields| fields.contains(field))
    }
}

/// Role-based access control, consulted once per query.
pub trait PermissionService: Send + Sync {
    /// Conditions under which `ctx.actor` may perform `ctx.action` on
    /// `ctx.entity`, or why it may not.
    fn get_permission_conditions(
        &self,
        ctx: &PermissionContext<'_>,
    ) -> Result<PermissionConditions, PermissionError>;
}

impl<T: PermissionService + ?Sized> PermissionService for &T {
    fn get_permission_conditions(
        &self,
        ctx: &PermissionContext<'_>,
    ) -> Result<PermissionConditions, PermissionError> {
        (**self).get_permission_conditions(ctx)
    }
}

/// Grants everything to everyone. For trusted callers and tests.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct AllowAll;

impl PermissionService for AllowAll {
    fn get_permission_conditions(
        &self,
        _ctx: &PermissionContext<'_>,
    ) -> Result<PermissionConditions, PermissionError> {
        Ok(PermissionConditions::unrestricted())
    }
}

/// Resolve conditions for a read of `entity`, or `None` when bypassed.
pub(crate) fn resolve(
    ctx: &ExecutionContext<'_>,
    entity: &str,
    ignore_permissions: bool,
) -> Result<Option<PermissionConditions>, PermissionError> {
    if ignore_permissions {
        debug!(actor = %ctx.actor.id, entity, "permission check bypassed");
        return Ok(None);
    }

    let request = PermissionContext::read(&ctx.actor, entity);
    match ctx.permissions.get_permission_conditions(&request) {
        Ok(conditions) => Ok(Some(conditions)),
        Err(err) => {
            warn!(actor = %ctx.actor.id, entity, error = %err, "permission denied");
            Err(err)
        },
    }
}

/// Reject any main-entity field outside the allow-list.
pub(crate) fn check_readable<'f>(
    conditions: Option<&PermissionConditions>,
    actor: &Actor,
    entity: &str,
    fields: impl IntoIterator<Item = &'f str>,
) -> Result<(), PermissionError> {
    let Some(conditions) = conditions else {
        return Ok(());
    };
    for field in fields {
        if !conditions.can_read(field) {
            warn!(actor = %actor.id, entity, field, "field not readable");
            return Err(PermissionError::FieldNotReadable {
                actor: actor.id.clone(),
                entity: entity.to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// AND the actor's row restrictions on `entity` into `predicate`.
///
/// The restrictions are bound after the predicate's own parameters, so the
/// result is valid for positional placeholders too. Restrictions on child
/// tables become `EXISTS` subqueries; the result only refers to the main
/// table of `entity`.
///
/// # Errors
///
/// [`PermissionError`] when the actor may not read `entity`;
/// [`DataError`](crate::DataError) when the service returns a row filter that
/// does not compile against the schema.
pub fn inject<D: Dialect>(
    dialect: D,
    ctx: &ExecutionContext<'_>,
    entity: &str,
    predicate: Predicate,
    ignore_permissions: bool,
) -> Result<Predicate> {
    let Some(conditions) = resolve(ctx, entity, ignore_permissions)? else {
        return Ok(predicate);
    };
    if conditions.row_filter.is_empty() {
        return Ok(predicate);
    }

    let mut scope = Scope::new(ctx.store, &ctx.options, entity)?;
    let Predicate { sql, params } = predicate;
    let mut binder = Binder::with_params(dialect, params);
    let row = Compiler::new(&mut scope, &mut binder, ctx.now).compile_set(&conditions.row_filter)?;

    Ok(match (sql.is_empty(), row) {
        (_, Cond::True) => Predicate {
            sql,
            params: binder.into_params(),
        },
        (true, row) => row.into_predicate(binder.into_params()),
        (false, row) => Predicate {
            sql: format!("({sql}) AND ({})", row.into_sql()),
            params: binder.into_params(),
        },
    })
}
