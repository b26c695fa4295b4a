//! Role rules loaded from TOML.
//!
//! ```toml
//! [[rule]]
//! role = "System Manager"
//! entity = "*"
//! read = true
//!
//! [[rule]]
//! role = "Blogger"
//! entity = "Blog Post"
//! read = true
//! if_owner = true
//! fields = ["title", "published"]
//!
//! [[restriction]]
//! user = "test1@example.com"
//! entity = "ToDo"
//! field = "status"
//! values = ["Open"]
//! ```

use std::collections::BTreeSet;

use serde::Deserialize;

use super::{PermissionConditions, PermissionContext, PermissionService};
use crate::error::{ConfigError, PermissionError};
use crate::sanitize::is_valid_entity_name;
use crate::types::{FilterClause, FilterSet, Operator, Value};

/// Entity wildcard in a rule.
const ANY_ENTITY: &str = "*";

/// What one role may do on one entity (or on `*`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleRule {
    /// Role the rule grants to.
    pub role: String,
    /// Entity name, or `*` for every entity.
    pub entity: String,
    /// Grants read access.
    #[serde(default)]
    pub read: bool,
    /// Only rows the actor owns.
    #[serde(default)]
    pub if_owner: bool,
    /// Readable columns; absent means all.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl RoleRule {
    fn applies_to(&self, entity: &str) -> bool {
        self.entity == ANY_ENTITY || self.entity == entity
    }
}

/// Limits one user to rows whose `field` is one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRestriction {
    /// Actor id the restriction applies to.
    pub user: String,
    /// Restricted entity.
    pub entity: String,
    /// Column checked against `values`.
    pub field: String,
    /// Allowed values; never empty.
    pub values: Vec<String>,
}

/// [`PermissionService`] backed by static role rules and per-user
/// restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolePermissions {
    /// `[[rule]]` tables.
    #[serde(default, rename = "rule")]
    pub rules: Vec<RoleRule>,
    /// `[[restriction]]` tables.
    #[serde(default, rename = "restriction")]
    pub restrictions: Vec<UserRestriction>,
}

impl RolePermissions {
    /// Parse rules from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let permissions: Self = toml::from_str(s).map_err(|source| ConfigError::Toml {
            what: "permissions",
            source,
        })?;
        permissions.validate()?;
        Ok(permissions)
    }

    /// Add a rule.
    #[must_use]
    pub fn rule(mut self, rule: RoleRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a user restriction.
    #[must_use]
    pub fn restriction(mut self, restriction: UserRestriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            what: "permissions",
            reason,
        };
        for rule in &self.rules {
            if rule.entity != ANY_ENTITY && !is_valid_entity_name(&rule.entity) {
                return Err(invalid(format!("rule for `{}` names an invalid entity", rule.role)));
            }
        }
        for restriction in &self.restrictions {
            if !is_valid_entity_name(&restriction.entity) {
                return Err(invalid(format!(
                    "restriction for `{}` names an invalid entity",
                    restriction.user
                )));
            }
            if restriction.values.is_empty() {
                return Err(invalid(format!(
                    "restriction for `{}` on `{}` has no values",
                    restriction.user, restriction.entity
                )));
            }
        }
        Ok(())
    }
}

impl PermissionService for RolePermissions {
    fn get_permission_conditions(
        &self,
        ctx: &PermissionContext<'_>,
    ) -> Result<PermissionConditions, PermissionError> {
        let matching: Vec<&RoleRule> = self
            .rules
            .iter()
            .filter(|rule| rule.read && rule.applies_to(ctx.entity) && ctx.actor.has_role(&rule.role))
            .collect();

        if matching.is_empty() {
            return Err(PermissionError::NoAccess {
                actor: ctx.actor.id.clone(),
                entity: ctx.entity.to_string(),
                action: ctx.action,
            });
        }

        let mut row_filter = FilterSet::new();
        if matching.iter().all(|rule| rule.if_owner) {
            row_filter = row_filter.and(FilterClause::new(
                ctx.entity,
                "owner",
                Operator::Eq,
                ctx.actor.id.as_str(),
            ));
        }
        for restriction in self
            .restrictions
            .iter()
            .filter(|r| r.user == ctx.actor.id && r.entity == ctx.entity)
        {
            let values: Vec<Value> = restriction.values.iter().map(|v| Value::from(v.as_str())).collect();
            row_filter = row_filter.and(FilterClause::new(
                ctx.entity,
                restriction.field.as_str(),
                Operator::In,
                Value::Array(values),
            ));
        }

        let readable_fields = if matching.iter().any(|rule| rule.fields.is_none()) {
            None
        } else {
            Some(
                matching
                    .iter()
                    .filter_map(|rule| rule.fields.as_ref())
                    .flatten()
                    .cloned()
                    .collect::<BTreeSet<_>>(),
            )
        };

        Ok(PermissionConditions {
            row_filter,
            readable_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{Action, Actor};

    const RULES: &str = r#"
        [[rule]]
        role = "System Manager"
        entity = "*"
        read = true

        [[rule]]
        role = "Blogger"
        entity = "Blog Post"
        read = true
        if_owner = true
        fields = ["title", "published"]

        [[rule]]
        role = "Editor"
        entity = "Blog Post"
        read = true
        fields = ["title", "content"]

        [[rule]]
        role = "Guest"
        entity = "Blog Post"
        read = false

        [[restriction]]
        user = "writer@example.com"
        entity = "Blog Post"
        field = "category"
        values = ["News", "Sports"]
    "#;

    fn conditions(actor: &Actor, entity: &str) -> Result<PermissionConditions, PermissionError> {
        let permissions = RolePermissions::from_toml_str(RULES).unwrap();
        permissions.get_permission_conditions(&PermissionContext::read(actor, entity))
    }

    #[test]
    fn test_wildcard_rule_grants_everything() {
        let admin = Actor::new("admin@example.com").with_roles(["System Manager"]);
        let c = conditions(&admin, "DocType").unwrap();
        assert!(c.row_filter.is_empty());
        assert_eq!(c.readable_fields, None);
    }

    #[test]
    fn test_no_rule_is_denied() {
        let guest = Actor::new("test1@example.com").with_roles(["Guest"]);
        let err = conditions(&guest, "Blog Post").unwrap_err();
        assert_eq!(
            err,
            PermissionError::NoAccess {
                actor: "test1@example.com".into(),
                entity: "Blog Post".into(),
                action: Action::Read,
            }
        );
        assert!(conditions(&Actor::new("nobody"), "DocType").is_err());
    }

    #[test]
    fn test_owner_only_rule_filters_rows() {
        let blogger = Actor::new("writer@example.com").with_roles(["Blogger"]);
        let c = conditions(&blogger, "Blog Post").unwrap();
        assert_eq!(
            c.row_filter.clauses[0],
            FilterClause::new("Blog Post", "owner", Operator::Eq, "writer@example.com")
        );
        assert_eq!(
            c.row_filter.clauses[1],
            FilterClause::new("Blog Post", "category", Operator::In, vec!["News", "Sports"])
        );
        let fields: Vec<&str> = c.readable_fields.as_ref().unwrap().iter().map(String::as_str).collect();
        assert_eq!(fields, ["published", "title"]);
    }

    #[test]
    fn test_non_owner_rule_lifts_owner_filter_and_unions_fields() {
        let both = Actor::new("editor@example.com").with_roles(["Blogger", "Editor"]);
        let c = conditions(&both, "Blog Post").unwrap();
        assert!(c.row_filter.is_empty());
        let fields: Vec<&str> = c.readable_fields.as_ref().unwrap().iter().map(String::as_str).collect();
        assert_eq!(fields, ["content", "published", "title"]);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            RolePermissions::from_toml_str("[[rule]]\nrole = 1"),
            Err(ConfigError::Toml { what: "permissions", .. })
        ));
        assert!(matches!(
            RolePermissions::from_toml_str(
                "[[rule]]\nrole = \"x\"\nentity = \"Bad`Name\"\nread = true"
            ),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            RolePermissions::from_toml_str(
                "[[restriction]]\nuser = \"u\"\nentity = \"ToDo\"\nfield = \"status\"\nvalues = []"
            ),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_builder() {
        let permissions = RolePermissions::default().rule(RoleRule {
            role: "Guest".into(),
            entity: "ToDo".into(),
            read: true,
            if_owner: false,
            fields: None,
        });
        let guest = Actor::new("g").with_roles(["Guest"]);
        assert!(
            permissions
                .get_permission_conditions(&PermissionContext::read(&guest, "ToDo"))
                .is_ok()
        );
    }
}
