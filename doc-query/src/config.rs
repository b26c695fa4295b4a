//! Query options, loadable from TOML.
//!
//! ```
//! use doc_query::QueryOptions;
//!
//! let options = QueryOptions::from_toml_str(r#"
//!     table_prefix = "tab"
//!     default_page_length = 50
//!     max_page_length = 500
//! "#).unwrap();
//! assert_eq!(options.default_page_length, Some(50));
//! ```

use serde::Deserialize;

use crate::error::{ConfigError, DataError};

/// Tunables shared by every query built from a context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct QueryOptions {
    /// Prepended to entity names to form table names.
    pub table_prefix: String,
    /// Page length used when the caller does not set one. `None` = unlimited.
    pub default_page_length: Option<u64>,
    /// Upper bound on any page length, including "unlimited" requests.
    pub max_page_length: Option<u64>,
    /// Maximum items in one `in`/`not in` list.
    pub max_in_values: usize,
    /// Maximum clauses across filters, OR filters and permission rows.
    pub max_filters: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            table_prefix: "tab".to_string(),
            default_page_length: Some(20),
            max_page_length: None,
            max_in_values: 1000,
            max_filters: 200,
        }
    }
}

impl QueryOptions {
    /// Parse options from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(s).map_err(|source| ConfigError::Toml {
            what: "options",
            source,
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Set the table prefix.
    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Set the default page length.
    #[must_use]
    pub const fn default_page_length(mut self, length: Option<u64>) -> Self {
        self.default_page_length = length;
        self
    }

    /// Cap every page length.
    #[must_use]
    pub const fn max_page_length(mut self, length: Option<u64>) -> Self {
        self.max_page_length = length;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid {
                what: "options",
                reason: format!(
                    "table_prefix `{}` may only contain ASCII letters, digits and `_`",
                    self.table_prefix
                ),
            });
        }
        if self.max_in_values == 0 || self.max_filters == 0 {
            return Err(ConfigError::Invalid {
                what: "options",
                reason: "max_in_values and max_filters must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Table name for an entity.
    pub fn table_name(&self, entity: &str) -> String {
        format!("{}{entity}", self.table_prefix)
    }

    /// Strip the table prefix from a qualifier, if present.
    pub fn entity_from_qualifier<'a>(&self, qualifier: &'a str) -> &'a str {
        if self.table_prefix.is_empty() {
            return qualifier;
        }
        qualifier
            .strip_prefix(self.table_prefix.as_str())
            .filter(|rest| !rest.is_empty())
            .unwrap_or(qualifier)
    }

    /// Entity named by a column qualifier in a query on `current`.
    ///
    /// A qualifier equal to `current` is taken as-is, so entities whose names
    /// happen to start with the prefix still resolve.
    pub fn resolve_qualifier<'a>(&self, qualifier: &'a str, current: &str) -> &'a str {
        if qualifier == current {
            qualifier
        } else {
            self.entity_from_qualifier(qualifier)
        }
    }

    /// Apply the page-length cap to a requested page length.
    pub fn effective_page_length(&self, requested: Option<u64>) -> Option<u64> {
        match (requested, self.max_page_length) {
            (Some(len), Some(max)) => Some(len.min(max)),
            (None, Some(max)) => Some(max),
            (requested, None) => requested,
        }
    }

    pub(crate) fn check_filter_count(&self, count: usize) -> Result<(), DataError> {
        if count > self.max_filters {
            return Err(DataError::LimitExceeded {
                what: "number of filter clauses",
                max: self.max_filters,
            });
        }
        Ok(())
    }
}
