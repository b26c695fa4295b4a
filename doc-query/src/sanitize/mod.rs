//! Field sanitizer: validation of requested output fields and identifiers.
//!
//! Requested fields are parsed by a tokenizer and a recursive-descent
//! acceptor instead of being scanned for bad substrings.
//! Anything the grammar does not consume completely is rejected, which closes
//! the comma/sub-query injection gaps a keyword blacklist leaves open:
//!
//! ```
//! use doc_query::sanitize;
//!
//! assert!(sanitize(&["name", "datediff(modified, creation) as date_diff"]).is_ok());
//! assert!(sanitize(&["name", "issingle, version()"]).is_err());
//! ```

mod grammar;
mod lexer;

pub use grammar::{Arg, Call, ColumnRef, Expr, FieldExpr, Function, Literal, OrderItem};

use crate::error::DataError;

/// Maximum length for entity names.
const MAX_ENTITY_NAME_LENGTH: usize = 61;

/// Sanitize requested output fields.
///
/// Fails on the first expression that is not a bare column, `*`, or a single
/// whitelisted function call (optionally aliased).
pub fn sanitize<S: AsRef<str>>(fields: &[S]) -> Result<Vec<FieldExpr>, DataError> {
    fields
        .iter()
        .map(|field| {
            let text = field.as_ref();
            grammar::parse_field(text).map_err(|reason| DataError::InvalidFieldExpression {
                expr: text.to_string(),
                reason,
            })
        })
        .collect()
}

/// Parse a column reference such as `name`, `Event.subject` or
/// `` `tabEvent`.`subject` ``.
pub fn parse_column(text: &str) -> Result<ColumnRef, DataError> {
    grammar::parse_column(text).map_err(|reason| DataError::InvalidFilter(format!(
        "invalid field `{text}`: {reason}"
    )))
}

/// Parse an `order_by` clause.
pub fn parse_order_by(text: &str) -> Result<Vec<OrderItem>, DataError> {
    grammar::parse_order_list(text).map_err(|reason| DataError::InvalidClause {
        clause: "order_by",
        expr: text.to_string(),
        reason,
    })
}

/// Parse a `group_by` clause.
pub fn parse_group_by(text: &str) -> Result<Vec<ColumnRef>, DataError> {
    grammar::parse_column_list(text).map_err(|reason| DataError::InvalidClause {
        clause: "group_by",
        expr: text.to_string(),
        reason,
    })
}

/// Validate that a string is a safe entity name.
///
/// A valid entity name:
/// - Starts with an ASCII letter
/// - Contains only ASCII letters, digits, underscores, hyphens and single spaces
/// - Is not empty, has no trailing space, and is at most 61 characters
///
/// Entity names become quoted table identifiers, so this keeps quote
/// characters and control bytes out of them.
///
/// # Examples
///
/// ```
/// use doc_query::is_valid_entity_name;
///
/// assert!(is_valid_entity_name("DocType"));
/// assert!(is_valid_entity_name("Sales Invoice Item"));
///
/// assert!(!is_valid_entity_name(""));
/// assert!(!is_valid_entity_name("1Entity"));
/// assert!(!is_valid_entity_name("User\"; DROP"));
/// ```
#[inline]
#[must_use]
pub fn is_valid_entity_name(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_ENTITY_NAME_LENGTH || s.ends_with(' ') || s.contains("  ") {
        return false;
    }

    let mut chars = s.chars();

    // First character must be a letter
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {},
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ')
}

/// Check an entity name, returning it as an [`DataError::UnknownEntity`] when invalid.
pub(crate) fn check_entity_name(s: &str) -> Result<(), DataError> {
    if is_valid_entity_name(s) {
        Ok(())
    } else {
        Err(DataError::UnknownEntity(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_accepts_whitelisted_expressions() {
        let fields = sanitize(&[
            "name",
            "issingle",
            "count(name)",
            "locate('', name) as _relevance",
            "date(creation) as creation",
            "datediff(modified, creation) as date_diff",
        ])
        .unwrap();
        let keys: Vec<&str> = fields.iter().map(FieldExpr::key).collect();
        assert_eq!(
            keys,
            ["name", "issingle", "count(name)", "_relevance", "creation", "date_diff"]
        );
    }

    #[test]
    fn test_sanitize_names_offending_expression() {
        let err = sanitize(&["name", "issingle, version()"]).unwrap_err();
        let DataError::InvalidFieldExpression { expr, .. } = err else {
            panic!("expected InvalidFieldExpression, got {err:?}")
        };
        assert_eq!(expr, "issingle, version()");
    }

    #[test]
    fn test_sanitize_rejects_known_injections() {
        let attacks = [
            "issingle, version()",
            "issingle, IF(issingle=1, (select name from tabUser), count(name))",
            "issingle, (select count(*) from tabSessions)",
            "issingle, SELECT LOCATE('', `tabUser`.`user`) AS user;",
            "issingle, IF(issingle=1, (SELECT name from tabUser), count(*))",
            "name; drop table tabUser",
            "name -- comment",
            "name /* comment */",
            "sleep(5)",
            "benchmark(1000000, 1)",
            "count(name) union select 1",
            "(name)",
            "name as `x`, version()",
        ];
        for attack in attacks {
            assert!(sanitize(&[attack]).is_err(), "accepted `{attack}`");
        }
    }

    #[test]
    fn test_parse_order_by_and_group_by_errors() {
        assert!(matches!(
            parse_order_by("modified desc; select 1"),
            Err(DataError::InvalidClause { clause: "order_by", .. })
        ));
        assert!(matches!(
            parse_group_by("owner, count(name)"),
            Err(DataError::InvalidClause { clause: "group_by", .. })
        ));
    }

    #[test]
    fn test_entity_names() {
        assert!(is_valid_entity_name("ToDo"));
        assert!(is_valid_entity_name("Has_Role"));
        assert!(is_valid_entity_name("Web-Form"));
        assert!(!is_valid_entity_name("Trailing "));
        assert!(!is_valid_entity_name("Double  Space"));
        assert!(!is_valid_entity_name("tab`DocType`"));
        assert!(!is_valid_entity_name("Événement"));
        assert!(!is_valid_entity_name(&"a".repeat(62)));
        assert!(check_entity_name("Bad;Name").is_err());
    }
}
