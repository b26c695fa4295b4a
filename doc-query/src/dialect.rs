//! SQL dialect implementations for Postgres, `SQLite` and MariaDB.
//!
//! Each dialect handles the specific syntax differences between databases:
//! placeholders, identifier quoting, list membership, pattern matching,
//! the few whitelisted functions that are not portable, and pagination.

use crate::sanitize::Function;
use crate::types::Value;

/// SQL dialect trait for database-specific syntax.
pub trait Dialect: Clone + Copy + Send + Sync {
    /// Format a parameter placeholder (e.g., `$1` for Postgres, `?1` for `SQLite`).
    fn param(&self, idx: usize) -> String;

    /// Quote an identifier, doubling any embedded quote character.
    fn quote_ident(&self, ident: &str) -> String;

    /// Format an IN clause with multiple values.
    /// Returns the SQL fragment (e.g., `= ANY($1)` or `IN (?1, ?2)`) and the
    /// parameters it binds.
    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize)
    -> (String, Vec<Value>);

    /// Format a NOT IN clause.
    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>);

    /// Pattern-match operator for `like` / `not like`.
    fn like_op(&self, negated: bool) -> &'static str {
        if negated { "NOT LIKE" } else { "LIKE" }
    }

    /// Day difference `a - b` between two date-ish expressions.
    fn datediff(&self, a: &str, b: &str) -> String;

    /// 1-based position of `needle` in `haystack`, 0 when absent.
    fn locate(&self, needle: &str, haystack: &str) -> String;

    /// LIMIT/OFFSET suffix (with leading space), empty when unbounded from 0.
    fn limit_clause(&self, limit: Option<u64>, offset: u64) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// Render a whitelisted function call over already-rendered arguments.
    fn render_call(&self, func: Function, distinct: bool, args: &[String]) -> String {
        let arg = |i: usize| args.get(i).map_or("NULL", String::as_str);
        match func {
            Function::DateDiff => self.datediff(arg(0), arg(1)),
            Function::Locate => self.locate(arg(0), arg(1)),
            Function::IfNull => format!("COALESCE({}, {})", arg(0), arg(1)),
            _ => {
                let name = func.as_str().to_ascii_uppercase();
                if distinct {
                    format!("{name}(DISTINCT {})", args.join(", "))
                } else {
                    format!("{name}({})", args.join(", "))
                }
            },
        }
    }
}

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("${idx}")
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        // Postgres: column = ANY($1) with array parameter
        let sql = format!("{column} = ANY(${start_idx})");
        (sql, vec![Value::Array(values.to_vec())])
    }

    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        let sql = format!("{column} != ALL(${start_idx})");
        (sql, vec![Value::Array(values.to_vec())])
    }

    #[inline]
    fn like_op(&self, negated: bool) -> &'static str {
        // Postgres LIKE is case-sensitive; filters expect case-insensitive matching
        if negated { "NOT ILIKE" } else { "ILIKE" }
    }

    fn datediff(&self, a: &str, b: &str) -> String {
        format!("(DATE({a}) - DATE({b}))")
    }

    fn locate(&self, needle: &str, haystack: &str) -> String {
        format!("STRPOS({haystack}, {needle})")
    }
}

/// `SQLite` dialect.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("?{idx}")
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        // SQLite: column IN (?1, ?2, ?3) with expanded parameters
        let placeholders: Vec<String> = (0..values.len())
            .map(|i| self.param(start_idx + i))
            .collect();
        let sql = format!("{} IN ({})", column, placeholders.join(", "));
        (sql, values.to_vec())
    }

    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        let placeholders: Vec<String> = (0..values.len())
            .map(|i| self.param(start_idx + i))
            .collect();
        let sql = format!("{} NOT IN ({})", column, placeholders.join(", "));
        (sql, values.to_vec())
    }

    fn datediff(&self, a: &str, b: &str) -> String {
        format!("CAST(JULIANDAY(DATE({a})) - JULIANDAY(DATE({b})) AS INTEGER)")
    }

    fn locate(&self, needle: &str, haystack: &str) -> String {
        format!("INSTR({haystack}, {needle})")
    }

    fn limit_clause(&self, limit: Option<u64>, offset: u64) -> String {
        match (limit, offset) {
            (Some(limit), 0) => format!(" LIMIT {limit}"),
            (Some(limit), offset) => format!(" LIMIT {limit} OFFSET {offset}"),
            (None, 0) => String::new(),
            // SQLite only accepts OFFSET after a LIMIT
            (None, offset) => format!(" LIMIT -1 OFFSET {offset}"),
        }
    }
}

/// MariaDB / MySQL dialect.
///
/// Placeholders are positional `?`, so parameters must be bound in the order
/// they appear in the statement text. The assembler always renders in text
/// order.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct MariaDb;

impl Dialect for MariaDb {
    #[inline]
    fn param(&self, _idx: usize) -> String {
        "?".to_string()
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn in_clause(&self, column: &str, values: &[Value], _start_idx: usize) -> (String, Vec<Value>) {
        let placeholders = vec!["?"; values.len()].join(", ");
        (format!("{column} IN ({placeholders})"), values.to_vec())
    }

    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        _start_idx: usize,
    ) -> (String, Vec<Value>) {
        let placeholders = vec!["?"; values.len()].join(", ");
        (format!("{column} NOT IN ({placeholders})"), values.to_vec())
    }

    fn datediff(&self, a: &str, b: &str) -> String {
        format!("DATEDIFF({a}, {b})")
    }

    fn locate(&self, needle: &str, haystack: &str) -> String {
        format!("LOCATE({needle}, {haystack})")
    }

    fn limit_clause(&self, limit: Option<u64>, offset: u64) -> String {
        match (limit, offset) {
            (Some(limit), 0) => format!(" LIMIT {limit}"),
            (Some(limit), offset) => format!(" LIMIT {limit} OFFSET {offset}"),
            (None, 0) => String::new(),
            // MySQL has no OFFSET without LIMIT; the documented idiom is the max u64
            (None, offset) => format!(" LIMIT {} OFFSET {offset}", u64::MAX),
        }
    }
}
