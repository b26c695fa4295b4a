//! Recursive-descent acceptor for requested fields, `order_by` and `group_by`.
//!
//! ```text
//! field_expr := ( '*' | column | call ) [ 'as' ident ] EOF
//! call       := FUNC '(' [ arg { ',' arg } ] ')'
//! arg        := column | literal | '*' | 'distinct' column
//! column     := ident [ '.' ident ]
//! order_list := ( column | call ) [ 'asc' | 'desc' ] { ',' ... } EOF
//! ```

use std::fmt;

use super::lexer::{Token, tokenize};
use crate::types::{SortDir, Value};

/// Bare words that may never be used as an unquoted identifier.
const RESERVED: &[&str] = &[
    "select", "union", "from", "where", "insert", "update", "delete", "drop", "alter", "create",
    "into", "exec", "execute", "having", "group", "order", "limit", "offset", "join", "as",
    "distinct", "and", "or", "not", "null", "case", "when", "then",
];

/// Functions allowed inside field expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Function {
    /// `count(x)`
    Count,
    /// `sum(x)`
    Sum,
    /// `avg(x)`
    Avg,
    /// `min(x)`
    Min,
    /// `max(x)`
    Max,
    /// `date(x)`
    Date,
    /// `datediff(a, b)`, in days
    DateDiff,
    /// `locate(needle, haystack)`
    Locate,
    /// `ifnull(a, b)`, also spelled `coalesce`
    IfNull,
    /// `lower(x)`
    Lower,
    /// `upper(x)`
    Upper,
}

impl Function {
    /// Look up a whitelisted function by name, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "date" => Some(Self::Date),
            "datediff" => Some(Self::DateDiff),
            "locate" => Some(Self::Locate),
            "ifnull" | "coalesce" => Some(Self::IfNull),
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            _ => None,
        }
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Date => "date",
            Self::DateDiff => "datediff",
            Self::Locate => "locate",
            Self::IfNull => "ifnull",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    /// Exact argument count.
    pub const fn arity(self) -> usize {
        match self {
            Self::DateDiff | Self::Locate | Self::IfNull => 2,
            _ => 1,
        }
    }

    /// Aggregates collapse rows.
    pub const fn is_aggregate(self) -> bool {
        matches!(self, Self::Count | Self::Sum | Self::Avg | Self::Min | Self::Max)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[qualifier.]field`, qualifier being an entity or table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Entity or prefixed table name, if written.
    pub qualifier: Option<String>,
    /// Column name.
    pub field: String,
}

/// A literal function argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string, unescaped.
    String(String),
    /// Numeric text as written.
    Number(String),
}

impl Literal {
    /// Value to bind for this literal.
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => n
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| n.parse::<f64>().map(Value::Float))
                .unwrap_or_else(|_| Value::String(n.clone())),
        }
    }
}

/// A function argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// `*`, as in `count(*)`
    Star,
    /// Column reference
    Column(ColumnRef),
    /// Bound as a parameter
    Literal(Literal),
}

/// A whitelisted function call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Which function.
    pub func: Function,
    /// `count(distinct x)`.
    pub distinct: bool,
    /// Arguments in order.
    pub args: Vec<Arg>,
}

/// Top-level expression of a requested field.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every readable column
    Star,
    /// A single column
    Column(ColumnRef),
    /// A whitelisted function call
    Call(Call),
}

impl Expr {
    /// Column references anywhere in the expression.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        match self {
            Self::Star => Vec::new(),
            Self::Column(col) => vec![col],
            Self::Call(call) => call
                .args
                .iter()
                .filter_map(|arg| match arg {
                    Arg::Column(col) => Some(col),
                    Arg::Star | Arg::Literal(_) => None,
                })
                .collect(),
        }
    }

    /// Whether this is an aggregate call.
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Self::Call(call) if call.func.is_aggregate())
    }
}

/// A sanitized output field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    /// Parsed expression.
    pub expr: Expr,
    /// `as` alias.
    pub alias: Option<String>,
    /// Expression text as requested, trimmed.
    pub text: String,
}

impl FieldExpr {
    /// Key under which this field appears in result rows: the alias, else the
    /// column name, else the expression text.
    pub fn key(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match &self.expr {
            Expr::Column(col) => &col.field,
            Expr::Star | Expr::Call(_) => &self.text,
        }
    }
}

/// One `order_by` item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    /// Sort key.
    pub expr: Expr,
    /// Direction; `asc` when not written.
    pub dir: SortDir,
}

/// Parse a requested output field.
pub(crate) fn parse_field(text: &str) -> Result<FieldExpr, String> {
    let mut parser = Parser::new(text)?;
    let expr = parser.expr(true)?;
    let alias = if parser.eat_keyword("as") {
        Some(parser.identifier("alias")?)
    } else {
        None
    };
    parser.finish()?;
    Ok(FieldExpr {
        expr,
        alias,
        text: text.trim().to_string(),
    })
}

/// Parse a lone column reference.
pub(crate) fn parse_column(text: &str) -> Result<ColumnRef, String> {
    let mut parser = Parser::new(text)?;
    let col = parser.column()?;
    parser.finish()?;
    Ok(col)
}

/// Parse a comma-separated `order_by` list.
pub(crate) fn parse_order_list(text: &str) -> Result<Vec<OrderItem>, String> {
    let mut parser = Parser::new(text)?;
    let mut items = Vec::new();
    loop {
        let expr = parser.expr(false)?;
        let dir = if parser.eat_keyword("desc") {
            SortDir::Desc
        } else {
            parser.eat_keyword("asc");
            SortDir::Asc
        };
        items.push(OrderItem { expr, dir });
        if !parser.eat(&Token::Comma) {
            break;
        }
    }
    parser.finish()?;
    Ok(items)
}

/// Parse a comma-separated `group_by` column list.
pub(crate) fn parse_column_list(text: &str) -> Result<Vec<ColumnRef>, String> {
    let mut parser = Parser::new(text)?;
    let mut columns = vec![parser.column()?];
    while parser.eat(&Token::Comma) {
        columns.push(parser.column()?);
    }
    parser.finish()?;
    Ok(columns)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self, String> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err("empty expression".to_string());
        }
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected}, found {token}")),
            None => Err(format!("expected {expected}, found end of expression")),
        }
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Comma) => Err(
                "unexpected `,`; each field must be requested separately".to_string(),
            ),
            Some(token) => Err(format!("unexpected {token} after expression")),
        }
    }

    /// `'*' | column | call`; `*` only where `allow_star`.
    fn expr(&mut self, allow_star: bool) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Star) if allow_star => {
                self.pos += 1;
                Ok(Expr::Star)
            },
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::LParen) => {
                self.call().map(Expr::Call)
            },
            Some(Token::Ident(_) | Token::Quoted(_)) => self.column().map(Expr::Column),
            Some(Token::LParen) => Err("sub-expressions and sub-queries are not allowed".to_string()),
            Some(token) => Err(format!("unexpected {token}")),
            None => Err("empty expression".to_string()),
        }
    }

    fn call(&mut self) -> Result<Call, String> {
        let Some(Token::Ident(name)) = self.advance() else {
            return Err("expected function name".to_string());
        };
        let func =
            Function::from_name(&name).ok_or_else(|| format!("function `{name}` is not allowed"))?;
        self.expect(&Token::LParen)?;

        let distinct = func == Function::Count && self.eat_keyword("distinct");
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.arg(func, distinct)?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;

        if args.len() != func.arity() {
            return Err(format!(
                "`{func}` takes {} argument(s), got {}",
                func.arity(),
                args.len()
            ));
        }
        if distinct && !matches!(args.first(), Some(Arg::Column(_))) {
            return Err("`count(distinct ...)` requires a column".to_string());
        }
        Ok(Call {
            func,
            distinct,
            args,
        })
    }

    fn arg(&mut self, func: Function, distinct: bool) -> Result<Arg, String> {
        match self.peek() {
            Some(Token::Star) if func == Function::Count && !distinct => {
                self.pos += 1;
                Ok(Arg::Star)
            },
            Some(Token::Star) => Err(format!("`*` is not a valid argument to `{func}`")),
            Some(Token::Str(s)) => {
                let lit = Literal::String(s.clone());
                self.pos += 1;
                Ok(Arg::Literal(lit))
            },
            Some(Token::Number(n)) => {
                let lit = Literal::Number(n.clone());
                self.pos += 1;
                Ok(Arg::Literal(lit))
            },
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::LParen) => {
                Err("nested function calls are not allowed".to_string())
            },
            Some(Token::Ident(_) | Token::Quoted(_)) => self.column().map(Arg::Column),
            Some(Token::LParen) => Err("sub-expressions and sub-queries are not allowed".to_string()),
            Some(token) => Err(format!("unexpected {token} in arguments to `{func}`")),
            None => Err(format!("unterminated call to `{func}`")),
        }
    }

    fn column(&mut self) -> Result<ColumnRef, String> {
        let first = self.identifier("column")?;
        if self.eat(&Token::Dot) {
            let field = self.identifier("column")?;
            Ok(ColumnRef {
                qualifier: Some(first),
                field,
            })
        } else {
            Ok(ColumnRef {
                qualifier: None,
                field: first,
            })
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, String> {
        match self.advance() {
            Some(Token::Ident(name)) => {
                if RESERVED.iter().any(|kw| name.eq_ignore_ascii_case(kw)) {
                    Err(format!("reserved keyword `{name}` cannot be used as a {what}"))
                } else {
                    Ok(name)
                }
            },
            Some(Token::Quoted(name)) => Ok(name),
            Some(token) => Err(format!("expected {what}, found {token}")),
            None => Err(format!("expected {what}, found end of expression")),
        }
    }
}
