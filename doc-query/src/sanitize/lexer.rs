//! Tokenizer for the restricted field-expression language.

use std::fmt;

/// Maximum length of a single expression.
pub(crate) const MAX_EXPRESSION_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Bare identifier or keyword.
    Ident(String),
    /// Backtick- or double-quoted identifier, quotes removed.
    Quoted(String),
    /// Single-quoted string literal, quotes removed and `''` unescaped.
    Str(String),
    /// Unsigned decimal number.
    Number(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Star,
}

impl Token {
    /// Whether this is the bare keyword `kw` (case-insensitive).
    pub(crate) fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Self::Ident(s) if s.eq_ignore_ascii_case(kw))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) | Self::Number(s) => write!(f, "`{s}`"),
            Self::Quoted(s) => write!(f, "quoted identifier `{s}`"),
            Self::Str(_) => f.write_str("string literal"),
            Self::LParen => f.write_str("`(`"),
            Self::RParen => f.write_str("`)`"),
            Self::Comma => f.write_str("`,`"),
            Self::Dot => f.write_str("`.`"),
            Self::Star => f.write_str("`*`"),
        }
    }
}

/// Split an expression into tokens.
///
/// Statement separators and comment markers are rejected here, before the
/// grammar sees anything.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    if input.len() > MAX_EXPRESSION_LENGTH {
        return Err(format!(
            "expression longer than {MAX_EXPRESSION_LENGTH} characters"
        ));
    }

    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            },
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            },
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                let mut seen_dot = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || (c == '.' && !seen_dot) {
                        seen_dot |= c == '.';
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(number));
            },
            '`' | '"' => {
                chars.next();
                let quoted = read_quoted(&mut chars, c)
                    .ok_or_else(|| "unterminated quoted identifier".to_string())?;
                if quoted.is_empty() {
                    return Err("empty quoted identifier".to_string());
                }
                tokens.push(Token::Quoted(quoted));
            },
            '\'' => {
                chars.next();
                let literal = read_quoted(&mut chars, '\'')
                    .ok_or_else(|| "unterminated string literal".to_string())?;
                tokens.push(Token::Str(literal));
            },
            '(' | ')' | ',' | '.' | '*' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    _ => Token::Star,
                });
            },
            ';' => return Err("statement separator `;` is not allowed".to_string()),
            '#' => return Err("comments are not allowed".to_string()),
            '-' | '/' => {
                chars.next();
                let comment = match (c, chars.peek()) {
                    ('-', Some('-')) | ('/', Some('*')) => "comments are not allowed",
                    _ => "operators are not allowed",
                };
                return Err(comment.to_string());
            },
            other => return Err(format!("unexpected character `{other}`")),
        }
    }

    Ok(tokens)
}

/// Read up to the closing `quote`, treating a doubled quote as an escape.
/// The opening quote has already been consumed.
fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> Option<String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == quote {
            if chars.peek() == Some(&quote) {
                out.push(quote);
                chars.next();
            } else {
                return Some(out);
            }
        } else {
            out.push(c);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_call_with_alias() {
        let tokens = tokenize("locate('', name) as _relevance").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("locate".into()),
                Token::LParen,
                Token::Str(String::new()),
                Token::Comma,
                Token::Ident("name".into()),
                Token::RParen,
                Token::Ident("as".into()),
                Token::Ident("_relevance".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_qualified_column() {
        let tokens = tokenize("`tabDocType`.`name`").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Quoted("tabDocType".into()),
                Token::Dot,
                Token::Quoted("name".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_escaped_quotes() {
        assert_eq!(
            tokenize("'it''s'").unwrap(),
            vec![Token::Str("it's".into())]
        );
        assert_eq!(
            tokenize("\"a\"\"b\"").unwrap(),
            vec![Token::Quoted("a\"b".into())]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            tokenize("1.5").unwrap(),
            vec![Token::Number("1.5".into())]
        );
        // hex escapes split into a number and an identifier, which the grammar rejects
        assert_eq!(
            tokenize("0x27").unwrap(),
            vec![Token::Number("0".into()), Token::Ident("x27".into())]
        );
    }

    #[test]
    fn test_tokenize_rejects_separators_and_comments() {
        assert!(tokenize("name;").unwrap_err().contains("`;`"));
        assert!(tokenize("name -- x").unwrap_err().contains("comments"));
        assert!(tokenize("/* x */ name").unwrap_err().contains("comments"));
        assert!(tokenize("name # x").unwrap_err().contains("comments"));
        assert!(tokenize("issingle=1").unwrap_err().contains("`=`"));
    }

    #[test]
    fn test_tokenize_rejects_unterminated() {
        assert!(tokenize("'abc").unwrap_err().contains("unterminated"));
        assert!(tokenize("`abc").unwrap_err().contains("unterminated"));
        assert!(tokenize("``").unwrap_err().contains("empty"));
    }

    #[test]
    fn test_tokenize_length_limit() {
        assert!(tokenize(&"a".repeat(MAX_EXPRESSION_LENGTH)).is_ok());
        assert!(tokenize(&"a".repeat(MAX_EXPRESSION_LENGTH + 1)).is_err());
    }
}
