use crate::common::Value;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^\s*(?:
            (?P<string>'(?:[^']|'')*')
          | (?P<number>\d+(?:\.\d+)?)
          | (?P<param>:[A-Za-z_][A-Za-z0-9_]*)
          | (?P<ident>[A-Za-z_][A-Za-z0-9_]*)
          | (?P<symbol><>|!=|>=|<=|[=<>(),.+*-])
        )",
    )
    .expect("valid token pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Param(String),
    Number(Value),
    Str(String),
    Symbol(String),
}

impl Token {
    /// Keywords are identifiers compared case-insensitively.
    pub(crate) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(ident) if ident.eq_ignore_ascii_case(keyword))
    }

    pub(crate) fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self, Token::Symbol(s) if s == symbol)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(ident) => write!(f, "{}", ident),
            Token::Param(name) => write!(f, ":{}", name),
            Token::Number(value) => write!(f, "{}", value),
            Token::Str(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Token::Symbol(symbol) => write!(f, "{}", symbol),
        }
    }
}

/// Splits query text into tokens, each paired with its byte offset.
pub(crate) fn tokenize(text: &str) -> QuarryResult<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut position = 0;

    while position < text.len() {
        let rest = &text[position..];
        if rest.trim().is_empty() {
            break;
        }

        let captures = TOKEN.captures(rest).ok_or_else(|| {
            let offset = position + (rest.len() - rest.trim_start().len());
            log::error!("Unexpected character at {} in query {}", offset, text);
            QuarryError::new(
                &format!(
                    "unexpected character '{}' at position {}",
                    rest.trim_start().chars().next().unwrap_or(' '),
                    offset
                ),
                ErrorKind::QueryDerivationError,
            )
        })?;

        let whole = captures.get(0).map(|m| m.end()).unwrap_or(rest.len());
        let token = if let Some(m) = captures.name("string") {
            let quoted = m.as_str();
            Token::Str(quoted[1..quoted.len() - 1].replace("''", "'"))
        } else if let Some(m) = captures.name("number") {
            let literal = m.as_str();
            if literal.contains('.') {
                Token::Number(Value::F64(literal.parse::<f64>()?))
            } else {
                Token::Number(Value::I64(literal.parse::<i64>()?))
            }
        } else if let Some(m) = captures.name("param") {
            Token::Param(m.as_str()[1..].to_string())
        } else if let Some(m) = captures.name("ident") {
            Token::Ident(m.as_str().to_string())
        } else if let Some(m) = captures.name("symbol") {
            Token::Symbol(m.as_str().to_string())
        } else {
            return Err(QuarryError::new(
                &format!("unrecognized token at position {}", position),
                ErrorKind::QueryDerivationError,
            ));
        };

        let start = position + (rest.len() - rest.trim_start().len());
        tokens.push((token, start));
        position += whole;
    }

    Ok(tokens)
}
