//! Parser for the textual filter grammar emitted by the language model
//!
//! ```text
//! filter     := "NO_FILTER" | expr
//! expr       := logical | comparison
//! logical    := ("and" | "or") "(" [expr ("," expr)*] ")" | "not" "(" expr ")"
//! comparison := comparator "(" attribute "," literal ")"
//! literal    := string | number | "[" [literal ("," literal)*] "]"
//! ```
//!
//! Comparators: `eq ne gt gte lt lte contain contains in nin`. `nin(f, xs)`
//! is read as `not(in(f, xs))`. Attributes may be quoted or bare identifiers.

use super::predicate::{Comparator, Literal, Predicate};
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// Marker the model emits when a query has no filterable intent
pub const NO_FILTER: &str = "NO_FILTER";

/// Deepest logical nesting accepted from model output
pub const MAX_FILTER_DEPTH: usize = 64;

/// A grammar error with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("at offset {offset}: {message}")]
pub struct FilterParseError {
    pub offset: usize,
    pub message: String,
}

impl FilterParseError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Int(i) => format!("number {}", i),
            Token::Float(x) => format!("number {}", x),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

/// Parse a filter expression. `NO_FILTER` (any case) and blank input yield `None`.
pub fn parse_filter(input: &str) -> Result<Option<Predicate>, FilterParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_FILTER) {
        return Ok(None);
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: trimmed.len(),
        depth: 0,
    };
    let predicate = parser.expr()?;
    if let Some((offset, tok)) = parser.tokens.get(parser.pos) {
        return Err(FilterParseError::new(
            *offset,
            format!("unexpected trailing {}", tok.describe()),
        ));
    }
    Ok(Some(predicate))
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '[' | ']' | ',' => {
                chars.next();
                let tok = match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Comma,
                };
                tokens.push((offset, tok));
            }
            '"' | '\'' => {
                chars.next();
                let s = read_string(&mut chars, ch, offset)?;
                tokens.push((offset, Token::Str(s)));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                tokens.push((offset, read_number(&mut chars, offset)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((offset, Token::Ident(ident)));
            }
            other => {
                return Err(FilterParseError::new(
                    offset,
                    format!("unexpected character '{}'", other),
                ))
            }
        }
    }

    Ok(tokens)
}

fn read_string(
    chars: &mut Peekable<CharIndices<'_>>,
    quote: char,
    start: usize,
) -> Result<String, FilterParseError> {
    let mut out = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, escaped)) => out.push(escaped),
                None => return Err(FilterParseError::new(offset, "dangling escape")),
            },
            c if c == quote => return Ok(out),
            c => out.push(c),
        }
    }
    Err(FilterParseError::new(start, "unterminated string literal"))
}

fn read_number(
    chars: &mut Peekable<CharIndices<'_>>,
    start: usize,
) -> Result<Token, FilterParseError> {
    let mut text = String::new();
    while let Some(&(_, c)) = chars.peek() {
        let sign_ok = (c == '-' || c == '+')
            && (text.is_empty() || text.ends_with('e') || text.ends_with('E'));
        if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || sign_ok {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }

    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Token::Int(i));
        }
    }
    text.parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .map(Token::Float)
        .ok_or_else(|| FilterParseError::new(start, format!("invalid number '{}'", text)))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<(usize, Token), FilterParseError> {
        let item = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| FilterParseError::new(self.end, "unexpected end of expression"))?;
        self.pos += 1;
        Ok(item)
    }

    fn expect(&mut self, wanted: Token) -> Result<(), FilterParseError> {
        let (offset, tok) = self.next()?;
        if tok == wanted {
            Ok(())
        } else {
            Err(FilterParseError::new(
                offset,
                format!("expected {}, found {}", wanted.describe(), tok.describe()),
            ))
        }
    }

    fn expr(&mut self) -> Result<Predicate, FilterParseError> {
        self.depth += 1;
        let result = self.nested_expr();
        self.depth -= 1;
        result
    }

    fn nested_expr(&mut self) -> Result<Predicate, FilterParseError> {
        let (offset, tok) = self.next()?;
        if self.depth > MAX_FILTER_DEPTH {
            return Err(FilterParseError::new(
                offset,
                format!("expression nested deeper than {} levels", MAX_FILTER_DEPTH),
            ));
        }
        let name = match tok {
            Token::Ident(name) => name.to_ascii_lowercase(),
            other => {
                return Err(FilterParseError::new(
                    offset,
                    format!("expected an operator, found {}", other.describe()),
                ))
            }
        };
        self.expect(Token::LParen)?;

        let predicate = match name.as_str() {
            "and" => Predicate::And(self.expr_list()?),
            "or" => Predicate::Or(self.expr_list()?),
            "not" => {
                let child = self.expr()?;
                self.skip_trailing_comma();
                Predicate::negate(child)
            }
            "nin" => {
                let (field, value) = self.comparison_args()?;
                Predicate::negate(Predicate::compare(field, Comparator::In, value))
            }
            other => {
                let op = comparator(other).ok_or_else(|| {
                    FilterParseError::new(offset, format!("unknown operator '{}'", other))
                })?;
                let (field, value) = self.comparison_args()?;
                Predicate::compare(field, op, value)
            }
        };

        self.expect(Token::RParen)?;
        Ok(predicate)
    }

    fn expr_list(&mut self) -> Result<Vec<Predicate>, FilterParseError> {
        let mut children = Vec::new();
        while self.peek() != Some(&Token::RParen) {
            children.push(self.expr()?);
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(children)
    }

    fn comparison_args(&mut self) -> Result<(String, Literal), FilterParseError> {
        let (offset, tok) = self.next()?;
        let field = match tok {
            Token::Str(s) | Token::Ident(s) => s,
            other => {
                return Err(FilterParseError::new(
                    offset,
                    format!("expected an attribute name, found {}", other.describe()),
                ))
            }
        };
        self.expect(Token::Comma)?;
        let value = self.literal()?;
        self.skip_trailing_comma();
        Ok((field, value))
    }

    fn literal(&mut self) -> Result<Literal, FilterParseError> {
        let (offset, tok) = self.next()?;
        match tok {
            Token::Str(s) => Ok(Literal::String(s)),
            Token::Int(i) => Ok(Literal::Integer(i)),
            Token::Float(x) => Ok(Literal::Float(x)),
            Token::LBracket => {
                let mut items = Vec::new();
                while let Some(next) = self.peek() {
                    match next {
                        Token::RBracket => break,
                        Token::LBracket => {
                            return Err(FilterParseError::new(offset, "nested lists are not allowed"))
                        }
                        _ => {}
                    }
                    items.push(self.literal()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Literal::List(items))
            }
            other => Err(FilterParseError::new(
                offset,
                format!("expected a literal, found {}", other.describe()),
            )),
        }
    }

    fn skip_trailing_comma(&mut self) {
        if self.peek() == Some(&Token::Comma) {
            self.pos += 1;
        }
    }
}

fn comparator(name: &str) -> Option<Comparator> {
    Some(match name {
        "eq" => Comparator::Eq,
        "ne" => Comparator::Ne,
        "gt" => Comparator::Gt,
        "gte" => Comparator::Gte,
        "lt" => Comparator::Lt,
        "lte" => Comparator::Lte,
        "contain" | "contains" => Comparator::Contains,
        "in" => Comparator::In,
        _ => return None,
    })
}
