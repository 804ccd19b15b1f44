//! Recursive-descent parser for textual conditions.
//!
//! Grammar:
//!
//! ```text
//! expr    := or
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | compare
//! compare := atom [ ("==" | "!=") atom | "is" ["not"] "None" ]
//! atom    := "(" expr ")" | "obj." ident | literal
//! literal := "None" | "True" | "False" | integer | quoted string
//!          | "DeviceState." ident | "NetworkType." ident
//! ```

use super::{Condition, ConditionError, Operand};
use crate::{
    entity::Value,
    state::{ConnectionState, NetworkType},
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Dot,
    EqEq,
    NotEq,
    LParen,
    RParen,
}

fn error(offset: usize, message: impl Into<String>) -> ConditionError {
    ConditionError::Parse {
        offset,
        message: message.into(),
    }
}

fn word_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
        i += 1;
    }
    i
}

/// Variant names such as `8021x` may start with a digit.
fn follows_enum_name(tokens: &[(usize, Token)]) -> bool {
    matches!(
        tokens,
        [.., (_, Token::Ident(name)), (_, Token::Dot)]
            if name == "DeviceState" || name == "NetworkType"
    )
}

/// Lex the quoted string starting at `start`, returning it unescaped along
/// with the offset just past the closing quote.
fn string(input: &str, start: usize) -> Result<(String, usize), ConditionError> {
    let mut chars = input[start..].char_indices();
    let quote = chars.next().map(|(_, q)| q);
    let mut value = String::new();
    while let Some((at, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c if Some(c) == quote => return Ok((value, start + at + 1)),
            c => value.push(c),
        }
    }
    Err(error(start, "unterminated string"))
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'.' => {
                tokens.push((i, Token::Dot));
                i += 1;
            }
            b'(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            b')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            b'=' | b'!' => {
                if bytes.get(i + 1) != Some(&b'=') {
                    return Err(error(i, "expected `==` or `!=`"));
                }
                tokens.push((i, if c == b'=' { Token::EqEq } else { Token::NotEq }));
                i += 2;
            }
            b'\'' | b'"' => {
                let (value, next) = string(input, i)?;
                tokens.push((i, Token::Str(value)));
                i = next;
            }
            _ if follows_enum_name(&tokens) && (c == b'_' || c.is_ascii_alphanumeric()) => {
                let start = i;
                i = word_end(bytes, i);
                tokens.push((start, Token::Ident(input[start..i].to_owned())));
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let value = input[start..i]
                    .parse::<i64>()
                    .map_err(|e| error(start, format!("invalid integer: {e}")))?;
                tokens.push((start, Token::Int(value)));
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let start = i;
                i = word_end(bytes, i);
                tokens.push((start, Token::Ident(input[start..i].to_owned())));
            }
            _ => return Err(error(i, format!("unexpected character `{}`", char::from(c)))),
        }
    }
    Ok(tokens)
}

enum Atom {
    Operand(Operand),
    Group(Condition),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos).map(|(_, t)| t) }

    fn offset(&self) -> usize { self.tokens.get(self.pos).map_or(self.len, |(o, _)| *o) }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(word)) if word == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ConditionError> {
        let offset = self.offset();
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            _ => Err(error(offset, format!("expected {what}"))),
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ConditionError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(error(offset, format!("expected {what}"))),
        }
    }

    fn expr(&mut self) -> Result<Condition, ConditionError> {
        let mut lhs = self.and()?;
        while self.eat_keyword("or") {
            lhs = lhs.or(self.and()?);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Condition, ConditionError> {
        let mut lhs = self.unary()?;
        while self.eat_keyword("and") {
            lhs = lhs.and(self.unary()?);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Condition, ConditionError> {
        if self.eat_keyword("not") {
            return Ok(self.unary()?.not());
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Condition, ConditionError> {
        let offset = self.offset();
        let lhs = self.atom()?;
        let op = match self.peek() {
            Some(Token::EqEq) => Some(true),
            Some(Token::NotEq) => Some(false),
            Some(Token::Ident(word)) if word == "is" => None,
            _ => {
                return Ok(match lhs {
                    Atom::Group(cond) => cond,
                    Atom::Operand(op) => Condition::Truthy(op),
                });
            }
        };
        let Atom::Operand(lhs) = lhs else {
            return Err(error(offset, "a grouped expression cannot be compared"));
        };
        self.pos += 1;
        match op {
            Some(equal) => {
                let rhs_offset = self.offset();
                let Atom::Operand(rhs) = self.atom()? else {
                    return Err(error(rhs_offset, "a grouped expression cannot be compared"));
                };
                Ok(if equal {
                    Condition::Eq(lhs, rhs)
                } else {
                    Condition::Ne(lhs, rhs)
                })
            }
            None => {
                let negated = self.eat_keyword("not");
                let none_offset = self.offset();
                if !self.eat_keyword("None") {
                    return Err(error(none_offset, "expected `None` after `is`"));
                }
                let null = Operand::Literal(Value::Null);
                Ok(if negated {
                    Condition::Ne(lhs, null)
                } else {
                    Condition::Eq(lhs, null)
                })
            }
        }
    }

    fn atom(&mut self) -> Result<Atom, ConditionError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(Atom::Group(inner))
            }
            Some(Token::Int(i)) => Ok(Atom::Operand(Operand::Literal(Value::Int(i)))),
            Some(Token::Str(s)) => Ok(Atom::Operand(Operand::Literal(Value::Str(s)))),
            Some(Token::Ident(name)) => self.named(&name, offset).map(Atom::Operand),
            Some(_) => Err(error(offset, "unexpected token")),
            None => Err(error(offset, "unexpected end of condition")),
        }
    }

    fn named(&mut self, name: &str, offset: usize) -> Result<Operand, ConditionError> {
        match name {
            "None" => Ok(Operand::Literal(Value::Null)),
            "True" => Ok(Operand::Literal(Value::Bool(true))),
            "False" => Ok(Operand::Literal(Value::Bool(false))),
            "obj" => {
                self.expect(&Token::Dot, "`.` after `obj`")?;
                Ok(Operand::Field(self.ident("field name")?))
            }
            "DeviceState" | "NetworkType" => {
                self.expect(&Token::Dot, "`.` after enum name")?;
                let variant_offset = self.offset();
                let variant = self.ident("variant name")?;
                let value = if name == "DeviceState" {
                    variant.parse::<ConnectionState>().map(Value::State)
                } else {
                    variant.parse::<NetworkType>().map(Value::NetworkType)
                };
                value
                    .map(Operand::Literal)
                    .map_err(|e| error(variant_offset, e.to_string()))
            }
            other => Err(error(offset, format!("unknown name `{other}`"))),
        }
    }
}

/// Parse a textual condition.
pub(super) fn parse(input: &str) -> Result<Condition, ConditionError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        len: input.len(),
    };
    let condition = parser.expr()?;
    if parser.peek().is_some() {
        return Err(error(parser.offset(), "unexpected trailing input"));
    }
    Ok(condition)
}
