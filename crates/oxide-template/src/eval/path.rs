//! The built-in expression capability.
//!
//! Understands property paths (`user.address.city`, `ids[0]`,
//! `attrs['key']`, `list.size`), literals (`null`, `true`, `false`,
//! numbers, quoted text), `!`/`not`, comparisons and `and`/`or` chains:
//!
//! ```text
//! or      = and (("or" | "||") and)*
//! and     = unary (("and" | "&&") unary)*
//! unary   = ("!" | "not") unary | compare
//! compare = primary (("==" | "!=" | "<" | "<=" | ">" | ">=") primary)?
//! primary = literal | path | "(" or ")" | "-" number
//! ```

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use super::{truthy, Evaluate, Scope};
use crate::error::EvaluationError;
use crate::value::Value;

/// Evaluates property paths and simple conditions against a [`Scope`].
///
/// Missing properties and missing map keys evaluate to null, as does any
/// property of null.
///
/// # Example
///
/// ```
/// use oxide_template::eval::{Evaluate, PathEvaluator};
/// use oxide_template::value::ToValue;
///
/// let params = serde_json::json!({"user": {"name": "ann", "roles": ["a", "b"]}}).to_value();
/// let engine = PathEvaluator::new();
/// assert_eq!(engine.evaluate("user.roles[1]", &params).unwrap(), "b".to_value());
/// assert_eq!(engine.evaluate("user.name != null and user.roles.size > 1", &params).unwrap(), true.to_value());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PathEvaluator;

impl PathEvaluator {
    /// Creates the evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Evaluate for PathEvaluator {
    fn evaluate(&self, expression: &str, scope: &dyn Scope) -> Result<Value, EvaluationError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
            depth: 0,
            scope,
        };
        let value = parser.or()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error(format!(
                "unexpected {:?} after end of expression",
                parser.tokens[parser.pos]
            )));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Decimal(BigDecimal),
    Text(String),
    Dot,
    Minus,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Compare(CompareOp),
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, EvaluationError> {
    let error = |message: String| EvaluationError::new(expression, message);
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = chars.next_if(|&(_, n)| n == '=').is_some();
                let token = match (c, followed_by_eq) {
                    ('=', true) => Token::Compare(CompareOp::Eq),
                    ('!', true) => Token::Compare(CompareOp::Ne),
                    ('!', false) => Token::Not,
                    ('<', false) => Token::Compare(CompareOp::Lt),
                    ('<', true) => Token::Compare(CompareOp::Le),
                    ('>', false) => Token::Compare(CompareOp::Gt),
                    ('>', true) => Token::Compare(CompareOp::Ge),
                    _ => return Err(error(format!("unexpected '=' at {start}"))),
                };
                tokens.push(token);
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == c).is_none() {
                    return Err(error(format!("unexpected '{c}' at {start}")));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, q)) if q == c => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => return Err(error(String::from("unterminated string"))),
                        },
                        Some((_, ch)) => text.push(ch),
                        None => return Err(error(String::from("unterminated string"))),
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                let mut is_decimal = false;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        end = i + 1;
                        chars.next();
                    } else if d == '.' && !is_decimal {
                        // Only a decimal point if a digit follows.
                        let rest = &expression[i + 1..];
                        if !rest.starts_with(|n: char| n.is_ascii_digit()) {
                            break;
                        }
                        is_decimal = true;
                        end = i + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &expression[start..end];
                let token = if is_decimal {
                    BigDecimal::from_str(text).map(Token::Decimal).ok()
                } else {
                    text.parse::<i64>()
                        .map(Token::Int)
                        .ok()
                        .or_else(|| BigDecimal::from_str(text).map(Token::Decimal).ok())
                };
                tokens.push(token.ok_or_else(|| error(format!("invalid number '{text}'")))?);
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '$' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &expression[start..end];
                tokens.push(match word {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word.to_string()),
                });
            }
            other => return Err(error(format!("unexpected '{other}' at {start}"))),
        }
    }
    Ok(tokens)
}

/// Deepest nesting of `!`, `(` and `[` an expression may use.
const MAX_DEPTH: usize = 128;

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    scope: &'a dyn Scope,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::new(self.expression, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
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

    fn expect(&mut self, expected: &Token) -> Result<(), EvaluationError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, found {:?}", self.peek())))
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, EvaluationError>,
    ) -> Result<Value, EvaluationError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> Result<Value, EvaluationError> {
        let mut value = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            value = Value::Bool(truthy(&value) || truthy(&rhs));
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<Value, EvaluationError> {
        let mut value = self.unary()?;
        while self.eat(&Token::And) {
            let rhs = self.unary()?;
            value = Value::Bool(truthy(&value) && truthy(&rhs));
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Value, EvaluationError> {
        if self.eat(&Token::Not) {
            let value = self.nested(Self::unary)?;
            return Ok(Value::Bool(!truthy(&value)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Value, EvaluationError> {
        let lhs = self.primary()?;
        let Some(Token::Compare(op)) = self.peek().cloned() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.primary()?;
        let result = match op {
            CompareOp::Eq => values_equal(&lhs, &rhs),
            CompareOp::Ne => !values_equal(&lhs, &rhs),
            CompareOp::Lt => self.ordering(&lhs, &rhs)? == Ordering::Less,
            CompareOp::Le => self.ordering(&lhs, &rhs)? != Ordering::Greater,
            CompareOp::Gt => self.ordering(&lhs, &rhs)? == Ordering::Greater,
            CompareOp::Ge => self.ordering(&lhs, &rhs)? != Ordering::Less,
        };
        Ok(Value::Bool(result))
    }

    fn ordering(&self, lhs: &Value, rhs: &Value) -> Result<Ordering, EvaluationError> {
        if let (Some(l), Some(r)) = (lhs.to_decimal(), rhs.to_decimal()) {
            return Ok(l.cmp(&r));
        }
        match (lhs, rhs) {
            (Value::Text(l), Value::Text(r)) => Ok(l.cmp(r)),
            _ => Err(self.error(format!(
                "cannot order {} and {}",
                lhs.kind(),
                rhs.kind()
            ))),
        }
    }

    fn primary(&mut self) -> Result<Value, EvaluationError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Value::Int(n)),
            Some(Token::Decimal(d)) => Ok(Value::Decimal(d)),
            Some(Token::Text(s)) => Ok(Value::Text(s)),
            Some(Token::Minus) => match self.advance() {
                Some(Token::Int(n)) => Ok(Value::Int(-n)),
                Some(Token::Decimal(d)) => Ok(Value::Decimal(-d)),
                other => Err(self.error(format!("expected number after '-', found {other:?}"))),
            },
            Some(Token::LParen) => {
                let value = self.nested(Self::or)?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "null" => Ok(Value::Null),
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => {
                    let root = self.scope.lookup(&name).cloned().unwrap_or(Value::Null);
                    self.path(root)
                }
            },
            other => Err(self.error(format!("unexpected {other:?}"))),
        }
    }

    fn path(&mut self, mut value: Value) -> Result<Value, EvaluationError> {
        loop {
            if self.eat(&Token::Dot) {
                let Some(Token::Ident(name)) = self.advance() else {
                    return Err(self.error("expected property name after '.'"));
                };
                value = self.property(value, &name)?;
            } else if self.eat(&Token::LBracket) {
                let index = self.nested(Self::or)?;
                self.expect(&Token::RBracket)?;
                value = self.index(value, &index)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn property(&self, value: Value, name: &str) -> Result<Value, EvaluationError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Map(mut map) => match map.remove(name) {
                Some(v) => Ok(v),
                None if is_size(name) => Ok(length(map.len())),
                None => Ok(Value::Null),
            },
            Value::List(items) | Value::Array(items) if is_size(name) => Ok(length(items.len())),
            Value::Text(s) if is_size(name) => Ok(length(s.chars().count())),
            Value::Bytes(b) if is_size(name) => Ok(length(b.len())),
            other => Err(self.error(format!(
                "no property '{name}' on {} value",
                other.kind()
            ))),
        }
    }

    fn index(&self, value: Value, index: &Value) -> Result<Value, EvaluationError> {
        match (value, index) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::List(items) | Value::Array(items), Value::Int(i)) => Ok(usize::try_from(*i)
                .ok()
                .and_then(|i| items.into_iter().nth(i))
                .unwrap_or(Value::Null)),
            (Value::Map(mut map), Value::Text(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
            (value, index) => Err(self.error(format!(
                "cannot index {} value with {}",
                value.kind(),
                index.kind()
            ))),
        }
    }
}

fn is_size(name: &str) -> bool {
    name == "size" || name == "length"
}

fn length(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.to_decimal(), rhs.to_decimal()) {
        (Some(l), Some(r)) => l == r,
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ToValue;

    fn params() -> Value {
        serde_json::json!({
            "id": 7,
            "name": "ann",
            "price": 9.5,
            "tags": ["x", "y"],
            "user": {"name": "bob", "address": {"city": "Ghent"}},
            "attrs": {"color": "red"},
            "empty": null
        })
        .to_value()
    }

    fn eval(expression: &str) -> Value {
        PathEvaluator::new().evaluate(expression, &params()).unwrap()
    }

    fn eval_err(expression: &str) -> EvaluationError {
        PathEvaluator::new()
            .evaluate(expression, &params())
            .expect_err(expression)
    }

    #[test]
    fn test_simple_lookup() {
        assert_eq!(eval("id"), Value::Int(7));
        assert_eq!(eval("missing"), Value::Null);
    }

    #[test]
    fn test_nested_path() {
        assert_eq!(eval("user.address.city"), "Ghent".to_value());
        assert_eq!(eval("user.phone"), Value::Null);
        assert_eq!(eval("empty.anything.deeper"), Value::Null);
    }

    #[test]
    fn test_indexing() {
        assert_eq!(eval("tags[1]"), "y".to_value());
        assert_eq!(eval("tags[5]"), Value::Null);
        assert_eq!(eval("attrs['color']"), "red".to_value());
    }

    #[test]
    fn test_size_pseudo_property() {
        assert_eq!(eval("tags.size"), Value::Int(2));
        assert_eq!(eval("name.length"), Value::Int(3));
        assert_eq!(eval("attrs.size"), Value::Int(1));
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("null"), Value::Null);
        assert_eq!(eval("true"), Value::Bool(true));
        assert_eq!(eval("-3"), Value::Int(-3));
        assert_eq!(eval("'it\\'s'"), "it's".to_value());
        assert_eq!(
            eval("1.25"),
            Value::Decimal(BigDecimal::from_str("1.25").unwrap())
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("id == 7"), Value::Bool(true));
        assert_eq!(eval("id != null"), Value::Bool(true));
        assert_eq!(eval("empty == null"), Value::Bool(true));
        assert_eq!(eval("price > 9"), Value::Bool(true));
        assert_eq!(eval("price <= 9.5"), Value::Bool(true));
        assert_eq!(eval("name == 'ann'"), Value::Bool(true));
        assert_eq!(eval("name < 'bob'"), Value::Bool(true));
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(eval("id > 1 and name != null"), Value::Bool(true));
        assert_eq!(eval("id > 100 || tags.size == 2"), Value::Bool(true));
        assert_eq!(eval("!(id == 7)"), Value::Bool(false));
        assert_eq!(eval("not empty"), Value::Bool(true));
    }

    #[test]
    fn test_errors() {
        assert!(eval_err("id +").message.contains("unexpected"));
        assert!(eval_err("name < 3").message.contains("cannot order"));
        assert!(eval_err("id.value").message.contains("no property"));
        assert!(eval_err("'open").message.contains("unterminated"));
        assert!(eval_err("(id").message.contains("expected"));
        assert!(eval_err("id id").message.contains("after end"));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nots = format!("{}true", "!".repeat(10_000));
        assert_eq!(eval_err(&nots).message, "expression nested too deeply");
        let parens = format!("{}id{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(eval_err(&parens).message, "expression nested too deeply");
        let brackets = format!("{}0{}", "tags[".repeat(10_000), "]".repeat(10_000));
        assert_eq!(eval_err(&brackets).message, "expression nested too deeply");
    }

    #[test]
    fn test_moderate_nesting_evaluates() {
        assert_eq!(eval(&format!("{}true", "!".repeat(100))), Value::Bool(true));
        assert_eq!(
            eval(&format!("{}id{}", "(".repeat(100), ")".repeat(100))),
            Value::Int(7)
        );
    }
}
