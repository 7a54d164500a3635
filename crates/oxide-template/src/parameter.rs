//! Inline parameter parsing.
//!
//! The content of a `#{...}` placeholder describes one bound parameter:
//!
//! ```text
//! input = (property | '(' expression ')') (':' jdbcType)? (',' name '=' value)*
//! ```
//!
//! For example `id:VARCHAR`, `user.name,javaType=string` or
//! `(price * 2):NUMERIC,numericScale=2`.

use std::str::FromStr;

use crate::error::{Result, TemplateError};

/// Key holding a property path.
pub const PROPERTY: &str = "property";
/// Key holding a parenthesized expression.
pub const EXPRESSION: &str = "expression";
/// Key holding the legacy `:TYPE` tag.
pub const JDBC_TYPE: &str = "jdbcType";

/// The parsed content of one placeholder.
///
/// Holds either a [`PROPERTY`] or an [`EXPRESSION`] entry, an optional
/// [`JDBC_TYPE`] entry, then any attributes in the order they appeared.
/// Keys and values are trimmed.
///
/// # Example
///
/// ```
/// use oxide_template::ParameterExpression;
///
/// let param = ParameterExpression::parse("(x+1):NUMERIC,foo=bar").unwrap();
/// assert_eq!(param.expression(), Some("x+1"));
/// assert_eq!(param.jdbc_type(), Some("NUMERIC"));
/// assert_eq!(param.get("foo"), Some("bar"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterExpression {
    entries: Vec<(String, String)>,
}

impl ParameterExpression {
    /// Parses placeholder content.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MalformedExpression`] when the text does not
    /// follow the inline parameter grammar.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = Parser {
            text,
            bytes: text.as_bytes(),
            entries: Vec::new(),
        };
        parser.parse()?;
        Ok(Self {
            entries: parser.entries,
        })
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the property path, if the placeholder names one.
    #[must_use]
    pub fn property(&self) -> Option<&str> {
        self.get(PROPERTY)
    }

    /// Returns the parenthesized expression, if the placeholder holds one.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        self.get(EXPRESSION)
    }

    /// Returns the `:TYPE` tag.
    #[must_use]
    pub fn jdbc_type(&self) -> Option<&str> {
        self.get(JDBC_TYPE)
    }

    /// Iterates over all entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for ParameterExpression {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    entries: Vec<(String, String)>,
}

impl Parser<'_> {
    fn parse(&mut self) -> Result<()> {
        let p = self.skip_ws(0);
        if p >= self.bytes.len() {
            return Err(self.error(p));
        }
        if self.bytes[p] == b'(' {
            self.expression(p + 1)
        } else {
            self.property(p)
        }
    }

    fn expression(&mut self, left: usize) -> Result<()> {
        let mut depth = 1_usize;
        let mut right = left;
        while depth > 0 {
            match self.bytes.get(right) {
                Some(b')') => depth -= 1,
                Some(b'(') => depth += 1,
                Some(_) => {}
                None => return Err(self.error(left - 1)),
            }
            right += 1;
        }
        let expression = self.text[left..right - 1].to_string();
        self.put(EXPRESSION, expression);
        self.jdbc_type_opt(right)
    }

    fn property(&mut self, left: usize) -> Result<()> {
        let right = self.skip_until(left, b",:");
        let property = self.trimmed(left, right);
        self.put(PROPERTY, property);
        self.jdbc_type_opt(right)
    }

    fn jdbc_type_opt(&mut self, p: usize) -> Result<()> {
        let p = self.skip_ws(p);
        match self.bytes.get(p) {
            None => Ok(()),
            Some(b':') => self.jdbc_type(p + 1),
            Some(b',') => self.options(p + 1),
            Some(_) => Err(self.error(p)),
        }
    }

    fn jdbc_type(&mut self, p: usize) -> Result<()> {
        let left = self.skip_ws(p);
        let right = self.skip_until(left, b",");
        if right <= left {
            return Err(self.error(p));
        }
        let jdbc_type = self.trimmed(left, right);
        self.put(JDBC_TYPE, jdbc_type);
        self.options(right + 1)
    }

    fn options(&mut self, mut p: usize) -> Result<()> {
        loop {
            let left = self.skip_ws(p);
            if left >= self.bytes.len() {
                return Ok(());
            }
            let eq = self.skip_until(left, b"=");
            if eq >= self.bytes.len() {
                return Err(self.error(eq));
            }
            let name = self.trimmed(left, eq);
            let right = self.skip_until(eq + 1, b",");
            let value = self.trimmed(eq + 1, right);
            self.put(&name, value);
            p = right + 1;
        }
    }

    fn put(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Index of the first byte above 0x20 at or after `p`.
    fn skip_ws(&self, p: usize) -> usize {
        (p..self.bytes.len())
            .find(|&i| self.bytes[i] > 0x20)
            .unwrap_or(self.bytes.len())
    }

    /// Index of the first byte from `stops` at or after `p`.
    fn skip_until(&self, p: usize, stops: &[u8]) -> usize {
        (p..self.bytes.len())
            .find(|&i| stops.contains(&self.bytes[i]))
            .unwrap_or(self.bytes.len())
    }

    fn trimmed(&self, mut start: usize, end: usize) -> String {
        let mut end = end.min(self.bytes.len());
        while start < end && self.bytes[start] <= 0x20 {
            start += 1;
        }
        while end > start && self.bytes[end - 1] <= 0x20 {
            end -= 1;
        }
        self.text[start..end].to_string()
    }

    fn error(&self, position: usize) -> TemplateError {
        TemplateError::MalformedExpression {
            expression: self.text.to_string(),
            position,
        }
    }
}
