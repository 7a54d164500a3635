//! Delimited token scanning.
//!
//! [`TokenScanner`] finds spans bounded by an open and a close marker, such as
//! `#{id}` or `${column}`, and replaces each span with whatever a caller
//! supplied handler returns for its content. A backslash directly before a
//! marker makes it literal.

use std::convert::Infallible;

const ESCAPE: u8 = b'\\';

/// Scans text for `open ... close` spans.
///
/// # Example
///
/// ```
/// use oxide_template::TokenScanner;
///
/// let scanner = TokenScanner::new("#{", "}");
/// let sql = scanner.scan("id = #{id} and name = \\#{raw}", |_| String::from("?"));
/// assert_eq!(sql, "id = ? and name = #{raw}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenScanner {
    open: String,
    close: String,
}

impl TokenScanner {
    /// Creates a scanner for the given delimiter pair.
    #[must_use]
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Returns the open marker.
    #[must_use]
    pub fn open(&self) -> &str {
        &self.open
    }

    /// Returns the close marker.
    #[must_use]
    pub fn close(&self) -> &str {
        &self.close
    }

    /// Replaces every delimited span with the handler's output.
    ///
    /// The handler sees the span content with escaped close markers already
    /// unescaped. It is called once per span, left to right.
    pub fn scan<F>(&self, text: &str, mut handler: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        match self.try_scan(text, |content| Ok::<_, Infallible>(handler(content))) {
            Ok(out) => out,
            Err(never) => match never {},
        }
    }

    /// Like [`scan`](Self::scan), but stops at the first handler error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `handler`.
    pub fn try_scan<F, E>(&self, text: &str, mut handler: F) -> Result<String, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        if text.is_empty() || self.open.is_empty() || self.close.is_empty() {
            return Ok(text.to_string());
        }
        let Some(mut start) = text.find(self.open.as_str()) else {
            return Ok(text.to_string());
        };

        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut expression = String::new();
        let mut offset = 0;

        loop {
            if start > 0 && bytes[start - 1] == ESCAPE {
                // Escaped open marker: drop the backslash, keep the marker.
                out.push_str(&text[offset..start - 1]);
                out.push_str(&self.open);
                offset = start + self.open.len();
            } else {
                expression.clear();
                out.push_str(&text[offset..start]);
                offset = start + self.open.len();

                let mut end = find_from(text, &self.close, offset);
                while let Some(at) = end {
                    if at > offset && bytes[at - 1] == ESCAPE {
                        expression.push_str(&text[offset..at - 1]);
                        expression.push_str(&self.close);
                        offset = at + self.close.len();
                        end = find_from(text, &self.close, offset);
                    } else {
                        expression.push_str(&text[offset..at]);
                        break;
                    }
                }

                match end {
                    None => {
                        // Dangling open marker: the rest is plain text.
                        out.push_str(&text[start..]);
                        offset = text.len();
                    }
                    Some(at) => {
                        out.push_str(&handler(&expression)?);
                        offset = at + self.close.len();
                    }
                }
            }

            match find_from(text, &self.open, offset) {
                Some(next) => start = next,
                None => break,
            }
        }

        if offset < text.len() {
            out.push_str(&text[offset..]);
        }
        Ok(out)
    }
}

fn find_from(text: &str, pattern: &str, from: usize) -> Option<usize> {
    text.get(from..)?.find(pattern).map(|i| i + from)
}
