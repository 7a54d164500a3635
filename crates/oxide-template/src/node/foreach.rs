//! The `foreach` node and the context decorators it expands through.
//!
//! Each element of the collection is applied against a [`PrefixedContext`]
//! (which emits the separator before the element's first non-blank output)
//! wrapped in a [`FilteredContext`] (which renames `#{item}` and `#{index}`
//! references to per-iteration binding names). The per-iteration names are
//! derived from the expansion-wide counter, so nested and sibling loops never
//! collide.

use tracing::{debug, trace};

use super::SqlNode;
use crate::context::{Bindings, SqlContext};
use crate::error::Result;
use crate::eval::{Element, ExpressionEvaluator};
use crate::scanner::TokenScanner;
use crate::value::Value;

/// Prefix of every per-iteration binding name.
pub const ITEM_PREFIX: &str = "__frch_";

/// Returns the per-iteration binding name of `name` for iteration `n`.
pub(crate) fn itemize(name: &str, n: usize) -> String {
    format!("{ITEM_PREFIX}{name}_{n}")
}

/// Repeats its contents once per element of a collection.
///
/// # Example
///
/// ```
/// use oxide_template::{DynamicContext, ForEachNode, PathEvaluator, SqlContext, SqlNode};
/// use oxide_template::{StaticTextNode, ToValue};
///
/// let node = ForEachNode::new("ids", StaticTextNode::new("#{id}"))
///     .item("id")
///     .open("(")
///     .close(")")
///     .separator(",");
///
/// let engine = PathEvaluator::new();
/// let params = serde_json::json!({"ids": [7, 8]}).to_value();
/// let mut ctx = DynamicContext::new(params, &engine);
/// node.apply(&mut ctx).unwrap();
/// assert_eq!(ctx.sql(), "(#{__frch_id_0},#{__frch_id_1})");
/// ```
#[derive(Debug)]
pub struct ForEachNode {
    collection: String,
    contents: Box<dyn SqlNode>,
    item: Option<String>,
    index: Option<String>,
    open: Option<String>,
    close: Option<String>,
    separator: Option<String>,
}

impl ForEachNode {
    /// Creates a loop over the value of `collection`.
    #[must_use]
    pub fn new(collection: impl Into<String>, contents: impl SqlNode + 'static) -> Self {
        Self::boxed(collection, Box::new(contents))
    }

    /// Like [`new`](Self::new), for contents that are already boxed.
    #[must_use]
    pub fn boxed(collection: impl Into<String>, contents: Box<dyn SqlNode>) -> Self {
        Self {
            collection: collection.into(),
            contents,
            item: None,
            index: None,
            open: None,
            close: None,
            separator: None,
        }
    }

    /// Binds each element (or map value) under `name`.
    #[must_use]
    pub fn item(mut self, name: impl Into<String>) -> Self {
        self.item = Some(name.into());
        self
    }

    /// Binds each position (or map key) under `name`.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    /// Text emitted before the first element.
    #[must_use]
    pub fn open(mut self, text: impl Into<String>) -> Self {
        self.open = Some(text.into());
        self
    }

    /// Text emitted after the last element.
    #[must_use]
    pub fn close(mut self, text: impl Into<String>) -> Self {
        self.close = Some(text.into());
        self
    }

    /// Text emitted between elements.
    #[must_use]
    pub fn separator(mut self, text: impl Into<String>) -> Self {
        self.separator = Some(text.into());
        self
    }

    fn bind_pair(ctx: &mut dyn SqlContext, name: Option<&str>, value: Value, n: usize) {
        if let Some(name) = name {
            ctx.bind(&itemize(name, n), value.clone());
            ctx.bind(name, value);
        }
    }
}

impl SqlNode for ForEachNode {
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool> {
        let elements = ctx
            .evaluator()
            .evaluate_iterable(&self.collection, ctx.bindings())?;
        let count = elements.len();
        if count == 0 {
            debug!(collection = %self.collection, "empty collection, nothing to expand");
            return Ok(true);
        }
        debug!(collection = %self.collection, count, "expanding foreach");

        if let Some(open) = &self.open {
            ctx.append_sql(open);
        }

        let mut first = true;
        for (i, element) in elements.enumerate() {
            let prefix = match &self.separator {
                Some(separator) if !first => separator.as_str(),
                _ => "",
            };
            let mut prefixed = PrefixedContext::new(&mut *ctx, prefix);
            let n = prefixed.unique_number();
            let (index, item) = match element {
                Element::Item(value) => (Value::from(i), value),
                Element::Entry { key, value } => (key, value),
            };
            trace!(n, %index, %item, "foreach element");
            Self::bind_pair(&mut prefixed, self.index.as_deref(), index, n);
            Self::bind_pair(&mut prefixed, self.item.as_deref(), item, n);

            let mut filtered =
                FilteredContext::new(&mut prefixed, self.item.as_deref(), self.index.as_deref(), n);
            self.contents.apply(&mut filtered)?;

            if first {
                first = !prefixed.is_prefix_applied();
            }
        }

        if let Some(close) = &self.close {
            ctx.append_sql(close);
        }
        if let Some(item) = &self.item {
            ctx.unbind(item);
        }
        if let Some(index) = &self.index {
            ctx.unbind(index);
        }
        Ok(true)
    }
}

fn is_blank(sql: &str) -> bool {
    sql.bytes().all(|b| b <= b' ')
}

/// Emits a prefix in front of the first non-blank fragment appended through
/// it.
pub struct PrefixedContext<'a> {
    delegate: &'a mut dyn SqlContext,
    prefix: &'a str,
    prefix_applied: bool,
}

impl<'a> PrefixedContext<'a> {
    /// Wraps `delegate`.
    #[must_use]
    pub fn new(delegate: &'a mut dyn SqlContext, prefix: &'a str) -> Self {
        Self {
            delegate,
            prefix,
            prefix_applied: false,
        }
    }

    /// Returns true once a non-blank fragment has passed through.
    #[must_use]
    pub const fn is_prefix_applied(&self) -> bool {
        self.prefix_applied
    }
}

impl SqlContext for PrefixedContext<'_> {
    fn bindings(&self) -> &Bindings {
        self.delegate.bindings()
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.delegate.bind(name, value);
    }

    fn unbind(&mut self, name: &str) -> Option<Value> {
        self.delegate.unbind(name)
    }

    fn append_sql(&mut self, sql: &str) {
        if !self.prefix_applied && !is_blank(sql) {
            self.delegate.append_sql(self.prefix);
            self.prefix_applied = true;
        }
        self.delegate.append_sql(sql);
    }

    fn sql(&self) -> &str {
        self.delegate.sql()
    }

    fn unique_number(&mut self) -> usize {
        self.delegate.unique_number()
    }

    fn evaluator(&self) -> ExpressionEvaluator<'_> {
        self.delegate.evaluator()
    }
}

impl std::fmt::Debug for PrefixedContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixedContext")
            .field("prefix", &self.prefix)
            .field("prefix_applied", &self.prefix_applied)
            .finish_non_exhaustive()
    }
}

/// Renames loop variable references inside `#{}` placeholders.
///
/// A placeholder whose content starts with the item name (or, failing that,
/// the index name) followed by the end of the content, `.`, `,`, `:` or
/// whitespace is rewritten to reference the per-iteration binding instead.
pub struct FilteredContext<'a> {
    delegate: &'a mut dyn SqlContext,
    item: Option<&'a str>,
    index: Option<&'a str>,
    n: usize,
}

impl<'a> FilteredContext<'a> {
    /// Wraps `delegate` for iteration `n`.
    #[must_use]
    pub fn new(
        delegate: &'a mut dyn SqlContext,
        item: Option<&'a str>,
        index: Option<&'a str>,
        n: usize,
    ) -> Self {
        Self {
            delegate,
            item,
            index,
            n,
        }
    }

    fn rewrite(&self, content: &str) -> String {
        for name in [self.item, self.index].into_iter().flatten() {
            if let Some(rest) = strip_reference(content, name) {
                return format!("{}{rest}", itemize(name, self.n));
            }
        }
        content.to_string()
    }
}

/// Strips a leading reference to `name`, returning what follows it.
fn strip_reference<'c>(content: &'c str, name: &str) -> Option<&'c str> {
    let rest = content.trim_start().strip_prefix(name)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if matches!(c, '.' | ',' | ':') || c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

impl SqlContext for FilteredContext<'_> {
    fn bindings(&self) -> &Bindings {
        self.delegate.bindings()
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.delegate.bind(name, value);
    }

    fn unbind(&mut self, name: &str) -> Option<Value> {
        self.delegate.unbind(name)
    }

    fn append_sql(&mut self, sql: &str) {
        let rewritten =
            TokenScanner::new("#{", "}").scan(sql, |content| format!("#{{{}}}", self.rewrite(content)));
        self.delegate.append_sql(&rewritten);
    }

    fn sql(&self) -> &str {
        self.delegate.sql()
    }

    fn unique_number(&mut self) -> usize {
        self.delegate.unique_number()
    }

    fn evaluator(&self) -> ExpressionEvaluator<'_> {
        self.delegate.evaluator()
    }
}

impl std::fmt::Debug for FilteredContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredContext")
            .field("item", &self.item)
            .field("index", &self.index)
            .field("n", &self.n)
            .finish_non_exhaustive()
    }
}
