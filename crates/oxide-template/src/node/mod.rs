//! Template nodes.
//!
//! A template is a tree of [`SqlNode`]s. Applying the root against a
//! [`SqlContext`] walks the tree once, appending SQL and publishing
//! bindings as it goes.

mod def;
mod foreach;

use std::fmt;

use regex::Regex;

use crate::context::SqlContext;
use crate::error::{Result, TemplateError};
use crate::scanner::TokenScanner;

pub use def::NodeDef;
pub use foreach::{FilteredContext, ForEachNode, PrefixedContext, ITEM_PREFIX};

/// A fragment of a template.
pub trait SqlNode: fmt::Debug {
    /// Applies this fragment against `ctx`.
    ///
    /// Returns whether the fragment took part in the output; an `if` whose
    /// test failed returns `false`.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole expansion.
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool>;
}

/// Literal SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTextNode {
    text: String,
}

impl StaticTextNode {
    /// Creates a node appending `text` verbatim.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl SqlNode for StaticTextNode {
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool> {
        ctx.append_sql(&self.text);
        Ok(true)
    }
}

/// SQL text with `${expression}` substitutions.
///
/// Substituted values are spliced into the SQL as text, not bound as
/// parameters. An injection filter, when set, must match every substituted
/// value.
#[derive(Debug, Clone)]
pub struct TextNode {
    text: String,
    injection_filter: Option<Regex>,
}

impl TextNode {
    /// Creates a node substituting `${}` spans in `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            injection_filter: None,
        }
    }

    /// Requires every substituted value to match `filter`.
    #[must_use]
    pub fn injection_filter(mut self, filter: Regex) -> Self {
        self.injection_filter = Some(filter);
        self
    }

    /// Returns true if `text` contains at least one `${}` span.
    #[must_use]
    pub fn is_dynamic(text: &str) -> bool {
        let mut dynamic = false;
        substitutions().scan(text, |_| {
            dynamic = true;
            String::new()
        });
        dynamic
    }
}

fn substitutions() -> TokenScanner {
    TokenScanner::new("${", "}")
}

impl SqlNode for TextNode {
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool> {
        let parameter = ctx.bindings().parameter().clone();
        if parameter.is_scalar() {
            ctx.bind("value", parameter);
        }

        let sql = {
            let evaluator = ctx.evaluator();
            let bindings = ctx.bindings();
            substitutions().try_scan(&self.text, |content| {
                let value = evaluator.evaluate(content, bindings)?;
                let text = value.to_text();
                if let Some(filter) = &self.injection_filter {
                    if !filter.is_match(&text) {
                        return Err(TemplateError::UnsafeSubstitution {
                            expression: content.to_string(),
                            value: text,
                        });
                    }
                }
                Ok(text)
            })?
        };
        ctx.append_sql(&sql);
        Ok(true)
    }
}

/// A sequence of nodes applied in order.
#[derive(Debug, Default)]
pub struct MixedNode {
    children: Vec<Box<dyn SqlNode>>,
}

impl MixedNode {
    /// Creates a node from its children.
    #[must_use]
    pub fn new(children: Vec<Box<dyn SqlNode>>) -> Self {
        Self { children }
    }

    /// Appends a child.
    #[must_use]
    pub fn push(mut self, child: impl SqlNode + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }
}

impl SqlNode for MixedNode {
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool> {
        for child in &self.children {
            child.apply(ctx)?;
        }
        Ok(true)
    }
}

/// Applies its contents only when the test expression holds.
#[derive(Debug)]
pub struct IfNode {
    test: String,
    contents: Box<dyn SqlNode>,
}

impl IfNode {
    /// Creates a conditional node.
    #[must_use]
    pub fn new(test: impl Into<String>, contents: impl SqlNode + 'static) -> Self {
        Self {
            test: test.into(),
            contents: Box::new(contents),
        }
    }
}

impl SqlNode for IfNode {
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool> {
        if ctx.evaluator().evaluate_boolean(&self.test, ctx.bindings())? {
            self.contents.apply(ctx)?;
            return Ok(true);
        }
        Ok(false)
    }
}
