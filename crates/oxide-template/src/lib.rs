//! # oxide-template
//!
//! Dynamic SQL templates with bound parameters.
//!
//! This crate provides:
//! - A token scanner for delimited spans such as `#{...}` and `${...}`
//! - A parser for inline parameter descriptions (`#{price:NUMERIC,numericScale=2}`)
//! - A small path expression evaluator behind a pluggable capability trait
//! - Template nodes (`text`, `if`, `foreach`) applied against a binding context
//! - A builder turning expanded SQL into `?` placeholders plus bound values
//!
//! ## Expanding a template
//!
//! ```rust
//! use oxide_template::{DynamicSqlSource, ForEachNode, IfNode, MixedNode, PathEvaluator};
//! use oxide_template::{StaticTextNode, ToValue, Value};
//!
//! let root = MixedNode::default()
//!     .push(StaticTextNode::new("SELECT * FROM users WHERE active = #{active}"))
//!     .push(IfNode::new(
//!         "ids != null",
//!         ForEachNode::new("ids", StaticTextNode::new("#{id}"))
//!             .item("id")
//!             .open(" AND id IN (")
//!             .close(")")
//!             .separator(", "),
//!     ));
//!
//! let params = serde_json::json!({"active": true, "ids": [1, 2]}).to_value();
//! let bound = DynamicSqlSource::new(root)
//!     .bound_sql(params, &PathEvaluator::new())
//!     .unwrap();
//!
//! assert_eq!(bound.sql, "SELECT * FROM users WHERE active = ? AND id IN (?, ?)");
//! assert_eq!(bound.parameters, vec![Value::Bool(true), Value::Int(1), Value::Int(2)]);
//! ```
//!
//! ## String substitution
//!
//! `${...}` spans are spliced into the SQL as text rather than bound. Give
//! the node an injection filter when the substituted value comes from
//! outside:
//!
//! ```rust
//! use oxide_template::{DynamicContext, PathEvaluator, SqlContext, SqlNode, TextNode, Value};
//! use regex::Regex;
//!
//! let node = TextNode::new("ORDER BY ${value}").injection_filter(Regex::new(r"^\w+$").unwrap());
//! let engine = PathEvaluator::new();
//!
//! let mut ctx = DynamicContext::new(Value::from("name"), &engine);
//! node.apply(&mut ctx).unwrap();
//! assert_eq!(ctx.sql(), "ORDER BY name");
//!
//! let mut ctx = DynamicContext::new(Value::from("name; DROP TABLE users"), &engine);
//! assert!(node.apply(&mut ctx).is_err());
//! ```

pub mod context;
pub mod error;
pub mod eval;
pub mod node;
pub mod parameter;
pub mod scanner;
pub mod schema;
pub mod source;
pub mod value;

pub use context::{Bindings, DynamicContext, SqlContext};
pub use error::{EvaluationError, Result, TemplateError};
pub use eval::{Evaluate, ExpressionEvaluator, PathEvaluator, Scope};
pub use node::{
    FilteredContext, ForEachNode, IfNode, MixedNode, NodeDef, PrefixedContext, SqlNode,
    StaticTextNode, TextNode,
};
pub use parameter::ParameterExpression;
pub use scanner::TokenScanner;
pub use source::{BoundSql, DynamicSqlSource, ParameterMapping, ParameterMode, SqlSourceBuilder};
pub use value::{ToValue, Value};
