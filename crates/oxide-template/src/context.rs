//! Binding context for one template expansion.
//!
//! A [`SqlContext`] is where template nodes write their SQL and where they
//! read and publish bindings. The root is a [`DynamicContext`]; the for-each
//! engine wraps it in decorators that rewrite or prefix what passes through
//! them while sharing the root's binding table, buffer and counter.

use std::collections::HashMap;

use tracing::trace;

use crate::eval::{Evaluate, ExpressionEvaluator, Scope};
use crate::value::Value;

/// Binding name under which the parameter object is published.
pub const PARAMETER_OBJECT_KEY: &str = "_parameter";
/// Binding name under which the database id is published.
pub const DATABASE_ID_KEY: &str = "_databaseId";

/// The binding table of one expansion.
///
/// Lookups that miss the table fall back to the parameter object's
/// properties when the parameter is a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    table: HashMap<String, Value>,
    parameter: Value,
}

impl Bindings {
    /// Creates a binding table around a parameter object.
    #[must_use]
    pub fn new(parameter: Value) -> Self {
        Self {
            table: HashMap::new(),
            parameter,
        }
    }

    /// Returns the parameter object.
    #[must_use]
    pub const fn parameter(&self) -> &Value {
        &self.parameter
    }

    /// Returns an explicit binding, without falling back to the parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == PARAMETER_OBJECT_KEY {
            return Some(&self.parameter);
        }
        self.table.get(name)
    }

    /// Returns true if `name` is explicitly bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        name == PARAMETER_OBJECT_KEY || self.table.contains_key(name)
    }

    /// Binds `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.table.insert(name.into(), value);
    }

    /// Removes an explicit binding.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.table.remove(name)
    }

    /// Iterates over the explicit bindings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of explicit bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if nothing is explicitly bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Scope for Bindings {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| self.parameter.get(name))
    }
}

/// The interface template nodes apply themselves against.
pub trait SqlContext {
    /// Returns the binding table.
    fn bindings(&self) -> &Bindings;

    /// Binds `name` to `value`.
    fn bind(&mut self, name: &str, value: Value);

    /// Removes the binding for `name`.
    fn unbind(&mut self, name: &str) -> Option<Value>;

    /// Appends a SQL fragment.
    fn append_sql(&mut self, sql: &str);

    /// Returns the SQL accumulated so far.
    fn sql(&self) -> &str;

    /// Returns the next number of the expansion-wide counter.
    ///
    /// Every call through any decorator of the same root returns a distinct,
    /// increasing number.
    fn unique_number(&mut self) -> usize;

    /// Returns an evaluator over the expansion's expression capability.
    fn evaluator(&self) -> ExpressionEvaluator<'_>;
}

/// The root context of one expansion.
///
/// # Example
///
/// ```
/// use oxide_template::{DynamicContext, PathEvaluator, SqlContext, Value};
///
/// let engine = PathEvaluator::new();
/// let mut ctx = DynamicContext::new(Value::Int(3), &engine);
/// ctx.append_sql("SELECT * FROM t WHERE id = #{id}");
/// assert_eq!(ctx.unique_number(), 0);
/// assert_eq!(ctx.unique_number(), 1);
/// assert_eq!(ctx.bindings().get("_parameter"), Some(&Value::Int(3)));
/// ```
pub struct DynamicContext<'e> {
    bindings: Bindings,
    sql: String,
    unique_number: usize,
    engine: &'e dyn Evaluate,
}

impl<'e> DynamicContext<'e> {
    /// Creates a root context for `parameter`.
    #[must_use]
    pub fn new(parameter: Value, engine: &'e dyn Evaluate) -> Self {
        Self {
            bindings: Bindings::new(parameter),
            sql: String::new(),
            unique_number: 0,
            engine,
        }
    }

    /// Publishes a database id under [`DATABASE_ID_KEY`].
    #[must_use]
    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.bindings
            .insert(DATABASE_ID_KEY, Value::Text(database_id.into()));
        self
    }

    /// Consumes the context, returning the SQL text and the bindings.
    #[must_use]
    pub fn into_parts(self) -> (String, Bindings) {
        (self.sql, self.bindings)
    }
}

impl SqlContext for DynamicContext<'_> {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bind(&mut self, name: &str, value: Value) {
        trace!(name, %value, "bind");
        self.bindings.insert(name, value);
    }

    fn unbind(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    fn append_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn unique_number(&mut self) -> usize {
        let n = self.unique_number;
        self.unique_number += 1;
        n
    }

    fn evaluator(&self) -> ExpressionEvaluator<'_> {
        ExpressionEvaluator::new(self.engine)
    }
}

impl std::fmt::Debug for DynamicContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicContext")
            .field("bindings", &self.bindings)
            .field("sql", &self.sql)
            .field("unique_number", &self.unique_number)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::PathEvaluator;
    use crate::value::ToValue;

    #[test]
    fn test_parameter_is_published() {
        let engine = PathEvaluator::new();
        let ctx = DynamicContext::new(Value::Int(1), &engine).with_database_id("sqlite");
        assert_eq!(ctx.bindings().get(PARAMETER_OBJECT_KEY), Some(&Value::Int(1)));
        assert_eq!(
            ctx.bindings().get(DATABASE_ID_KEY),
            Some(&"sqlite".to_value())
        );
    }

    #[test]
    fn test_lookup_falls_back_to_parameter_properties() {
        let mut bindings = Bindings::new(serde_json::json!({"a": 1, "b": 2}).to_value());
        bindings.insert("a", Value::Int(10));
        assert_eq!(bindings.lookup("a"), Some(&Value::Int(10)));
        assert_eq!(bindings.lookup("b"), Some(&Value::Int(2)));
        assert_eq!(bindings.get("b"), None);
        assert_eq!(bindings.lookup("c"), None);
    }

    #[test]
    fn test_append_and_unique_numbers() {
        let engine = PathEvaluator::new();
        let mut ctx = DynamicContext::new(Value::Null, &engine);
        ctx.append_sql("SELECT ");
        ctx.append_sql("1");
        assert_eq!(ctx.sql(), "SELECT 1");
        let numbers: Vec<usize> = (0..3).map(|_| ctx.unique_number()).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn test_bind_and_unbind() {
        let engine = PathEvaluator::new();
        let mut ctx = DynamicContext::new(Value::Null, &engine);
        ctx.bind("x", Value::Int(1));
        ctx.bind("x", Value::Int(2));
        assert_eq!(ctx.bindings().get("x"), Some(&Value::Int(2)));
        assert_eq!(ctx.unbind("x"), Some(Value::Int(2)));
        assert!(!ctx.bindings().contains("x"));
        let (sql, bindings) = ctx.into_parts();
        assert!(sql.is_empty());
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_evaluator_sees_bindings() {
        let engine = PathEvaluator::new();
        let mut ctx = DynamicContext::new(serde_json::json!({"n": 0}).to_value(), &engine);
        ctx.bind("flag", Value::Bool(true));
        assert!(ctx.evaluator().evaluate_boolean("flag", ctx.bindings()).unwrap());
        assert!(!ctx.evaluator().evaluate_boolean("n", ctx.bindings()).unwrap());
    }
}
