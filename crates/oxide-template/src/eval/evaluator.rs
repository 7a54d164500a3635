//! Boolean and iterable readings of evaluated expressions.

use std::collections::btree_map;
use std::vec;

use tracing::trace;

use super::{truthy, Evaluate, Scope};
use crate::error::{Result, TemplateError};
use crate::value::Value;

/// One element produced by iterating a collection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// An element of a list or array.
    Item(Value),
    /// A key/value pair of a map.
    Entry { key: Value, value: Value },
}

/// The elements of an evaluated collection, in order.
#[derive(Debug)]
pub enum Iterable {
    /// Elements of a list or array.
    Items(vec::IntoIter<Value>),
    /// Entries of a map.
    Entries(btree_map::IntoIter<String, Value>),
}

impl Iterator for Iterable {
    type Item = Element;

    fn next(&mut self) -> Option<Element> {
        match self {
            Self::Items(items) => items.next().map(Element::Item),
            Self::Entries(entries) => entries.next().map(|(key, value)| Element::Entry {
                key: Value::Text(key),
                value,
            }),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Items(items) => items.size_hint(),
            Self::Entries(entries) => entries.size_hint(),
        }
    }
}

impl ExactSizeIterator for Iterable {}

/// Evaluates expressions through an [`Evaluate`] capability and coerces the
/// result.
#[derive(Clone, Copy)]
pub struct ExpressionEvaluator<'a> {
    engine: &'a dyn Evaluate,
}

impl<'a> ExpressionEvaluator<'a> {
    /// Wraps an expression capability.
    #[must_use]
    pub const fn new(engine: &'a dyn Evaluate) -> Self {
        Self { engine }
    }

    /// Evaluates an expression without coercion.
    ///
    /// # Errors
    ///
    /// Propagates the capability's [`EvaluationError`](crate::EvaluationError).
    pub fn evaluate(&self, expression: &str, scope: &dyn Scope) -> Result<Value> {
        Ok(self.engine.evaluate(expression, scope)?)
    }

    /// Evaluates an expression as a condition.
    ///
    /// Booleans are returned as-is, numbers are true unless exactly zero,
    /// anything else is true unless null.
    ///
    /// # Errors
    ///
    /// Propagates the capability's [`EvaluationError`](crate::EvaluationError).
    pub fn evaluate_boolean(&self, expression: &str, scope: &dyn Scope) -> Result<bool> {
        let value = self.evaluate(expression, scope)?;
        let result = truthy(&value);
        trace!(expression, %value, result, "evaluated condition");
        Ok(result)
    }

    /// Evaluates an expression as a collection.
    ///
    /// Lists and arrays yield their elements, maps yield their entries.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NullIterable`] when the expression evaluates
    /// to null and [`TemplateError::NotIterable`] for scalar results.
    pub fn evaluate_iterable(&self, expression: &str, scope: &dyn Scope) -> Result<Iterable> {
        match self.evaluate(expression, scope)? {
            Value::Null => Err(TemplateError::NullIterable {
                expression: expression.to_string(),
            }),
            Value::List(items) | Value::Array(items) => Ok(Iterable::Items(items.into_iter())),
            Value::Map(entries) => Ok(Iterable::Entries(entries.into_iter())),
            other => Err(TemplateError::NotIterable {
                expression: expression.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for ExpressionEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEvaluator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::PathEvaluator;
    use crate::value::ToValue;
    use std::collections::BTreeMap;

    fn scope() -> Value {
        serde_json::json!({
            "ids": [1, 2, 3],
            "empty": [],
            "none": null,
            "name": "x",
            "flag": false,
            "zero": 0,
            "ratio": 0.5,
            "attrs": {"b": 2, "a": 1},
            "no_attrs": {}
        })
        .to_value()
    }

    #[test]
    fn test_evaluate_boolean() {
        let engine = PathEvaluator::new();
        let evaluator = ExpressionEvaluator::new(&engine);
        let scope = scope();
        assert!(!evaluator.evaluate_boolean("flag", &scope).unwrap());
        assert!(!evaluator.evaluate_boolean("zero", &scope).unwrap());
        assert!(evaluator.evaluate_boolean("ratio", &scope).unwrap());
        assert!(evaluator.evaluate_boolean("name", &scope).unwrap());
        assert!(!evaluator.evaluate_boolean("none", &scope).unwrap());
        assert!(!evaluator.evaluate_boolean("missing", &scope).unwrap());
    }

    #[test]
    fn test_evaluate_iterable_list() {
        let engine = PathEvaluator::new();
        let evaluator = ExpressionEvaluator::new(&engine);
        let items: Vec<Element> = evaluator.evaluate_iterable("ids", &scope()).unwrap().collect();
        assert_eq!(
            items,
            vec![
                Element::Item(Value::Int(1)),
                Element::Item(Value::Int(2)),
                Element::Item(Value::Int(3)),
            ]
        );
    }

    #[test]
    fn test_evaluate_iterable_array() {
        let engine = |_: &str, _: &dyn Scope| -> std::result::Result<Value, crate::EvaluationError> {
            Ok([true, false].to_value())
        };
        let evaluator = ExpressionEvaluator::new(&engine);
        let iterable = evaluator.evaluate_iterable("flags", &Value::Null).unwrap();
        assert_eq!(iterable.len(), 2);
    }

    #[test]
    fn test_evaluate_iterable_empty_array() {
        let engine = |_: &str, _: &dyn Scope| -> std::result::Result<Value, crate::EvaluationError> {
            Ok(Value::Array(vec![]))
        };
        let evaluator = ExpressionEvaluator::new(&engine);
        let iterable = evaluator.evaluate_iterable("flags", &Value::Null).unwrap();
        assert_eq!(iterable.len(), 0);
        assert_eq!(iterable.count(), 0);
    }

    #[test]
    fn test_evaluate_iterable_map_yields_entries() {
        let engine = PathEvaluator::new();
        let evaluator = ExpressionEvaluator::new(&engine);
        let entries: Vec<Element> = evaluator.evaluate_iterable("attrs", &scope()).unwrap().collect();
        assert_eq!(
            entries,
            vec![
                Element::Entry {
                    key: Value::Text(String::from("a")),
                    value: Value::Int(1)
                },
                Element::Entry {
                    key: Value::Text(String::from("b")),
                    value: Value::Int(2)
                },
            ]
        );
    }

    #[test]
    fn test_evaluate_iterable_empty() {
        let engine = PathEvaluator::new();
        let evaluator = ExpressionEvaluator::new(&engine);
        assert_eq!(evaluator.evaluate_iterable("empty", &scope()).unwrap().len(), 0);
        assert_eq!(evaluator.evaluate_iterable("no_attrs", &scope()).unwrap().len(), 0);
        let empty_map = Value::Map(BTreeMap::new());
        assert_eq!(
            evaluator
                .evaluate_iterable("m", &Value::Map(BTreeMap::from([(String::from("m"), empty_map)])))
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_evaluate_iterable_null() {
        let engine = PathEvaluator::new();
        let evaluator = ExpressionEvaluator::new(&engine);
        let err = evaluator.evaluate_iterable("none", &scope()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::NullIterable {
                expression: String::from("none")
            }
        );
    }

    #[test]
    fn test_evaluate_iterable_scalar() {
        let engine = PathEvaluator::new();
        let evaluator = ExpressionEvaluator::new(&engine);
        let err = evaluator.evaluate_iterable("name", &scope()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error evaluating expression 'name': return value (x) was not iterable"
        );
    }
}
