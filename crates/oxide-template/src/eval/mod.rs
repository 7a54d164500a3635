//! Expression evaluation.
//!
//! Templates never interpret expressions themselves. They go through an
//! [`Evaluate`] capability, which receives the expression text and a
//! [`Scope`] to resolve names against. [`PathEvaluator`] is the built-in
//! capability; callers may plug in their own, including plain closures.

mod evaluator;
mod path;

use std::collections::HashMap;

use crate::error::EvaluationError;
use crate::value::Value;

pub use evaluator::{Element, ExpressionEvaluator, Iterable};
pub use path::PathEvaluator;

/// Something names can be resolved against.
pub trait Scope {
    /// Returns the value bound to `name`.
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Scope for Value {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Scope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// The expression capability templates are evaluated with.
pub trait Evaluate {
    /// Evaluates `expression` against `scope`.
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluationError`] for anything the implementation cannot
    /// evaluate.
    fn evaluate(&self, expression: &str, scope: &dyn Scope) -> Result<Value, EvaluationError>;
}

impl<F> Evaluate for F
where
    F: Fn(&str, &dyn Scope) -> Result<Value, EvaluationError>,
{
    fn evaluate(&self, expression: &str, scope: &dyn Scope) -> Result<Value, EvaluationError> {
        self(expression, scope)
    }
}

/// Boolean reading of a value: booleans as-is, numbers when not exactly
/// zero, anything else when not null.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(_) | Value::Decimal(_) => value
            .to_decimal()
            .is_none_or(|d| d != bigdecimal::BigDecimal::from(0)),
        other => !other.is_null(),
    }
}
