//! Error types for template expansion.

use thiserror::Error;

/// An opaque failure reported by an [`Evaluate`](crate::eval::Evaluate) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to evaluate '{expression}': {message}")]
pub struct EvaluationError {
    /// The expression being evaluated.
    pub expression: String,
    /// What went wrong.
    pub message: String,
}

impl EvaluationError {
    /// Creates a new evaluation error.
    #[must_use]
    pub fn new(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while parsing or expanding a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The inline parameter grammar was violated.
    #[error("parsing error in {{{expression}}} in position {position}")]
    MalformedExpression {
        /// The inline parameter text.
        expression: String,
        /// Byte offset of the offending character.
        position: usize,
    },

    /// A collection expression evaluated to null.
    #[error("the expression '{expression}' evaluated to a null value")]
    NullIterable { expression: String },

    /// A collection expression evaluated to something that cannot be iterated.
    #[error("error evaluating expression '{expression}': return value ({value}) was not iterable")]
    NotIterable { expression: String, value: String },

    /// The expression capability failed.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// A placeholder carried an attribute the mapping builder does not know.
    #[error("an invalid property '{attribute}' was found in mapping #{{{content}}}; valid properties are {valid}")]
    InvalidParameterAttribute {
        attribute: String,
        content: String,
        valid: &'static str,
    },

    /// A placeholder attribute carried a value that does not parse.
    #[error("invalid value '{value}' for '{attribute}' in mapping #{{{content}}}")]
    InvalidAttributeValue {
        attribute: String,
        value: String,
        content: String,
    },

    /// A `${}` substitution was rejected by the injection filter.
    #[error("value ({value}) substituted for '{expression}' is not allowed by the injection filter")]
    UnsafeSubstitution { expression: String, value: String },
}

/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_expression_message() {
        let err = TemplateError::MalformedExpression {
            expression: String::from("id;x"),
            position: 2,
        };
        assert_eq!(err.to_string(), "parsing error in {id;x} in position 2");
    }

    #[test]
    fn test_evaluation_error_is_transparent() {
        let err: TemplateError = EvaluationError::new("a +", "dangling operator").into();
        assert_eq!(
            err.to_string(),
            "failed to evaluate 'a +': dangling operator"
        );
    }
}
