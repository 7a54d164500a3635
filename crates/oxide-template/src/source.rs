//! Bound SQL.
//!
//! A [`DynamicSqlSource`] expands its node tree for one parameter object,
//! then hands the result to a [`SqlSourceBuilder`], which turns every
//! `#{...}` placeholder into a `?` and a [`ParameterMapping`]. The mappings
//! are finally resolved to values against the expansion's bindings.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, trace};

use crate::context::{Bindings, DynamicContext};
use crate::error::{Result, TemplateError};
use crate::eval::{Evaluate, ExpressionEvaluator};
use crate::node::SqlNode;
use crate::parameter::{ParameterExpression, EXPRESSION, JDBC_TYPE, PROPERTY};
use crate::scanner::TokenScanner;
use crate::schema::{PropertyTokenizer, SchemaRegistry};
use crate::value::Value;

const VALID_ATTRIBUTES: &str =
    "javaType,jdbcType,mode,numericScale,resultMap,typeHandler,jdbcTypeName";

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    /// Passed to the statement.
    #[default]
    In,
    /// Returned by the statement.
    Out,
    /// Both.
    InOut,
}

impl FromStr for ParameterMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            "INOUT" => Ok(Self::InOut),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
            Self::InOut => write!(f, "INOUT"),
        }
    }
}

/// How one `?` of the final SQL is bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParameterMapping {
    /// Property path the value is read from.
    pub property: Option<String>,
    /// Expression the value is computed from.
    pub expression: Option<String>,
    /// Declared value type (`javaType`), or the registered property type.
    pub value_type: Option<String>,
    /// Declared SQL type.
    pub jdbc_type: Option<String>,
    /// Declared SQL type name, for user-defined types.
    pub jdbc_type_name: Option<String>,
    /// Direction of the parameter.
    pub mode: ParameterMode,
    /// Digits after the decimal point for numeric parameters.
    pub numeric_scale: Option<u32>,
    /// Name of the handler converting the value.
    pub type_handler: Option<String>,
    /// Result map for cursor `OUT` parameters.
    pub result_map: Option<String>,
}

/// Turns `#{...}` placeholders into positional `?` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlSourceBuilder<'s> {
    schema: Option<(&'s SchemaRegistry, &'s str)>,
    shrink_whitespace: bool,
}

impl<'s> SqlSourceBuilder<'s> {
    /// Creates a builder without type information.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves undeclared value types through `registry`, starting at the
    /// type `root`.
    #[must_use]
    pub const fn schema(mut self, registry: &'s SchemaRegistry, root: &'s str) -> Self {
        self.schema = Some((registry, root));
        self
    }

    /// Collapses runs of whitespace in the SQL to single spaces.
    #[must_use]
    pub const fn shrink_whitespace(mut self, shrink: bool) -> Self {
        self.shrink_whitespace = shrink;
        self
    }

    /// Replaces every placeholder in `sql` with `?`.
    ///
    /// # Errors
    ///
    /// Fails on the first placeholder that does not parse or that carries
    /// an unknown or invalid attribute.
    pub fn parse(&self, sql: &str) -> Result<(String, Vec<ParameterMapping>)> {
        let shrunk;
        let sql = if self.shrink_whitespace {
            shrunk = sql.split_whitespace().collect::<Vec<_>>().join(" ");
            shrunk.as_str()
        } else {
            sql
        };

        let mut mappings = Vec::new();
        let sql = TokenScanner::new("#{", "}").try_scan(sql, |content| {
            let mapping = self.mapping(content)?;
            trace!(content, ?mapping, "parameter mapping");
            mappings.push(mapping);
            Ok::<_, TemplateError>(String::from("?"))
        })?;
        Ok((sql, mappings))
    }

    fn mapping(&self, content: &str) -> Result<ParameterMapping> {
        let expression = ParameterExpression::parse(content)?;
        let mut mapping = ParameterMapping::default();
        for (key, value) in expression.iter() {
            let invalid_value = || TemplateError::InvalidAttributeValue {
                attribute: key.to_string(),
                value: value.to_string(),
                content: content.to_string(),
            };
            match key {
                PROPERTY => mapping.property = Some(value.to_string()),
                EXPRESSION => mapping.expression = Some(value.to_string()),
                JDBC_TYPE => mapping.jdbc_type = Some(value.to_string()),
                "javaType" => mapping.value_type = Some(value.to_string()),
                "jdbcTypeName" => mapping.jdbc_type_name = Some(value.to_string()),
                "mode" => mapping.mode = value.parse().map_err(|()| invalid_value())?,
                "numericScale" => {
                    mapping.numeric_scale = Some(value.parse().map_err(|_| invalid_value())?);
                }
                "typeHandler" => mapping.type_handler = Some(value.to_string()),
                "resultMap" => mapping.result_map = Some(value.to_string()),
                other => {
                    return Err(TemplateError::InvalidParameterAttribute {
                        attribute: other.to_string(),
                        content: content.to_string(),
                        valid: VALID_ATTRIBUTES,
                    })
                }
            }
        }

        if mapping.value_type.is_none() {
            if let (Some((registry, root)), Some(property)) = (self.schema, &mapping.property) {
                mapping.value_type = registry
                    .getter_type(root, property)
                    .map(|ty| ty.to_string());
            }
        }
        Ok(mapping)
    }
}

/// SQL ready to execute: positional placeholders plus their values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundSql {
    /// The SQL with `?` placeholders.
    pub sql: String,
    /// One mapping per `?`, in order.
    pub mappings: Vec<ParameterMapping>,
    /// One value per `?`, in order. `OUT` parameters are null.
    pub parameters: Vec<Value>,
}

/// A template that is expanded anew for every parameter object.
///
/// # Example
///
/// ```
/// use oxide_template::{DynamicSqlSource, ForEachNode, MixedNode, PathEvaluator};
/// use oxide_template::{StaticTextNode, ToValue, Value};
///
/// let root = MixedNode::default()
///     .push(StaticTextNode::new("SELECT * FROM users WHERE id IN "))
///     .push(
///         ForEachNode::new("ids", StaticTextNode::new("#{id}"))
///             .item("id")
///             .open("(")
///             .close(")")
///             .separator(", "),
///     );
/// let source = DynamicSqlSource::new(root);
///
/// let params = serde_json::json!({"ids": [3, 5]}).to_value();
/// let bound = source.bound_sql(params, &PathEvaluator::new()).unwrap();
/// assert_eq!(bound.sql, "SELECT * FROM users WHERE id IN (?, ?)");
/// assert_eq!(bound.parameters, vec![Value::Int(3), Value::Int(5)]);
/// ```
#[derive(Debug)]
pub struct DynamicSqlSource {
    root: Box<dyn SqlNode>,
    schema: Option<(SchemaRegistry, String)>,
    database_id: Option<String>,
    shrink_whitespace: bool,
}

impl DynamicSqlSource {
    /// Creates a source around a template tree.
    #[must_use]
    pub fn new(root: impl SqlNode + 'static) -> Self {
        Self::boxed(Box::new(root))
    }

    /// Like [`new`](Self::new), for a tree that is already boxed.
    #[must_use]
    pub fn boxed(root: Box<dyn SqlNode>) -> Self {
        Self {
            root,
            schema: None,
            database_id: None,
            shrink_whitespace: false,
        }
    }

    /// Describes the parameter object as type `root` of `registry`.
    #[must_use]
    pub fn with_schema(mut self, registry: SchemaRegistry, root: impl Into<String>) -> Self {
        self.schema = Some((registry, root.into()));
        self
    }

    /// Publishes `database_id` to every expansion.
    #[must_use]
    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = Some(database_id.into());
        self
    }

    /// Collapses whitespace runs in the generated SQL.
    #[must_use]
    pub const fn with_shrink_whitespace(mut self, shrink: bool) -> Self {
        self.shrink_whitespace = shrink;
        self
    }

    /// Expands the template for `parameter` and binds its placeholders.
    ///
    /// # Errors
    ///
    /// Propagates any error raised by the node tree, the placeholder parser
    /// or the expression capability.
    pub fn bound_sql(&self, parameter: Value, engine: &dyn Evaluate) -> Result<BoundSql> {
        let mut ctx = DynamicContext::new(parameter, engine);
        if let Some(database_id) = &self.database_id {
            ctx = ctx.with_database_id(database_id.clone());
        }
        self.root.apply(&mut ctx)?;
        let (sql, bindings) = ctx.into_parts();

        let mut builder = SqlSourceBuilder::new().shrink_whitespace(self.shrink_whitespace);
        if let Some((registry, root)) = &self.schema {
            builder = builder.schema(registry, root);
        }
        let (sql, mappings) = builder.parse(&sql)?;

        let evaluator = ExpressionEvaluator::new(engine);
        let parameters = mappings
            .iter()
            .map(|mapping| resolve(mapping, &bindings, evaluator))
            .collect::<Result<Vec<_>>>()?;
        debug!(sql = %sql, parameters = parameters.len(), "bound sql");

        Ok(BoundSql {
            sql,
            mappings,
            parameters,
        })
    }
}

/// Computes the value of one mapping.
///
/// Expressions are evaluated. A property whose first segment is explicitly
/// bound is read from the bindings; otherwise a scalar parameter object is
/// the value itself, and anything else is read from the parameter object.
fn resolve(
    mapping: &ParameterMapping,
    bindings: &Bindings,
    evaluator: ExpressionEvaluator<'_>,
) -> Result<Value> {
    if mapping.mode == ParameterMode::Out {
        return Ok(Value::Null);
    }
    if let Some(expression) = &mapping.expression {
        return evaluator.evaluate(expression, bindings);
    }
    let Some(property) = mapping.property.as_deref() else {
        return Ok(Value::Null);
    };
    let head = PropertyTokenizer::new(property)
        .next()
        .map_or(property, |segment| segment.name);
    let parameter = bindings.parameter();
    if !bindings.contains(head) && parameter.is_scalar() {
        return Ok(parameter.clone());
    }
    evaluator.evaluate(property, bindings)
}
