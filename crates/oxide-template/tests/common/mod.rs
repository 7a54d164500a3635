#![allow(dead_code)]

use oxide_template::{
    Bindings, BoundSql, DynamicContext, DynamicSqlSource, NodeDef, PathEvaluator, SqlNode,
    TemplateError, ToValue,
};

/// Expands `node` against `params`, returning the raw SQL and the bindings
/// left behind.
pub fn expand(node: &dyn SqlNode, params: serde_json::Value) -> (String, Bindings) {
    try_expand(node, params).unwrap_or_else(|e| panic!("Failed to expand: {e}"))
}

pub fn try_expand(
    node: &dyn SqlNode,
    params: serde_json::Value,
) -> Result<(String, Bindings), TemplateError> {
    let engine = PathEvaluator::new();
    let mut ctx = DynamicContext::new(params.to_value(), &engine);
    node.apply(&mut ctx)?;
    Ok(ctx.into_parts())
}

/// Builds a node tree from its JSON description.
pub fn template(json: &str) -> Box<dyn SqlNode> {
    serde_json::from_str::<NodeDef>(json)
        .unwrap_or_else(|e| panic!("Invalid template: {json}\nError: {e}"))
        .into_node()
}

pub fn bind(json: &str, params: serde_json::Value) -> BoundSql {
    DynamicSqlSource::boxed(template(json))
        .bound_sql(params.to_value(), &PathEvaluator::new())
        .unwrap_or_else(|e| panic!("Failed to bind: {json}\nError: {e}"))
}

/// Names bound with the per-iteration prefix, sorted.
pub fn itemized_names(bindings: &Bindings) -> Vec<String> {
    let mut names: Vec<String> = bindings
        .iter()
        .map(|(name, _)| name.to_string())
        .filter(|name| name.starts_with(oxide_template::node::ITEM_PREFIX))
        .collect();
    names.sort();
    names
}
