//! Tests for `foreach` expansion through the decorated binding context.

mod common;
use common::*;

use oxide_template::{ForEachNode, IfNode, MixedNode, StaticTextNode, TemplateError, Value};

#[test]
fn three_elements_two_separators() {
    let node = ForEachNode::new("ids", StaticTextNode::new("#{id}"))
        .item("id")
        .index("i")
        .open("(")
        .close(")")
        .separator(",");
    let (sql, bindings) = expand(&node, serde_json::json!({"ids": ["a", "b", "c"]}));

    assert_eq!(sql, "(#{__frch_id_0},#{__frch_id_1},#{__frch_id_2})");
    assert_eq!(sql.matches(',').count(), 2);
    assert!(!bindings.contains("id"));
    assert!(!bindings.contains("i"));
    assert_eq!(
        itemized_names(&bindings),
        vec![
            "__frch_i_0",
            "__frch_i_1",
            "__frch_i_2",
            "__frch_id_0",
            "__frch_id_1",
            "__frch_id_2",
        ]
    );
}

#[test]
fn empty_collection_ignores_open_and_close() {
    let node = ForEachNode::new("ids", StaticTextNode::new("#{id}"))
        .item("id")
        .open("(")
        .close(")")
        .separator(",");
    let (sql, bindings) = expand(&node, serde_json::json!({"ids": []}));
    assert_eq!(sql, "");
    assert!(bindings.is_empty());

    let (sql, _) = expand(&node, serde_json::json!({"ids": {}}));
    assert_eq!(sql, "");
}

#[test]
fn map_iteration_binds_keys_as_index() {
    let sql = expand(
        &*template(
            r##"{"foreach": {"collection": "filters", "item": "v", "index": "k",
                 "separator": " AND ", "contents": [{"text": "#{k} = #{v}"}]}}"##,
        ),
        serde_json::json!({"filters": {"status": "open", "owner": "ann"}}),
    )
    .0;
    assert_eq!(
        sql,
        "#{__frch_k_0} = #{__frch_v_0} AND #{__frch_k_1} = #{__frch_v_1}"
    );
}

#[test]
fn sibling_loops_never_reuse_numbers() {
    let loop_over = |collection: &str| {
        ForEachNode::new(collection, StaticTextNode::new("#{x}"))
            .item("x")
            .separator(",")
    };
    let node = MixedNode::default()
        .push(loop_over("a"))
        .push(StaticTextNode::new(";"))
        .push(loop_over("b"));
    let (sql, bindings) = expand(&node, serde_json::json!({"a": [1, 2], "b": [3]}));
    assert_eq!(sql, "#{__frch_x_0},#{__frch_x_1};#{__frch_x_2}");
    assert_eq!(bindings.get("__frch_x_2"), Some(&Value::Int(3)));
}

#[test]
fn nested_loops_see_outer_item() {
    let (sql, bindings) = expand(
        &*template(
            r##"{"foreach": {"collection": "orders", "item": "o", "separator": " UNION ",
                 "contents": [
                    {"text": "SELECT #{o.id}"},
                    {"foreach": {"collection": "o.lines", "item": "l", "open": " WHERE line IN (",
                                 "close": ")", "separator": ",", "contents": [{"text": "#{l}"}]}}
                 ]}}"##,
        ),
        serde_json::json!({"orders": [{"id": 1, "lines": [10, 11]}, {"id": 2, "lines": []}]}),
    );
    assert_eq!(
        sql,
        "SELECT #{__frch_o_0.id} WHERE line IN (#{__frch_l_1},#{__frch_l_2}) UNION SELECT #{__frch_o_3.id}"
    );
    assert!(!bindings.contains("o"));
    assert!(!bindings.contains("l"));
}

#[test]
fn skipped_elements_keep_the_separator_pending() {
    let node = ForEachNode::new(
        "users",
        IfNode::new("u.active", StaticTextNode::new("#{u.name}")),
    )
    .item("u")
    .open("[")
    .close("]")
    .separator(", ");
    let (sql, _) = expand(
        &node,
        serde_json::json!({"users": [
            {"name": "a", "active": false},
            {"name": "b", "active": true},
            {"name": "c", "active": false},
            {"name": "d", "active": true}
        ]}),
    );
    assert_eq!(sql, "[#{__frch_u_1.name}, #{__frch_u_3.name}]");
}

#[test]
fn whitespace_only_output_does_not_take_the_separator() {
    let node = ForEachNode::new("xs", StaticTextNode::new(" ")).separator(",");
    let (sql, _) = expand(&node, serde_json::json!({"xs": [1, 2, 3]}));
    assert_eq!(sql, "   ");
}

#[test]
fn only_leading_references_are_rewritten() {
    let node = ForEachNode::new("xs", StaticTextNode::new("#{x} #{xs} #{ x:INTEGER} #{(x)}"))
        .item("x");
    let (sql, _) = expand(&node, serde_json::json!({"xs": [1]}));
    assert_eq!(sql, "#{__frch_x_0} #{xs} #{__frch_x_0:INTEGER} #{(x)}");
}

#[test]
fn null_collection_fails() {
    let node = ForEachNode::new("missing", StaticTextNode::new("#{x}")).item("x");
    let err = try_expand(&node, serde_json::json!({})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "the expression 'missing' evaluated to a null value"
    );
}

#[test]
fn scalar_collection_fails() {
    let node = ForEachNode::new("n", StaticTextNode::new("#{x}")).item("x");
    let err = try_expand(&node, serde_json::json!({"n": 5})).unwrap_err();
    assert_eq!(
        err,
        TemplateError::NotIterable {
            expression: String::from("n"),
            value: String::from("5"),
        }
    );
}

#[test]
fn errors_inside_the_body_abort_the_expansion() {
    let node = ForEachNode::new("xs", IfNode::new("x <", StaticTextNode::new("#{x}"))).item("x");
    let err = try_expand(&node, serde_json::json!({"xs": [1]})).unwrap_err();
    assert!(matches!(err, TemplateError::Evaluation(_)));
}
