//! Tests for placeholder scanning and inline parameter parsing together.

use oxide_template::{ParameterExpression, TokenScanner};
use proptest::prelude::*;

fn contents(sql: &str) -> Vec<String> {
    let mut found = Vec::new();
    TokenScanner::new("#{", "}").scan(sql, |content| {
        found.push(content.to_string());
        String::new()
    });
    found
}

#[test]
fn every_placeholder_parses() {
    let sql = "INSERT INTO t VALUES (#{id:INTEGER}, #{name,javaType=string}, #{(price * qty):NUMERIC,numericScale=2})";
    let parsed: Vec<ParameterExpression> = contents(sql)
        .iter()
        .map(|c| ParameterExpression::parse(c).unwrap())
        .collect();

    assert_eq!(parsed[0].property(), Some("id"));
    assert_eq!(parsed[0].jdbc_type(), Some("INTEGER"));
    assert_eq!(parsed[1].get("javaType"), Some("string"));
    assert_eq!(parsed[2].expression(), Some("price * qty"));
    assert_eq!(parsed[2].get("numericScale"), Some("2"));
}

#[test]
fn escaped_placeholder_is_not_parsed() {
    assert_eq!(contents(r"a = \#{literal} AND b = #{b}"), vec!["b"]);
    assert_eq!(
        TokenScanner::new("#{", "}").scan(r"a = \#{literal}", |_| String::from("?")),
        "a = #{literal}"
    );
}

#[test]
fn escaped_close_marker_reaches_the_parser() {
    let found = contents(r"#{(a \} b)}");
    assert_eq!(found, vec!["(a } b)"]);
    let parsed = ParameterExpression::parse(&found[0]).unwrap();
    assert_eq!(parsed.expression(), Some("a } b"));
}

fn balanced() -> impl Strategy<Value = String> {
    let leaf = "[a-z0-9 +*]{0,4}";
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop::collection::vec(inner, 1..3).prop_map(|parts| {
            parts
                .iter()
                .map(|p| format!("({p})"))
                .collect::<String>()
        })
    })
}

proptest! {
    #[test]
    fn balanced_expression_is_kept_exactly(body in balanced()) {
        let parsed = ParameterExpression::parse(&format!("({body})")).unwrap();
        prop_assert_eq!(parsed.expression(), Some(body.as_str()));
    }

    #[test]
    fn parsing_twice_gives_equal_results(
        property in "[a-z][a-z0-9_.]{0,8}",
        jdbc in prop::option::of("[A-Z]{1,8}"),
        attrs in prop::collection::vec(("[a-zA-Z]{1,6}", "[a-z0-9]{0,4}"), 0..4),
    ) {
        let mut text = property;
        if let Some(jdbc) = jdbc {
            text.push(':');
            text.push_str(&jdbc);
        }
        for (k, v) in &attrs {
            text.push_str(&format!(",{k}={v}"));
        }
        let first = ParameterExpression::parse(&text).unwrap();
        let second = ParameterExpression::parse(&text).unwrap();
        prop_assert_eq!(first, second);
    }
}
