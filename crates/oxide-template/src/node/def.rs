//! Serializable template definitions.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ForEachNode, IfNode, MixedNode, SqlNode, StaticTextNode, TextNode};

/// A template tree as it is stored on disk.
///
/// ```json
/// {"mixed": [
///   {"text": "SELECT * FROM users WHERE id IN "},
///   {"foreach": {"collection": "ids", "item": "id", "open": "(",
///                "close": ")", "separator": ",", "contents": [{"text": "#{id}"}]}}
/// ]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeDef {
    /// SQL text; `${}` spans make it a substituting node.
    Text(String),
    /// Children applied in order.
    Mixed(Vec<NodeDef>),
    /// Conditional contents.
    If {
        test: String,
        contents: Vec<NodeDef>,
    },
    /// Repeated contents.
    Foreach {
        collection: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        open: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        close: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
        contents: Vec<NodeDef>,
    },
}

impl NodeDef {
    /// Builds the node tree.
    #[must_use]
    pub fn into_node(self) -> Box<dyn SqlNode> {
        self.build(None)
    }

    /// Builds the node tree, filtering every `${}` substitution through
    /// `filter`.
    #[must_use]
    pub fn into_filtered_node(self, filter: &Regex) -> Box<dyn SqlNode> {
        self.build(Some(filter))
    }

    fn build(self, filter: Option<&Regex>) -> Box<dyn SqlNode> {
        match self {
            Self::Text(text) if TextNode::is_dynamic(&text) => {
                let node = TextNode::new(text);
                match filter {
                    Some(filter) => Box::new(node.injection_filter(filter.clone())),
                    None => Box::new(node),
                }
            }
            Self::Text(text) => Box::new(StaticTextNode::new(text)),
            Self::Mixed(children) => Box::new(Self::build_all(children, filter)),
            Self::If { test, contents } => {
                Box::new(IfNode::new(test, Self::build_all(contents, filter)))
            }
            Self::Foreach {
                collection,
                item,
                index,
                open,
                close,
                separator,
                contents,
            } => {
                let mut node = ForEachNode::new(collection, Self::build_all(contents, filter));
                if let Some(item) = item {
                    node = node.item(item);
                }
                if let Some(index) = index {
                    node = node.index(index);
                }
                if let Some(open) = open {
                    node = node.open(open);
                }
                if let Some(close) = close {
                    node = node.close(close);
                }
                if let Some(separator) = separator {
                    node = node.separator(separator);
                }
                Box::new(node)
            }
        }
    }

    fn build_all(defs: Vec<Self>, filter: Option<&Regex>) -> MixedNode {
        MixedNode::new(defs.into_iter().map(|def| def.build(filter)).collect())
    }
}
