use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A mind map as a tagged tree: a label plus ordered children.
///
/// The summarization pipeline returns mind maps as loosely shaped JSON
/// (nested objects keyed by topic, sometimes wrapped in a `"Root Topic"`
/// entry, sometimes with string or list leaves). All of those shapes are
/// folded into this type exactly once, when the worker ingests the payload;
/// everything downstream only ever sees the normalized tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MindMapNode {
    pub label: String,
    #[serde(default)]
    pub children: Vec<MindMapNode>,
}

const DEFAULT_ROOT_LABEL: &str = "Mind Map";
const ROOT_TOPIC_KEY: &str = "Root Topic";

impl MindMapNode {
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Normalize an arbitrary pipeline payload into a tagged tree.
    ///
    /// Shapes handled, in order:
    /// - an already-tagged `{label, children}` object passes through;
    /// - `{"Root Topic": <label>, ...}` uses that entry as the root;
    /// - a single-key object promotes its key to the root label;
    /// - any other object becomes a root labeled "Mind Map" with one child
    ///   per entry; string and list values become leaf children.
    pub fn normalize(value: &Value) -> Self {
        if let Ok(node) = serde_json::from_value::<MindMapNode>(value.clone()) {
            return node;
        }

        match value {
            Value::Object(map) => {
                if map.contains_key(ROOT_TOPIC_KEY) {
                    let label = map
                        .get(ROOT_TOPIC_KEY)
                        .and_then(Value::as_str)
                        .unwrap_or(DEFAULT_ROOT_LABEL);
                    let children = map
                        .iter()
                        .filter(|(key, _)| key.as_str() != ROOT_TOPIC_KEY)
                        .map(|(key, child)| Self::from_entry(key, child))
                        .collect();
                    return Self {
                        label: label.to_string(),
                        children,
                    };
                }

                if map.len() == 1 {
                    if let Some((key, child)) = map.iter().next() {
                        if child.is_object() {
                            return Self::from_entry(key, child);
                        }
                    }
                }

                Self {
                    label: DEFAULT_ROOT_LABEL.to_string(),
                    children: map
                        .iter()
                        .map(|(key, child)| Self::from_entry(key, child))
                        .collect(),
                }
            }
            Value::Array(items) => Self {
                label: DEFAULT_ROOT_LABEL.to_string(),
                children: items.iter().map(Self::normalize).collect(),
            },
            Value::String(text) => Self::leaf(text.clone()),
            _ => Self::leaf(DEFAULT_ROOT_LABEL),
        }
    }

    fn from_entry(label: &str, value: &Value) -> Self {
        let children = match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, child)| Self::from_entry(key, child))
                .collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item.as_str() {
                    Some(text) => Self::leaf(text),
                    None => Self::normalize(item),
                })
                .collect(),
            Value::String(text) => vec![Self::leaf(text.clone())],
            _ => Vec::new(),
        };

        Self {
            label: label.to_string(),
            children,
        }
    }
}
