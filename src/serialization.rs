use crate::tree::{Element, ElementKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Serializable view of a tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Array(Vec<String>),
    Object(BTreeMap<String, Value>),
}

pub(crate) fn to_value(element: &Element) -> Value {
    match element.kind() {
        ElementKind::Array => match element.values() {
            [single] => Value::String(single.clone()),
            values => Value::Array(values.to_vec()),
        },
        ElementKind::Container => {
            let mut map = BTreeMap::new();
            for child in element.children() {
                if let Some(name) = child.name() {
                    // Lookups only ever reach the first of several equal names.
                    map.entry(name.to_string())
                        .or_insert_with(|| to_value(child));
                }
            }
            Value::Object(map)
        }
    }
}
