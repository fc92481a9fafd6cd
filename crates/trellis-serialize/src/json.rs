//! Producer adapter for plain JSON documents.
//!
//! Every JSON object becomes a [`Node`] whose type is its `type` key (default
//! `Base`). Key prefixes carry the field annotation:
//!
//! | key          | annotation                      | field name |
//! |--------------|---------------------------------|------------|
//! | `name`       | `Inline`                        | `name`     |
//! | `@name`      | `Detached`                      | `name`     |
//! | `@(N)name`   | `DetachedChunked(Some(N))`      | `name`     |
//! | `@()name`    | `DetachedChunked(None)`         | `name`     |

use std::sync::Arc;

use serde_json::{Map, Value as Json};
use trellis_types::{FieldAnnotation, Node, Value, DEFAULT_NODE_TYPE, TYPE_KEY};

use crate::error::{SerializeError, SerializeResult};

/// Build a producer node from a JSON document whose root is an object.
pub fn node_from_json(document: &Json) -> SerializeResult<Node> {
    match document {
        Json::Object(map) => node_from_object(map, "$"),
        _ => Err(SerializeError::violation(
            "$",
            "document root must be an object",
        )),
    }
}

fn node_from_object(map: &Map<String, Json>, path: &str) -> SerializeResult<Node> {
    let type_name = match map.get(TYPE_KEY) {
        None => DEFAULT_NODE_TYPE,
        Some(Json::String(name)) => name.as_str(),
        Some(_) => {
            return Err(SerializeError::violation(
                format!("{path}.{TYPE_KEY}"),
                "type must be a string",
            ))
        }
    };

    let mut node = Node::new(type_name);
    for (key, value) in map {
        if key == TYPE_KEY {
            continue;
        }
        let field_path = format!("{path}.{key}");
        let (name, annotation) = parse_key(key, &field_path)?;
        if node.field(name).is_some() {
            return Err(SerializeError::violation(field_path, "duplicate field name"));
        }
        let value = convert(value, &field_path)?;
        node.set(name, annotation, value);
    }
    Ok(node)
}

/// Split an annotated key into the field name and its annotation.
fn parse_key<'k>(key: &'k str, path: &str) -> SerializeResult<(&'k str, FieldAnnotation)> {
    let (name, annotation) = match key.strip_prefix('@') {
        None => (key, FieldAnnotation::Inline),
        Some(rest) => match rest.strip_prefix('(') {
            None => (rest, FieldAnnotation::Detached),
            Some(sized) => {
                let (size, name) = sized
                    .split_once(')')
                    .ok_or_else(|| SerializeError::violation(path, "unterminated chunk size"))?;
                let size = if size.is_empty() {
                    None
                } else {
                    let n: usize = size.parse().map_err(|_| {
                        SerializeError::violation(path, format!("invalid chunk size {size:?}"))
                    })?;
                    Some(n)
                };
                (name, FieldAnnotation::DetachedChunked(size))
            }
        },
    };
    if name.is_empty() {
        return Err(SerializeError::violation(path, "empty field name"));
    }
    Ok((name, annotation))
}

fn convert(value: &Json, path: &str) -> SerializeResult<Value> {
    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.clone()),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| convert(item, &format!("{path}[{i}]")))
                .collect::<SerializeResult<_>>()?,
        ),
        Json::Object(map) => Value::Node(Arc::new(node_from_object(map, path)?)),
    })
}
