//! In-place edits of a JSON tree addressed by path segments, with the
//! realtime database's rules: `null` deletes, empty objects disappear.

use serde_json::{Map, Value};

pub(crate) fn value_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, key| node.get(key.as_str()))
        .filter(|v| !v.is_null())
}

/// Replace the node at `segments` with `value`.
pub(crate) fn set_at(root: &mut Value, segments: &[String], value: Value) {
    let value = prune(value);
    if value.is_null() {
        remove_at(root, segments);
        return;
    }
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for key in parents {
        node = ensure_object(node)
            .entry(key.clone())
            .or_insert(Value::Null);
    }
    ensure_object(node).insert(last.clone(), value);
}

/// Apply each child of `children` as its own `set_at` below `segments`.
pub(crate) fn merge_at(root: &mut Value, segments: &[String], children: Map<String, Value>) {
    for (key, value) in children {
        let mut child_segments = segments.to_vec();
        child_segments.extend(key.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        set_at(root, &child_segments, value);
    }
}

fn remove_at(node: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        *node = Value::Null;
        return;
    };
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        map.remove(first);
    } else if let Some(child) = map.get_mut(first) {
        remove_at(child, rest);
        if child.is_null() {
            map.remove(first);
        }
    }
    if map.is_empty() {
        *node = Value::Null;
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if pruned.is_empty() {
                Value::Null
            } else {
                Value::Object(pruned)
            }
        }
        other => other,
    }
}
