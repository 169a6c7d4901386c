//! serde_json::Value <-> Node conversion

use crate::{
    output::float_to_string,
    value::{Node, ObjectMap, Value},
};

/// Convert serde_json::Value to a Node. Positions are all zero.
pub fn json_to_node(v: serde_json::Value) -> Node {
    let value = match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_node).collect()),
        serde_json::Value::Object(obj) => {
            Value::Object(obj.into_iter().map(|(k, v)| (k, json_to_node(v))).collect::<ObjectMap>())
        }
    };
    Node::from(value)
}

/// Convert a Node to serde_json::Value.
///
/// serde_json has no NaN or infinities, so those become their names as
/// strings. Dates, regexes and slices become strings as well.
pub fn node_to_json(node: &Node) -> serde_json::Value {
    match &node.value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(float_to_string(*f))),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => serde_json::Value::String(dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
        Value::Regex(re) => serde_json::Value::String(re.as_str().to_string()),
        Value::Slice(s) => serde_json::Value::String(s.to_string()),
        Value::Array(arr) => serde_json::Value::Array(arr.iter().map(node_to_json).collect()),
        Value::Object(obj) => {
            serde_json::Value::Object(obj.iter().map(|(k, v)| (k.clone(), node_to_json(v))).collect())
        }
    }
}
