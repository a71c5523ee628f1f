//! Schema JSON Codec
//!
//! Draft-aware conversion between [`SchemaNode`] and `serde_json::Value`.
//! Encoding emits keys in sorted order and drops empty nested schemas.
//! Decoding accepts anything a schema file may contain; keywords without a
//! dedicated field land in `extra` and are written back unchanged.

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use super::{Draft, SchemaKind, SchemaNode};
use crate::error::{Result, SchemaError};

impl SchemaNode {
    /// Encode as JSON for the given draft
    pub fn to_value(&self, draft: Draft) -> Value {
        match self.kind() {
            SchemaKind::True => Value::Bool(true),
            SchemaKind::False => Value::Bool(false),
            SchemaKind::Object => Value::Object(encode_object(self, draft)),
        }
    }

    /// Decode from JSON; `null` yields no node
    pub fn from_value(value: &Value, draft: Draft) -> Result<Option<SchemaNode>> {
        decode_at(value, draft, "#")
    }
}

// =============================================================================
// Encoding
// =============================================================================

fn encode_object(node: &SchemaNode, draft: Draft) -> Map<String, Value> {
    let mut out: BTreeMap<String, Value> = node.extra.clone();
    let mut put = |key: &str, value: Value| {
        out.insert(key.to_string(), value);
    };

    if let Some(v) = &node.schema {
        put("$schema", Value::from(v.as_str()));
    }
    if let Some(v) = &node.id {
        put(draft.id_keyword(), Value::from(v.as_str()));
    }
    if let Some(v) = &node.reference {
        put("$ref", Value::from(v.as_str()));
    }
    if let Some(v) = &node.comment {
        put("$comment", Value::from(v.as_str()));
    }
    if let Some(v) = &node.title {
        put("title", Value::from(v.as_str()));
    }
    if let Some(v) = &node.description {
        put("description", Value::from(v.as_str()));
    }
    if node.read_only {
        put("readOnly", Value::Bool(true));
    }
    if let Some(v) = &node.default {
        put("default", v.clone());
    }
    if !node.examples.is_empty() {
        put("examples", Value::Array(node.examples.clone()));
    }

    match node.types.as_slice() {
        [] => {}
        [single] => put("type", Value::from(single.as_str())),
        many => put("type", Value::from(many.to_vec())),
    }
    if !node.enum_values.is_empty() {
        put("enum", Value::Array(node.enum_values.clone()));
    }
    if let Some(v) = &node.constant {
        put("const", v.clone());
    }

    for (key, list) in [("allOf", &node.all_of), ("anyOf", &node.any_of), ("oneOf", &node.one_of)] {
        if !list.is_empty() {
            put(key, Value::Array(list.iter().map(|n| n.to_value(draft)).collect()));
        }
    }
    if let Some(v) = &node.not {
        put("not", v.to_value(draft));
    }

    for (key, number) in [
        ("minimum", node.minimum),
        ("maximum", node.maximum),
        ("multipleOf", node.multiple_of),
    ] {
        if let Some(n) = number {
            put(key, encode_number(n));
        }
    }
    if let Some(v) = &node.pattern {
        put("pattern", Value::from(v.as_str()));
    }
    for (key, count) in [
        ("minLength", node.min_length),
        ("maxLength", node.max_length),
        ("minItems", node.min_items),
        ("maxItems", node.max_items),
        ("minProperties", node.min_properties),
        ("maxProperties", node.max_properties),
    ] {
        if let Some(n) = count {
            put(key, Value::from(n));
        }
    }
    if node.unique_items {
        put("uniqueItems", Value::Bool(true));
    }

    for (key, child) in [
        ("items", &node.items),
        ("additionalItems", &node.additional_items),
        ("additionalProperties", &node.additional_properties),
    ] {
        if let Some(child) = child.as_deref().filter(|c| !c.is_zero()) {
            put(key, child.to_value(draft));
        }
    }

    if !node.required.is_empty() {
        put("required", Value::from(node.required.clone()));
    }
    if let Some(v) = node.unevaluated_properties {
        put("unevaluatedProperties", Value::Bool(v));
    }

    for (key, map) in [
        ("properties", &node.properties),
        ("patternProperties", &node.pattern_properties),
        ("$defs", &node.defs),
        ("definitions", &node.definitions),
    ] {
        let encoded: Map<String, Value> = map
            .iter()
            .filter(|(_, child)| !child.is_zero())
            .map(|(name, child)| (name.clone(), child.to_value(draft)))
            .collect();
        if !encoded.is_empty() {
            put(key, Value::Object(encoded));
        }
    }

    out.into_iter().collect()
}

/// Integral values are written as JSON integers
fn encode_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode the schema at a JSON pointer path, used in error messages
pub(crate) fn decode_at(value: &Value, draft: Draft, path: &str) -> Result<Option<SchemaNode>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(SchemaNode::boolean(*b))),
        Value::Object(map) => decode_object(map, draft, path).map(Some),
        other => Err(SchemaError::decode(
            path,
            format!("expected a schema object or boolean, found {}", json_kind(other)),
        )),
    }
}

fn decode_object(map: &Map<String, Value>, draft: Draft, path: &str) -> Result<SchemaNode> {
    let mut node = SchemaNode::default();

    for (key, value) in map {
        let field = format!("{}/{}", path, escape_pointer(key));
        let field = field.as_str();
        match key.as_str() {
            "$schema" => node.schema = Some(string(value, field)?),
            "$id" if draft != Draft::Draft4 => node.id = Some(string(value, field)?),
            "id" if draft == Draft::Draft4 => node.id = Some(string(value, field)?),
            "$ref" => node.reference = Some(string(value, field)?),
            "$comment" => node.comment = Some(string(value, field)?),
            "title" => node.title = Some(string(value, field)?),
            "description" => node.description = Some(string(value, field)?),
            "readOnly" => node.read_only = boolean(value, field)?,
            "default" => node.default = Some(value.clone()),
            "examples" => node.examples = array(value, field)?.to_vec(),

            "type" => {
                node.types = match value {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(items) => items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| string(item, &format!("{}/{}", field, i)))
                        .collect::<Result<_>>()?,
                    other => return Err(mismatch(field, "a string or array of strings", other)),
                }
            }
            "enum" => node.enum_values = array(value, field)?.to_vec(),
            "const" => node.constant = Some(value.clone()),

            "allOf" => node.all_of = schema_list(value, draft, field)?,
            "anyOf" => node.any_of = schema_list(value, draft, field)?,
            "oneOf" => node.one_of = schema_list(value, draft, field)?,
            "not" => node.not = Some(Box::new(required_schema(value, draft, field)?)),

            "minimum" => node.minimum = Some(number(value, field)?),
            "maximum" => node.maximum = Some(number(value, field)?),
            "multipleOf" => node.multiple_of = Some(number(value, field)?),
            "pattern" => node.pattern = Some(string(value, field)?),
            "minLength" => node.min_length = Some(count(value, field)?),
            "maxLength" => node.max_length = Some(count(value, field)?),

            "minItems" => node.min_items = Some(count(value, field)?),
            "maxItems" => node.max_items = Some(count(value, field)?),
            "uniqueItems" => node.unique_items = boolean(value, field)?,
            // tuple validation has no dedicated field
            "items" if value.is_array() => {
                node.extra.insert(key.clone(), value.clone());
            }
            "items" => node.items = decode_at(value, draft, field)?.map(Box::new),
            "additionalItems" => {
                node.additional_items = decode_at(value, draft, field)?.map(Box::new)
            }

            "required" => {
                node.required = array(value, field)?
                    .iter()
                    .enumerate()
                    .map(|(i, item)| string(item, &format!("{}/{}", field, i)))
                    .collect::<Result<_>>()?
            }
            "minProperties" => node.min_properties = Some(count(value, field)?),
            "maxProperties" => node.max_properties = Some(count(value, field)?),
            "properties" => node.properties = schema_map(value, draft, field)?,
            "patternProperties" => node.pattern_properties = schema_map(value, draft, field)?,
            "additionalProperties" => {
                node.additional_properties = decode_at(value, draft, field)?.map(Box::new)
            }
            "unevaluatedProperties" => match value {
                Value::Bool(b) => node.unevaluated_properties = Some(*b),
                _ => {
                    node.extra.insert(key.clone(), value.clone());
                }
            },
            "$defs" => node.defs = schema_map(value, draft, field)?,
            "definitions" => node.definitions = schema_map(value, draft, field)?,

            _ => {
                node.extra.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(node)
}

fn required_schema(value: &Value, draft: Draft, path: &str) -> Result<SchemaNode> {
    decode_at(value, draft, path)?
        .ok_or_else(|| SchemaError::decode(path, "expected a schema object or boolean, found null"))
}

fn schema_list(value: &Value, draft: Draft, path: &str) -> Result<Vec<SchemaNode>> {
    array(value, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| required_schema(item, draft, &format!("{}/{}", path, i)))
        .collect()
}

fn schema_map(value: &Value, draft: Draft, path: &str) -> Result<BTreeMap<String, SchemaNode>> {
    let Value::Object(map) = value else {
        return Err(mismatch(path, "an object", value));
    };
    let mut out = BTreeMap::new();
    for (name, child) in map {
        let child_path = format!("{}/{}", path, escape_pointer(name));
        if let Some(node) = decode_at(child, draft, &child_path)? {
            out.insert(name.clone(), node);
        }
    }
    Ok(out)
}

fn string(value: &Value, path: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| mismatch(path, "a string", value))
}

fn boolean(value: &Value, path: &str) -> Result<bool> {
    value.as_bool().ok_or_else(|| mismatch(path, "a boolean", value))
}

fn number(value: &Value, path: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| mismatch(path, "a number", value))
}

fn count(value: &Value, path: &str) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| mismatch(path, "a non-negative integer", value))
}

fn array<'v>(value: &'v Value, path: &str) -> Result<&'v Vec<Value>> {
    value.as_array().ok_or_else(|| mismatch(path, "an array", value))
}

fn mismatch(path: &str, expected: &str, found: &Value) -> SchemaError {
    SchemaError::decode(path, format!("expected {}, found {}", expected, json_kind(found)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON pointer token escaping
pub(crate) fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_kinds() {
        for node in [SchemaNode::boolean(true), SchemaNode::boolean(false)] {
            let value = node.to_value(Draft::default());
            let decoded = SchemaNode::from_value(&value, Draft::default()).unwrap();
            assert_eq!(decoded, Some(node));
        }

        let mut object = SchemaNode::of_type("object");
        object.title = Some("Root".to_string());
        object.properties.insert("port".to_string(), SchemaNode::of_type("integer"));
        object.add_required("port");
        object.additional_properties = Some(Box::new(SchemaNode::boolean(false)));
        let value = object.to_value(Draft::default());
        assert_eq!(SchemaNode::from_value(&value, Draft::default()).unwrap(), Some(object));

        assert_eq!(SchemaNode::from_value(&Value::Null, Draft::default()).unwrap(), None);
    }

    #[test]
    fn test_encode_sorted_and_drops_empty() {
        let mut node = SchemaNode::of_type("object");
        node.properties.insert("empty".to_string(), SchemaNode::default());
        node.properties.insert("name".to_string(), SchemaNode::of_type("string"));
        node.defs.insert("unused".to_string(), SchemaNode::default());
        node.minimum = Some(1.0);
        node.maximum = Some(2.5);
        node.items_mut();

        let value = node.to_value(Draft::Draft2020);
        assert_eq!(
            value,
            json!({
                "maximum": 2.5,
                "minimum": 1,
                "properties": {"name": {"type": "string"}},
                "type": "object"
            })
        );
        let text = serde_json::to_string(&value).unwrap();
        assert!(text.find("maximum").unwrap() < text.find("type").unwrap());
    }

    #[test]
    fn test_type_list_and_single() {
        let mut node = SchemaNode::default();
        node.types = vec!["string".into(), "null".into()];
        assert_eq!(node.to_value(Draft::default()), json!({"type": ["string", "null"]}));

        let decoded = SchemaNode::from_value(&json!({"type": "integer"}), Draft::default())
            .unwrap()
            .unwrap();
        assert_eq!(decoded.types, vec!["integer"]);
    }

    #[test]
    fn test_draft4_identifier_keyword() {
        let mut node = SchemaNode::default();
        node.id = Some("https://example.com/values".to_string());
        assert_eq!(node.to_value(Draft::Draft4), json!({"id": "https://example.com/values"}));
        assert_eq!(node.to_value(Draft::Draft7), json!({"$id": "https://example.com/values"}));

        let decoded = SchemaNode::from_value(&json!({"id": "x"}), Draft::Draft4).unwrap().unwrap();
        assert_eq!(decoded.id.as_deref(), Some("x"));

        // in later drafts `id` is an ordinary unknown keyword
        let decoded = SchemaNode::from_value(&json!({"id": "x"}), Draft::Draft2020)
            .unwrap()
            .unwrap();
        assert!(decoded.id.is_none());
        assert_eq!(decoded.extra.get("id"), Some(&json!("x")));
    }

    #[test]
    fn test_unknown_keywords_pass_through() {
        let source = json!({
            "format": "uri",
            "if": {"properties": {"a": {"const": 1}}},
            "items": [{"type": "string"}],
            "type": "string"
        });
        let node = SchemaNode::from_value(&source, Draft::default()).unwrap().unwrap();
        assert!(node.items.is_none());
        assert_eq!(node.to_value(Draft::default()), source);
    }

    #[test]
    fn test_decode_errors_name_field() {
        let bad_items = json!({"properties": {"a": {"items": 5}}});
        let err = SchemaNode::from_value(&bad_items, Draft::default()).unwrap_err();
        match err {
            SchemaError::Decode { field, .. } => assert_eq!(field, "#/properties/a/items"),
            other => panic!("unexpected error {:?}", other),
        }

        let err =
            SchemaNode::from_value(&json!({"allOf": [true, null]}), Draft::default()).unwrap_err();
        assert!(err.to_string().contains("#/allOf/1"));

        let err = SchemaNode::from_value(&json!("string"), Draft::default()).unwrap_err();
        assert!(err.to_string().contains("invalid schema at #"));

        let err = SchemaNode::from_value(&json!({"minLength": -1}), Draft::default()).unwrap_err();
        assert!(err.to_string().contains("#/minLength"));
    }

    #[test]
    fn test_escape_pointer() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }
}
