//! Comment Directives
//!
//! Authors refine inferred schemas with `@schema` comments:
//!
//! ```yaml
//! # @schema maxLength: 63; pattern: ^[a-z-]+$
//! name: web
//! replicas: 1 # @schema minimum: 1; required: true
//! ```
//!
//! [`comments`] picks the comment lines that belong to an entry, [`Directives`]
//! tokenizes them lazily into `(key, value)` clauses and [`apply`] overlays
//! each clause onto the entry's freshly inferred schema node.

use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::str::Split;

use crate::classify::{classify, ScalarKind};
use crate::document::Node;
use crate::error::{Result, SchemaError};
use crate::schema::codec::decode_at;
use crate::schema::{Draft, SchemaNode};

const MARKER: &str = "@schema";

// =============================================================================
// Comment selection
// =============================================================================

/// Comment lines governing an entry.
///
/// The value's trailing comment wins, then the key's trailing comment, then
/// the last paragraph of the key's head comment. The key's foot comment is
/// always appended. Sequence items have no key; the item itself is the owner.
pub fn comments(key: Option<&Node>, value: &Node) -> Vec<String> {
    let owner = key.unwrap_or(value);
    let chosen = if !value.line_comment.is_empty() {
        value.line_comment.as_str()
    } else if !owner.line_comment.is_empty() {
        owner.line_comment.as_str()
    } else {
        last_paragraph(&owner.head_comment)
    };
    chosen
        .lines()
        .chain(owner.foot_comment.lines())
        .map(str::to_string)
        .collect()
}

fn last_paragraph(text: &str) -> &str {
    text.rsplit("\n\n").next().unwrap_or_default()
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Lazy `(key, value)` clauses of the `@schema` lines in a comment block
pub struct Directives<'a> {
    lines: &'a [String],
    next_line: usize,
    clauses: Option<Split<'a, char>>,
}

impl<'a> Directives<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Self {
            lines,
            next_line: 0,
            clauses: None,
        }
    }
}

impl<'a> Iterator for Directives<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(clauses) = &mut self.clauses {
                for clause in clauses.by_ref() {
                    let clause = clause.trim();
                    if clause.is_empty() {
                        continue;
                    }
                    return Some(match clause.split_once(':') {
                        Some((key, value)) => (key.trim(), value.trim()),
                        None => (clause, ""),
                    });
                }
                self.clauses = None;
            }

            let line = self.lines.get(self.next_line)?;
            self.next_line += 1;
            self.clauses = directive_body(line).map(|body| body.split(';'));
        }
    }
}

/// Shorthand for [`Directives::new`]
pub fn directives(lines: &[String]) -> Directives<'_> {
    Directives::new(lines)
}

/// Text after the marker; the marker must be followed by whitespace
fn directive_body(line: &str) -> Option<&str> {
    let start = line.find(MARKER)? + MARKER.len();
    let body = &line[start..];
    body.starts_with(char::is_whitespace).then_some(body)
}

// =============================================================================
// List values
// =============================================================================

/// Parse a list directive value such as `[string, "null"]` or `a, b`.
///
/// Commas inside quotes or nested brackets do not split. With `strings_only`
/// every element is kept as text (`null` stays the string `"null"`);
/// otherwise unquoted `null`, numbers, booleans and JSON containers are typed.
pub fn parse_list(value: &str, strings_only: bool) -> Vec<Value> {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    split_top_level(inner)
        .into_iter()
        .map(str::trim)
        .filter(|element| !element.is_empty())
        .map(|element| list_element(element, strings_only))
        .collect()
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn list_element(raw: &str, strings_only: bool) -> Value {
    if let Some(text) = unquote(raw) {
        return Value::String(text);
    }
    if strings_only {
        return Value::String(raw.to_string());
    }
    if raw == "null" {
        return Value::Null;
    }
    if raw.starts_with(['{', '[']) {
        if let Ok(json) = serde_json::from_str(raw) {
            return json;
        }
    }
    typed_scalar(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn typed_scalar(raw: &str) -> Option<Value> {
    match classify(raw) {
        ScalarKind::Integer => raw.parse::<i64>().ok().map(Value::from),
        ScalarKind::Number => raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        ScalarKind::Boolean => parse_bool(raw).map(Value::Bool),
        _ => None,
    }
}

fn unquote(raw: &str) -> Option<String> {
    if raw.len() < 2 {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    if raw.starts_with('"') && raw.ends_with('"') {
        return Some(serde_json::from_str::<String>(raw).unwrap_or_else(|_| inner.to_string()));
    }
    if raw.starts_with('\'') && raw.ends_with('\'') {
        return Some(inner.replace("''", "'"));
    }
    None
}

fn strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Application
// =============================================================================

/// Apply one clause to `node`.
///
/// Returns `Some(flag)` when the clause decides whether the entry is
/// required. Malformed numbers and booleans leave the node unchanged;
/// malformed JSON in a compound clause is an error.
pub fn apply(node: &mut SchemaNode, key: &str, value: &str) -> Result<Option<bool>> {
    match key {
        // Lists
        "type" => node.types = strings(parse_list(value, true)),
        "enum" => node.enum_values = parse_list(value, false),
        "examples" => node.examples = parse_list(value, false),
        "item" => node.items_mut().types = strings(parse_list(value, true)),
        "itemEnum" => node.items_mut().enum_values = parse_list(value, false),

        // Numbers
        "minimum" => set_number(&mut node.minimum, value),
        "maximum" => set_number(&mut node.maximum, value),
        "multipleOf" => set_number(&mut node.multiple_of, value),
        "minLength" => set_parsed(&mut node.min_length, value),
        "maxLength" => set_parsed(&mut node.max_length, value),
        "minItems" => set_parsed(&mut node.min_items, value),
        "maxItems" => set_parsed(&mut node.max_items, value),
        "minProperties" => set_parsed(&mut node.min_properties, value),
        "maxProperties" => set_parsed(&mut node.max_properties, value),

        // Booleans
        "required" => return Ok(parse_bool(value)),
        "uniqueItems" => set_flag(&mut node.unique_items, value),
        "readOnly" => set_flag(&mut node.read_only, value),
        "hidden" => set_flag(&mut node.hidden, value),
        "skipProperties" => set_flag(&mut node.skip_properties, value),
        "unevaluatedProperties" => {
            if let Some(flag) = parse_bool(value) {
                node.unevaluated_properties = Some(flag);
            }
        }

        // Strings
        "title" => node.title = Some(value.to_string()),
        "description" => node.description = Some(value.to_string()),
        "pattern" => node.pattern = Some(value.to_string()),
        "$id" => node.id = Some(value.to_string()),
        "$ref" => node.reference = Some(value.to_string()),
        "$comment" => node.comment = Some(value.to_string()),
        "itemRef" => node.items_mut().reference = Some(value.to_string()),
        "default" => node.default = Some(json_or_text(value)),
        "const" => node.constant = Some(json_or_text(value)),

        // Compound
        "additionalProperties" => match parse_bool(value) {
            Some(flag) => node.additional_properties = Some(Box::new(SchemaNode::boolean(flag))),
            None if value.starts_with('{') => {
                node.additional_properties = Some(Box::new(json_schema(key, value)?))
            }
            None => {}
        },
        "itemProperties" => {
            let properties = json_schema_map(key, value)?;
            let items = node.items_mut();
            if items.types.is_empty() {
                items.set_type("object");
            }
            items.properties = properties;
        }
        "patternProperties" => node.pattern_properties = json_schema_map(key, value)?,
        "allOf" => node.all_of = json_schema_list(key, value)?,
        "anyOf" => node.any_of = json_schema_list(key, value)?,
        "oneOf" => node.one_of = json_schema_list(key, value)?,
        "not" => node.not = Some(Box::new(json_schema(key, value)?)),

        _ => tracing::trace!(key, "ignoring unknown @schema directive"),
    }
    Ok(None)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn set_flag(field: &mut bool, value: &str) {
    if let Some(flag) = parse_bool(value) {
        *field = flag;
    }
}

fn set_parsed<T: std::str::FromStr>(field: &mut Option<T>, value: &str) {
    if let Ok(parsed) = value.parse() {
        *field = Some(parsed);
    }
}

/// `NaN`, `inf` and overflowing literals have no JSON form and are skipped
fn set_number(field: &mut Option<f64>, value: &str) {
    if let Some(parsed) = value.parse::<f64>().ok().filter(|n| n.is_finite()) {
        *field = Some(parsed);
    }
}

fn json_or_text(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn parse_json(key: &str, value: &str) -> Result<Value> {
    serde_json::from_str(value).map_err(|source| SchemaError::Directive {
        key: key.to_string(),
        source,
    })
}

fn json_schema(key: &str, value: &str) -> Result<SchemaNode> {
    let path = format!("@schema {}", key);
    decode_at(&parse_json(key, value)?, Draft::default(), &path)?
        .ok_or_else(|| SchemaError::decode(path, "expected a schema object or boolean, found null"))
}

fn json_schema_list(key: &str, value: &str) -> Result<Vec<SchemaNode>> {
    let path = format!("@schema {}", key);
    let Value::Array(items) = parse_json(key, value)? else {
        return Err(SchemaError::decode(path, "expected a JSON array of schemas"));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{}/{}", path, i);
        match decode_at(item, Draft::default(), &item_path)? {
            Some(node) => out.push(node),
            None => return Err(SchemaError::decode(item_path, "expected a schema, found null")),
        }
    }
    Ok(out)
}

fn json_schema_map(key: &str, value: &str) -> Result<BTreeMap<String, SchemaNode>> {
    let path = format!("@schema {}", key);
    let Value::Object(map) = parse_json(key, value)? else {
        return Err(SchemaError::decode(path, "expected a JSON object of schemas"));
    };
    let mut out = BTreeMap::new();
    for (name, child) in &map {
        if let Some(node) = decode_at(child, Draft::default(), &format!("{}/{}", path, name))? {
            out.insert(name.clone(), node);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_str;
    use serde_json::json;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(text: &[&str]) -> Vec<(String, String)> {
        let lines = lines(text);
        directives(&lines)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_tokenizer_basic() {
        assert_eq!(
            pairs(&["# @schema type:string; foo:bar"]),
            vec![pair("type", "string"), pair("foo", "bar")]
        );
    }

    #[test]
    fn test_tokenizer_requires_marker_and_space() {
        assert!(pairs(&["# type: string"]).is_empty());
        assert!(pairs(&["# @schematype:string"]).is_empty());
        assert!(pairs(&["# @schema"]).is_empty());
    }

    #[test]
    fn test_tokenizer_clause_shapes() {
        assert_eq!(
            pairs(&["# @schema hidden; :orphan; pattern: ^a:b$ ;;"]),
            vec![pair("hidden", ""), pair("", "orphan"), pair("pattern", "^a:b$")]
        );
    }

    #[test]
    fn test_tokenizer_spans_lines_lazily() {
        let lines = lines(&[
            "# @schema title: First",
            "# plain prose",
            "# @schema required: true; minimum: 1",
        ]);
        let all: Vec<_> = directives(&lines).collect();
        assert_eq!(all, vec![("title", "First"), ("required", "true"), ("minimum", "1")]);

        let mut iter = directives(&lines);
        assert_eq!(iter.next(), Some(("title", "First")));
        assert_eq!(iter.next_line, 1);
    }

    #[test]
    fn test_comments_precedence() {
        let doc = parse_str(
            "# old paragraph\n\n# @schema title: Head\nvalue: 1 # @schema title: Line\nother: 2\n# @schema minimum: 1\n",
        )
        .unwrap();
        let crate::document::NodeKind::Mapping(entries) = &doc.kind else {
            panic!("expected mapping");
        };

        let (key, value) = &entries[0];
        assert_eq!(comments(Some(key), value), vec!["# @schema title: Line"]);

        let mut bare = value.clone();
        bare.line_comment.clear();
        assert_eq!(comments(Some(key), &bare), vec!["# @schema title: Head"]);

        let (key, value) = &entries[1];
        assert_eq!(comments(Some(key), value), vec!["# @schema minimum: 1"]);
    }

    #[test]
    fn test_parse_list_null_handling() {
        assert_eq!(
            parse_list(r#"["a", null, "b"]"#, false),
            vec![json!("a"), Value::Null, json!("b")]
        );
        assert_eq!(
            parse_list(r#"["a", null, "b"]"#, true),
            vec![json!("a"), json!("null"), json!("b")]
        );
    }

    #[test]
    fn test_parse_list_nesting_and_types() {
        assert_eq!(
            parse_list(r#"[1, 2.5, true, "3", 'it''s', {"a": [1, 2]}, "x,y", plain]"#, false),
            vec![
                json!(1),
                json!(2.5),
                json!(true),
                json!("3"),
                json!("it's"),
                json!({"a": [1, 2]}),
                json!("x,y"),
                json!("plain"),
            ]
        );
        assert_eq!(parse_list("string, integer", true), vec![json!("string"), json!("integer")]);
        assert!(parse_list("[]", false).is_empty());
    }

    #[test]
    fn test_apply_lists_and_strings() {
        let mut node = SchemaNode::of_type("string");
        apply(&mut node, "type", "[string, null]").unwrap();
        assert_eq!(node.types, vec!["string", "null"]);

        apply(&mut node, "enum", "[a, b, null]").unwrap();
        assert_eq!(node.enum_values, vec![json!("a"), json!("b"), Value::Null]);

        apply(&mut node, "title", "Image tag").unwrap();
        apply(&mut node, "default", r#"{"a": 1}"#).unwrap();
        apply(&mut node, "const", "fixed").unwrap();
        assert_eq!(node.title.as_deref(), Some("Image tag"));
        assert_eq!(node.default, Some(json!({"a": 1})));
        assert_eq!(node.constant, Some(json!("fixed")));
    }

    #[test]
    fn test_apply_numbers_fail_silently() {
        let mut node = SchemaNode::default();
        apply(&mut node, "minimum", "1.5").unwrap();
        apply(&mut node, "maxLength", "10").unwrap();
        apply(&mut node, "minItems", "-1").unwrap();
        apply(&mut node, "maximum", "lots").unwrap();
        assert_eq!(node.minimum, Some(1.5));
        assert_eq!(node.max_length, Some(10));
        assert_eq!(node.min_items, None);
        assert_eq!(node.maximum, None);
    }

    #[test]
    fn test_apply_skips_non_finite_numbers() {
        let mut node = SchemaNode::of_type("number");
        apply(&mut node, "minimum", "NaN").unwrap();
        apply(&mut node, "maximum", "inf").unwrap();
        apply(&mut node, "multipleOf", "1e400").unwrap();
        assert_eq!(node.minimum, None);
        assert_eq!(node.maximum, None);
        assert_eq!(node.multiple_of, None);
        assert_eq!(node.to_value(Draft::default()), json!({"type": "number"}));

        apply(&mut node, "maximum", "1e3").unwrap();
        assert_eq!(node.maximum, Some(1000.0));
    }

    #[test]
    fn test_apply_booleans_and_required() {
        let mut node = SchemaNode::default();
        assert_eq!(apply(&mut node, "required", "true").unwrap(), Some(true));
        assert_eq!(apply(&mut node, "required", "false").unwrap(), Some(false));
        assert_eq!(apply(&mut node, "required", "yes").unwrap(), None);

        apply(&mut node, "hidden", "true").unwrap();
        apply(&mut node, "uniqueItems", "TRUE").unwrap();
        assert!(node.hidden);
        assert!(!node.unique_items);
        assert!(node.is_zero());
    }

    #[test]
    fn test_apply_additional_properties() {
        let mut node = SchemaNode::of_type("object");
        apply(&mut node, "additionalProperties", "false").unwrap();
        assert_eq!(node.additional_properties.as_deref(), Some(&SchemaNode::boolean(false)));

        apply(&mut node, "additionalProperties", r#"{"type": "string"}"#).unwrap();
        assert_eq!(node.additional_properties.as_deref(), Some(&SchemaNode::of_type("string")));
    }

    #[test]
    fn test_apply_item_directives() {
        let mut node = SchemaNode::of_type("array");
        apply(&mut node, "itemProperties", r#"{"name": {"type": "string"}}"#).unwrap();
        apply(&mut node, "itemEnum", "[1, 2]").unwrap();
        let items = node.items.as_deref().unwrap();
        assert!(items.has_type("object"));
        assert_eq!(items.properties["name"], SchemaNode::of_type("string"));
        assert_eq!(items.enum_values, vec![json!(1), json!(2)]);

        apply(&mut node, "itemRef", "./item.schema.json").unwrap();
        assert_eq!(node.items.as_deref().unwrap().reference.as_deref(), Some("./item.schema.json"));
    }

    #[test]
    fn test_apply_combinators() {
        let mut node = SchemaNode::default();
        apply(&mut node, "anyOf", r#"[{"type": "string"}, {"type": "null"}]"#).unwrap();
        apply(&mut node, "not", "false").unwrap();
        apply(&mut node, "patternProperties", r#"{"^x-": true}"#).unwrap();
        assert_eq!(node.any_of.len(), 2);
        assert_eq!(node.not.as_deref(), Some(&SchemaNode::boolean(false)));
        assert_eq!(node.pattern_properties["^x-"], SchemaNode::boolean(true));
    }

    #[test]
    fn test_apply_malformed_json_is_error() {
        let mut node = SchemaNode::default();
        let err = apply(&mut node, "allOf", "[{broken").unwrap_err();
        match err {
            SchemaError::Directive { key, .. } => assert_eq!(key, "allOf"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_apply_unknown_key_ignored() {
        let mut node = SchemaNode::default();
        assert_eq!(apply(&mut node, "fancyKeyword", "whatever").unwrap(), None);
        assert!(node.is_zero());
    }
}
