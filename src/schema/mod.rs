//! Schema Node Model
//!
//! An in-memory JSON Schema fragment. A node is either one of the two boolean
//! schemas or an object schema carrying keyword fields; the distinction is a
//! closed [`SchemaKind`] tag rather than a runtime shape check.
//!
//! Nodes are built by inference, refined in place by directives, and finally
//! rewritten by the bundler. [`codec`] converts them to and from JSON.

pub mod codec;

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SchemaError};

// =============================================================================
// Drafts
// =============================================================================

/// Supported JSON Schema drafts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
    Draft2019,
    #[default]
    Draft2020,
}

impl Draft {
    /// Resolve a draft selector (4, 6, 7, 2019, 2020)
    pub fn from_number(number: i64) -> Result<Self> {
        match number {
            4 => Ok(Draft::Draft4),
            6 => Ok(Draft::Draft6),
            7 => Ok(Draft::Draft7),
            2019 => Ok(Draft::Draft2019),
            2020 => Ok(Draft::Draft2020),
            other => Err(SchemaError::InvalidDraft(other)),
        }
    }

    pub fn number(&self) -> i64 {
        match self {
            Draft::Draft4 => 4,
            Draft::Draft6 => 6,
            Draft::Draft7 => 7,
            Draft::Draft2019 => 2019,
            Draft::Draft2020 => 2020,
        }
    }

    /// The `$schema` URL identifying this draft
    pub fn schema_url(&self) -> &'static str {
        match self {
            Draft::Draft4 => "http://json-schema.org/draft-04/schema#",
            Draft::Draft6 => "http://json-schema.org/draft-06/schema#",
            Draft::Draft7 => "http://json-schema.org/draft-07/schema#",
            Draft::Draft2019 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft2020 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Keyword carrying a schema's identifier
    pub fn id_keyword(&self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            _ => "$id",
        }
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// `$schema` URL for a numeric draft selector
pub fn schema_url(draft: i64) -> Result<&'static str> {
    Draft::from_number(draft).map(|d| d.schema_url())
}

// =============================================================================
// Schema nodes
// =============================================================================

/// Boolean/object duality of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchemaKind {
    #[default]
    Object,
    /// `true`: everything validates
    True,
    /// `false`: nothing validates
    False,
}

/// A JSON Schema fragment
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    kind: SchemaKind,

    // Identity
    pub schema: Option<String>,
    pub id: Option<String>,
    pub reference: Option<String>,
    pub comment: Option<String>,

    // Metadata
    pub title: Option<String>,
    pub description: Option<String>,
    pub read_only: bool,
    pub default: Option<Value>,
    pub examples: Vec<Value>,

    // Values
    pub types: Vec<String>,
    pub enum_values: Vec<Value>,
    pub constant: Option<Value>,

    // Combinators
    pub all_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
    pub one_of: Vec<SchemaNode>,
    pub not: Option<Box<SchemaNode>>,

    // Numbers and strings
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,

    // Arrays
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub items: Option<Box<SchemaNode>>,
    pub additional_items: Option<Box<SchemaNode>>,

    // Objects
    pub required: Vec<String>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub properties: BTreeMap<String, SchemaNode>,
    pub pattern_properties: BTreeMap<String, SchemaNode>,
    pub additional_properties: Option<Box<SchemaNode>>,
    pub unevaluated_properties: Option<bool>,
    pub defs: BTreeMap<String, SchemaNode>,
    pub definitions: BTreeMap<String, SchemaNode>,

    /// Keywords without a dedicated field, kept verbatim
    pub extra: BTreeMap<String, Value>,

    /// Do not infer `properties` for this mapping
    pub skip_properties: bool,
    /// Omit this node from its parent's `properties`
    pub hidden: bool,
}

impl SchemaNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `true` or `false` schema
    pub fn boolean(value: bool) -> Self {
        let mut node = Self::default();
        node.set_kind(if value { SchemaKind::True } else { SchemaKind::False });
        node
    }

    /// Object node with a single `type`
    pub fn of_type(name: &str) -> Self {
        let mut node = Self::default();
        node.set_type(name);
        node
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Switch kind; the boolean kinds drop every keyword field
    pub fn set_kind(&mut self, kind: SchemaKind) {
        if kind != SchemaKind::Object {
            let (skip_properties, hidden) = (self.skip_properties, self.hidden);
            *self = Self {
                skip_properties,
                hidden,
                ..Self::default()
            };
        }
        self.kind = kind;
    }

    /// True when the node would serialize to nothing. Transient flags are ignored.
    pub fn is_zero(&self) -> bool {
        let SchemaNode {
            kind,
            schema,
            id,
            reference,
            comment,
            title,
            description,
            read_only,
            default,
            examples,
            types,
            enum_values,
            constant,
            all_of,
            any_of,
            one_of,
            not,
            minimum,
            maximum,
            multiple_of,
            pattern,
            min_length,
            max_length,
            min_items,
            max_items,
            unique_items,
            items,
            additional_items,
            required,
            min_properties,
            max_properties,
            properties,
            pattern_properties,
            additional_properties,
            unevaluated_properties,
            defs,
            definitions,
            extra,
            skip_properties: _,
            hidden: _,
        } = self;

        *kind == SchemaKind::Object
            && schema.is_none()
            && id.is_none()
            && reference.is_none()
            && comment.is_none()
            && title.is_none()
            && description.is_none()
            && !read_only
            && default.is_none()
            && examples.is_empty()
            && types.is_empty()
            && enum_values.is_empty()
            && constant.is_none()
            && all_of.is_empty()
            && any_of.is_empty()
            && one_of.is_empty()
            && not.is_none()
            && minimum.is_none()
            && maximum.is_none()
            && multiple_of.is_none()
            && pattern.is_none()
            && min_length.is_none()
            && max_length.is_none()
            && min_items.is_none()
            && max_items.is_none()
            && !unique_items
            && zero_or_absent(items)
            && zero_or_absent(additional_items)
            && required.is_empty()
            && min_properties.is_none()
            && max_properties.is_none()
            && properties.values().all(SchemaNode::is_zero)
            && pattern_properties.values().all(SchemaNode::is_zero)
            && zero_or_absent(additional_properties)
            && unevaluated_properties.is_none()
            && defs.values().all(SchemaNode::is_zero)
            && definitions.values().all(SchemaNode::is_zero)
            && extra.is_empty()
    }

    /// Replace `type` with a single name
    pub fn set_type(&mut self, name: &str) {
        self.types = vec![name.to_string()];
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Append to `type` unless already listed
    pub fn add_type(&mut self, name: &str) {
        if !self.has_type(name) {
            self.types.push(name.to_string());
        }
    }

    /// Append to `required` unless already listed
    pub fn add_required(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    /// The `items` node, created on first use
    pub fn items_mut(&mut self) -> &mut SchemaNode {
        self.items.get_or_insert_with(Box::default)
    }

    /// Direct sub-schemas in traversal order: properties, items,
    /// additionalItems, additionalProperties, patternProperties, $defs,
    /// definitions, allOf, anyOf, oneOf, not
    pub fn subschemas(&self) -> Vec<&SchemaNode> {
        let mut out: Vec<&SchemaNode> = self.properties.values().collect();
        out.extend(self.items.as_deref());
        out.extend(self.additional_items.as_deref());
        out.extend(self.additional_properties.as_deref());
        out.extend(self.pattern_properties.values());
        out.extend(self.defs.values());
        out.extend(self.definitions.values());
        out.extend(&self.all_of);
        out.extend(&self.any_of);
        out.extend(&self.one_of);
        out.extend(self.not.as_deref());
        out
    }

    /// Mutable counterpart of [`SchemaNode::subschemas`], same order
    pub fn subschemas_mut(&mut self) -> Vec<&mut SchemaNode> {
        let SchemaNode {
            properties,
            items,
            additional_items,
            additional_properties,
            pattern_properties,
            defs,
            definitions,
            all_of,
            any_of,
            one_of,
            not,
            ..
        } = self;

        let mut out: Vec<&mut SchemaNode> = properties.values_mut().collect();
        out.extend(items.as_deref_mut());
        out.extend(additional_items.as_deref_mut());
        out.extend(additional_properties.as_deref_mut());
        out.extend(pattern_properties.values_mut());
        out.extend(defs.values_mut());
        out.extend(definitions.values_mut());
        out.extend(all_of.iter_mut());
        out.extend(any_of.iter_mut());
        out.extend(one_of.iter_mut());
        out.extend(not.as_deref_mut());
        out
    }
}

fn zero_or_absent(node: &Option<Box<SchemaNode>>) -> bool {
    node.as_deref().map_or(true, SchemaNode::is_zero)
}
