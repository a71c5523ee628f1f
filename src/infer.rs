//! Schema Inference
//!
//! Walks a merged values tree and produces a schema tree. Structure comes
//! first (mapping → object, sequence → array, scalar → its YAML type); the
//! entry's `@schema` directives are applied afterwards so annotations always
//! win over inferred values.
//!
//! Array items are inferred from the first element. Every further element
//! widens `items.type` with its own type and contributes properties the
//! first element lacks.

use crate::classify::ScalarKind;
use crate::directive::{self, Directives};
use crate::document::{Node, NodeKind};
use crate::error::Result;
use crate::schema::{SchemaKind, SchemaNode};

/// Builds schema nodes from YAML nodes
#[derive(Debug, Clone, Default)]
pub struct SchemaInferrer {
    /// Close every inferred mapping with `additionalProperties: false`
    pub no_additional_properties: bool,
    /// Read `# -- text` helm-docs comments as descriptions
    pub use_helm_docs: bool,
}

impl SchemaInferrer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_additional_properties(mut self, enabled: bool) -> Self {
        self.no_additional_properties = enabled;
        self
    }

    pub fn use_helm_docs(mut self, enabled: bool) -> Self {
        self.use_helm_docs = enabled;
        self
    }

    /// Infer the schema of a whole document. An empty document is an empty object.
    pub fn infer_document(&self, root: &Node) -> Result<SchemaNode> {
        if root.is_empty_document() {
            let mut node = SchemaNode::of_type("object");
            self.close_object(&mut node);
            return Ok(node);
        }
        let (node, _) = self.infer(None, root)?;
        Ok(node)
    }

    /// Infer the schema of one entry, returning it with its requiredness
    pub fn infer(&self, key: Option<&Node>, value: &Node) -> Result<(SchemaNode, bool)> {
        let lines = directive::comments(key, value);
        let skip_properties = Directives::new(&lines)
            .filter(|(k, _)| *k == "skipProperties")
            .last()
            .is_some_and(|(_, v)| v == "true");

        let mut node = match &value.kind {
            NodeKind::Mapping(pairs) => {
                let mut node = SchemaNode::of_type("object");
                if !skip_properties {
                    self.infer_properties(&mut node, pairs)?;
                }
                node
            }
            NodeKind::Sequence(items) => {
                let mut node = SchemaNode::of_type("array");
                node.items = self.infer_items(items)?.map(Box::new);
                node
            }
            NodeKind::Scalar(_) => {
                let kind = value.scalar_kind().unwrap_or(ScalarKind::String);
                SchemaNode::of_type(kind.as_str())
            }
        };

        if self.use_helm_docs {
            if let Some(description) = helm_docs_description(key.unwrap_or(value)) {
                node.description = Some(description);
            }
        }

        let mut required = false;
        for (k, v) in Directives::new(&lines) {
            if let Some(flag) = directive::apply(&mut node, k, v)? {
                required = flag;
            }
        }

        if value.is_mapping() && !node.skip_properties {
            self.close_object(&mut node);
        }
        Ok((node, required))
    }

    fn infer_properties(&self, node: &mut SchemaNode, pairs: &[(Node, Node)]) -> Result<()> {
        for (key, value) in pairs {
            let Some(name) = key.text() else {
                tracing::debug!(line = key.line, "skipping non-scalar mapping key");
                continue;
            };
            let (child, required) = self.infer(Some(key), value)?;
            if child.hidden {
                continue;
            }
            if required {
                node.add_required(name);
            }
            node.properties.insert(name.to_string(), child);
        }
        Ok(())
    }

    fn infer_items(&self, items: &[Node]) -> Result<Option<SchemaNode>> {
        let Some((first, rest)) = items.split_first() else {
            return Ok(None);
        };
        let (mut representative, _) = self.infer(None, first)?;
        for item in rest {
            let (other, _) = self.infer(None, item)?;
            widen(&mut representative, other);
        }
        Ok(Some(representative))
    }

    fn close_object(&self, node: &mut SchemaNode) {
        if self.no_additional_properties
            && node.kind() == SchemaKind::Object
            && node.additional_properties.is_none()
        {
            node.additional_properties = Some(Box::new(SchemaNode::boolean(false)));
        }
    }
}

/// Fold a further array element into the representative item schema
fn widen(representative: &mut SchemaNode, other: SchemaNode) {
    if representative.kind() != SchemaKind::Object || other.kind() != SchemaKind::Object {
        return;
    }
    for name in &other.types {
        representative.add_type(name);
    }
    for (name, property) in other.properties {
        representative.properties.entry(name).or_insert(property);
    }
}

/// helm-docs `# -- text` description, with its continuation lines
fn helm_docs_description(owner: &Node) -> Option<String> {
    let paragraph = owner.head_comment.rsplit("\n\n").next()?;
    let mut description: Option<String> = None;
    for line in paragraph.lines() {
        let text = line.trim_start_matches('#').trim();
        match description.as_mut() {
            None => {
                if let Some(rest) = text.strip_prefix("--") {
                    description = Some(rest.trim().to_string());
                }
            }
            Some(desc) => {
                if text.starts_with('@') {
                    break;
                }
                if !desc.is_empty() && !text.is_empty() {
                    desc.push(' ');
                }
                desc.push_str(text);
            }
        }
    }
    description.filter(|d| !d.is_empty())
}
