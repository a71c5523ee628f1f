//! Generation Pipeline
//!
//! load → merge → infer → root metadata → alias expansion or bundling → render
//!
//! [`Generator`] owns a validated [`GeneratorConfig`] and runs each step in
//! order. Rendering is separate from writing so `--check` can compare the
//! result against the file on disk without touching it.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use similar::TextDiff;
use std::fs;
use std::io::ErrorKind;

use crate::bundle::{self, BundleOptions, RefAliases};
use crate::config::GeneratorConfig;
use crate::document::{self, Node};
use crate::error::{Result, SchemaError};
use crate::infer::SchemaInferrer;
use crate::schema::{Draft, SchemaNode};

/// Largest accepted output indentation
pub const MAX_INDENT: usize = 16;

/// Schema generator for one configuration
#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
    draft: Draft,
}

impl Generator {
    /// Validate the configuration and build a generator
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let draft = Draft::from_number(config.schema.draft)?;
        if config.output.indent > MAX_INDENT {
            return Err(SchemaError::InvalidIndent(config.output.indent));
        }
        Ok(Self { config, draft })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// Load the configured values files and build the final schema
    pub fn generate(&self) -> Result<SchemaNode> {
        let tree = document::load_files(&self.config.input.values)?;
        self.generate_from_tree(&tree)
    }

    /// Build the final schema from an already merged values tree
    pub fn generate_from_tree(&self, tree: &Node) -> Result<SchemaNode> {
        let settings = &self.config.schema;
        let inferrer = SchemaInferrer::new()
            .no_additional_properties(settings.no_additional_properties)
            .use_helm_docs(settings.use_helm_docs);

        let mut schema = inferrer.infer_document(tree)?;
        self.apply_root(&mut schema);

        let aliases = RefAliases {
            k8s_schema_url: settings.k8s_schema_url.clone(),
            k8s_schema_version: settings.k8s_schema_version.clone(),
        };
        if self.config.bundle.enabled {
            let options = BundleOptions {
                root: self.config.bundle_root(),
                without_id: self.config.bundle.without_id,
                draft: self.draft,
                aliases,
            };
            bundle::bundle(&mut schema, &options)?;
        } else {
            bundle::expand_aliases(&mut schema, &aliases)?;
        }

        tracing::debug!(
            properties = schema.properties.len(),
            required = schema.required.len(),
            "generated schema"
        );
        Ok(schema)
    }

    /// Root `$schema` plus configured metadata
    fn apply_root(&self, schema: &mut SchemaNode) {
        let root = &self.config.schema.root;
        schema.schema = Some(self.draft.schema_url().to_string());
        if let Some(id) = &root.id {
            schema.id = Some(id.clone());
        }
        if let Some(reference) = &root.reference {
            schema.reference = Some(reference.clone());
        }
        if let Some(title) = &root.title {
            schema.title = Some(title.clone());
        }
        if let Some(description) = &root.description {
            schema.description = Some(description.clone());
        }
        if let Some(allowed) = root.additional_properties {
            schema.additional_properties = Some(Box::new(SchemaNode::boolean(allowed)));
        }
    }

    /// Serialize with sorted keys, the configured indent and a trailing newline
    pub fn render(&self, schema: &SchemaNode) -> Result<String> {
        let value = schema.to_value(self.draft);
        let indent = " ".repeat(self.config.output.indent);
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut serializer)?;

        let mut rendered = String::from_utf8_lossy(&buf).into_owned();
        rendered.push('\n');
        Ok(rendered)
    }

    /// Unified diff between the output file and `rendered`, `None` when identical.
    /// A missing output file compares as empty.
    pub fn check(&self, rendered: &str) -> Result<Option<String>> {
        let path = &self.config.output.path;
        let current = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(SchemaError::io(path, e)),
        };
        if current == rendered {
            return Ok(None);
        }

        let diff = TextDiff::from_lines(current.as_str(), rendered)
            .unified_diff()
            .context_radius(3)
            .header(&path.display().to_string(), "generated")
            .to_string();
        Ok(Some(diff))
    }

    /// Write `rendered` to the output file
    pub fn write(&self, rendered: &str) -> Result<()> {
        let path = &self.config.output.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SchemaError::io(parent, e))?;
        }
        fs::write(path, rendered).map_err(|e| SchemaError::io(path, e))?;
        tracing::info!(path = %path.display(), "wrote schema");
        Ok(())
    }
}
