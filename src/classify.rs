//! Scalar Type Mapping
//!
//! Classifies a YAML plain scalar into its JSON Schema type following the
//! YAML 1.2 core schema. Quoting and explicit tags are resolved upstream.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+)$").unwrap());

static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?|[-+]?\.(inf|Inf|INF)|\.(nan|NaN|NAN))$")
        .unwrap()
});

/// JSON scalar type of a YAML literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
}

impl ScalarKind {
    /// JSON Schema `type` name
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Null => "null",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Integer => "integer",
            ScalarKind::Number => "number",
            ScalarKind::String => "string",
        }
    }

    /// Resolve a YAML core tag (`!!str`, `tag:yaml.org,2002:int`, ...)
    pub fn from_tag(tag: &str) -> Option<Self> {
        let name = tag
            .strip_prefix("tag:yaml.org,2002:")
            .or_else(|| tag.strip_prefix("!!"))?;
        match name {
            "null" => Some(ScalarKind::Null),
            "bool" => Some(ScalarKind::Boolean),
            "int" => Some(ScalarKind::Integer),
            "float" => Some(ScalarKind::Number),
            "str" | "binary" | "timestamp" => Some(ScalarKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a plain scalar literal
pub fn classify(literal: &str) -> ScalarKind {
    match literal {
        "" | "~" | "null" | "Null" | "NULL" => ScalarKind::Null,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => ScalarKind::Boolean,
        _ if INTEGER.is_match(literal) => ScalarKind::Integer,
        _ if FLOAT.is_match(literal) => ScalarKind::Number,
        _ => ScalarKind::String,
    }
}
