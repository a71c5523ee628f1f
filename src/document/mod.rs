//! YAML Document Model
//!
//! A YAML node tree that keeps comments attached to the nodes they annotate.
//! Schema inference walks this tree instead of plain values so that every
//! `@schema` directive stays addressable per key.
//!
//! ## Comment slots
//!
//! ```text
//! # head comment of `image`        <- head_comment (key node)
//! image:                           <- line_comment on key when value is a block
//!   repository: nginx # trailing   <- line_comment (value node)
//!   # foot comment of `repository` <- foot_comment (key node)
//! ```

pub mod merge;
mod parser;

pub use merge::merge;

use std::fmt;
use std::path::Path;

use crate::classify::{classify, ScalarKind};
use crate::error::{Result, SchemaError};

/// Presentation style of a scalar in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    /// Quoted and block scalars are always strings
    pub fn is_plain(&self) -> bool {
        matches!(self, ScalarStyle::Plain)
    }
}

/// Scalar text together with its style
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
}

/// Structural content of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    /// Ordered key/value pairs, in document order
    Mapping(Vec<(Node, Node)>),
}

/// A YAML node with position and comments
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Explicit tag (`!!str`, `!custom`), if any
    pub tag: Option<String>,
    /// 1-based line of the node's first character
    pub line: usize,
    /// 1-based column of the node's first character
    pub column: usize,
    pub head_comment: String,
    pub line_comment: String,
    pub foot_comment: String,
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeKind::Scalar(Scalar::default()), 0, 0)
    }
}

impl Node {
    pub fn new(kind: NodeKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            tag: None,
            line,
            column,
            head_comment: String::new(),
            line_comment: String::new(),
            foot_comment: String::new(),
        }
    }

    /// Create a scalar node
    pub fn scalar(value: impl Into<String>, style: ScalarStyle) -> Self {
        Self::new(
            NodeKind::Scalar(Scalar {
                value: value.into(),
                style,
            }),
            0,
            0,
        )
    }

    /// Create an empty mapping node
    pub fn mapping() -> Self {
        Self::new(NodeKind::Mapping(Vec::new()), 0, 0)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a scalar node, used for mapping keys
    pub fn text(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.value.as_str())
    }

    /// Look up a mapping value by key text
    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.kind {
            NodeKind::Mapping(pairs) => pairs
                .iter()
                .find(|(k, _)| k.text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// A document that holds nothing but (optionally) comments
    pub fn is_empty_document(&self) -> bool {
        match &self.kind {
            NodeKind::Scalar(s) => s.style.is_plain() && s.value.is_empty() && self.tag.is_none(),
            _ => false,
        }
    }

    /// JSON type of a scalar node, honouring quoting and core tags
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        let scalar = self.as_scalar()?;
        if let Some(kind) = self.tag.as_deref().and_then(ScalarKind::from_tag) {
            return Some(kind);
        }
        if !scalar.style.is_plain() || self.tag.is_some() {
            return Some(ScalarKind::String);
        }
        Some(classify(&scalar.value))
    }

    /// Two mapping keys name the same entry
    pub fn same_key(&self, other: &Node) -> bool {
        match (self.as_scalar(), other.as_scalar()) {
            (Some(a), Some(b)) => a.value == b.value,
            _ => self.kind == other.kind,
        }
    }

    /// Take over every non-empty comment slot of `other`
    pub fn inherit_comments(&mut self, other: &Node) {
        if !other.head_comment.is_empty() {
            self.head_comment = other.head_comment.clone();
        }
        if !other.line_comment.is_empty() {
            self.line_comment = other.line_comment.clone();
        }
        if !other.foot_comment.is_empty() {
            self.foot_comment = other.foot_comment.clone();
        }
    }
}

/// YAML syntax error with its 1-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse the first document of a YAML stream
pub fn parse_str(source: &str) -> std::result::Result<Node, ParseError> {
    parser::Parser::new(source).parse()
}

/// Read and parse one values file
pub fn load_file(path: &Path) -> Result<Node> {
    let content = std::fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
    parse_str(&content).map_err(|e| SchemaError::Yaml {
        path: path.display().to_string(),
        line: e.line,
        column: e.column,
        message: e.message,
    })
}

/// Read, parse and merge values files, later files overriding earlier ones
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Node> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading values file");
        documents.push(load_file(path)?);
    }
    Ok(merge(documents))
}
