//! Error types for schema generation and bundling

use std::path::PathBuf;
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema generation errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}:{column}: {message}")]
    Yaml {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("failed to parse schema file {path}: {message}")]
    SchemaFile { path: PathBuf, message: String },

    #[error("invalid JSON in @schema {key}: {source}")]
    Directive {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema at {field}: {message}")]
    Decode { field: String, message: String },

    #[error("invalid draft version {0}: must be one of 4, 6, 7, 2019, 2020")]
    InvalidDraft(i64),

    #[error("$ref {reference} resolves to {resolved}, outside of bundle root {root}")]
    PathEscape {
        reference: String,
        resolved: PathBuf,
        root: PathBuf,
    },

    #[error("circular $ref detected: {chain}")]
    Cycle { chain: String },

    #[error("$ref {reference} uses the $k8s/ alias but no k8s schema version is configured")]
    MissingK8sVersion { reference: String },

    #[error("invalid indent {0}: must be between 0 and 16")]
    InvalidIndent(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SchemaError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(field: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Decode {
            field: field.into(),
            message: message.into(),
        }
    }
}
