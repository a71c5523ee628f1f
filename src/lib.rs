//! values-schema
//!
//! Generates a JSON Schema from one or more YAML values files. Types are
//! inferred from the values themselves and refined by `@schema` comments;
//! local `$ref` targets can be bundled into a single self-contained document.
//!
//! ## Pipeline
//!
//! ```text
//! values.yaml ─┐
//! values.*.yaml┴─> document::load_files ─> merge ─> infer ─> root metadata
//!                                                               │
//!                      render <─ bundle / expand $k8s aliases <─┘
//! ```
//!
//! ## Example
//!
//! ```yaml
//! image:
//!   # @schema required: true; pattern: ^[a-z0-9./-]+$
//!   repository: nginx
//!   tag: "1.25" # @schema type: [string, null]
//! replicas: 1 # @schema minimum: 1
//! ```

pub mod bundle;
pub mod classify;
pub mod config;
pub mod directive;
pub mod document;
pub mod error;
pub mod generate;
pub mod infer;
pub mod schema;

pub use bundle::{bundle, expand_aliases, BundleOptions, RefAliases};
pub use classify::{classify, ScalarKind};
pub use config::GeneratorConfig;
pub use document::{load_files, merge, parse_str, Node};
pub use error::{Result, SchemaError};
pub use generate::Generator;
pub use infer::SchemaInferrer;
pub use schema::{schema_url, Draft, SchemaKind, SchemaNode};
