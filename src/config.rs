//! Configuration management for values-schema
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (values-schema.toml)
//! - Environment variables (VALUES_SCHEMA__*)
//!
//! Command-line flags are applied on top by the binary.
//!
//! ## Example config file (values-schema.toml):
//! ```toml
//! [input]
//! values = ["values.yaml", "values.production.yaml"]
//!
//! [output]
//! path = "values.schema.json"
//! indent = 2
//!
//! [schema]
//! draft = 2020
//! no_additional_properties = true
//! k8s_schema_version = "v1.29.0"
//!
//! [schema.root]
//! title = "My chart values"
//! additional_properties = false
//!
//! [bundle]
//! enabled = true
//! root = "."
//! without_id = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bundle::DEFAULT_K8S_SCHEMA_URL;

/// Main configuration for schema generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Values files to read
    #[serde(default)]
    pub input: InputConfig,

    /// Where and how to write the schema
    #[serde(default)]
    pub output: OutputConfig,

    /// Schema generation settings
    #[serde(default)]
    pub schema: SchemaSettings,

    /// `$ref` bundling settings
    #[serde(default)]
    pub bundle: BundleConfig,
}

/// Input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Values files, merged in order; later files win
    #[serde(default = "default_values")]
    pub values: Vec<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Schema file to write
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Spaces per indentation level
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Schema generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
    /// JSON Schema draft (4, 6, 7, 2019, 2020)
    #[serde(default = "default_draft")]
    pub draft: i64,

    /// Close every object with `additionalProperties: false`
    #[serde(default)]
    pub no_additional_properties: bool,

    /// Use helm-docs `# --` comments as descriptions
    #[serde(default)]
    pub use_helm_docs: bool,

    /// URL template for `$k8s/` refs
    #[serde(default = "default_k8s_schema_url")]
    pub k8s_schema_url: String,

    /// Kubernetes version substituted into the template
    #[serde(default)]
    pub k8s_schema_version: Option<String>,

    /// Metadata for the root schema
    #[serde(default)]
    pub root: RootConfig,
}

/// Root schema metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, rename = "ref")]
    pub reference: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub additional_properties: Option<bool>,
}

/// Bundling configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Inline local `$ref` targets into `$defs`
    #[serde(default)]
    pub enabled: bool,

    /// Directory refs must stay within (default: current directory)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Rewrite refs to `#/$defs/...` instead of `$id`s
    #[serde(default)]
    pub without_id: bool,
}

// Default value functions
fn default_values() -> Vec<PathBuf> {
    vec![PathBuf::from("values.yaml")]
}

fn default_output_path() -> PathBuf {
    PathBuf::from("values.schema.json")
}

fn default_indent() -> usize {
    4
}

fn default_draft() -> i64 {
    2020
}

fn default_k8s_schema_url() -> String {
    DEFAULT_K8S_SCHEMA_URL.to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            values: default_values(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            indent: default_indent(),
        }
    }
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            draft: default_draft(),
            no_additional_properties: false,
            use_helm_docs: false,
            k8s_schema_url: default_k8s_schema_url(),
            k8s_schema_version: None,
            root: RootConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding an explicit file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "values-schema.toml",
            ".values-schema.toml",
            "config/values-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from the user config directory
        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "values-schema", "values-schema")
        {
            let user_config = config_dir.config_dir().join("values-schema.toml");
            if user_config.exists() {
                builder = builder.add_source(File::from(user_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Load from environment variables (VALUES_SCHEMA__*)
        builder = builder.add_source(
            Environment::with_prefix("VALUES_SCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.to_toml()?)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> std::io::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Get the bundle root (resolves relative paths)
    pub fn bundle_root(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_default();
        match &self.bundle.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => cwd.join(root),
            None => cwd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.input.values, vec![PathBuf::from("values.yaml")]);
        assert_eq!(config.output.indent, 4);
        assert_eq!(config.schema.draft, 2020);
        assert!(config.schema.k8s_schema_url.contains("{{ .K8sSchemaVersion }}"));
        assert!(!config.bundle.enabled);
    }

    #[test]
    fn test_serialize_config() {
        let config = GeneratorConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[schema]"));
        assert!(toml_str.contains("[bundle]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[output]\nindent = 2\n\n[schema]\ndraft = 7\n\n[schema.root]\nref = \"base.json\"\n\n[bundle]\nenabled = true\nwithout_id = true\n",
        )
        .unwrap();

        let config = GeneratorConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.output.indent, 2);
        assert_eq!(config.schema.draft, 7);
        assert_eq!(config.schema.root.reference.as_deref(), Some("base.json"));
        assert!(config.bundle.enabled && config.bundle.without_id);
        assert_eq!(config.output.path, PathBuf::from("values.schema.json"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = GeneratorConfig::default();
        config.schema.use_helm_docs = true;
        config.schema.root.title = Some("Chart".to_string());
        config.save(&path).unwrap();

        let loaded = GeneratorConfig::load_from(Some(&path)).unwrap();
        assert!(loaded.schema.use_helm_docs);
        assert_eq!(loaded.schema.root.title.as_deref(), Some("Chart"));
    }

    #[test]
    fn test_bundle_root_resolution() {
        let mut config = GeneratorConfig::default();
        assert_eq!(config.bundle_root(), std::env::current_dir().unwrap());

        config.bundle.root = Some(PathBuf::from("/srv/charts"));
        assert_eq!(config.bundle_root(), PathBuf::from("/srv/charts"));
    }
}
