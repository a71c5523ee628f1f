//! Reference Bundling
//!
//! Inlines schemas referenced through local file `$ref`s into the root
//! schema's `$defs`, producing one self-contained document.
//!
//! ## Resolution rules
//!
//! - refs in the generated schema resolve against the bundle root, refs inside
//!   a bundled file resolve against that file's directory
//! - absolute URLs, fragment-only pointers and absolute paths are left alone
//! - `$k8s/<suffix>` is an alias for the configured Kubernetes schema URL and
//!   is expanded in place, never bundled
//! - every target must stay under the bundle root, both lexically and after
//!   symlinks are resolved
//! - refs inside passthrough subschema keywords (`contains`, `prefixItems`,
//!   `if`/`then`/`else`, ...) are rewritten the same way
//!
//! Without `without_id`, a bundled file keeps its own `$id` or is given its
//! path relative to the bundle root, and refs point at that identifier.
//!
//! All bundled files share one flat `$defs` table. A file reached twice reuses
//! its first entry; a file reached again while it is still being bundled is a
//! cycle.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Result, SchemaError};
use crate::schema::codec::escape_pointer;
use crate::schema::{Draft, SchemaNode};

/// Default template for `$k8s/` refs
pub const DEFAULT_K8S_SCHEMA_URL: &str = "https://raw.githubusercontent.com/yannh/kubernetes-json-schema/master/{{ .K8sSchemaVersion }}/_definitions.json#/definitions/";

const K8S_ALIAS: &str = "$k8s/";
const K8S_VERSION_PLACEHOLDER: &str = "{{ .K8sSchemaVersion }}";

static URI_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").unwrap());

// =============================================================================
// Aliases
// =============================================================================

/// Configured `$ref` aliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAliases {
    /// URL template; `{{ .K8sSchemaVersion }}` is replaced by the version
    pub k8s_schema_url: String,
    pub k8s_schema_version: Option<String>,
}

impl Default for RefAliases {
    fn default() -> Self {
        Self {
            k8s_schema_url: DEFAULT_K8S_SCHEMA_URL.to_string(),
            k8s_schema_version: None,
        }
    }
}

impl RefAliases {
    /// Expanded form of an aliased ref, or `None` for ordinary refs
    pub fn expand(&self, reference: &str) -> Result<Option<String>> {
        let Some(suffix) = reference.strip_prefix(K8S_ALIAS) else {
            return Ok(None);
        };
        let version = self
            .k8s_schema_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SchemaError::MissingK8sVersion {
                reference: reference.to_string(),
            })?;
        let base = self.k8s_schema_url.replace(K8S_VERSION_PLACEHOLDER, version);
        Ok(Some(format!("{}{}", base, suffix)))
    }
}

/// Expand aliased refs throughout a schema without bundling
pub fn expand_aliases(node: &mut SchemaNode, aliases: &RefAliases) -> Result<()> {
    if let Some(reference) = node.reference.as_deref() {
        if let Some(expanded) = aliases.expand(reference)? {
            node.reference = Some(expanded);
        }
    }
    for child in node.subschemas_mut() {
        expand_aliases(child, aliases)?;
    }
    visit_extra_refs(node, &mut |reference| {
        if let Some(expanded) = aliases.expand(reference)? {
            *reference = expanded;
        }
        Ok(())
    })
}

/// Keywords kept in `extra` whose values hold subschemas
const SCHEMA_KEYWORDS: &[&str] = &[
    "contains",
    "contentSchema",
    "dependencies",
    "dependentSchemas",
    "else",
    "if",
    "items",
    "prefixItems",
    "propertyNames",
    "then",
    "unevaluatedItems",
    "unevaluatedProperties",
];

/// Keywords holding instance data, never searched for refs
const DATA_KEYWORDS: &[&str] = &["const", "default", "enum", "examples"];

/// Call `visit` on every `$ref` string inside the subschema keywords of `extra`
fn visit_extra_refs<F>(node: &mut SchemaNode, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut String) -> Result<()>,
{
    for (key, value) in node.extra.iter_mut() {
        if SCHEMA_KEYWORDS.contains(&key.as_str()) {
            visit_value_refs(value, visit)?;
        }
    }
    Ok(())
}

fn visit_value_refs<F>(value: &mut Value, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut String) -> Result<()>,
{
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "$ref" {
                    if let Value::String(reference) = child {
                        visit(reference)?;
                    }
                } else if !DATA_KEYWORDS.contains(&key.as_str()) {
                    visit_value_refs(child, visit)?;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_value_refs(item, visit)?;
            }
        }
        _ => {}
    }
    Ok(())
}

// =============================================================================
// Bundling
// =============================================================================

/// Bundler settings
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Sandbox directory; refs in the generated schema resolve against it
    pub root: PathBuf,
    /// Rewrite refs to `#/$defs/<key>` and strip identifiers from bundled schemas
    pub without_id: bool,
    /// Draft used to read bundled files
    pub draft: Draft,
    pub aliases: RefAliases,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            without_id: false,
            draft: Draft::default(),
            aliases: RefAliases::default(),
        }
    }
}

/// Bundle every local file ref reachable from `schema` into its `$defs`
pub fn bundle(schema: &mut SchemaNode, options: &BundleOptions) -> Result<()> {
    let root = fs::canonicalize(&options.root).map_err(|e| SchemaError::io(&options.root, e))?;
    let mut bundler = Bundler {
        options,
        reserved: schema.defs.keys().cloned().collect(),
        root: root.clone(),
        defs: BTreeMap::new(),
        done: HashMap::new(),
        in_progress: Vec::new(),
    };

    bundler.bundle_node(schema, None)?;

    tracing::info!(
        bundled = bundler.defs.len(),
        root = %root.display(),
        "bundled referenced schemas"
    );
    schema.defs.extend(bundler.defs);
    Ok(())
}

/// `$defs` slot assigned to a bundled file
#[derive(Debug, Clone)]
struct Entry {
    key: String,
    id: Option<String>,
    /// `$id` was derived from the file's location rather than read from it
    id_assigned: bool,
}

/// Bundled file whose contents are being walked
struct Owner<'k> {
    key: &'k str,
    dir: &'k Path,
    id_assigned: bool,
}

struct Bundler<'a> {
    options: &'a BundleOptions,
    /// Canonical bundle root
    root: PathBuf,
    defs: BTreeMap<String, SchemaNode>,
    /// `$defs` keys already taken
    reserved: HashSet<String>,
    /// Canonical path → entry, for files fully bundled
    done: HashMap<PathBuf, Entry>,
    /// Files currently being bundled, outermost first
    in_progress: Vec<PathBuf>,
}

impl Bundler<'_> {
    /// `owner` is the bundled file `node` belongs to, `None` for the generated schema
    fn bundle_node(&mut self, node: &mut SchemaNode, owner: Option<&Owner>) -> Result<()> {
        if let Some(reference) = node.reference.clone() {
            if let Some(rewritten) = self.rewrite_ref(&reference, owner)? {
                node.reference = Some(rewritten);
            }
        }

        for child in node.subschemas_mut() {
            self.bundle_node(child, owner)?;
        }
        visit_extra_refs(node, &mut |reference| {
            if let Some(rewritten) = self.rewrite_ref(reference, owner)? {
                *reference = rewritten;
            }
            Ok(())
        })
    }

    /// New value for `reference`, `None` when it stays as written
    fn rewrite_ref(&mut self, reference: &str, owner: Option<&Owner>) -> Result<Option<String>> {
        if let Some(expanded) = self.options.aliases.expand(reference)? {
            return Ok(Some(expanded));
        }
        if is_local_file_ref(reference) {
            return self.bundle_ref(reference, owner).map(Some);
        }
        match (owner, reference.strip_prefix('#')) {
            (Some(owner), Some(fragment)) if self.options.without_id => {
                let key = escape_pointer(owner.key);
                Ok(Some(format!("#/$defs/{}{}", key, fragment)))
            }
            _ => Ok(None),
        }
    }

    fn bundle_ref(&mut self, reference: &str, owner: Option<&Owner>) -> Result<String> {
        let (file, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let base_dir = owner.map_or(self.root.as_path(), |o| o.dir);
        let path = self.resolve(reference, &base_dir.join(file))?;

        let entry = match self.done.get(&path) {
            Some(entry) => {
                tracing::debug!(reference, key = %entry.key, "reusing bundled schema");
                entry.clone()
            }
            None => self.bundle_file(&path)?,
        };

        if self.options.without_id {
            return Ok(format!("#/$defs/{}{}", escape_pointer(&entry.key), fragment));
        }
        let target = match (&entry.id, owner) {
            // both ids mirror the file layout, so the ref resolves against the owner's id
            (Some(_), Some(owner)) if entry.id_assigned && owner.id_assigned => {
                relative_path(owner.dir, &path)
            }
            (Some(id), _) => id.clone(),
            (None, _) => self.relative(&path),
        };
        Ok(if fragment.is_empty() {
            target
        } else {
            format!("{}#{}", target, fragment)
        })
    }

    /// Canonical path of a ref target, confined to the bundle root
    fn resolve(&self, reference: &str, joined: &Path) -> Result<PathBuf> {
        let lexical = normalize(joined);
        if !lexical.starts_with(&self.root) {
            return Err(self.escape(reference, lexical));
        }
        let canonical = fs::canonicalize(&lexical).map_err(|e| SchemaError::io(&lexical, e))?;
        if !canonical.starts_with(&self.root) {
            return Err(self.escape(reference, canonical));
        }
        Ok(canonical)
    }

    fn escape(&self, reference: &str, resolved: PathBuf) -> SchemaError {
        SchemaError::PathEscape {
            reference: reference.to_string(),
            resolved,
            root: self.root.clone(),
        }
    }

    fn bundle_file(&mut self, path: &Path) -> Result<Entry> {
        if let Some(start) = self.in_progress.iter().position(|p| p == path) {
            let chain = self.in_progress[start..]
                .iter()
                .map(|p| p.as_path())
                .chain(std::iter::once(path))
                .map(|p| self.relative(p))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(SchemaError::Cycle { chain });
        }

        tracing::debug!(path = %path.display(), "bundling referenced schema");
        let mut node = load_schema(path, self.options.draft)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_name = node
            .id
            .as_deref()
            .and_then(id_name)
            .map(str::to_string)
            .unwrap_or(file_name);
        let key = self.reserve(&base_name);

        let id_assigned = !self.options.without_id && node.id.is_none();
        let id = if self.options.without_id {
            node.id = None;
            node.schema = None;
            None
        } else {
            let relative = self.relative(path);
            Some(node.id.get_or_insert(relative).clone())
        };

        self.in_progress.push(path.to_path_buf());
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        let owner = Owner {
            key: &key,
            dir: &dir,
            id_assigned,
        };
        let result = self.bundle_node(&mut node, Some(&owner));
        self.in_progress.pop();
        result?;

        let entry = Entry { key, id, id_assigned };
        self.done.insert(path.to_path_buf(), entry.clone());
        self.defs.insert(entry.key.clone(), node);
        Ok(entry)
    }

    /// Claim a unique `$defs` key: `name`, then `name_2`, `name_3`, ...
    fn reserve(&mut self, name: &str) -> String {
        let mut key = name.to_string();
        let mut n = 2;
        while self.reserved.contains(&key) {
            key = format!("{}_{}", name, n);
            n += 1;
        }
        self.reserved.insert(key.clone());
        key
    }

    /// Path relative to the bundle root, `/`-separated
    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Read a bundled schema file; `.json` files are JSON, anything else YAML
fn load_schema(path: &Path, draft: Draft) -> Result<SchemaNode> {
    let content = fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
    let file_error = |message: String| SchemaError::SchemaFile {
        path: path.to_path_buf(),
        message,
    };

    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let value: Value = if is_json {
        serde_json::from_str(&content).map_err(|e| file_error(e.to_string()))?
    } else {
        serde_yaml::from_str(&content).map_err(|e| file_error(e.to_string()))?
    };

    SchemaNode::from_value(&value, draft)
        .map_err(|e| file_error(e.to_string()))?
        .ok_or_else(|| file_error("file does not contain a schema".to_string()))
}

/// Relative filesystem path, as opposed to a URL, fragment, alias or absolute path
fn is_local_file_ref(reference: &str) -> bool {
    !reference.is_empty()
        && !reference.starts_with('#')
        && !reference.starts_with(K8S_ALIAS)
        && !URI_SCHEME.is_match(reference)
        && !Path::new(reference).has_root()
}

/// Last path segment of an `$id`
fn id_name(id: &str) -> Option<&str> {
    id.split('#')
        .next()
        .and_then(|base| base.trim_end_matches('/').rsplit('/').next())
        .filter(|name| !name.is_empty())
}

/// `/`-separated path from directory `from` to `to`
fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    std::iter::repeat(Cow::Borrowed(".."))
        .take(from.len() - common)
        .chain(to[common..].iter().map(|c| c.as_os_str().to_string_lossy()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_ref(reference: &str) -> SchemaNode {
        let mut node = SchemaNode::default();
        node.reference = Some(reference.to_string());
        node
    }

    #[test]
    fn test_local_file_ref_detection() {
        assert!(is_local_file_ref("./sub.schema.yaml"));
        assert!(is_local_file_ref("defs/common.json#/definitions/port"));
        assert!(is_local_file_ref("../shared.yaml"));
        assert!(!is_local_file_ref("#/$defs/port"));
        assert!(!is_local_file_ref("https://example.com/schema.json"));
        assert!(!is_local_file_ref("urn:example:schema"));
        assert!(!is_local_file_ref("$k8s/io.k8s.api.core.v1.Container"));
        assert!(!is_local_file_ref("/etc/schema.json"));
        assert!(!is_local_file_ref(""));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.json")), PathBuf::from("/a/c/d.json"));
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path(Path::new("/r/defs"), Path::new("/r/defs/a.json")), "a.json");
        assert_eq!(
            relative_path(Path::new("/r/defs"), Path::new("/r/other/b.yaml")),
            "../other/b.yaml"
        );
        assert_eq!(relative_path(Path::new("/r"), Path::new("/r/x/y.json")), "x/y.json");
    }

    #[test]
    fn test_id_name() {
        assert_eq!(id_name("https://example.com/schemas/port.json"), Some("port.json"));
        assert_eq!(id_name("https://example.com/schemas/port/#"), Some("port"));
        assert_eq!(id_name("local.yaml"), Some("local.yaml"));
        assert_eq!(id_name(""), None);
    }

    #[test]
    fn test_k8s_alias_expansion() {
        let aliases = RefAliases {
            k8s_schema_version: Some("v1.29.0".to_string()),
            ..RefAliases::default()
        };
        assert_eq!(
            aliases.expand("$k8s/io.k8s.api.core.v1.Container").unwrap().as_deref(),
            Some("https://raw.githubusercontent.com/yannh/kubernetes-json-schema/master/v1.29.0/_definitions.json#/definitions/io.k8s.api.core.v1.Container")
        );
        assert_eq!(aliases.expand("./local.json").unwrap(), None);

        let mut schema = SchemaNode::of_type("object");
        schema
            .properties
            .insert("resources".into(), with_ref("$k8s/io.k8s.api.core.v1.ResourceRequirements"));
        expand_aliases(&mut schema, &aliases).unwrap();
        let reference = schema.properties["resources"].reference.as_deref().unwrap();
        assert!(reference.starts_with(
            "https://raw.githubusercontent.com/yannh/kubernetes-json-schema/master/v1.29.0/"
        ));
        assert!(reference.ends_with("#/definitions/io.k8s.api.core.v1.ResourceRequirements"));
    }

    #[test]
    fn test_k8s_alias_requires_version() {
        let err = RefAliases::default().expand("$k8s/io.k8s.api.core.v1.Pod").unwrap_err();
        assert!(matches!(err, SchemaError::MissingK8sVersion { .. }));
    }

    #[test]
    fn test_reserve_suffixes() {
        let options = BundleOptions::default();
        let mut bundler = Bundler {
            options: &options,
            root: PathBuf::from("/"),
            defs: BTreeMap::new(),
            reserved: HashSet::from(["port.json".to_string()]),
            done: HashMap::new(),
            in_progress: Vec::new(),
        };
        assert_eq!(bundler.reserve("port.json"), "port.json_2");
        assert_eq!(bundler.reserve("port.json"), "port.json_3");
        assert_eq!(bundler.reserve("name.json"), "name.json");
    }

    #[test]
    fn test_bundle_nested_refs_flatten() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("defs")).unwrap();
        fs::write(
            dir.path().join("defs/outer.json"),
            r##"{"type": "object", "properties": {"inner": {"$ref": "inner.yaml"}, "self": {"$ref": "#/properties/inner"}}}"##,
        )
        .unwrap();
        fs::write(dir.path().join("defs/inner.yaml"), "type: string\nformat: hostname\n").unwrap();

        let mut schema = SchemaNode::of_type("object");
        schema.properties.insert("outer".into(), with_ref("./defs/outer.json"));

        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            without_id: true,
            ..BundleOptions::default()
        };
        bundle(&mut schema, &options).unwrap();

        let value = schema.to_value(Draft::default());
        assert_eq!(value["properties"]["outer"]["$ref"], "#/$defs/outer.json");
        assert_eq!(
            value["$defs"]["outer.json"]["properties"]["inner"]["$ref"],
            "#/$defs/inner.yaml"
        );
        assert_eq!(
            value["$defs"]["outer.json"]["properties"]["self"]["$ref"],
            "#/$defs/outer.json/properties/inner"
        );
        assert_eq!(value["$defs"]["inner.yaml"], json!({"type": "string", "format": "hostname"}));
    }

    #[test]
    fn test_bundle_refs_inside_passthrough_keywords() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("outer.json"),
            r##"{"type": "array", "contains": {"$ref": "./inner.json"}, "prefixItems": [{"$ref": "#/$defs/x"}], "const": {"$ref": "./data.json"}}"##,
        )
        .unwrap();
        fs::write(dir.path().join("inner.json"), r#"{"type": "integer"}"#).unwrap();

        let mut schema = SchemaNode::of_type("object");
        schema.properties.insert("list".into(), with_ref("./outer.json"));
        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            without_id: true,
            ..BundleOptions::default()
        };
        bundle(&mut schema, &options).unwrap();

        let value = schema.to_value(Draft::default());
        let outer = &value["$defs"]["outer.json"];
        assert_eq!(outer["contains"]["$ref"], "#/$defs/inner.json");
        assert_eq!(outer["prefixItems"][0]["$ref"], "#/$defs/outer.json/$defs/x");
        assert_eq!(outer["const"], json!({"$ref": "./data.json"}));
        assert_eq!(value["$defs"]["inner.json"], json!({"type": "integer"}));
    }

    #[test]
    fn test_k8s_alias_inside_passthrough_keywords() {
        let aliases = RefAliases {
            k8s_schema_version: Some("v1.29.0".to_string()),
            ..RefAliases::default()
        };
        let mut schema = SchemaNode::of_type("array");
        schema
            .extra
            .insert("contains".into(), json!({"$ref": "$k8s/io.k8s.api.core.v1.Container"}));
        expand_aliases(&mut schema, &aliases).unwrap();

        let reference = schema.extra["contains"]["$ref"].as_str().unwrap();
        assert!(reference
            .ends_with("/v1.29.0/_definitions.json#/definitions/io.k8s.api.core.v1.Container"));
    }

    #[test]
    fn test_bundle_with_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("port.yaml"), "type: integer\n").unwrap();
        fs::write(
            dir.path().join("named.json"),
            r#"{"$id": "https://example.com/schemas/name.json", "type": "string"}"#,
        )
        .unwrap();

        let mut schema = SchemaNode::of_type("object");
        schema.properties.insert("port".into(), with_ref("port.yaml"));
        schema.properties.insert("name".into(), with_ref("named.json#/type"));

        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            ..BundleOptions::default()
        };
        bundle(&mut schema, &options).unwrap();

        assert_eq!(schema.properties["port"].reference.as_deref(), Some("port.yaml"));
        assert_eq!(schema.defs["port.yaml"].id.as_deref(), Some("port.yaml"));
        assert_eq!(
            schema.properties["name"].reference.as_deref(),
            Some("https://example.com/schemas/name.json#/type")
        );
        assert!(schema.defs.contains_key("name.json"));
    }

    #[test]
    fn test_bundle_assigned_ids_follow_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("defs")).unwrap();
        fs::write(
            dir.path().join("defs/outer.yaml"),
            "properties:\n  inner:\n    $ref: ./inner.yaml#/properties/a\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("defs/inner.yaml"),
            "properties:\n  a:\n    type: string\n",
        )
        .unwrap();

        let mut schema = with_ref("defs/outer.yaml");
        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            ..BundleOptions::default()
        };
        bundle(&mut schema, &options).unwrap();

        assert_eq!(schema.reference.as_deref(), Some("defs/outer.yaml"));
        let outer = &schema.defs["outer.yaml"];
        assert_eq!(outer.id.as_deref(), Some("defs/outer.yaml"));
        assert_eq!(
            outer.properties["inner"].reference.as_deref(),
            Some("inner.yaml#/properties/a")
        );
        assert_eq!(schema.defs["inner.yaml"].id.as_deref(), Some("defs/inner.yaml"));
    }

    #[test]
    fn test_bundle_collision_and_reuse() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/common.yaml"), "type: string\n").unwrap();
        fs::write(dir.path().join("b/common.yaml"), "type: integer\n").unwrap();

        let mut schema = SchemaNode::of_type("object");
        schema.reference = Some("a/common.yaml".to_string());
        schema.properties.insert("x".into(), with_ref("b/common.yaml"));
        schema.properties.insert("y".into(), with_ref("./a/common.yaml"));
        schema.defs.insert("keep".into(), SchemaNode::of_type("null"));

        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            without_id: true,
            ..BundleOptions::default()
        };
        bundle(&mut schema, &options).unwrap();

        assert_eq!(schema.reference.as_deref(), Some("#/$defs/common.yaml"));
        assert_eq!(schema.properties["x"].reference.as_deref(), Some("#/$defs/common.yaml_2"));
        assert_eq!(schema.properties["y"].reference.as_deref(), Some("#/$defs/common.yaml"));
        assert_eq!(schema.defs.len(), 3);
        assert!(schema.defs["common.yaml_2"].has_type("integer"));
    }

    #[test]
    fn test_bundle_cycle_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "$ref: ./b.yaml\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "properties:\n  back:\n    $ref: a.yaml\n").unwrap();

        let mut schema = with_ref("a.yaml");
        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            without_id: true,
            ..BundleOptions::default()
        };
        match bundle(&mut schema, &options).unwrap_err() {
            SchemaError::Cycle { chain } => assert_eq!(chain, "a.yaml -> b.yaml -> a.yaml"),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_bundle_rejects_escape() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.json"), "{}").unwrap();

        let mut schema = with_ref("../secret.json");
        let options = BundleOptions {
            root,
            without_id: true,
            ..BundleOptions::default()
        };
        let err = bundle(&mut schema, &options).unwrap_err();
        assert!(matches!(err, SchemaError::PathEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_bundle_rejects_symlink_escape() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.json"), "{}").unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.json"), root.join("link.json"))
            .unwrap();

        let mut schema = with_ref("link.json");
        let options = BundleOptions {
            root,
            without_id: true,
            ..BundleOptions::default()
        };
        let err = bundle(&mut schema, &options).unwrap_err();
        assert!(matches!(err, SchemaError::PathEscape { .. }));
    }

    #[test]
    fn test_bundle_reports_bad_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        fs::write(dir.path().join("list.yaml"), "- 1\n- 2\n").unwrap();

        let options = BundleOptions {
            root: dir.path().to_path_buf(),
            ..BundleOptions::default()
        };
        let err = bundle(&mut with_ref("bad.json"), &options).unwrap_err();
        assert!(matches!(err, SchemaError::SchemaFile { .. }));

        let err = bundle(&mut with_ref("list.yaml"), &options).unwrap_err();
        assert!(err.to_string().contains("list.yaml"));

        let err = bundle(&mut with_ref("missing.json"), &options).unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }
}
