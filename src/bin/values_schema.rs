//! values-schema CLI
//!
//! Generates `values.schema.json` from annotated YAML values files.
//!
//! Usage:
//!   values-schema -f values.yaml -f values.prod.yaml -o values.schema.json
//!   values-schema --bundle --bundle-without-id --check
//!   values-schema config show

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use values_schema::{Generator, GeneratorConfig};

#[derive(Parser)]
#[command(name = "values-schema")]
#[command(about = "Generate JSON Schema from annotated YAML values files")]
struct Cli {
    /// Values files, merged in order (repeatable)
    #[arg(short = 'f', long = "values")]
    values: Vec<PathBuf>,

    /// Output schema file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON Schema draft (4, 6, 7, 2019, 2020)
    #[arg(short, long)]
    draft: Option<i64>,

    /// Spaces per indentation level
    #[arg(short, long)]
    indent: Option<usize>,

    /// Bundle local $ref targets into $defs
    #[arg(long)]
    bundle: bool,

    /// Directory $ref targets must stay within
    #[arg(long)]
    bundle_root: Option<PathBuf>,

    /// Rewrite bundled refs to #/$defs/... instead of $id
    #[arg(long)]
    bundle_without_id: bool,

    /// Add additionalProperties: false to every object
    #[arg(long)]
    no_additional_properties: bool,

    /// Read helm-docs `# --` comments as descriptions
    #[arg(long)]
    use_helm_docs: bool,

    /// URL template for $k8s/ refs
    #[arg(long)]
    k8s_schema_url: Option<String>,

    /// Kubernetes version for $k8s/ refs (e.g. v1.29.0)
    #[arg(long)]
    k8s_schema_version: Option<String>,

    /// Root schema $id
    #[arg(long)]
    schema_root_id: Option<String>,

    /// Root schema $ref
    #[arg(long)]
    schema_root_ref: Option<String>,

    /// Root schema title
    #[arg(long)]
    schema_root_title: Option<String>,

    /// Root schema description
    #[arg(long)]
    schema_root_description: Option<String>,

    /// Root schema additionalProperties
    #[arg(long)]
    schema_root_additional_properties: Option<bool>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compare with the output file instead of writing; exit 1 on difference
    #[arg(long)]
    check: bool,

    /// Print the schema to stdout instead of writing the output file
    #[arg(long)]
    stdout: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// File to create
        #[arg(default_value = "values-schema.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when `--check` found a difference
fn run(cli: Cli) -> Result<bool> {
    let mut config = GeneratorConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    apply_flags(&cli, &mut config);

    if let Some(Commands::Config { action }) = &cli.command {
        return run_config(action, &config);
    }

    let generator = Generator::new(config)?;
    let schema = generator.generate().context("failed to generate schema")?;
    let rendered = generator.render(&schema)?;
    let output = &generator.config().output.path;

    if cli.check {
        return match generator.check(&rendered)? {
            None => {
                eprintln!("{} is up to date", output.display());
                Ok(true)
            }
            Some(diff) => {
                print!("{}", diff);
                eprintln!("{} is out of date", output.display());
                Ok(false)
            }
        };
    }

    if cli.stdout {
        print!("{}", rendered);
    } else {
        generator
            .write(&rendered)
            .with_context(|| format!("failed to write {}", output.display()))?;
        eprintln!("Wrote {}", output.display());
    }
    Ok(true)
}

fn run_config(action: &ConfigAction, config: &GeneratorConfig) -> Result<bool> {
    match action {
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            GeneratorConfig::default()
                .save(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Created {}", path.display());
        }
    }
    Ok(true)
}

/// Command-line flags override every configuration layer
fn apply_flags(cli: &Cli, config: &mut GeneratorConfig) {
    if !cli.values.is_empty() {
        config.input.values = cli.values.clone();
    }
    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }
    if let Some(indent) = cli.indent {
        config.output.indent = indent;
    }

    let schema = &mut config.schema;
    if let Some(draft) = cli.draft {
        schema.draft = draft;
    }
    schema.no_additional_properties |= cli.no_additional_properties;
    schema.use_helm_docs |= cli.use_helm_docs;
    if let Some(url) = &cli.k8s_schema_url {
        schema.k8s_schema_url = url.clone();
    }
    if let Some(version) = &cli.k8s_schema_version {
        schema.k8s_schema_version = Some(version.clone());
    }

    let root = &mut schema.root;
    if let Some(id) = &cli.schema_root_id {
        root.id = Some(id.clone());
    }
    if let Some(reference) = &cli.schema_root_ref {
        root.reference = Some(reference.clone());
    }
    if let Some(title) = &cli.schema_root_title {
        root.title = Some(title.clone());
    }
    if let Some(description) = &cli.schema_root_description {
        root.description = Some(description.clone());
    }
    if let Some(allowed) = cli.schema_root_additional_properties {
        root.additional_properties = Some(allowed);
    }

    config.bundle.enabled |= cli.bundle;
    config.bundle.without_id |= cli.bundle_without_id;
    if let Some(root) = &cli.bundle_root {
        config.bundle.root = Some(root.clone());
    }
}
