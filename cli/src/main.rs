use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use specmash_core::{Spec, SpecNode};
use specmash_engine::{
    AnnotationPipeline, CustomizationEngine, MashConfig, SpecRegistry, TypeMasher,
    decode_yaml_documents,
};

/// Output format for the declared-type bundle.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "specmash")]
#[command(about = "Mash overlapping spec documents into a declared-type bundle")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mash root nodes from a document directory into a declared-type bundle.
    Mash(MashArgs),
    /// Print the content hash of every document in a file.
    Hash(HashArgs),
    /// Load a document directory and report what was stored.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct MashArgs {
    /// Directory of persisted spec documents (searched recursively).
    #[arg(long)]
    input: PathBuf,
    /// Optional extra directory of customization documents.
    #[arg(long)]
    customizations: Option<PathBuf>,
    /// Bundle output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,
    /// Write the bundle here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Fixpoint round budget for the mashing loop.
    #[arg(long, default_value_t = 64)]
    max_rounds: usize,
}

#[derive(Debug, Args)]
struct HashArgs {
    /// A YAML file of one or more spec documents.
    file: PathBuf,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Directory of persisted spec documents (searched recursively).
    path: PathBuf,
}

/// What the downstream generator consumes.
#[derive(Debug, Serialize)]
struct Bundle {
    #[serde(rename = "generatedAt")]
    generated_at: String,
    types: BTreeMap<String, Spec>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Mash(args) => run_mash(args),
        Command::Hash(args) => run_hash(args),
        Command::Check(args) => run_check(args),
    }
}

fn run_mash(args: MashArgs) -> anyhow::Result<()> {
    let mut registry = SpecRegistry::new();
    let loaded = registry
        .load_dir(&args.input)
        .with_context(|| format!("loading documents from {}", args.input.display()))?;
    tracing::info!(loaded, input = %args.input.display(), "loaded spec documents");

    if let Some(dir) = &args.customizations {
        let loaded = registry
            .load_dir(dir)
            .with_context(|| format!("loading customizations from {}", dir.display()))?;
        tracing::info!(loaded, dir = %dir.display(), "loaded customization documents");
    }

    let roots: Vec<SpecNode> = registry.nodes().into_iter().cloned().collect();
    let bundle = mash_to_bundle(&registry, &roots, args.max_rounds)?;

    let rendered = match args.format {
        OutputFormat::Yaml => serde_yaml::to_string(&bundle)?,
        OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(&bundle)?;
            text.push('\n');
            text
        }
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("writing bundle to {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

// The full pipeline: mash the roots, customize the declared nodes, and
// assemble the table the generator consumes.
fn mash_to_bundle(
    registry: &SpecRegistry,
    roots: &[SpecNode],
    max_rounds: usize,
) -> anyhow::Result<Bundle> {
    let pipeline = AnnotationPipeline::standard();
    let mut masher = TypeMasher::with_config(MashConfig { max_rounds });
    masher.eat(&pipeline, roots)?;

    let engine = CustomizationEngine::from_registry(registry);
    let mut types = masher.into_declared_types();
    let declared_nodes: Vec<SpecNode> = types
        .values()
        .filter_map(Spec::as_node)
        .cloned()
        .collect();
    let customized = engine.apply(&declared_nodes)?;

    for (original, patched) in declared_nodes.iter().zip(customized) {
        // a patch may have renamed the node; drop the stale entry
        if patched.name != original.name {
            types.remove(&original.name);
        }
        types.insert(patched.name.clone(), Spec::Node(patched));
    }

    Ok(Bundle {
        generated_at: chrono::Utc::now().to_rfc3339(),
        types,
    })
}

fn run_hash(args: HashArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let specs = decode_yaml_documents(&text)
        .with_context(|| format!("decoding {}", args.file.display()))?;

    for spec in specs {
        let name = spec.name().unwrap_or("-");
        println!("{}  {} {}", spec.content_hash(), spec.kind(), name);
    }
    Ok(())
}

fn run_check(args: CheckArgs) -> anyhow::Result<()> {
    let mut registry = SpecRegistry::new();
    let loaded = registry
        .load_dir(&args.path)
        .with_context(|| format!("loading documents from {}", args.path.display()))?;

    println!("stored {loaded} specs");
    for (tag, _) in registry.iter() {
        println!("  {} {}", tag.kind, tag.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use specmash_core::{PrimitiveKind, SpecPrimitive};
    use specmash_engine::keys;

    #[test]
    fn mash_to_bundle_customizes_declared_nodes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("customization.yaml"),
            "\
kind: Customization
name: describe-album
target:
  name: Album
patches:
  - op: add
    path: metadata
    value:
      description: patched by customization
",
        )
        .unwrap();

        let mut registry = SpecRegistry::new();
        registry.load_dir(dir.path()).unwrap();

        let root = SpecNode::new("Album")
            .with_child(
                "title",
                Spec::Primitive(SpecPrimitive::new(PrimitiveKind::String)),
            )
            .with_annotation(keys::ROOT_TYPE, "true");

        let bundle = mash_to_bundle(&registry, &[root], 64).unwrap();
        let album = bundle.types["Album"].as_node().unwrap();
        assert_eq!(
            album.metadata.description.as_deref(),
            Some("patched by customization")
        );
    }

    #[test]
    fn bundle_serializes_with_a_generated_at_stamp() {
        let bundle = Bundle {
            generated_at: "2026-01-01T00:00:00+00:00".into(),
            types: BTreeMap::new(),
        };
        let yaml = serde_yaml::to_string(&bundle).unwrap();
        assert!(yaml.contains("generatedAt"));
    }
}
