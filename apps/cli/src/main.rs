mod config;
mod logging;
mod watch;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use clap::{ArgAction, Parser, Subcommand};
use mapbuilder_definitions::{DefinitionIndex, DefinitionSet};
use mapbuilder_fml::{resolve_completions, SourceIndexer};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(
    name = "mapbuilder",
    about = "FHIR definition index and FML completion for StructureMap authoring",
    version,
    arg_required_else_help = true
)]
struct Cli {
    /// Project root holding sushi-config.yaml and the .fml sources.
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,
    /// FHIR home directory (package cache and settings). Defaults to ~/.fhir.
    #[arg(long, global = true, value_name = "DIR")]
    fhir_home: Option<PathBuf>,
    /// Log level for mapbuilder crates (overridden by RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the IG's package dependencies and index their StructureDefinitions.
    Refresh {
        /// List every indexed canonical URL.
        #[arg(long, action = ArgAction::SetTrue)]
        list: bool,
    },

    /// Index the project's FML files and print their alias bindings.
    Scan,

    /// Print completions for a line prefix in an FML file.
    Complete {
        /// FML file the cursor is in.
        file: PathBuf,
        /// Text of the cursor's line up to the cursor, e.g. "  src.".
        prefix: String,
        /// Output JSON instead of one completion per line.
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },

    /// Index everything, then keep the index current as files change.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load().context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    logging::init_logging(&config.logging)?;

    let index_config = config.index_config(cli.fhir_home.as_deref());
    tracing::debug!(
        cache_root = %index_config.cache_root.display(),
        registries = ?index_config.default_registries,
        "Configuration loaded"
    );
    let index = DefinitionIndex::from_config(&index_config)
        .context("Failed to set up the package registry client")?;

    match cli.command {
        Commands::Refresh { list } => {
            let set = refresh(&index, &cli.project).await?;
            print_summary(&set, list);
        }
        Commands::Scan => {
            let mut indexer = SourceIndexer::new();
            indexer.scan_all(&[&cli.project]);
            print_bindings(&indexer);
        }
        Commands::Complete { file, prefix, json } => {
            let set = refresh(&index, &cli.project).await?;
            let mut indexer = SourceIndexer::new();
            indexer
                .file_changed(&file)
                .with_context(|| format!("Failed to index {}", file.display()))?;
            let bindings = indexer.bindings(&file).unwrap_or_default();
            let completions = resolve_completions(&bindings, &prefix, &set);

            if json {
                println!("{}", serde_json::to_string_pretty(&completions)?);
            } else {
                for completion in completions {
                    match completion.detail {
                        Some(detail) => println!("{}\t{}", completion.label, detail),
                        None => println!("{}", completion.label),
                    }
                }
            }
        }
        Commands::Watch => watch::run(&cli.project, &index).await?,
    }

    Ok(())
}

async fn refresh(index: &DefinitionIndex, project: &Path) -> Result<std::sync::Arc<DefinitionSet>> {
    index
        .refresh_project(project)
        .await
        .context("Failed to refresh FHIR definitions")
}

fn print_summary(set: &DefinitionSet, list: bool) {
    let mut per_package: BTreeMap<String, usize> = BTreeMap::new();
    for entity in set.entities() {
        *per_package
            .entry(format!("{}#{}", entity.source_package_id, entity.source_version))
            .or_default() += 1;
    }

    println!(
        "{} definitions from {} packages (FHIR {})",
        set.len(),
        per_package.len(),
        set.fhir_version
    );
    for (package, count) in &per_package {
        println!("  {:<50} {}", package, count);
    }

    if list {
        let mut urls: Vec<&str> = set.entities().map(|e| e.canonical_url.as_str()).collect();
        urls.sort_unstable();
        for url in urls {
            println!("{}", url);
        }
    }
}

fn print_bindings(indexer: &SourceIndexer) {
    let mut entries: Vec<_> = indexer.entries().collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in entries {
        println!("{}", entry.path.display());
        for binding in entry.bindings.iter() {
            println!(
                "  {:<8} {:<20} {:<12} {}",
                binding.role.as_str(),
                binding.alias,
                binding.bound_name.as_deref().unwrap_or("-"),
                binding.url
            );
        }
    }
}
