use clap::{Parser, Subcommand, ValueEnum};
use datadir::{Catalog, DataDirectoryLoader, LoaderOptions, ServerConfig};
use serde::Serialize;
use std::process;
use std::sync::Arc;

/// Load a data directory and report what it contains
#[derive(Parser)]
#[command(name = "datadir", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: String,

    /// Worker count; overrides DATADIR_LOAD_PARALLELISM
    #[arg(long)]
    parallelism: Option<String>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Load catalog and configuration, print per-kind counts
    Load,

    /// List loaded layers as workspace:name with their default style
    Layers {
        /// Only layers of this workspace
        #[arg(long)]
        workspace: Option<String>,
    },

    /// List loaded services
    Services,
}

#[derive(Serialize)]
struct LayerRow {
    name: String,
    enabled: bool,
    default_style: Option<String>,
}

#[derive(Serialize)]
struct ServiceRow {
    kind: String,
    name: String,
    workspace: Option<String>,
    enabled: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = LoaderOptions::from_env();
    if let Some(parallelism) = cli.parallelism {
        options = options.with_parallelism(parallelism);
    }
    let (catalog, config) = load(&cli.data_dir, &options)?;

    match cli.command {
        Command::Load => {
            print_output(
                &serde_json::json!({
                    "data_dir": cli.data_dir,
                    "catalog": catalog.counts(),
                    "config": config.counts(),
                    "default_workspace": catalog.default_workspace().map(|w| w.name.clone()),
                }),
                &cli.format,
            )?;
        }

        Command::Layers { workspace } => {
            let rows: Vec<LayerRow> = catalog
                .layers()
                .iter()
                .filter_map(|layer| {
                    let ws = catalog.layer_workspace(layer)?;
                    if workspace.as_deref().is_some_and(|name| name != ws.name) {
                        return None;
                    }
                    Some(LayerRow {
                        name: format!("{}:{}", ws.name, layer.name),
                        enabled: layer.enabled,
                        default_style: layer
                            .default_style
                            .as_deref()
                            .and_then(|id| catalog.style(id))
                            .map(|style| style.name.clone()),
                    })
                })
                .collect();
            print_output(&rows, &cli.format)?;
        }

        Command::Services => {
            let rows: Vec<ServiceRow> = config
                .services()
                .iter()
                .map(|service| ServiceRow {
                    kind: service.kind.clone(),
                    name: service.name.clone(),
                    workspace: service
                        .workspace
                        .as_deref()
                        .and_then(|id| catalog.workspace(id))
                        .map(|ws| ws.name.clone()),
                    enabled: service.enabled,
                })
                .collect();
            print_output(&rows, &cli.format)?;
        }
    }

    Ok(())
}

fn load(
    data_dir: &str,
    options: &LoaderOptions,
) -> Result<(Arc<Catalog>, ServerConfig), Box<dyn std::error::Error>> {
    let loader = DataDirectoryLoader::new(data_dir, options)?;
    let catalog = loader.load_catalog(Catalog::new())?;
    let config = loader.load_config(Arc::clone(&catalog))?;
    catalog.set_extended_validation(true);
    Ok((catalog, config))
}

fn print_output<T: Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
