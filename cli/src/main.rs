use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use causeline::output;
use causeline_core::{CausalityGraph, Config, Execution, MotifError, MotifFinder, MotifSpec};

#[derive(Parser)]
#[command(name = "causeline")]
#[command(about = "Causality reconstruction and motif search for vector-clocked logs", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "causeline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a log into labeled executions
    Parse {
        /// Path to the log file
        log: PathBuf,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Build causality graphs and print their statistics
    Graph {
        log: PathBuf,
        /// Restrict to one execution label
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Search executions for a motif described in a TOML spec file
    Find {
        log: PathBuf,
        /// Path to the motif spec
        motif: PathBuf,
        /// Restrict to one execution label
        #[arg(long)]
        label: Option<String>,
        /// Enumerate every match instead of the first
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = &cli.command {
        return init_config(&cli.config, *force);
    }

    let config = Config::from_file_or_default(&cli.config);
    init_logging(&config);
    config.validate()?;

    match cli.command {
        Commands::Parse { log, json } => {
            let executions = parse_log(&config, &log)?;
            output::print_executions(&executions, json);
        }

        Commands::Graph { log, label, json } => {
            let executions = select(parse_log(&config, &log)?, label.as_deref())?;
            for execution in executions {
                let graph = CausalityGraph::from_events(execution.events)?;
                output::print_graph(&execution.label, &graph, json);
            }
        }

        Commands::Find {
            log,
            motif,
            label,
            all,
            json,
        } => {
            let pattern = load_motif(&motif)?;
            let executions = select(parse_log(&config, &log)?, label.as_deref())?;

            let mut total = 0usize;
            for execution in executions {
                let graph = CausalityGraph::from_events(execution.events)?;
                if all {
                    let matches = MotifFinder::find_all(&graph, &pattern)?;
                    total += matches.len();
                    for found in &matches {
                        output::print_motif(&execution.label, &graph, found, json);
                    }
                } else {
                    match MotifFinder::find(&graph, &pattern) {
                        Ok(found) => {
                            output::print_motif(&execution.label, &graph, &found, json);
                            return Ok(());
                        }
                        Err(MotifError::NoMatch) => continue,
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            // Exhausting the search is an ordinary outcome, not a failure.
            if total == 0 {
                println!("no match");
            }
        }

        Commands::Init { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists; pass --force to overwrite",
            path.display()
        ));
    }

    std::fs::write(path, Config::default_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn parse_log(config: &Config, path: &Path) -> Result<Vec<Execution>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    let parser = config.build_parser()?;
    let parsed = parser.parse(&raw)?;
    tracing::debug!(
        executions = parsed.executions().len(),
        "parsed {}",
        path.display()
    );
    Ok(parsed.into_executions())
}

fn load_motif(path: &Path) -> Result<causeline_core::BuilderGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read motif spec {}", path.display()))?;
    let spec: MotifSpec =
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(spec.build()?)
}

fn select(executions: Vec<Execution>, label: Option<&str>) -> Result<Vec<Execution>> {
    let Some(wanted) = label else {
        return Ok(executions);
    };

    let labels: Vec<String> = executions
        .iter()
        .map(|execution| execution.label.clone())
        .collect();
    let selected: Vec<Execution> = executions
        .into_iter()
        .filter(|execution| execution.label == wanted)
        .collect();

    if selected.is_empty() {
        return Err(anyhow!(
            "no execution labeled `{}` (known labels: {:?})",
            wanted,
            labels
        ));
    }
    Ok(selected)
}
