mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// Inspect how an action schema routes requests
#[derive(Parser)]
#[command(name = "authz-route-check")]
#[command(about = "Inspect how an action schema routes requests")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Action schema path (overrides config)
    #[arg(short, long, global = true)]
    schema: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the schema and bypass rules and print the action table
    Check {
        /// Fail when two templates of the same verb can match one path
        #[arg(long)]
        deny_overlaps: bool,
    },
    /// Show how a single request would be resolved
    Resolve {
        #[arg(short, long)]
        method: String,
        /// Request path, optionally with a query string
        #[arg(short, long)]
        path: String,
    },
    /// Print effective configuration (YAML) and exit
    PrintConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_json)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::PrintConfig => {
            let mut config = rest_authz::AuthzConfig::load(cli.config.as_deref())?;
            if let Some(schema) = cli.schema {
                config.schema_path = Some(schema);
            }
            commands::print_config(&config, &mut out)
        }
        Commands::Check { deny_overlaps } => {
            let (config, schema) = commands::load(cli.config.as_deref(), cli.schema.as_deref())?;
            let overlaps = commands::check(&config, &schema, &mut out)?;
            out.flush()?;
            if deny_overlaps && overlaps > 0 {
                anyhow::bail!("{overlaps} overlapping template pair(s) found");
            }
            Ok(())
        }
        Commands::Resolve { method, path } => {
            let (config, schema) = commands::load(cli.config.as_deref(), cli.schema.as_deref())?;
            let resolution = commands::resolve(&config, &schema, &method, &path)?;
            commands::print_resolution(&resolution, &mut out)
        }
    }
}
