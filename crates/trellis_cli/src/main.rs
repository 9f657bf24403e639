//! TRELLIS CLI
//!
//! Plan, inspect and apply resource stacks described as JSON documents.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;
mod config;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use commands::ApplyOptions;
use config::EngineOverrides;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trellis_core::NodeType;

/// Environment variable holding the log filter
const LOG_ENV: &str = "TRELLIS_LOG";

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "TRELLIS - Declarative resource graphs, planned and applied in dependency order", long_about = None)]
struct Cli {
    /// Log at debug level unless TRELLIS_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the execution order with each node's dependencies
    Plan {
        /// Path to stack document
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print every dependency edge and output source
    Graph {
        /// Path to stack document
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Apply a stack against the simulated provider
    Apply {
        /// Path to stack document
        #[arg(short, long)]
        file: PathBuf,
        /// Engine config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Run independent nodes in parallel
        #[arg(long)]
        concurrent: bool,
        /// Most provider calls in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Make the simulated provider fail on a node type
        #[arg(long, value_name = "TYPE")]
        fail_on: Vec<NodeType>,
        /// Ledger file; unchanged nodes recorded there are not re-created
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print the authorized Lambda API example stack
    Example {
        /// Prefix for node names
        #[arg(short, long, default_value = "helloWorld")]
        prefix: String,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "trellis_runtime=debug,trellis_plan=debug,trellis_cli=debug"
    } else {
        "trellis_runtime=info,trellis_plan=info,trellis_cli=info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let out = match cli.command {
        Commands::Plan { file } => commands::plan_command(&file)?,
        Commands::Graph { file } => commands::graph_command(&file)?,
        Commands::Apply {
            file,
            config,
            concurrent,
            concurrency,
            fail_on,
            state,
        } => {
            let options = ApplyOptions {
                config,
                overrides: EngineOverrides {
                    concurrent,
                    max_concurrency: concurrency,
                },
                fail_on,
                state,
            };
            commands::apply_command(&file, &options).await?
        }
        Commands::Example { prefix } => commands::example_command(&prefix)?,
    };

    print!("{}", out);
    if !out.ends_with('\n') {
        println!();
    }
    Ok(())
}
