//! wavefold CLI
//!
//! Folds waves of streamed query responses into one merged response,
//! and previews how a sharded query would be split into sub-requests.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use wavefold::commands::{
    display_version, execute_merge, execute_plan, parse_shards, validate_response_file, MergeArgs,
    PlanArgs,
};

/// wavefold - incremental merger for streamed query responses
#[derive(Parser, Debug)]
#[command(name = "wavefold")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge wave files into a single response
    Merge {
        /// Wave files (one response or an array of responses each), in arrival order
        #[arg(short, long = "wave", required = true, num_args = 1..)]
        waves: Vec<PathBuf>,

        /// Output path for the merged response (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long, env = "WAVEFOLD_CONFIG")]
        config: Option<PathBuf>,

        /// Drop waves that fail ingestion instead of aborting
        #[arg(long)]
        skip_invalid: bool,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a response JSON file
    Validate {
        /// Path to response JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the sub-requests a shard plan issues
    Plan {
        /// Shard count, or a comma-separated list of shard values
        #[arg(short, long)]
        shards: String,

        /// Parent request id
        #[arg(long)]
        request_id: Option<String>,

        /// Execution time in seconds reported by every simulated wave
        #[arg(long)]
        exec_time: Option<f64>,

        /// TOML configuration file
        #[arg(short, long, env = "WAVEFOLD_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Merge {
            waves,
            output,
            config,
            skip_invalid,
            summary,
        } => {
            let args = MergeArgs {
                waves,
                output,
                config,
                skip_invalid,
                print_summary: summary,
            };
            execute_merge(args)?;
        }

        Commands::Validate { file } => {
            validate_response_file(file)?;
        }

        Commands::Plan {
            shards,
            request_id,
            exec_time,
            config,
        } => {
            let args = PlanArgs {
                shards: parse_shards(&shards).map_err(anyhow::Error::msg)?,
                request_id,
                exec_time,
                config,
            };
            execute_plan(args)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
