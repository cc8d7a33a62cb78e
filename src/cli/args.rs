//! Command line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dbtasks - Run staged database task plans
#[derive(Parser, Debug)]
#[command(name = "dbtasks")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <config dir>/dbtasks/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a plan file and show its stages
    Check {
        /// Plan file (JSON)
        #[arg(value_name = "PLAN_FILE")]
        plan_file: PathBuf,
    },

    /// Run a plan file against an in-memory database
    Run {
        /// Plan file (JSON)
        #[arg(value_name = "PLAN_FILE")]
        plan_file: PathBuf,

        /// Run all stages in one transaction
        #[arg(short, long)]
        transaction: bool,

        /// SQL batch to run before the plan
        #[arg(long, value_name = "SQL_FILE")]
        seed: Option<PathBuf>,

        /// Save the report to a file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
}
