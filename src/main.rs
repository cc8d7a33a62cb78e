//! dbtasks CLI
//!
//! Validates and runs staged database task plans.

use clap::Parser;
use dbtasks::cli::{
    args::{Cli, Commands},
    commands::{check, run},
};
use dbtasks::models::config::{self, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config: Config = match cli.config.as_deref() {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    // Run the appropriate command
    match cli.command {
        Commands::Check { plan_file } => {
            check::check_plan(&plan_file)?;
        }

        Commands::Run {
            plan_file,
            transaction,
            seed,
            output,
        } => {
            let report = run::run_plan(
                &config,
                &plan_file,
                transaction,
                seed.as_deref(),
                output.as_deref(),
            )
            .await?;

            if !report.succeeded() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("dbtasks=debug")
    } else {
        EnvFilter::new("dbtasks=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .with(filter)
        .init();
}
