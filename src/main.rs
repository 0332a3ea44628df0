//! Student outcome pipeline - Main Entry Point

use clap::Parser;
use student_outcome::cli::{cmd_describe, cmd_run, Cli, Commands, RunArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_outcome=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            output,
            variant,
            separator,
            target,
            seed,
            no_feature_engineering,
        } => {
            cmd_run(RunArgs {
                config,
                data,
                output,
                variant,
                separator,
                target,
                seed,
                no_feature_engineering,
            })?;
        }
        Commands::Describe {
            data,
            separator,
            target,
        } => {
            cmd_describe(&data, separator, &target)?;
        }
    }

    Ok(())
}
