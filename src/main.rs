use clap::Parser;
use tracing_subscriber::EnvFilter;

use yield_router::{cli, example, schema, simulate, validate};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let verbose = matches!(cli.command, cli::Command::Simulate { verbose: true, .. });
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::Example => example::run(),
        cli::Command::Validate { file } => validate::run(&file),
        cli::Command::Simulate {
            file,
            days,
            step_hours,
            seed,
            state_file,
            verbose,
        } => simulate::run(&simulate::SimulateConfig {
            scenario_path: file,
            days,
            step_hours,
            seed,
            state_file,
            verbose,
        }),
    }
}
