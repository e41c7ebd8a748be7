//! Cipher Grant CLI - command-line interface for the confidential grant ledger.
//!
//! Every invocation unlocks the sealing key, replays the ledger journal,
//! applies one command and exits.

pub mod commands;
pub mod config;
pub mod ledger;
pub mod output;
pub mod telemetry;

use clap::Parser;
use commands::{Cli, Context};
use config::CliConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    telemetry::init_telemetry(&config.logging.level, config.logging.json)?;

    let Cli {
        config: config_path,
        password,
        command,
        ..
    } = cli;
    let ctx = Context::new(config, config_path, password);
    commands::execute(command, &ctx)
}
