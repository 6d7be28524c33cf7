use super::check::cmd_check;
use super::env::CliArgs;
use super::runtime::LoadedOptions;
use super::simulate::cmd_simulate;
use crate::cli::commands::Commands;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, loaded: LoadedOptions) -> Result<()> {
    match cli.command.clone() {
        Commands::Simulate(args) => cmd_simulate(args, loaded.options, &cli.output).await,
        Commands::Check(args) => cmd_check(args, loaded.options, &cli.output),
    }
}
