use anyhow::Result;

use super::config::cmd_config;
use super::env::CliArgs;
use super::record::cmd_record;
use super::tasks::cmd_tasks;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Record(args) => cmd_record(args, ctx, cli.output).await,
        Commands::Tasks(args) => cmd_tasks(args, ctx, cli.output).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
