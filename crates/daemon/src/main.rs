//! lifeopsd: the lifeops notification daemon and operator CLI.

mod app;
mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use lifeops_core::config::load_dotenv;
use lifeops_core::Config;

use crate::app::App;
use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.config_dir {
        config.store.config_dir = dir;
    }

    let command = cli.command.unwrap_or(Command::Run { no_watch: false });
    match command {
        Command::Run { no_watch } => {
            let watch = config.store.watch && !no_watch;
            commands::run(App::build(config, watch)?).await
        }
        Command::Validate => Ok(commands::validate(&App::build(config, false)?)),
        Command::Schemas => {
            commands::schemas(&App::build(config, false)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Events => {
            commands::events();
            Ok(ExitCode::SUCCESS)
        }
        Command::Emit { name, payload } => {
            commands::emit(&App::build(config, false)?, &name, &payload).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::TestChannel { id } => {
            commands::test_channel(&App::build(config, false)?, &id).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sweep => {
            commands::sweep(&App::build(config, false)?).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
