//! mihari CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use mihari_core::{TracingConfig, TracingOutputFormat, init_tracing};

use mihari_cli::cli::{Cli, Command, ConfigAction};
use mihari_cli::commands;
use mihari_cli::config::ClientConfig;
use mihari_cli::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e.report());
            return ExitCode::FAILURE;
        }
    };

    let mut tracing_config = TracingConfig::cli(cli.debug || config.debug);
    if cli.log_json {
        tracing_config = tracing_config.with_format(TracingOutputFormat::Json);
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e.report());
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
}

async fn run(cli: Cli, config: ClientConfig) -> ClientResult<()> {
    match cli.command {
        Command::Link {
            user,
            force,
            no_browser,
            client,
        } => commands::link::run(&config, user, force, no_browser, &client.into()).await,
        Command::Search {
            user,
            max,
            json,
            query,
            client,
        } => commands::search::run(&config, user, max, json, query, &client.into()).await,
        Command::Token { user, client } => {
            commands::token::run(&config, user, &client.into()).await
        }
        Command::Unlink { user } => commands::unlink::run(&config, user),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config),
        },
    }
}
