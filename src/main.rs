mod cli;
mod commands;
mod config;
mod config_value;
mod error;
mod filter_action;
mod ident;
mod resource;
mod rules;
mod state;
mod ui;

use anyhow::{Context as AnyhowContext, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::Provider;
use declarative::{CancelToken, PollConfig};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("Interrupted, finishing the current call");
        on_interrupt.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let provider = Provider {
        config: cli.config,
        overrides: cli.provider.into(),
        cancel,
        poll: PollConfig::default(),
    };

    match cli.command {
        Command::Schema { type_name } => commands::schema::run(&ctx, type_name.as_deref()),
        Command::Validate { file } => commands::validate::run(&ctx, &file),
        Command::Plan(args) => commands::plan::run(&provider, &ctx, &args.file, &args.state.state),
        Command::Apply(args) => commands::apply::run(
            &provider,
            &ctx,
            &args.file,
            &args.state.state,
            args.dry_run,
            args.yes,
        ),
        Command::Import(args) => commands::import::run(&provider, &ctx, &args),
        Command::Refresh(args) => commands::refresh::run(&provider, &ctx, &args.state),
        Command::Destroy(args) => commands::destroy::run(
            &provider,
            &ctx,
            &args.state.state,
            args.dry_run,
            args.yes,
        ),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "segment-provider", &mut io::stdout());
            Ok(())
        }
    }
}
