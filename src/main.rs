mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod report;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // ssh runs this binary as SSH_ASKPASS to obtain device passwords.
    if let Some(secret) = devicekit::backend::ssh::askpass_response() {
        println!("{secret}");
        return Ok(());
    }

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
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        Command::Check(args) => commands::check::run(&ctx, args),
        Command::Apply(args) => commands::apply::run(&ctx, args),
        Command::Policy { name } => commands::policy::run(&ctx, name.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "warden", &mut io::stdout());
            Ok(())
        }
    }
}
