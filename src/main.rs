mod cli;
mod commands;
mod config;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
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

    match dispatch(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&ctx, &err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Run(args) => commands::run::run(ctx, args),
        Command::Render(args) => commands::render::run(ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tfc-workspace", &mut io::stdout());
            Ok(())
        }
    }
}

fn report(ctx: &Context, err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));
    if let Some(advice) = advice(err) {
        ui::dim_err(advice);
    }
    if ctx.verbose > 1 {
        ui::dim_err(&format!("{err:?}"));
    }
}

/// Advice of the first library error in the chain.
fn advice(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<converge::Error>() {
            Some(e.advice())
        } else if let Some(e) = cause.downcast_ref::<tfe::Error>() {
            Some(e.category().advice())
        } else {
            cause
                .downcast_ref::<tfexec::Error>()
                .map(|e| e.category().advice())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advice_from_library_errors() {
        let err = anyhow::Error::new(converge::Error::TeamNotFound {
            organization: "acme".into(),
            team: "ops".into(),
        });
        assert_eq!(
            advice(&err),
            Some(converge::ErrorCategory::MissingReference.advice())
        );

        let err = anyhow::Error::new(tfexec::Error::BinaryNotFound("terraform".into()))
            .context("Failed to start run");
        assert_eq!(
            advice(&err),
            Some(tfexec::ErrorCategory::BinaryNotFound.advice())
        );

        assert_eq!(advice(&anyhow::anyhow!("plain")), None);
    }
}
