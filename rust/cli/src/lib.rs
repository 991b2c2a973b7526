//! # pokeroom CLI Library
//!
//! Offline tooling over the same evaluator and room state machine the server runs.
//!
//! ## Main Entry Point
//!
//! The primary entry point is the [`run`] function, which parses command-line arguments
//! and executes the appropriate subcommand.
//!
//! ## Available Subcommands
//!
//! - `deal`: Deal a single hand for inspection
//! - `eval`: Score 5 to 7 cards
//! - `sim`: Play many hands with random legal intents, checking table invariants
//! - `cfg`: Display current configuration settings

use clap::Parser;
use std::io::Write;
pub mod cli;
pub mod commands;
pub mod config;
mod error;
pub mod exit_code;
pub mod ui;

use cli::{Commands, PokeroomCli};
use commands::{handle_cfg_command, handle_deal_command, handle_eval_command, handle_sim_command};

pub use error::CliError;

/// Main entry point for the CLI application.
///
/// Parses `args` (program name first) and dispatches to the subcommand handler.
///
/// # Returns
///
/// Exit code: `0` for success, `2` for errors
///
/// # Example
///
/// ```
/// let mut out = Vec::new();
/// let mut err = Vec::new();
/// let code = pokeroom_cli::run(["pokeroom", "eval", "AS", "KS", "QS", "JS", "TS"], &mut out, &mut err);
/// assert_eq!(code, 0);
/// assert!(String::from_utf8(out).unwrap().contains("Royal Flush"));
/// ```
pub fn run<I, S>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    const COMMANDS: &[&str] = &["deal", "eval", "sim", "cfg"];
    let argv: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

    let cli = match PokeroomCli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;

            // Help and version go to stdout and succeed
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                return match write!(out, "{}", e) {
                    Ok(()) => exit_code::SUCCESS,
                    Err(_) => exit_code::ERROR,
                };
            }
            let _ = write_usage(err, &e, COMMANDS);
            return exit_code::ERROR;
        }
    };

    let result = match cli.cmd {
        Commands::Deal { seed, seats } => handle_deal_command(seed, seats, out),
        Commands::Eval { cards } => handle_eval_command(&cards, out),
        Commands::Sim { hands, seed, seats } => handle_sim_command(hands, seed, seats, out, err),
        Commands::Cfg => handle_cfg_command(out),
    };
    match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            let _ = ui::write_error(err, &e.to_string());
            exit_code::ERROR
        }
    }
}

fn write_usage(err: &mut dyn Write, e: &clap::Error, commands: &[&str]) -> std::io::Result<()> {
    writeln!(err, "{}", e)?;
    writeln!(err)?;
    writeln!(err, "pokeroom offline tools")?;
    writeln!(err, "Usage: pokeroom <command> [options]\n")?;
    writeln!(err, "Commands:")?;
    for c in commands {
        writeln!(err, "  {}", c)?;
    }
    writeln!(err, "\nFor full help, run: pokeroom --help")
}
