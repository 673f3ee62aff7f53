use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::Cli;
use crate::cli::commands::{backup, test_mail};
use crate::config::load::load_settings;
use crate::error::{EXIT_SUCCESS, EXIT_USAGE};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod args;
pub mod commands;

pub use commands::exit_code_for;

pub fn run() -> anyhow::Result<i32> {
    let cli = match parse_cli(std::env::args().collect()) {
        Ok(cli) => cli,
        Err(code) => return Ok(code),
    };
    init_tracing(cli.debug);

    if cli.version {
        println!("dupvault {}", VERSION);
        return Ok(EXIT_SUCCESS);
    }

    let settings = load_settings(cli.global_config.as_deref())?;
    if cli.test_mail {
        return Ok(test_mail::run_test_mail(&settings));
    }
    backup::run_backup_command(&cli, &settings)
}

pub(crate) fn parse_cli(raw: Vec<String>) -> std::result::Result<Cli, i32> {
    match Cli::try_parse_from(preprocess_args(raw)) {
        Ok(cli) => Ok(cli),
        Err(err) => {
            let _ = err.print();
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Err(EXIT_SUCCESS),
                _ => Err(EXIT_USAGE),
            }
        }
    }
}

/// Accepts the single-dash long flags older scripts pass (`-tm`, `-version`).
fn preprocess_args(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|arg| match arg.as_str() {
            "-tm" => "--test-mail".to_string(),
            "-version" => "--version".to_string(),
            _ => arg,
        })
        .collect()
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, i32> {
        let mut raw = vec!["dupvault".to_string()];
        raw.extend(args.iter().map(|a| a.to_string()));
        parse_cli(raw)
    }

    #[test]
    fn combined_short_flags() {
        let cli = parse(&["-f", "home", "-bp", "-m"]).expect("parse");
        assert_eq!(cli.config.as_deref(), Some("home"));
        let phases = cli.phases();
        assert!(phases.backup && phases.prune && !phases.check);
        let mode = cli.run_mode();
        assert!(mode.quiet);
    }

    #[test]
    fn all_flag_and_debug() {
        let cli = parse(&["-a", "-d", "-f", "x"]).expect("parse");
        assert_eq!(cli.phases(), crate::types::PhaseSelection::all());
        let mode = cli.run_mode();
        assert!(mode.debug && mode.verbose && !mode.quiet);
    }

    #[test]
    fn legacy_single_dash_flags() {
        assert!(parse(&["-tm"]).expect("parse").test_mail);
        assert!(parse(&["-version"]).expect("parse").version);
    }

    #[test]
    fn unknown_or_positional_arguments_exit_2() {
        assert_eq!(parse(&["--bogus"]).err(), Some(2));
        assert_eq!(parse(&["-f", "home", "extra"]).err(), Some(2));
    }
}
