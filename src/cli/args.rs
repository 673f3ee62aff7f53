use std::path::PathBuf;

use clap::Parser;

use crate::types::{PhaseSelection, RunMode};

#[derive(Parser, Debug)]
#[command(name = "dupvault", disable_version_flag = true)]
pub struct Cli {
    /// Configuration name (loads <configDirectory>/<name>.yaml)
    #[arg(short = 'f', value_name = "NAME")]
    pub config: Option<String>,
    /// Global settings file
    #[arg(short = 'g', value_name = "FILE")]
    pub global_config: Option<PathBuf>,

    /// Perform all operations (backup/copy, prune, check)
    #[arg(short = 'a')]
    pub all: bool,
    /// Perform backup/copy operations
    #[arg(short = 'b')]
    pub backup: bool,
    /// Perform check operations
    #[arg(short = 'c')]
    pub check: bool,
    /// Perform prune operations
    #[arg(short = 'p')]
    pub prune: bool,

    /// Mail the results of the run (implies quiet)
    #[arg(short = 'm')]
    pub mail: bool,
    /// Send test messages and exit
    #[arg(long = "test-mail", alias = "tm")]
    pub test_mail: bool,

    /// Debug output (implies verbose)
    #[arg(short = 'd')]
    pub debug: bool,
    /// Only print errors
    #[arg(short = 'q')]
    pub quiet: bool,
    #[arg(short = 'v')]
    pub verbose: bool,
    #[arg(long)]
    pub version: bool,
}

impl Cli {
    pub fn phases(&self) -> PhaseSelection {
        if self.all {
            return PhaseSelection::all();
        }
        PhaseSelection {
            backup: self.backup,
            prune: self.prune,
            check: self.check,
        }
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode {
            quiet: self.quiet || self.mail,
            verbose: self.verbose || self.debug,
            debug: self.debug,
        }
    }
}
