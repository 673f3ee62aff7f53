use crate::cli::args::Cli;
use crate::config::load::load_configuration;
use crate::config::model::Settings;
use crate::error::{DupvaultError, MailError};
use crate::exec::SystemRunner;
use crate::lock::FileLock;
use crate::mail::{Mailer, SendmailMailer, Unconfigured};
use crate::orchestrator::{Orchestrator, RunRequest};
use crate::util::paths::is_safe_name;

pub fn run_backup_command(cli: &Cli, settings: &Settings) -> anyhow::Result<i32> {
    let Some(name) = cli.config.as_deref() else {
        return Err(DupvaultError::usage(
            "Mandatory parameter -f is not specified (must be specified)",
        )
        .into());
    };
    if !is_safe_name(name) {
        return Err(DupvaultError::usage(format!(
            "configuration {} name must use only letters, digits, '.', '-', '_'",
            name
        ))
        .into());
    }
    if cli.mail && settings.notifications.is_none() {
        return Err(DupvaultError::usage(format!(
            "-m given but {}",
            MailError::NotConfigured
        ))
        .into());
    }

    let config = load_configuration(settings, name)?;
    let run_mode = cli.run_mode();
    if run_mode.verbose {
        println!(
            "loaded configuration {} with {} operation(s)",
            name,
            config.operations.len()
        );
    }

    let request = RunRequest::new(name, cli.phases(), cli.mail, run_mode, settings);
    let lock = FileLock::new(&settings.lock_dir).with_signal_release();
    let mut runner = SystemRunner;
    let mut mailer: Box<dyn Mailer> = match settings.notifications.clone() {
        Some(notifications) => Box::new(SendmailMailer::new(notifications)),
        None => Box::new(Unconfigured),
    };

    let outcome = Orchestrator::new(&lock, &mut runner, mailer.as_mut()).run(&request, &config);
    Ok(outcome.exit_code)
}
