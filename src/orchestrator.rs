use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::config::model::{Configuration, Settings};
use crate::error::{DupvaultError, Result, EXIT_FAILURE, EXIT_SUCCESS};
use crate::exec::ProcessRunner;
use crate::lock::RunLock;
use crate::logging::LogSink;
use crate::mail::{result_subject, Mailer};
use crate::pipeline::{Pipeline, RunState};
use crate::rotate::rotate;
use crate::types::{Phase, PhaseSelection, RunMode};
use crate::util::paths::log_path;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a run needs to know, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config_name: String,
    pub phases: PhaseSelection,
    pub send_mail: bool,
    pub run_mode: RunMode,
    pub engine: PathBuf,
    pub log_dir: PathBuf,
    pub log_file_count: usize,
}

impl RunRequest {
    pub fn new(
        config_name: &str,
        phases: PhaseSelection,
        send_mail: bool,
        run_mode: RunMode,
        settings: &Settings,
    ) -> Self {
        Self {
            config_name: config_name.to_string(),
            phases,
            send_mail,
            run_mode,
            engine: settings.duplicacy_path.clone(),
            log_dir: settings.log_dir.clone(),
            log_file_count: settings.log_file_count,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub success: bool,
    pub exit_code: i32,
    pub failed_at: Option<(Phase, usize)>,
    pub log: Vec<String>,
}

pub struct Orchestrator<'a, L: RunLock> {
    lock: &'a L,
    runner: &'a mut dyn ProcessRunner,
    mailer: &'a mut dyn Mailer,
}

impl<'a, L: RunLock> Orchestrator<'a, L> {
    pub fn new(lock: &'a L, runner: &'a mut dyn ProcessRunner, mailer: &'a mut dyn Mailer) -> Self {
        Self {
            lock,
            runner,
            mailer,
        }
    }

    pub fn run(&mut self, request: &RunRequest, config: &Configuration) -> RunOutcome {
        let mut sink = LogSink::new(request.run_mode.quiet);
        sink.info(&format!("dupvault running, version: {}", VERSION));

        if request.phases.is_empty() {
            sink.error("Error: No operations to perform (specify -b, -p, -c, or -a)");
            return finish(sink, EXIT_FAILURE, None);
        }

        let guard = match self.lock.acquire(&request.config_name) {
            Ok(guard) => guard,
            Err(err) => {
                sink.error(&format!("Error: {}", err));
                return finish(sink, DupvaultError::from(err).exit_code(), None);
            }
        };

        let result = self.locked_run(request, config, &mut sink);

        if let Err(err) = self.lock.release(guard) {
            warn!(error = %err, "run lock release failed");
            sink.error(&format!("Error: {}", err));
        }

        let (code, failed_at) = match result {
            Ok(state) if state.is_success() => (EXIT_SUCCESS, None),
            Ok(state) => (EXIT_FAILURE, state.failed_at()),
            Err(err) => {
                sink.error(&format!("Error: {}", err));
                (err.exit_code(), None)
            }
        };
        if let Err(err) = sink.close() {
            warn!(error = %err, "closing run log");
        }

        let outcome = finish(sink, code, failed_at);
        if request.send_mail {
            let subject = result_subject(&request.config_name, outcome.success);
            if let Err(err) = self.mailer.send(&subject, &outcome.log) {
                eprintln!("Error sending E-Mail message: {}", err);
            }
        }
        outcome
    }

    fn locked_run(
        &mut self,
        request: &RunRequest,
        config: &Configuration,
        sink: &mut LogSink,
    ) -> Result<RunState> {
        let log_file = log_path(&request.log_dir, &request.config_name)?;
        fs::create_dir_all(&request.log_dir).map_err(|e| {
            DupvaultError::message(format!("create {}: {}", request.log_dir.display(), e))
        })?;

        // The previous run's log must be safely archived before anything is written.
        sink.info("Rotating log files");
        rotate(&log_file, request.log_file_count)?;
        sink.open_file(&log_file).map_err(|e| {
            DupvaultError::message(format!("create {}: {}", log_file.display(), e))
        })?;

        let mut pipeline = Pipeline::new(
            &request.engine,
            &mut *self.runner,
            sink,
            request.run_mode.debug,
        );
        pipeline.run(config, request.phases);
        Ok(pipeline.into_state())
    }
}

fn finish(sink: LogSink, exit_code: i32, failed_at: Option<(Phase, usize)>) -> RunOutcome {
    RunOutcome {
        success: exit_code == EXIT_SUCCESS,
        exit_code,
        failed_at,
        log: sink.mail_body().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::StorageOperation;
    use crate::exec::fake::FakeRunner;
    use crate::lock::memory::MemoryLock;
    use crate::lock::FileLock;
    use crate::mail::fake::RecordingMailer;
    use crate::util::paths::generation_path;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::path::Path;
    use tempfile::TempDir;

    fn request(dir: &Path, phases: PhaseSelection) -> RunRequest {
        RunRequest {
            config_name: "home".to_string(),
            phases,
            send_mail: true,
            run_mode: RunMode {
                quiet: true,
                ..RunMode::default()
            },
            engine: PathBuf::from("duplicacy"),
            log_dir: dir.join("log"),
            log_file_count: 5,
        }
    }

    fn backup_only() -> PhaseSelection {
        PhaseSelection {
            backup: true,
            ..PhaseSelection::default()
        }
    }

    fn config(operations: Vec<StorageOperation>) -> Configuration {
        Configuration {
            name: "home".to_string(),
            repository: PathBuf::from("/srv/data"),
            operations,
        }
    }

    fn single_backup() -> Configuration {
        config(vec![
            StorageOperation::Backup {
                storage: "b2".to_string(),
                threads: 4,
            },
            StorageOperation::Check {
                storage: "b2".to_string(),
                all: false,
            },
        ])
    }

    #[test]
    fn successful_run_rotates_once_and_releases_lock() {
        let dir = TempDir::new().expect("tempdir");
        let req = request(dir.path(), backup_only());
        let log_file = req.log_dir.join("home.log");
        fs::create_dir_all(&req.log_dir).expect("log dir");
        fs::write(&log_file, b"previous run\n").expect("old log");

        let lock = FileLock::new(dir.path().join("locks"));
        let mut runner = FakeRunner {
            output: vec!["Backup for /srv/data at revision 12 completed".to_string()],
            ..FakeRunner::default()
        };
        let mut mailer = RecordingMailer::default();

        let outcome =
            Orchestrator::new(&lock, &mut runner, &mut mailer).run(&req, &single_backup());

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(runner.launched.len(), 1);
        assert_eq!(
            runner.launched[0].args,
            vec!["backup", "-storage", "b2", "-threads", "4", "-stats"]
        );
        assert!(!dir.path().join("locks").join("home.lock").exists());

        let mut archived = String::new();
        GzDecoder::new(fs::File::open(generation_path(&log_file, 1)).expect("gen 1"))
            .read_to_string(&mut archived)
            .expect("gunzip");
        assert_eq!(archived, "previous run\n");
        assert!(!generation_path(&log_file, 2).exists());

        let current = fs::read_to_string(&log_file).expect("new log");
        assert!(current.contains("Backing up to storage b2 with 4 threads"));
        assert!(current.contains("revision 12 completed"));
        assert!(!current.contains("previous run"));

        assert_eq!(mailer.sent.len(), 1);
        assert_eq!(
            mailer.sent[0].0,
            "dupvault: Backup results for configuration home (success)"
        );
        assert!(mailer.sent[0]
            .1
            .iter()
            .any(|line| line.contains("Operations completed in")));
    }

    #[test]
    fn held_lock_exits_200_without_touching_logs() {
        let dir = TempDir::new().expect("tempdir");
        let req = request(dir.path(), backup_only());
        let log_file = req.log_dir.join("home.log");
        fs::create_dir_all(&req.log_dir).expect("log dir");
        fs::write(&log_file, b"previous run\n").expect("old log");

        let lock = FileLock::new(dir.path().join("locks"));
        let held = lock.acquire("home").expect("other holder");
        let mut runner = FakeRunner::default();
        let mut mailer = RecordingMailer::default();

        let outcome =
            Orchestrator::new(&lock, &mut runner, &mut mailer).run(&req, &single_backup());

        assert_eq!(outcome.exit_code, 200);
        assert!(runner.launched.is_empty());
        assert_eq!(fs::read(&log_file).expect("untouched"), b"previous run\n");
        assert!(!generation_path(&log_file, 1).exists());
        assert!(mailer.sent.is_empty());
        assert!(outcome
            .log
            .iter()
            .any(|line| line.starts_with("Error: unable to obtain lock")));
        assert!(held.path().exists());
    }

    #[test]
    fn pipeline_failure_exits_1_and_still_releases() {
        let dir = TempDir::new().expect("tempdir");
        let req = request(dir.path(), PhaseSelection::all());
        let lock = MemoryLock::default();
        let mut runner = FakeRunner::failing_at(1, 100);
        let mut mailer = RecordingMailer::default();

        let outcome =
            Orchestrator::new(&lock, &mut runner, &mut mailer).run(&req, &single_backup());

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.failed_at, Some((Phase::Backup, 1)));
        assert_eq!(runner.launched.len(), 1);
        assert!(!lock.is_held("home"));
        assert!(mailer.sent[0].0.ends_with("(FAILURE)"));
    }

    #[test]
    fn rotation_failure_runs_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let req = request(dir.path(), backup_only());
        fs::create_dir_all(req.log_dir.join("home.log")).expect("directory in the way");
        let lock = MemoryLock::default();
        let mut runner = FakeRunner::default();
        let mut mailer = RecordingMailer::default();

        let outcome =
            Orchestrator::new(&lock, &mut runner, &mut mailer).run(&req, &single_backup());

        assert_eq!(outcome.exit_code, 1);
        assert!(runner.launched.is_empty());
        assert!(!lock.is_held("home"));
        assert!(outcome.log.iter().any(|line| line.starts_with("Error: ")));
    }

    #[test]
    fn empty_selection_is_rejected_before_locking() {
        let dir = TempDir::new().expect("tempdir");
        let req = request(dir.path(), PhaseSelection::default());
        let lock = MemoryLock::default();
        let _held = lock.acquire("home").expect("held");
        let mut runner = FakeRunner::default();
        let mut mailer = RecordingMailer::default();

        let outcome =
            Orchestrator::new(&lock, &mut runner, &mut mailer).run(&req, &single_backup());

        assert_eq!(outcome.exit_code, 1);
        assert!(!req.log_dir.exists());
    }

    #[test]
    fn mail_failure_does_not_change_the_outcome() {
        let dir = TempDir::new().expect("tempdir");
        let req = request(dir.path(), backup_only());
        let lock = MemoryLock::default();
        let mut runner = FakeRunner::default();
        let mut mailer = RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        };

        let outcome =
            Orchestrator::new(&lock, &mut runner, &mut mailer).run(&req, &single_backup());

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(mailer.sent.len(), 1);
    }
}
