use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::warn;

use crate::config::model::{Configuration, StorageOperation};
use crate::error::OperationError;
use crate::exec::{Invocation, ProcessRunner};
use crate::logging::{LogSink, SEPARATOR};
use crate::types::{Phase, PhaseSelection};
use crate::util::command::command_line;

/// Engine output lines kept for the failure report.
pub const TAIL_LINES: usize = 10;

#[derive(Debug)]
pub enum RunState {
    NotStarted,
    Running { phase: Phase, index: usize },
    Succeeded { elapsed: Duration },
    Failed(OperationError),
}

impl RunState {
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Succeeded { .. })
    }

    /// Phase and 1-based position of the operation that failed.
    pub fn failed_at(&self) -> Option<(Phase, usize)> {
        match self {
            RunState::Failed(err) => Some(err.position()),
            _ => None,
        }
    }
}

impl StorageOperation {
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = match self {
            StorageOperation::Backup { storage, threads } => vec![
                "backup".into(),
                "-storage".into(),
                storage.clone(),
                "-threads".into(),
                threads.to_string(),
                "-stats".into(),
            ],
            StorageOperation::Copy { from, to, threads } => vec![
                "copy".into(),
                "-threads".into(),
                threads.to_string(),
                "-from".into(),
                from.clone(),
                "-to".into(),
                to.clone(),
            ],
            StorageOperation::Prune { storage, .. } => vec![
                "prune".into(),
                "-all".into(),
                "-storage".into(),
                storage.clone(),
            ],
            StorageOperation::Check { storage, .. } => {
                vec!["check".into(), "-storage".into(), storage.clone()]
            }
        };
        match self {
            StorageOperation::Prune { keep, .. } => {
                args.extend(keep.split_whitespace().map(str::to_string));
            }
            StorageOperation::Check { all: true, .. } => args.push("-all".into()),
            _ => {}
        }
        args
    }

    pub fn narration(&self) -> String {
        match self {
            StorageOperation::Backup { storage, threads } => {
                format!("Backing up to storage {} with {} threads", storage, threads)
            }
            StorageOperation::Copy { from, to, threads } => format!(
                "Copying from storage {} to storage {} with {} threads",
                from, to, threads
            ),
            StorageOperation::Prune { storage, .. } => format!("Pruning storage {}", storage),
            StorageOperation::Check { storage, .. } => format!("Checking storage {}", storage),
        }
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}.{:01}s", s, elapsed.subsec_millis() / 100)
    }
}

/// Runs the selected phases in order and stops at the first failing operation.
/// A pipeline runs once; terminal states are never left.
pub struct Pipeline<'a> {
    engine: &'a Path,
    runner: &'a mut dyn ProcessRunner,
    sink: &'a mut LogSink,
    debug: bool,
    state: RunState,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        engine: &'a Path,
        runner: &'a mut dyn ProcessRunner,
        sink: &'a mut LogSink,
        debug: bool,
    ) -> Self {
        Self {
            engine,
            runner,
            sink,
            debug,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    pub fn run(&mut self, config: &Configuration, phases: PhaseSelection) -> &RunState {
        if !matches!(self.state, RunState::NotStarted) {
            return &self.state;
        }
        let started = Instant::now();
        self.sink.info(&format!(
            "Beginning backup on {}",
            Local::now().format("%m-%d-%Y %H:%M:%S")
        ));

        for phase in phases.phases() {
            for (offset, operation) in config.operations_for(phase).enumerate() {
                let index = offset + 1;
                self.state = RunState::Running { phase, index };
                if let Err(err) = self.execute(config, phase, index, operation) {
                    self.report(&err);
                    self.state = RunState::Failed(err);
                    return &self.state;
                }
            }
        }

        let elapsed = started.elapsed();
        self.sink.record(SEPARATOR);
        self.sink
            .info(&format!("Operations completed in {}", format_elapsed(elapsed)));
        self.state = RunState::Succeeded { elapsed };
        &self.state
    }

    fn execute(
        &mut self,
        config: &Configuration,
        phase: Phase,
        index: usize,
        operation: &StorageOperation,
    ) -> Result<(), OperationError> {
        let invocation = Invocation {
            program: self.engine.to_path_buf(),
            args: operation.args(),
            cwd: config.repository.clone(),
        };
        let program = invocation.program_name();

        self.sink.record(SEPARATOR);
        self.sink.info(&operation.narration());
        if self.debug {
            self.sink.info(&format!(
                "Executing: {}",
                command_line(&program, &invocation.args)
            ));
        }

        let mut process = self
            .runner
            .launch(&invocation)
            .map_err(|source| OperationError::Launch {
                phase,
                index,
                program: program.clone(),
                source,
            })?;

        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        for line in process.by_ref() {
            match line {
                Ok(line) => {
                    self.sink.record(&line);
                    if tail.len() == TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Err(err) => warn!(error = %err, "reading engine output"),
            }
        }

        match process.wait() {
            Ok(Some(0)) => Ok(()),
            Ok(Some(code)) => Err(OperationError::Exit {
                phase,
                index,
                program,
                code,
                tail: Vec::from(tail),
            }),
            Ok(None) => Err(OperationError::Signaled {
                phase,
                index,
                program,
                tail: Vec::from(tail),
            }),
            Err(source) => Err(OperationError::Wait {
                phase,
                index,
                program,
                source,
            }),
        }
    }

    fn report(&mut self, err: &OperationError) {
        self.sink.error(&format!("Error executing command: {}", err));
        let tail = err.tail();
        if !tail.is_empty() {
            self.sink.error("Last engine output:");
            for line in tail {
                self.sink.error(&format!("  {}", line));
            }
        }
    }
}
