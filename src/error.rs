use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Phase;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_LOCK_HELD: i32 = 200;
pub const EXIT_LOCK_MECHANISM: i32 = 201;

#[derive(Debug, Error)]
pub enum DupvaultError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Lock(#[from] LockError),
    #[error("{0}")]
    Rotation(#[from] RotationError),
    #[error("{0}")]
    Operation(#[from] OperationError),
    #[error("{0}")]
    Mail(#[from] MailError),
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    Invalid(String),
    #[error("global config {0}")]
    Global(String),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("unable to obtain lock using lockfile: {}", path.display())]
    AlreadyLocked { path: PathBuf },
    #[error("lock {}: {source}", path.display())]
    Mechanism { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("open {}: {source}", path.display())]
    OpenSource { path: PathBuf, source: io::Error },
    #[error("create {}: {source}", path.display())]
    CreateDestination { path: PathBuf, source: io::Error },
    #[error("compress {}: {source}", path.display())]
    Compress { path: PathBuf, source: io::Error },
    #[error("remove {}: {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
    #[error("shift {} to {}: {source}", from.display(), to.display())]
    Shift {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{phase} #{index}: failed to launch {program}: {source}")]
    Launch {
        phase: Phase,
        index: usize,
        program: String,
        source: io::Error,
    },
    #[error("{phase} #{index}: {program} exited with code {code}")]
    Exit {
        phase: Phase,
        index: usize,
        program: String,
        code: i32,
        tail: Vec<String>,
    },
    #[error("{phase} #{index}: {program} terminated by signal")]
    Signaled {
        phase: Phase,
        index: usize,
        program: String,
        tail: Vec<String>,
    },
    #[error("{phase} #{index}: wait for {program}: {source}")]
    Wait {
        phase: Phase,
        index: usize,
        program: String,
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail notifications are not configured")]
    NotConfigured,
    #[error("{program}: {source}")]
    Transport { program: String, source: io::Error },
    #[error("{program} exited with code {code}")]
    Rejected { program: String, code: i32 },
}

pub type Result<T> = std::result::Result<T, DupvaultError>;

impl DupvaultError {
    pub fn message(msg: impl Into<String>) -> Self {
        DupvaultError::Message(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        DupvaultError::Usage(msg.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            DupvaultError::Usage(_) => EXIT_USAGE,
            DupvaultError::Config(ConfigError::Global(_)) => EXIT_USAGE,
            DupvaultError::Lock(LockError::AlreadyLocked { .. }) => EXIT_LOCK_HELD,
            DupvaultError::Lock(LockError::Mechanism { .. }) => EXIT_LOCK_MECHANISM,
            _ => EXIT_FAILURE,
        }
    }
}

impl OperationError {
    pub fn tail(&self) -> &[String] {
        match self {
            OperationError::Exit { tail, .. } | OperationError::Signaled { tail, .. } => tail,
            _ => &[],
        }
    }

    pub fn position(&self) -> (Phase, usize) {
        match self {
            OperationError::Launch { phase, index, .. }
            | OperationError::Exit { phase, index, .. }
            | OperationError::Signaled { phase, index, .. }
            | OperationError::Wait { phase, index, .. } => (*phase, *index),
        }
    }
}
