use std::path::PathBuf;

use serde::Deserialize;

use crate::types::Phase;

#[derive(Debug, Deserialize, Clone)]
pub struct JobConfig {
    pub repository: String,
    #[serde(default)]
    pub storage: Vec<BackupConfig>,
    #[serde(default)]
    pub copy: Vec<CopyConfig>,
    #[serde(default)]
    pub prune: Vec<PruneConfig>,
    #[serde(default)]
    pub check: Vec<CheckConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackupConfig {
    pub name: String,
    #[serde(default = "default_threads")]
    pub threads: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CopyConfig {
    pub from: String,
    pub to: String,
    #[serde(default = "default_threads")]
    pub threads: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PruneConfig {
    pub storage: String,
    pub keep: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckConfig {
    pub storage: String,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GlobalConfig {
    #[serde(default, rename = "duplicacyPath")]
    pub duplicacy_path: Option<String>,
    #[serde(default, rename = "configDirectory")]
    pub config_directory: Option<String>,
    #[serde(default, rename = "lockDirectory")]
    pub lock_directory: Option<String>,
    #[serde(default, rename = "logDirectory")]
    pub log_directory: Option<String>,
    #[serde(default, rename = "logFileCount")]
    pub log_file_count: Option<usize>,
    #[serde(default)]
    pub notifications: Option<NotificationConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_sendmail")]
    pub sendmail: String,
}

/// One external engine invocation, in the order the configuration declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOperation {
    Backup { storage: String, threads: u32 },
    Copy { from: String, to: String, threads: u32 },
    Prune { storage: String, keep: String },
    Check { storage: String, all: bool },
}

impl StorageOperation {
    pub fn phase(&self) -> Phase {
        match self {
            StorageOperation::Backup { .. } => Phase::Backup,
            StorageOperation::Copy { .. } => Phase::Copy,
            StorageOperation::Prune { .. } => Phase::Prune,
            StorageOperation::Check { .. } => Phase::Check,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub name: String,
    pub repository: PathBuf,
    pub operations: Vec<StorageOperation>,
}

impl Configuration {
    pub fn operations_for(&self, phase: Phase) -> impl Iterator<Item = &StorageOperation> {
        self.operations.iter().filter(move |op| op.phase() == phase)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub duplicacy_path: PathBuf,
    pub config_dir: PathBuf,
    pub lock_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_file_count: usize,
    pub notifications: Option<NotificationConfig>,
}

fn default_threads() -> u32 {
    1
}

fn default_sendmail() -> String {
    "/usr/sbin/sendmail".to_string()
}
