use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::model::{
    Configuration, GlobalConfig, JobConfig, NotificationConfig, Settings, StorageOperation,
};
use crate::error::{ConfigError, Result};
use crate::util::paths::{self, job_config_path};

pub const DEFAULT_DUPLICACY_PATH: &str = "duplicacy";
pub const DEFAULT_LOG_FILE_COUNT: usize = 5;

fn read_yaml<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Loads global settings. Without `explicit`, a missing default file yields defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let app_dir = paths::app_dir();
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| app_dir.join(paths::GLOBAL_CONFIG_FILE));
    let raw = match read_yaml::<GlobalConfig>(&path) {
        Ok(raw) => raw,
        Err(ConfigError::Read { source, .. })
            if explicit.is_none() && source.kind() == io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "no global config; using defaults");
            GlobalConfig::default()
        }
        Err(err) => return Err(ConfigError::Global(err.to_string()).into()),
    };
    parse_settings(raw, &app_dir)
}

fn parse_settings(raw: GlobalConfig, app_dir: &Path) -> Result<Settings> {
    let config_dir = raw
        .config_directory
        .map(PathBuf::from)
        .unwrap_or_else(|| app_dir.to_path_buf());
    let lock_dir = raw
        .lock_directory
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.clone());
    let log_dir = raw
        .log_directory
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join("log"));
    let log_file_count = raw.log_file_count.unwrap_or(DEFAULT_LOG_FILE_COUNT);
    if log_file_count == 0 {
        return Err(ConfigError::Global("logFileCount must be at least 1".to_string()).into());
    }
    if let Some(notifications) = &raw.notifications {
        validate_notifications(notifications)?;
    }
    Ok(Settings {
        duplicacy_path: PathBuf::from(
            raw.duplicacy_path
                .unwrap_or_else(|| DEFAULT_DUPLICACY_PATH.to_string()),
        ),
        config_dir,
        lock_dir,
        log_dir,
        log_file_count,
        notifications: raw.notifications,
    })
}

fn validate_notifications(cfg: &NotificationConfig) -> Result<()> {
    if cfg.from.trim().is_empty() {
        return Err(ConfigError::Global("notifications.from is empty".to_string()).into());
    }
    if cfg.to.is_empty() || cfg.to.iter().any(|to| to.trim().is_empty()) {
        return Err(ConfigError::Global(
            "notifications.to needs at least one non-empty address".to_string(),
        )
        .into());
    }
    Ok(())
}

pub fn load_configuration(settings: &Settings, name: &str) -> Result<Configuration> {
    let path = job_config_path(&settings.config_dir, name)?;
    let raw: JobConfig = read_yaml(&path)?;
    parse_configuration(name, raw)
}

fn invalid(name: &str, msg: impl AsRef<str>) -> ConfigError {
    ConfigError::Invalid(format!("configuration {}: {}", name, msg.as_ref()))
}

fn check_threads(name: &str, what: &str, threads: u32) -> std::result::Result<(), ConfigError> {
    if threads == 0 {
        return Err(invalid(name, format!("{}: threads must be at least 1", what)));
    }
    Ok(())
}

pub(crate) fn parse_configuration(name: &str, raw: JobConfig) -> Result<Configuration> {
    if raw.repository.trim().is_empty() {
        return Err(invalid(name, "repository is empty").into());
    }
    if raw.storage.is_empty() {
        return Err(invalid(name, "no storage locations defined").into());
    }

    let mut operations = Vec::new();
    for backup in raw.storage {
        if backup.name.trim().is_empty() {
            return Err(invalid(name, "storage name is empty").into());
        }
        check_threads(name, &format!("storage {}", backup.name), backup.threads)?;
        operations.push(StorageOperation::Backup {
            storage: backup.name,
            threads: backup.threads,
        });
    }
    for copy in raw.copy {
        if copy.from.trim().is_empty() || copy.to.trim().is_empty() {
            return Err(invalid(name, "copy needs both from and to").into());
        }
        if copy.from == copy.to {
            return Err(invalid(name, format!("copy from {} to itself", copy.from)).into());
        }
        check_threads(name, &format!("copy {} -> {}", copy.from, copy.to), copy.threads)?;
        operations.push(StorageOperation::Copy {
            from: copy.from,
            to: copy.to,
            threads: copy.threads,
        });
    }
    for prune in raw.prune {
        if prune.storage.trim().is_empty() {
            return Err(invalid(name, "prune storage is empty").into());
        }
        if prune.keep.split_whitespace().next().is_none() {
            return Err(invalid(name, format!("prune {}: keep is empty", prune.storage)).into());
        }
        operations.push(StorageOperation::Prune {
            storage: prune.storage,
            keep: prune.keep,
        });
    }
    for check in raw.check {
        if check.storage.trim().is_empty() {
            return Err(invalid(name, "check storage is empty").into());
        }
        operations.push(StorageOperation::Check {
            storage: check.storage,
            all: check.all,
        });
    }

    Ok(Configuration {
        name: name.to_string(),
        repository: PathBuf::from(raw.repository),
        operations,
    })
}
