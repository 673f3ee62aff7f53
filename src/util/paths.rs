use std::env;
use std::path::{Path, PathBuf};

use crate::error::{DupvaultError, Result};

pub const APP_DIR: &str = ".dupvault";
pub const GLOBAL_CONFIG_FILE: &str = "dupvault.yaml";

pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn checked_name(name: &str) -> Result<&str> {
    if !is_safe_name(name) {
        return Err(DupvaultError::usage(format!(
            "configuration {} name must use only letters, digits, '.', '-', '_'",
            name
        )));
    }
    Ok(name)
}

pub fn lock_path(lock_dir: &Path, name: &str) -> Result<PathBuf> {
    Ok(lock_dir.join(format!("{}.lock", checked_name(name)?)))
}

pub fn log_path(log_dir: &Path, name: &str) -> Result<PathBuf> {
    Ok(log_dir.join(format!("{}.log", checked_name(name)?)))
}

pub fn job_config_path(config_dir: &Path, name: &str) -> Result<PathBuf> {
    Ok(config_dir.join(format!("{}.yaml", checked_name(name)?)))
}

/// Compressed log generation `index` for the active log at `root`.
pub fn generation_path(root: &Path, index: usize) -> PathBuf {
    let mut name = root.as_os_str().to_os_string();
    name.push(format!(".{}.gz", index));
    PathBuf::from(name)
}

pub fn app_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    Path::new(&home).join(APP_DIR)
}
