use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};
use std::thread;

use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};

use crate::error::EXIT_FAILURE;

static INSTALL: Once = Once::new();
static HELD: HeldLock = HeldLock::new();

/// Serializes tests that arm the process-wide slot.
#[cfg(test)]
pub(crate) static ARMED_TESTS: Mutex<()> = Mutex::new(());

/// The lock file this process currently owns, if any.
pub(crate) struct HeldLock {
    path: Mutex<Option<PathBuf>>,
}

impl HeldLock {
    pub(crate) const fn new() -> Self {
        Self {
            path: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.path.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn arm(&self, path: PathBuf) {
        *self.slot() = Some(path);
    }

    /// Forgets `path`; called before the owner unlinks its lock file.
    pub(crate) fn disarm(&self, path: &Path) {
        let mut slot = self.slot();
        if slot.as_deref() == Some(path) {
            *slot = None;
        }
    }

    pub(crate) fn is_armed(&self, path: &Path) -> bool {
        self.slot().as_deref() == Some(path)
    }

    /// Removes the armed lock file. Holds the slot while unlinking so a
    /// concurrent release cannot hand the path to another run in between.
    pub(crate) fn release(&self) -> Option<PathBuf> {
        let mut slot = self.slot();
        let path = slot.take()?;
        let _ = fs::remove_file(&path);
        Some(path)
    }
}

/// Removes the run lock file if the process is interrupted while holding it.
/// The handler thread is installed once per process.
pub fn release_on_signal(lock_path: PathBuf) {
    HELD.arm(lock_path);
    INSTALL.call_once(|| {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(signals) => signals,
            Err(err) => {
                eprintln!("signal handler setup failed: {}", err);
                return;
            }
        };
        thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                match HELD.release() {
                    Some(_) => {
                        eprintln!("Error: interrupted by signal {}; run lock released", signal)
                    }
                    None => eprintln!("Error: interrupted by signal {}", signal),
                }
                std::process::exit(EXIT_FAILURE);
            }
        });
    });
}

pub fn disarm(lock_path: &Path) {
    HELD.disarm(lock_path);
}

pub fn is_armed(lock_path: &Path) -> bool {
    HELD.is_armed(lock_path)
}
