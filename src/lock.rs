use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, warn};

use crate::error::LockError;
use crate::signal_handler;
use crate::util::paths::lock_path;

/// Non-blocking run exclusion keyed by configuration name.
pub trait RunLock {
    type Guard;

    fn acquire(&self, name: &str) -> Result<Self::Guard, LockError>;

    fn release(&self, guard: Self::Guard) -> Result<(), LockError>;
}

/// `flock(2)` on `<dir>/<name>.lock`, visible to every process on the host.
pub struct FileLock {
    dir: PathBuf,
    release_on_signal: bool,
}

pub struct FileLockGuard {
    path: PathBuf,
    lock: Option<Flock<File>>,
}

impl FileLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            release_on_signal: false,
        }
    }

    /// Removes the lock file when SIGINT or SIGTERM ends the process.
    pub fn with_signal_release(mut self) -> Self {
        self.release_on_signal = true;
        self
    }

    fn mechanism(path: &Path, source: io::Error) -> LockError {
        LockError::Mechanism {
            path: path.to_path_buf(),
            source,
        }
    }

    fn try_lock(path: &Path) -> Result<Option<Flock<File>>, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Self::mechanism(path, e))?;
        let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(LockError::AlreadyLocked {
                    path: path.to_path_buf(),
                })
            }
            Err((_, errno)) => return Err(Self::mechanism(path, io::Error::from(errno))),
        };

        // A previous holder may have unlinked the path between our open and flock.
        let held = lock.metadata().map_err(|e| Self::mechanism(path, e))?;
        match fs::metadata(path) {
            Ok(current) if current.dev() == held.dev() && current.ino() == held.ino() => {
                Ok(Some(lock))
            }
            Ok(_) => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::mechanism(path, err)),
        }
    }
}

impl RunLock for FileLock {
    type Guard = FileLockGuard;

    fn acquire(&self, name: &str) -> Result<FileLockGuard, LockError> {
        let path = lock_path(&self.dir, name).map_err(|e| {
            Self::mechanism(
                &self.dir,
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            )
        })?;
        fs::create_dir_all(&self.dir).map_err(|e| Self::mechanism(&self.dir, e))?;

        for _ in 0..3 {
            let Some(lock) = Self::try_lock(&path)? else {
                debug!(path = %path.display(), "lock file replaced while locking; retrying");
                continue;
            };
            let mut file: &File = &lock;
            file.set_len(0)
                .and_then(|()| writeln!(file, "{}", std::process::id()))
                .map_err(|e| Self::mechanism(&path, e))?;
            if self.release_on_signal {
                signal_handler::release_on_signal(path.clone());
            }
            debug!(path = %path.display(), "acquired run lock");
            return Ok(FileLockGuard {
                path,
                lock: Some(lock),
            });
        }
        Err(Self::mechanism(
            &path,
            io::Error::new(io::ErrorKind::Other, "lock file keeps changing"),
        ))
    }

    fn release(&self, mut guard: FileLockGuard) -> Result<(), LockError> {
        guard.unlock()
    }
}

impl FileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unlock(&mut self) -> Result<(), LockError> {
        let Some(lock) = self.lock.take() else {
            return Ok(());
        };
        // Unlink while still holding the lock so no waiter can lock the old inode.
        signal_handler::disarm(&self.path);
        let removed = match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FileLock::mechanism(&self.path, err)),
        };
        if let Err((_, errno)) = lock.unlock() {
            return Err(FileLock::mechanism(&self.path, io::Error::from(errno)));
        }
        debug!(path = %self.path.display(), "released run lock");
        removed
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.unlock() {
            warn!(error = %err, "run lock release failed");
        }
    }
}
