//! Launching the backup engine.
//!
//! A launched process is consumed as a finite stream of output lines (stdout
//! and stderr merged in arrival order) followed by a single `wait`. Two reader
//! threads drain the pipes into an unbounded channel so neither pipe can fill
//! up and stall the child.

use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::util::command::describe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }
}

/// A running child: iterate its output to exhaustion, then `wait`.
pub trait RunningProcess: Iterator<Item = io::Result<String>> {
    /// Exit code, or `None` when the process was killed by a signal.
    fn wait(self: Box<Self>) -> io::Result<Option<i32>>;
}

pub trait ProcessRunner {
    fn launch(&mut self, invocation: &Invocation) -> io::Result<Box<dyn RunningProcess>>;
}

#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn launch(&mut self, invocation: &Invocation) -> io::Result<Box<dyn RunningProcess>> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(command = %describe(&cmd), cwd = %invocation.cwd.display(), "launching");
        let mut child = cmd.spawn()?;

        let (tx, lines) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx));
        }
        Ok(Box::new(ChildProcess {
            child,
            lines,
            readers,
        }))
    }
}

struct ChildProcess {
    child: Child,
    lines: Receiver<io::Result<String>>,
    readers: Vec<JoinHandle<()>>,
}

fn forward_lines<R: Read + Send + 'static>(
    reader: R,
    tx: Sender<io::Result<String>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for chunk in BufReader::new(reader).split(b'\n') {
            let line = chunk.map(|bytes| {
                let text = String::from_utf8_lossy(&bytes);
                text.strip_suffix('\r').unwrap_or(&text).to_string()
            });
            let stop = line.is_err();
            if tx.send(line).is_err() || stop {
                break;
            }
        }
    })
}

impl Iterator for ChildProcess {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.recv().ok()
    }
}

impl RunningProcess for ChildProcess {
    fn wait(mut self: Box<Self>) -> io::Result<Option<i32>> {
        // The channel is unbounded, so readers finish even if output was left unread.
        let status = self.child.wait()?;
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                warn!("engine output reader panicked");
            }
        }
        Ok(status.code())
    }
}
