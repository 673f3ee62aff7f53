//! Run narration.
//!
//! Every line the operator should see goes through [`LogSink`]: it is printed
//! to the terminal, appended to the run log file with an `HH:MM:SS` prefix and
//! kept in memory so the whole run can be mailed afterwards.

use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::Path;

use chrono::Local;
use tracing::warn;

pub const SEPARATOR: &str =
    "######################################################################";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Console,
    ErrorConsole,
}

pub struct LogSink {
    quiet: bool,
    file: Option<LineWriter<File>>,
    mail_body: Vec<String>,
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

impl LogSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            file: None,
            mail_body: Vec::new(),
        }
    }

    /// Truncates or creates the run log. Lines emitted earlier are not replayed into it.
    pub fn open_file(&mut self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        self.file = Some(LineWriter::new(file));
        Ok(())
    }

    pub fn emit(&mut self, destination: Destination, message: &str) {
        let stamped = format!("{} {}", timestamp(), message);
        self.write_file(&stamped);
        match destination {
            Destination::Console => {
                if !self.quiet {
                    println!("{}", stamped);
                }
                self.mail_body.push(stamped);
            }
            Destination::ErrorConsole => {
                eprintln!("{}", message);
                self.mail_body.push(message.to_string());
            }
        }
    }

    pub fn info(&mut self, message: &str) {
        self.emit(Destination::Console, message);
    }

    pub fn error(&mut self, message: &str) {
        self.emit(Destination::ErrorConsole, message);
    }

    /// Log file only; used for engine output and separators.
    pub fn record(&mut self, line: &str) {
        let stamped = format!("{} {}", timestamp(), line);
        self.write_file(&stamped);
    }

    pub fn mail_body(&self) -> &[String] {
        &self.mail_body
    }

    pub fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    fn write_file(&mut self, line: &str) {
        let failed = match self.file.as_mut() {
            Some(file) => writeln!(file, "{}", line).err(),
            None => None,
        };
        if let Some(err) = failed {
            warn!(error = %err, "run log write failed; further lines go to the console only");
            self.file = None;
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
