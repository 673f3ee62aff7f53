use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::debug;

pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg.as_ref());
    }
    line
}

pub fn describe(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy().to_string();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    command_line(&program, &args)
}

/// Runs `cmd` with `input` on stdin and returns its exit code (1 if killed by a signal).
pub fn run_with_input(cmd: &mut Command, input: &[u8]) -> io::Result<i32> {
    debug!(command = %describe(cmd), "running");
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input)?;
    }
    let status = child.wait()?;
    Ok(status.code().unwrap_or(1))
}
