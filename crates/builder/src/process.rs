//! Running external tools.
//!
//! Everything the builder shells out to goes through [`ProcessRunner`], so the
//! pipeline can be driven by a fake in tests and by [`DryRun`] from the CLI.

use crate::invocation::Invocation;
use std::io;
use std::process::Stdio;
use tracing::debug;

/// How a finished process ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Finished {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout. Empty for [`ProcessRunner::run`].
    pub stdout: String,
}

impl Finished {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
        }
    }

    #[cfg(test)]
    pub fn with_stdout(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human description of how the process ended.
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub trait ProcessRunner {
    /// Run to completion with inherited stdio.
    fn run(&mut self, invocation: &Invocation) -> io::Result<Finished>;

    /// Run to completion, capturing stdout and discarding stderr.
    fn capture(&mut self, invocation: &Invocation) -> io::Result<Finished>;
}

/// Spawns real child processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> io::Result<Finished> {
        debug!(command = %invocation, "running");
        let status = invocation.to_command().status()?;
        Ok(Finished {
            code: status.code(),
            stdout: String::new(),
        })
    }

    fn capture(&mut self, invocation: &Invocation) -> io::Result<Finished> {
        debug!(command = %invocation, "capturing");
        let output = invocation
            .to_command()
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        Ok(Finished {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Prints what would run instead of running it.
///
/// Queries ([`ProcessRunner::capture`]) still execute so the printed command
/// shows the metadata a real run would embed.
#[derive(Debug, Default)]
pub struct DryRun {
    queries: SystemRunner,
}

impl ProcessRunner for DryRun {
    fn run(&mut self, invocation: &Invocation) -> io::Result<Finished> {
        println!("  [dry-run] {invocation}");
        Ok(Finished::exited(0))
    }

    fn capture(&mut self, invocation: &Invocation) -> io::Result<Finished> {
        self.queries.capture(invocation)
    }
}
