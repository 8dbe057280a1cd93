//! Single simulator invocations.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use command_group::{CommandGroup, GroupChild};
use tracing::{debug, warn};

use crate::config::{SimulationConfig, encode};
use crate::error::{HarnessError, Result};
use crate::model::{MetricsRecord, MetricsSchema, decode_line};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Anything that turns a configuration into one run's metrics.
///
/// `ProcessRunner` is the production implementation; tests substitute
/// in-process fakes.
pub trait Simulator: Sync {
    fn run(&self, config: &SimulationConfig) -> Result<MetricsRecord>;
}

impl<S: Simulator + ?Sized> Simulator for &S {
    fn run(&self, config: &SimulationConfig) -> Result<MetricsRecord> {
        (**self).run(config)
    }
}

/// Runs the simulator binary as a subprocess and decodes its final stdout line.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    prefix_args: Vec<String>,
    schema: Option<MetricsSchema>,
    timeout: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            schema: None,
            timeout: None,
            cancel: None,
        }
    }

    /// Build a runner from a whitespace-separated command such as
    /// `cargo run --release --`. The first word is the program, the rest are
    /// passed before the encoded configuration.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace();
        let program = words.next().ok_or_else(|| HarnessError::ProcessFailure {
            program: command.to_string(),
            detail: "empty simulator command".to_string(),
        })?;
        Ok(Self::new(program).with_prefix_args(words))
    }

    #[must_use]
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Validate output against `schema` instead of inferring fields
    #[must_use]
    pub fn with_schema(mut self, schema: MetricsSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kill the running child and fail with `Cancelled` once `flag` is set
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn prefix_args(&self) -> &[String] {
        &self.prefix_args
    }

    pub fn schema(&self) -> Option<&MetricsSchema> {
        self.schema.as_ref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn failure(&self, detail: String) -> HarnessError {
        HarnessError::ProcessFailure {
            program: self.program.clone(),
            detail,
        }
    }

    fn wait(&self, child: &mut GroupChild) -> Result<ExitStatus> {
        if self.timeout.is_none() && self.cancel.is_none() {
            return child
                .wait()
                .map_err(|e| self.failure(format!("wait failed: {e}")));
        }

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    self.kill(child, "wait failed");
                    return Err(self.failure(format!("wait failed: {e}")));
                }
            }

            if self.is_cancelled() {
                self.kill(child, "cancelled");
                return Err(HarnessError::Cancelled);
            }
            if let Some(timeout) = self.timeout
                && started.elapsed() >= timeout
            {
                self.kill(child, "timed out");
                return Err(HarnessError::Timeout {
                    program: self.program.clone(),
                    timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Kills the whole process group, including anything a prefix command
    /// such as `cargo run` started.
    fn kill(&self, child: &mut GroupChild, reason: &str) {
        warn!(program = %self.program, pid = child.id(), reason, "killing simulator");
        if let Err(e) = child.kill() {
            warn!(program = %self.program, error = %e, "failed to kill simulator");
        }
        let _ = child.wait();
    }
}

impl Simulator for ProcessRunner {
    fn run(&self, config: &SimulationConfig) -> Result<MetricsRecord> {
        if self.is_cancelled() {
            return Err(HarnessError::Cancelled);
        }

        let args = encode(config);
        debug!(program = %self.program, prefix = ?self.prefix_args, ?args, "invoking simulator");

        let mut child = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .group_spawn()
            .map_err(|e| self.failure(format!("cannot spawn: {e}")))?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe
        let stdout = child.inner().stdout.take();
        let stderr = child.inner().stderr.take();
        let stdout_reader = thread::spawn(move || read_pipe(stdout));
        let stderr_reader = thread::spawn(move || read_pipe(stderr));

        // Once the group is gone the pipes close and the readers finish
        let status = self.wait(&mut child);

        let stdout = stdout_reader
            .join()
            .map_err(|_| self.failure("stdout reader panicked".to_string()))?;
        let stderr = stderr_reader
            .join()
            .map_err(|_| self.failure("stderr reader panicked".to_string()))?;

        let status = status?;
        if !status.success() {
            let last = final_line(&stderr).unwrap_or("<no stderr>");
            return Err(self.failure(format!("{status}: {last}")));
        }

        let line = final_line(&stdout).ok_or_else(|| HarnessError::ParseFailure {
            reason: "no output".to_string(),
            line: String::new(),
        })?;
        decode_line(line, self.schema.as_ref())
    }
}

fn read_pipe<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // A read error leaves whatever arrived before it
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Last non-empty line, trimmed
fn final_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_line_skips_trailing_blanks() {
        assert_eq!(final_line("a\nb\n\n  \n"), Some("b"));
        assert_eq!(final_line("  {\"x\": 1}  \r\n"), Some("{\"x\": 1}"));
        assert_eq!(final_line("\n\n"), None);
        assert_eq!(final_line(""), None);
    }

    #[test]
    fn test_from_command_line() {
        let runner = ProcessRunner::from_command_line("cargo run --release --").unwrap();
        assert_eq!(runner.program(), "cargo");
        assert_eq!(runner.prefix_args(), ["run", "--release", "--"]);

        let runner = ProcessRunner::from_command_line("./sim").unwrap();
        assert!(runner.prefix_args().is_empty());

        assert!(ProcessRunner::from_command_line("   ").is_err());
    }
}
