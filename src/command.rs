use std::{borrow::Cow, fmt, thread, time::Duration};

#[cfg(any(test, feature = "test-support"))]
use std::cell::RefCell;

use crate::{
    config::RetryConfig,
    errors::{Error, Result},
};

/// Represents one external command invocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    /// Set for network-bound commands (downloads, storage reads).
    pub retryable: bool,
}

impl Command {
    pub fn new(program: &str) -> Self {
        Self {
            program: String::from(program),
            args: Vec::new(),
            retryable: false,
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(String::from(arg));
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|a| String::from(*a)));
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Returns the shell-quoted command line.
    pub fn line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(shell_escape::unix::escape(Cow::from(self.program.as_str())));
        for a in self.args.iter() {
            parts.push(shell_escape::unix::escape(Cow::from(a.as_str())));
        }
        parts.join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line())
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. A non-zero exit must surface as an error.
pub trait Runner {
    fn run(&self, cmd: &Command) -> Result<Output>;
}

/// Runs commands on the local host through a shell.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl Runner for ShellRunner {
    fn run(&self, cmd: &Command) -> Result<Output> {
        let line = cmd.line();
        log::info!("running '{}'", line);

        let command_manager::Output { stdout, stderr } =
            command_manager::run(&line).map_err(|e| Error::Command {
                command: line.clone(),
                message: e.to_string(),
                retryable: cmd.retryable,
            })?;
        if !stderr.is_empty() {
            log::debug!("'{}' stderr: {}", line, stderr.trim_end());
        }

        Ok(Output { stdout, stderr })
    }
}

/// Records every command instead of running it, answering with canned
/// stdout or failures matched by command-line prefix.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Command>>,
    responses: Vec<(String, std::result::Result<String, bool>)>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands whose line starts with "prefix" with "stdout".
    pub fn with_stdout(mut self, prefix: &str, stdout: &str) -> Self {
        self.responses
            .push((String::from(prefix), Ok(String::from(stdout))));
        self
    }

    /// Fails commands whose line starts with "prefix".
    pub fn with_failure(mut self, prefix: &str, retryable: bool) -> Self {
        self.responses.push((String::from(prefix), Err(retryable)));
        self
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Command::line).collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Runner for RecordingRunner {
    fn run(&self, cmd: &Command) -> Result<Output> {
        let line = cmd.line();
        log::info!("recording '{}'", line);
        self.calls.borrow_mut().push(cmd.clone());

        for (prefix, resp) in self.responses.iter() {
            if !line.starts_with(prefix.as_str()) {
                continue;
            }
            return match resp {
                Ok(stdout) => Ok(Output {
                    stdout: stdout.clone(),
                    stderr: String::new(),
                }),
                Err(retryable) => Err(Error::Command {
                    command: line,
                    message: "exit status: 1".to_string(),
                    retryable: *retryable,
                }),
            };
        }
        Ok(Output::default())
    }
}

/// Runs the command, retrying retryable failures with a linear backoff.
pub fn run_with_retries(runner: &dyn Runner, cmd: &Command, retry: &RetryConfig) -> Result<Output> {
    let attempts = retry.attempts.max(1);
    let mut round: u32 = 0;
    loop {
        match runner.run(cmd) {
            Ok(out) => {
                if round > 0 {
                    log::info!("[ROUND {round}] '{}' succeeded after retries", cmd);
                }
                return Ok(out);
            }
            Err(e) => {
                round += 1;
                if !e.retryable() || round >= attempts {
                    return Err(e);
                }

                let wait = Duration::from_secs(retry.interval_secs * u64::from(round));
                log::warn!(
                    "[ROUND {round}] retriable command error '{}'; retrying in {:?}",
                    e,
                    wait
                );
                thread::sleep(wait);
            }
        }
    }
}
