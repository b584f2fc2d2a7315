use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// stdout and stderr are collected and returned.
    Captured,
    /// The child shares the terminal; nothing is collected.
    Streamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub mode: OutputMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            mode: OutputMode::Captured,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn streamed(mut self) -> Self {
        self.mode = OutputMode::Streamed;
        self
    }

    /// Program followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 1);
        line.push(self.program.clone());
        line.extend(self.args.iter().cloned());
        line
    }

    /// Second word of the command line, e.g. `plan` for `terraform plan`.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: String,
    pub duration_ms: u128,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Spawns real processes and blocks until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).current_dir(&invocation.working_dir);

        let started_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let timer = Instant::now();

        match invocation.mode {
            OutputMode::Captured => {
                let output = cmd.stdin(Stdio::null()).output()?;
                Ok(CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    started_at,
                    duration_ms: timer.elapsed().as_millis(),
                })
            }
            OutputMode::Streamed => {
                let status = cmd
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()?;
                Ok(CommandOutput {
                    exit_code: status.code(),
                    stdout: String::new(),
                    stderr: String::new(),
                    started_at,
                    duration_ms: timer.elapsed().as_millis(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_command_line() {
        let invocation = Invocation::new("terraform", "/srv/infra")
            .arg("plan")
            .args(["-no-color", "-detailed-exitcode"]);
        assert_eq!(
            invocation.command_line(),
            vec!["terraform", "plan", "-no-color", "-detailed-exitcode"]
        );
        assert_eq!(invocation.subcommand(), "plan");
        assert_eq!(invocation.mode, OutputMode::Captured);
        assert_eq!(invocation.streamed().mode, OutputMode::Streamed);
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invocation = Invocation::new("sh", dir.path())
            .arg("-c")
            .arg("echo planned; echo oops >&2; exit 2");
        let output = ProcessRunner.run(&invocation).expect("sh runs");
        assert_eq!(output.exit_code, Some(2));
        assert_eq!(output.stdout.trim(), "planned");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[test]
    fn process_runner_reports_missing_program() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invocation = Invocation::new("stackcheck-definitely-missing-binary", dir.path());
        assert!(ProcessRunner.run(&invocation).is_err());
    }
}
