use crate::runner::{CommandOutput, Invocation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepExecution>,
}

impl ExecutionReport {
    pub fn push(&mut self, step: StepExecution) {
        self.steps.push(step);
    }

    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.status == ExecutionStatus::Failed)
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepExecution> {
        self.steps.iter().find(|step| step.kind == kind)
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            writeln!(f, "No steps were executed.")?;
            return Ok(());
        }

        writeln!(f, "Execution results:")?;
        for step in &self.steps {
            let status = match step.status {
                ExecutionStatus::Completed => "completed",
                ExecutionStatus::Skipped => "skipped",
                ExecutionStatus::Failed => "failed",
            };
            writeln!(f, "  - [{}] {} ({:?})", status, step.name, step.kind)?;
            if let Some(message) = &step.message {
                for line in message.lines() {
                    writeln!(f, "      {}", line)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub name: String,
    pub kind: StepKind,
    pub status: ExecutionStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepKind {
    Init,
    Plan,
    Apply,
    Output,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Init => "init",
            StepKind::Plan => "plan",
            StepKind::Apply => "apply",
            StepKind::Output => "output",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    Skipped,
    Failed,
}

impl StepExecution {
    pub fn completed(kind: StepKind, message: Option<String>) -> Self {
        Self::with_status(kind, ExecutionStatus::Completed, message)
    }

    pub fn failed(kind: StepKind, message: Option<String>) -> Self {
        Self::with_status(kind, ExecutionStatus::Failed, message)
    }

    pub fn skipped(kind: StepKind, message: Option<String>) -> Self {
        Self::with_status(kind, ExecutionStatus::Skipped, message)
    }

    fn with_status(kind: StepKind, status: ExecutionStatus, message: Option<String>) -> Self {
        Self {
            name: format!("terraform {}", kind.as_str()),
            kind,
            status,
            message,
        }
    }
}

/// Record of one tool invocation, persisted when an artifacts directory is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationArtifact {
    pub step: StepKind,
    pub command: Vec<String>,
    pub working_dir: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub started_at: String,
    pub duration_ms: u128,
}

impl InvocationArtifact {
    pub fn new(step: StepKind, invocation: &Invocation, output: &CommandOutput) -> Self {
        Self {
            step,
            command: invocation.command_line(),
            working_dir: invocation.working_dir.to_string_lossy().to_string(),
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            exit_code: output.exit_code,
            started_at: output.started_at.clone(),
            duration_ms: output.duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `data` as pretty JSON to `<dir>/<label>.json`. Failures are
    /// reported as warnings and never abort the workflow.
    pub fn write(&self, label: &str, data: &Value) -> Option<PathBuf> {
        match self.try_write(label, data) {
            Ok(path) => Some(path),
            Err(message) => {
                eprintln!("[warn] {message}");
                None
            }
        }
    }

    fn try_write(&self, label: &str, data: &Value) -> Result<PathBuf, String> {
        let path = self.dir.join(format!("{}.json", sanitize_label(label)));
        fs::create_dir_all(&self.dir).map_err(|err| {
            format!("failed to create artifact directory {:?}: {err}", self.dir)
        })?;
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|err| format!("failed to serialize artifact '{label}': {err}"))?;
        let mut file = fs::File::create(&path)
            .map_err(|err| format!("failed to create artifact {path:?}: {err}"))?;
        file.write_all(&bytes)
            .map_err(|err| format!("failed to write artifact {path:?}: {err}"))?;
        Ok(path)
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
