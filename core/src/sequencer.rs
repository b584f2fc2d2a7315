use crate::execution::{
    ArtifactWriter, ExecutionReport, InvocationArtifact, StepExecution, StepKind,
};
use crate::plan::{
    detect_changes, ChangeDetection, ChangeSource, PLAN_EXIT_CHANGES, PLAN_EXIT_ERROR,
    PLAN_EXIT_NO_CHANGES,
};
use crate::runner::{CommandOutput, CommandRunner, Invocation};
use serde_json::{json, Value};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";
pub const TERRAFORM_BIN_ENV: &str = "STACKCHECK_TERRAFORM_BIN";

const AUTOMATION_FLAGS: [&str; 2] = ["-no-color", "-input=false"];

/// A Terraform output printed after a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    pub name: String,
    pub label: String,
}

impl OutputBinding {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

impl FromStr for OutputBinding {
    type Err = String;

    /// Accepts `name=Label` or a bare `name` (labelled by its own name).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, label) = match s.split_once('=') {
            Some((name, label)) => (name.trim(), label.trim()),
            None => (s.trim(), s.trim()),
        };
        if name.is_empty() {
            return Err(format!("expected NAME or NAME=LABEL, got '{s}'"));
        }
        let label = if label.is_empty() { name } else { label };
        Ok(Self::new(name, label))
    }
}

pub fn default_outputs() -> Vec<OutputBinding> {
    vec![
        OutputBinding::new("vpc_id", "VPC ID"),
        OutputBinding::new("public_subnet_ids", "Public Subnet IDs"),
    ]
}

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub working_dir: PathBuf,
    pub terraform_bin: String,
    pub plan_args: Vec<String>,
    pub apply_args: Vec<String>,
    pub outputs: Vec<OutputBinding>,
    pub artifacts_dir: Option<PathBuf>,
}

impl SequencerConfig {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            terraform_bin: DEFAULT_TERRAFORM_BIN.to_string(),
            plan_args: Vec::new(),
            apply_args: Vec::new(),
            outputs: default_outputs(),
            artifacts_dir: None,
        }
    }

    /// Splits `raw` with shell quoting rules and appends it to the plan arguments.
    pub fn with_plan_args(mut self, raw: &str) -> Result<Self, SequenceError> {
        let parts = shell_words::split(raw).map_err(|source| SequenceError::InvalidArgs {
            step: StepKind::Plan,
            source,
        })?;
        self.plan_args.extend(parts);
        Ok(self)
    }

    pub fn with_apply_args(mut self, raw: &str) -> Result<Self, SequenceError> {
        let parts = shell_words::split(raw).map_err(|source| SequenceError::InvalidArgs {
            step: StepKind::Apply,
            source,
        })?;
        self.apply_args.extend(parts);
        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("invalid extra arguments for terraform {}: {source}", .step.as_str())]
    InvalidArgs {
        step: StepKind,
        #[source]
        source: shell_words::ParseError,
    },
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Terraform Init Failed (exit code {})", describe_exit(.exit_code))]
    InitFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("Terraform Plan Failed (exit code {})", describe_exit(.exit_code))]
    PlanFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Terraform Apply Failed (exit code {})", describe_exit(.exit_code))]
    ApplyFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to parse terraform output JSON: {0}")]
    OutputJson(#[source] serde_json::Error),
}

impl SequenceError {
    /// Captured stderr of the failing tool invocation, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            SequenceError::InitFailed { stderr, .. }
            | SequenceError::PlanFailed { stderr, .. }
            | SequenceError::ApplyFailed { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutput {
    pub name: String,
    pub label: String,
    pub value: Option<Value>,
}

impl ResolvedOutput {
    pub fn display_value(&self) -> String {
        match &self.value {
            None | Some(Value::Null) => "N/A".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl fmt::Display for ResolvedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.display_value())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// The plan found nothing to apply.
    UpToDate { detection: ChangeDetection },
    Applied {
        detection: ChangeDetection,
        /// Empty when Terraform reported no outputs.
        outputs: Vec<ResolvedOutput>,
    },
}

pub struct Sequencer<R> {
    config: SequencerConfig,
    runner: R,
    artifacts: Option<ArtifactWriter>,
    report: ExecutionReport,
}

impl<R: CommandRunner> Sequencer<R> {
    pub fn new(config: SequencerConfig, runner: R) -> Self {
        let artifacts = config.artifacts_dir.clone().map(ArtifactWriter::new);
        Self {
            config,
            runner,
            artifacts,
            report: ExecutionReport::default(),
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn report(&self) -> &ExecutionReport {
        &self.report
    }

    /// init, plan and, when the plan has changes, apply followed by output retrieval.
    pub fn run_workflow(&mut self) -> Result<WorkflowOutcome, SequenceError> {
        println!(
            "--- Starting Terraform Automation in directory: {} ---",
            self.config.working_dir.display()
        );

        println!("\n[STEP 1/4] Running: terraform init");
        self.init()?;
        println!("Initialization successful.");

        println!("\n[STEP 2/4] Running: terraform plan");
        let plan = self.plan()?;
        println!("{}", plan.stdout);
        println!(
            "\n[DEBUG] Plan returned exit code: {}",
            describe_exit(&plan.exit_code)
        );

        let plan_failed = !matches!(plan.exit_code, Some(PLAN_EXIT_NO_CHANGES | PLAN_EXIT_CHANGES))
            || plan.stderr.contains("Error:");
        if plan_failed {
            self.record(StepExecution::failed(
                StepKind::Plan,
                Some(format!("exit code {}", describe_exit(&plan.exit_code))),
            ));
            return Err(SequenceError::PlanFailed {
                exit_code: plan.exit_code,
                stderr: plan.stderr,
            });
        }

        let detection = detect_changes(&plan.stdout, plan.exit_code);
        match &detection.summary {
            Some(summary) => println!("\n[PARSE] Detected from plan output: {summary}"),
            None => println!("\n[PARSE] Could not parse plan output for change detection"),
        }
        if detection.source == ChangeSource::ExitCode {
            println!("[PARSE] Exit code is {PLAN_EXIT_CHANGES}, assuming changes exist");
        }
        self.record(StepExecution::completed(
            StepKind::Plan,
            Some(describe_detection(&detection)),
        ));

        if !detection.has_changes {
            println!("\n[INFO] Plan successful. No changes detected - infrastructure is up to date.");
            self.record(StepExecution::skipped(
                StepKind::Apply,
                Some("no changes to apply".to_string()),
            ));
            return Ok(WorkflowOutcome::UpToDate { detection });
        }

        println!("\n[INFO] Plan successful. Changes detected. Proceeding to Apply...");
        println!("\n[STEP 3/4] Running: terraform apply");
        println!("--- Streaming Output ---");
        self.apply()?;
        println!("\n--- Apply Complete ---");

        println!("\n[STEP 4/4] Retrieving outputs...");
        let outputs = self.outputs()?;
        if outputs.is_empty() {
            println!("No outputs found.");
        } else {
            println!("\n--- Deployment Outputs ---");
            for output in &outputs {
                println!("{output}");
            }
            println!("\n--------------------------");
        }

        Ok(WorkflowOutcome::Applied { detection, outputs })
    }

    /// init and plan only. Returns the plan's detailed exit code for the caller
    /// to forward; a plan killed by a signal maps to the error code.
    pub fn run_plan_only(&mut self) -> Result<i32, SequenceError> {
        println!("Running Terraform Init...");
        let init = self.init()?;
        println!("Initialization successful.");
        println!("{}", init.stdout);

        println!("Running Terraform Plan...");
        let plan = self.plan()?;
        println!("{}", plan.stdout);
        if !plan.stderr.is_empty() {
            println!("{}", plan.stderr);
        }
        println!("\n[DEBUG] Plan exit code: {}", describe_exit(&plan.exit_code));

        let exit_code = plan.exit_code.unwrap_or(PLAN_EXIT_ERROR);
        let detection = detect_changes(&plan.stdout, plan.exit_code);
        let step = if exit_code == PLAN_EXIT_NO_CHANGES || exit_code == PLAN_EXIT_CHANGES {
            StepExecution::completed(StepKind::Plan, Some(describe_detection(&detection)))
        } else {
            StepExecution::failed(StepKind::Plan, Some(format!("exit code {exit_code}")))
        };
        self.record(step);

        Ok(exit_code)
    }

    /// Persists the execution report next to the invocation artifacts.
    pub fn write_summary_artifact(&self) -> Option<PathBuf> {
        let writer = self.artifacts.as_ref()?;
        let data = json!({
            "working_dir": self.config.working_dir.to_string_lossy(),
            "terraform_bin": self.config.terraform_bin,
            "execution": self.report,
            "has_failures": self.report.has_failures(),
        });
        writer.write("execution_summary", &data)
    }

    fn init(&mut self) -> Result<CommandOutput, SequenceError> {
        let invocation = self
            .terraform("init")
            .args(AUTOMATION_FLAGS)
            .arg("-reconfigure");
        let output = self.execute(StepKind::Init, &invocation)?;
        if !output.success() {
            self.record(StepExecution::failed(
                StepKind::Init,
                Some(format!("exit code {}", describe_exit(&output.exit_code))),
            ));
            return Err(SequenceError::InitFailed {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        self.record(StepExecution::completed(
            StepKind::Init,
            Some("initialization successful".to_string()),
        ));
        Ok(output)
    }

    fn plan(&mut self) -> Result<CommandOutput, SequenceError> {
        let invocation = self
            .terraform("plan")
            .args(AUTOMATION_FLAGS)
            .arg("-detailed-exitcode")
            .args(self.config.plan_args.clone());
        self.execute(StepKind::Plan, &invocation)
    }

    fn apply(&mut self) -> Result<(), SequenceError> {
        let invocation = self
            .terraform("apply")
            .args(AUTOMATION_FLAGS)
            .arg("-auto-approve")
            .args(self.config.apply_args.clone())
            .streamed();
        let output = self.execute(StepKind::Apply, &invocation)?;
        if !output.success() {
            self.record(StepExecution::failed(
                StepKind::Apply,
                Some(format!("exit code {}", describe_exit(&output.exit_code))),
            ));
            return Err(SequenceError::ApplyFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        self.record(StepExecution::completed(
            StepKind::Apply,
            Some("apply complete".to_string()),
        ));
        Ok(())
    }

    fn outputs(&mut self) -> Result<Vec<ResolvedOutput>, SequenceError> {
        let invocation = self.terraform("output").args(["-no-color", "-json"]);
        let output = self.execute(StepKind::Output, &invocation)?;

        if !output.success() {
            eprintln!(
                "[warn] terraform output exited with code {}: {}",
                describe_exit(&output.exit_code),
                output.stderr.trim()
            );
            self.record(StepExecution::failed(
                StepKind::Output,
                Some("outputs unavailable".to_string()),
            ));
            return Ok(Vec::new());
        }

        let resolved = match resolve_outputs(&output.stdout, &self.config.outputs) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.record(StepExecution::failed(StepKind::Output, Some(err.to_string())));
                return Err(err);
            }
        };
        self.record(StepExecution::completed(
            StepKind::Output,
            Some(format!("{} output(s) retrieved", resolved.len())),
        ));
        Ok(resolved)
    }

    fn terraform(&self, subcommand: &str) -> Invocation {
        Invocation::new(self.config.terraform_bin.clone(), &self.config.working_dir).arg(subcommand)
    }

    fn execute(
        &mut self,
        kind: StepKind,
        invocation: &Invocation,
    ) -> Result<CommandOutput, SequenceError> {
        let output = match self.runner.run(invocation) {
            Ok(output) => output,
            Err(source) => {
                self.record(StepExecution::failed(
                    kind,
                    Some(format!("failed to execute: {source}")),
                ));
                return Err(SequenceError::Spawn {
                    program: invocation.program.clone(),
                    source,
                });
            }
        };

        if let Some(writer) = &self.artifacts {
            let artifact = InvocationArtifact::new(kind, invocation, &output);
            match serde_json::to_value(&artifact) {
                Ok(data) => {
                    writer.write(&format!("terraform_{}", kind.as_str()), &data);
                }
                Err(err) => eprintln!("[warn] failed to serialize {} artifact: {err}", kind.as_str()),
            }
        }

        Ok(output)
    }

    fn record(&mut self, step: StepExecution) {
        self.report.push(step);
    }
}

/// Picks the configured outputs from `terraform output -json`.
///
/// An empty or blank document means the configuration declares no outputs.
pub fn resolve_outputs(
    raw: &str,
    bindings: &[OutputBinding],
) -> Result<Vec<ResolvedOutput>, SequenceError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Value = serde_json::from_str(raw).map_err(SequenceError::OutputJson)?;
    let declared = match document.as_object() {
        Some(map) if !map.is_empty() => map,
        _ => return Ok(Vec::new()),
    };

    Ok(bindings
        .iter()
        .map(|binding| ResolvedOutput {
            name: binding.name.clone(),
            label: binding.label.clone(),
            value: declared
                .get(&binding.name)
                .and_then(|entry| entry.get("value"))
                .cloned(),
        })
        .collect())
}

fn describe_detection(detection: &ChangeDetection) -> String {
    let verdict = if detection.has_changes {
        "changes pending"
    } else {
        "no changes"
    };
    match (&detection.summary, detection.source) {
        (Some(summary), ChangeSource::PlanText) => format!("{verdict}: {summary}"),
        (_, ChangeSource::ExitCode) => format!(
            "{verdict}: detailed exit code {}",
            describe_exit(&detection.exit_code)
        ),
        _ => verdict.to_string(),
    }
}

pub fn absolute_working_dir(dir: &Path) -> io::Result<PathBuf> {
    std::path::absolute(dir)
}
