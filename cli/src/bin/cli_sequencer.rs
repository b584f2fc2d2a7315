use anyhow::Context;
use clap::{ArgAction, Parser};
use stackcheck_core::{
    absolute_working_dir, OutputBinding, ProcessRunner, SequenceError, Sequencer,
    SequencerConfig, WorkflowOutcome, DEFAULT_TERRAFORM_BIN, TERRAFORM_BIN_ENV,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run terraform init, plan and apply (only when the plan has changes)"
)]
struct SequencerCli {
    /// Directory containing the Terraform configuration
    terraform_dir: PathBuf,
    /// Run init and plan only, then exit with the plan's detailed exit code (0/1/2)
    #[arg(long)]
    plan_only: bool,
    /// Terraform executable to invoke
    #[arg(long, env = TERRAFORM_BIN_ENV, default_value = DEFAULT_TERRAFORM_BIN)]
    terraform_bin: String,
    /// Extra arguments appended to `terraform plan` (shell quoting applies)
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    plan_args: Option<String>,
    /// Extra arguments appended to `terraform apply` (shell quoting applies)
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    apply_args: Option<String>,
    /// Output to print after apply (format: name=Label). Repeat for multiple outputs.
    #[arg(long = "output", value_name = "NAME=LABEL", action = ArgAction::Append)]
    outputs: Vec<OutputBinding>,
    /// Record every terraform invocation as a JSON artifact in this directory
    #[arg(long, value_name = "DIR")]
    artifacts_dir: Option<PathBuf>,
    /// Print the per-step execution summary before exiting
    #[arg(long)]
    summary: bool,
}

fn main() -> ExitCode {
    let cli = SequencerCli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("\n[CRITICAL ERROR] An unexpected error occurred: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: SequencerCli) -> anyhow::Result<ExitCode> {
    let working_dir = absolute_working_dir(&cli.terraform_dir).with_context(|| {
        format!(
            "failed to resolve terraform directory {}",
            cli.terraform_dir.display()
        )
    })?;

    let mut config = SequencerConfig::new(working_dir);
    config.terraform_bin = cli.terraform_bin;
    if let Some(raw) = &cli.plan_args {
        config = config.with_plan_args(raw)?;
    }
    if let Some(raw) = &cli.apply_args {
        config = config.with_apply_args(raw)?;
    }
    if !cli.outputs.is_empty() {
        config.outputs = cli.outputs;
    }
    config.artifacts_dir = cli.artifacts_dir;

    let mut sequencer = Sequencer::new(config, ProcessRunner);
    let result = if cli.plan_only {
        plan_only(&mut sequencer)
    } else {
        workflow(&mut sequencer)
    };

    if cli.summary {
        println!("\n{}", sequencer.report());
    }
    if let Some(path) = sequencer.write_summary_artifact() {
        println!("Execution summary written to {}", path.display());
    }

    result
}

fn workflow(sequencer: &mut Sequencer<ProcessRunner>) -> anyhow::Result<ExitCode> {
    match sequencer.run_workflow() {
        Ok(WorkflowOutcome::UpToDate { .. }) => {
            println!("--- Terraform Workflow Completed Successfully (No Changes Needed) ---");
            Ok(ExitCode::SUCCESS)
        }
        Ok(WorkflowOutcome::Applied { .. }) => {
            println!("\n--- Terraform Workflow Completed Successfully ---");
            Ok(ExitCode::SUCCESS)
        }
        Err(
            err @ (SequenceError::InitFailed { .. }
            | SequenceError::PlanFailed { .. }
            | SequenceError::ApplyFailed { .. }),
        ) => {
            println!("\n!!! ERROR: {err} !!!");
            if let Some(stderr) = err.stderr().filter(|s| !s.is_empty()) {
                println!("{stderr}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn plan_only(sequencer: &mut Sequencer<ProcessRunner>) -> anyhow::Result<ExitCode> {
    match sequencer.run_plan_only() {
        Ok(code) => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
        Err(SequenceError::InitFailed { stdout, stderr, .. }) => {
            println!("\n!!! ERROR: Terraform Init Failed !!!");
            println!("{stdout}");
            println!("{stderr}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}
