pub mod execution;
pub mod html;
pub mod plan;
pub mod report;
pub mod runner;
pub mod sequencer;

pub use execution::{
    ArtifactWriter, ExecutionReport, ExecutionStatus, InvocationArtifact, StepExecution, StepKind,
};
pub use html::{generate_html_report, render_failed_checks_table, render_html_report};
pub use plan::{detect_changes, parse_plan_summary, ChangeDetection, ChangeSource, PlanSummary};
pub use report::{load_scan_report, FailedCheck, ReportError, ScanReport, ScanSummary};
pub use runner::{CommandOutput, CommandRunner, Invocation, OutputMode, ProcessRunner};
pub use sequencer::{
    absolute_working_dir, default_outputs, resolve_outputs, OutputBinding, ResolvedOutput,
    SequenceError, Sequencer, SequencerConfig, WorkflowOutcome, DEFAULT_TERRAFORM_BIN,
    TERRAFORM_BIN_ENV,
};
