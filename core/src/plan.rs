//! Change detection for `terraform plan -detailed-exitcode`.
//!
//! Terraform reports the plan outcome twice: as a sentence in the human
//! readable output and through the detailed exit code (0 no changes, 1 error,
//! 2 changes pending). The sentence is matched first; the exit code decides
//! when the wording cannot be matched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub const PLAN_EXIT_NO_CHANGES: i32 = 0;
pub const PLAN_EXIT_ERROR: i32 = 1;
pub const PLAN_EXIT_CHANGES: i32 = 2;

fn plan_line() -> &'static Regex {
    static PLAN_LINE: OnceLock<Regex> = OnceLock::new();
    PLAN_LINE.get_or_init(|| {
        Regex::new(r"Plan:\s+(\d+)\s+to\s+add,\s+(\d+)\s+to\s+change,\s+(\d+)\s+to\s+destroy")
            .expect("plan summary pattern compiles")
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub to_add: u64,
    pub to_change: u64,
    pub to_destroy: u64,
}

impl PlanSummary {
    pub fn total(&self) -> u64 {
        self.to_add
            .saturating_add(self.to_change)
            .saturating_add(self.to_destroy)
    }

    pub fn has_changes(&self) -> bool {
        self.to_add > 0 || self.to_change > 0 || self.to_destroy > 0
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.to_add, self.to_change, self.to_destroy
        )
    }
}

/// Extracts the first `Plan: X to add, Y to change, Z to destroy` sentence.
pub fn parse_plan_summary(output: &str) -> Option<PlanSummary> {
    let captures = plan_line().captures(output)?;
    let count = |index: usize| -> Option<u64> { captures.get(index)?.as_str().parse().ok() };
    Some(PlanSummary {
        to_add: count(1)?,
        to_change: count(2)?,
        to_destroy: count(3)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    PlanText,
    ExitCode,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetection {
    pub summary: Option<PlanSummary>,
    pub exit_code: Option<i32>,
    pub has_changes: bool,
    pub source: ChangeSource,
}

/// Decides whether a plan has pending changes.
///
/// A parsed sentence is authoritative. The detailed exit code only decides
/// when the sentence cannot be found.
pub fn detect_changes(stdout: &str, exit_code: Option<i32>) -> ChangeDetection {
    let summary = parse_plan_summary(stdout);
    let exit_reports_changes = exit_code == Some(PLAN_EXIT_CHANGES);

    let (has_changes, source) = match summary {
        Some(parsed) => (parsed.has_changes(), ChangeSource::PlanText),
        None if exit_reports_changes => (true, ChangeSource::ExitCode),
        None => (false, ChangeSource::Undetermined),
    };

    ChangeDetection {
        summary,
        exit_code,
        has_changes,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN_WITH_CHANGES: &str = r#"
Terraform will perform the following actions:

  # aws_vpc.main will be created
  + resource "aws_vpc" "main" {
      + cidr_block = "10.0.0.0/16"
    }

Plan: 3 to add, 1 to change, 0 to destroy.
"#;

    #[test]
    fn parses_counts_from_plan_sentence() {
        let detection = detect_changes(PLAN_WITH_CHANGES, Some(PLAN_EXIT_CHANGES));
        assert!(detection.has_changes);
        assert_eq!(detection.source, ChangeSource::PlanText);
        assert_eq!(
            detection.summary,
            Some(PlanSummary {
                to_add: 3,
                to_change: 1,
                to_destroy: 0
            })
        );
    }

    #[test]
    fn sentence_wins_even_without_detailed_exit_code() {
        let detection = detect_changes("Plan: 3 to add, 1 to change, 0 to destroy", Some(0));
        assert!(detection.has_changes);
        assert_eq!(detection.summary.map(|s| s.total()), Some(4));
    }

    #[test]
    fn exit_code_two_covers_unparseable_output() {
        let detection = detect_changes("Changes to Outputs:\n  + vpc_id = (known after apply)", Some(2));
        assert!(detection.has_changes);
        assert_eq!(detection.summary, None);
        assert_eq!(detection.source, ChangeSource::ExitCode);
    }

    #[test]
    fn all_zero_sentence_wins_over_exit_code_two() {
        let detection = detect_changes("Plan: 0 to add, 0 to change, 0 to destroy.", Some(2));
        assert!(!detection.has_changes);
        assert_eq!(detection.source, ChangeSource::PlanText);
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let detection = detect_changes(
            "Plan: 18446744073709551615 to add, 1 to change, 0 to destroy.",
            Some(2),
        );
        assert!(detection.has_changes);
        let summary = detection.summary.expect("sentence matches");
        assert_eq!(summary.total(), u64::MAX);
    }

    #[test]
    fn no_changes_output_is_up_to_date() {
        let stdout = "No changes. Your infrastructure matches the configuration.";
        let detection = detect_changes(stdout, Some(PLAN_EXIT_NO_CHANGES));
        assert!(!detection.has_changes);
        assert_eq!(detection.source, ChangeSource::Undetermined);
    }

    #[test]
    fn tolerates_extra_whitespace() {
        let summary = parse_plan_summary("Plan:  10 to   add,\t2 to change,  7 to destroy")
            .expect("sentence matches");
        assert_eq!(summary.to_string(), "10 to add, 2 to change, 7 to destroy");
    }
}
