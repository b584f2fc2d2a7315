use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn render(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_report-renderer"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run report-renderer")
}

const FAILING_REPORT: &str = r#"[
  { "check_type": "secrets", "results": { "failed_checks": [] } },
  {
    "check_type": "terraform",
    "summary": { "passed": 10, "failed": 1, "skipped": 0, "resource_count": 4, "checkov_version": "3.2.0" },
    "results": {
      "failed_checks": [
        {
          "check_id": "CKV_AWS_79",
          "check_name": "Ensure Instance Metadata Service Version 1 is not enabled",
          "file_path": "/modules/ec2/main.tf",
          "resource": "aws_instance.web",
          "file_line_range": [7, 31]
        }
      ]
    }
  }
]"#;

#[test]
fn renders_list_report_and_prints_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("scan.json"), FAILING_REPORT).expect("write fixture");

    let out = render(dir.path(), &["scan.json", "site/report.html", "--table"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Successfully generated HTML report at site/report.html"));
    assert!(stdout.contains("CKV_AWS_79"));

    let html = fs::read_to_string(dir.path().join("site/report.html")).expect("html written");
    assert!(html.contains("Failed Checks Details (1)"));
    assert!(html.contains("<td>/modules/ec2/main.tf</td>"));
    assert!(html.contains("<td>7</td>"));
}

#[test]
fn falls_back_to_default_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("reports")).expect("reports dir");
    fs::write(
        dir.path().join("reports/checkov_report.json"),
        r#"{"summary":{"passed":2},"results":{"failed_checks":[]}}"#,
    )
    .expect("write fixture");

    let out = render(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Using default paths"));
    let html =
        fs::read_to_string(dir.path().join("reports/checkov_report.html")).expect("html written");
    assert!(html.contains("No checks failed! Infrastructure is secure."));
}

#[test]
fn missing_report_logs_and_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = render(dir.path(), &["absent.json", "out.html"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stderr).contains("JSON report not found at absent.json"));
    assert!(!dir.path().join("out.html").exists());
}

#[test]
fn strict_mode_fails_on_invalid_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("scan.json"), "{ not json").expect("write fixture");
    let out = render(dir.path(), &["scan.json", "out.html", "--strict"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Invalid JSON format in scan.json"));
    assert!(!dir.path().join("out.html").exists());
}

#[test]
fn directory_input_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("scan.json")).expect("dir fixture");
    let out = render(dir.path(), &["scan.json", "out.html"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stderr).contains("is a directory"));
    assert!(!dir.path().join("out.html").exists());
}
