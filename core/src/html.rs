use crate::report::{load_scan_report, FailedCheck, ReportError, ScanReport};
use comfy_table::{presets::ASCII_FULL, Table};
use std::fs;
use std::path::Path;

pub const REPORT_TITLE: &str = "Checkov Security Scan Report";
pub const SUCCESS_MARKER: &str = "No checks failed! Infrastructure is secure.";

const FAILED_CHECK_COLUMNS: [&str; 5] = [
    "Check ID",
    "Name",
    "File Path",
    "Resource",
    "Violation Line",
];

const STYLESHEET: &str = "body{font-family:sans-serif;margin:20px;background-color:#f4f7f9;color:#333;}\
    .container{max-width:1200px;margin:auto;background:#fff;padding:20px;border-radius:8px;box-shadow:0 4px 6px rgba(0,0,0,0.1);}\
    h1{color:#004d99;border-bottom:2px solid #eee;padding-bottom:10px;}\
    h2{color:#d9534f;margin-top:20px;}\
    table{width:100%;border-collapse:collapse;margin-top:15px;}\
    th,td{padding:12px;text-align:left;border-bottom:1px solid #ddd;}\
    th{background-color:#004d99;color:white;}\
    tr:hover{background-color:#f5f5f5;}\
    .success{background-color:#5cb85c;color:white;padding:5px;border-radius:4px;}\
    .failure{background-color:#d9534f;color:white;padding:5px;border-radius:4px;}\
    .summary p{margin:5px 0;}\
    .code-block{background-color:#eee;padding:10px;border-radius:4px;overflow-x:auto;font-family:monospace;}\
    .soft-fail{background-color:#f0ad4e;color:white;padding:5px;border-radius:4px;}\
    .failed-checks-section h2{color:#d9534f;}";

/// Reads the scan report at `json_path` and writes the rendered page to
/// `html_path`. Nothing is written when the report cannot be loaded.
pub fn generate_html_report(json_path: &Path, html_path: &Path) -> Result<ScanReport, ReportError> {
    let report = load_scan_report(json_path)?;
    let html = render_html_report(&report);

    if let Some(parent) = html_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ReportError::Write {
                path: html_path.to_path_buf(),
                source,
            })?;
        }
    }
    fs::write(html_path, html).map_err(|source| ReportError::Write {
        path: html_path.to_path_buf(),
        source,
    })?;

    Ok(report)
}

pub fn render_html_report(report: &ScanReport) -> String {
    let summary = &report.summary;
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\" />\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n",
    );
    html.push_str(&format!("<title>{REPORT_TITLE}</title>\n"));
    html.push_str("<style>");
    html.push_str(STYLESHEET);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");
    html.push_str(&format!("<h1>{REPORT_TITLE}</h1>\n"));

    html.push_str("<div class=\"summary\">\n<h2>Scan Summary</h2>\n");
    push_summary_line(&mut html, "Resource Scanned", &summary.resource_count.to_string());
    push_summary_line(&mut html, "Checkov Version", &escape_html(&summary.checkov_version));
    push_summary_line(
        &mut html,
        "Scanning Time",
        &format!("{} seconds", summary.scanning_time),
    );
    push_summary_line(
        &mut html,
        "Failed Checks",
        &format!("<span class=\"failure\">{}</span>", summary.failed),
    );
    push_summary_line(
        &mut html,
        "Passed Checks",
        &format!("<span class=\"success\">{}</span>", summary.passed),
    );
    push_summary_line(&mut html, "Skipped Checks", &summary.skipped.to_string());
    html.push_str("</div>\n");

    html.push_str("<div class=\"failed-checks-section\">\n");
    html.push_str(&format!(
        "<h2>Failed Checks Details ({})</h2>\n",
        report.failed_checks.len()
    ));
    html.push_str(&render_failed_checks_html(&report.failed_checks));
    if report.failed_checks.is_empty() {
        html.push_str(&format!("<p class=\"success\">{SUCCESS_MARKER}</p>\n"));
    }
    html.push_str("</div>\n");

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn push_summary_line(html: &mut String, label: &str, value: &str) {
    html.push_str(&format!("<p><strong>{label}:</strong> {value}</p>\n"));
}

fn render_failed_checks_html(checks: &[FailedCheck]) -> String {
    let mut html = String::new();
    html.push_str("<table>\n<thead><tr>");
    for column in FAILED_CHECK_COLUMNS {
        html.push_str(&format!("<th>{column}</th>"));
    }
    html.push_str("</tr></thead>\n<tbody>");
    for check in checks {
        html.push_str("\n<tr>");
        for cell in failed_check_cells(check) {
            html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

/// ASCII rendering of the failed checks for terminal output.
pub fn render_failed_checks_table(report: &ScanReport) -> String {
    let mut display = Table::new();
    display.load_preset(ASCII_FULL);
    display.set_header(FAILED_CHECK_COLUMNS.to_vec());

    for check in &report.failed_checks {
        display.add_row(failed_check_cells(check));
    }

    display.to_string()
}

fn failed_check_cells(check: &FailedCheck) -> Vec<String> {
    vec![
        check.check_id.clone(),
        check.check_name.clone(),
        check.file_path.clone(),
        check.resource.clone(),
        check
            .violation_line()
            .map(|line| line.to_string())
            .unwrap_or_default(),
    ]
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ScanSummary;

    fn sample_report() -> ScanReport {
        ScanReport {
            summary: ScanSummary {
                failed: 1.into(),
                passed: 12.into(),
                skipped: 2.into(),
                resource_count: 9.into(),
                checkov_version: "3.2.1".to_string(),
                scanning_time: serde_json::Number::from_f64(4.25).expect("finite"),
            },
            failed_checks: vec![FailedCheck {
                check_id: "CKV_AWS_18".to_string(),
                check_name: "Ensure the S3 bucket has access logging enabled".to_string(),
                file_path: "/main.tf".to_string(),
                resource: "aws_s3_bucket.<logs>".to_string(),
                file_line_range: vec![14, 22],
            }],
        }
    }

    #[test]
    fn renders_summary_and_failed_rows() {
        let html = render_html_report(&sample_report());
        assert!(html.contains("<title>Checkov Security Scan Report</title>"));
        assert!(html.contains("<strong>Resource Scanned:</strong> 9"));
        assert!(html.contains("<strong>Checkov Version:</strong> 3.2.1"));
        assert!(html.contains("4.25 seconds"));
        assert!(html.contains("<span class=\"failure\">1</span>"));
        assert!(html.contains("<span class=\"success\">12</span>"));
        assert!(html.contains("Failed Checks Details (1)"));
        assert!(html.contains("<td>CKV_AWS_18</td>"));
        assert!(html.contains("<td>14</td>"));
        assert!(!html.contains(SUCCESS_MARKER));
    }

    #[test]
    fn escapes_interpolated_values() {
        let html = render_html_report(&sample_report());
        assert!(html.contains("<td>aws_s3_bucket.&lt;logs&gt;</td>"));
        assert!(!html.contains("aws_s3_bucket.<logs>"));
    }

    #[test]
    fn zero_failures_render_success_marker_and_empty_table() {
        let html = render_html_report(&ScanReport::default());
        assert!(html.contains(SUCCESS_MARKER));
        assert!(html.contains("Failed Checks Details (0)"));
        assert!(html.contains("<tbody></tbody>"));
        assert!(html.contains("0.0 seconds"));
        assert!(html.contains("<strong>Checkov Version:</strong> N/A"));
    }

    #[test]
    fn generate_writes_html_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("checkov_report.json");
        let html_path = dir.path().join("out").join("checkov_report.html");
        fs::write(
            &json_path,
            r#"{"summary":{"failed":0,"passed":3},"results":{"failed_checks":[]}}"#,
        )
        .expect("write fixture");

        let report = generate_html_report(&json_path, &html_path).expect("render succeeds");
        assert_eq!(report.summary.passed.to_string(), "3");
        let contents = fs::read_to_string(&html_path).expect("html written");
        assert!(contents.contains(SUCCESS_MARKER));
    }

    #[test]
    fn generate_leaves_no_output_for_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let html_path = dir.path().join("checkov_report.html");
        let result = generate_html_report(&dir.path().join("missing.json"), &html_path);
        assert!(matches!(result, Err(ReportError::NotFound(_))));
        assert!(!html_path.exists());
    }

    #[test]
    fn integer_scanning_time_renders_as_given() {
        let report = ScanReport::from_json_str(r#"{"summary":{"scanning_time":3}}"#)
            .expect("valid json");
        let html = render_html_report(&report);
        assert!(html.contains("3 seconds"));
        assert!(!html.contains("3.0 seconds"));
    }

    #[test]
    fn write_failure_message_has_no_error_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("scan.json");
        fs::write(&json_path, "{}").expect("write fixture");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").expect("write blocker");

        let html_path = blocker.join("report.html");
        let err = generate_html_report(&json_path, &html_path).expect_err("parent is a file");
        assert!(matches!(err, ReportError::Write { .. }));
        let message = format!("Error: {err}");
        assert!(message.starts_with("Error: failed to write HTML file"));
        assert!(!message.contains("Error: Error"));
        assert!(!html_path.exists());
    }

    #[test]
    fn console_table_lists_checks() {
        let table = render_failed_checks_table(&sample_report());
        assert!(table.contains("Check ID"));
        assert!(table.contains("CKV_AWS_18"));
    }
}
