use serde_json::{Map, Number, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_TOOL_VERSION: &str = "N/A";

/// Numbers are kept as the scanner wrote them so they render unchanged
/// (`3` stays `3`, `2.0` stays `2.0`).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub failed: Number,
    pub passed: Number,
    pub skipped: Number,
    pub resource_count: Number,
    pub checkov_version: String,
    /// Seconds.
    pub scanning_time: Number,
}

impl Default for ScanSummary {
    fn default() -> Self {
        Self {
            failed: Number::from(0u64),
            passed: Number::from(0u64),
            skipped: Number::from(0u64),
            resource_count: Number::from(0u64),
            checkov_version: DEFAULT_TOOL_VERSION.to_string(),
            scanning_time: Number::from_f64(0.0).unwrap_or_else(|| Number::from(0u64)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedCheck {
    pub check_id: String,
    pub check_name: String,
    pub file_path: String,
    pub resource: String,
    pub file_line_range: Vec<u64>,
}

impl FailedCheck {
    /// First line of the violation, if the scanner reported a range.
    pub fn violation_line(&self) -> Option<u64> {
        self.file_line_range.first().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub summary: ScanSummary,
    pub failed_checks: Vec<FailedCheck>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("JSON report not found at {}. Cannot generate HTML.", .0.display())]
    NotFound(PathBuf),
    #[error("Path {} is a directory. Cannot read as a file.", .0.display())]
    IsDirectory(PathBuf),
    #[error("Invalid JSON format in {}.", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write HTML file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanReport {
    /// Builds a report from any JSON document the scanner may emit.
    ///
    /// Scanners that cover several frameworks write a list of result objects;
    /// the first one carrying a `summary` is used. Documents that are neither
    /// objects nor lists yield an empty report.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let root = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .find(|item| item.contains_key("summary"))
                .unwrap_or(&empty),
            Value::Object(object) => object,
            _ => &empty,
        };

        let summary = root
            .get("summary")
            .and_then(Value::as_object)
            .map(summary_from_object)
            .unwrap_or_default();

        let failed_checks = root
            .get("results")
            .and_then(|results| results.get("failed_checks"))
            .and_then(Value::as_array)
            .map(|checks| {
                checks
                    .iter()
                    .filter_map(Value::as_object)
                    .map(failed_check_from_object)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            summary,
            failed_checks,
        }
    }

    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(source)?;
        Ok(Self::from_value(&value))
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_checks.is_empty()
    }
}

pub fn load_scan_report(path: &Path) -> Result<ScanReport, ReportError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => return Err(ReportError::IsDirectory(path.to_path_buf())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ReportError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ReportError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    let content = fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    ScanReport::from_json_str(&content).map_err(|source| ReportError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

fn summary_from_object(object: &Map<String, Value>) -> ScanSummary {
    let defaults = ScanSummary::default();
    ScanSummary {
        failed: number_field(object, "failed").unwrap_or(defaults.failed),
        passed: number_field(object, "passed").unwrap_or(defaults.passed),
        skipped: number_field(object, "skipped").unwrap_or(defaults.skipped),
        resource_count: number_field(object, "resource_count").unwrap_or(defaults.resource_count),
        checkov_version: match object.get("checkov_version") {
            Some(Value::Null) | None => defaults.checkov_version,
            Some(value) => value_to_string(value),
        },
        scanning_time: number_field(object, "scanning_time").unwrap_or(defaults.scanning_time),
    }
}

fn failed_check_from_object(object: &Map<String, Value>) -> FailedCheck {
    FailedCheck {
        check_id: text_field(object, "check_id"),
        check_name: text_field(object, "check_name"),
        file_path: text_field(object, "file_path"),
        resource: text_field(object, "resource"),
        file_line_range: object
            .get("file_line_range")
            .and_then(Value::as_array)
            .map(|range| range.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default(),
    }
}

fn number_field(object: &Map<String, Value>, key: &str) -> Option<Number> {
    match object.get(key) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    object.get(key).map(value_to_string).unwrap_or_default()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
