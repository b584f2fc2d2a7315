use clap::Parser;
use stackcheck_core::{generate_html_report, render_failed_checks_table};
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_JSON_PATH: &str = "reports/checkov_report.json";
const DEFAULT_HTML_PATH: &str = "reports/checkov_report.html";

#[derive(Debug, Parser)]
#[command(author, version, about = "Render a Checkov JSON scan report as an HTML page")]
struct RendererCli {
    /// Scan report produced by `checkov -o json`
    json_path: Option<PathBuf>,
    /// Destination of the rendered HTML page
    html_path: Option<PathBuf>,
    /// Also print the failed checks as a table on stdout
    #[arg(long)]
    table: bool,
    /// Exit with status 1 when the page could not be generated
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    let cli = RendererCli::parse();

    let uses_defaults = cli.json_path.is_none() || cli.html_path.is_none();
    let json_path = cli
        .json_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_JSON_PATH));
    let html_path = cli
        .html_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HTML_PATH));
    if uses_defaults {
        println!(
            "Using default paths: {} -> {}",
            json_path.display(),
            html_path.display()
        );
    }

    match generate_html_report(&json_path, &html_path) {
        Ok(report) => {
            println!(
                "Successfully generated HTML report at {}",
                html_path.display()
            );
            if cli.table && report.has_failures() {
                println!("\n[table] failed checks");
                println!("{}", render_failed_checks_table(&report));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            if cli.strict {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
