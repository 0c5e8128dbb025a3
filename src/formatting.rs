use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use dexport_lib::{AuthOutcome, ErrorCategory, ExportError, ExportReport};

use crate::cli::ReportFormat;

/// Print the final report on stdout.
pub fn write_report(report: &ExportReport, format: ReportFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string(report)?),
        ReportFormat::Text => println!("{}", format_report(report, io::stdout().is_terminal())),
    }
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: &ExportError, format: ReportFormat) -> ExitCode {
    let payload = err.to_payload();
    match format {
        ReportFormat::Json => {
            let content = serde_json::to_string(&serde_json::json!({ "error": payload }))
                .unwrap_or_else(|_| "{\"error\":{}}".into());
            println!("{content}");
        }
        ReportFormat::Text => {
            let colorize = io::stderr().is_terminal();
            eprintln!("{} {}", color("error:", "31", colorize), payload.message);
            if let Some(remediation) = &payload.remediation {
                eprintln!("{} {remediation}", color("hint:", "33", colorize));
            }
        }
    }
    ExitCode::from(exit_status(err))
}

/// Exit 1 when the job ran but wrote fewer files than expected; 2 for any
/// other failure.
pub fn exit_status(err: &ExportError) -> u8 {
    match err.to_payload().category {
        ErrorCategory::Incomplete => 1,
        _ => 2,
    }
}

pub fn format_report(report: &ExportReport, colorize: bool) -> String {
    let mut buf = String::new();
    let status = color("DONE", "32", colorize);
    writeln!(
        buf,
        "{status} Exported {} of {} files from {} views ({})",
        report.actual, report.expected, report.views, report.format
    )
    .ok();
    writeln!(buf, "Viewer: {}", report.viewer_url).ok();
    writeln!(buf, "Output: {}", report.output_dir.display()).ok();
    match &report.auth {
        AuthOutcome::Skipped => {}
        AuthOutcome::SignedIn => {
            writeln!(buf, "Sign-in: ok").ok();
        }
        AuthOutcome::Unconfirmed => {
            writeln!(buf, "Sign-in: {}", color("unconfirmed", "33", colorize)).ok();
        }
        AuthOutcome::FieldsNotFound { location } => {
            writeln!(
                buf,
                "Sign-in: {} at {location}",
                color("form not found", "33", colorize)
            )
            .ok();
        }
    }
    if let Some(manifest) = &report.manifest {
        writeln!(buf, "Manifest: {}", manifest.display()).ok();
    }
    write!(buf, "Elapsed: {:.1}s", report.elapsed_ms as f64 / 1000.0).ok();
    buf
}

fn color(text: &str, code: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}
