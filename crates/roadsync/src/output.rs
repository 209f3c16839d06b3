//! Output formatting for the CLI.
//!
//! Human-readable rendering of run reports plus quiet/json gating and
//! process exit codes.

use std::fmt::Display;
use std::io::{self, Write};

use crate::error::SyncError;
use crate::ledger::RunReport;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Command succeeded
    Success = 0,
    /// Generic error occurred (including partial upload failures)
    GenericError = 1,
    /// Invalid arguments or configuration
    InvalidArgument = 2,
    /// Validation failed (malformed roadmap, missing issue type)
    ValidationFailed = 4,
    /// External dependency failed (network, remote service)
    ExternalError = 10,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Map a fatal pipeline error to an exit code.
pub fn error_to_exit_code(error: &SyncError) -> ExitCode {
    match error {
        SyncError::Configuration(_) => ExitCode::InvalidArgument,
        SyncError::Validation { .. } => ExitCode::ValidationFailed,
        SyncError::UnknownIssueType { .. } | SyncError::MissingIssueType { .. } => {
            ExitCode::ValidationFailed
        }
        SyncError::Transport(_) | SyncError::Rejected(_) => ExitCode::ExternalError,
    }
}

/// Context for controlling output verbosity
pub struct OutputContext {
    quiet: bool,
    json: bool,
}

impl OutputContext {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    /// Print essential output (always shown unless --json)
    pub fn print_data(&self, msg: impl Display) -> io::Result<()> {
        if !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print informational message (suppressed by --quiet or --json)
    pub fn print_info(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print error (always shown to stderr)
    pub fn print_error(&self, msg: impl Display) -> io::Result<()> {
        writeln_safe_stderr(&format!("Error: {}", msg))
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Safe println that handles broken pipes gracefully
fn writeln_safe(msg: &str) -> io::Result<()> {
    match writeln!(io::stdout(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            // Silently exit on broken pipe (expected when piping to head, etc.)
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

/// Safe eprintln that handles broken pipes gracefully
fn writeln_safe_stderr(msg: &str) -> io::Result<()> {
    match writeln!(io::stderr(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

/// Render a run report for human consumption.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Upload {} for project {}\n",
        if report.success { "complete" } else { "finished with failures" },
        report.project
    ));

    for (label, bucket) in [
        ("epics", &report.created.epics),
        ("tasks", &report.created.tasks),
        ("subtasks", &report.created.subtasks),
    ] {
        out.push_str(&format!("  {}: {} created\n", label, bucket.len()));
        for (summary, key) in bucket {
            out.push_str(&format!("    {} -> {}\n", key, summary));
        }
    }

    if !report.failures.is_empty() {
        out.push_str(&format!("Failures ({}):\n", report.failures.len()));
        for failure in &report.failures {
            out.push_str(&format!(
                "  - [{}] {}: {}\n",
                failure.level.label(),
                failure.summary,
                failure.reason
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HierarchyLevel;
    use crate::ledger::Ledger;
    use crate::transport::TransportError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::GenericError.code(), 1);
        assert_eq!(ExitCode::InvalidArgument.code(), 2);
        assert_eq!(ExitCode::ValidationFailed.code(), 4);
        assert_eq!(ExitCode::ExternalError.code(), 10);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            error_to_exit_code(&SyncError::Configuration("missing".to_string())),
            ExitCode::InvalidArgument
        );
        assert_eq!(
            error_to_exit_code(&SyncError::Validation {
                problems: vec!["bad".to_string()]
            }),
            ExitCode::ValidationFailed
        );
        assert_eq!(
            error_to_exit_code(&SyncError::Transport(TransportError::Connection(
                "refused".to_string()
            ))),
            ExitCode::ExternalError
        );
    }

    #[test]
    fn test_render_report_lists_outcomes() {
        let mut ledger = Ledger::new();
        ledger.record_created("Platform", "RS-1", "1", HierarchyLevel::Epic, None);
        ledger.record_failure("Wire codec", HierarchyLevel::Subtask, "parent unavailable");

        let text = render_report(&ledger.report("RS"));

        assert!(text.contains("finished with failures"));
        assert!(text.contains("RS-1 -> Platform"));
        assert!(text.contains("[subtask] Wire codec: parent unavailable"));
    }

    #[test]
    fn test_render_report_success_header() {
        let mut ledger = Ledger::new();
        ledger.record_created("Platform", "RS-1", "1", HierarchyLevel::Epic, None);

        let text = render_report(&ledger.report("RS"));
        assert!(text.starts_with("Upload complete for project RS"));
        assert!(!text.contains("Failures"));
    }
}
