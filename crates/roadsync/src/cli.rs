//! Command-line interface definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Roadmap-to-tracker upload tool
///
/// Creates a hierarchy of epics, tasks, and subtasks in a remote issue
/// tracker from a declarative roadmap file, bootstrapping missing project
/// prerequisites (components, versions) along the way.
///
/// Exit Codes:
///   0  - Command succeeded
///   1  - Generic error (including partial upload failures)
///   2  - Invalid arguments or configuration
///   4  - Validation failed (malformed roadmap, missing issue type)
///  10  - External dependency failed (network, remote service)
#[derive(Parser)]
#[command(name = "roadsync")]
#[command(about = "Roadmap-to-tracker upload tool", long_about = None)]
pub struct Cli {
    /// Suppress non-essential output (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a roadsync.toml config file (environment variables override it)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the connection and credentials against the remote tracker
    Check,

    /// Fetch and display project metadata (issue types, fields, components, versions)
    Meta {
        /// Project key (overrides PROJECT_KEY / config file)
        #[arg(long)]
        project: Option<String>,

        /// Also fetch work items with an optional JQL query
        #[arg(long)]
        work_items: bool,

        /// JQL query for --work-items (defaults to all project issues, newest first)
        #[arg(long, requires = "work_items")]
        jql: Option<String>,
    },

    /// Upload a roadmap file, creating epics, tasks, and subtasks
    Upload {
        /// Path to the roadmap file (.yaml, .yml, or .json)
        roadmap: PathBuf,

        /// Project key (overrides the roadmap's `project` and PROJECT_KEY)
        #[arg(long)]
        project: Option<String>,

        /// Write the run report to this path as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_parses_flags() {
        let cli = Cli::parse_from([
            "roadsync",
            "upload",
            "roadmap.yaml",
            "--project",
            "RS",
            "--report",
            "out.json",
        ]);

        match cli.command {
            Commands::Upload {
                roadmap,
                project,
                report,
            } => {
                assert_eq!(roadmap, PathBuf::from("roadmap.yaml"));
                assert_eq!(project.as_deref(), Some("RS"));
                assert_eq!(report, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected upload command"),
        }
    }

    #[test]
    fn test_jql_requires_work_items() {
        let result = Cli::try_parse_from(["roadsync", "meta", "--jql", "project = RS"]);
        assert!(result.is_err());
    }
}
