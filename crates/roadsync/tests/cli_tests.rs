//! CLI surface tests: argument parsing, configuration failures, exit codes.
//!
//! These run the real binary but never reach the network — every scenario
//! fails (or completes) before a request would be sent.

use assert_cmd::Command;
use predicates::prelude::*;

fn roadsync() -> Command {
    let mut cmd = Command::cargo_bin("roadsync").unwrap();
    // Isolate from the developer's environment.
    for var in [
        "JIRA_URL",
        "JIRA_INSTANCE",
        "JIRA_USER",
        "EMAIL",
        "JIRA_TOKEN",
        "API_TOKEN",
        "PROJECT_KEY",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_lists_subcommands() {
    roadsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("meta"))
        .stdout(predicate::str::contains("upload"));
}

#[test]
fn missing_configuration_fails_with_invalid_argument_code() {
    roadsync()
        .arg("check")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("configuration error"))
        .stderr(predicate::str::contains("JIRA_URL"));
}

#[test]
fn url_without_scheme_is_rejected() {
    roadsync()
        .env("JIRA_URL", "example.atlassian.net")
        .env("JIRA_USER", "dev@example.com")
        .env("JIRA_TOKEN", "token")
        .arg("check")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("http://"));
}

#[test]
fn upload_with_missing_roadmap_file_fails() {
    roadsync()
        .env("JIRA_URL", "https://example.atlassian.net")
        .env("JIRA_USER", "dev@example.com")
        .env("JIRA_TOKEN", "token")
        .args(["upload", "/nonexistent/roadmap.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/roadmap.yaml"));
}

#[test]
fn upload_without_project_key_reports_configuration_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("roadmap.yaml");
    std::fs::write(&path, "tasks:\n  - summary: Build ingest\n").unwrap();

    roadsync()
        .env("JIRA_URL", "https://example.atlassian.net")
        .env("JIRA_USER", "dev@example.com")
        .env("JIRA_TOKEN", "token")
        .args(["upload", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("project key required"));
}

#[test]
fn config_file_supplies_connection_settings() {
    let temp = tempfile::TempDir::new().unwrap();
    let config_path = temp.path().join("roadsync.toml");
    // Deliberately incomplete: the missing token must be reported.
    std::fs::write(
        &config_path,
        "[jira]\nbase_url = \"https://example.atlassian.net\"\nemail = \"dev@example.com\"\n",
    )
    .unwrap();

    roadsync()
        .args(["--config", config_path.to_str().unwrap(), "check"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("JIRA_TOKEN/API_TOKEN"));
}
