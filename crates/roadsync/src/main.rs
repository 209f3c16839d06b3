//! Roadmap-to-tracker upload tool
//!
//! Creates a hierarchy of epics, tasks, and subtasks in a remote issue
//! tracker from a declarative roadmap file.
//!
//! # Features
//!
//! - Parent-before-child creation order with epic links and subtask parents
//! - Bootstrapping of missing components and versions before upload
//! - Field-rejection recovery by stripping invalid fields and retrying once
//! - Complete run report: every node accounted for, created or failed

use anyhow::Result;
use clap::Parser;
use serde_json::{json, Value};

use roadsync::cli::{Cli, Commands};
use roadsync::config::JiraConfig;
use roadsync::error::SyncError;
use roadsync::output::{error_to_exit_code, render_report, ExitCode, OutputContext};
use roadsync::pipeline::UploadPipeline;
use roadsync::storage;
use roadsync::transport::{HttpTracker, Tracker};

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let out = OutputContext::new(cli.quiet, cli.json);

    let exit_code = match run(&cli, &out).await {
        Ok(code) => code,
        Err(e) => {
            let _ = out.print_error(&e);
            e.downcast_ref::<SyncError>()
                .map(error_to_exit_code)
                .unwrap_or(ExitCode::GenericError)
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}

async fn run(cli: &Cli, out: &OutputContext) -> Result<ExitCode> {
    let config = JiraConfig::load(cli.config.as_deref())?;
    let api = HttpTracker::new(&config);

    match &cli.command {
        Commands::Check => run_check(&api, out).await,
        Commands::Meta {
            project,
            work_items,
            jql,
        } => {
            let project = require_project(project.clone(), None, &config)?;
            run_meta(&api, &project, *work_items, jql.clone(), out).await
        }
        Commands::Upload {
            roadmap,
            project,
            report,
        } => {
            let roadmap = storage::load_roadmap(roadmap)?;
            let project = require_project(project.clone(), roadmap.project.clone(), &config)?;
            run_upload(&api, &roadmap, &project, report.as_deref(), out).await
        }
    }
}

/// Resolve the project key: CLI flag, then roadmap document, then config.
fn require_project(
    flag: Option<String>,
    document: Option<String>,
    config: &JiraConfig,
) -> Result<String, SyncError> {
    flag.or(document)
        .or_else(|| config.project_key.clone())
        .ok_or_else(|| {
            SyncError::Configuration(
                "project key required: set PROJECT_KEY, the roadmap's 'project' key, or --project"
                    .to_string(),
            )
        })
}

async fn run_check(api: &impl Tracker, out: &OutputContext) -> Result<ExitCode> {
    let response = api.get("myself").await.map_err(SyncError::from)?;
    if !response.is_success() {
        return Err(SyncError::Configuration(format!(
            "connection check failed: {}",
            response.rejection("myself")
        ))
        .into());
    }

    if out.is_json() {
        println!("{}", serde_json::to_string_pretty(&response.body)?);
    } else {
        let name = response
            .body
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let email = response
            .body
            .get("emailAddress")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        out.print_data(format!("Connection OK: {} <{}>", name, email))?;
    }
    Ok(ExitCode::Success)
}

async fn run_meta(
    api: &impl Tracker,
    project: &str,
    work_items: bool,
    jql: Option<String>,
    out: &OutputContext,
) -> Result<ExitCode> {
    let issue_types = fetch(api, "issuetype").await?;
    let fields = fetch(api, "field").await?;
    let components = fetch(api, &format!("project/{}/components", project)).await?;
    let versions = fetch(api, &format!("project/{}/versions", project)).await?;

    let mut meta = json!({
        "issue_types": issue_types,
        "fields": fields,
        "components": components,
        "versions": versions,
    });

    if work_items {
        let jql = jql.unwrap_or_else(|| format!("project = {} ORDER BY created DESC", project));
        let query = vec![
            ("jql".to_string(), jql),
            ("maxResults".to_string(), "100".to_string()),
            (
                "fields".to_string(),
                "summary,description,issuetype,priority,status,assignee,reporter,labels,components,fixVersions,duedate"
                    .to_string(),
            ),
        ];
        let response = api.get_with("search", &query).await.map_err(SyncError::from)?;
        if !response.is_success() {
            return Err(SyncError::Rejected(response.rejection("search")).into());
        }
        meta["work_items"] = response.body;
    }

    if out.is_json() {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    } else {
        print_catalog(out, "Issue types", &meta["issue_types"])?;
        out.print_data(format!(
            "Fields: {}",
            meta["fields"].as_array().map(Vec::len).unwrap_or(0)
        ))?;
        print_catalog(out, "Components", &meta["components"])?;
        print_catalog(out, "Versions", &meta["versions"])?;
        if work_items {
            let total = meta["work_items"]["total"].as_u64().unwrap_or(0);
            out.print_data(format!("Work items: {}", total))?;
        }
    }
    Ok(ExitCode::Success)
}

fn print_catalog(out: &OutputContext, label: &str, entries: &Value) -> Result<()> {
    let entries = entries.as_array().cloned().unwrap_or_default();
    out.print_data(format!("{} ({}):", label, entries.len()))?;
    for entry in entries {
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
        let id = entry.get("id").and_then(Value::as_str).unwrap_or("?");
        out.print_data(format!("  - {} ({})", name, id))?;
    }
    Ok(())
}

async fn fetch(api: &impl Tracker, endpoint: &str) -> Result<Value> {
    let response = api.get(endpoint).await.map_err(SyncError::from)?;
    if !response.is_success() {
        return Err(SyncError::Rejected(response.rejection(endpoint)).into());
    }
    Ok(response.body)
}

async fn run_upload(
    api: &impl Tracker,
    roadmap: &roadsync::domain::Roadmap,
    project: &str,
    report_path: Option<&std::path::Path>,
    out: &OutputContext,
) -> Result<ExitCode> {
    out.print_info(format!(
        "Uploading {} nodes to project {}",
        roadmap.node_count(),
        project
    ))?;

    let mut pipeline = UploadPipeline::new(api, project);
    let report = pipeline.run(roadmap).await?;

    if let Some(path) = report_path {
        storage::save_report(&report, path)?;
        out.print_info(format!("Report written to {}", path.display()))?;
    }

    if out.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        out.print_data(render_report(&report))?;
    }

    Ok(if report.success {
        ExitCode::Success
    } else {
        ExitCode::GenericError
    })
}
