//! worktrack - work unit bookkeeping from the command line
//!
//! Creates, updates, validates and indexes markdown work unit records.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use worktrack::config::{validate_project_config, ProjectConfig};
use worktrack::mutation::Mutation;
use worktrack::reporting::registry_report;
use worktrack::validation::{Issue, IssueSeverity};
use worktrack::work_unit::{Category, CompletionValue, Status, SubtaskState, TaskPath, WorkUnitId};
use worktrack::workflow::{ChangeReport, RunOptions, Workflow};
use worktrack::WorktrackError;

#[derive(Parser)]
#[command(name = "worktrack")]
#[command(version = "0.1.0")]
#[command(about = "Keep work unit records, their completion and the registry consistent", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a work unit from the template
    Create {
        /// Title of the work unit
        #[arg(long)]
        title: String,

        /// Category: enhancement, feature, bug-fix or documentation
        #[arg(long, default_value = "feature")]
        category: String,

        /// Description paragraph
        #[arg(long)]
        description: Option<String>,

        /// Show the new record without writing it
        #[arg(long)]
        dry_run: bool,

        /// Write the record without validating it
        #[arg(long)]
        skip_validation: bool,
    },

    /// Update status or completion of a work unit
    Update {
        /// Work unit identifier (e.g. WU-007)
        id: String,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New completion of the whole unit (e.g. 40 or 40%)
        #[arg(long)]
        completion: Option<String>,

        /// Task path whose completion is overridden (e.g. 1.2)
        #[arg(long, requires = "task_completion")]
        task: Option<String>,

        /// Completion for --task: N%, Completed or Not Completed
        #[arg(long, requires = "task")]
        task_completion: Option<String>,

        /// Recompute stored completions from subtasks
        #[arg(long)]
        recalculate: bool,

        /// Show the change without writing it
        #[arg(long)]
        dry_run: bool,

        /// Write the record without validating it
        #[arg(long)]
        skip_validation: bool,
    },

    /// Update the status of one task or subtask
    Status {
        /// Work unit identifier
        id: String,

        /// Task path (e.g. 1.2)
        #[arg(long)]
        task: String,

        /// New state: not started, in progress, completed (blocked for tasks)
        #[arg(long)]
        state: String,

        /// Caption of the subtask to update instead of the whole task
        #[arg(long)]
        subtask: Option<String>,

        /// Changelog message
        #[arg(short, long)]
        message: String,

        /// Show the change without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Append a task with not-started subtasks
    AddTask {
        /// Work unit identifier
        id: String,

        /// Task title
        #[arg(long)]
        title: String,

        /// Subtask caption (repeatable)
        #[arg(long = "subtask", value_name = "CAPTION")]
        subtasks: Vec<String>,

        /// Show the change without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Complete a work unit and propagate it into the documentation
    Complete {
        /// Work unit identifier
        id: String,

        /// Show the change without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check work units for consistency
    Validate {
        /// Work unit identifier (all units when omitted)
        id: Option<String>,

        /// Validate every work unit (cannot be combined with an identifier)
        #[arg(long, conflicts_with = "id")]
        all: bool,

        /// Repair fixable issues
        #[arg(long)]
        fix: bool,

        /// Save a markdown report under the reports directory
        #[arg(long)]
        report: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Regenerate the registry from the work units
    Sync {
        /// Only report whether the registry is out of date
        #[arg(long)]
        check_only: bool,
    },

    /// Registry checks
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Validate every unit and the registry in one run
    Maintain {
        /// Repair fixable issues
        #[arg(long)]
        fix: bool,
    },

    /// List work units
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or validate project configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// Compare registry entries with the work units
    Validate {
        /// Regenerate the registry when issues are found
        #[arg(long)]
        fix: bool,

        /// Save the report to a file
        #[arg(long, value_name = "FILE")]
        report_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration
    Validate,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "worktrack=debug,info"
    } else {
        "worktrack=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    match run(cli.command, &project_path) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            let code = e
                .downcast_ref::<WorktrackError>()
                .map_or(1, WorktrackError::exit_code);
            std::process::exit(code);
        }
    }
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

fn parse_id(raw: &str) -> anyhow::Result<WorkUnitId> {
    Ok(raw.parse::<WorkUnitId>()?)
}

fn parse_path(raw: &str) -> anyhow::Result<TaskPath> {
    Ok(raw.parse::<TaskPath>()?)
}

/// Accept `40` as well as `40%`.
fn parse_completion(raw: &str, allow_words: bool) -> anyhow::Result<CompletionValue> {
    let trimmed = raw.trim();
    let value = if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        CompletionValue::parse(&format!("{}%", trimmed), allow_words)?
    } else {
        CompletionValue::parse(trimmed, allow_words)?
    };
    Ok(value)
}

fn severity_label(severity: IssueSeverity) -> colored::ColoredString {
    match severity {
        IssueSeverity::Info => "Info:".blue(),
        IssueSeverity::Warning => "Warning:".yellow(),
        IssueSeverity::Error | IssueSeverity::Critical => "Error:".red(),
    }
}

fn print_issue(issue: &Issue, fixed: bool) {
    let suffix = if fixed { " (fixed)".green().to_string() } else { String::new() };
    println!(
        "   {} {}: {}{}",
        severity_label(issue.severity),
        issue.target,
        issue.message,
        suffix
    );
    if let (Some(expected), Some(found)) = (&issue.expected, &issue.found) {
        println!("      expected {}, found {}", expected, found);
    }
}

fn print_change(change: &ChangeReport) {
    if change.written {
        println!("{} {}: {}", "OK".green().bold(), change.id, change.summary());
    } else {
        println!(
            "{} {}: {} ({} line(s) would change in {})",
            "Dry run:".yellow().bold(),
            change.id,
            change.summary(),
            change.changed_lines,
            change.file
        );
    }
    if change.previous_status != change.status {
        println!("   Status: {} -> {}", change.previous_status, change.status);
    }
    if change.previous_completion != change.completion {
        println!(
            "   Completion: {}% -> {}%",
            change.previous_completion, change.completion
        );
    }
    if change.fixed > 0 {
        println!("   Validator repaired {} issue(s)", change.fixed);
    }
    for issue in &change.remaining {
        print_issue(issue, false);
    }
    if let Some(path) = &change.notification {
        println!("   Notification: {}", path.display());
    }
}

fn options(dry_run: bool, skip_validation: bool) -> RunOptions {
    RunOptions {
        dry_run,
        skip_validation,
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run(command: Commands, project_path: &Path) -> anyhow::Result<i32> {
    let config = ProjectConfig::load(project_path)?;

    let open = || Workflow::from_config(project_path, &config);

    match command {
        Commands::Create {
            title,
            category,
            description,
            dry_run,
            skip_validation,
        } => {
            let mut workflow = open()?;
            let category: Category = category.parse()?;
            let report = workflow.create(
                &title,
                category,
                description.as_deref(),
                options(dry_run, skip_validation),
            )?;
            if report.written {
                println!(
                    "{} Created {} in {}",
                    "OK".green().bold(),
                    report.id.to_string().bold(),
                    report.file
                );
            } else {
                println!(
                    "{} Would create {} in {}\n",
                    "Dry run:".yellow().bold(),
                    report.id,
                    report.file
                );
                print!("{}", report.content);
            }
            for issue in &report.issues {
                print_issue(issue, false);
            }
            Ok(0)
        }

        Commands::Update {
            id,
            status,
            completion,
            task,
            task_completion,
            recalculate,
            dry_run,
            skip_validation,
        } => {
            let mut workflow = open()?;
            let id = parse_id(&id)?;
            let mut mutations = Vec::new();
            if let Some(status) = status {
                mutations.push(Mutation::SetStatus(status.parse::<Status>()?));
            }
            if let Some(completion) = completion {
                mutations.push(Mutation::SetCompletion(
                    parse_completion(&completion, false)?.percent(),
                ));
            }
            if let (Some(task), Some(value)) = (task, task_completion) {
                mutations.push(Mutation::SetTaskCompletion {
                    path: parse_path(&task)?,
                    value: parse_completion(&value, true)?,
                });
            }
            if recalculate {
                mutations.push(Mutation::Recalculate);
            }
            if mutations.is_empty() {
                anyhow::bail!(
                    "nothing to update: pass --status, --completion, --task with --task-completion, or --recalculate"
                );
            }

            let change =
                workflow.apply(&id, &mutations, None, options(dry_run, skip_validation))?;
            print_change(&change);
            Ok(0)
        }

        Commands::Status {
            id,
            task,
            state,
            subtask,
            message,
            dry_run,
        } => {
            let mut workflow = open()?;
            let id = parse_id(&id)?;
            let path = parse_path(&task)?;
            let mutation = match subtask {
                Some(caption) => Mutation::SetSubtaskState {
                    path,
                    caption,
                    state: state.parse::<SubtaskState>()?,
                },
                None => Mutation::SetTaskStatus {
                    path,
                    status: state.parse::<Status>()?,
                },
            };
            let change = workflow.apply(
                &id,
                &[mutation],
                Some(&message),
                options(dry_run, false),
            )?;
            print_change(&change);
            Ok(0)
        }

        Commands::AddTask {
            id,
            title,
            subtasks,
            dry_run,
        } => {
            let mut workflow = open()?;
            let id = parse_id(&id)?;
            let mutation = Mutation::AddTask { title, subtasks };
            let change = workflow.apply(&id, &[mutation], None, options(dry_run, false))?;
            print_change(&change);
            Ok(0)
        }

        Commands::Complete { id, dry_run } => {
            let mut workflow = open()?;
            let id = parse_id(&id)?;
            let report = workflow.complete(&id, options(dry_run, false))?;
            print_change(&report.change);
            if let Some(docs) = &report.docs {
                for path in docs.written() {
                    let verb = if dry_run { "Would update" } else { "Updated" };
                    println!("   {} {}", verb, path.display());
                }
            }
            if let Some(path) = &report.report {
                println!("   Completion report: {}", path.display());
            }
            Ok(0)
        }

        Commands::Validate {
            id,
            all,
            fix,
            report,
            json,
        } => {
            let mut workflow = open()?;
            let id = match (all, id) {
                (true, _) | (false, None) => None,
                (false, Some(raw)) => Some(parse_id(&raw)?),
            };
            let result = workflow.validate(id.as_ref(), fix)?;

            if json {
                let units: Vec<serde_json::Value> = result
                    .outcomes
                    .iter()
                    .map(|o| {
                        serde_json::json!({
                            "id": o.id,
                            "issues": o.issues,
                            "fixed": o.fixed,
                            "remaining": o.remaining,
                        })
                    })
                    .collect();
                let failures: Vec<serde_json::Value> = result
                    .failures
                    .iter()
                    .map(|(file, reason)| serde_json::json!({ "file": file, "reason": reason }))
                    .collect();
                let value = serde_json::json!({
                    "units": units,
                    "failures": failures,
                    "issues": result.issue_count(),
                    "fixed": result.fixed_count(),
                    "remaining": result.remaining_count(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for outcome in &result.outcomes {
                    if outcome.issues.is_empty() {
                        println!("{} {}", "OK".green(), outcome.id);
                        continue;
                    }
                    println!("{} {}", "Issues:".cyan().bold(), outcome.id);
                    for issue in &outcome.issues {
                        print_issue(issue, !outcome.remaining.contains(issue));
                    }
                }
                for (file, reason) in &result.failures {
                    println!("{} {}: {}", "Error:".red(), file, reason);
                }
                println!(
                    "\n{} units checked, {} issue(s) found, {} fixed, {} remaining",
                    result.outcomes.len(),
                    result.issue_count(),
                    result.fixed_count(),
                    result.remaining_count()
                );
            }

            if report {
                if let Some(path) = workflow.write_validation_report(&result)? {
                    eprintln!("Report saved to {}", path.display());
                }
            }
            Ok(if result.is_clean() { 0 } else { 1 })
        }

        Commands::Sync { check_only } => {
            let mut workflow = open()?;
            let sync = workflow.sync_registry(check_only)?;
            if sync.drift.in_sync {
                println!(
                    "{} Registry is up to date ({} entries)",
                    "OK".green().bold(),
                    sync.entries
                );
                return Ok(0);
            }
            if check_only {
                println!("{} Registry is out of date", "Drift:".yellow().bold());
                println!(
                    "   current:  {}",
                    sync.drift.current_digest.as_deref().unwrap_or("(missing)")
                );
                println!("   expected: {}", sync.drift.expected_digest);
                return Ok(1);
            }
            println!(
                "{} Registry regenerated ({} entries)",
                "OK".green().bold(),
                sync.entries
            );
            Ok(0)
        }

        Commands::Registry { action } => match action {
            RegistryAction::Validate { fix, report_file } => {
                let mut workflow = open()?;
                let report = workflow.validate_registry(fix)?;
                if report.regenerated {
                    println!(
                        "{} Registry regenerated, {} of {} issue(s) resolved",
                        "OK".green().bold(),
                        report.issues.len().saturating_sub(report.remaining.len()),
                        report.issues.len()
                    );
                }
                let text = registry_report(&report.remaining, chrono::Local::now().naive_local());
                println!("{}", text);
                if let Some(path) = report_file {
                    std::fs::write(&path, &text)
                        .with_context(|| format!("Failed to write report: {}", path.display()))?;
                    println!("Report saved to {}", path.display());
                }
                Ok(if report.remaining.is_empty() { 0 } else { 1 })
            }
        },

        Commands::Maintain { fix } => {
            let mut workflow = open()?;
            let report = workflow.maintain(fix)?;
            println!("\n{} Maintenance", "Worktrack:".cyan().bold());
            println!("{}", "─".repeat(40));
            println!("   Units checked: {}", report.validation.outcomes.len());
            println!("   Unit issues: {}", report.validation.issue_count());
            println!("   Unit issues fixed: {}", report.validation.fixed_count());
            println!("   Unreadable records: {}", report.validation.failures.len());
            println!("   Registry issues: {}", report.registry.issues.len());
            println!("   Registry regenerated: {}", report.registry.regenerated);
            if let Some(path) = &report.report {
                println!("   Report: {}", path.display());
            }
            if report.is_clean() {
                println!("\n{} Everything is consistent", "OK".green().bold());
                Ok(0)
            } else {
                println!(
                    "\n{} {} issue(s) need attention",
                    "Warning:".yellow().bold(),
                    report.validation.remaining_count()
                        + report.validation.failures.len()
                        + report.registry.remaining.len()
                );
                Ok(1)
            }
        }

        Commands::List { json } => {
            let workflow = open()?;
            let entries = workflow.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No work units in {}", config.work_units_path(project_path).display());
            } else {
                for entry in &entries {
                    let status = match entry.status {
                        Status::Completed => entry.status.to_string().green(),
                        Status::InProgress => entry.status.to_string().cyan(),
                        Status::Blocked => entry.status.to_string().red(),
                        Status::Proposed | Status::NotStarted => entry.status.to_string().normal(),
                    };
                    println!(
                        "{}  {:<12} {:>4}%  {}",
                        entry.id.to_string().bold(),
                        status,
                        entry.completion,
                        entry.title
                    );
                }
            }
            Ok(0)
        }

        Commands::Config { action } => config_command(action, &config, project_path),
    }
}

fn config_command(
    action: ConfigAction,
    config: &ProjectConfig,
    project_path: &Path,
) -> anyhow::Result<i32> {
    match action {
        ConfigAction::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("\n{} Project Configuration", "Config:".cyan().bold());
                println!("{}", "─".repeat(40));
                println!(
                    "   Work units: {}",
                    config.work_units_path(project_path).display()
                );
                println!("   Registry: {}", config.registry_file);
                println!("   Reports: {}", config.reports_path(project_path).display());
                println!("   Docs: {}", config.docs_path(project_path).display());
                println!("   README: {}", config.readme(project_path).display());
                println!("   ID prefix: {}", config.id_prefix);
                println!("   Excluded files: {}", config.excluded_files.join(", "));
                println!("   Backups: {}", config.backups);
                println!("   Lock writes: {}", config.lock_writes);
                println!("   Update docs: {}", config.update_docs);
                if let Some(template) = config.template(project_path) {
                    println!("   Template: {}", template.display());
                }
            }
            Ok(0)
        }

        ConfigAction::Validate => {
            let report = validate_project_config(project_path);
            for file in &report.files_checked {
                println!("   Checked {}", file.display());
            }
            for error in &report.errors {
                eprintln!("{} {}", "Error:".red(), error);
            }
            for warning in &report.warnings {
                println!("{} {}", "Warning:".yellow(), warning);
            }
            if report.is_valid() {
                println!("{} {}", "OK".green(), report.summary());
            } else {
                eprintln!("{}", report.summary());
            }
            Ok(report.exit_code())
        }
    }
}
