//! Markdown reports.
//!
//! Reports are rendered to strings by pure functions and written by
//! [`ReportWriter`] under the configured reports directory:
//!
//! ```text
//! reports/
//!   validation/             work unit and registry validation reports
//!   completion_reports/     one report per completed unit
//!   update_notifications/   one notification per update
//! ```

use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::completion::effective_unit_percent;
use crate::docs::DocsUpdate;
use crate::error::Result;
use crate::registry::RegistryIssue;
use crate::validation::{IssueSeverity, ValidationOutcome};
use crate::work_unit::{parse_document, ParseMode, Status, WorkUnit, WorkUnitId};

const GENERATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a report is filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Validation,
    Completion,
    UpdateNotification,
}

impl ReportKind {
    fn subdir(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Completion => "completion_reports",
            Self::UpdateNotification => "update_notifications",
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the validation report for a set of outcomes.
///
/// `failures` lists records that could not be parsed at all, as file name
/// and reason.
#[must_use]
pub fn validation_report(
    outcomes: &[ValidationOutcome],
    failures: &[(String, String)],
    generated_at: NaiveDateTime,
) -> String {
    let mut out = String::from("# Work Unit Validation Report\n\n");
    out.push_str(&format!(
        "Generated on: {}\n\n",
        generated_at.format(GENERATED_FORMAT)
    ));

    let with_issues: Vec<&ValidationOutcome> =
        outcomes.iter().filter(|o| !o.issues.is_empty()).collect();
    let total: usize = with_issues.iter().map(|o| o.issues.len()).sum();
    let fixed: usize = outcomes.iter().map(|o| o.fixed).sum();

    if total == 0 && failures.is_empty() {
        out.push_str("No issues found. All work units are consistent.\n\n");
    } else {
        out.push_str(&format!(
            "Found {} issue(s) across {} work unit(s):\n\n",
            total,
            with_issues.len()
        ));
        for outcome in &with_issues {
            out.push_str(&format!("## {}\n\n", outcome.id));
            for issue in &outcome.issues {
                let state = if outcome.remaining.contains(issue) {
                    ""
                } else {
                    " (fixed)"
                };
                out.push_str(&format!("- {}{}\n", issue, state));
            }
            out.push('\n');
        }
        if !failures.is_empty() {
            out.push_str("## Unreadable Records\n\n");
            for (file, reason) in failures {
                out.push_str(&format!("- {}: {}\n", file, reason));
            }
            out.push('\n');
        }
    }

    let units: Vec<WorkUnit> = outcomes
        .iter()
        .filter_map(|o| parse_document(&o.document, ParseMode::Lenient).ok())
        .collect();
    out.push_str("## Summary Statistics\n\n");
    out.push_str(&format!("- Total work units: {}\n", outcomes.len()));
    out.push_str(&format!("- Work units with issues: {}\n", with_issues.len()));
    out.push_str(&format!("- Issues fixed: {}\n", fixed));
    out.push_str(&format!(
        "- Total tasks: {}\n",
        units.iter().map(|u| u.tasks.len()).sum::<usize>()
    ));
    if !units.is_empty() {
        let sum: u32 = units.iter().map(|u| u32::from(effective_unit_percent(u))).sum();
        out.push_str(&format!(
            "- Average completion: {:.1}%\n",
            f64::from(sum) / units.len() as f64
        ));
    }
    out
}

/// Render the registry validation report, grouped by severity.
#[must_use]
pub fn registry_report(issues: &[RegistryIssue], generated_at: NaiveDateTime) -> String {
    if issues.is_empty() {
        return "No issues found. Registry is consistent with work unit files.\n".to_string();
    }

    let mut out = String::from("# Registry Validation Report\n\n");
    out.push_str(&format!(
        "Generated on: {}\n\n",
        generated_at.format(GENERATED_FORMAT)
    ));

    let groups = [
        (IssueSeverity::Error, "High"),
        (IssueSeverity::Warning, "Medium"),
        (IssueSeverity::Info, "Low"),
    ];
    out.push_str(&format!("Found {} issue(s):\n", issues.len()));
    for (severity, label) in groups {
        let count = issues.iter().filter(|i| i.severity == severity).count();
        out.push_str(&format!("- {} {} severity\n", count, label.to_lowercase()));
    }
    out.push('\n');

    for (severity, label) in groups {
        let group: Vec<&RegistryIssue> = issues.iter().filter(|i| i.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        out.push_str(&format!("## {} Severity Issues\n\n", label));
        for issue in group {
            out.push_str(&format!("- {}: {}\n", issue.id, issue.message));
        }
        out.push('\n');
    }

    out.push_str("## Recommended Actions\n\n");
    out.push_str("1. Run `worktrack registry validate --fix` to regenerate the registry\n");
    out.push_str("2. Review remaining issues by hand, especially relationship inconsistencies\n");
    out
}

/// Render the completion report of a unit.
#[must_use]
pub fn completion_report(unit: &WorkUnit, docs: &DocsUpdate, completed_at: NaiveDateTime) -> String {
    let mut out = format!("# Work Unit Completion Report: {}\n\n", unit.id);
    out.push_str("## Overview\n\n");
    out.push_str(&format!("- **Work Unit**: {}\n", unit.title));
    out.push_str(&format!("- **ID**: {}\n", unit.id));
    let description = if unit.description.trim().is_empty() {
        "No description available"
    } else {
        unit.description.trim()
    };
    out.push_str(&format!("- **Description**: {}\n", description));
    out.push_str(&format!("- **Status**: {}\n", unit.status));
    out.push_str(&format!("- **Completion**: {}%\n", unit.stored_percent()));
    out.push_str(&format!(
        "- **Completion Date**: {}\n\n",
        completed_at.format("%Y-%m-%d")
    ));

    out.push_str("## Objectives Achieved\n\n");
    if unit.objectives.is_empty() {
        out.push_str("No objectives listed\n\n");
    } else {
        for objective in &unit.objectives {
            out.push_str(&format!("- {}\n", objective));
        }
        out.push('\n');
    }

    if !unit.tasks.is_empty() {
        out.push_str("## Tasks\n\n");
        for task in &unit.tasks {
            out.push_str(&format!(
                "- Task {}: {} ({} subtask(s))\n",
                task.path,
                task.title,
                task.subtasks.len()
            ));
        }
        out.push('\n');
    }

    let written: Vec<&Path> = docs.written().collect();
    if !written.is_empty() {
        out.push_str("## Documentation Updated\n\n");
        for path in written {
            out.push_str(&format!("- {}\n", path.display()));
        }
        out.push('\n');
    }

    out.push_str("## Next Steps\n\n");
    out.push_str("1. Review the implementation against the requirements\n");
    out.push_str("2. Update dependent work units if necessary\n");
    out.push_str("3. Create follow-up work units for identified enhancements\n");
    out
}

/// Render the notification for an update of a unit.
#[must_use]
pub fn update_notification(
    id: &WorkUnitId,
    summary: &str,
    status: Option<(Status, Status)>,
    completion: Option<(u8, u8)>,
    updated_at: NaiveDateTime,
) -> String {
    let mut out = String::from("# Work Unit Update Notification\n\n");
    out.push_str(&format!("## Work Unit: {}\n\n", id));
    out.push_str(&format!(
        "This work unit was updated on {}.\n\n",
        updated_at.format("%Y-%m-%d")
    ));
    out.push_str(&format!("- Change: {}\n", summary));
    if let Some((before, after)) = status {
        out.push_str(&format!("- Status updated from {} to: **{}**\n", before, after));
    }
    if let Some((before, after)) = completion {
        out.push_str(&format!(
            "- Completion updated from {}% to: **{}%**\n",
            before, after
        ));
    }
    out
}

// ============================================================================
// Writing
// ============================================================================

/// Files reports under a reports directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a report would be written to.
    #[must_use]
    pub fn path_for(&self, kind: ReportKind, name: &str) -> PathBuf {
        self.dir.join(kind.subdir()).join(name)
    }

    /// Write a report and return its path.
    pub fn write(&self, kind: ReportKind, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(kind, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        info!("Report saved to {}", path.display());
        Ok(path)
    }
}

/// File name of a timestamped report: `work_unit_validation_20260403_101500.md`.
#[must_use]
pub fn timestamped_name(stem: &str, at: NaiveDateTime) -> String {
    format!("{}_{}.md", stem, at.format("%Y%m%d_%H%M%S"))
}
