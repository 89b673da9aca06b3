//! Consistency validator.
//!
//! Checks that stored completion values agree with what the completion
//! calculator derives, and that a unit's status agrees with its
//! completion. Findings are returned as [`Issue`] values; most of them can
//! be repaired in place.
//!
//! # Rules
//!
//! - A task with subtasks must store the completion derived from them.
//! - A unit with tasks must store the aggregate of its task completions.
//!   A unit without tasks keeps its stored completion.
//! - A unit at 100% must be `Completed`; a `Completed` unit must be at 100%.
//! - `Related to X` relationships and dependencies must name known units.
//!   These are reported but never repaired.
//!
//! Repair derives values bottom-up and never changes subtask state.
//! Repairing an already repaired document changes nothing.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

use crate::completion::{
    effective_task_percent, effective_unit_percent, task_completion, unit_completion,
};
use crate::error::{Result, WorktrackError};
use crate::work_unit::{
    parse_document, CompletionValue, Document, Edit, Node, ParseMode, Status, StoredCompletion,
    Task, TaskPath, WorkUnit, WorkUnitId,
};

// ============================================================================
// Issue Types
// ============================================================================

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueSeverity {
    /// Informational only.
    Info,
    /// Should be fixed.
    Warning,
    /// Record is inconsistent.
    Error,
    /// Record cannot be trusted at all.
    Critical,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Kind of consistency problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueKind {
    /// No completion field
    MissingCompletion,
    /// Stored completion differs from the derived one
    CompletionMismatch,
    /// Completion field cannot be parsed
    InvalidCompletion,
    /// Status disagrees with completion
    StatusInconsistency,
    /// `Related to X` names a unit that does not exist
    InvalidRelationship,
    /// A dependency names a unit that does not exist
    UnknownDependency,
}

impl IssueKind {
    /// Whether repair can resolve this kind of issue.
    #[must_use]
    pub fn is_fixable(&self) -> bool {
        !matches!(self, Self::InvalidRelationship | Self::UnknownDependency)
    }

    #[must_use]
    pub fn severity(&self) -> IssueSeverity {
        match self {
            Self::MissingCompletion | Self::InvalidRelationship | Self::UnknownDependency => {
                IssueSeverity::Warning
            }
            Self::CompletionMismatch | Self::InvalidCompletion | Self::StatusInconsistency => {
                IssueSeverity::Error
            }
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingCompletion => "missing completion",
            Self::CompletionMismatch => "completion mismatch",
            Self::InvalidCompletion => "invalid completion",
            Self::StatusInconsistency => "status inconsistency",
            Self::InvalidRelationship => "invalid relationship",
            Self::UnknownDependency => "unknown dependency",
        };
        f.write_str(name)
    }
}

/// What an issue is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IssueTarget {
    Unit,
    Task(TaskPath),
}

impl fmt::Display for IssueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "work unit"),
            Self::Task(path) => write!(f, "task {}", path),
        }
    }
}

/// A single problem found in a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub target: IssueTarget,
    pub message: String,
    /// Value the record should hold, when known.
    pub expected: Option<String>,
    /// Value the record holds.
    pub found: Option<String>,
}

impl Issue {
    /// Create a new issue with the kind's default severity.
    pub fn new(kind: IssueKind, target: IssueTarget, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            target,
            message: message.into(),
            expected: None,
            found: None,
        }
    }

    /// Add expected and found values.
    #[must_use]
    pub fn with_values(mut self, expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        self.expected = Some(expected.to_string());
        self.found = Some(found.to_string());
        self
    }

    #[must_use]
    pub fn is_fixable(&self) -> bool {
        self.kind.is_fixable()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.target, self.message)?;
        if let (Some(expected), Some(found)) = (&self.expected, &self.found) {
            write!(f, " (expected {}, found {})", expected, found)?;
        }
        Ok(())
    }
}

// ============================================================================
// Checks
// ============================================================================

fn percent(p: u8) -> CompletionValue {
    CompletionValue::Percent(p)
}

fn check_completion(target: &IssueTarget, stored: &StoredCompletion, expected: Option<u8>) -> Option<Issue> {
    match (stored, expected) {
        (StoredCompletion::Missing, expected) => Some(
            Issue::new(IssueKind::MissingCompletion, target.clone(), "completion field is missing")
                .with_values(percent(expected.unwrap_or(0)), stored),
        ),
        (StoredCompletion::Invalid(raw), expected) => Some(
            Issue::new(
                IssueKind::InvalidCompletion,
                target.clone(),
                "completion is not a percentage",
            )
            .with_values(percent(expected.unwrap_or(0)), raw),
        ),
        (StoredCompletion::Value(value), Some(expected)) if value.percent() != expected => Some(
            Issue::new(
                IssueKind::CompletionMismatch,
                target.clone(),
                "stored completion differs from derived completion",
            )
            .with_values(percent(expected), value),
        ),
        _ => None,
    }
}

/// Status the unit should have given its effective completion, if it
/// differs from the current one.
fn expected_status(status: Status, effective: u8) -> Option<Status> {
    if effective == 100 && !status.is_completed() {
        Some(Status::Completed)
    } else if status.is_completed() && effective < 100 {
        Some(Status::InProgress)
    } else {
        None
    }
}

/// Value written when repairing a task's completion.
fn task_target_percent(task: &Task) -> u8 {
    task_completion(task).unwrap_or_else(|| effective_task_percent(task))
}

/// Value written when repairing the unit's completion.
fn unit_target_percent(unit: &WorkUnit) -> u8 {
    unit_completion(unit).unwrap_or_else(|| match unit.completion.percent() {
        Some(p) => p,
        None if unit.status.is_completed() => 100,
        None => 0,
    })
}

/// Check a work unit.
///
/// `known_ids` enables the relationship and dependency checks; pass `None`
/// to skip them.
#[must_use]
pub fn validate_unit(unit: &WorkUnit, known_ids: Option<&BTreeSet<WorkUnitId>>) -> Vec<Issue> {
    let mut issues = Vec::new();

    for task in &unit.tasks {
        let target = IssueTarget::Task(task.path.clone());
        let expected = match task.completion {
            StoredCompletion::Value(_) => task_completion(task),
            _ => Some(task_target_percent(task)),
        };
        issues.extend(check_completion(&target, &task.completion, expected));
    }

    let unit_expected = match unit.completion {
        StoredCompletion::Value(_) => unit_completion(unit),
        _ => Some(unit_target_percent(unit)),
    };
    issues.extend(check_completion(&IssueTarget::Unit, &unit.completion, unit_expected));

    let effective = effective_unit_or_target(unit);
    if let Some(status) = expected_status(unit.status, effective) {
        issues.push(
            Issue::new(
                IssueKind::StatusInconsistency,
                IssueTarget::Unit,
                format!("status does not match {}% completion", effective),
            )
            .with_values(status, unit.status),
        );
    }

    if let Some(known) = known_ids {
        if let Some(related) = unit.related_to() {
            if !known.contains(&related) {
                issues.push(Issue::new(
                    IssueKind::InvalidRelationship,
                    IssueTarget::Unit,
                    format!("relationship refers to unknown work unit {}", related),
                ));
            }
        }
        for dependency in &unit.dependencies {
            if !known.contains(dependency) {
                issues.push(Issue::new(
                    IssueKind::UnknownDependency,
                    IssueTarget::Unit,
                    format!("dependency {} does not exist", dependency),
                ));
            }
        }
    }

    issues
}

fn effective_unit_or_target(unit: &WorkUnit) -> u8 {
    match unit.completion {
        StoredCompletion::Value(_) => effective_unit_percent(unit),
        _ => unit_target_percent(unit),
    }
}

// ============================================================================
// Repair
// ============================================================================

fn completion_edit(
    doc: &Document,
    existing: Option<usize>,
    anchor: usize,
    value: u8,
) -> Edit {
    let value = percent(value).to_string();
    match existing {
        Some(index) => Edit::SetField { index, value },
        None => {
            let indent = doc.node(anchor).map(Node::indent).unwrap_or_default();
            Edit::InsertAfter {
                index: anchor,
                node: Node::field(indent, "Completion", value),
            }
        }
    }
}

/// Compute the edits that repair every fixable issue of `unit`.
fn repair_edits(doc: &Document, unit: &WorkUnit, issues: &[Issue]) -> Vec<Edit> {
    let mut edits = Vec::new();

    for issue in issues.iter().filter(|i| i.is_fixable()) {
        match (&issue.target, issue.kind) {
            (IssueTarget::Task(path), _) => {
                let Some(task) = unit.task(path) else { continue };
                let anchor = task.nodes.status.unwrap_or(task.nodes.heading);
                edits.push(completion_edit(doc, task.nodes.completion, anchor, task_target_percent(task)));
            }
            (IssueTarget::Unit, IssueKind::StatusInconsistency) => {
                let status = expected_status(unit.status, effective_unit_or_target(unit));
                let Some(status) = status else { continue };
                edits.push(match unit.nodes.status {
                    Some(index) => Edit::SetField {
                        index,
                        value: status.to_string(),
                    },
                    None => Edit::InsertAfter {
                        index: unit.nodes.id,
                        node: Node::field(
                            doc.node(unit.nodes.id).map(Node::indent).unwrap_or_default(),
                            "Status",
                            status.to_string(),
                        ),
                    },
                });
            }
            (IssueTarget::Unit, _) => {
                let anchor = unit.nodes.status.unwrap_or(unit.nodes.id);
                edits.push(completion_edit(doc, unit.nodes.completion, anchor, unit_target_percent(unit)));
            }
        }
    }

    // Status inserts go before completion inserts at the same anchor.
    edits.sort_by_key(|edit| match edit {
        Edit::InsertAfter { node, .. } if node.is_field("Status") => 0,
        _ => 1,
    });
    edits
}

/// Result of validating one document.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub id: WorkUnitId,
    /// Issues found before any repair.
    pub issues: Vec<Issue>,
    /// Number of issues repaired.
    pub fixed: usize,
    /// Issues left after repair (equal to `issues` without repair).
    pub remaining: Vec<Issue>,
    /// The document after repair (the input when nothing changed).
    pub document: Document,
}

impl ValidationOutcome {
    /// Check whether repair changed the document.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.fixed > 0
    }

    /// Check whether no issues remain.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Validate a document, optionally repairing it.
///
/// With `fix`, every fixable issue is repaired in one pass, then the
/// repaired document is validated again to produce `remaining`.
pub fn validate_document(
    doc: &Document,
    fix: bool,
    known_ids: Option<&BTreeSet<WorkUnitId>>,
) -> Result<ValidationOutcome> {
    let unit = parse_document(doc, ParseMode::Lenient)?;
    let issues = validate_unit(&unit, known_ids);
    debug!("{}: {} issue(s) found", unit.id, issues.len());

    let fixable = issues.iter().filter(|i| i.is_fixable()).count();
    if !fix || fixable == 0 {
        return Ok(ValidationOutcome {
            id: unit.id,
            remaining: issues.clone(),
            issues,
            fixed: 0,
            document: doc.clone(),
        });
    }

    let mut repaired = doc.clone();
    let edits = repair_edits(doc, &unit, &issues);
    if !repaired.apply_edits(edits) {
        return Err(WorktrackError::malformed(format!(
            "could not repair {}",
            unit.id
        )));
    }

    let reparsed = parse_document(&repaired, ParseMode::Lenient)?;
    let remaining = validate_unit(&reparsed, known_ids);
    let fixed = issues.len().saturating_sub(remaining.len());
    info!("{}: repaired {} issue(s), {} remaining", unit.id, fixed, remaining.len());

    Ok(ValidationOutcome {
        id: unit.id,
        issues,
        fixed,
        remaining,
        document: repaired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(text: &str, fix: bool) -> ValidationOutcome {
        validate_document(&Document::parse(text), fix, None).unwrap()
    }

    fn kinds(issues: &[Issue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    const TWO_TASKS: &str = "# Work Unit: Sample\n- **ID**: WU-001\n- **Status**: In Progress\n- **Completion**: 10%\n\n### 1.1 First\n- **Status**: In Progress\n- **Completion**: 20%\n- **Implementation Details**:\n  - [✓] a\n  - [ ] b\n\n### 1.2 Second\n- **Status**: In Progress\n- **Implementation Details**:\n  - [✓] c\n  - [~] d\n";

    #[test]
    fn test_detects_mismatch_and_missing() {
        let outcome = validate(TWO_TASKS, false);
        assert_eq!(
            kinds(&outcome.issues),
            vec![
                IssueKind::CompletionMismatch,
                IssueKind::MissingCompletion,
                IssueKind::CompletionMismatch,
            ]
        );
        assert_eq!(outcome.issues[0].expected.as_deref(), Some("50%"));
        assert_eq!(outcome.issues[0].found.as_deref(), Some("20%"));
        assert_eq!(outcome.issues[1].target, IssueTarget::Task("1.2".parse().unwrap()));
        assert_eq!(outcome.issues[1].expected.as_deref(), Some("75%"));
        // (50 + 75) / 2 truncated
        assert_eq!(outcome.issues[2].expected.as_deref(), Some("62%"));
        assert!(!outcome.changed());
    }

    #[test]
    fn test_repair_fixes_everything() {
        let outcome = validate(TWO_TASKS, true);
        assert_eq!(outcome.fixed, 3);
        assert!(outcome.is_clean());

        let text = outcome.document.render();
        assert!(text.contains("- **Completion**: 62%\n\n### 1.1"));
        assert!(text.contains("### 1.1 First\n- **Status**: In Progress\n- **Completion**: 50%\n"));
        assert!(text.contains("### 1.2 Second\n- **Status**: In Progress\n- **Completion**: 75%\n"));
    }

    #[test]
    fn test_repair_is_idempotent() {
        let once = validate(TWO_TASKS, true).document.render();
        let second = validate(&once, true);
        assert_eq!(second.fixed, 0);
        assert!(second.issues.is_empty());
        assert_eq!(second.document.render(), once);
    }

    #[test]
    fn test_status_promoted_at_full_completion() {
        let text = "- **ID**: WU-002\n- **Status**: In Progress\n- **Completion**: 50%\n\n### 1.1 Only\n- **Status**: Completed\n- **Completion**: 100%\n- **Implementation Details**:\n  - [✓] a\n  - [✓] b\n";
        let outcome = validate(text, true);
        assert_eq!(
            kinds(&outcome.issues),
            vec![IssueKind::CompletionMismatch, IssueKind::StatusInconsistency]
        );
        let rendered = outcome.document.render();
        assert!(rendered.contains("- **Status**: Completed\n- **Completion**: 100%\n\n"));
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_completed_unit_below_full_is_demoted() {
        let text = "- **ID**: WU-003\n- **Status**: Completed\n- **Completion**: 0%\n\n### 1.1 Only\n- **Status**: Not Started\n- **Completion**: 0%\n- **Implementation Details**:\n  - [ ] a\n";
        let outcome = validate(text, true);
        assert_eq!(kinds(&outcome.issues), vec![IssueKind::StatusInconsistency]);
        assert!(outcome.document.render().contains("- **Status**: In Progress\n"));
    }

    #[test]
    fn test_unit_without_tasks_keeps_stored_completion() {
        let outcome = validate("- **ID**: WU-004\n- **Status**: In Progress\n- **Completion**: 40%\n", true);
        assert!(outcome.issues.is_empty());

        let outcome = validate("- **ID**: WU-004\n- **Status**: Proposed\n- **Completion**: 100%\n", true);
        assert_eq!(kinds(&outcome.issues), vec![IssueKind::StatusInconsistency]);
        assert!(outcome.document.render().contains("- **Status**: Completed\n"));
    }

    #[test]
    fn test_invalid_completion_is_overwritten() {
        let outcome = validate("- **ID**: WU-005\n- **Status**: Proposed\n- **Completion**: lots\n", true);
        assert_eq!(kinds(&outcome.issues), vec![IssueKind::InvalidCompletion]);
        assert_eq!(
            outcome.document.render(),
            "- **ID**: WU-005\n- **Status**: Proposed\n- **Completion**: 0%\n"
        );
    }

    #[test]
    fn test_missing_unit_completion_inserted_after_status() {
        let outcome = validate("- **ID**: WU-006\n- **Status**: Proposed\n- **Type**: Feature\n", true);
        assert_eq!(kinds(&outcome.issues), vec![IssueKind::MissingCompletion]);
        assert_eq!(
            outcome.document.render(),
            "- **ID**: WU-006\n- **Status**: Proposed\n- **Completion**: 0%\n- **Type**: Feature\n"
        );
    }

    #[test]
    fn test_requirement_words_compare_numerically() {
        let text = "- **ID**: WU-007\n- **Status**: Completed\n- **Completion**: 100%\n\n### 1.1 Req\n- **Status**: Completed\n- **Completion**: Completed\n- **Implementation Details**:\n  - [✓] a\n";
        assert!(validate(text, false).issues.is_empty());
    }

    #[test]
    fn test_relationship_checks_are_report_only() {
        let text = "- **ID**: WU-008\n- **Status**: Proposed\n- **Completion**: 0%\n- **Relationship Type**: Related to WU-404\n- **Dependencies**: WU-001, WU-405\n";
        let known: BTreeSet<WorkUnitId> = ["WU-001", "WU-008"].iter().map(WorkUnitId::new).collect();
        let outcome = validate_document(&Document::parse(text), true, Some(&known)).unwrap();
        assert_eq!(
            kinds(&outcome.issues),
            vec![IssueKind::InvalidRelationship, IssueKind::UnknownDependency]
        );
        assert_eq!(outcome.fixed, 0);
        assert_eq!(outcome.remaining.len(), 2);
        assert_eq!(outcome.document.render(), text);
    }
}
