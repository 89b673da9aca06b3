//! Record mutator.
//!
//! Applies exactly one [`Mutation`] to a work unit document and returns the
//! new document. Nothing is written here; the caller decides whether to
//! validate, persist or only preview the result.
//!
//! State flows bottom-up in stages, re-reading the document between them:
//!
//! ```text
//! subtask state ─> task status ─> task completion ─> unit completion
//! ```
//!
//! Every mutation refreshes the `Last Updated` field when the document has
//! one and records a changelog entry. Unit status is never promoted here;
//! that is the validator's job.

use chrono::NaiveDateTime;
use std::fmt;
use tracing::debug;

use crate::completion::{aggregate, derive_task_status, effective_task_percent, task_completion};
use crate::error::{LookupKind, Result, WorktrackError};
use crate::work_unit::{
    parse_document, CompletionValue, Document, Edit, Node, NodeKind, ParseMode, Status,
    SubtaskState, Task, TaskPath, WorkUnit,
};

const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d";
const CHANGELOG_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A single change to a work unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Set the unit status.
    SetStatus(Status),
    /// Set the unit completion percentage.
    SetCompletion(u8),
    /// Override one task's completion.
    SetTaskCompletion {
        path: TaskPath,
        value: CompletionValue,
    },
    /// Set a task's status, cascading to its subtasks.
    SetTaskStatus { path: TaskPath, status: Status },
    /// Set one subtask's state.
    SetSubtaskState {
        path: TaskPath,
        caption: String,
        state: SubtaskState,
    },
    /// Append a new task with not-started subtasks.
    AddTask { title: String, subtasks: Vec<String> },
    /// Complete the unit, its tasks and their subtasks.
    Complete,
    /// Recompute stored completions from subtasks without changing state.
    Recalculate,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetStatus(status) => write!(f, "Status changed to {}", status),
            Self::SetCompletion(p) => write!(f, "Completion set to {}%", p),
            Self::SetTaskCompletion { path, value } => {
                write!(f, "Task {} completion set to {}", path, value)
            }
            Self::SetTaskStatus { path, status } => {
                write!(f, "Task {} status changed to {}", path, status)
            }
            Self::SetSubtaskState {
                path,
                caption,
                state,
            } => write!(f, "Subtask '{}' of task {} set to {}", caption, path, state),
            Self::AddTask { title, .. } => write!(f, "Task added: {}", title),
            Self::Complete => write!(f, "Work unit completed"),
            Self::Recalculate => write!(f, "Completion recalculated"),
        }
    }
}

/// Inputs shared by every mutation.
#[derive(Debug, Clone)]
pub struct MutationContext {
    /// Time used for the changelog entry and `Last Updated`.
    pub now: NaiveDateTime,
    /// Optional free text appended to the changelog entry.
    pub message: Option<String>,
}

impl MutationContext {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now, message: None }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = (!message.trim().is_empty()).then_some(message);
        self
    }
}

/// Result of applying a mutation.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub document: Document,
    /// Changelog text recorded for the mutation.
    pub summary: String,
    pub previous_status: Status,
    pub status: Status,
    pub previous_completion: u8,
    pub completion: u8,
}

// ============================================================================
// Helpers
// ============================================================================

fn reparse(doc: &Document) -> Result<WorkUnit> {
    parse_document(doc, ParseMode::Strict)
}

fn find_task<'a>(unit: &'a WorkUnit, path: &TaskPath) -> Result<&'a Task> {
    unit.task(path)
        .ok_or_else(|| WorktrackError::not_found(LookupKind::Task, path.to_string()))
}

/// Edit that sets a field, inserting it after `anchor` when it is missing.
fn field_edit(
    doc: &Document,
    existing: Option<usize>,
    anchor: usize,
    name: &str,
    value: impl Into<String>,
) -> Edit {
    let value = value.into();
    match existing {
        Some(index) => Edit::SetField { index, value },
        None => {
            let indent = doc.node(anchor).map(Node::indent).unwrap_or_default();
            Edit::InsertAfter {
                index: anchor,
                node: Node::field(indent, name, value),
            }
        }
    }
}

fn is_blank(node: &Node) -> bool {
    matches!(node.kind(), NodeKind::Blank)
}

fn apply(doc: &mut Document, edits: Vec<Edit>) -> Result<()> {
    if edits.is_empty() || doc.apply_edits(edits) {
        Ok(())
    } else {
        Err(WorktrackError::malformed("edit points at a missing line"))
    }
}

fn unit_status_index(unit: &WorkUnit) -> Result<usize> {
    unit.nodes
        .status
        .ok_or_else(|| WorktrackError::malformed(format!("{} has no Status field", unit.id)))
}

// ============================================================================
// Stages
// ============================================================================

/// Derive a task's status from its subtasks, then its completion.
fn refresh_task(doc: &mut Document, path: &TaskPath, derive_status: bool) -> Result<()> {
    let unit = reparse(doc)?;
    let task = find_task(&unit, path)?;
    if task.subtasks.is_empty() {
        return Ok(());
    }

    if derive_status {
        let states: Vec<SubtaskState> = task.subtasks.iter().map(|s| s.state).collect();
        let status = derive_task_status(task.status, &states);
        if status != task.status || task.nodes.status.is_none() {
            let edit = field_edit(doc, task.nodes.status, task.nodes.heading, "Status", status.as_str());
            apply(doc, vec![edit])?;
        }
    }

    let unit = reparse(doc)?;
    let task = find_task(&unit, path)?;
    if let Some(derived) = task_completion(task) {
        if task.completion.percent() != Some(derived) {
            let anchor = task.nodes.status.unwrap_or(task.nodes.heading);
            let value = CompletionValue::Percent(derived).to_string();
            let edit = field_edit(doc, task.nodes.completion, anchor, "Completion", value);
            apply(doc, vec![edit])?;
        }
    }
    Ok(())
}

/// Recompute the unit aggregate when the unit has tasks.
fn refresh_unit(doc: &mut Document) -> Result<()> {
    let unit = reparse(doc)?;
    if unit.tasks.is_empty() {
        return Ok(());
    }
    let value = aggregate(unit.tasks.iter().map(effective_task_percent));
    if unit.completion.percent() != Some(value) {
        set_unit_completion(doc, &unit, value)?;
    }
    Ok(())
}

fn set_unit_completion(doc: &mut Document, unit: &WorkUnit, value: u8) -> Result<()> {
    let anchor = unit.nodes.status.unwrap_or(unit.nodes.id);
    let value = CompletionValue::Percent(value).to_string();
    let edit = field_edit(doc, unit.nodes.completion, anchor, "Completion", value);
    apply(doc, vec![edit])
}

/// Refresh `Last Updated` and add a changelog entry, newest first.
fn stamp(doc: &mut Document, ctx: &MutationContext, summary: &str) -> Result<()> {
    let unit = reparse(doc)?;
    if let Some(index) = unit.nodes.last_updated {
        let date = ctx.now.format(LAST_UPDATED_FORMAT).to_string();
        apply(doc, vec![Edit::SetField { index, value: date }])?;
    }

    let entry = Node::field("", ctx.now.format(CHANGELOG_FORMAT).to_string(), summary);
    match unit.nodes.changelog {
        Some(heading) => {
            let after_blank = doc.node(heading + 1).is_some_and(is_blank);
            let index = if after_blank { heading + 1 } else { heading };
            apply(doc, vec![Edit::InsertAfter { index, node: entry }])?;
        }
        None => {
            let ends_blank = doc.nodes().last().is_none_or(is_blank);
            if !ends_blank {
                doc.push(Node::blank());
            }
            doc.push(Node::heading(2, "Changelog"));
            doc.push(Node::blank());
            doc.push(entry);
        }
    }
    Ok(())
}

// ============================================================================
// Mutations
// ============================================================================

fn set_status(doc: &mut Document, status: Status) -> Result<()> {
    let unit = reparse(doc)?;
    let index = unit_status_index(&unit)?;
    apply(
        doc,
        vec![Edit::SetField {
            index,
            value: status.to_string(),
        }],
    )?;
    // A unit without tasks has nothing to derive from, so completing it
    // means the stored completion becomes 100.
    if status.is_completed() && unit.tasks.is_empty() && unit.completion.percent() != Some(100) {
        let unit = reparse(doc)?;
        set_unit_completion(doc, &unit, 100)?;
    }
    Ok(())
}

fn set_completion(doc: &mut Document, value: u8) -> Result<()> {
    if value > 100 {
        return Err(WorktrackError::InvalidPercentage {
            value: format!("{}%", value),
        });
    }
    let unit = reparse(doc)?;
    set_unit_completion(doc, &unit, value)
}

fn set_task_completion(doc: &mut Document, path: &TaskPath, value: CompletionValue) -> Result<()> {
    let unit = reparse(doc)?;
    let task = find_task(&unit, path)?;
    let anchor = task.nodes.status.unwrap_or(task.nodes.heading);
    let edit = field_edit(doc, task.nodes.completion, anchor, "Completion", value.to_string());
    apply(doc, vec![edit])?;
    refresh_unit(doc)
}

fn set_task_status(doc: &mut Document, path: &TaskPath, status: Status) -> Result<()> {
    let unit = reparse(doc)?;
    let task = find_task(&unit, path)?;

    let mut edits = vec![field_edit(doc, task.nodes.status, task.nodes.heading, "Status", status.as_str())];
    let cascade = match status {
        Status::Completed => Some(SubtaskState::Completed),
        Status::NotStarted => Some(SubtaskState::NotStarted),
        _ => None,
    };
    if let Some(state) = cascade {
        edits.extend(
            task.subtasks
                .iter()
                .filter(|s| s.state != state)
                .map(|s| Edit::SetSubtask {
                    index: s.node,
                    state,
                }),
        );
    }
    apply(doc, edits)?;

    let unit = reparse(doc)?;
    let task = find_task(&unit, path)?;
    if task.subtasks.is_empty() {
        let implied = match status {
            Status::Completed => Some(CompletionValue::Percent(100)),
            Status::NotStarted => Some(CompletionValue::Percent(0)),
            _ => None,
        };
        if let Some(value) = implied {
            if task.completion.percent() != Some(value.percent()) {
                let anchor = task.nodes.status.unwrap_or(task.nodes.heading);
                let edit = field_edit(doc, task.nodes.completion, anchor, "Completion", value.to_string());
                apply(doc, vec![edit])?;
            }
        }
    } else {
        refresh_task(doc, path, false)?;
    }
    refresh_unit(doc)
}

fn set_subtask_state(
    doc: &mut Document,
    path: &TaskPath,
    caption: &str,
    state: SubtaskState,
) -> Result<()> {
    let unit = reparse(doc)?;
    let task = find_task(&unit, path)?;
    let subtask = task.subtask(caption).ok_or_else(|| {
        WorktrackError::not_found(LookupKind::Subtask, format!("{} in task {}", caption, path))
    })?;

    apply(
        doc,
        vec![Edit::SetSubtask {
            index: subtask.node,
            state,
        }],
    )?;
    refresh_task(doc, path, true)?;
    refresh_unit(doc)
}

fn add_task(doc: &mut Document, title: &str, subtasks: &[String]) -> Result<TaskPath> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorktrackError::invalid_value("Task title", title));
    }

    let unit = reparse(doc)?;
    let path = unit
        .tasks
        .last()
        .map(|t| t.path.next_sibling())
        .unwrap_or_else(TaskPath::first);

    let mut nodes = vec![
        Node::heading(3, format!("{} {}", path, title)),
        Node::field("", "Status", Status::NotStarted.as_str()),
        Node::field("", "Completion", CompletionValue::Percent(0).to_string()),
    ];
    if !subtasks.is_empty() {
        nodes.push(Node::field("", "Implementation Details", ""));
        nodes.extend(subtasks.iter().map(|caption| {
            Node::text(format!(
                "  - {} {}",
                SubtaskState::NotStarted.marker(),
                caption.trim()
            ))
        }));
    }

    // After the last task, else at the end of a Requirements or Tasks
    // section, else in a new Requirements section before the changelog.
    let section = ["Requirements", "Tasks"]
        .iter()
        .find_map(|name| doc.find_heading(2, name));
    let (mut at, needs_heading) = match (unit.tasks.last(), section) {
        (Some(last), _) => (last.nodes.end, false),
        (None, Some(heading)) => (doc.section_end(heading), false),
        (None, None) => (unit.nodes.changelog.unwrap_or(doc.len()), true),
    };
    while at > 0 && doc.node(at - 1).is_some_and(is_blank) {
        at -= 1;
    }

    let mut block = vec![Node::blank()];
    if needs_heading {
        block.push(Node::heading(2, "Requirements"));
        block.push(Node::blank());
    }
    block.extend(nodes);
    if doc.node(at).is_some_and(|n| !is_blank(n)) {
        block.push(Node::blank());
    }
    for (offset, node) in block.into_iter().enumerate() {
        doc.insert(at + offset, node);
    }

    refresh_unit(doc)?;
    Ok(path)
}

fn complete(doc: &mut Document) -> Result<()> {
    let unit = reparse(doc)?;
    let status_index = unit_status_index(&unit)?;

    let mut edits = vec![Edit::SetField {
        index: status_index,
        value: Status::Completed.to_string(),
    }];
    for task in &unit.tasks {
        edits.push(field_edit(doc, task.nodes.status, task.nodes.heading, "Status", Status::Completed.as_str()));
        edits.push(field_edit(
            doc,
            task.nodes.completion,
            task.nodes.status.unwrap_or(task.nodes.heading),
            "Completion",
            CompletionValue::Percent(100).to_string(),
        ));
        edits.extend(
            task.subtasks
                .iter()
                .filter(|s| s.state != SubtaskState::Completed)
                .map(|s| Edit::SetSubtask {
                    index: s.node,
                    state: SubtaskState::Completed,
                }),
        );
    }
    apply(doc, edits)?;

    let unit = reparse(doc)?;
    set_unit_completion(doc, &unit, 100)
}

fn recalculate(doc: &mut Document) -> Result<()> {
    let unit = reparse(doc)?;
    let paths: Vec<TaskPath> = unit.tasks.iter().map(|t| t.path.clone()).collect();
    for path in &paths {
        refresh_task(doc, path, false)?;
    }
    refresh_unit(doc)
}

/// Apply one mutation to a document.
///
/// The input document is not modified. Returns the new document with a
/// changelog entry describing the change.
pub fn apply_mutation(
    doc: &Document,
    mutation: &Mutation,
    ctx: &MutationContext,
) -> Result<MutationOutcome> {
    let before = reparse(doc)?;
    let mut next = doc.clone();

    let mut summary = mutation.to_string();
    match mutation {
        Mutation::SetStatus(status) => set_status(&mut next, *status)?,
        Mutation::SetCompletion(value) => set_completion(&mut next, *value)?,
        Mutation::SetTaskCompletion { path, value } => set_task_completion(&mut next, path, *value)?,
        Mutation::SetTaskStatus { path, status } => set_task_status(&mut next, path, *status)?,
        Mutation::SetSubtaskState {
            path,
            caption,
            state,
        } => set_subtask_state(&mut next, path, caption, *state)?,
        Mutation::AddTask { title, subtasks } => {
            let path = add_task(&mut next, title, subtasks)?;
            summary = format!("Task {} added: {}", path, title.trim());
        }
        Mutation::Complete => complete(&mut next)?,
        Mutation::Recalculate => recalculate(&mut next)?,
    }

    if let Some(message) = &ctx.message {
        summary = format!("{} - {}", summary, message.trim());
    }
    stamp(&mut next, ctx, &summary)?;

    let after = reparse(&next)?;
    debug!("{}: {}", after.id, summary);

    Ok(MutationOutcome {
        document: next,
        summary,
        previous_status: before.status,
        status: after.status,
        previous_completion: before.stored_percent(),
        completion: after.stored_percent(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_document;
    use chrono::NaiveDate;

    fn ctx() -> MutationContext {
        let now = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        MutationContext::new(now)
    }

    fn mutate(text: &str, mutation: Mutation) -> MutationOutcome {
        apply_mutation(&Document::parse(text), &mutation, &ctx()).unwrap()
    }

    fn unit(outcome: &MutationOutcome) -> WorkUnit {
        parse_document(&outcome.document, ParseMode::Strict).unwrap()
    }

    const RECORD: &str = "# Work Unit: Sample\n\n## Metadata\n- **ID**: WU-010\n- **Status**: In Progress\n- **Completion**: 25%\n- **Last Updated**: 2026-01-01\n\n## Requirements\n\n### 1.1 Cache\n- **Status**: In Progress\n- **Completion**: 50%\n- **Implementation Details**:\n  - [✓] Read path - [US-1](s.md)\n  - Write path - Will implement [US-2](s.md)\n\n### 1.2 Docs\n- **Status**: Not Started\n- **Completion**: 0%\n\n## Notes\nKeep this line exactly.\n\n## Changelog\n\n- **2026-01-01 08:00**: Created\n";

    #[test]
    fn test_subtask_state_cascades_up() {
        let out = mutate(
            RECORD,
            Mutation::SetSubtaskState {
                path: "1.1".parse().unwrap(),
                caption: "write path".to_string(),
                state: SubtaskState::Completed,
            },
        );
        let unit = unit(&out);
        assert_eq!(unit.tasks[0].status, Status::Completed);
        assert_eq!(unit.tasks[0].completion.percent(), Some(100));
        assert_eq!(unit.completion.percent(), Some(50));
        assert_eq!(unit.status, Status::InProgress);
        assert_eq!(out.previous_completion, 25);
        assert_eq!(out.completion, 50);

        let text = out.document.render();
        assert!(text.contains("  - [✓] Write path - [US-2](s.md)\n"));
        assert!(text.contains("  - [✓] Read path - [US-1](s.md)\n"));
        assert!(text.contains("## Notes\nKeep this line exactly.\n"));
    }

    #[test]
    fn test_changelog_and_last_updated() {
        let out = mutate(RECORD, Mutation::SetStatus(Status::Blocked));
        let text = out.document.render();
        assert!(text.contains("- **Last Updated**: 2026-03-01\n"));
        assert!(text.contains(
            "## Changelog\n\n- **2026-03-01 09:30**: Status changed to Blocked\n- **2026-01-01 08:00**: Created\n"
        ));
        assert_eq!(unit(&out).changelog.len(), 2);
    }

    #[test]
    fn test_changelog_created_when_missing() {
        let text = "- **ID**: WU-011\n- **Status**: Proposed\n- **Completion**: 0%\n";
        let out = apply_mutation(
            &Document::parse(text),
            &Mutation::SetCompletion(30),
            &ctx().with_message("first pass"),
        )
        .unwrap();
        assert_eq!(
            out.document.render(),
            "- **ID**: WU-011\n- **Status**: Proposed\n- **Completion**: 30%\n\n## Changelog\n\n- **2026-03-01 09:30**: Completion set to 30% - first pass\n"
        );
    }

    #[test]
    fn test_untargeted_content_is_untouched() {
        let out = mutate(RECORD, Mutation::SetStatus(Status::Blocked));
        let before: Vec<&str> = RECORD.lines().collect();
        let after = out.document.render();
        let after: Vec<&str> = after.lines().collect();
        // Status, Last Updated, and one new changelog line differ
        assert_eq!(after.len(), before.len() + 1);
        let changed = before.iter().zip(after.iter()).filter(|(a, b)| a != b).count();
        assert!(changed >= 2);
        assert_eq!(after[4], "- **Status**: Blocked");
        assert_eq!(after[6], "- **Last Updated**: 2026-03-01");
        assert_eq!(&after[..4], &before[..4]);
    }

    #[test]
    fn test_task_status_completed_cascades_down() {
        let out = mutate(
            RECORD,
            Mutation::SetTaskStatus {
                path: "1.1".parse().unwrap(),
                status: Status::Completed,
            },
        );
        let unit = unit(&out);
        assert!(unit.tasks[0]
            .subtasks
            .iter()
            .all(|s| s.state == SubtaskState::Completed));
        assert_eq!(unit.tasks[0].completion.percent(), Some(100));
        assert_eq!(unit.completion.percent(), Some(50));
    }

    #[test]
    fn test_task_status_on_requirement_without_subtasks() {
        let out = mutate(
            RECORD,
            Mutation::SetTaskStatus {
                path: "1.2".parse().unwrap(),
                status: Status::Completed,
            },
        );
        let unit = unit(&out);
        assert_eq!(unit.tasks[1].completion.percent(), Some(100));
        assert_eq!(unit.completion.percent(), Some(75));
    }

    #[test]
    fn test_task_completion_override() {
        let out = mutate(
            RECORD,
            Mutation::SetTaskCompletion {
                path: "1.2".parse().unwrap(),
                value: CompletionValue::Completed,
            },
        );
        assert!(out
            .document
            .render()
            .contains("### 1.2 Docs\n- **Status**: Not Started\n- **Completion**: Completed\n"));
        assert_eq!(unit(&out).completion.percent(), Some(75));
    }

    #[test]
    fn test_complete_cascades_everything() {
        let out = mutate(RECORD, Mutation::Complete);
        let unit = unit(&out);
        assert_eq!(unit.status, Status::Completed);
        assert_eq!(unit.completion.percent(), Some(100));
        for task in &unit.tasks {
            assert_eq!(task.status, Status::Completed);
            assert_eq!(task.completion.percent(), Some(100));
        }
        let check = validate_document(&out.document, false, None).unwrap();
        assert!(check.issues.is_empty());
    }

    #[test]
    fn test_unknown_task_and_subtask() {
        let doc = Document::parse(RECORD);
        let err = apply_mutation(
            &doc,
            &Mutation::SetTaskStatus {
                path: "9.9".parse().unwrap(),
                status: Status::Completed,
            },
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, WorktrackError::NotFound { kind: LookupKind::Task, .. }));

        let err = apply_mutation(
            &doc,
            &Mutation::SetSubtaskState {
                path: "1.1".parse().unwrap(),
                caption: "Nope".to_string(),
                state: SubtaskState::Completed,
            },
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, WorktrackError::NotFound { kind: LookupKind::Subtask, .. }));
    }

    #[test]
    fn test_missing_status_field_is_malformed() {
        let doc = Document::parse("- **ID**: WU-012\n");
        let err = apply_mutation(&doc, &Mutation::SetStatus(Status::Blocked), &ctx()).unwrap_err();
        assert!(matches!(err, WorktrackError::MalformedDocument { .. }));
    }

    #[test]
    fn test_set_completion_out_of_range() {
        let doc = Document::parse(RECORD);
        let err = apply_mutation(&doc, &Mutation::SetCompletion(140), &ctx()).unwrap_err();
        assert!(matches!(err, WorktrackError::InvalidPercentage { .. }));
    }

    #[test]
    fn test_add_task_then_progress() {
        let text = "# Work Unit: Add caching layer\n\n## Metadata\n- **ID**: WU-020\n- **Status**: Proposed\n- **Completion**: 0%\n\n## Requirements\n\n## Changelog\n\n- **2026-02-01 10:00**: Created\n";
        let added = mutate(
            text,
            Mutation::AddTask {
                title: "Cache reads".to_string(),
                subtasks: vec!["Read path".to_string(), "Eviction".to_string()],
            },
        );
        assert_eq!(added.summary, "Task 1.1 added: Cache reads");
        let rendered = added.document.render();
        assert!(rendered.contains(
            "## Requirements\n\n### 1.1 Cache reads\n- **Status**: Not Started\n- **Completion**: 0%\n- **Implementation Details**:\n  - [ ] Read path\n  - [ ] Eviction\n\n## Changelog\n"
        ));

        let progressed = apply_mutation(
            &added.document,
            &Mutation::SetSubtaskState {
                path: TaskPath::first(),
                caption: "Read path".to_string(),
                state: SubtaskState::Completed,
            },
            &ctx(),
        )
        .unwrap();
        let unit = unit(&progressed);
        assert_eq!(unit.tasks[0].completion.percent(), Some(50));
        assert_eq!(unit.completion.percent(), Some(50));
        assert_eq!(unit.status, Status::Proposed);
    }

    #[test]
    fn test_add_second_task_numbering() {
        let out = mutate(
            RECORD,
            Mutation::AddTask {
                title: "Metrics".to_string(),
                subtasks: Vec::new(),
            },
        );
        let unit = unit(&out);
        assert_eq!(unit.tasks.len(), 3);
        assert_eq!(unit.tasks[2].path.to_string(), "1.3");
        assert!(out
            .document
            .render()
            .contains("- **Completion**: 0%\n\n### 1.3 Metrics\n- **Status**: Not Started\n- **Completion**: 0%\n\n## Notes\n"));
        // (50 + 0 + 0) / 3
        assert_eq!(unit.completion.percent(), Some(16));
    }

    #[test]
    fn test_recalculate_repairs_stale_values() {
        let stale = RECORD.replace("- **Completion**: 50%\n- **Implementation", "- **Completion**: 5%\n- **Implementation");
        let out = mutate(&stale, Mutation::Recalculate);
        let unit = unit(&out);
        assert_eq!(unit.tasks[0].completion.percent(), Some(50));
        assert_eq!(unit.completion.percent(), Some(25));
    }
}
