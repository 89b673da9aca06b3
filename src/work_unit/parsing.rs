//! Record parsing.
//!
//! Builds a [`WorkUnit`] from a [`Document`]. Field lookups are
//! case-insensitive on the field name; the first occurrence of a top-level
//! field wins. A field is top-level when it sits outside every task section
//! and outside the changelog.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use super::{
    Category, ChangelogEntry, CompletionValue, Document, Node, NodeKind, Status, StoredCompletion,
    Subtask, Task, TaskNodes, TaskPath, UnitNodes, WorkUnit, WorkUnitId,
};
use crate::error::{Result, WorktrackError};

pub(crate) const CHANGELOG_HEADING: &str = "Changelog";
pub(crate) const DETAILS_FIELD: &str = "Implementation Details";

fn task_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)+)\.?\s+(.*?)\s*$").expect("valid task regex"))
}

fn dependency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9]*-\d+").expect("valid dependency regex"))
}

/// How to treat completion values that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Fail with `InvalidPercentage`
    Strict,
    /// Keep the raw text as [`StoredCompletion::Invalid`]
    Lenient,
}

/// Parse a work unit, rejecting unparsable completion values.
pub fn parse_record(text: &str) -> Result<WorkUnit> {
    parse_document(&Document::parse(text), ParseMode::Strict)
}

/// Parse a work unit, keeping unparsable completion values for the
/// validator to report and repair.
pub fn parse_record_lenient(text: &str) -> Result<WorkUnit> {
    parse_document(&Document::parse(text), ParseMode::Lenient)
}

// ============================================================================
// Sections
// ============================================================================

/// Path and title of a task heading node.
pub(crate) fn task_heading(node: &Node) -> Option<(TaskPath, String)> {
    let (level, text) = node.as_heading()?;
    if !(3..=4).contains(&level) {
        return None;
    }
    let caps = task_heading_re().captures(text)?;
    let path = caps[1].parse().ok()?;
    Some((path, caps[2].to_string()))
}

/// Range of the task section opened at `start`: it runs until the next
/// heading of the same or a higher level, or the next task heading.
fn task_section_end(doc: &Document, start: usize, level: usize) -> usize {
    doc.nodes()
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, node)| {
            node.as_heading().is_some_and(|(l, _)| l <= level) || task_heading(node).is_some()
        })
        .map(|(i, _)| i)
        .unwrap_or(doc.len())
}

pub(crate) fn task_ranges(doc: &Document) -> Vec<(usize, Range<usize>)> {
    doc.nodes()
        .iter()
        .enumerate()
        .filter_map(|(i, node)| {
            task_heading(node)?;
            let (level, _) = node.as_heading()?;
            Some((i, i..task_section_end(doc, i, level)))
        })
        .collect()
}

fn section_range(doc: &Document, heading: &str) -> Option<Range<usize>> {
    let start = doc.find_heading(2, heading)?;
    Some(start..doc.section_end(start))
}

fn excluded(ranges: &[Range<usize>], index: usize) -> bool {
    ranges.iter().any(|r| r.contains(&index))
}

/// Index of the first top-level field with the given name.
pub(crate) fn top_level_field(doc: &Document, name: &str) -> Option<usize> {
    let skip = skipped_ranges(doc);
    doc.nodes()
        .iter()
        .enumerate()
        .find(|(i, node)| node.is_field(name) && !excluded(&skip, *i))
        .map(|(i, _)| i)
}

fn skipped_ranges(doc: &Document) -> Vec<Range<usize>> {
    let mut skip: Vec<Range<usize>> = task_ranges(doc).into_iter().map(|(_, r)| r).collect();
    if let Some(range) = section_range(doc, CHANGELOG_HEADING) {
        skip.push(range);
    }
    skip
}

fn field_value(doc: &Document, index: Option<usize>) -> Option<String> {
    let (_, value) = doc.node(index?)?.as_field()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Plain bullet items of a `## Heading` section.
fn section_bullets(doc: &Document, heading: &str) -> Vec<String> {
    let Some(range) = section_range(doc, heading) else {
        return Vec::new();
    };
    doc.nodes()[range]
        .iter()
        .filter(|node| matches!(node.kind(), NodeKind::Text))
        .filter_map(|node| {
            let item = node.raw().trim().strip_prefix("- ")?.trim();
            (!item.is_empty()).then(|| item.to_string())
        })
        .collect()
}

/// First paragraph of a `## Heading` section.
fn section_paragraph(doc: &Document, heading: &str) -> Option<String> {
    let range = section_range(doc, heading)?;
    let lines: Vec<&str> = doc.nodes()[range]
        .iter()
        .skip(1)
        .skip_while(|node| matches!(node.kind(), NodeKind::Blank))
        .take_while(|node| matches!(node.kind(), NodeKind::Text))
        .map(|node| node.raw().trim())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

// ============================================================================
// Values
// ============================================================================

fn parse_completion(
    raw: Option<String>,
    allow_words: bool,
    mode: ParseMode,
) -> Result<StoredCompletion> {
    let Some(raw) = raw else {
        return Ok(StoredCompletion::Missing);
    };
    match CompletionValue::parse(&raw, allow_words) {
        Ok(value) => Ok(StoredCompletion::Value(value)),
        Err(err) => match mode {
            ParseMode::Strict => Err(err),
            ParseMode::Lenient => Ok(StoredCompletion::Invalid(raw)),
        },
    }
}

fn parse_dependencies(raw: Option<String>) -> Vec<WorkUnitId> {
    raw.map(|value| {
        dependency_re()
            .find_iter(&value)
            .map(|m| WorkUnitId::new(m.as_str()))
            .collect()
    })
    .unwrap_or_default()
}

fn parse_title(doc: &Document) -> Option<String> {
    let (_, text) = doc
        .nodes()
        .iter()
        .filter_map(Node::as_heading)
        .find(|(level, _)| *level == 1)?;
    let title = text
        .strip_prefix("Work Unit:")
        .map(str::trim)
        .unwrap_or(text.trim());
    Some(title.to_string())
}

// ============================================================================
// Tasks
// ============================================================================

fn parse_task(doc: &Document, heading: usize, range: Range<usize>, mode: ParseMode) -> Result<Task> {
    let (path, title) = doc
        .node(heading)
        .and_then(task_heading)
        .ok_or_else(|| WorktrackError::malformed(format!("no task heading at line {}", heading + 1)))?;

    let find = |name: &str| range.clone().find(|&i| doc.nodes()[i].is_field(name));
    let status_idx = find("Status");
    let completion_idx = find("Completion");
    let details_idx = find(DETAILS_FIELD);

    let status = match field_value(doc, status_idx) {
        Some(raw) => raw.parse::<Status>()?,
        None => Status::NotStarted,
    };
    let completion = parse_completion(field_value(doc, completion_idx), true, mode)?;

    let subtask_start = details_idx.map(|i| i + 1).unwrap_or(range.start + 1);
    let subtasks = (subtask_start..range.end)
        .filter_map(|i| {
            let line = doc.nodes()[i].as_subtask()?;
            Some(Subtask {
                caption: line.caption.clone(),
                state: line.state,
                reference: line.reference.clone(),
                node: i,
            })
        })
        .collect();

    Ok(Task {
        path,
        title,
        status,
        completion,
        subtasks,
        nodes: TaskNodes {
            heading,
            end: range.end,
            status: status_idx,
            completion: completion_idx,
            details: details_idx,
        },
    })
}

// ============================================================================
// Work Unit
// ============================================================================

/// Build the typed view of a parsed document.
pub fn parse_document(doc: &Document, mode: ParseMode) -> Result<WorkUnit> {
    let id_idx = top_level_field(doc, "ID");
    let id = field_value(doc, id_idx)
        .map(WorkUnitId::new)
        .ok_or(WorktrackError::MissingIdentifier { path: None })?;
    let id_idx = id_idx.unwrap_or_default();

    let status_idx = top_level_field(doc, "Status");
    let status = match field_value(doc, status_idx) {
        Some(raw) => raw.parse::<Status>()?,
        None => Status::default(),
    };

    let completion_idx = top_level_field(doc, "Completion");
    let completion = parse_completion(field_value(doc, completion_idx), false, mode)?;

    let category = field_value(doc, top_level_field(doc, "Type"))
        .and_then(|raw| raw.parse::<Category>().ok());

    let description = field_value(doc, top_level_field(doc, "Description"))
        .or_else(|| section_paragraph(doc, "Description"))
        .unwrap_or_default();

    let last_updated_idx = top_level_field(doc, "Last Updated");

    let tasks = task_ranges(doc)
        .into_iter()
        .map(|(heading, range)| parse_task(doc, heading, range, mode))
        .collect::<Result<Vec<_>>>()?;

    let changelog_idx = doc.find_heading(2, CHANGELOG_HEADING);
    let changelog = section_range(doc, CHANGELOG_HEADING)
        .map(|range| {
            doc.nodes()[range]
                .iter()
                .filter_map(Node::as_field)
                .map(|(timestamp, text)| ChangelogEntry {
                    timestamp: timestamp.to_string(),
                    text: text.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(WorkUnit {
        title: parse_title(doc).unwrap_or_else(|| id.to_string()),
        id,
        category,
        status,
        completion,
        description,
        relationship: field_value(doc, top_level_field(doc, "Relationship Type")),
        dependencies: parse_dependencies(field_value(doc, top_level_field(doc, "Dependencies"))),
        last_updated: field_value(doc, last_updated_idx),
        created: field_value(doc, top_level_field(doc, "Created")),
        tasks,
        changelog,
        related_components: section_bullets(doc, "Related Components"),
        objectives: section_bullets(doc, "Objectives"),
        nodes: UnitNodes {
            id: id_idx,
            status: status_idx,
            completion: completion_idx,
            last_updated: last_updated_idx,
            changelog: changelog_idx,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::SubtaskState;

    const RECORD: &str = r"# Work Unit: Add caching layer

## Metadata
- **ID**: WU-007
- **Type**: Feature
- **Status**: In Progress
- **Completion**: 50%
- **Created**: 2026-01-10
- **Last Updated**: 2026-01-12
- **Relationship Type**: Related to WU-003
- **Dependencies**: WU-001, WU-002

## Description
Cache expensive lookups
in memory.

## Objectives
- Faster reads
- Fewer round trips

## Requirements

### 1.1 Read cache
- **Status**: In Progress
- **Completion**: 50%
- **Implementation Details**:
  - [✓] Read path - [US-1](stories.md#us-1)
  - [ ] Invalidation - [US-2](stories.md#us-2)

### 1.2 Docs
- **Status**: Not Started
- **Completion**: Not Completed

## Related Components
- src/cache.rs
- src/store.rs

## Changelog
- **2026-01-12 10:00**: Read path done
- **2026-01-10 09:00**: Created
";

    #[test]
    fn test_parse_full_record() {
        let unit = parse_record(RECORD).unwrap();
        assert_eq!(unit.id.as_str(), "WU-007");
        assert_eq!(unit.title, "Add caching layer");
        assert_eq!(unit.category, Some(Category::Feature));
        assert_eq!(unit.status, Status::InProgress);
        assert_eq!(unit.completion.percent(), Some(50));
        assert_eq!(unit.description, "Cache expensive lookups in memory.");
        assert_eq!(unit.related_to(), Some(WorkUnitId::new("WU-003")));
        assert_eq!(
            unit.dependencies,
            vec![WorkUnitId::new("WU-001"), WorkUnitId::new("WU-002")]
        );
        assert_eq!(unit.touched_on(), Some("2026-01-12"));
        assert_eq!(unit.objectives, vec!["Faster reads", "Fewer round trips"]);
        assert_eq!(unit.related_components, vec!["src/cache.rs", "src/store.rs"]);
        assert_eq!(unit.changelog.len(), 2);
        assert_eq!(unit.changelog[0].timestamp, "2026-01-12 10:00");
    }

    #[test]
    fn test_parse_tasks_and_subtasks() {
        let unit = parse_record(RECORD).unwrap();
        assert_eq!(unit.tasks.len(), 2);

        let task = &unit.tasks[0];
        assert_eq!(task.path.to_string(), "1.1");
        assert_eq!(task.title, "Read cache");
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.subtasks.len(), 2);
        assert_eq!(task.subtasks[0].state, SubtaskState::Completed);
        assert_eq!(task.subtask("invalidation").unwrap().state, SubtaskState::NotStarted);

        let docs = &unit.tasks[1];
        assert_eq!(docs.status, Status::NotStarted);
        assert_eq!(
            docs.completion,
            StoredCompletion::Value(CompletionValue::NotCompleted)
        );
        assert!(docs.subtasks.is_empty());
    }

    #[test]
    fn test_task_fields_do_not_leak_to_unit() {
        let text = "# Work Unit: X\n- **ID**: WU-001\n\n### 1.1 Task\n- **Status**: Completed\n- **Completion**: 100%\n";
        let unit = parse_record(text).unwrap();
        assert_eq!(unit.status, Status::Proposed);
        assert!(unit.completion.is_missing());
        assert_eq!(unit.tasks[0].status, Status::Completed);
    }

    #[test]
    fn test_missing_identifier() {
        let err = parse_record("# Work Unit: X\n- **Status**: Proposed\n").unwrap_err();
        assert!(matches!(err, WorktrackError::MissingIdentifier { .. }));
    }

    #[test]
    fn test_invalid_completion_strict_and_lenient() {
        let text = "- **ID**: WU-001\n- **Completion**: abc\n";
        let err = parse_record(text).unwrap_err();
        assert!(matches!(err, WorktrackError::InvalidPercentage { .. }));

        let unit = parse_record_lenient(text).unwrap();
        assert_eq!(unit.completion, StoredCompletion::Invalid("abc".to_string()));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = parse_record("- **ID**: WU-001\n- **Status**: Sort of\n").unwrap_err();
        assert!(matches!(err, WorktrackError::InvalidValue { .. }));
    }

    #[test]
    fn test_verb_notation_subtasks_without_details_field() {
        let text = "- **ID**: WU-002\n\n#### 2.1 Verb task\n- Parse input - Implements [US-4](s.md)\n- Emit output\n  Implementing [US-5](s.md)\n";
        let unit = parse_record(text).unwrap();
        let task = &unit.tasks[0];
        assert_eq!(task.subtasks.len(), 2);
        assert_eq!(task.subtasks[0].state, SubtaskState::Completed);
        assert_eq!(task.subtasks[1].caption, "Emit output");
        assert_eq!(task.subtasks[1].state, SubtaskState::InProgress);
    }

    #[test]
    fn test_parse_render_parse_is_stable() {
        let first = parse_record(RECORD).unwrap();
        let rendered = Document::parse(RECORD).render();
        let second = parse_record(&rendered).unwrap();
        assert_eq!(first, second);
    }
}
