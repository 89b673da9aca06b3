//! Custom assertions for work unit consistency.

use crate::completion::{task_completion, unit_completion};
use crate::validation::{Issue, IssueKind};
use crate::work_unit::WorkUnit;

/// Assert that a unit obeys the rules a repaired unit obeys: stored
/// completions equal derived ones, and the unit is at 100% exactly when it
/// is Completed.
///
/// # Panics
///
/// Panics naming the first rule the unit breaks.
pub fn assert_consistent(unit: &WorkUnit) {
    for task in &unit.tasks {
        if let Some(derived) = task_completion(task) {
            assert_eq!(
                task.completion.percent(),
                Some(derived),
                "{} task {} stores {} but derives {}%",
                unit.id,
                task.path,
                task.completion,
                derived
            );
        }
    }

    if let Some(derived) = unit_completion(unit) {
        assert_eq!(
            unit.completion.percent(),
            Some(derived),
            "{} stores {} but derives {}%",
            unit.id,
            unit.completion,
            derived
        );
    }

    assert_eq!(
        unit.stored_percent() == 100,
        unit.status.is_completed(),
        "{} stores {} with status {}",
        unit.id,
        unit.completion,
        unit.status
    );
}

/// Assert that issues have exactly the given kinds, in order.
///
/// # Panics
///
/// Panics listing the issues when the kinds differ.
pub fn assert_issue_kinds(issues: &[Issue], expected: &[IssueKind]) {
    let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds, expected,
        "Unexpected issues:\n{}",
        issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}
