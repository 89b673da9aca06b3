//! Completion calculator.
//!
//! Completion percentages are derived bottom-up:
//!
//! ```text
//! subtask states ──derive_percent──> task % ──apply_policy──> task %
//! task %s        ──aggregate──────> work unit %
//! ```
//!
//! Task-level values round to the nearest integer with halves rounding up.
//! The unit-level aggregate is the truncated mean of task values.

use crate::work_unit::{Status, SubtaskState, Task, WorkUnit};

/// Weight of an in-progress child, in percent.
pub const IN_PROGRESS_WEIGHT: u32 = 50;

/// Minimum completion of an in-progress task that has children but no
/// measurable progress.
pub const IN_PROGRESS_FLOOR: u8 = 10;

/// Derive a percentage from child states.
///
/// `round_half_up((completed * 100 + in_progress * 50) / total)`, or 0 with
/// no children.
///
/// # Example
///
/// ```
/// use worktrack::completion::derive_percent;
/// use worktrack::work_unit::SubtaskState::*;
///
/// assert_eq!(derive_percent([Completed, Completed, NotStarted, InProgress]), 63);
/// ```
#[must_use]
pub fn derive_percent<I>(states: I) -> u8
where
    I: IntoIterator<Item = SubtaskState>,
{
    let (mut total, mut weighted) = (0u32, 0u32);
    for state in states {
        total += 1;
        weighted += match state {
            SubtaskState::Completed => 100,
            SubtaskState::InProgress => IN_PROGRESS_WEIGHT,
            SubtaskState::NotStarted => 0,
        };
    }
    if total == 0 {
        return 0;
    }
    ((2 * weighted + total) / (2 * total)) as u8
}

/// Apply status overrides to a formula result.
///
/// A `NotStarted` parent is always 0. An `InProgress` parent with at least
/// one child and a formula result of 0 is raised to [`IN_PROGRESS_FLOOR`].
#[must_use]
pub fn apply_policy(status: Status, formula: u8, child_count: usize) -> u8 {
    match status {
        Status::NotStarted => 0,
        Status::InProgress if formula == 0 && child_count > 0 => IN_PROGRESS_FLOOR,
        _ => formula,
    }
}

/// Truncated mean of child percentages, 0 with no children.
#[must_use]
pub fn aggregate<I>(values: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let (count, sum) = values
        .into_iter()
        .fold((0u32, 0u32), |(n, s), v| (n + 1, s + u32::from(v)));
    if count == 0 {
        0
    } else {
        (sum / count) as u8
    }
}

/// Completion derived from a task's subtasks, or `None` when it has none.
#[must_use]
pub fn task_completion(task: &Task) -> Option<u8> {
    if task.subtasks.is_empty() {
        return None;
    }
    let formula = derive_percent(task.subtasks.iter().map(|s| s.state));
    Some(apply_policy(task.status, formula, task.subtasks.len()))
}

/// Completion a task contributes to its unit.
///
/// Derived when the task has subtasks, else the stored value, else 100 for a
/// completed task and 0 otherwise.
#[must_use]
pub fn effective_task_percent(task: &Task) -> u8 {
    task_completion(task)
        .or_else(|| task.completion.percent())
        .unwrap_or(if task.status.is_completed() { 100 } else { 0 })
}

/// Completion derived from a unit's tasks, or `None` when it has none.
#[must_use]
pub fn unit_completion(unit: &WorkUnit) -> Option<u8> {
    if unit.tasks.is_empty() {
        return None;
    }
    Some(aggregate(unit.tasks.iter().map(effective_task_percent)))
}

/// Completion of a unit as the validator sees it: derived when it has
/// tasks, else the stored value.
#[must_use]
pub fn effective_unit_percent(unit: &WorkUnit) -> u8 {
    unit_completion(unit).unwrap_or_else(|| unit.stored_percent())
}

/// Status a task takes from its subtasks.
///
/// All completed gives `Completed`, any progress gives `InProgress`, none
/// gives `NotStarted`. A `Blocked` task stays blocked until every subtask
/// is done. Tasks without subtasks keep their status.
#[must_use]
pub fn derive_task_status(current: Status, states: &[SubtaskState]) -> Status {
    if states.is_empty() {
        return current;
    }
    if states.iter().all(|s| *s == SubtaskState::Completed) {
        return Status::Completed;
    }
    if current == Status::Blocked {
        return current;
    }
    if states.iter().any(|s| *s != SubtaskState::NotStarted) {
        Status::InProgress
    } else {
        Status::NotStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::parse_record;
    use crate::work_unit::SubtaskState::{Completed as C, InProgress as P, NotStarted as N};

    #[test]
    fn test_derive_percent_rounds_half_up() {
        assert_eq!(derive_percent([C, C, N, P]), 63);
        assert_eq!(derive_percent([C, N]), 50);
        assert_eq!(derive_percent([C, N, N]), 33);
        assert_eq!(derive_percent([C, C, N]), 67);
        assert_eq!(derive_percent([P, N, N, N, N, N, N, N]), 6);
    }

    #[test]
    fn test_derive_percent_bounds() {
        assert_eq!(derive_percent([]), 0);
        assert_eq!(derive_percent([C, C, C]), 100);
        assert_eq!(derive_percent([N, N]), 0);
    }

    #[test]
    fn test_policy_overrides() {
        assert_eq!(apply_policy(Status::NotStarted, 80, 3), 0);
        assert_eq!(apply_policy(Status::InProgress, 0, 2), IN_PROGRESS_FLOOR);
        assert_eq!(apply_policy(Status::InProgress, 0, 0), 0);
        assert_eq!(apply_policy(Status::InProgress, 40, 2), 40);
        assert_eq!(apply_policy(Status::Proposed, 50, 2), 50);
    }

    #[test]
    fn test_aggregate_truncates() {
        assert_eq!(aggregate([100, 50, 0]), 50);
        assert_eq!(aggregate([100, 33]), 66);
        assert_eq!(aggregate([67, 67, 66]), 66);
        assert_eq!(aggregate([]), 0);
    }

    #[test]
    fn test_derive_task_status() {
        assert_eq!(derive_task_status(Status::InProgress, &[C, C]), Status::Completed);
        assert_eq!(derive_task_status(Status::NotStarted, &[C, N]), Status::InProgress);
        assert_eq!(derive_task_status(Status::InProgress, &[N, N]), Status::NotStarted);
        assert_eq!(derive_task_status(Status::Blocked, &[C, N]), Status::Blocked);
        assert_eq!(derive_task_status(Status::Blocked, &[C, C]), Status::Completed);
        assert_eq!(derive_task_status(Status::Completed, &[]), Status::Completed);
    }

    #[test]
    fn test_unit_completion_from_tasks() {
        let text = "- **ID**: WU-001\n\n### 1.1 A\n- **Status**: In Progress\n- **Implementation Details**:\n  - [✓] one\n  - [ ] two\n\n### 1.2 B\n- **Status**: Completed\n\n### 1.3 C\n- **Status**: In Progress\n- **Completion**: Not Completed\n";
        let unit = parse_record(text).unwrap();
        assert_eq!(task_completion(&unit.tasks[0]), Some(50));
        assert_eq!(task_completion(&unit.tasks[1]), None);
        assert_eq!(effective_task_percent(&unit.tasks[1]), 100);
        assert_eq!(effective_task_percent(&unit.tasks[2]), 0);
        assert_eq!(unit_completion(&unit), Some(50));
    }

    #[test]
    fn test_unit_without_tasks_uses_stored() {
        let unit = parse_record("- **ID**: WU-001\n- **Completion**: 40%\n").unwrap();
        assert_eq!(unit_completion(&unit), None);
        assert_eq!(effective_unit_percent(&unit), 40);
    }
}
