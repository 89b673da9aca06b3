//! Status and state types for work units, tasks and subtasks.
//!
//! This module contains the enums every other component agrees on:
//! - [`Status`] - status of a work unit or a task
//! - [`SubtaskState`] - tri-state implementation state of a subtask
//! - [`Category`] - kind of work a unit describes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorktrackError;

// ============================================================================
// Status
// ============================================================================

/// Status of a work unit or task.
///
/// `NotStarted` and `Proposed` are both "not started" states. Tasks are
/// usually `NotStarted`, freshly created work units are `Proposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Task has not been started yet
    NotStarted,
    /// Work unit has been proposed but not started
    #[default]
    Proposed,
    /// Work is ongoing
    InProgress,
    /// Work is done
    Completed,
    /// Work cannot proceed
    Blocked,
}

impl Status {
    /// Every status, in display order.
    pub const ALL: [Status; 5] = [
        Status::NotStarted,
        Status::Proposed,
        Status::InProgress,
        Status::Completed,
        Status::Blocked,
    ];

    /// Check if this status means no work has happened yet.
    #[must_use]
    pub fn is_not_started(&self) -> bool {
        matches!(self, Status::NotStarted | Status::Proposed)
    }

    /// Check if this status is terminal.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Status::Completed)
    }

    /// The text written into documents for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::Proposed => "Proposed",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = WorktrackError;

    /// Parse a status value, ignoring case, surrounding whitespace and the
    /// separator between words (`In Progress`, `in-progress`, `in_progress`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "notstarted" | "todo" => Ok(Status::NotStarted),
            "proposed" => Ok(Status::Proposed),
            "inprogress" | "started" => Ok(Status::InProgress),
            "completed" | "complete" | "done" => Ok(Status::Completed),
            "blocked" => Ok(Status::Blocked),
            _ => Err(WorktrackError::invalid_value("Status", s.trim())),
        }
    }
}

// ============================================================================
// Subtask State
// ============================================================================

/// Implementation state of a subtask.
///
/// Documents encode this either with a bracket marker (`[ ]`, `[~]`, `[✓]`)
/// or with a verb phrase (`Will implement`, `Implementing`, `Implements`).
/// Both are read; the bracket marker is always written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubtaskState {
    /// Nothing done yet
    #[default]
    NotStarted,
    /// Partially done
    InProgress,
    /// Done
    Completed,
}

impl SubtaskState {
    /// Canonical bracket marker.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            SubtaskState::NotStarted => "[ ]",
            SubtaskState::InProgress => "[~]",
            SubtaskState::Completed => "[✓]",
        }
    }

    /// Verb phrase used by the secondary notation.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            SubtaskState::NotStarted => "Will implement",
            SubtaskState::InProgress => "Implementing",
            SubtaskState::Completed => "Implements",
        }
    }

    /// Map the character inside a bracket marker to a state.
    ///
    /// `x` and `X` are accepted as completed for compatibility with plain
    /// markdown checklists.
    #[must_use]
    pub fn from_marker_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(SubtaskState::NotStarted),
            '~' => Some(SubtaskState::InProgress),
            '✓' | 'x' | 'X' => Some(SubtaskState::Completed),
            _ => None,
        }
    }

    /// Map a verb phrase to a state.
    #[must_use]
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "Will implement" => Some(SubtaskState::NotStarted),
            "Implementing" => Some(SubtaskState::InProgress),
            "Implements" => Some(SubtaskState::Completed),
            _ => None,
        }
    }

    /// The status a whole task takes when it is set to this state.
    #[must_use]
    pub fn as_status(&self) -> Status {
        match self {
            SubtaskState::NotStarted => Status::NotStarted,
            SubtaskState::InProgress => Status::InProgress,
            SubtaskState::Completed => Status::Completed,
        }
    }
}

impl fmt::Display for SubtaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtaskState::NotStarted => write!(f, "Not Started"),
            SubtaskState::InProgress => write!(f, "In Progress"),
            SubtaskState::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for SubtaskState {
    type Err = WorktrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Status>() {
            Ok(Status::NotStarted | Status::Proposed) => Ok(SubtaskState::NotStarted),
            Ok(Status::InProgress) => Ok(SubtaskState::InProgress),
            Ok(Status::Completed) => Ok(SubtaskState::Completed),
            _ => Err(WorktrackError::invalid_value("Subtask state", s.trim())),
        }
    }
}

// ============================================================================
// Category
// ============================================================================

/// Kind of work a unit describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Enhancement,
    Feature,
    BugFix,
    Documentation,
}

impl Category {
    /// The text written into the `Type` field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Enhancement => "Enhancement",
            Category::Feature => "Feature",
            Category::BugFix => "Bug Fix",
            Category::Documentation => "Documentation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = WorktrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.contains("enhancement") {
            Ok(Category::Enhancement)
        } else if lower.contains("feature") {
            Ok(Category::Feature)
        } else if lower.contains("bug") {
            Ok(Category::BugFix)
        } else if lower.starts_with("doc") {
            Ok(Category::Documentation)
        } else {
            Err(WorktrackError::invalid_value("Type", s.trim()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_variants() {
        assert_eq!("In Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("in-progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!(" completed ".parse::<Status>().unwrap(), Status::Completed);
        assert_eq!("Not Started".parse::<Status>().unwrap(), Status::NotStarted);
        assert_eq!("Proposed".parse::<Status>().unwrap(), Status::Proposed);
        assert_eq!("BLOCKED".parse::<Status>().unwrap(), Status::Blocked);
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        let err = "Almost done".parse::<Status>().unwrap_err();
        assert!(matches!(err, WorktrackError::InvalidValue { .. }));
    }

    #[test]
    fn test_status_display_roundtrip() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn test_not_started_states() {
        assert!(Status::NotStarted.is_not_started());
        assert!(Status::Proposed.is_not_started());
        assert!(!Status::InProgress.is_not_started());
    }

    #[test]
    fn test_subtask_notations_agree() {
        for state in [
            SubtaskState::NotStarted,
            SubtaskState::InProgress,
            SubtaskState::Completed,
        ] {
            let marker_char = state.marker().chars().nth(1).unwrap();
            assert_eq!(SubtaskState::from_marker_char(marker_char), Some(state));
            assert_eq!(SubtaskState::from_verb(state.verb()), Some(state));
        }
        assert_eq!(
            SubtaskState::from_marker_char('x'),
            Some(SubtaskState::Completed)
        );
        assert_eq!(SubtaskState::from_marker_char('?'), None);
    }

    #[test]
    fn test_subtask_state_from_status_words() {
        assert_eq!(
            "completed".parse::<SubtaskState>().unwrap(),
            SubtaskState::Completed
        );
        assert!("blocked".parse::<SubtaskState>().is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Bug Fix".parse::<Category>().unwrap(), Category::BugFix);
        assert_eq!("bugfix".parse::<Category>().unwrap(), Category::BugFix);
        assert_eq!("doc".parse::<Category>().unwrap(), Category::Documentation);
        assert_eq!("Feature".parse::<Category>().unwrap(), Category::Feature);
        assert!("chore".parse::<Category>().is_err());
    }
}
