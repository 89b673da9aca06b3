//! Work unit records.
//!
//! A work unit is a markdown file describing one unit of engineering work.
//! This module provides the typed view over such a file:
//!
//! ```text
//! WorkUnit
//!   ├── id, title, category, status
//!   ├── completion: StoredCompletion
//!   ├── description, relationship, dependencies
//!   ├── tasks: Vec<Task>
//!   │     └── subtasks: Vec<Subtask>
//!   ├── changelog: Vec<ChangelogEntry>
//!   └── related_components: Vec<String>
//! ```
//!
//! The typed view is always derived from a [`Document`]. Mutations edit the
//! document and re-parse it, so the text stays the source of truth and
//! everything the typed view does not model survives untouched.

mod document;
mod id;
mod parsing;
mod state;

pub use document::{Document, Edit, Node, NodeKind, Notation, SubtaskLine};
pub use id::{next_identifier, TaskPath, WorkUnitId};
pub use parsing::{parse_document, parse_record, parse_record_lenient, ParseMode};
pub use state::{Category, Status, SubtaskState};

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Result, WorktrackError};

fn related_to_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)related\s+to\s+([A-Za-z0-9-]+)").expect("valid relationship regex")
    })
}

// ============================================================================
// Completion Values
// ============================================================================

/// A valid completion value as written in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionValue {
    /// `N%`
    Percent(u8),
    /// `Completed`, used on requirement-style tasks
    Completed,
    /// `Not Completed`, used on requirement-style tasks
    NotCompleted,
}

impl CompletionValue {
    /// Numeric percentage of the value.
    #[must_use]
    pub fn percent(&self) -> u8 {
        match self {
            CompletionValue::Percent(p) => *p,
            CompletionValue::Completed => 100,
            CompletionValue::NotCompleted => 0,
        }
    }

    /// Parse a completion value.
    ///
    /// `N%` is always accepted for `N` in `0..=100`. The words `Completed`
    /// and `Not Completed` are accepted only when `allow_words` is set,
    /// which is the case for tasks but not for whole work units.
    pub fn parse(raw: &str, allow_words: bool) -> Result<Self> {
        let trimmed = raw.trim();
        if allow_words {
            if trimmed.eq_ignore_ascii_case("completed") {
                return Ok(CompletionValue::Completed);
            }
            if trimmed.eq_ignore_ascii_case("not completed") {
                return Ok(CompletionValue::NotCompleted);
            }
        }

        let invalid = || WorktrackError::InvalidPercentage {
            value: trimmed.to_string(),
        };
        let digits = trimmed.strip_suffix('%').ok_or_else(invalid)?.trim_end();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        if value > 100 {
            return Err(invalid());
        }
        Ok(CompletionValue::Percent(value as u8))
    }
}

impl fmt::Display for CompletionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionValue::Percent(p) => write!(f, "{}%", p),
            CompletionValue::Completed => write!(f, "Completed"),
            CompletionValue::NotCompleted => write!(f, "Not Completed"),
        }
    }
}

/// Completion as found in a document, including the states a hand-edited
/// file can be in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum StoredCompletion {
    /// No completion field
    #[default]
    Missing,
    /// A parsable value
    Value(CompletionValue),
    /// A field whose value could not be parsed
    Invalid(String),
}

impl StoredCompletion {
    /// Numeric percentage, if a valid value is stored.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        match self {
            StoredCompletion::Value(v) => Some(v.percent()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, StoredCompletion::Missing)
    }
}

impl fmt::Display for StoredCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredCompletion::Missing => write!(f, "(missing)"),
            StoredCompletion::Value(v) => write!(f, "{}", v),
            StoredCompletion::Invalid(raw) => write!(f, "{}", raw),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Node positions of a task inside its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TaskNodes {
    pub heading: usize,
    /// Exclusive end of the task section
    pub end: usize,
    pub status: Option<usize>,
    pub completion: Option<usize>,
    pub details: Option<usize>,
}

/// Node positions of unit-level fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct UnitNodes {
    pub id: usize,
    pub status: Option<usize>,
    pub completion: Option<usize>,
    pub last_updated: Option<usize>,
    pub changelog: Option<usize>,
}

/// Finest-grained trackable item, owned by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subtask {
    pub caption: String,
    pub state: SubtaskState,
    pub reference: String,
    #[serde(skip)]
    pub(crate) node: usize,
}

/// A numbered sub-division of a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub path: TaskPath,
    pub title: String,
    pub status: Status,
    pub completion: StoredCompletion,
    pub subtasks: Vec<Subtask>,
    #[serde(skip)]
    pub(crate) nodes: TaskNodes,
}

impl Task {
    /// Find a subtask by caption (case-insensitive, surrounding whitespace
    /// ignored).
    #[must_use]
    pub fn subtask(&self, caption: &str) -> Option<&Subtask> {
        let wanted = caption.trim();
        self.subtasks
            .iter()
            .find(|s| s.caption.trim().eq_ignore_ascii_case(wanted))
    }
}

/// One `- **timestamp**: text` line of the changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    pub timestamp: String,
    pub text: String,
}

/// Typed view of a work unit document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkUnit {
    pub id: WorkUnitId,
    pub title: String,
    pub category: Option<Category>,
    pub status: Status,
    pub completion: StoredCompletion,
    pub description: String,
    pub relationship: Option<String>,
    pub dependencies: Vec<WorkUnitId>,
    pub last_updated: Option<String>,
    pub created: Option<String>,
    pub tasks: Vec<Task>,
    pub changelog: Vec<ChangelogEntry>,
    pub related_components: Vec<String>,
    pub objectives: Vec<String>,
    #[serde(skip)]
    pub(crate) nodes: UnitNodes,
}

impl WorkUnit {
    /// Find a task by path.
    #[must_use]
    pub fn task(&self, path: &TaskPath) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.path == path)
    }

    /// Stored completion as a number, treating a missing or invalid value
    /// as 0.
    #[must_use]
    pub fn stored_percent(&self) -> u8 {
        self.completion.percent().unwrap_or(0)
    }

    /// Identifier named by a `Related to X` relationship, if any.
    #[must_use]
    pub fn related_to(&self) -> Option<WorkUnitId> {
        let relationship = self.relationship.as_deref()?;
        let caps = related_to_re().captures(relationship)?;
        Some(WorkUnitId::new(caps.get(1)?.as_str()))
    }

    /// The date the unit was last touched: `Last Updated`, else `Created`.
    #[must_use]
    pub fn touched_on(&self) -> Option<&str> {
        self.last_updated.as_deref().or(self.created.as_deref())
    }
}
