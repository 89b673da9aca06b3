//! Identifiers: work unit ids (`WU-007`) and dotted task paths (`1.2`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::WorktrackError;

fn sequence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9]*)-(\d+)$").expect("valid id regex"))
}

// ============================================================================
// Work Unit Id
// ============================================================================

/// Identifier of a work unit, exactly as written in its `ID` field.
///
/// Ordering is lexicographic on the text, which matches numeric order for
/// zero-padded identifiers of the same prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnitId(String);

impl WorkUnitId {
    /// Wrap an identifier. Surrounding whitespace is dropped.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// Build the identifier for a prefix and sequence number (`WU`, 7 -> `WU-007`).
    #[must_use]
    pub fn from_parts(prefix: &str, number: u32) -> Self {
        Self(format!("{}-{:03}", prefix, number))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a `PREFIX-NNN` identifier into its parts.
    ///
    /// Returns `None` for identifiers that do not follow the pattern.
    #[must_use]
    pub fn sequence(&self) -> Option<(&str, u32)> {
        let caps = sequence_re().captures(&self.0)?;
        let prefix = caps.get(1)?.as_str();
        let number = caps.get(2)?.as_str().parse().ok()?;
        Some((prefix, number))
    }

    /// Check whether the identifier matches the `PREFIX-NNN` shape.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.sequence().is_some()
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkUnitId {
    type Err = WorktrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(WorktrackError::invalid_value("ID", s));
        }
        Ok(Self::new(s))
    }
}

/// Assign the identifier for a new work unit.
///
/// Takes the maximum sequence number among identifiers with the given
/// prefix and adds one. Gaps are never reused. With no matching identifiers
/// the sequence starts at 1.
///
/// # Example
///
/// ```
/// use worktrack::work_unit::{next_identifier, WorkUnitId};
///
/// let existing = ["WU-001", "WU-003", "WU-004"].map(WorkUnitId::new);
/// assert_eq!(next_identifier("WU", &existing).as_str(), "WU-005");
/// ```
#[must_use]
pub fn next_identifier<'a, I>(prefix: &str, existing: I) -> WorkUnitId
where
    I: IntoIterator<Item = &'a WorkUnitId>,
{
    let max = existing
        .into_iter()
        .filter_map(WorkUnitId::sequence)
        .filter(|(p, _)| *p == prefix)
        .map(|(_, n)| n)
        .max()
        .unwrap_or(0);
    WorkUnitId::from_parts(prefix, max + 1)
}

// ============================================================================
// Task Path
// ============================================================================

/// Dotted numeric path of a task within its work unit (`1.2`, `2.1.3`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskPath(Vec<u32>);

impl TaskPath {
    /// Path segments.
    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Nesting depth (`1.2` has depth 2).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Path of the first task in a unit (`1.1`).
    #[must_use]
    pub fn first() -> Self {
        Self(vec![1, 1])
    }

    /// Path of the following task at the same depth (`1.2` -> `1.3`).
    #[must_use]
    pub fn next_sibling(&self) -> Self {
        let mut segments = self.0.clone();
        if let Some(last) = segments.last_mut() {
            *last += 1;
        }
        Self(segments)
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl FromStr for TaskPath {
    type Err = WorktrackError;

    /// Parse a dotted path. At least two segments are required, so `1.2`
    /// is a task path while a bare `1` is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let segments: Option<Vec<u32>> = trimmed.split('.').map(|p| p.parse().ok()).collect();
        match segments {
            Some(segments) if segments.len() >= 2 => Ok(Self(segments)),
            _ => Err(WorktrackError::invalid_value("Task path", trimmed)),
        }
    }
}
