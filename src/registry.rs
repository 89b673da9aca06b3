//! Registry synchronizer.
//!
//! The registry is a single markdown index over every work unit. It is
//! never edited in place: [`render_registry`] regenerates it wholesale from
//! the set of units, and the output depends only on that set plus the
//! trailing `## Last Updated` stamp. That is what lets [`check_drift`]
//! compare an existing registry with a fresh rendering without false
//! positives.
//!
//! An existing registry can also be read back with [`parse_registry`] and
//! checked entry by entry with [`validate_registry`].

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write as _;

use crate::validation::IssueSeverity;
use crate::work_unit::{Document, NodeKind, Status, WorkUnit, WorkUnitId};

const STAMP_HEADING: &str = "## Last Updated";

const MAINTENANCE_NOTES: &str = "## Registry Maintenance

This registry is generated from the work unit documents in this directory.
Each entry mirrors the status, completion, relationships and dependencies
recorded in the unit itself. Edit the work unit, not this file.

### Maintenance Protocol

1. **Adding New Work Units**:
   - Create the unit with `worktrack create`
   - Run `worktrack sync` to add it here

2. **Updating Existing Work Units**:
   - Change status and completion with `worktrack update` or `worktrack status`
   - Relationships and dependencies are copied from the unit on every sync

3. **Completing Work Units**:
   - Run `worktrack complete`; the entry moves to the completed section
   - Run `worktrack registry validate --fix` if this file has drifted
";

// ============================================================================
// Entries
// ============================================================================

/// Projection of a work unit into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub id: WorkUnitId,
    pub title: String,
    pub status: Status,
    pub completion: u8,
    pub description: String,
    pub relationship: String,
    pub dependencies: String,
    pub last_updated: String,
    /// File name of the unit, relative to the registry.
    pub file: String,
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl RegistryEntry {
    /// Build the entry for a unit stored in `file`.
    pub fn from_unit(unit: &WorkUnit, file: impl Into<String>) -> Self {
        let dependencies = if unit.dependencies.is_empty() {
            "None".to_string()
        } else {
            unit.dependencies
                .iter()
                .map(WorkUnitId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self {
            id: unit.id.clone(),
            title: one_line(&unit.title),
            status: unit.status,
            completion: unit.stored_percent(),
            description: one_line(&unit.description),
            relationship: unit
                .relationship
                .clone()
                .unwrap_or_else(|| "Independent".to_string()),
            dependencies,
            last_updated: unit.touched_on().unwrap_or("Unknown").to_string(),
            file: file.into(),
        }
    }

    fn render(&self, out: &mut String) {
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "### {}: {}\n\
             - **Status**: {}\n\
             - **Completion**: {}%\n\
             - **Description**: {}\n\
             - **Relationship Type**: {}\n\
             - **Dependencies**: {}\n\
             - **Last Updated**: {}\n\
             - **Path**: [./{file}](./{file})\n\n",
            self.id,
            self.title,
            self.status,
            self.completion,
            self.description,
            self.relationship,
            self.dependencies,
            self.last_updated,
            file = self.file,
        );
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the registry for a set of entries.
///
/// Entries are split into active and completed sections, each sorted by
/// identifier. The completed section is omitted when empty.
#[must_use]
pub fn render_registry(entries: &[RegistryEntry], generated_on: NaiveDate) -> String {
    let mut active: Vec<&RegistryEntry> = entries.iter().filter(|e| !e.status.is_completed()).collect();
    let mut completed: Vec<&RegistryEntry> = entries.iter().filter(|e| e.status.is_completed()).collect();
    active.sort_by(|a, b| a.id.cmp(&b.id));
    completed.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = String::from("# Work Unit Registry\n\n## Active Work Units\n\n");
    for entry in &active {
        entry.render(&mut out);
    }

    if !completed.is_empty() {
        out.push_str("## Completed Work Units\n\n");
        for entry in &completed {
            entry.render(&mut out);
        }
    }

    out.push_str("## Work Unit Hierarchy\n\n```\n");
    for entry in active.iter().chain(completed.iter()) {
        let _ = writeln!(
            out,
            "{}: {} ({}% complete)",
            entry.id, entry.title, entry.completion
        );
    }
    out.push_str("```\n\n");
    out.push_str(MAINTENANCE_NOTES);
    let _ = write!(out, "\n{}\n{}\n", STAMP_HEADING, generated_on.format("%Y-%m-%d"));
    out
}

/// Registry text without the trailing `## Last Updated` stamp.
#[must_use]
pub fn strip_generated_stamp(text: &str) -> &str {
    let marker = format!("\n{}\n", STAMP_HEADING);
    match text.rfind(&marker) {
        Some(pos) => &text[..pos + 1],
        None => text,
    }
}

// ============================================================================
// Drift
// ============================================================================

/// Comparison of an existing registry with a fresh rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub in_sync: bool,
    /// Digest of the existing registry (without stamp), if there is one.
    pub current_digest: Option<String>,
    /// Digest of the fresh rendering (without stamp).
    pub expected_digest: String,
}

fn digest(text: &str) -> String {
    format!("{:x}", md5::compute(strip_generated_stamp(text).as_bytes()))
}

/// Compare the current registry (if any) with a fresh rendering, ignoring
/// the generated-on stamp.
#[must_use]
pub fn check_drift(current: Option<&str>, expected: &str) -> Drift {
    let current_digest = current.map(digest);
    let expected_digest = digest(expected);
    Drift {
        in_sync: current_digest.as_deref() == Some(expected_digest.as_str()),
        current_digest,
        expected_digest,
    }
}

// ============================================================================
// Reading an existing registry
// ============================================================================

/// An entry read back from a registry file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ParsedEntry {
    pub id: String,
    pub title: String,
    pub fields: BTreeMap<String, String>,
}

impl ParsedEntry {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Read the entries of a registry.
///
/// Entries are `### ID: Title` headings followed by field lines. Headings
/// inside the maintenance notes are ignored since they carry no `ID:` form
/// followed by fields.
#[must_use]
pub fn parse_registry(text: &str) -> Vec<ParsedEntry> {
    let doc = Document::parse(text);
    let mut entries: Vec<ParsedEntry> = Vec::new();
    let mut current: Option<ParsedEntry> = None;

    for node in doc.nodes() {
        match node.kind() {
            NodeKind::Heading { level, text } => {
                entries.extend(current.take().filter(|e| !e.fields.is_empty()));
                if *level == 3 {
                    current = text.split_once(':').map(|(id, title)| ParsedEntry {
                        id: id.trim().to_string(),
                        title: title.trim().to_string(),
                        fields: BTreeMap::new(),
                    });
                }
            }
            NodeKind::Field { .. } => {
                if let (Some(entry), Some((name, value))) = (current.as_mut(), node.as_field()) {
                    entry
                        .fields
                        .entry(name.to_string())
                        .or_insert_with(|| value.trim().to_string());
                }
            }
            _ => {}
        }
    }
    entries.extend(current.filter(|e| !e.fields.is_empty()));
    entries
}

// ============================================================================
// Registry Validation
// ============================================================================

/// Kind of registry problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegistryIssueKind {
    /// A unit has no registry entry
    MissingEntry,
    /// A registry entry has no unit
    OrphanedEntry,
    StatusMismatch,
    CompletionMismatch,
    DescriptionMismatch,
    /// An entry's relationship names a unit that does not exist
    InvalidRelationship,
}

impl RegistryIssueKind {
    #[must_use]
    pub fn severity(&self) -> IssueSeverity {
        match self {
            Self::MissingEntry | Self::OrphanedEntry => IssueSeverity::Error,
            Self::StatusMismatch | Self::CompletionMismatch | Self::InvalidRelationship => {
                IssueSeverity::Warning
            }
            Self::DescriptionMismatch => IssueSeverity::Info,
        }
    }

    /// Whether regenerating the registry resolves this issue.
    #[must_use]
    pub fn is_fixable(&self) -> bool {
        !matches!(self, Self::InvalidRelationship)
    }
}

/// A single registry problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryIssue {
    pub kind: RegistryIssueKind,
    pub severity: IssueSeverity,
    pub id: String,
    pub message: String,
}

impl RegistryIssue {
    fn new(kind: RegistryIssueKind, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            id: id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RegistryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.id, self.message)
    }
}

/// Compare a registry's entries with the units they should mirror.
#[must_use]
pub fn validate_registry(registry_text: &str, units: &[WorkUnit]) -> Vec<RegistryIssue> {
    let entries = parse_registry(registry_text);
    let by_id: BTreeMap<&str, &ParsedEntry> = entries.iter().map(|e| (e.id.as_str(), e)).collect();
    let known: BTreeSet<&str> = units.iter().map(|u| u.id.as_str()).collect();
    let mut issues = Vec::new();

    for unit in units {
        let Some(entry) = by_id.get(unit.id.as_str()) else {
            issues.push(RegistryIssue::new(
                RegistryIssueKind::MissingEntry,
                unit.id.as_str(),
                "work unit is missing from the registry",
            ));
            continue;
        };

        let status = entry.field("Status").unwrap_or_default();
        if !status.eq_ignore_ascii_case(unit.status.as_str()) {
            issues.push(RegistryIssue::new(
                RegistryIssueKind::StatusMismatch,
                unit.id.as_str(),
                format!("registry has status '{}', work unit has '{}'", status, unit.status),
            ));
        }

        let completion = entry.field("Completion").unwrap_or_default();
        let expected = format!("{}%", unit.stored_percent());
        if completion.replace(' ', "") != expected {
            issues.push(RegistryIssue::new(
                RegistryIssueKind::CompletionMismatch,
                unit.id.as_str(),
                format!("registry has completion '{}', work unit has '{}'", completion, expected),
            ));
        }

        let description = entry.field("Description").unwrap_or_default();
        if one_line(description) != one_line(&unit.description) {
            issues.push(RegistryIssue::new(
                RegistryIssueKind::DescriptionMismatch,
                unit.id.as_str(),
                "registry description differs from the work unit",
            ));
        }
    }

    for entry in &entries {
        if !known.contains(entry.id.as_str()) {
            issues.push(RegistryIssue::new(
                RegistryIssueKind::OrphanedEntry,
                entry.id.as_str(),
                "registry entry has no work unit",
            ));
        }

        let related = entry
            .field("Relationship Type")
            .and_then(|r| r.strip_prefix("Related to"))
            .map(str::trim)
            .filter(|r| !r.is_empty());
        if let Some(related) = related {
            if !known.contains(related) {
                issues.push(RegistryIssue::new(
                    RegistryIssueKind::InvalidRelationship,
                    entry.id.as_str(),
                    format!("relationship refers to unknown work unit {}", related),
                ));
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::parse_record;

    fn unit(id: &str, status: &str, completion: &str) -> WorkUnit {
        parse_record(&format!(
            "# Work Unit: Unit {id}\n- **ID**: {id}\n- **Status**: {status}\n- **Completion**: {completion}\n- **Description**: About {id}\n- **Last Updated**: 2026-01-05\n"
        ))
        .unwrap()
    }

    fn entries(units: &[WorkUnit]) -> Vec<RegistryEntry> {
        units
            .iter()
            .map(|u| RegistryEntry::from_unit(u, format!("{}_unit.md", u.id)))
            .collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[test]
    fn test_render_sections_and_order() {
        let units = vec![
            unit("WU-003", "Completed", "100%"),
            unit("WU-002", "In Progress", "40%"),
            unit("WU-001", "Proposed", "0%"),
        ];
        let text = render_registry(&entries(&units), day(1));

        let active = text.find("## Active Work Units").unwrap();
        let completed = text.find("## Completed Work Units").unwrap();
        let wu1 = text.find("### WU-001").unwrap();
        let wu2 = text.find("### WU-002").unwrap();
        let wu3 = text.find("### WU-003").unwrap();
        assert!(active < wu1 && wu1 < wu2 && wu2 < completed && completed < wu3);
        assert!(text.contains("- **Path**: [./WU-002_unit.md](./WU-002_unit.md)\n"));
        assert!(text.contains("WU-003: Unit WU-003 (100% complete)\n"));
        assert!(text.ends_with("## Last Updated\n2026-02-01\n"));
    }

    #[test]
    fn test_completed_section_omitted_when_empty() {
        let units = vec![unit("WU-001", "Proposed", "0%")];
        let text = render_registry(&entries(&units), day(1));
        assert!(!text.contains("## Completed Work Units"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let units = vec![unit("WU-002", "In Progress", "40%"), unit("WU-001", "Proposed", "0%")];
        let first = render_registry(&entries(&units), day(1));
        let mut reversed = units.clone();
        reversed.reverse();
        let second = render_registry(&entries(&reversed), day(9));
        assert_ne!(first, second);
        assert_eq!(strip_generated_stamp(&first), strip_generated_stamp(&second));
        assert!(check_drift(Some(&first), &second).in_sync);
    }

    #[test]
    fn test_drift_detected() {
        let before = render_registry(&entries(&[unit("WU-001", "Proposed", "0%")]), day(1));
        let after = render_registry(&entries(&[unit("WU-001", "In Progress", "20%")]), day(1));
        let drift = check_drift(Some(&before), &after);
        assert!(!drift.in_sync);
        assert_ne!(drift.current_digest.unwrap(), drift.expected_digest);
        assert!(!check_drift(None, &after).in_sync);
    }

    #[test]
    fn test_parse_registry_roundtrip() {
        let units = vec![unit("WU-001", "Proposed", "0%"), unit("WU-002", "Completed", "100%")];
        let text = render_registry(&entries(&units), day(1));
        let parsed = parse_registry(&text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "WU-001");
        assert_eq!(parsed[1].title, "Unit WU-002");
        assert_eq!(parsed[1].field("Status"), Some("Completed"));
        assert!(validate_registry(&text, &units).is_empty());
    }

    #[test]
    fn test_validate_registry_finds_drift() {
        let registered = vec![unit("WU-001", "Proposed", "0%"), unit("WU-009", "Proposed", "0%")];
        let text = render_registry(&entries(&registered), day(1));
        let current = vec![unit("WU-001", "In Progress", "30%"), unit("WU-002", "Proposed", "0%")];

        let kinds: Vec<RegistryIssueKind> = validate_registry(&text, &current).iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RegistryIssueKind::StatusMismatch,
                RegistryIssueKind::CompletionMismatch,
                RegistryIssueKind::MissingEntry,
                RegistryIssueKind::OrphanedEntry,
            ]
        );
    }

    #[test]
    fn test_validate_registry_relationship() {
        let text = "# Work Unit Registry\n\n## Active Work Units\n\n### WU-001: One\n- **Status**: Proposed\n- **Completion**: 0%\n- **Description**: About WU-001\n- **Relationship Type**: Related to WU-404\n";
        let issues = validate_registry(text, &[unit("WU-001", "Proposed", "0%")]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, RegistryIssueKind::InvalidRelationship);
        assert!(!issues[0].kind.is_fixable());
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }
}
