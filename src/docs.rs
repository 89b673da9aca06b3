//! Documentation propagation for completed work units.
//!
//! When a unit completes, every component it lists under `Related
//! Components` gets an entry in `docs/<component>.md`, filed under a section
//! chosen by the unit's category, plus a changelog line. The project README
//! gets a `Recent Updates` line. A unit without components gets a
//! stand-alone `docs/<id>_documentation.md` instead.
//!
//! Every edit is skipped when the entry is already present, so running the
//! updater twice for the same unit changes nothing the second time.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::write_atomic;
use crate::work_unit::{Category, Document, Node, NodeKind, WorkUnit, WorkUnitId};

const CHANGELOG_HEADING: &str = "Changelog";
const RECENT_UPDATES_HEADING: &str = "Recent Updates";
const INTRODUCTION_HEADING: &str = "Introduction";
const DOCUMENTATION_HEADING: &str = "Documentation";
const RECENT_UPDATES_BLURB: &str = "This section lists recent updates to the project.";

/// What happened to one documentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocAction {
    Created,
    Updated,
    Unchanged,
}

/// One documentation file touched (or left alone) by the updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocChange {
    pub path: PathBuf,
    pub action: DocAction,
}

/// Everything the updater did for one unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocsUpdate {
    pub changes: Vec<DocChange>,
}

impl DocsUpdate {
    /// Paths that were created or modified.
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.changes
            .iter()
            .filter(|c| c.action != DocAction::Unchanged)
            .map(|c| c.path.as_path())
    }

    fn record(&mut self, path: PathBuf, action: DocAction) {
        self.changes.push(DocChange { path, action });
    }
}

/// Section of a component document that receives entries of a category.
#[must_use]
pub fn category_section(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::Enhancement) => "Enhancements",
        Some(Category::Feature) => "Features",
        Some(Category::BugFix) => "Bug Fixes",
        Some(Category::Documentation) | None => "Updates",
    }
}

/// File name of a component document: `Cache Layer` gives `cache_layer.md`
/// and `src/cache.rs` gives `src_cache_rs.md`. A name with nothing usable
/// falls back to `<id>_component.md`.
#[must_use]
pub fn component_file_name(component: &str, id: &WorkUnitId) -> String {
    let mut name = String::with_capacity(component.len());
    for c in component.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() || c == '-' {
            name.push(c);
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_');
    if name.is_empty() {
        format!("{}_component.md", id.as_str().to_lowercase())
    } else {
        format!("{}.md", name)
    }
}

fn is_blank(doc: &Document, index: usize) -> bool {
    doc.node(index)
        .is_some_and(|n| matches!(n.kind(), NodeKind::Blank))
}

/// Index of the `## heading` section, appending an empty one at the end of
/// the document when it does not exist.
fn ensure_section(doc: &mut Document, heading: &str) -> usize {
    if let Some(index) = doc.find_heading(2, heading) {
        return index;
    }
    if !doc.is_empty() && !is_blank(doc, doc.len() - 1) {
        doc.push(Node::blank());
    }
    doc.push(Node::heading(2, heading));
    doc.push(Node::blank());
    doc.len() - 2
}

/// Insert nodes at the top of a section, below its heading and the blank
/// line that usually follows it.
fn insert_at_section_top(doc: &mut Document, heading_index: usize, nodes: Vec<Node>) {
    let mut at = heading_index + 1;
    if is_blank(doc, at) {
        at += 1;
    }
    for (offset, node) in nodes.into_iter().enumerate() {
        doc.insert(at + offset, node);
    }
}

fn section_contains(doc: &Document, heading_index: usize, needle: &str) -> bool {
    let end = doc.section_end(heading_index);
    doc.nodes()[heading_index + 1..end]
        .iter()
        .any(|node| node.raw().contains(needle))
}

// ============================================================================
// Component documents
// ============================================================================

fn component_entry(unit: &WorkUnit) -> Vec<Node> {
    let mut nodes = vec![Node::heading(3, unit.title.trim()), Node::blank()];
    if !unit.description.trim().is_empty() {
        nodes.push(Node::text(unit.description.trim()));
        nodes.push(Node::blank());
    }
    if !unit.objectives.is_empty() {
        nodes.push(Node::text("**Key Improvements:**"));
        nodes.push(Node::blank());
        nodes.extend(unit.objectives.iter().map(|o| Node::text(format!("- {}", o))));
        nodes.push(Node::blank());
    }
    nodes
}

/// Add a unit's entry and a changelog line to a component document.
///
/// Returns `None` when the document already mentions the unit.
#[must_use]
pub fn add_component_entry(content: &str, unit: &WorkUnit, today: NaiveDate) -> Option<String> {
    let mut doc = Document::parse(content);
    let marker = format!("Updated based on {}", unit.id);
    if doc
        .find_heading(2, CHANGELOG_HEADING)
        .is_some_and(|i| section_contains(&doc, i, &marker))
    {
        return None;
    }

    let section = ensure_section(&mut doc, category_section(unit.category));
    let entry_heading = format!("### {}", unit.title.trim());
    if !section_contains(&doc, section, &entry_heading) {
        insert_at_section_top(&mut doc, section, component_entry(unit));
    }

    let changelog = ensure_section(&mut doc, CHANGELOG_HEADING);
    insert_at_section_top(
        &mut doc,
        changelog,
        vec![Node::field(
            "",
            today.format("%Y-%m-%d").to_string(),
            format!("{} - {}", marker, unit.title.trim()),
        )],
    );

    let mut text = doc.render();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Some(text)
}

/// Content of the stand-alone document written for a unit without related
/// components.
#[must_use]
pub fn unit_documentation(unit: &WorkUnit) -> String {
    let mut out = format!("# {}\n\n", unit.title.trim());
    if !unit.description.trim().is_empty() {
        out.push_str(unit.description.trim());
        out.push_str("\n\n");
    }
    if !unit.objectives.is_empty() {
        out.push_str("## Objectives\n\n");
        for objective in &unit.objectives {
            out.push_str(&format!("- {}\n", objective));
        }
        out.push('\n');
    }
    if !unit.tasks.is_empty() {
        out.push_str("## Requirements\n\n");
        for task in &unit.tasks {
            out.push_str(&format!("- Task {}: {}\n", task.path, task.title));
        }
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

// ============================================================================
// README
// ============================================================================

/// Add a `Recent Updates` line for a unit, and links to the documents that
/// were written under an existing `Documentation` section.
///
/// Returns `None` when the README already lists the unit and every link.
#[must_use]
pub fn add_readme_entry(
    content: &str,
    unit: &WorkUnit,
    today: NaiveDate,
    links: &[(String, String)],
) -> Option<String> {
    let mut doc = Document::parse(content);
    let mut changed = false;

    let section = match doc.find_heading(2, RECENT_UPDATES_HEADING) {
        Some(index) => index,
        None => {
            let at = doc
                .find_heading(2, INTRODUCTION_HEADING)
                .map(|i| doc.section_end(i))
                .unwrap_or(doc.len());
            let mut nodes = vec![
                Node::heading(2, RECENT_UPDATES_HEADING),
                Node::blank(),
                Node::text(RECENT_UPDATES_BLURB),
                Node::blank(),
            ];
            if at > 0 && !is_blank(&doc, at - 1) {
                nodes.insert(0, Node::blank());
            }
            let heading = at + usize::from(at > 0 && !is_blank(&doc, at - 1));
            for (offset, node) in nodes.into_iter().enumerate() {
                doc.insert(at + offset, node);
            }
            changed = true;
            heading
        }
    };

    let marker = format!("({})", unit.id);
    if !section_contains(&doc, section, &marker) {
        // Below the heading and its introductory paragraph.
        let end = doc.section_end(section);
        let mut at = section + 1;
        while at < end && is_blank(&doc, at) {
            at += 1;
        }
        while at < end
            && matches!(doc.nodes()[at].kind(), NodeKind::Text)
            && !doc.nodes()[at].raw().trim_start().starts_with("- ")
        {
            at += 1;
        }
        while at < end && is_blank(&doc, at) {
            at += 1;
        }
        doc.insert(
            at,
            Node::field(
                "",
                today.format("%Y-%m-%d").to_string(),
                format!("{} {}", unit.title.trim(), marker),
            ),
        );
        if doc.node(at + 1).is_some_and(|n| n.as_heading().is_some()) {
            doc.insert(at + 1, Node::blank());
        }
        changed = true;
    }

    if let Some(docs_section) = doc.find_heading(2, DOCUMENTATION_HEADING) {
        let missing: Vec<Node> = links
            .iter()
            .filter(|(_, target)| !section_contains(&doc, docs_section, target))
            .map(|(title, target)| Node::text(format!("- [{}]({})", title, target)))
            .collect();
        if !missing.is_empty() {
            insert_at_section_top(&mut doc, docs_section, missing);
            changed = true;
        }
    }

    changed.then(|| doc.render())
}

fn link_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ============================================================================
// Updater
// ============================================================================

/// Content of `path`, or `None` when it does not exist. Unreadable files
/// are errors so they are never overwritten.
fn read_existing(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes documentation for completed units.
#[derive(Debug, Clone)]
pub struct DocsUpdater {
    docs_dir: PathBuf,
    readme: PathBuf,
    backups: bool,
}

impl DocsUpdater {
    #[must_use]
    pub fn new(docs_dir: impl Into<PathBuf>, readme: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            readme: readme.into(),
            backups: true,
        }
    }

    #[must_use]
    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    /// Path of the document for a component.
    #[must_use]
    pub fn component_path(&self, component: &str, id: &WorkUnitId) -> PathBuf {
        self.docs_dir.join(component_file_name(component, id))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(path, content, self.backups)
    }

    /// Propagate a unit into the documentation. With `dry_run` nothing is
    /// written, but the returned changes describe what would be.
    pub fn update_for_unit(
        &self,
        unit: &WorkUnit,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<DocsUpdate> {
        let mut update = DocsUpdate::default();

        if unit.related_components.is_empty() {
            let path = self
                .docs_dir
                .join(format!("{}_documentation.md", unit.id.as_str().to_lowercase()));
            let content = unit_documentation(unit);
            let action = match read_existing(&path)? {
                Some(existing) if existing == content => DocAction::Unchanged,
                Some(_) => DocAction::Updated,
                None => DocAction::Created,
            };
            if action != DocAction::Unchanged && !dry_run {
                self.write(&path, &content)?;
            }
            update.record(path, action);
        }

        for component in &unit.related_components {
            let path = self.component_path(component, &unit.id);
            let (existing, created) = match read_existing(&path)? {
                Some(text) => (text, false),
                None => (format!("# {}\n", component.trim()), true),
            };
            match add_component_entry(&existing, unit, today) {
                Some(content) => {
                    if !dry_run {
                        self.write(&path, &content)?;
                    }
                    debug!("Documented {} in {}", unit.id, path.display());
                    let action = if created {
                        DocAction::Created
                    } else {
                        DocAction::Updated
                    };
                    update.record(path, action);
                }
                None => update.record(path, DocAction::Unchanged),
            }
        }

        if !self.readme.is_file() {
            warn!("README not found at {}", self.readme.display());
            return Ok(update);
        }

        let base = self.readme.parent().unwrap_or_else(|| Path::new(""));
        let links: Vec<(String, String)> = update
            .changes
            .iter()
            .map(|c| {
                let target = c.path.strip_prefix(base).unwrap_or(&c.path);
                (link_title(&c.path), target.display().to_string())
            })
            .collect();

        let readme = fs::read_to_string(&self.readme)?;
        match add_readme_entry(&readme, unit, today, &links) {
            Some(content) => {
                if !dry_run {
                    self.write(&self.readme, &content)?;
                }
                update.record(self.readme.clone(), DocAction::Updated);
            }
            None => update.record(self.readme.clone(), DocAction::Unchanged),
        }

        info!(
            "Documentation for {}: {} file(s) {}",
            unit.id,
            update.written().count(),
            if dry_run { "would change" } else { "updated" }
        );
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::parse_record;
    use tempfile::TempDir;

    const UNIT: &str = "# Work Unit: Add caching layer

## Metadata
- **ID**: WU-007
- **Type**: Feature
- **Status**: Completed
- **Completion**: 100%

## Description
Cache expensive lookups.

## Objectives
- Faster responses
- Fewer database calls

## Related Components
- Cache Layer
";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 3).unwrap()
    }

    fn unit() -> WorkUnit {
        parse_record(UNIT).unwrap()
    }

    #[test]
    fn test_category_sections() {
        assert_eq!(category_section(Some(Category::Feature)), "Features");
        assert_eq!(category_section(Some(Category::BugFix)), "Bug Fixes");
        assert_eq!(category_section(None), "Updates");
    }

    #[test]
    fn test_component_file_names() {
        let id = WorkUnitId::new("WU-007");
        assert_eq!(component_file_name(" Cache  Layer ", &id), "cache_layer.md");
        assert_eq!(component_file_name("src/cache.rs", &id), "src_cache_rs.md");
        assert_eq!(component_file_name("Größe", &id), "gr_e.md");
        assert_eq!(component_file_name("キャッシュ", &id), "wu-007_component.md");
    }

    #[test]
    fn test_component_entry_creates_sections() {
        let text = add_component_entry("# Cache Layer\n", &unit(), today()).unwrap();
        assert_eq!(
            text,
            "# Cache Layer

## Features

### Add caching layer

Cache expensive lookups.

**Key Improvements:**

- Faster responses
- Fewer database calls

## Changelog

- **2026-04-03**: Updated based on WU-007 - Add caching layer
"
        );
    }

    #[test]
    fn test_component_entry_is_not_repeated() {
        let once = add_component_entry("# Cache Layer\n", &unit(), today()).unwrap();
        assert!(add_component_entry(&once, &unit(), today()).is_none());
    }

    #[test]
    fn test_component_entry_goes_to_top_of_existing_section() {
        let existing = "# Cache\n\n## Features\n\n### Older feature\n\nText.\n";
        let text = add_component_entry(existing, &unit(), today()).unwrap();
        let new_pos = text.find("### Add caching layer").unwrap();
        let old_pos = text.find("### Older feature").unwrap();
        assert!(new_pos < old_pos);
        assert_eq!(text.matches("## Features").count(), 1);
    }

    #[test]
    fn test_readme_section_after_introduction() {
        let readme = "# Project\n\n## Introduction\n\nHello.\n\n## Usage\n\nRun it.\n";
        let text = add_readme_entry(readme, &unit(), today(), &[]).unwrap();
        let intro = text.find("## Introduction").unwrap();
        let updates = text.find("## Recent Updates").unwrap();
        let usage = text.find("## Usage").unwrap();
        assert!(intro < updates && updates < usage);
        assert!(text.contains(
            "This section lists recent updates to the project.\n\n- **2026-04-03**: Add caching layer (WU-007)\n\n## Usage"
        ));
        assert!(add_readme_entry(&text, &unit(), today(), &[]).is_none());
    }

    #[test]
    fn test_readme_links_under_documentation() {
        let readme = "# Project\n\n## Documentation\n\n- [Guide](docs/guide.md)\n";
        let links = vec![("Cache Layer".to_string(), "docs/cache_layer.md".to_string())];
        let text = add_readme_entry(readme, &unit(), today(), &links).unwrap();
        assert!(text.contains("- [Cache Layer](docs/cache_layer.md)\n- [Guide](docs/guide.md)"));
        assert!(text.contains("## Recent Updates"));
    }

    #[test]
    fn test_unit_documentation_without_components() {
        let unit = parse_record(
            "# Work Unit: Tidy\n- **ID**: WU-002\n\n## Description\nClean up.\n\n## Requirements\n\n### 1.1 Remove dead code\n",
        )
        .unwrap();
        assert_eq!(
            unit_documentation(&unit),
            "# Tidy\n\nClean up.\n\n## Requirements\n\n- Task 1.1: Remove dead code\n"
        );
    }

    #[test]
    fn test_updater_writes_and_backs_up() {
        let temp = TempDir::new().unwrap();
        let readme = temp.path().join("README.md");
        fs::write(&readme, "# Project\n").unwrap();
        let updater = DocsUpdater::new(temp.path().join("docs"), &readme);

        let update = updater.update_for_unit(&unit(), today(), false).unwrap();
        assert_eq!(update.written().count(), 2);
        assert_eq!(update.changes[0].action, DocAction::Created);

        let doc = fs::read_to_string(temp.path().join("docs/cache_layer.md")).unwrap();
        assert!(doc.starts_with("# Cache Layer\n"));
        assert!(fs::read_to_string(temp.path().join("README.md.bak"))
            .unwrap()
            .eq("# Project\n"));

        let again = updater.update_for_unit(&unit(), today(), false).unwrap();
        assert_eq!(again.written().count(), 0);
    }

    #[test]
    fn test_updater_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let updater = DocsUpdater::new(temp.path().join("docs"), temp.path().join("README.md"));
        let update = updater.update_for_unit(&unit(), today(), true).unwrap();
        assert_eq!(update.written().count(), 1);
        assert!(!temp.path().join("docs").exists());
    }

    #[test]
    fn test_updater_refuses_to_replace_unreadable_doc() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let doc = docs.join("cache_layer.md");
        let original = b"\xff\xfe more content that must survive\n".to_vec();
        fs::write(&doc, &original).unwrap();

        let updater =
            DocsUpdater::new(&docs, temp.path().join("README.md")).with_backups(false);
        assert!(updater.update_for_unit(&unit(), today(), false).is_err());
        assert_eq!(fs::read(&doc).unwrap(), original);
    }

    #[test]
    fn test_updater_leaves_no_temporary_files() {
        let temp = TempDir::new().unwrap();
        let readme = temp.path().join("README.md");
        fs::write(&readme, "# Project\n").unwrap();
        let updater = DocsUpdater::new(temp.path().join("docs"), &readme).with_backups(false);
        updater.update_for_unit(&unit(), today(), false).unwrap();

        let names: Vec<String> = fs::read_dir(temp.path().join("docs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cache_layer.md"]);
        assert!(!temp.path().join("README.md.tmp").exists());
        assert!(!temp.path().join("README.md.bak").exists());
    }
}
