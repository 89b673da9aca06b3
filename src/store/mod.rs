//! Storage for work unit records and the registry.
//!
//! Files stay the source of truth. Everything that reads or writes them
//! goes through [`WorkUnitStore`], so the workflow can run against the
//! filesystem ([`FsStore`]) or an in-memory map ([`MemoryStore`]).

mod fs;
mod memory;

pub use fs::FsStore;
pub(crate) use fs::write_atomic;
pub use memory::MemoryStore;

use std::fs::File;
use tracing::warn;

use crate::error::{LookupKind, Result, WorktrackError};
use crate::work_unit::{parse_document, Document, ParseMode, WorkUnit, WorkUnitId};

/// Held while a mutating command runs. Dropping it releases the lock.
#[derive(Debug, Default)]
pub struct WriteGuard {
    _file: Option<File>,
}

impl WriteGuard {
    /// A guard that holds nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn holding(file: File) -> Self {
        Self { _file: Some(file) }
    }
}

/// Abstraction over where work unit records live.
///
/// Records are addressed by file name. Implementations decide which names
/// count as records; the registry is never one of them.
pub trait WorkUnitStore {
    /// File names of every record, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing location cannot be listed.
    fn list_records(&self) -> Result<Vec<String>>;

    /// Read one record.
    fn read_record(&self, file: &str) -> Result<String>;

    /// Write one record, replacing any previous content.
    fn write_record(&mut self, file: &str, content: &str) -> Result<()>;

    /// Read the registry, `None` if it does not exist yet.
    fn read_registry(&self) -> Result<Option<String>>;

    /// Replace the registry.
    fn write_registry(&mut self, content: &str) -> Result<()>;

    /// Take the exclusive write lock for the duration of a command.
    fn lock_for_write(&self) -> Result<WriteGuard> {
        Ok(WriteGuard::none())
    }

    /// Human-readable location of the store.
    fn location(&self) -> String;
}

/// A record loaded from a store.
#[derive(Debug, Clone)]
pub struct StoredUnit {
    pub file: String,
    pub document: Document,
    pub unit: WorkUnit,
}

/// All records of a store, with the ones that could not be read.
#[derive(Debug, Default)]
pub struct LoadedUnits {
    pub units: Vec<StoredUnit>,
    /// File name and reason for every record that failed to parse.
    pub failures: Vec<(String, String)>,
}

impl LoadedUnits {
    /// Identifiers of every loaded unit.
    pub fn ids(&self) -> impl Iterator<Item = &WorkUnitId> {
        self.units.iter().map(|s| &s.unit.id)
    }

    /// Find a loaded unit by identifier.
    #[must_use]
    pub fn find(&self, id: &WorkUnitId) -> Option<&StoredUnit> {
        self.units.iter().find(|s| &s.unit.id == id)
    }
}

/// Read and parse one record. Completion values that cannot be parsed are
/// kept for the validator.
pub fn read_unit<S: WorkUnitStore + ?Sized>(store: &S, file: &str) -> Result<StoredUnit> {
    let text = store.read_record(file)?;
    let document = Document::parse(&text);
    let unit = parse_document(&document, ParseMode::Lenient).map_err(|err| match err {
        WorktrackError::MissingIdentifier { .. } => WorktrackError::MissingIdentifier {
            path: Some(file.into()),
        },
        other => other,
    })?;
    Ok(StoredUnit {
        file: file.to_string(),
        document,
        unit,
    })
}

/// Load every record. Records that fail to parse are collected rather than
/// aborting the whole load.
pub fn load_all<S: WorkUnitStore + ?Sized>(store: &S) -> Result<LoadedUnits> {
    let mut loaded = LoadedUnits::default();
    for file in store.list_records()? {
        match read_unit(store, &file) {
            Ok(unit) => loaded.units.push(unit),
            Err(err) if err.is_document_error() => {
                warn!("Skipping {}: {}", file, err);
                loaded.failures.push((file, err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }
    loaded.units.sort_by(|a, b| a.unit.id.cmp(&b.unit.id));
    Ok(loaded)
}

/// Find the record of a work unit by identifier.
pub fn find_by_id<S: WorkUnitStore + ?Sized>(store: &S, id: &WorkUnitId) -> Result<StoredUnit> {
    // File names usually start with the identifier; try those first.
    let files = store.list_records()?;
    let (likely, rest): (Vec<&String>, Vec<&String>) =
        files.iter().partition(|f| f.starts_with(id.as_str()));

    for file in likely.into_iter().chain(rest) {
        match read_unit(store, file) {
            Ok(stored) if &stored.unit.id == id => return Ok(stored),
            Ok(_) => {}
            Err(err) if err.is_document_error() => {}
            Err(err) => return Err(err),
        }
    }
    Err(WorktrackError::not_found(LookupKind::WorkUnit, id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_record("WU-002_second.md", "# Work Unit: Second\n- **ID**: WU-002\n")
            .with_record("WU-001_first.md", "# Work Unit: First\n- **ID**: WU-001\n")
            .with_record("notes.md", "# Notes without an id\n")
            .with_record("WU-003_broken.md", "- **ID**: WU-003\n- **Status**: Nearly\n")
    }

    #[test]
    fn test_load_all_sorts_and_collects_failures() {
        let loaded = load_all(&store()).unwrap();
        let ids: Vec<&str> = loaded.ids().map(WorkUnitId::as_str).collect();
        assert_eq!(ids, vec!["WU-001", "WU-002"]);
        assert_eq!(loaded.failures.len(), 2);
        assert!(loaded.failures.iter().any(|(f, _)| f == "notes.md"));
    }

    #[test]
    fn test_find_by_id() {
        let found = find_by_id(&store(), &WorkUnitId::new("WU-002")).unwrap();
        assert_eq!(found.file, "WU-002_second.md");
        assert_eq!(found.unit.title, "Second");

        let err = find_by_id(&store(), &WorkUnitId::new("WU-404")).unwrap_err();
        assert!(matches!(err, WorktrackError::NotFound { .. }));
    }

    #[test]
    fn test_missing_identifier_names_file() {
        let err = read_unit(&store(), "notes.md").unwrap_err();
        assert!(err.to_string().contains("notes.md"));
    }
}
