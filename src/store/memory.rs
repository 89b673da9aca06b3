//! In-memory store, used by tests and dry runs.

use std::collections::BTreeMap;

use super::WorkUnitStore;
use crate::error::{LookupKind, Result, WorktrackError};

/// Records kept in a map keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, String>,
    registry: Option<String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record.
    #[must_use]
    pub fn with_record(mut self, file: impl Into<String>, content: impl Into<String>) -> Self {
        self.records.insert(file.into(), content.into());
        self
    }

    /// Set the registry content.
    #[must_use]
    pub fn with_registry(mut self, content: impl Into<String>) -> Self {
        self.registry = Some(content.into());
        self
    }

    /// Current content of a record.
    #[must_use]
    pub fn record(&self, file: &str) -> Option<&str> {
        self.records.get(file).map(String::as_str)
    }

    /// Current registry content.
    #[must_use]
    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }
}

impl WorkUnitStore for MemoryStore {
    fn list_records(&self) -> Result<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }

    fn read_record(&self, file: &str) -> Result<String> {
        self.records
            .get(file)
            .cloned()
            .ok_or_else(|| WorktrackError::not_found(LookupKind::WorkUnit, file))
    }

    fn write_record(&mut self, file: &str, content: &str) -> Result<()> {
        self.records.insert(file.to_string(), content.to_string());
        Ok(())
    }

    fn read_registry(&self) -> Result<Option<String>> {
        Ok(self.registry.clone())
    }

    fn write_registry(&mut self, content: &str) -> Result<()> {
        self.registry = Some(content.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
