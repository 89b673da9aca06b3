//! Configuration management for worktrack.
//!
//! Settings live in `<project>/.worktrack/settings.json`. Every field is
//! optional; a missing file means all defaults.
//!
//! # Example settings.json
//!
//! ```json
//! {
//!   "workUnitsDir": "work_units",
//!   "idPrefix": "WU",
//!   "backups": true,
//!   "excludedFiles": ["project_tracker.md"]
//! }
//! ```

pub mod validation;

pub use validation::{validate_project_config, ValidationReport};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WorktrackError};
use crate::store::FsStore;

fn default_work_units_dir() -> PathBuf {
    PathBuf::from("work_units")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_readme_path() -> PathBuf {
    PathBuf::from("README.md")
}

fn default_id_prefix() -> String {
    "WU".to_string()
}

fn default_registry_file() -> String {
    "registry.md".to_string()
}

fn default_excluded_files() -> Vec<String> {
    vec!["project_tracker.md".to_string()]
}

fn default_true() -> bool {
    true
}

/// Project configuration loaded from `.worktrack/settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Directory holding one markdown file per work unit.
    #[serde(default = "default_work_units_dir")]
    pub work_units_dir: PathBuf,

    /// Directory for validation, completion and update reports.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Directory for generated component documentation.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// README that receives "Recent Updates" entries.
    #[serde(default = "default_readme_path")]
    pub readme_path: PathBuf,

    /// Prefix of new identifiers (`WU` gives `WU-001`).
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Registry file name inside the work units directory.
    #[serde(default = "default_registry_file")]
    pub registry_file: String,

    /// Markdown files in the work units directory that are not records.
    #[serde(default = "default_excluded_files")]
    pub excluded_files: Vec<String>,

    /// Copy a file to `<name>.bak` before rewriting it.
    #[serde(default = "default_true")]
    pub backups: bool,

    /// Hold an exclusive lock while a command writes.
    #[serde(default = "default_true")]
    pub lock_writes: bool,

    /// Propagate completions into README and component documentation.
    #[serde(default = "default_true")]
    pub update_docs: bool,

    /// Custom template for new work units, relative to the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            work_units_dir: default_work_units_dir(),
            reports_dir: default_reports_dir(),
            docs_dir: default_docs_dir(),
            readme_path: default_readme_path(),
            id_prefix: default_id_prefix(),
            registry_file: default_registry_file(),
            excluded_files: default_excluded_files(),
            backups: true,
            lock_writes: true,
            update_docs: true,
            template_path: None,
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a project directory
    pub fn load(project_dir: &Path) -> Result<Self> {
        let settings_path = Self::settings_path(project_dir);

        if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).map_err(|e| {
                WorktrackError::config_with_path(format!("invalid settings.json: {e}"), settings_path)
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Get the settings.json path for a project
    pub fn settings_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".worktrack/settings.json")
    }

    /// Resolve a configured path against the project directory.
    fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_dir.join(path)
        }
    }

    pub fn work_units_path(&self, project_dir: &Path) -> PathBuf {
        Self::resolve(project_dir, &self.work_units_dir)
    }

    pub fn reports_path(&self, project_dir: &Path) -> PathBuf {
        Self::resolve(project_dir, &self.reports_dir)
    }

    pub fn docs_path(&self, project_dir: &Path) -> PathBuf {
        Self::resolve(project_dir, &self.docs_dir)
    }

    pub fn readme(&self, project_dir: &Path) -> PathBuf {
        Self::resolve(project_dir, &self.readme_path)
    }

    pub fn template(&self, project_dir: &Path) -> Option<PathBuf> {
        self.template_path
            .as_deref()
            .map(|p| Self::resolve(project_dir, p))
    }

    /// Build the filesystem store described by this configuration.
    #[must_use]
    pub fn store(&self, project_dir: &Path) -> FsStore {
        FsStore::new(self.work_units_path(project_dir))
            .with_registry_file(self.registry_file.clone())
            .with_excluded(self.excluded_files.iter().cloned())
            .with_backups(self.backups)
            .with_locking(self.lock_writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_settings_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ProjectConfig::load(temp.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.id_prefix, "WU");
        assert!(config.backups);
    }

    #[test]
    fn test_partial_settings_merge_with_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".worktrack")).unwrap();
        std::fs::write(
            ProjectConfig::settings_path(temp.path()),
            r#"{"idPrefix": "DOC", "lockWrites": false, "workUnitsDir": "units"}"#,
        )
        .unwrap();

        let config = ProjectConfig::load(temp.path()).unwrap();
        assert_eq!(config.id_prefix, "DOC");
        assert!(!config.lock_writes);
        assert_eq!(config.work_units_path(temp.path()), temp.path().join("units"));
        assert_eq!(config.registry_file, "registry.md");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".worktrack")).unwrap();
        std::fs::write(ProjectConfig::settings_path(temp.path()), "{ nope").unwrap();

        let err = ProjectConfig::load(temp.path()).unwrap_err();
        assert!(matches!(err, WorktrackError::Config { path: Some(_), .. }));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&ProjectConfig::default()).unwrap();
        assert!(json.contains("\"workUnitsDir\""));
        assert!(json.contains("\"lockWrites\""));
        assert!(!json.contains("templatePath"));
    }
}
