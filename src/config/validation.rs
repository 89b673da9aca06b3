//! Configuration validation for worktrack.
//!
//! # Example
//!
//! ```rust,ignore
//! use worktrack::config::validate_project_config;
//! use std::path::Path;
//!
//! let report = validate_project_config(Path::new("/path/to/project"));
//! if !report.is_valid() {
//!     for error in &report.errors {
//!         eprintln!("Error: {}", error);
//!     }
//!     std::process::exit(report.exit_code());
//! }
//! ```

use std::path::{Path, PathBuf};

use super::ProjectConfig;
use crate::work_unit::WorkUnitId;

/// Problems found in a project's settings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that make the settings unusable.
    pub errors: Vec<String>,
    /// Problems worktrack can run with.
    pub warnings: Vec<String>,
    /// Settings and template files that were read.
    pub files_checked: Vec<PathBuf>,
}

impl ValidationReport {
    /// Warnings do not make settings invalid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Process exit code for `config validate`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_valid())
    }

    /// One-line verdict.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.errors.len(), self.warnings.len()) {
            (0, 0) => "Configuration is valid.".to_string(),
            (0, w) => format!("Configuration is valid with {} warning(s).", w),
            (e, _) => format!("Configuration is invalid with {} error(s).", e),
        }
    }
}

/// Check field values of a loaded configuration.
pub fn validate_fields(config: &ProjectConfig, project_dir: &Path, report: &mut ValidationReport) {
    let sample = WorkUnitId::from_parts(&config.id_prefix, 1);
    if !sample.is_well_formed() {
        report.errors.push(format!(
            "idPrefix '{}' must start with a letter and contain only letters and digits",
            config.id_prefix
        ));
    }

    if !config.registry_file.ends_with(".md") {
        report
            .errors
            .push(format!("registryFile '{}' must be a .md file", config.registry_file));
    }

    if config.excluded_files.contains(&config.registry_file) {
        report
            .warnings
            .push("excludedFiles lists the registry, which is always excluded".to_string());
    }

    let work_units = config.work_units_path(project_dir);
    if !work_units.is_dir() {
        report.warnings.push(format!(
            "work units directory {} does not exist yet",
            work_units.display()
        ));
    }

    if let Some(template) = config.template(project_dir) {
        if template.is_file() {
            report.files_checked.push(template);
        } else {
            report
                .errors
                .push(format!("templatePath {} does not exist", template.display()));
        }
    }
}

/// Load and check the configuration of a project.
#[must_use]
pub fn validate_project_config(project_dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();
    let settings = ProjectConfig::settings_path(project_dir);
    if settings.exists() {
        report.files_checked.push(settings);
    }

    match ProjectConfig::load(project_dir) {
        Ok(config) => validate_fields(&config, project_dir, &mut report),
        Err(err) => report.errors.push(err.to_string()),
    }
    report
}
