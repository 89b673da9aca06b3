//! worktrack - work unit bookkeeping
//!
//! Keeps a directory of markdown work unit records, their completion
//! figures and a generated registry consistent with each other.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`work_unit`] - Document model and record parser
//! - [`completion`] - Completion arithmetic over subtasks and tasks
//! - [`validation`] - Consistency checks and repair
//! - [`mutation`] - Single-change edits with changelog entries
//! - [`registry`] - Registry rendering, drift checks and validation
//! - [`store`] - Where records live (filesystem or memory)
//! - [`workflow`] - Orchestration of one event across the above
//! - [`docs`] - Documentation propagation for completed units
//! - [`reporting`] - Markdown reports
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Fixtures and assertions
//!
//! # Example
//!
//! ```rust,ignore
//! use worktrack::config::ProjectConfig;
//! use worktrack::workflow::{RunOptions, Workflow};
//! use worktrack::work_unit::{Status, WorkUnitId};
//! use worktrack::mutation::Mutation;
//!
//! let project = std::path::Path::new(".");
//! let config = ProjectConfig::load(project)?;
//! let mut workflow = Workflow::from_config(project, &config)?;
//!
//! workflow.apply(
//!     &WorkUnitId::new("WU-007"),
//!     &[Mutation::SetStatus(Status::InProgress)],
//!     None,
//!     RunOptions::default(),
//! )?;
//! ```

pub mod completion;
pub mod config;
pub mod docs;
pub mod error;
pub mod mutation;
pub mod registry;
pub mod reporting;
pub mod store;
pub mod template;
pub mod testing;
pub mod validation;
pub mod work_unit;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, WorktrackError};

pub use config::{validate_project_config, ProjectConfig, ValidationReport};

pub use work_unit::{
    parse_record, parse_record_lenient, Category, Document, Status, SubtaskState, TaskPath,
    WorkUnit, WorkUnitId,
};

pub use mutation::{apply_mutation, Mutation, MutationContext, MutationOutcome};
pub use validation::{validate_document, validate_unit, Issue, IssueKind, IssueSeverity};

pub use registry::{check_drift, render_registry, validate_registry, Drift, RegistryEntry};

pub use store::{FsStore, MemoryStore, WorkUnitStore};
pub use workflow::{RunOptions, Workflow};
