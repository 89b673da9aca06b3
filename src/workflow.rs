//! Orchestration of single events.
//!
//! A [`Workflow`] sequences the other modules for one external event:
//!
//! ```text
//! store ─> mutation ─> validation ─> store (atomic) ─> registry ─> docs/reports
//! ```
//!
//! Every new document is computed in memory before anything is written.
//! Mutating operations hold the store's write lock for their whole run, and
//! every one of them honours [`RunOptions::dry_run`].

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::docs::{DocsUpdate, DocsUpdater};
use crate::error::{Result, WorktrackError};
use crate::mutation::{apply_mutation, Mutation, MutationContext};
use crate::registry::{
    check_drift, render_registry, validate_registry, Drift, RegistryEntry, RegistryIssue,
};
use crate::reporting::{
    completion_report, registry_report, timestamped_name, update_notification, validation_report,
    ReportKind, ReportWriter,
};
use crate::store::{find_by_id, load_all, FsStore, LoadedUnits, WorkUnitStore, WriteGuard};
use crate::template::{file_name, render_template, TemplateValues};
use crate::validation::{validate_document, Issue, ValidationOutcome};
use crate::work_unit::{
    next_identifier, parse_document, Category, Document, ParseMode, Status, WorkUnit, WorkUnitId,
};

/// Options shared by mutating operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and report the change without writing anything.
    pub dry_run: bool,
    /// Write the mutated document without running the validator on it.
    pub skip_validation: bool,
}

/// Number of lines that differ between two texts, ignoring the common
/// prefix and suffix.
#[must_use]
pub fn changed_lines(before: &str, after: &str) -> usize {
    let a: Vec<&str> = before.lines().collect();
    let b: Vec<&str> = after.lines().collect();
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    (a.len() - prefix - suffix).max(b.len() - prefix - suffix)
}

// ============================================================================
// Reports
// ============================================================================

/// Result of creating a work unit.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub id: WorkUnitId,
    pub file: String,
    pub content: String,
    /// Issues left after validating the new record.
    pub issues: Vec<Issue>,
    pub written: bool,
}

/// Result of applying mutations to a work unit.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    pub id: WorkUnitId,
    pub file: String,
    /// Changelog text of every applied mutation.
    pub summaries: Vec<String>,
    pub previous_status: Status,
    pub status: Status,
    pub previous_completion: u8,
    pub completion: u8,
    /// Issues repaired by the validator after the mutation.
    pub fixed: usize,
    /// Issues the validator could not repair.
    pub remaining: Vec<Issue>,
    /// Lines changed in the record.
    pub changed_lines: usize,
    pub written: bool,
    /// Update notification written for the change.
    pub notification: Option<PathBuf>,
}

impl ChangeReport {
    #[must_use]
    pub fn summary(&self) -> String {
        self.summaries.join("; ")
    }
}

/// Result of completing a work unit.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteReport {
    pub change: ChangeReport,
    pub docs: Option<DocsUpdate>,
    pub report: Option<PathBuf>,
}

/// Validation results for one or all units.
#[derive(Debug, Clone)]
pub struct ValidateReport {
    pub outcomes: Vec<ValidationOutcome>,
    /// Records that could not be parsed, with the reason.
    pub failures: Vec<(String, String)>,
    /// Records rewritten by repair.
    pub written: Vec<String>,
}

impl ValidateReport {
    /// Total issues found before repair.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.issues.len()).sum()
    }

    #[must_use]
    pub fn fixed_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.fixed).sum()
    }

    #[must_use]
    pub fn remaining_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.remaining.len()).sum()
    }

    /// True when nothing remains to be fixed by hand.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.remaining_count() == 0 && self.failures.is_empty()
    }
}

/// Result of synchronizing the registry.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub drift: Drift,
    pub entries: usize,
    pub written: bool,
}

/// Result of validating the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    /// Issues found before any fix.
    pub issues: Vec<RegistryIssue>,
    /// Whether the registry was regenerated.
    pub regenerated: bool,
    /// Issues left afterwards.
    pub remaining: Vec<RegistryIssue>,
}

/// Result of a maintenance run.
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub validation: ValidateReport,
    pub registry: RegistryReport,
    pub report: Option<PathBuf>,
}

impl MaintenanceReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.validation.is_clean() && self.registry.remaining.is_empty()
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// Runs events against a store.
#[derive(Debug)]
pub struct Workflow<S: WorkUnitStore> {
    store: S,
    id_prefix: String,
    template: Option<String>,
    docs: Option<DocsUpdater>,
    reports: Option<ReportWriter>,
    clock: Option<NaiveDateTime>,
}

impl Workflow<FsStore> {
    /// Workflow for a project on disk, as described by its configuration.
    pub fn from_config(project_dir: &Path, config: &ProjectConfig) -> Result<Self> {
        let template = match config.template(project_dir) {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                WorktrackError::config_with_path(format!("cannot read template: {e}"), path)
            })?),
            None => None,
        };

        let mut workflow = Workflow::new(config.store(project_dir))
            .with_id_prefix(config.id_prefix.clone())
            .with_reports(ReportWriter::new(config.reports_path(project_dir)));
        workflow.template = template;
        if config.update_docs {
            workflow = workflow.with_docs(
                DocsUpdater::new(config.docs_path(project_dir), config.readme(project_dir))
                    .with_backups(config.backups),
            );
        }
        Ok(workflow)
    }
}

impl<S: WorkUnitStore> Workflow<S> {
    /// Workflow over a store with the `WU` prefix, the built-in template,
    /// and no documentation or report output.
    pub fn new(store: S) -> Self {
        Self {
            store,
            id_prefix: "WU".to_string(),
            template: None,
            docs: None,
            reports: None,
            clock: None,
        }
    }

    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    #[must_use]
    pub fn with_docs(mut self, docs: DocsUpdater) -> Self {
        self.docs = Some(docs);
        self
    }

    #[must_use]
    pub fn with_reports(mut self, reports: ReportWriter) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Pin the clock, for reproducible changelogs and stamps.
    #[must_use]
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.unwrap_or_else(|| Local::now().naive_local())
    }

    fn lock(&self, opts: RunOptions) -> Result<WriteGuard> {
        if opts.dry_run {
            Ok(WriteGuard::none())
        } else {
            self.store.lock_for_write()
        }
    }

    fn known_ids(loaded: &LoadedUnits) -> BTreeSet<WorkUnitId> {
        loaded.ids().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// Create a work unit from the template and add it to the registry.
    pub fn create(
        &mut self,
        title: &str,
        category: Category,
        description: Option<&str>,
        opts: RunOptions,
    ) -> Result<CreateReport> {
        if title.trim().is_empty() {
            return Err(WorktrackError::invalid_value("title", title));
        }
        let _guard = self.lock(opts)?;

        let loaded = load_all(&self.store)?;
        let id = next_identifier(&self.id_prefix, loaded.ids());
        let file = file_name(&id, title);
        let text = render_template(
            self.template.as_deref(),
            &TemplateValues {
                id: &id,
                title,
                category,
                description,
                priority: "Medium",
                owner: "Unassigned",
                created: self.now(),
            },
        );

        let mut document = Document::parse(&text);
        let unit = parse_document(&document, ParseMode::Lenient)?;
        if unit.id != id {
            return Err(WorktrackError::malformed(
                "template does not carry the {{id}} placeholder in an ID field",
            ));
        }

        let mut issues = Vec::new();
        if !opts.skip_validation {
            let mut known = Self::known_ids(&loaded);
            known.insert(id.clone());
            let outcome = validate_document(&document, true, Some(&known))?;
            issues = outcome.remaining;
            document = outcome.document;
        }
        let content = document.render();

        if !opts.dry_run {
            self.store.write_record(&file, &content)?;
            self.write_registry()?;
            info!("Created {} in {}", id, file);
        }

        Ok(CreateReport {
            id,
            file,
            content,
            issues,
            written: !opts.dry_run,
        })
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Apply mutations to a unit in order, validate the result and persist
    /// it with the registry.
    pub fn apply(
        &mut self,
        id: &WorkUnitId,
        mutations: &[Mutation],
        message: Option<&str>,
        opts: RunOptions,
    ) -> Result<ChangeReport> {
        let _guard = self.lock(opts)?;
        self.apply_locked(id, mutations, message, opts)
    }

    fn apply_locked(
        &mut self,
        id: &WorkUnitId,
        mutations: &[Mutation],
        message: Option<&str>,
        opts: RunOptions,
    ) -> Result<ChangeReport> {
        if mutations.is_empty() {
            return Err(WorktrackError::invalid_value("mutation", "(none)"));
        }

        let stored = find_by_id(&self.store, id)?;
        let before = stored.unit.clone();
        let mut ctx = MutationContext::new(self.now());
        if let Some(message) = message {
            ctx = ctx.with_message(message);
        }

        let mut document = stored.document.clone();
        let mut summaries = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let outcome = apply_mutation(&document, mutation, &ctx)?;
            debug!("{}: {}", id, outcome.summary);
            summaries.push(outcome.summary);
            document = outcome.document;
        }

        let (fixed, remaining) = if opts.skip_validation {
            (0, Vec::new())
        } else {
            let loaded = load_all(&self.store)?;
            let known = Self::known_ids(&loaded);
            let outcome = validate_document(&document, true, Some(&known))?;
            document = outcome.document;
            (outcome.fixed, outcome.remaining)
        };

        let after = parse_document(&document, ParseMode::Lenient)?;
        let content = document.render();
        let mut report = ChangeReport {
            id: id.clone(),
            file: stored.file.clone(),
            summaries,
            previous_status: before.status,
            status: after.status,
            previous_completion: before.stored_percent(),
            completion: after.stored_percent(),
            fixed,
            remaining,
            changed_lines: changed_lines(&stored.document.render(), &content),
            written: false,
            notification: None,
        };

        if opts.dry_run {
            info!(
                "Dry run: {} ({} line(s) would change)",
                report.summary(),
                report.changed_lines
            );
            return Ok(report);
        }

        self.store.write_record(&stored.file, &content)?;
        report.written = true;
        self.write_registry()?;

        if let Some(reports) = &self.reports {
            let status = (report.previous_status != report.status)
                .then_some((report.previous_status, report.status));
            let completion = (report.previous_completion != report.completion)
                .then_some((report.previous_completion, report.completion));
            let text = update_notification(id, &report.summary(), status, completion, ctx.now);
            let name = timestamped_name(&format!("{}_update", id), ctx.now);
            report.notification = Some(reports.write(ReportKind::UpdateNotification, &name, &text)?);
        }

        info!("Updated {}: {}", id, report.summary());
        Ok(report)
    }

    /// Complete a unit, then propagate it into the documentation and write
    /// its completion report.
    pub fn complete(&mut self, id: &WorkUnitId, opts: RunOptions) -> Result<CompleteReport> {
        let _guard = self.lock(opts)?;
        let change = self.apply_locked(id, &[Mutation::Complete], None, opts)?;

        let unit = if opts.dry_run {
            // The record was not written; parse what would have been.
            let stored = find_by_id(&self.store, id)?;
            let ctx = MutationContext::new(self.now());
            let outcome = apply_mutation(&stored.document, &Mutation::Complete, &ctx)?;
            parse_document(&outcome.document, ParseMode::Lenient)?
        } else {
            find_by_id(&self.store, id)?.unit
        };

        let now = self.now();
        let docs = match &self.docs {
            Some(docs) => Some(docs.update_for_unit(&unit, now.date(), opts.dry_run)?),
            None => None,
        };

        let mut report = None;
        if let (Some(reports), false) = (&self.reports, opts.dry_run) {
            let text = completion_report(&unit, docs.as_ref().unwrap_or(&DocsUpdate::default()), now);
            let name = format!("{}_completion_report.md", id);
            report = Some(reports.write(ReportKind::Completion, &name, &text)?);
        }

        Ok(CompleteReport {
            change,
            docs,
            report,
        })
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Validate one unit, or every unit when `id` is `None`. With `fix`,
    /// repaired records are written and the registry is refreshed.
    pub fn validate(&mut self, id: Option<&WorkUnitId>, fix: bool) -> Result<ValidateReport> {
        let opts = RunOptions {
            dry_run: !fix,
            skip_validation: false,
        };
        let _guard = self.lock(opts)?;
        self.validate_locked(id, fix)
    }

    fn validate_locked(&mut self, id: Option<&WorkUnitId>, fix: bool) -> Result<ValidateReport> {
        let loaded = load_all(&self.store)?;
        let known = Self::known_ids(&loaded);

        let targets: Vec<_> = match id {
            Some(id) => vec![loaded
                .find(id)
                .cloned()
                .map_or_else(|| find_by_id(&self.store, id), Ok)?],
            None => loaded.units.clone(),
        };

        let mut report = ValidateReport {
            outcomes: Vec::with_capacity(targets.len()),
            failures: if id.is_none() {
                loaded.failures.clone()
            } else {
                Vec::new()
            },
            written: Vec::new(),
        };

        for stored in targets {
            let outcome = validate_document(&stored.document, fix, Some(&known))?;
            if fix && outcome.changed() {
                self.store.write_record(&stored.file, &outcome.document.render())?;
                info!("{}: fixed {} issue(s)", outcome.id, outcome.fixed);
                report.written.push(stored.file);
            }
            report.outcomes.push(outcome);
        }

        if !report.written.is_empty() {
            self.write_registry()?;
        }
        Ok(report)
    }

    /// Write the markdown report of a validation run.
    pub fn write_validation_report(&self, report: &ValidateReport) -> Result<Option<PathBuf>> {
        let Some(reports) = &self.reports else {
            return Ok(None);
        };
        let now = self.now();
        let text = validation_report(&report.outcomes, &report.failures, now);
        let name = timestamped_name("work_unit_validation", now);
        reports.write(ReportKind::Validation, &name, &text).map(Some)
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    fn render_current_registry(&self) -> Result<(String, usize)> {
        let loaded = load_all(&self.store)?;
        let entries: Vec<RegistryEntry> = loaded
            .units
            .iter()
            .map(|s| RegistryEntry::from_unit(&s.unit, s.file.clone()))
            .collect();
        Ok((render_registry(&entries, self.now().date()), entries.len()))
    }

    fn write_registry(&mut self) -> Result<SyncReport> {
        let (expected, entries) = self.render_current_registry()?;
        let current = self.store.read_registry()?;
        let drift = check_drift(current.as_deref(), &expected);
        if !drift.in_sync {
            self.store.write_registry(&expected)?;
            debug!("Registry regenerated with {} entries", entries);
        }
        Ok(SyncReport {
            written: !drift.in_sync,
            drift,
            entries,
        })
    }

    /// Regenerate the registry, or with `check_only` only report drift.
    pub fn sync_registry(&mut self, check_only: bool) -> Result<SyncReport> {
        if check_only {
            let (expected, entries) = self.render_current_registry()?;
            let current = self.store.read_registry()?;
            let drift = check_drift(current.as_deref(), &expected);
            if !drift.in_sync {
                warn!("Registry at {} is out of date", self.store.location());
            }
            return Ok(SyncReport {
                drift,
                entries,
                written: false,
            });
        }
        let _guard = self.store.lock_for_write()?;
        self.write_registry()
    }

    /// Compare the registry entry by entry with the units. With `fix`, the
    /// registry is regenerated when any fixable issue exists.
    pub fn validate_registry(&mut self, fix: bool) -> Result<RegistryReport> {
        let _guard = self.lock(RunOptions {
            dry_run: !fix,
            skip_validation: false,
        })?;
        self.validate_registry_locked(fix)
    }

    fn validate_registry_locked(&mut self, fix: bool) -> Result<RegistryReport> {
        let units: Vec<WorkUnit> = load_all(&self.store)?
            .units
            .into_iter()
            .map(|s| s.unit)
            .collect();
        let text = self.store.read_registry()?.unwrap_or_default();
        let issues = validate_registry(&text, &units);

        if !fix || !issues.iter().any(|i| i.kind.is_fixable()) {
            return Ok(RegistryReport {
                remaining: issues.clone(),
                issues,
                regenerated: false,
            });
        }

        let (expected, _) = self.render_current_registry()?;
        self.store.write_registry(&expected)?;
        let remaining = validate_registry(&expected, &units);
        info!(
            "Registry regenerated: {} issue(s) found, {} remain",
            issues.len(),
            remaining.len()
        );
        Ok(RegistryReport {
            issues,
            regenerated: true,
            remaining,
        })
    }

    // ------------------------------------------------------------------------
    // Maintenance and listing
    // ------------------------------------------------------------------------

    /// Validate every unit and the registry in one run and file a combined
    /// report.
    pub fn maintain(&mut self, fix: bool) -> Result<MaintenanceReport> {
        let _guard = self.lock(RunOptions {
            dry_run: !fix,
            skip_validation: false,
        })?;
        let validation = self.validate_locked(None, fix)?;
        let registry = self.validate_registry_locked(fix)?;

        let mut report = None;
        if let Some(reports) = &self.reports {
            let now = self.now();
            let mut text = validation_report(&validation.outcomes, &validation.failures, now);
            text.push('\n');
            text.push_str(&registry_report(&registry.remaining, now));
            let name = timestamped_name("scheduled_validation", now);
            report = Some(reports.write(ReportKind::Validation, &name, &text)?);
        }

        Ok(MaintenanceReport {
            validation,
            registry,
            report,
        })
    }

    /// Registry projection of every unit, sorted by identifier.
    pub fn list(&self) -> Result<Vec<RegistryEntry>> {
        Ok(load_all(&self.store)?
            .units
            .iter()
            .map(|s| RegistryEntry::from_unit(&s.unit, s.file.clone()))
            .collect())
    }
}
