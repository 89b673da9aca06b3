//! Filesystem store.
//!
//! Records are the `.md` files directly inside the work units directory.
//! Writes are atomic: content goes to a `.tmp` sibling which is synced and
//! then renamed over the target. With backups enabled the previous content
//! is first copied to a `.bak` sibling.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;
use walkdir::WalkDir;

use super::{WorkUnitStore, WriteGuard};
use crate::error::{LookupKind, Result, WorktrackError};

/// Lock file guarding mutating commands.
const LOCK_FILE: &str = ".worktrack.lock";

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Backup file suffix.
const BAK_SUFFIX: &str = ".bak";

/// Store backed by a directory of markdown files.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
    registry_file: String,
    excluded: Vec<String>,
    backups: bool,
    locking: bool,
}

impl FsStore {
    /// Store over `dir` with a `registry.md` registry, backups and locking.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            registry_file: "registry.md".to_string(),
            excluded: Vec::new(),
            backups: true,
            locking: true,
        }
    }

    #[must_use]
    pub fn with_registry_file(mut self, name: impl Into<String>) -> Self {
        self.registry_file = name.into();
        self
    }

    /// File names that are never treated as records.
    #[must_use]
    pub fn with_excluded(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.excluded = names.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    #[must_use]
    pub fn with_locking(mut self, enabled: bool) -> Self {
        self.locking = enabled;
        self
    }

    /// Directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a record or the registry.
    #[must_use]
    pub fn path_of(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn is_record(&self, name: &str) -> bool {
        name.ends_with(".md")
            && !name.starts_with('.')
            && name != self.registry_file
            && !self.excluded.iter().any(|e| e == name)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_atomic(path, content, self.backups)
    }
}

/// Replace `path` with `content` through a synced `.tmp` sibling and a
/// rename. With `backup`, existing content is first copied to `.bak`.
pub(crate) fn write_atomic(path: &Path, content: &str, backup: bool) -> Result<()> {
    if backup && path.exists() {
        let backup = sibling(path, BAK_SUFFIX);
        fs::copy(path, &backup)?;
        debug!("Backed up {} to {}", path.display(), backup.display());
    }

    let tmp_path = sibling(path, TMP_SUFFIX);
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(content.as_bytes())?;
    tmp_file.sync_all()?;

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl WorkUnitStore for FsStore {
    fn list_records(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            debug!("Work units directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| WorktrackError::Other(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_record(&name) {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_record(&self, file: &str) -> Result<String> {
        let path = self.path_of(file);
        if !path.is_file() {
            return Err(WorktrackError::not_found(
                LookupKind::WorkUnit,
                path.display().to_string(),
            ));
        }
        Ok(fs::read_to_string(path)?)
    }

    fn write_record(&mut self, file: &str, content: &str) -> Result<()> {
        let path = self.path_of(file);
        self.write_atomic(&path, content)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn read_registry(&self) -> Result<Option<String>> {
        let path = self.path_of(&self.registry_file);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write_registry(&mut self, content: &str) -> Result<()> {
        let path = self.path_of(&self.registry_file);
        self.write_atomic(&path, content)
    }

    fn lock_for_write(&self) -> Result<WriteGuard> {
        if !self.locking {
            return Ok(WriteGuard::none());
        }
        fs::create_dir_all(&self.dir)?;

        let path = self.path_of(LOCK_FILE);
        let file = File::create(&path)?;
        FileExt::lock_exclusive(&file).map_err(|e| WorktrackError::Lock {
            path: path.clone(),
            message: e.to_string(),
        })?;
        debug!("Acquired write lock {}", path.display());
        Ok(WriteGuard::holding(file))
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
