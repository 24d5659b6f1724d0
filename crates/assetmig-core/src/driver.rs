//! Migration driver
//!
//! One call migrates one document, all or nothing:
//!
//! 1. Extension filter: non-asset paths are skipped unread
//! 2. Probe the header for type tag and declared version
//! 3. Compare against the registry's expected version
//! 4. Load the full tree, select the unique upgrader and run it
//! 5. Check the resulting version, render, and atomically replace the file
//!
//! Any failure before step 5 completes leaves the file untouched.

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::probe::{probe_version, FormatVersion, VersionTag};
use crate::registry::SchemaRegistry;
use crate::select::select_upgrader;
use crate::tree::{parse_document, render_document};
use crate::upgrader::{execute_upgrade, UpgradeContext};
use crate::validate::ensure_version;
use indexmap::IndexSet;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a successful migration call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Path does not have an asset extension; file was not read
    NotAnAsset,
    /// Document already at the expected version
    UpToDate(VersionTag),
    /// Document rewritten at the expected version
    Migrated {
        /// Resolved asset type
        asset_type: String,
        /// Version before migration
        from: FormatVersion,
        /// Version written
        to: FormatVersion,
    },
}

impl MigrationOutcome {
    /// Check if the file was rewritten
    #[inline]
    #[must_use]
    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated { .. })
    }
}

/// Result for one path of a batch
#[derive(Debug)]
pub struct BatchEntry {
    /// Path as given
    pub path: PathBuf,
    /// Outcome or error for this path alone
    pub result: MigrationResult<MigrationOutcome>,
}

/// Counts over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files rewritten
    pub migrated: usize,
    /// Files already current
    pub up_to_date: usize,
    /// Paths skipped by the extension filter
    pub skipped: usize,
    /// Paths that failed
    pub failed: usize,
}

impl BatchSummary {
    /// Tally batch entries
    #[must_use]
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut summary, entry| {
            match &entry.result {
                Ok(MigrationOutcome::Migrated { .. }) => summary.migrated += 1,
                Ok(MigrationOutcome::UpToDate(_)) => summary.up_to_date += 1,
                Ok(MigrationOutcome::NotAnAsset) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
            summary
        })
    }
}

enum Plan {
    UpToDate(VersionTag),
    Rewrite {
        asset_type: String,
        from: FormatVersion,
        to: FormatVersion,
        text: String,
    },
}

/// Migrates asset documents against an injected schema registry
#[derive(Debug, Clone)]
pub struct MigrationDriver {
    registry: Arc<SchemaRegistry>,
    config: MigrationConfig,
}

impl MigrationDriver {
    /// Create driver with default configuration
    #[must_use]
    pub fn new(registry: impl Into<Arc<SchemaRegistry>>) -> Self {
        Self::with_config(registry, MigrationConfig::default())
    }

    /// Create driver with configuration
    #[must_use]
    pub fn with_config(registry: impl Into<Arc<SchemaRegistry>>, config: MigrationConfig) -> Self {
        Self {
            registry: registry.into(),
            config,
        }
    }

    /// Registry in use
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Migrate one document in place
    ///
    /// Returns `true` if the file was rewritten, `false` if it was already
    /// current or is not an asset document.
    ///
    /// # Errors
    /// Any [`MigrationError`]; the file is unchanged whenever an error is returned.
    pub fn migrate(&self, path: impl AsRef<Path>) -> MigrationResult<bool> {
        self.migrate_with_outcome(path)
            .map(|outcome| outcome.is_migrated())
    }

    /// Migrate one document in place, reporting what happened
    ///
    /// # Errors
    /// Same as [`Self::migrate`]
    pub fn migrate_with_outcome(&self, path: impl AsRef<Path>) -> MigrationResult<MigrationOutcome> {
        let path = path.as_ref();
        if !self.config.accepts_path(path) {
            tracing::trace!(path = %path.display(), "not an asset document, skipping");
            return Ok(MigrationOutcome::NotAnAsset);
        }

        let text = self.read_source(path)?;
        match self.plan(path, &text)? {
            Plan::UpToDate(tag) => Ok(MigrationOutcome::UpToDate(tag)),
            Plan::Rewrite {
                asset_type,
                from,
                to,
                text,
            } => {
                write_back(path, &text)?;
                tracing::info!(
                    path = %path.display(),
                    asset_type = %asset_type,
                    "{} updated from version {from} to version {to}",
                    path.display()
                );
                Ok(MigrationOutcome::Migrated {
                    asset_type,
                    from,
                    to,
                })
            }
        }
    }

    /// Run the migration pipeline on in-memory text
    ///
    /// `path` is only used for logging and the upgrade context. Returns the
    /// rewritten text, or `None` if the document is already current.
    ///
    /// # Errors
    /// Same as [`Self::migrate`], minus IO
    pub fn migrate_text(&self, path: impl AsRef<Path>, text: &str) -> MigrationResult<Option<String>> {
        match self.plan(path.as_ref(), text)? {
            Plan::UpToDate(_) => Ok(None),
            Plan::Rewrite { text, .. } => Ok(Some(text)),
        }
    }

    /// Migrate several files in parallel
    ///
    /// Repeated paths are migrated once. Each entry carries its own result; a
    /// failure on one path has no effect on the others.
    pub fn migrate_batch<P>(&self, paths: &[P]) -> Vec<BatchEntry>
    where
        P: AsRef<Path> + Sync,
    {
        let unique: IndexSet<&Path> = paths.iter().map(|p| p.as_ref()).collect();
        let unique: Vec<&Path> = unique.into_iter().collect();

        let entries: Vec<BatchEntry> = unique
            .par_iter()
            .map(|path| BatchEntry {
                path: path.to_path_buf(),
                result: self.migrate_with_outcome(path),
            })
            .collect();

        let summary = BatchSummary::from_entries(&entries);
        tracing::debug!(
            migrated = summary.migrated,
            up_to_date = summary.up_to_date,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        entries
    }

    fn read_source(&self, path: &Path) -> MigrationResult<String> {
        let size = fs::metadata(path)
            .map_err(|e| MigrationError::io_error(path, e))?
            .len();
        if size > self.config.max_file_size {
            return Err(MigrationError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                max: self.config.max_file_size,
            });
        }
        fs::read_to_string(path).map_err(|e| MigrationError::io_error(path, e))
    }

    fn plan(&self, path: &Path, text: &str) -> MigrationResult<Plan> {
        let probed = probe_version(text)?;
        let asset_type = self
            .registry
            .resolve_tag(&probed.type_tag)
            .ok_or_else(|| MigrationError::UnresolvableType {
                tag: Some(probed.type_tag.clone()),
            })?;
        let expected = self
            .registry
            .expected_version(asset_type)
            .ok_or_else(|| MigrationError::UnresolvableType {
                tag: Some(probed.type_tag.clone()),
            })?;
        let declared = probed.version;

        tracing::trace!(
            path = %path.display(),
            asset_type,
            declared,
            expected,
            "probed document header"
        );

        match declared.cmp(&expected) {
            Ordering::Greater => {
                return Err(MigrationError::UnsupportedNewerVersion {
                    asset_type: asset_type.to_string(),
                    declared,
                    expected,
                });
            }
            Ordering::Equal => return Ok(Plan::UpToDate(VersionTag::new(asset_type, declared))),
            Ordering::Less => {}
        }

        tracing::debug!(
            path = %path.display(),
            asset_type,
            "{} needs update, from version {declared} to version {expected}",
            path.display()
        );

        let mut document = parse_document(text)?;
        let descriptor = select_upgrader(self.registry.upgraders(asset_type))
            .into_unique(asset_type, declared, expected)?;
        let ctx = UpgradeContext::new(path, asset_type, declared, expected);
        execute_upgrade(descriptor, &ctx, document.root_mut())?;
        ensure_version(document.root(), asset_type, declared, expected)?;

        let indent = self.config.indent_for(text);
        Ok(Plan::Rewrite {
            asset_type: asset_type.to_string(),
            from: declared,
            to: expected,
            text: render_document(&document, indent),
        })
    }
}

/// Atomically replace `path` with `text`
///
/// Writes a temporary file next to the target, syncs it, carries over the
/// target's permissions and renames it into place.
///
/// # Errors
/// `MigrationError::Io` on any filesystem failure; the target is unchanged
pub fn write_back(path: &Path, text: &str) -> MigrationResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let io = |e: std::io::Error| MigrationError::io_error(path, e);

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io)?;
    temp.write_all(text.as_bytes()).map_err(io)?;
    temp.as_file().sync_all().map_err(io)?;
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions()).map_err(io)?;
    }
    temp.persist(path).map_err(|e| io(e.error))?;
    Ok(())
}
