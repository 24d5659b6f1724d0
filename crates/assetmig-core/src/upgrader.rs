//! Upgrader capability and executor
//!
//! An upgrader rewrites an outdated document tree into the current shape of
//! its asset type. It receives the mutable root mapping and is free to add,
//! remove, rename or transform any node, including `SerializedVersion`.

use crate::error::{MigrationError, UpgradeError};
use crate::probe::FormatVersion;
use crate::registry::UpgraderDescriptor;
use crate::tree::MappingNode;
use std::fmt::{self, Display};
use std::path::Path;

/// Per-type upgrade logic
///
/// Implement this trait for each asset type whose on-disk shape changed.
pub trait AssetUpgrader: Send + Sync {
    /// Rewrite the document tree in place
    ///
    /// # Errors
    /// Any error aborts the migration; the file is left untouched.
    fn upgrade(&self, ctx: &UpgradeContext<'_>, root: &mut MappingNode) -> Result<(), UpgradeError>;
}

/// Adapter turning a closure into an [`AssetUpgrader`]
#[derive(Clone)]
pub struct FnUpgrader<F>(F);

impl<F> FnUpgrader<F>
where
    F: Fn(&UpgradeContext<'_>, &mut MappingNode) -> Result<(), UpgradeError> + Send + Sync,
{
    /// Wrap closure
    #[inline]
    #[must_use]
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> AssetUpgrader for FnUpgrader<F>
where
    F: Fn(&UpgradeContext<'_>, &mut MappingNode) -> Result<(), UpgradeError> + Send + Sync,
{
    fn upgrade(&self, ctx: &UpgradeContext<'_>, root: &mut MappingNode) -> Result<(), UpgradeError> {
        (self.0)(ctx, root)
    }
}

impl<F> fmt::Debug for FnUpgrader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnUpgrader")
    }
}

/// What an upgrader is migrating, plus a logging sink scoped to it
#[derive(Debug, Clone, Copy)]
pub struct UpgradeContext<'a> {
    path: &'a Path,
    asset_type: &'a str,
    from_version: FormatVersion,
    to_version: FormatVersion,
}

impl<'a> UpgradeContext<'a> {
    /// Create context
    #[inline]
    #[must_use]
    pub fn new(
        path: &'a Path,
        asset_type: &'a str,
        from_version: FormatVersion,
        to_version: FormatVersion,
    ) -> Self {
        Self {
            path,
            asset_type,
            from_version,
            to_version,
        }
    }

    /// Document being migrated
    #[inline]
    #[must_use]
    pub fn path(&self) -> &'a Path {
        self.path
    }

    /// Resolved asset type
    #[inline]
    #[must_use]
    pub fn asset_type(&self) -> &'a str {
        self.asset_type
    }

    /// Version declared by the document
    #[inline]
    #[must_use]
    pub fn from_version(&self) -> FormatVersion {
        self.from_version
    }

    /// Version the document must end up at
    #[inline]
    #[must_use]
    pub fn to_version(&self) -> FormatVersion {
        self.to_version
    }

    /// Emit a verbose (debug level) message
    pub fn verbose(&self, message: impl Display) {
        tracing::debug!(
            path = %self.path.display(),
            asset_type = self.asset_type,
            from = self.from_version,
            to = self.to_version,
            "{message}"
        );
    }

    /// Emit an informational message
    pub fn info(&self, message: impl Display) {
        tracing::info!(
            path = %self.path.display(),
            asset_type = self.asset_type,
            from = self.from_version,
            to = self.to_version,
            "{message}"
        );
    }

    /// Emit a warning
    pub fn warning(&self, message: impl Display) {
        tracing::warn!(
            path = %self.path.display(),
            asset_type = self.asset_type,
            from = self.from_version,
            to = self.to_version,
            "{message}"
        );
    }
}

/// Instantiate the selected upgrader and run it against the root mapping
///
/// The executor does not interpret the edits; checking the resulting version
/// is left to [`crate::validate`].
///
/// # Errors
/// `MigrationError::Upgrader` wrapping whatever the upgrader returned
pub fn execute_upgrade(
    descriptor: &UpgraderDescriptor,
    ctx: &UpgradeContext<'_>,
    root: &mut MappingNode,
) -> Result<(), MigrationError> {
    let upgrader = descriptor.instantiate();
    tracing::debug!(
        upgrader = descriptor.name(),
        asset_type = ctx.asset_type(),
        "running upgrader"
    );

    upgrader
        .upgrade(ctx, root)
        .map_err(|source| MigrationError::Upgrader {
            asset_type: ctx.asset_type().to_string(),
            upgrader: descriptor.name().to_string(),
            declared: ctx.from_version(),
            expected: ctx.to_version(),
            source,
        })
}
