//! Upgrader selection
//!
//! Exactly one registered upgrader is required to migrate an outdated
//! document. Zero or several are both reported, with the candidates kept so
//! the error can name them.

use crate::error::MigrationError;
use crate::probe::FormatVersion;
use crate::registry::UpgraderDescriptor;

/// Outcome of looking up the upgrader for a type
#[derive(Debug, Clone)]
pub enum UpgraderSelection<'a> {
    /// No upgrader registered
    NotFound,
    /// Exactly one upgrader
    Unique(&'a UpgraderDescriptor),
    /// More than one upgrader; choosing among them is not supported
    Ambiguous(Vec<&'a UpgraderDescriptor>),
}

impl<'a> UpgraderSelection<'a> {
    /// Check if a single upgrader was found
    #[inline]
    #[must_use]
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Unique(_))
    }

    /// Unwrap the unique upgrader or turn the outcome into a migration error
    ///
    /// # Errors
    /// - `MigrationError::NoMigrationPath` for [`UpgraderSelection::NotFound`]
    /// - `MigrationError::AmbiguousMigrationPath` for [`UpgraderSelection::Ambiguous`]
    pub fn into_unique(
        self,
        asset_type: &str,
        declared: FormatVersion,
        expected: FormatVersion,
    ) -> Result<&'a UpgraderDescriptor, MigrationError> {
        match self {
            Self::Unique(descriptor) => Ok(descriptor),
            Self::NotFound => Err(MigrationError::NoMigrationPath {
                asset_type: asset_type.to_string(),
                declared,
                expected,
            }),
            Self::Ambiguous(candidates) => Err(MigrationError::AmbiguousMigrationPath {
                asset_type: asset_type.to_string(),
                declared,
                expected,
                candidates: candidates.iter().map(|d| d.name().to_string()).collect(),
            }),
        }
    }
}

/// Classify the upgraders registered for one type
#[must_use]
pub fn select_upgrader(candidates: &[UpgraderDescriptor]) -> UpgraderSelection<'_> {
    match candidates {
        [] => UpgraderSelection::NotFound,
        [only] => UpgraderSelection::Unique(only),
        many => UpgraderSelection::Ambiguous(many.iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> UpgraderDescriptor {
        UpgraderDescriptor::from_fn("Foo", name, |_ctx, _root| Ok(()))
    }

    #[test]
    fn empty_is_not_found() {
        let selection = select_upgrader(&[]);
        assert!(matches!(selection, UpgraderSelection::NotFound));
        let err = selection.into_unique("Foo", 1, 2).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::NoMigrationPath { declared: 1, expected: 2, .. }
        ));
    }

    #[test]
    fn single_is_unique() {
        let candidates = [descriptor("only")];
        let selection = select_upgrader(&candidates);
        assert!(selection.is_unique());
        assert_eq!(selection.into_unique("Foo", 1, 2).unwrap().name(), "only");
    }

    #[test]
    fn several_are_ambiguous() {
        let candidates = [descriptor("a"), descriptor("b")];
        let err = select_upgrader(&candidates)
            .into_unique("Foo", 1, 2)
            .unwrap_err();
        match err {
            MigrationError::AmbiguousMigrationPath { candidates, .. } => {
                assert_eq!(candidates, ["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
