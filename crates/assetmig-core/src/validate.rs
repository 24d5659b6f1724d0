//! Post-migration version check
//!
//! An upgrader is trusted to edit the tree however it likes, but the document
//! it leaves behind must declare exactly the type's current version before
//! anything is written.

use crate::error::MigrationError;
use crate::probe::{parse_version_text, FormatVersion, VERSION_KEY};
use crate::tree::{MappingNode, Node};

/// Read `SerializedVersion` from a root mapping; absent means 0
///
/// # Errors
/// `MigrationError::MalformedVersionField` if the field is not an integer scalar
pub fn read_tree_version(root: &MappingNode) -> Result<FormatVersion, MigrationError> {
    match root.get(VERSION_KEY) {
        None => Ok(0),
        Some(Node::Scalar(scalar)) => {
            parse_version_text(scalar.value()).ok_or_else(|| MigrationError::MalformedVersionField {
                value: scalar.value().to_string(),
            })
        }
        Some(other) => Err(MigrationError::MalformedVersionField {
            value: format!("<{}>", other.kind_name()),
        }),
    }
}

/// Verify the migrated tree declares the expected version
///
/// # Errors
/// - `MigrationError::PostMigrationVersionMismatch` if the version differs
/// - `MigrationError::MalformedVersionField` if it cannot be read
pub fn ensure_version(
    root: &MappingNode,
    asset_type: &str,
    declared: FormatVersion,
    expected: FormatVersion,
) -> Result<(), MigrationError> {
    let actual = read_tree_version(root)?;
    if actual == expected {
        return Ok(());
    }
    Err(MigrationError::PostMigrationVersionMismatch {
        asset_type: asset_type.to_string(),
        declared,
        actual,
        expected,
    })
}
