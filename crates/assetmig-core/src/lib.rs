//! Asset schema migration
//!
//! Upgrades YAML asset documents, written by older versions of an asset
//! schema, to the version the running program expects. Each document's root
//! mapping carries a type tag (`!TypeName`) and a `SerializedVersion` field;
//! a host-supplied [`SchemaRegistry`] says which version is current for each
//! type and which upgrader rewrites older documents.
//!
//! # Pipeline
//!
//! ```text
//! path → extension filter → probe header → compare versions
//!      → load tree → select upgrader → upgrade → check version → atomic write
//! ```
//!
//! - Current documents are read only up to their `SerializedVersion` field and never written
//! - Documents from a newer schema are refused
//! - The file is replaced only after every check passes
//!
//! # Example
//!
//! ```rust
//! use assetmig_core::prelude::*;
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register_type("Foo", 2)?;
//! registry.register_upgrader(UpgraderDescriptor::from_fn("Foo", "rename-old-name", |_ctx, root| {
//!     root.rename_key("OldName", "NewName")?;
//!     root.insert("SerializedVersion", 2u32);
//!     Ok(())
//! }))?;
//!
//! let driver = MigrationDriver::new(registry);
//! let text = "!Foo\nId: x\nSerializedVersion: 1\nOldName: hello\n";
//! let migrated = driver.migrate_text("foo.yaml", text)?;
//! assert_eq!(
//!     migrated.as_deref(),
//!     Some("!Foo\nId: x\nSerializedVersion: 2\nNewName: hello\n")
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod driver;
pub mod error;
pub mod probe;
pub mod registry;
pub mod select;
pub mod tree;
pub mod upgrader;
pub mod validate;

pub use config::MigrationConfig;
pub use driver::{write_back, BatchEntry, BatchSummary, MigrationDriver, MigrationOutcome};
pub use error::{
    ConfigError, MigrationError, MigrationResult, ProbeError, RegistryError, TreeError, UpgradeError,
};
pub use probe::{probe_version, FormatVersion, VersionTag};
pub use registry::{SchemaRegistry, UpgraderDescriptor};
pub use select::{select_upgrader, UpgraderSelection};
pub use tree::{Document, MappingNode, Node, ScalarKind, ScalarNode, SequenceNode};
pub use upgrader::{execute_upgrade, AssetUpgrader, FnUpgrader, UpgradeContext};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosts and upgrader authors
    pub use crate::config::MigrationConfig;
    pub use crate::driver::{MigrationDriver, MigrationOutcome};
    pub use crate::error::{MigrationError, UpgradeError};
    pub use crate::registry::{SchemaRegistry, UpgraderDescriptor};
    pub use crate::tree::{MappingNode, Node, ScalarNode, SequenceNode};
    pub use crate::upgrader::{AssetUpgrader, UpgradeContext};
}
