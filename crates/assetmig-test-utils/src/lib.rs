//! Testing utilities for assetmig workspace
//!
//! Shared upgraders, registry builders, on-disk asset fixtures and log capture.

#![allow(missing_docs)]

use assetmig_core::{
    AssetUpgrader, FormatVersion, MappingNode, SchemaRegistry, UpgradeContext, UpgradeError,
    UpgraderDescriptor,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

pub const FOO: &str = "Foo";
pub const FOO_VERSION: FormatVersion = 2;

/// Renames `OldName` to `NewName` and stamps the target version
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameFieldUpgrader;

impl AssetUpgrader for RenameFieldUpgrader {
    fn upgrade(&self, ctx: &UpgradeContext<'_>, root: &mut MappingNode) -> Result<(), UpgradeError> {
        if !root.contains_key("OldName") {
            return Err(UpgradeError::MissingField("OldName".to_string()));
        }
        root.rename_key("OldName", "NewName")?;
        root.insert("SerializedVersion", ctx.to_version());
        ctx.verbose("renamed OldName to NewName");
        Ok(())
    }
}

/// Edits the document but forgets to bump its version
#[derive(Debug, Default, Clone, Copy)]
pub struct StaleVersionUpgrader;

impl AssetUpgrader for StaleVersionUpgrader {
    fn upgrade(&self, _ctx: &UpgradeContext<'_>, root: &mut MappingNode) -> Result<(), UpgradeError> {
        root.insert("Touched", true);
        Ok(())
    }
}

/// Always fails after editing the tree
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingUpgrader;

impl AssetUpgrader for FailingUpgrader {
    fn upgrade(&self, ctx: &UpgradeContext<'_>, root: &mut MappingNode) -> Result<(), UpgradeError> {
        root.insert("SerializedVersion", ctx.to_version());
        Err(UpgradeError::other("refusing to upgrade"))
    }
}

pub fn rename_descriptor() -> UpgraderDescriptor {
    UpgraderDescriptor::from_default::<RenameFieldUpgrader>(FOO, "rename-old-name")
}

/// Registry with `Foo` at version 2 and the given upgraders
pub fn foo_registry_with(descriptors: impl IntoIterator<Item = UpgraderDescriptor>) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register_type(FOO, FOO_VERSION).unwrap();
    for descriptor in descriptors {
        registry.register_upgrader(descriptor).unwrap();
    }
    registry
}

/// Registry with `Foo` at version 2 and the rename upgrader
pub fn foo_registry() -> SchemaRegistry {
    foo_registry_with([rename_descriptor()])
}

/// `Foo` document at `version` with the pre-rename field
pub fn foo_document(version: FormatVersion) -> String {
    format!("!Foo\nId: x\nSerializedVersion: {version}\nOldName: hello\n")
}

/// `Foo` document in its migrated shape
pub fn migrated_foo_document() -> String {
    format!("!Foo\nId: x\nSerializedVersion: {FOO_VERSION}\nNewName: hello\n")
}

/// Temporary directory holding asset files
#[derive(Debug)]
pub struct AssetDir {
    dir: TempDir,
}

impl AssetDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `text` to `name` inside the directory
    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    /// File names currently in the directory, sorted
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for AssetDir {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory log sink for `tracing_subscriber::fmt`
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a debug-level subscriber on this thread and return its output
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture.contents())
}
