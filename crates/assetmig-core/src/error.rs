//! Error types for asset migration
//!
//! Provides error handling for:
//! - Tree operations (load, edit)
//! - Version probing (header scan)
//! - Upgrader execution
//! - Registry and configuration setup
//!
//! Every [`MigrationError`] is fatal for the document it was raised on; the
//! driver never writes the file back once one has been produced.

use crate::probe::FormatVersion;
use std::path::PathBuf;

/// Errors while loading or editing the tree model
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Document text is not valid YAML
    #[error("yaml syntax error: {0}")]
    Syntax(#[from] yaml_rust2::scanner::ScanError),

    /// Text after the first document
    #[error("stream holds more than one document")]
    MultipleDocuments,

    /// Parser produced an event out of place
    #[error("unexpected yaml event: {0}")]
    UnexpectedEvent(String),

    /// Root node is not a mapping
    #[error("document root is a {found}, expected a mapping")]
    NotAMapping { found: &'static str },

    /// Mapping key that cannot be represented as a string
    #[error("unsupported mapping key: {0}")]
    UnsupportedKey(String),

    /// Same key appears twice in one mapping
    #[error("duplicate mapping key: '{0}'")]
    DuplicateKey(String),

    /// Target key of a rename/insert already exists
    #[error("key already exists: '{0}'")]
    KeyExists(String),

    /// Key not present in mapping
    #[error("key not found: '{0}'")]
    KeyNotFound(String),
}

/// Errors raised by the version probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Document text is not valid YAML
    #[error("yaml syntax error: {0}")]
    Syntax(#[from] yaml_rust2::scanner::ScanError),

    /// Root node is not a mapping
    #[error("document root is a {found}, expected a mapping")]
    NotAMapping { found: &'static str },

    /// Root mapping has no type tag
    #[error("document root mapping carries no type tag")]
    MissingTypeTag,

    /// `SerializedVersion` is not a base-10 integer
    #[error("malformed SerializedVersion value '{value}'")]
    MalformedVersion { value: String },
}

/// Errors raised from inside an upgrader
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Field the upgrader relies on is absent
    #[error("missing field: {0}")]
    MissingField(String),

    /// Node found where a different kind was required
    #[error("unexpected shape at '{path}': expected {expected}, found {found}")]
    UnexpectedShape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Tree edit failed
    #[error("tree edit failed: {0}")]
    Tree(#[from] TreeError),

    /// Upgrader-specific failure
    #[error("{0}")]
    Other(String),
}

impl UpgradeError {
    /// Create upgrader-specific error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Create unexpected shape error
    pub fn unexpected_shape(
        path: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::UnexpectedShape {
            path: path.into(),
            expected,
            found,
        }
    }
}

/// Errors while building the schema registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Type registered twice
    #[error("asset type already registered: {0}")]
    DuplicateType(String),

    /// Upgrader or alias refers to an unregistered type
    #[error("unknown asset type: {0}")]
    UnknownType(String),

    /// Tag alias registered twice
    #[error("tag alias already registered: {0}")]
    DuplicateAlias(String),
}

/// Errors while loading migration configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is not valid TOML or has unknown fields
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration values out of range
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

/// Fatal migration error for one document
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Document written by a newer schema than this program supports
    #[error(
        "asset of type {asset_type} has been serialized with newer version {declared}, \
         but only version {expected} is supported"
    )]
    UnsupportedNewerVersion {
        asset_type: String,
        declared: FormatVersion,
        expected: FormatVersion,
    },

    /// Type tag missing or not known to the registry
    #[error("{}", unresolvable_message(.tag.as_deref()))]
    UnresolvableType { tag: Option<String> },

    /// `SerializedVersion` is not an integer
    #[error("malformed SerializedVersion value '{value}'")]
    MalformedVersionField { value: String },

    /// No upgrader registered for an outdated document
    #[error(
        "asset of type {asset_type} should be updated from version {declared} to {expected}, \
         but no migration path was found"
    )]
    NoMigrationPath {
        asset_type: String,
        declared: FormatVersion,
        expected: FormatVersion,
    },

    /// Several upgraders registered; picking one is not supported
    #[error(
        "asset of type {asset_type} has {} migration paths from version {declared} to {expected} \
         ({}), but selecting among them is not supported",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousMigrationPath {
        asset_type: String,
        declared: FormatVersion,
        expected: FormatVersion,
        candidates: Vec<String>,
    },

    /// Upgrader ran but left the document at the wrong version
    #[error(
        "asset of type {asset_type} was migrated from version {declared}, but its new version \
         {actual} doesn't match expected version {expected}"
    )]
    PostMigrationVersionMismatch {
        asset_type: String,
        declared: FormatVersion,
        actual: FormatVersion,
        expected: FormatVersion,
    },

    /// Upgrader reported a failure
    #[error("upgrader '{upgrader}' failed on asset of type {asset_type} ({declared} -> {expected}): {source}")]
    Upgrader {
        asset_type: String,
        upgrader: String,
        declared: FormatVersion,
        expected: FormatVersion,
        #[source]
        source: UpgradeError,
    },

    /// Document could not be loaded into the tree model
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// File larger than the configured limit
    #[error("file too large: {path} is {size} bytes (max: {max})")]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    /// IO error during read or write-back
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn unresolvable_message(tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("cannot resolve asset type from tag '!{tag}'"),
        None => "cannot resolve asset type: document root carries no type tag".to_string(),
    }
}

impl MigrationError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if error reports a declared/expected version disagreement
    #[inline]
    #[must_use]
    pub fn is_version_skew(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedNewerVersion { .. }
                | Self::NoMigrationPath { .. }
                | Self::AmbiguousMigrationPath { .. }
                | Self::PostMigrationVersionMismatch { .. }
        )
    }

    /// Asset type the error refers to, when known
    #[must_use]
    pub fn asset_type(&self) -> Option<&str> {
        match self {
            Self::UnsupportedNewerVersion { asset_type, .. }
            | Self::NoMigrationPath { asset_type, .. }
            | Self::AmbiguousMigrationPath { asset_type, .. }
            | Self::PostMigrationVersionMismatch { asset_type, .. }
            | Self::Upgrader { asset_type, .. } => Some(asset_type),
            _ => None,
        }
    }
}

impl From<ProbeError> for MigrationError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Syntax(e) => Self::Tree(TreeError::Syntax(e)),
            ProbeError::NotAMapping { found } => Self::Tree(TreeError::NotAMapping { found }),
            ProbeError::MissingTypeTag => Self::UnresolvableType { tag: None },
            ProbeError::MalformedVersion { value } => Self::MalformedVersionField { value },
        }
    }
}

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;
