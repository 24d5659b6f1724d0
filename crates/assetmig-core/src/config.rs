//! Migration configuration
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! preferred_indent = 4
//! detect_indent = true
//! asset_extensions = ["yaml", "yml"]
//! max_file_size = 10485760
//! ```

use crate::error::ConfigError;
use crate::tree::detect_indent;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Widest indentation accepted for write-back
pub const MAX_INDENT: usize = 8;

/// Default file size limit (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Indentation used when writing back (and when none can be detected)
    pub preferred_indent: usize,
    /// Reuse the source document's indentation when it can be detected
    pub detect_indent: bool,
    /// File extensions treated as asset documents; empty accepts every path
    pub asset_extensions: Vec<String>,
    /// Files larger than this are refused before being read
    pub max_file_size: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            preferred_indent: 4,
            detect_indent: true,
            asset_extensions: vec!["yaml".to_string(), "yml".to_string()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With preferred indentation
    #[inline]
    #[must_use]
    pub fn with_preferred_indent(mut self, indent: usize) -> Self {
        self.preferred_indent = indent;
        self
    }

    /// With indentation detection on or off
    #[inline]
    #[must_use]
    pub fn with_detect_indent(mut self, detect: bool) -> Self {
        self.detect_indent = detect;
        self
    }

    /// With asset extensions (without dot)
    #[must_use]
    pub fn with_asset_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// With file size limit in bytes
    #[inline]
    #[must_use]
    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` for bad TOML or unknown fields
    /// - `ConfigError::Invalid` for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_INDENT).contains(&self.preferred_indent) {
            return Err(ConfigError::Invalid(format!(
                "preferred_indent must be between 1 and {MAX_INDENT}, got {}",
                self.preferred_indent
            )));
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("max_file_size must be non-zero".to_string()));
        }
        if let Some(bad) = self
            .asset_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(ConfigError::Invalid(format!(
                "asset extension '{bad}' must be non-empty and given without a dot"
            )));
        }
        Ok(())
    }

    /// Check if a path has one of the asset extensions (case-insensitive)
    #[must_use]
    pub fn accepts_path(&self, path: &Path) -> bool {
        if self.asset_extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.asset_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    /// Indentation to write `text` back with
    #[must_use]
    pub fn indent_for(&self, text: &str) -> usize {
        if self.detect_indent {
            if let Some(width) = detect_indent(text).filter(|w| (1..=MAX_INDENT).contains(w)) {
                return width;
            }
        }
        self.preferred_indent
    }
}
