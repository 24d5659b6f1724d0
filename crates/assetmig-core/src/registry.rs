//! Schema registry
//!
//! Maps asset type names to their current serialization version and the
//! upgraders able to bring older documents up to it. The registry is built
//! once by the host and handed to the driver; nothing here discovers types
//! on its own.
//!
//! - Types are keyed by name (tag text without the leading `!`)
//! - Tag aliases map legacy tag names onto registered types
//! - Upgraders are stored as descriptors holding a factory, so each
//!   migration runs a fresh instance

use crate::error::{RegistryError, UpgradeError};
use crate::probe::FormatVersion;
use crate::tree::MappingNode;
use crate::upgrader::{AssetUpgrader, FnUpgrader, UpgradeContext};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type UpgraderFactory = dyn Fn() -> Box<dyn AssetUpgrader> + Send + Sync;

/// Registered upgrader: owning type, display name and a way to build it
#[derive(Clone)]
pub struct UpgraderDescriptor {
    asset_type: String,
    name: String,
    factory: Arc<UpgraderFactory>,
}

impl UpgraderDescriptor {
    /// Create descriptor from factory
    pub fn new<F>(asset_type: impl Into<String>, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn AssetUpgrader> + Send + Sync + 'static,
    {
        Self {
            asset_type: asset_type.into(),
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Descriptor building `U::default()` on each instantiation
    pub fn from_default<U>(asset_type: impl Into<String>, name: impl Into<String>) -> Self
    where
        U: AssetUpgrader + Default + 'static,
    {
        Self::new(asset_type, name, || Box::new(U::default()))
    }

    /// Descriptor wrapping a closure
    pub fn from_fn<F>(asset_type: impl Into<String>, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&UpgradeContext<'_>, &mut MappingNode) -> Result<(), UpgradeError>
            + Clone
            + Send
            + Sync
            + 'static,
    {
        Self::new(asset_type, name, move || Box::new(FnUpgrader::new(f.clone())))
    }

    /// Asset type this upgrader migrates
    #[inline]
    #[must_use]
    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    /// Upgrader name used in logs and errors
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a fresh upgrader instance
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn AssetUpgrader> {
        (self.factory)()
    }
}

impl fmt::Debug for UpgraderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgraderDescriptor")
            .field("asset_type", &self.asset_type)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct TypeSchema {
    expected_version: FormatVersion,
    upgraders: Vec<UpgraderDescriptor>,
}

/// Registry of asset types, current versions and upgraders
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeSchema>,
    tag_aliases: HashMap<String, String>,
}

impl SchemaRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset type with its current serialization version
    ///
    /// # Errors
    /// `RegistryError::DuplicateType` if the name is already registered
    pub fn register_type(
        &mut self,
        name: impl Into<String>,
        expected_version: FormatVersion,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(RegistryError::DuplicateType(name));
        }
        self.types.insert(
            name,
            TypeSchema {
                expected_version,
                upgraders: Vec::new(),
            },
        );
        Ok(())
    }

    /// Builder form of [`Self::register_type`]
    ///
    /// # Errors
    /// Same as [`Self::register_type`]
    pub fn with_type(
        mut self,
        name: impl Into<String>,
        expected_version: FormatVersion,
    ) -> Result<Self, RegistryError> {
        self.register_type(name, expected_version)?;
        Ok(self)
    }

    /// Builder form of [`Self::register_upgrader`]
    ///
    /// # Errors
    /// Same as [`Self::register_upgrader`]
    pub fn with_upgrader(mut self, descriptor: UpgraderDescriptor) -> Result<Self, RegistryError> {
        self.register_upgrader(descriptor)?;
        Ok(self)
    }

    /// Map a legacy tag name onto a registered type
    ///
    /// # Errors
    /// - `RegistryError::UnknownType` if `target` is not registered
    /// - `RegistryError::DuplicateAlias` if `alias` is already an alias or a type name
    pub fn register_tag_alias(
        &mut self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let alias = alias.into();
        let target = target.into();
        if !self.types.contains_key(&target) {
            return Err(RegistryError::UnknownType(target));
        }
        if self.tag_aliases.contains_key(&alias) || self.types.contains_key(&alias) {
            return Err(RegistryError::DuplicateAlias(alias));
        }
        self.tag_aliases.insert(alias, target);
        Ok(())
    }

    /// Attach an upgrader to its asset type
    ///
    /// # Errors
    /// `RegistryError::UnknownType` if the descriptor's type is not registered
    pub fn register_upgrader(&mut self, descriptor: UpgraderDescriptor) -> Result<(), RegistryError> {
        let schema = self
            .types
            .get_mut(descriptor.asset_type())
            .ok_or_else(|| RegistryError::UnknownType(descriptor.asset_type().to_string()))?;
        schema.upgraders.push(descriptor);
        Ok(())
    }

    /// Resolve a type tag (with or without leading `!`) to a registered type name
    #[must_use]
    pub fn resolve_tag(&self, tag: &str) -> Option<&str> {
        let name = tag.strip_prefix('!').unwrap_or(tag);
        if let Some(target) = self.tag_aliases.get(name) {
            return Some(target.as_str());
        }
        self.types.get_key_value(name).map(|(key, _)| key.as_str())
    }

    /// Current serialization version of a type
    #[must_use]
    pub fn expected_version(&self, asset_type: &str) -> Option<FormatVersion> {
        self.types.get(asset_type).map(|s| s.expected_version)
    }

    /// Upgraders registered for a type, in registration order
    #[must_use]
    pub fn upgraders(&self, asset_type: &str) -> &[UpgraderDescriptor] {
        self.types
            .get(asset_type)
            .map_or(&[], |s| s.upgraders.as_slice())
    }

    /// Check if a type is registered
    #[inline]
    #[must_use]
    pub fn contains_type(&self, asset_type: &str) -> bool {
        self.types.contains_key(asset_type)
    }

    /// Registered type names, sorted
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no type is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
