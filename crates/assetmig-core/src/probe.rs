//! Version probe
//!
//! Extracts the `(type tag, SerializedVersion)` pair from a document without
//! building its tree. Parser events are pulled one at a time: the root
//! mapping's tag is read, then top-level keys are walked in order, skipping
//! every value by nesting depth, until `SerializedVersion` is reached. Nothing
//! after the version is parsed, so the cost is bounded by the version's
//! position and syntax errors further down are left for the full load.
//!
//! # Key order
//!
//! Documents are written with `Id` first and `SerializedVersion` second, and
//! for those the probe stops after two entries. The version is still
//! accepted at any position: a current document whose keys were reordered by
//! hand would otherwise read as version 0 and be run through upgraders it
//! has already been through.

use crate::error::ProbeError;
use crate::tree::tag_text;
use std::fmt;
use std::str::Chars;
use yaml_rust2::parser::{Event, Parser};

/// Schema version number carried by every asset document
pub type FormatVersion = u32;

/// Key holding the schema version under the root mapping
pub const VERSION_KEY: &str = "SerializedVersion";

/// Key holding the asset identifier; conventionally precedes [`VERSION_KEY`]
pub const ID_KEY: &str = "Id";

/// Declared type and schema version of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag {
    /// Type identifier (the root tag without its leading `!`)
    pub type_tag: String,
    /// Declared schema version (`0` when the field is absent)
    pub version: FormatVersion,
}

impl VersionTag {
    /// Create version tag
    #[inline]
    #[must_use]
    pub fn new(type_tag: impl Into<String>, version: FormatVersion) -> Self {
        Self {
            type_tag: type_tag.into(),
            version,
        }
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}@{}", self.type_tag, self.version)
    }
}

/// Read the declared type tag and version from document text
///
/// # Errors
/// - `ProbeError::Syntax` if the text up to the version is not valid YAML
/// - `ProbeError::NotAMapping` if the root is not a mapping
/// - `ProbeError::MissingTypeTag` if the root mapping is untagged
/// - `ProbeError::MalformedVersion` if `SerializedVersion` is not an integer
pub fn probe_version(text: &str) -> Result<VersionTag, ProbeError> {
    let mut events = Events(Parser::new(text.chars()));
    let type_tag = events.root_tag()?.ok_or(ProbeError::MissingTypeTag)?;

    loop {
        match events.next()? {
            Event::MappingEnd => return Ok(VersionTag::new(type_tag, 0)),
            Event::Scalar(ref key, ..) if key == VERSION_KEY => {
                let value = version_text(events.next()?);
                let version =
                    parse_version_text(&value).ok_or(ProbeError::MalformedVersion { value })?;
                return Ok(VersionTag { type_tag, version });
            }
            key => {
                events.skip(key)?;
                let value = events.next()?;
                events.skip(value)?;
            }
        }
    }
}

/// Parse a `SerializedVersion` scalar as a base-10 integer
#[must_use]
pub fn parse_version_text(value: &str) -> Option<FormatVersion> {
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

struct Events<'a>(Parser<Chars<'a>>);

impl Events<'_> {
    fn next(&mut self) -> Result<Event, ProbeError> {
        Ok(self.0.next_token()?.0)
    }

    /// Tag of the root mapping; leaves the parser inside it
    fn root_tag(&mut self) -> Result<Option<String>, ProbeError> {
        loop {
            let found = match self.next()? {
                Event::StreamStart | Event::DocumentStart { .. } => continue,
                Event::MappingStart(_, tag) => {
                    return Ok(tag.as_ref().map(tag_text).filter(|tag| !tag.is_empty()));
                }
                Event::SequenceStart(..) => "sequence",
                Event::Alias(_) => "alias",
                _ => "scalar",
            };
            return Err(ProbeError::NotAMapping { found });
        }
    }

    /// Consume the rest of the node opened by `event`
    fn skip(&mut self, mut event: Event) -> Result<(), ProbeError> {
        let mut depth = 0usize;
        loop {
            match event {
                Event::MappingStart(..) | Event::SequenceStart(..) => depth += 1,
                Event::MappingEnd | Event::SequenceEnd => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
            event = self.next()?;
        }
    }
}

/// Version value as text; collections get a placeholder that never parses
fn version_text(event: Event) -> String {
    match event {
        Event::Scalar(value, ..) => value,
        Event::SequenceStart(..) => "<sequence>".to_string(),
        Event::MappingStart(..) => "<mapping>".to_string(),
        Event::Alias(_) => "<alias>".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_reads_tag_and_version() {
        let text = "!Foo\nId: x\nSerializedVersion: 3\nName: bar\n";
        let tag = probe_version(text).unwrap();
        assert_eq!(tag, VersionTag::new("Foo", 3));
    }

    #[test]
    fn probe_with_document_marker() {
        let text = "--- !Foo\nId: 1234\nSerializedVersion: 2\n";
        assert_eq!(probe_version(text).unwrap().version, 2);
    }

    #[test]
    fn probe_defaults_missing_version_to_zero() {
        let text = "!Foo\nId: x\nName: bar\n";
        assert_eq!(probe_version(text).unwrap(), VersionTag::new("Foo", 0));
    }

    #[test]
    fn probe_skips_nested_values() {
        let text = "!Foo\nId: x\nNested:\n  SerializedVersion: 9\n  List: [1, 2]\nSerializedVersion: 4\n";
        assert_eq!(probe_version(text).unwrap().version, 4);
    }

    #[test]
    fn probe_accepts_quoted_version() {
        let text = "!Foo\nSerializedVersion: '5'\n";
        assert_eq!(probe_version(text).unwrap().version, 5);
    }

    #[test]
    fn probe_rejects_malformed_version() {
        for value in ["abc", "1.5", "-1", "~", "[1]"] {
            let text = format!("!Foo\nId: x\nSerializedVersion: {value}\n");
            let err = probe_version(&text).unwrap_err();
            assert!(
                matches!(err, ProbeError::MalformedVersion { .. }),
                "{value}: {err:?}"
            );
        }
    }

    #[test]
    fn probe_requires_type_tag() {
        let err = probe_version("Id: x\nSerializedVersion: 1\n").unwrap_err();
        assert!(matches!(err, ProbeError::MissingTypeTag));
    }

    #[test]
    fn probe_rejects_non_mapping_root() {
        let err = probe_version("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ProbeError::NotAMapping { found: "sequence" }));

        let err = probe_version("just text\n").unwrap_err();
        assert!(matches!(err, ProbeError::NotAMapping { found: "scalar" }));
    }

    #[test]
    fn probe_rejects_invalid_yaml() {
        let err = probe_version("!Foo\nId: [unclosed\n").unwrap_err();
        assert!(matches!(err, ProbeError::Syntax(_)));
    }

    #[test]
    fn version_is_read_before_later_syntax_errors() {
        let text = "!Foo\nId: x\nSerializedVersion: 2\nBody: [unclosed\n";
        assert_eq!(probe_version(text).unwrap(), VersionTag::new("Foo", 2));
    }

    #[test]
    fn reordered_version_is_still_found() {
        let text = "!Foo\nName: bar\nList:\n  - {A: [1, 2]}\n  - b\nSerializedVersion: 6\nId: x\n";
        assert_eq!(probe_version(text).unwrap().version, 6);
    }

    #[test]
    fn probe_reads_flow_root() {
        let text = "!Foo {Id: x, SerializedVersion: 3}\n";
        assert_eq!(probe_version(text).unwrap(), VersionTag::new("Foo", 3));
    }

    #[test]
    fn parse_version_text_is_base_ten() {
        assert_eq!(parse_version_text("12"), Some(12));
        assert_eq!(parse_version_text(" 7 "), Some(7));
        assert_eq!(parse_version_text("0x10"), None);
        assert_eq!(parse_version_text("+3"), None);
        assert_eq!(parse_version_text(""), None);
        assert_eq!(parse_version_text("99999999999"), None);
    }
}
