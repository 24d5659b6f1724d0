//! Generic tree model for asset documents
//!
//! Upgraders edit documents through this untyped, order-preserving tree
//! rather than through the asset's typed representation, since the document
//! on disk predates the current schema.
//!
//! - [`Node`]: mapping, sequence, scalar or alias, each optionally tagged
//! - [`MappingNode`]: ordered unique string keys
//! - [`Document`]: a root mapping plus load/render adapters
//!
//! Nodes read from a document remember how they were written: scalars keep
//! their source text and style, keys keep their spelling and the comment
//! lines above them, and collections keep their anchor and flow style.
//! Equality only compares content, never layout.

use crate::error::TreeError;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use yaml_rust2::Yaml;

mod emit;
mod load;

pub use emit::{detect_indent, render_document, render_scalar};
pub use load::parse_document;
pub(crate) use load::tag_text;

/// One node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered key → node mapping
    Mapping(MappingNode),
    /// Ordered list of nodes
    Sequence(SequenceNode),
    /// Leaf value
    Scalar(ScalarNode),
    /// Reference to an anchored node (`*name`), kept unexpanded
    Alias(String),
}

impl Node {
    /// Kind name used in diagnostics
    #[inline]
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Scalar(_) => "scalar",
            Self::Alias(_) => "alias",
        }
    }

    /// Tag attached to this node, without the leading `!`
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Mapping(m) => m.tag(),
            Self::Sequence(s) => s.tag(),
            Self::Scalar(s) => s.tag(),
            Self::Alias(_) => None,
        }
    }

    /// Replace the tag on this node; aliases cannot carry one
    pub fn set_tag(&mut self, tag: Option<String>) {
        match self {
            Self::Mapping(m) => m.set_tag(tag),
            Self::Sequence(s) => s.set_tag(tag),
            Self::Scalar(s) => s.set_tag(tag),
            Self::Alias(_) => {}
        }
    }

    /// Anchor name declared on this node
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        match self {
            Self::Mapping(m) => m.anchor(),
            Self::Sequence(s) => s.anchor(),
            Self::Scalar(s) => s.anchor(),
            Self::Alias(_) => None,
        }
    }

    /// Borrow as mapping
    #[inline]
    #[must_use]
    pub fn as_mapping(&self) -> Option<&MappingNode> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as mutable mapping
    #[inline]
    pub fn as_mapping_mut(&mut self) -> Option<&mut MappingNode> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as sequence
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&SequenceNode> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as mutable sequence
    #[inline]
    pub fn as_sequence_mut(&mut self) -> Option<&mut SequenceNode> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as scalar
    #[inline]
    #[must_use]
    pub fn as_scalar(&self) -> Option<&ScalarNode> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Anchor name this alias refers to
    #[inline]
    #[must_use]
    pub fn as_alias(&self) -> Option<&str> {
        match self {
            Self::Alias(name) => Some(name),
            _ => None,
        }
    }

    /// Scalar text, if this is a scalar
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(ScalarNode::value)
    }
}

impl From<MappingNode> for Node {
    fn from(node: MappingNode) -> Self {
        Self::Mapping(node)
    }
}

impl From<SequenceNode> for Node {
    fn from(node: SequenceNode) -> Self {
        Self::Sequence(node)
    }
}

impl From<ScalarNode> for Node {
    fn from(node: ScalarNode) -> Self {
        Self::Scalar(node)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Scalar(ScalarNode::text(value))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Scalar(ScalarNode::text(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Scalar(ScalarNode::plain(value.to_string()))
    }
}

impl From<u32> for Node {
    fn from(value: u32) -> Self {
        Self::Scalar(ScalarNode::plain(value.to_string()))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Scalar(ScalarNode::plain(value.to_string()))
    }
}

/// How a scalar's text is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Resolved non-string value (number, bool, null): written verbatim
    Plain,
    /// String value: quoted only when plain text would not read back as the same string
    Text,
}

/// Text a loaded scalar was written with
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScalarSource {
    /// Single-line plain or quoted text, quotes included
    Inline(String),
    /// `|` or `>` block: header line plus content lines relative to the block indent
    Block { header: String, lines: Vec<String> },
}

/// Leaf value
#[derive(Debug, Clone)]
pub struct ScalarNode {
    value: String,
    kind: ScalarKind,
    tag: Option<String>,
    anchor: Option<String>,
    source: Option<ScalarSource>,
}

impl ScalarNode {
    /// Create non-string scalar (number, bool, null)
    #[inline]
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        Self::new(value.into(), ScalarKind::Plain)
    }

    /// Create string scalar
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(value.into(), ScalarKind::Text)
    }

    /// Create null scalar
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self::plain("null")
    }

    fn new(value: String, kind: ScalarKind) -> Self {
        Self {
            value,
            kind,
            tag: None,
            anchor: None,
            source: None,
        }
    }

    /// Attach tag
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Declare anchor
    #[inline]
    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Scalar text
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Write-back kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Tag, without the leading `!`
    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Replace tag
    #[inline]
    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Anchor name
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Replace anchor
    #[inline]
    pub fn set_anchor(&mut self, anchor: Option<String>) {
        self.anchor = anchor;
    }

    /// Check whether the scalar is written back exactly as it was read
    #[inline]
    #[must_use]
    pub fn is_verbatim(&self) -> bool {
        self.source.is_some()
    }

    /// Check for a null value
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.kind == ScalarKind::Plain
            && matches!(self.value.as_str(), "" | "null" | "~" | "Null" | "NULL")
    }
}

impl PartialEq for ScalarNode {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.kind == other.kind
            && self.tag == other.tag
            && self.anchor == other.anchor
    }
}

impl Eq for ScalarNode {}

impl fmt::Display for ScalarNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Plain text a YAML reader resolves to null, bool or number
fn is_non_string_literal(value: &str) -> bool {
    value.is_empty() || !matches!(Yaml::from_str(value), Yaml::String(_))
}

/// Spelling and leading comments of a loaded key
#[derive(Debug, Clone)]
struct KeyLayout {
    source: Option<String>,
    comments: Vec<String>,
}

/// Ordered mapping with unique string keys
#[derive(Debug, Clone, Default)]
pub struct MappingNode {
    tag: Option<String>,
    anchor: Option<String>,
    flow: bool,
    entries: IndexMap<String, Node>,
    layout: HashMap<String, KeyLayout>,
}

impl MappingNode {
    /// Create empty untagged mapping
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach tag
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Declare anchor
    #[inline]
    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Add entry, builder style
    #[inline]
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Node>) -> Self {
        self.insert(key, value);
        self
    }

    /// Tag, without the leading `!`
    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Replace tag
    #[inline]
    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Anchor name
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Replace anchor
    #[inline]
    pub fn set_anchor(&mut self, anchor: Option<String>) {
        self.anchor = anchor;
    }

    /// Check if the mapping was written in flow style (`{a: 1}`)
    #[inline]
    #[must_use]
    pub fn is_flow(&self) -> bool {
        self.flow
    }

    /// Choose flow or block style for write-back
    #[inline]
    pub fn set_flow(&mut self, flow: bool) {
        self.flow = flow;
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if mapping has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if key is present
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Position of key among siblings
    #[inline]
    #[must_use]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    /// Get child node
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    /// Get mutable child node
    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.get_mut(key)
    }

    /// Get scalar text of child
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    /// Comment lines written above a key, `#` included
    #[must_use]
    pub fn comments(&self, key: &str) -> &[String] {
        self.layout
            .get(key)
            .map_or(&[][..], |layout| layout.comments.as_slice())
    }

    /// Insert or replace entry
    ///
    /// An existing key keeps its position; a new key is appended.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Node>) -> Option<Node> {
        self.entries.insert(key.into(), value.into())
    }

    /// Insert new entry at position, shifting later siblings
    ///
    /// # Errors
    /// `TreeError::KeyExists` if the key is already present
    pub fn insert_at(
        &mut self,
        index: usize,
        key: impl Into<String>,
        value: impl Into<Node>,
    ) -> Result<(), TreeError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(TreeError::KeyExists(key));
        }
        let index = index.min(self.entries.len());
        self.entries.shift_insert(index, key, value.into());
        Ok(())
    }

    /// Remove entry, keeping sibling order
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.layout.remove(key);
        self.entries.shift_remove(key)
    }

    /// Rename key in place, keeping its position, value and comments
    ///
    /// # Errors
    /// - `TreeError::KeyNotFound` if `from` is absent
    /// - `TreeError::KeyExists` if `to` is already present
    pub fn rename_key(&mut self, from: &str, to: impl Into<String>) -> Result<(), TreeError> {
        let to = to.into();
        if from == to {
            return if self.contains_key(from) {
                Ok(())
            } else {
                Err(TreeError::KeyNotFound(from.to_string()))
            };
        }
        if self.entries.contains_key(&to) {
            return Err(TreeError::KeyExists(to));
        }
        let (index, _, value) = self
            .entries
            .shift_remove_full(from)
            .ok_or_else(|| TreeError::KeyNotFound(from.to_string()))?;
        if let Some(layout) = self.layout.remove(from).filter(|l| !l.comments.is_empty()) {
            let comments = layout.comments;
            self.layout.insert(to.clone(), KeyLayout { source: None, comments });
        }
        self.entries.shift_insert(index, to, value);
        Ok(())
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable entries in order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Node)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    fn key_source(&self, key: &str) -> Option<&str> {
        self.layout.get(key).and_then(|layout| layout.source.as_deref())
    }

    fn insert_loaded(&mut self, key: String, value: Node, layout: KeyLayout) {
        if layout.source.is_some() || !layout.comments.is_empty() {
            self.layout.insert(key.clone(), layout);
        }
        self.entries.insert(key, value);
    }
}

impl PartialEq for MappingNode {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.anchor == other.anchor && self.entries == other.entries
    }
}

/// Ordered list of nodes
#[derive(Debug, Clone, Default)]
pub struct SequenceNode {
    tag: Option<String>,
    anchor: Option<String>,
    flow: bool,
    items: Vec<Node>,
}

impl SequenceNode {
    /// Create empty untagged sequence
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create sequence from items
    #[inline]
    #[must_use]
    pub fn from_items(items: Vec<Node>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Tag, without the leading `!`
    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Replace tag
    #[inline]
    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Anchor name
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Replace anchor
    #[inline]
    pub fn set_anchor(&mut self, anchor: Option<String>) {
        self.anchor = anchor;
    }

    /// Check if the sequence was written in flow style (`[a, b]`)
    #[inline]
    #[must_use]
    pub fn is_flow(&self) -> bool {
        self.flow
    }

    /// Choose flow or block style for write-back
    #[inline]
    pub fn set_flow(&mut self, flow: bool) {
        self.flow = flow;
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if sequence has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append item
    #[inline]
    pub fn push(&mut self, item: impl Into<Node>) {
        self.items.push(item.into());
    }

    /// Get item
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.items.get(index)
    }

    /// Get mutable item
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.items.get_mut(index)
    }

    /// Remove item, shifting later items
    pub fn remove(&mut self, index: usize) -> Option<Node> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Items in order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.items.iter()
    }

    /// Mutable items in order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.items.iter_mut()
    }
}

impl PartialEq for SequenceNode {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.anchor == other.anchor && self.items == other.items
    }
}

/// A whole asset document: one root mapping
#[derive(Debug, Clone)]
pub struct Document {
    root: MappingNode,
    preamble: Vec<String>,
}

impl Document {
    /// Create document from root mapping
    #[inline]
    #[must_use]
    pub fn new(root: MappingNode) -> Self {
        Self {
            root,
            preamble: Vec::new(),
        }
    }

    /// Root mapping
    #[inline]
    #[must_use]
    pub fn root(&self) -> &MappingNode {
        &self.root
    }

    /// Mutable root mapping
    #[inline]
    pub fn root_mut(&mut self) -> &mut MappingNode {
        &mut self.root
    }

    /// Consume into root mapping
    #[inline]
    #[must_use]
    pub fn into_root(self) -> MappingNode {
        self.root
    }

    /// Type tag of the root mapping
    #[inline]
    #[must_use]
    pub fn type_tag(&self) -> Option<&str> {
        self.root.tag()
    }

    /// Comment lines at the top of the file, before the root node
    #[inline]
    #[must_use]
    pub fn preamble(&self) -> &[String] {
        &self.preamble
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}
