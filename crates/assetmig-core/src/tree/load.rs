//! Document text → tree model, via the `yaml-rust2` event parser
//!
//! Parser events only carry decoded values. Each event's marker points back
//! into the text, which is how scalars recover the exact spelling they were
//! written with, and how comment lines above a key are found.

use super::{
    is_non_string_literal, Document, KeyLayout, MappingNode, Node, ScalarKind, ScalarNode,
    ScalarSource, SequenceNode,
};
use crate::error::TreeError;
use std::collections::{HashMap, VecDeque};
use std::str::Chars;
use yaml_rust2::parser::{Event, Parser, Tag};
use yaml_rust2::scanner::{Marker, Scanner, TScalarStyle, TokenType};

/// Handle `yaml-rust2` resolves `!!` to
const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Parse full document text into the tree model
///
/// Tags and anchors are kept on every node (tags without the leading `!`),
/// aliases stay [`Node::Alias`] references. Plain scalars that resolve to
/// numbers, bools or nulls become [`ScalarKind::Plain`].
///
/// # Errors
/// - `TreeError::Syntax` if the text is not valid YAML
/// - `TreeError::NotAMapping` if the root is not a mapping
/// - `TreeError::MultipleDocuments` if the stream holds more than one document
/// - `TreeError::UnsupportedKey` / `TreeError::DuplicateKey` for keys the tree cannot hold
pub fn parse_document(text: &str) -> Result<Document, TreeError> {
    let mut loader = Loader::new(text);
    let preamble = loader.preamble();
    let root = loader.root()?;
    loader.finish()?;

    match root {
        Node::Mapping(root) => Ok(Document { root, preamble }),
        other => Err(TreeError::NotAMapping {
            found: other.kind_name(),
        }),
    }
}

/// Tag name as stored on nodes: `!Foo` → `Foo`, `!!str` → `!str`
pub(crate) fn tag_text(tag: &Tag) -> String {
    match tag.handle.as_str() {
        "!" => tag.suffix.clone(),
        CORE_TAG_PREFIX => format!("!{}", tag.suffix),
        "" if tag.suffix == "!" => String::new(),
        handle => format!("{handle}{}", tag.suffix),
    }
}

struct Loader<'a> {
    parser: Parser<Chars<'a>>,
    source: SourceText<'a>,
    /// Anchor names in document order, scanned on first use
    anchor_tokens: Option<VecDeque<String>>,
    anchor_names: HashMap<usize, String>,
    /// End of the last source span attached to a node
    consumed: usize,
}

impl<'a> Loader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            parser: Parser::new(text.chars()),
            source: SourceText::new(text),
            anchor_tokens: None,
            anchor_names: HashMap::new(),
            consumed: 0,
        }
    }

    fn next(&mut self) -> Result<(Event, Marker), TreeError> {
        Ok(self.parser.next_token()?)
    }

    /// Comment lines opening the file
    fn preamble(&mut self) -> Vec<String> {
        let mut comments = Vec::new();
        for line in self.source.text.split_inclusive('\n') {
            let trimmed = line.trim();
            if !trimmed.starts_with('#') {
                break;
            }
            comments.push(trimmed.to_string());
            self.consumed += line.len();
        }
        comments
    }

    fn root(&mut self) -> Result<Node, TreeError> {
        loop {
            let (event, mark) = self.next()?;
            match event {
                Event::StreamStart | Event::DocumentStart { .. } => {}
                // Empty stream reads as a null document
                Event::StreamEnd => return Ok(ScalarNode::null().into()),
                event => return self.node(event, &mark, 0),
            }
        }
    }

    fn finish(&mut self) -> Result<(), TreeError> {
        loop {
            match self.next()?.0 {
                Event::StreamEnd => return Ok(()),
                Event::DocumentStart { .. } => return Err(TreeError::MultipleDocuments),
                _ => {}
            }
        }
    }

    /// Build the node opened by `event`; `parent_col` bounds block scalar content
    fn node(&mut self, event: Event, mark: &Marker, parent_col: usize) -> Result<Node, TreeError> {
        match event {
            Event::Scalar(value, style, anchor_id, tag) => {
                let anchor = self.anchor(anchor_id)?;
                let mut scalar = self.scalar(value, style, mark, parent_col);
                scalar.tag = tag.as_ref().map(tag_text);
                scalar.anchor = anchor;
                Ok(scalar.into())
            }
            Event::SequenceStart(anchor_id, tag) => {
                let mut sequence = SequenceNode::new();
                sequence.anchor = self.anchor(anchor_id)?;
                sequence.tag = tag.as_ref().map(tag_text);
                sequence.flow = self.source.at(mark).starts_with('[');
                loop {
                    let (event, item_mark) = self.next()?;
                    if matches!(event, Event::SequenceEnd) {
                        break;
                    }
                    let item = self.node(event, &item_mark, mark.col())?;
                    sequence.items.push(item);
                }
                Ok(sequence.into())
            }
            Event::MappingStart(anchor_id, tag) => {
                let mut mapping = MappingNode::new();
                mapping.anchor = self.anchor(anchor_id)?;
                mapping.tag = tag.as_ref().map(tag_text);
                mapping.flow = self.source.at(mark).starts_with('{');
                self.entries(&mut mapping)?;
                Ok(mapping.into())
            }
            Event::Alias(id) => {
                let name = self.anchor_names.get(&id).cloned().ok_or_else(|| {
                    TreeError::UnexpectedEvent(format!("alias to unknown anchor #{id}"))
                })?;
                self.consume(self.source.offset(mark) + 1 + name.len());
                Ok(Node::Alias(name))
            }
            other => Err(TreeError::UnexpectedEvent(format!("{other:?}"))),
        }
    }

    fn entries(&mut self, mapping: &mut MappingNode) -> Result<(), TreeError> {
        loop {
            let (event, key_mark) = self.next()?;
            let (key, style) = match event {
                Event::MappingEnd => return Ok(()),
                Event::Scalar(key, style, 0, None) => (key, style),
                other => return Err(TreeError::UnsupportedKey(describe_key(&other))),
            };

            let comments = if mapping.flow {
                Vec::new()
            } else {
                self.comments_before(&key_mark)
            };
            let source = self.inline_source(&key, style, &key_mark);

            let (event, value_mark) = self.next()?;
            let value = self.node(event, &value_mark, key_mark.col())?;
            if mapping.contains_key(&key) {
                return Err(TreeError::DuplicateKey(key));
            }
            mapping.insert_loaded(key, value, KeyLayout { source, comments });
        }
    }

    fn scalar(
        &mut self,
        value: String,
        style: TScalarStyle,
        mark: &Marker,
        parent_col: usize,
    ) -> ScalarNode {
        let offset = self.source.offset(mark);
        let rest = self.source.rest(offset);

        match style {
            TScalarStyle::Plain => {
                // The parser reports an absent value as `~`
                let value = if value == "~" && !rest.starts_with('~') {
                    String::new()
                } else {
                    value
                };
                let kind = if is_non_string_literal(&value) {
                    ScalarKind::Plain
                } else {
                    ScalarKind::Text
                };
                let mut scalar = ScalarNode::new(value, kind);
                if !scalar.value.is_empty() && rest.starts_with(scalar.value.as_str()) {
                    self.consume(offset + scalar.value.len());
                    scalar.source = Some(ScalarSource::Inline(scalar.value.clone()));
                } else if scalar.value.is_empty() {
                    scalar.source = Some(ScalarSource::Inline(String::new()));
                }
                scalar
            }
            TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted => {
                let mut scalar = ScalarNode::new(value, ScalarKind::Text);
                if let Some(raw) = quoted_span(rest) {
                    self.consume(offset + raw.len());
                    scalar.source = Some(ScalarSource::Inline(raw.to_string()));
                }
                scalar
            }
            _ => {
                let literal = matches!(style, TScalarStyle::Literal);
                let mut scalar = ScalarNode::new(value, ScalarKind::Text);
                if let Some((header, lines, len)) = block_span(rest, parent_col) {
                    self.consume(offset + len);
                    let joined = lines.join("\n");
                    // Literal content must match line for line
                    if !literal || joined.trim_end_matches('\n') == scalar.value.trim_end_matches('\n') {
                        scalar.source = Some(ScalarSource::Block { header, lines });
                    }
                }
                scalar
            }
        }
    }

    /// Spelling of a key, when it sits on one line
    fn inline_source(&mut self, key: &str, style: TScalarStyle, mark: &Marker) -> Option<String> {
        let offset = self.source.offset(mark);
        let rest = self.source.rest(offset);
        let raw = match style {
            TScalarStyle::Plain => rest.starts_with(key).then_some(key),
            TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted => quoted_span(rest),
            _ => None,
        }?;
        self.consume(offset + raw.len());
        Some(raw.to_string())
    }

    /// Full-line comments directly above the line holding `mark`
    fn comments_before(&self, mark: &Marker) -> Vec<String> {
        let text = self.source.text;
        let offset = self.source.offset(mark);
        let mut line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
        let mut comments = Vec::new();

        while line_start > 0 {
            let line_end = line_start - 1;
            let prev_start = text[..line_end].rfind('\n').map_or(0, |i| i + 1);
            if prev_start < self.consumed {
                break;
            }
            let line = text[prev_start..line_end].trim();
            if !line.starts_with('#') {
                break;
            }
            comments.push(line.to_string());
            line_start = prev_start;
        }

        comments.reverse();
        comments
    }

    fn anchor(&mut self, id: usize) -> Result<Option<String>, TreeError> {
        if id == 0 {
            return Ok(None);
        }
        let text = self.source.text;
        let name = self
            .anchor_tokens
            .get_or_insert_with(|| anchor_tokens(text))
            .pop_front()
            .ok_or_else(|| TreeError::UnexpectedEvent(format!("anchor #{id} has no name")))?;
        self.anchor_names.insert(id, name.clone());
        Ok(Some(name))
    }

    fn consume(&mut self, end: usize) {
        self.consumed = self.consumed.max(end);
    }
}

/// Anchor names in the order the parser numbers them
fn anchor_tokens(text: &str) -> VecDeque<String> {
    Scanner::new(text.chars())
        .filter_map(|token| match token.1 {
            TokenType::Anchor(name) => Some(name),
            _ => None,
        })
        .collect()
}

fn describe_key(event: &Event) -> String {
    match event {
        Event::Scalar(value, ..) => format!("tagged or anchored key '{value}'"),
        Event::SequenceStart(..) => "sequence".to_string(),
        Event::MappingStart(..) => "mapping".to_string(),
        Event::Alias(_) => "alias".to_string(),
        other => format!("{other:?}"),
    }
}

/// Single-line quoted scalar at the start of `rest`, quotes included
fn quoted_span(rest: &str) -> Option<&str> {
    let bytes = rest.as_bytes();
    let quote = *bytes.first()?;
    if quote != b'\'' && quote != b'"' {
        return None;
    }

    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' | b'\r' => return None,
            b'\\' if quote == b'"' => i += 1,
            b'\'' if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') => i += 1,
            b if b == quote => return rest.get(..=i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Block scalar at the start of `rest`: header, content lines with the block
/// indent removed, and the byte length it spans
///
/// Explicit indentation indicators are not kept; such scalars are rendered
/// from their value instead.
fn block_span(rest: &str, parent_col: usize) -> Option<(String, Vec<String>, usize)> {
    let (header_line, body) = rest.split_once('\n').unwrap_or((rest, ""));
    let header = header_line.trim_end();
    let indicators = header.split('#').next().unwrap_or_default();
    if !(header.starts_with('|') || header.starts_with('>'))
        || indicators.bytes().any(|b| b.is_ascii_digit())
    {
        return None;
    }
    let keep = indicators.contains('+');

    let mut block_indent = None;
    let mut lines = Vec::new();
    let mut blanks = Vec::new();
    let mut cursor = (header_line.len() + 1).min(rest.len());
    let mut end = cursor;

    for line in body.split_inclusive('\n') {
        let content = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if content.trim().is_empty() {
            blanks.push(content);
        } else {
            let width = content.len() - content.trim_start_matches(' ').len();
            let indent = *block_indent.get_or_insert(width);
            if width < indent || width <= parent_col {
                break;
            }
            for blank in blanks.drain(..) {
                lines.push(blank.get(indent..).unwrap_or_default().to_string());
            }
            lines.push(content[indent..].to_string());
            end = cursor + line.len();
        }
        cursor += line.len();
    }

    if keep {
        let indent = block_indent.unwrap_or(0);
        for blank in blanks {
            lines.push(blank.get(indent..).unwrap_or_default().to_string());
        }
        end = cursor;
    }

    Some((header.to_string(), lines, end))
}

/// Document text addressed by parser markers, which count characters
struct SourceText<'a> {
    text: &'a str,
    /// Byte offset of every character; only built for non-ASCII text
    char_starts: Option<Vec<usize>>,
}

impl<'a> SourceText<'a> {
    fn new(text: &'a str) -> Self {
        let char_starts = (!text.is_ascii()).then(|| text.char_indices().map(|(i, _)| i).collect());
        Self { text, char_starts }
    }

    fn offset(&self, mark: &Marker) -> usize {
        let index = mark.index();
        match &self.char_starts {
            None => index.min(self.text.len()),
            Some(starts) => starts.get(index).copied().unwrap_or(self.text.len()),
        }
    }

    fn rest(&self, offset: usize) -> &'a str {
        self.text.get(offset..).unwrap_or_default()
    }

    fn at(&self, mark: &Marker) -> &'a str {
        self.rest(self.offset(mark))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_root() {
        let doc = parse_document("!Foo\nId: x\nSerializedVersion: 1\nOldName: hello\n").unwrap();

        assert_eq!(doc.type_tag(), Some("Foo"));
        assert_eq!(
            doc.root().keys().collect::<Vec<_>>(),
            ["Id", "SerializedVersion", "OldName"]
        );
        let version = doc.root().get("SerializedVersion").and_then(Node::as_scalar).unwrap();
        assert_eq!(version.value(), "1");
        assert_eq!(version.kind(), ScalarKind::Plain);
        assert_eq!(doc.root().get_str("Id"), Some("x"));
    }

    #[test]
    fn keeps_nested_tags_and_order() {
        let text = "!Foo\nParts:\n  - !Wheel\n    Size: 3\n  - !Door\n    Open: true\nZeta: 1\nAlpha: 2\n";
        let doc = parse_document(text).unwrap();

        let parts = doc.root().get("Parts").and_then(Node::as_sequence).unwrap();
        assert_eq!(parts.get(0).and_then(Node::tag), Some("Wheel"));
        assert_eq!(parts.get(1).and_then(Node::tag), Some("Door"));
        assert_eq!(doc.root().keys().collect::<Vec<_>>(), ["Parts", "Zeta", "Alpha"]);
    }

    #[test]
    fn quoted_numbers_stay_text() {
        let doc = parse_document("!Foo\nCode: '42'\nCount: 42\nName: bar\n").unwrap();
        let kind = |key| doc.root().get(key).and_then(Node::as_scalar).map(ScalarNode::kind);
        assert_eq!(kind("Code"), Some(ScalarKind::Text));
        assert_eq!(kind("Count"), Some(ScalarKind::Plain));
        assert_eq!(kind("Name"), Some(ScalarKind::Text));
    }

    #[test]
    fn scalars_keep_source_spelling() {
        let text = "!Foo\nRev: 1.10\nColor: 0xFF\nQuoted: \"a\\tb\"\nSingle: 'it''s'\nHash: 123456789012345678901234567890\n";
        let doc = parse_document(text).unwrap();
        let root = doc.root();

        assert_eq!(root.get_str("Rev"), Some("1.10"));
        assert_eq!(root.get_str("Color"), Some("0xFF"));
        assert_eq!(root.get_str("Quoted"), Some("a\tb"));
        assert_eq!(root.get_str("Single"), Some("it's"));
        assert_eq!(root.get_str("Hash"), Some("123456789012345678901234567890"));
        assert!(root
            .iter()
            .all(|(_, node)| node.as_scalar().is_some_and(ScalarNode::is_verbatim)));
    }

    #[test]
    fn empty_and_tilde_values_are_null() {
        let doc = parse_document("!Foo\nEmpty:\nTilde: ~\nLast:\n").unwrap();
        let scalar = |key| doc.root().get(key).and_then(Node::as_scalar).unwrap();

        assert_eq!(scalar("Empty").value(), "");
        assert_eq!(scalar("Tilde").value(), "~");
        assert_eq!(scalar("Last").value(), "");
        assert!(scalar("Empty").is_null() && scalar("Tilde").is_null());
    }

    #[test]
    fn anchors_and_aliases_stay_references() {
        let doc = parse_document("!Foo\nBase: &b {K: 1}\nOther: *b\nName: &n x\n").unwrap();
        let base = doc.root().get("Base").unwrap();

        assert_eq!(base.anchor(), Some("b"));
        assert!(base.as_mapping().is_some_and(MappingNode::is_flow));
        assert_eq!(doc.root().get("Other").and_then(Node::as_alias), Some("b"));
        assert_eq!(doc.root().get("Name").and_then(Node::anchor), Some("n"));
    }

    #[test]
    fn comments_attach_to_following_key() {
        let text = "# asset header\n!Foo\nId: x\n# explains the version\nSerializedVersion: 1\nNested:\n  # inner\n  Child: 2\n";
        let doc = parse_document(text).unwrap();

        assert_eq!(doc.preamble(), ["# asset header"]);
        assert!(doc.root().comments("Id").is_empty());
        assert_eq!(doc.root().comments("SerializedVersion"), ["# explains the version"]);
        let nested = doc.root().get("Nested").and_then(Node::as_mapping).unwrap();
        assert_eq!(nested.comments("Child"), ["# inner"]);
    }

    #[test]
    fn block_scalars_keep_their_lines() {
        let text = "!Foo\nNotes: |\n  first\n    indented\n\n  last\nNext: 1\n";
        let doc = parse_document(text).unwrap();
        let notes = doc.root().get("Notes").and_then(Node::as_scalar).unwrap();

        assert_eq!(notes.value(), "first\n  indented\n\nlast\n");
        assert!(notes.is_verbatim());
        assert_eq!(doc.root().get_str("Next"), Some("1"));
    }

    #[test]
    fn non_ascii_text_keeps_offsets() {
        let doc = parse_document("!Foo\nName: \"héllo\"\nRev: 1.10\n").unwrap();
        assert_eq!(doc.root().get_str("Name"), Some("héllo"));
        let rev = doc.root().get("Rev").and_then(Node::as_scalar).unwrap();
        assert!(rev.is_verbatim());
    }

    #[test]
    fn rejects_non_mapping_root() {
        let err = parse_document("- a\n").unwrap_err();
        assert!(matches!(err, TreeError::NotAMapping { found: "sequence" }));
    }

    #[test]
    fn rejects_complex_keys() {
        let err = parse_document("!Foo\n? [a, b]\n: value\n").unwrap_err();
        assert!(matches!(err, TreeError::UnsupportedKey(_)));
    }

    #[test]
    fn rejects_duplicate_keys_and_extra_documents() {
        let err = parse_document("!Foo\nA: 1\nA: 2\n").unwrap_err();
        assert!(matches!(err, TreeError::DuplicateKey(ref key) if key == "A"));

        let err = parse_document("!Foo\nA: 1\n---\n!Foo\nA: 2\n").unwrap_err();
        assert!(matches!(err, TreeError::MultipleDocuments));
    }

    #[test]
    fn rejects_invalid_yaml() {
        let err = parse_document("!Foo\nA: [unclosed\n").unwrap_err();
        assert!(matches!(err, TreeError::Syntax(_)));
    }
}
