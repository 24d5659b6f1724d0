//! Tree model → YAML text
//!
//! Collections are written in block style, nested one indentation step below
//! their key. Sequence items put their first entry on the dash line, padded
//! so that the item's remaining entries line up:
//!
//! ```text
//! !Foo
//! Layers:
//!     -   Name: base
//!         Blend: 1.0
//! ```
//!
//! What was read from the document is written back as it was read: scalar
//! and key spellings, block scalar lines, anchors, aliases, comment lines
//! above keys, and flow collections whose contents are all still source text.
//! Strings created by upgraders are quoted by `serde_yaml`'s emitter.
//!
//! Not kept: comments trailing a value on the same line, comments above
//! sequence scalars or at the end of the file, and the original indentation
//! width (see [`detect_indent`]).

use super::{
    is_non_string_literal, Document, MappingNode, Node, ScalarKind, ScalarNode, ScalarSource,
    SequenceNode,
};

/// Render document with the given indentation width
#[must_use]
pub fn render_document(document: &Document, indent: usize) -> String {
    let mut writer = BlockWriter::new(indent);
    for line in document.preamble() {
        writer.out.push_str(line);
        writer.out.push('\n');
    }

    let root = document.root();
    let props = properties(root.anchor(), root.tag());
    if root.is_empty() {
        writer.out.push_str(&join_inline(&props, "{}"));
        writer.out.push('\n');
    } else {
        if !props.is_empty() {
            writer.out.push_str(&props);
            writer.out.push('\n');
        }
        writer.mapping_entries(root, 0, false);
    }

    writer.out
}

/// Render a single scalar as it would appear after `key: `
///
/// Block scalars come back as their header line followed by their content
/// lines, indented two spaces.
#[must_use]
pub fn render_scalar(scalar: &ScalarNode) -> String {
    match scalar_text(scalar) {
        ScalarText::Inline(text) => text,
        ScalarText::Block(header, lines) => {
            let mut out = header;
            for line in lines {
                out.push('\n');
                if !line.is_empty() {
                    out.push_str("  ");
                    out.push_str(&line);
                }
            }
            out
        }
    }
}

/// Detect the indentation width used by existing document text
///
/// Returns the smallest non-zero leading-space count over content lines.
#[must_use]
pub fn detect_indent(text: &str) -> Option<usize> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start_matches(' ');
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let width = line.len() - trimmed.len();
            (width > 0).then_some(width)
        })
        .min()
}

enum ScalarText {
    Inline(String),
    /// Header line (`|`, `>-`, ...) and content lines without block indent
    Block(String, Vec<String>),
}

/// How a node sits after `key:` or `-`
enum Layout<'a> {
    Inline(String),
    Block(String, Vec<String>),
    Mapping(&'a MappingNode),
    Sequence(&'a SequenceNode),
}

fn layout(node: &Node) -> Layout<'_> {
    match node {
        Node::Scalar(scalar) => {
            let props = properties(scalar.anchor(), scalar.tag());
            match scalar_text(scalar) {
                ScalarText::Inline(text) => Layout::Inline(join_inline(&props, &text)),
                ScalarText::Block(header, lines) => {
                    Layout::Block(join_inline(&props, &header), lines)
                }
            }
        }
        Node::Alias(name) => Layout::Inline(format!("*{name}")),
        Node::Mapping(map) => match inline_collection(node) {
            Some(text) => Layout::Inline(text),
            None => Layout::Mapping(map),
        },
        Node::Sequence(seq) => match inline_collection(node) {
            Some(text) => Layout::Inline(text),
            None => Layout::Sequence(seq),
        },
    }
}

struct BlockWriter {
    out: String,
    indent: usize,
}

impl BlockWriter {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            // Block indentation indicators are a single digit
            indent: indent.clamp(1, 9),
        }
    }

    fn pad(&mut self, width: usize) {
        self.out.extend(std::iter::repeat(' ').take(width));
    }

    fn comments(&mut self, comments: &[String], col: usize) {
        for comment in comments {
            self.pad(col);
            self.out.push_str(comment);
            self.out.push('\n');
        }
    }

    fn inline_value(&mut self, text: &str) {
        if !text.is_empty() {
            self.out.push(' ');
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn properties_line(&mut self, anchor: Option<&str>, tag: Option<&str>) {
        self.inline_value(&properties(anchor, tag));
    }

    fn block_lines(&mut self, header: &str, lines: &[String], content_col: usize, relative: usize) {
        self.out.push_str(&with_indent_indicator(header, relative));
        self.out.push('\n');
        for line in lines {
            if !line.is_empty() {
                self.pad(content_col);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    fn mapping_entries(&mut self, map: &MappingNode, col: usize, first_inline: bool) {
        for (index, (key, value)) in map.iter().enumerate() {
            if index > 0 || !first_inline {
                self.comments(map.comments(key), col);
                self.pad(col);
            }
            self.out.push_str(&key_text(map, key));
            self.out.push(':');
            self.value_after_key(value, col);
        }
    }

    fn value_after_key(&mut self, node: &Node, col: usize) {
        let content_col = col + self.indent;
        match layout(node) {
            Layout::Inline(text) => self.inline_value(&text),
            Layout::Block(header, lines) => {
                self.out.push(' ');
                self.block_lines(&header, &lines, content_col, self.indent);
            }
            Layout::Mapping(map) => {
                self.properties_line(map.anchor(), map.tag());
                self.mapping_entries(map, content_col, false);
            }
            Layout::Sequence(seq) => {
                self.properties_line(seq.anchor(), seq.tag());
                self.sequence_items(seq, content_col, false);
            }
        }
    }

    fn sequence_items(&mut self, seq: &SequenceNode, col: usize, first_inline: bool) {
        // Item content needs at least "- " worth of room
        let content_col = col + self.indent.max(2);
        for (index, item) in seq.iter().enumerate() {
            if index > 0 || !first_inline {
                // Comments above an item's first key go above its dash
                if let Some((map, first)) = opens_inline_mapping(item) {
                    self.comments(map.comments(first), col);
                }
                self.pad(col);
            }
            self.out.push('-');
            self.item_body(item, content_col - col - 1, content_col);
        }
    }

    fn item_body(&mut self, node: &Node, gap: usize, content_col: usize) {
        match layout(node) {
            Layout::Inline(text) => {
                if !text.is_empty() {
                    self.pad(gap);
                    self.out.push_str(&text);
                }
                self.out.push('\n');
            }
            Layout::Block(header, lines) => {
                self.pad(gap);
                self.block_lines(&header, &lines, content_col, gap + 1);
            }
            Layout::Mapping(map) if map.anchor().is_some() || map.tag().is_some() => {
                self.properties_line(map.anchor(), map.tag());
                self.mapping_entries(map, content_col, false);
            }
            Layout::Mapping(map) => {
                self.pad(gap);
                self.mapping_entries(map, content_col, true);
            }
            Layout::Sequence(seq) if seq.anchor().is_some() || seq.tag().is_some() => {
                self.properties_line(seq.anchor(), seq.tag());
                self.sequence_items(seq, content_col, false);
            }
            Layout::Sequence(seq) => {
                self.pad(gap);
                self.sequence_items(seq, content_col, true);
            }
        }
    }
}

/// Untagged block mapping whose first key shares the dash line
fn opens_inline_mapping(node: &Node) -> Option<(&MappingNode, &str)> {
    let Layout::Mapping(map) = layout(node) else {
        return None;
    };
    if map.anchor().is_some() || map.tag().is_some() {
        return None;
    }
    map.keys().next().map(|first| (map, first))
}

fn scalar_text(scalar: &ScalarNode) -> ScalarText {
    match &scalar.source {
        Some(ScalarSource::Inline(raw)) => ScalarText::Inline(raw.clone()),
        Some(ScalarSource::Block { header, lines }) => {
            ScalarText::Block(header.clone(), lines.clone())
        }
        None if scalar.kind() == ScalarKind::Plain && is_non_string_literal(scalar.value()) => {
            ScalarText::Inline(scalar.value().to_string())
        }
        None => emitted_text(scalar.value()),
    }
}

/// A new string as `serde_yaml` writes it
fn emitted_text(value: &str) -> ScalarText {
    let Ok(yaml) = serde_yaml::to_string(value) else {
        return ScalarText::Inline(double_quoted(value));
    };
    let body = yaml.strip_suffix('\n').unwrap_or(&yaml);
    let Some((header, content)) = body.split_once('\n') else {
        return ScalarText::Inline(body.to_string());
    };
    if !(header.starts_with('|') || header.starts_with('>')) {
        // Long quoted scalar folded over several lines
        return ScalarText::Inline(double_quoted(value));
    }

    let indent = header
        .bytes()
        .find(u8::is_ascii_digit)
        .map(|digit| usize::from(digit - b'0'))
        .or_else(|| {
            content
                .split('\n')
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.len() - line.trim_start_matches(' ').len())
                .min()
        })
        .unwrap_or(0);
    let lines = content
        .split('\n')
        .map(|line| line.get(indent..).unwrap_or_default().to_string())
        .collect();
    ScalarText::Block(header.to_string(), lines)
}

fn key_text(map: &MappingNode, key: &str) -> String {
    if let Some(raw) = map.key_source(key) {
        return raw.to_string();
    }
    match emitted_text(key) {
        ScalarText::Inline(text) => text,
        ScalarText::Block(..) => double_quoted(key),
    }
}

/// Empty collections, and flow collections whose contents are all source text
fn inline_collection(node: &Node) -> Option<String> {
    let (empty, flow, braces) = match node {
        Node::Mapping(map) => (map.is_empty(), map.is_flow(), "{}"),
        Node::Sequence(seq) => (seq.is_empty(), seq.is_flow(), "[]"),
        Node::Scalar(_) | Node::Alias(_) => return None,
    };
    if empty {
        return Some(join_inline(&properties(node.anchor(), node.tag()), braces));
    }
    if flow {
        flow_text(node)
    } else {
        None
    }
}

fn flow_text(node: &Node) -> Option<String> {
    let text = match node {
        Node::Scalar(scalar) => match &scalar.source {
            Some(ScalarSource::Inline(raw)) => raw.clone(),
            _ => return None,
        },
        Node::Alias(name) => return Some(format!("*{name}")),
        Node::Mapping(map) => {
            let entries = map
                .iter()
                .map(|(key, value)| Some(format!("{}: {}", map.key_source(key)?, flow_text(value)?)))
                .collect::<Option<Vec<_>>>()?;
            format!("{{{}}}", entries.join(", "))
        }
        Node::Sequence(seq) => {
            let items = seq.iter().map(flow_text).collect::<Option<Vec<_>>>()?;
            format!("[{}]", items.join(", "))
        }
    };
    Some(join_inline(&properties(node.anchor(), node.tag()), &text))
}

/// Node properties as written before content: `&anchor !Tag`
fn properties(anchor: Option<&str>, tag: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(anchor) = anchor {
        out.push('&');
        out.push_str(anchor);
    }
    if let Some(tag) = tag {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push('!');
        out.push_str(tag);
    }
    out
}

fn join_inline(props: &str, text: &str) -> String {
    match (props.is_empty(), text.is_empty()) {
        (true, _) => text.to_string(),
        (false, true) => props.to_string(),
        (false, false) => format!("{props} {text}"),
    }
}

/// Rewrite an explicit indentation indicator for the block's new indent
fn with_indent_indicator(header: &str, relative: usize) -> String {
    let digit = u32::try_from(relative.min(9))
        .ok()
        .and_then(|d| char::from_digit(d, 10));
    header
        .chars()
        .map(|c| match digit {
            Some(digit) if c.is_ascii_digit() => digit,
            _ => c,
        })
        .collect()
}

/// Single-line form for keys holding line breaks
fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
