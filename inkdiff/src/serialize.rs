//! HTML5 serializer for arena documents, with optional change markup.
//!
//! Follows the HTML5 serialization rules:
//!
//! - Void elements never get end tags
//! - Text content is escaped, attribute values are escaped and double-quoted
//! - Raw text elements (script, style) are not escaped
//! - RCDATA elements (title, textarea) escape only `&` and `<`
//! - Foreign content (SVG/MathML) uses self-closing syntax when empty
//!
//! When [`SerializeOptions::marks`] is set, change marks are rendered as
//! plain markup: `data-diff*` attributes on elements and `<ins>`/`<del>`
//! around text.

use compact_str::CompactString;
use facet::Facet;
use phloem::indextree::NodeId;
use similar::{ChangeTag, TextDiff};
use std::fmt::{self, Write};

use crate::dom::{Document, ElementData, Namespace, NodeKind};
use crate::error::DiffError;
use crate::mark::{AttrChange, ChangeMark};

/// How text changes are rendered.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum TextStyle {
    /// `<del>old</del><ins>new</ins>`
    #[default]
    Replace,
    /// Word-level interleaving of deleted and inserted runs.
    Words,
}

/// How change marks are rendered.
#[derive(Facet, Debug, Clone, PartialEq)]
#[facet(default)]
pub struct MarkupStyle {
    /// Name of the mark attribute, and prefix of the helper attributes
    /// (`<prefix>-attrs`, `<prefix>-was-<name>`).
    pub attribute_prefix: String,
    /// Rendering of text changes.
    pub text: TextStyle,
}

impl Default for MarkupStyle {
    fn default() -> Self {
        Self {
            attribute_prefix: "data-diff".to_string(),
            text: TextStyle::Replace,
        }
    }
}

impl MarkupStyle {
    /// Use a different attribute prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attribute_prefix = prefix.into();
        self
    }

    /// Render text changes word by word.
    pub fn words(mut self) -> Self {
        self.text = TextStyle::Words;
        self
    }
}

/// Options for HTML serialization.
#[derive(Facet, Debug, Clone, PartialEq)]
#[facet(default)]
pub struct SerializeOptions {
    /// Whether to pretty-print with indentation (default: false for minified output)
    pub pretty: bool,
    /// Indentation string for pretty-printing (default: "  ")
    pub indent: String,
    /// Whether to sort attributes alphabetically (default: false, source order)
    pub sort_attributes: bool,
    /// Whether to escape `</script` sequences in script content (default: true)
    pub escape_script_end_tags: bool,
    /// Render change marks. `None` writes the tree as it is, marks ignored.
    pub marks: Option<MarkupStyle>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: "  ".to_string(),
            sort_attributes: false,
            escape_script_end_tags: true,
            marks: None,
        }
    }
}

impl SerializeOptions {
    /// Create new default options (minified output, marks ignored).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty-printing with default indentation.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Set a custom indentation string (implies pretty-printing).
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self.pretty = true;
        self
    }

    /// Enable sorting attributes alphabetically.
    pub fn sort_attributes(mut self) -> Self {
        self.sort_attributes = true;
        self
    }

    /// Disable escaping `</script` in script content (not recommended).
    pub fn no_escape_script_end_tags(mut self) -> Self {
        self.escape_script_end_tags = false;
        self
    }

    /// Render change marks in the given style.
    pub fn with_marks(mut self, style: MarkupStyle) -> Self {
        self.marks = Some(style);
        self
    }
}

/// Serialize a whole document, doctype included.
pub fn serialize_document(doc: &Document, opts: &SerializeOptions) -> Result<String, DiffError> {
    let mut out = String::new();
    Serializer::new(&mut out, doc, opts).write_document()?;
    Ok(out)
}

/// Serialize the children of `<body>`.
pub fn serialize_fragment(doc: &Document, opts: &SerializeOptions) -> Result<String, DiffError> {
    let body = doc.require_body()?;
    let mut out = String::new();
    let mut ser = Serializer::new(&mut out, doc, opts);
    for child in doc.children(body) {
        ser.write_node(child)?;
    }
    Ok(out)
}

/// `prefix` itself or `prefix-…`.
fn in_mark_namespace(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
}

/// HTML5 void elements - these never have end tags.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements - content is not escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// RCDATA elements - only `&` and `<` are escaped.
const RCDATA_ELEMENTS: &[&str] = &["title", "textarea"];

/// How text below an element is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextMode {
    Escaped,
    Rcdata,
    /// Raw text. `true` for `<script>`.
    Raw(bool),
}

impl TextMode {
    fn of(elem: &ElementData, ns: Namespace) -> Self {
        if ns != Namespace::Html {
            return TextMode::Escaped;
        }
        let tag = elem.tag.as_str();
        if RAW_TEXT_ELEMENTS.contains(&tag) {
            TextMode::Raw(tag == "script")
        } else if RCDATA_ELEMENTS.contains(&tag) {
            TextMode::Rcdata
        } else {
            TextMode::Escaped
        }
    }
}

/// Writes HTML for an arena [`Document`] into any [`fmt::Write`].
pub struct Serializer<'a, W: Write> {
    out: &'a mut W,
    doc: &'a Document,
    options: &'a SerializeOptions,
    depth: usize,
}

impl<'a, W: Write> Serializer<'a, W> {
    /// Create a serializer writing `doc` into `out`.
    pub fn new(out: &'a mut W, doc: &'a Document, options: &'a SerializeOptions) -> Self {
        Self {
            out,
            doc,
            options,
            depth: 0,
        }
    }

    /// Write the doctype and the root element.
    pub fn write_document(&mut self) -> Result<(), DiffError> {
        let doc = self.doc;
        if let Some(doctype) = &doc.doctype {
            write!(self.out, "<!DOCTYPE {doctype}>")?;
            self.write_newline()?;
        }
        self.write_node(doc.root)
    }

    /// Write one node and its subtree.
    pub fn write_node(&mut self, id: NodeId) -> Result<(), DiffError> {
        let doc = self.doc;
        let data = doc.get(id);
        match &data.kind {
            NodeKind::Element(elem) => self.write_element(id, elem, data.ns, &data.mark)?,
            NodeKind::Text(text) => {
                self.write_indent()?;
                let mode = doc
                    .parent(id)
                    .and_then(|parent| {
                        let parent = doc.get(parent);
                        match &parent.kind {
                            NodeKind::Element(elem) => Some(TextMode::of(elem, parent.ns)),
                            _ => None,
                        }
                    })
                    .unwrap_or(TextMode::Escaped);
                self.write_text(text, mode, &data.mark)?;
                if self.options.pretty && !text.is_empty() {
                    self.write_newline()?;
                }
            }
            NodeKind::Document => {
                for child in doc.children(id) {
                    self.write_node(child)?;
                }
            }
        }
        Ok(())
    }

    fn write_indent(&mut self) -> fmt::Result {
        if self.options.pretty {
            let indent = self.options.indent.as_str();
            for _ in 0..self.depth {
                self.out.write_str(indent)?;
            }
        }
        Ok(())
    }

    fn write_newline(&mut self) -> fmt::Result {
        if self.options.pretty {
            self.out.write_char('\n')?;
        }
        Ok(())
    }

    fn write_element(
        &mut self,
        id: NodeId,
        elem: &ElementData,
        ns: Namespace,
        mark: &ChangeMark,
    ) -> Result<(), DiffError> {
        let doc = self.doc;
        let tag = elem.tag.as_str();
        let is_foreign = ns != Namespace::Html;
        let is_void = !is_foreign && VOID_ELEMENTS.contains(&tag);
        let mode = TextMode::of(elem, ns);

        self.write_indent()?;
        write!(self.out, "<{tag}")?;
        // Source attributes in the mark namespace would duplicate or forge
        // marks, so they are left out when marks are rendered.
        let options = self.options;
        let reserved = options.marks.as_ref().map(|style| style.attribute_prefix.as_str());
        let mut attrs: Vec<_> = elem
            .attrs
            .iter()
            .filter(|(name, _)| !reserved.is_some_and(|prefix| in_mark_namespace(name, prefix)))
            .collect();
        if options.sort_attributes {
            attrs.sort_by_key(|(name, _)| *name);
        }
        for (name, value) in attrs {
            self.write_attr(name, value)?;
        }
        self.write_mark_attrs(mark)?;

        if is_void {
            self.out.write_char('>')?;
            self.write_newline()?;
            return Ok(());
        }

        if is_foreign && doc.children(id).next().is_none() {
            self.out.write_str("/>")?;
            self.write_newline()?;
            return Ok(());
        }
        self.out.write_char('>')?;

        let all_text = doc
            .children(id)
            .all(|child| matches!(doc.get(child).kind, NodeKind::Text(_)));

        if mode != TextMode::Escaped || all_text {
            // Inline content, never indented.
            for child in doc.children(id) {
                let data = doc.get(child);
                if let NodeKind::Text(text) = &data.kind {
                    self.write_text(text, mode, &data.mark)?;
                }
            }
        } else {
            self.write_newline()?;
            self.depth += 1;
            for child in doc.children(id) {
                self.write_node(child)?;
            }
            self.depth -= 1;
            self.write_indent()?;
        }
        write!(self.out, "</{tag}>")?;
        self.write_newline()?;
        Ok(())
    }

    fn write_mark_attrs(&mut self, mark: &ChangeMark) -> fmt::Result {
        let options = self.options;
        let Some(style) = &options.marks else {
            return Ok(());
        };
        let prefix = style.attribute_prefix.as_str();
        match mark {
            ChangeMark::Unchanged | ChangeMark::TextChanged { .. } => Ok(()),
            ChangeMark::Inserted | ChangeMark::Deleted => self.write_attr(prefix, mark.label()),
            ChangeMark::AttributesChanged(changes) => {
                self.write_attr(prefix, mark.label())?;
                let names = changes
                    .iter()
                    .map(|change| change.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.write_attr(&format!("{prefix}-attrs"), &names)?;
                for AttrChange { name, old, .. } in changes {
                    if let Some(old) = old {
                        self.write_attr(&format!("{prefix}-was-{name}"), old)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn write_text(&mut self, text: &str, mode: TextMode, mark: &ChangeMark) -> fmt::Result {
        let options = self.options;
        let Some(style) = &options.marks else {
            return self.write_text_content(text, mode);
        };
        if mode != TextMode::Escaped {
            // No markup allowed here: show the new state only.
            return match mark {
                ChangeMark::Deleted => Ok(()),
                _ => self.write_text_content(text, mode),
            };
        }
        match mark {
            ChangeMark::Unchanged | ChangeMark::AttributesChanged(_) => self.write_text_escaped(text),
            ChangeMark::Inserted => self.write_wrapped("ins", text),
            ChangeMark::Deleted => self.write_wrapped("del", text),
            ChangeMark::TextChanged { old } => match style.text {
                TextStyle::Replace => {
                    self.write_wrapped("del", old)?;
                    self.write_wrapped("ins", text)
                }
                TextStyle::Words => self.write_word_diff(old, text),
            },
        }
    }

    fn write_text_content(&mut self, text: &str, mode: TextMode) -> fmt::Result {
        match mode {
            TextMode::Escaped => self.write_text_escaped(text),
            TextMode::Rcdata => self.write_rcdata_escaped(text),
            TextMode::Raw(is_script) => self.write_raw_text(text, is_script),
        }
    }

    fn write_wrapped(&mut self, wrapper: &str, text: &str) -> fmt::Result {
        if text.is_empty() {
            return Ok(());
        }
        write!(self.out, "<{wrapper}>")?;
        self.write_text_escaped(text)?;
        write!(self.out, "</{wrapper}>")
    }

    /// Interleave deleted and inserted word runs; unchanged runs stay bare.
    fn write_word_diff(&mut self, old: &CompactString, new: &str) -> fmt::Result {
        let diff = TextDiff::from_words(old.as_str(), new);
        let mut run = String::new();
        let mut run_tag = ChangeTag::Equal;
        for change in diff.iter_all_changes() {
            if change.tag() != run_tag && !run.is_empty() {
                self.write_run(run_tag, &run)?;
                run.clear();
            }
            run_tag = change.tag();
            run.push_str(change.value());
        }
        self.write_run(run_tag, &run)
    }

    fn write_run(&mut self, tag: ChangeTag, run: &str) -> fmt::Result {
        match tag {
            ChangeTag::Equal => self.write_text_escaped(run),
            ChangeTag::Delete => self.write_wrapped("del", run),
            ChangeTag::Insert => self.write_wrapped("ins", run),
        }
    }

    fn write_text_escaped(&mut self, text: &str) -> fmt::Result {
        for c in text.chars() {
            match c {
                '&' => self.out.write_str("&amp;")?,
                '<' => self.out.write_str("&lt;")?,
                '>' => self.out.write_str("&gt;")?,
                '\u{a0}' => self.out.write_str("&nbsp;")?,
                _ => self.out.write_char(c)?,
            }
        }
        Ok(())
    }

    fn write_rcdata_escaped(&mut self, text: &str) -> fmt::Result {
        for c in text.chars() {
            match c {
                '&' => self.out.write_str("&amp;")?,
                '<' => self.out.write_str("&lt;")?,
                _ => self.out.write_char(c)?,
            }
        }
        Ok(())
    }

    fn write_raw_text(&mut self, text: &str, is_script: bool) -> fmt::Result {
        if !(is_script && self.options.escape_script_end_tags) {
            return self.out.write_str(text);
        }
        // ASCII case-insensitive search on bytes keeps indices aligned.
        const PATTERN: &[u8] = b"</script";
        let bytes = text.as_bytes();
        let mut last_end = 0;
        let mut i = 0;
        while i + PATTERN.len() <= bytes.len() {
            if bytes[i..i + PATTERN.len()].eq_ignore_ascii_case(PATTERN) {
                self.out.write_str(&text[last_end..i])?;
                self.out.write_str("<\\/script")?;
                last_end = i + PATTERN.len();
                i = last_end;
            } else {
                i += 1;
            }
        }
        self.out.write_str(&text[last_end..])
    }

    fn write_attr(&mut self, name: &str, value: &str) -> fmt::Result {
        write!(self.out, " {name}=\"")?;
        for c in value.chars() {
            match c {
                '&' => self.out.write_str("&amp;")?,
                '"' => self.out.write_str("&quot;")?,
                '\u{a0}' => self.out.write_str("&nbsp;")?,
                _ => self.out.write_char(c)?,
            }
        }
        self.out.write_char('"')
    }
}

impl Document {
    /// Serialize the whole document with default options.
    pub fn to_html(&self) -> Result<String, DiffError> {
        serialize_document(self, &SerializeOptions::default())
    }

    /// Serialize the children of `<body>` with default options.
    pub fn body_html(&self) -> Result<String, DiffError> {
        serialize_fragment(self, &SerializeOptions::default())
    }
}
