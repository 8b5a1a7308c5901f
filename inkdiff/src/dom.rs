//! Arena-based DOM and the html5ever-backed parser that builds it.
//!
//! All nodes of a document live in one `indextree` arena. The same
//! representation is read by the differ, decorated by the marker, trimmed by
//! the pruner and walked by the serializer. Comments and processing
//! instructions are discarded while parsing: they never take part in a diff.

use compact_str::CompactString;
use facet::Facet;
use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, QualName, parse_document};
use indexmap::IndexMap;
use phloem::indextree::{Arena, NodeEdge, NodeId};
use std::borrow::Cow;
use std::cell::RefCell;
use tendril::{StrTendril, TendrilSink};

use crate::error::DiffError;
use crate::fragment;
use crate::mark::ChangeMark;
use crate::{debug, trace};

/// A parsed document: the arena plus the handles needed to walk it.
#[derive(Debug, Clone)]
pub struct Document {
    /// Every node of the document lives here.
    pub arena: Arena<NodeData>,

    /// Root element (usually `<html>`).
    pub root: NodeId,

    /// DOCTYPE name if present (usually "html").
    pub doctype: Option<CompactString>,
}

impl Document {
    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Parent of a node, `None` for detached nodes and the document node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Get the `<body>` element if present
    pub fn body(&self) -> Option<NodeId> {
        self.root
            .children(&self.arena)
            .find(|&id| self.get(id).tag() == Some("body"))
    }

    /// Get the `<body>` element, failing on documents without one.
    pub fn require_body(&self) -> Result<NodeId, DiffError> {
        self.body().ok_or(DiffError::NoBody)
    }

    /// Deep-copy the subtree rooted at `id` in `other` into this arena.
    ///
    /// The copy is detached and carries no marks. Returns the new root.
    pub fn import_subtree(&mut self, other: &Document, id: NodeId) -> NodeId {
        let copy_of = |data: &NodeData| NodeData::new(data.kind.clone(), data.ns);
        let root = self.arena.new_node(copy_of(other.get(id)));
        let mut stack = vec![(id, root)];
        while let Some((source, target)) = stack.pop() {
            for child in source.children(&other.arena) {
                let node = self.arena.new_node(copy_of(other.get(child)));
                target.append(node, &mut self.arena);
                stack.push((child, node));
            }
        }
        root
    }

    /// Whether the subtree at `a` here and the one at `b` in `other` have the
    /// same tags, namespaces, attributes, text and child order. Marks and
    /// attribute order are ignored.
    pub fn structurally_eq(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            let (left, right) = (self.get(a), other.get(b));
            if left.ns != right.ns || left.kind != right.kind {
                return false;
            }
            let left_children: Vec<NodeId> = self.children(a).collect();
            let right_children: Vec<NodeId> = other.children(b).collect();
            if left_children.len() != right_children.len() {
                return false;
            }
            stack.extend(left_children.into_iter().zip(right_children));
        }
        true
    }

    /// Depth of the deepest element below (and including) `id`.
    pub fn element_depth(&self, id: NodeId) -> usize {
        let mut depth = 0usize;
        let mut deepest = 0;
        for edge in id.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(node) if self.get(node).is_element() => {
                    depth += 1;
                    deepest = deepest.max(depth);
                }
                NodeEdge::End(node) if self.get(node).is_element() => depth -= 1,
                _ => {}
            }
        }
        deepest
    }
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Node payload.
    pub kind: NodeKind,
    /// Namespace the node belongs to.
    pub ns: Namespace,
    /// Change annotation, set by the marker.
    pub mark: ChangeMark,
}

impl NodeData {
    /// An unmarked node.
    pub fn new(kind: NodeKind, ns: Namespace) -> Self {
        Self {
            kind,
            ns,
            mark: ChangeMark::Unchanged,
        }
    }

    /// Tag name, for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(elem) => Some(elem.tag.as_str()),
            _ => None,
        }
    }

    /// Text content, for text nodes.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Whether this is an element.
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }
}

/// Node types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root (invisible, parent of `<html>`)
    Document,
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content
    Text(CompactString),
}

/// Element data (tag + attributes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Tag name, lowercase for HTML elements.
    pub tag: CompactString,

    /// Attributes in source order. Equality ignores order.
    pub attrs: IndexMap<CompactString, CompactString>,
}

/// XML namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `http://www.w3.org/1999/xhtml`
    Html,
    /// `http://www.w3.org/2000/svg`
    Svg,
    /// `http://www.w3.org/1998/Math/MathML`
    MathMl,
}

impl Namespace {
    /// Namespace for a URL, HTML for anything unknown.
    pub fn from_url(url: &str) -> Self {
        match url {
            "http://www.w3.org/2000/svg" => Namespace::Svg,
            "http://www.w3.org/1998/Math/MathML" => Namespace::MathMl,
            _ => Namespace::Html,
        }
    }

    /// The namespace URL.
    pub fn url(&self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

/// Options for turning markup into a [`Document`].
#[derive(Facet, Debug, Clone, PartialEq)]
#[facet(default)]
pub struct ParseOptions {
    /// Drop whitespace-only text that sits at a block boundary (default:
    /// true): next to a block-level sibling, or at the start or end of a
    /// block-level parent. Whitespace between two inline siblings is
    /// rendered, so it is always kept, as is text inside `pre`, `textarea`,
    /// `script` and `style`.
    pub drop_whitespace_text: bool,
    /// Collapse runs of whitespace in text to one space (default: false).
    pub collapse_whitespace: bool,
    /// Maximum element nesting below `<body>` (default: 512).
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            drop_whitespace_text: true,
            collapse_whitespace: false,
            max_depth: 512,
        }
    }
}

impl ParseOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every whitespace-only text node.
    pub fn keep_whitespace_text(mut self) -> Self {
        self.drop_whitespace_text = false;
        self
    }

    /// Collapse runs of whitespace in text.
    pub fn collapse_whitespace(mut self) -> Self {
        self.collapse_whitespace = true;
        self
    }

    /// Set the maximum element nesting.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Elements whose whitespace is significant.
const PRESERVE_WHITESPACE: &[&str] = &["pre", "textarea", "script", "style", "listing"];

/// Elements that start a new block box. Whitespace next to one of these does
/// not render.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "col", "colgroup", "dd",
    "details", "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html", "li",
    "main", "menu", "nav", "ol", "optgroup", "option", "p", "section", "select", "summary",
    "table", "tbody", "td", "template", "tfoot", "th", "thead", "tr", "ul",
];

fn is_block(doc: &Document, id: NodeId) -> bool {
    doc.get(id)
        .tag()
        .is_some_and(|tag| BLOCK_ELEMENTS.contains(&tag))
}

/// Whether whitespace-only text at `id` touches a block boundary on either
/// side.
fn at_block_boundary(doc: &Document, id: NodeId) -> bool {
    let node = &doc.arena[id];
    let edge = |sibling: Option<NodeId>| match sibling {
        Some(sibling) => is_block(doc, sibling),
        None => node.parent().is_none_or(|parent| is_block(doc, parent)),
    };
    edge(node.previous_sibling()) || edge(node.next_sibling())
}

/// An explicit parser handle. Cheap to build, holds no global state.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParseOptions,
}

impl Parser {
    /// Create a parser with the given options.
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Options this parser was built with.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a whole document. html5ever recovers from any markup error, so
    /// only the body and depth checks can fail.
    pub fn parse_document(&self, html: &str) -> Result<Document, DiffError> {
        let sink = ArenaSink::new();
        let mut doc = parse_document(sink, Default::default()).one(StrTendril::from(html));
        let body = doc.require_body()?;

        let depth = doc.element_depth(body).saturating_sub(1);
        if depth > self.options.max_depth {
            return Err(DiffError::TooDeep {
                depth,
                limit: self.options.max_depth,
            });
        }

        self.tidy_text(&mut doc, body);
        debug!(nodes = body.descendants(&doc.arena).count(), depth, "parsed document");
        Ok(doc)
    }

    /// Parse a fragment by embedding it in a document shell.
    pub fn parse_fragment(&self, fragment: &str) -> Result<Document, DiffError> {
        self.parse_document(&fragment::wrap(fragment))
    }

    /// Parse a fragment from raw bytes, which must be UTF-8.
    pub fn parse_fragment_bytes(&self, bytes: &[u8]) -> Result<Document, DiffError> {
        let fragment = std::str::from_utf8(bytes)?;
        self.parse_fragment(fragment)
    }

    fn tidy_text(&self, doc: &mut Document, body: NodeId) {
        let options = &self.options;
        if !options.drop_whitespace_text && !options.collapse_whitespace {
            return;
        }

        let mut preserve = 0usize;
        let mut blank = Vec::new();
        let mut loose = Vec::new();
        for edge in body.traverse(&doc.arena) {
            match edge {
                NodeEdge::Start(id) => match &doc.get(id).kind {
                    NodeKind::Element(elem) if PRESERVE_WHITESPACE.contains(&elem.tag.as_str()) => {
                        preserve += 1;
                    }
                    NodeKind::Text(text) if preserve == 0 => {
                        if options.drop_whitespace_text
                            && text.trim().is_empty()
                            && at_block_boundary(doc, id)
                        {
                            blank.push(id);
                        } else if options.collapse_whitespace {
                            loose.push(id);
                        }
                    }
                    _ => {}
                },
                NodeEdge::End(id) => {
                    if let NodeKind::Element(elem) = &doc.get(id).kind
                        && PRESERVE_WHITESPACE.contains(&elem.tag.as_str())
                    {
                        preserve -= 1;
                    }
                }
            }
        }

        trace!(dropped = blank.len(), collapsed = loose.len(), "tidy text");
        for id in blank {
            id.remove(&mut doc.arena);
        }
        for id in loose {
            if let NodeKind::Text(text) = &mut doc.get_mut(id).kind {
                *text = collapse(text);
            }
        }
    }
}

/// Replace every run of whitespace with a single space.
fn collapse(text: &str) -> CompactString {
    let mut out = CompactString::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Owned element name wrapper
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &html5ever::Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// TreeSink implementation for building arena-based DOM
struct ArenaSink {
    arena: RefCell<Arena<NodeData>>,

    /// Document node (parent of `<html>`)
    document: NodeId,

    doctype: RefCell<Option<CompactString>>,
}

impl ArenaSink {
    fn new() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeData::new(NodeKind::Document, Namespace::Html));

        ArenaSink {
            arena: RefCell::new(arena),
            document,
            doctype: RefCell::new(None),
        }
    }

    /// A node that is never attached. Comments and processing instructions
    /// get one of these so html5ever has a handle to pass around.
    fn discarded(&self) -> NodeId {
        self.arena
            .borrow_mut()
            .new_node(NodeData::new(NodeKind::Document, Namespace::Html))
    }

    fn is_discarded(arena: &Arena<NodeData>, id: NodeId) -> bool {
        matches!(arena[id].get().kind, NodeKind::Document)
    }
}

impl TreeSink for ArenaSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let arena = self.arena.into_inner();

        // Find the root element (usually <html>)
        let root = self
            .document
            .children(&arena)
            .find(|&id| arena[id].get().is_element())
            .unwrap_or(self.document);

        Document {
            arena,
            root,
            doctype: self.doctype.into_inner(),
        }
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // html5ever recovers on its own
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let arena = self.arena.borrow();
        let node = arena[*target].get();
        let local = LocalName::from(node.tag().unwrap_or(""));

        OwnedElemName(QualName {
            prefix: None,
            ns: html5ever::Namespace::from(node.ns.url()),
            local,
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let tag = CompactString::from(name.local.as_ref());
        let ns = Namespace::from_url(name.ns.as_ref());

        // IndexMap preserves attribute order from the source
        let attrs: IndexMap<_, _> = attrs
            .into_iter()
            .map(|attr| {
                (
                    CompactString::from(attr.name.local.as_ref()),
                    CompactString::from(attr.value.as_ref()),
                )
            })
            .collect();

        self.arena.borrow_mut().new_node(NodeData::new(
            NodeKind::Element(ElementData { tag, attrs }),
            ns,
        ))
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        self.discarded()
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.discarded()
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                if !Self::is_discarded(&arena, node) {
                    parent.append(node, &mut *arena);
                }
            }
            NodeOrText::AppendText(text) => {
                // Merge with a preceding text node, like the tree builder expects
                let last_child = arena[*parent].last_child();
                if let Some(last_child) = last_child
                    && let NodeKind::Text(existing) = &mut arena[last_child].get_mut().kind
                {
                    existing.push_str(&text);
                    return;
                }

                let text_node = arena.new_node(NodeData::new(
                    NodeKind::Text(CompactString::from(text.as_ref())),
                    Namespace::Html,
                ));
                parent.append(text_node, &mut *arena);
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                if !Self::is_discarded(&arena, node) {
                    sibling.insert_before(node, &mut *arena);
                }
            }
            NodeOrText::AppendText(text) => {
                let previous = arena[*sibling].previous_sibling();
                if let Some(previous) = previous
                    && let NodeKind::Text(existing) = &mut arena[previous].get_mut().kind
                {
                    existing.push_str(&text);
                    return;
                }
                let text_node = arena.new_node(NodeData::new(
                    NodeKind::Text(CompactString::from(text.as_ref())),
                    Namespace::Html,
                ));
                sibling.insert_before(text_node, &mut *arena);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.arena.borrow()[*element].parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        *self.doctype.borrow_mut() = Some(CompactString::from(name.as_ref()));
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template contents live directly under the <template> element
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let NodeKind::Element(elem) = &mut arena[*target].get_mut().kind {
            for attr in attrs {
                elem.attrs
                    .entry(CompactString::from(attr.name.local.as_ref()))
                    .or_insert_with(|| CompactString::from(attr.value.as_ref()));
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<NodeId> = node.children(&*arena).collect();
        for child in children {
            child.detach(&mut *arena);
            new_parent.append(child, &mut *arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn parse(fragment: &str) -> Document {
        Parser::default().parse_fragment(fragment).unwrap()
    }

    fn body_children(doc: &Document) -> Vec<NodeId> {
        doc.children(doc.require_body().unwrap()).collect()
    }

    #[test]
    fn test_parse_simple_fragment() {
        let doc = parse("<p>Hello</p>");

        assert_eq!(doc.get(doc.root).tag(), Some("html"));
        assert_eq!(doc.doctype.as_deref(), Some("html"));

        let children = body_children(&doc);
        assert_eq!(children.len(), 1);
        assert_eq!(doc.get(children[0]).tag(), Some("p"));

        let text = doc.children(children[0]).next().expect("p should have text");
        assert_eq!(doc.get(text).text(), Some("Hello"));
    }

    #[test]
    fn test_parse_with_attributes_in_source_order() {
        let doc = parse(r#"<div id="main" class="container">Content</div>"#);
        let div = body_children(&doc)[0];
        let NodeKind::Element(elem) = &doc.get(div).kind else {
            panic!("expected element");
        };
        let names: Vec<&str> = elem.attrs.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, ["id", "class"]);
        assert_eq!(elem.attrs.get("class").map(|v| v.as_str()), Some("container"));
    }

    #[test]
    fn test_comments_are_discarded() {
        let doc = parse("<div><!-- note -->text<?pi data?></div>");
        let div = body_children(&doc)[0];
        let children: Vec<NodeId> = doc.children(div).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.get(children[0]).text(), Some("text"));
    }

    #[test]
    fn test_whitespace_text_dropped_by_default() {
        let doc = parse("<ul>\n  <li>A</li>\n  <li>B</li>\n</ul>");
        let ul = body_children(&doc)[0];
        let tags: Vec<_> = doc.children(ul).map(|id| doc.get(id).tag()).collect();
        assert_eq!(tags, [Some("li"), Some("li")]);
    }

    #[test]
    fn test_whitespace_between_inline_elements_is_kept() {
        let doc = parse("<p><b>a</b> <i>b</i>\n</p>\n<div> <span>c</span> </div>");
        let children = body_children(&doc);
        assert_eq!(children.len(), 2);

        let p: Vec<NodeId> = doc.children(children[0]).collect();
        assert_eq!(p.len(), 3);
        assert_eq!(doc.get(p[1]).text(), Some(" "));

        // Leading and trailing blanks inside a block parent do not render.
        let div: Vec<_> = doc.children(children[1]).map(|id| doc.get(id).tag()).collect();
        assert_eq!(div, [Some("span")]);
    }

    #[test]
    fn test_whitespace_at_inline_parent_edge_is_kept() {
        let doc = parse("<p><span> <b>x</b></span></p>");
        let p = body_children(&doc)[0];
        let span = doc.children(p).next().unwrap();
        assert_eq!(doc.children(span).count(), 2);
    }

    #[test]
    fn test_whitespace_kept_when_asked() {
        let parser = Parser::new(ParseOptions::new().keep_whitespace_text());
        let doc = parser.parse_fragment("<ul>\n<li>A</li>\n</ul>").unwrap();
        let ul = body_children(&doc)[0];
        assert_eq!(doc.children(ul).count(), 3);
    }

    #[test]
    fn test_whitespace_in_pre_is_preserved() {
        let parser = Parser::new(ParseOptions::new().collapse_whitespace());
        let doc = parser
            .parse_fragment("<pre>a   b</pre><p>c   d</p>")
            .unwrap();
        let children = body_children(&doc);
        let pre_text = doc.children(children[0]).next().unwrap();
        let p_text = doc.children(children[1]).next().unwrap();
        assert_eq!(doc.get(pre_text).text(), Some("a   b"));
        assert_eq!(doc.get(p_text).text(), Some("c d"));
    }

    #[test]
    fn test_depth_limit() {
        let deep = "<div>".repeat(20);
        let parser = Parser::new(ParseOptions::new().max_depth(10));
        let err = parser.parse_fragment(&deep).unwrap_err();
        assert!(
            matches!(err, DiffError::TooDeep { depth: 20, limit: 10 }),
            "got {err:?}"
        );
        assert!(Parser::default().parse_fragment(&deep).is_ok());
    }

    #[test]
    fn test_invalid_utf8() {
        let err = Parser::default()
            .parse_fragment_bytes(b"<p>\xff</p>")
            .unwrap_err();
        assert!(matches!(err, DiffError::InvalidUtf8 { valid_up_to: 3 }));
        assert_eq!(err.kind(), crate::ErrorKind::MalformedInput);
    }

    #[test]
    fn test_entities_resolved_and_tags_balanced() {
        let doc = parse("<p>a &amp; b<b>bold");
        let p = body_children(&doc)[0];
        let children: Vec<NodeId> = doc.children(p).collect();
        assert_eq!(doc.get(children[0]).text(), Some("a & b"));
        assert_eq!(doc.get(children[1]).tag(), Some("b"));
    }

    #[test]
    fn test_svg_namespace() {
        let doc = parse(r#"<svg><rect width="1"></rect></svg>"#);
        let svg = body_children(&doc)[0];
        let rect = doc.children(svg).next().unwrap();
        assert_eq!(doc.get(svg).ns, Namespace::Svg);
        assert_eq!(doc.get(rect).ns, Namespace::Svg);
    }

    #[test]
    fn test_import_subtree_is_deep_and_unmarked() {
        let source = parse("<ul><li>A</li><li>B</li></ul>");
        let ul = body_children(&source)[0];

        let mut target = parse("<p>x</p>");
        let body = target.require_body().unwrap();
        let copy = target.import_subtree(&source, ul);
        body.append(copy, &mut target.arena);

        assert!(target.structurally_eq(copy, &source, ul));
        assert!(copy.descendants(&target.arena).all(|id| !target.get(id).mark.is_change()));
    }

    #[test]
    fn test_structural_equality_ignores_attribute_order() {
        let a = parse(r#"<div a="1" b="2">x</div>"#);
        let b = parse(r#"<div b="2" a="1">x</div>"#);
        let c = parse(r#"<div a="1" b="3">x</div>"#);
        let body_a = a.require_body().unwrap();
        assert!(a.structurally_eq(body_a, &b, b.require_body().unwrap()));
        assert!(!a.structurally_eq(body_a, &c, c.require_body().unwrap()));
    }
}
