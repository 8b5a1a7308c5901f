//! Marked tree pretty-printing for debugging.

use phloem::indextree::NodeId;
use std::fmt;

use crate::dom::{Document, NodeKind};
use crate::mark::ChangeMark;

/// Pretty-printer for a marked (or pruned) tree: one node per line, each
/// change shown as a badge.
///
/// ```text
/// [n5] <ul>
///   [n6] <li>
///     [n7] TEXT: "A"
///   [n6] </li>
///   [n12] <li> <inserted>
///     [n13] TEXT: "B"
///   [n12] </li>
/// [n5] </ul>
/// ```
pub struct MarkedTreeDump<'a> {
    doc: &'a Document,
    root: NodeId,
    colored: bool,
}

impl<'a> MarkedTreeDump<'a> {
    /// Dump the subtree of `doc` rooted at `root`.
    pub fn new(doc: &'a Document, root: NodeId) -> Self {
        Self {
            doc,
            root,
            colored: false,
        }
    }

    /// Color badges with ANSI escapes.
    pub fn colored(mut self) -> Self {
        self.colored = true;
        self
    }

    fn badge(&self, mark: &ChangeMark) -> String {
        let detail = match mark {
            ChangeMark::Unchanged => return String::new(),
            ChangeMark::Inserted | ChangeMark::Deleted => mark.label().to_string(),
            ChangeMark::AttributesChanged(changes) => {
                let names: Vec<&str> = changes.iter().map(|c| c.name.as_str()).collect();
                format!("attributes: {}", names.join(" "))
            }
            ChangeMark::TextChanged { old } => format!("text, was {old:?}"),
        };
        if !self.colored {
            return format!(" <{detail}>");
        }
        let color = match mark {
            ChangeMark::Inserted => "\x1b[32m",
            ChangeMark::Deleted => "\x1b[31m",
            _ => "\x1b[33m",
        };
        format!(" {color}<{detail}>\x1b[0m")
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, node: NodeId, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let prefix = format!("{indent}[n{}] ", usize::from(node));
        let data = self.doc.get(node);
        let badge = self.badge(&data.mark);

        match &data.kind {
            NodeKind::Element(elem) => {
                writeln!(f, "{prefix}<{}>{badge}", elem.tag)?;
                for child in self.doc.children(node) {
                    self.fmt_node(f, child, depth + 1)?;
                }
                writeln!(f, "{prefix}</{}>", elem.tag)?;
            }
            NodeKind::Text(text) => writeln!(f, "{prefix}TEXT: {text:?}{badge}")?,
            NodeKind::Document => {
                writeln!(f, "{prefix}#document")?;
                for child in self.doc.children(node) {
                    self.fmt_node(f, child, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for MarkedTreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Parser;
    use facet_testhelpers::test;

    #[test]
    fn test_dump_shows_badges() {
        let mut doc = Parser::default().parse_fragment("<p>hi</p>").unwrap();
        let body = doc.body().unwrap();
        let p = doc.children(body).next().unwrap();
        let text = doc.children(p).next().unwrap();
        doc.get_mut(text).mark = ChangeMark::TextChanged { old: "ho".into() };

        let dump = MarkedTreeDump::new(&doc, p).to_string();
        let (p, text) = (usize::from(p), usize::from(text));
        assert_eq!(
            dump,
            format!("[n{p}] <p>\n  [n{text}] TEXT: \"hi\" <text, was \"ho\">\n[n{p}] </p>\n")
        );

        let colored = MarkedTreeDump::new(&doc, body).colored().to_string();
        assert!(colored.contains("\x1b[33m<text"));
    }
}
