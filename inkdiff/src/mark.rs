//! Change annotations carried by nodes of a marked tree.

use compact_str::CompactString;
use facet::Facet;

/// What happened to a node between the previous and the next document.
///
/// Marks never replace content: an attribute-changed element already holds
/// its new attributes and a text-changed node its new text, while the mark
/// keeps whatever is needed to show the old version next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChangeMark {
    /// Present on both sides, same content.
    #[default]
    Unchanged,
    /// Only present in the next document. The whole subtree is new.
    Inserted,
    /// Only present in the previous document. The whole subtree is gone.
    Deleted,
    /// Attributes differ. Lists every changed name.
    AttributesChanged(Vec<AttrChange>),
    /// Text differs. The node holds the new text.
    TextChanged {
        /// Text in the previous document.
        old: CompactString,
    },
}

impl ChangeMark {
    /// Whether this is anything but [`ChangeMark::Unchanged`].
    pub fn is_change(&self) -> bool {
        !matches!(self, ChangeMark::Unchanged)
    }

    /// Whether this mark covers the node's whole subtree.
    pub fn covers_subtree(&self) -> bool {
        matches!(self, ChangeMark::Inserted | ChangeMark::Deleted)
    }

    /// Short label used in dumps and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeMark::Unchanged => "unchanged",
            ChangeMark::Inserted => "inserted",
            ChangeMark::Deleted => "deleted",
            ChangeMark::AttributesChanged(_) => "attributes",
            ChangeMark::TextChanged { .. } => "text",
        }
    }
}

/// One attribute that was added, removed or changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrChange {
    /// Attribute name.
    pub name: CompactString,
    /// Value in the previous document, `None` if it was added.
    pub old: Option<CompactString>,
    /// Value in the next document, `None` if it was removed.
    pub new: Option<CompactString>,
}

/// How many marks of each kind a marked tree carries.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[facet(default)]
pub struct ChangeSummary {
    /// Subtrees marked inserted.
    pub inserted: usize,
    /// Subtrees marked deleted.
    pub deleted: usize,
    /// Elements whose attributes changed.
    pub attributes_changed: usize,
    /// Text nodes whose content changed.
    pub text_changed: usize,
}

impl ChangeSummary {
    /// Count one more mark.
    pub fn record(&mut self, mark: &ChangeMark) {
        match mark {
            ChangeMark::Unchanged => {}
            ChangeMark::Inserted => self.inserted += 1,
            ChangeMark::Deleted => self.deleted += 1,
            ChangeMark::AttributesChanged(_) => self.attributes_changed += 1,
            ChangeMark::TextChanged { .. } => self.text_changed += 1,
        }
    }

    /// Total number of marks.
    pub fn total(&self) -> usize {
        self.inserted + self.deleted + self.attributes_changed + self.text_changed
    }

    /// Whether no mark was counted.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
