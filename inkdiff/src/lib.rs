//! Structural HTML diff, rendered as one annotated tree.
//!
//! inkdiff compares two HTML fragments by their structure rather than their
//! text, and renders the result as a single fragment in which every change
//! is marked in place:
//!
//! - **Parsing**: browser-compatible HTML5 parsing via html5ever into an
//!   arena DOM ([`dom`])
//! - **Diffing**: node matching and subtree-granular edit scripts via phloem
//!   ([`diff`])
//! - **Marking**: the previous tree decorated with the script ([`marker`]),
//!   then cut down to the changes ([`prune`])
//! - **Serialization**: HTML5-correct output with `<ins>`/`<del>` and
//!   `data-diff*` markup ([`serialize`])
//!
//! # Example
//!
//! ```rust
//! use inkdiff::{UnifiedOptions, unified};
//!
//! let html = unified(
//!     "<ul><li>A</li></ul>",
//!     "<ul><li>A</li><li>B</li></ul>",
//!     &UnifiedOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(html, r#"<ul><li data-diff="inserted">B</li></ul>"#);
//! ```
//!
//! The stages are also available one by one through [`DiffPipeline`].

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

pub mod diff;
pub mod dom;
pub mod dump;
pub mod error;
pub mod fragment;
pub mod mark;
pub mod marker;
pub mod normalize;
pub mod pipeline;
pub mod prune;
pub mod serialize;

pub use diff::{EditScript, apply_script, build_edit_script};
pub use dom::{Document, Namespace, NodeData, NodeKind, ParseOptions, Parser};
pub use error::{DiffError, ErrorKind};
pub use mark::{AttrChange, ChangeMark, ChangeSummary};
pub use marker::{MarkOutcome, MarkedTree, apply_marks, mark_diff};
pub use phloem::MatchingConfig;
pub use pipeline::{DiffPipeline, UnifiedDiff, UnifiedOptions, unified, unified_batch, unified_or, unified_report};
pub use prune::{PrunePolicy, PrunedTree};
pub use serialize::{MarkupStyle, SerializeOptions, TextStyle, serialize_document, serialize_fragment};
