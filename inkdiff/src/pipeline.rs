//! The diff pipeline, from two documents to one annotated fragment.
//!
//! Each stage consumes the previous one, so a stage can only run once and
//! only in order:
//!
//! ```text
//! DiffPipeline<Unmarked> --match_nodes--> DiffPipeline<Matched>
//!     --build_script--> DiffPipeline<ScriptBuilt> --mark--> MarkOutcome
//! MarkedTree --prune--> PrunedTree --serialize--> String
//! ```
//!
//! [`unified`] runs the whole thing on raw markup.

use facet::Facet;
use phloem::{Matching, MatchingConfig, compute_matching};
use rayon::prelude::*;

use crate::diff::{DocumentIndex, EditScript, script_from_matching};
use crate::dom::{Document, ParseOptions, Parser};
use crate::error::DiffError;
use crate::mark::ChangeSummary;
use crate::marker::{MarkOutcome, apply_marks};
use crate::prune::PrunePolicy;
use crate::serialize::{MarkupStyle, SerializeOptions};
use crate::{debug, trace};

/// Nothing computed yet.
#[derive(Debug)]
pub struct Unmarked;

/// Nodes are matched; the document indexes are kept for the next stage.
#[derive(Debug)]
pub struct Matched {
    prev_index: DocumentIndex,
    next_index: DocumentIndex,
    matching: Matching,
}

/// The edit script is built.
#[derive(Debug)]
pub struct ScriptBuilt {
    script: EditScript,
}

/// Two documents on their way to a marked tree.
#[derive(Debug)]
pub struct DiffPipeline<S> {
    prev: Document,
    next: Document,
    config: MatchingConfig,
    state: S,
}

impl<S> DiffPipeline<S> {
    /// The previous document.
    pub fn prev(&self) -> &Document {
        &self.prev
    }

    /// The next document.
    pub fn next(&self) -> &Document {
        &self.next
    }
}

impl DiffPipeline<Unmarked> {
    /// Start a pipeline over two parsed documents.
    pub fn new(prev: Document, next: Document, config: MatchingConfig) -> Self {
        Self {
            prev,
            next,
            config,
            state: Unmarked,
        }
    }

    /// Parse two fragments and start a pipeline over them.
    pub fn from_fragments(
        parser: &Parser,
        prev: &str,
        next: &str,
        config: MatchingConfig,
    ) -> Result<Self, DiffError> {
        let prev = parser.parse_fragment(prev)?;
        let next = parser.parse_fragment(next)?;
        Ok(Self::new(prev, next, config))
    }

    /// Pair up corresponding nodes of both bodies.
    pub fn match_nodes(self) -> Result<DiffPipeline<Matched>, DiffError> {
        let prev_index = DocumentIndex::build(&self.prev)?;
        let next_index = DocumentIndex::build(&self.next)?;
        let matching = compute_matching(
            &prev_index.view(&self.prev),
            &next_index.view(&self.next),
            &self.config,
        );
        debug!(pairs = matching.len(), "matched");
        Ok(DiffPipeline {
            prev: self.prev,
            next: self.next,
            config: self.config,
            state: Matched {
                prev_index,
                next_index,
                matching,
            },
        })
    }
}

impl DiffPipeline<Matched> {
    /// The node correspondence.
    pub fn matching(&self) -> &Matching {
        &self.state.matching
    }

    /// Derive the edit script from the matching.
    pub fn build_script(self) -> Result<DiffPipeline<ScriptBuilt>, DiffError> {
        let Matched {
            prev_index,
            next_index,
            matching,
        } = self.state;
        let script = script_from_matching(
            prev_index.view(&self.prev),
            next_index.view(&self.next),
            matching,
        )?;
        Ok(DiffPipeline {
            prev: self.prev,
            next: self.next,
            config: self.config,
            state: ScriptBuilt { script },
        })
    }
}

impl DiffPipeline<ScriptBuilt> {
    /// The edit script.
    pub fn script(&self) -> &EditScript {
        &self.state.script
    }

    /// Mark the previous document. The next document is dropped.
    pub fn mark(self) -> Result<MarkOutcome, DiffError> {
        apply_marks(self.prev, &self.next, &self.state.script)
    }
}

/// Every knob of [`unified`], loadable from JSON.
#[derive(Facet, Debug, Clone, PartialEq)]
#[facet(default)]
pub struct UnifiedOptions {
    /// How both inputs are parsed.
    pub parse: ParseOptions,
    /// How nodes are paired.
    pub matching: MatchingConfig,
    /// What survives besides the changes. `None` keeps the whole tree.
    pub prune: Option<PrunePolicy>,
    /// How the result is written. Marks are rendered by default.
    pub serialize: SerializeOptions,
}

impl Default for UnifiedOptions {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            matching: MatchingConfig::default(),
            prune: Some(PrunePolicy::default()),
            serialize: SerializeOptions::default().with_marks(MarkupStyle::default()),
        }
    }
}

impl UnifiedOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the whole tree instead of pruning.
    pub fn no_prune(mut self) -> Self {
        self.prune = None;
        self
    }

    /// Prune with `policy`.
    pub fn prune_with(mut self, policy: PrunePolicy) -> Self {
        self.prune = Some(policy);
        self
    }
}

/// Output of [`unified_report`].
#[derive(Facet, Debug, Clone, Default, PartialEq)]
pub struct UnifiedDiff {
    /// The annotated fragment, empty when nothing changed.
    pub html: String,
    /// What the fragment marks.
    pub summary: ChangeSummary,
}

impl UnifiedDiff {
    /// Whether anything changed.
    pub fn has_changes(&self) -> bool {
        !self.summary.is_empty()
    }
}

/// Diff two fragments and render the changes as one annotated fragment.
///
/// Returns an empty string when the fragments are structurally equal.
///
/// ```
/// use inkdiff::{UnifiedOptions, unified};
///
/// let html = unified("<p>Hello</p>", "<p>Hello world</p>", &UnifiedOptions::default()).unwrap();
/// assert_eq!(html, "<p><del>Hello</del><ins>Hello world</ins></p>");
///
/// assert_eq!(unified("<p>same</p>", "<p>same</p>", &UnifiedOptions::default()).unwrap(), "");
/// ```
pub fn unified(prev: &str, next: &str, opts: &UnifiedOptions) -> Result<String, DiffError> {
    unified_report(prev, next, opts).map(|report| report.html)
}

/// Like [`unified`], with a summary of the changes.
pub fn unified_report(prev: &str, next: &str, opts: &UnifiedOptions) -> Result<UnifiedDiff, DiffError> {
    let parser = Parser::new(opts.parse.clone());
    let outcome = DiffPipeline::from_fragments(&parser, prev, next, opts.matching.clone())?
        .match_nodes()?
        .build_script()?
        .mark()?;

    let MarkOutcome::Marked(tree) = outcome else {
        debug!("unified: no changes");
        return Ok(UnifiedDiff::default());
    };
    let summary = tree.summary();
    let html = match &opts.prune {
        Some(policy) => tree.prune(policy).serialize(&opts.serialize)?,
        None => tree.serialize(&opts.serialize)?,
    };
    trace!(%html, "unified");
    Ok(UnifiedDiff { html, summary })
}

/// Like [`unified`], returning `sentinel` instead of an error.
pub fn unified_or(prev: &str, next: &str, opts: &UnifiedOptions, sentinel: &str) -> String {
    match unified(prev, next, opts) {
        Ok(html) => html,
        Err(err) => {
            debug!(%err, kind = ?err.kind(), "unified failed, using sentinel");
            sentinel.to_string()
        }
    }
}

/// Diff many independent pairs in parallel. Results keep input order.
pub fn unified_batch<S>(pairs: &[(S, S)], opts: &UnifiedOptions) -> Vec<Result<String, DiffError>>
where
    S: AsRef<str> + Sync,
{
    pairs
        .par_iter()
        .map(|(prev, next)| unified(prev.as_ref(), next.as_ref(), opts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn pipeline(old: &str, new: &str) -> DiffPipeline<Unmarked> {
        DiffPipeline::from_fragments(&Parser::default(), old, new, MatchingConfig::default()).unwrap()
    }

    #[test]
    fn test_stages_in_order() {
        let matched = pipeline("<p>a</p>", "<p>b</p>").match_nodes().unwrap();
        // body, p, text
        assert_eq!(matched.matching().len(), 3);

        let built = matched.build_script().unwrap();
        assert_eq!(built.script().len(), 1);

        let outcome = built.mark().unwrap();
        assert!(outcome.has_changes());
    }

    #[test]
    fn test_unchanged_is_empty() {
        let opts = UnifiedOptions::default();
        assert_eq!(unified("<div><p>x</p></div>", "<div><p>x</p></div>", &opts).unwrap(), "");
        let report = unified_report("<p>x</p>", "<p>x</p>", &opts).unwrap();
        assert!(!report.has_changes());
    }

    #[test]
    fn test_no_prune_keeps_everything() {
        let opts = UnifiedOptions::default().no_prune();
        let html = unified("<h1>T</h1><p>a</p>", "<h1>T</h1><p>b</p>", &opts).unwrap();
        assert_eq!(html, "<h1>T</h1><p><del>a</del><ins>b</ins></p>");
    }

    #[test]
    fn test_sentinel_on_error() {
        let opts = UnifiedOptions {
            parse: ParseOptions::default().max_depth(2),
            ..UnifiedOptions::default()
        };
        let deep = "<div><div><div><div>x</div></div></div></div>";
        assert_eq!(unified_or(deep, "<p>x</p>", &opts, "<!-- diff failed -->"), "<!-- diff failed -->");
        assert!(unified(deep, "<p>x</p>", &opts).is_err());
    }

    #[test]
    fn test_batch_keeps_order() {
        let pairs = [
            ("<p>a</p>", "<p>b</p>"),
            ("<p>same</p>", "<p>same</p>"),
            ("<ul><li>A</li></ul>", "<ul><li>A</li><li>B</li></ul>"),
        ];
        let opts = UnifiedOptions::default();
        let results: Vec<String> = unified_batch(&pairs, &opts)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        let sequential: Vec<String> = pairs
            .iter()
            .map(|(a, b)| unified(a, b, &opts).unwrap())
            .collect();
        assert_eq!(results, sequential);
        assert_eq!(results[1], "");
    }
}
