//! Markup normalization.
//!
//! Raw markup from the outside world may be unbalanced, use entities, or
//! carry comments. Running it through the parser and back out gives plain,
//! balanced markup that diffs cleanly and byte-compares meaningfully.

use crate::debug;
use crate::dom::{ParseOptions, Parser};
use crate::error::DiffError;
use crate::fragment;
use crate::serialize::{SerializeOptions, serialize_document};

/// Parse `raw` as a body fragment and serialize it back.
///
/// Tags are balanced, entities resolved, comments dropped and whitespace
/// handled per `options`.
pub fn clean(raw: &str, options: &ParseOptions) -> Result<String, DiffError> {
    let doc = Parser::new(options.clone()).parse_fragment(raw)?;
    let html = serialize_document(&doc, &SerializeOptions::default())?;
    let body = fragment::unwrap(&html)?;
    debug!(raw_len = raw.len(), clean_len = body.len(), "normalized markup");
    Ok(body.to_string())
}
