//! Embedding fragments in a document shell and getting them back out.
//!
//! The parser only builds whole documents, so a fragment is wrapped in a
//! minimal shell first. After serializing a whole document, [`unwrap`] cuts
//! out what sits between the body tags.

use crate::error::DiffError;

const SHELL_HEAD: &str = "<!DOCTYPE html><html><head></head><body>";
const SHELL_TAIL: &str = "</body></html>";

/// Embed `fragment` in `<!DOCTYPE html><html><head></head><body>…</body></html>`.
pub fn wrap(fragment: &str) -> String {
    let mut out = String::with_capacity(SHELL_HEAD.len() + fragment.len() + SHELL_TAIL.len());
    out.push_str(SHELL_HEAD);
    out.push_str(fragment);
    out.push_str(SHELL_TAIL);
    out
}

/// The markup between the opening and closing body tags of `document_html`.
///
/// The opening tag may carry attributes. Fails with [`DiffError::NoBody`]
/// when either marker is missing.
pub fn unwrap(document_html: &str) -> Result<&str, DiffError> {
    let open = find_open_body(document_html).ok_or(DiffError::NoBody)?;
    let content_start = document_html[open..]
        .find('>')
        .map(|end| open + end + 1)
        .ok_or(DiffError::NoBody)?;
    let content_end = document_html
        .rfind("</body>")
        .filter(|&end| end >= content_start)
        .ok_or(DiffError::NoBody)?;
    Ok(&document_html[content_start..content_end])
}

/// Byte offset of `<body` followed by `>` or whitespace.
fn find_open_body(html: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = html[from..].find("<body") {
        let at = from + found;
        match html.as_bytes().get(at + "<body".len()) {
            Some(b'>' | b' ' | b'\t' | b'\n' | b'\r' | b'/') => return Some(at),
            _ => from = at + "<body".len(),
        }
    }
    None
}
