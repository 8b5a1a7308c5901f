//! Errors raised while parsing, diffing and serializing.

use facet::Facet;
use phloem::ScriptError;

/// Everything that can go wrong in a diff computation.
///
/// The only soft outcome of a diff is "no changes", which is not an error.
/// Use [`DiffError::kind`] to tell input problems from engine inconsistencies.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum DiffError {
    /// input is not valid UTF-8 (valid up to byte {valid_up_to})
    InvalidUtf8 { valid_up_to: usize },

    /// element nesting depth {depth} exceeds the limit of {limit}
    TooDeep { depth: usize, limit: usize },

    /// no body element found in document
    NoBody,

    /// the roots of the two documents are not matched to each other
    RootsUnmatched,

    /// matched nodes a:{node_a} and b:{node_b} have different kinds
    KindMismatch { node_a: usize, node_b: usize },

    /// pair a:{node_a} and b:{node_b} crosses the pairing of its ancestors
    CrossingPair { node_a: usize, node_b: usize },

    /// parent b:{node} has no counterpart in the working tree
    UnresolvedParent { node: usize },

    /// sibling b:{node} has not been placed in the working tree
    UnresolvedAnchor { node: usize },

    /// node a:{node} is not a text node
    NotATextNode { node: usize },

    /// node a:{node} is not an element
    NotAnElement { node: usize },

    /// failed to write serialized output
    Serialization,
}

/// Coarse classification of a [`DiffError`].
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// The input could not be turned into a tree.
    MalformedInput,
    /// The engine could not produce a consistent diff.
    DiffComputation,
    /// The output could not be written.
    Serialization,
}

impl DiffError {
    /// Which stage of the pipeline this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiffError::InvalidUtf8 { .. } | DiffError::TooDeep { .. } | DiffError::NoBody => {
                ErrorKind::MalformedInput
            }
            DiffError::RootsUnmatched
            | DiffError::KindMismatch { .. }
            | DiffError::CrossingPair { .. }
            | DiffError::UnresolvedParent { .. }
            | DiffError::UnresolvedAnchor { .. }
            | DiffError::NotATextNode { .. }
            | DiffError::NotAnElement { .. } => ErrorKind::DiffComputation,
            DiffError::Serialization => ErrorKind::Serialization,
        }
    }
}

impl From<ScriptError> for DiffError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::RootsUnmatched => DiffError::RootsUnmatched,
            ScriptError::KindMismatch { node_a, node_b } => {
                DiffError::KindMismatch { node_a, node_b }
            }
            ScriptError::CrossingPair { node_a, node_b } => {
                DiffError::CrossingPair { node_a, node_b }
            }
        }
    }
}

impl From<std::fmt::Error> for DiffError {
    fn from(_: std::fmt::Error) -> Self {
        DiffError::Serialization
    }
}

impl From<std::str::Utf8Error> for DiffError {
    fn from(err: std::str::Utf8Error) -> Self {
        DiffError::InvalidUtf8 {
            valid_up_to: err.valid_up_to(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_kinds() {
        assert_eq!(DiffError::NoBody.kind(), ErrorKind::MalformedInput);
        assert_eq!(
            DiffError::TooDeep {
                depth: 600,
                limit: 512
            }
            .kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            DiffError::UnresolvedAnchor { node: 3 }.kind(),
            ErrorKind::DiffComputation
        );
        assert_eq!(DiffError::Serialization.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_script_errors_are_computation_errors() {
        let err = DiffError::from(ScriptError::CrossingPair {
            node_a: 4,
            node_b: 7,
        });
        assert_eq!(err.kind(), ErrorKind::DiffComputation);
        assert!(matches!(
            err,
            DiffError::CrossingPair {
                node_a: 4,
                node_b: 7
            }
        ));
    }

    #[test]
    fn test_messages_interpolate_fields() {
        let err = DiffError::TooDeep {
            depth: 600,
            limit: 512,
        };
        let message = err.to_string();
        assert!(message.contains("depth 600"), "got {message}");
        assert!(message.contains("limit of 512"), "got {message}");
    }
}
