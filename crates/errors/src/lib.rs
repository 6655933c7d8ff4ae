//! Error taxonomy for the indexing bridge.
//!
//! Every failure that can surface from a pipeline cycle is tagged with one
//! of four kinds (see `BridgeErrorKind`). The kind determines how the
//! pipeline controller reacts: whether the cycle aborts without advancing
//! the cursor, or whether the individual record is logged and skipped.

use std::fmt;

use thiserror::Error;

/// Coarse classification of a failure, used by the pipeline controller to
/// decide whether a cycle can continue past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeErrorKind {
    /// Network, TLS, or non-2xx response from the repository or search
    /// engine. Retried on the next cycle; the current cycle aborts without
    /// advancing the cursor.
    Transport,
    /// Malformed JSON/XML or a missing required attribute. Single-record
    /// parse errors are logged and the record is skipped where that is
    /// semantically safe; structural parse errors abort the cycle.
    Parse,
    /// An unrecognized value where the protocol guarantees a closed set
    /// (e.g. an unknown transaction status). Treated as a protocol error:
    /// aborts the cycle with a diagnostic naming the offending value.
    Schema,
    /// A bulk item failed server-side. The cycle does not advance; the
    /// offending items are logged for human diagnosis.
    Consistency,
}

impl fmt::Display for BridgeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgeErrorKind::Transport => "transport",
            BridgeErrorKind::Parse => "parse",
            BridgeErrorKind::Schema => "schema",
            BridgeErrorKind::Consistency => "consistency",
        };
        f.write_str(s)
    }
}

/// A classified error carrying a human-readable detail message.
///
/// Mirrors the shape of an `ErrorMetadata`-style tagged error: a stable
/// `kind` usable for dispatch/metrics and a free-form `detail` aimed at a
/// developer reading logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct BridgeError {
    pub kind: BridgeErrorKind,
    pub detail: String,
}

impl BridgeError {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            kind: BridgeErrorKind::Transport,
            detail: detail.into(),
        }
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self {
            kind: BridgeErrorKind::Parse,
            detail: detail.into(),
        }
    }

    pub fn schema(detail: impl Into<String>) -> Self {
        Self {
            kind: BridgeErrorKind::Schema,
            detail: detail.into(),
        }
    }

    pub fn consistency(detail: impl Into<String>) -> Self {
        Self {
            kind: BridgeErrorKind::Consistency,
            detail: detail.into(),
        }
    }

    /// Finds a `BridgeError` tag anywhere in an `anyhow` error chain, if the
    /// error (or one of its causes) was tagged via `.context(BridgeError)`.
    pub fn find_in(err: &anyhow::Error) -> Option<&BridgeError> {
        err.chain().find_map(|cause| cause.downcast_ref())
    }

    /// Whether a cycle that produced this error may safely continue to the
    /// next record instead of aborting (true for single-record Parse
    /// failures only, per the error handling design).
    pub fn is_record_skippable(&self) -> bool {
        matches!(self.kind, BridgeErrorKind::Parse)
    }
}

/// Wraps any error escaping `main`, logging it once via `tracing` before the
/// process exits with a non-zero code. Mirrors the teacher's
/// `common::errors::MainError`: a transparent `From` impl so `fn main() ->
/// Result<(), MainError>` composes with `?` everywhere.
pub struct MainError(anyhow::Error);

impl<T: Into<anyhow::Error>> From<T> for MainError {
    fn from(e: T) -> Self {
        let err = e.into();
        tracing::error!("fatal startup error: {err:#}");
        Self(err)
    }
}

impl fmt::Debug for MainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn find_in_locates_tagged_cause() {
        let err = anyhow::anyhow!("boom").context(BridgeError::transport("connect refused"));
        let found = BridgeError::find_in(&err).expect("should find tagged error");
        assert_eq!(found.kind, BridgeErrorKind::Transport);
    }

    #[test]
    fn find_in_returns_none_when_untagged() {
        let err = anyhow::anyhow!("boom").context("just a string");
        assert!(BridgeError::find_in(&err).is_none());
    }

    #[test]
    fn only_parse_errors_are_record_skippable() {
        assert!(BridgeError::parse("bad xml").is_record_skippable());
        assert!(!BridgeError::transport("timeout").is_record_skippable());
        assert!(!BridgeError::schema("unknown status").is_record_skippable());
        assert!(!BridgeError::consistency("bulk item failed").is_record_skippable());
    }
}
