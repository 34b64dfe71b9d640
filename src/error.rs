//! Error types shared by readers, writers and processes.
//!
//! Stage-level code returns [`anyhow::Result`]; the types here are the typed
//! leaves that callers may want to match on (via `downcast_ref`).

use std::io;
use std::sync::Arc;

/// Terminal error of a record stream.
///
/// A [`Reader`](crate::Reader) can report its outcome any number of times, so
/// the error is cheap to clone: wrapped sources are shared behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// The CSV decoder rejected a record (quoting, strict field counts, UTF-8).
    #[error("decode failed: {0}")]
    Decode(#[source] Arc<csv::Error>),

    /// The underlying byte stream failed.
    #[error("i/o failed: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The stage producing into a pipe failed; the message is its error chain.
    #[error("upstream stage failed: {0}")]
    Upstream(String),

    /// The consuming side of a pipe is gone or asked the producer to stop.
    #[error("downstream reader closed")]
    Disconnected,

    /// The producer went away without opening or closing the stream.
    #[error("stream abandoned by its producer")]
    Abandoned,
}

impl StreamError {
    /// True for errors that only echo a failure (or a deliberate stop) in
    /// another stage of the same pipeline.
    pub fn is_cascade(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Disconnected | Self::Abandoned)
    }
}

impl From<csv::Error> for StreamError {
    fn from(e: csv::Error) -> Self {
        Self::Decode(Arc::new(e))
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Configuration errors detected before any records are processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Keys requested by a process are absent from the stream header.
    #[error("invalid keys: {}", .0.join(","))]
    MissingKeys(Vec<String>),

    /// A column the process wants to add is already in the stream header.
    #[error("{0} already exists in data header")]
    KeyExists(String),

    /// The process parameters are inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Returns the [`StreamError`] at the root of `err`'s chain, if any.
pub fn stream_error(err: &anyhow::Error) -> Option<&StreamError> {
    err.chain().find_map(|e| e.downcast_ref::<StreamError>())
}

/// True when `err` only echoes a failure elsewhere in a pipeline.
pub fn is_cascade(err: &anyhow::Error) -> bool {
    stream_error(err).is_some_and(StreamError::is_cascade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn cascade_survives_context() {
        let err = Err::<(), _>(StreamError::Disconnected)
            .context("writing record 3")
            .unwrap_err();
        assert!(is_cascade(&err));
        let err = anyhow::Error::new(SchemaError::KeyExists("Sequence".into()));
        assert!(!is_cascade(&err));
    }

    #[test]
    fn missing_keys_message_lists_keys() {
        let e = SchemaError::MissingKeys(vec!["a".into(), "b".into()]);
        assert_eq!(e.to_string(), "invalid keys: a,b");
    }
}
