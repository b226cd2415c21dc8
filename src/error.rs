//! Typed error taxonomy for the RESP core.
//!
//! Every fallible function in this crate returns `Result<_, RespError>` so
//! callers can match on a specific kind, or just propagate with `?`.
use std::io;

use thiserror::Error;

/// A single RESP header line, kept around on errors that reference it
/// (`HeaderlineTooLarge`, `ResponseFormat`) for structured logging.
pub type Line = Vec<u8>;

/// Every error kind the core can produce, from a malformed wire frame to a
/// cluster redirect. Kinds carry the properties `read_response` needs to
/// hand back to a caller without re-parsing text (§4.H).
#[derive(Debug, Error)]
pub enum RespError {
    /// The underlying byte stream failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A RESP header line was zero bytes long.
    #[error("empty header line")]
    HeaderlineEmpty,

    /// A RESP header line exceeded the reader's maximum line length.
    #[error("header line too large ({} bytes)", .line.len())]
    HeaderlineTooLarge { line: Line },

    /// The first byte of a header line wasn't one of `+-:*$`.
    #[error("unknown header type")]
    UnknownHeaderType,

    /// A bulk string frame was not terminated by `\r\n`.
    #[error("bulk string missing trailing CRLF")]
    NoFinalRn,

    /// An ASCII integer header failed to parse.
    #[error("integer parsing failed: {reason}")]
    IntegerParsing { reason: &'static str },

    /// A `-MOVED`/`-ASK` line didn't have the expected `KIND slot endpoint` shape.
    #[error("malformed redirect response")]
    ResponseFormat { line: Line },

    /// A generic server-reported command error (e.g. `-ERR wrong type`).
    ///
    /// This is the one kind that is *not* fatal to an array reply: see
    /// [`crate::resp::read_response`].
    #[error("{0}")]
    Result(String),

    /// `-MOVED <slot> <endpoint>`: the key now lives on a different node.
    #[error("MOVED {slot} {moved_to}")]
    Moved { moved_to: String, slot: u16 },

    /// `-ASK <slot> <endpoint>`: retry this one request against `endpoint`.
    #[error("ASK {slot} {moved_to}")]
    Ask { moved_to: String, slot: u16 },

    /// `-LOADING`: the server is still loading its dataset.
    #[error("{0}")]
    Loading(String),

    /// `-EXECABORT`: the server refused to run a queued transaction.
    #[error("{0}")]
    ExecAbort(String),

    /// `-TRYAGAIN`: a cluster operation hit a transient multi-key conflict.
    #[error("{0}")]
    TryAgain(String),

    /// Synthesized by a Sender when a [`crate::request::ReplyFuture`] was
    /// already cancelled before the request could be put on the wire.
    #[error("request cancelled: {0}")]
    RequestCancelled(Box<RespError>),
}

impl RespError {
    /// Whether this error is a per-request server error that belongs inside
    /// an array reply rather than aborting the whole array (§4.C).
    pub fn is_result_error(&self) -> bool {
        matches!(self, RespError::Result(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_error_does_not_short_circuit() {
        let e = RespError::Result("WRONGTYPE Operation against a key".into());
        assert!(e.is_result_error());
    }

    #[test]
    fn other_kinds_are_not_result_errors() {
        assert!(!RespError::HeaderlineEmpty.is_result_error());
        assert!(
            !RespError::Moved {
                moved_to: "10.0.0.1:6379".into(),
                slot: 1234
            }
            .is_result_error()
        );
    }
}
