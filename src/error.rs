//! Error taxonomy for the terminal emulation core.
//!
//! Most of these variants are never surfaced as `Err` — the parser and
//! VTerm recover locally and log instead, per the propagation policy:
//! only disk and PTY I/O failures are worth a caller's attention.

use std::path::PathBuf;

/// Errors produced by the terminal core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input that was recovered locally (substituted or clamped).
    /// Kept as a variant for completeness and for tests that want to assert
    /// recovery happened; never returned from a public operation.
    #[error("malformed input: {0}")]
    ParseMalformed(String),

    /// Unrecognized CSI/OSC/DCS dispatch. Logged at trace level, never returned.
    #[error("unknown dispatch: {0}")]
    UnknownDispatch(String),

    /// TXHIST02 record framing was broken at the given byte offset.
    #[error("disk history integrity error in {path}: {detail} (truncating to offset {last_good_offset})")]
    DiskIntegrity {
        /// History file path.
        path: PathBuf,
        /// Last-known-good offset to truncate to.
        last_good_offset: u64,
        /// Human-readable detail.
        detail: String,
    },

    /// The disk history log could not be opened or written.
    #[error("disk history unavailable at {path}: {source}")]
    DiskUnavailable {
        /// History file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A requested `GlobalLineIdx` is not resident and disk is disabled.
    #[error("line {0} is not resident and disk history is disabled")]
    PagingMiss(u64),

    /// I/O error reading from or writing to the PTY. Terminates the session.
    #[error("pty i/o error: {0}")]
    PtyIo(#[source] std::io::Error),

    /// Zero or absurd resize dimensions were requested; clamped to `(1, 1)`.
    #[error("resize out of bounds: {cols}x{rows}, clamped to 1x1")]
    ResizeOutOfBounds {
        /// Requested columns.
        cols: i64,
        /// Requested rows.
        rows: i64,
    },
}

/// Convenience alias for fallible core operations.
pub type Result<T> = std::result::Result<T, Error>;
