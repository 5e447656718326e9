//! Typed error hierarchy for the serial link stack.
//!
//! Three layers mirror the component boundaries of the stack: [`SerialError`] for
//! the OS-facing adapter (C1), [`LinkError`] for the data-link state machine (C3),
//! and [`TransferError`] for the application-framing layer (C4). Frame-level
//! parse problems (`INVALID_FRAME`, `BCC_ERROR`, `UNEXPECTED_CONTROL`) are handled
//! internally by the link layer and never become a variant here; they only ever
//! reach a caller as a `log` event.

use thiserror::Error;

/// Failure opening, configuring, or using the serial character device.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tcgetattr failed: {0}")]
    GetAttr(std::io::Error),
    #[error("tcsetattr failed: {0}")]
    SetAttr(std::io::Error),
    #[error("tcflush failed: {0}")]
    Flush(std::io::Error),
    #[error("I/O error on serial device: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure surfaced by the data-link layer (C3).
///
/// Only the two outcomes the application needs to see: a peer that
/// never answered (`Timeout`), and a peer that answered with `REJ` (`Rejected`).
/// Everything else (BCC errors, unexpected control bytes, duplicate frames) is
/// recovered from inside `write`/`read` and never leaves the link layer.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Serial(#[from] SerialError),
    #[error("connection timed out after {retries} retries")]
    Timeout { retries: u32 },
    #[error("frame rejected by peer")]
    Rejected,
    #[error("operation attempted while link is not in the expected state")]
    WrongState,
}

/// Failure surfaced by the application-framing layer (C4).
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("unexpected application packet: expected {expected}, got tag 0x{got:02x}")]
    Protocol { expected: &'static str, got: u8 },
    #[error("malformed {what} packet")]
    Malformed { what: &'static str },
    #[error("I/O error on file: {0}")]
    Io(#[from] std::io::Error),
}
