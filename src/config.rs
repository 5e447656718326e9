//! Tunables for the link layer.
//!
//! No environment or file-based configuration layer: the link endpoint takes
//! its tunables as plain constructor arguments, and a point-to-point link
//! with three knobs doesn't earn a config crate of its own.

use std::time::Duration;

/// Largest chunk of file data one DATA packet carries: a DATA packet
/// header is 3 bytes (tag + big-endian length), leaving this much room inside
/// the 255-byte I-frame payload budget.
pub const MAX_CHUNK_LEN: usize = 252;

/// Retransmission policy shared by every timed wait in the link layer
/// (`open`, `write`, `close`).
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// How long to wait for a reply before retransmitting.
    pub timeout: Duration,
    /// How many consecutive timeouts to tolerate before giving up.
    pub max_retries: u32,
    /// Poll interval used while waiting for bytes that haven't arrived yet.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            timeout: Duration::from_secs(3),
            max_retries: 3,
            poll_interval: Duration::from_millis(10),
        }
    }
}
