//! Data-link state machine (C3).
//!
//! Owns retransmission, timers, and the alternating sequence bit for one end
//! of a point-to-point connection. Generic over [`SerialPort`] so it can be
//! driven against a real device or an in-memory fake with the same code.
//!
//! There is no signal-driven timer here: every endpoint carries its own retry
//! counter and deadline as plain fields, computed from [`std::time::Instant`].
//! Two endpoints in one process share nothing.

use crate::codec::{build_frame, AcceptSet, Control, FeedResult, FrameScanner};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::serial::SerialPort;
use log::{debug, trace, warn};
use std::time::{Duration, Instant};

/// Which side of the connection this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiates SET, drives retransmission on `write`, initiates DISC.
    Transmitter,
    /// Waits for SET, replies to `write`, waits for DISC.
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Closed,
    Data,
}

/// One end of a stop-and-wait connection over a [`SerialPort`].
pub struct LinkEndpoint<P: SerialPort> {
    port: P,
    role: Role,
    config: LinkConfig,
    state: ConnectionState,
    /// Next sequence bit this endpoint will send (TX) or expects (RX).
    seq: u8,
}

impl<P: SerialPort> LinkEndpoint<P> {
    pub fn new(port: P, role: Role, config: LinkConfig) -> Self {
        LinkEndpoint {
            port,
            role,
            config,
            state: ConnectionState::Closed,
            seq: 0,
        }
    }

    /// Blocks until a single raw byte is available, sleeping `poll_interval`
    /// between zero-byte reads so a busy endpoint doesn't spin a core.
    fn read_byte_blocking(&mut self) -> Result<u8, LinkError> {
        loop {
            if let Some(b) = self.port.read_byte().map_err(LinkError::Serial)? {
                return Ok(b);
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }

    fn send(&mut self, control: Control, payload: &[u8]) -> Result<(), LinkError> {
        trace!("sending {control:?} ({} byte payload)", payload.len());
        let frame = build_frame(control, payload);
        self.port.write_all(&frame).map_err(LinkError::Serial)
    }

    /// Runs `control`/await-`accept` with the endpoint's standard
    /// retransmission policy; `accept_control` decides which received control
    /// byte ends the wait successfully. Returns the matched [`Control`].
    ///
    /// A structurally valid frame that isn't the one awaited (wrong control,
    /// bad BCC, truncation) is benign: it resets the scanner and keeps
    /// waiting out the current deadline. Only the deadline itself triggers a
    /// retransmission.
    fn send_and_await(
        &mut self,
        send_control: Control,
        accept: AcceptSet,
        accept_control: impl Fn(Control) -> bool,
    ) -> Result<Control, LinkError> {
        let mut retries = 0;
        loop {
            self.send(send_control, &[])?;
            let deadline = Instant::now() + self.config.timeout;
            let mut scanner = FrameScanner::new(accept);

            let outcome = loop {
                if Instant::now() >= deadline {
                    break None;
                }
                match self.port.read_byte().map_err(LinkError::Serial)? {
                    Some(b) => match scanner.feed(b) {
                        FeedResult::Pending => {}
                        FeedResult::Frame { control, .. } if accept_control(control) => {
                            break Some(control);
                        }
                        FeedResult::Frame { control, .. } => {
                            debug!("got {control:?} while awaiting a reply to {send_control:?}, still waiting");
                            scanner = FrameScanner::new(accept);
                        }
                        FeedResult::BccMismatch { control } => {
                            warn!("BCC mismatch on {control:?} while awaiting a reply to {send_control:?}");
                            scanner = FrameScanner::new(accept);
                        }
                        FeedResult::UnexpectedControl { control } => {
                            warn!("unexpected control {control:?} while awaiting a reply to {send_control:?}");
                            scanner = FrameScanner::new(accept);
                        }
                        FeedResult::Discarded => {
                            scanner = FrameScanner::new(accept);
                        }
                    },
                    None => std::thread::sleep(self.config.poll_interval),
                }
            };

            match outcome {
                Some(control) => return Ok(control),
                None => {
                    retries += 1;
                    if retries >= self.config.max_retries {
                        warn!("giving up on a reply to {send_control:?} after {retries} retries");
                        return Err(LinkError::Timeout { retries });
                    }
                    debug!(
                        "timed out awaiting a reply to {send_control:?}, retrying ({retries}/{})",
                        self.config.max_retries
                    );
                }
            }
        }
    }

    /// Establishes the connection. TX sends SET and retries until UA;
    /// RX waits indefinitely for SET and replies with UA once.
    pub fn open(&mut self) -> Result<(), LinkError> {
        match self.role {
            Role::Transmitter => {
                self.send_and_await(Control::Set, AcceptSet::Commands, |c| c == Control::Ua)?;
            }
            Role::Receiver => {
                let mut scanner = FrameScanner::new(AcceptSet::Commands);
                loop {
                    let b = self.read_byte_blocking()?;
                    match scanner.feed(b) {
                        FeedResult::Frame { control: Control::Set, .. } => break,
                        _ => continue,
                    }
                }
                self.send(Control::Ua, &[])?;
            }
        }
        self.state = ConnectionState::Data;
        self.seq = 0;
        Ok(())
    }

    /// Sends one I-frame and waits for its acknowledgement (TX only).
    pub fn write(&mut self, payload: &[u8]) -> Result<usize, LinkError> {
        if self.state != ConnectionState::Data || self.role != Role::Transmitter {
            return Err(LinkError::WrongState);
        }
        debug_assert!(payload.len() <= crate::codec::MAX_PAYLOAD);

        let control = Control::Info(self.seq);
        let mut retries = 0;
        loop {
            self.send(control, payload)?;
            let deadline = Instant::now() + self.config.timeout;
            let mut scanner = FrameScanner::new(AcceptSet::Supervisory);

            // Scan within this timeout window; a duplicate ack or other
            // stray-but-valid frame is benign and does not trigger an early
            // retransmit — only the deadline does.
            let outcome = loop {
                if Instant::now() >= deadline {
                    break None;
                }
                match self.port.read_byte().map_err(LinkError::Serial)? {
                    Some(b) => match scanner.feed(b) {
                        FeedResult::Frame { control: Control::Rr(n), .. } if n != self.seq => {
                            break Some(true);
                        }
                        FeedResult::Frame { control: Control::Rej(n), .. } if n == self.seq => {
                            break Some(false);
                        }
                        FeedResult::Pending => {}
                        FeedResult::BccMismatch { control } => {
                            warn!("BCC mismatch on {control:?} while awaiting ack for I({})", self.seq);
                            scanner = FrameScanner::new(AcceptSet::Supervisory);
                        }
                        FeedResult::UnexpectedControl { control } => {
                            warn!("unexpected control {control:?} while awaiting ack for I({})", self.seq);
                            scanner = FrameScanner::new(AcceptSet::Supervisory);
                        }
                        FeedResult::Frame { control, .. } => {
                            debug!("duplicate ack {control:?} while awaiting ack for I({})", self.seq);
                            scanner = FrameScanner::new(AcceptSet::Supervisory);
                        }
                        FeedResult::Discarded => scanner = FrameScanner::new(AcceptSet::Supervisory),
                    },
                    None => std::thread::sleep(self.config.poll_interval),
                }
            };

            match outcome {
                Some(true) => {
                    self.seq ^= 1;
                    return Ok(payload.len());
                }
                Some(false) => {
                    warn!("I({}) rejected by peer", self.seq);
                    return Err(LinkError::Rejected);
                }
                None => {
                    retries += 1;
                    if retries >= self.config.max_retries {
                        warn!("giving up on I({}) after {retries} retries", self.seq);
                        return Err(LinkError::Timeout { retries });
                    }
                    debug!(
                        "timed out awaiting ack for I({}), retrying ({retries}/{})",
                        self.seq, self.config.max_retries
                    );
                }
            }
        }
    }

    /// Waits for the next I-frame and delivers its payload (RX only).
    /// Loops internally past duplicate and malformed frames.
    pub fn read(&mut self, out: &mut Vec<u8>) -> Result<usize, LinkError> {
        if self.state != ConnectionState::Data || self.role != Role::Receiver {
            return Err(LinkError::WrongState);
        }
        loop {
            let mut scanner = FrameScanner::new(AcceptSet::Information);
            loop {
                let b = self.read_byte_blocking()?;
                match scanner.feed(b) {
                    FeedResult::Pending => continue,
                    FeedResult::Frame { control: Control::Info(n), payload } => {
                        if n == self.seq {
                            debug!("delivering I({n}), {} byte payload", payload.len());
                            out.clear();
                            out.extend_from_slice(&payload);
                            self.send(Control::Rr(1 - self.seq), &[])?;
                            let len = payload.len();
                            self.seq ^= 1;
                            return Ok(len);
                        } else {
                            // Duplicate: our last RR was lost. Resend it,
                            // don't toggle, don't deliver.
                            debug!("duplicate I({n}), expected I({}), resending ack", self.seq);
                            self.send(Control::Rr(1 - n), &[])?;
                            break;
                        }
                    }
                    // `AcceptSet::Information` only ever classifies `Control::Info`
                    // as `Frame`; this arm exists to satisfy exhaustiveness.
                    FeedResult::Frame { control, .. } => {
                        unreachable!("Information scanner produced a non-Info frame: {control:?}")
                    }
                    FeedResult::BccMismatch { control } => {
                        warn!("BCC mismatch on {control:?}, sending REJ({})", self.seq);
                        self.send(Control::Rej(self.seq), &[])?;
                        break;
                    }
                    FeedResult::UnexpectedControl { control } => {
                        warn!("unexpected control {control:?} while awaiting I-frames");
                        continue;
                    }
                    FeedResult::Discarded => continue,
                }
            }
        }
    }

    /// Tears down the connection.
    pub fn close(&mut self) -> Result<(), LinkError> {
        match self.role {
            Role::Transmitter => {
                self.send_and_await(Control::Disc, AcceptSet::Commands, |c| c == Control::Disc)?;
                self.send(Control::Ua, &[])?;
                // The final UA is never acknowledged; give it a moment to
                // drain onto the wire before the port is torn down.
                std::thread::sleep(Duration::from_millis(50));
            }
            Role::Receiver => {
                let mut scanner = FrameScanner::new(AcceptSet::Commands);
                loop {
                    let b = self.read_byte_blocking()?;
                    match scanner.feed(b) {
                        FeedResult::Frame { control: Control::Disc, .. } => break,
                        _ => continue,
                    }
                }
                self.send_and_await(Control::Disc, AcceptSet::Commands, |c| c == Control::Ua)?;
            }
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }
}
