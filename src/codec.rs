//! Pure, stateless HDLC-style frame codec (C2).
//!
//! `build_frame` turns a [`Control`] byte and an optional payload into the bytes
//! that go on the wire. [`FrameScanner`] is the receive-side counterpart: feed it
//! one byte at a time and it reports back whole frames, or a reason a byte
//! sequence didn't become one. Neither function knows about retransmission,
//! timers, or sequence-bit bookkeeping — that's C3's job.

/// Frame delimiter. Never appears unescaped inside the protected region.
pub const FLAG: u8 = 0x7E;
const ESC: u8 = 0x7D;
const ESC_XOR: u8 = 0x20;

/// Address byte for this profile: constant in both directions.
pub const ADDRESS: u8 = 0x03;

/// Largest payload a single I-frame may carry, before stuffing.
pub const MAX_PAYLOAD: usize = 255;

/// Worst case on-wire size of a frame: every protected byte stuffed, plus
/// `FLAG A C BCC1 .. BCC2 FLAG` overhead.
pub const MAX_FRAME_SIZE: usize = 2 * MAX_PAYLOAD + 6;

/// The distinct frame kinds this profile exchanges.
///
/// `Info`/`Rr`/`Rej` carry an alternating sequence bit, always `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Set,
    Ua,
    Disc,
    Info(u8),
    Rr(u8),
    Rej(u8),
}

impl Control {
    pub fn to_byte(self) -> u8 {
        match self {
            Control::Set => 0x03,
            Control::Ua => 0x07,
            Control::Disc => 0x0B,
            Control::Info(0) => 0x00,
            Control::Info(_) => 0x40,
            Control::Rr(0) => 0x05,
            Control::Rr(_) => 0x85,
            Control::Rej(0) => 0x01,
            Control::Rej(_) => 0x81,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Control> {
        match byte {
            0x03 => Some(Control::Set),
            0x07 => Some(Control::Ua),
            0x0B => Some(Control::Disc),
            0x00 => Some(Control::Info(0)),
            0x40 => Some(Control::Info(1)),
            0x05 => Some(Control::Rr(0)),
            0x85 => Some(Control::Rr(1)),
            0x01 => Some(Control::Rej(0)),
            0x81 => Some(Control::Rej(1)),
            _ => None,
        }
    }

    /// Only I-frames carry a payload and a BCC2 trailer.
    pub fn carries_payload(self) -> bool {
        matches!(self, Control::Info(_))
    }
}

/// XOR-fold of a byte slice. `BCC1 = A xor C`; `BCC2 = fold_xor(payload)`.
pub fn fold_xor(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn stuff_into(out: &mut Vec<u8>, byte: u8) {
    if byte == FLAG || byte == ESC {
        out.push(ESC);
        out.push(byte ^ ESC_XOR);
    } else {
        out.push(byte);
    }
}

/// Escape every `FLAG`/`ESC` byte in `data` as `ESC, byte xor 0x20`.
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        stuff_into(&mut out, b);
    }
    out
}

/// Reverse of [`stuff`]. Returns `None` if `data` ends on a dangling escape
/// byte (truncated frame).
pub fn destuff(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().copied();
    while let Some(b) = iter.next() {
        if b == ESC {
            let next = iter.next()?;
            out.push(next ^ ESC_XOR);
        } else {
            out.push(b);
        }
    }
    Some(out)
}

/// Build the on-wire bytes for `control`, carrying `payload` if it is an I-frame.
///
/// `payload` is ignored for control/supervisory frames; BCC2 is the XOR-fold
/// of the *unstuffed* payload, computed before stuffing is applied (an empty
/// payload folds to zero).
pub fn build_frame(control: Control, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + payload.len());
    out.push(FLAG);
    out.push(ADDRESS);
    let c = control.to_byte();
    out.push(c);
    out.push(ADDRESS ^ c);

    if control.carries_payload() {
        out.extend(stuff(payload));
        let bcc2 = fold_xor(payload);
        stuff_into(&mut out, bcc2);
    }

    out.push(FLAG);
    out
}

/// Which control codes a particular [`FrameScanner`] instance will accept.
///
/// Parameterising the scanner (rather than having one scanner accept every
/// control byte) keeps "is this frame structurally valid" separate from "is
/// this frame one my caller is currently waiting for" — the link layer's three
/// call sites (await SET/UA/DISC, await RR/REJ, await I-frames) each want a
/// different answer to the second question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptSet {
    /// SET / UA / DISC — connection setup and teardown.
    Commands,
    /// RR(0/1) / REJ(0/1) — acknowledgements awaited by a transmitter.
    Supervisory,
    /// I(0) / I(1) — data frames awaited by a receiver.
    Information,
}

impl AcceptSet {
    fn accepts(self, control: Control) -> bool {
        matches!(
            (self, control),
            (AcceptSet::Commands, Control::Set | Control::Ua | Control::Disc)
                | (AcceptSet::Supervisory, Control::Rr(_) | Control::Rej(_))
                | (AcceptSet::Information, Control::Info(_))
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Start,
    FlagRcv,
    ARcv,
    CRcv(Control),
    BccOk(Control),
}

/// Outcome of feeding one byte into a [`FrameScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedResult {
    /// Still mid-frame; nothing to report yet.
    Pending,
    /// A structurally valid, BCC-clean frame of an accepted kind.
    Frame { control: Control, payload: Vec<u8> },
    /// BCC1 passed but BCC2 did not (I-frames only).
    BccMismatch { control: Control },
    /// Structurally valid and BCC-clean, but not a kind this call site is
    /// waiting for right now.
    UnexpectedControl { control: Control },
    /// Truncated or otherwise malformed; dropped without identifying a control byte.
    Discarded,
}

/// Five-state receive scanner: `START -> FLAG_RCV -> A_RCV -> C_RCV -> BCC_OK`.
///
/// Stateless with respect to the *protocol* (no sequencing, no timers) but
/// necessarily stateful with respect to *where we are in the current frame*.
pub struct FrameScanner {
    accept: AcceptSet,
    state: ScanState,
    payload_acc: Vec<u8>,
}

impl FrameScanner {
    pub fn new(accept: AcceptSet) -> Self {
        FrameScanner {
            accept,
            state: ScanState::Start,
            payload_acc: Vec::new(),
        }
    }

    /// Feed one raw (not-yet-destuffed) byte off the wire.
    pub fn feed(&mut self, byte: u8) -> FeedResult {
        // An unescaped FLAG can never appear inside the protected region (see
        // `stuff`), so seeing one always means either "start of frame" or, if
        // we're mid-payload, "end of frame" — never line noise to discard.
        if byte == FLAG {
            return match self.state {
                ScanState::BccOk(control) => self.finish_frame(control),
                _ => {
                    self.state = ScanState::FlagRcv;
                    self.payload_acc.clear();
                    FeedResult::Pending
                }
            };
        }

        match self.state {
            ScanState::Start => FeedResult::Pending,
            ScanState::FlagRcv => {
                self.state = if byte == ADDRESS {
                    ScanState::ARcv
                } else {
                    ScanState::Start
                };
                FeedResult::Pending
            }
            ScanState::ARcv => {
                self.state = match Control::from_byte(byte) {
                    Some(control) => ScanState::CRcv(control),
                    None => ScanState::Start,
                };
                FeedResult::Pending
            }
            ScanState::CRcv(control) => {
                self.state = if byte == (ADDRESS ^ control.to_byte()) {
                    self.payload_acc.clear();
                    ScanState::BccOk(control)
                } else {
                    ScanState::Start
                };
                FeedResult::Pending
            }
            ScanState::BccOk(control) => {
                if control.carries_payload() {
                    self.payload_acc.push(byte);
                } else {
                    // A non-I frame expects the terminating FLAG immediately;
                    // anything else is a malformed frame, resync.
                    self.state = ScanState::Start;
                }
                FeedResult::Pending
            }
        }
    }

    fn finish_frame(&mut self, control: Control) -> FeedResult {
        self.state = ScanState::Start;
        let acc = std::mem::take(&mut self.payload_acc);

        if !control.carries_payload() {
            if !acc.is_empty() {
                return FeedResult::Discarded;
            }
            return self.classify(control, Vec::new());
        }

        let destuffed = match destuff(&acc) {
            Some(d) => d,
            None => return FeedResult::Discarded,
        };
        // Need at least the BCC2 byte.
        if destuffed.is_empty() {
            return FeedResult::Discarded;
        }
        let (payload, bcc2_slice) = destuffed.split_at(destuffed.len() - 1);
        let bcc2 = bcc2_slice[0];
        if fold_xor(payload) != bcc2 {
            return FeedResult::BccMismatch { control };
        }
        self.classify(control, payload.to_vec())
    }

    fn classify(&self, control: Control, payload: Vec<u8>) -> FeedResult {
        if self.accept.accepts(control) {
            FeedResult::Frame { control, payload }
        } else {
            FeedResult::UnexpectedControl { control }
        }
    }
}
