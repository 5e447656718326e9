//! Stop-and-wait, HDLC-style data-link and file-transfer stack for a
//! point-to-point serial connection.
//!
//! - [`serial`] — the only module that touches the operating system: POSIX
//!   termios configuration of a character device (C1).
//! - [`codec`] — a pure, stateless frame codec: byte stuffing, BCC checksums,
//!   and the five-state receive scanner (C2).
//! - [`link`] — the connection state machine: SET/UA/DISC lifecycle,
//!   sequence bits, retransmission (C3).
//! - [`packet`] — START/DATA/END application framing over an open link (C4).
//!
//! ```no_run
//! use serial_link::config::LinkConfig;
//! use serial_link::link::{LinkEndpoint, Role};
//! use serial_link::serial::PosixSerialPort;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = PosixSerialPort::open("/dev/ttyS1")?;
//! let mut link = LinkEndpoint::new(port, Role::Transmitter, LinkConfig::default());
//! link.open()?;
//! link.write(b"hello")?;
//! link.close()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod packet;
pub mod serial;
