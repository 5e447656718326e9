//! Serial port adapter (C1).
//!
//! The only module allowed to call directly into the operating system. It
//! binds `libc`'s `termios`/`open`/`read`/`write` family the way a small
//! systems crate binds POSIX — a thin, typed wrapper, never a re-implementation
//! of termios. Everything above this layer talks to the [`SerialPort`] trait,
//! so the link layer (C3) can be driven and tested against an in-memory fake
//! without touching a real device.

use crate::error::SerialError;

/// Byte-granularity, non-blocking access to a character device.
///
/// `read_byte` returning `Ok(None)` means "no byte available right now", not
/// end-of-stream — mirroring a `VMIN=0, VTIME=0` read returning zero bytes.
pub trait SerialPort {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError>;
    fn write_all(&mut self, buf: &[u8]) -> Result<(), SerialError>;
}

#[cfg(unix)]
pub use posix::PosixSerialPort;

#[cfg(unix)]
mod posix {
    use super::SerialPort;
    use crate::error::SerialError;
    use std::ffi::CString;
    use std::os::unix::io::RawFd;

    /// A POSIX character device opened in raw mode for a `/dev/ttyS<N>`-class
    /// device: 38400-8N1, `CLOCAL | CREAD`, non-canonical, `VMIN=0 VTIME=0`.
    pub struct PosixSerialPort {
        fd: RawFd,
        saved_termios: libc::termios,
    }

    impl PosixSerialPort {
        /// Opens `path` for read/write without acquiring it as a controlling
        /// terminal, captures the prior termios settings, flushes pending
        /// I/O, and applies the raw configuration.
        pub fn open(path: &str) -> Result<Self, SerialError> {
            let c_path = CString::new(path).map_err(|_| SerialError::Open {
                path: path.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "device path contains a NUL byte",
                ),
            })?;

            let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
            if fd < 0 {
                return Err(SerialError::Open {
                    path: path.to_string(),
                    source: std::io::Error::last_os_error(),
                });
            }

            match Self::configure(fd) {
                Ok(saved_termios) => Ok(PosixSerialPort { fd, saved_termios }),
                Err(err) => {
                    unsafe { libc::close(fd) };
                    Err(err)
                }
            }
        }

        fn configure(fd: RawFd) -> Result<libc::termios, SerialError> {
            let mut saved: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
                return Err(SerialError::GetAttr(std::io::Error::last_os_error()));
            }

            let mut raw: libc::termios = unsafe { std::mem::zeroed() };
            raw.c_cflag = libc::B38400 | libc::CS8 | libc::CLOCAL | libc::CREAD;
            raw.c_iflag = libc::IGNPAR;
            raw.c_oflag = 0;
            raw.c_lflag = 0;
            raw.c_cc[libc::VTIME] = 0;
            raw.c_cc[libc::VMIN] = 0;

            if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0 {
                return Err(SerialError::Flush(std::io::Error::last_os_error()));
            }
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
                return Err(SerialError::SetAttr(std::io::Error::last_os_error()));
            }

            Ok(saved)
        }
    }

    impl SerialPort for PosixSerialPort {
        fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
            let mut byte: u8 = 0;
            let n = unsafe {
                libc::read(self.fd, &mut byte as *mut u8 as *mut libc::c_void, 1)
            };
            match n {
                0 => Ok(None),
                1 => Ok(Some(byte)),
                _ => {
                    let err = std::io::Error::last_os_error();
                    // VMIN=0, VTIME=0 makes "nothing available" a 0-byte
                    // return, but treat EAGAIN the same way defensively.
                    if err.kind() == std::io::ErrorKind::WouldBlock {
                        Ok(None)
                    } else {
                        Err(SerialError::Io(err))
                    }
                }
            }
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), SerialError> {
            let mut written = 0;
            while written < buf.len() {
                let n = unsafe {
                    libc::write(
                        self.fd,
                        buf[written..].as_ptr() as *const libc::c_void,
                        buf.len() - written,
                    )
                };
                if n < 0 {
                    return Err(SerialError::Io(std::io::Error::last_os_error()));
                }
                written += n as usize;
            }
            Ok(())
        }
    }

    impl Drop for PosixSerialPort {
        fn drop(&mut self) {
            // Best-effort: there's no way to report a failure from `Drop`,
            // and nothing further to do about it if either call fails.
            unsafe {
                libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved_termios);
                libc::close(self.fd);
            }
        }
    }
}
