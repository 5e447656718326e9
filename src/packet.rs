//! Application-layer packet framing (C4).
//!
//! Sits on top of [`LinkEndpoint`], turning a byte stream into START/DATA/END
//! packets and back. Generic over `Read`/`Write` so a CLI binary can hand in
//! an open file and a test can hand in a `Cursor<Vec<u8>>`.

use crate::config::MAX_CHUNK_LEN;
use crate::error::TransferError;
use crate::link::LinkEndpoint;
use crate::serial::SerialPort;
use std::io::{Read, Write};

const START: u8 = 0x02;
const DATA: u8 = 0x01;
const END: u8 = 0x03;

const TAG_FILE_SIZE: u8 = 0x00;
const TAG_FILE_NAME: u8 = 0x01;

/// Fields carried by a START packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_name: String,
    pub file_size: u64,
}

fn build_start_packet(info: &FileInfo) -> Vec<u8> {
    let size_bytes = info.file_size.to_be_bytes();
    let mut packet = Vec::with_capacity(3 + size_bytes.len() + 1 + info.file_name.len() + 1);
    packet.push(START);
    packet.push(TAG_FILE_SIZE);
    packet.push(size_bytes.len() as u8);
    packet.extend_from_slice(&size_bytes);
    packet.push(TAG_FILE_NAME);
    packet.extend_from_slice(info.file_name.as_bytes());
    packet.push(0); // NUL terminator, sent explicitly rather than relied upon
    packet
}

fn parse_start_packet(buf: &[u8]) -> Result<FileInfo, TransferError> {
    let malformed = || TransferError::Malformed { what: "START" };

    if buf.first() != Some(&START) {
        return Err(TransferError::Protocol {
            expected: "START",
            got: buf.first().copied().unwrap_or(0),
        });
    }
    if buf.get(1) != Some(&TAG_FILE_SIZE) {
        return Err(malformed());
    }
    let size_len = *buf.get(2).ok_or_else(malformed)? as usize;
    let size_bytes = buf.get(3..3 + size_len).ok_or_else(malformed)?;
    let mut padded = [0u8; 8];
    if size_len > 8 {
        return Err(malformed());
    }
    padded[8 - size_len..].copy_from_slice(size_bytes);
    let file_size = u64::from_be_bytes(padded);

    let name_tag_pos = 3 + size_len;
    if buf.get(name_tag_pos) != Some(&TAG_FILE_NAME) {
        return Err(malformed());
    }
    let name_bytes = &buf[name_tag_pos + 1..];
    let nul_pos = name_bytes.iter().position(|&b| b == 0).ok_or_else(malformed)?;
    let file_name = String::from_utf8(name_bytes[..nul_pos].to_vec()).map_err(|_| malformed())?;

    Ok(FileInfo { file_name, file_size })
}

fn build_data_packet(chunk: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(3 + chunk.len());
    packet.push(DATA);
    packet.push((chunk.len() >> 8) as u8);
    packet.push(chunk.len() as u8);
    packet.extend_from_slice(chunk);
    packet
}

fn parse_data_packet(buf: &[u8]) -> Result<&[u8], TransferError> {
    let malformed = || TransferError::Malformed { what: "DATA" };
    let len = ((*buf.get(1).ok_or_else(malformed)? as usize) << 8) | *buf.get(2).ok_or_else(malformed)? as usize;
    buf.get(3..3 + len).ok_or_else(malformed)
}

/// Sender half: transmit `source`'s full contents as one file transfer.
/// Assumes `link.open()` has already succeeded; calls `link.close()` itself
/// once the END packet has been sent.
pub fn send_file<P: SerialPort, R: Read>(
    link: &mut LinkEndpoint<P>,
    info: &FileInfo,
    mut source: R,
) -> Result<u64, TransferError> {
    let start = build_start_packet(info);
    if start.len() > crate::codec::MAX_PAYLOAD {
        return Err(TransferError::Malformed {
            what: "file name too long for a START packet",
        });
    }
    link.write(&start)?;

    let mut sent = 0u64;
    let mut chunk = vec![0u8; MAX_CHUNK_LEN];
    loop {
        let n = source.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        link.write(&build_data_packet(&chunk[..n]))?;
        sent += n as u64;
    }

    link.write(&[END])?;
    link.close()?;
    Ok(sent)
}

/// Receiver half: read one full file transfer into `dest`, returning the
/// declared [`FileInfo`]. Assumes `link.open()` has already succeeded; calls
/// `link.close()` itself once the END packet has been received.
pub fn receive_file<P: SerialPort, W: Write>(
    link: &mut LinkEndpoint<P>,
    mut dest: W,
) -> Result<FileInfo, TransferError> {
    let mut buf = Vec::new();
    link.read(&mut buf)?;
    let info = parse_start_packet(&buf)?;

    let mut received = 0u64;
    loop {
        buf.clear();
        link.read(&mut buf)?;
        match buf.first() {
            Some(&DATA) => {
                let payload = parse_data_packet(&buf)?;
                dest.write_all(payload)?;
                received += payload.len() as u64;
            }
            Some(&END) => break,
            Some(&got) => {
                return Err(TransferError::Protocol {
                    expected: "DATA or END",
                    got,
                })
            }
            None => return Err(TransferError::Malformed { what: "packet" }),
        }
    }

    if received != info.file_size {
        log::warn!(
            "received {} bytes, declared file size was {}",
            received,
            info.file_size
        );
    }

    link.close()?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_packet_round_trips() {
        let info = FileInfo {
            file_name: "report.pdf".to_string(),
            file_size: 123_456,
        };
        let packet = build_start_packet(&info);
        let parsed = parse_start_packet(&packet).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn start_packet_matches_declared_width_encoding() {
        let info = FileInfo {
            file_name: "a".to_string(),
            file_size: 0x01020304,
        };
        let packet = build_start_packet(&info);
        // type, tag, len=4, then the four size bytes big-endian.
        assert_eq!(&packet[..7], &[START, TAG_FILE_SIZE, 4, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(packet[7], TAG_FILE_NAME);
        assert_eq!(&packet[8..], b"a\0");
    }

    #[test]
    fn data_packet_round_trips() {
        let packet = build_data_packet(b"hello");
        assert_eq!(packet, vec![DATA, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(parse_data_packet(&packet).unwrap(), b"hello");
    }

    #[test]
    fn parse_start_rejects_wrong_type() {
        let err = parse_start_packet(&[DATA, 0, 0]).unwrap_err();
        assert!(matches!(err, TransferError::Protocol { expected: "START", got } if got == DATA));
    }

    #[test]
    fn parse_start_rejects_missing_nul_terminator() {
        let mut packet = build_start_packet(&FileInfo {
            file_name: "x".to_string(),
            file_size: 1,
        });
        packet.pop(); // drop the terminating NUL
        let err = parse_start_packet(&packet).unwrap_err();
        assert!(matches!(err, TransferError::Malformed { what: "START" }));
    }
}
