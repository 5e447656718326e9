//! Receiver CLI: `rx <port-number> <dest-path>`.
//!
//! Thin wiring only: opens the device, drives [`serial_link`]'s link and
//! packet layers, and renders a progress bar as DATA packets arrive.

use log::error;
use serial_link::config::LinkConfig;
use serial_link::link::{LinkEndpoint, Role};
use serial_link::packet;
use serial_link::serial::PosixSerialPort;
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

const PROGRESS_WIDTH: usize = 50;

fn print_usage(prog: &str) {
    eprintln!("usage: {prog} <port-number> <dest-path>");
}

fn draw_progress(received: u64) {
    // Total size isn't known until the START packet is parsed inside
    // `packet::receive_file`, so the receiver renders an indeterminate
    // bar: a fixed width scrolling with bytes received so far.
    let filled = (received as usize / 64) % PROGRESS_WIDTH;
    let mut bar = vec![b'-'; PROGRESS_WIDTH];
    bar[filled] = b'#';
    print!("\r[{}] {received} bytes", String::from_utf8_lossy(&bar));
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

fn run() -> Result<(), String> {
    let mut args = std::env::args();
    let prog = args.next().unwrap_or_else(|| "rx".to_string());
    let port_number: u32 = match args.next() {
        Some(s) => s.parse().map_err(|_| "port-number must be an integer".to_string())?,
        None => {
            print_usage(&prog);
            return Err("missing <port-number>".to_string());
        }
    };
    let dest_path = match args.next() {
        Some(s) => s,
        None => {
            print_usage(&prog);
            return Err("missing <dest-path>".to_string());
        }
    };

    let device_path = format!("/dev/ttyS{port_number}");
    let port = PosixSerialPort::open(&device_path).map_err(|e| e.to_string())?;
    let mut link = LinkEndpoint::new(port, Role::Receiver, LinkConfig::default());
    link.open().map_err(|e| e.to_string())?;

    let file = File::create(&dest_path).map_err(|e| format!("creating {dest_path}: {e}"))?;
    let mut progress_writer = ProgressWriter {
        inner: BufWriter::new(file),
        received: 0,
    };
    let info = packet::receive_file(&mut link, &mut progress_writer).map_err(|e| e.to_string())?;
    println!("\nreceived {} ({} bytes declared)", info.file_name, info.file_size);
    Ok(())
}

struct ProgressWriter<W> {
    inner: W,
    received: u64,
}

impl<W: std::io::Write> std::io::Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.received += n as u64;
        draw_progress(self.received);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            error!("{msg}");
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
