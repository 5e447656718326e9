//! Transmitter CLI: `tx <port-number> <source-path>`.
//!
//! Thin wiring only: opens the device and the file, drives [`serial_link`]'s
//! link and packet layers, and renders a progress bar. Argument parsing is
//! deliberately hand-rolled; this binary is not part of the audited core.

use log::error;
use serial_link::config::LinkConfig;
use serial_link::link::{LinkEndpoint, Role};
use serial_link::packet::{self, FileInfo};
use serial_link::serial::PosixSerialPort;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

const PROGRESS_WIDTH: usize = 50;

fn print_usage(prog: &str) {
    eprintln!("usage: {prog} <port-number> <source-path>");
}

fn draw_progress(sent: u64, total: u64) {
    let filled = if total == 0 {
        PROGRESS_WIDTH
    } else {
        ((sent * PROGRESS_WIDTH as u64) / total).min(PROGRESS_WIDTH as u64) as usize
    };
    print!(
        "\r[{}{}] {sent}/{total} bytes",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
    );
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

fn run() -> Result<(), String> {
    let mut args = std::env::args();
    let prog = args.next().unwrap_or_else(|| "tx".to_string());
    let port_number: u32 = match args.next() {
        Some(s) => s.parse().map_err(|_| "port-number must be an integer".to_string())?,
        None => {
            print_usage(&prog);
            return Err("missing <port-number>".to_string());
        }
    };
    let source_path = match args.next() {
        Some(s) => s,
        None => {
            print_usage(&prog);
            return Err("missing <source-path>".to_string());
        }
    };

    let device_path = format!("/dev/ttyS{port_number}");
    let file = File::open(&source_path).map_err(|e| format!("opening {source_path}: {e}"))?;
    let file_size = file.metadata().map_err(|e| e.to_string())?.len();
    let file_name = std::path::Path::new(&source_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path.clone());

    let port = PosixSerialPort::open(&device_path).map_err(|e| e.to_string())?;
    let mut link = LinkEndpoint::new(port, Role::Transmitter, LinkConfig::default());
    link.open().map_err(|e| e.to_string())?;

    let info = FileInfo { file_name, file_size };
    let mut progress_reader = ProgressReader {
        inner: BufReader::new(file),
        sent: 0,
        total: file_size,
    };
    packet::send_file(&mut link, &info, &mut progress_reader).map_err(|e| e.to_string())?;
    println!();
    Ok(())
}

struct ProgressReader<R> {
    inner: R,
    sent: u64,
    total: u64,
}

impl<R: std::io::Read> std::io::Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.sent += n as u64;
        draw_progress(self.sent, self.total);
        Ok(n)
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
