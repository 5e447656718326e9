//! End-to-end scenario tests, each one TX endpoint and one RX endpoint on
//! their own thread, talking over the fault-injecting loopback in
//! `tests/common`.

mod common;

use common::{wire_pair, wire_pair_with_faults, Action, FrameFault};
use serial_link::codec::Control;
use serial_link::config::LinkConfig;
use serial_link::link::{LinkEndpoint, Role};
use std::time::Duration;

fn fast_config() -> LinkConfig {
    LinkConfig {
        timeout: Duration::from_millis(60),
        max_retries: 5,
        poll_interval: Duration::from_millis(2),
    }
}

#[test]
fn minimal_handshake_both_sides_reach_data_state() {
    let (tx_port, rx_port) = wire_pair();
    let mut tx = LinkEndpoint::new(tx_port, Role::Transmitter, fast_config());
    let mut rx = LinkEndpoint::new(rx_port, Role::Receiver, fast_config());

    let rx_thread = std::thread::spawn(move || {
        rx.open().unwrap();
        rx
    });
    tx.open().unwrap();
    rx_thread.join().unwrap();
}

#[test]
fn one_byte_payload_is_delivered_and_acked() {
    let (tx_port, rx_port) = wire_pair();
    let mut tx = LinkEndpoint::new(tx_port, Role::Transmitter, fast_config());
    let mut rx = LinkEndpoint::new(rx_port, Role::Receiver, fast_config());

    let rx_thread = std::thread::spawn(move || {
        rx.open().unwrap();
        let mut out = Vec::new();
        let n = rx.read(&mut out).unwrap();
        (n, out)
    });

    tx.open().unwrap();
    let n = tx.write(&[0x41]).unwrap();
    assert_eq!(n, 1);

    let (rx_n, rx_out) = rx_thread.join().unwrap();
    assert_eq!(rx_n, 1);
    assert_eq!(rx_out, vec![0x41]);
}

#[test]
fn stuffed_byte_value_round_trips_through_the_link() {
    let (tx_port, rx_port) = wire_pair();
    let mut tx = LinkEndpoint::new(tx_port, Role::Transmitter, fast_config());
    let mut rx = LinkEndpoint::new(rx_port, Role::Receiver, fast_config());

    let rx_thread = std::thread::spawn(move || {
        rx.open().unwrap();
        let mut out = Vec::new();
        rx.read(&mut out).unwrap();
        out
    });

    tx.open().unwrap();
    // This payload byte equals FLAG itself and must be escaped both as data
    // and as the BCC2 it folds to.
    tx.write(&[0x7E]).unwrap();

    let rx_out = rx_thread.join().unwrap();
    assert_eq!(rx_out, vec![0x7E]);
}

#[test]
fn corrupted_bcc2_is_rejected_then_succeeds_on_retry() {
    // Flip a byte inside the first I(0) frame so its BCC2 no longer matches.
    let (tx_port, rx_port) = wire_pair_with_faults(
        vec![FrameFault {
            control_byte: Control::Info(0).to_byte(),
            action: Action::CorruptByte(5, 0x40),
        }],
        Vec::new(),
    );
    let mut tx = LinkEndpoint::new(tx_port, Role::Transmitter, fast_config());
    let mut rx = LinkEndpoint::new(rx_port, Role::Receiver, fast_config());

    let rx_thread = std::thread::spawn(move || {
        rx.open().unwrap();
        let mut out = Vec::new();
        rx.read(&mut out).unwrap();
        out
    });

    tx.open().unwrap();
    let err = tx.write(&[0x41]).unwrap_err();
    assert!(matches!(err, serial_link::error::LinkError::Rejected));

    // Caller retries the same payload; this time nothing corrupts it.
    let n = tx.write(&[0x41]).unwrap();
    assert_eq!(n, 1);

    let rx_out = rx_thread.join().unwrap();
    assert_eq!(rx_out, vec![0x41]);
}

#[test]
fn lost_ack_causes_retransmit_without_reloading_the_receiver() {
    // Drop the first RR(1) so TX has to retransmit I(0).
    let (tx_port, rx_port) = wire_pair_with_faults(
        Vec::new(),
        vec![FrameFault {
            control_byte: Control::Rr(1).to_byte(),
            action: Action::Drop,
        }],
    );
    let mut tx = LinkEndpoint::new(tx_port, Role::Transmitter, fast_config());
    let mut rx = LinkEndpoint::new(rx_port, Role::Receiver, fast_config());

    let rx_thread = std::thread::spawn(move || {
        rx.open().unwrap();
        let mut first = Vec::new();
        rx.read(&mut first).unwrap();
        // This call absorbs TX's retransmitted duplicate I(0) internally
        // (resending RR(1) without redelivering) and then waits for the
        // real second frame.
        let mut second = Vec::new();
        rx.read(&mut second).unwrap();
        (first, second)
    });

    tx.open().unwrap();
    tx.write(b"aa").unwrap();
    tx.write(b"bb").unwrap();

    let (first, second) = rx_thread.join().unwrap();
    assert_eq!(first, b"aa");
    assert_eq!(second, b"bb");
}

#[test]
fn teardown_closes_both_endpoints() {
    let (tx_port, rx_port) = wire_pair();
    let mut tx = LinkEndpoint::new(tx_port, Role::Transmitter, fast_config());
    let mut rx = LinkEndpoint::new(rx_port, Role::Receiver, fast_config());

    let rx_thread = std::thread::spawn(move || {
        rx.open().unwrap();
        rx.close().unwrap();
    });

    tx.open().unwrap();
    tx.close().unwrap();
    rx_thread.join().unwrap();
}
