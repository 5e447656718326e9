//! Fault-injecting loopback fixture shared by the scenario tests.
//!
//! Two [`Port`] endpoints share a pair of byte queues, one per direction.
//! Faults are matched by the control byte of the frame about to be sent
//! (not by call order), so a handshake that needs an extra SET retry before
//! the peer starts listening doesn't throw off which frame gets hit.

use serial_link::error::SerialError;
use serial_link::serial::SerialPort;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum Action {
    Drop,
    CorruptByte(usize, u8),
}

/// Applies `action` the first time a frame with control byte `control_byte`
/// is sent; every other frame (including later retransmissions of the same
/// kind) passes through untouched.
#[derive(Debug, Clone)]
pub struct FrameFault {
    pub control_byte: u8,
    pub action: Action,
}

pub struct Port {
    rx_queue: Arc<Mutex<VecDeque<u8>>>,
    tx_queue: Arc<Mutex<VecDeque<u8>>>,
    faults: Arc<Mutex<Vec<FrameFault>>>,
}

impl SerialPort for Port {
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError> {
        Ok(self.rx_queue.lock().unwrap().pop_front())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), SerialError> {
        let control_byte = buf.get(2).copied();
        let action = {
            let mut faults = self.faults.lock().unwrap();
            control_byte.and_then(|c| {
                faults
                    .iter()
                    .position(|f| f.control_byte == c)
                    .map(|i| faults.remove(i).action)
            })
        };
        match action {
            None => self.tx_queue.lock().unwrap().extend(buf.iter().copied()),
            Some(Action::Drop) => {}
            Some(Action::CorruptByte(pos, new_byte)) => {
                let mut v = buf.to_vec();
                if let Some(b) = v.get_mut(pos) {
                    *b = new_byte;
                }
                self.tx_queue.lock().unwrap().extend(v);
            }
        }
        Ok(())
    }
}

/// Two ports wired directly to each other, no faults.
pub fn wire_pair() -> (Port, Port) {
    wire_pair_with_faults(Vec::new(), Vec::new())
}

/// `a_faults`/`b_faults` apply to what the respective port *sends*.
pub fn wire_pair_with_faults(a_faults: Vec<FrameFault>, b_faults: Vec<FrameFault>) -> (Port, Port) {
    let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
    let b_to_a = Arc::new(Mutex::new(VecDeque::new()));

    let a = Port {
        rx_queue: b_to_a.clone(),
        tx_queue: a_to_b.clone(),
        faults: Arc::new(Mutex::new(a_faults)),
    };
    let b = Port {
        rx_queue: a_to_b,
        tx_queue: b_to_a,
        faults: Arc::new(Mutex::new(b_faults)),
    };
    (a, b)
}
