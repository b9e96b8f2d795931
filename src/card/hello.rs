//! Identity/Echo/PIN/Store reference applet
//!
//! The first of the two applets the embedded engine emulates. It answers a
//! fixed greeting, echoes input, and keeps a small data slot that is writable
//! only after PIN verification. State lives for the process lifetime; nothing
//! is persisted.

use log::debug;

use crate::apdu::{Apdu, Response, SW};

/// AID of the identity applet
pub const AID: &[u8] = &[0xF0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01];

/// Fixed greeting returned by HELLO
const HELLO_MSG: &[u8] = b"Hello World!";

/// Reference PIN installed at engine start
const DEFAULT_PIN: &[u8] = &[0x31, 0x32, 0x33, 0x34]; // "1234"

const PIN_TRY_LIMIT: u8 = 3;
const PIN_MIN_LENGTH: usize = 4;
const PIN_MAX_LENGTH: usize = 8;

/// Maximum size of the stored data slot
const DATA_STORE_LIMIT: usize = 256;

/// Instructions understood by the identity applet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instruction {
    Hello,
    Echo,
    GetData,
    PutData,
    VerifyPin,
    ChangePin,
    GetStatus,
}

impl Instruction {
    fn from_ins(ins: u8) -> Option<Self> {
        match ins {
            0x00 => Some(Self::Hello),
            0x01 => Some(Self::Echo),
            0x02 => Some(Self::GetData),
            0x03 => Some(Self::PutData),
            0x20 => Some(Self::VerifyPin),
            0x24 => Some(Self::ChangePin),
            0xF0 => Some(Self::GetStatus),
            _ => None,
        }
    }
}

/// Mutable state of the identity applet
///
/// Defaults: PIN "1234", 3 tries, nothing stored, usage counter 0.
pub struct HelloApplet {
    pin: Vec<u8>,
    pin_validated: bool,
    pin_tries: u8,
    stored: Vec<u8>,
    usage_count: u16,
}

impl Default for HelloApplet {
    fn default() -> Self {
        Self::new()
    }
}

impl HelloApplet {
    pub fn new() -> Self {
        Self {
            pin: DEFAULT_PIN.to_vec(),
            pin_validated: false,
            pin_tries: PIN_TRY_LIMIT,
            stored: Vec::new(),
            usage_count: 0,
        }
    }

    /// Handle one proprietary-class command
    ///
    /// Every dispatched instruction bumps the usage counter, whatever its
    /// outcome; that matches the reference applet's behavior.
    pub fn handle(&mut self, apdu: &Apdu) -> Response {
        self.usage_count = self.usage_count.wrapping_add(1);

        let instruction = match Instruction::from_ins(apdu.ins) {
            Some(i) => i,
            None => {
                debug!("identity applet: unknown INS 0x{:02X}", apdu.ins);
                return Response::error(SW::INS_NOT_SUPPORTED);
            }
        };

        match instruction {
            Instruction::Hello => Response::success(HELLO_MSG.to_vec()),
            Instruction::Echo => Response::success(apdu.data.clone()),
            Instruction::GetData => self.get_data(),
            Instruction::PutData => self.put_data(&apdu.data),
            Instruction::VerifyPin => self.verify_pin(&apdu.data),
            Instruction::ChangePin => self.change_pin(apdu.p2 as usize, &apdu.data),
            Instruction::GetStatus => self.get_status(),
        }
    }

    fn get_data(&self) -> Response {
        if self.stored.is_empty() {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED);
        }
        Response::success(self.stored.clone())
    }

    fn put_data(&mut self, data: &[u8]) -> Response {
        if !self.pin_validated {
            return Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        }
        if data.is_empty() || data.len() > DATA_STORE_LIMIT {
            return Response::error(SW::WRONG_LENGTH);
        }
        self.stored = data.to_vec();
        Response::ok()
    }

    fn verify_pin(&mut self, candidate: &[u8]) -> Response {
        if self.pin_tries == 0 {
            return Response::error(SW::AUTH_METHOD_BLOCKED);
        }
        if candidate.len() < PIN_MIN_LENGTH || candidate.len() > PIN_MAX_LENGTH {
            return Response::error(SW::WRONG_LENGTH);
        }
        if candidate == self.pin.as_slice() {
            self.pin_validated = true;
            self.pin_tries = PIN_TRY_LIMIT;
            Response::ok()
        } else {
            self.pin_tries = self.pin_tries.saturating_sub(1);
            debug!("identity applet: PIN mismatch, {} tries left", self.pin_tries);
            Response::counter_warning(self.pin_tries)
        }
    }

    /// Change the reference PIN; data = old PIN followed by new PIN, P2 gives
    /// the old PIN's length. A successful change requires a fresh VERIFY.
    fn change_pin(&mut self, old_len: usize, data: &[u8]) -> Response {
        if self.pin_tries == 0 {
            return Response::error(SW::AUTH_METHOD_BLOCKED);
        }
        if old_len > data.len() {
            return Response::error(SW::WRONG_LENGTH);
        }
        let (old, new) = data.split_at(old_len);
        if old.len() < PIN_MIN_LENGTH
            || old.len() > PIN_MAX_LENGTH
            || new.len() < PIN_MIN_LENGTH
            || new.len() > PIN_MAX_LENGTH
        {
            return Response::error(SW::WRONG_LENGTH);
        }
        if old != self.pin.as_slice() {
            self.pin_tries = self.pin_tries.saturating_sub(1);
            return Response::counter_warning(self.pin_tries);
        }
        self.pin = new.to_vec();
        self.pin_tries = PIN_TRY_LIMIT;
        self.pin_validated = false;
        Response::ok()
    }

    /// Fixed-layout status block:
    /// version(2) | usage counter(2 BE) | PIN tries(1) | validated(1) | stored length(2 BE)
    fn get_status(&self) -> Response {
        let mut status = Vec::with_capacity(8);
        status.extend_from_slice(&[0x01, 0x00]); // version 1.0
        status.extend_from_slice(&self.usage_count.to_be_bytes());
        status.push(self.pin_tries);
        status.push(u8::from(self.pin_validated));
        status.extend_from_slice(&(self.stored.len() as u16).to_be_bytes());
        Response::success(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::CLA_PROPRIETARY;

    fn cmd(ins: u8, p2: u8, data: &[u8]) -> Apdu {
        Apdu::with_data(CLA_PROPRIETARY, ins, 0x00, p2, data.to_vec())
    }

    #[test]
    fn test_hello() {
        let mut applet = HelloApplet::new();
        let resp = applet.handle(&cmd(0x00, 0x00, &[]));
        assert_eq!(resp.data, b"Hello World!");
        assert_eq!(resp.sw(), SW::SUCCESS);
    }

    #[test]
    fn test_echo() {
        let mut applet = HelloApplet::new();
        let resp = applet.handle(&cmd(0x01, 0x00, &[0xDE, 0xAD]));
        assert_eq!(resp.data, vec![0xDE, 0xAD]);
        assert_eq!(resp.sw(), SW::SUCCESS);
    }

    #[test]
    fn test_get_data_before_put() {
        let mut applet = HelloApplet::new();
        let resp = applet.handle(&cmd(0x02, 0x00, &[]));
        assert_eq!(resp.sw(), SW::CONDITIONS_NOT_SATISFIED);
    }

    #[test]
    fn test_put_data_requires_pin() {
        let mut applet = HelloApplet::new();
        let resp = applet.handle(&cmd(0x03, 0x00, b"Hello"));
        assert_eq!(resp.sw(), SW::SECURITY_STATUS_NOT_SATISFIED);
    }

    #[test]
    fn test_put_then_get_after_verify() {
        let mut applet = HelloApplet::new();
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"1234")).sw(), SW::SUCCESS);
        assert_eq!(applet.handle(&cmd(0x03, 0x00, b"Hello")).sw(), SW::SUCCESS);
        let resp = applet.handle(&cmd(0x02, 0x00, &[]));
        assert_eq!(resp.data, b"Hello");
        assert_eq!(resp.sw(), SW::SUCCESS);
    }

    #[test]
    fn test_pin_countdown() {
        let mut applet = HelloApplet::new();
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"0000")).sw(), 0x63C2);
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"0000")).sw(), 0x63C1);
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"0000")).sw(), 0x63C0);
        // Fourth attempt hits the blocked state, even with the right PIN
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"1234")).sw(), SW::AUTH_METHOD_BLOCKED);
    }

    #[test]
    fn test_verify_resets_tries() {
        let mut applet = HelloApplet::new();
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"0000")).sw(), 0x63C2);
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"1234")).sw(), SW::SUCCESS);
        // Counter back at the limit after success
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"0000")).sw(), 0x63C2);
    }

    #[test]
    fn test_verify_wrong_length_does_not_decrement() {
        let mut applet = HelloApplet::new();
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"12")).sw(), SW::WRONG_LENGTH);
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"0000")).sw(), 0x63C2);
    }

    #[test]
    fn test_change_pin() {
        let mut applet = HelloApplet::new();
        // Old "1234", new "567890"
        let mut data = b"1234".to_vec();
        data.extend_from_slice(b"567890");
        assert_eq!(applet.handle(&cmd(0x24, 0x04, &data)).sw(), SW::SUCCESS);
        // Old PIN no longer verifies, new one does
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"1234")).sw(), 0x63C2);
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"567890")).sw(), SW::SUCCESS);
    }

    #[test]
    fn test_change_pin_wrong_old() {
        let mut applet = HelloApplet::new();
        let mut data = b"9999".to_vec();
        data.extend_from_slice(b"567890");
        assert_eq!(applet.handle(&cmd(0x24, 0x04, &data)).sw(), 0x63C2);
        // Reference PIN unchanged
        assert_eq!(applet.handle(&cmd(0x20, 0x00, b"1234")).sw(), SW::SUCCESS);
    }

    #[test]
    fn test_get_status_layout() {
        let mut applet = HelloApplet::new();
        applet.handle(&cmd(0x20, 0x00, b"1234"));
        applet.handle(&cmd(0x03, 0x00, b"Hello"));
        let resp = applet.handle(&cmd(0xF0, 0x00, &[]));
        assert_eq!(resp.sw(), SW::SUCCESS);
        assert_eq!(resp.data.len(), 8);
        assert_eq!(&resp.data[0..2], &[0x01, 0x00]); // version
        assert_eq!(u16::from_be_bytes([resp.data[2], resp.data[3]]), 3); // usage incl. this one
        assert_eq!(resp.data[4], 3); // tries
        assert_eq!(resp.data[5], 1); // validated
        assert_eq!(u16::from_be_bytes([resp.data[6], resp.data[7]]), 5); // stored length
    }

    #[test]
    fn test_usage_counts_failures_too() {
        let mut applet = HelloApplet::new();
        applet.handle(&cmd(0x42, 0x00, &[])); // unknown INS
        applet.handle(&cmd(0x02, 0x00, &[])); // conditions not satisfied
        let resp = applet.handle(&cmd(0xF0, 0x00, &[]));
        assert_eq!(u16::from_be_bytes([resp.data[2], resp.data[3]]), 3);
    }

    #[test]
    fn test_put_data_too_long() {
        let mut applet = HelloApplet::new();
        applet.handle(&cmd(0x20, 0x00, b"1234"));
        let resp = applet.handle(&cmd(0x03, 0x00, &[0xAA; 257]));
        assert_eq!(resp.sw(), SW::WRONG_LENGTH);
    }
}
