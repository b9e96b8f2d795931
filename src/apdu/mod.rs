//! APDU (Application Protocol Data Unit) handling
//!
//! Structs and functions for working with ISO 7816-4 command APDUs as they
//! arrive from a reader driver or go out to a card backend. Only the short
//! encoding (1-byte Lc/Le) is supported; that is all the paired drivers emit.
//!
//! # Example
//! ```ignore
//! use vpcd_bridge::apdu::{parse_apdu, Response};
//!
//! // Parse an incoming APDU
//! let raw = &[0x00, 0xA4, 0x04, 0x00, 0x07, 0xF0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01];
//! let apdu = parse_apdu(raw).unwrap();
//! println!("INS: 0x{:02X}", apdu.ins);
//!
//! // Create a success response
//! let response = Response::success(vec![0x01, 0x02, 0x03]);
//! assert!(response.is_okay());
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur during APDU parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApduError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("declared data length {lc} exceeds remaining {available} bytes")]
    DataOverrun { lc: usize, available: usize },

    #[error("invalid APDU length")]
    InvalidLength,
}

/// A parsed command APDU
///
/// Contains all the fields from an incoming command. Immutable once parsed.
///
/// # Fields
/// - `cla`: Class byte (0x00 interindustry, 0x80 proprietary)
/// - `ins`: Instruction byte (the command to execute)
/// - `p1`, `p2`: Parameter bytes (command-specific)
/// - `data`: Command data (may be empty)
/// - `le`: Expected response length (None if not specified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u16>,
}

impl Apdu {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Get P1-P2 combined as a u16
    pub fn p1p2(&self) -> u16 {
        ((self.p1 as u16) << 8) | (self.p2 as u16)
    }
}

/// Parse raw bytes into an [`Apdu`]
///
/// Accepts the four short-format cases:
/// - Case 1: CLA INS P1 P2
/// - Case 2: CLA INS P1 P2 Le
/// - Case 3: CLA INS P1 P2 Lc Data
/// - Case 4: CLA INS P1 P2 Lc Data Le
///
/// # Example
/// ```ignore
/// let raw = &[0x80, 0x20, 0x00, 0x00, 0x04, 0x31, 0x32, 0x33, 0x34];
/// let apdu = parse_apdu(raw).unwrap();
/// assert_eq!(apdu.ins, 0x20);
/// assert_eq!(apdu.data, b"1234");
/// ```
pub fn parse_apdu(data: &[u8]) -> Result<Apdu, ApduError> {
    if data.len() < 4 {
        return Err(ApduError::TooShort(data.len()));
    }

    let cla = data[0];
    let ins = data[1];
    let p1 = data[2];
    let p2 = data[3];

    // Case 1: CLA INS P1 P2 (no data, no Le)
    if data.len() == 4 {
        return Ok(Apdu::new(cla, ins, p1, p2));
    }

    let remaining = &data[4..];
    let first_byte = remaining[0];

    // Case 2: only Le (1 byte) - Le=0 means 256
    if remaining.len() == 1 {
        let le = if first_byte == 0 { 256 } else { first_byte as u16 };
        return Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: Some(le),
        });
    }

    // first_byte is Lc
    let lc = first_byte as usize;

    if remaining.len() < 1 + lc {
        return Err(ApduError::DataOverrun {
            lc,
            available: remaining.len() - 1,
        });
    }

    // Case 3: Lc + Data (no Le)
    if remaining.len() == 1 + lc {
        return Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            data: remaining[1..1 + lc].to_vec(),
            le: None,
        });
    }

    // Case 4: Lc + Data + Le
    if remaining.len() == 1 + lc + 1 {
        let le_byte = remaining[1 + lc];
        let le = if le_byte == 0 { 256 } else { le_byte as u16 };
        return Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            data: remaining[1..1 + lc].to_vec(),
            le: Some(le),
        });
    }

    Err(ApduError::InvalidLength)
}

/// Interindustry instruction bytes handled by the engine itself
pub mod ins {
    pub const SELECT: u8 = 0xA4;
    pub const GET_RESPONSE: u8 = 0xC0;
}

/// Class byte of the proprietary command set the reference applets use
pub const CLA_PROPRIETARY: u8 = 0x80;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case1_no_data_no_le() {
        let apdu = parse_apdu(&[0x00, 0xA4, 0x04, 0x00]).unwrap();
        assert_eq!(apdu.cla, 0x00);
        assert_eq!(apdu.ins, 0xA4);
        assert_eq!(apdu.p1, 0x04);
        assert_eq!(apdu.p2, 0x00);
        assert!(apdu.data.is_empty());
        assert!(apdu.le.is_none());
    }

    #[test]
    fn test_case2_le_only() {
        let apdu = parse_apdu(&[0x80, 0x10, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(apdu.ins, 0x10);
        assert!(apdu.data.is_empty());
        assert_eq!(apdu.le, Some(256)); // 0x00 means 256
    }

    #[test]
    fn test_case3_lc_data() {
        let apdu = parse_apdu(&[0x80, 0x20, 0x00, 0x00, 0x04, 0x31, 0x32, 0x33, 0x34]).unwrap();
        assert_eq!(apdu.ins, 0x20);
        assert_eq!(apdu.data, vec![0x31, 0x32, 0x33, 0x34]);
        assert!(apdu.le.is_none());
    }

    #[test]
    fn test_case4_lc_data_le() {
        let apdu = parse_apdu(&[
            0x00, 0xA4, 0x04, 0x00, 0x07, 0xF0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
        ])
        .unwrap();
        assert_eq!(apdu.ins, 0xA4);
        assert_eq!(apdu.data, vec![0xF0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]);
        assert_eq!(apdu.le, Some(256));
    }

    #[test]
    fn test_p1p2_helper() {
        let apdu = parse_apdu(&[0x80, 0x15, 0x01, 0x02]).unwrap();
        assert_eq!(apdu.p1p2(), 0x0102);
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            parse_apdu(&[0x00, 0xA4, 0x04]),
            Err(ApduError::TooShort(3))
        ));
    }

    #[test]
    fn test_data_overrun() {
        // Lc declares 5 bytes but only 2 follow
        assert!(matches!(
            parse_apdu(&[0x80, 0x03, 0x00, 0x00, 0x05, 0x48, 0x65]),
            Err(ApduError::DataOverrun { lc: 5, available: 2 })
        ));
    }
}
