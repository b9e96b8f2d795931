//! Virtual-reader protocol adapter
//!
//! Translates between the reader-side control protocol and an
//! [`ApduTransport`]. The wire conventions differ between reader driver
//! generations, so they are data ([`ReaderProtocol`]) rather than code: the
//! adapter logic is written once and parameterized by the variant.
//!
//! Each reader connection runs one [`ReaderSession`]: a small state machine
//! whose only state is whether the card is powered. Sessions never own the
//! card; they share it through the transport.

pub mod server;

use std::io::{Read, Write};

use log::{debug, info, warn};

use crate::apdu::SW;
use crate::backend::ApduTransport;
use crate::codec::{self, MAX_FRAME_LEN};

/// How reader frames carry control codes and APDUs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Every payload starts with a control code byte; APDUs follow a
    /// dedicated prefix code.
    LengthPrefixed,
    /// A length-1 frame is a bare control byte; any longer frame is a raw
    /// APDU.
    ControlByte,
}

/// What a successful RESET answers with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReply {
    /// The card's ATR (empty frame when the reset failed)
    Atr,
    /// A status byte, `0x00` ok / `0x01` error
    StatusByte,
}

/// Wire conventions of one reader driver generation
#[derive(Clone, Debug)]
pub struct ReaderProtocol {
    pub framing: Framing,
    pub reset_reply: ResetReply,
    pub power_off: u8,
    /// Explicit power-on code; `None` where RESET is the only way up
    pub power_on: Option<u8>,
    pub reset: u8,
    pub get_atr: u8,
    /// Code introducing an APDU payload (length-prefixed framing only)
    pub apdu_prefix: Option<u8>,
    pub card_present: Option<u8>,
}

impl ReaderProtocol {
    /// The documented convention: every payload is `[code][body]`
    pub fn prefixed() -> Self {
        Self {
            framing: Framing::LengthPrefixed,
            reset_reply: ResetReply::Atr,
            power_off: 0x00,
            power_on: None,
            reset: 0x01,
            get_atr: 0x02,
            apdu_prefix: Some(0x03),
            card_present: Some(0x04),
        }
    }

    /// The older convention: bare control bytes, raw APDU frames
    pub fn legacy() -> Self {
        Self {
            framing: Framing::ControlByte,
            reset_reply: ResetReply::StatusByte,
            power_off: 0x00,
            power_on: Some(0x01),
            reset: 0x02,
            get_atr: 0x04,
            apdu_prefix: None,
            card_present: None,
        }
    }
}

impl Default for ReaderProtocol {
    fn default() -> Self {
        Self::prefixed()
    }
}

/// What one reader frame asks for
#[derive(Debug, PartialEq, Eq)]
enum Request {
    PowerOff,
    PowerOn,
    Reset,
    GetAtr,
    CardPresent,
    Apdu(Vec<u8>),
    Unknown(u8),
}

const REPLY_OK: &[u8] = &[0x00];
const REPLY_ERROR: &[u8] = &[0x01];

/// One reader connection's view of the shared card
pub struct ReaderSession<'a> {
    protocol: ReaderProtocol,
    transport: &'a dyn ApduTransport,
    powered: bool,
}

impl<'a> ReaderSession<'a> {
    pub fn new(protocol: ReaderProtocol, transport: &'a dyn ApduTransport) -> Self {
        Self {
            protocol,
            transport,
            powered: false,
        }
    }

    /// Whether the session considers the card powered
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    fn decode(&self, frame: &[u8]) -> Request {
        debug_assert!(!frame.is_empty());
        match self.protocol.framing {
            Framing::LengthPrefixed => {
                let code = frame[0];
                if Some(code) == self.protocol.apdu_prefix {
                    return Request::Apdu(frame[1..].to_vec());
                }
                if frame.len() != 1 {
                    return Request::Unknown(code);
                }
                self.decode_control(code)
            }
            Framing::ControlByte => {
                if frame.len() > 1 {
                    return Request::Apdu(frame.to_vec());
                }
                self.decode_control(frame[0])
            }
        }
    }

    fn decode_control(&self, code: u8) -> Request {
        if code == self.protocol.power_off {
            Request::PowerOff
        } else if Some(code) == self.protocol.power_on {
            Request::PowerOn
        } else if code == self.protocol.reset {
            Request::Reset
        } else if code == self.protocol.get_atr {
            Request::GetAtr
        } else if Some(code) == self.protocol.card_present {
            Request::CardPresent
        } else {
            Request::Unknown(code)
        }
    }

    /// Map one non-empty reader frame to its reply payload
    ///
    /// Never closes the session by itself: every frame, including malformed
    /// APDUs and unknown control codes, gets a reply.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<u8> {
        match self.decode(frame) {
            Request::PowerOff => {
                debug!("reader: power off");
                self.powered = false;
                self.transport.power_down();
                REPLY_OK.to_vec()
            }
            Request::PowerOn => {
                debug!("reader: power on");
                if self.powered {
                    return REPLY_OK.to_vec();
                }
                match self.transport.power_up() {
                    Ok(()) => {
                        self.powered = true;
                        REPLY_OK.to_vec()
                    }
                    Err(e) => {
                        warn!("power up failed: {e}");
                        REPLY_ERROR.to_vec()
                    }
                }
            }
            Request::Reset => {
                debug!("reader: reset");
                match self.transport.reset() {
                    Ok(()) => {
                        self.powered = true;
                        match self.protocol.reset_reply {
                            ResetReply::Atr => self.transport.atr(),
                            ResetReply::StatusByte => REPLY_OK.to_vec(),
                        }
                    }
                    Err(e) => {
                        warn!("reset failed: {e}");
                        self.powered = false;
                        match self.protocol.reset_reply {
                            ResetReply::Atr => Vec::new(),
                            ResetReply::StatusByte => REPLY_ERROR.to_vec(),
                        }
                    }
                }
            }
            Request::GetAtr => {
                if self.powered {
                    self.transport.atr()
                } else {
                    // No card to answer: empty frame
                    Vec::new()
                }
            }
            Request::CardPresent => REPLY_OK.to_vec(),
            Request::Apdu(command) => self.handle_apdu(&command),
            Request::Unknown(code) => {
                warn!("unknown reader control code 0x{code:02X}");
                REPLY_ERROR.to_vec()
            }
        }
    }

    fn handle_apdu(&mut self, command: &[u8]) -> Vec<u8> {
        if !self.powered {
            return SW::COMMAND_NOT_ALLOWED.to_be_bytes().to_vec();
        }
        debug!("reader -> card: {} bytes", command.len());
        match self.transport.exchange(command) {
            Ok(response) if response.len() >= 2 => {
                debug!("card -> reader: {} bytes", response.len());
                response
            }
            Ok(response) => {
                warn!("card produced a {}-byte response", response.len());
                SW::UNKNOWN_ERROR.to_be_bytes().to_vec()
            }
            Err(e) => {
                warn!("exchange failed: {e}");
                e.status_word().to_be_bytes().to_vec()
            }
        }
    }

    /// Serve one reader connection until it hangs up
    ///
    /// Clean EOF and framing/socket errors both end the loop; only the
    /// latter are logged. Zero-length frames are skipped.
    pub fn run<S: Read + Write>(&mut self, stream: &mut S) {
        loop {
            let frame = match codec::read_frame(stream, MAX_FRAME_LEN) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("reader disconnected");
                    break;
                }
                Err(e) => {
                    warn!("reader link error: {e}");
                    break;
                }
            };
            if frame.is_empty() {
                continue;
            }
            let reply = self.handle_frame(&frame);
            if let Err(e) = codec::write_frame(stream, &reply) {
                warn!("reader link error: {e}");
                break;
            }
        }
        // The reader is gone; leave the card unpowered for hygiene
        if self.powered {
            self.transport.power_down();
            self.powered = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EmulatedCard;
    use hex_literal::hex;

    #[test]
    fn test_prefixed_power_cycle() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);

        assert!(!session.is_powered());
        let atr = session.handle_frame(&[0x01]);
        assert_eq!(atr, card.atr());
        assert!(session.is_powered());

        assert_eq!(session.handle_frame(&[0x00]), [0x00]);
        assert!(!session.is_powered());
    }

    #[test]
    fn test_prefixed_atr_requires_power() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);

        assert!(session.handle_frame(&[0x02]).is_empty());
        session.handle_frame(&[0x01]);
        assert_eq!(session.handle_frame(&[0x02]), card.atr());
    }

    #[test]
    fn test_prefixed_apdu_unpowered() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);

        let mut frame = vec![0x03];
        frame.extend_from_slice(&hex!("00 A4 0400 07 F0000000010001"));
        assert_eq!(session.handle_frame(&frame), hex!("6900"));
    }

    #[test]
    fn test_prefixed_apdu_round_trip() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);
        session.handle_frame(&[0x01]);

        let mut frame = vec![0x03];
        frame.extend_from_slice(&hex!("00 A4 0400 07 F0000000010001"));
        let reply = session.handle_frame(&frame);
        assert_eq!(&reply[reply.len() - 2..], hex!("9000"));

        let reply = session.handle_frame(&hex!("03 80 00 0000"));
        assert_eq!(&reply[..reply.len() - 2], b"Hello World!");
    }

    #[test]
    fn test_prefixed_card_present() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);
        assert_eq!(session.handle_frame(&[0x04]), [0x00]);
        assert!(!session.is_powered());
    }

    #[test]
    fn test_prefixed_unknown_code() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);
        assert_eq!(session.handle_frame(&[0x7F]), [0x01]);
        // Session still serves afterwards
        assert_eq!(session.handle_frame(&[0x01]), card.atr());
    }

    #[test]
    fn test_legacy_power_on_and_raw_apdu() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::legacy(), &card);

        assert_eq!(session.handle_frame(&[0x01]), [0x00]);
        assert!(session.is_powered());
        // Power on again is a no-op success
        assert_eq!(session.handle_frame(&[0x01]), [0x00]);

        let reply = session.handle_frame(&hex!("00 A4 0400 07 F0000000010001"));
        assert_eq!(&reply[reply.len() - 2..], hex!("9000"));
    }

    #[test]
    fn test_legacy_reset_replies_status_byte() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::legacy(), &card);
        assert_eq!(session.handle_frame(&[0x02]), [0x00]);
        assert!(session.is_powered());
    }

    #[test]
    fn test_legacy_atr_code() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::legacy(), &card);
        session.handle_frame(&[0x01]);
        assert_eq!(session.handle_frame(&[0x04]), card.atr());
    }

    #[test]
    fn test_reset_clears_card_selection() {
        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);
        session.handle_frame(&[0x01]);

        let mut frame = vec![0x03];
        frame.extend_from_slice(&hex!("00 A4 0400 07 F0000000010001"));
        session.handle_frame(&frame);

        session.handle_frame(&[0x01]); // reset
        let reply = session.handle_frame(&hex!("03 80 00 0000"));
        assert_eq!(reply, hex!("6D00")); // no applet selected any more
    }

    #[test]
    fn test_session_loop_over_buffered_stream() {
        use std::io::Cursor;

        struct Duplex {
            input: Cursor<Vec<u8>>,
            output: Vec<u8>,
        }
        impl Read for Duplex {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.input.read(buf)
            }
        }
        impl Write for Duplex {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.output.write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        // reset, card-present, then EOF
        let mut input = Vec::new();
        input.extend_from_slice(&codec::encode_command(&[0x01]).unwrap());
        input.extend_from_slice(&codec::encode_command(&[0x04]).unwrap());
        let mut stream = Duplex {
            input: Cursor::new(input),
            output: Vec::new(),
        };

        let card = EmulatedCard::new();
        let mut session = ReaderSession::new(ReaderProtocol::prefixed(), &card);
        session.run(&mut stream);

        let mut expected = Vec::new();
        expected.extend_from_slice(&codec::encode_command(&card.atr()).unwrap());
        expected.extend_from_slice(&codec::encode_command(&[0x00]).unwrap());
        assert_eq!(stream.output, expected);
        assert!(!session.is_powered());
    }
}
