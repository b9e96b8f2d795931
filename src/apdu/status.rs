//! Status Word (SW) constants for APDU responses
//!
//! ISO 7816-4 status words indicating command execution results, plus a
//! read-only description table used in log output. The table carries no
//! behavior; the two bytes on the wire are the whole contract.

/// Status Word constants
#[allow(dead_code)]
pub struct SW;

#[allow(dead_code)]
impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;

    pub const COMMAND_NOT_ALLOWED: u16 = 0x6900;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;
    pub const CONDITIONS_NOT_SATISFIED: u16 = 0x6985;

    pub const WRONG_DATA: u16 = 0x6A80;
    pub const FUNCTION_NOT_SUPPORTED: u16 = 0x6A81;
    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    pub const INCORRECT_P1_P2: u16 = 0x6A86;

    pub const WRONG_P1_P2: u16 = 0x6B00;

    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
    pub const UNKNOWN_ERROR: u16 = 0x6F00;

    /// Create a "more data available" status word (61xx)
    /// The low byte indicates how many more bytes are available
    #[inline]
    pub fn bytes_remaining(remaining: u8) -> u16 {
        0x6100 | (remaining as u16)
    }

    /// Create a warning with counter (63Cx)
    /// Used to indicate PIN retry count remaining
    #[inline]
    pub fn counter_warning(retries: u8) -> u16 {
        0x63C0 | ((retries & 0x0F) as u16)
    }

    /// Create a "wrong Le" status word (6Cxx)
    /// The low byte indicates the correct Le value
    #[inline]
    pub fn wrong_le(correct_le: u8) -> u16 {
        0x6C00 | (correct_le as u16)
    }

    /// Check if a status word indicates success (9000 or 61xx)
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS || (sw & 0xFF00) == 0x6100
    }

    /// Check if a status word is a counter warning (63Cx)
    #[inline]
    pub fn is_counter_warning(sw: u16) -> bool {
        (sw & 0xFFF0) == 0x63C0
    }

    /// Extract retry count from counter warning (63Cx)
    #[inline]
    pub fn get_retry_count(sw: u16) -> Option<u8> {
        if Self::is_counter_warning(sw) {
            Some((sw & 0x0F) as u8)
        } else {
            None
        }
    }

    /// Human-readable meaning of a status word, for diagnostics only
    pub fn describe(sw: u16) -> &'static str {
        if Self::is_counter_warning(sw) {
            return "verification failed, counter in low nibble";
        }
        if (sw & 0xFF00) == 0x6100 {
            return "more data available";
        }
        if (sw & 0xFF00) == 0x6C00 {
            return "wrong Le, correct length in low byte";
        }
        match sw {
            Self::SUCCESS => "success",
            Self::WRONG_LENGTH => "wrong length",
            Self::COMMAND_NOT_ALLOWED => "command not allowed",
            Self::SECURITY_STATUS_NOT_SATISFIED => "security status not satisfied",
            Self::AUTH_METHOD_BLOCKED => "authentication method blocked",
            Self::CONDITIONS_NOT_SATISFIED => "conditions of use not satisfied",
            Self::WRONG_DATA => "incorrect data field",
            Self::FUNCTION_NOT_SUPPORTED => "function not supported",
            Self::FILE_NOT_FOUND => "file or application not found",
            Self::INCORRECT_P1_P2 => "incorrect P1/P2",
            Self::WRONG_P1_P2 => "wrong P1/P2",
            Self::INS_NOT_SUPPORTED => "instruction not supported",
            Self::CLA_NOT_SUPPORTED => "class not supported",
            Self::UNKNOWN_ERROR => "unknown error",
            _ => "unrecognized status word",
        }
    }
}
