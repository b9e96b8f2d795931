//! ATR (Answer To Reset) handling
//!
//! ATRs returned by the bridge on power-up/reset. The bytes only need to be
//! stable and acceptable to the paired reader driver; they carry no behavior.

/// Minimal T=1 ATR the bridge answers with when fronting a remote backend
///
/// TS = 0x3B (direct convention), T0 = 0x80 (TD1 present, no historical
/// bytes), TD1 = 0x01 (T=1).
pub const DEFAULT_ATR: &[u8] = &[0x3B, 0x80, 0x01];

/// Build an ATR with specific historical bytes
///
/// Produces a direct-convention T=1 ATR carrying up to 15 historical bytes
/// and the TCK check byte T=1 requires.
pub fn build_atr(historical_bytes: &[u8]) -> Vec<u8> {
    let mut atr = Vec::with_capacity(32);

    // TS - initial character (direct convention)
    atr.push(0x3B);

    // T0 - TD1 present, low nibble = number of historical bytes (max 15)
    let hist_len = historical_bytes.len().min(15) as u8;
    atr.push(0x80 | hist_len);

    // TD1 - T=1 protocol, no further interface bytes
    atr.push(0x01);

    atr.extend_from_slice(&historical_bytes[..hist_len as usize]);

    // TCK - XOR of all bytes from T0 to the last historical byte
    let tck: u8 = atr[1..].iter().fold(0u8, |acc, &b| acc ^ b);
    atr.push(tck);

    atr
}

/// ATR of the embedded emulated card
pub fn embedded_card_atr() -> Vec<u8> {
    build_atr(b"vbridge")
}
