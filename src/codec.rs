//! Length-prefixed framing for the card-command wire protocol
//!
//! Both sides of the bridge speak the same framing: every message is a 2-byte
//! big-endian length followed by exactly that many payload bytes. Outbound to
//! the backend the payload is a raw command APDU; inbound it is the response
//! bytes (data plus the 2-byte status word). The reader-driver control channel
//! reuses the identical framing with its own payload layout.
//!
//! The length prefix caps frames at 65535 bytes by construction; on top of
//! that a per-call bound rejects frames a corrupted peer declares larger than
//! anything this protocol legitimately carries, before any allocation happens.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Default upper bound on a single frame's payload.
///
/// Short APDUs top out at 261 bytes and responses at 258; 8 KiB leaves
/// generous headroom without letting a bad peer demand large buffers.
pub const MAX_FRAME_LEN: usize = 8 * 1024;

/// Errors produced while reading or writing frames
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream closed in the middle of a length prefix or payload.
    #[error("stream closed mid-frame")]
    TruncatedStream,

    /// The peer declared a frame larger than the configured bound.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    OversizedFrame { len: usize, max: usize },

    #[error("frame I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Encode one command payload into its wire form
///
/// Prefixes the payload with its length as a 2-byte big-endian integer.
/// Payloads longer than `u16::MAX` cannot be framed.
pub fn encode_command(payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    if payload.len() > u16::MAX as usize {
        return Err(CodecError::OversizedFrame {
            len: payload.len(),
            max: u16::MAX as usize,
        });
    }
    let mut frame = Vec::with_capacity(2 + payload.len());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Write one frame to the stream
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), CodecError> {
    let frame = encode_command(payload)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame from the stream
///
/// Returns `Ok(None)` on a clean end-of-stream (connection closed between
/// frames); this is the loop-exit condition for connection handlers. An EOF
/// inside the length prefix or payload is a [`CodecError::TruncatedStream`];
/// a declared length above `max_len` is rejected before allocating.
pub fn read_frame<R: Read>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, CodecError> {
    let mut len_buf = [0u8; 2];

    // First byte decides between clean close and truncation
    match reader.read(&mut len_buf[..1]) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(CodecError::Io(e)),
    }
    read_exact_or_truncated(reader, &mut len_buf[1..])?;

    let len = u16::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(CodecError::OversizedFrame { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    read_exact_or_truncated(reader, &mut payload)?;
    Ok(Some(payload))
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), CodecError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CodecError::TruncatedStream),
        Err(e) => Err(CodecError::Io(e)),
    }
}
