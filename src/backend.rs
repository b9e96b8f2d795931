//! Card transports: the remote backend client and the embedded engine
//!
//! The reader-side adapter only ever talks to a card through the
//! [`ApduTransport`] trait. Two implementations exist: [`BackendClient`],
//! which forwards commands to a downstream card-emulation service over TCP,
//! and [`EmulatedCard`], which answers from the in-process [`CardEngine`].
//! Both serialize exchanges internally, so a single instance can be shared
//! across any number of concurrent reader sessions.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::apdu::SW;
use crate::card::{atr, CardEngine};
use crate::codec::{self, CodecError, MAX_FRAME_LEN};

/// Errors surfaced by a card transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("backend unavailable: {0}")]
    Connect(#[source] io::Error),

    #[error("backend address {0:?} did not resolve")]
    AddressResolution(String),

    #[error("exchange failed: {0}")]
    Exchange(#[from] CodecError),

    /// The card produced a response shorter than a status word. Such a
    /// response must never reach a reader driver.
    #[error("card produced a {0}-byte response, need at least 2")]
    ShortResponse(usize),
}

impl TransportError {
    /// The status word a reader driver sees when this error occurred during
    /// an APDU exchange.
    pub fn status_word(&self) -> u16 {
        SW::UNKNOWN_ERROR
    }
}

/// One card behind the bridge, whatever its implementation
///
/// An exchange maps a command APDU to response bytes ending in a status
/// word. Implementations must serialize exchanges internally: at most one
/// may be in flight at a time, and concurrent callers block.
pub trait ApduTransport: Send + Sync {
    /// Send one command APDU and return the raw response bytes.
    fn exchange(&self, command: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Bring the card session up; lazily establishes any connection needed.
    fn power_up(&self) -> Result<(), TransportError>;

    /// Tear the card session down. Idempotent.
    fn power_down(&self);

    /// Drop the current session and start a fresh one (reader RESET).
    fn reset(&self) -> Result<(), TransportError>;

    /// ATR identifying the card behind this transport.
    fn atr(&self) -> Vec<u8>;
}

/// Client for a downstream card-emulation service
///
/// Holds at most one TCP connection, created lazily on first use. Any I/O
/// failure tears the connection down; the next call reconnects. The failed
/// exchange itself is never retried here, the caller decides that.
pub struct BackendClient {
    addr: String,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl BackendClient {
    /// Create a client for `addr` (host:port). No connection is made yet.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            stream: Mutex::new(None),
        }
    }

    fn open_stream(&self) -> Result<TcpStream, TransportError> {
        let resolved: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(TransportError::Connect)?
            .collect();
        let target = resolved
            .first()
            .ok_or_else(|| TransportError::AddressResolution(self.addr.clone()))?;

        let stream =
            TcpStream::connect_timeout(target, self.timeout).map_err(TransportError::Connect)?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(TransportError::Connect)?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(TransportError::Connect)?;
        info!("connected to backend at {}", self.addr);
        Ok(stream)
    }

    /// Close the backend connection if one is open. Idempotent.
    pub fn disconnect(&self) {
        let mut slot = self.stream.lock();
        if slot.take().is_some() {
            debug!("backend connection closed");
        }
    }
}

impl ApduTransport for BackendClient {
    fn exchange(&self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        // The lock spans the whole exchange: command and response bytes from
        // different sessions must never interleave on the backend wire.
        // The stream only goes back into the slot after a good exchange, so
        // any failure leaves the next call to reconnect from scratch.
        let mut slot = self.stream.lock();
        let mut stream = match slot.take() {
            Some(stream) => stream,
            None => self.open_stream()?,
        };

        let result = (|| -> Result<Vec<u8>, TransportError> {
            codec::write_frame(&mut stream, command)?;
            match codec::read_frame(&mut stream, MAX_FRAME_LEN)? {
                Some(response) => Ok(response),
                None => Err(CodecError::TruncatedStream.into()),
            }
        })();

        match result {
            Ok(response) if response.len() >= 2 => {
                *slot = Some(stream);
                Ok(response)
            }
            // A headless response is a backend fault; the connection stays
            // torn down so the next exchange starts clean.
            Ok(response) => Err(TransportError::ShortResponse(response.len())),
            Err(e) => {
                warn!("backend exchange failed: {e}");
                Err(e)
            }
        }
    }

    fn power_up(&self) -> Result<(), TransportError> {
        let mut slot = self.stream.lock();
        if slot.is_none() {
            *slot = Some(self.open_stream()?);
        }
        Ok(())
    }

    fn power_down(&self) {
        self.disconnect();
    }

    fn reset(&self) -> Result<(), TransportError> {
        let mut slot = self.stream.lock();
        *slot = None;
        *slot = Some(self.open_stream()?);
        Ok(())
    }

    fn atr(&self) -> Vec<u8> {
        atr::DEFAULT_ATR.to_vec()
    }
}

/// The embedded engine exposed as a transport
///
/// Used when no backend is configured. Dispatch runs under one mutex, which
/// is what keeps applet-state isolation intact when several reader sessions
/// share the one emulated card.
pub struct EmulatedCard {
    engine: Mutex<CardEngine>,
}

impl Default for EmulatedCard {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedCard {
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(CardEngine::new()),
        }
    }
}

impl ApduTransport for EmulatedCard {
    fn exchange(&self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        let response = self.engine.lock().dispatch(command).to_bytes();
        if response.len() < 2 {
            return Err(TransportError::ShortResponse(response.len()));
        }
        Ok(response)
    }

    fn power_up(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn power_down(&self) {
        // The emulated card keeps its state across power cycles, like the
        // persistent memory of the card it stands in for.
    }

    fn reset(&self) -> Result<(), TransportError> {
        // A reset ends the session: the applet selection is dropped, the
        // applets' own state survives.
        self.engine.lock().deselect();
        Ok(())
    }

    fn atr(&self) -> Vec<u8> {
        atr::embedded_card_atr()
    }
}
