//! Bridge between a virtual-reader control protocol and a card backend
//!
//! Sits between reader drivers speaking the virtual-reader control protocol
//! (power, reset, ATR, APDU frames over TCP) and one card implementation:
//! either a downstream card-emulation service reached over TCP, or the
//! embedded emulation engine with its two reference applets.
//!
//! The crate is layered bottom-up:
//! - [`codec`] — `[u16 BE length][payload]` framing shared by both sides
//! - [`apdu`] — command parsing, responses, status words
//! - [`card`] — the embedded emulation engine
//! - [`backend`] — the [`backend::ApduTransport`] seam and its two
//!   implementations
//! - [`bridge`] — per-reader protocol adapter and the accept-loop server
//! - [`config`] — environment-sourced process configuration

pub mod apdu;
pub mod backend;
pub mod bridge;
pub mod card;
pub mod codec;
pub mod config;
