//! Cryptographic identity and publishing primitives for Nostr.
//!
//! The crate covers the path from a bech32 secret identifier to an
//! acknowledged event on a relay: key decoding and derivation, canonical
//! event ids, BIP340 Schnorr signatures built on hand-rolled secp256k1
//! arithmetic, and a minimal WebSocket client that publishes one event and
//! correlates the relay's `OK` reply.

pub mod bech32;
pub mod config;
pub mod curve;
pub mod error;
pub mod event;
pub mod frame;
pub mod keys;
pub mod relay;
pub mod schnorr;

pub use error::{Error, Result};
