//! Error taxonomy shared across the crate.

use thiserror::Error;

/// Result alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories for identity, signing, and relay operations.
///
/// Each operation recovers errors at its own call boundary and reports them
/// as a typed value; no operation substitutes a zero or empty value for a
/// cryptographic failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed identifier text: bad separator, bad character, checksum
    /// failure, or wrong payload length.
    #[error("format: {0}")]
    Format(String),

    /// Value outside its mathematical domain: scalar out of `[1, n)`,
    /// x-coordinate with no curve lift, or a non-invertible field element.
    #[error("domain: {0}")]
    Domain(String),

    /// Signing could not produce a usable nonce, or the verification
    /// equation failed.
    #[error("signature: {0}")]
    Signature(String),

    /// The relay spoke the protocol wrong: bad URL scheme, handshake not
    /// upgraded, oversized frame, or an unusable reply.
    #[error("protocol: {0}")]
    Protocol(String),

    /// No correlated reply arrived within the deadline. Inconclusive, not a
    /// proven rejection.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Socket connect, read, or write failure.
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),
}
