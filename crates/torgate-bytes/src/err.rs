//! Internal: Declare the error type for torgate-bytes.

use thiserror::Error;

/// Error type for decoding SOCKS objects from bytes.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The object is truncated: the bytes that would complete it have
    /// not arrived yet, or were never sent.
    #[error("object truncated (or not fully present)")]
    Truncated,
    /// There were bytes left over after the object was decoded.
    #[error("extra bytes at end of object")]
    ExtraneousBytes,
    /// The object failed to conform to its protocol's rules.
    #[error("bad object: {0}")]
    BadMessage(&'static str),
}
