//! Declare an error type for torgate_socksproto
use thiserror::Error;

use crate::msg::{SocksAuthMethod, SocksStatus};

/// An error that occurs while negotiating a SOCKS session.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Tried to handle a message that wasn't complete: try again.
    #[error("Message truncated; need to wait for more")]
    Truncated,

    /// The SOCKS proxy didn't implement SOCKS correctly.
    ///
    /// (Or we tried to construct a message that SOCKS has no way to
    /// represent, like a hostname longer than 255 bytes.)
    #[error("SOCKS protocol syntax violation")]
    Syntax,

    /// The SOCKS proxy insisted on an authentication method that we
    /// don't support.
    ///
    /// We only ever offer "no authentication"; a local Tor daemon in
    /// its default configuration always accepts it.
    #[error("Proxy requires authentication method {0}, which we cannot provide")]
    AuthNotAccepted(SocksAuthMethod),

    /// The SOCKS proxy refused to open a tunnel to the target.
    #[error("Proxy refused to open a tunnel: {0}")]
    TunnelRejected(SocksStatus),

    /// Something went wrong with the programming of this module.
    #[error("Internal programming error while handling SOCKS session")]
    Internal,
}

impl From<torgate_bytes::Error> for Error {
    fn from(e: torgate_bytes::Error) -> Error {
        use torgate_bytes::Error as E;
        match e {
            E::Truncated => Error::Truncated,
            _ => Error::Syntax,
        }
    }
}
