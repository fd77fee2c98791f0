//! Implements the client side of SOCKS5, as spoken to a Tor daemon.
//!
//! SOCKS is an old and somewhat janky protocol for telling a TCP
//! proxy where to connect.  Tor listens for SOCKS5 connections on a
//! local port, and opens an anonymized stream for each tunnel
//! requested there.
//!
//! This crate tries to hide the actual details of the protocol, and
//! expose the handful of messages a client needs to speak: a method
//! negotiation ([HandshakeRequest], [HandshakeReply]) followed by a
//! connect exchange ([ConnectRequest], [ConnectReply]).  Addresses
//! are best sent in hostname form, so that name resolution happens
//! inside Tor rather than on the local network.
//!
//! For more information about SOCKS:
//!
//!   * SOCKS5 is specified in
//!     [RFC 1928](https://tools.ietf.org/html/rfc1928), and see also
//!     [RFC 1929](https://tools.ietf.org/html/rfc1929) for
//!     Username/Password authentication in SOCKS5.
//!   * See
//!     [socks-extensions.txt](https://spec.torproject.org/socks-extensions)
//!     for a description of Tor's extensions and restrictions on the
//!     SOCKS protocol.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]

mod err;
mod msg;

pub use err::Error;
pub use msg::{
    ConnectReply, ConnectRequest, HandshakeReply, HandshakeRequest, SocksAddr, SocksAddrType,
    SocksAuthMethod, SocksCmd, SocksHostname, SocksStatus,
};

/// A Result type for the torgate_socksproto crate.
pub type Result<T> = std::result::Result<T, Error>;
