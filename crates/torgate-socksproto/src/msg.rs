//! Structures that represent SOCKS messages

use crate::{Error, Result};

use caret::caret_int;
use std::convert::TryFrom;
use std::fmt;
use std::net::IpAddr;

use torgate_bytes::Error as BytesError;
use torgate_bytes::Result as BytesResult;
use torgate_bytes::{Readable, Reader, Writeable, Writer};

/// The version byte that introduces every message in this crate.
const SOCKS_VERSION: u8 = 5;

/// Take a version byte from `r`, and complain if it isn't SOCKS5.
fn take_version(r: &mut Reader<'_>) -> BytesResult<()> {
    let version = r.take_u8()?;
    if version != SOCKS_VERSION {
        return Err(BytesError::BadMessage("unexpected SOCKS version"));
    }
    Ok(())
}

/// The opening message of a SOCKS5 session, advertising the
/// authentication methods the client is willing to speak.
///
/// We only ever advertise [SocksAuthMethod::NO_AUTHENTICATION]: a
/// local Tor daemon doesn't use SOCKS authentication to authenticate
/// anybody.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The methods offered to the proxy, in order of preference.
    methods: Vec<SocksAuthMethod>,
}

/// The proxy's answer to a [HandshakeRequest], selecting the single
/// authentication method the session will use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeReply {
    /// The method the proxy chose, or
    /// [SocksAuthMethod::NO_ACCEPTABLE_METHODS] if it liked none of
    /// ours.
    method: SocksAuthMethod,
}

/// A request for the proxy to open a tunnel to a target address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// The command requested of the proxy.
    cmd: SocksCmd,
    /// The target address.
    addr: SocksAddr,
    /// The target port.
    port: u16,
}

/// The proxy's answer to a [ConnectRequest].
///
/// Once this arrives with [SocksStatus::SUCCEEDED], the underlying
/// stream is a tunnel to the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectReply {
    /// The outcome of the connection attempt.
    status: SocksStatus,
    /// The address to which the proxy bound the outgoing connection.
    addr: SocksAddr,
    /// The port to which the proxy bound the outgoing connection.
    port: u16,
}

/// An address sent or received as part of a SOCKS handshake
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SocksAddr {
    /// A regular DNS hostname.
    Hostname(SocksHostname),
    /// An IP address.  (Tor doesn't like to see these in requests,
    /// since they usually indicate that the hostname lookup happened
    /// somewhere outside of Tor.)
    Ip(IpAddr),
}

/// A hostname for use with SOCKS.  It is limited in length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocksHostname(String);

caret_int! {
    /// An authentication method, as used in the SOCKS5 method
    /// negotiation.
    pub struct SocksAuthMethod(u8) {
        /// No authentication at all.
        ///
        /// The only method a stock Tor daemon will accept.
        NO_AUTHENTICATION = 0x00,
        /// GSSAPI authentication.  (See RFC 1961.)
        GSSAPI = 0x01,
        /// Username/password authentication.  (See RFC 1929.  Tor
        /// repurposes it for stream isolation.)
        USERNAME_PASSWORD = 0x02,
        /// Not a real method: sent by the proxy when it accepts none
        /// of the methods we offered.
        NO_ACCEPTABLE_METHODS = 0xFF,
    }
}

caret_int! {
    /// Command sent to the proxy telling it what to do.
    pub struct SocksCmd(u8) {
        /// Connect to a remote TCP address:port.
        CONNECT = 1,
        /// Not supported in Tor.
        BIND = 2,
        /// Not supported in Tor.
        UDP_ASSOCIATE = 3,
    }
}

caret_int! {
    /// The type of an address appearing in a SOCKS5 request or reply.
    pub struct SocksAddrType(u8) {
        /// An IPv4 address, sent as four raw octets.
        IPV4 = 1,
        /// A hostname, sent with a one-byte length prefix.
        DOMAINNAME = 3,
        /// An IPv6 address, sent as sixteen raw octets.
        IPV6 = 4,
    }
}

caret_int! {
    /// Possible reply status values from a SOCKS5 handshake.
    ///
    /// Note that the documentation for these values is kind of scant,
    /// and is limited to what the RFC says.
    pub struct SocksStatus(u8) {
        /// RFC 1928: "succeeded"
        SUCCEEDED = 0x00,
        /// RFC 1928: "general SOCKS server failure"
        GENERAL_FAILURE = 0x01,
        /// RFC 1928: "connection not allowed by ruleset"
        NOT_ALLOWED = 0x02,
        /// RFC 1928: "Network unreachable"
        NETWORK_UNREACHABLE = 0x03,
        /// RFC 1928: "Host unreachable"
        HOST_UNREACHABLE = 0x04,
        /// RFC 1928: "Connection refused"
        CONNECTION_REFUSED = 0x05,
        /// RFC 1928: "TTL expired"
        TTL_EXPIRED = 0x06,
        /// RFC 1928: "Command not supported"
        COMMAND_NOT_SUPPORTED = 0x07,
        /// RFC 1928: "Address type not supported"
        ADDRTYPE_NOT_SUPPORTED = 0x08,
    }
}

impl SocksAddrType {
    /// Return the number of address bytes that follow this type on
    /// the wire: 4 for an IPv4 address, 16 for an IPv6 address, and 0
    /// for a hostname, whose real length arrives in a one-byte
    /// prefix instead.
    ///
    /// Gives None for an address type we don't recognize.
    pub fn address_len(self) -> Option<usize> {
        match self {
            SocksAddrType::IPV4 => Some(4),
            SocksAddrType::DOMAINNAME => Some(0),
            SocksAddrType::IPV6 => Some(16),
            _ => None,
        }
    }
}

impl TryFrom<String> for SocksHostname {
    type Error = Error;
    fn try_from(s: String) -> Result<SocksHostname> {
        if s.len() > 255 {
            Err(Error::Syntax)
        } else {
            Ok(SocksHostname(s))
        }
    }
}

impl AsRef<str> for SocksHostname {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<SocksHostname> for String {
    fn from(s: SocksHostname) -> String {
        s.0
    }
}

impl HandshakeRequest {
    /// Construct a request offering the authentication methods in
    /// `methods`.
    ///
    /// Return an error if the list can't be represented on the wire.
    pub fn new(methods: Vec<SocksAuthMethod>) -> Result<Self> {
        if methods.is_empty() || methods.len() > 255 {
            return Err(Error::Syntax);
        }
        Ok(HandshakeRequest { methods })
    }

    /// Return the methods offered by this request.
    pub fn methods(&self) -> &[SocksAuthMethod] {
        &self.methods[..]
    }
}

impl HandshakeReply {
    /// Construct a reply selecting `method`.
    pub fn new(method: SocksAuthMethod) -> Self {
        HandshakeReply { method }
    }

    /// Return the method the proxy selected.
    pub fn method(&self) -> SocksAuthMethod {
        self.method
    }
}

impl ConnectRequest {
    /// Construct a request to tunnel to `addr`:`port`.
    ///
    /// The command is always [SocksCmd::CONNECT]; it's the only one
    /// Tor will honor.  Return an error if the inputs aren't valid.
    pub fn new(addr: SocksAddr, port: u16) -> Result<Self> {
        if port == 0 {
            return Err(Error::Syntax);
        }
        Ok(ConnectRequest {
            cmd: SocksCmd::CONNECT,
            addr,
            port,
        })
    }

    /// Return the command for the proxy to execute.
    pub fn command(&self) -> SocksCmd {
        self.cmd
    }

    /// Return the requested address.
    pub fn addr(&self) -> &SocksAddr {
        &self.addr
    }

    /// Return the requested port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl ConnectReply {
    /// Construct a reply reporting `status` for a tunnel bound at
    /// `addr`:`port`.
    pub fn new(status: SocksStatus, addr: SocksAddr, port: u16) -> Self {
        ConnectReply { status, addr, port }
    }

    /// Return the outcome of the connection attempt.
    pub fn status(&self) -> SocksStatus {
        self.status
    }

    /// Return the address where the proxy bound the tunnel.
    pub fn addr(&self) -> &SocksAddr {
        &self.addr
    }

    /// Return the port where the proxy bound the tunnel.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for SocksAddr {
    /// Format a string (a hostname or IP address) corresponding to this
    /// SocksAddr.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksAddr::Ip(a) => write!(f, "{}", a),
            SocksAddr::Hostname(h) => write!(f, "{}", h.0),
        }
    }
}

impl Readable for SocksAddr {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<SocksAddr> {
        let atype: SocksAddrType = r.take_u8()?.into();
        // The length of the address is a function of its type; look
        // it up before consuming anything else.
        match atype.address_len() {
            Some(0) => {
                let hlen = r.take_u8()?;
                let hostname = r.take(hlen as usize)?;
                let hostname = std::str::from_utf8(hostname)
                    .map_err(|_| BytesError::BadMessage("bad utf8 on hostname"))?
                    .to_string();
                // hlen was a u8, so the length bound holds.
                Ok(SocksAddr::Hostname(SocksHostname(hostname)))
            }
            Some(4) => {
                let ip4: std::net::Ipv4Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip4.into()))
            }
            Some(16) => {
                let ip6: std::net::Ipv6Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip6.into()))
            }
            _ => Err(BytesError::BadMessage("unrecognized address type.")),
        }
    }
}

impl Writeable for SocksAddr {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        match self {
            SocksAddr::Ip(IpAddr::V4(ip)) => {
                w.write_u8(SocksAddrType::IPV4.into());
                w.write(ip);
            }
            SocksAddr::Ip(IpAddr::V6(ip)) => {
                w.write_u8(SocksAddrType::IPV6.into());
                w.write(ip);
            }
            SocksAddr::Hostname(h) => {
                w.write_u8(SocksAddrType::DOMAINNAME.into());
                // Can't overflow: SocksHostname is length-checked on
                // construction.
                w.write_u8(h.0.len() as u8);
                w.write(h.0.as_bytes());
            }
        }
    }
}

impl Readable for HandshakeRequest {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<HandshakeRequest> {
        take_version(r)?;
        let nmethods = r.take_u8()?;
        let methods = r
            .take(nmethods as usize)?
            .iter()
            .map(|b| (*b).into())
            .collect();
        Ok(HandshakeRequest { methods })
    }
}

impl Writeable for HandshakeRequest {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_u8(SOCKS_VERSION);
        // Can't overflow: new() rejects lists longer than 255.
        w.write_u8(self.methods.len() as u8);
        for m in &self.methods {
            w.write_u8((*m).into());
        }
    }
}

impl Readable for HandshakeReply {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<HandshakeReply> {
        take_version(r)?;
        let method = r.take_u8()?.into();
        Ok(HandshakeReply { method })
    }
}

impl Writeable for HandshakeReply {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_u8(SOCKS_VERSION);
        w.write_u8(self.method.into());
    }
}

impl Readable for ConnectRequest {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<ConnectRequest> {
        take_version(r)?;
        let cmd = r.take_u8()?.into();
        let _reserved = r.take_u8()?;
        let addr = r.extract()?;
        let port = r.take_u16()?;
        Ok(ConnectRequest { cmd, addr, port })
    }
}

impl Writeable for ConnectRequest {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_u8(SOCKS_VERSION);
        w.write_u8(self.cmd.into());
        w.write_u8(0); // reserved.
        w.write(&self.addr);
        w.write_u16(self.port);
    }
}

impl Readable for ConnectReply {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<ConnectReply> {
        take_version(r)?;
        let status = r.take_u8()?.into();
        let _reserved = r.take_u8()?;
        let addr = r.extract()?;
        let port = r.take_u16()?;
        Ok(ConnectReply { status, addr, port })
    }
}

impl Writeable for ConnectReply {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_u8(SOCKS_VERSION);
        w.write_u8(self.status.into());
        w.write_u8(0); // reserved.
        w.write(&self.addr);
        w.write_u16(self.port);
    }
}
