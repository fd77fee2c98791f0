//! Drive the client side of a SOCKS5 session.
//!
//! The [`SocksClient`] here is the bridge's link to the local Tor
//! daemon: it negotiates an authentication method, asks for a CONNECT
//! tunnel, and then hands the underlying stream back for relaying.

use crate::err::{Error, Result};
use crate::hexdump;

use std::convert::TryInto;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use torgate_bytes::{Readable, Reader, Writeable, Writer};
use torgate_socksproto::{
    ConnectReply, ConnectRequest, Error as SocksError, HandshakeReply, HandshakeRequest, SocksAddr,
    SocksAuthMethod, SocksStatus,
};

/// Where a SOCKS session is in its protocol.  Each completed exchange
/// advances the state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Nothing sent yet.
    Idle,
    /// A method negotiation is in flight.
    Handshaking,
    /// The proxy accepted "no authentication"; ready to request a tunnel.
    Handshaken,
    /// A CONNECT exchange is in flight.
    Connecting,
    /// The proxy built the tunnel; the stream now carries target bytes.
    Tunneled,
    /// An earlier exchange failed; the session is unusable.
    Failed,
}

/// A client for the SOCKS5 protocol, on an open connection to a proxy.
///
/// Dropping the client (or the stream recovered with
/// [`SocksClient::into_stream`]) closes the connection.
pub(crate) struct SocksClient<S> {
    /// The connection to the proxy.
    stream: S,
    /// Where we are in the protocol.
    state: State,
}

impl SocksClient<TcpStream> {
    /// Open a TCP connection to the SOCKS proxy at `host`:`port` and
    /// negotiate "no authentication" on it.
    pub(crate) async fn connect(host: &str, port: u16) -> Result<SocksClient<TcpStream>> {
        let stream = TcpStream::connect((host, port)).await?;
        let mut client = SocksClient::new(stream);
        client.handshake().await?;
        Ok(client)
    }
}

impl<S> SocksClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-open connection to a SOCKS proxy.
    pub(crate) fn new(stream: S) -> Self {
        SocksClient {
            stream,
            state: State::Idle,
        }
    }

    /// Offer the proxy our authentication methods, and check that it
    /// picks "no authentication".
    pub(crate) async fn handshake(&mut self) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::Socks(SocksError::Internal));
        }
        self.state = State::Handshaking;
        match self.try_handshake().await {
            Ok(()) => {
                self.state = State::Handshaken;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// The fallible part of [`SocksClient::handshake`].
    async fn try_handshake(&mut self) -> Result<()> {
        let request = HandshakeRequest::new(vec![SocksAuthMethod::NO_AUTHENTICATION])?;
        let reply: HandshakeReply = self.exchange(&request).await?;
        if reply.method() != SocksAuthMethod::NO_AUTHENTICATION {
            return Err(Error::Socks(SocksError::AuthNotAccepted(reply.method())));
        }
        Ok(())
    }

    /// Ask the proxy for a tunnel to `host`:`port`.
    ///
    /// The target always goes over in hostname form, even when it
    /// would parse as an IP literal, so that name resolution happens
    /// on the far side of the proxy.
    pub(crate) async fn open_tunnel(&mut self, host: &str, port: u16) -> Result<()> {
        if self.state != State::Handshaken {
            return Err(Error::Socks(SocksError::Internal));
        }
        self.state = State::Connecting;
        match self.try_open_tunnel(host, port).await {
            Ok(()) => {
                self.state = State::Tunneled;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// The fallible part of [`SocksClient::open_tunnel`].
    async fn try_open_tunnel(&mut self, host: &str, port: u16) -> Result<()> {
        let addr = SocksAddr::Hostname(host.to_string().try_into()?);
        let request = ConnectRequest::new(addr, port)?;
        let reply: ConnectReply = self.exchange(&request).await?;
        if reply.status() != SocksStatus::SUCCEEDED {
            return Err(Error::Socks(SocksError::TunnelRejected(reply.status())));
        }
        debug!(
            "Tunnel open; proxy end bound at {}:{}",
            reply.addr(),
            reply.port()
        );
        Ok(())
    }

    /// Give back the underlying stream.  Once the state is `Tunneled`,
    /// reads and writes on it reach the target.
    pub(crate) fn into_stream(self) -> S {
        self.stream
    }

    /// Send `msg` and read back one reply, tolerating replies that
    /// arrive split across several reads.
    async fn exchange<M: Writeable, R: Readable>(&mut self, msg: &M) -> Result<R> {
        let mut outbuf = Vec::new();
        Writer::write(&mut outbuf, msg);
        hexdump::trace_bytes(">>>", &outbuf[..]);
        self.stream.write_all(&outbuf[..]).await?;

        let mut inbuf = [0_u8; 1024];
        let mut n_read = 0;
        loop {
            let n = self.stream.read(&mut inbuf[n_read..]).await?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Proxy closed the connection mid-exchange",
                )
                .into());
            }
            n_read += n;
            let mut r = Reader::from_slice(&inbuf[..n_read]);
            match r.extract() {
                Ok(reply) => {
                    hexdump::trace_bytes("<<<", &inbuf[..n_read]);
                    return Ok(reply);
                }
                Err(e) => match SocksError::from(e) {
                    SocksError::Truncated => continue,
                    other => return Err(other.into()),
                },
            }
        }
    }
}
