//! Implement the listener and the per-connection bridge logic.
//!
//! A proxy is launched with [`run_proxy()`], which listens for new
//! connections and then passes them to [`handle_connection()`] in
//! their own tasks.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::hexdump;
use crate::http;
use crate::socks::SocksClient;
use crate::TorgateConfig;

/// Size of the buffer used for one read from either socket.
///
/// The request phase takes a read shorter than this as the end of the
/// request, so a request that lands exactly on the boundary leaves us
/// waiting for bytes that may never come.
const BUF_SIZE: usize = 1024;

/// Await `fut`, giving up after `limit` if one is set.
async fn deadline<F, T, E>(limit: Option<Duration>, fut: F) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: From<io::Error>,
{
    match limit {
        Some(t) => match tokio::time::timeout(t, fut).await {
            Ok(res) => res,
            Err(_) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "I/O deadline expired").into())
            }
        },
        None => fut.await,
    }
}

/// Bind the listening socket named by `config` and serve connections
/// on it until the process exits.
pub(crate) async fn run_proxy(config: Arc<TorgateConfig>) -> Result<()> {
    let listener = TcpListener::bind((config.listen_host(), config.listen_port()))
        .await
        .with_context(|| format!("Can't listen on {}", config.listen_addr()))?;
    info!("Listening on {}.", config.listen_addr());
    accept_loop(listener, config).await
}

/// Accept connections from `listener` forever, spawning a task to
/// serve each one.
///
/// A session that fails takes down its own task and nothing else.
async fn accept_loop(listener: TcpListener, config: Arc<TorgateConfig>) -> Result<()> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("Failed to receive incoming connection")?;
        debug!("Connected: {}", peer);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            match handle_connection(&config, stream).await {
                Ok(()) => debug!("Connection closed"),
                Err(e) => warn!("Connection aborted: {}", e),
            }
        });
    }
}

/// Serve one client connection: read its request, open a tunnel to
/// the host the request names, forward the rewritten request, and
/// relay the response back.
async fn handle_connection<C>(config: &TorgateConfig, mut client: C) -> crate::err::Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let limit = config.io_timeout();

    let mut buf = [0_u8; BUF_SIZE];
    let mut n = deadline(limit, client.read(&mut buf)).await?;
    if n == 0 {
        // The client went away without sending anything.
        return Ok(());
    }
    hexdump::trace_bytes(">>>", &buf[..n]);

    let (host, port) = http::extract_host(&buf[..n])?;
    debug!("Host={}, Port={}", host, port);

    let mut socks = deadline(
        limit,
        SocksClient::connect(config.tor_host(), config.tor_port()),
    )
    .await?;
    deadline(limit, socks.open_tunnel(&host, port)).await?;
    let mut tunnel = socks.into_stream();

    // First chunk: excise the scheme and authority from the request
    // line, then send from the shifted start.
    let shift = http::rewrite_request_line(&mut buf[..n])?;
    hexdump::trace_bytes(">>> (send fixed)", &buf[shift..n]);
    deadline(limit, tunnel.write_all(&buf[shift..n])).await?;

    // Further chunks go through verbatim, for as long as the client
    // keeps filling the buffer.
    while n == BUF_SIZE {
        n = deadline(limit, client.read(&mut buf)).await?;
        hexdump::trace_bytes(">>> (send)", &buf[..n]);
        deadline(limit, tunnel.write_all(&buf[..n])).await?;
    }

    // Response phase: relay until the tunnel reaches end of stream.
    loop {
        let n = deadline(limit, tunnel.read(&mut buf)).await?;
        if n == 0 {
            break;
        }
        hexdump::trace_bytes("<<<", &buf[..n]);
        deadline(limit, client.write_all(&buf[..n])).await?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::err::Error as SessionError;
    use tokio::net::TcpStream;
    use torgate_bytes::Reader;
    use torgate_socksproto::ConnectRequest;

    /// Build a configuration pointing the SOCKS side at `tor_port` on
    /// localhost.
    fn test_config(tor_port: u16, io_timeout: Option<u64>) -> Arc<TorgateConfig> {
        let mut toml = format!(
            "listen_host = \"127.0.0.1\"\n\
             listen_port = 0\n\
             tor_host = \"127.0.0.1\"\n\
             tor_port = {}\n\
             trace = false\n",
            tor_port
        );
        if let Some(t) = io_timeout {
            toml.push_str(&format!("io_timeout = {}\n", t));
        }
        let mut cfg = config::Config::new();
        cfg.merge(config::File::from_str(&toml, config::FileFormat::Toml))
            .unwrap();
        Arc::new(cfg.try_into().unwrap())
    }

    #[tokio::test]
    async fn bridges_a_request() {
        let socks = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tor_port = socks.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut s, _) = socks.accept().await.unwrap();

            let mut buf = [0_u8; 3];
            s.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [5, 1, 0]);
            s.write_all(&[5, 0]).await.unwrap();

            let mut buf = [0_u8; 64];
            let n = s.read(&mut buf).await.unwrap();
            let mut r = Reader::from_slice(&buf[..n]);
            let req: ConnectRequest = r.extract().unwrap();
            assert_eq!(req.addr().to_string(), "test.local");
            assert_eq!(req.port(), 80);
            s.write_all(&[5, 0, 0, 1, 127, 0, 0, 1, 0, 80])
                .await
                .unwrap();

            // The tunneled request must arrive in origin form.
            let expected = b"GET /index.html HTTP/1.1\r\nHost: test.local\r\n\r\n";
            let mut got = vec![0_u8; expected.len()];
            s.read_exact(&mut got).await.unwrap();
            assert_eq!(got, &expected[..]);

            s.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").await.unwrap();
        });

        let (mut browser, bridge_end) = tokio::io::duplex(4096);
        let config = test_config(tor_port, None);
        let bridge = tokio::spawn(async move { handle_connection(&config, bridge_end).await });

        browser
            .write_all(b"GET http://test.local/index.html HTTP/1.1\r\nHost: test.local\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        browser.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, &b"HTTP/1.1 204 No Content\r\n\r\n"[..]);

        bridge.await.unwrap().unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn long_request_is_streamed() {
        let socks = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tor_port = socks.local_addr().unwrap().port();

        // Head is 35 bytes; pad the first chunk to exactly BUF_SIZE,
        // then trail 100 more bytes so the request phase has to loop.
        let head = b"PUT http://big.test/up HTTP/1.1\r\n\r\n";
        let mut request = head.to_vec();
        request.resize(BUF_SIZE, b'x');
        request.extend(std::iter::repeat(b'y').take(100));

        let server = tokio::spawn(async move {
            let (mut s, _) = socks.accept().await.unwrap();

            let mut buf = [0_u8; 3];
            s.read_exact(&mut buf).await.unwrap();
            s.write_all(&[5, 0]).await.unwrap();

            let mut buf = [0_u8; 64];
            let n = s.read(&mut buf).await.unwrap();
            let mut r = Reader::from_slice(&buf[..n]);
            let req: ConnectRequest = r.extract().unwrap();
            assert_eq!(req.addr().to_string(), "big.test");
            s.write_all(&[5, 0, 0, 1, 127, 0, 0, 1, 0, 80])
                .await
                .unwrap();

            // Everything after "http://big.test" should arrive.
            let shift = "http://big.test".len();
            let mut got = vec![0_u8; BUF_SIZE + 100 - shift];
            s.read_exact(&mut got).await.unwrap();
            assert_eq!(&got[..20], b"PUT /up HTTP/1.1\r\n\r\n");
            assert!(got[20..BUF_SIZE - shift].iter().all(|b| *b == b'x'));
            assert!(got[BUF_SIZE - shift..].iter().all(|b| *b == b'y'));

            s.write_all(b"HTTP/1.1 201 Created\r\n\r\n").await.unwrap();
        });

        let (mut browser, bridge_end) = tokio::io::duplex(8192);
        let config = test_config(tor_port, None);
        let bridge = tokio::spawn(async move { handle_connection(&config, bridge_end).await });

        browser.write_all(&request).await.unwrap();
        let mut response = Vec::new();
        browser.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, &b"HTTP/1.1 201 Created\r\n\r\n"[..]);

        bridge.await.unwrap().unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_tunnel_keeps_listening() {
        let socks = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tor_port = socks.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            // First connection: refuse the tunnel.
            let (mut s, _) = socks.accept().await.unwrap();
            let mut buf = [0_u8; 3];
            s.read_exact(&mut buf).await.unwrap();
            s.write_all(&[5, 0]).await.unwrap();
            let mut buf = [0_u8; 64];
            let n = s.read(&mut buf).await.unwrap();
            assert!(n > 0);
            s.write_all(&[5, 5, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();
            // No request bytes may follow the refusal.
            let mut rest = Vec::new();
            s.read_to_end(&mut rest).await.unwrap();
            assert_eq!(rest, b"");

            // Second connection: accept and answer.
            let (mut s, _) = socks.accept().await.unwrap();
            let mut buf = [0_u8; 3];
            s.read_exact(&mut buf).await.unwrap();
            s.write_all(&[5, 0]).await.unwrap();
            let mut buf = [0_u8; 64];
            let n = s.read(&mut buf).await.unwrap();
            let mut r = Reader::from_slice(&buf[..n]);
            let req: ConnectRequest = r.extract().unwrap();
            assert_eq!(req.addr().to_string(), "b.test");
            s.write_all(&[5, 0, 0, 1, 127, 0, 0, 1, 0, 80])
                .await
                .unwrap();
            let expected = b"GET /ok HTTP/1.1\r\nHost: b.test\r\n\r\n";
            let mut got = vec![0_u8; expected.len()];
            s.read_exact(&mut got).await.unwrap();
            assert_eq!(got, &expected[..]);
            s.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        });

        let config = test_config(tor_port, None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(accept_loop(listener, config));

        // First client's tunnel gets refused; it just sees EOF.
        let mut browser = TcpStream::connect(addr).await.unwrap();
        browser
            .write_all(b"GET http://a.test/ HTTP/1.1\r\nHost: a.test\r\n\r\n")
            .await
            .unwrap();
        let mut got = Vec::new();
        browser.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"");

        // Second client is served normally.
        let mut browser = TcpStream::connect(addr).await.unwrap();
        browser
            .write_all(b"GET http://b.test/ok HTTP/1.1\r\nHost: b.test\r\n\r\n")
            .await
            .unwrap();
        let mut got = Vec::new();
        browser.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, &b"HTTP/1.1 200 OK\r\n\r\n"[..]);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_host_still_negotiates() {
        let socks = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tor_port = socks.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut s, _) = socks.accept().await.unwrap();
            let mut buf = [0_u8; 3];
            s.read_exact(&mut buf).await.unwrap();
            s.write_all(&[5, 0]).await.unwrap();
            let mut buf = [0_u8; 64];
            let n = s.read(&mut buf).await.unwrap();
            let mut r = Reader::from_slice(&buf[..n]);
            let req: ConnectRequest = r.extract().unwrap();
            // A request with no Host header asks for the empty name.
            assert_eq!(req.addr().to_string(), "");
            s.write_all(&[5, 4, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();
        });

        let (mut browser, bridge_end) = tokio::io::duplex(1024);
        let config = test_config(tor_port, None);
        browser
            .write_all(b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n")
            .await
            .unwrap();

        let e = handle_connection(&config, bridge_end).await;
        assert!(matches!(
            e,
            Err(SessionError::Socks(
                torgate_socksproto::Error::TunnelRejected(_)
            ))
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn deadline_cuts_off_stalled_proxy() {
        let socks = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tor_port = socks.local_addr().unwrap().port();

        // Accept and then go silent: never answer the handshake.
        let _server = tokio::spawn(async move {
            let (_s, _) = socks.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let (mut browser, bridge_end) = tokio::io::duplex(1024);
        let config = test_config(tor_port, Some(1));
        browser
            .write_all(b"GET http://t.test/ HTTP/1.1\r\nHost: t.test\r\n\r\n")
            .await
            .unwrap();

        let e = handle_connection(&config, bridge_end).await;
        match e {
            Err(SessionError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("Unexpected result: {:?}", other),
        }
    }
}
