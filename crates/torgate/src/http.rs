//! Pick apart the few HTTP details the bridge needs.
//!
//! This is nothing like a real HTTP parser.  We look at the raw bytes
//! just long enough to learn where the client wants to go, and to turn
//! the absolute-URI request line that proxy clients send into the
//! origin form that servers expect.

use thiserror::Error;

/// A problem with the HTTP bytes a client sent.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub(crate) enum HttpError {
    /// The request line isn't `METHOD http://host/path ...`.
    #[error("Request line is not in absolute-URI form")]
    MalformedRequestLine,
    /// The Host header named a port that isn't a number.
    #[error("Bad port in Host header")]
    BadPort,
}

/// Scan `data` for a `Host:` header and return the host and port it
/// names.
///
/// A host without a port defaults to port 80.  A missing header yields
/// an empty host: the tunnel request for it will fail with a better
/// error than we could synthesize here.
pub(crate) fn extract_host(data: &[u8]) -> Result<(String, u16), HttpError> {
    const HOST_HEADER: &[u8] = b"Host: ";

    let start = match data
        .windows(HOST_HEADER.len())
        .position(|w| w == HOST_HEADER)
    {
        Some(idx) => idx + HOST_HEADER.len(),
        None => return Ok((String::new(), 80)),
    };
    let value = &data[start..];
    let end = value.iter().position(|b| *b == b'\r').unwrap_or(value.len());
    let value = String::from_utf8_lossy(&value[..end]);

    let parts: Vec<&str> = value.split(':').collect();
    let host = parts[0].to_string();
    let port = if parts.len() == 2 {
        parts[1].parse().map_err(|_| HttpError::BadPort)?
    } else {
        80
    };
    Ok((host, port))
}

/// Rewrite the request line in `data` from absolute-URI form to origin
/// form by sliding the method up against the path.  Returns the offset
/// where the rewritten request begins.
///
/// `GET http://example.com/x HTTP/1.1` becomes `GET /x HTTP/1.1`,
/// starting `"http://example.com".len()` bytes into the buffer.
pub(crate) fn rewrite_request_line(data: &mut [u8]) -> Result<usize, HttpError> {
    // End of the method token.
    let space = data
        .iter()
        .position(|b| *b == b' ')
        .ok_or(HttpError::MalformedRequestLine)?;
    let uri_start = space + 1;

    // The third slash of `http://host/...` starts the path.
    let mut slashes = 0;
    let mut path_start = None;
    for (i, b) in data.iter().enumerate().skip(uri_start) {
        if *b == b' ' {
            break;
        }
        if *b == b'/' {
            slashes += 1;
            if slashes == 3 {
                path_start = Some(i);
                break;
            }
        }
    }
    let path_start = path_start.ok_or(HttpError::MalformedRequestLine)?;

    let shift = path_start - uri_start;
    data.copy_within(..uri_start, shift);
    Ok(shift)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn host_with_port() {
        let req = b"GET http://example.com:8080/ HTTP/1.1\r\nHost: example.com:8080\r\n\r\n";
        let (host, port) = extract_host(req).unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 8080);
    }

    #[test]
    fn host_without_port() {
        let (host, port) = extract_host(b"Host: example.com\r\n").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
    }

    #[test]
    fn host_missing() {
        let (host, port) = extract_host(b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n").unwrap();
        assert_eq!(host, "");
        assert_eq!(port, 80);
    }

    #[test]
    fn host_at_end_of_buffer() {
        // No terminating CR: the value runs to the end of the input.
        let (host, port) = extract_host(b"Host: example.com").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
    }

    #[test]
    fn host_bad_port() {
        let e = extract_host(b"Host: example.com:eighty\r\n");
        assert_eq!(e, Err(HttpError::BadPort));
    }

    #[test]
    fn rewrite_moves_method_to_path() {
        let mut buf = b"GET http://example.com/path HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec();
        let shift = rewrite_request_line(&mut buf).unwrap();
        assert_eq!(shift, "http://example.com".len());
        assert_eq!(
            &buf[shift..],
            &b"GET /path HTTP/1.1\r\nHost: example.com\r\n\r\n"[..]
        );
    }

    #[test]
    fn rewrite_with_port() {
        let mut buf = b"POST http://a.example:8080/submit HTTP/1.1\r\n\r\n".to_vec();
        let shift = rewrite_request_line(&mut buf).unwrap();
        assert_eq!(shift, "http://a.example:8080".len());
        assert_eq!(&buf[shift..], &b"POST /submit HTTP/1.1\r\n\r\n"[..]);
    }

    #[test]
    fn rewrite_bare_path_at_root() {
        let mut buf = b"GET http://example.com/ HTTP/1.1\r\n\r\n".to_vec();
        let shift = rewrite_request_line(&mut buf).unwrap();
        assert_eq!(&buf[shift..], &b"GET / HTTP/1.1\r\n\r\n"[..]);
    }

    #[test]
    fn rewrite_needs_a_path() {
        // Absolute URI with no path at all.
        let mut buf = b"GET http://example.com HTTP/1.1\r\n\r\n".to_vec();
        assert_eq!(
            rewrite_request_line(&mut buf),
            Err(HttpError::MalformedRequestLine)
        );

        // Origin form, as a non-proxy client would send.
        let mut buf = b"GET / HTTP/1.1\r\n\r\n".to_vec();
        assert_eq!(
            rewrite_request_line(&mut buf),
            Err(HttpError::MalformedRequestLine)
        );

        // Not HTTP at all.
        let mut buf = b"garbage".to_vec();
        assert_eq!(
            rewrite_request_line(&mut buf),
            Err(HttpError::MalformedRequestLine)
        );
    }
}
