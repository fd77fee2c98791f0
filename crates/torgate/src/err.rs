//! Declare an error type for one proxied session.

/// An error produced while serving a single client connection.
///
/// Sessions fail independently; none of these is fatal to the
/// listener.
#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("Socks: {0}")]
    Socks(#[from] torgate_socksproto::Error),
    #[error("Http: {0}")]
    Http(#[from] crate::http::HttpError),
    #[error("Io: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
