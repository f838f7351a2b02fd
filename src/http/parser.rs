use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::headers::HeaderError;
use crate::http::request::Request;

/// Bytes requested from the source per read. Kept small so that partial
/// lines and partial bodies are the normal case, not the exception.
pub const READ_CHUNK_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid request line: {reason}")]
    InvalidRequestLine { reason: String },

    #[error("unsupported http version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid header: {0}")]
    InvalidHeader(#[from] HeaderError),

    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("body larger than declared content-length: declared {declared}, received {received}")]
    BodyTooLong { declared: usize, received: usize },

    #[error("stream ended before the request was complete")]
    Incomplete,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ParseError {
    pub fn invalid_request_line<S: ToString>(reason: S) -> Self {
        Self::InvalidRequestLine {
            reason: reason.to_string(),
        }
    }
}

/// Reads a complete request from `reader`.
///
/// Bytes are pulled [`READ_CHUNK_SIZE`] at a time and fed to the request
/// parser until it is done. Reaching end of stream first is
/// [`ParseError::Incomplete`]; read errors are returned unchanged.
pub async fn parse_from_stream<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut request = Request::new();
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE * 2);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    while !request.is_done() {
        let n = reader.read(&mut chunk).await?;
        buffer.extend_from_slice(&chunk[..n]);

        let consumed = request.parse(&buffer)?;
        buffer.drain(..consumed);

        if n == 0 {
            break;
        }
    }

    if !request.is_done() {
        return Err(ParseError::Incomplete);
    }

    Ok(request)
}

/// Parses a request held entirely in `buf`.
///
/// Returns the request and the number of bytes it occupied. Bytes after a
/// request without `Content-Length` are not counted.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let mut request = Request::new();
    let consumed = request.parse(buf)?;

    if !request.is_done() {
        return Err(ParseError::Incomplete);
    }

    Ok((request, consumed))
}
