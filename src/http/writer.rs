use std::fmt;
use std::io;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;
use crate::http::response::StatusCode;
use crate::http::wire::{self, CRLF, HTTP_VERSION, LAST_CHUNK};

/// Phase of a [`ResponseWriter`]. Each gated write needs the exact
/// predecessor phase and moves the writer one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterState {
    #[default]
    Initial,
    StatusWritten,
    HeadersWritten,
    BodyWritten,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::Initial => "initial",
            WriterState::StatusWritten => "status written",
            WriterState::HeadersWritten => "headers written",
            WriterState::BodyWritten => "body written",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot write {operation}: writer is in state '{state}'")]
    OutOfOrder {
        operation: &'static str,
        state: WriterState,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Writes one HTTP/1.1 response to a byte sink, enforcing framing order:
/// status line, headers, body (fixed or chunked), then optional trailers.
///
/// Calls made out of order fail with [`WriteError::OutOfOrder`] and leave the
/// sink untouched.
pub struct ResponseWriter<W> {
    sink: W,
    state: WriterState,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::Initial,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Emits `HTTP/1.1 <code> <reason>\r\n`.
    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.expect(WriterState::Initial, "status line")?;

        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );
        self.emit(line.as_bytes()).await?;

        self.state = WriterState::StatusWritten;
        Ok(())
    }

    /// Emits every header line followed by the blank separator line.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect(WriterState::StatusWritten, "headers")?;

        let buf = field_block(headers);
        self.emit(&buf).await?;

        self.state = WriterState::HeadersWritten;
        Ok(())
    }

    /// Writes `body` verbatim. Keeping it consistent with `Content-Length` is
    /// up to the caller.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect(WriterState::HeadersWritten, "body")?;

        self.emit(body).await?;

        self.state = WriterState::BodyWritten;
        Ok(body.len())
    }

    /// Writes one chunk of a chunked body and returns the payload length.
    /// An empty slice writes nothing, since a zero-size chunk would end the
    /// body.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if data.is_empty() {
            return Ok(0);
        }

        let size = format!("{:x}", data.len());
        let mut buf = BytesMut::with_capacity(size.len() + data.len() + 2 * CRLF.len());
        buf.put_slice(size.as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(data);
        buf.put_slice(CRLF);
        self.emit(&buf).await?;

        Ok(data.len())
    }

    /// Writes the terminating zero-size chunk. Trailers may follow.
    pub async fn write_chunked_body_done(&mut self) -> Result<(), WriteError> {
        self.emit(LAST_CHUNK).await?;

        self.state = WriterState::BodyWritten;
        Ok(())
    }

    /// Emits trailer fields after the body, followed by the blank line.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect(WriterState::BodyWritten, "trailers")?;

        let buf = field_block(trailers);
        self.emit(&buf).await
    }

    fn expect(&self, required: WriterState, operation: &'static str) -> Result<(), WriteError> {
        if self.state != required {
            return Err(WriteError::OutOfOrder {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    async fn emit(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.sink.write_all(bytes).await?;
        self.sink.flush().await?;
        Ok(())
    }
}

/// Serializes `<Name>: <value>\r\n` lines plus the closing blank line.
fn field_block(fields: &Headers) -> BytesMut {
    let mut buf = BytesMut::new();

    for (name, value) in fields.iter() {
        buf.put_slice(wire::canonical_name(name).as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(CRLF);
    }
    buf.put_slice(CRLF);

    buf
}
