use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::http::parser::{ParseError, parse_from_stream};
use crate::http::request::Request;
use crate::http::response::{StatusCode, write_error_response};
use crate::http::writer::ResponseWriter;

/// Routing logic invoked once per parsed request.
///
/// The handler owns the whole response: it must drive `writer` through the
/// status line, headers and body itself.
pub trait Handler: Send + Sync + 'static {
    fn handle<W>(
        &self,
        request: &Request,
        writer: &mut ResponseWriter<W>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

/// Serves a single request on one accepted stream, then closes it.
///
/// Reading the request is bounded by `read_timeout`. Everything after that,
/// from the handler's first write to the final shutdown, is bounded by
/// `write_timeout`.
pub struct Connection<S, H> {
    stream: S,
    handler: Arc<H>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: Handler,
{
    pub fn new(
        stream: S,
        handler: Arc<H>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            handler,
            read_timeout,
            write_timeout,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let request = match self.read_request().await {
            Ok(request) => request,
            Err(e) => {
                self.reject(&e).await;
                return Err(e);
            }
        };

        tracing::debug!(
            method = %request.method(),
            target = %request.target(),
            "Request parsed"
        );

        let deadline = self.write_timeout;
        let exchange = async {
            let mut writer = ResponseWriter::new(&mut self.stream);
            self.handler
                .handle(&request, &mut writer)
                .await
                .context("Handler failed")?;

            self.stream.shutdown().await?;
            anyhow::Ok(())
        };

        timeout(deadline, exchange)
            .await
            .context("Timed out writing response")?
    }

    /// Reads one complete request, bounded by the read deadline.
    pub async fn read_request(&mut self) -> anyhow::Result<Request> {
        let request = timeout(self.read_timeout, parse_from_stream(&mut self.stream))
            .await
            .context("Timed out reading request")?
            .context("HTTP parse error")?;
        Ok(request)
    }

    /// Answers a malformed request with `400 Bad Request`. Timeouts and
    /// transport failures get no response.
    async fn reject(&mut self, error: &anyhow::Error) {
        let Some(parse_error) = error.downcast_ref::<ParseError>() else {
            return;
        };
        if matches!(parse_error, ParseError::Io(_) | ParseError::Incomplete) {
            return;
        }

        let message = parse_error.to_string();
        let deadline = self.write_timeout;
        let answer = async {
            write_error_response(&mut self.stream, StatusCode::BAD_REQUEST, &message).await?;
            self.stream.shutdown().await?;
            anyhow::Ok(())
        };

        match timeout(deadline, answer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Failed to send 400 response"),
            Err(_) => tracing::debug!("Timed out sending 400 response"),
        }
    }
}
