//! Upstream connection and request forwarding
//!
//! The upstream's answer is relayed to the client as a chunked body. The
//! body's SHA-256 digest and length are sent as trailers once it has been
//! fully relayed.

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::BytesMut;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use url::Url;

use crate::config::ProxyConfig;
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::{ResponseBuilder, StatusCode};
use crate::http::wire::{self, CRLF, HEADERS_END};
use crate::http::writer::ResponseWriter;

/// Default buffer size for streaming
const BUFFER_SIZE: usize = 8192;

/// Upper bound on the upstream status line plus header block
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Trailer carrying the hex SHA-256 of the relayed body
pub const SHA256_TRAILER: &str = "X-Content-SHA256";

/// Trailer carrying the relayed body length in bytes
pub const LENGTH_TRAILER: &str = "X-Content-Length";

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

/// Status line and headers read from the upstream.
#[derive(Debug)]
pub struct UpstreamHead {
    pub status: StatusCode,
    pub headers: Headers,
}

/// An upstream response whose body has not been read yet.
struct UpstreamResponse {
    head: UpstreamHead,
    stream: TcpStream,
    /// Body bytes that arrived together with the head
    leftover: BytesMut,
    /// Upstream `Content-Length`; `None` means the body ends when the
    /// upstream closes
    declared: Option<usize>,
}

/// Handles proxying requests to a single upstream server
pub struct ProxyHandler {
    upstream: Url,
    prefix: String,
    connection_timeout: Duration,
    request_timeout: Duration,
}

impl ProxyHandler {
    pub fn new(
        upstream: Url,
        prefix: impl Into<String>,
        connection_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            prefix: prefix.into(),
            connection_timeout,
            request_timeout,
        }
    }

    pub fn from_config(cfg: &ProxyConfig) -> Result<Self> {
        let upstream = Url::parse(&cfg.upstream)
            .with_context(|| format!("Invalid upstream URL {}", cfg.upstream))?;
        if upstream.scheme() != "http" {
            anyhow::bail!("Unsupported upstream scheme {}", upstream.scheme());
        }
        if upstream.host_str().is_none() {
            anyhow::bail!("Upstream URL {} has no host", cfg.upstream);
        }

        Ok(Self::new(
            upstream,
            cfg.prefix.trim_end_matches('/'),
            cfg.connect_timeout(),
            cfg.request_timeout(),
        ))
    }

    /// Whether `path` belongs to this proxy, i.e. lies under `<prefix>/`.
    pub fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Maps a client request target onto the upstream: the prefix is dropped
    /// and the upstream URL's own path is prepended.
    pub fn upstream_target(&self, target: &str) -> String {
        let rest = target.strip_prefix(self.prefix.as_str()).unwrap_or(target);
        let rest = if rest.is_empty() { "/" } else { rest };
        format!("{}{}", self.upstream.path().trim_end_matches('/'), rest)
    }

    /// Forwards `request` upstream and relays the answer through `writer`.
    ///
    /// Failures before anything was written become `502 Bad Gateway`, or
    /// `504 Gateway Timeout` when a deadline expired. Failures while relaying
    /// the body are returned; the response is then truncated.
    pub async fn forward<W>(&self, request: &Request, writer: &mut ResponseWriter<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        tracing::debug!(
            upstream = %self.upstream,
            method = %request.method(),
            target = %request.target(),
            "Forwarding request to upstream"
        );

        let upstream = match self.open(request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(upstream = %self.upstream, error = %e, "Upstream request failed");
                return self.handle_proxy_error(&e, writer).await;
            }
        };

        let status = upstream.head.status;
        let relayed = self.relay(upstream, writer).await?;

        tracing::info!(
            upstream = %self.upstream,
            status = status.as_u16(),
            bytes = relayed,
            target = %request.target(),
            "Request forwarded successfully"
        );
        Ok(())
    }

    /// Connects, sends the request and reads the response head.
    async fn open(&self, request: &Request) -> Result<UpstreamResponse> {
        let host = self
            .upstream
            .host_str()
            .context("Upstream URL missing host")?;
        let port = self.upstream.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host, port);

        let mut stream = timeout(self.connection_timeout, TcpStream::connect(&addr))
            .await
            .context("Connection timeout")?
            .with_context(|| format!("Failed to connect to {}", addr))?;

        tracing::trace!(%addr, "Connected to upstream");

        let bytes = self.build_http_request(request);
        let (head, leftover) = timeout(self.request_timeout, async {
            stream.write_all(&bytes).await?;
            stream.flush().await?;
            let head = read_response_head(&mut stream).await?;
            anyhow::Ok(head)
        })
        .await
        .context("Request timeout")??;

        let declared = match head.headers.get("content-length") {
            Some(raw) => Some(
                raw.parse::<usize>()
                    .with_context(|| format!("Invalid upstream Content-Length {:?}", raw))?,
            ),
            None => None,
        };

        Ok(UpstreamResponse {
            head,
            stream,
            leftover,
            declared,
        })
    }

    /// Streams the upstream body to the client as chunks and finishes with
    /// the digest trailers. Returns the number of body bytes relayed.
    async fn relay<W>(&self, upstream: UpstreamResponse, writer: &mut ResponseWriter<W>) -> Result<usize>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let UpstreamResponse {
            head,
            mut stream,
            mut leftover,
            declared,
        } = upstream;

        writer.write_status_line(head.status).await?;
        writer.write_headers(&relay_headers(&head.headers)).await?;

        let mut hasher = Sha256::new();
        let mut total = 0usize;
        let mut buf = vec![0u8; BUFFER_SIZE];

        loop {
            let piece: &[u8] = if !leftover.is_empty() {
                &leftover
            } else {
                if declared.is_some_and(|len| total >= len) {
                    break;
                }
                let n = timeout(self.request_timeout, stream.read(&mut buf))
                    .await
                    .context("Upstream read timeout")??;
                if n == 0 {
                    break;
                }
                &buf[..n]
            };

            let piece = match declared {
                Some(len) => &piece[..piece.len().min(len - total)],
                None => piece,
            };

            tracing::trace!(bytes = piece.len(), "Relaying upstream chunk");
            hasher.update(piece);
            writer.write_chunk(piece).await?;
            total += piece.len();
            leftover.clear();

            if declared.is_some_and(|len| total >= len) {
                break;
            }
        }

        if let Some(len) = declared {
            if total < len {
                anyhow::bail!("Upstream closed after {} of {} body bytes", total, len);
            }
        }

        writer.write_chunked_body_done().await?;

        let mut trailers = Headers::new();
        trailers.set(SHA256_TRAILER, format!("{:x}", hasher.finalize()));
        trailers.set(LENGTH_TRAILER, total.to_string());
        writer.write_trailers(&trailers).await?;

        Ok(total)
    }

    /// Build HTTP request bytes to send to the upstream
    ///
    /// The request goes out as HTTP/1.0 with `Connection: close`, so the
    /// upstream frames its body with `Content-Length` or by closing.
    pub fn build_http_request(&self, request: &Request) -> Vec<u8> {
        let mut buffer = Vec::new();

        let target = self.upstream_target(request.target());
        buffer.extend_from_slice(format!("{} {} HTTP/1.0\r\n", request.method(), target).as_bytes());

        let mut headers = request.headers.clone();

        if let Some(host) = self.upstream.host_str() {
            let host_value = match self.upstream.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            headers.set("Host", host_value);
        }

        for name in HOP_BY_HOP {
            headers.remove(name);
        }
        headers.set("Connection", "close");

        for (name, value) in headers.iter() {
            buffer.extend_from_slice(
                format!("{}: {}\r\n", wire::canonical_name(name), value).as_bytes(),
            );
        }
        buffer.extend_from_slice(CRLF);

        if !request.body.is_empty() {
            buffer.extend_from_slice(&request.body);
        }

        buffer
    }

    /// Answers with 504 for expired deadlines and 502 for everything else.
    async fn handle_proxy_error<W>(
        &self,
        error: &anyhow::Error,
        writer: &mut ResponseWriter<W>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let timed_out = error.chain().any(|cause| cause.is::<Elapsed>());

        let (status, message) = if timed_out {
            (
                StatusCode::GATEWAY_TIMEOUT,
                "The upstream server did not respond in time.",
            )
        } else {
            (
                StatusCode::BAD_GATEWAY,
                "Failed to get a response from the upstream server.",
            )
        };

        let response = ResponseBuilder::new(status)
            .body(message)
            .build();
        response.send(writer).await?;
        Ok(())
    }
}

/// Headers sent to the client: the upstream's own, minus framing and
/// hop-by-hop fields, switched to chunked encoding with digest trailers.
pub fn relay_headers(upstream: &Headers) -> Headers {
    let mut headers = upstream.clone();
    headers.remove("content-length");
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.set("Transfer-Encoding", "chunked");
    headers.set("Connection", "close");
    // Announced names must match how the trailer lines are written.
    headers.set(
        "Trailer",
        format!(
            "{}, {}",
            wire::canonical_name(SHA256_TRAILER),
            wire::canonical_name(LENGTH_TRAILER)
        ),
    );
    headers
}

/// Parses `HTTP/1.x <code> <reason>` into a status code.
pub fn parse_status_line(line: &[u8]) -> Result<StatusCode> {
    let line = std::str::from_utf8(line).context("Invalid UTF-8 in upstream status line")?;
    let mut parts = line.splitn(3, ' ');

    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        anyhow::bail!("Invalid status line: {}", line);
    }

    let code: u16 = parts
        .next()
        .context("Status line missing code")?
        .parse()
        .with_context(|| format!("Invalid status code in {:?}", line))?;

    Ok(StatusCode::from(code))
}

/// Reads until the end of the upstream header block. Returns the parsed head
/// and any body bytes that were read along with it.
async fn read_response_head(stream: &mut TcpStream) -> Result<(UpstreamHead, BytesMut)> {
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            anyhow::bail!("Connection closed before complete response head received");
        }

        if let Some(end) = wire::find(&buffer, HEADERS_END) {
            let head_bytes = buffer.split_to(end + HEADERS_END.len());
            let head = parse_response_head(&head_bytes)?;
            return Ok((head, buffer));
        }

        if buffer.len() > MAX_HEAD_SIZE {
            anyhow::bail!("Response headers too large");
        }
    }
}

/// Parses a complete response head (status line through the blank line).
pub fn parse_response_head(head: &[u8]) -> Result<UpstreamHead> {
    let line_end = wire::find(head, CRLF).context("Empty response")?;
    let status = parse_status_line(&head[..line_end])?;

    let mut headers = Headers::new();
    let (_, complete) = headers
        .parse(&head[line_end + CRLF.len()..])
        .context("Invalid upstream headers")?;
    if !complete {
        anyhow::bail!("Incomplete upstream header block");
    }

    Ok(UpstreamHead { status, headers })
}
