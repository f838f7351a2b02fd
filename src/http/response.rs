use std::fmt;

use tokio::io::AsyncWrite;

use crate::http::headers::Headers;
use crate::http::wire;
use crate::http::writer::{ResponseWriter, WriteError};

/// HTTP status code.
///
/// Any numeric code can be represented; codes outside the known table get
/// the generic reason phrase `"Status"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 200 OK
    pub const OK: StatusCode = StatusCode(200);
    /// 201 Created
    pub const CREATED: StatusCode = StatusCode(201);
    /// 204 No Content
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    /// 400 Bad Request
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// 404 Not Found
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// 405 Method Not Allowed
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    /// 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    /// 502 Bad Gateway
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    /// 503 Service Unavailable
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    /// 504 Gateway Timeout
    pub const GATEWAY_TIMEOUT: StatusCode = StatusCode(504);

    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use wirehttp::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::from(999).as_u16(), 999);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard reason phrase, or `"Status"` for codes not in the
    /// table.
    ///
    /// # Example
    ///
    /// ```
    /// # use wirehttp::http::response::StatusCode;
    /// assert_eq!(StatusCode::NOT_FOUND.reason_phrase(), "Not Found");
    /// assert_eq!(StatusCode::from(999).reason_phrase(), "Status");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            411 => "Length Required",
            413 => "Content Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Status",
        }
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// Headers for a plain, fixed-length response on a connection that closes
/// afterwards.
pub fn default_headers(content_length: usize) -> Headers {
    let mut h = Headers::new();
    h.set("Content-Length", content_length.to_string());
    h.set("Connection", "close");
    h.set("Content-Type", "text/plain");
    h
}

/// A complete fixed-length response held in memory.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: Headers,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    explicit_length: bool,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: default_headers(0),
            body: Vec::new(),
            explicit_length: false,
        }
    }

    /// Sets a header, replacing any earlier value.
    pub fn header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        if key.as_ref().eq_ignore_ascii_case("content-length") {
            self.explicit_length = true;
        }
        self.headers.set(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    ///
    /// `Content-Length` follows the body unless a header call set it
    /// explicitly.
    pub fn build(mut self) -> Response {
        if !self.explicit_length {
            self.headers
                .set("Content-Length", self.body.len().to_string());
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::OK).body(body).build()
    }

    pub fn bad_request(message: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::BAD_REQUEST)
            .body(message)
            .build()
    }

    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NOT_FOUND)
            .body(b"Not Found".to_vec())
            .build()
    }

    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .body(b"Internal Server Error".to_vec())
            .build()
    }

    /// Writes status line, headers and body through `writer`.
    pub async fn send<W>(&self, writer: &mut ResponseWriter<W>) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_status_line(self.status).await?;
        writer.write_headers(&self.headers).await?;
        writer.write_body(&self.body).await?;
        Ok(())
    }
}

/// Writes a complete fixed-length response. An empty `content_type` means
/// `text/plain`.
pub async fn write_simple_response<W>(
    sink: W,
    status: StatusCode,
    content_type: &str,
    body: impl Into<Vec<u8>>,
) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    let content_type = if content_type.is_empty() {
        "text/plain"
    } else {
        content_type
    };

    let response = ResponseBuilder::new(status)
        .header("Content-Type", content_type)
        .body(body)
        .build();

    let mut writer = ResponseWriter::new(sink);
    response.send(&mut writer).await
}

pub async fn write_error_response<W>(
    sink: W,
    status: StatusCode,
    message: &str,
) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    write_simple_response(sink, status, "text/plain", message).await
}

pub async fn write_json_response<W>(
    sink: W,
    status: StatusCode,
    json: &str,
) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    write_simple_response(sink, status, "application/json", json).await
}

/// Writes a complete chunked response: one chunk per element of `chunks`,
/// then the terminating chunk and, when given, the trailers.
pub async fn write_chunked_response<W, C>(
    sink: W,
    status: StatusCode,
    content_type: &str,
    chunks: &[C],
    trailers: Option<&Headers>,
) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
    C: AsRef<[u8]>,
{
    let mut headers = Headers::new();
    headers.set("Transfer-Encoding", "chunked");
    headers.set("Connection", "close");
    if !content_type.is_empty() {
        headers.set("Content-Type", content_type);
    }
    if let Some(trailers) = trailers {
        let names: Vec<String> = trailers
            .iter()
            .map(|(name, _)| wire::canonical_name(name))
            .collect();
        headers.set("Trailer", names.join(", "));
    }

    let mut writer = ResponseWriter::new(sink);
    writer.write_status_line(status).await?;
    writer.write_headers(&headers).await?;
    for chunk in chunks {
        writer.write_chunk(chunk.as_ref()).await?;
    }
    writer.write_chunked_body_done().await?;
    if let Some(trailers) = trailers {
        writer.write_trailers(trailers).await?;
    }

    Ok(())
}
