use crate::http::headers::Headers;
use crate::http::parser::ParseError;
use crate::http::wire::{self, CRLF, SUPPORTED_VERSION};

/// Progress of a [`Request`] through the incremental parser.
///
/// States only move forward; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    /// Waiting for the request line
    #[default]
    Pending,
    /// Request line parsed, reading the header block
    ParsingHeaders,
    /// Headers complete, accumulating the `Content-Length` body
    ParsingBody,
    /// Whole message received
    Done,
}

/// The first line of a request: `<method> <target> HTTP/<version>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    /// Request method token (e.g. "GET")
    pub method: String,
    /// Request target, kept exactly as sent (e.g. "/search?q=rust")
    pub target: String,
    /// Version without the `HTTP/` prefix; always "1.1" once parsed
    pub version: String,
}

/// Represents an HTTP request being read from a client.
///
/// A fresh request starts in [`ParseState::Pending`] and is filled in by
/// repeated calls to [`Request::parse`] as bytes arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Parsed request line
    pub line: RequestLine,
    /// Request headers, keyed by lower-case name
    pub headers: Headers,
    /// Request body; exactly `Content-Length` bytes once done
    pub body: Vec<u8>,
    state: ParseState,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    pub fn method(&self) -> &str {
        &self.line.method
    }

    pub fn target(&self) -> &str {
        &self.line.target
    }

    pub fn version(&self) -> &str {
        &self.line.version
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Consumes as much of `buf` as the current state allows.
    ///
    /// Returns the number of bytes consumed. Zero consumption without an
    /// error and without reaching [`ParseState::Done`] means more bytes are
    /// needed; the caller should keep the unconsumed tail, append to it, and
    /// call again. Once done, further calls return `Ok(0)` and leave the
    /// request untouched.
    pub fn parse(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut total = 0;

        while self.state != ParseState::Done {
            let n = self.parse_single(&buf[total..])?;
            total += n;
            if n == 0 {
                break;
            }
        }

        Ok(total)
    }

    fn parse_single(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParseState::Pending => {
                let Some((line, consumed)) = parse_request_line(buf)? else {
                    return Ok(0);
                };
                self.line = line;
                self.state = ParseState::ParsingHeaders;
                Ok(consumed)
            }
            ParseState::ParsingHeaders => {
                let (consumed, complete) = self.headers.parse(buf)?;
                if complete {
                    self.state = ParseState::ParsingBody;
                }
                Ok(consumed)
            }
            ParseState::ParsingBody => self.parse_body(buf),
            ParseState::Done => Ok(0),
        }
    }

    fn parse_body(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let Some(raw) = self.headers.get("content-length") else {
            // Anything left over belongs to the connection, not the body.
            self.state = ParseState::Done;
            return Ok(0);
        };

        let declared: usize = raw
            .parse()
            .map_err(|_| ParseError::InvalidContentLength(raw.to_string()))?;

        let received = self.body.len() + buf.len();
        if received > declared {
            return Err(ParseError::BodyTooLong { declared, received });
        }

        self.body.extend_from_slice(buf);
        if self.body.len() == declared {
            self.state = ParseState::Done;
        }

        Ok(buf.len())
    }
}

/// Parses the request line at the front of `buf`.
///
/// `Ok(None)` means no complete line is available yet.
fn parse_request_line(buf: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(end) = wire::find(buf, CRLF) else {
        return Ok(None);
    };

    let line = std::str::from_utf8(&buf[..end])
        .map_err(|_| ParseError::invalid_request_line("request line is not valid UTF-8"))?;

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(ParseError::invalid_request_line(format!(
            "expected 3 parts, got {}: {:?}",
            parts.len(),
            line
        )));
    };

    if method.is_empty() || !method.bytes().all(wire::is_token_byte) {
        return Err(ParseError::invalid_request_line(format!(
            "invalid method: {:?}",
            method
        )));
    }

    if target.is_empty() {
        return Err(ParseError::invalid_request_line("empty request target"));
    }

    let version = match version.split_once('/') {
        Some(("HTTP", v)) if !v.contains('/') => v,
        _ => {
            return Err(ParseError::invalid_request_line(format!(
                "malformed version: {:?}",
                version
            )));
        }
    };

    if version != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let request_line = RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    };

    Ok(Some((request_line, end + CRLF.len())))
}
