//! HTTP/1.1 protocol implementation on top of raw byte streams.
//!
//! # Architecture
//!
//! - **`wire`**: constants and helpers shared by both directions (CRLF framing,
//!   version string, token bytes)
//! - **`headers`**: case-insensitive header table and header-block parser
//! - **`request`**: the incremental request state machine
//! - **`parser`**: drives the request state machine from an async byte source
//! - **`writer`**: the ordered response writer, including chunked bodies and
//!   trailers
//! - **`response`**: status codes, in-memory responses and one-shot helpers
//! - **`connection`**: serves one accepted connection through a [`Handler`]
//! - **`mime`**: content types by file extension
//!
//! # Request State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Pending   │ ← Wait for "<method> <target> HTTP/1.1\r\n"
//!        └──────┬──────┘
//!               │ Request line parsed
//!               ▼
//!        ┌──────────────────┐
//!        │  ParsingHeaders  │ ← Wait for the blank line
//!        └──────┬───────────┘
//!               │ Header block parsed
//!               ▼
//!        ┌──────────────────┐
//!        │   ParsingBody    │ ← Collect Content-Length bytes
//!        └──────┬───────────┘
//!               │ Body complete (or no Content-Length)
//!               ▼
//!        ┌──────────────────┐
//!        │       Done       │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wirehttp::http::parser::parse_from_stream;
//! use wirehttp::http::response::{default_headers, StatusCode};
//! use wirehttp::http::writer::ResponseWriter;
//!
//! let request = parse_from_stream(&mut socket).await?;
//!
//! let body = format!("you asked for {}\n", request.target());
//! let mut writer = ResponseWriter::new(&mut socket);
//! writer.write_status_line(StatusCode::OK).await?;
//! writer.write_headers(&default_headers(body.len())).await?;
//! writer.write_body(body.as_bytes()).await?;
//! ```
//!
//! [`Handler`]: connection::Handler

pub mod wire;
pub mod headers;
pub mod request;
pub mod parser;
pub mod response;
pub mod writer;
pub mod connection;
pub mod mime;
