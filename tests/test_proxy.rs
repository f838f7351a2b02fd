//! Tests for proxy upstream request handling

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;
use wirehttp::config::ProxyConfig;
use wirehttp::http::headers::Headers;
use wirehttp::http::parser::parse_http_request;
use wirehttp::http::request::Request;
use wirehttp::http::response::StatusCode;
use wirehttp::http::writer::ResponseWriter;
use wirehttp::proxy::upstream::{parse_response_head, parse_status_line, relay_headers};
use wirehttp::proxy::ProxyHandler;

fn handler(upstream: &str) -> ProxyHandler {
    ProxyHandler::new(
        Url::parse(upstream).unwrap(),
        "/httpbin",
        Duration::from_secs(5),
        Duration::from_secs(30),
    )
}

fn request(raw: &[u8]) -> Request {
    parse_http_request(raw).unwrap().0
}

/// Serves `response` to the first connection and returns the upstream URL.
async fn fake_upstream(response: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket.write_all(response).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{}", addr)
}

#[test]
fn test_build_http_request() {
    let handler = handler("http://localhost:3000");
    let request = request(b"GET /httpbin/api/users HTTP/1.1\r\nHost: example.com\r\nUser-Agent: Test\r\n\r\n");

    let request_bytes = handler.build_http_request(&request);
    let request_str = String::from_utf8_lossy(&request_bytes);

    assert!(request_str.starts_with("GET /api/users HTTP/1.0\r\n"));
    assert!(request_str.contains("Host: localhost:3000\r\n"));
    assert!(request_str.contains("User-Agent: Test\r\n"));
    assert!(request_str.contains("Connection: close\r\n"));
    assert!(request_str.ends_with("\r\n\r\n"));
}

#[test]
fn test_build_http_request_default_port_host() {
    let handler = handler("http://backend.internal");
    let request = request(b"GET /httpbin/get HTTP/1.1\r\n\r\n");

    let request_str = String::from_utf8(handler.build_http_request(&request)).unwrap();

    assert!(request_str.contains("Host: backend.internal\r\n"));
}

#[test]
fn test_build_http_request_removes_hop_by_hop_headers() {
    let handler = handler("http://localhost:3000");
    let request = request(
        b"GET /httpbin/x HTTP/1.1\r\nConnection: keep-alive\r\nKeep-Alive: timeout=5\r\nUpgrade: websocket\r\nX-Custom: kept\r\n\r\n",
    );

    let request_str = String::from_utf8(handler.build_http_request(&request)).unwrap();

    assert!(!request_str.contains("keep-alive"));
    assert!(!request_str.contains("Keep-Alive"));
    assert!(!request_str.contains("Upgrade"));
    assert!(request_str.contains("X-Custom: kept\r\n"));
}

#[test]
fn test_build_http_request_carries_body() {
    let handler = handler("http://localhost:3000");
    let request = request(b"POST /httpbin/post HTTP/1.1\r\nContent-Length: 4\r\n\r\nping");

    let request_str = String::from_utf8(handler.build_http_request(&request)).unwrap();

    assert!(request_str.starts_with("POST /post HTTP/1.0\r\n"));
    assert!(request_str.contains("Content-Length: 4\r\n"));
    assert!(request_str.ends_with("\r\n\r\nping"));
}

#[test]
fn test_prefix_matching() {
    let handler = handler("http://localhost:3000");

    assert!(handler.matches("/httpbin/get"));
    assert!(handler.matches("/httpbin/"));
    assert!(!handler.matches("/httpbin"));
    assert!(!handler.matches("/httpbinx/get"));
    assert!(!handler.matches("/other"));
}

#[test]
fn test_upstream_target() {
    let plain = handler("http://localhost:3000");
    assert_eq!(plain.upstream_target("/httpbin/stream/10?x=1"), "/stream/10?x=1");

    let nested = handler("http://localhost:3000/base/");
    assert_eq!(nested.upstream_target("/httpbin/get"), "/base/get");
}

#[test]
fn test_from_config_rejects_https() {
    let cfg = ProxyConfig {
        upstream: "https://httpbin.org".to_string(),
        ..ProxyConfig::default()
    };

    assert!(ProxyHandler::from_config(&cfg).is_err());
}

#[test]
fn test_from_config_strips_trailing_slash() {
    let cfg = ProxyConfig {
        prefix: "/api/".to_string(),
        ..ProxyConfig::default()
    };

    let handler = ProxyHandler::from_config(&cfg).unwrap();

    assert!(handler.matches("/api/get"));
}

#[test]
fn test_parse_status_line() {
    assert_eq!(parse_status_line(b"HTTP/1.1 200 OK").unwrap(), StatusCode::OK);
    assert_eq!(
        parse_status_line(b"HTTP/1.0 404 Not Found").unwrap(),
        StatusCode::NOT_FOUND
    );
    assert!(parse_status_line(b"SPDY/3 200 OK").is_err());
    assert!(parse_status_line(b"HTTP/1.1 abc OK").is_err());
}

#[test]
fn test_parse_response_head() {
    let head = parse_response_head(b"HTTP/1.1 201 Created\r\nContent-Length: 3\r\nX-Id: 7\r\n\r\n").unwrap();

    assert_eq!(head.status, StatusCode::CREATED);
    assert_eq!(head.headers.get("content-length"), Some("3"));
    assert_eq!(head.headers.get("x-id"), Some("7"));
}

#[test]
fn test_relay_headers() {
    let mut upstream = Headers::new();
    upstream.set("Content-Length", "11");
    upstream.set("Content-Type", "application/json");
    upstream.set("Connection", "keep-alive");

    let relayed = relay_headers(&upstream);

    assert_eq!(relayed.get("content-length"), None);
    assert_eq!(relayed.get("content-type"), Some("application/json"));
    assert_eq!(relayed.get("transfer-encoding"), Some("chunked"));
    assert_eq!(relayed.get("connection"), Some("close"));
    assert_eq!(
        relayed.get("trailer"),
        Some("X-Content-Sha256, X-Content-Length")
    );
}

#[tokio::test]
async fn test_forward_relays_body_with_trailers() {
    let upstream = fake_upstream(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 11\r\n\r\nhello world",
    )
    .await;
    let handler = handler(&upstream);
    let request = request(b"GET /httpbin/get HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let mut writer = ResponseWriter::new(Vec::new());

    handler.forward(&request, &mut writer).await.unwrap();

    let out = String::from_utf8(writer.into_inner()).unwrap();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Transfer-Encoding: chunked\r\n"));
    assert!(out.contains("Content-Type: text/plain\r\n"));
    let (head, _) = out.split_once("\r\n\r\n").unwrap();
    assert!(!head.to_ascii_lowercase().contains("\r\ncontent-length:"));
    assert!(out.contains("\r\nTrailer: X-Content-Sha256, X-Content-Length\r\n"));
    assert!(out.ends_with(
        "0\r\n\r\n\
         X-Content-Sha256: b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9\r\n\
         X-Content-Length: 11\r\n\
         \r\n"
    ));
}

#[tokio::test]
async fn test_forward_body_delimited_by_close() {
    let upstream = fake_upstream(b"HTTP/1.0 200 OK\r\n\r\nabc").await;
    let handler = handler(&upstream);
    let request = request(b"GET /httpbin/get HTTP/1.1\r\n\r\n");
    let mut writer = ResponseWriter::new(Vec::new());

    handler.forward(&request, &mut writer).await.unwrap();

    let out = String::from_utf8(writer.into_inner()).unwrap();
    assert!(out.contains("3\r\nabc\r\n0\r\n\r\n"));
    assert!(out.contains("X-Content-Length: 3\r\n"));
}

#[tokio::test]
async fn test_forward_unreachable_upstream_is_bad_gateway() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let handler = handler(&format!("http://{}", addr));
    let request = request(b"GET /httpbin/get HTTP/1.1\r\n\r\n");
    let mut writer = ResponseWriter::new(Vec::new());

    handler.forward(&request, &mut writer).await.unwrap();

    let out = String::from_utf8(writer.into_inner()).unwrap();
    assert!(out.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
}

#[tokio::test]
async fn test_forward_silent_upstream_is_gateway_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let handler = ProxyHandler::new(
        Url::parse(&format!("http://{}", addr)).unwrap(),
        "/httpbin",
        Duration::from_secs(5),
        Duration::from_millis(200),
    );
    let request = request(b"GET /httpbin/get HTTP/1.1\r\n\r\n");
    let mut writer = ResponseWriter::new(Vec::new());

    handler.forward(&request, &mut writer).await.unwrap();

    let out = String::from_utf8(writer.into_inner()).unwrap();
    assert!(out.starts_with("HTTP/1.1 504 Gateway Timeout\r\n"));
}
