//! End-to-end tests over a real socket.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;
use wirehttp::config::{ServerConfig, StaticFilesConfig};
use wirehttp::http::connection::{Connection, Handler};
use wirehttp::http::request::Request;
use wirehttp::http::response::Response;
use wirehttp::http::writer::ResponseWriter;
use wirehttp::proxy::ProxyHandler;
use wirehttp::routes::static_files::StaticFiles;
use wirehttp::routes::{GREETING, Router};
use wirehttp::server::{Server, ServerState};

fn server_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        read_timeout_secs: 2,
        write_timeout_secs: 2,
    }
}

fn asset_root(test: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("wirehttp-{}-{}", test, std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

fn router(root: PathBuf) -> Router {
    let static_files = StaticFiles::new(&StaticFilesConfig {
        root,
        video: PathBuf::from("clip.mp4"),
    });
    let proxy = ProxyHandler::new(
        Url::parse("http://127.0.0.1:9").unwrap(),
        "/httpbin",
        Duration::from_secs(1),
        Duration::from_secs(1),
    );
    Router::new(static_files, proxy)
}

async fn roundtrip(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

struct Echo;

impl Handler for Echo {
    async fn handle<W>(&self, request: &Request, writer: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if request.target() == "/panic" {
            panic!("handler blew up");
        }
        Response::ok(request.body.clone()).send(writer).await?;
        Ok(())
    }
}

const FLOOD_LEN: usize = 32 * 1024 * 1024;

/// Answers every request with a body far larger than any socket buffer.
struct Flood;

impl Handler for Flood {
    async fn handle<W>(&self, _request: &Request, writer: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        Response::ok(vec![b'x'; FLOOD_LEN]).send(writer).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_root_greeting() {
    let server = Server::serve(&server_config(), router(asset_root("root")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Connection: close\r\n"));
    assert!(out.ends_with(GREETING));
}

#[tokio::test]
async fn test_request_without_headers() {
    let server = Server::serve(&server_config(), router(asset_root("bare")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET / HTTP/1.1\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = Server::serve(&server_config(), router(asset_root("missing")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET /nope HTTP/1.1\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(out.ends_with("Not Found"));
}

#[tokio::test]
async fn test_malformed_request_gets_bad_request() {
    let server = Server::serve(&server_config(), router(asset_root("malformed")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET / HTTP/2.0\r\n").await;

    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_invalid_header_gets_bad_request() {
    let server = Server::serve(&server_config(), router(asset_root("badheader")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET / HTTP/1.1\r\nHost : a\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_serves_asset_with_content_type() {
    let root = asset_root("assets");
    std::fs::write(root.join("hello.txt"), "hi there").unwrap();
    let server = Server::serve(&server_config(), router(root)).await.unwrap();

    let out = roundtrip(server.local_addr(), b"GET /assets/hello.txt HTTP/1.1\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Content-Type: text/plain\r\n"));
    assert!(out.contains("Content-Length: 8\r\n"));
    assert!(out.ends_with("hi there"));
}

#[tokio::test]
async fn test_asset_traversal_is_refused() {
    let server = Server::serve(&server_config(), router(asset_root("traversal")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET /assets/../secret HTTP/1.1\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[tokio::test]
async fn test_missing_video_is_server_error() {
    let server = Server::serve(&server_config(), router(asset_root("novideo")))
        .await
        .unwrap();

    let out = roundtrip(server.local_addr(), b"GET /video HTTP/1.1\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(out.ends_with("Video not found"));
}

#[tokio::test]
async fn test_video_served_as_mp4() {
    let root = asset_root("video");
    std::fs::write(root.join("clip.mp4"), b"\x00\x00\x00\x18ftyp").unwrap();
    let server = Server::serve(&server_config(), router(root)).await.unwrap();

    let out = roundtrip(server.local_addr(), b"GET /video HTTP/1.1\r\n\r\n").await;

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Content-Type: video/mp4\r\n"));
}

#[tokio::test]
async fn test_body_reaches_handler() {
    let server = Server::serve(&server_config(), Echo).await.unwrap();

    let out = roundtrip(
        server.local_addr(),
        b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
    )
    .await;

    assert!(out.ends_with("\r\n\r\nhello"));
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_server() {
    let server = Server::serve(&server_config(), Echo).await.unwrap();

    let out = roundtrip(server.local_addr(), b"GET /panic HTTP/1.1\r\n\r\n").await;
    assert!(out.is_empty());

    let out = roundtrip(server.local_addr(), b"GET /ok HTTP/1.1\r\n\r\n").await;
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[tokio::test]
async fn test_close_twice_fails() {
    let mut server = Server::serve(&server_config(), Echo).await.unwrap();
    assert_eq!(server.state(), ServerState::Open);

    server.close().unwrap();
    assert_eq!(server.state(), ServerState::Closed);

    assert!(server.close().is_err());
}

#[tokio::test]
async fn test_closed_server_refuses_connections() {
    let mut server = Server::serve(&server_config(), Echo).await.unwrap();
    let addr = server.local_addr();

    server.close().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_peer_that_never_reads_hits_write_deadline() {
    let (mut client, server_side) = tokio::io::duplex(64);
    client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let mut conn = Connection::new(
        server_side,
        Arc::new(Flood),
        Duration::from_secs(1),
        Duration::from_millis(100),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), conn.run())
        .await
        .expect("connection should give up on its own");

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("Timed out writing response"));
    drop(client);
}

#[tokio::test]
async fn test_stalled_client_is_dropped_over_tcp() {
    let cfg = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        read_timeout_secs: 1,
        write_timeout_secs: 1,
    };
    let server = Server::serve(&cfg, Flood).await.unwrap();

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let mut out = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("server should have closed the connection");

    // The response was cut short; a reset is also an acceptable ending.
    if read.is_ok() {
        assert!(out.len() < FLOOD_LEN);
    }
}
