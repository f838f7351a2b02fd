//! Accepts TCP connections and prints each parsed request.

use tokio::net::TcpListener;
use wirehttp::config::Config;
use wirehttp::http::parser::parse_from_stream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    tracing::info!("Listening on {}", cfg.server.listen_addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        tracing::info!("Accepted connection from {}", peer);

        let request = match parse_from_stream(&mut socket).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Failed to parse request from {}: {}", peer, e);
                continue;
            }
        };

        println!("Request line:");
        println!("- Method: {}", request.method());
        println!("- Target: {}", request.target());
        println!("- Version: {}", request.version());
        println!("Headers:");
        for (name, value) in request.headers.iter() {
            println!("- {}: {}", name, value);
        }
        println!("Body:");
        println!("{}", String::from_utf8_lossy(&request.body));
    }
}
