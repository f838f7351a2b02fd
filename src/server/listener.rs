use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::http::connection::{Connection, Handler};

/// Accepts connections forever, one task per connection.
///
/// Each connection is served by an inner task so that a panicking handler is
/// reported here instead of taking anything else down with it.
pub async fn run<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    read_timeout: Duration,
    write_timeout: Duration,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let task = tokio::spawn(async move {
                let mut conn = Connection::new(socket, handler, read_timeout, write_timeout);
                conn.run().await
            });

            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Connection error from {}: {:#}", peer, e),
                Err(e) if e.is_panic() => tracing::error!("Handler panicked for {}", peer),
                Err(e) => tracing::warn!("Connection task for {} cancelled: {}", peer, e),
            }
        });
    }
}
