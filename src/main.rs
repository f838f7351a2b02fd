use wirehttp::config::Config;
use wirehttp::routes::Router;
use wirehttp::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let router = Router::from_config(&cfg)?;

    let mut server = Server::serve(&cfg.server, router).await?;
    tracing::info!("Server started on {}", server.local_addr());

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        res = terminate() => res?,
    }
    tracing::info!("Shutdown signal received");

    server.close()?;
    tracing::info!("Server gracefully stopped");

    Ok(())
}

#[cfg(unix)]
async fn terminate() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> std::io::Result<()> {
    std::future::pending().await
}
