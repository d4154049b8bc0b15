use duolink::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), DuolinkError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        join_timeout_ms = config.room.join_timeout.as_millis() as u64,
        relay_interval_ms = config.relay_interval.as_millis() as u64,
        "starting duolink"
    );

    let server = DuolinkServer::builder().config(config).build().await?;
    server.run().await
}
