use tracing_subscriber::EnvFilter;

mod game;
mod protocol;
mod server;
mod session;

use server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    let server = Server::bind(&config).await?;
    server.run().await
}
