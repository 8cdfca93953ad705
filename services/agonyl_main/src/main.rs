mod config;
mod server;
mod world;

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::server::MainServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("starting main server");

    let pool = agonyl_store::connect(&cfg.database_url).await?;
    let characters = agonyl_store::CharacterRepo::new(pool);

    let listen_addr: SocketAddr = cfg.listen_addr().parse()?;
    let server = MainServer::new(listen_addr, characters);

    let server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down main server");

    server.stop();
    let _ = server_task.await?;
    Ok(())
}
