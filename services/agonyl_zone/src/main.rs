mod config;
mod main_link;
mod manager;
mod player;
mod server;
mod zone;

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::PeerClient;
use clap::Parser;
use dashmap::DashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::main_link::MainLinkHandler;
use crate::manager::ZoneManager;
use crate::server::ZoneServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(server_id = cfg.server_id, maps = ?cfg.maps.0, "starting zone server");

    let pool = agonyl_store::connect(&cfg.database_url).await?;
    let characters = agonyl_store::CharacterRepo::new(pool);

    let players = Arc::new(DashMap::new());
    let manager = ZoneManager::start(&cfg, Arc::clone(&players))?;

    let main_link = PeerClient::new("main server", cfg.main_server_addr());
    tokio::spawn(Arc::clone(&main_link).run(MainLinkHandler::new(
        cfg.server_id,
        Arc::clone(&players),
        Arc::clone(&manager),
        characters,
    )));

    let listen_addr: SocketAddr = cfg.listen_addr().parse()?;
    let server = ZoneServer::new(
        listen_addr,
        format!("zone-server-{}", cfg.server_id),
        players,
        Arc::clone(&main_link),
    );

    let server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down zone server");

    server.stop();
    main_link.stop();
    manager.stop().await;
    let _ = server_task.await?;
    Ok(())
}
