mod config;
mod login_link;
mod player;
mod routing;
mod server;
mod zone_link;

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::PeerClient;
use agonyl_protocol::Dyn562;
use clap::Parser;
use dashmap::DashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::login_link::LoginLinkHandler;
use crate::server::GateServer;
use crate::zone_link::ZoneLinks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(server_id = cfg.server_id, name = %cfg.server_name, "starting gate server");

    let pool = agonyl_store::connect(&cfg.database_url).await?;
    let accounts = agonyl_store::AccountRepo::new(pool);

    let crypto = Dyn562::new(cfg.dynamic_key);
    let preauth = Arc::new(DashMap::new());

    let login_link = PeerClient::new("login server", cfg.login_server_addr());
    tokio::spawn(
        Arc::clone(&login_link).run(LoginLinkHandler::new(&cfg, Arc::clone(&preauth))),
    );

    let zones = Arc::new(ZoneLinks::new(&cfg));

    let listen_addr: SocketAddr = cfg.listen_addr().parse()?;
    let gate = GateServer::new(listen_addr, accounts, preauth, Arc::clone(&login_link), Arc::clone(&zones), crypto);

    zones.start(&cfg, Arc::clone(&gate.players), crypto);

    let server_task = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down gate server");

    gate.stop();
    zones.stop();
    login_link.stop();
    let _ = server_task.await?;
    Ok(())
}
