mod config;
mod main_link;
mod players;
mod server;
mod starter;

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_data::ItemCatalog;
use agonyl_net::PeerClient;
use agonyl_store::{PgBatchSource, SerialAllocator};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::main_link::MainLinkHandler;
use crate::server::AccountServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(server_id = cfg.server_id, "starting account server");

    let pool = agonyl_store::connect(&cfg.database_url).await?;
    let characters = agonyl_store::CharacterRepo::new(pool.clone());

    let cache = agonyl_store::CacheService::connect(
        &cfg.cache_server_addr,
        &cfg.cache_server_password,
        cfg.cache_tls_enabled,
    )
    .await?;
    cache.ping().await?;

    let serials = Arc::new(SerialAllocator::new(
        format!("account-server-{}", cfg.server_id),
        cache,
        PgBatchSource::new(pool),
    ));

    let catalog = Arc::new(ItemCatalog::load_dir(&cfg.item_data_path)?);

    let main_link = PeerClient::new("main server", cfg.main_server_addr());

    let listen_addr: SocketAddr = cfg.listen_addr().parse()?;
    let server = AccountServer::new(
        listen_addr,
        characters,
        serials,
        catalog,
        Arc::clone(&main_link),
    );

    tokio::spawn(
        Arc::clone(&main_link).run(MainLinkHandler::new(
            cfg.server_id,
            Arc::clone(&server.players),
        )),
    );

    let server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down account server");

    server.stop();
    main_link.stop();
    let _ = server_task.await?;
    Ok(())
}
