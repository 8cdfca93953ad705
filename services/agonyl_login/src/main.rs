mod broker;
mod config;
mod server;

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::broker::Broker;
use crate::config::Config;
use crate::server::LoginServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        test_mode = cfg.test_mode,
        auto_create_account = cfg.auto_create_account,
        "starting login server"
    );

    let pool = agonyl_store::connect(&cfg.database_url).await?;
    let accounts = agonyl_store::AccountRepo::new(pool);

    let cache = agonyl_store::CacheService::connect(
        &cfg.cache_server_addr,
        &cfg.cache_server_password,
        cfg.cache_tls_enabled,
    )
    .await?;
    cache.ping().await?;

    let broker_addr: SocketAddr = cfg.broker_addr().parse()?;
    let listen_addr: SocketAddr = cfg.listen_addr().parse()?;

    let broker = Broker::new(broker_addr, cache.clone());
    let server = LoginServer::new(listen_addr, &cfg, accounts, cache, broker.clone());

    let broker_task = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.run().await })
    };
    let server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down login server");

    server.stop();
    broker.stop();
    let _ = server_task.await?;
    let _ = broker_task.await?;
    Ok(())
}
