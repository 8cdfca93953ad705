//! The client-facing login flow: credentials → gate list → gate handover.

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_net::{Session, SessionHandler, TcpServer};
use agonyl_protocol::messages::{C2SLogin, C2SServerSelect, Ls2ClSay, Ls2GateLogin, S2CGateInfo, S2CServerList};
use agonyl_protocol::{head, strings, FrameDecoder};
use agonyl_store::{AccountRepo, AccountStatus, CacheService};
use bytes::BytesMut;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::config::Config;

pub(crate) struct LoginServer {
    pub(crate) server: Arc<TcpServer<FrameDecoder>>,
    accounts: AccountRepo,
    cache: CacheService,
    broker: Arc<Broker>,
    test_mode: bool,
    auto_create_account: bool,
}

impl LoginServer {
    pub(crate) fn new(
        addr: SocketAddr,
        cfg: &Config,
        accounts: AccountRepo,
        cache: CacheService,
        broker: Arc<Broker>,
    ) -> Arc<Self> {
        Arc::new(Self {
            server: TcpServer::new("login-server", addr),
            accounts,
            cache,
            broker,
            test_mode: cfg.test_mode,
            auto_create_account: cfg.auto_create_account,
        })
    }

    pub(crate) async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        let shared = Arc::clone(self);
        self.server
            .run(move |session| ClientSession {
                shared: Arc::clone(&shared),
                session,
                authed: None,
            })
            .await
    }

    pub(crate) fn stop(&self) {
        self.server.stop();
    }
}

/// Set once the credentials round-trip succeeds; a connection authenticates
/// at most once.
struct Authed {
    pc_id: u32,
    username: String,
}

struct ClientSession {
    shared: Arc<LoginServer>,
    session: Arc<Session>,
    authed: Option<Authed>,
}

#[async_trait::async_trait]
impl SessionHandler for ClientSession {
    async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()> {
        if head::frame_ctrl(&frame) != 0x01 {
            return Ok(());
        }

        match head::frame_cmd(&frame) {
            0xE0 => self.handle_credentials(&frame).await,
            0xE1 => self.handle_server_select(&frame).await,
            _ => {}
        }

        Ok(())
    }

    async fn on_close(&mut self) {
        let Some(authed) = self.authed.take() else {
            return;
        };

        if let Err(e) = self
            .shared
            .cache
            .remove_logged_in_user(&authed.username)
            .await
        {
            warn!(username = %authed.username, "failed to revoke login ticket: {e}");
        }
    }
}

impl ClientSession {
    fn say(&self, words: &str) {
        if let Err(e) = self.session.send(Ls2ClSay::new(words).to_frame()) {
            warn!(session = self.session.id(), "failed to send notice: {e}");
        }
    }

    async fn handle_credentials(&mut self, frame: &[u8]) {
        if self.authed.is_some() {
            return;
        }

        let msg = match C2SLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session = self.session.id(), "malformed login packet: {e:#}");
                self.say(strings::INVALID_CREDENTIALS);
                return;
            }
        };

        let username = msg.username.to_str_trimmed();
        let password = msg.password.to_str_trimmed();

        if self.shared.broker.gate_count() == 0 {
            self.say(strings::SERVER_UNDER_MAINTENANCE);
            return;
        }

        let lookup = if self.shared.test_mode && self.shared.auto_create_account {
            self.shared.accounts.get_or_create(&username, &password).await
        } else {
            self.shared.accounts.get_by_username(&username).await
        };

        let account = match lookup {
            Ok(account) => account,
            Err(e) => {
                if !e.is_not_found() {
                    warn!(%username, "account lookup failed: {e}");
                }

                self.say(strings::INVALID_CREDENTIALS);
                return;
            }
        };

        if !self.shared.test_mode {
            if !account.verify_password(&password) {
                self.say(strings::INVALID_CREDENTIALS);
                return;
            }

            match account.status() {
                AccountStatus::Banned => {
                    self.say(strings::ACCOUNT_BANNED);
                    return;
                }
                AccountStatus::Active => {}
                _ => {
                    self.say(strings::ACCOUNT_NOT_ACTIVE);
                    return;
                }
            }
        }

        let ticketed = match self.shared.cache.is_logged_in(&username).await {
            Ok(ticketed) => ticketed,
            Err(e) => {
                warn!(%username, "ticket lookup failed: {e}");
                self.say(strings::LOGIN_FAILED);
                return;
            }
        };

        if account.is_online || ticketed {
            self.say(strings::ALREADY_LOGGED_IN_NOTICE);
            return;
        }

        let pc_id = account.pc_id();
        if let Err(e) = self.shared.cache.add_logged_in_user(&username, pc_id).await {
            warn!(%username, "failed to write login ticket: {e}");
            self.say(strings::LOGIN_FAILED);
            return;
        }

        let list = S2CServerList::new(pc_id, self.shared.broker.gate_list());
        if let Err(e) = self.session.send(list.to_frame()) {
            warn!(session = self.session.id(), "failed to send server list: {e}");
            return;
        }

        info!(%username, pc_id, "client authenticated");
        self.authed = Some(Authed { pc_id, username });
    }

    async fn handle_server_select(&mut self, frame: &[u8]) {
        let Some(authed) = &self.authed else {
            return;
        };

        let msg = match C2SServerSelect::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session = self.session.id(), "malformed server select: {e:#}");
                return;
            }
        };

        let Some((gate_session, gate_ip, gate_port)) = self.shared.broker.find_gate(msg.server_id)
        else {
            warn!(server_id = msg.server_id, "selected gate is gone");
            self.say(strings::SERVER_UNDER_MAINTENANCE);
            return;
        };

        let preauth = Ls2GateLogin::new(&authed.username, authed.pc_id);
        if let Err(e) = gate_session.send(preauth.to_frame()) {
            warn!(server_id = msg.server_id, "failed to pre-authorize gate: {e}");
            self.say(strings::LOGIN_FAILED);
            return;
        }

        let info = S2CGateInfo::new(authed.pc_id, &gate_ip, gate_port);
        if let Err(e) = self.session.send(info.to_frame()) {
            warn!(session = self.session.id(), "failed to send gate info: {e}");
        }
    }
}
