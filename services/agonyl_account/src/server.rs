//! Gate-facing sessions. One gate multiplexes all of its players over a
//! single session here; the pcId in each frame head picks the player.

use std::net::SocketAddr;
use std::sync::Arc;

use agonyl_data::ItemCatalog;
use agonyl_net::{PeerClient, Session, SessionHandler, TcpServer};
use agonyl_protocol::messages::{
    C2SCharacterLogin, C2SCharacterLogout, C2SCreateCharacter, C2SDeleteCharacter,
    CharacterInfo, CharacterWear, Gate2AsNewClient, S2CAnsCreatePlayer, S2CAnsDeletePlayer,
    S2CCharacterList, S2CError, S2MCharacterLogin, S2MCharacterLogout,
};
use agonyl_protocol::{codes, head, strings, FrameDecoder, MsFrameDecoder};
use agonyl_store::{CharacterRepo, CharacterSummary, NewCharacter, SerialAllocator};
use bytes::BytesMut;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::players::{Player, Players};
use crate::starter;

pub(crate) struct AccountServer {
    pub(crate) server: Arc<TcpServer<FrameDecoder>>,
    pub(crate) players: Players,
    characters: CharacterRepo,
    serials: Arc<SerialAllocator>,
    catalog: Arc<ItemCatalog>,
    main_link: Arc<PeerClient<MsFrameDecoder>>,
}

impl AccountServer {
    pub(crate) fn new(
        addr: SocketAddr,
        characters: CharacterRepo,
        serials: Arc<SerialAllocator>,
        catalog: Arc<ItemCatalog>,
        main_link: Arc<PeerClient<MsFrameDecoder>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            server: TcpServer::new("account-server", addr),
            players: Arc::new(DashMap::new()),
            characters,
            serials,
            catalog,
            main_link,
        })
    }

    pub(crate) async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        let shared = Arc::clone(self);
        self.server
            .run(move |session| GateSession {
                shared: Arc::clone(&shared),
                session,
                agent_id: 0,
            })
            .await
    }

    pub(crate) fn stop(&self) {
        self.server.stop();
    }

    /// Builds one character-list slot, resolving wear slots through the
    /// item catalog.
    fn character_info(&self, summary: &CharacterSummary) -> CharacterInfo {
        let mut wear = [CharacterWear::default(); 10];
        for (slot, item) in wear.iter_mut().zip(summary.data.wear.iter()) {
            *slot = CharacterWear {
                item_ptr: 0,
                item_code: item.item_code,
                item_option: item.item_option,
                wear_index: u32::from(self.catalog.slot_index(item.item_code).unwrap_or(0)),
            };
        }

        CharacterInfo {
            name: summary.name.as_str().into(),
            last_used: 0,
            class: summary.class as u8,
            town: summary.data.social_info.nation,
            level: summary.level as u32,
            wear,
        }
    }
}

struct GateSession {
    shared: Arc<AccountServer>,
    session: Arc<Session>,
    agent_id: u8,
}

#[async_trait::async_trait]
impl SessionHandler for GateSession {
    async fn on_frame(&mut self, frame: BytesMut) -> anyhow::Result<()> {
        let ctrl = head::frame_ctrl(&frame);
        let cmd = head::frame_cmd(&frame);

        match (ctrl, cmd) {
            (0x01, 0xE0) => {
                if frame.len() > 10 {
                    self.agent_id = frame[10];
                    info!(agent_id = self.agent_id, "gate server connected");
                }
            }
            (0x01, 0xE1) => self.handle_new_client(&frame).await,
            (0x01, 0xE2) => self.handle_client_disconnect(&frame).await,
            (0x03, _) => self.handle_protocol(&frame).await,
            _ => {}
        }

        Ok(())
    }

    async fn on_close(&mut self) {
        info!(agent_id = self.agent_id, "gate server disconnected");
    }
}

impl GateSession {
    fn send_error(&self, pc_id: u32, code: u16, message: &str) {
        let error = S2CError::new(pc_id, code, message);
        if let Err(e) = self.session.send(error.to_frame()) {
            warn!(pc_id, "failed to send error frame: {e}");
        }
    }

    fn player(&self, pc_id: u32) -> Option<Arc<Player>> {
        self.shared.players.get(&pc_id).map(|p| Arc::clone(&p))
    }

    async fn handle_new_client(&self, frame: &[u8]) {
        let msg = match Gate2AsNewClient::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed new client frame: {e:#}");
                return;
            }
        };

        if msg.pc_id == 0 {
            warn!("rejecting new client with pcId 0");
            return;
        }

        let account = msg.account.to_str_trimmed();
        let player = Player::new(
            msg.pc_id,
            account.clone(),
            msg.client_ip.to_str(),
            Arc::clone(&self.session),
            self.agent_id,
        );
        self.shared.players.insert(msg.pc_id, player);

        info!(pc_id = msg.pc_id, %account, "client arrived");

        let characters = match self.shared.characters.list_for_account(msg.pc_id).await {
            Ok(characters) => characters,
            Err(e) => {
                warn!(pc_id = msg.pc_id, "failed to list characters: {e}");
                self.send_error(msg.pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
                return;
            }
        };

        let list = if characters.is_empty() {
            S2CCharacterList::empty(msg.pc_id)
        } else {
            let slots: Vec<CharacterInfo> = characters
                .iter()
                .map(|summary| self.shared.character_info(summary))
                .collect();
            S2CCharacterList::new(msg.pc_id, &slots)
        };

        if let Err(e) = self.session.send(list.to_frame()) {
            warn!(pc_id = msg.pc_id, "failed to send character list: {e}");
        }
    }

    async fn handle_client_disconnect(&self, frame: &[u8]) {
        let pc_id = head::frame_pc_id(frame);
        self.drop_player(pc_id).await;
    }

    async fn drop_player(&self, pc_id: u32) {
        let Some((_, player)) = self.shared.players.remove(&pc_id) else {
            return;
        };

        if let Some(character_name) = player.selected_character() {
            let logout = S2MCharacterLogout::new(pc_id, &character_name);
            match logout.to_frame() {
                Ok(frame) => {
                    if let Err(e) = self.shared.main_link.send(frame) {
                        warn!(pc_id, "failed to forward character logout: {e}");
                    }
                }
                Err(e) => warn!(pc_id, "failed to encode character logout: {e:#}"),
            }
        }

        info!(pc_id, account = %player.account, "client dropped");
    }

    async fn handle_protocol(&self, frame: &[u8]) {
        let Some(protocol) = head::frame_protocol(frame) else {
            return;
        };

        match protocol {
            codes::C2S_CHARACTER_LOGOUT => {
                match C2SCharacterLogout::from_frame(frame) {
                    Ok(msg) => self.drop_player(msg.pc_id).await,
                    Err(e) => warn!("malformed character logout: {e:#}"),
                }
            }
            codes::C2S_ASK_CREATE_PLAYER => self.handle_create(frame).await,
            codes::C2S_ASK_DELETE_PLAYER => self.handle_delete(frame).await,
            codes::C2S_CHARACTER_LOGIN => self.handle_character_login(frame).await,
            other => {
                warn!(protocol = format!("{other:#06x}"), "unhandled protocol");
            }
        }
    }

    async fn handle_create(&self, frame: &[u8]) {
        let msg = match C2SCreateCharacter::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed create request: {e:#}");
                return;
            }
        };

        let pc_id = msg.pc_id;
        if self.player(pc_id).is_none() {
            return;
        }

        let name = msg.name.to_str_trimmed();

        match self.shared.characters.name_taken(&name).await {
            Ok(true) => {
                self.send_error(
                    pc_id,
                    codes::error::DUPLICATE_CHARACTER,
                    strings::DUPLICATE_CHARACTER,
                );
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(pc_id, "duplicate check failed: {e}");
                self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
                return;
            }
        }

        // The character cap is enforced before any serial is burned.
        match self.shared.characters.count_active(pc_id).await {
            Ok(count) if count as usize >= strings::MAX_CHARACTERS_PER_ACCOUNT => {
                self.send_error(
                    pc_id,
                    codes::error::CHARACTER_NOT_FOUND,
                    strings::MAX_CHARACTERS_EXCEEDED,
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(pc_id, "character count failed: {e}");
                self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
                return;
            }
        }

        let serials = match self.shared.serials.next_serials(starter::STARTER_ITEM_COUNT).await {
            Ok(serials) => serials,
            Err(e) => {
                warn!(pc_id, "serial allocation failed: {e}");
                self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
                return;
            }
        };

        let Some(data) = starter::new_character_data(msg.class, msg.town, &serials) else {
            self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
            return;
        };

        let new = NewCharacter {
            account_id: pc_id,
            name: name.clone(),
            class: msg.class,
            data,
        };

        let character = match self.shared.characters.create(&new).await {
            Ok(character) => character,
            Err(e) if e.is_unique_violation() => {
                // A concurrent creation won the race for the name.
                self.send_error(
                    pc_id,
                    codes::error::DUPLICATE_CHARACTER,
                    strings::DUPLICATE_CHARACTER,
                );
                return;
            }
            Err(e) => {
                warn!(pc_id, "character insert failed: {e}");
                self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
                return;
            }
        };

        info!(pc_id, name = %character.name, class = msg.class, "character created");

        let mut wear = [CharacterWear::default(); 10];
        for (slot, item) in wear.iter_mut().zip(character.data.wear.iter()) {
            *slot = CharacterWear {
                item_ptr: 0,
                item_code: item.item_code,
                item_option: item.item_option,
                wear_index: u32::from(self.shared.catalog.slot_index(item.item_code).unwrap_or(0)),
            };
        }

        let reply = S2CAnsCreatePlayer::new(pc_id, msg.class, &character.name, wear);
        if let Err(e) = self.session.send(reply.to_frame()) {
            warn!(pc_id, "failed to send create reply: {e}");
        }
    }

    async fn handle_delete(&self, frame: &[u8]) {
        let msg = match C2SDeleteCharacter::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed delete request: {e:#}");
                return;
            }
        };

        let pc_id = msg.pc_id;
        if self.player(pc_id).is_none() {
            return;
        }

        let name = msg.name.to_str_trimmed();
        match self.shared.characters.soft_delete(pc_id, &name).await {
            Ok(()) => {
                info!(pc_id, %name, "character deleted");
                let reply = S2CAnsDeletePlayer::new(pc_id, &name);
                if let Err(e) = self.session.send(reply.to_frame()) {
                    warn!(pc_id, "failed to send delete reply: {e}");
                }
            }
            Err(e) if e.is_not_found() => {
                self.send_error(
                    pc_id,
                    codes::error::CHARACTER_NOT_FOUND,
                    strings::CHARACTER_NOT_FOUND,
                );
            }
            Err(e) => {
                warn!(pc_id, %name, "character delete failed: {e}");
                self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
            }
        }
    }

    async fn handle_character_login(&self, frame: &[u8]) {
        let msg = match C2SCharacterLogin::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("malformed character login: {e:#}");
                return;
            }
        };

        let pc_id = msg.pc_id;
        let Some(player) = self.player(pc_id) else {
            return;
        };

        let name = msg.name.to_str_trimmed();

        // The character must belong to this account and be active.
        match self.shared.characters.get(pc_id, &name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.send_error(
                    pc_id,
                    codes::error::INVALID_CHARACTER,
                    strings::INVALID_CHARACTER,
                );
                return;
            }
            Err(e) => {
                warn!(pc_id, %name, "character lookup failed: {e}");
                self.send_error(pc_id, codes::error::GENERIC_FAILURE, strings::LOGIN_FAILED);
                return;
            }
        }

        if !player.select_character(&name) {
            self.send_error(
                pc_id,
                codes::error::INVALID_CHARACTER,
                strings::INVALID_CHARACTER,
            );
            return;
        }

        if let Err(e) = self.shared.characters.touch_last_login(pc_id, &name).await {
            warn!(pc_id, %name, "failed to stamp last login: {e}");
        }

        info!(pc_id, %name, "character login forwarded");

        let login = S2MCharacterLogin::new(
            pc_id,
            &player.account,
            &name,
            &player.client_ip,
            player.gate_server_id,
        );

        match login.to_frame() {
            Ok(frame) => {
                if let Err(e) = self.shared.main_link.send(frame) {
                    warn!(pc_id, "failed to forward character login: {e}");
                    self.send_error(
                        pc_id,
                        codes::error::CHARACTER_LOGIN_FAILED,
                        strings::LOGIN_FAILED,
                    );
                }
            }
            Err(e) => warn!(pc_id, "failed to encode character login: {e:#}"),
        }
    }
}
