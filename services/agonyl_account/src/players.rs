use std::sync::Arc;

use agonyl_net::Session;
use dashmap::DashMap;
use parking_lot::Mutex;

/// One pre-world player, multiplexed over its gate's session.
pub(crate) struct Player {
    pub(crate) pc_id: u32,
    pub(crate) account: String,
    pub(crate) client_ip: String,
    pub(crate) gate_session: Arc<Session>,
    pub(crate) gate_server_id: u8,
    selected_character: Mutex<Option<String>>,
}

impl Player {
    pub(crate) fn new(
        pc_id: u32,
        account: String,
        client_ip: String,
        gate_session: Arc<Session>,
        gate_server_id: u8,
    ) -> Arc<Self> {
        Arc::new(Self {
            pc_id,
            account,
            client_ip,
            gate_session,
            gate_server_id,
            selected_character: Mutex::new(None),
        })
    }

    /// Atomically claims the character slot; fails when one is already
    /// selected.
    pub(crate) fn select_character(&self, name: &str) -> bool {
        let mut selected = self.selected_character.lock();
        if selected.is_some() {
            return false;
        }

        *selected = Some(name.to_owned());
        true
    }

    pub(crate) fn selected_character(&self) -> Option<String> {
        self.selected_character.lock().clone()
    }
}

pub(crate) type Players = Arc<DashMap<u32, Arc<Player>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_selection_is_exclusive() {
        let (session, _rx) = Session::detached(1);
        let player = Player::new(7, "alice".to_owned(), "127.0.0.1".to_owned(), session, 0);

        assert!(player.select_character("Warr"));
        assert!(!player.select_character("Mage"));
        assert_eq!(player.selected_character().as_deref(), Some("Warr"));
    }
}
