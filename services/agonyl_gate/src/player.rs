use std::sync::Arc;

use agonyl_net::{SendError, Session};
use parking_lot::Mutex;

use crate::routing::ACCOUNT_SERVER_ZONE_ID;

/// One authenticated client behind this gate. `current_zone` starts at the
/// AccountServer sentinel and only moves on a zone-change directive.
pub(crate) struct Player {
    pub(crate) pc_id: u32,
    pub(crate) username: String,
    pub(crate) session: Arc<Session>,
    current_zone: Mutex<u8>,
}

impl Player {
    pub(crate) fn new(pc_id: u32, username: String, session: Arc<Session>) -> Arc<Self> {
        Arc::new(Self {
            pc_id,
            username,
            session,
            current_zone: Mutex::new(ACCOUNT_SERVER_ZONE_ID),
        })
    }

    pub(crate) fn current_zone(&self) -> u8 {
        *self.current_zone.lock()
    }

    pub(crate) fn set_current_zone(&self, zone_id: u8) {
        *self.current_zone.lock() = zone_id;
    }

    pub(crate) fn send(&self, frame: Vec<u8>) -> Result<(), SendError> {
        self.session.send(frame)
    }
}
