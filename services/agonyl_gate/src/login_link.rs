//! The reconnecting link to the login server's broker port. Registers the
//! gate on connect and maintains the preauth table fed by `Ls2GateLogin`
//! frames.

use std::sync::Arc;

use agonyl_net::{PeerClient, PeerHandler};
use agonyl_protocol::messages::{Gate2LsConnect, Ls2GateLogin};
use agonyl_protocol::{head, FrameDecoder};
use bytes::BytesMut;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::Config;

/// pcId → username, granted by the login server ahead of the client's
/// arrival. A gate login is only accepted for pre-authorized ids.
pub(crate) type PreauthTable = Arc<DashMap<u32, String>>;

pub(crate) struct LoginLinkHandler {
    server_id: u8,
    public_ip: String,
    public_port: u32,
    server_name: String,
    preauth: PreauthTable,
}

impl LoginLinkHandler {
    pub(crate) fn new(cfg: &Config, preauth: PreauthTable) -> Self {
        Self {
            server_id: cfg.server_id,
            public_ip: cfg.ip_address.clone(),
            public_port: u32::from(cfg.port),
            server_name: cfg.server_name.clone(),
            preauth,
        }
    }
}

#[async_trait::async_trait]
impl PeerHandler<FrameDecoder> for LoginLinkHandler {
    async fn on_connect(&self, link: &PeerClient<FrameDecoder>) -> anyhow::Result<()> {
        let connect = Gate2LsConnect::new(
            self.server_id,
            self.server_id,
            &self.public_ip,
            self.public_port,
            &self.server_name,
        );

        link.send(connect.to_frame())?;
        Ok(())
    }

    async fn on_frame(&self, _link: &PeerClient<FrameDecoder>, frame: BytesMut) {
        if head::frame_ctrl(&frame) != 0x01 {
            return;
        }

        match head::frame_cmd(&frame) {
            0xE1 => match Ls2GateLogin::from_frame(&frame) {
                Ok(msg) => {
                    let username = msg.account.to_str();
                    debug!(pc_id = msg.pc_id, %username, "login pre-authorized");
                    self.preauth.insert(msg.pc_id, username);
                }
                Err(e) => warn!("malformed preauth frame: {e:#}"),
            },
            0xE3 => {
                // Forced-logout push; the ticket side is handled upstream.
                debug!("logout notice from login server");
            }
            _ => {}
        }
    }
}
