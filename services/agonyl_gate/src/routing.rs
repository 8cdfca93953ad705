//! The per-link dispatch rules: which zone id owns a client packet, and
//! how zone-originated frames are treated on their way back to the client.

/// The reserved zone id the AccountServer answers on. Also the initial
/// `current_zone` of every player.
pub(crate) const ACCOUNT_SERVER_ZONE_ID: u8 = 255;

/// Protocols that always belong to the AccountServer, regardless of the
/// player's current zone.
const ACCOUNT_SERVER_PROTOCOLS: [u16; 5] = [
    0x1106, // character login
    0x2322, // clan mark transfer
    0x2323, // clan mark ask
    0xA001, // create character
    0xA002, // delete character
];

/// Protocols routed to the AccountServer even on exotic ctrl bytes.
const CLAN_MARK_PROTOCOLS: [u16; 2] = [0x2322, 0x2323];

/// Decides the destination zone for a decrypted client packet, or `None`
/// when the packet is not routable.
pub(crate) fn route_zone(ctrl: u8, protocol: Option<u16>, current_zone: u8) -> Option<u8> {
    match ctrl {
        0x01 => None, // control packets are handled on the gate itself
        0x03 => match protocol {
            Some(p) if ACCOUNT_SERVER_PROTOCOLS.contains(&p) => Some(ACCOUNT_SERVER_ZONE_ID),
            _ => Some(current_zone),
        },
        _ => match protocol {
            Some(p) if CLAN_MARK_PROTOCOLS.contains(&p) => Some(ACCOUNT_SERVER_ZONE_ID),
            _ => None,
        },
    }
}

/// Whether a zone-originated frame is the zone-change directive the gate
/// consumes instead of forwarding.
pub(crate) fn is_zone_change(frame: &[u8]) -> bool {
    frame.len() > 10 && frame[8] == 0x01 && frame[9] == 0xE1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_world_protocols_go_to_the_account_server() {
        for protocol in [0x1106, 0x2322, 0x2323, 0xA001, 0xA002] {
            assert_eq!(
                route_zone(0x03, Some(protocol), 2),
                Some(ACCOUNT_SERVER_ZONE_ID),
                "protocol {protocol:#06x}"
            );
        }
    }

    #[test]
    fn world_protocols_follow_the_current_zone() {
        assert_eq!(route_zone(0x03, Some(0x1200), 2), Some(2));
        assert_eq!(route_zone(0x03, Some(0x1800), 0), Some(0));
        // Before any zone change the current zone is the account server.
        assert_eq!(
            route_zone(0x03, Some(0x1107), ACCOUNT_SERVER_ZONE_ID),
            Some(ACCOUNT_SERVER_ZONE_ID)
        );
    }

    #[test]
    fn clan_mark_protocols_reach_the_account_server_on_any_ctrl() {
        assert_eq!(route_zone(0x05, Some(0x2322), 2), Some(ACCOUNT_SERVER_ZONE_ID));
        assert_eq!(route_zone(0x07, Some(0x2323), 2), Some(ACCOUNT_SERVER_ZONE_ID));
        assert_eq!(route_zone(0x05, Some(0x1200), 2), None);
    }

    #[test]
    fn control_packets_are_not_routed() {
        assert_eq!(route_zone(0x01, None, 2), None);
    }

    #[test]
    fn zone_change_detection() {
        let mut frame = vec![0_u8; 11];
        frame[8] = 0x01;
        frame[9] = 0xE1;
        assert!(is_zone_change(&frame));

        frame[9] = 0xE2;
        assert!(!is_zone_change(&frame));

        // A runt directive without the zone byte is not consumable.
        assert!(!is_zone_change(&[0_u8; 10]));
    }
}
