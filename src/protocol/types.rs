//! Message type opcodes (spec §6, abridged catalogue).
//!
//! Opcodes fixed by the spec (`SERVER_CONFIG=0x98`, `PING=0x10`,
//! `PONG=0x90`, `NEW_MESSAGE=0x8D`, `SERVER_PRESENCE=0xAB`,
//! `CHANNEL_PRESENCE=0xAC`, `START_DM=0x19`, `PROVIDE_PUBLIC_KEY=0x1A`,
//! `ALLOW_UNENCRYPTED=0x1B`, `DECLINE_DM=0x1E`, `KEY_REQUIRED=0xA1`,
//! `DM_READY=0xA2`, `DM_PENDING=0xA3`, `DM_REQUEST=0xA4`,
//! `DM_PARTICIPANT_LEFT=0xAE`, `DM_DECLINED=0xAF`) keep those exact values;
//! everything else is assigned a value here that avoids colliding with
//! them.

/// The `type` byte of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(pub u8);

macro_rules! message_types {
    ($($name:ident = $val:expr),* $(,)?) => {
        #[allow(non_upper_case_globals)]
        impl MessageType {
            $(pub const $name: MessageType = MessageType($val);)*
        }

        impl MessageType {
            pub fn name(self) -> &'static str {
                match self.0 {
                    $($val => stringify!($name),)*
                    _ => "UNKNOWN",
                }
            }
        }
    };
}

message_types! {
    // Connection
    SERVER_CONFIG = 0x98,
    PING = 0x10,
    PONG = 0x90,
    DISCONNECT = 0x11,

    // Identity (requests)
    SET_NICKNAME = 0x20,
    REGISTER_USER = 0x21,
    AUTH_REQUEST = 0x22,
    LOGOUT = 0x23,
    CHANGE_PASSWORD = 0x24,
    // Identity (responses)
    NICKNAME_RESPONSE = 0xA0,
    REGISTER_RESPONSE = 0xA5,
    AUTH_RESPONSE = 0xA6,
    PASSWORD_CHANGED = 0xA7,

    // SSH keys (requests)
    ADD_SSH_KEY = 0x30,
    LIST_SSH_KEYS = 0x31,
    UPDATE_SSH_KEY = 0x32,
    DELETE_SSH_KEY = 0x33,
    // SSH keys (responses)
    SSH_KEY_RESPONSE = 0xA8,
    SSH_KEY_LIST = 0xA9,

    // Channels (requests)
    LIST_CHANNELS = 0x40,
    JOIN_CHANNEL = 0x41,
    LEAVE_CHANNEL = 0x42,
    CREATE_CHANNEL = 0x43,
    CREATE_SUBCHANNEL = 0x44,
    DELETE_CHANNEL = 0x45,
    // Channels (responses)
    CHANNEL_LIST = 0xAA,
    JOIN_RESPONSE = 0xC0,
    LEAVE_RESPONSE = 0xC1,
    CHANNEL_CREATED = 0xC2,
    CHANNEL_DELETED = 0xC3,

    // Messages (requests)
    POST_MESSAGE = 0x50,
    LIST_MESSAGES = 0x51,
    EDIT_MESSAGE = 0x52,
    DELETE_MESSAGE = 0x53,
    // Messages (responses/broadcasts)
    MESSAGE_POSTED = 0xC4,
    MESSAGE_LIST = 0xC5,
    MESSAGE_EDIT_RESPONSE = 0xC6,
    MESSAGE_DELETE_RESPONSE = 0xC7,
    NEW_MESSAGE = 0x8D,
    MESSAGE_EDITED = 0xC8,
    MESSAGE_DELETED = 0xC9,

    // Subscriptions
    SUBSCRIBE_THREAD = 0x60,
    UNSUBSCRIBE_THREAD = 0x61,
    SUBSCRIBE_CHANNEL = 0x62,
    UNSUBSCRIBE_CHANNEL = 0x63,
    SUBSCRIBE_OK = 0xCA,

    // Presence
    SERVER_PRESENCE = 0xAB,
    CHANNEL_PRESENCE = 0xAC,
    GET_USER_INFO = 0x70,
    USER_INFO = 0xCB,
    LIST_USERS = 0x71,
    USER_LIST = 0xCC,
    LIST_CHANNEL_USERS = 0x72,
    CHANNEL_USER_LIST = 0xCD,

    // Admin
    BAN_USER = 0x80,
    BAN_IP = 0x81,
    UNBAN_USER = 0x82,
    UNBAN_IP = 0x83,
    LIST_BANS = 0x84,
    DELETE_USER = 0x85,
    BAN_LIST = 0xCE,
    ADMIN_RESPONSE = 0xCF,

    // Direct messages (requests)
    START_DM = 0x19,
    PROVIDE_PUBLIC_KEY = 0x1A,
    ALLOW_UNENCRYPTED = 0x1B,
    DECLINE_DM = 0x1E,
    // Direct messages (responses)
    KEY_REQUIRED = 0xA1,
    DM_READY = 0xA2,
    DM_PENDING = 0xA3,
    DM_REQUEST = 0xA4,
    DM_PARTICIPANT_LEFT = 0xAE,
    DM_DECLINED = 0xAF,

    // Directory
    LIST_SERVERS = 0xB1,
    SERVER_LIST = 0xB2,
    REGISTER_SERVER = 0xB3,
    REGISTER_ACK = 0xB4,
    VERIFY_REGISTRATION = 0xB5,
    VERIFY_RESPONSE = 0xB6,
    HEARTBEAT = 0xB7,
    HEARTBEAT_ACK = 0xB8,

    ERROR = 0xFF,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Every opcode named in the catalogue must be unique: the dispatcher
    /// keys its handler table by this byte, so a collision would silently
    /// shadow one message type with another.
    #[test]
    fn all_opcodes_are_distinct() {
        let values = [
            MessageType::SERVER_CONFIG.0,
            MessageType::PING.0,
            MessageType::PONG.0,
            MessageType::DISCONNECT.0,
            MessageType::SET_NICKNAME.0,
            MessageType::REGISTER_USER.0,
            MessageType::AUTH_REQUEST.0,
            MessageType::LOGOUT.0,
            MessageType::CHANGE_PASSWORD.0,
            MessageType::NICKNAME_RESPONSE.0,
            MessageType::REGISTER_RESPONSE.0,
            MessageType::AUTH_RESPONSE.0,
            MessageType::PASSWORD_CHANGED.0,
            MessageType::ADD_SSH_KEY.0,
            MessageType::LIST_SSH_KEYS.0,
            MessageType::UPDATE_SSH_KEY.0,
            MessageType::DELETE_SSH_KEY.0,
            MessageType::SSH_KEY_RESPONSE.0,
            MessageType::SSH_KEY_LIST.0,
            MessageType::LIST_CHANNELS.0,
            MessageType::JOIN_CHANNEL.0,
            MessageType::LEAVE_CHANNEL.0,
            MessageType::CREATE_CHANNEL.0,
            MessageType::CREATE_SUBCHANNEL.0,
            MessageType::DELETE_CHANNEL.0,
            MessageType::CHANNEL_LIST.0,
            MessageType::JOIN_RESPONSE.0,
            MessageType::LEAVE_RESPONSE.0,
            MessageType::CHANNEL_CREATED.0,
            MessageType::CHANNEL_DELETED.0,
            MessageType::POST_MESSAGE.0,
            MessageType::LIST_MESSAGES.0,
            MessageType::EDIT_MESSAGE.0,
            MessageType::DELETE_MESSAGE.0,
            MessageType::MESSAGE_POSTED.0,
            MessageType::MESSAGE_LIST.0,
            MessageType::MESSAGE_EDIT_RESPONSE.0,
            MessageType::MESSAGE_DELETE_RESPONSE.0,
            MessageType::NEW_MESSAGE.0,
            MessageType::MESSAGE_EDITED.0,
            MessageType::MESSAGE_DELETED.0,
            MessageType::SUBSCRIBE_THREAD.0,
            MessageType::UNSUBSCRIBE_THREAD.0,
            MessageType::SUBSCRIBE_CHANNEL.0,
            MessageType::UNSUBSCRIBE_CHANNEL.0,
            MessageType::SUBSCRIBE_OK.0,
            MessageType::SERVER_PRESENCE.0,
            MessageType::CHANNEL_PRESENCE.0,
            MessageType::GET_USER_INFO.0,
            MessageType::USER_INFO.0,
            MessageType::LIST_USERS.0,
            MessageType::USER_LIST.0,
            MessageType::LIST_CHANNEL_USERS.0,
            MessageType::CHANNEL_USER_LIST.0,
            MessageType::BAN_USER.0,
            MessageType::BAN_IP.0,
            MessageType::UNBAN_USER.0,
            MessageType::UNBAN_IP.0,
            MessageType::LIST_BANS.0,
            MessageType::DELETE_USER.0,
            MessageType::BAN_LIST.0,
            MessageType::ADMIN_RESPONSE.0,
            MessageType::START_DM.0,
            MessageType::PROVIDE_PUBLIC_KEY.0,
            MessageType::ALLOW_UNENCRYPTED.0,
            MessageType::DECLINE_DM.0,
            MessageType::KEY_REQUIRED.0,
            MessageType::DM_READY.0,
            MessageType::DM_PENDING.0,
            MessageType::DM_REQUEST.0,
            MessageType::DM_PARTICIPANT_LEFT.0,
            MessageType::DM_DECLINED.0,
            MessageType::LIST_SERVERS.0,
            MessageType::SERVER_LIST.0,
            MessageType::REGISTER_SERVER.0,
            MessageType::REGISTER_ACK.0,
            MessageType::VERIFY_REGISTRATION.0,
            MessageType::VERIFY_RESPONSE.0,
            MessageType::HEARTBEAT.0,
            MessageType::HEARTBEAT_ACK.0,
            MessageType::ERROR.0,
        ];
        let unique: HashSet<u8> = values.iter().copied().collect();
        assert_eq!(unique.len(), values.len(), "duplicate opcode detected");
    }

    #[test]
    fn fixed_spec_opcodes_match() {
        assert_eq!(MessageType::SERVER_CONFIG.0, 0x98);
        assert_eq!(MessageType::PING.0, 0x10);
        assert_eq!(MessageType::PONG.0, 0x90);
        assert_eq!(MessageType::NEW_MESSAGE.0, 0x8D);
        assert_eq!(MessageType::SERVER_PRESENCE.0, 0xAB);
        assert_eq!(MessageType::CHANNEL_PRESENCE.0, 0xAC);
        assert_eq!(MessageType::START_DM.0, 0x19);
        assert_eq!(MessageType::PROVIDE_PUBLIC_KEY.0, 0x1A);
        assert_eq!(MessageType::ALLOW_UNENCRYPTED.0, 0x1B);
        assert_eq!(MessageType::DECLINE_DM.0, 0x1E);
        assert_eq!(MessageType::KEY_REQUIRED.0, 0xA1);
        assert_eq!(MessageType::DM_READY.0, 0xA2);
        assert_eq!(MessageType::DM_PENDING.0, 0xA3);
        assert_eq!(MessageType::DM_REQUEST.0, 0xA4);
        assert_eq!(MessageType::DM_PARTICIPANT_LEFT.0, 0xAE);
        assert_eq!(MessageType::DM_DECLINED.0, 0xAF);
    }
}
