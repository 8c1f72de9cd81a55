//! Unified error handling for superchatd.
//!
//! Centralizes the numeric error taxonomy from the wire protocol (§7 of the
//! spec) so a single `ErrorCode` drives both the `ERROR` frame sent to
//! clients and the metrics label attached to it.

use thiserror::Error;

/// Stable numeric error code taxonomy (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Framing = 1000,
    UnsupportedType = 1001,
    InvalidFormat = 1002,

    NicknameRequired = 2000,
    AuthRequired = 2001,
    InvalidCredentials = 2002,
    Banned = 2003,
    Shadowbanned = 2004,

    NotRegistered = 4000,
    ChannelNotFound = 4001,
    SubchannelNotFound = 4002,
    ThreadNotFound = 4003,
    UserNotFound = 4004,
    SessionNotFound = 4005,
    InviteNotFound = 4006,
    ServerNotFound = 4007,

    AdminRequired = 5000,
    NotOwner = 5001,
    NotParticipant = 5002,
    NotAuthorizedForInvite = 5003,

    InvalidInput = 6000,
    MessageTooLong = 6001,
    NameTooLong = 6002,
    RetentionOutOfRange = 6003,
    SubscriptionLimit = 6004,

    RateLimited = 7000,
    ConnectionLimit = 7001,

    Internal = 9000,
    Database = 9001,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Errors raised by message handlers during dispatch.
///
/// Most variants carry enough context to build a human-readable `ERROR`
/// frame; `Quit` and `Internal` are handled specially by the connection's
/// event loop rather than surfaced verbatim to the peer.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Protocol(ErrorCode, String),

    /// The handler has fully processed a `DISCONNECT` and the connection
    /// should close after flushing any pending writes.
    #[error("client disconnected")]
    Quit,

    #[error("unexpected internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Protocol(code, message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(code, _) => *code,
            Self::Quit => ErrorCode::Internal,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Render a message suitable for an `ERROR` frame payload. Returns
    /// `None` for errors that shouldn't be echoed verbatim (internal
    /// failures are logged and replaced with a generic message).
    pub fn client_message(&self) -> Option<String> {
        match self {
            Self::Protocol(_, msg) => Some(msg.clone()),
            Self::Quit => None,
            Self::Internal(_) => Some("internal error".to_string()),
        }
    }
}

pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Errors raised by the in-memory store / persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("nickname already taken: {0}")]
    NicknameTaken(String),
    #[error("channel name already in use in this scope: {0}")]
    ChannelNameTaken(String),
    #[error("channel not found: {0}")]
    ChannelNotFound(u64),
    #[error("subchannel not found: {0}")]
    SubchannelNotFound(u64),
    #[error("message not found: {0}")]
    MessageNotFound(u64),
    #[error("thread not found: {0}")]
    ThreadNotFound(u64),
    #[error("user not found: {0}")]
    UserNotFound(u64),
    #[error("session not found: {0}")]
    SessionNotFound(u64),
    #[error("invite not found: {0}")]
    InviteNotFound(u64),
    #[error("ssh key not found: {0}")]
    SshKeyNotFound(u64),
    #[error("fingerprint already registered: {0}")]
    FingerprintTaken(String),
    #[error("not the owner of this resource")]
    NotOwner,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("subscription limit reached")]
    SubscriptionLimit,
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T = ()> = Result<T, StoreError>;

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::NicknameTaken(_) => ErrorCode::InvalidInput,
            StoreError::ChannelNameTaken(_) => ErrorCode::InvalidInput,
            StoreError::ChannelNotFound(_) => ErrorCode::ChannelNotFound,
            StoreError::SubchannelNotFound(_) => ErrorCode::SubchannelNotFound,
            StoreError::MessageNotFound(_) => ErrorCode::InvalidInput,
            StoreError::ThreadNotFound(_) => ErrorCode::ThreadNotFound,
            StoreError::UserNotFound(_) => ErrorCode::UserNotFound,
            StoreError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            StoreError::InviteNotFound(_) => ErrorCode::InviteNotFound,
            StoreError::SshKeyNotFound(_) => ErrorCode::InvalidInput,
            StoreError::FingerprintTaken(_) => ErrorCode::InvalidInput,
            StoreError::NotOwner => ErrorCode::NotOwner,
            StoreError::InvalidInput(_) => ErrorCode::InvalidInput,
            StoreError::SubscriptionLimit => ErrorCode::SubscriptionLimit,
            StoreError::Database(_) => ErrorCode::Database,
        };
        HandlerError::Protocol(code, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_values_match_taxonomy() {
        assert_eq!(ErrorCode::Framing.code(), 1000);
        assert_eq!(ErrorCode::NicknameRequired.code(), 2000);
        assert_eq!(ErrorCode::NotRegistered.code(), 4000);
        assert_eq!(ErrorCode::AdminRequired.code(), 5000);
        assert_eq!(ErrorCode::InvalidInput.code(), 6000);
        assert_eq!(ErrorCode::RateLimited.code(), 7000);
        assert_eq!(ErrorCode::Internal.code(), 9000);
    }

    #[test]
    fn store_error_maps_to_expected_code() {
        let e: HandlerError = StoreError::ChannelNotFound(7).into();
        assert_eq!(e.code(), ErrorCode::ChannelNotFound);
    }

    #[test]
    fn quit_has_no_client_message() {
        assert!(HandlerError::Quit.client_message().is_none());
    }
}
