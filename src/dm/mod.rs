//! DM consent / key-exchange state machine.
//!
//! States per invite: **Pending** (initiator requested; target hasn't
//! consented) → **Ready** (DM channel exists, both endpoints notified) or
//! **Declined** (invite deleted, initiator notified). Unlike the directory
//! handshake this isn't driven by a single connection's read loop, so it's
//! modeled as free functions over the store/session manager that return the
//! effects (who to notify, with what) for the dispatcher to deliver —
//! mirroring how a handler in §4.5 returns a response plus broadcasts
//! instead of writing to sockets itself.

use chrono::Utc;

use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::dm::{
    DmDeclined, DmParticipantLeft, DmPending, DmReady, DmRequest, KeyRequired,
    ENCRYPTION_NOT_POSSIBLE, ENCRYPTION_OPTIONAL, ENCRYPTION_REQUIRED,
};
use crate::session::SessionManager;
use crate::store::channel::ChannelParticipant;
use crate::store::dm::DmInvite;
use crate::store::{Channel, Store};

pub enum DmEffect {
    Ready { to: u64, payload: DmReady },
    Pending { to: u64, payload: DmPending },
    Request { to: u64, payload: DmRequest },
    KeyRequired { to: u64, payload: KeyRequired },
    Declined { to: u64, payload: DmDeclined },
    ParticipantLeft { to: u64, payload: DmParticipantLeft },
}

struct Party {
    session_id: u64,
    user_id: Option<u64>,
    nickname: String,
    public_key: Option<[u8; 32]>,
}

fn party(store: &Store, sessions: &SessionManager, session_id: u64) -> HandlerResult<Party> {
    let nickname = sessions
        .nickname(session_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::NicknameRequired, "nickname not set"))?;
    let user_id = sessions.user_id(session_id);
    let public_key = match user_id {
        Some(uid) => store.user_by_id(uid).and_then(|u| u.encryption_public_key),
        None => sessions.ephemeral_public_key(session_id),
    };
    Ok(Party {
        session_id,
        user_id,
        nickname,
        public_key,
    })
}

fn find_existing_dm_channel(store: &Store, a: u64, b: u64) -> Option<Channel> {
    store
        .list_channels_including_dm()
        .into_iter()
        .find(|c| {
            c.is_dm && {
                let participants = store.dm_participants(c.id);
                let has_a = participants.iter().any(|p| p.user_id == Some(a));
                let has_b = participants.iter().any(|p| p.user_id == Some(b));
                has_a && has_b
            }
        })
}

fn create_dm_channel(store: &Store, initiator: &Party, target: &Party) -> Channel {
    let channel = store
        .create_channel(Channel {
            id: 0,
            name: format!("dm-{}-{}", initiator.session_id, target.session_id),
            display_name: format!("{} <-> {}", initiator.nickname, target.nickname),
            description: String::new(),
            channel_type: crate::store::channel::CHANNEL_TYPE_CHAT,
            retention_hours: 0,
            created_by: initiator.user_id,
            created_at: Utc::now(),
            is_private: true,
            is_dm: true,
            parent_id: None,
        })
        .expect("DM channel names are session-scoped and never collide");
    for party in [initiator, target] {
        store.add_dm_participant(ChannelParticipant {
            channel_id: channel.id,
            user_id: party.user_id,
            session_id: party.user_id.is_none().then(|| party.session_id.to_string()),
            nickname: party.nickname.clone(),
        });
    }
    channel
}

fn ready_pair(channel: &Channel, initiator: &Party, target: &Party, encrypted: bool) -> Vec<DmEffect> {
    vec![
        DmEffect::Ready {
            to: initiator.session_id,
            payload: DmReady {
                channel_id: channel.id,
                peer_nickname: target.nickname.clone(),
                is_encrypted: encrypted,
                peer_public_key: target.public_key.map(|k| k.to_vec()),
            },
        },
        DmEffect::Ready {
            to: target.session_id,
            payload: DmReady {
                channel_id: channel.id,
                peer_nickname: initiator.nickname.clone(),
                is_encrypted: encrypted,
                peer_public_key: initiator.public_key.map(|k| k.to_vec()),
            },
        },
    ]
}

pub fn start_dm(
    store: &Store,
    sessions: &SessionManager,
    initiator_session_id: u64,
    target_nickname: &str,
    allow_unencrypted: bool,
) -> HandlerResult<Vec<DmEffect>> {
    let initiator = party(store, sessions, initiator_session_id)?;
    let target_session_id = sessions
        .find_by_nickname(target_nickname)
        .ok_or_else(|| HandlerError::new(ErrorCode::UserNotFound, "no such user online"))?;
    let target = party(store, sessions, target_session_id)?;

    if let (Some(a), Some(b)) = (initiator.user_id, target.user_id) {
        if let Some(channel) = find_existing_dm_channel(store, a, b) {
            let encrypted = initiator.public_key.is_some() && target.public_key.is_some();
            return Ok(ready_pair(&channel, &initiator, &target, encrypted));
        }
    }

    if initiator.public_key.is_some() && target.public_key.is_some() {
        let channel = create_dm_channel(store, &initiator, &target);
        return Ok(ready_pair(&channel, &initiator, &target, true));
    }

    if initiator.public_key.is_none() && !allow_unencrypted {
        return Ok(vec![DmEffect::KeyRequired {
            to: initiator.session_id,
            payload: KeyRequired {
                channel_id: 0,
                peer_nickname: target.nickname.clone(),
            },
        }]);
    }

    let invite = store.create_dm_invite(DmInvite {
        id: 0,
        channel_id: 0,
        initiator_user_id: initiator.user_id,
        initiator_session_id: initiator.user_id.is_none().then(|| initiator.session_id.to_string()),
        target_user_id: target.user_id,
        target_session_id: target.user_id.is_none().then(|| target.session_id.to_string()),
        is_encrypted_intent: !allow_unencrypted,
        created_at: Utc::now(),
    });

    let encryption_status = match (initiator.public_key.is_some(), target.public_key.is_some()) {
        (true, false) | (false, true) => ENCRYPTION_OPTIONAL,
        (false, false) if allow_unencrypted => ENCRYPTION_NOT_POSSIBLE,
        (false, false) => ENCRYPTION_REQUIRED,
        (true, true) => unreachable!("both-keys case handled above"),
    };

    Ok(vec![
        DmEffect::Pending {
            to: initiator.session_id,
            payload: DmPending { channel_id: invite.id },
        },
        DmEffect::Request {
            to: target.session_id,
            payload: DmRequest {
                channel_id: invite.id,
                from_nickname: initiator.nickname,
                encryption_status,
            },
        },
    ])
}

pub fn allow_unencrypted(
    store: &Store,
    sessions: &SessionManager,
    responder_session_id: u64,
    invite_id: u64,
) -> HandlerResult<Vec<DmEffect>> {
    let invite = store
        .take_dm_invite(invite_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::InviteNotFound, "invite not found or already resolved"))?;
    authorize_invite_party(sessions, &invite, responder_session_id)?;

    let initiator_session = resolve_party_session(sessions, invite.initiator_user_id, invite.initiator_session_id.as_deref())?;
    let target_session = resolve_party_session(sessions, invite.target_user_id, invite.target_session_id.as_deref())?;
    let initiator = party(store, sessions, initiator_session)?;
    let target = party(store, sessions, target_session)?;
    let channel = create_dm_channel(store, &initiator, &target);
    Ok(ready_pair(&channel, &initiator, &target, false))
}

pub fn decline_dm(
    store: &Store,
    sessions: &SessionManager,
    responder_session_id: u64,
    invite_id: u64,
) -> HandlerResult<Vec<DmEffect>> {
    let invite = store
        .take_dm_invite(invite_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::InviteNotFound, "invite not found or already resolved"))?;
    authorize_invite_party(sessions, &invite, responder_session_id)?;
    let initiator_session = resolve_party_session(sessions, invite.initiator_user_id, invite.initiator_session_id.as_deref())?;
    Ok(vec![DmEffect::Declined {
        to: initiator_session,
        payload: DmDeclined { channel_id: invite_id },
    }])
}

/// Stores a freshly published public key and auto-promotes any pending
/// invite where both parties now have one, per the source's per-call scan
/// (an index would help once the invite table gets large).
pub fn provide_public_key(
    store: &Store,
    sessions: &SessionManager,
    session_id: u64,
    key: [u8; 32],
) -> HandlerResult<Vec<DmEffect>> {
    let user_id = sessions.user_id(session_id);
    match user_id {
        Some(uid) => store.set_user_encryption_key(uid, key)?,
        None => sessions.set_ephemeral_public_key(session_id, key)?,
    }

    let Some(uid) = user_id else {
        return Ok(Vec::new());
    };

    let mut effects = Vec::new();
    for invite in store.pending_dm_invites_for_user(uid) {
        let initiator_session = resolve_party_session(sessions, invite.initiator_user_id, invite.initiator_session_id.as_deref())?;
        let target_session = resolve_party_session(sessions, invite.target_user_id, invite.target_session_id.as_deref())?;
        let initiator = party(store, sessions, initiator_session)?;
        let target = party(store, sessions, target_session)?;
        if initiator.public_key.is_some() && target.public_key.is_some() {
            store.take_dm_invite(invite.id);
            let channel = create_dm_channel(store, &initiator, &target);
            effects.extend(ready_pair(&channel, &initiator, &target, true));
        }
    }
    Ok(effects)
}

/// Disconnect of a DM participant: notify the others and, if the channel is
/// now empty, it's already been deleted by the store call that removed them.
pub fn participant_left(
    store: &Store,
    sessions: &SessionManager,
    channel_id: u64,
    leaver_session_id: u64,
    leaver_nickname: &str,
) -> HandlerResult<Vec<DmEffect>> {
    let others: Vec<u64> = store
        .dm_participants(channel_id)
        .into_iter()
        .filter(|p| p.session_id.as_deref() != Some(&leaver_session_id.to_string()))
        .filter_map(|p| match p.user_id {
            Some(uid) => sessions.find_by_user_id(uid),
            None => p.session_id.and_then(|s| s.parse().ok()),
        })
        .collect();
    store.remove_dm_participant(channel_id, &leaver_session_id.to_string())?;
    Ok(others
        .into_iter()
        .map(|to| DmEffect::ParticipantLeft {
            to,
            payload: DmParticipantLeft {
                channel_id,
                nickname: leaver_nickname.to_string(),
            },
        })
        .collect())
}

fn authorize_invite_party(sessions: &SessionManager, invite: &DmInvite, session_id: u64) -> HandlerResult<()> {
    let user_id = sessions.user_id(session_id);
    let matches_user = user_id.is_some() && user_id == invite.target_user_id;
    let matches_session = invite.target_session_id.as_deref() == Some(&session_id.to_string());
    if matches_user || matches_session {
        Ok(())
    } else {
        Err(HandlerError::new(
            ErrorCode::NotAuthorizedForInvite,
            "not the target of this invite",
        ))
    }
}

fn resolve_party_session(
    sessions: &SessionManager,
    user_id: Option<u64>,
    session_id: Option<&str>,
) -> HandlerResult<u64> {
    if let Some(sid) = session_id {
        return sid
            .parse()
            .map_err(|_| HandlerError::Internal("corrupt invite session id".into()));
    }
    let uid = user_id.ok_or_else(|| HandlerError::Internal("invite has neither party set".into()))?;
    sessions
        .find_by_user_id(uid)
        .ok_or_else(|| HandlerError::new(ErrorCode::UserNotFound, "party is no longer connected"))
}
