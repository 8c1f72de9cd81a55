//! Account-bound SSH public key management (`ADD_SSH_KEY`, `LIST_SSH_KEYS`,
//! `UPDATE_SSH_KEY`, `DELETE_SSH_KEY`); the SSH transport itself looks up
//! fingerprints directly through the store at connect time.

use bytes::{Bytes, BytesMut};

use crate::dispatch::context::Context;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::payloads::ssh_keys::{
    AddSshKey, DeleteSshKey, ListSshKeys, SshKeyInfo, SshKeyList, SshKeyResponse, UpdateSshKey,
};
use crate::protocol::MessageType;
use crate::security::ssh_fingerprint;
use crate::store::SshKey;

fn encode(payload: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    payload(&mut buf);
    buf.freeze()
}

fn info(k: &SshKey) -> SshKeyInfo {
    SshKeyInfo {
        id: k.id,
        fingerprint: k.fingerprint.clone(),
        key_type: k.key_type.clone(),
        label: k.label.clone(),
        added_at: k.added_at.timestamp(),
        last_used: k.last_used.map(|t| t.timestamp()),
    }
}

fn require_user(ctx: &Context, session_id: u64) -> HandlerResult<u64> {
    ctx.sessions
        .user_id(session_id)
        .ok_or_else(|| HandlerError::new(ErrorCode::AuthRequired, "must be registered"))
}

pub fn add_ssh_key(
    ctx: &Context,
    session_id: u64,
    req: AddSshKey,
) -> HandlerResult<(MessageType, Bytes)> {
    let user_id = require_user(ctx, session_id)?;
    let parsed = match ssh_fingerprint::parse(&req.public_key) {
        Ok(p) => p,
        Err(e) => {
            let resp = SshKeyResponse {
                success: false,
                key_id: None,
                fingerprint: None,
                message: e.client_message().unwrap_or_else(|| "invalid key".into()),
            };
            return Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))));
        }
    };
    match ctx.store.add_ssh_key(
        user_id,
        parsed.fingerprint.clone(),
        req.public_key,
        parsed.key_type,
        req.label,
    ) {
        Ok(key) => {
            let resp = SshKeyResponse {
                success: true,
                key_id: Some(key.id),
                fingerprint: Some(key.fingerprint),
                message: "added".into(),
            };
            Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))))
        }
        Err(e) => {
            let resp = SshKeyResponse {
                success: false,
                key_id: None,
                fingerprint: None,
                message: e.to_string(),
            };
            Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))))
        }
    }
}

pub fn list_ssh_keys(
    ctx: &Context,
    session_id: u64,
    _req: ListSshKeys,
) -> HandlerResult<(MessageType, Bytes)> {
    let user_id = require_user(ctx, session_id)?;
    let keys = ctx.store.ssh_keys_for_user(user_id).iter().map(info).collect();
    let resp = SshKeyList { keys };
    Ok((MessageType::SSH_KEY_LIST, encode(|b| resp.encode(b))))
}

fn authorize_key_owner(ctx: &Context, session_id: u64, key: &SshKey) -> HandlerResult<()> {
    if ctx.sessions.user_id(session_id) == Some(key.user_id) {
        Ok(())
    } else {
        Err(HandlerError::new(ErrorCode::NotOwner, "not your ssh key"))
    }
}

pub fn update_ssh_key(
    ctx: &Context,
    session_id: u64,
    req: UpdateSshKey,
) -> HandlerResult<(MessageType, Bytes)> {
    let Some(key) = ctx
        .store
        .ssh_keys_for_user(require_user(ctx, session_id)?)
        .into_iter()
        .find(|k| k.id == req.key_id)
    else {
        let resp = SshKeyResponse {
            success: false,
            key_id: None,
            fingerprint: None,
            message: "key not found".into(),
        };
        return Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))));
    };
    authorize_key_owner(ctx, session_id, &key)?;
    ctx.store.update_ssh_key_label(key.id, req.label)?;
    let resp = SshKeyResponse {
        success: true,
        key_id: Some(key.id),
        fingerprint: Some(key.fingerprint),
        message: "updated".into(),
    };
    Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))))
}

pub fn delete_ssh_key(
    ctx: &Context,
    session_id: u64,
    req: DeleteSshKey,
) -> HandlerResult<(MessageType, Bytes)> {
    let Some(key) = ctx
        .store
        .ssh_keys_for_user(require_user(ctx, session_id)?)
        .into_iter()
        .find(|k| k.id == req.key_id)
    else {
        let resp = SshKeyResponse {
            success: false,
            key_id: None,
            fingerprint: None,
            message: "key not found".into(),
        };
        return Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))));
    };
    authorize_key_owner(ctx, session_id, &key)?;
    ctx.store.delete_ssh_key(key.id)?;
    let resp = SshKeyResponse {
        success: true,
        key_id: Some(key.id),
        fingerprint: Some(key.fingerprint),
        message: "deleted".into(),
    };
    Ok((MessageType::SSH_KEY_RESPONSE, encode(|b| resp.encode(b))))
}
