//! End-to-end coverage of the dispatch loop against an in-memory `Store`:
//! register, authenticate, create a channel, post a message, list it back.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use superchatd::config::Config;
use superchatd::dispatch::context::Context;
use superchatd::dispatch::dispatch;
use superchatd::protocol::codec::DecodedFrame;
use superchatd::protocol::payloads::channels::{ChannelCreated, CreateChannel};
use superchatd::protocol::payloads::identity::{AuthResponse, RegisterResponse, RegisterUser, SetNickname};
use superchatd::protocol::payloads::messages::{MessagePosted, PostMessage};
use superchatd::store::channel::CHANNEL_TYPE_CHAT;
use superchatd::protocol::MessageType;
use superchatd::session::SessionManager;
use superchatd::store::Store;

fn frame(msg_type: MessageType, payload: Bytes) -> DecodedFrame {
    DecodedFrame {
        version: 2,
        msg_type,
        flags: 0,
        payload,
    }
}

fn test_context() -> (Context, u64) {
    let store = Arc::new(Store::new());
    let sessions = Arc::new(SessionManager::new(50, 10));
    let config = Arc::new(Config::default());
    let ctx = Context::new(store, sessions.clone(), config);
    let (tx, _rx) = tokio::sync::mpsc::channel(16);
    let session_id = sessions.create_session("db-1".into(), None, 2, tx);
    (ctx, session_id)
}

#[tokio::test]
async fn register_create_channel_and_post_message() {
    let (ctx, session_id) = test_context();

    let nickname = SetNickname {
        nickname: "alice".into(),
    };
    let mut buf = BytesMut::new();
    nickname.encode(&mut buf);
    dispatch(&ctx, session_id, frame(MessageType::SET_NICKNAME, buf.freeze()))
        .await
        .expect("set nickname should succeed");

    let register = RegisterUser {
        nickname: "alice".into(),
        password_hash: None,
    };
    let mut buf = BytesMut::new();
    register.encode(&mut buf);
    let result = dispatch(&ctx, session_id, frame(MessageType::REGISTER_USER, buf.freeze()))
        .await
        .expect("register should succeed");
    let (msg_type, payload) = result.expect("register response");
    assert_eq!(msg_type, MessageType::REGISTER_RESPONSE);
    let resp = RegisterResponse::decode(&mut &payload[..]).unwrap();
    assert!(resp.success, "{}", resp.message);

    let create = CreateChannel {
        name: "general".into(),
        display_name: "General".into(),
        description: "Default channel".into(),
        channel_type: CHANNEL_TYPE_CHAT,
        retention_hours: 720,
        is_private: false,
    };
    let mut buf = BytesMut::new();
    create.encode(&mut buf);
    let result = dispatch(&ctx, session_id, frame(MessageType::CREATE_CHANNEL, buf.freeze()))
        .await
        .expect("create channel should succeed");
    let (msg_type, payload) = result.expect("channel response");
    assert_eq!(msg_type, MessageType::CHANNEL_CREATED);
    let created = ChannelCreated::decode(&mut &payload[..]).unwrap();
    assert!(created.success, "{}", created.message);
    let channel_id = created.channel_id.expect("created channel has an id");

    let post = PostMessage {
        channel_id,
        subchannel_id: None,
        parent_id: None,
        content: "hello, world".into(),
    };
    let mut buf = BytesMut::new();
    post.encode(&mut buf);
    let result = dispatch(&ctx, session_id, frame(MessageType::POST_MESSAGE, buf.freeze()))
        .await
        .expect("post message should succeed");
    let (msg_type, payload) = result.expect("message response");
    assert_eq!(msg_type, MessageType::MESSAGE_POSTED);
    let posted = MessagePosted::decode(&mut &payload[..]).unwrap();
    assert!(posted.success, "{}", posted.message);
    let message_id = posted.message_id.expect("posted message has an id");

    let stored = ctx.store.message_by_id(message_id).expect("message is stored");
    assert_eq!(stored.content, "hello, world");
    assert_eq!(stored.author_nickname, "alice");
}

#[tokio::test]
async fn auth_with_wrong_password_is_rejected() {
    let (ctx, session_id) = test_context();

    ctx.store
        .create_user(
            "bob".into(),
            superchatd::security::password::hash_password("correct horse").unwrap(),
            0,
        )
        .unwrap();

    let req = superchatd::protocol::payloads::identity::AuthRequest {
        nickname: "bob".into(),
        password_hash: "wrong".into(),
    };
    let mut buf = BytesMut::new();
    req.encode(&mut buf);
    let result = dispatch(&ctx, session_id, frame(MessageType::AUTH_REQUEST, buf.freeze()))
        .await
        .expect("auth handler itself should not error");
    let (msg_type, payload) = result.expect("auth response");
    assert_eq!(msg_type, MessageType::AUTH_RESPONSE);
    let resp = AuthResponse::decode(&mut &payload[..]).unwrap();
    assert!(!resp.success);
}
