//! Opcode dispatch table: decodes a frame's payload by its `msg_type` and
//! routes it to the matching handler.

pub mod context;
pub mod handlers;

use bytes::Bytes;

use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::protocol::codec::DecodedFrame;
use crate::protocol::payloads as w;
use crate::protocol::MessageType;
use context::Context;
use handlers::{admin, channels, directory, dm, identity, messages, presence, ssh_keys, subscriptions};

fn decode<T, F>(payload: &[u8], decode_fn: F) -> HandlerResult<T>
where
    F: FnOnce(&mut &[u8]) -> crate::protocol::wire::DecodeResult<T>,
{
    let mut slice = payload;
    decode_fn(&mut slice).map_err(|e| HandlerError::new(ErrorCode::InvalidFormat, e.to_string()))
}

/// Dispatches one decoded frame. Returns the response frame to send back to
/// the originating session, if any — some handlers (DM effects, logout)
/// deliver everything themselves and return `None`.
pub async fn dispatch(
    ctx: &Context,
    session_id: u64,
    frame: DecodedFrame,
) -> HandlerResult<Option<(MessageType, Bytes)>> {
    ctx.sessions.touch_activity(session_id);
    let payload = &frame.payload[..];

    macro_rules! req {
        ($ty:ty) => {
            decode::<$ty, _>(payload, <$ty>::decode)?
        };
    }

    match frame.msg_type {
        MessageType::PING => {
            let ping = req!(w::connection::Ping);
            let pong = w::connection::Ping { timestamp: ping.timestamp };
            let mut buf = bytes::BytesMut::new();
            pong.encode(&mut buf);
            Ok(Some((MessageType::PONG, buf.freeze())))
        }
        MessageType::DISCONNECT => Err(HandlerError::Quit),

        MessageType::SET_NICKNAME => {
            Ok(Some(identity::set_nickname(ctx, session_id, req!(w::identity::SetNickname)).await?))
        }
        MessageType::REGISTER_USER => {
            Ok(Some(identity::register_user(ctx, session_id, req!(w::identity::RegisterUser)).await?))
        }
        MessageType::AUTH_REQUEST => Ok(Some(
            identity::auth_request(&ctx.store, &ctx.sessions, session_id, req!(w::identity::AuthRequest)).await?,
        )),
        MessageType::LOGOUT => {
            identity::logout(&ctx.sessions, session_id, req!(w::identity::Logout))?;
            Ok(None)
        }
        MessageType::CHANGE_PASSWORD => Ok(Some(
            identity::change_password(&ctx.store, &ctx.sessions, session_id, req!(w::identity::ChangePassword))
                .await?,
        )),

        MessageType::ADD_SSH_KEY => {
            Ok(Some(ssh_keys::add_ssh_key(ctx, session_id, req!(w::ssh_keys::AddSshKey))?))
        }
        MessageType::LIST_SSH_KEYS => {
            Ok(Some(ssh_keys::list_ssh_keys(ctx, session_id, req!(w::ssh_keys::ListSshKeys))?))
        }
        MessageType::UPDATE_SSH_KEY => {
            Ok(Some(ssh_keys::update_ssh_key(ctx, session_id, req!(w::ssh_keys::UpdateSshKey))?))
        }
        MessageType::DELETE_SSH_KEY => {
            Ok(Some(ssh_keys::delete_ssh_key(ctx, session_id, req!(w::ssh_keys::DeleteSshKey))?))
        }

        MessageType::LIST_CHANNELS => Ok(Some(channels::list_channels(ctx, req!(w::channels::ListChannels))?)),
        MessageType::JOIN_CHANNEL => {
            Ok(Some(channels::join_channel(ctx, session_id, req!(w::channels::JoinChannel)).await?))
        }
        MessageType::LEAVE_CHANNEL => {
            Ok(Some(channels::leave_channel(ctx, session_id, req!(w::channels::LeaveChannel)).await?))
        }
        MessageType::CREATE_CHANNEL => {
            Ok(Some(channels::create_channel(ctx, session_id, req!(w::channels::CreateChannel))?))
        }
        MessageType::CREATE_SUBCHANNEL => {
            Ok(Some(channels::create_subchannel(ctx, session_id, req!(w::channels::CreateSubchannel))?))
        }
        MessageType::DELETE_CHANNEL => {
            Ok(Some(channels::delete_channel(ctx, session_id, req!(w::channels::DeleteChannel))?))
        }

        MessageType::POST_MESSAGE => {
            Ok(Some(messages::post_message(ctx, session_id, req!(w::messages::PostMessage)).await?))
        }
        MessageType::LIST_MESSAGES => {
            Ok(Some(messages::list_messages(ctx, req!(w::messages::ListMessages))?))
        }
        MessageType::EDIT_MESSAGE => {
            Ok(Some(messages::edit_message(ctx, session_id, req!(w::messages::EditMessage)).await?))
        }
        MessageType::DELETE_MESSAGE => {
            Ok(Some(messages::delete_message(ctx, session_id, req!(w::messages::DeleteMessage)).await?))
        }

        MessageType::SUBSCRIBE_THREAD => Ok(Some(subscriptions::subscribe_thread(
            ctx,
            session_id,
            req!(w::subscriptions::SubscribeThread),
        )?)),
        MessageType::UNSUBSCRIBE_THREAD => Ok(Some(subscriptions::unsubscribe_thread(
            ctx,
            session_id,
            req!(w::subscriptions::UnsubscribeThread),
        )?)),
        MessageType::SUBSCRIBE_CHANNEL => Ok(Some(subscriptions::subscribe_channel(
            ctx,
            session_id,
            req!(w::subscriptions::SubscribeChannel),
        )?)),
        MessageType::UNSUBSCRIBE_CHANNEL => Ok(Some(subscriptions::unsubscribe_channel(
            ctx,
            session_id,
            req!(w::subscriptions::UnsubscribeChannel),
        )?)),

        MessageType::GET_USER_INFO => {
            Ok(Some(presence::get_user_info(ctx, req!(w::presence::GetUserInfo))?))
        }
        MessageType::LIST_USERS => Ok(Some(presence::list_users(ctx, req!(w::presence::ListUsers))?)),
        MessageType::LIST_CHANNEL_USERS => {
            Ok(Some(presence::list_channel_users(ctx, req!(w::presence::ListChannelUsers))?))
        }

        MessageType::BAN_USER => Ok(Some(admin::ban_user(ctx, session_id, req!(w::admin::BanUser))?)),
        MessageType::BAN_IP => Ok(Some(admin::ban_ip(ctx, session_id, req!(w::admin::BanIp))?)),
        MessageType::UNBAN_USER => Ok(Some(admin::unban_user(ctx, session_id, req!(w::admin::UnbanUser))?)),
        MessageType::UNBAN_IP => Ok(Some(admin::unban_ip(ctx, session_id, req!(w::admin::UnbanIp))?)),
        MessageType::LIST_BANS => Ok(Some(admin::list_bans(ctx, session_id, req!(w::admin::ListBans))?)),
        MessageType::DELETE_USER => Ok(Some(admin::delete_user(ctx, session_id, req!(w::admin::DeleteUser))?)),

        MessageType::START_DM => {
            dm::start_dm(ctx, session_id, req!(w::dm::StartDm)).await?;
            Ok(None)
        }
        MessageType::PROVIDE_PUBLIC_KEY => {
            dm::provide_public_key(ctx, session_id, req!(w::dm::ProvidePublicKey)).await?;
            Ok(None)
        }
        MessageType::ALLOW_UNENCRYPTED => {
            dm::allow_unencrypted(ctx, session_id, req!(w::dm::AllowUnencrypted)).await?;
            Ok(None)
        }
        MessageType::DECLINE_DM => {
            dm::decline_dm(ctx, session_id, req!(w::dm::DeclineDm)).await?;
            Ok(None)
        }

        MessageType::LIST_SERVERS => {
            Ok(Some(directory::list_servers(ctx, req!(w::directory::ListServers))?))
        }
        MessageType::REGISTER_SERVER => Ok(Some(directory::register_server(
            ctx,
            session_id,
            req!(w::directory::RegisterServer),
        )?)),
        MessageType::HEARTBEAT => {
            Ok(Some(directory::heartbeat(ctx, session_id, req!(w::directory::Heartbeat))?))
        }

        other => Err(HandlerError::new(
            ErrorCode::UnsupportedType,
            format!("unsupported message type {:#04x} ({})", other.0, other.name()),
        )),
    }
}
