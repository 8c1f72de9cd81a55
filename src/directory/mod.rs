//! Directory coordinator: peer verification handshake and heartbeat cadence.
//!
//! Grounded on the gateway's `node_hello` → `gateway_welcome` exchange in
//! `nodes::ws::handle_socket`, widened into an explicit state enum with a
//! `step()` method to cover the extra `VERIFY_REGISTRATION`/`VERIFY_RESPONSE`
//! challenge round this protocol adds on top of that simpler hello/welcome.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use rand::RngCore;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::config::Config;
use crate::protocol::codec::FrameCodec;
use crate::protocol::frame::Frame;
use crate::protocol::payloads::connection::ServerConfig;
use crate::protocol::payloads::directory::{
    RegisterAck, RegisterServer, VerifyRegistration, VerifyResponse,
};
use crate::protocol::types::MessageType;

/// Connect+read deadline for a single dial-back attempt (spec: 10s).
pub const DIAL_BACK_DEADLINE: Duration = Duration::from_secs(10);

/// Directory size → heartbeat cadence, per the size-tiered policy.
pub fn adaptive_heartbeat_interval(directory_size: usize) -> Duration {
    if directory_size < 100 {
        Duration::from_secs(5 * 60)
    } else if directory_size < 1000 {
        Duration::from_secs(10 * 60)
    } else if directory_size < 5000 {
        Duration::from_secs(30 * 60)
    } else {
        Duration::from_secs(60 * 60)
    }
}

/// Outbound step effects a [`Handshake`] wants the caller (the actual dialer,
/// which owns the TCP/TLS connection) to perform.
#[derive(Debug, Clone)]
pub enum HandshakeAction {
    Send(HandshakeMessage),
    /// Handshake finished; `bool` is whether verification succeeded.
    Finish(bool),
}

#[derive(Debug, Clone)]
pub enum HandshakeMessage {
    VerifyRegistration(VerifyRegistration),
    Disconnect,
}

#[derive(Debug, Clone)]
pub enum HandshakeEvent {
    ServerConfig(ServerConfig),
    VerifyResponse(VerifyResponse),
    ConnectionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    AwaitingServerConfig,
    AwaitingVerifyResponse,
    Done,
}

/// The directory side of a reachability verification: dial the claimed
/// `host:port`, read its `SERVER_CONFIG`, issue a random challenge, and
/// require the identical value back before trusting the registration.
pub struct Handshake {
    state: HandshakeState,
    expected_protocol_version: u8,
    challenge: u64,
}

impl Handshake {
    pub fn new(expected_protocol_version: u8) -> Self {
        let mut buf = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut buf);
        Self {
            state: HandshakeState::AwaitingServerConfig,
            expected_protocol_version,
            challenge: u64::from_be_bytes(buf),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == HandshakeState::Done
    }

    /// Advances the state machine on an incoming event, returning the
    /// actions the caller should perform (send a frame, or conclude).
    pub fn step(&mut self, event: HandshakeEvent) -> Vec<HandshakeAction> {
        match (self.state, event) {
            (HandshakeState::AwaitingServerConfig, HandshakeEvent::ServerConfig(cfg)) => {
                if cfg.protocol_version != self.expected_protocol_version {
                    self.state = HandshakeState::Done;
                    return vec![HandshakeAction::Finish(false)];
                }
                self.state = HandshakeState::AwaitingVerifyResponse;
                vec![HandshakeAction::Send(HandshakeMessage::VerifyRegistration(
                    VerifyRegistration {
                        challenge: self.challenge,
                    },
                ))]
            }
            (HandshakeState::AwaitingVerifyResponse, HandshakeEvent::VerifyResponse(resp)) => {
                self.state = HandshakeState::Done;
                let ok = resp.challenge == self.challenge;
                vec![
                    HandshakeAction::Finish(ok),
                    HandshakeAction::Send(HandshakeMessage::Disconnect),
                ]
            }
            (_, HandshakeEvent::ConnectionClosed) => {
                self.state = HandshakeState::Done;
                vec![HandshakeAction::Finish(false)]
            }
            // Any message out of sequence is a protocol violation; fail closed.
            _ => {
                self.state = HandshakeState::Done;
                vec![HandshakeAction::Finish(false)]
            }
        }
    }
}

/// Dials `host:port`, runs the reachability [`Handshake`] over a fresh TCP
/// connection, and returns whether verification succeeded. Bounded by
/// [`DIAL_BACK_DEADLINE`] end to end; any I/O error or timeout is a failure.
pub async fn verify_reachability(host: &str, port: u16, expected_protocol_version: u8) -> bool {
    match timeout(DIAL_BACK_DEADLINE, dial(host, port, expected_protocol_version)).await {
        Ok(result) => result,
        Err(_) => false,
    }
}

async fn dial(host: &str, port: u16, expected_protocol_version: u8) -> bool {
    let stream = match TcpStream::connect((host, port)).await {
        Ok(s) => s,
        Err(_) => return false,
    };
    let mut framed = Framed::new(stream, FrameCodec::new());
    let mut handshake = Handshake::new(expected_protocol_version);

    let Some(Ok(first)) = framed.next().await else {
        return false;
    };
    if first.msg_type != MessageType::SERVER_CONFIG {
        return false;
    }
    let Ok(cfg) = ServerConfig::decode(&mut &first.payload[..]) else {
        return false;
    };

    for action in handshake.step(HandshakeEvent::ServerConfig(cfg)) {
        match action {
            HandshakeAction::Finish(success) => return success,
            HandshakeAction::Send(msg) => send_message(&mut framed, msg).await,
        }
    }

    let Some(Ok(second)) = framed.next().await else {
        return false;
    };
    if second.msg_type != MessageType::VERIFY_RESPONSE {
        return false;
    }
    let Ok(resp) = VerifyResponse::decode(&mut &second.payload[..]) else {
        return false;
    };

    let mut ok = false;
    for action in handshake.step(HandshakeEvent::VerifyResponse(resp)) {
        match action {
            HandshakeAction::Finish(success) => ok = success,
            HandshakeAction::Send(msg) => send_message(&mut framed, msg).await,
        }
    }
    ok
}

async fn send_message(framed: &mut Framed<TcpStream, FrameCodec>, msg: HandshakeMessage) {
    let frame = match msg {
        HandshakeMessage::VerifyRegistration(v) => {
            let mut buf = bytes::BytesMut::new();
            v.encode(&mut buf);
            Frame::new(crate::protocol::frame::PROTOCOL_V1, MessageType::VERIFY_REGISTRATION, buf.freeze())
        }
        HandshakeMessage::Disconnect => {
            Frame::new(crate::protocol::frame::PROTOCOL_V1, MessageType::DISCONNECT, Bytes::new())
        }
    };
    let _ = framed.send(frame.encode()).await;
}

/// Deadline for a single leaf-side announce attempt (spec: up to 30s).
pub const ANNOUNCE_DEADLINE: Duration = Duration::from_secs(30);

/// Announces this server to every configured directory peer (spec §4.7,
/// "Announcing to a directory"). Opens a transient connection per peer,
/// performs the `SERVER_CONFIG` handshake, sends `REGISTER_SERVER`, then
/// waits for either a `REGISTER_ACK` or an inline `VERIFY_REGISTRATION`
/// challenge on the same connection before disconnecting. No persistent
/// heartbeat connection is kept open here — each call is one-shot.
pub async fn announce_to_all_peers(config: &Config) {
    for peer in &config.directory.known_peers {
        let Some((host, port)) = split_host_port(peer) else {
            tracing::warn!(%peer, "invalid directory peer address, skipping");
            continue;
        };
        match timeout(ANNOUNCE_DEADLINE, announce_once(config, &host, port)).await {
            Ok(Ok(())) => tracing::info!(%peer, "announced to directory"),
            Ok(Err(e)) => tracing::warn!(%peer, error = %e, "directory announce failed"),
            Err(_) => tracing::warn!(%peer, "directory announce timed out"),
        }
    }
}

fn split_host_port(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    Some((host.to_string(), port.parse().ok()?))
}

async fn announce_once(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let stream = TcpStream::connect((host, port)).await?;
    let mut framed = Framed::new(stream, FrameCodec::new());

    let Some(Ok(first)) = framed.next().await else {
        anyhow::bail!("connection closed before SERVER_CONFIG");
    };
    if first.msg_type != MessageType::SERVER_CONFIG {
        anyhow::bail!("expected SERVER_CONFIG, got {:?}", first.msg_type);
    }
    ServerConfig::decode(&mut &first.payload[..])?;

    let register = RegisterServer {
        hostname: config
            .server
            .public_hostname
            .clone()
            .unwrap_or_else(|| host.to_string()),
        port: config.server.tcp_port,
        name: config.server.name.clone(),
        description: config.server.description.clone(),
        max_users: config.server.max_users,
        is_public: true,
    };
    let mut buf = bytes::BytesMut::new();
    register.encode(&mut buf);
    let frame = Frame::new(
        crate::protocol::frame::PROTOCOL_V2,
        MessageType::REGISTER_SERVER,
        buf.freeze(),
    );
    framed.send(frame.encode()).await?;

    let Some(Ok(second)) = framed.next().await else {
        anyhow::bail!("connection closed before an ack or challenge");
    };
    if second.msg_type == MessageType::VERIFY_REGISTRATION {
        let challenge = VerifyRegistration::decode(&mut &second.payload[..])?;
        let resp = VerifyResponse {
            challenge: challenge.challenge,
        };
        let mut buf = bytes::BytesMut::new();
        resp.encode(&mut buf);
        let frame = Frame::new(
            crate::protocol::frame::PROTOCOL_V2,
            MessageType::VERIFY_RESPONSE,
            buf.freeze(),
        );
        framed.send(frame.encode()).await?;
    } else if second.msg_type == MessageType::REGISTER_ACK {
        let ack = RegisterAck::decode(&mut &second.payload[..])?;
        if !ack.success {
            anyhow::bail!("directory rejected registration: {}", ack.message);
        }
    } else {
        anyhow::bail!("unexpected message after REGISTER_SERVER: {:?}", second.msg_type);
    }

    let disconnect = Frame::new(
        crate::protocol::frame::PROTOCOL_V2,
        MessageType::DISCONNECT,
        Bytes::new(),
    );
    let _ = framed.send(disconnect.encode()).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_interval_tiers() {
        assert_eq!(adaptive_heartbeat_interval(0), Duration::from_secs(300));
        assert_eq!(adaptive_heartbeat_interval(500), Duration::from_secs(600));
        assert_eq!(adaptive_heartbeat_interval(2000), Duration::from_secs(1800));
        assert_eq!(adaptive_heartbeat_interval(10_000), Duration::from_secs(3600));
    }

    #[test]
    fn happy_path_handshake_succeeds() {
        let mut hs = Handshake::new(2);
        let actions = hs.step(HandshakeEvent::ServerConfig(ServerConfig {
            sid: "peer".into(),
            server_name: "Peer".into(),
            description: String::new(),
            max_users: 100,
            protocol_version: 2,
        }));
        let challenge = match &actions[0] {
            HandshakeAction::Send(HandshakeMessage::VerifyRegistration(v)) => v.challenge,
            _ => panic!("expected a VerifyRegistration to be sent"),
        };
        let actions = hs.step(HandshakeEvent::VerifyResponse(VerifyResponse { challenge }));
        assert!(matches!(actions[0], HandshakeAction::Finish(true)));
        assert!(hs.is_done());
    }

    #[test]
    fn mismatched_challenge_fails() {
        let mut hs = Handshake::new(2);
        hs.step(HandshakeEvent::ServerConfig(ServerConfig {
            sid: "peer".into(),
            server_name: "Peer".into(),
            description: String::new(),
            max_users: 100,
            protocol_version: 2,
        }));
        let actions = hs.step(HandshakeEvent::VerifyResponse(VerifyResponse {
            challenge: 0,
        }));
        assert!(matches!(actions[0], HandshakeAction::Finish(false)));
    }

    #[test]
    fn version_mismatch_fails_immediately() {
        let mut hs = Handshake::new(2);
        let actions = hs.step(HandshakeEvent::ServerConfig(ServerConfig {
            sid: "peer".into(),
            server_name: "Peer".into(),
            description: String::new(),
            max_users: 100,
            protocol_version: 1,
        }));
        assert!(matches!(actions[0], HandshakeAction::Finish(false)));
    }
}
