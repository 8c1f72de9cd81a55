//! SSH transport (spec §6 "SSH authentication"): key-only, with
//! auto-registration of unknown users rate-limited per source IP.
//!
//! `russh`'s `Handler` delivers channel bytes via callbacks rather than an
//! `AsyncRead`, so each session bridges through [`super::push_decoder::PushDecoder`]
//! into the same [`gateway::run`] loop the other transports share.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use russh::server::{Auth, Config as RusshConfig, Handler, Msg, Server as RusshServer, Session};
use russh::{Channel, ChannelId, CryptoVec};
use russh_keys::key::{KeyPair, PublicKey};
use tokio::sync::mpsc;

use crate::dispatch::context::Context;
use crate::protocol::codec::FrameCodec;
use crate::protocol::frame::PROTOCOL_V2;
use crate::security::password;
use crate::security::rate_limit::IpRateLimiter;
use crate::session::SINK_BUFFER;
use crate::store::user::FLAG_ADMIN;
use crate::transport::gateway::{self, PreAuthenticated};
use crate::transport::push_decoder::PushDecoder;

pub async fn listen(ctx: Context, bind_addr: &str) -> anyhow::Result<()> {
    let key_pair = load_or_generate_host_key(Path::new(&ctx.config.ssh.host_key_path))?;
    let auto_register_limiter = Arc::new(IpRateLimiter::per_hour(
        ctx.config.ssh.auto_registrations_per_hour_per_ip,
    ));

    let mut config = RusshConfig::default();
    config.keys = vec![key_pair];
    let config = Arc::new(config);

    tracing::info!(%bind_addr, "SSH transport listening");
    let server = SshServerHandler {
        ctx,
        auto_register_limiter,
    };
    russh::server::run(config, bind_addr, server).await?;
    Ok(())
}

/// Loads the configured host key, generating and persisting an ed25519 key
/// the first time the server runs. A corrupt existing file is fatal at
/// startup, per spec.
fn load_or_generate_host_key(path: &Path) -> anyhow::Result<KeyPair> {
    if path.exists() {
        return russh_keys::load_secret_key(path, None)
            .map_err(|e| anyhow::anyhow!("loading SSH host key at {}: {e}", path.display()));
    }
    tracing::warn!(path = %path.display(), "no SSH host key found, generating one");
    let key = KeyPair::generate_ed25519()
        .ok_or_else(|| anyhow::anyhow!("failed to generate ed25519 host key"))?;
    let pem = russh_keys::encode_pkcs8_pem(&key)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&pem)?;
    Ok(key)
}

#[derive(Clone)]
struct SshServerHandler {
    ctx: Context,
    auto_register_limiter: Arc<IpRateLimiter>,
}

impl RusshServer for SshServerHandler {
    type Handler = SshSession;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> SshSession {
        SshSession {
            ctx: self.ctx.clone(),
            auto_register_limiter: self.auto_register_limiter.clone(),
            peer_addr,
            identity: None,
            inbound: None,
        }
    }
}

struct SshSession {
    ctx: Context,
    auto_register_limiter: Arc<IpRateLimiter>,
    peer_addr: Option<SocketAddr>,
    identity: Option<PreAuthenticated>,
    inbound: Option<mpsc::Sender<Bytes>>,
}

#[async_trait]
impl Handler for SshSession {
    type Error = anyhow::Error;

    /// Resolves identity by public-key fingerprint. `russh` has already
    /// verified the signature by the time this runs — this is policy only:
    /// look the fingerprint up, or auto-register a new user for it.
    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        let fingerprint = public_key.fingerprint();
        let ip = self
            .peer_addr
            .map(|a| a.ip().to_string())
            .unwrap_or_default();

        if let Some(key) = self.ctx.store.ssh_key_by_fingerprint(&fingerprint) {
            let Some(owner) = self.ctx.store.user_by_id(key.user_id) else {
                return Ok(reject());
            };
            let ban = self.ctx.store.get_active_ban_for_user(Some(owner.id), None);
            if matches!(&ban, Some(b) if !b.shadowban) {
                return Ok(reject());
            }
            self.ctx.store.touch_ssh_key_last_used(key.id);
            let flags = self.effective_flags(&owner.nickname, owner.flags);
            self.identity = Some(PreAuthenticated {
                user_id: owner.id,
                nickname: owner.nickname,
                flags,
                shadowbanned: ban.is_some(),
            });
            return Ok(Auth::Accept);
        }

        if self.ctx.store.user_by_nickname(user).is_some() {
            // Nickname taken by a different identity than this key — refuse
            // rather than silently attaching the key to someone else's account.
            return Ok(reject());
        }
        if !self.auto_register_limiter.check(&ip) {
            return Ok(reject());
        }

        let random_hash = match password::hash_password(&password::random_password()) {
            Ok(hash) => hash,
            Err(_) => return Ok(reject()),
        };
        let Ok(new_user) = self.ctx.store.create_user(user.to_string(), random_hash, 0) else {
            return Ok(reject());
        };
        let key_type = public_key.name().to_string();
        if self
            .ctx
            .store
            .add_ssh_key(
                new_user.id,
                fingerprint,
                encode_public_key_line(public_key),
                key_type,
                "auto-registered".into(),
            )
            .is_err()
        {
            return Ok(reject());
        }

        let flags = self.effective_flags(&new_user.nickname, new_user.flags);
        self.identity = Some(PreAuthenticated {
            user_id: new_user.id,
            nickname: new_user.nickname,
            flags,
            shadowbanned: false,
        });
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let channel_id = channel.id();
        let handle = session.handle();
        let (raw_tx, raw_rx) = mpsc::channel::<Bytes>(SINK_BUFFER);
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(SINK_BUFFER);
        self.inbound = Some(raw_tx);

        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if handle
                    .data(channel_id, CryptoVec::from(bytes.to_vec()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let decoder = PushDecoder::new(FrameCodec::new(), raw_rx);
        let remote_addr = self.peer_addr.map(|a| a.to_string());
        tokio::spawn(gateway::run(
            self.ctx.clone(),
            decoder,
            out_tx,
            remote_addr,
            PROTOCOL_V2,
            self.identity.clone(),
        ));

        Ok(true)
    }

    async fn data(
        &mut self,
        _channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Bytes::copy_from_slice(data)).await;
        }
        Ok(())
    }
}

impl SshSession {
    fn effective_flags(&self, nickname: &str, stored_flags: u8) -> u8 {
        if self.ctx.is_admin_nickname(nickname) {
            stored_flags | FLAG_ADMIN
        } else {
            stored_flags
        }
    }
}

fn reject() -> Auth {
    Auth::Reject {
        proceed_with_methods: None,
    }
}

fn encode_public_key_line(key: &PublicKey) -> String {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    format!("{} {}", key.name(), BASE64.encode(key.public_key_bytes()))
}
