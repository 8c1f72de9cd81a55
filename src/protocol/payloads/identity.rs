use bytes::{Buf, BufMut};

use crate::protocol::wire::*;

#[derive(Debug, Clone)]
pub struct SetNickname {
    pub nickname: String,
}

impl SetNickname {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.nickname);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            nickname: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NicknameResponse {
    pub success: bool,
    pub nickname: String,
    pub message: String,
}

impl NicknameResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_string(buf, &self.nickname);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            nickname: get_string(buf)?,
            message: get_string(buf)?,
        })
    }
}

/// `password_hash` is produced client-side (argon2id) and carried as an
/// opaque string; the server never sees a plaintext password.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub nickname: String,
    pub password_hash: Option<String>,
}

impl RegisterUser {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.nickname);
        put_optional_string(buf, self.password_hash.as_deref());
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            nickname: get_string(buf)?,
            password_hash: get_optional_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: Option<u64>,
    pub message: String,
}

impl RegisterResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.user_id);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            user_id: get_optional_u64(buf)?,
            message: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub nickname: String,
    pub password_hash: String,
}

impl AuthRequest {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_string(buf, &self.nickname);
        put_string(buf, &self.password_hash);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            nickname: get_string(buf)?,
            password_hash: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: Option<u64>,
    pub flags: Option<u8>,
    pub message: String,
}

impl AuthResponse {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_optional_u64(buf, self.user_id);
        match self.flags {
            Some(f) => {
                buf.put_u8(1);
                buf.put_u8(f);
            }
            None => buf.put_u8(0),
        }
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        let success = get_u8(buf)? != 0;
        let user_id = get_optional_u64(buf)?;
        let flags = if get_present_flag(buf)? {
            Some(get_u8(buf)?)
        } else {
            None
        };
        let message = get_string(buf)?;
        Ok(Self {
            success,
            user_id,
            flags,
            message,
        })
    }
}

/// Empty payload — the dispatcher removes the session on receipt.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logout;

impl Logout {
    pub fn encode(&self, _buf: &mut impl BufMut) {}
    pub fn decode(_buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone)]
pub struct ChangePassword {
    pub old_password_hash: Option<String>,
    pub new_password_hash: String,
}

impl ChangePassword {
    pub fn encode(&self, buf: &mut impl BufMut) {
        put_optional_string(buf, self.old_password_hash.as_deref());
        put_string(buf, &self.new_password_hash);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            old_password_hash: get_optional_string(buf)?,
            new_password_hash: get_string(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PasswordChanged {
    pub success: bool,
    pub message: String,
}

impl PasswordChanged {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.success as u8);
        put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> DecodeResult<Self> {
        Ok(Self {
            success: get_u8(buf)? != 0,
            message: get_string(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn auth_response_round_trips_with_flags() {
        let resp = AuthResponse {
            success: true,
            user_id: Some(7),
            flags: Some(1),
            message: "ok".into(),
        };
        let mut buf = BytesMut::new();
        resp.encode(&mut buf);
        let mut read = buf.freeze();
        let decoded = AuthResponse::decode(&mut read).unwrap();
        assert_eq!(decoded.user_id, Some(7));
        assert_eq!(decoded.flags, Some(1));
    }

    #[test]
    fn auth_response_round_trips_without_flags() {
        let resp = AuthResponse {
            success: false,
            user_id: None,
            flags: None,
            message: "invalid credentials".into(),
        };
        let mut buf = BytesMut::new();
        resp.encode(&mut buf);
        let mut read = buf.freeze();
        let decoded = AuthResponse::decode(&mut read).unwrap();
        assert!(!decoded.success);
        assert_eq!(decoded.flags, None);
    }
}
