use chrono::{DateTime, Utc};

pub const FLAG_ADMIN: u8 = 1;
pub const FLAG_MODERATOR: u8 = 2;

/// A registered account. `password_hash` is empty for SSH-only users.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub nickname: String,
    pub password_hash: String,
    pub flags: u8,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub encryption_public_key: Option<[u8; 32]>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.flags & FLAG_ADMIN != 0
    }

    pub fn is_moderator(&self) -> bool {
        self.flags & FLAG_MODERATOR != 0
    }

    pub fn is_ssh_only(&self) -> bool {
        self.password_hash.is_empty()
    }
}

/// Nickname rule: 3-20 chars, `[A-Za-z0-9_-]`.
pub fn is_valid_nickname(nickname: &str) -> bool {
    let len = nickname.chars().count();
    (3..=20).contains(&len)
        && nickname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_validation() {
        assert!(is_valid_nickname("abc"));
        assert!(is_valid_nickname("a_b-c123"));
        assert!(!is_valid_nickname("ab"));
        assert!(!is_valid_nickname(&"a".repeat(21)));
        assert!(!is_valid_nickname("has space"));
    }

    #[test]
    fn flag_bits() {
        let user = User {
            id: 1,
            nickname: "alice".into(),
            password_hash: String::new(),
            flags: FLAG_ADMIN,
            created_at: Utc::now(),
            last_seen: Utc::now(),
            encryption_public_key: None,
        };
        assert!(user.is_admin());
        assert!(!user.is_moderator());
        assert!(user.is_ssh_only());
    }
}
