use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanTarget {
    User,
    Ip,
}

/// `cidr` holds a single IP or a CIDR block when `target == Ip`.
#[derive(Debug, Clone)]
pub struct Ban {
    pub id: u64,
    pub target: BanTarget,
    pub user_id: Option<u64>,
    pub cidr: Option<String>,
    pub reason: String,
    pub shadowban: bool,
    pub banned_at: DateTime<Utc>,
    pub banned_until: Option<DateTime<Utc>>,
    pub banned_by: String,
}

impl Ban {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.banned_until {
            Some(until) => now < until,
            None => true,
        }
    }
}
