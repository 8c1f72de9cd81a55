//! Per-IP rate limiting for directory registrations and SSH auto-registration,
//! via `governor`'s keyed token-bucket limiter — one bucket per source IP,
//! refilled at the configured hourly quota.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};

type Limiter = RateLimiter<
    String,
    governor::state::keyed::DefaultKeyedStateStore<String>,
    governor::clock::DefaultClock,
>;

pub struct IpRateLimiter {
    limiter: Limiter,
}

impl IpRateLimiter {
    /// `per_hour` is the number of allowed events per source IP per hour.
    pub fn per_hour(per_hour: u32) -> Self {
        let quota = Quota::per_hour(NonZeroU32::new(per_hour.max(1)).expect("per_hour >= 1"));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Returns `true` if this IP is still under quota (and consumes one unit).
    pub fn check(&self, ip: &str) -> bool {
        self.limiter.check_key(&ip.to_string()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_quota_then_rejects() {
        let limiter = IpRateLimiter::per_hour(2);
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn tracks_ips_independently() {
        let limiter = IpRateLimiter::per_hour(1);
        assert!(limiter.check("1.1.1.1"));
        assert!(limiter.check("2.2.2.2"));
        assert!(!limiter.check("1.1.1.1"));
    }
}
