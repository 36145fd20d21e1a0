//! Per-address throttling for credential issuance.
//!
//! Windowed hit counter keyed by caller IP, held in process memory. Not
//! distributed; each relay instance enforces its own window.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Entry {
    count: u32,
    reset_at: Instant,
}

/// Counts hits per address inside a rolling window.
pub struct RateLimiter {
    window: Duration,
    max_hits: u32,
    hits: Mutex<HashMap<IpAddr, Entry>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_hits: u32) -> Self {
        Self {
            window,
            max_hits,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for the address.
    ///
    /// Returns how long the caller should wait when the window is
    /// exhausted.
    pub fn check(&self, addr: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = hits.entry(addr).or_insert_with(|| Entry {
            count: 0,
            reset_at: now + self.window,
        });
        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count >= self.max_hits {
            return Err(entry.reset_at.saturating_duration_since(now));
        }

        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, last))
    }

    #[test]
    fn allows_up_to_the_cap() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        for _ in 0..3 {
            assert!(limiter.check(addr(1)).is_ok());
        }
        let retry = limiter.check(addr(1)).unwrap_err();
        assert!(retry <= Duration::from_secs(60));
    }

    #[test]
    fn addresses_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.check(addr(1)).is_ok());
        assert!(limiter.check(addr(1)).is_err());
        assert!(limiter.check(addr(2)).is_ok());
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);
        assert!(limiter.check(addr(1)).is_ok());
        assert!(limiter.check(addr(1)).is_err());

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check(addr(1)).is_ok());
    }
}
