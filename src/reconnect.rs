//! Reconnect throttling: how long a connection should wait before trying
//! again after a failure.
//!
//! The interesting implementation is [`ExpBackoffReconnect`], a
//! decorrelated-jitter exponential backoff tracked per connection. The
//! whole map-plus-tracker critical section is guarded by a single
//! [`std::sync::Mutex`] rather than `dashmap`, because every lookup here
//! either creates-or-updates the tracker and resets it atomically —
//! splitting those into separate lock acquisitions would race.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Stable identity for a connection, used as the tracker map key in place
/// of the original's pointer identity (`*Connection`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    pub fn next() -> ConnId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Decides how long to wait before a connection's next reconnect attempt.
pub trait ReconnectThrottle: Send + Sync {
    fn get_backoff(&self, conn: ConnId, now: Instant) -> Duration;
    fn conn_closed(&self, conn: ConnId);
}

/// A throttle for connections that never reconnect. Calling either method
/// is a caller bug — there is no backoff to compute.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReconnect;

impl ReconnectThrottle for NoReconnect {
    fn get_backoff(&self, _conn: ConnId, _now: Instant) -> Duration {
        unimplemented!("NoReconnect connections never reconnect")
    }

    fn conn_closed(&self, _conn: ConnId) {
        unimplemented!("NoReconnect connections never reconnect")
    }
}

/// A throttle with a single fixed backoff, irrespective of connection or
/// history.
#[derive(Debug, Clone, Copy)]
pub struct DurationReconnect {
    dur: Duration,
}

impl DurationReconnect {
    pub fn new(dur: Duration) -> Self {
        DurationReconnect { dur }
    }
}

impl ReconnectThrottle for DurationReconnect {
    fn get_backoff(&self, _conn: ConnId, _now: Instant) -> Duration {
        self.dur
    }

    fn conn_closed(&self, _conn: ConnId) {}
}

struct Tracker {
    cap: Duration,
    backoff: Duration,
    update_time: Instant,
}

/// Exponential backoff with decorrelated jitter (cf. the AWS Architecture
/// Blog's "Exponential Backoff And Jitter"), tracked independently per
/// connection.
///
/// `rand_fn(max_nanos)` must return a value in `0..=max_nanos`; production
/// callers use [`ExpBackoffReconnect::new`], which wires in [`rand`]. Tests
/// inject a deterministic function to reproduce exact backoff sequences.
pub struct ExpBackoffReconnect {
    rand_fn: Box<dyn Fn(u64) -> u64 + Send + Sync>,
    base: Duration,
    cap: Duration,
    reset: Duration,
    trackers: Mutex<HashMap<ConnId, Tracker>>,
}

impl ExpBackoffReconnect {
    pub fn new(base: Duration, cap: Duration, reset: Duration) -> Self {
        Self::with_rand_fn(
            |max| {
                if max == 0 {
                    0
                } else {
                    rand::Rng::random_range(&mut rand::rng(), 0..=max)
                }
            },
            base,
            cap,
            reset,
        )
    }

    /// Builds a throttle from a [`crate::config::BackoffConfig`].
    pub fn from_config(cfg: &crate::config::BackoffConfig) -> Self {
        Self::new(cfg.base, cfg.cap, cfg.reset)
    }

    /// Builds a throttle with an injectable jitter source, for deterministic
    /// tests.
    pub fn with_rand_fn(
        rand_fn: impl Fn(u64) -> u64 + Send + Sync + 'static,
        base: Duration,
        cap: Duration,
        reset: Duration,
    ) -> Self {
        ExpBackoffReconnect {
            rand_fn: Box::new(rand_fn),
            base,
            cap,
            reset,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// A new cap with jitter: within 1/8 of `self.cap`, always <= it.
    fn new_cap(&self) -> Duration {
        let window = self.cap / 8;
        let jitter = Duration::from_nanos((self.rand_fn)(window.as_nanos() as u64));
        self.cap.saturating_sub(jitter)
    }
}

impl ReconnectThrottle for ExpBackoffReconnect {
    fn get_backoff(&self, conn: ConnId, now: Instant) -> Duration {
        let mut trackers = self.trackers.lock().unwrap();
        let is_new = !trackers.contains_key(&conn);
        let tracker = trackers.entry(conn).or_insert_with(|| Tracker {
            backoff: self.base,
            cap: self.new_cap(),
            update_time: now,
        });

        if is_new {
            tracing::debug!(?conn, "reconnect tracker created");
        } else if tracker.update_time + self.reset < now {
            tracker.backoff = self.base;
            tracing::debug!(?conn, "reconnect tracker reset after idle period");
        }
        tracker.update_time = now;

        let max_backoff = tracker.backoff.saturating_mul(3);
        let headroom = max_backoff.saturating_sub(self.base);
        let mut new_backoff = if headroom > Duration::ZERO {
            let val = (self.rand_fn)(headroom.as_nanos() as u64) + self.base.as_nanos() as u64;
            Duration::from_nanos(val)
        } else {
            self.base
        };
        if new_backoff > tracker.cap {
            new_backoff = tracker.cap;
        }

        tracker.backoff = new_backoff;
        new_backoff
    }

    fn conn_closed(&self, conn: ConnId) {
        let mut trackers = self.trackers.lock().unwrap();
        trackers.remove(&conn);
        tracing::debug!(?conn, "connection closed, reconnect tracker dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn duration_reconnect_returns_fixed_backoff() {
        let r = DurationReconnect::new(ms(42));
        assert_eq!(r.get_backoff(ConnId::next(), Instant::now()), ms(42));
    }

    #[test]
    fn exp_backoff_steps_to_cap_with_max_jitter() {
        let r = ExpBackoffReconnect::with_rand_fn(|max| max, ms(1), ms(200), Duration::from_secs(300));
        let conn = ConnId::next();
        let now = Instant::now();

        assert_eq!(r.get_backoff(conn, now), ms(3));
        assert_eq!(r.get_backoff(conn, now), ms(9));
        assert_eq!(r.get_backoff(conn, now), ms(27));
        assert_eq!(r.get_backoff(conn, now), ms(81));
        assert_eq!(r.get_backoff(conn, now), ms(175));
        assert_eq!(r.get_backoff(conn, now), ms(175));

        let later = now + Duration::from_secs(310);
        assert_eq!(r.get_backoff(conn, later), ms(3));
    }

    #[test]
    fn exp_backoff_steps_to_base_with_min_jitter() {
        let r = ExpBackoffReconnect::with_rand_fn(|_max| 0, ms(1), ms(200), Duration::from_secs(300));
        let conn = ConnId::next();
        let now = Instant::now();

        assert_eq!(r.get_backoff(conn, now), ms(1));
        assert_eq!(r.get_backoff(conn, now), ms(1));
        assert_eq!(r.get_backoff(conn, now), ms(1));

        let later = now + Duration::from_secs(310);
        assert_eq!(r.get_backoff(conn, later), ms(1));
    }

    #[test]
    fn exp_backoff_tracks_connections_independently() {
        let r = ExpBackoffReconnect::with_rand_fn(|max| max, ms(1), ms(200), Duration::from_secs(300));
        let c1 = ConnId::next();
        let c2 = ConnId::next();
        let now = Instant::now();

        assert_eq!(r.get_backoff(c1, now), ms(3));
        assert_eq!(r.get_backoff(c2, now), ms(3));
        assert_eq!(r.get_backoff(c1, now), ms(9));
        assert_eq!(r.get_backoff(c2, now), ms(9));
    }

    #[test]
    fn conn_closed_clears_tracker_state() {
        let r = ExpBackoffReconnect::with_rand_fn(|max| max, ms(1), ms(200), Duration::from_secs(300));
        let conn = ConnId::next();
        let now = Instant::now();

        assert_eq!(r.get_backoff(conn, now), ms(3));
        assert_eq!(r.get_backoff(conn, now), ms(9));
        r.conn_closed(conn);
        assert_eq!(r.get_backoff(conn, now), ms(3));
    }
}
