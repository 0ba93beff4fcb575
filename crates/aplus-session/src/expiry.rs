//! TTL expiry
//!
//! A session expires once it has been idle, measured from `last_updated`,
//! for longer than the configured timeout. Time comes from a [`Clock`] so
//! tests can move it forward without sleeping.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

use crate::session::Session;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpiryResolver {
    timeout: chrono::Duration,
}

impl ExpiryResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Idle for strictly longer than the timeout
    pub fn is_expired_at(&self, last_updated: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_updated) > self.timeout
    }

    pub fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        self.is_expired_at(session.last_updated, now)
    }

    /// Ids of every expired session, sorted
    pub fn expired_ids<'a, I>(&self, sessions: I, now: DateTime<Utc>) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut ids: Vec<String> = sessions
            .into_iter()
            .filter(|s| self.is_expired(s, now))
            .map(|s| s.session_id.clone())
            .collect();
        ids.sort();
        ids
    }
}
