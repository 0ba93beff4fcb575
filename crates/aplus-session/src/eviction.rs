//! Capacity eviction policy
//!
//! Least-recently-updated first. Ties on `last_updated` fall back to the
//! session id so the choice is deterministic.

use crate::session::Session;

#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionPolicy;

impl EvictionPolicy {
    pub fn pick_victim<'a, I>(&self, sessions: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a Session>,
    {
        sessions
            .into_iter()
            .min_by(|a, b| {
                a.last_updated
                    .cmp(&b.last_updated)
                    .then_with(|| a.session_id.cmp(&b.session_id))
            })
            .map(|s| s.session_id.clone())
    }

    /// The `count` oldest sessions, oldest first
    pub fn pick_victims<'a, I>(&self, sessions: I, count: usize) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut ordered: Vec<&Session> = sessions.into_iter().collect();
        ordered.sort_by(|a, b| {
            a.last_updated
                .cmp(&b.last_updated)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        ordered
            .into_iter()
            .take(count)
            .map(|s| s.session_id.clone())
            .collect()
    }
}
