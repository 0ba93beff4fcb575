//! Statistics and health reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::session::Session;
use crate::status::GenerationStatus;

/// Share of capacity above which the store reports itself degraded
pub const HIGH_WATER_RATIO: f64 = 0.9;

/// Counters of everything the store has destroyed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupStats {
    /// Every destroyed session, whatever the reason
    pub sessions_cleaned: u64,
    /// Sessions removed because their TTL ran out
    pub expired_cleaned: u64,
    /// Sessions removed to make room for a new one
    pub capacity_evictions: u64,
    /// Sessions removed by an explicit delete
    pub explicit_removals: u64,
    /// Metadata and blob files deleted from disk
    pub files_cleaned: u64,
    /// Last time an expiry sweep removed at least one session
    pub last_cleanup: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatistics {
    pub active_count: usize,
    pub total_modules: usize,
    pub completed_modules: usize,
    /// Completed modules as a percentage of all selected modules
    pub completion_rate: f64,
    /// Module count per generation status, across all sessions
    pub status_distribution: BTreeMap<GenerationStatus, usize>,
    pub cleanup: CleanupStats,
    pub session_timeout_hours: f64,
    pub max_concurrent_sessions: usize,
}

impl SessionStatistics {
    pub fn collect<'a, I>(
        sessions: I,
        cleanup: CleanupStats,
        session_timeout_hours: f64,
        max_concurrent_sessions: usize,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut active_count = 0;
        let mut total_modules = 0;
        let mut completed_modules = 0;
        let mut status_distribution = BTreeMap::new();

        for session in sessions {
            active_count += 1;
            total_modules += session.selected_modules.len();
            completed_modules += session.completed_count();

            for status in session.generation_status.values() {
                *status_distribution.entry(*status).or_insert(0) += 1;
            }
        }

        let completion_rate = if total_modules > 0 {
            completed_modules as f64 / total_modules as f64 * 100.0
        } else {
            0.0
        };

        Self {
            active_count,
            total_modules,
            completed_modules,
            completion_rate,
            status_distribution,
            cleanup,
            session_timeout_hours,
            max_concurrent_sessions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Working, but close to the session limit
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    pub initialized: bool,
    pub session_dir_accessible: bool,
    pub checked_at: DateTime<Utc>,
    pub statistics: SessionStatistics,
}

impl HealthReport {
    pub fn evaluate(
        initialized: bool,
        probe_error: Option<String>,
        statistics: SessionStatistics,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let high_water = statistics.max_concurrent_sessions as f64 * HIGH_WATER_RATIO;

        let (status, message) = match &probe_error {
            Some(e) => (
                HealthStatus::Unhealthy,
                format!("Session directory not writable: {e}"),
            ),
            None if !initialized => (HealthStatus::Unhealthy, "Not initialized".to_string()),
            None if statistics.active_count as f64 > high_water => {
                (HealthStatus::Degraded, "High session count".to_string())
            }
            None => (
                HealthStatus::Healthy,
                "All systems operational".to_string(),
            ),
        };

        Self {
            status,
            message,
            initialized,
            session_dir_accessible: probe_error.is_none(),
            checked_at,
            statistics,
        }
    }
}
