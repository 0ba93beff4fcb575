//! Store configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SessionError;
use crate::Result;

/// Construction-time settings of a [`SessionStore`](crate::SessionStore).
///
/// All three values are required; there are no implicit defaults here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    session_dir: PathBuf,
    session_timeout: Duration,
    max_concurrent_sessions: usize,
}

impl StoreConfig {
    pub fn new(
        session_dir: impl Into<PathBuf>,
        session_timeout: Duration,
        max_concurrent_sessions: usize,
    ) -> Result<Self> {
        if max_concurrent_sessions == 0 {
            return Err(SessionError::InvalidConfig(
                "max_concurrent_sessions must be at least 1".to_string(),
            ));
        }
        if session_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "session_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            session_dir: session_dir.into(),
            session_timeout,
            max_concurrent_sessions,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub fn max_concurrent_sessions(&self) -> usize {
        self.max_concurrent_sessions
    }
}
