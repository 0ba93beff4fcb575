//! Studio state container
//!
//! Opens the session store described by a [`Config`], restores what is on
//! disk and keeps the expiry sweep running for as long as it lives.

use std::sync::Arc;

use aplus_session::{Clock, HealthReport, LoadReport, SessionStore, SystemClock};

use crate::config::Config;
use crate::sweeper::Sweeper;
use crate::Result;

pub struct Studio {
    config: Config,
    store: Arc<SessionStore>,
    load_report: LoadReport,
    sweeper: Option<Sweeper>,
}

impl Studio {
    /// Open and initialize the store, then start the sweeper if configured
    pub fn start(config: Config) -> Result<Self> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    pub fn start_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Arc::new(SessionStore::open_with_clock(config.store_config()?, clock)?);
        let load_report = store.initialize()?;

        let sweeper = match config.sweep_interval() {
            Some(interval) => Some(Sweeper::start(Arc::clone(&store), interval)?),
            None => None,
        };

        tracing::info!(
            session_dir = %config.session_dir.display(),
            sessions = store.len(),
            sweeping = sweeper.is_some(),
            "Studio started"
        );

        Ok(Self {
            config,
            store,
            load_report,
            sweeper,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// What the startup scan found
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }

    pub fn health_check(&self) -> HealthReport {
        self.store.health_check()
    }

    /// Stop the sweeper. Sessions stay on disk for the next start.
    pub fn shutdown(mut self) {
        if let Some(mut sweeper) = self.sweeper.take() {
            sweeper.stop();
        }
        tracing::info!(sessions = self.store.len(), "Studio shut down");
    }
}
