//! Session Store
//!
//! The in-memory map of live sessions plus every public operation on it.
//! Every mutation is written through to disk as a full snapshot.
//!
//! Locking: one mutex guards the map and the counters. It is held only for
//! the in-memory part of an operation; the snapshot is cloned under the
//! lock and written after it is released. Two racing mutations of the same
//! session may therefore reach disk out of order. Memory stays
//! authoritative while the process runs.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::eviction::EvictionPolicy;
use crate::expiry::{Clock, ExpiryResolver, SystemClock};
use crate::module::ModuleType;
use crate::persistence::PersistenceLayer;
use crate::session::{Artifact, ArtifactMeta, GenerationConfig, MaterialSet, ProductInfo, Session};
use crate::stats::{CleanupStats, HealthReport, SessionStatistics};
use crate::status::GenerationStatus;
use crate::Result;

/// Why a session was destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Make room for a new session
    Capacity,
    /// Idle past the session timeout
    Expired,
    /// Caller asked for it
    Explicit,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Capacity => "capacity",
            EvictionReason::Expired => "expired",
            EvictionReason::Explicit => "explicit",
        }
    }
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of [`SessionStore::initialize`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub expired_removed: usize,
    pub corrupt_skipped: usize,
    /// Loaded sessions dropped again because the directory held more than
    /// the configured capacity
    pub evicted_over_capacity: usize,
}

struct StoreState {
    sessions: HashMap<String, Session>,
    cleanup: CleanupStats,
    initialized: bool,
}

pub struct SessionStore {
    state: Arc<Mutex<StoreState>>,
    config: StoreConfig,
    persistence: PersistenceLayer,
    expiry: ExpiryResolver,
    eviction: EvictionPolicy,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Open a store on its session directory. Nothing is loaded until
    /// [`initialize`](Self::initialize) is called.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let persistence = PersistenceLayer::open(config.session_dir())?;
        let expiry = ExpiryResolver::new(config.session_timeout());

        Ok(Self {
            state: Arc::new(Mutex::new(StoreState {
                sessions: HashMap::new(),
                cleanup: CleanupStats::default(),
                initialized: false,
            })),
            config,
            persistence,
            expiry,
            eviction: EvictionPolicy,
            clock,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Load persisted sessions, dropping expired and unreadable ones
    pub fn initialize(&self) -> Result<LoadReport> {
        let now = self.clock.now();
        let outcome = self.persistence.load_all(&self.expiry, now)?;

        let mut report = LoadReport {
            loaded: outcome.sessions.len(),
            expired_removed: outcome.expired_removed,
            corrupt_skipped: outcome.corrupt_skipped,
            evicted_over_capacity: 0,
        };

        let victims = {
            let mut state = self.state.lock();
            for session in outcome.sessions {
                state
                    .sessions
                    .entry(session.session_id.clone())
                    .or_insert(session);
            }

            let victims = self.make_room(&mut state, 0);
            state.initialized = true;
            victims
        };

        report.evicted_over_capacity = victims.len();
        self.destroy_on_disk(&victims, EvictionReason::Capacity);

        tracing::info!(
            loaded = report.loaded,
            expired = report.expired_removed,
            corrupt = report.corrupt_skipped,
            over_capacity = report.evicted_over_capacity,
            "Initialized session store"
        );

        Ok(report)
    }

    /// Start a new session with `NotStarted` status for every module.
    ///
    /// At capacity the least recently updated session is evicted first.
    pub fn create(
        &self,
        selected_modules: impl IntoIterator<Item = ModuleType>,
        config: GenerationConfig,
        product_info: Option<ProductInfo>,
    ) -> Result<String> {
        let selected: BTreeSet<ModuleType> = selected_modules.into_iter().collect();
        if selected.is_empty() {
            return Err(SessionError::EmptyModuleSelection);
        }

        let session = Session::new(selected, config, product_info, self.clock.now());
        let session_id = session.session_id.clone();

        let victims = {
            let mut state = self.state.lock();
            let victims = self.make_room(&mut state, 1);
            if state.sessions.len() >= self.config.max_concurrent_sessions() {
                return Err(SessionError::CapacityExceeded {
                    max: self.config.max_concurrent_sessions(),
                });
            }
            state.sessions.insert(session_id.clone(), session.clone());
            victims
        };

        self.destroy_on_disk(&victims, EvictionReason::Capacity);
        self.persist_snapshot(&session);

        tracing::info!(
            session_id = %session_id,
            module_count = session.selected_modules.len(),
            "Created session"
        );

        Ok(session_id)
    }

    /// Fetch a session and mark it as active.
    ///
    /// An expired session is destroyed on the spot and reported as
    /// `NotFound`.
    pub fn get(&self, session_id: &str) -> Result<Session> {
        self.with_live_session(session_id, |session, now| {
            session.touch(now);
            session.clone()
        })
        .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Read a session without touching it or evicting it
    pub fn peek(&self, session_id: &str) -> Option<Session> {
        let now = self.clock.now();
        self.state
            .lock()
            .sessions
            .get(session_id)
            .filter(|s| !self.expiry.is_expired(s, now))
            .cloned()
    }

    pub fn update_materials(
        &self,
        session_id: &str,
        module: ModuleType,
        materials: MaterialSet,
    ) -> bool {
        let snapshot = self
            .with_live_session(session_id, |session, now| {
                if !session.is_selected(module) {
                    return None;
                }
                session.set_materials(module, materials, now);
                Some(session.clone())
            })
            .flatten();

        match snapshot {
            Some(session) => {
                self.persist_snapshot(&session);
                tracing::debug!(session_id = %session_id, module = %module, "Updated materials");
                true
            }
            None => {
                tracing::debug!(
                    session_id = %session_id,
                    module = %module,
                    "Materials not updated: unknown session or module"
                );
                false
            }
        }
    }

    /// Record a status transition.
    ///
    /// Every transition is applied; ones outside the normal lifecycle are
    /// only logged, since retry policy belongs to the caller.
    pub fn update_status(
        &self,
        session_id: &str,
        module: ModuleType,
        status: GenerationStatus,
    ) -> bool {
        let snapshot = self
            .with_live_session(session_id, |session, now| {
                let previous = session.set_status(module, status, now)?;
                if !previous.can_transition_to(status) {
                    tracing::warn!(
                        session_id = %session.session_id,
                        module = %module,
                        from = %previous,
                        to = %status,
                        "Unusual status transition"
                    );
                }
                tracing::debug!(
                    session_id = %session.session_id,
                    module = %module,
                    from = %previous,
                    to = %status,
                    "Status transition"
                );
                Some(session.clone())
            })
            .flatten();

        match snapshot {
            Some(session) => {
                self.persist_snapshot(&session);
                true
            }
            None => false,
        }
    }

    /// Store an artifact's bytes as a blob and record its metadata.
    ///
    /// The module's generation status is left alone. A failed blob write
    /// still records the metadata, without a blob pointer.
    pub fn save_artifact(
        &self,
        session_id: &str,
        module: ModuleType,
        bytes: &[u8],
        meta: ArtifactMeta,
    ) -> bool {
        match self.with_live_session(session_id, |session, _| session.is_selected(module)) {
            Some(true) => {}
            Some(false) => {
                tracing::warn!(
                    session_id = %session_id,
                    module = %module,
                    "Artifact for a module that is not selected"
                );
                return false;
            }
            None => return false,
        }

        let blob = self.persistence.write_blob(
            session_id,
            module,
            bytes,
            &meta.extension,
            self.clock.now(),
        );

        let snapshot = self.with_live_session(session_id, |session, now| {
            session.set_artifact(module, Artifact { meta, blob }, now);
            session.clone()
        });

        match snapshot {
            Some(session) => {
                self.persist_snapshot(&session);
                tracing::info!(session_id = %session_id, module = %module, "Saved artifact");
                true
            }
            None => {
                // Session went away while the blob was being written
                self.persistence.destroy(session_id);
                false
            }
        }
    }

    /// Bytes of the current artifact of a module, checked against the
    /// recorded digest
    pub fn read_artifact(&self, session_id: &str, module: ModuleType) -> Option<Vec<u8>> {
        let blob = self
            .peek(session_id)?
            .artifacts
            .get(&module)?
            .blob
            .clone()?;

        match self.persistence.read_blob(&blob) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    module = %module,
                    error = %e,
                    "Failed to read artifact blob"
                );
                None
            }
        }
    }

    /// Ids of every live session, after dropping expired ones
    pub fn list_active(&self) -> Vec<String> {
        let now = self.clock.now();
        let (expired, mut active) = {
            let mut state = self.state.lock();
            let expired = self.sweep_locked(&mut state, now);
            let active: Vec<String> = state.sessions.keys().cloned().collect();
            (expired, active)
        };

        self.destroy_on_disk(&expired, EvictionReason::Expired);
        active.sort();
        active
    }

    /// Destroy every expired session and return how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let expired = {
            let mut state = self.state.lock();
            self.sweep_locked(&mut state, now)
        };

        self.destroy_on_disk(&expired, EvictionReason::Expired);

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Cleaned up expired sessions");
        }

        expired.len()
    }

    /// Delete a session. Returns `false` if it was not live.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            Self::remove_locked(&mut state, session_id, EvictionReason::Explicit)
        };

        if removed {
            self.destroy_on_disk(&[session_id.to_string()], EvictionReason::Explicit);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().sessions.is_empty()
    }

    pub fn statistics(&self) -> SessionStatistics {
        let state = self.state.lock();
        SessionStatistics::collect(
            state.sessions.values(),
            state.cleanup.clone(),
            self.config.session_timeout().as_secs_f64() / 3600.0,
            self.config.max_concurrent_sessions(),
        )
    }

    pub fn health_check(&self) -> HealthReport {
        let probe_error = self.persistence.probe().err().map(|e| e.to_string());
        if let Some(e) = &probe_error {
            tracing::error!(error = %e, "Session directory is not writable");
        }

        let initialized = self.state.lock().initialized;
        HealthReport::evaluate(
            initialized,
            probe_error,
            self.statistics(),
            self.clock.now(),
        )
    }

    /// Run `f` on a live session under the lock.
    ///
    /// Returns `None` for unknown sessions. Expired sessions are destroyed
    /// and also yield `None`.
    fn with_live_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session, DateTime<Utc>) -> T,
    ) -> Option<T> {
        let now = self.clock.now();

        {
            let mut state = self.state.lock();
            let outcome = match state.sessions.get_mut(session_id) {
                None => return None,
                Some(session) => {
                    if self.expiry.is_expired(session, now) {
                        None
                    } else {
                        Some(f(session, now))
                    }
                }
            };
            if outcome.is_some() {
                return outcome;
            }
            Self::remove_locked(&mut state, session_id, EvictionReason::Expired);
        }

        self.destroy_on_disk(&[session_id.to_string()], EvictionReason::Expired);
        None
    }

    /// Evict least recently updated sessions until `incoming` more fit
    fn make_room(&self, state: &mut StoreState, incoming: usize) -> Vec<String> {
        let max = self.config.max_concurrent_sessions();
        let overflow = (state.sessions.len() + incoming).saturating_sub(max);

        let victims = match overflow {
            0 => return Vec::new(),
            1 => self
                .eviction
                .pick_victim(state.sessions.values())
                .into_iter()
                .collect(),
            n => self.eviction.pick_victims(state.sessions.values(), n),
        };

        for victim in &victims {
            Self::remove_locked(state, victim, EvictionReason::Capacity);
        }
        victims
    }

    fn sweep_locked(&self, state: &mut StoreState, now: DateTime<Utc>) -> Vec<String> {
        let expired = self.expiry.expired_ids(state.sessions.values(), now);
        for session_id in &expired {
            Self::remove_locked(state, session_id, EvictionReason::Expired);
        }
        if !expired.is_empty() {
            state.cleanup.last_cleanup = Some(now);
        }
        expired
    }

    /// In-memory half of an eviction: drop the entry and count it
    fn remove_locked(state: &mut StoreState, session_id: &str, reason: EvictionReason) -> bool {
        if state.sessions.remove(session_id).is_none() {
            return false;
        }

        state.cleanup.sessions_cleaned += 1;
        match reason {
            EvictionReason::Capacity => state.cleanup.capacity_evictions += 1,
            EvictionReason::Expired => state.cleanup.expired_cleaned += 1,
            EvictionReason::Explicit => state.cleanup.explicit_removals += 1,
        }
        true
    }

    /// Disk half of an eviction, run after the lock is released
    fn destroy_on_disk(&self, session_ids: &[String], reason: EvictionReason) {
        if session_ids.is_empty() {
            return;
        }

        let mut files_removed = 0;
        for session_id in session_ids {
            let destroyed = self.persistence.destroy(session_id);
            files_removed += destroyed.files_removed();
            tracing::info!(
                session_id = %session_id,
                reason = %reason,
                files_removed = destroyed.files_removed(),
                "Evicted session"
            );
        }

        self.state.lock().cleanup.files_cleaned += files_removed as u64;
    }

    /// Write a snapshot, then undo the write if the session was evicted
    /// while it was in flight, so no document outlives its session.
    fn persist_snapshot(&self, session: &Session) {
        self.persistence.persist(session);

        let still_live = self.state.lock().sessions.contains_key(&session.session_id);
        if !still_live {
            tracing::debug!(
                session_id = %session.session_id,
                "Session evicted during write; removing snapshot"
            );
            self.persistence.destroy(&session.session_id);
        }
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            config: self.config.clone(),
            persistence: self.persistence.clone(),
            expiry: self.expiry,
            eviction: self.eviction,
            clock: Arc::clone(&self.clock),
        }
    }
}
