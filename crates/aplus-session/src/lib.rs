//! A+ Studio Session Store
//!
//! - A session tracks one A+ content workflow across a set of modules
//! - Every mutation is written through to a JSON document on disk
//! - Generated images live as blob files next to the document
//! - Idle sessions expire; at capacity the least recently updated goes first
//! - Sessions found on disk at startup are restored

mod codec;
mod config;
mod error;
mod eviction;
mod expiry;
mod module;
mod persistence;
mod session;
mod stats;
mod status;
mod store;

pub use codec::{ArtifactDocument, SessionDocument, FORMAT_VERSION};
pub use config::StoreConfig;
pub use error::SessionError;
pub use eviction::EvictionPolicy;
pub use expiry::{Clock, ExpiryResolver, ManualClock, SystemClock};
pub use module::ModuleType;
pub use persistence::{Destroyed, LoadOutcome, PersistenceLayer};
pub use session::{
    Artifact, ArtifactMeta, BlobRef, FileRef, GenerationConfig, MaterialSet, ProductInfo, Session,
};
pub use stats::{CleanupStats, HealthReport, HealthStatus, SessionStatistics, HIGH_WATER_RATIO};
pub use status::GenerationStatus;
pub use store::{EvictionReason, LoadReport, SessionStore};

pub type Result<T> = std::result::Result<T, SessionError>;
