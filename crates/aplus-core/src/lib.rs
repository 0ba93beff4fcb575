//! A+ Studio Core
//!
//! Application-facing layer: configuration, logging setup and the
//! [`Studio`] container that owns the session store and its sweeper.

mod config;
mod error;
mod studio;
mod sweeper;

pub use config::Config;
pub use error::CoreError;
pub use studio::Studio;
pub use sweeper::Sweeper;

// Re-export core components
pub use aplus_session::{
    Artifact, ArtifactMeta, BlobRef, CleanupStats, FileRef, GenerationConfig, GenerationStatus,
    HealthReport, HealthStatus, LoadReport, MaterialSet, ModuleType, ProductInfo, Session,
    SessionError, SessionStatistics, SessionStore, StoreConfig,
};
pub use aplus_storage::StorageError;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
