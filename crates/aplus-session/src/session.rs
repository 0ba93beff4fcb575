//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use uuid::Uuid;

use crate::module::ModuleType;
use crate::status::GenerationStatus;

/// Generation settings captured when a session is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Output language code
    pub language: String,
    /// How strictly compliance rules are applied ("strict", "lenient", ...)
    pub compliance_level: String,
    /// Generate modules as one batch instead of one by one
    pub batch_mode: bool,
    /// Minimum quality score an artifact must reach, 0.0 - 1.0
    pub quality_threshold: f64,
}

impl GenerationConfig {
    /// Settings used when the workflow does not supply its own:
    /// Chinese output, strict compliance, batch mode above three modules
    /// and a 0.8 quality bar.
    pub fn for_modules(modules: &BTreeSet<ModuleType>) -> Self {
        Self {
            language: "zh".to_string(),
            compliance_level: "strict".to_string(),
            batch_mode: modules.len() > 3,
            quality_threshold: 0.8,
        }
    }
}

/// Product the A+ content is being generated for
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductInfo {
    pub name: String,
    pub category: String,
    pub description: String,
    pub key_features: Vec<String>,
    pub target_audience: String,
    pub price_range: String,
}

/// Metadata of an uploaded file. The content itself is never kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub filename: String,
    /// Upload format such as "png" or "pdf"
    pub file_type: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Opaque validation verdict from the upload pipeline
    #[serde(default = "default_validation_status")]
    pub validation_status: String,
}

/// User-supplied inputs for one module
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSet {
    pub images: Vec<FileRef>,
    pub documents: Vec<FileRef>,
    pub text_inputs: BTreeMap<String, String>,
    pub custom_prompts: Vec<String>,
}

/// Caller-supplied description of a generated artifact.
///
/// `compliance_status` and `validation_status` are recorded as given; the
/// session's `generation_status` stays the authoritative module status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    #[serde(default)]
    pub quality_score: f64,
    /// Wall-clock generation time in seconds
    #[serde(default)]
    pub generation_secs: f64,
    #[serde(default)]
    pub prompt_used: String,
    #[serde(default = "default_compliance_status")]
    pub compliance_status: String,
    #[serde(default = "default_validation_status")]
    pub validation_status: String,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    /// File extension for the stored blob, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl ArtifactMeta {
    pub fn new(prompt_used: impl Into<String>) -> Self {
        Self {
            quality_score: 0.0,
            generation_secs: 0.0,
            prompt_used: prompt_used.into(),
            compliance_status: default_compliance_status(),
            validation_status: default_validation_status(),
            generated_at: Utc::now(),
            extension: default_extension(),
        }
    }
}

/// Pointer to the blob holding an artifact's bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub meta: ArtifactMeta,
    /// `None` when the blob write failed; the metadata is kept regardless
    pub blob: Option<BlobRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Unique identifier, fixed at creation
    pub session_id: String,
    pub selected_modules: BTreeSet<ModuleType>,
    /// One entry per selected module
    pub generation_status: BTreeMap<ModuleType, GenerationStatus>,
    pub material_sets: BTreeMap<ModuleType, MaterialSet>,
    pub artifacts: BTreeMap<ModuleType, Artifact>,
    pub config: GenerationConfig,
    pub product_info: Option<ProductInfo>,
    pub created_at: DateTime<Utc>,
    /// Bumped by every mutation; drives expiry and eviction
    pub last_updated: DateTime<Utc>,
}

impl Session {
    pub fn new(
        selected_modules: BTreeSet<ModuleType>,
        config: GenerationConfig,
        product_info: Option<ProductInfo>,
        now: DateTime<Utc>,
    ) -> Self {
        let generation_status = selected_modules
            .iter()
            .map(|m| (*m, GenerationStatus::NotStarted))
            .collect();

        Self {
            session_id: Uuid::new_v4().to_string(),
            selected_modules,
            generation_status,
            material_sets: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            config,
            product_info,
            created_at: now,
            last_updated: now,
        }
    }

    /// Record activity. `last_updated` never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    pub fn is_selected(&self, module: ModuleType) -> bool {
        self.selected_modules.contains(&module)
    }

    pub fn status_of(&self, module: ModuleType) -> Option<GenerationStatus> {
        self.generation_status.get(&module).copied()
    }

    /// Set a module's status, returning the previous one
    pub fn set_status(
        &mut self,
        module: ModuleType,
        status: GenerationStatus,
        now: DateTime<Utc>,
    ) -> Option<GenerationStatus> {
        if !self.is_selected(module) {
            return None;
        }
        let previous = self.generation_status.insert(module, status);
        self.touch(now);
        previous
    }

    pub fn set_materials(&mut self, module: ModuleType, materials: MaterialSet, now: DateTime<Utc>) {
        self.material_sets.insert(module, materials);
        self.touch(now);
    }

    pub fn set_artifact(&mut self, module: ModuleType, artifact: Artifact, now: DateTime<Utc>) {
        self.artifacts.insert(module, artifact);
        self.touch(now);
    }

    pub fn completed_count(&self) -> usize {
        self.generation_status
            .values()
            .filter(|s| **s == GenerationStatus::Completed)
            .count()
    }
}

fn default_validation_status() -> String {
    "pending".to_string()
}

fn default_compliance_status() -> String {
    "pending_review".to_string()
}

fn default_extension() -> String {
    "png".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn modules(list: &[ModuleType]) -> BTreeSet<ModuleType> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_new_session_initializes_statuses() {
        let selected = modules(&[ModuleType::Identity, ModuleType::Trust]);
        let config = GenerationConfig::for_modules(&selected);
        let session = Session::new(selected.clone(), config, None, Utc::now());

        assert_eq!(session.generation_status.len(), 2);
        for module in &selected {
            assert_eq!(session.status_of(*module), Some(GenerationStatus::NotStarted));
        }
        assert_eq!(session.created_at, session.last_updated);
        assert!(!session.config.batch_mode);
    }

    #[test]
    fn test_batch_mode_above_three_modules() {
        let selected = modules(&[
            ModuleType::Identity,
            ModuleType::Sensory,
            ModuleType::Extension,
            ModuleType::Trust,
        ]);
        let config = GenerationConfig::for_modules(&selected);
        assert!(config.batch_mode);
        assert_eq!(config.language, "zh");
    }

    #[test]
    fn test_touch_is_monotonic() {
        let now = Utc::now();
        let mut session = Session::new(
            modules(&[ModuleType::Identity]),
            GenerationConfig::for_modules(&BTreeSet::new()),
            None,
            now,
        );

        session.touch(now - Duration::minutes(5));
        assert_eq!(session.last_updated, now);

        session.touch(now + Duration::minutes(5));
        assert_eq!(session.last_updated, now + Duration::minutes(5));
    }

    #[test]
    fn test_set_status_ignores_unselected_modules() {
        let now = Utc::now();
        let mut session = Session::new(
            modules(&[ModuleType::Identity]),
            GenerationConfig::for_modules(&BTreeSet::new()),
            None,
            now,
        );

        let later = now + Duration::seconds(1);
        assert_eq!(
            session.set_status(ModuleType::Identity, GenerationStatus::InProgress, later),
            Some(GenerationStatus::NotStarted)
        );
        assert_eq!(session.last_updated, later);

        assert_eq!(
            session.set_status(ModuleType::Trust, GenerationStatus::InProgress, later),
            None
        );
        assert!(!session.generation_status.contains_key(&ModuleType::Trust));
    }

    #[test]
    fn test_artifact_meta_defaults() {
        let meta: ArtifactMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.compliance_status, "pending_review");
        assert_eq!(meta.validation_status, "pending");
        assert_eq!(meta.extension, "png");
        assert_eq!(meta.quality_score, 0.0);
    }
}
