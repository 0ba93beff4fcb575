//! Session metadata encoding
//!
//! Sessions are stored as a JSON document keyed by module token strings.
//! Artifact entries carry a blob path, never the blob bytes.
//!
//! Decoding is forgiving about tokens it does not know so that documents
//! written by a newer build still load: unknown modules are dropped and an
//! unknown status resets that module to `not_started`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::SessionError;
use crate::module::ModuleType;
use crate::session::{
    Artifact, ArtifactMeta, BlobRef, GenerationConfig, MaterialSet, ProductInfo, Session,
};
use crate::status::GenerationStatus;
use crate::Result;

/// Version written into every document
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default = "first_version")]
    pub format_version: u32,
    pub session_id: String,
    pub selected_modules: Vec<String>,
    #[serde(default)]
    pub generation_status: BTreeMap<String, String>,
    #[serde(default)]
    pub material_sets: BTreeMap<String, MaterialSet>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactDocument>,
    #[serde(default)]
    pub config: Option<GenerationConfig>,
    #[serde(default)]
    pub product_info: Option<ProductInfo>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDocument {
    #[serde(flatten)]
    pub meta: ArtifactMeta,
    #[serde(default)]
    pub blob: Option<BlobRef>,
}

pub fn encode(session: &Session) -> SessionDocument {
    SessionDocument {
        format_version: FORMAT_VERSION,
        session_id: session.session_id.clone(),
        selected_modules: session
            .selected_modules
            .iter()
            .map(|m| m.as_str().to_string())
            .collect(),
        generation_status: session
            .generation_status
            .iter()
            .map(|(m, s)| (m.as_str().to_string(), s.as_str().to_string()))
            .collect(),
        material_sets: session
            .material_sets
            .iter()
            .map(|(m, set)| (m.as_str().to_string(), set.clone()))
            .collect(),
        artifacts: session
            .artifacts
            .iter()
            .map(|(m, a)| {
                (
                    m.as_str().to_string(),
                    ArtifactDocument {
                        meta: a.meta.clone(),
                        blob: a.blob.clone(),
                    },
                )
            })
            .collect(),
        config: Some(session.config.clone()),
        product_info: session.product_info.clone(),
        created_at: session.created_at,
        last_updated: session.last_updated,
    }
}

pub fn decode(doc: SessionDocument) -> Result<Session> {
    if doc.format_version > FORMAT_VERSION {
        return Err(SessionError::Decode(format!(
            "format version {} is newer than supported version {}",
            doc.format_version, FORMAT_VERSION
        )));
    }
    if doc.session_id.trim().is_empty() {
        return Err(SessionError::Decode("empty session id".to_string()));
    }

    let session_id = doc.session_id;
    let selected_modules: BTreeSet<ModuleType> = doc
        .selected_modules
        .iter()
        .filter_map(|token| known_module(&session_id, token))
        .collect();

    if selected_modules.is_empty() {
        return Err(SessionError::Decode("no known modules selected".to_string()));
    }

    let mut recorded: BTreeMap<ModuleType, String> = BTreeMap::new();
    for (token, status) in doc.generation_status {
        if let Some(module) = known_module(&session_id, &token) {
            recorded.insert(module, status);
        }
    }

    // Exactly one status per selected module
    let generation_status = selected_modules
        .iter()
        .map(|module| {
            let status = match recorded.get(module) {
                Some(token) => token.parse::<GenerationStatus>().unwrap_or_else(|e| {
                    tracing::warn!(
                        session_id = %session_id,
                        module = %module,
                        "{}; resetting to not_started",
                        e
                    );
                    GenerationStatus::NotStarted
                }),
                None => GenerationStatus::NotStarted,
            };
            (*module, status)
        })
        .collect();

    let material_sets = doc
        .material_sets
        .into_iter()
        .filter_map(|(token, set)| known_module(&session_id, &token).map(|m| (m, set)))
        .filter(|(module, _)| selected_modules.contains(module))
        .collect();

    let artifacts = doc
        .artifacts
        .into_iter()
        .filter_map(|(token, a)| {
            known_module(&session_id, &token).map(|m| {
                (
                    m,
                    Artifact {
                        meta: a.meta,
                        blob: a.blob,
                    },
                )
            })
        })
        .filter(|(module, _)| selected_modules.contains(module))
        .collect();

    let config = doc
        .config
        .unwrap_or_else(|| GenerationConfig::for_modules(&selected_modules));

    Ok(Session {
        session_id,
        selected_modules,
        generation_status,
        material_sets,
        artifacts,
        config,
        product_info: doc.product_info,
        created_at: doc.created_at,
        last_updated: doc.last_updated.max(doc.created_at),
    })
}

pub fn to_bytes(session: &Session) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&encode(session))?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Session> {
    let doc: SessionDocument = serde_json::from_slice(bytes)?;
    decode(doc)
}

fn known_module(session_id: &str, token: &str) -> Option<ModuleType> {
    match token.parse::<ModuleType>() {
        Ok(module) => Some(module),
        Err(e) => {
            tracing::warn!(session_id = %session_id, "{}; dropping it", e);
            None
        }
    }
}

fn first_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FileRef;
    use std::path::PathBuf;

    fn sample() -> Session {
        let modules: BTreeSet<_> = [ModuleType::Identity, ModuleType::Trust]
            .into_iter()
            .collect();
        let config = GenerationConfig::for_modules(&modules);
        let product = ProductInfo {
            name: "Desk Lamp".to_string(),
            ..ProductInfo::default()
        };
        let mut session = Session::new(modules, config, Some(product), Utc::now());
        let now = session.created_at;

        session.set_status(ModuleType::Identity, GenerationStatus::Completed, now);

        let mut materials = MaterialSet::default();
        materials.images.push(FileRef {
            filename: "front.png".to_string(),
            file_type: "png".to_string(),
            file_size: 2048,
            uploaded_at: now,
            validation_status: "passed".to_string(),
        });
        materials
            .text_inputs
            .insert("headline".to_string(), "Bright and calm".to_string());
        session.set_materials(ModuleType::Identity, materials, now);

        session.set_artifact(
            ModuleType::Identity,
            Artifact {
                meta: ArtifactMeta::new("a lamp on a desk"),
                blob: Some(BlobRef {
                    path: PathBuf::from("/tmp/s/identity_1.png"),
                    size_bytes: 12,
                    sha256: "ab".repeat(32),
                }),
            },
            now,
        );
        session
    }

    #[test]
    fn test_document_uses_string_keys_and_no_bytes() {
        let session = sample();
        let value: serde_json::Value =
            serde_json::from_slice(&to_bytes(&session).unwrap()).unwrap();

        assert_eq!(value["format_version"], 1);
        assert_eq!(value["generation_status"]["identity"], "completed");
        assert_eq!(value["generation_status"]["trust"], "not_started");
        assert_eq!(
            value["material_sets"]["identity"]["images"][0]["filename"],
            "front.png"
        );
        assert_eq!(
            value["artifacts"]["identity"]["blob"]["path"],
            "/tmp/s/identity_1.png"
        );
        assert_eq!(value["artifacts"]["identity"]["prompt_used"], "a lamp on a desk");
        // RFC 3339 timestamps
        let created = value["created_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
    }

    #[test]
    fn test_decode_restores_session() {
        let session = sample();
        let restored = from_bytes(&to_bytes(&session).unwrap()).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_unknown_tokens_are_tolerated() {
        let json = r#"{
            "session_id": "s-1",
            "selected_modules": ["identity", "hologram"],
            "generation_status": {"identity": "paused", "hologram": "completed"},
            "material_sets": {"hologram": {}},
            "created_at": "2026-01-01T00:00:00Z",
            "last_updated": "2026-01-01T01:00:00Z"
        }"#;

        let session = from_bytes(json.as_bytes()).unwrap();
        assert_eq!(session.selected_modules.len(), 1);
        assert_eq!(
            session.status_of(ModuleType::Identity),
            Some(GenerationStatus::NotStarted)
        );
        assert!(session.material_sets.is_empty());
        assert_eq!(session.config.language, "zh");
    }

    #[test]
    fn test_missing_status_entries_are_filled() {
        let json = r#"{
            "session_id": "s-2",
            "selected_modules": ["identity", "trust"],
            "generation_status": {"identity": "in_progress", "sensory": "completed"},
            "created_at": "2026-01-01T00:00:00Z",
            "last_updated": "2026-01-01T00:00:00Z"
        }"#;

        let session = from_bytes(json.as_bytes()).unwrap();
        assert_eq!(session.generation_status.len(), 2);
        assert_eq!(
            session.status_of(ModuleType::Identity),
            Some(GenerationStatus::InProgress)
        );
        assert_eq!(
            session.status_of(ModuleType::Trust),
            Some(GenerationStatus::NotStarted)
        );
    }

    #[test]
    fn test_entries_for_unselected_modules_are_dropped() {
        let json = r#"{
            "session_id": "s-5",
            "selected_modules": ["identity"],
            "generation_status": {"identity": "completed", "trust": "failed"},
            "material_sets": {
                "identity": {"custom_prompts": ["keep"]},
                "trust": {"custom_prompts": ["drop"]}
            },
            "artifacts": {
                "identity": {"prompt_used": "keep"},
                "trust": {"prompt_used": "drop"}
            },
            "created_at": "2026-01-01T00:00:00Z",
            "last_updated": "2026-01-01T00:00:00Z"
        }"#;

        let session = from_bytes(json.as_bytes()).unwrap();
        assert_eq!(session.generation_status.len(), 1);
        assert_eq!(
            session.material_sets.keys().copied().collect::<Vec<_>>(),
            vec![ModuleType::Identity]
        );
        assert_eq!(
            session.artifacts.keys().copied().collect::<Vec<_>>(),
            vec![ModuleType::Identity]
        );
        assert_eq!(session.artifacts[&ModuleType::Identity].meta.prompt_used, "keep");
    }

    #[test]
    fn test_rejects_unusable_documents() {
        assert!(from_bytes(b"not json").is_err());

        let no_modules = r#"{
            "session_id": "s-3",
            "selected_modules": ["hologram"],
            "created_at": "2026-01-01T00:00:00Z",
            "last_updated": "2026-01-01T00:00:00Z"
        }"#;
        assert!(matches!(
            from_bytes(no_modules.as_bytes()),
            Err(SessionError::Decode(_))
        ));

        let future = r#"{
            "format_version": 99,
            "session_id": "s-4",
            "selected_modules": ["identity"],
            "created_at": "2026-01-01T00:00:00Z",
            "last_updated": "2026-01-01T00:00:00Z"
        }"#;
        assert!(matches!(
            from_bytes(future.as_bytes()),
            Err(SessionError::Decode(_))
        ));
    }
}
