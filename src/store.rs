//! Persistence of generated units.
//!
//! Records are keyed by `(dimension_id, level, version)` and upserts are idempotent:
//! regenerating a unit replaces its content but keeps the record id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::content::{ConceptsContent, DemonstrationsContent, ModelsContent};
use crate::domain::{DimensionConfig, LevelConfig};
use crate::error::StoreError;
use crate::orchestrator::UnitOutcome;
use crate::scorer::QualityMetrics;

const MAX_KEYWORDS: usize = 10;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
  Validated,
  Draft,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
  pub id: Uuid,
  pub dimension_id: String,
  pub level: u8,
  pub version: u32,
  pub concepts: ConceptsContent,
  pub models: ModelsContent,
  pub demonstrations: DemonstrationsContent,
  /// Minutes.
  pub estimated_time: u32,
  pub keywords: Vec<String>,
  pub tags: Vec<String>,
  pub validation_status: ValidationStatus,
  pub quality_score: Option<u32>,
  pub quality_metrics: Option<QualityMetrics>,
  pub attempts: u32,
  /// Unix seconds.
  pub generated_at: u64,
}

impl ContentRecord {
  pub fn from_outcome(outcome: &UnitOutcome, dim: &DimensionConfig, level: &LevelConfig, version: u32) -> Self {
    let generated_at = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    Self {
      id: Uuid::new_v4(),
      dimension_id: dim.id.clone(),
      level: level.level,
      version,
      concepts: outcome.concepts.clone(),
      models: outcome.models.clone(),
      demonstrations: outcome.demonstrations.clone(),
      estimated_time: 15 + u32::from(level.level) * 5,
      keywords: keywords(&outcome.concepts, &outcome.models),
      tags: vec![dim.name.clone(), level.title.clone()],
      validation_status: if outcome.success { ValidationStatus::Validated } else { ValidationStatus::Draft },
      quality_score: outcome.validation.as_ref().map(|v| v.score),
      quality_metrics: outcome.validation.as_ref().map(|v| v.metrics.clone()),
      attempts: outcome.attempts,
      generated_at,
    }
  }

  pub fn key(&self) -> RecordKey {
    (self.dimension_id.clone(), self.level, self.version)
  }
}

pub type RecordKey = (String, u8, u32);

/// First ten concept names, then model names, capped at ten overall.
pub fn keywords(concepts: &ConceptsContent, models: &ModelsContent) -> Vec<String> {
  concepts
    .concepts
    .iter()
    .take(MAX_KEYWORDS)
    .map(|c| c.name.clone())
    .chain(models.models.iter().map(|m| m.name.clone()))
    .filter(|name| !name.trim().is_empty())
    .take(MAX_KEYWORDS)
    .collect()
}

#[async_trait]
pub trait ContentStore: Send + Sync {
  /// Insert or replace the record for its key. Returns the stored record.
  async fn upsert(&self, record: ContentRecord) -> Result<ContentRecord, StoreError>;
  async fn get(&self, dimension_id: &str, level: u8, version: u32) -> Result<Option<ContentRecord>, StoreError>;
  async fn list(&self) -> Result<Vec<ContentRecord>, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
  records: RwLock<HashMap<RecordKey, ContentRecord>>,
}

#[async_trait]
impl ContentStore for MemoryStore {
  async fn upsert(&self, mut record: ContentRecord) -> Result<ContentRecord, StoreError> {
    let mut records = self.records.write().await;
    if let Some(existing) = records.get(&record.key()) {
      record.id = existing.id;
    }
    records.insert(record.key(), record.clone());
    debug!(target: "store", id = %record.id, dimension = %record.dimension_id, level = record.level, "Record upserted in memory");
    Ok(record)
  }

  async fn get(&self, dimension_id: &str, level: u8, version: u32) -> Result<Option<ContentRecord>, StoreError> {
    Ok(self.records.read().await.get(&(dimension_id.to_string(), level, version)).cloned())
  }

  async fn list(&self) -> Result<Vec<ContentRecord>, StoreError> {
    let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(all)
  }
}

/// One pretty-printed JSON file per record: `<root>/<dimension>/level-<n>.v<version>.json`.
pub struct JsonDirStore {
  root: PathBuf,
}

impl JsonDirStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn path_for(&self, dimension_id: &str, level: u8, version: u32) -> PathBuf {
    self.root.join(dimension_id).join(format!("level-{level}.v{version}.json"))
  }

  async fn read(path: &Path) -> Result<Option<ContentRecord>, StoreError> {
    match tokio::fs::read(path).await {
      Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

#[async_trait]
impl ContentStore for JsonDirStore {
  #[instrument(level = "debug", skip_all, fields(dimension = %record.dimension_id, level = record.level, version = record.version))]
  async fn upsert(&self, mut record: ContentRecord) -> Result<ContentRecord, StoreError> {
    let path = self.path_for(&record.dimension_id, record.level, record.version);
    if let Some(existing) = Self::read(&path).await? {
      record.id = existing.id;
    }
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(&record)?;
    // Write then rename so readers never see a half-written file.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, &path).await?;
    info!(target: "store", id = %record.id, path = %path.display(), status = ?record.validation_status, "Record written");
    Ok(record)
  }

  async fn get(&self, dimension_id: &str, level: u8, version: u32) -> Result<Option<ContentRecord>, StoreError> {
    Self::read(&self.path_for(dimension_id, level, version)).await
  }

  async fn list(&self) -> Result<Vec<ContentRecord>, StoreError> {
    let mut out = Vec::new();
    let mut dirs = match tokio::fs::read_dir(&self.root).await {
      Ok(d) => d,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
      Err(e) => return Err(e.into()),
    };
    while let Some(dir) = dirs.next_entry().await? {
      if !dir.file_type().await?.is_dir() {
        continue;
      }
      let mut files = tokio::fs::read_dir(dir.path()).await?;
      while let Some(file) = files.next_entry().await? {
        let path = file.path();
        if path.extension().is_some_and(|ext| ext == "json") {
          if let Some(record) = Self::read(&path).await? {
            out.push(record);
          }
        }
      }
    }
    out.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::{Concept, ThinkingModel};
  use crate::domain::{GenerationUnit, UnitState};
  use crate::fixtures;
  use crate::seeds::builtin_dimensions;
  use crate::validator;

  fn outcome(success: bool) -> UnitOutcome {
    let (concepts, models, demonstrations) = fixtures::valid_triple();
    let validation = validator::validate(&concepts, &models, &demonstrations, &Default::default());
    UnitOutcome {
      unit: GenerationUnit::new("critical", 3),
      success,
      attempts: 2,
      concepts,
      models,
      demonstrations,
      validation: Some(validation),
      history: vec![UnitState::Success],
    }
  }

  fn record(success: bool) -> ContentRecord {
    let dims = builtin_dimensions();
    ContentRecord::from_outcome(&outcome(success), &dims[0], dims[0].level(3).unwrap(), 1)
  }

  #[test]
  fn record_metadata() {
    let r = record(true);
    assert_eq!(r.estimated_time, 30);
    assert_eq!(r.tags, vec!["Critical Thinking".to_string(), "Analysing Arguments".to_string()]);
    assert_eq!(r.keywords, vec!["Concept 1", "Concept 2", "Concept 3", "Model 1", "Model 2"]);
    assert_eq!(r.validation_status, ValidationStatus::Validated);
    assert_eq!(r.quality_score, Some(100));
    assert_eq!(r.attempts, 2);
    assert_eq!(record(false).validation_status, ValidationStatus::Draft);
  }

  #[test]
  fn keywords_are_capped_at_ten() {
    let concepts = ConceptsContent {
      intro: String::new(),
      concepts: (0..12).map(|i| Concept { name: format!("c{i}"), ..Default::default() }).collect(),
    };
    let models = ModelsContent {
      intro: String::new(),
      models: vec![ThinkingModel { name: "m".into(), ..Default::default() }],
    };
    let kw = keywords(&concepts, &models);
    assert_eq!(kw.len(), 10);
    assert_eq!(kw[9], "c9");
  }

  #[tokio::test]
  async fn memory_upsert_keeps_id() {
    let store = MemoryStore::default();
    let first = store.upsert(record(false)).await.unwrap();
    let second = store.upsert(record(true)).await.unwrap();
    assert_eq!(first.id, second.id);

    let stored = store.get("critical", 3, 1).await.unwrap().unwrap();
    assert_eq!(stored.validation_status, ValidationStatus::Validated);
    assert_eq!(store.list().await.unwrap().len(), 1);
    assert!(store.get("critical", 3, 2).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn json_dir_round_trip_and_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path());

    let first = store.upsert(record(false)).await.unwrap();
    assert!(dir.path().join("critical").join("level-3.v1.json").is_file());

    let second = store.upsert(record(true)).await.unwrap();
    assert_eq!(first.id, second.id);

    let loaded = store.get("critical", 3, 1).await.unwrap().expect("written");
    assert_eq!(loaded.validation_status, ValidationStatus::Validated);
    assert_eq!(loaded.concepts, fixtures::concepts());
    assert_eq!(loaded.quality_metrics, second.quality_metrics);
    assert_eq!(store.list().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn json_dir_missing_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::new(dir.path().join("nothing-here"));
    assert!(store.get("systems", 1, 1).await.unwrap().is_none());
    assert!(store.list().await.unwrap().is_empty());
  }
}
