//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable so the API can evolve apart from the pipeline types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DimensionConfig;
use crate::orchestrator::UnitOutcome;
use crate::store::{ContentRecord, ValidationStatus};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
  pub ok: bool,
  pub generation_enabled: bool,
}

#[derive(Serialize)]
pub struct DimensionsOut {
  pub dimensions: Vec<DimensionConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
  pub dimension_id: String,
  pub level: u8,
  /// Falls back to the configured default when absent.
  pub validate: Option<bool>,
}

/// Summary of one generated and persisted unit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOut {
  pub record_id: Uuid,
  pub dimension_id: String,
  pub level: u8,
  pub version: u32,
  pub success: bool,
  pub attempts: u32,
  pub validation_status: ValidationStatus,
  pub score: Option<u32>,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

impl GenerateOut {
  pub fn new(outcome: &UnitOutcome, record: &ContentRecord) -> Self {
    let (errors, warnings) = outcome
      .validation
      .as_ref()
      .map(|v| (v.errors.clone(), v.warnings.clone()))
      .unwrap_or_default();
    Self {
      record_id: record.id,
      dimension_id: record.dimension_id.clone(),
      level: record.level,
      version: record.version,
      success: outcome.success,
      attempts: outcome.attempts,
      validation_status: record.validation_status,
      score: record.quality_score,
      errors,
      warnings,
    }
  }
}

/// Listing entry: metadata only, no payloads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
  pub id: Uuid,
  pub dimension_id: String,
  pub level: u8,
  pub version: u32,
  pub validation_status: ValidationStatus,
  pub quality_score: Option<u32>,
  pub keywords: Vec<String>,
  pub generated_at: u64,
}

impl From<&ContentRecord> for ContentSummary {
  fn from(r: &ContentRecord) -> Self {
    Self {
      id: r.id,
      dimension_id: r.dimension_id.clone(),
      level: r.level,
      version: r.version,
      validation_status: r.validation_status,
      quality_score: r.quality_score,
      keywords: r.keywords.clone(),
      generated_at: r.generated_at,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ContentListOut {
  pub items: Vec<ContentSummary>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: String,
}
