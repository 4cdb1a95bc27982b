//! Quality scoring of a (concepts, models, demonstrations) triple.
//!
//! overall = concept framework ratio (25) + step depth (40) + theory linkage (20)
//! + demonstration depth (15), each term clamped to its maximum, then rounded.
//! The structure score is informational: breakdown presence (30), full application
//! example presence (30) and theory linkage (40).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{ConceptsContent, DemonstrationsContent, ModelsContent};
use crate::util::char_len;

const CONCEPT_WEIGHT: f64 = 25.0;
const STEP_WORD_WEIGHT: f64 = 40.0;
const THEORY_LINK_WEIGHT: f64 = 20.0;
const DEMO_WORD_WEIGHT: f64 = 15.0;

/// Step description length at which the step depth term saturates.
const STEP_WORD_TARGET: f64 = 300.0;
/// Thinking process length at which the demonstration depth term saturates.
const DEMO_WORD_TARGET: f64 = 200.0;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMetrics {
  pub total: usize,
  pub with_framework: usize,
  pub with_breakdown: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
  pub total: usize,
  pub total_steps: usize,
  /// Mean step description length in characters.
  pub avg_step_words: f64,
  pub with_full_example: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DemonstrationMetrics {
  pub total: usize,
  pub total_steps: usize,
  pub steps_with_theory_link: usize,
  /// Mean thinking process length in characters.
  pub avg_demo_step_words: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
  pub concept_score: f64,
  pub step_word_score: f64,
  pub theory_link_score: f64,
  pub demo_word_score: f64,
}

impl ScoreBreakdown {
  pub fn sum(&self) -> f64 {
    self.concept_score + self.step_word_score + self.theory_link_score + self.demo_word_score
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
  pub concepts: ConceptMetrics,
  pub models: ModelMetrics,
  pub demonstrations: DemonstrationMetrics,
  pub total_words: usize,
  pub score_breakdown: ScoreBreakdown,
  pub structure_score: u32,
  pub overall_quality_score: u32,
}

/// `num / den`, or 0 when there is nothing to divide by.
fn ratio(num: usize, den: usize) -> f64 {
  if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn mean(total: usize, count: usize) -> f64 {
  ratio(total, count)
}

fn string_chars(v: &Value) -> usize {
  match v {
    Value::String(s) => char_len(s),
    Value::Array(items) => items.iter().map(string_chars).sum(),
    Value::Object(map) => map.values().map(string_chars).sum(),
    _ => 0,
  }
}

fn text_volume<T: Serialize>(content: &T) -> usize {
  serde_json::to_value(content).map(|v| string_chars(&v)).unwrap_or(0)
}

/// Derive metrics and scores from the three payloads.
pub fn score(
  concepts: &ConceptsContent,
  models: &ModelsContent,
  demonstrations: &DemonstrationsContent,
) -> QualityMetrics {
  let concept_metrics = ConceptMetrics {
    total: concepts.concepts.len(),
    with_framework: concepts
      .concepts
      .iter()
      .filter(|c| c.critical_thinking_framework.as_ref().is_some_and(|f| f.has_third_step()))
      .count(),
    with_breakdown: concepts.concepts.iter().filter(|c| c.concept_breakdown.is_some()).count(),
  };

  let steps: Vec<_> = models.models.iter().flat_map(|m| m.steps.iter()).collect();
  let model_metrics = ModelMetrics {
    total: models.models.len(),
    total_steps: steps.len(),
    avg_step_words: mean(steps.iter().map(|s| char_len(&s.description)).sum(), steps.len()),
    with_full_example: models
      .models
      .iter()
      .filter(|m| m.full_application_example.as_ref().is_some_and(|e| !e.scenario.trim().is_empty()))
      .count(),
  };

  let analysis: Vec<_> = demonstrations.demonstrations.iter().flat_map(|d| d.analysis_steps.iter()).collect();
  let demo_metrics = DemonstrationMetrics {
    total: demonstrations.demonstrations.len(),
    total_steps: analysis.len(),
    steps_with_theory_link: analysis.iter().filter(|s| !s.concept_applied.trim().is_empty()).count(),
    avg_demo_step_words: mean(analysis.iter().map(|s| char_len(&s.thinking_process)).sum(), analysis.len()),
  };

  let theory_ratio = ratio(demo_metrics.steps_with_theory_link, demo_metrics.total_steps);
  let breakdown = ScoreBreakdown {
    concept_score: (ratio(concept_metrics.with_framework, concept_metrics.total) * CONCEPT_WEIGHT).min(CONCEPT_WEIGHT),
    step_word_score: (model_metrics.avg_step_words / STEP_WORD_TARGET * STEP_WORD_WEIGHT).min(STEP_WORD_WEIGHT),
    theory_link_score: (theory_ratio * THEORY_LINK_WEIGHT).min(THEORY_LINK_WEIGHT),
    demo_word_score: (demo_metrics.avg_demo_step_words / DEMO_WORD_TARGET * DEMO_WORD_WEIGHT).min(DEMO_WORD_WEIGHT),
  };

  let structure = ratio(concept_metrics.with_breakdown, concept_metrics.total) * 30.0
    + ratio(model_metrics.with_full_example, model_metrics.total) * 30.0
    + theory_ratio * 40.0;

  QualityMetrics {
    total_words: text_volume(concepts) + text_volume(models) + text_volume(demonstrations),
    structure_score: structure.round() as u32,
    overall_quality_score: breakdown.sum().round() as u32,
    score_breakdown: breakdown,
    concepts: concept_metrics,
    models: model_metrics,
    demonstrations: demo_metrics,
  }
}
