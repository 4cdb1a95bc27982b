//! Pipeline configuration loaded from TOML (prompts, validation rules, retry and call policy).
//!
//! Every section is optional; missing sections fall back to the defaults below.
//! See `PipelineConfig` for the accepted schema.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::DimensionConfig;
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub prompts: Prompts,
  pub rules: ValidationRules,
  pub retry: RetryPolicy,
  pub call: CallPolicy,
  pub batch: BatchPolicy,
  /// Run the validator and scorer after each attempt.
  pub validate: bool,
  /// How many thinking models are generated (sequentially) per unit.
  pub models_per_unit: usize,
  pub max_tokens: Option<u32>,
  pub content_version: u32,
  /// Replaces the built-in dimension table when present.
  pub dimensions: Option<Vec<DimensionConfig>>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      rules: ValidationRules::default(),
      retry: RetryPolicy::default(),
      call: CallPolicy::default(),
      batch: BatchPolicy::default(),
      validate: true,
      models_per_unit: 3,
      max_tokens: Some(8000),
      content_version: 1,
      dimensions: None,
    }
  }
}

impl PipelineConfig {
  /// Load from a TOML file, or return defaults when no path is given.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let Some(path) = path else {
      info!(target: "thinkgen", "No pipeline config given; using defaults");
      return Ok(Self::default());
    };
    let shown = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| {
      error!(target: "thinkgen", path = %shown, error = %source, "Failed to read TOML config file");
      ConfigError::Read { path: shown.clone(), source }
    })?;
    let cfg = toml::from_str::<PipelineConfig>(&text).map_err(|source| {
      error!(target: "thinkgen", path = %shown, error = %source, "Failed to parse TOML config");
      ConfigError::Parse { path: shown.clone(), source }
    })?;
    info!(target: "thinkgen", path = %shown, "Loaded pipeline config (TOML)");
    Ok(cfg)
  }

  /// Number of attempts a unit gets before its last error or result is final.
  pub fn max_attempts(&self) -> u32 {
    if self.retry.enabled { self.retry.max_retries.max(1) } else { 1 }
  }
}

/// Quality-driven regeneration: how many times a whole unit may be regenerated.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  pub enabled: bool,
  pub max_retries: u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { enabled: true, max_retries: 3 }
  }
}

/// Transient-failure policy for a single backend call (timeout + backoff with jitter).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CallPolicy {
  pub timeout_secs: u64,
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  pub max_delay_ms: u64,
  pub jitter_ms: u64,
}

impl Default for CallPolicy {
  fn default() -> Self {
    Self { timeout_secs: 120, max_attempts: 3, base_delay_ms: 500, max_delay_ms: 8_000, jitter_ms: 250 }
  }
}

/// Batch driver pacing: after every `pause_every` successes, sleep `pause_secs`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
  pub pause_every: Option<usize>,
  pub pause_secs: u64,
}

/// Thresholds for the content validator. Lengths are in characters.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
  pub concepts: ConceptRules,
  pub models: ModelRules,
  pub demonstrations: DemonstrationRules,
  /// Minimum overall quality score for a result to count as valid.
  pub pass_score: u32,
}

impl Default for ValidationRules {
  fn default() -> Self {
    Self {
      concepts: ConceptRules::default(),
      models: ModelRules::default(),
      demonstrations: DemonstrationRules::default(),
      pass_score: 80,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConceptRules {
  pub intro_min: usize,
  pub intro_max: usize,
  pub core_idea_min: usize,
  pub definition_min: usize,
  pub framework_min_steps: usize,
  pub min_misconceptions: usize,
  pub min_real_world_examples: usize,
}

impl Default for ConceptRules {
  fn default() -> Self {
    Self {
      intro_min: 200,
      intro_max: 400,
      core_idea_min: 50,
      definition_min: 100,
      framework_min_steps: 3,
      min_misconceptions: 2,
      min_real_world_examples: 2,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelRules {
  pub intro_min: usize,
  pub min_steps: usize,
  pub max_steps: usize,
  pub step_description_min: usize,
  pub min_key_thinking_points: usize,
  pub min_common_pitfalls: usize,
}

impl Default for ModelRules {
  fn default() -> Self {
    Self {
      intro_min: 150,
      min_steps: 3,
      max_steps: 8,
      step_description_min: 300,
      min_key_thinking_points: 3,
      min_common_pitfalls: 2,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DemonstrationRules {
  pub intro_min: usize,
  pub learning_objective_min: usize,
  pub background_min: usize,
  pub thinking_process_min: usize,
  pub min_key_insights: usize,
  pub min_common_mistakes: usize,
  pub min_transferable_skills: usize,
}

impl Default for DemonstrationRules {
  fn default() -> Self {
    Self {
      intro_min: 100,
      learning_objective_min: 80,
      background_min: 300,
      thinking_process_min: 200,
      min_key_insights: 3,
      min_common_mistakes: 2,
      min_transferable_skills: 3,
    }
  }
}

/// Prompts for the three stages. Placeholders use `{name}` syntax (see `prompts`).
/// Override them in TOML to tune tone or language.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub concepts_user_template: String,
  pub model_user_template: String,
  pub demonstrations_user_template: String,
  /// Fixed intro for the assembled models section.
  pub models_intro_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are an expert curriculum designer for thinking skills. You write rich, concrete teaching content and respond ONLY with one JSON object inside a ```json fenced block.".into(),
      concepts_user_template: r#"Dimension: {dimension_name}: {dimension_description}
Level {level}: {level_title} (difficulty: {difficulty}, cognitive load: {cognitive_load})
Learning goals:
{learning_goals}

Write the core concepts for this level. Return JSON:
{"intro": string (200-400 characters), "concepts": [{"id": string, "name": string, "coreIdea": string (>= 50 characters), "definition": string (>= 100 characters), "conceptBreakdown": {"keyComponents": [string], "explanation": string}, "criticalThinkingFramework": {"steps": [string, string, string]}, "commonMisconceptions": [{"misconception": string, "correction": string}] (>= 2), "realWorldExamples": [{"title": string, "description": string}] (>= 2), "visualizationGuide": {"type": string, "description": string}}]}
Produce 3 to 5 concepts."#.into(),
      model_user_template: r#"Dimension: {dimension_name}: {dimension_description}
Level {level}: {level_title} (difficulty: {difficulty})
Learning goals:
{learning_goals}

Write thinking model #{model_number} of {model_total} for this level.
Models already written (do NOT repeat or closely paraphrase them): {existing_models}

Return ONE model as JSON:
{"id": string, "name": string, "purpose": string, "coreLogic": {"principle": string, "whenWorks": string, "whenFails": string}, "steps": [{"stepNumber": number, "title": string, "description": string (>= 300 characters), "keyThinkingPoints": [string] (>= 3), "commonPitfalls": [string] (>= 2)}] (3 to 8 steps), "fullApplicationExample": {"scenario": string, "walkthrough": string}, "visualization": {"type": string, "stepByStepDrawing": [string]}}"#.into(),
      demonstrations_user_template: r#"Dimension: {dimension_name}: {dimension_description}
Level {level}: {level_title} (difficulty: {difficulty})

Concepts taught at this level:
{concept_listing}

Thinking models taught at this level:
{model_listing}

Write worked demonstrations that apply the concepts and models above. Every analysis step must name the concept or model it applies in "conceptApplied". Return JSON:
{"intro": string (>= 100 characters), "demonstrations": [{"id": string, "title": string, "learningObjective": string (>= 80 characters), "theoreticalFoundation": {"conceptsUsed": [string], "modelsUsed": [string]}, "scenario": {"background": string (>= 300 characters), "challenge": string}, "analysisSteps": [{"stepNumber": number, "title": string, "conceptApplied": string, "thinkingProcess": string (>= 200 characters), "conclusion": string}], "keyInsights": [string] (>= 3), "commonMistakesInThisCase": [{"mistake": string, "correction": string}] (>= 2), "transferableSkills": [string] (>= 3)}]}
Produce 2 or 3 demonstrations."#.into(),
      models_intro_template: "This section introduces {model_count} thinking models for {dimension_name} at level {level} ({level_title}). Each model turns the concepts of this level into a repeatable procedure: read its core logic first, then work through the steps in order, and finish with the full application example to see the whole model in use.".into(),
    }
  }
}
