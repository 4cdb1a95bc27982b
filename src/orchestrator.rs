//! Generation orchestrator: drives concepts → models → demonstrations for one unit,
//! validates and scores the result, and decides between success, retry and failure.
//!
//! Per attempt:
//!   GENERATING_CONCEPTS → GENERATING_MODELS → GENERATING_DEMONSTRATIONS → VALIDATING
//!   → SUCCESS | RETRY | FAILED
//!
//! A retry restarts all three stages; nothing from a failed attempt is reused.
//! Models are generated one at a time because each prompt lists the names produced
//! so far. The batch driver walks every (dimension, level) unit sequentially.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::content::{ConceptsContent, DemonstrationsContent, ModelsContent, StructuredContent};
use crate::domain::{DimensionConfig, GenerationUnit, LevelConfig, RawModelResponse, Stage, UnitState};
use crate::error::{ConfigError, GenerationError};
use crate::extract;
use crate::openai::{chat_with_policy, ChatMessage, ChatOptions, GenerationClient};
use crate::prompts;
use crate::seeds::dimension_table;
use crate::store::{ContentRecord, ContentStore};
use crate::util::trunc_for_log;
use crate::validator::{self, ValidationResult};

/// External cancellation, checked between stages and before every backend call.
#[derive(Clone, Debug)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
  /// Returns the sender that cancels (send `true`) and the signal to hand to the pipeline.
  pub fn new() -> (watch::Sender<bool>, Self) {
    let (tx, rx) = watch::channel(false);
    (tx, Self(rx))
  }

  /// A signal that is never raised.
  #[cfg(test)]
  pub fn never() -> Self {
    Self::new().1
  }

  pub fn is_cancelled(&self) -> bool {
    *self.0.borrow()
  }

  /// Resolves once cancellation is requested; never resolves if the sender is gone.
  pub async fn cancelled(&self) {
    let mut rx = self.0.clone();
    if rx.wait_for(|c| *c).await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}

/// Per-run switches, usually taken from the config and overridden by CLI/HTTP input.
#[derive(Clone, Debug)]
pub struct RunOptions {
  pub validate: bool,
  pub max_attempts: u32,
}

impl RunOptions {
  pub fn from_config(cfg: &PipelineConfig) -> Self {
    Self { validate: cfg.validate, max_attempts: cfg.max_attempts() }
  }
}

/// Terminal result of one unit.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOutcome {
  pub unit: GenerationUnit,
  pub success: bool,
  pub attempts: u32,
  pub concepts: ConceptsContent,
  pub models: ModelsContent,
  pub demonstrations: DemonstrationsContent,
  pub validation: Option<ValidationResult>,
  pub history: Vec<UnitState>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
  pub succeeded: usize,
  pub failed: usize,
  pub failures: Vec<String>,
  pub cancelled: bool,
}

struct Triple {
  concepts: ConceptsContent,
  models: ModelsContent,
  demonstrations: DemonstrationsContent,
}

pub struct Orchestrator {
  client: Arc<dyn GenerationClient>,
  config: Arc<PipelineConfig>,
  dimensions: Vec<DimensionConfig>,
}

impl Orchestrator {
  /// Build from config; the configured dimension table wins over the built-in one.
  pub fn new(client: Arc<dyn GenerationClient>, config: Arc<PipelineConfig>) -> Result<Self, ConfigError> {
    let dimensions = dimension_table(config.dimensions.as_deref())?;
    Ok(Self { client, config, dimensions })
  }

  #[cfg(test)]
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Resolve reference data for a unit; fails fast on unknown ids or levels.
  pub fn resolve(&self, dimension_id: &str, level: u8) -> Result<(&DimensionConfig, &LevelConfig), GenerationError> {
    if !(1..=5).contains(&level) {
      return Err(GenerationError::InvalidLevel(level));
    }
    let dim = self
      .dimensions
      .iter()
      .find(|d| d.id == dimension_id)
      .ok_or_else(|| GenerationError::UnknownDimension(dimension_id.to_string()))?;
    let lvl = dim.level(level).ok_or(GenerationError::InvalidLevel(level))?;
    Ok((dim, lvl))
  }

  /// Generate one unit, retrying whole attempts until success or the attempt budget is spent.
  ///
  /// Returns `Err` only when the last attempt ended in an error. An attempt that produced
  /// content but failed validation on the last try is returned as `success == false`.
  #[instrument(level = "info", skip(self, dimension_id, opts, cancel), fields(dimension = %dimension_id))]
  pub async fn generate_unit(
    &self,
    dimension_id: &str,
    level: u8,
    opts: &RunOptions,
    cancel: &CancelSignal,
  ) -> Result<UnitOutcome, GenerationError> {
    let (dim, lvl) = self.resolve(dimension_id, level)?;
    let max_attempts = opts.max_attempts.max(1);
    let mut unit = GenerationUnit::new(dimension_id, level);
    let mut history = Vec::new();

    loop {
      unit.attempt += 1;
      let attempt = unit.attempt;

      let triple = match self.run_attempt(dim, lvl, &unit, &mut history, cancel).await {
        Ok(t) => t,
        Err(e) if e.is_fatal() || attempt >= max_attempts => {
          history.push(UnitState::Failed);
          error!(target: "pipeline", %unit, attempt, error = %e, "Unit failed");
          return Err(e);
        }
        Err(e) => {
          history.push(UnitState::Retry);
          warn!(target: "pipeline", %unit, attempt, max_attempts, error = %e, "Attempt failed; regenerating unit");
          continue;
        }
      };

      if !opts.validate {
        history.push(UnitState::Success);
        info!(target: "pipeline", %unit, attempt, "Unit generated (validation disabled)");
        return Ok(self.outcome(unit, true, triple, None, history));
      }

      history.push(UnitState::Validating);
      let result = validator::validate(&triple.concepts, &triple.models, &triple.demonstrations, &self.config.rules);
      info!(
        target: "pipeline",
        %unit,
        attempt,
        score = result.score,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "Validation finished"
      );

      if result.is_valid {
        history.push(UnitState::Success);
        return Ok(self.outcome(unit, true, triple, Some(result), history));
      }
      if attempt < max_attempts {
        history.push(UnitState::Retry);
        warn!(target: "pipeline", %unit, attempt, first_error = ?result.errors.first(), "Content below quality bar; regenerating unit");
        continue;
      }
      history.push(UnitState::Failed);
      warn!(target: "pipeline", %unit, attempt, score = result.score, "Retries exhausted; returning invalid content");
      return Ok(self.outcome(unit, false, triple, Some(result), history));
    }
  }

  fn outcome(
    &self,
    unit: GenerationUnit,
    success: bool,
    triple: Triple,
    validation: Option<ValidationResult>,
    history: Vec<UnitState>,
  ) -> UnitOutcome {
    debug_assert!(history.last().is_some_and(UnitState::is_terminal));
    UnitOutcome {
      attempts: unit.attempt,
      unit,
      success,
      concepts: triple.concepts,
      models: triple.models,
      demonstrations: triple.demonstrations,
      validation,
      history,
    }
  }

  #[instrument(level = "info", skip_all, fields(attempt = unit.attempt))]
  async fn run_attempt(
    &self,
    dim: &DimensionConfig,
    lvl: &LevelConfig,
    unit: &GenerationUnit,
    history: &mut Vec<UnitState>,
    cancel: &CancelSignal,
  ) -> Result<Triple, GenerationError> {
    let prompts = &self.config.prompts;

    history.push(UnitState::GeneratingConcepts);
    let concepts = self
      .generate_stage(Stage::Concepts, prompts::concepts_messages(prompts, dim, lvl), cancel)
      .await?
      .into_concepts()
      .ok_or_else(|| variant_mismatch(Stage::Concepts))?;
    info!(target: "pipeline", %unit, stage = %Stage::Concepts, count = concepts.concepts.len(), "Stage complete");

    history.push(UnitState::GeneratingModels);
    let total = self.config.models_per_unit.max(1);
    let mut models = Vec::with_capacity(total);
    let mut names: Vec<String> = Vec::with_capacity(total);
    for n in 1..=total {
      let messages = prompts::model_messages(prompts, dim, lvl, n, total, &names);
      let generated = self
        .generate_stage(Stage::Models, messages, cancel)
        .await?
        .into_models()
        .ok_or_else(|| variant_mismatch(Stage::Models))?;
      for model in generated.models {
        names.push(model.name.clone());
        models.push(model);
      }
    }
    let models = ModelsContent { intro: prompts::models_intro(prompts, dim, lvl, models.len()), models };
    info!(target: "pipeline", %unit, stage = %Stage::Models, count = models.models.len(), "Stage complete");

    history.push(UnitState::GeneratingDemonstrations);
    let messages = prompts::demonstrations_messages(prompts, dim, lvl, &concepts, &models);
    let demonstrations = self
      .generate_stage(Stage::Demonstrations, messages, cancel)
      .await?
      .into_demonstrations()
      .ok_or_else(|| variant_mismatch(Stage::Demonstrations))?;
    info!(target: "pipeline", %unit, stage = %Stage::Demonstrations, count = demonstrations.demonstrations.len(), "Stage complete");

    Ok(Triple { concepts, models, demonstrations })
  }

  /// One backend call plus extraction and schema mapping for `stage`.
  async fn generate_stage(
    &self,
    stage: Stage,
    messages: Vec<ChatMessage>,
    cancel: &CancelSignal,
  ) -> Result<StructuredContent, GenerationError> {
    if cancel.is_cancelled() {
      return Err(GenerationError::Cancelled);
    }
    let opts = ChatOptions { stream: false, max_tokens: self.config.max_tokens };
    let text = chat_with_policy(self.client.as_ref(), &messages, &opts, &self.config.call, cancel).await?;
    let raw = RawModelResponse { stage, text };
    if raw.text.trim().is_empty() {
      return Err(GenerationError::EmptyResponse { stage });
    }

    let value = extract::extract(&raw.text, stage.marker_field()).inspect_err(|e| {
      warn!(target: "pipeline", stage = %raw.stage, error = %e, reply = %trunc_for_log(&raw.text, 300), "Extraction failed");
    })?;
    let content =
      StructuredContent::from_value(stage, value).map_err(|e| GenerationError::Schema { stage, message: e.to_string() })?;
    debug!(target: "pipeline", stage = %content.stage(), reply_chars = raw.text.chars().count(), "Stage payload mapped");
    Ok(content)
  }

  /// Generate, persist and tally every (dimension, level) unit, one after another.
  ///
  /// A failing unit is logged and counted; it never stops the batch. Cancellation does.
  #[instrument(level = "info", skip_all)]
  pub async fn run_batch(&self, opts: &RunOptions, store: &dyn ContentStore, cancel: &CancelSignal) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let units: Vec<(String, u8)> = self
      .dimensions
      .iter()
      .flat_map(|d| d.levels.iter().map(move |l| (d.id.clone(), l.level)))
      .collect();
    let total = units.len();
    info!(target: "pipeline", total, "Batch started");

    for (index, (dimension_id, level)) in units.into_iter().enumerate() {
      if cancel.is_cancelled() {
        summary.cancelled = true;
        warn!(target: "pipeline", done = index, total, "Batch cancelled");
        break;
      }
      info!(target: "pipeline", progress = %format!("{}/{}", index + 1, total), %dimension_id, level, "Generating unit");

      match self.generate_and_store(&dimension_id, level, opts, store, cancel).await {
        Ok((outcome, _)) if outcome.success => {
          summary.succeeded += 1;
          self.maybe_pause(summary.succeeded).await;
        }
        Ok((outcome, _)) => {
          summary.failed += 1;
          let score = outcome.validation.as_ref().map(|v| v.score).unwrap_or(0);
          summary.failures.push(format!("{dimension_id}/L{level}: stored as draft (score {score})"));
        }
        Err(GenerationError::Cancelled) => {
          summary.cancelled = true;
          warn!(target: "pipeline", %dimension_id, level, "Batch cancelled during unit");
          break;
        }
        Err(e) => {
          summary.failed += 1;
          error!(target: "pipeline", %dimension_id, level, error = %e, "Unit failed; continuing batch");
          summary.failures.push(format!("{dimension_id}/L{level}: {e}"));
        }
      }
    }

    info!(target: "pipeline", succeeded = summary.succeeded, failed = summary.failed, cancelled = summary.cancelled, "Batch finished");
    summary
  }

  /// Generate one unit and upsert it (validated or draft) into `store`.
  pub async fn generate_and_store(
    &self,
    dimension_id: &str,
    level: u8,
    opts: &RunOptions,
    store: &dyn ContentStore,
    cancel: &CancelSignal,
  ) -> Result<(UnitOutcome, ContentRecord), GenerationError> {
    let outcome = self.generate_unit(dimension_id, level, opts, cancel).await?;
    let (dim, lvl) = self.resolve(dimension_id, level)?;
    let record = ContentRecord::from_outcome(&outcome, dim, lvl, self.config.content_version);
    let record = store.upsert(record).await?;
    Ok((outcome, record))
  }

  async fn maybe_pause(&self, succeeded: usize) {
    let batch = &self.config.batch;
    if let Some(every) = batch.pause_every.filter(|n| *n > 0) {
      if succeeded % every == 0 && batch.pause_secs > 0 {
        info!(target: "pipeline", succeeded, pause_secs = batch.pause_secs, "Pausing batch");
        tokio::time::sleep(Duration::from_secs(batch.pause_secs)).await;
      }
    }
  }
}

fn variant_mismatch(stage: Stage) -> GenerationError {
  GenerationError::Schema { stage, message: "payload mapped to a different stage".into() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ClientError;
  use crate::fixtures::{self, Scripted};
  use crate::store::{MemoryStore, ValidationStatus};

  fn config(models_per_unit: usize, max_retries: u32) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.models_per_unit = models_per_unit;
    cfg.retry.max_retries = max_retries;
    cfg.call.max_attempts = 1;
    cfg
  }

  fn orchestrator(client: Arc<Scripted>, cfg: PipelineConfig) -> Orchestrator {
    Orchestrator::new(client, Arc::new(cfg)).expect("builtin dimensions")
  }

  fn good_attempt() -> Vec<Result<String, ClientError>> {
    fixtures::good_attempt_replies()
  }

  fn truncated_concepts() -> Result<String, ClientError> {
    Ok("```json\n{\"intro\": \"cut off mid-str\n```".into())
  }

  #[tokio::test]
  async fn succeeds_on_third_attempt_after_parse_failures() {
    let mut replies = vec![truncated_concepts(), truncated_concepts()];
    replies.extend(good_attempt());
    let client = Arc::new(Scripted::new(replies));
    let orch = orchestrator(client.clone(), config(2, 3));
    let opts = RunOptions::from_config(orch.config());

    let outcome = orch.generate_unit("critical", 2, &opts, &CancelSignal::never()).await.expect("third attempt succeeds");
    assert!(outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.unit.attempt, 3);
    assert!(outcome.validation.as_ref().is_some_and(|v| v.is_valid && v.errors.is_empty()));
    assert_eq!(client.calls(), 6);
    assert_eq!(
      outcome.history,
      vec![
        UnitState::GeneratingConcepts,
        UnitState::Retry,
        UnitState::GeneratingConcepts,
        UnitState::Retry,
        UnitState::GeneratingConcepts,
        UnitState::GeneratingModels,
        UnitState::GeneratingDemonstrations,
        UnitState::Validating,
        UnitState::Success,
      ]
    );
  }

  #[tokio::test]
  async fn invalid_content_on_single_attempt_is_returned_without_retry() {
    let mut bad_concepts = fixtures::concepts();
    bad_concepts.intro = "too short".into();
    let mut replies = good_attempt();
    replies[0] = Ok(serde_json::to_string(&bad_concepts).unwrap());
    let client = Arc::new(Scripted::new(replies));
    let orch = orchestrator(client.clone(), config(2, 1));
    let opts = RunOptions::from_config(orch.config());

    let outcome = orch.generate_unit("critical", 1, &opts, &CancelSignal::never()).await.expect("result, not error");
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 1);
    let validation = outcome.validation.expect("validation ran");
    assert!(!validation.is_valid);
    assert!(validation.errors[0].starts_with("concepts intro too short: 9 chars"));
    assert!(validation.score <= 79);
    assert_eq!(client.calls(), 4);
    assert_eq!(outcome.history.last(), Some(&UnitState::Failed));
  }

  #[tokio::test]
  async fn last_error_is_raised_when_attempts_run_out() {
    let client = Arc::new(Scripted::new(vec![
      Ok("no json here".into()),
      Ok("   ".into()),
    ]));
    let orch = orchestrator(client.clone(), config(2, 2));
    let opts = RunOptions::from_config(orch.config());

    let err = orch.generate_unit("systems", 4, &opts, &CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse { stage: Stage::Concepts }));
    assert_eq!(client.calls(), 2);
  }

  #[tokio::test]
  async fn unknown_dimension_and_bad_level_fail_before_any_call() {
    let client = Arc::new(Scripted::new(good_attempt()));
    let orch = orchestrator(client.clone(), config(2, 3));
    let opts = RunOptions::from_config(orch.config());

    let err = orch.generate_unit("telepathy", 1, &opts, &CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, GenerationError::UnknownDimension(_)));
    let err = orch.generate_unit("critical", 6, &opts, &CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidLevel(6)));
    assert_eq!(client.calls(), 0);
  }

  #[tokio::test]
  async fn models_are_generated_sequentially_with_previous_names() {
    let client = Arc::new(Scripted::new(good_attempt()));
    let orch = orchestrator(client.clone(), config(2, 1));
    let opts = RunOptions::from_config(orch.config());

    let outcome = orch.generate_unit("creative", 3, &opts, &CancelSignal::never()).await.unwrap();
    assert_eq!(outcome.models.models.len(), 2);
    assert!(outcome.models.intro.contains("2 thinking models for Creative Thinking"));

    let prompts = client.prompts();
    assert!(prompts[1].contains("none yet"));
    assert!(prompts[2].contains("Model 1"));
    assert!(prompts[3].contains("- Model 2 (id: model-2)"));
    assert!(prompts[3].contains("- Concept 3 (id: concept-3)"));
  }

  #[tokio::test]
  async fn validation_can_be_disabled() {
    let mut bad_concepts = fixtures::concepts();
    bad_concepts.intro = String::new();
    let mut replies = good_attempt();
    replies[0] = Ok(serde_json::to_string(&bad_concepts).unwrap());
    let client = Arc::new(Scripted::new(replies));
    let orch = orchestrator(client, config(2, 3));
    let opts = RunOptions { validate: false, max_attempts: 3 };

    let outcome = orch.generate_unit("logical", 5, &opts, &CancelSignal::never()).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.validation.is_none());
  }

  #[tokio::test]
  async fn cancellation_is_not_retried() {
    let client = Arc::new(Scripted::new(good_attempt()));
    let orch = orchestrator(client.clone(), config(2, 3));
    let opts = RunOptions::from_config(orch.config());
    let (tx, cancel) = CancelSignal::new();
    tx.send(true).unwrap();

    let err = orch.generate_unit("critical", 1, &opts, &cancel).await.unwrap_err();
    assert!(matches!(err, GenerationError::Cancelled));
    assert_eq!(client.calls(), 0);
  }

  #[tokio::test]
  async fn batch_continues_past_failures_and_persists() {
    let mut cfg = config(2, 1);
    let mut dims = crate::seeds::builtin_dimensions();
    dims.truncate(1);
    cfg.dimensions = Some(dims);

    // Level 1 succeeds, level 2 has no JSON, levels 3-5 run out of replies (empty).
    let mut replies = good_attempt();
    replies.push(Ok("I'd rather not.".into()));
    let client = Arc::new(Scripted::new(replies));
    let orch = orchestrator(client, cfg);
    let opts = RunOptions::from_config(orch.config());
    let store = MemoryStore::default();

    let summary = orch.run_batch(&opts, &store, &CancelSignal::never()).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 4);
    assert!(!summary.cancelled);
    assert!(summary.failures[0].starts_with("critical/L2"));

    let record = store.get("critical", 1, 1).await.unwrap().expect("level 1 stored");
    assert_eq!(record.validation_status, ValidationStatus::Validated);
    assert!(store.get("critical", 2, 1).await.unwrap().is_none());
  }

  fn single_dimension_batch(pause_every: Option<usize>) -> (Orchestrator, Arc<Scripted>) {
    let mut cfg = config(2, 1);
    let mut dims = crate::seeds::builtin_dimensions();
    dims.truncate(1);
    cfg.dimensions = Some(dims);
    cfg.batch.pause_every = pause_every;
    cfg.batch.pause_secs = 60;
    // Level 1 succeeds; levels 2-5 get empty replies and fail.
    let client = Arc::new(Scripted::new(good_attempt()));
    (orchestrator(client.clone(), cfg), client)
  }

  #[tokio::test(start_paused = true)]
  async fn batch_pauses_after_configured_successes() {
    let (orch, _) = single_dimension_batch(Some(1));
    let opts = RunOptions::from_config(orch.config());
    let start = tokio::time::Instant::now();

    let summary = orch.run_batch(&opts, &MemoryStore::default(), &CancelSignal::never()).await;
    assert_eq!(summary.succeeded, 1);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(120), "{elapsed:?}");
  }

  #[tokio::test(start_paused = true)]
  async fn batch_without_pause_policy_never_sleeps() {
    for pause_every in [None, Some(0)] {
      let (orch, client) = single_dimension_batch(pause_every);
      let opts = RunOptions::from_config(orch.config());
      let start = tokio::time::Instant::now();

      let summary = orch.run_batch(&opts, &MemoryStore::default(), &CancelSignal::never()).await;
      assert_eq!(summary.succeeded, 1);
      assert_eq!(client.calls(), 8);
      assert!(start.elapsed() < Duration::from_secs(1), "{pause_every:?}");
    }
  }
}
