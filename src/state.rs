//! Application state shared by the HTTP handlers.
//!
//! This module owns:
//!   - the pipeline config and dimension table
//!   - the orchestrator (absent when no generation backend is configured)
//!   - the content store
//!   - the process-wide cancellation signal

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::domain::DimensionConfig;
use crate::error::{ConfigError, GenerationError};
use crate::openai::GenerationClient;
use crate::orchestrator::{CancelSignal, Orchestrator, RunOptions, UnitOutcome};
use crate::seeds::dimension_table;
use crate::store::{ContentRecord, ContentStore};

pub struct AppState {
  pub config: Arc<PipelineConfig>,
  pub dimensions: Vec<DimensionConfig>,
  pub orchestrator: Option<Orchestrator>,
  pub store: Arc<dyn ContentStore>,
  pub cancel: CancelSignal,
}

impl AppState {
  #[instrument(level = "info", skip_all)]
  pub fn new(
    config: Arc<PipelineConfig>,
    client: Option<Arc<dyn GenerationClient>>,
    store: Arc<dyn ContentStore>,
    cancel: CancelSignal,
  ) -> Result<Self, ConfigError> {
    let dimensions = dimension_table(config.dimensions.as_deref())?;
    let orchestrator = client.map(|c| Orchestrator::new(c, config.clone())).transpose()?;
    if orchestrator.is_some() {
      info!(target: "thinkgen", dimensions = dimensions.len(), "Generation enabled");
    } else {
      warn!(target: "thinkgen", "Generation disabled (no OPENAI_API_KEY); serving stored content only");
    }
    Ok(Self { config, dimensions, orchestrator, store, cancel })
  }

  /// Generate one unit with the configured options (optionally overriding validation)
  /// and persist it. Returns `None` when generation is disabled.
  pub async fn generate(
    &self,
    dimension_id: &str,
    level: u8,
    validate: Option<bool>,
  ) -> Option<Result<(UnitOutcome, ContentRecord), GenerationError>> {
    let orch = self.orchestrator.as_ref()?;
    let mut opts = RunOptions::from_config(&self.config);
    if let Some(v) = validate {
      opts.validate = v;
    }
    Some(orch.generate_and_store(dimension_id, level, &opts, self.store.as_ref(), &self.cancel).await)
  }
}
