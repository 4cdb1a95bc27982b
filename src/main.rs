//! Thinkgen · Thinking-skills content generator
//!
//! - Three-stage LLM pipeline per (dimension, level): concepts → models → demonstrations
//! - Extraction/repair of JSON from free-form replies, rule validation and quality scoring
//! - CLI for one unit or the whole table, or an Axum HTTP API (`--serve`)
//!
//! Important env variables:
//!   OPENAI_API_KEY       : enables generation if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_MODEL         : default "gpt-4o"
//!   PIPELINE_CONFIG_PATH : path to TOML config (prompts, rules, policies, dimensions)
//!   PORT                 : u16 for `--serve` (default 3000)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod content;
mod config;
mod seeds;
mod extract;
mod scorer;
mod validator;
mod prompts;
mod openai;
mod orchestrator;
mod store;
mod state;
mod protocol;
mod routes;
#[cfg(test)]
mod fixtures;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::{ArgGroup, Parser};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::openai::{GenerationClient, OpenAI};
use crate::orchestrator::{CancelSignal, Orchestrator, RunOptions};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{ContentStore, JsonDirStore, MemoryStore};

/// Generate structured thinking-skills lessons with an LLM backend.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["dimension", "all", "serve"])))]
struct Cli {
  /// Dimension id to generate (with --level).
  #[arg(long, requires = "level")]
  dimension: Option<String>,

  /// Level 1-5 to generate (with --dimension).
  #[arg(long, requires = "dimension")]
  level: Option<u8>,

  /// Generate every (dimension, level) unit sequentially.
  #[arg(long)]
  all: bool,

  /// Run the HTTP API instead of generating from the command line.
  #[arg(long)]
  serve: bool,

  /// Validate and score each attempt (config default when neither flag is given).
  #[arg(long, overrides_with = "no_validate")]
  validate: bool,
  #[arg(long)]
  no_validate: bool,

  /// Regenerate units that fail (config default when neither flag is given).
  #[arg(long, overrides_with = "no_retry")]
  retry: bool,
  #[arg(long)]
  no_retry: bool,

  #[arg(long)]
  max_retries: Option<u32>,

  /// Directory of the JSON content store.
  #[arg(long, default_value = "./generated")]
  out: PathBuf,

  /// Keep generated content in memory only; nothing is written under --out.
  #[arg(long)]
  in_memory: bool,

  /// Pipeline TOML config.
  #[arg(long, env = "PIPELINE_CONFIG_PATH")]
  config: Option<PathBuf>,

  #[arg(long, env = "PORT", default_value_t = 3000)]
  port: u16,
}

impl Cli {
  /// Command-line switches win over the config file.
  fn apply(&self, cfg: &mut PipelineConfig) {
    if self.validate {
      cfg.validate = true;
    }
    if self.no_validate {
      cfg.validate = false;
    }
    if self.retry {
      cfg.retry.enabled = true;
    }
    if self.no_retry {
      cfg.retry.enabled = false;
    }
    if let Some(n) = self.max_retries {
      cfg.retry.max_retries = n;
    }
  }

  fn content_store(&self) -> Arc<dyn ContentStore> {
    if self.in_memory {
      info!(target: "thinkgen", "In-memory content store; results are not persisted");
      Arc::new(MemoryStore::default())
    } else {
      Arc::new(JsonDirStore::new(&self.out))
    }
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();
  let cli = Cli::parse();

  let mut config = PipelineConfig::load(cli.config.as_deref())?;
  cli.apply(&mut config);
  let config = Arc::new(config);

  // Ctrl-C raises the cancellation signal; in-flight work stops at the next check.
  let (cancel_tx, cancel) = CancelSignal::new();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!(target: "thinkgen", "Interrupt received; cancelling");
      let _ = cancel_tx.send(true);
    }
  });

  let client: Option<Arc<dyn GenerationClient>> = match OpenAI::from_env() {
    Some(oa) => {
      info!(target: "thinkgen", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
      Some(Arc::new(oa))
    }
    None => {
      info!(target: "thinkgen", "OpenAI disabled (no OPENAI_API_KEY).");
      None
    }
  };
  let store = cli.content_store();

  if cli.serve {
    let state = Arc::new(AppState::new(config, client, store, cancel.clone())?);
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await?;
    info!(target: "thinkgen", %addr, "HTTP server listening");
    axum::serve(listener, app)
      .with_graceful_shutdown(async move { cancel.cancelled().await })
      .await?;
    return Ok(());
  }

  let client = client.ok_or("OPENAI_API_KEY is not set; generation needs a backend")?;
  let orch = Orchestrator::new(client, config.clone())?;
  let opts = RunOptions::from_config(&config);

  if cli.all {
    let summary = orch.run_batch(&opts, store.as_ref(), &cancel).await;
    for failure in &summary.failures {
      warn!(target: "thinkgen", %failure, "Unit not validated");
    }
    info!(target: "thinkgen", succeeded = summary.succeeded, failed = summary.failed, "Generation complete");
    if summary.cancelled {
      return Err("batch cancelled".into());
    }
    return Ok(());
  }

  let (Some(dimension), Some(level)) = (cli.dimension.as_deref(), cli.level) else {
    return Err("--dimension and --level must be given together".into());
  };
  let (outcome, record) = orch
    .generate_and_store(dimension, level, &opts, store.as_ref(), &cancel)
    .await
    .inspect_err(|e| error!(target: "thinkgen", %dimension, level, error = %e, "Generation failed"))?;
  info!(
    target: "thinkgen",
    id = %record.id,
    status = ?record.validation_status,
    score = ?record.quality_score,
    attempts = outcome.attempts,
    "Unit stored"
  );
  if !outcome.success {
    let errors = outcome.validation.map(|v| v.errors.join("; ")).unwrap_or_default();
    return Err(format!("{dimension}/L{level} failed validation after {} attempt(s): {errors}", outcome.attempts).into());
  }
  Ok(())
}
