//! Error taxonomy for the generation pipeline.
//!
//! Extraction, client and schema failures are caught at the orchestrator's attempt
//! boundary and turned into a retry-or-fail decision. A failed validation is not an
//! error at all: it travels as `ValidationResult::is_valid == false`.

use thiserror::Error;

use crate::domain::Stage;

/// Failure to turn a raw model reply into a JSON value.
#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("no JSON payload found in model response (head: {head:?}, tail: {tail:?})")]
  JsonNotFound { head: String, tail: String },

  #[error("JSON payload could not be parsed even after repair: {message} (before repair: {before_repair:?}, after repair: {after_repair:?})")]
  JsonParse {
    message: String,
    before_repair: String,
    after_repair: String,
  },
}

/// The repair pass could not make sense of the candidate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
  #[error("candidate is empty")]
  Empty,
  #[error("candidate does not contain an object opening brace")]
  NoObject,
}

/// Failures raised by the generation backend collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("generation backend HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("generation call timed out after {0}s")]
  Timeout(u64),

  #[error("could not decode backend response: {0}")]
  Decode(String),
}

impl ClientError {
  /// Whether the call-level policy should try the same request again.
  pub fn is_transient(&self) -> bool {
    match self {
      ClientError::Http { status, .. } => *status == 429 || *status >= 500,
      ClientError::Transport(_) | ClientError::Timeout(_) => true,
      ClientError::Decode(_) => false,
    }
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store serialization error: {0}")]
  Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid dimension table: {0}")]
  Dimensions(String),
}

/// Errors surfaced by a single generation unit.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("model returned an empty response for the {stage} stage")]
  EmptyResponse { stage: Stage },

  #[error(transparent)]
  Extract(#[from] ExtractError),

  #[error("{stage} payload does not match its schema: {message}")]
  Schema { stage: Stage, message: String },

  #[error(transparent)]
  Client(#[from] ClientError),

  #[error("unknown dimension: {0}")]
  UnknownDimension(String),

  #[error("level {0} is outside 1..=5")]
  InvalidLevel(u8),

  #[error("generation cancelled")]
  Cancelled,

  #[error(transparent)]
  Persistence(#[from] StoreError),
}

impl GenerationError {
  /// Errors that must not trigger another attempt of the same unit.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      GenerationError::UnknownDimension(_)
        | GenerationError::InvalidLevel(_)
        | GenerationError::Cancelled
        | GenerationError::Persistence(_)
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transient_client_errors() {
    assert!(ClientError::Timeout(30).is_transient());
    assert!(ClientError::Http { status: 503, message: "busy".into() }.is_transient());
    assert!(ClientError::Http { status: 429, message: "slow down".into() }.is_transient());
    assert!(!ClientError::Http { status: 401, message: "bad key".into() }.is_transient());
    assert!(!ClientError::Decode("eof".into()).is_transient());
  }

  #[test]
  fn fatal_generation_errors() {
    assert!(GenerationError::Cancelled.is_fatal());
    assert!(GenerationError::UnknownDimension("x".into()).is_fatal());
    assert!(!GenerationError::EmptyResponse { stage: Stage::Models }.is_fatal());
  }
}
