//! Domain models: dimension/level reference data, the unit of work, and pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Difficulty tier attached to a level.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Difficulty::Beginner => "beginner",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Advanced => "advanced",
    };
    f.write_str(s)
  }
}

/// One difficulty tier inside a dimension.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
  pub level: u8,
  pub title: String,
  pub cognitive_load: String,
  #[serde(default)]
  pub learning_goals: Vec<String>,
  pub difficulty: Difficulty,
}

/// A fixed top-level thinking skill.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionConfig {
  pub id: String,
  pub name: String,
  pub description: String,
  #[serde(default)]
  pub levels: Vec<LevelConfig>,
}

impl DimensionConfig {
  pub fn level(&self, level: u8) -> Option<&LevelConfig> {
    self.levels.iter().find(|l| l.level == level)
  }
}

/// One (dimension, level) work item.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationUnit {
  pub dimension_id: String,
  pub level: u8,
  pub attempt: u32,
}

impl GenerationUnit {
  pub fn new(dimension_id: impl Into<String>, level: u8) -> Self {
    Self { dimension_id: dimension_id.into(), level, attempt: 0 }
  }
}

impl fmt::Display for GenerationUnit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/L{}", self.dimension_id, self.level)
  }
}

/// The three ordered content sections produced per unit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Concepts,
  Models,
  Demonstrations,
}

impl Stage {
  /// Field that must appear in a stage payload; anchors the last-resort extraction strategy.
  pub fn marker_field(&self) -> &'static str {
    match self {
      Stage::Concepts => "concepts",
      Stage::Models => "steps",
      Stage::Demonstrations => "demonstrations",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Stage::Concepts => "concepts",
      Stage::Models => "models",
      Stage::Demonstrations => "demonstrations",
    };
    f.write_str(s)
  }
}

/// Unparsed backend text for one stage.
#[derive(Clone, Debug)]
pub struct RawModelResponse {
  pub stage: Stage,
  pub text: String,
}

/// States of the per-unit generation machine.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitState {
  GeneratingConcepts,
  GeneratingModels,
  GeneratingDemonstrations,
  Validating,
  Retry,
  Success,
  Failed,
}

impl UnitState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, UnitState::Success | UnitState::Failed)
  }
}
