//! Typed schemas for the three stage payloads.
//!
//! Every field defaults when absent so the validator can report missing content as
//! rule violations. A value of the wrong JSON type is a schema error instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Stage;

// --- Concepts ---

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConceptsContent {
  pub intro: String,
  pub concepts: Vec<Concept>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Concept {
  pub id: String,
  pub name: String,
  pub core_idea: String,
  pub definition: String,
  pub concept_breakdown: Option<ConceptBreakdown>,
  pub critical_thinking_framework: Option<ThinkingFramework>,
  pub common_misconceptions: Vec<Misconception>,
  pub real_world_examples: Vec<RealWorldExample>,
  pub visualization_guide: Option<VisualizationGuide>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConceptBreakdown {
  pub key_components: Vec<String>,
  pub explanation: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ThinkingFramework {
  pub steps: Vec<String>,
}

impl ThinkingFramework {
  /// A usable framework has a non-empty third step.
  pub fn has_third_step(&self) -> bool {
    self.steps.get(2).is_some_and(|s| !s.trim().is_empty())
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Misconception {
  pub misconception: String,
  pub correction: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RealWorldExample {
  pub title: String,
  pub description: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualizationGuide {
  #[serde(rename = "type")]
  pub kind: String,
  pub description: String,
}

// --- Models ---

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelsContent {
  pub intro: String,
  pub models: Vec<ThinkingModel>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ThinkingModel {
  pub id: String,
  pub name: String,
  pub purpose: String,
  pub core_logic: Option<CoreLogic>,
  pub steps: Vec<ModelStep>,
  pub full_application_example: Option<ApplicationExample>,
  pub visualization: Option<ModelVisualization>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreLogic {
  pub principle: String,
  pub when_works: String,
  pub when_fails: String,
}

impl CoreLogic {
  pub fn is_complete(&self) -> bool {
    [&self.principle, &self.when_works, &self.when_fails]
      .iter()
      .all(|s| !s.trim().is_empty())
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelStep {
  pub step_number: u32,
  pub title: String,
  pub description: String,
  pub key_thinking_points: Vec<String>,
  pub common_pitfalls: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationExample {
  pub scenario: String,
  pub walkthrough: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelVisualization {
  #[serde(rename = "type")]
  pub kind: String,
  pub step_by_step_drawing: Vec<String>,
}

// --- Demonstrations ---

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DemonstrationsContent {
  pub intro: String,
  pub demonstrations: Vec<Demonstration>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Demonstration {
  pub id: String,
  pub title: String,
  pub learning_objective: String,
  pub theoretical_foundation: Option<TheoreticalFoundation>,
  pub scenario: Option<CaseScenario>,
  pub analysis_steps: Vec<AnalysisStep>,
  pub key_insights: Vec<String>,
  pub common_mistakes_in_this_case: Vec<CaseMistake>,
  pub transferable_skills: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TheoreticalFoundation {
  pub concepts_used: Vec<String>,
  pub models_used: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseScenario {
  pub background: String,
  pub challenge: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisStep {
  pub step_number: u32,
  pub title: String,
  pub concept_applied: String,
  pub thinking_process: String,
  pub conclusion: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseMistake {
  pub mistake: String,
  pub correction: String,
}

/// Parsed payload for one stage.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "stage", content = "content", rename_all = "snake_case")]
pub enum StructuredContent {
  Concepts(ConceptsContent),
  Models(ModelsContent),
  Demonstrations(DemonstrationsContent),
}

impl StructuredContent {
  /// Interpret an extracted JSON value as the payload of `stage`.
  ///
  /// The models stage is generated one model at a time, so its payload is a single
  /// `ThinkingModel` wrapped into a one-element `ModelsContent`.
  pub fn from_value(stage: Stage, value: Value) -> Result<Self, serde_json::Error> {
    Ok(match stage {
      Stage::Concepts => StructuredContent::Concepts(serde_json::from_value(value)?),
      Stage::Models => {
        let model: ThinkingModel = serde_json::from_value(value)?;
        StructuredContent::Models(ModelsContent { intro: String::new(), models: vec![model] })
      }
      Stage::Demonstrations => StructuredContent::Demonstrations(serde_json::from_value(value)?),
    })
  }

  pub fn into_concepts(self) -> Option<ConceptsContent> {
    match self {
      StructuredContent::Concepts(c) => Some(c),
      _ => None,
    }
  }

  pub fn into_models(self) -> Option<ModelsContent> {
    match self {
      StructuredContent::Models(m) => Some(m),
      _ => None,
    }
  }

  pub fn into_demonstrations(self) -> Option<DemonstrationsContent> {
    match self {
      StructuredContent::Demonstrations(d) => Some(d),
      _ => None,
    }
  }

  pub fn stage(&self) -> Stage {
    match self {
      StructuredContent::Concepts(_) => Stage::Concepts,
      StructuredContent::Models(_) => Stage::Models,
      StructuredContent::Demonstrations(_) => Stage::Demonstrations,
    }
  }
}
