//! Structural validation of a generated (concepts, models, demonstrations) triple.
//!
//! Thresholds come from `ValidationRules`. Messages name the section and the 1-based
//! position of the offending item, e.g. "demo 2, analysis step 3: ...".
//! Validation never fails: absent fields were already defaulted by the schema layer.

use serde::Serialize;

use crate::config::ValidationRules;
use crate::content::{ConceptsContent, DemonstrationsContent, ModelsContent};
use crate::scorer::{self, QualityMetrics};
use crate::util::char_len;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
  pub is_valid: bool,
  pub score: u32,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub metrics: QualityMetrics,
}

#[derive(Default)]
struct Report {
  errors: Vec<String>,
  warnings: Vec<String>,
}

impl Report {
  fn error(&mut self, msg: String) {
    self.errors.push(msg);
  }

  fn warn(&mut self, msg: String) {
    self.warnings.push(msg);
  }

  fn min_chars(&mut self, at: &str, field: &str, text: &str, min: usize) {
    let n = char_len(text);
    if n < min {
      self.error(format!("{at}: {field} too short: {n} chars (min {min})"));
    }
  }

  fn min_count(&mut self, at: &str, field: &str, found: usize, min: usize) {
    if found < min {
      self.error(format!("{at}: {field} needs at least {min} items (found {found})"));
    }
  }
}

fn check_concepts(c: &ConceptsContent, rules: &ValidationRules, r: &mut Report) {
  let cr = &rules.concepts;
  let intro = char_len(&c.intro);
  if intro < cr.intro_min {
    r.error(format!("concepts intro too short: {intro} chars (min {})", cr.intro_min));
  } else if intro > cr.intro_max {
    r.warn(format!("concepts intro too long: {intro} chars (max {})", cr.intro_max));
  }

  for (i, concept) in c.concepts.iter().enumerate() {
    let at = format!("concept {}", i + 1);
    r.min_chars(&at, "coreIdea", &concept.core_idea, cr.core_idea_min);
    r.min_chars(&at, "definition", &concept.definition, cr.definition_min);
    if concept.concept_breakdown.is_none() {
      r.warn(format!("{at}: conceptBreakdown missing"));
    }
    let framework_steps = concept
      .critical_thinking_framework
      .as_ref()
      .map(|f| f.steps.iter().filter(|s| !s.trim().is_empty()).count())
      .unwrap_or(0);
    r.min_count(&at, "criticalThinkingFramework steps", framework_steps, cr.framework_min_steps);
    r.min_count(&at, "commonMisconceptions", concept.common_misconceptions.len(), cr.min_misconceptions);
    r.min_count(&at, "realWorldExamples", concept.real_world_examples.len(), cr.min_real_world_examples);
    if concept.visualization_guide.as_ref().map_or(true, |g| g.kind.trim().is_empty()) {
      r.error(format!("{at}: visualizationGuide missing type"));
    }
  }
}

fn check_models(m: &ModelsContent, rules: &ValidationRules, r: &mut Report) {
  let mr = &rules.models;
  let intro = char_len(&m.intro);
  if intro < mr.intro_min {
    r.error(format!("models intro too short: {intro} chars (min {})", mr.intro_min));
  }

  for (i, model) in m.models.iter().enumerate() {
    let at = format!("model {}", i + 1);
    if !model.core_logic.as_ref().is_some_and(|l| l.is_complete()) {
      r.error(format!("{at}: coreLogic incomplete (principle, whenWorks and whenFails are required)"));
    }
    r.min_count(&at, "steps", model.steps.len(), mr.min_steps);
    if model.steps.len() > mr.max_steps {
      r.warn(format!("{at}: {} steps exceeds the recommended maximum of {}", model.steps.len(), mr.max_steps));
    }

    for (j, step) in model.steps.iter().enumerate() {
      let step_at = format!("{at}, step {}", j + 1);
      r.min_chars(&step_at, "description", &step.description, mr.step_description_min);
      r.min_count(&step_at, "keyThinkingPoints", step.key_thinking_points.len(), mr.min_key_thinking_points);
      r.min_count(&step_at, "commonPitfalls", step.common_pitfalls.len(), mr.min_common_pitfalls);
    }

    if model.full_application_example.as_ref().map_or(true, |e| e.scenario.trim().is_empty()) {
      r.error(format!("{at}: fullApplicationExample.scenario missing"));
    }
    if model.visualization.as_ref().map_or(true, |v| v.step_by_step_drawing.is_empty()) {
      r.error(format!("{at}: visualization.stepByStepDrawing missing or empty"));
    }
  }
}

fn check_demonstrations(d: &DemonstrationsContent, rules: &ValidationRules, r: &mut Report) {
  let dr = &rules.demonstrations;
  let intro = char_len(&d.intro);
  if intro < dr.intro_min {
    r.error(format!("demonstrations intro too short: {intro} chars (min {})", dr.intro_min));
  }

  for (k, demo) in d.demonstrations.iter().enumerate() {
    let at = format!("demo {}", k + 1);
    let objective = char_len(&demo.learning_objective);
    if objective < dr.learning_objective_min {
      r.error(format!(
        "{at}: learningObjective missing or too short: {objective} chars (min {})",
        dr.learning_objective_min
      ));
    }
    if demo.theoretical_foundation.as_ref().map_or(true, |t| t.concepts_used.is_empty()) {
      r.error(format!("{at}: theoreticalFoundation.conceptsUsed is empty"));
    }
    let background = demo.scenario.as_ref().map(|s| s.background.as_str()).unwrap_or("");
    r.min_chars(&at, "scenario.background", background, dr.background_min);

    for (m, step) in demo.analysis_steps.iter().enumerate() {
      let step_at = format!("{at}, analysis step {}", m + 1);
      if step.concept_applied.trim().is_empty() {
        r.error(format!("{step_at}: conceptApplied missing (each step must name the concept or model it applies)"));
      }
      r.min_chars(&step_at, "thinkingProcess", &step.thinking_process, dr.thinking_process_min);
    }

    r.min_count(&at, "keyInsights", demo.key_insights.len(), dr.min_key_insights);
    r.min_count(&at, "commonMistakesInThisCase", demo.common_mistakes_in_this_case.len(), dr.min_common_mistakes);
    r.min_count(&at, "transferableSkills", demo.transferable_skills.len(), dr.min_transferable_skills);
  }
}

/// Highest score a result with errors can carry.
pub const ERROR_SCORE_CAP: u32 = 79;

/// Validate the triple and compute its quality score.
///
/// A result with any error is capped at [`ERROR_SCORE_CAP`] whatever the configured
/// pass mark.
pub fn validate(
  concepts: &ConceptsContent,
  models: &ModelsContent,
  demonstrations: &DemonstrationsContent,
  rules: &ValidationRules,
) -> ValidationResult {
  let mut report = Report::default();
  check_concepts(concepts, rules, &mut report);
  check_models(models, rules, &mut report);
  check_demonstrations(demonstrations, rules, &mut report);

  let metrics = scorer::score(concepts, models, demonstrations);
  let raw = metrics.overall_quality_score;
  let score = if report.errors.is_empty() { raw } else { raw.min(ERROR_SCORE_CAP) };
  let is_valid = report.errors.is_empty() && score >= rules.pass_score;

  ValidationResult { is_valid, score, errors: report.errors, warnings: report.warnings, metrics }
}
