//! Stage prompt builders.
//!
//! Placeholders available to every template: `{dimension_name}`, `{dimension_description}`,
//! `{level}`, `{level_title}`, `{difficulty}`, `{cognitive_load}`, `{learning_goals}`.
//! The model template also gets `{model_number}`, `{model_total}`, `{existing_models}`;
//! the demonstrations template gets `{concept_listing}` and `{model_listing}`.

use crate::config::Prompts;
use crate::content::{ConceptsContent, ModelsContent};
use crate::domain::{DimensionConfig, LevelConfig};
use crate::openai::ChatMessage;
use crate::util::fill_template;

fn base_pairs(dim: &DimensionConfig, level: &LevelConfig) -> Vec<(&'static str, String)> {
  let goals = level
    .learning_goals
    .iter()
    .enumerate()
    .map(|(i, g)| format!("{}. {}", i + 1, g))
    .collect::<Vec<_>>()
    .join("\n");
  vec![
    ("dimension_name", dim.name.clone()),
    ("dimension_description", dim.description.clone()),
    ("level", level.level.to_string()),
    ("level_title", level.title.clone()),
    ("difficulty", level.difficulty.to_string()),
    ("cognitive_load", level.cognitive_load.clone()),
    ("learning_goals", goals),
  ]
}

fn render(tpl: &str, pairs: &[(&'static str, String)]) -> String {
  let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
  fill_template(tpl, &borrowed)
}

fn conversation(prompts: &Prompts, user: String) -> Vec<ChatMessage> {
  vec![ChatMessage::system(prompts.system.clone()), ChatMessage::user(user)]
}

pub fn concepts_messages(prompts: &Prompts, dim: &DimensionConfig, level: &LevelConfig) -> Vec<ChatMessage> {
  conversation(prompts, render(&prompts.concepts_user_template, &base_pairs(dim, level)))
}

/// Prompt for model `model_number` of `model_total`, listing the names already produced
/// so the backend is pushed towards a distinct model.
pub fn model_messages(
  prompts: &Prompts,
  dim: &DimensionConfig,
  level: &LevelConfig,
  model_number: usize,
  model_total: usize,
  existing: &[String],
) -> Vec<ChatMessage> {
  let existing = if existing.is_empty() { "none yet".to_string() } else { existing.join(", ") };
  let mut pairs = base_pairs(dim, level);
  pairs.push(("model_number", model_number.to_string()));
  pairs.push(("model_total", model_total.to_string()));
  pairs.push(("existing_models", existing));
  conversation(prompts, render(&prompts.model_user_template, &pairs))
}

/// `- name (id: x)` per line.
pub fn compact_listing<'a>(items: impl Iterator<Item = (&'a str, &'a str)>) -> String {
  items
    .map(|(id, name)| format!("- {name} (id: {id})"))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn demonstrations_messages(
  prompts: &Prompts,
  dim: &DimensionConfig,
  level: &LevelConfig,
  concepts: &ConceptsContent,
  models: &ModelsContent,
) -> Vec<ChatMessage> {
  let mut pairs = base_pairs(dim, level);
  pairs.push(("concept_listing", compact_listing(concepts.concepts.iter().map(|c| (c.id.as_str(), c.name.as_str())))));
  pairs.push(("model_listing", compact_listing(models.models.iter().map(|m| (m.id.as_str(), m.name.as_str())))));
  conversation(prompts, render(&prompts.demonstrations_user_template, &pairs))
}

/// Fixed intro for the assembled models section.
pub fn models_intro(prompts: &Prompts, dim: &DimensionConfig, level: &LevelConfig, model_count: usize) -> String {
  let mut pairs = base_pairs(dim, level);
  pairs.push(("model_count", model_count.to_string()));
  render(&prompts.models_intro_template, &pairs)
}
