//! Shared test content: a triple that passes every default rule with a score of 100,
//! plus model replies wrapping the same content in prose and fences.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::content::*;
use crate::error::ClientError;
use crate::openai::{ChatMessage, ChatOptions, GenerationClient};

/// `seed` repeated and cut to exactly `len` characters.
pub fn text(seed: &str, len: usize) -> String {
  seed.chars().cycle().take(len).collect()
}

fn list(prefix: &str, n: usize) -> Vec<String> {
  (1..=n).map(|i| format!("{prefix} {i}")).collect()
}

pub fn concept(i: usize) -> Concept {
  Concept {
    id: format!("concept-{i}"),
    name: format!("Concept {i}"),
    core_idea: text("A claim needs support before it earns belief. ", 80),
    definition: text("A premise is a statement offered as a reason for accepting a conclusion. ", 160),
    concept_breakdown: Some(ConceptBreakdown { key_components: list("component", 3), explanation: "How the parts fit.".into() }),
    critical_thinking_framework: Some(ThinkingFramework { steps: list("Ask", 3) }),
    common_misconceptions: vec![
      Misconception { misconception: "Confidence is evidence".into(), correction: "Check the support".into() },
      Misconception { misconception: "Popular means true".into(), correction: "Count reasons, not voices".into() },
    ],
    real_world_examples: vec![
      RealWorldExample { title: "Advertising".into(), description: "A slogan with no data behind it.".into() },
      RealWorldExample { title: "News".into(), description: "A headline that overstates a study.".into() },
    ],
    visualization_guide: Some(VisualizationGuide { kind: "tree".into(), description: "Claim at the root.".into() }),
  }
}

pub fn concepts() -> ConceptsContent {
  ConceptsContent {
    intro: text("This level teaches how to tell a claim from the reasons behind it. ", 250),
    concepts: (1..=3).map(concept).collect(),
  }
}

pub fn model_step(j: usize) -> ModelStep {
  ModelStep {
    step_number: j as u32,
    title: format!("Step {j}"),
    description: text("Write the claim down in one sentence, then list every reason offered for it. ", 320),
    key_thinking_points: list("point", 4),
    common_pitfalls: list("pitfall", 3),
  }
}

pub fn model(i: usize) -> ThinkingModel {
  ThinkingModel {
    id: format!("model-{i}"),
    name: format!("Model {i}"),
    purpose: "Test a claim quickly.".into(),
    core_logic: Some(CoreLogic {
      principle: "Claims rest on reasons".into(),
      when_works: "When reasons are stated".into(),
      when_fails: "When reasons are hidden".into(),
    }),
    steps: (1..=3).map(model_step).collect(),
    full_application_example: Some(ApplicationExample { scenario: "Reviewing an ad".into(), walkthrough: "Apply each step.".into() }),
    visualization: Some(ModelVisualization { kind: "flow".into(), step_by_step_drawing: list("draw", 3) }),
  }
}

pub fn models() -> ModelsContent {
  ModelsContent {
    intro: text("These models turn the concepts into procedures you can repeat. ", 180),
    models: (1..=2).map(model).collect(),
  }
}

pub fn analysis_step(m: usize) -> AnalysisStep {
  AnalysisStep {
    step_number: m as u32,
    title: format!("Analysis {m}"),
    concept_applied: "Concept 1".into(),
    thinking_process: text("First I separate what is claimed from what is shown, then I weigh each reason. ", 220),
    conclusion: "The claim is weakly supported.".into(),
  }
}

pub fn demonstration(k: usize) -> Demonstration {
  Demonstration {
    id: format!("demo-{k}"),
    title: format!("Demo {k}"),
    learning_objective: text("Learners will separate a claim from its support and judge the strength of each reason. ", 100),
    theoretical_foundation: Some(TheoreticalFoundation { concepts_used: vec!["Concept 1".into()], models_used: vec!["Model 1".into()] }),
    scenario: Some(CaseScenario {
      background: text("A neighbourhood group shares a post claiming a new road will double traffic. ", 320),
      challenge: "Decide whether to believe it.".into(),
    }),
    analysis_steps: (1..=3).map(analysis_step).collect(),
    key_insights: list("insight", 3),
    common_mistakes_in_this_case: vec![
      CaseMistake { mistake: "Trusting the headline".into(), correction: "Read the source".into() },
      CaseMistake { mistake: "Ignoring base rates".into(), correction: "Compare with past roads".into() },
    ],
    transferable_skills: list("skill", 3),
  }
}

pub fn demonstrations() -> DemonstrationsContent {
  DemonstrationsContent {
    intro: text("Two worked cases show the concepts and models applied to everyday claims. ", 150),
    demonstrations: (1..=2).map(demonstration).collect(),
  }
}

pub fn valid_triple() -> (ConceptsContent, ModelsContent, DemonstrationsContent) {
  (concepts(), models(), demonstrations())
}

fn fenced(prose: &str, json: String) -> String {
  format!("{prose}\n```json\n{json}\n```\nHope this helps!")
}

pub fn concepts_reply() -> String {
  fenced("Here are the concepts:", serde_json::to_string_pretty(&concepts()).unwrap())
}

pub fn model_reply(i: usize) -> String {
  fenced("Here is the next model:", serde_json::to_string_pretty(&model(i)).unwrap())
}

pub fn demonstrations_reply() -> String {
  // Unfenced with a trailing comma: exercises the brace-span strategy and the repair pass.
  let json = serde_json::to_string(&demonstrations()).unwrap();
  let broken = format!("{},}}", &json[..json.len() - 1]);
  format!("Demonstrations follow. {broken} That is all.")
}

/// Replies for one successful attempt with two models per unit.
pub fn good_attempt_replies() -> Vec<Result<String, ClientError>> {
  vec![Ok(concepts_reply()), Ok(model_reply(1)), Ok(model_reply(2)), Ok(demonstrations_reply())]
}

/// Replays canned replies in order and records every user prompt it receives.
/// Once the script runs out it answers with an empty reply.
pub struct Scripted {
  replies: Mutex<VecDeque<Result<String, ClientError>>>,
  prompts: Mutex<Vec<String>>,
}

impl Scripted {
  pub fn new(replies: Vec<Result<String, ClientError>>) -> Self {
    Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) }
  }

  pub fn calls(&self) -> usize {
    self.prompts.lock().unwrap().len()
  }

  pub fn prompts(&self) -> Vec<String> {
    self.prompts.lock().unwrap().clone()
  }
}

#[async_trait]
impl GenerationClient for Scripted {
  async fn chat(&self, messages: &[ChatMessage], _opts: &ChatOptions) -> Result<String, ClientError> {
    let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
    self.prompts.lock().unwrap().push(user);
    self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok(String::new()))
  }
}
