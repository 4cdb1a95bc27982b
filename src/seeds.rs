//! Built-in reference table: five thinking dimensions with five levels each.
//!
//! Used whenever the pipeline config does not carry its own `[[dimensions]]` table.

use crate::domain::{DimensionConfig, Difficulty, LevelConfig};
use crate::error::ConfigError;

struct LevelSeed {
  title: &'static str,
  goals: [&'static str; 3],
}

const COGNITIVE_LOAD: [&str; 5] = ["low", "moderate", "moderate", "high", "very high"];

fn difficulty_for(level: u8) -> Difficulty {
  match level {
    1 | 2 => Difficulty::Beginner,
    3 | 4 => Difficulty::Intermediate,
    _ => Difficulty::Advanced,
  }
}

fn dimension(id: &str, name: &str, description: &str, levels: [LevelSeed; 5]) -> DimensionConfig {
  DimensionConfig {
    id: id.into(),
    name: name.into(),
    description: description.into(),
    levels: levels
      .into_iter()
      .zip(1u8..)
      .map(|(seed, level)| LevelConfig {
        level,
        title: seed.title.into(),
        cognitive_load: COGNITIVE_LOAD[usize::from(level - 1)].into(),
        learning_goals: seed.goals.iter().map(|g| g.to_string()).collect(),
        difficulty: difficulty_for(level),
      })
      .collect(),
  }
}

pub fn builtin_dimensions() -> Vec<DimensionConfig> {
  vec![
    dimension(
      "critical",
      "Critical Thinking",
      "Evaluating claims, evidence and arguments before accepting a conclusion.",
      [
        LevelSeed { title: "Spotting Claims", goals: ["Separate claims from facts", "Ask for the evidence behind a statement", "Notice emotionally loaded wording"] },
        LevelSeed { title: "Weighing Evidence", goals: ["Judge source reliability", "Distinguish correlation from causation", "Recognise missing information"] },
        LevelSeed { title: "Analysing Arguments", goals: ["Map premises to conclusions", "Find hidden assumptions", "Name common fallacies"] },
        LevelSeed { title: "Building Counterarguments", goals: ["Steelman opposing views", "Test conclusions against counterexamples", "Quantify uncertainty"] },
        LevelSeed { title: "Independent Judgement", goals: ["Integrate conflicting evidence", "Update beliefs proportionally", "Explain reasoning transparently"] },
      ],
    ),
    dimension(
      "systems",
      "Systems Thinking",
      "Seeing wholes, relationships and feedback instead of isolated events.",
      [
        LevelSeed { title: "Parts and Wholes", goals: ["Identify elements and boundaries", "Describe how parts interact", "Recognise emergent behaviour"] },
        LevelSeed { title: "Feedback Loops", goals: ["Tell reinforcing from balancing loops", "Trace a loop in a real situation", "Predict loop behaviour over time"] },
        LevelSeed { title: "Stocks and Flows", goals: ["Model accumulations", "Reason about delays", "Explain oscillation"] },
        LevelSeed { title: "Leverage Points", goals: ["Find high-leverage interventions", "Anticipate unintended consequences", "Compare short and long horizons"] },
        LevelSeed { title: "Designing Systems", goals: ["Redesign structures to change behaviour", "Balance competing goals", "Communicate system maps"] },
      ],
    ),
    dimension(
      "creative",
      "Creative Thinking",
      "Generating novel, useful ideas and reframing problems.",
      [
        LevelSeed { title: "Divergent Ideas", goals: ["Generate many options quickly", "Defer judgement", "Combine unrelated ideas"] },
        LevelSeed { title: "Reframing", goals: ["Restate a problem several ways", "Question default constraints", "Shift perspective deliberately"] },
        LevelSeed { title: "Analogy and Transfer", goals: ["Borrow solutions from other domains", "Map structure between analogies", "Spot weak analogies"] },
        LevelSeed { title: "Constraint-Driven Creativity", goals: ["Use constraints as prompts", "Iterate on prototypes", "Evaluate novelty and usefulness"] },
        LevelSeed { title: "Creative Systems", goals: ["Build personal idea pipelines", "Lead group ideation", "Turn ideas into experiments"] },
      ],
    ),
    dimension(
      "logical",
      "Logical Reasoning",
      "Drawing valid conclusions with deduction, induction and abduction.",
      [
        LevelSeed { title: "Valid Inference", goals: ["Follow simple syllogisms", "Tell validity from truth", "Use if-then statements correctly"] },
        LevelSeed { title: "Conditional Reasoning", goals: ["Avoid affirming the consequent", "Reason with necessary and sufficient conditions", "Use contrapositives"] },
        LevelSeed { title: "Inductive Generalisation", goals: ["Assess sample quality", "Estimate confidence in generalisations", "Recognise base-rate neglect"] },
        LevelSeed { title: "Abductive Explanation", goals: ["Rank competing explanations", "Design discriminating tests", "Apply parsimony carefully"] },
        LevelSeed { title: "Formal Structures", goals: ["Structure proofs", "Reason about quantifiers", "Detect circular reasoning"] },
      ],
    ),
    dimension(
      "strategic",
      "Strategic Thinking",
      "Choosing long-range goals and the moves that reach them under uncertainty.",
      [
        LevelSeed { title: "Goals and Priorities", goals: ["Turn wishes into goals", "Rank priorities explicitly", "Say no to distractions"] },
        LevelSeed { title: "Options and Trade-offs", goals: ["List realistic options", "Make trade-offs visible", "Estimate costs and benefits"] },
        LevelSeed { title: "Anticipating Others", goals: ["Model other actors' incentives", "Think two moves ahead", "Use simple game-theoretic reasoning"] },
        LevelSeed { title: "Planning Under Uncertainty", goals: ["Build scenarios", "Keep options open", "Define early warning signals"] },
        LevelSeed { title: "Strategy in Practice", goals: ["Align resources with strategy", "Review and adapt plans", "Communicate strategy clearly"] },
      ],
    ),
  ]
}

/// Every dimension must carry exactly the levels 1 through 5.
pub fn check_dimension_table(dimensions: &[DimensionConfig]) -> Result<(), ConfigError> {
  if dimensions.is_empty() {
    return Err(ConfigError::Dimensions("no dimensions configured".into()));
  }
  for d in dimensions {
    let mut levels: Vec<u8> = d.levels.iter().map(|l| l.level).collect();
    levels.sort_unstable();
    if levels != [1, 2, 3, 4, 5] {
      return Err(ConfigError::Dimensions(format!("dimension '{}' must define levels 1-5, found {:?}", d.id, levels)));
    }
  }
  Ok(())
}

/// The configured table when present, otherwise the built-in one; checked either way.
pub fn dimension_table(configured: Option<&[DimensionConfig]>) -> Result<Vec<DimensionConfig>, ConfigError> {
  let dimensions = configured.map(<[DimensionConfig]>::to_vec).unwrap_or_else(builtin_dimensions);
  check_dimension_table(&dimensions)?;
  Ok(dimensions)
}
