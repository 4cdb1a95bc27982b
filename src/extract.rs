//! Extraction and repair of JSON payloads from free-form model replies.
//!
//! Candidate location, first hit wins:
//! 1) the first fenced code block (optional language tag),
//! 2) the span from the first `{` to the last `}`,
//! 3) a greedy `{ ... "<marker>" ... }` match.
//!
//! Any text the marker pattern matches also holds a `{` before a later `}`, so step 2
//! already claims it; step 3 is a last resort that does not fire with the current order.
//!
//! A candidate that fails strict parsing goes through [`repair`] once before giving up.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExtractError, RepairError};
use crate::util::{head_chars, tail_chars};

static FENCE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*[ \t]*\r?\n?([\s\S]*?)```").unwrap());

static TRAILING_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

const DIAG_HEAD_CHARS: usize = 1000;
const DIAG_TAIL_CHARS: usize = 500;
const SNIPPET_CHARS: usize = 400;

/// Which strategy produced the candidate payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateSource {
  FencedBlock,
  BraceSpan,
  MarkerAnchored,
}

/// Locate the candidate payload in `text`.
pub fn find_candidate(text: &str, marker_field: &str) -> Option<(CandidateSource, String)> {
  if let Some(inner) = FENCE_RE.captures(text).and_then(|c| c.get(1)) {
    let inner = inner.as_str().trim();
    if !inner.is_empty() {
      return Some((CandidateSource::FencedBlock, inner.to_string()));
    }
  }

  if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
    if end > start {
      return Some((CandidateSource::BraceSpan, text[start..=end].to_string()));
    }
  }

  // Last resort: unreachable while the brace span runs first, kept for reordering.
  let pattern = format!(r#"\{{[\s\S]*"{}"[\s\S]*\}}"#, regex::escape(marker_field));
  Regex::new(&pattern)
    .ok()
    .and_then(|re| re.find(text).map(|m| m.as_str().to_string()))
    .map(|s| (CandidateSource::MarkerAnchored, s))
}

/// Turn a raw model reply into a JSON value.
pub fn extract(text: &str, marker_field: &str) -> Result<Value, ExtractError> {
  let Some((source, candidate)) = find_candidate(text, marker_field) else {
    let err = ExtractError::JsonNotFound {
      head: head_chars(text, DIAG_HEAD_CHARS),
      tail: tail_chars(text, DIAG_TAIL_CHARS),
    };
    warn!(target: "extract", %marker_field, text_len = text.len(), "No JSON candidate in model response");
    return Err(err);
  };
  debug!(target: "extract", ?source, candidate_len = candidate.len(), "JSON candidate located");

  let first_err = match serde_json::from_str::<Value>(&candidate) {
    Ok(v) => return Ok(v),
    Err(e) => e,
  };

  let repaired = repair(&candidate).unwrap_or_else(|_| candidate.clone());
  match serde_json::from_str::<Value>(&repaired) {
    Ok(v) => {
      debug!(target: "extract", ?source, original_error = %first_err, "JSON recovered by repair pass");
      Ok(v)
    }
    Err(second_err) => {
      let before_repair = head_chars(&candidate, SNIPPET_CHARS);
      let after_repair = head_chars(&repaired, SNIPPET_CHARS);
      warn!(
        target: "extract",
        ?source,
        original_error = %first_err,
        repaired_error = %second_err,
        %before_repair,
        %after_repair,
        "JSON parse failed after repair"
      );
      Err(ExtractError::JsonParse { message: first_err.to_string(), before_repair, after_repair })
    }
  }
}

/// Heuristic fix-up of a JSON candidate.
///
/// Drops trailing commas before `}`/`]`, then cuts everything after the brace that
/// closes the outermost object. Quotes and escapes are tracked so braces inside
/// strings do not count.
pub fn repair(text: &str) -> Result<String, RepairError> {
  if text.trim().is_empty() {
    return Err(RepairError::Empty);
  }
  let fixed = TRAILING_COMMA_RE.replace_all(text, "$1").into_owned();

  let mut in_string = false;
  let mut escape_next = false;
  let mut stack: Vec<char> = Vec::new();
  let mut saw_object = false;
  let mut cut_at = None;

  for (i, ch) in fixed.char_indices() {
    if escape_next {
      escape_next = false;
      continue;
    }
    match ch {
      '\\' if in_string => escape_next = true,
      '"' => in_string = !in_string,
      '{' | '[' if !in_string => {
        if stack.is_empty() && ch == '{' {
          saw_object = true;
        }
        stack.push(ch);
      }
      '}' | ']' if !in_string => {
        stack.pop();
        if stack.is_empty() && ch == '}' && saw_object {
          cut_at = Some(i + ch.len_utf8());
          break;
        }
      }
      _ => {}
    }
  }

  if !saw_object {
    return Err(RepairError::NoObject);
  }
  Ok(match cut_at {
    Some(end) if end < fixed.len() => fixed[..end].to_string(),
    _ => fixed,
  })
}
