//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Length in characters, the unit every content rule is expressed in.
pub fn char_len(s: &str) -> usize {
  s.chars().count()
}

/// First `n` characters of `s`.
pub fn head_chars(s: &str, n: usize) -> String {
  s.chars().take(n).collect()
}

/// Last `n` characters of `s`.
pub fn tail_chars(s: &str, n: usize) -> String {
  let len = char_len(s);
  s.chars().skip(len.saturating_sub(n)).collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if char_len(s) <= max { s.to_string() } else { format!("{}… ({} bytes total)", head_chars(s, max), s.len()) }
}
