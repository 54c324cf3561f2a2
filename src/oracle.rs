use std::fmt;
use std::str::FromStr;

use crate::utils::DataError;
use crate::vocab::{unkify, Vocabulary};

/// One shift-reduce parser transition. `Nt` opens a constituent, `Shift`
/// consumes the next input token, `Gen` predicts-and-consumes it (the
/// generative regime), `Reduce` closes the most recently opened
/// constituent. Ordering within a record is the training target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Nt(String),
  Shift,
  Gen(String),
  Reduce,
}

impl Action {
  pub fn is_shift(&self) -> bool {
    matches!(self, Self::Shift)
  }

  pub fn is_gen(&self) -> bool {
    matches!(self, Self::Gen(_))
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Nt(label) => write!(f, "NT({})", label),
      Self::Shift => write!(f, "SHIFT"),
      Self::Gen(word) => write!(f, "GEN({})", word),
      Self::Reduce => write!(f, "REDUCE"),
    }
  }
}

impl FromStr for Action {
  type Err = DataError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == "SHIFT" {
      Ok(Self::Shift)
    } else if s == "REDUCE" {
      Ok(Self::Reduce)
    } else if let Some(label) = s.strip_prefix("NT(").and_then(|r| r.strip_suffix(')')) {
      Ok(Self::Nt(label.to_string()))
    } else if let Some(word) = s.strip_prefix("GEN(").and_then(|r| r.strip_suffix(')')) {
      Ok(Self::Gen(word.to_string()))
    } else {
      Err(DataError::InvalidRecordField(format!(
        "unrecognized action line {:?}",
        s
      )))
    }
  }
}

fn malformed(msg: String) -> DataError {
  DataError::MalformedBracketing(msg)
}

/// True if the bracket at `idx` opens a nested nonterminal: another `(`
/// occurs before any `)`.
fn is_next_open_bracket(chars: &[char], idx: usize) -> Result<bool, DataError> {
  for &c in &chars[idx + 1..] {
    if c == '(' {
      return Ok(true);
    }
    if c == ')' {
      return Ok(false);
    }
  }
  Err(malformed(
    "open bracket not followed by a closing bracket".to_string(),
  ))
}

/// Content of a terminal pair: everything between `(` at `idx` and the
/// next `)`.
fn between_brackets(chars: &[char], idx: usize) -> Result<String, DataError> {
  let mut out = String::new();
  for &c in &chars[idx + 1..] {
    if c == ')' {
      return Ok(out);
    }
    if c == '(' {
      return Err(malformed("nested bracket inside a terminal".to_string()));
    }
    out.push(c);
  }
  Err(malformed("unterminated terminal".to_string()))
}

/// Nonterminal label following the bracket at `idx`, up to the next
/// space.
fn nonterminal_at(chars: &[char], idx: usize) -> Result<String, DataError> {
  let mut out = String::new();
  for &c in &chars[idx + 1..] {
    if c == ' ' {
      return Ok(out);
    }
    if c == '(' || c == ')' {
      return Err(malformed(format!(
        "unexpected {:?} in a nonterminal label",
        c
      )));
    }
    out.push(c);
  }
  Err(malformed("unterminated nonterminal label".to_string()))
}

/// Single left-to-right scan over a canonical bracketed line, yielding
/// one transition at a time. Lazy, finite and non-restartable: restart by
/// constructing a new scan over the same line.
///
/// Nesting is resolved by bracket matching inline, so no stack is kept;
/// the scan must land exactly on the final character when it stops, and
/// any other ending state is a malformed-input error.
pub struct Actions {
  chars: Vec<char>,
  pos: usize,
  done: bool,
}

impl Actions {
  pub fn new(line: &str) -> Result<Self, DataError> {
    let line = line.trim();
    let chars: Vec<char> = line.chars().collect();
    let opens = chars.iter().filter(|&&c| c == '(').count();
    let closes = chars.iter().filter(|&&c| c == ')').count();
    if opens != closes {
      return Err(malformed(format!(
        "{} opening but {} closing parentheses",
        opens, closes
      )));
    }
    if chars.is_empty() {
      return Err(malformed("empty sentence".to_string()));
    }
    Ok(Self {
      chars,
      pos: 0,
      done: false,
    })
  }

  fn skip_to_bracket(&mut self) -> Result<(), DataError> {
    while let Some(&c) = self.chars.get(self.pos) {
      if c == '(' || c == ')' {
        return Ok(());
      }
      self.pos += 1;
    }
    Err(malformed(
      "scan ran past the end of the sentence".to_string(),
    ))
  }

  fn skip_to_open(&mut self) -> Result<(), DataError> {
    while let Some(&c) = self.chars.get(self.pos) {
      if c == '(' {
        return Ok(());
      }
      self.pos += 1;
    }
    Err(malformed(
      "no child bracket after a nonterminal label".to_string(),
    ))
  }

  fn skip_to_close(&mut self) -> Result<(), DataError> {
    while let Some(&c) = self.chars.get(self.pos) {
      if c == ')' {
        return Ok(());
      }
      self.pos += 1;
    }
    Err(malformed("unterminated terminal".to_string()))
  }

  fn step(&mut self) -> Result<Action, DataError> {
    let max = self.chars.len() - 1;
    match self.chars.get(self.pos).copied() {
      Some('(') => {
        if is_next_open_bracket(&self.chars, self.pos)? {
          let label = nonterminal_at(&self.chars, self.pos)?;
          self.pos += 1;
          self.skip_to_open()?;
          Ok(Action::Nt(label))
        } else {
          self.skip_to_close()?;
          self.pos += 1;
          self.skip_to_bracket()?;
          Ok(Action::Shift)
        }
      }
      Some(')') => {
        if self.pos == max {
          self.done = true;
        } else {
          self.pos += 1;
          self.skip_to_bracket()?;
        }
        Ok(Action::Reduce)
      }
      Some(c) => Err(malformed(format!(
        "expected a bracket, found {:?} at position {}",
        c, self.pos
      ))),
      None => Err(malformed(
        "scan ran past the end of the sentence".to_string(),
      )),
    }
  }
}

impl Iterator for Actions {
  type Item = Result<Action, DataError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let result = self.step();
    if result.is_err() {
      self.done = true;
    }
    Some(result)
  }
}

/// Derive the full transition sequence for one canonical line.
pub fn actions(line: &str) -> Result<Vec<Action>, DataError> {
  Actions::new(line)?.collect()
}

/// Collect `(TAG word)` terminals in order: POS tags, surface words and
/// lowercase forms, one entry per leaf.
pub fn leaf_rows(line: &str) -> Result<(Vec<String>, Vec<String>, Vec<String>), DataError> {
  let line = line.trim();
  let chars: Vec<char> = line.chars().collect();
  if chars.first() != Some(&'(') {
    return Err(malformed(
      "sentence does not start with an open bracket".to_string(),
    ));
  }

  let mut tags = Vec::new();
  let mut words = Vec::new();
  let mut lowercased = Vec::new();
  for i in 0..chars.len() {
    if chars[i] == '(' && !is_next_open_bracket(&chars, i)? {
      let terminal = between_brackets(&chars, i)?;
      let parts: Vec<&str> = terminal.split_whitespace().collect();
      if parts.len() != 2 {
        return Err(malformed(format!(
          "terminal {:?} is not a tag and word pair",
          terminal
        )));
      }
      tags.push(parts[0].to_string());
      words.push(parts[1].to_string());
      lowercased.push(parts[1].to_lowercase());
    }
  }
  Ok((tags, words, lowercased))
}

/// Discriminative oracle record: the canonical tree plus per-token rows
/// and the transition sequence rebuilding the tree. All token rows have
/// equal length, which equals the number of `SHIFT` actions.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRecord {
  pub parsed: String,
  pub postags: Vec<String>,
  pub words: Vec<String>,
  pub lowercased: Vec<String>,
  pub unkified: Vec<String>,
  pub actions: Vec<Action>,
}

/// Generative oracle record: no POS or lowercase rows, and terminals are
/// consumed by `GEN(word)` instead of `SHIFT`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenOracle {
  pub parsed: String,
  pub words: Vec<String>,
  pub unkified: Vec<String>,
  pub actions: Vec<Action>,
}

/// A joined token row whose first token is `#` gets one leading space so
/// downstream consumers cannot misread the line as a comment.
pub(crate) fn join_row(tokens: &[String]) -> String {
  let joined = tokens.join(" ");
  match tokens.first() {
    Some(first) if first == "#" => format!(" {}", joined),
    _ => joined,
  }
}

impl fmt::Display for OracleRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.parsed)?;
    for row in [&self.postags, &self.words, &self.lowercased, &self.unkified] {
      write!(f, "\n{}", join_row(row))?;
    }
    for action in &self.actions {
      write!(f, "\n{}", action)?;
    }
    Ok(())
  }
}

impl fmt::Display for GenOracle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.parsed)?;
    for row in [&self.words, &self.unkified] {
      write!(f, "\n{}", join_row(row))?;
    }
    for action in &self.actions {
      write!(f, "\n{}", action)?;
    }
    Ok(())
  }
}

/// Build the discriminative record for one canonical line.
pub fn build_oracle(parsed: &str, vocab: &Vocabulary) -> Result<OracleRecord, DataError> {
  let parsed = parsed.trim();
  let (postags, words, lowercased) = leaf_rows(parsed)?;
  let unkified = unkify(&words, vocab);
  let actions = actions(parsed)?;
  Ok(OracleRecord {
    parsed: parsed.to_string(),
    postags,
    words,
    lowercased,
    unkified,
    actions,
  })
}

/// Build the generative record for one canonical line: the same scan,
/// with each terminal emitting `GEN(unkified-word)` in place of `SHIFT`.
pub fn build_gen_oracle(parsed: &str, vocab: &Vocabulary) -> Result<GenOracle, DataError> {
  let parsed = parsed.trim();
  let (_, words, _) = leaf_rows(parsed)?;
  let unkified = unkify(&words, vocab);
  let mut k = 0;
  let actions = actions(parsed)?
    .into_iter()
    .map(|action| match action {
      Action::Shift => {
        // leaf_rows and the scan visit the same terminals in order
        let word = unkified[k].clone();
        k += 1;
        Action::Gen(word)
      }
      action => action,
    })
    .collect();
  Ok(GenOracle {
    parsed: parsed.to_string(),
    words,
    unkified,
    actions,
  })
}

#[cfg(test)]
use crate::vocab::UNK;

#[test]
fn test_actions_for_simple_sentence() {
  use Action::*;

  let derived = actions("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))").unwrap();
  assert_eq!(
    derived,
    vec![
      Nt("S".to_string()),
      Nt("NP".to_string()),
      Shift,
      Shift,
      Reduce,
      Nt("VP".to_string()),
      Shift,
      Reduce,
      Reduce,
    ]
  );
}

#[test]
fn test_action_counts_match_tree_shape() {
  // 5 leaves, 4 internal nodes
  let line = "(S (NP (DT the) (JJ big) (NN dog)) (VP (VBZ runs) (ADVP (RB fast))))";
  let derived = actions(line).unwrap();

  let shifts = derived.iter().filter(|a| a.is_shift()).count();
  let nts = derived
    .iter()
    .filter(|a| matches!(a, Action::Nt(_)))
    .count();
  let reduces = derived
    .iter()
    .filter(|a| matches!(a, Action::Reduce))
    .count();
  assert_eq!(shifts, 5);
  assert_eq!(nts, 4);
  assert_eq!(reduces, 5 + 4);
}

#[test]
fn test_actions_reject_unbalanced() {
  assert!(matches!(
    actions("(S (NP (DT the) (NN dog))"),
    Err(DataError::MalformedBracketing(_))
  ));
}

#[test]
fn test_actions_reject_trailing_garbage() {
  // balanced counts, but the scan cannot land on the final character
  assert!(matches!(
    actions("(S (NP (DT the) (NN dog)) (VP (VBZ runs))) ()"),
    Err(DataError::MalformedBracketing(_))
  ));
}

#[test]
fn test_actions_are_deterministic() {
  let line = "(S (NP (PRP He)) (VP (VBD left)))";
  assert_eq!(actions(line).unwrap(), actions(line).unwrap());
}

#[test]
fn test_leaf_rows() {
  let (tags, words, lowercased) = leaf_rows("(S (NP (DT The) (NN dog)) (VP (VBZ runs)))").unwrap();
  assert_eq!(tags, vec!["DT", "NN", "VBZ"]);
  assert_eq!(words, vec!["The", "dog", "runs"]);
  assert_eq!(lowercased, vec!["the", "dog", "runs"]);
}

#[test]
fn test_action_display_fromstr_roundtrip() {
  for action in [
    Action::Nt("S".to_string()),
    Action::Shift,
    Action::Gen("dog".to_string()),
    Action::Reduce,
  ] {
    assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
  }
  assert!(matches!(
    "JUMP".parse::<Action>(),
    Err(DataError::InvalidRecordField(_))
  ));
}

#[test]
fn test_build_oracle_row_lengths() {
  let vocab = Vocabulary::build(["the", "the", "dog", "dog"], 2);
  let record = build_oracle("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))", &vocab).unwrap();

  let shifts = record.actions.iter().filter(|a| a.is_shift()).count();
  assert_eq!(record.postags.len(), 3);
  assert_eq!(record.words.len(), 3);
  assert_eq!(record.lowercased.len(), 3);
  assert_eq!(record.unkified.len(), 3);
  assert_eq!(shifts, 3);
  assert_eq!(record.unkified, vec!["the", "dog", UNK]);
}

#[test]
fn test_build_gen_oracle_replaces_shift() {
  use Action::*;

  let vocab = Vocabulary::build(["the", "the", "dog", "dog", "runs", "runs"], 2);
  let record = build_gen_oracle("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))", &vocab).unwrap();
  assert_eq!(
    record.actions,
    vec![
      Nt("S".to_string()),
      Nt("NP".to_string()),
      Gen("the".to_string()),
      Gen("dog".to_string()),
      Reduce,
      Nt("VP".to_string()),
      Gen("runs".to_string()),
      Reduce,
      Reduce,
    ]
  );
  assert_eq!(
    record.actions.iter().filter(|a| a.is_gen()).count(),
    record.words.len()
  );
}
