use std::collections::HashSet;
use std::io::BufRead;

use regex::Regex;
use tracing::{debug, warn};

use crate::parse_tree;
use crate::tree::BracketTree;
use crate::utils::DataError;

/// Collapse every whitespace run to a single space and strip the ends.
/// Together with the canonical `Display` rendering this reduces a
/// reassembled multi-line sentence to the single-space form.
pub fn squeeze(line: &str) -> String {
  lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
  }
  WHITESPACE_RUN.replace_all(line.trim(), " ").into_owned()
}

/// Reassembles bracketed sentences that span several physical lines.
///
/// Lines are accumulated (joined by single spaces, blank lines discarded)
/// until the running bracket depth returns to zero. Yields each logical
/// sentence together with the line number it started on.
pub struct Sentences<B> {
  lines: std::io::Lines<B>,
  line_no: usize,
}

impl<B: BufRead> Sentences<B> {
  pub fn new(reader: B) -> Self {
    Self {
      lines: reader.lines(),
      line_no: 0,
    }
  }
}

impl<B: BufRead> Iterator for Sentences<B> {
  type Item = Result<(usize, String), DataError>;

  fn next(&mut self) -> Option<Self::Item> {
    let mut buff: Vec<String> = Vec::new();
    let mut depth: i64 = 0;
    let mut start = 0;

    loop {
      match self.lines.next() {
        None => {
          return if buff.is_empty() {
            None
          } else {
            Some(Err(
              DataError::MalformedBracketing(
                "parentheses still open at end of input".to_string(),
              )
              .at_line(start),
            ))
          };
        }
        Some(Err(e)) => return Some(Err(e.into())),
        Some(Ok(line)) => {
          self.line_no += 1;
          let line = line.trim();
          if line.is_empty() {
            continue;
          }
          if buff.is_empty() {
            start = self.line_no;
          }
          for c in line.chars() {
            if c == '(' {
              depth += 1;
            } else if c == ')' {
              depth -= 1;
            }
          }
          buff.push(line.to_string());
          if depth < 0 {
            return Some(Err(
              DataError::MalformedBracketing(
                "more closing than opening parentheses".to_string(),
              )
              .at_line(self.line_no),
            ));
          }
          if depth == 0 {
            return Some(Ok((start, buff.join(" "))));
          }
        }
      }
    }
  }
}

/// Extracts every balanced top-level group from one physical line, for
/// corpora that pack several trees per line. Text outside the groups is
/// skipped; an unbalanced trailing group is dropped with a warning.
pub fn split_sentences(line: &str) -> Vec<String> {
  let chars: Vec<char> = line.chars().collect();
  let mut out = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    if chars[i] != '(' {
      i += 1;
      continue;
    }
    let mut depth = 0i64;
    let mut j = i;
    let mut end = None;
    while j < chars.len() {
      match chars[j] {
        '(' => depth += 1,
        ')' => depth -= 1,
        _ => {}
      }
      j += 1;
      if depth == 0 {
        end = Some(j);
        break;
      }
    }
    match end {
      Some(j) => {
        out.push(chars[i..j].iter().collect());
        i = j;
      }
      None => {
        warn!("skipping unbalanced trailing group");
        break;
      }
    }
  }
  out
}

/// Corpus-specific knobs of the normalizer. The null-marker set and the
/// grammatical-function suffix characters vary across treebank variants,
/// so they are configuration rather than constants.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
  /// A label `BASE<c>SUFFIX` is cut at the earliest of these characters,
  /// unless that character starts the label.
  pub strip_suffix_chars: Vec<char>,
  /// POS tag marking a null element, e.g. `-NONE-`.
  pub null_tag: String,
  /// Leaf words whose head label (the word up to its first interior `-`)
  /// marks a null element, e.g. `*T*`.
  pub null_leaf_markers: HashSet<String>,
  /// Parse innermost brackets as tag-less lexical units.
  pub word_units: bool,
  /// Strip one redundant empty-labeled enclosing bracket pair.
  pub strip_empty_top: bool,
}

impl NormalizeConfig {
  /// Penn-Treebank-style corpora: `( (S ...))` wrapping, `-NONE-` null
  /// elements, function suffixes after `-`, `=` or `|`.
  pub fn ptb() -> Self {
    Self {
      strip_suffix_chars: vec!['-', '=', '|'],
      null_tag: "-NONE-".to_string(),
      null_leaf_markers: HashSet::new(),
      word_units: false,
      strip_empty_top: true,
    }
  }

  /// Corpora that bracket each lexical unit separately and annotate null
  /// elements as trace words rather than a POS tag.
  pub fn multiword() -> Self {
    let markers = [
      "*T*", "0", "*U*", "*?*", "*NOT*", "*RNR*", "*ICH*", "*EXP*", "*PPA*", "*",
    ];
    Self {
      strip_suffix_chars: vec!['-'],
      null_tag: "-NONE-".to_string(),
      null_leaf_markers: markers.iter().map(|s| s.to_string()).collect(),
      word_units: true,
      strip_empty_top: false,
    }
  }
}

/// Rewrites one bracketed sentence into its canonical form: squeezed,
/// suffix-stripped, null elements pruned, multiword units joined,
/// re-rendered single-line. A sentence whose content is entirely pruned
/// yields `Ok(None)` — a drop, not an error.
pub struct Normalizer {
  config: NormalizeConfig,
}

impl Normalizer {
  pub fn new(config: NormalizeConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &NormalizeConfig {
    &self.config
  }

  pub fn normalize(&self, sentence: &str) -> Result<Option<String>, DataError> {
    let squeezed = squeeze(sentence);
    let tree = parse_tree::parse(&squeezed, self.config.word_units)?;
    let tree = if self.config.strip_empty_top {
      strip_empty_top(tree)
    } else {
      tree
    };
    let tree = self.strip_labels(tree);
    let tree = match self.remove_nulls(tree) {
      Some(tree) => tree,
      None => {
        debug!("sentence pruned to nothing");
        return Ok(None);
      }
    };
    let tree = combine_multiword(tree)?;
    Ok(Some(tree.to_string()))
  }

  fn strip_labels(&self, tree: BracketTree) -> BracketTree {
    match tree {
      BracketTree::Leaf { tag, word } => BracketTree::Leaf {
        tag: self.strip_label(&tag).to_string(),
        word,
      },
      BracketTree::Internal { label, children } => BracketTree::Internal {
        label: self.strip_label(&label).to_string(),
        children: children.into_iter().map(|c| self.strip_labels(c)).collect(),
      },
    }
  }

  /// Cut at the earliest suffix character. A label whose earliest match
  /// is its first character (e.g. `-NONE-`) is left untouched.
  fn strip_label<'a>(&self, label: &'a str) -> &'a str {
    let ix = self
      .config
      .strip_suffix_chars
      .iter()
      .filter_map(|&c| label.find(c))
      .min();
    match ix {
      Some(ix) if ix > 0 => &label[..ix],
      _ => label,
    }
  }

  fn remove_nulls(&self, tree: BracketTree) -> Option<BracketTree> {
    match tree {
      BracketTree::Leaf { tag, word } => {
        let null = tag == self.config.null_tag
          || self.config.null_leaf_markers.contains(head_label(&word));
        if null {
          None
        } else {
          Some(BracketTree::Leaf { tag, word })
        }
      }
      BracketTree::Internal { label, children } => {
        let kept: Vec<_> = children
          .into_iter()
          .filter_map(|c| self.remove_nulls(c))
          .collect();
        if kept.is_empty() {
          None
        } else {
          Some(BracketTree::Internal {
            label,
            children: kept,
          })
        }
      }
    }
  }
}

fn head_label(word: &str) -> &str {
  match word.find('-') {
    Some(ix) if ix > 0 => &word[..ix],
    _ => word,
  }
}

fn strip_empty_top(tree: BracketTree) -> BracketTree {
  match tree {
    BracketTree::Internal {
      label,
      mut children,
    } if label.is_empty() && children.len() == 1 => children.pop().unwrap(),
    tree => tree,
  }
}

fn is_word_unit(tree: &BracketTree) -> bool {
  matches!(tree, BracketTree::Leaf { tag, .. } if tag.is_empty())
}

/// A node whose children are all tag-less lexical units becomes a single
/// leaf under that node's label, its words joined by underscores. A
/// lexical unit anywhere else has no reading as terminal or nonterminal.
fn combine_multiword(tree: BracketTree) -> Result<BracketTree, DataError> {
  match tree {
    BracketTree::Leaf { tag, word } => {
      if tag.is_empty() {
        Err(DataError::MalformedBracketing(format!(
          "lexical unit {:?} outside a covering label",
          word
        )))
      } else {
        Ok(BracketTree::Leaf { tag, word })
      }
    }
    BracketTree::Internal { label, children } => {
      if children.iter().all(is_word_unit) {
        let words: Vec<&str> = children
          .iter()
          .filter_map(|c| c.get_leaf())
          .flat_map(|(_, word)| word.split(' '))
          .collect();
        Ok(BracketTree::Leaf {
          tag: label,
          word: words.join("_"),
        })
      } else if children.iter().any(is_word_unit) {
        Err(DataError::MalformedBracketing(format!(
          "lexical unit beside a bracketed sibling under {}",
          label
        )))
      } else {
        let children = children
          .into_iter()
          .map(combine_multiword)
          .collect::<Result<Vec<_>, _>>()?;
        Ok(BracketTree::Internal { label, children })
      }
    }
  }
}

#[cfg(test)]
fn ptb() -> Normalizer {
  Normalizer::new(NormalizeConfig::ptb())
}

#[test]
fn test_normalize_strips_function_labels() {
  let out = ptb()
    .normalize("(S (NP-SBJ (PRP He)) (VP (VBD left) (PP-LOC=2 (IN at) (NN noon))))")
    .unwrap();
  assert_eq!(
    out.as_deref(),
    Some("(S (NP (PRP He)) (VP (VBD left) (PP (IN at) (NN noon))))")
  );
}

#[test]
fn test_normalize_removes_null_elements() {
  let out = ptb()
    .normalize("(VP (VB left) (NP-SBJ (-NONE- *)))")
    .unwrap();
  assert_eq!(out.as_deref(), Some("(VP (VB left))"));
}

#[test]
fn test_normalize_drops_empty_sentence() {
  let out = ptb().normalize("(S (NP-SBJ (-NONE- *T*-1)))").unwrap();
  assert_eq!(out, None);
}

#[test]
fn test_normalize_strips_empty_top() {
  let out = ptb()
    .normalize("( (S (NP (PRP He)) (VP (VBD left))))")
    .unwrap();
  assert_eq!(out.as_deref(), Some("(S (NP (PRP He)) (VP (VBD left)))"));
}

#[test]
fn test_normalize_is_idempotent() {
  let norm = ptb();
  let first = norm
    .normalize("( (S (NP-SBJ (DT The) (NN dog)) (VP (VBZ runs) (NP (-NONE- *)))))")
    .unwrap()
    .unwrap();
  let second = norm.normalize(&first).unwrap().unwrap();
  assert_eq!(first, second);
}

#[test]
fn test_normalize_joins_multiword_units() {
  let norm = Normalizer::new(NormalizeConfig::multiword());
  let out = norm
    .normalize("(NP (NN (kunjungan kerja)) (JJ (singkat)))")
    .unwrap();
  assert_eq!(out.as_deref(), Some("(NP (NN kunjungan_kerja) (JJ singkat))"));
}

#[test]
fn test_normalize_removes_trace_words() {
  let norm = Normalizer::new(NormalizeConfig::multiword());
  let out = norm
    .normalize("(S (NP (*T*-1)) (VP (VB (pergi))))")
    .unwrap();
  assert_eq!(out.as_deref(), Some("(S (VP (VB pergi)))"));
}

#[test]
fn test_sentences_reassembles_multiline() {
  let src = "( (S\n  (NP (DT The) (NN dog))\n  (VP (VBZ runs))))\n\n( (S (NP (PRP He)) (VP (VBD left))))\n";
  let sentences: Vec<_> = Sentences::new(src.as_bytes())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(sentences.len(), 2);
  assert_eq!(sentences[0].0, 1);
  assert_eq!(
    sentences[0].1,
    "( (S (NP (DT The) (NN dog)) (VP (VBZ runs))))"
  );
  assert_eq!(sentences[1].0, 5);
}

#[test]
fn test_sentences_rejects_unbalanced_eof() {
  let mut it = Sentences::new("( (S (NP".as_bytes());
  assert!(matches!(
    it.next(),
    Some(Err(DataError::MalformedBracketing(_)))
  ));
}

#[test]
fn test_split_sentences() {
  let line = "(A (B c)) junk (D (E f))";
  assert_eq!(split_sentences(line), vec!["(A (B c))", "(D (E f))"]);
}
