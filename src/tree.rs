use std::collections::HashSet;
use std::fmt;

/// An in-memory bracketed parse tree. Trees are ephemeral: built,
/// transformed and discarded within the normalization of one sentence.
///
/// After normalization every `Internal` node has at least one child and
/// every `Leaf` carries exactly one POS tag and one surface word. During
/// parsing of word-unit corpora a leaf may transiently carry an empty tag
/// and a space-separated word list; the normalizer's multiword step
/// restores the invariant.
#[derive(Debug, PartialEq, Clone)]
pub enum BracketTree {
  Leaf { tag: String, word: String },
  Internal {
    label: String,
    children: Vec<BracketTree>,
  },
}

impl BracketTree {
  pub fn leaf(tag: impl Into<String>, word: impl Into<String>) -> Self {
    Self::Leaf {
      tag: tag.into(),
      word: word.into(),
    }
  }

  pub fn internal(label: impl Into<String>, children: Vec<BracketTree>) -> Self {
    Self::Internal {
      label: label.into(),
      children,
    }
  }

  pub fn is_leaf(&self) -> bool {
    match self {
      Self::Leaf { .. } => true,
      _ => false,
    }
  }

  pub fn get_leaf(&self) -> Option<(&str, &str)> {
    match self {
      Self::Leaf { tag, word } => Some((tag, word)),
      _ => None,
    }
  }

  pub fn get_internal(&self) -> Option<(&str, &[BracketTree])> {
    match self {
      Self::Internal { label, children } => Some((label, children)),
      _ => None,
    }
  }

  /// In-order surface words.
  pub fn leaves(&self) -> Vec<&str> {
    let mut out = Vec::new();
    self.collect_leaves(&mut out);
    out
  }

  fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
    match self {
      Self::Leaf { word, .. } => out.push(word),
      Self::Internal { children, .. } => {
        for child in children {
          child.collect_leaves(out);
        }
      }
    }
  }

  /// Labels of `Internal` nodes only. Preterminal POS tags live on
  /// leaves in this model, so they never appear in the result.
  pub fn nonterminal_labels(&self) -> HashSet<String> {
    let mut out = HashSet::new();
    self.collect_labels(&mut out);
    out
  }

  fn collect_labels(&self, out: &mut HashSet<String>) {
    if let Self::Internal { label, children } = self {
      out.insert(label.clone());
      for child in children {
        child.collect_labels(out);
      }
    }
  }
}

/// Canonical single-line, single-space bracketed rendering.
impl fmt::Display for BracketTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf { tag, word } => write!(f, "({} {})", tag, word),
      Self::Internal { label, children } => {
        write!(f, "({}", label)?;
        for child in children.iter() {
          write!(f, " {}", child)?;
        }
        write!(f, ")")
      }
    }
  }
}

#[test]
fn test_display_is_canonical() {
  let tree = BracketTree::internal(
    "S",
    vec![
      BracketTree::internal(
        "NP",
        vec![
          BracketTree::leaf("DT", "the"),
          BracketTree::leaf("NN", "dog"),
        ],
      ),
      BracketTree::internal("VP", vec![BracketTree::leaf("VBZ", "runs")]),
    ],
  );

  assert_eq!(
    tree.to_string(),
    "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))"
  );
  assert_eq!(tree.leaves(), vec!["the", "dog", "runs"]);
}

#[test]
fn test_nonterminal_labels_skip_tags() {
  let tree = BracketTree::internal(
    "S",
    vec![BracketTree::internal(
      "NP",
      vec![BracketTree::leaf("NN", "dog")],
    )],
  );

  let labels = tree.nonterminal_labels();
  assert!(labels.contains("S"));
  assert!(labels.contains("NP"));
  assert!(!labels.contains("NN"));
}
