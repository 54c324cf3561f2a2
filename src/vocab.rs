use std::collections::{HashMap, HashSet};

/// Reserved placeholder for rare and out-of-vocabulary tokens.
pub const UNK: &str = "UNK";

/// The set of surface words retained as "known", derived from token
/// frequency over a training corpus. Built once per split, read-only
/// afterward.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
  words: HashSet<String>,
}

impl Vocabulary {
  /// Words occurring fewer times than this are dropped (singletons out).
  pub const DEFAULT_MIN_COUNT: usize = 2;

  /// Count token frequencies and keep words occurring at least
  /// `min_count` times. The result is independent of token arrival
  /// order.
  pub fn build<I, S>(tokens: I, min_count: usize) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
      *counts.entry(token.as_ref().to_string()).or_insert(0) += 1;
    }
    let words = counts
      .into_iter()
      .filter(|(_, count)| *count >= min_count)
      .map(|(word, _)| word)
      .collect();
    Self { words }
  }

  pub fn contains(&self, word: &str) -> bool {
    self.words.contains(word)
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  pub fn words(&self) -> &HashSet<String> {
    &self.words
  }
}

/// Map every empty or out-of-vocabulary token to [`UNK`], passing all
/// others through unchanged. Length and order are preserved.
pub fn unkify(tokens: &[String], vocab: &Vocabulary) -> Vec<String> {
  tokens
    .iter()
    .map(|token| {
      let token = token.trim();
      if token.is_empty() || !vocab.contains(token) {
        UNK.to_string()
      } else {
        token.to_string()
      }
    })
    .collect()
}

#[cfg(test)]
fn words(tokens: &[&str]) -> Vec<String> {
  tokens.iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_build_drops_singletons() {
  let vocab = Vocabulary::build(
    ["the", "dog", "the", "cat", "the"],
    Vocabulary::DEFAULT_MIN_COUNT,
  );
  assert!(vocab.contains("the"));
  assert!(!vocab.contains("dog"));
  assert!(!vocab.contains("cat"));
  assert_eq!(vocab.len(), 1);
}

#[test]
fn test_build_is_order_independent() {
  let a = Vocabulary::build(["b", "a", "b", "a", "c"], 2);
  let b = Vocabulary::build(["c", "a", "b", "a", "b"], 2);
  assert_eq!(a.words(), b.words());
}

#[test]
fn test_unkify_preserves_length_and_order() {
  let vocab = Vocabulary::build(["the", "the", "dog", "dog"], 2);
  let unkified = unkify(&words(&["the", "unseen", "dog", ""]), &vocab);
  assert_eq!(unkified, words(&["the", UNK, "dog", UNK]));
}
