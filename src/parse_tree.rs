use regex::Regex;
/// Simple recursive-descent parsing of bracketed tree strings
use std::str::FromStr;

use crate::tree::BracketTree;
use crate::utils::DataError;

type ParseResult<'a, T> = Result<(T, &'a str), DataError>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

fn malformed(msg: String) -> DataError {
  DataError::MalformedBracketing(msg)
}

/// Try to consume a regex at the start of the input, returning None if it
/// doesn't match there
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> (Option<&'a str>, &'a str) {
  if let Some(caps) = re.captures(s) {
    let m = caps.get(0).unwrap();
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> (Option<char>, &str) {
  let mut iter = s.char_indices().peekable();
  if let Some((_, c1)) = iter.next() {
    if c == c1 {
      let rest = if let Some((idx, _)) = iter.peek() {
        s.split_at(*idx).1
      } else {
        ""
      };
      return (Some(c), rest);
    }
  }
  (None, s)
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(malformed(format!("couldn't match {} at {:?}", c, s)))
  }
}

fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE, r"\s+");
  optional_re(&WHITESPACE, s).1
}

/// Tries to parse a bare token: anything up to whitespace or a bracket
fn optional_token(s: &str) -> (Option<&str>, &str) {
  regex_static!(TOKEN, r"[^\s()]+");
  optional_re(&TOKEN, s)
}

/// One bracketed group. Bare tokens may only precede bracketed children
/// (the first token is the node label); a token after a child or a child
/// after two tokens has no reading as terminal or nonterminal.
fn parse_node<'a>(s: &'a str, word_units: bool) -> ParseResult<'a, BracketTree> {
  let (_, s) = needed_char('(', s)?;
  let mut rem = skip_whitespace(s);

  let mut tokens: Vec<&str> = Vec::new();
  let mut children: Vec<BracketTree> = Vec::new();

  loop {
    if let (Some(_), s) = optional_char(')', rem) {
      rem = s;
      break;
    }
    if rem.starts_with('(') {
      if tokens.len() > 1 {
        return Err(malformed(format!(
          "bracketed child after a word sequence at {:?}",
          rem
        )));
      }
      let (child, s) = parse_node(rem, word_units)?;
      children.push(child);
      rem = skip_whitespace(s);
    } else {
      let (token, s) = optional_token(rem);
      match token {
        Some(token) if children.is_empty() => {
          tokens.push(token);
          rem = skip_whitespace(s);
        }
        Some(token) => {
          return Err(malformed(format!(
            "bare token {:?} after a bracketed child",
            token
          )));
        }
        // only an exhausted input reaches here: ')', '(' and tokens are
        // all handled above
        None => return Err(malformed("input ended inside a constituent".to_string())),
      }
    }
  }

  let tree = interpret_node(tokens, children, word_units)?;
  Ok((tree, rem))
}

fn interpret_node(
  tokens: Vec<&str>,
  children: Vec<BracketTree>,
  word_units: bool,
) -> Result<BracketTree, DataError> {
  if children.is_empty() {
    if word_units {
      // innermost groups are tag-less lexical units; the covering label
      // is resolved by the normalizer's multiword step
      if tokens.is_empty() {
        return Err(malformed("empty constituent".to_string()));
      }
      return Ok(BracketTree::leaf("", tokens.join(" ")));
    }
    return match tokens.as_slice() {
      [] => Err(malformed("empty constituent".to_string())),
      [tag] => Err(malformed(format!("constituent ({}) has no children", tag))),
      [tag, word] => Ok(BracketTree::leaf(*tag, *word)),
      [tag, ..] => Err(malformed(format!(
        "terminal under tag {} covers more than one word",
        tag
      ))),
    };
  }

  // tokens.len() <= 1 here, enforced during the scan
  let label = tokens.first().copied().unwrap_or("");
  Ok(BracketTree::internal(label, children))
}

/// Parses one complete bracketed tree, failing on trailing input.
/// `word_units` selects the corpus convention where each lexical unit is
/// wrapped in its own tag-less bracket pair.
pub fn parse(s: &str, word_units: bool) -> Result<BracketTree, DataError> {
  let rem = skip_whitespace(s);
  if !rem.starts_with('(') {
    return Err(malformed(format!("expected an open bracket at {:?}", rem)));
  }
  let (tree, rem) = parse_node(rem, word_units)?;
  let rem = skip_whitespace(rem);
  if !rem.is_empty() {
    return Err(malformed(format!("trailing input after tree: {:?}", rem)));
  }
  Ok(tree)
}

impl FromStr for BracketTree {
  type Err = DataError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse(s, false)
  }
}

#[test]
fn test_parse_roundtrip() {
  let line = "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))";
  let tree: BracketTree = line.parse().unwrap();
  assert_eq!(tree.to_string(), line);
}

#[test]
fn test_parse_empty_top() {
  let tree: BracketTree = "( (S (NP (PRP He)) (VP (VBD left))))".parse().unwrap();
  let (label, children) = tree.get_internal().unwrap();
  assert_eq!(label, "");
  assert_eq!(children.len(), 1);
}

#[test]
fn test_parse_word_units() {
  let tree = parse("(NP (NN (kunjungan kerja)))", true).unwrap();
  let (label, children) = tree.get_internal().unwrap();
  assert_eq!(label, "NP");
  let (inner_label, inner_children) = children[0].get_internal().unwrap();
  assert_eq!(inner_label, "NN");
  assert_eq!(
    inner_children[0].get_leaf().unwrap(),
    ("", "kunjungan kerja")
  );
}

#[test]
fn test_parse_rejects_malformed() {
  assert!(matches!(
    "(S (NP (DT the) (NN dog))".parse::<BracketTree>(),
    Err(DataError::MalformedBracketing(_))
  ));
  assert!(matches!(
    "(S (NP (DT the))) extra".parse::<BracketTree>(),
    Err(DataError::MalformedBracketing(_))
  ));
  assert!(matches!(
    "(NN kunjungan kerja)".parse::<BracketTree>(),
    Err(DataError::MalformedBracketing(_))
  ));
  assert!(matches!(
    "()".parse::<BracketTree>(),
    Err(DataError::MalformedBracketing(_))
  ));
}
