use std::fmt;
use std::io::{BufRead, Write};
use std::marker::PhantomData;

use crate::oracle::{Action, GenOracle, OracleRecord};
use crate::utils::DataError;

/// A record family storable in the blank-line-delimited oracle text
/// format: `NUM_PREAMBLE` preamble lines, then one line per action, then
/// one blank line.
pub trait Record: fmt::Display + Sized {
  const NUM_PREAMBLE: usize;

  /// Rebuild a record from one block's preamble and action lines.
  fn from_block(preamble: Vec<String>, actions: Vec<Action>) -> Result<Self, DataError>;
}

fn split_row(line: &str) -> Vec<String> {
  line.split_whitespace().map(|t| t.to_string()).collect()
}

impl Record for OracleRecord {
  const NUM_PREAMBLE: usize = 5;

  fn from_block(preamble: Vec<String>, actions: Vec<Action>) -> Result<Self, DataError> {
    let [parsed, tags, words, lowercased, unkified]: [String; 5] =
      preamble.try_into().map_err(|_| {
        DataError::UnexpectedEndOfStream("oracle block is missing preamble lines".to_string())
      })?;
    let postags = split_row(&tags);
    let words = split_row(&words);
    let lowercased = split_row(&lowercased);
    let unkified = split_row(&unkified);
    if postags.len() != words.len()
      || words.len() != lowercased.len()
      || lowercased.len() != unkified.len()
    {
      return Err(DataError::InvalidRecordField(format!(
        "token rows disagree: {} tags, {} words, {} lowercased, {} unkified",
        postags.len(),
        words.len(),
        lowercased.len(),
        unkified.len()
      )));
    }
    Ok(Self {
      parsed,
      postags,
      words,
      lowercased,
      unkified,
      actions,
    })
  }
}

impl Record for GenOracle {
  const NUM_PREAMBLE: usize = 3;

  fn from_block(preamble: Vec<String>, actions: Vec<Action>) -> Result<Self, DataError> {
    let [parsed, words, unkified]: [String; 3] = preamble.try_into().map_err(|_| {
      DataError::UnexpectedEndOfStream("oracle block is missing preamble lines".to_string())
    })?;
    let words = split_row(&words);
    let unkified = split_row(&unkified);
    if words.len() != unkified.len() {
      return Err(DataError::InvalidRecordField(format!(
        "token rows disagree: {} words, {} unkified",
        words.len(),
        unkified.len()
      )));
    }
    Ok(Self {
      parsed,
      words,
      unkified,
      actions,
    })
  }
}

/// Render one record as its text block, terminated by one blank line.
pub fn encode<T: Record>(record: &T) -> String {
  format!("{}\n\n", record)
}

/// Write one record's block, terminated by one blank line.
pub fn write_record<T: Record, W: Write>(w: &mut W, record: &T) -> std::io::Result<()> {
  writeln!(w, "{}\n", record)
}

/// Lazy, single-pass, forward-only decoder for a stream of oracle
/// blocks. Non-blank lines are buffered; the first `NUM_PREAMBLE` of a
/// block are its preamble and the rest its actions; a record is yielded
/// at each blank line, and a trailing unterminated record is yielded at
/// end of input. Restart by reopening the source.
pub struct Records<B, T> {
  lines: std::io::Lines<B>,
  line_no: usize,
  done: bool,
  _record: PhantomData<T>,
}

impl<B: BufRead, T: Record> Records<B, T> {
  pub fn new(reader: B) -> Self {
    Self {
      lines: reader.lines(),
      line_no: 0,
      done: false,
      _record: PhantomData,
    }
  }

  fn finish(&self, preamble: Vec<String>, actions: Vec<Action>) -> Result<T, DataError> {
    T::from_block(preamble, actions).map_err(|e| e.at_line(self.line_no))
  }
}

impl<B: BufRead, T: Record> Iterator for Records<B, T> {
  type Item = Result<T, DataError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let mut preamble: Vec<String> = Vec::new();
    let mut actions: Vec<Action> = Vec::new();

    loop {
      match self.lines.next() {
        None => {
          self.done = true;
          if preamble.is_empty() && actions.is_empty() {
            return None;
          }
          return Some(self.finish(preamble, actions));
        }
        Some(Err(e)) => {
          self.done = true;
          return Some(Err(e.into()));
        }
        Some(Ok(line)) => {
          self.line_no += 1;
          let line = line.trim();
          if line.is_empty() {
            if preamble.is_empty() && actions.is_empty() {
              continue;
            }
            return Some(self.finish(preamble, actions));
          }
          if preamble.len() < T::NUM_PREAMBLE {
            preamble.push(line.to_string());
          } else {
            match line.parse::<Action>() {
              Ok(action) => actions.push(action),
              // a block the decoder cannot classify poisons the rest of
              // the stream: there is no safe resynchronization point
              Err(e) => {
                self.done = true;
                return Some(Err(e.at_line(self.line_no)));
              }
            }
          }
        }
      }
    }
  }
}

/// Decode a stream of `T` blocks from a reader.
pub fn records<B: BufRead, T: Record>(reader: B) -> Records<B, T> {
  Records::new(reader)
}

#[cfg(test)]
use crate::oracle::{build_gen_oracle, build_oracle};
#[cfg(test)]
use crate::vocab::Vocabulary;

#[cfg(test)]
fn sample_vocab() -> Vocabulary {
  Vocabulary::build(["the", "the", "dog", "dog", "runs", "runs"], 2)
}

#[test]
fn test_roundtrip_discriminative() {
  let record = build_oracle(
    "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))",
    &sample_vocab(),
  )
  .unwrap();

  let text = encode(&record);
  let decoded: Vec<_> = records::<_, OracleRecord>(text.as_bytes())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(decoded, vec![record]);
}

#[test]
fn test_roundtrip_generative() {
  let record = build_gen_oracle(
    "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))",
    &sample_vocab(),
  )
  .unwrap();

  let text = encode(&record);
  let decoded: Vec<_> = records::<_, GenOracle>(text.as_bytes())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(decoded, vec![record]);
}

#[test]
fn test_decode_multiple_blocks_and_trailing_record() {
  let vocab = sample_vocab();
  let a = build_oracle("(S (NP (DT the) (NN dog)))", &vocab).unwrap();
  let b = build_oracle("(S (VP (VBZ runs)))", &vocab).unwrap();

  // second block left unterminated
  let text = format!("{}{}", encode(&a), b);
  let decoded: Vec<_> = records::<_, OracleRecord>(text.as_bytes())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(decoded, vec![a, b]);
}

#[test]
fn test_decode_guards_comment_sentinel() {
  let vocab = Vocabulary::build(["#", "#"], 2);
  let record = build_oracle("(S (NP (SYM #) (NN dog)))", &vocab).unwrap();

  let text = encode(&record);
  // the words row must not start flush with '#'
  assert!(text.lines().nth(2).unwrap().starts_with(" #"));
  let decoded: Vec<_> = records::<_, OracleRecord>(text.as_bytes())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(decoded, vec![record]);
}

#[test]
fn test_decode_rejects_short_block() {
  let text = "(S (NP (NN dog)))\nNN\ndog\n";
  let mut it = records::<_, OracleRecord>(text.as_bytes());
  assert!(matches!(
    it.next(),
    Some(Err(DataError::UnexpectedEndOfStream(_)))
  ));
}

#[test]
fn test_decode_rejects_row_length_mismatch() {
  let text = "(S (NP (DT the) (NN dog)))\nDT NN\nthe dog\nthe dog\nthe\nNT(S)\nNT(NP)\nSHIFT\nSHIFT\nREDUCE\nREDUCE\n\n";
  let mut it = records::<_, OracleRecord>(text.as_bytes());
  assert!(matches!(
    it.next(),
    Some(Err(DataError::InvalidRecordField(_)))
  ));
}

#[test]
fn test_decode_rejects_unknown_action() {
  let text = "(S (NP (NN dog)))\nNN\ndog\ndog\ndog\nNT(S)\nJUMP\n\n";
  let mut it = records::<_, OracleRecord>(text.as_bytes());
  assert!(matches!(
    it.next(),
    Some(Err(DataError::InvalidRecordField(_)))
  ));
  assert!(it.next().is_none());
}
