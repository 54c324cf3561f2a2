#[macro_use]
extern crate lazy_static;

pub mod codec;
pub mod filter;
pub mod normalize;
pub mod oracle;
pub mod parse_tree;
pub mod tree;
pub mod utils;
pub mod vocab;

use crate::normalize::Normalizer;
use crate::oracle::{build_gen_oracle, build_oracle, GenOracle, OracleRecord};
use crate::vocab::Vocabulary;
pub use crate::utils::{DataError, Err};

/// Normalize one raw sentence and derive its discriminative oracle.
/// `Ok(None)` means the sentence was entirely pruned and yields no
/// record.
pub fn oracle_for(
  sentence: &str,
  normalizer: &Normalizer,
  vocab: &Vocabulary,
) -> Result<Option<OracleRecord>, DataError> {
  match normalizer.normalize(sentence)? {
    Some(parsed) => Ok(Some(build_oracle(&parsed, vocab)?)),
    None => Ok(None),
  }
}

/// Normalize one raw sentence and derive its generative oracle.
pub fn gen_oracle_for(
  sentence: &str,
  normalizer: &Normalizer,
  vocab: &Vocabulary,
) -> Result<Option<GenOracle>, DataError> {
  match normalizer.normalize(sentence)? {
    Some(parsed) => Ok(Some(build_gen_oracle(&parsed, vocab)?)),
    None => Ok(None),
  }
}

#[test]
fn test_end_to_end_pipeline() {
  use crate::codec::{encode, records};
  use crate::normalize::NormalizeConfig;
  use crate::oracle::Action;

  let normalizer = Normalizer::new(NormalizeConfig::ptb());
  let vocab = Vocabulary::build(["the", "the", "dog", "dog", "runs", "runs"], 2);

  let raw = "( (S\n  (NP-SBJ (DT the) (NN dog))\n  (VP (VBZ runs) (NP (-NONE- *)))))";
  let record = oracle_for(raw, &normalizer, &vocab).unwrap().unwrap();

  assert_eq!(record.parsed, "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))");
  assert_eq!(record.words, vec!["the", "dog", "runs"]);
  assert_eq!(
    record.actions.iter().filter(|a| a.is_shift()).count(),
    record.words.len()
  );
  assert_eq!(
    record.actions.last(),
    Some(&Action::Reduce)
  );

  // byte-identical text after an encode/decode/encode cycle
  let text = encode(&record);
  let decoded = records::<_, crate::oracle::OracleRecord>(text.as_bytes())
    .next()
    .unwrap()
    .unwrap();
  assert_eq!(encode(&decoded), text);

  let gen_record = gen_oracle_for(raw, &normalizer, &vocab).unwrap().unwrap();
  assert_eq!(gen_record.parsed, record.parsed);
  assert_eq!(
    gen_record.actions.iter().filter(|a| a.is_gen()).count(),
    gen_record.words.len()
  );
}
