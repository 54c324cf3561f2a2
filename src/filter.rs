use std::collections::HashSet;
use std::io::{BufRead, Write};

use tracing::warn;

use crate::codec::{write_record, Records};
use crate::oracle::{GenOracle, OracleRecord};
use crate::tree::BracketTree;
use crate::utils::DataError;
use crate::vocab::UNK;

/// UNK-mapped tokens of an unkified row. Membership is by prefix: the
/// format admits fine-grained `UNK-…` classes.
pub fn unk_tokens(row: &[String]) -> impl Iterator<Item = &String> {
  row.iter().filter(|token| token.starts_with(UNK))
}

/// Nonterminal-label and UNK-token inventories observed in a training
/// split. Fully materialized before any filtering starts, read-only
/// afterward.
#[derive(Debug, Clone, Default)]
pub struct TrainSets {
  pub nt_labels: HashSet<String>,
  pub unk_tokens: HashSet<String>,
  pub gen_unk_tokens: HashSet<String>,
}

impl TrainSets {
  /// Exhaust the three training streams: normalized tree lines, the
  /// discriminative oracle and the generative oracle.
  pub fn collect<T, O, G>(trees: T, oracles: O, gen_oracles: G) -> Result<Self, DataError>
  where
    T: BufRead,
    O: BufRead,
    G: BufRead,
  {
    let mut sets = Self::default();
    for (ix, line) in trees.lines().enumerate() {
      let line = line?;
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let tree: BracketTree = line.parse().map_err(|e: DataError| e.at_line(ix + 1))?;
      sets.nt_labels.extend(tree.nonterminal_labels());
    }
    for record in Records::<_, OracleRecord>::new(oracles) {
      let record = record?;
      sets.unk_tokens.extend(unk_tokens(&record.unkified).cloned());
    }
    for record in Records::<_, GenOracle>::new(gen_oracles) {
      let record = record?;
      sets
        .gen_unk_tokens
        .extend(unk_tokens(&record.unkified).cloned());
    }
    Ok(sets)
  }

  /// True iff the example references no nonterminal label or UNK token
  /// unseen at train time.
  pub fn admits(
    &self,
    tree_line: &str,
    oracle: &OracleRecord,
    gen_oracle: &GenOracle,
  ) -> Result<bool, DataError> {
    let tree: BracketTree = tree_line.parse()?;
    Ok(
      tree
        .nonterminal_labels()
        .iter()
        .all(|label| self.nt_labels.contains(label))
        && unk_tokens(&oracle.unkified).all(|token| self.unk_tokens.contains(token))
        && unk_tokens(&gen_oracle.unkified).all(|token| self.gen_unk_tokens.contains(token)),
    )
  }
}

#[derive(Debug, PartialEq)]
pub struct FilterOutcome {
  pub kept: usize,
  pub dropped: usize,
}

/// Filter an evaluation split against training inventories. The three
/// input streams are position-aligned; an example failing any check is
/// dropped from all three outputs, keeping the survivors aligned in
/// their original relative order.
pub fn filter_split<T, O, G, WT, WO, WG>(
  sets: &TrainSets,
  trees: T,
  oracles: O,
  gen_oracles: G,
  out_trees: &mut WT,
  out_oracles: &mut WO,
  out_gen_oracles: &mut WG,
) -> Result<FilterOutcome, DataError>
where
  T: BufRead,
  O: BufRead,
  G: BufRead,
  WT: Write,
  WO: Write,
  WG: Write,
{
  let mut tree_lines = trees.lines();
  let mut oracle_records = Records::<_, OracleRecord>::new(oracles);
  let mut gen_records = Records::<_, GenOracle>::new(gen_oracles);
  let mut outcome = FilterOutcome {
    kept: 0,
    dropped: 0,
  };
  let mut index = 0;

  loop {
    let tree_line = loop {
      match tree_lines.next() {
        None => break None,
        Some(line) => {
          let line = line?;
          let line = line.trim().to_string();
          if !line.is_empty() {
            break Some(line);
          }
        }
      }
    };
    let oracle = oracle_records.next().transpose()?;
    let gen_oracle = gen_records.next().transpose()?;
    let (Some(tree_line), Some(oracle), Some(gen_oracle)) = (tree_line, oracle, gen_oracle)
    else {
      break;
    };

    index += 1;
    if sets.admits(&tree_line, &oracle, &gen_oracle)? {
      writeln!(out_trees, "{}", tree_line)?;
      write_record(out_oracles, &oracle)?;
      write_record(out_gen_oracles, &gen_oracle)?;
      outcome.kept += 1;
    } else {
      warn!(
        example = index,
        "dropped evaluation example with unseen labels or UNK tokens"
      );
      outcome.dropped += 1;
    }
  }
  Ok(outcome)
}

/// Newline-separated sorted dump of a training-derived set: a debugging
/// artifact and a persisted checkpoint for later filtering runs.
pub fn dump_sorted<W: Write>(set: &HashSet<String>, w: &mut W) -> std::io::Result<()> {
  let mut items: Vec<&String> = set.iter().collect();
  items.sort();
  for item in items {
    writeln!(w, "{}", item)?;
  }
  Ok(())
}

#[cfg(test)]
use crate::codec::encode;
#[cfg(test)]
use crate::oracle::{build_gen_oracle, build_oracle};
#[cfg(test)]
use crate::vocab::Vocabulary;

#[cfg(test)]
fn train_data() -> (String, String, String) {
  let lines = [
    "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))",
    "(S (NP (DT the) (NN cat)) (VP (VBZ sits)))",
  ];
  let vocab = Vocabulary::build(["the", "the", "dog", "dog"], 2);
  let trees = lines.join("\n");
  let oracles: String = lines
    .iter()
    .map(|line| encode(&build_oracle(line, &vocab).unwrap()))
    .collect();
  let gen_oracles: String = lines
    .iter()
    .map(|line| encode(&build_gen_oracle(line, &vocab).unwrap()))
    .collect();
  (trees, oracles, gen_oracles)
}

#[test]
fn test_collect_train_sets() {
  let (trees, oracles, gen_oracles) = train_data();
  let sets = TrainSets::collect(
    trees.as_bytes(),
    oracles.as_bytes(),
    gen_oracles.as_bytes(),
  )
  .unwrap();

  assert_eq!(
    sets.nt_labels,
    ["S", "NP", "VP"].iter().map(|s| s.to_string()).collect()
  );
  assert_eq!(
    sets.unk_tokens,
    [UNK].iter().map(|s| s.to_string()).collect()
  );
  assert_eq!(sets.gen_unk_tokens, sets.unk_tokens);
}

#[test]
fn test_filter_drops_unseen_label_and_keeps_alignment() {
  let (trees, oracles, gen_oracles) = train_data();
  let sets = TrainSets::collect(
    trees.as_bytes(),
    oracles.as_bytes(),
    gen_oracles.as_bytes(),
  )
  .unwrap();

  let vocab = Vocabulary::build(["the", "the", "dog", "dog"], 2);
  let good = "(S (NP (DT the) (NN dog)))";
  let bad = "(S (WEIRD (DT the) (NN dog)))";
  let test_trees = format!("{}\n{}\n", good, bad);
  let test_oracles: String = [good, bad]
    .iter()
    .map(|line| encode(&build_oracle(line, &vocab).unwrap()))
    .collect();
  let test_gen: String = [good, bad]
    .iter()
    .map(|line| encode(&build_gen_oracle(line, &vocab).unwrap()))
    .collect();

  let mut out_trees = Vec::new();
  let mut out_oracles = Vec::new();
  let mut out_gen = Vec::new();
  let outcome = filter_split(
    &sets,
    test_trees.as_bytes(),
    test_oracles.as_bytes(),
    test_gen.as_bytes(),
    &mut out_trees,
    &mut out_oracles,
    &mut out_gen,
  )
  .unwrap();

  assert_eq!(outcome, FilterOutcome { kept: 1, dropped: 1 });
  assert_eq!(String::from_utf8(out_trees).unwrap(), format!("{}\n", good));

  let survivors: Vec<_> = Records::<_, OracleRecord>::new(out_oracles.as_slice())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(survivors.len(), 1);
  assert_eq!(survivors[0].parsed, good);
  let gen_survivors: Vec<_> = Records::<_, GenOracle>::new(out_gen.as_slice())
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
  assert_eq!(gen_survivors.len(), 1);
  assert_eq!(gen_survivors[0].parsed, good);
}

#[test]
fn test_filter_drops_unseen_unk_class() {
  let (trees, oracles, gen_oracles) = train_data();
  let sets = TrainSets::collect(
    trees.as_bytes(),
    oracles.as_bytes(),
    gen_oracles.as_bytes(),
  )
  .unwrap();

  // handwritten block carrying an UNK class never seen at train time
  let tree = "(S (NP (NN dog)))";
  let oracle_block = format!(
    "{}\nNN\ndog\ndog\nUNK-caps\nNT(S)\nNT(NP)\nSHIFT\nREDUCE\nREDUCE\n\n",
    tree
  );
  let gen_block = format!("{}\ndog\nUNK-caps\nNT(S)\nNT(NP)\nGEN(UNK-caps)\nREDUCE\nREDUCE\n\n", tree);

  let mut out_trees = Vec::new();
  let mut out_oracles = Vec::new();
  let mut out_gen = Vec::new();
  let outcome = filter_split(
    &sets,
    format!("{}\n", tree).as_bytes(),
    oracle_block.as_bytes(),
    gen_block.as_bytes(),
    &mut out_trees,
    &mut out_oracles,
    &mut out_gen,
  )
  .unwrap();

  assert_eq!(outcome, FilterOutcome { kept: 0, dropped: 1 });
  assert!(out_trees.is_empty());
  assert!(out_oracles.is_empty());
  assert!(out_gen.is_empty());
}

#[test]
fn test_dump_sorted() {
  let set: HashSet<String> = ["NP", "S", "ADVP"].iter().map(|s| s.to_string()).collect();
  let mut out = Vec::new();
  dump_sorted(&set, &mut out).unwrap();
  assert_eq!(String::from_utf8(out).unwrap(), "ADVP\nNP\nS\n");
}
