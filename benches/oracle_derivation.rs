use criterion::{black_box, criterion_group, criterion_main, Criterion};

use treeoracle::normalize::{NormalizeConfig, Normalizer, Sentences};
use treeoracle::oracle::{actions, build_oracle, leaf_rows};
use treeoracle::vocab::Vocabulary;

const CORPUS: &str = include_str!("./sample.mrg");

fn normalized_lines(normalizer: &Normalizer) -> Vec<String> {
  Sentences::new(CORPUS.as_bytes())
    .map(|item| item.unwrap().1)
    .filter_map(|sentence| normalizer.normalize(&sentence).unwrap())
    .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
  let normalizer = Normalizer::new(NormalizeConfig::ptb());
  let lines = normalized_lines(&normalizer);
  let words: Vec<String> = lines
    .iter()
    .flat_map(|line| leaf_rows(line).unwrap().1)
    .collect();
  let vocab = Vocabulary::build(&words, 1);

  c.bench_function("normalize corpus", |b| {
    b.iter(|| normalized_lines(black_box(&normalizer)).len())
  });

  c.bench_function("derive actions", |b| {
    b.iter(|| {
      lines
        .iter()
        .map(|line| actions(black_box(line)).unwrap().len())
        .sum::<usize>()
    })
  });

  c.bench_function("build oracle records", |b| {
    b.iter(|| {
      lines
        .iter()
        .map(|line| build_oracle(black_box(line), &vocab).unwrap().actions.len())
        .sum::<usize>()
    })
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
