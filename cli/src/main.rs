use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process;

use treeoracle::codec::write_record;
use treeoracle::filter::{dump_sorted, filter_split, TrainSets};
use treeoracle::normalize::{split_sentences, NormalizeConfig, Normalizer, Sentences};
use treeoracle::oracle::{build_gen_oracle, build_oracle, leaf_rows};
use treeoracle::vocab::Vocabulary;
use treeoracle::Err;

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} MODE [args] [options]

Modes:
  normalize FILE
      Print each tree of a raw corpus file as one canonical line.
        --multiword   corpus brackets each lexical unit separately
        --per-line    a physical line may hold several trees

  oracle TRAIN FILE
      Build the vocabulary from the normalized TRAIN lines, then print
      one oracle block per normalized line of FILE.
        --gen           generative oracle (GEN instead of SHIFT)
        --min-count N   keep words seen at least N times (default 2)

  filter TRAIN_TREES TRAIN_ORACLE TRAIN_GEN TEST_TREES TEST_ORACLE TEST_GEN
      Drop evaluation examples referencing labels or UNK tokens unseen
      at train time; the three outputs stay position-aligned.
        --out-trees F     (default test-removed.txt)
        --out-oracle F    (default test-removed.oracle)
        --out-gen F       (default test-removed-gen.oracle)
        --dump-nt F       save the sorted nonterminal label set
        --dump-unk F      save the sorted UNK token set
        --dump-gen-unk F  save the sorted generative UNK token set

Options:
  -h, --help    Print this message",
    prog_name
  )
}

enum Mode {
  Normalize {
    file: String,
    multiword: bool,
    per_line: bool,
  },
  Oracle {
    train: String,
    file: String,
    generative: bool,
    min_count: usize,
  },
  Filter {
    inputs: Vec<String>,
    out_trees: String,
    out_oracle: String,
    out_gen: String,
    dump_nt: Option<String>,
    dump_unk: Option<String>,
    dump_gen_unk: Option<String>,
  },
}

struct Args;

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Mode, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "treeoracle"));
    }

    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap();
    let rest: Vec<String> = iter.collect();

    if rest.iter().any(|o| o == "-h" || o == "--help") {
      println!("{}", usage(&prog_name));
      process::exit(0);
    }

    let mut iter = rest.into_iter();
    let mode = match iter.next() {
      Some(mode) => mode,
      None => return Err(Self::make_error_message("missing mode", prog_name)),
    };

    match mode.as_str() {
      "normalize" => Self::parse_normalize(iter, prog_name),
      "oracle" => Self::parse_oracle(iter, prog_name),
      "filter" => Self::parse_filter(iter, prog_name),
      _ => Err(Self::make_error_message(
        &format!("unknown mode {}", mode),
        prog_name,
      )),
    }
  }

  fn parse_normalize(
    iter: impl Iterator<Item = String>,
    prog_name: String,
  ) -> Result<Mode, String> {
    let mut file: Option<String> = None;
    let mut multiword = false;
    let mut per_line = false;

    for o in iter {
      if o == "--multiword" {
        multiword = true;
      } else if o == "--per-line" {
        per_line = true;
      } else if file.is_none() {
        file = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    match file {
      Some(file) => Ok(Mode::Normalize {
        file,
        multiword,
        per_line,
      }),
      None => Err(Self::make_error_message("missing corpus file", prog_name)),
    }
  }

  fn parse_oracle(
    mut iter: impl Iterator<Item = String>,
    prog_name: String,
  ) -> Result<Mode, String> {
    let mut files: Vec<String> = Vec::new();
    let mut generative = false;
    let mut min_count = Vocabulary::DEFAULT_MIN_COUNT;

    while let Some(o) = iter.next() {
      if o == "--gen" {
        generative = true;
      } else if o == "--min-count" {
        let value = iter
          .next()
          .ok_or_else(|| Self::make_error_message("--min-count needs a value", &prog_name))?;
        min_count = value.parse().map_err(|_| {
          Self::make_error_message(&format!("bad --min-count value {}", value), &prog_name)
        })?;
      } else {
        files.push(o);
      }
    }

    match <[String; 2]>::try_from(files) {
      Ok([train, file]) => Ok(Mode::Oracle {
        train,
        file,
        generative,
        min_count,
      }),
      Err(_) => Err(Self::make_error_message(
        "oracle needs a train file and a target file",
        prog_name,
      )),
    }
  }

  fn parse_filter(
    mut iter: impl Iterator<Item = String>,
    prog_name: String,
  ) -> Result<Mode, String> {
    let mut inputs: Vec<String> = Vec::new();
    let mut out_trees = "test-removed.txt".to_string();
    let mut out_oracle = "test-removed.oracle".to_string();
    let mut out_gen = "test-removed-gen.oracle".to_string();
    let mut dump_nt = None;
    let mut dump_unk = None;
    let mut dump_gen_unk = None;

    while let Some(o) = iter.next() {
      let value_for = |flag: &str, iter: &mut dyn Iterator<Item = String>| {
        iter
          .next()
          .ok_or_else(|| Self::make_error_message(&format!("{} needs a value", flag), &prog_name))
      };
      if o == "--out-trees" {
        out_trees = value_for("--out-trees", &mut iter)?;
      } else if o == "--out-oracle" {
        out_oracle = value_for("--out-oracle", &mut iter)?;
      } else if o == "--out-gen" {
        out_gen = value_for("--out-gen", &mut iter)?;
      } else if o == "--dump-nt" {
        dump_nt = Some(value_for("--dump-nt", &mut iter)?);
      } else if o == "--dump-unk" {
        dump_unk = Some(value_for("--dump-unk", &mut iter)?);
      } else if o == "--dump-gen-unk" {
        dump_gen_unk = Some(value_for("--dump-gen-unk", &mut iter)?);
      } else {
        inputs.push(o);
      }
    }

    if inputs.len() != 6 {
      return Err(Self::make_error_message(
        "filter needs six input files: three train, three test",
        prog_name,
      ));
    }

    Ok(Mode::Filter {
      inputs,
      out_trees,
      out_oracle,
      out_gen,
      dump_nt,
      dump_unk,
      dump_gen_unk,
    })
  }
}

fn open(path: &str) -> io::Result<BufReader<File>> {
  Ok(BufReader::new(File::open(path)?))
}

fn create(path: &str) -> io::Result<BufWriter<File>> {
  Ok(BufWriter::new(File::create(path)?))
}

fn run_normalize(file: &str, multiword: bool, per_line: bool) -> Result<(), Err> {
  let config = if multiword {
    NormalizeConfig::multiword()
  } else {
    NormalizeConfig::ptb()
  };
  let normalizer = Normalizer::new(config);
  let reader = open(file)?;
  let stdout = io::stdout();
  let mut out = stdout.lock();

  let emit = |line_no: usize, sentence: &str, out: &mut dyn Write| -> Result<(), Err> {
    // a sentence is the unit of failure: log and move on
    match normalizer.normalize(sentence) {
      Ok(Some(canonical)) => writeln!(out, "{}", canonical)?,
      Ok(None) => {}
      Err(e) => eprintln!("line {}: skipping malformed sentence: {}", line_no, e),
    }
    Ok(())
  };

  if per_line {
    for (ix, line) in reader.lines().enumerate() {
      let line = line?;
      for sentence in split_sentences(&line) {
        emit(ix + 1, &sentence, &mut out)?;
      }
    }
  } else {
    for item in Sentences::new(reader) {
      let (line_no, sentence) = item?;
      emit(line_no, &sentence, &mut out)?;
    }
  }
  Ok(())
}

fn run_oracle(train: &str, file: &str, generative: bool, min_count: usize) -> Result<(), Err> {
  let mut tokens: Vec<String> = Vec::new();
  for line in open(train)?.lines() {
    let line = line?;
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let (_, words, _) = leaf_rows(line)?;
    tokens.extend(words);
  }
  let vocab = Vocabulary::build(&tokens, min_count);

  let stdout = io::stdout();
  let mut out = stdout.lock();
  for (ix, line) in open(file)?.lines().enumerate() {
    let line = line?;
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    if generative {
      let record = build_gen_oracle(line, &vocab).map_err(|e| e.at_line(ix + 1))?;
      write_record(&mut out, &record)?;
    } else {
      let record = build_oracle(line, &vocab).map_err(|e| e.at_line(ix + 1))?;
      write_record(&mut out, &record)?;
    }
  }
  Ok(())
}

fn run_filter(
  inputs: &[String],
  out_trees: &str,
  out_oracle: &str,
  out_gen: &str,
  dump_nt: Option<&str>,
  dump_unk: Option<&str>,
  dump_gen_unk: Option<&str>,
) -> Result<(), Err> {
  let sets = TrainSets::collect(open(&inputs[0])?, open(&inputs[1])?, open(&inputs[2])?)?;

  for (path, set) in [
    (dump_nt, &sets.nt_labels),
    (dump_unk, &sets.unk_tokens),
    (dump_gen_unk, &sets.gen_unk_tokens),
  ] {
    if let Some(path) = path {
      let mut w = create(path)?;
      dump_sorted(set, &mut w)?;
      w.flush()?;
    }
  }

  let mut trees_out = create(out_trees)?;
  let mut oracle_out = create(out_oracle)?;
  let mut gen_out = create(out_gen)?;
  let outcome = filter_split(
    &sets,
    open(&inputs[3])?,
    open(&inputs[4])?,
    open(&inputs[5])?,
    &mut trees_out,
    &mut oracle_out,
    &mut gen_out,
  )?;
  trees_out.flush()?;
  oracle_out.flush()?;
  gen_out.flush()?;

  eprintln!("kept {} examples, dropped {}", outcome.kept, outcome.dropped);
  Ok(())
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let mode = match Args::parse(env::args().collect()) {
    Ok(mode) => mode,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  match mode {
    Mode::Normalize {
      file,
      multiword,
      per_line,
    } => run_normalize(&file, multiword, per_line),
    Mode::Oracle {
      train,
      file,
      generative,
      min_count,
    } => run_oracle(&train, &file, generative, min_count),
    Mode::Filter {
      inputs,
      out_trees,
      out_oracle,
      out_gen,
      dump_nt,
      dump_unk,
      dump_gen_unk,
    } => run_filter(
      &inputs,
      &out_trees,
      &out_oracle,
      &out_gen,
      dump_nt.as_deref(),
      dump_unk.as_deref(),
      dump_gen_unk.as_deref(),
    ),
  }
}
