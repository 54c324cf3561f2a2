use std::error::Error;
use std::fmt;
use std::io;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Errors raised while transforming treebank data.
///
/// A malformed sentence aborts that sentence only; callers decide whether
/// to fail the batch or skip and log. A stream that ends in the middle of
/// an oracle block cannot be resynchronized and is fatal for that stream.
/// Nothing is ever retried: the transforms are pure functions of their
/// input.
#[derive(Debug)]
pub enum DataError {
  /// Unbalanced or structurally invalid parenthesization.
  MalformedBracketing(String),
  /// An oracle block ran out of lines before its preamble was complete.
  UnexpectedEndOfStream(String),
  /// A record field is malformed or disagrees in cardinality with its
  /// sibling fields.
  InvalidRecordField(String),
  Io(io::Error),
}

impl DataError {
  /// Append a source position to the message, so the offending input can
  /// be located.
  pub fn at_line(self, line: usize) -> Self {
    match self {
      Self::MalformedBracketing(msg) => {
        Self::MalformedBracketing(format!("{} (line {})", msg, line))
      }
      Self::UnexpectedEndOfStream(msg) => {
        Self::UnexpectedEndOfStream(format!("{} (line {})", msg, line))
      }
      Self::InvalidRecordField(msg) => Self::InvalidRecordField(format!("{} (line {})", msg, line)),
      Self::Io(e) => Self::Io(e),
    }
  }
}

impl fmt::Display for DataError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MalformedBracketing(msg) => write!(f, "malformed bracketing: {}", msg),
      Self::UnexpectedEndOfStream(msg) => write!(f, "unexpected end of stream: {}", msg),
      Self::InvalidRecordField(msg) => write!(f, "invalid record field: {}", msg),
      Self::Io(e) => write!(f, "io error: {}", e),
    }
  }
}

impl Error for DataError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for DataError {
  fn from(e: io::Error) -> Self {
    Self::Io(e)
  }
}
