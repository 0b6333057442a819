//! Source locations and the diagnostic type threaded through every pass.
//!
//! Every pass returns `Result<(), Vec<Diagnostic>>` (or, where it rewrites
//! the IR, `Result<EmbossIr, Vec<Diagnostic>>`); diagnostics accumulate
//! within a pass and the driver aborts between passes, per §5/§7/§9 of the
//! spec ("Error accumulation vs. early return").

use std::fmt;

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Position {
  pub line: u32,
  pub column: u32,
}

/// A half-open `[start, end)` span in one source file, plus a marker for
/// nodes synthesized by the compiler (e.g. an inferred `byte_order`
/// attribute, or a write-method's synthesized inverse expression) so that
/// diagnostics can avoid pointing at code the user never wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
  pub start: Position,
  pub end: Position,
  pub is_synthetic: bool,
}

impl SourceLocation {
  /// A location for a node with no true source text, e.g. the inferred
  /// `this` scope entry or a synthesized inverse expression.
  #[must_use] pub fn synthetic() -> Self {
    SourceLocation { start: Position::default(), end: Position::default(), is_synthetic: true }
  }
}

/// A single annotation attached to a [`Diagnostic`], pointing at a related
/// location (the original definition of a duplicate name, the other
/// candidate of an ambiguous reference, the type's size declaration in a
/// size-mismatch error, and so on).
#[derive(Debug, Clone)]
pub struct Note {
  pub file: String,
  pub location: SourceLocation,
  pub message: String,
}

/// The severity-agnostic diagnostic type. The core never distinguishes
/// warnings from errors (§7): any `Diagnostic` produced aborts the
/// pipeline before the next pass runs.
#[derive(Debug, Clone)]
pub struct Diagnostic {
  pub file: String,
  pub location: SourceLocation,
  pub message: String,
  pub notes: Vec<Note>,
}

impl Diagnostic {
  #[must_use] pub fn new(file: impl Into<String>, location: SourceLocation, message: impl Into<String>) -> Self {
    Diagnostic { file: file.into(), location, message: message.into(), notes: Vec::new() }
  }

  #[must_use] pub fn with_note(mut self, file: impl Into<String>, location: SourceLocation, message: impl Into<String>) -> Self {
    self.notes.push(Note { file: file.into(), location, message: message.into() });
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}:{}:{}: {}", self.file, self.location.start.line, self.location.start.column, self.message)?;
    for note in &self.notes {
      writeln!(f, "  {}:{}:{}: note: {}", note.file, note.location.start.line, note.location.start.column, note.message)?;
    }
    Ok(())
  }
}

/// The result type returned at every pass boundary.
pub type PassResult<T> = Result<T, Vec<Diagnostic>>;
