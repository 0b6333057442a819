//! The global reserved-word table (§6, §9 "Global reserved-word table").
//!
//! The spec calls for this to be "lazily initialized on first use and
//! thereafter read-only" -- the only mutable ambient state in the whole
//! pipeline. `mmcc`'s `PrimOp::from_symbol` uses exactly this pattern
//! (`std::sync::LazyLock` guarding a precomputed map); this module follows
//! suit instead of a process-wide `static mut` or a `lazy_static!`/
//! `once_cell` dependency that nothing else in the pack pulls in.

use std::sync::LazyLock;

use hashbrown::HashMap;

/// The reserved-word resource, baked into the binary at compile time.
///
/// The spec treats this as an externally-supplied resource file (§6); the
/// core doesn't perform file I/O (§1 Non-goals), so the text is embedded
/// with `include_str!` the way a compiled artifact ships its own data.
const RESOURCE: &str = include_str!("../resources/reserved_words.txt");

/// Maps a reserved word to the name of the first language section that
/// declares it, e.g. `"if"` -> `"c++"` (C++ is listed first in the
/// resource, and `if` is a keyword there too).
static RESERVED_WORDS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(build_table);

fn build_table() -> HashMap<&'static str, &'static str> {
  let mut table = HashMap::new();
  let mut section = "";
  for raw_line in RESOURCE.lines() {
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    if let Some(name) = line.strip_prefix("--") {
      section = name.trim();
      continue;
    }
    table.entry(line).or_insert(section);
  }
  table
}

/// Returns the name of the first language section reserving `word`, if any.
#[must_use] pub fn reserving_language(word: &str) -> Option<&'static str> {
  RESERVED_WORDS.get(word).copied()
}

/// Returns `true` if `word` is a keyword in any tracked language.
#[must_use] pub fn is_reserved(word: &str) -> bool {
  RESERVED_WORDS.contains_key(word)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_c_family_keywords() {
    assert_eq!(reserving_language("class"), Some("c++"));
    assert_eq!(reserving_language("if"), Some("c++"));
  }

  #[test]
  fn finds_python_only_keyword() {
    assert_eq!(reserving_language("lambda"), Some("python"));
  }

  #[test]
  fn rejects_ordinary_identifiers() {
    assert!(!is_reserved("payload_length"));
  }
}
