//! String interning for identifiers that flow through the IR.
//!
//! Field names, type names, enum-value names, and attribute names are all
//! interned once and compared by id from then on, rather than by string
//! comparison, the same way `mmcc`'s `crate::symbol` module interns MMC
//! identifiers.

use std::cell::RefCell;
use std::fmt;

use hashbrown::HashMap;

/// An interned identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl serde::Serialize for Symbol {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.as_str())
  }
}

impl<'de> serde::Deserialize<'de> for Symbol {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(intern(&s))
  }
}

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    with_interner(|i| write!(f, "{:?}", i.strings[self.0 as usize]))
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    with_interner(|i| f.write_str(&i.strings[self.0 as usize]))
  }
}

impl Symbol {
  /// Returns the underlying string.
  #[must_use] pub fn as_str(self) -> String {
    with_interner(|i| i.strings[self.0 as usize].clone())
  }
}

#[derive(Default)]
struct Interner {
  strings: Vec<String>,
  ids: HashMap<String, Symbol>,
}

impl Interner {
  fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.ids.get(s) {
      return sym;
    }
    let id = Symbol(u32::try_from(self.strings.len()).expect("symbol table overflow"));
    self.strings.push(s.to_owned());
    self.ids.insert(s.to_owned(), id);
    id
  }
}

thread_local! {
  static INTERNER: RefCell<Interner> = RefCell::new(Interner::default());
}

fn with_interner<R>(f: impl FnOnce(&Interner) -> R) -> R {
  INTERNER.with(|cell| f(&cell.borrow()))
}

/// Interns `s`, returning a [`Symbol`] that compares equal to every other
/// interning of the same text.
pub fn intern(s: &str) -> Symbol {
  INTERNER.with(|cell| cell.borrow_mut().intern(s))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_text_interns_to_same_symbol() {
    assert_eq!(intern("foo"), intern("foo"));
    assert_ne!(intern("foo"), intern("bar"));
  }

  #[test]
  fn round_trips_through_as_str() {
    let sym = intern("some_field_name");
    assert_eq!(sym.as_str(), "some_field_name");
  }
}
