//! Names: canonical identity, definitions, and references (§3 "Names").

use crate::diagnostic::SourceLocation;
use crate::symbol::Symbol;

/// The globally unique identifier of any user-visible entity: a module file
/// name plus a dotted path of identifiers within it. The prelude uses the
/// empty module-file string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CanonicalName {
  pub module_file: String,
  pub object_path: Vec<String>,
}

impl CanonicalName {
  #[must_use] pub fn new(module_file: impl Into<String>, object_path: Vec<String>) -> Self {
    CanonicalName { module_file: module_file.into(), object_path }
  }

  /// Returns the canonical name of a child of `self`, e.g. the field `x`
  /// of structure `Foo` in `a.emb` is `Foo.canonical().child("x")`.
  #[must_use] pub fn child(&self, name: impl Into<String>) -> Self {
    let mut object_path = self.object_path.clone();
    object_path.push(name.into());
    CanonicalName { module_file: self.module_file.clone(), object_path }
  }

  #[must_use] pub fn is_prelude(&self) -> bool {
    self.module_file.is_empty()
  }
}

/// Attaches a canonical name to the object that owns it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NameDefinition {
  pub name: CanonicalName,
  pub location: SourceLocation,
  /// Names hidden outside their immediate scope, e.g. the field names of
  /// an inline anonymous `bits:`/`struct:` block.
  pub is_anonymous: bool,
}

impl NameDefinition {
  #[must_use] pub fn new(name: CanonicalName, location: SourceLocation) -> Self {
    NameDefinition { name, location, is_anonymous: false }
  }

  #[must_use] pub fn anonymous(mut self) -> Self {
    self.is_anonymous = true;
    self
  }
}

/// A reference to a name, as written by the user (`source_name`, possibly
/// through an import alias), resolved by the symbol resolver to a
/// [`CanonicalName`]. Resolution results are cached on the reference so
/// later passes never re-resolve.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Reference {
  pub source_name: Vec<Symbol>,
  pub location: SourceLocation,
  /// Set for references to inline-defined types, where scope lookup stops
  /// at the first match rather than treating same-named siblings in outer
  /// scopes as an ambiguity (§4.B phase 2, step 3).
  pub is_local_name: bool,
  pub canonical_name: Option<CanonicalName>,
}

impl Reference {
  #[must_use] pub fn new(source_name: Vec<Symbol>, location: SourceLocation) -> Self {
    Reference { source_name, location, is_local_name: false, canonical_name: None }
  }

  #[must_use] pub fn is_resolved(&self) -> bool {
    self.canonical_name.is_some()
  }
}

/// A nonempty ordered path of references representing a dotted member
/// access such as `a.b.c`. The head is resolved by the symbol resolver
/// (§4.B phase 2); the tail is resolved by the dedicated member-access
/// pass (§4.B phase 3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FieldReference {
  pub path: Vec<Reference>,
  pub location: SourceLocation,
}

impl FieldReference {
  /// Builds a `FieldReference`. Panics if `path` is empty: a
  /// `FieldReference` with no components cannot occur in a parsed
  /// program, so an empty path here is an internal-error bug, not a user
  /// error (§7 "Internal errors").
  #[must_use] pub fn new(path: Vec<Reference>, location: SourceLocation) -> Self {
    assert!(!path.is_empty(), "FieldReference must be nonempty");
    FieldReference { path, location }
  }

  #[must_use] pub fn head(&self) -> &Reference {
    &self.path[0]
  }

  #[must_use] pub fn tail(&self) -> &[Reference] {
    &self.path[1..]
  }

  #[must_use] pub fn last(&self) -> &Reference {
    self.path.last().expect("FieldReference is nonempty by construction")
  }

  /// `true` once every element of the path has a resolved canonical name.
  #[must_use] pub fn is_fully_resolved(&self) -> bool {
    self.path.iter().all(Reference::is_resolved)
  }
}
