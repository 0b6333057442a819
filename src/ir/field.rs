//! Fields and runtime parameters (§3 "Fields").

use crate::ir::attr::Attribute;
use crate::ir::expr::Expression;
use crate::ir::names::{FieldReference, NameDefinition, Reference};
use crate::ir::types::{AtomicType, Type};
use crate::symbol::Symbol;

/// A physical field's `(start, size)` location, in addressable units of
/// the containing type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FieldLocation {
  pub start: Expression,
  pub size: Expression,
}

/// How a write through a view is realized for a virtual field (§4.G, §3
/// "Exactly one of `location` or `read_transform` is set").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum WriteMethod {
  /// Only valid for physical fields.
  Physical,
  ReadOnly,
  Alias(FieldReference),
  Transform { function_body: Expression, destination: FieldReference },
}

impl WriteMethod {
  #[must_use] pub fn is_writable(&self) -> bool {
    !matches!(self, WriteMethod::ReadOnly)
  }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum FieldKind {
  Physical { location: FieldLocation, type_ref: Type },
  Virtual { read_transform: Expression },
}

/// A field of a structure or bits type. Exactly one of `location` (via
/// [`FieldKind::Physical`]) or `read_transform` (via [`FieldKind::Virtual`])
/// is set.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Field {
  pub name: NameDefinition,
  /// A private short name, resolvable only within the field's own
  /// subexpressions (e.g. the keyword `this`'s sibling abbreviations).
  pub abbreviation: Option<Symbol>,
  pub docs: Vec<String>,
  pub attributes: Vec<Attribute>,
  /// A boolean expression gating the field's presence; `None` means
  /// "always present".
  pub existence_condition: Option<Expression>,
  /// Set by the write-method-inference pass (§4.G); `None` before that
  /// pass runs.
  pub write_method: Option<WriteMethod>,
  pub kind: FieldKind,
}

impl Field {
  #[must_use] pub fn is_virtual(&self) -> bool {
    matches!(self.kind, FieldKind::Virtual { .. })
  }

  #[must_use] pub fn is_physical(&self) -> bool {
    matches!(self.kind, FieldKind::Physical { .. })
  }

  #[must_use] pub fn location(&self) -> Option<&FieldLocation> {
    match &self.kind {
      FieldKind::Physical { location, .. } => Some(location),
      FieldKind::Virtual { .. } => None,
    }
  }

  #[must_use] pub fn read_transform(&self) -> Option<&Expression> {
    match &self.kind {
      FieldKind::Virtual { read_transform } => Some(read_transform),
      FieldKind::Physical { .. } => None,
    }
  }

  #[must_use] pub fn type_ref(&self) -> Option<&Type> {
    match &self.kind {
      FieldKind::Physical { type_ref, .. } => Some(type_ref),
      FieldKind::Virtual { .. } => None,
    }
  }
}

/// The declared type of a runtime parameter: either an integer (named via
/// a physical-type alias, e.g. `UInt:8`) or an enumeration without an
/// explicit bit size.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ParameterType {
  Integer(AtomicType),
  Enumeration(Reference),
}

/// A value supplied when constructing a parameterized view, used in field
/// locations or existence conditions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeParameter {
  pub name: NameDefinition,
  pub ty: ParameterType,
}
