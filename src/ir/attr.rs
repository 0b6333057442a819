//! Attributes (§4.E).

use crate::diagnostic::SourceLocation;
use crate::ir::expr::Expression;

/// An attribute's value: either a literal string (e.g. `namespace`) or an
/// expression (e.g. `fixed_size_in_bits`, `requires`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AttributeValue {
  String(String),
  Expression(Expression),
}

impl AttributeValue {
  #[must_use] pub fn as_str(&self) -> Option<&str> {
    match self {
      AttributeValue::String(s) => Some(s),
      AttributeValue::Expression(_) => None,
    }
  }

  #[must_use] pub fn as_expression(&self) -> Option<&Expression> {
    match self {
      AttributeValue::Expression(e) => Some(e),
      AttributeValue::String(_) => None,
    }
  }
}

/// A name-value pair attached to a module, type, field, or enum value.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
  pub name: String,
  /// `Some("cpp")` for `(cpp) namespace = "x::y"`; `None` for unqualified
  /// attributes, which are always allowed regardless of
  /// `expected_back_ends`.
  pub back_end: Option<String>,
  /// Supplies a default value for descendant scopes (§4.E "Default
  /// inheritance").
  pub is_default: bool,
  pub value: AttributeValue,
  pub location: SourceLocation,
}

impl Attribute {
  #[must_use] pub fn new(name: impl Into<String>, value: AttributeValue, location: SourceLocation) -> Self {
    Attribute { name: name.into(), back_end: None, is_default: false, value, location }
  }

  #[must_use] pub fn qualified(mut self, back_end: impl Into<String>) -> Self {
    self.back_end = Some(back_end.into());
    self
  }

  #[must_use] pub fn defaulted(mut self) -> Self {
    self.is_default = true;
    self
  }

  /// `true` if `qualifier` (as written on a reference, e.g. `(cpp)`)
  /// matches this attribute's scope; an unqualified attribute name always
  /// matches since unqualified attributes apply to every back end.
  #[must_use] pub fn matches_back_end(&self, qualifier: Option<&str>) -> bool {
    match (&self.back_end, qualifier) {
      (None, _) => true,
      (Some(a), Some(b)) => a == b,
      (Some(_), None) => false,
    }
  }
}
