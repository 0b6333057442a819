//! Expressions, their types, and the bound metadata attached by the
//! expression-bounds pass (§3 "Expressions", §4.D).

use crate::diagnostic::SourceLocation;
use crate::ir::names::{CanonicalName, FieldReference, Reference};

/// An integer, lifted with the two points at (positive and negative)
/// infinity needed by the bounds lattice (§4.D). All internal arithmetic is
/// performed with `i128`, which comfortably holds the full `[-2^63, 2^64)`
/// range the spec requires plus headroom for intermediate products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Bound {
  NegInfinity,
  Finite(i128),
  PosInfinity,
}

impl Bound {
  #[must_use] pub fn finite(self) -> Option<i128> {
    match self {
      Bound::Finite(v) => Some(v),
      _ => None,
    }
  }

  #[must_use] pub fn is_infinite(self) -> bool {
    !matches!(self, Bound::Finite(_))
  }
}

/// The modulus half of a modular-congruence pair. `Infinity` means the
/// expression is compile-time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Modulus {
  Finite(u128),
  Infinity,
}

/// The bound metadata attached to every integer [`Expression`] by §4.D.
/// Invariants (checked by [`IntegerBounds::debug_assert_valid`], enforced
/// as debug asserts per §3):
/// - when `modulus` is finite, `minimum_value` and `maximum_value`, if
///   finite, are congruent to `modular_value` mod `modulus`;
/// - `minimum_value <= maximum_value`;
/// - if `minimum_value == maximum_value` then `modulus == Infinity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IntegerBounds {
  pub modulus: Modulus,
  pub modular_value: i128,
  pub minimum_value: Bound,
  pub maximum_value: Bound,
}

impl IntegerBounds {
  #[must_use] pub fn constant(value: i128) -> Self {
    IntegerBounds {
      modulus: Modulus::Infinity,
      modular_value: value,
      minimum_value: Bound::Finite(value),
      maximum_value: Bound::Finite(value),
    }
  }

  #[must_use] pub fn unbounded() -> Self {
    IntegerBounds {
      modulus: Modulus::Finite(1),
      modular_value: 0,
      minimum_value: Bound::NegInfinity,
      maximum_value: Bound::PosInfinity,
    }
  }

  #[must_use] pub fn is_constant(&self) -> bool {
    matches!(self.modulus, Modulus::Infinity)
  }

  /// Debug-asserts the §3 integer-bounds invariants.
  pub fn debug_assert_valid(&self) {
    match self.modulus {
      Modulus::Infinity => {
        debug_assert_eq!(self.minimum_value, Bound::Finite(self.modular_value));
        debug_assert_eq!(self.maximum_value, Bound::Finite(self.modular_value));
      }
      Modulus::Finite(m) => {
        debug_assert!(m > 0);
        if let Bound::Finite(min) = self.minimum_value {
          debug_assert_eq!(min.rem_euclid(m as i128), self.modular_value.rem_euclid(m as i128));
        }
        if let Bound::Finite(max) = self.maximum_value {
          debug_assert_eq!(max.rem_euclid(m as i128), self.modular_value.rem_euclid(m as i128));
        }
      }
    }
    debug_assert!(self.minimum_value <= self.maximum_value);
    if self.minimum_value == self.maximum_value {
      debug_assert!(matches!(self.modulus, Modulus::Infinity));
    }
  }
}

/// The well-known builtin values referenceable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Builtin {
  /// `$static_size_in_bits`
  StaticSizeInBits,
  /// `$is_statically_sized`
  IsStaticallySized,
  /// `$logical_value`, valid only inside a synthesized write-transform.
  LogicalValue,
}

/// The function-valued operators of the expression language (§3, §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Operator {
  Add,
  Sub,
  Mul,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  And,
  Or,
  Choice,
  Max,
  Has,
  UpperBound,
  LowerBound,
}

impl Operator {
  /// The display form used in error messages (§7 scenario 6).
  #[must_use] pub fn spelling(self) -> &'static str {
    match self {
      Operator::Add => "+",
      Operator::Sub => "-",
      Operator::Mul => "*",
      Operator::Eq => "==",
      Operator::Ne => "!=",
      Operator::Lt => "<",
      Operator::Le => "<=",
      Operator::Gt => ">",
      Operator::Ge => ">=",
      Operator::And => "&&",
      Operator::Or => "||",
      Operator::Choice => "?:",
      Operator::Max => "$max",
      Operator::Has => "$has",
      Operator::UpperBound => "$upper_bound",
      Operator::LowerBound => "$lower_bound",
    }
  }
}

/// The kind an [`Expression`] was assigned by the type checker (§4.C).
/// `Opaque` appears only for non-virtual field references whose physical
/// type is not integer/boolean/enumeration (§8 "Universal invariants").
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExpressionType {
  Integer(IntegerBounds),
  Boolean { constant_value: Option<bool> },
  Enumeration { enum_name: CanonicalName, constant_value: Option<i128> },
  Opaque,
  /// The type checker has not yet visited this node.
  Unresolved,
}

impl ExpressionType {
  #[must_use] pub fn kind_name(&self) -> &'static str {
    match self {
      ExpressionType::Integer(_) => "integer",
      ExpressionType::Boolean { .. } => "boolean",
      ExpressionType::Enumeration { .. } => "enumeration",
      ExpressionType::Opaque => "opaque",
      ExpressionType::Unresolved => "unresolved",
    }
  }

  #[must_use] pub fn as_integer(&self) -> Option<&IntegerBounds> {
    match self {
      ExpressionType::Integer(b) => Some(b),
      _ => None,
    }
  }

  #[must_use] pub fn as_integer_mut(&mut self) -> Option<&mut IntegerBounds> {
    match self {
      ExpressionType::Integer(b) => Some(b),
      _ => None,
    }
  }
}

/// The leaf and function forms an [`Expression`] can take (§3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ExpressionKind {
  NumericConstant(i128),
  BooleanConstant(bool),
  /// A reference to an enum value or a virtual field, used in a
  /// compile-time-constant position.
  ConstantReference(Reference),
  /// A reference to a field's runtime value.
  FieldReference(FieldReference),
  BuiltinReference(Builtin),
  Function { operator: Operator, args: Vec<Expression> },
}

/// An expression node. Every expression carries an [`ExpressionType`] (set
/// by the type checker) and, if integer, the bound metadata set by the
/// expression-bounds pass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Expression {
  pub kind: ExpressionKind,
  pub location: SourceLocation,
  pub ty: ExpressionType,
}

impl Expression {
  #[must_use] pub fn new(kind: ExpressionKind, location: SourceLocation) -> Self {
    Expression { kind, location, ty: ExpressionType::Unresolved }
  }

  #[must_use] pub fn numeric_constant(value: i128, location: SourceLocation) -> Self {
    let mut expr = Expression::new(ExpressionKind::NumericConstant(value), location);
    expr.ty = ExpressionType::Integer(IntegerBounds::constant(value));
    expr
  }

  #[must_use] pub fn boolean_constant(value: bool, location: SourceLocation) -> Self {
    let mut expr = Expression::new(ExpressionKind::BooleanConstant(value), location);
    expr.ty = ExpressionType::Boolean { constant_value: Some(value) };
    expr
  }

  #[must_use] pub fn function(operator: Operator, args: Vec<Expression>, location: SourceLocation) -> Self {
    Expression::new(ExpressionKind::Function { operator, args }, location)
  }

  /// `true` if this expression's value is known at compile time: numeric
  /// and boolean constants, and any expression whose computed bounds pin
  /// it to a single integer value.
  #[must_use] pub fn is_constant(&self) -> bool {
    match &self.ty {
      ExpressionType::Integer(bounds) => bounds.is_constant(),
      ExpressionType::Boolean { constant_value } => constant_value.is_some(),
      ExpressionType::Enumeration { constant_value, .. } => constant_value.is_some(),
      ExpressionType::Opaque | ExpressionType::Unresolved => false,
    }
  }

  /// Returns the constant integer value of this expression, if any.
  #[must_use] pub fn constant_value(&self) -> Option<i128> {
    match &self.ty {
      ExpressionType::Integer(bounds) if bounds.is_constant() => Some(bounds.modular_value),
      ExpressionType::Enumeration { constant_value, .. } => *constant_value,
      _ => None,
    }
  }

  #[must_use] pub fn constant_bool(&self) -> Option<bool> {
    match &self.ty {
      ExpressionType::Boolean { constant_value } => *constant_value,
      _ => None,
    }
  }

  /// Direct children, in source order, for the preorder walker (§4.A).
  #[must_use] pub fn children(&self) -> &[Expression] {
    match &self.kind {
      ExpressionKind::Function { args, .. } => args,
      _ => &[],
    }
  }

  #[must_use] pub fn children_mut(&mut self) -> &mut [Expression] {
    match &mut self.kind {
      ExpressionKind::Function { args, .. } => args,
      _ => &mut [],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn constant_bounds_are_self_consistent() {
    let expr = Expression::numeric_constant(42, SourceLocation::synthetic());
    let bounds = expr.ty.as_integer().expect("integer type");
    bounds.debug_assert_valid();
    assert!(bounds.is_constant());
    assert_eq!(expr.constant_value(), Some(42));
  }
}
