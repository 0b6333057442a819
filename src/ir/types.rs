//! Type definitions and type references (§3 "Types").

use crate::diagnostic::SourceLocation;
use crate::ir::attr::Attribute;
use crate::ir::expr::Expression;
use crate::ir::field::{Field, RuntimeParameter};
use crate::ir::names::{NameDefinition, Reference};

/// The granularity at which a type is addressed in its backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AddressableUnit {
  Bit,
  Byte,
}

impl AddressableUnit {
  #[must_use] pub fn bits(self) -> u32 {
    match self {
      AddressableUnit::Bit => 1,
      AddressableUnit::Byte => 8,
    }
  }
}

/// An ordered list of fields, plus a dependency-ordered permutation used
/// for deterministic text serialization (fields that other fields'
/// `existence_condition`s or locations depend on must be read/written
/// first).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Structure {
  pub fields: Vec<Field>,
  /// Indexes into `fields`, in the order text (de)serialization should
  /// visit them.
  pub serialization_order: Vec<usize>,
}

/// One named, valued member of an [`Enum`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnumValue {
  pub name: NameDefinition,
  pub value: Expression,
  pub docs: Vec<String>,
  pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Enum {
  pub values: Vec<EnumValue>,
}

/// An opaque type implemented by the runtime support library. Only its
/// attributes (`addressable_unit_size`, `fixed_size_in_bits`, ...)
/// describe its size and arithmetic behavior; this is the mechanism by
/// which the prelude's primitives (`UInt`, `Int`, `Bcd`, `Flag`, `Byte`)
/// are declared.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct External;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum TypeDefinitionKind {
  Structure(Structure),
  Enum(Enum),
  External(External),
}

/// The common shell shared by all three kinds of type definition.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypeDefinition {
  pub name: NameDefinition,
  pub attributes: Vec<Attribute>,
  pub docs: Vec<String>,
  /// Inline-defined nested type definitions (anonymous `bits:`/`struct:`
  /// blocks, and named nested types).
  pub subtypes: Vec<TypeDefinition>,
  pub addressable_unit: AddressableUnit,
  pub runtime_parameters: Vec<RuntimeParameter>,
  pub kind: TypeDefinitionKind,
}

impl TypeDefinition {
  #[must_use] pub fn as_structure(&self) -> Option<&Structure> {
    match &self.kind {
      TypeDefinitionKind::Structure(s) => Some(s),
      _ => None,
    }
  }

  #[must_use] pub fn as_structure_mut(&mut self) -> Option<&mut Structure> {
    match &mut self.kind {
      TypeDefinitionKind::Structure(s) => Some(s),
      _ => None,
    }
  }

  #[must_use] pub fn as_enum(&self) -> Option<&Enum> {
    match &self.kind {
      TypeDefinitionKind::Enum(e) => Some(e),
      _ => None,
    }
  }

  #[must_use] pub fn as_enum_mut(&mut self) -> Option<&mut Enum> {
    match &mut self.kind {
      TypeDefinitionKind::Enum(e) => Some(e),
      _ => None,
    }
  }

  #[must_use] pub fn is_external(&self) -> bool {
    matches!(self.kind, TypeDefinitionKind::External(_))
  }

  #[must_use] pub fn is_bits(&self) -> bool {
    matches!(self.kind, TypeDefinitionKind::Structure(_)) && self.addressable_unit == AddressableUnit::Bit
  }
}

/// Either a constant field count, or "automatic" (use the containing
/// field's size), which is only legal on the outermost array dimension.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ArraySize {
  Constant(Expression),
  Automatic,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AtomicType {
  pub reference: Reference,
  pub runtime_arguments: Vec<Expression>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArrayType {
  pub element: Box<Type>,
  pub size: ArraySize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum TypeRefKind {
  Atomic(AtomicType),
  Array(ArrayType),
}

/// A use of a type, either atomic or an array, with an optional explicit
/// `size_in_bits` expression overriding the referent's native size.
///
/// Per the spec's open question (§9): an explicit `size_in_bits` on a
/// variable-size referent is accepted but silently ignored by this
/// implementation -- that preserves the original's observed (if perhaps
/// unintentional) behavior rather than guessing at a "fix".
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Type {
  pub kind: TypeRefKind,
  pub size_in_bits: Option<Expression>,
  pub location: SourceLocation,
}

impl Type {
  #[must_use] pub fn as_atomic(&self) -> Option<&AtomicType> {
    match &self.kind {
      TypeRefKind::Atomic(a) => Some(a),
      _ => None,
    }
  }

  #[must_use] pub fn as_array(&self) -> Option<&ArrayType> {
    match &self.kind {
      TypeRefKind::Array(a) => Some(a),
      _ => None,
    }
  }

  /// The innermost atomic type, unwrapping any number of array dimensions.
  #[must_use] pub fn innermost_atomic(&self) -> Option<&AtomicType> {
    match &self.kind {
      TypeRefKind::Atomic(a) => Some(a),
      TypeRefKind::Array(a) => a.element.innermost_atomic(),
    }
  }
}
