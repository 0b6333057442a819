//! Structural constraints (§4.F): the checks that don't fit the type
//! checker, the bounds pass, or attribute validation -- array shape
//! rules, bits-type size caps, field/type size reconciliation, external
//! `static_requirements`, enum representability, constant-reference
//! validity, 64-bit range safety, and reserved-word collisions.

use hashbrown::HashMap;

use crate::diagnostic::{Diagnostic, PassResult, SourceLocation};
use crate::ir::attr::AttributeValue;
use crate::ir::expr::{Bound, Expression, ExpressionKind, ExpressionType, Operator};
use crate::ir::field::{Field, FieldKind};
use crate::ir::module::{EmbossIr, Entity, Module};
use crate::ir::names::CanonicalName;
use crate::ir::types::{AddressableUnit, ArraySize, ArrayType, AtomicType, Type, TypeDefinition, TypeDefinitionKind, TypeRefKind};
use crate::passes::bounds;
use crate::reserved_words;

pub fn run(ir: &mut EmbossIr) -> PassResult<()> {
  let snapshot = ir.clone();
  let mut errors = Vec::new();
  for module in &snapshot.modules {
    check_module(module, &snapshot, &mut errors);
  }
  if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_module(module: &Module, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  for ty in &module.types {
    check_type(module, ty, ir, errors);
  }
}

fn check_type(module: &Module, ty: &TypeDefinition, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  check_reserved_name(module, ty.name.name.object_path.last(), ty.name.location, errors);
  match &ty.kind {
    TypeDefinitionKind::Structure(structure) => {
      if ty.addressable_unit == AddressableUnit::Bit {
        check_bits_type(module, ty, ir, errors);
      }
      for field in &structure.fields {
        check_field(module, ty, field, ir, errors);
      }
    }
    TypeDefinitionKind::Enum(e) => {
      let (maximum_bits, is_signed) = enum_width(ty);
      for value in &e.values {
        check_reserved_name(module, value.name.name.object_path.last(), value.name.location, errors);
        check_enum_value_range(module, value, maximum_bits, is_signed, errors);
        check_constant_reference_targets(module, &value.value, ir, errors);
        check_64_bit_safety(module, &value.value, errors);
      }
    }
    TypeDefinitionKind::External(_) => check_external_static_requirements(module, ty, ir, errors),
  }
  for sub in &ty.subtypes {
    check_type(module, sub, ir, errors);
  }
}

fn check_reserved_name(module: &Module, name: Option<&String>, location: SourceLocation, errors: &mut Vec<Diagnostic>) {
  let Some(name) = name else { return };
  if let Some(language) = reserved_words::reserving_language(name) {
    errors.push(Diagnostic::new(module.source_file_name.clone(), location, format!("'{name}' is a reserved word in {language}")));
  }
}

fn attr_i128(ty: &TypeDefinition, name: &str) -> Option<i128> {
  ty.attributes.iter().find(|a| a.back_end.is_none() && a.name == name).and_then(|a| a.value.as_expression()).and_then(Expression::constant_value)
}

fn attr_bool(ty: &TypeDefinition, name: &str) -> Option<bool> {
  ty.attributes.iter().find(|a| a.back_end.is_none() && a.name == name).and_then(|a| a.value.as_expression()).and_then(Expression::constant_bool)
}

/// `(maximum_bits, is_signed)`, falling back to the §4.E defaults in case
/// this pass runs against an IR where the attribute normalizer hasn't
/// (yet) inserted them, e.g. a hand-built test fixture.
fn enum_width(ty: &TypeDefinition) -> (i128, bool) {
  (attr_i128(ty, "maximum_bits").unwrap_or(64), attr_bool(ty, "is_signed").unwrap_or(false))
}

fn check_enum_value_range(module: &Module, value: &crate::ir::types::EnumValue, maximum_bits: i128, is_signed: bool, errors: &mut Vec<Diagnostic>) {
  let Some(v) = value.value.constant_value() else { return };
  let (min, max) = if is_signed { (-(1i128 << (maximum_bits - 1)), (1i128 << (maximum_bits - 1)) - 1) } else { (0, (1i128 << maximum_bits) - 1) };
  if v < min || v > max {
    let kind = if is_signed { "signed" } else { "unsigned" };
    errors.push(Diagnostic::new(module.source_file_name.clone(), value.value.location, format!("Value {v} is out of range for {maximum_bits}-bit {kind} enumeration.")));
  }
}

fn check_external_static_requirements(module: &Module, ty: &TypeDefinition, _ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  let Some(requirement) = ty.attributes.iter().find(|a| a.back_end.is_none() && a.name == "static_requirements") else { return };
  let Some(expr) = requirement.value.as_expression() else { return };
  // `static_requirements` is re-evaluated at each use site with
  // `$is_statically_sized`/`$static_size_in_bits` bound to that site's
  // facts; this pass only confirms the declaration itself type-checked to
  // boolean (use-site re-evaluation happens in `check_atomic_static_requirements`
  // below, called from every atomic-type use site). Exempt from the 64-bit
  // safety sweep (§4.F "Attribute `[static_requirements]` evaluation is
  // exempt"): it is only ever evaluated at compile time.
  if expr.constant_bool().is_none() && !matches!(expr.ty, ExpressionType::Boolean { .. }) {
    errors.push(Diagnostic::new(module.source_file_name.clone(), requirement.location, format!("[static_requirements] on '{}' must be a boolean expression", ty.name.name.object_path.join("."))));
  }
}

fn check_field(module: &Module, parent: &TypeDefinition, field: &Field, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  check_reserved_name(module, field.name.name.object_path.last(), field.name.location, errors);
  if let Some(cond) = &field.existence_condition {
    check_constant_reference_targets(module, cond, ir, errors);
    check_64_bit_safety(module, cond, errors);
  }
  match &field.kind {
    FieldKind::Physical { location, type_ref } => {
      check_constant_reference_targets(module, &location.start, ir, errors);
      check_constant_reference_targets(module, &location.size, ir, errors);
      check_64_bit_safety(module, &location.start, errors);
      check_64_bit_safety(module, &location.size, errors);
      check_type_ref(module, parent, type_ref, ir, errors, true);
      reconcile_field_size(module, parent, field, location, type_ref, ir, errors);
      check_static_requirements_use_site(module, type_ref, ir, errors);
    }
    FieldKind::Virtual { read_transform } => {
      check_constant_reference_targets(module, read_transform, ir, errors);
      check_64_bit_safety(module, read_transform, errors);
    }
  }
}

fn check_type_ref(module: &Module, parent: &TypeDefinition, type_ref: &Type, ir: &EmbossIr, errors: &mut Vec<Diagnostic>, outermost: bool) {
  match &type_ref.kind {
    TypeRefKind::Atomic(_) => {}
    TypeRefKind::Array(array) => check_array(module, parent, array, type_ref.location, ir, errors, outermost),
  }
}

fn check_array(module: &Module, parent: &TypeDefinition, array: &ArrayType, location: SourceLocation, ir: &EmbossIr, errors: &mut Vec<Diagnostic>, outermost: bool) {
  match &array.size {
    ArraySize::Automatic if !outermost => {
      errors.push(Diagnostic::new(module.source_file_name.clone(), location, "an omitted array dimension ('[]') is only allowed on the outermost array"));
    }
    ArraySize::Constant(size) => {
      check_constant_reference_targets(module, size, ir, errors);
      check_64_bit_safety(module, size, errors);
      if !outermost && size.constant_value().is_none() {
        errors.push(Diagnostic::new(module.source_file_name.clone(), size.location, "a non-outermost array dimension must be a constant"));
      }
    }
    ArraySize::Automatic => {}
  }
  let element_size = type_size_bits(&array.element, ir);
  if element_size.is_none() {
    errors.push(Diagnostic::new(module.source_file_name.clone(), array.element.location, "array element type must be fixed-size"));
  }
  if parent.addressable_unit == AddressableUnit::Byte {
    if let Some(size) = element_size {
      if size % 8 != 0 {
        errors.push(Diagnostic::new(module.source_file_name.clone(), array.element.location, "array elements in a struct must have a size that is a multiple of 8 bits"));
      }
    }
  } else if matches!(&array.element.kind, TypeRefKind::Array(_)) {
    errors.push(Diagnostic::new(module.source_file_name.clone(), array.element.location, "nested arrays are not allowed inside a bits type"));
  }
  check_type_ref(module, parent, &array.element, ir, errors, false);
}

/// The statically-known bit size of a type use, if any: an explicit
/// `:N`/`size_in_bits` wins; otherwise the referent's native fixed size
/// (an external's `fixed_size_in_bits`, or a structure's computed
/// `fixed_size_in_bits`); an array's size is its element size times a
/// constant element count.
fn type_size_bits(type_ref: &Type, ir: &EmbossIr) -> Option<i128> {
  if let Some(explicit) = &type_ref.size_in_bits {
    if let Some(v) = bounds::try_constant_fold(explicit, ir) {
      return Some(v);
    }
  }
  match &type_ref.kind {
    TypeRefKind::Atomic(atomic) => native_fixed_size(atomic, ir),
    TypeRefKind::Array(array) => {
      let element = type_size_bits(&array.element, ir)?;
      match &array.size {
        ArraySize::Constant(count) => Some(element * bounds::try_constant_fold(count, ir)?),
        ArraySize::Automatic => None,
      }
    }
  }
}

fn native_fixed_size(atomic: &AtomicType, ir: &EmbossIr) -> Option<i128> {
  let name = atomic.reference.canonical_name.as_ref()?;
  let def = ir.find_type(name)?;
  match &def.kind {
    TypeDefinitionKind::External(_) => attr_i128(def, "fixed_size_in_bits"),
    TypeDefinitionKind::Structure(_) => attr_i128(def, "fixed_size_in_bits"),
    TypeDefinitionKind::Enum(_) => None,
  }
}

/// Reconciles a physical field's three candidate sizes (§4.F "Field/type
/// size reconciliation"): the field's own `(start, size)` location (in
/// addressable units of `parent`, converted to bits), the type's
/// explicit `size_in_bits`, and the type's natively-fixed size.
fn reconcile_field_size(module: &Module, parent: &TypeDefinition, field: &Field, location: &crate::ir::field::FieldLocation, type_ref: &Type, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  let unit_bits = i128::from(parent.addressable_unit.bits());
  let field_size_bits = bounds::try_constant_fold(&location.size, ir).map(|units| units * unit_bits);
  let explicit_size_bits = type_ref.size_in_bits.as_ref().and_then(|e| bounds::try_constant_fold(e, ir));
  let native_size_bits = match &type_ref.kind {
    TypeRefKind::Atomic(atomic) => native_fixed_size(atomic, ir),
    TypeRefKind::Array(_) => None, // arrays are reconciled independently, by element
  };
  let mut candidates: Vec<(&str, i128)> = Vec::new();
  if let Some(v) = field_size_bits {
    candidates.push(("the field's location", v));
  }
  if let Some(v) = explicit_size_bits {
    candidates.push(("the type's explicit size", v));
  }
  if let Some(v) = native_size_bits {
    candidates.push(("the type's native fixed size", v));
  }
  if let Some((first_label, first_value)) = candidates.first().copied() {
    for &(label, value) in &candidates[1..] {
      if value != first_value {
        errors.push(
          Diagnostic::new(module.source_file_name.clone(), location.size.location, format!("field '{}' size disagreement: {first_label} says {first_value} bits but {label} says {value} bits", field.name.name.object_path.join("."))).with_note(module.source_file_name.clone(), type_ref.location, "type used here"),
        );
      }
    }
  }
  if let TypeRefKind::Atomic(atomic) = &type_ref.kind {
    if let Some(referent) = &atomic.reference.canonical_name {
      if let Some(def) = ir.find_type(referent) {
        if let TypeDefinitionKind::Enum(_) = &def.kind {
          let (maximum_bits, _) = enum_width(def);
          if let Some(width) = first_candidate(&candidates) {
            if width < 1 || width > maximum_bits {
              errors.push(Diagnostic::new(module.source_file_name.clone(), location.size.location, format!("enumeration field width {width} is out of range [1, {maximum_bits}]")));
            }
          }
        }
      }
    }
  }
}

fn first_candidate(candidates: &[(&str, i128)]) -> Option<i128> {
  candidates.first().map(|&(_, v)| v)
}

fn check_bits_type(module: &Module, ty: &TypeDefinition, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  match attr_i128(ty, "fixed_size_in_bits") {
    Some(size) if size <= 64 => {}
    Some(size) => errors.push(Diagnostic::new(module.source_file_name.clone(), ty.name.location, format!("a bits type must be at most 64 bits, got {size}"))),
    None => errors.push(Diagnostic::new(module.source_file_name.clone(), ty.name.location, "a bits type must have a fixed size")),
  }
  if let Some(structure) = ty.as_structure() {
    for field in &structure.fields {
      if let FieldKind::Physical { type_ref, .. } = &field.kind {
        if let Some(atomic) = type_ref.innermost_atomic() {
          if let Some(name) = &atomic.reference.canonical_name {
            if let Some(def) = ir.find_type(name) {
              if def.addressable_unit == AddressableUnit::Byte {
                errors.push(Diagnostic::new(module.source_file_name.clone(), type_ref.location, format!("byte-addressable type '{}' cannot be used inside a bits type", name.object_path.join("."))));
              }
            }
          }
        }
      }
    }
  }
}

/// Re-evaluates an external's `[static_requirements]` at one use site,
/// binding `$is_statically_sized`/`$static_size_in_bits` to the facts
/// known at that site (§4.F).
fn check_static_requirements_use_site(module: &Module, type_ref: &Type, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  let Some(atomic) = type_ref.as_atomic() else { return };
  let Some(referent) = &atomic.reference.canonical_name else { return };
  let Some(def) = ir.find_type(referent) else { return };
  let Some(requirement) = def.attributes.iter().find(|a| a.back_end.is_none() && a.name == "static_requirements") else { return };
  let Some(AttributeValue::Expression(expr)) = requirement.value.as_expression().map(|e| AttributeValue::Expression(e.clone())) else { return };
  let size = type_size_bits(type_ref, ir);
  let is_statically_sized = size.is_some();
  let mut bound_cache = HashMap::new();
  let satisfied = evaluate_static_requirement(&expr, is_statically_sized, size, ir, &mut bound_cache);
  if satisfied == Some(false) {
    errors.push(Diagnostic::new(
      module.source_file_name.clone(),
      type_ref.location,
      format!("'{}' does not satisfy its [static_requirements] at this use site", referent.object_path.join(".")),
    ));
  }
}

fn evaluate_static_requirement(expr: &Expression, is_statically_sized: bool, static_size: Option<i128>, ir: &EmbossIr, cache: &mut HashMap<CanonicalName, ExpressionType>) -> Option<bool> {
  match &expr.kind {
    ExpressionKind::BooleanConstant(b) => Some(*b),
    ExpressionKind::BuiltinReference(crate::ir::expr::Builtin::IsStaticallySized) => Some(is_statically_sized),
    ExpressionKind::BuiltinReference(crate::ir::expr::Builtin::StaticSizeInBits) => None, // only meaningful inside a comparison
    ExpressionKind::Function { operator: Operator::And, args } => Some(evaluate_static_requirement(&args[0], is_statically_sized, static_size, ir, cache)? && evaluate_static_requirement(&args[1], is_statically_sized, static_size, ir, cache)?),
    ExpressionKind::Function { operator: Operator::Or, args } => Some(evaluate_static_requirement(&args[0], is_statically_sized, static_size, ir, cache)? || evaluate_static_requirement(&args[1], is_statically_sized, static_size, ir, cache)?),
    ExpressionKind::Function { operator: op @ (Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge), args } => {
      let lhs = static_size_operand(&args[0], static_size)?;
      let rhs = static_size_operand(&args[1], static_size)?;
      Some(match op {
        Operator::Eq => lhs == rhs,
        Operator::Ne => lhs != rhs,
        Operator::Lt => lhs < rhs,
        Operator::Le => lhs <= rhs,
        Operator::Gt => lhs > rhs,
        Operator::Ge => lhs >= rhs,
        _ => unreachable!(),
      })
    }
    _ => {
      let _ = cache; // reserved for future constant-reference support in static_requirements
      None
    }
  }
}

fn static_size_operand(expr: &Expression, static_size: Option<i128>) -> Option<i128> {
  match &expr.kind {
    ExpressionKind::NumericConstant(v) => Some(*v),
    ExpressionKind::BuiltinReference(crate::ir::expr::Builtin::StaticSizeInBits) => static_size,
    _ => None,
  }
}

/// Every `constant_reference` must resolve to a constant-typed entity
/// (an enum value or a virtual field); non-constant targets (physical
/// fields, parameters) are rejected.
fn check_constant_reference_targets(module: &Module, expr: &Expression, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  match &expr.kind {
    ExpressionKind::ConstantReference(r) => {
      if let Some(name) = &r.canonical_name {
        match ir.find(name) {
          Some(Entity::EnumValue(_)) => {}
          Some(Entity::Field(field)) if field.is_virtual() => {}
          Some(Entity::Field(_)) => {
            errors.push(
              Diagnostic::new(module.source_file_name.clone(), expr.location, format!("'{}' is a physical field and cannot be used as a constant reference", name.object_path.join(".")))
                .with_note(name.module_file.clone(), SourceLocation::synthetic(), "declared here"),
            );
          }
          _ => {
            errors.push(Diagnostic::new(module.source_file_name.clone(), expr.location, format!("'{}' does not name a constant", name.object_path.join("."))));
          }
        }
      }
    }
    ExpressionKind::Function { args, .. } => {
      for arg in args {
        check_constant_reference_targets(module, arg, ir, errors);
      }
    }
    _ => {}
  }
}

const I64_MIN: i128 = i64::MIN as i128;
const I64_MAX: i128 = i64::MAX as i128;
const U64_MAX: i128 = u64::MAX as i128;

fn fits_i64(min: Bound, max: Bound) -> bool {
  matches!(min, Bound::Finite(m) if m >= I64_MIN) && matches!(max, Bound::Finite(m) if m <= I64_MAX)
}

fn fits_u64(min: Bound, max: Bound) -> bool {
  matches!(min, Bound::Finite(m) if m >= 0) && matches!(max, Bound::Finite(m) if m <= U64_MAX)
}

/// Walks `expr` post-order; for every non-constant integer `Function`
/// node, checks that the node and its non-constant integer arguments can
/// all agree on a single 64-bit range (all-unsigned or all-signed), per
/// §4.F "64-bit integer safety". Constant subexpressions are exempt: they
/// may overflow transiently so long as the final folded value fits.
fn check_64_bit_safety(module: &Module, expr: &Expression, errors: &mut Vec<Diagnostic>) {
  if let ExpressionKind::Function { args, operator } = &expr.kind {
    for arg in args {
      check_64_bit_safety(module, arg, errors);
    }
    if let ExpressionType::Integer(bounds) = &expr.ty {
      if !bounds.is_constant() {
        let mut offenders: Vec<&Expression> = vec![expr];
        for arg in args {
          if let ExpressionType::Integer(arg_bounds) = &arg.ty {
            if !arg_bounds.is_constant() {
              offenders.push(arg);
            }
          }
        }
        let all_u64 = offenders.iter().all(|e| match &e.ty {
          ExpressionType::Integer(b) => fits_u64(b.minimum_value, b.maximum_value),
          _ => false,
        });
        let all_i64 = offenders.iter().all(|e| match &e.ty {
          ExpressionType::Integer(b) => fits_i64(b.minimum_value, b.maximum_value),
          _ => false,
        });
        if !all_u64 && !all_i64 {
          let mut diag = Diagnostic::new(
            module.source_file_name.clone(),
            expr.location,
            format!("either all arguments to '{}' and its result must fit in a 64-bit unsigned integer, or all must fit in a 64-bit signed integer", operator.spelling()),
          );
          for offender in &offenders[1..] {
            diag = diag.with_note(module.source_file_name.clone(), offender.location, "offending operand here");
          }
          errors.push(diag);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::expr::{IntegerBounds, Modulus};

  #[test]
  fn enum_value_out_of_declared_range_is_rejected() {
    let loc = SourceLocation::synthetic();
    let module = Module { source_file_name: "m.emb".to_string(), ..Module::default() };
    let value = crate::ir::types::EnumValue {
      name: crate::ir::names::NameDefinition::new(CanonicalName::new("m.emb", vec!["E".to_string(), "BIG".to_string()]), loc),
      value: Expression::numeric_constant(256, loc),
      docs: Vec::new(),
      attributes: Vec::new(),
    };
    let mut errors = Vec::new();
    check_enum_value_range(&module, &value, 8, false, &mut errors);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("256"));
  }

  #[test]
  fn mixed_sign_64_bit_overflow_is_rejected() {
    let loc = SourceLocation::synthetic();
    let module = Module { source_file_name: "m.emb".to_string(), ..Module::default() };
    let mut huge_unsigned = Expression::numeric_constant(0, loc);
    huge_unsigned.ty = ExpressionType::Integer(IntegerBounds { modulus: Modulus::Finite(1), modular_value: 0, minimum_value: Bound::Finite(0), maximum_value: Bound::Finite(U64_MAX) });
    let mut negative = Expression::numeric_constant(0, loc);
    negative.ty = ExpressionType::Integer(IntegerBounds { modulus: Modulus::Finite(1), modular_value: 0, minimum_value: Bound::Finite(I64_MIN), maximum_value: Bound::Finite(0) });
    let mut sum = Expression::function(Operator::Add, vec![huge_unsigned, negative], loc);
    sum.ty = ExpressionType::Integer(IntegerBounds { modulus: Modulus::Finite(1), modular_value: 0, minimum_value: Bound::Finite(I64_MIN), maximum_value: Bound::Finite(U64_MAX) });
    let mut errors = Vec::new();
    check_64_bit_safety(&module, &sum, &mut errors);
    assert_eq!(errors.len(), 1);
  }
}
