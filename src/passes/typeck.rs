//! Type checker (§4.C).
//!
//! Validates every expression against the per-operator argument-kind
//! table, the top-level kind constraints (array element counts, field
//! locations, existence conditions, runtime-parameter declarations), and
//! the passed-parameter checks at `AtomicType` use sites. Runs before
//! [`crate::passes::bounds`], which is the pass that actually stores an
//! `ExpressionType` on every node -- kind *validation* and bounds
//! *computation* both need the same per-node dispatch over `ExpressionKind`,
//! so rather than writing every node's kind twice this pass recomputes its
//! own lightweight [`Kind`] locally (no bounds math, no mutation) purely to
//! drive diagnostics, and leaves the authoritative `ExpressionType` write
//! to the bounds pass that runs after it succeeds.

use crate::diagnostic::{Diagnostic, PassResult, SourceLocation};
use crate::ir::expr::{Expression, ExpressionKind, Operator};
use crate::ir::field::{Field, FieldKind, ParameterType};
use crate::ir::module::{EmbossIr, Entity, Module};
use crate::ir::names::CanonicalName;
use crate::ir::types::{ArraySize, AtomicType, TypeDefinition, TypeDefinitionKind, TypeRefKind};

/// A coarse expression kind, enough to check the operator table in §4.C.
/// Distinct from [`crate::ir::expr::ExpressionType`], which also carries
/// bounds/constant-value payload that this pass doesn't need.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
  Integer,
  Boolean,
  Enumeration(CanonicalName),
  Opaque,
  /// A builtin or reference that couldn't be pinned down (e.g.
  /// `$logical_value` outside a transform context, or an unresolved
  /// reference left by an earlier failed pass). Treated as "accept
  /// anything" so a downstream resolution failure doesn't cascade into a
  /// wall of spurious type errors.
  Unresolved,
}

impl Kind {
  fn same_family(&self, other: &Kind) -> bool {
    match (self, other) {
      (Kind::Unresolved, _) | (_, Kind::Unresolved) => true,
      (Kind::Enumeration(a), Kind::Enumeration(b)) => a == b,
      (Kind::Enumeration(_), _) | (_, Kind::Enumeration(_)) => false,
      (a, b) => a == b,
    }
  }
}

pub fn run(ir: &mut EmbossIr) -> PassResult<()> {
  let mut errors = Vec::new();
  let snapshot = ir.clone();
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
  for param in &ty.runtime_parameters {
    if let ParameterType::Integer(atomic) = &param.ty {
      if let Some(name) = &atomic.reference.canonical_name {
        let leaf = name.object_path.last().map(String::as_str);
        if !matches!(leaf, Some("UInt") | Some("Int")) {
          errors.push(Diagnostic::new(
            module.source_file_name.clone(),
            atomic.reference.location,
            format!("runtime parameter '{}' must be declared as an integer physical type (UInt/Int) or an enumeration, not '{}'", param.name.name.object_path.join("."), leaf.unwrap_or("?")),
          ));
        }
      }
      for arg in &atomic.runtime_arguments {
        check_expr(module, arg, ir, errors);
      }
    }
  }
  check_atomic_use_sites(module, ty, ir, errors);
  match &ty.kind {
    TypeDefinitionKind::Structure(structure) => {
      for field in &structure.fields {
        check_field(module, field, ir, errors);
      }
    }
    TypeDefinitionKind::Enum(e) => {
      for value in &e.values {
        check_expr(module, &value.value, ir, errors);
      }
    }
    TypeDefinitionKind::External(_) => {}
  }
  for sub in &ty.subtypes {
    check_type(module, sub, ir, errors);
  }
}

fn check_field(module: &Module, field: &Field, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  if let Some(cond) = &field.existence_condition {
    let kind = check_expr(module, cond, ir, errors);
    if !matches!(kind, Kind::Boolean | Kind::Unresolved) {
      errors.push(Diagnostic::new(module.source_file_name.clone(), cond.location, "[requires]/existence condition must be a boolean expression".to_string()));
    }
  }
  match &field.kind {
    FieldKind::Physical { location, type_ref } => {
      for (label, e) in [("start", &location.start), ("size", &location.size)] {
        let kind = check_expr(module, e, ir, errors);
        if !matches!(kind, Kind::Integer | Kind::Unresolved) {
          errors.push(Diagnostic::new(module.source_file_name.clone(), e.location, format!("field location '{label}' must be an integer expression")));
        }
      }
      check_type_ref(module, type_ref, ir, errors);
    }
    FieldKind::Virtual { read_transform } => {
      check_expr(module, read_transform, ir, errors);
    }
  }
}

fn check_type_ref(module: &Module, type_ref: &crate::ir::types::Type, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  if let Some(size) = &type_ref.size_in_bits {
    let kind = check_expr(module, size, ir, errors);
    if !matches!(kind, Kind::Integer | Kind::Unresolved) {
      errors.push(Diagnostic::new(module.source_file_name.clone(), size.location, "explicit size must be an integer expression".to_string()));
    }
  }
  match &type_ref.kind {
    TypeRefKind::Atomic(atomic) => {
      for arg in &atomic.runtime_arguments {
        check_expr(module, arg, ir, errors);
      }
    }
    TypeRefKind::Array(array) => {
      if let ArraySize::Constant(size) = &array.size {
        let kind = check_expr(module, size, ir, errors);
        if !matches!(kind, Kind::Integer | Kind::Unresolved) {
          errors.push(Diagnostic::new(module.source_file_name.clone(), size.location, "array element count must be an integer expression".to_string()));
        }
      }
      check_type_ref(module, &array.element, ir, errors);
    }
  }
}

/// Recomputes `Kind` for `expr`'s whole tree, pushing a diagnostic for
/// every operator-contract violation found along the way, and returns the
/// root's kind.
fn check_expr(module: &Module, expr: &Expression, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) -> Kind {
  match &expr.kind {
    ExpressionKind::NumericConstant(_) => Kind::Integer,
    ExpressionKind::BooleanConstant(_) => Kind::Boolean,
    ExpressionKind::ConstantReference(r) => r.canonical_name.as_ref().map_or(Kind::Unresolved, |name| constant_reference_kind(name, ir)),
    ExpressionKind::FieldReference(fr) => fr.last().canonical_name.as_ref().map_or(Kind::Unresolved, |name| field_reference_kind(name, ir)),
    ExpressionKind::BuiltinReference(b) => builtin_kind(*b),
    ExpressionKind::Function { operator, args } => {
      let arg_kinds: Vec<Kind> = args.iter().map(|a| check_expr(module, a, ir, errors)).collect();
      check_operator(module, *operator, &arg_kinds, expr.location, errors)
    }
  }
}

fn builtin_kind(b: crate::ir::expr::Builtin) -> Kind {
  use crate::ir::expr::Builtin;
  match b {
    Builtin::StaticSizeInBits => Kind::Integer,
    Builtin::IsStaticallySized => Kind::Boolean,
    Builtin::LogicalValue => Kind::Unresolved,
  }
}

fn constant_reference_kind(name: &CanonicalName, ir: &EmbossIr) -> Kind {
  match ir.find(name) {
    Some(Entity::EnumValue(_)) => {
      let mut enum_path = name.object_path.clone();
      enum_path.pop();
      Kind::Enumeration(CanonicalName { module_file: name.module_file.clone(), object_path: enum_path })
    }
    Some(Entity::Field(field)) if field.is_virtual() => Kind::Unresolved,
    _ => Kind::Opaque,
  }
}

fn field_reference_kind(name: &CanonicalName, ir: &EmbossIr) -> Kind {
  let Some(Entity::Field(field)) = ir.find(name) else { return Kind::Unresolved };
  if field.is_virtual() {
    return Kind::Unresolved;
  }
  let Some(type_ref) = field.type_ref() else { return Kind::Opaque };
  let Some(atomic) = type_ref.innermost_atomic() else { return Kind::Opaque };
  let Some(referent) = &atomic.reference.canonical_name else { return Kind::Unresolved };
  match referent.object_path.last().map(String::as_str) {
    Some("UInt" | "Int" | "Bcd") => Kind::Integer,
    Some("Flag") => Kind::Boolean,
    _ => match ir.find_type(referent) {
      Some(def) if def.as_enum().is_some() => Kind::Enumeration(referent.clone()),
      Some(_) => Kind::Opaque,
      None => Kind::Unresolved,
    },
  }
}

fn check_operator(module: &Module, operator: Operator, args: &[Kind], location: SourceLocation, errors: &mut Vec<Diagnostic>) -> Kind {
  let mismatch = |errors: &mut Vec<Diagnostic>, message: String| {
    errors.push(Diagnostic::new(module.source_file_name.clone(), location, message));
    Kind::Opaque
  };
  match operator {
    Operator::Add | Operator::Sub | Operator::Mul => {
      if args.iter().all(|k| matches!(k, Kind::Integer | Kind::Unresolved)) {
        Kind::Integer
      } else {
        mismatch(errors, format!("'{}' requires two integer operands", operator.spelling()))
      }
    }
    Operator::And | Operator::Or => {
      if args.iter().all(|k| matches!(k, Kind::Boolean | Kind::Unresolved)) {
        Kind::Boolean
      } else {
        mismatch(errors, format!("'{}' requires two boolean operands", operator.spelling()))
      }
    }
    Operator::Max => {
      if args.iter().all(|k| matches!(k, Kind::Integer | Kind::Unresolved)) {
        Kind::Integer
      } else {
        mismatch(errors, "'$max' requires only integer operands".to_string())
      }
    }
    Operator::Has => {
      // The argument is a field reference node, already kind-checked above
      // as whatever its referent resolves to; `$has` accepts any kind.
      Kind::Boolean
    }
    Operator::UpperBound | Operator::LowerBound => {
      if matches!(args[0], Kind::Integer | Kind::Unresolved) {
        Kind::Integer
      } else {
        mismatch(errors, format!("'{}' requires an integer operand", operator.spelling()))
      }
    }
    Operator::Eq | Operator::Ne => {
      if args[0].same_family(&args[1]) && matches!(args[0], Kind::Integer | Kind::Boolean | Kind::Enumeration(_) | Kind::Unresolved) {
        Kind::Boolean
      } else {
        mismatch(errors, "'==' / '!=' require two operands of the same kind (integer, boolean, or matching enum)".to_string())
      }
    }
    Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
      if args[0].same_family(&args[1]) && matches!(args[0], Kind::Integer | Kind::Enumeration(_) | Kind::Unresolved) {
        Kind::Boolean
      } else {
        mismatch(errors, format!("'{}' requires two operands of the same kind (integer or matching enum)", operator.spelling()))
      }
    }
    Operator::Choice => {
      if !matches!(args[0], Kind::Boolean | Kind::Unresolved) {
        return mismatch(errors, "'?:' condition must be boolean".to_string());
      }
      if args[1].same_family(&args[2]) && matches!(args[1], Kind::Integer | Kind::Boolean | Kind::Enumeration(_) | Kind::Unresolved) {
        if args[1] == Kind::Unresolved { args[2].clone() } else { args[1].clone() }
      } else {
        mismatch(errors, "'?:' branches must share the same kind (integer, boolean, or matching enum)".to_string())
      }
    }
  }
}

/// Passed-parameter checks (§4.C): every `AtomicType` use site with
/// runtime arguments must supply the same count and kinds the referenced
/// type declares.
fn check_atomic_use_sites(module: &Module, ty: &TypeDefinition, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  if let TypeDefinitionKind::Structure(structure) = &ty.kind {
    for field in &structure.fields {
      if let FieldKind::Physical { type_ref, .. } = &field.kind {
        check_atomic_args_in_type(module, type_ref, ir, errors);
      }
    }
  }
}

fn check_atomic_args_in_type(module: &Module, type_ref: &crate::ir::types::Type, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  match &type_ref.kind {
    TypeRefKind::Atomic(atomic) => check_atomic_args(module, atomic, ir, errors),
    TypeRefKind::Array(array) => check_atomic_args_in_type(module, &array.element, ir, errors),
  }
}

fn check_atomic_args(module: &Module, atomic: &AtomicType, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  let Some(referent) = &atomic.reference.canonical_name else { return };
  let Some(def) = ir.find_type(referent) else { return };
  if def.runtime_parameters.len() != atomic.runtime_arguments.len() {
    errors.push(Diagnostic::new(
      module.source_file_name.clone(),
      atomic.reference.location,
      format!("'{}' expects {} parameter(s), got {}", referent.object_path.join("."), def.runtime_parameters.len(), atomic.runtime_arguments.len()),
    ));
    return;
  }
  for (param, arg) in def.runtime_parameters.iter().zip(&atomic.runtime_arguments) {
    let arg_kind = check_expr(module, arg, ir, &mut Vec::new());
    let ok = match &param.ty {
      ParameterType::Integer(_) => matches!(arg_kind, Kind::Integer | Kind::Unresolved),
      ParameterType::Enumeration(r) => match (&arg_kind, &r.canonical_name) {
        (Kind::Enumeration(a), Some(b)) => a == b,
        (Kind::Unresolved, _) => true,
        _ => false,
      },
    };
    if !ok {
      errors.push(Diagnostic::new(
        module.source_file_name.clone(),
        arg.location,
        format!("argument for parameter '{}' of '{}' has the wrong kind", param.name.name.object_path.join("."), referent.object_path.join(".")),
      ));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::expr::Expression;

  #[test]
  fn arithmetic_on_two_constants_is_integer() {
    let loc = SourceLocation::synthetic();
    let module = Module { source_file_name: "m.emb".to_string(), ..Module::default() };
    let ir = EmbossIr::default();
    let mut errors = Vec::new();
    let expr = Expression::function(Operator::Add, vec![Expression::numeric_constant(1, loc), Expression::numeric_constant(2, loc)], loc);
    let kind = check_expr(&module, &expr, &ir, &mut errors);
    assert!(errors.is_empty());
    assert_eq!(kind, Kind::Integer);
  }

  #[test]
  fn mixing_boolean_into_arithmetic_is_an_error() {
    let loc = SourceLocation::synthetic();
    let module = Module { source_file_name: "m.emb".to_string(), ..Module::default() };
    let ir = EmbossIr::default();
    let mut errors = Vec::new();
    let expr = Expression::function(Operator::Add, vec![Expression::numeric_constant(1, loc), Expression::boolean_constant(true, loc)], loc);
    check_expr(&module, &expr, &ir, &mut errors);
    assert_eq!(errors.len(), 1);
  }
}
