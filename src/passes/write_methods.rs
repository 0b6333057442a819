//! Write-method inference (§4.G).
//!
//! Ported from `compiler/front_end/write_inference.py`'s `_add_write_method`
//! / `_invert_expression`. Every field's write-method may depend on another
//! field's (an alias chases its target; a transform chases the field it
//! inverts to), so this pass computes the whole program's write-methods
//! into a memoized cache keyed by canonical name -- reading from an
//! immutable snapshot exactly like [`crate::passes::bounds`] does for the
//! same "need the rest of the IR while mutating one corner of it" reason
//! -- and only then writes the results back onto the live tree.

use hashbrown::HashMap;

use crate::diagnostic::{PassResult, SourceLocation};
use crate::ir::expr::{Builtin, Expression, ExpressionKind, ExpressionType, Operator};
use crate::ir::field::WriteMethod;
use crate::ir::module::{EmbossIr, Entity};
use crate::ir::names::{CanonicalName, FieldReference};
use crate::passes::bounds;
use crate::traverse;

pub fn run(ir: &mut EmbossIr) -> PassResult<()> {
  let snapshot = ir.clone();
  let mut cache: HashMap<CanonicalName, WriteMethod> = HashMap::new();
  for module in &snapshot.modules {
    for ty in &module.types {
      collect_fields(ty, &snapshot, &mut cache);
    }
  }
  for module in &mut ir.modules {
    traverse::for_each_field_mut(module, &mut |field, _ctx| {
      if field.write_method.is_none() {
        if let Some(wm) = cache.get(&field.name.name) {
          field.write_method = Some(wm.clone());
        }
      }
    });
  }
  Ok(())
}

fn collect_fields(ty: &crate::ir::types::TypeDefinition, ir: &EmbossIr, cache: &mut HashMap<CanonicalName, WriteMethod>) {
  if let Some(structure) = ty.as_structure() {
    for field in &structure.fields {
      infer_write_method(&field.name.name, ir, cache);
    }
  }
  for sub in &ty.subtypes {
    collect_fields(sub, ir, cache);
  }
}

/// Computes (and memoizes) the write-method of the field named `name`,
/// recursing into whatever field it aliases or inverts to first, exactly
/// as the Python `_add_write_method` recurses before reading
/// `referenced_field.write_method`.
fn infer_write_method(name: &CanonicalName, ir: &EmbossIr, cache: &mut HashMap<CanonicalName, WriteMethod>) -> WriteMethod {
  if let Some(wm) = cache.get(name) {
    return wm.clone();
  }
  // Guard against a pathological reference cycle (not expected in valid
  // programs, but §5 requires every pass to be total): treat the field as
  // read-only until its real answer is computed, so a cyclic lookup
  // resolves to read-only rather than looping forever.
  cache.insert(name.clone(), WriteMethod::ReadOnly);
  let Some(Entity::Field(field)) = ir.find(name) else {
    return WriteMethod::ReadOnly;
  };
  let wm = if field.is_physical() {
    WriteMethod::Physical
  } else {
    let read_transform = field.read_transform().expect("virtual field has a read_transform");
    let has_requires = field.attributes.iter().any(|a| a.back_end.is_none() && a.name == "requires");
    match (&read_transform.kind, has_requires) {
      (ExpressionKind::FieldReference(fr), false) => direct_alias_write_method(fr, ir, cache),
      _ => transform_write_method(read_transform, ir, cache),
    }
  };
  cache.insert(name.clone(), wm.clone());
  wm
}

/// `let v = some_field_reference` with no `[requires]`: `v` is a writable
/// alias of its referent when the referent itself is writable.
fn direct_alias_write_method(fr: &FieldReference, ir: &EmbossIr, cache: &mut HashMap<CanonicalName, WriteMethod>) -> WriteMethod {
  let Some(target_name) = fr.last().canonical_name.clone() else {
    return WriteMethod::ReadOnly;
  };
  match ir.find(&target_name) {
    Some(Entity::Field(_)) => {
      let target_wm = infer_write_method(&target_name, ir, cache);
      if target_wm.is_writable() { WriteMethod::Alias(fr.clone()) } else { WriteMethod::ReadOnly }
    }
    // Aliasing a runtime parameter (or anything else that isn't a field)
    // is always read-only.
    _ => WriteMethod::ReadOnly,
  }
}

/// Attempts to invert `read_transform` and, if the inverse's destination
/// field is itself writable, synthesize a `transform` write-method.
fn transform_write_method(read_transform: &Expression, ir: &EmbossIr, cache: &mut HashMap<CanonicalName, WriteMethod>) -> WriteMethod {
  let Some((destination, mut function_body)) = invert_expression(read_transform) else {
    return WriteMethod::ReadOnly;
  };
  let Some(destination_name) = destination.last().canonical_name.clone() else {
    return WriteMethod::ReadOnly;
  };
  match ir.find(&destination_name) {
    Some(Entity::Field(_)) => {
      let target_wm = infer_write_method(&destination_name, ir, cache);
      if target_wm.is_writable() {
        bounds::annotate_detached_for_transform(&mut function_body, ir, &read_transform.ty);
        WriteMethod::Transform { function_body, destination }
      } else {
        WriteMethod::ReadOnly
      }
    }
    _ => WriteMethod::ReadOnly,
  }
}

/// Finds the unique `field_reference` in `expr`'s tree and the path of
/// child indexes to reach it, or `None` if `expr` contains zero or more
/// than one (§4.G "searching for a unique `field_reference`").
fn find_field_reference_path(expr: &Expression) -> Option<Vec<usize>> {
  fn count(expr: &Expression) -> (usize, Vec<usize>) {
    match &expr.kind {
      ExpressionKind::FieldReference(_) => (1, Vec::new()),
      ExpressionKind::Function { args, .. } => {
        let mut total = 0;
        let mut first_path = None;
        for (index, arg) in args.iter().enumerate() {
          let (arg_count, arg_path) = count(arg);
          if arg_count == 1 && first_path.is_none() {
            let mut path = vec![index];
            path.extend(arg_path);
            first_path = Some(path);
          }
          total += arg_count;
        }
        if total == 1 { (1, first_path.unwrap_or_default()) } else { (total, Vec::new()) }
      }
      _ => (0, Vec::new()),
    }
  }
  let (n, path) = count(expr);
  (n == 1).then_some(path)
}

/// Builds the algebraic inverse of `expr` with respect to its one
/// `field_reference`, per §4.G: the path from root to that reference must
/// consist only of `+`/`-` nodes. Returns `(field_reference, inverse)`,
/// where `inverse` computes the referenced field's value given
/// `$logical_value` (the value written through the virtual field).
fn invert_expression(expr: &Expression) -> Option<(FieldReference, Expression)> {
  let path = find_field_reference_path(expr)?;
  let synthetic = SourceLocation::synthetic();
  let mut subexpression = expr;
  let mut result = Expression::new(ExpressionKind::BuiltinReference(Builtin::LogicalValue), synthetic);
  result.ty = expr.ty.clone();
  for &index in &path {
    let ExpressionKind::Function { operator, args } = &subexpression.kind else {
      return None;
    };
    result = match operator {
      Operator::Add => Expression::function(Operator::Sub, vec![result, args[1 - index].clone()], synthetic),
      Operator::Sub if index == 0 => Expression::function(Operator::Add, vec![result, args[1].clone()], synthetic),
      Operator::Sub => Expression::function(Operator::Sub, vec![args[0].clone(), result], synthetic),
      _ => return None,
    };
    subexpression = &args[index];
  }
  match &subexpression.kind {
    ExpressionKind::FieldReference(fr) => Some((fr.clone(), result)),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::expr::{Bound, IntegerBounds, Modulus};
  use crate::ir::names::Reference;

  fn uint_field_reference(name: &CanonicalName, bounds: IntegerBounds, loc: SourceLocation) -> Expression {
    let mut reference = Reference::new(vec![crate::symbol::intern(name.object_path.last().unwrap())], loc);
    reference.canonical_name = Some(name.clone());
    let fr = FieldReference::new(vec![reference], loc);
    let mut expr = Expression::new(ExpressionKind::FieldReference(fr), loc);
    expr.ty = ExpressionType::Integer(bounds);
    expr
  }

  #[test]
  fn additive_transform_inverts_to_subtraction() {
    // `let shifted = raw + 100` (§8 scenario 2) inverts to
    // `$logical_value - 100`.
    let loc = SourceLocation::synthetic();
    let raw_name = CanonicalName::new("m.emb", vec!["Foo".to_string(), "raw".to_string()]);
    let raw_bounds = IntegerBounds { modulus: Modulus::Finite(1), modular_value: 0, minimum_value: Bound::Finite(0), maximum_value: Bound::Finite(255) };
    let raw_ref = uint_field_reference(&raw_name, raw_bounds, loc);
    let hundred = Expression::numeric_constant(100, loc);
    let mut shifted = Expression::function(Operator::Add, vec![raw_ref, hundred], loc);
    shifted.ty = ExpressionType::Integer(IntegerBounds { modulus: Modulus::Finite(1), modular_value: 0, minimum_value: Bound::Finite(100), maximum_value: Bound::Finite(355) });

    let (destination, inverse) = invert_expression(&shifted).expect("invertible");
    assert_eq!(destination.last().canonical_name.as_ref(), Some(&raw_name));
    match &inverse.kind {
      ExpressionKind::Function { operator: Operator::Sub, args } => {
        assert!(matches!(args[0].kind, ExpressionKind::BuiltinReference(Builtin::LogicalValue)));
        assert!(matches!(args[1].kind, ExpressionKind::NumericConstant(100)));
      }
      other => panic!("expected a subtraction, got {other:?}"),
    }
  }

  #[test]
  fn expression_with_two_field_references_is_not_invertible() {
    let loc = SourceLocation::synthetic();
    let a_name = CanonicalName::new("m.emb", vec!["Foo".to_string(), "a".to_string()]);
    let b_name = CanonicalName::new("m.emb", vec!["Foo".to_string(), "b".to_string()]);
    let bounds = IntegerBounds::unbounded();
    let sum = Expression::function(Operator::Add, vec![uint_field_reference(&a_name, bounds, loc), uint_field_reference(&b_name, bounds, loc)], loc);
    assert!(invert_expression(&sum).is_none());
  }

  #[test]
  fn unresolvable_field_name_infers_read_only() {
    let name = CanonicalName::new("m.emb", vec!["Foo".to_string(), "raw".to_string()]);
    let mut cache = HashMap::new();
    assert!(matches!(infer_write_method(&name, &EmbossIr::default(), &mut cache), WriteMethod::ReadOnly));
  }
}
