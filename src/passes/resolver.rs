//! Symbol resolution (§4.B): builds a scope tree mirroring the IR, then
//! resolves every [`Reference`] and dotted [`FieldReference`] to a
//! [`CanonicalName`].
//!
//! Ported from `compiler/front_end/symbol_resolver.py`'s two-phase design
//! (build, then resolve) plus the separate member-access pass for dotted
//! field paths. The scope tree itself is not a persistent IR node --
//! spec §3 calls for cross-tree edges to be name lookups, never owning
//! structure -- so it is built fresh by this pass and dropped once
//! resolution finishes; only the `canonical_name` it stamps onto each
//! `Reference` survives.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::diagnostic::{Diagnostic, PassResult};
use crate::ir::expr::{Expression, ExpressionKind};
use crate::ir::field::{FieldKind, ParameterType, WriteMethod};
use crate::ir::module::EmbossIr;
use crate::ir::names::{CanonicalName, FieldReference, Reference};
use crate::ir::types::{TypeDefinition, TypeDefinitionKind, TypeRefKind};
use crate::symbol::Symbol;
use crate::traverse::Ctx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
  Searchable,
  Local,
  Private,
}

#[derive(Debug, Clone)]
struct ScopeEntry {
  target: CanonicalName,
  visibility: Visibility,
}

#[derive(Debug, Clone, Default)]
struct Scope {
  entries: HashMap<Symbol, SmallVec<[ScopeEntry; 2]>>,
  /// `import "x.emb" as x` entries: `x` redirects lookups to `x.emb`'s
  /// module scope instead of naming a single entity.
  module_aliases: HashMap<Symbol, String>,
}

impl Scope {
  fn insert(&mut self, name: Symbol, target: CanonicalName, visibility: Visibility) {
    self.entries.entry(name).or_default().push(ScopeEntry { target, visibility });
  }
}

/// The scope tree built by phase 1, queried (read-only) by phases 2 and 3.
struct SymbolTable {
  /// Keyed by module `source_file_name`, `""` for the prelude.
  modules: HashMap<String, Scope>,
  /// Keyed by a type's own canonical name: its nested-type (searchable)
  /// and member (local) entries.
  types: HashMap<CanonicalName, Scope>,
  /// Keyed by a field's own canonical name: `this` and its abbreviation.
  fields: HashMap<CanonicalName, Scope>,
}

/// Entry point: runs all three phases and returns the accumulated errors.
pub fn run(ir: &mut EmbossIr) -> PassResult<()> {
  let mut errors = Vec::new();
  let table = build_table(ir, &mut errors);
  if !errors.is_empty() {
    return Err(errors);
  }
  resolve_type_level_references(ir, &table, &mut errors);
  resolve_field_reference_heads(ir, &table, &mut errors);
  resolve_field_reference_tails(ir, &mut errors);
  if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// ---- Phase 1: table construction -----------------------------------

fn build_table(ir: &EmbossIr, errors: &mut Vec<Diagnostic>) -> SymbolTable {
  let mut table = SymbolTable { modules: HashMap::new(), types: HashMap::new(), fields: HashMap::new() };
  for module in &ir.modules {
    let mut scope = Scope::default();
    for ty in &module.types {
      declare_top_level_type(&mut scope, ty, errors);
    }
    for import in &module.imports {
      if import.is_prelude() {
        continue;
      }
      if import.local_name.is_empty() {
        continue; // merged below, once every module's own scope is built
      }
      table_insert_alias(&mut scope, &import.local_name, import.file_name.clone());
    }
    table.modules.insert(module.source_file_name.clone(), scope);
  }
  // Anonymous imports (`import "b.emb"` with no `as`, and the implicit
  // prelude import) merge the target module's own top-level Searchable
  // entries directly into the importing module's scope. Two anonymous
  // imports that both define the same top-level name produce two
  // candidate entries in one scope, which phase 2 reports as ambiguous.
  let merges: Vec<(String, String)> = ir
    .modules
    .iter()
    .flat_map(|m| m.imports.iter().filter(|i| i.local_name.is_empty()).map(move |i| (m.source_file_name.clone(), i.file_name.clone())))
    .collect();
  for (into, from) in merges {
    let Some(source_entries) = table.modules.get(&from).map(|s| s.entries.clone()) else { continue };
    if let Some(dest) = table.modules.get_mut(&into) {
      for (name, candidates) in source_entries {
        for candidate in candidates.into_iter().filter(|c| c.visibility == Visibility::Searchable) {
          dest.entries.entry(name).or_default().push(candidate);
        }
      }
    }
  }
  for module in &ir.modules {
    for ty in &module.types {
      declare_type_members(&mut table, ty, errors);
    }
  }
  table
}

fn table_insert_alias(scope: &mut Scope, local_name: &str, file_name: String) {
  // Import aliases are looked up by their first source-name component, so
  // they are keyed by symbol like any other entry.
  scope.module_aliases.insert(crate::symbol::intern(local_name), file_name);
}

fn declare_top_level_type(scope: &mut Scope, ty: &TypeDefinition, errors: &mut Vec<Diagnostic>) {
  let Some(short_name) = ty.name.name.object_path.last() else { return };
  let sym = crate::symbol::intern(short_name);
  if let Some(existing) = scope.entries.get(&sym).and_then(|v| v.first()) {
    errors.push(
      Diagnostic::new(ty.name.name.module_file.clone(), ty.name.location, format!("duplicate name '{short_name}'"))
        .with_note(existing.target.module_file.clone(), ty.name.location, "first defined here"),
    );
    return;
  }
  scope.insert(sym, ty.name.name.clone(), Visibility::Searchable);
}

/// Recursively builds each type's own scope (nested types searchable,
/// fields/enum-values/parameters local) and each field's private scope
/// (`this` plus any abbreviation).
fn declare_type_members(table: &mut SymbolTable, ty: &TypeDefinition, errors: &mut Vec<Diagnostic>) {
  let mut scope = Scope::default();
  match &ty.kind {
    TypeDefinitionKind::Structure(structure) => {
      for field in &structure.fields {
        declare_member(&mut scope, &field.name.name, Visibility::Local, errors);
        let mut field_scope = Scope::default();
        field_scope.insert(crate::symbol::intern("this"), field.name.name.clone(), Visibility::Private);
        if let Some(abbrev) = field.abbreviation {
          field_scope.insert(abbrev, field.name.name.clone(), Visibility::Private);
        }
        table.fields.insert(field.name.name.clone(), field_scope);
      }
    }
    TypeDefinitionKind::Enum(e) => {
      for value in &e.values {
        declare_member(&mut scope, &value.name.name, Visibility::Local, errors);
      }
    }
    TypeDefinitionKind::External(_) => {}
  }
  for param in &ty.runtime_parameters {
    declare_member(&mut scope, &param.name.name, Visibility::Local, errors);
  }
  for sub in &ty.subtypes {
    if let Some(short_name) = sub.name.name.object_path.last() {
      scope.insert(crate::symbol::intern(short_name), sub.name.name.clone(), Visibility::Searchable);
    }
  }
  table.types.insert(ty.name.name.clone(), scope);
  for sub in &ty.subtypes {
    declare_type_members(table, sub, errors);
  }
}

fn declare_member(scope: &mut Scope, name: &CanonicalName, visibility: Visibility, errors: &mut Vec<Diagnostic>) {
  let Some(short_name) = name.object_path.last() else { return };
  let sym = crate::symbol::intern(short_name);
  if let Some(existing) = scope.entries.get(&sym).and_then(|v| v.first()) {
    errors.push(
      Diagnostic::new(name.module_file.clone(), crate::diagnostic::SourceLocation::synthetic(), format!("duplicate name '{short_name}'"))
        .with_note(existing.target.module_file.clone(), crate::diagnostic::SourceLocation::synthetic(), "first defined here"),
    );
    return;
  }
  scope.insert(sym, name.clone(), visibility);
}

// ---- Phase 2: reference resolution ----------------------------------

/// The ordered chain of scopes to search, innermost first, for a
/// reference appearing with the given context.
fn scope_chain<'a>(table: &'a SymbolTable, ctx: &Ctx) -> Vec<(&'a Scope, bool)> {
  let mut chain = Vec::new();
  let mut innermost = true;
  if let Some(field_name) = &ctx.field {
    if let Some(scope) = table.fields.get(field_name) {
      // A field's private scope (`this`/abbreviation) and its immediately
      // enclosing structure's own member scope sit at the same effective
      // nesting depth: both are reachable without qualification from
      // inside that field's own location/existence_condition/transform,
      // so sibling field names (Local visibility) must stay eligible here
      // too. `innermost` only drops once we leave that enclosing structure.
      chain.push((scope, innermost));
    }
  }
  if let Some(type_name) = &ctx.type_definition {
    // Walk from the innermost enclosing type outward to the top-level type,
    // each contributing its member/nested-type scope.
    let mut path = type_name.object_path.clone();
    while !path.is_empty() {
      let candidate = CanonicalName::new(type_name.module_file.clone(), path.clone());
      if let Some(scope) = table.types.get(&candidate) {
        chain.push((scope, innermost));
        innermost = false;
      }
      path.pop();
    }
  }
  if let Some(scope) = table.modules.get(&ctx.source_file_name) {
    chain.push((scope, innermost));
    innermost = false;
  }
  if !ctx.source_file_name.is_empty() {
    if let Some(scope) = table.modules.get("") {
      chain.push((scope, innermost));
    }
  }
  chain
}

fn resolve_reference(table: &SymbolTable, ctx: &Ctx, reference: &mut Reference) -> Result<(), Diagnostic> {
  let Some((&first, rest)) = reference.source_name.split_first() else {
    return Err(Diagnostic::new(ctx.source_file_name.clone(), reference.location, "empty reference"));
  };
  let chain = scope_chain(table, ctx);
  let mut candidates_seen: Vec<CanonicalName> = Vec::new();
  let mut alias_file: Option<String> = None;
  for (scope, is_innermost) in &chain {
    if let Some(file_name) = scope.module_aliases.get(&first) {
      alias_file = Some(file_name.clone());
      break;
    }
    if let Some(candidates) = scope.entries.get(&first) {
      let usable: Vec<&ScopeEntry> = candidates.iter().filter(|c| *is_innermost || c.visibility == Visibility::Searchable).collect();
      if !usable.is_empty() {
        candidates_seen.extend(usable.into_iter().map(|c| c.target.clone()));
        // `is_local_name` (inline-defined types): stop at the first scope
        // level with a match; same-named siblings further out are not
        // ambiguities (§4.B phase 2, step 3).
        if reference.is_local_name {
          break;
        }
      }
    }
  }
  let is_alias = alias_file.is_some();
  let mut name = if let Some(file_name) = alias_file {
    CanonicalName::new(file_name, Vec::new())
  } else {
    match candidates_seen.len() {
      0 => return Err(Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("'{}' is not defined", first.as_str()))),
      1 => candidates_seen.remove(0),
      _ => return Err(Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("ambiguous reference to '{}': matches multiple definitions", first.as_str()))),
    }
  };
  if is_alias {
    let Some((&next, rest2)) = rest.split_first() else {
      return Err(Diagnostic::new(ctx.source_file_name.clone(), reference.location, "import alias used without a member name"));
    };
    let module_scope = table.modules.get(&name.module_file).ok_or_else(|| Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("unknown module '{}'", name.module_file)))?;
    let candidates = module_scope.entries.get(&next).ok_or_else(|| Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("no member named '{}' in '{}'", next.as_str(), name.module_file)))?;
    let searchable: Vec<&ScopeEntry> = candidates.iter().filter(|c| c.visibility == Visibility::Searchable).collect();
    if searchable.len() != 1 {
      return Err(Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("'{}' does not uniquely name a member of '{}'", next.as_str(), name.module_file)));
    }
    name = searchable[0].target.clone();
    for component in rest2 {
      name = descend_one(table, &name, *component, ctx, reference)?;
    }
  } else {
    for component in rest {
      name = descend_one(table, &name, *component, ctx, reference)?;
    }
  }
  reference.canonical_name = Some(name);
  Ok(())
}

fn descend_one(table: &SymbolTable, parent: &CanonicalName, component: Symbol, ctx: &Ctx, reference: &Reference) -> Result<CanonicalName, Diagnostic> {
  let scope = table.types.get(parent).ok_or_else(|| Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("'{}' has no members", parent.object_path.join("."))))?;
  let candidates = scope.entries.get(&component).ok_or_else(|| Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("no member named '{}' in '{}'", component.as_str(), parent.object_path.join("."))))?;
  if candidates.len() != 1 {
    return Err(Diagnostic::new(ctx.source_file_name.clone(), reference.location, format!("'{}' does not uniquely name a member of '{}'", component.as_str(), parent.object_path.join("."))));
  }
  Ok(candidates[0].target.clone())
}

fn resolve_type_level_references(ir: &mut EmbossIr, table: &SymbolTable, errors: &mut Vec<Diagnostic>) {
  for module in &mut ir.modules {
    let module_ctx = Ctx::for_module(module);
    walk_type_level_references(&mut module.types, &module_ctx, table, errors);
  }
}

fn walk_type_level_references(types: &mut [TypeDefinition], ctx: &Ctx, table: &SymbolTable, errors: &mut Vec<Diagnostic>) {
  for ty in types {
    let ty_ctx = Ctx { type_definition: Some(ty.name.name.clone()), ..ctx.clone() };
    for param in &mut ty.runtime_parameters {
      match &mut param.ty {
        ParameterType::Integer(atomic) => try_resolve(table, &ty_ctx, &mut atomic.reference, errors),
        ParameterType::Enumeration(reference) => try_resolve(table, &ty_ctx, reference, errors),
      }
    }
    if let TypeDefinitionKind::Structure(structure) = &mut ty.kind {
      for field in &mut structure.fields {
        let field_ctx = Ctx { field: Some(field.name.name.clone()), ..ty_ctx.clone() };
        if let FieldKind::Physical { type_ref, .. } = &mut field.kind {
          resolve_type_ref(type_ref, &field_ctx, table, errors);
        }
      }
    }
    walk_type_level_references(&mut ty.subtypes, &ty_ctx, table, errors);
  }
}

fn resolve_type_ref(ty: &mut crate::ir::types::Type, ctx: &Ctx, table: &SymbolTable, errors: &mut Vec<Diagnostic>) {
  match &mut ty.kind {
    TypeRefKind::Atomic(atomic) => try_resolve(table, ctx, &mut atomic.reference, errors),
    TypeRefKind::Array(array) => resolve_type_ref(&mut array.element, ctx, table, errors),
  }
}

fn try_resolve(table: &SymbolTable, ctx: &Ctx, reference: &mut Reference, errors: &mut Vec<Diagnostic>) {
  if let Err(diag) = resolve_reference(table, ctx, reference) {
    errors.push(diag);
  }
}

/// Resolves `field_reference.path[0]` (and the single-element destination
/// paths used by `write_method = alias`/`transform`) using the same
/// general scope walk as type-level references.
fn resolve_field_reference_heads(ir: &mut EmbossIr, table: &SymbolTable, errors: &mut Vec<Diagnostic>) {
  for module in &mut ir.modules {
    let module_ctx = Ctx::for_module(module);
    walk_heads_in_types(&mut module.types, &module_ctx, table, errors);
  }
}

fn walk_heads_in_types(types: &mut [TypeDefinition], ctx: &Ctx, table: &SymbolTable, errors: &mut Vec<Diagnostic>) {
  for ty in types {
    let ty_ctx = Ctx { type_definition: Some(ty.name.name.clone()), ..ctx.clone() };
    match &mut ty.kind {
      TypeDefinitionKind::Structure(structure) => {
        for field in &mut structure.fields {
          let field_ctx = Ctx { field: Some(field.name.name.clone()), ..ty_ctx.clone() };
          if let Some(cond) = &mut field.existence_condition {
            resolve_heads_in_expr(cond, &field_ctx, table, errors);
          }
          match &mut field.kind {
            FieldKind::Physical { location, .. } => {
              resolve_heads_in_expr(&mut location.start, &field_ctx, table, errors);
              resolve_heads_in_expr(&mut location.size, &field_ctx, table, errors);
            }
            FieldKind::Virtual { read_transform } => resolve_heads_in_expr(read_transform, &field_ctx, table, errors),
          }
          match &mut field.write_method {
            Some(WriteMethod::Alias(fr)) => try_resolve(table, &field_ctx, &mut fr.path[0], errors),
            Some(WriteMethod::Transform { function_body, destination }) => {
              resolve_heads_in_expr(function_body, &field_ctx, table, errors);
              try_resolve(table, &field_ctx, &mut destination.path[0], errors);
            }
            _ => {}
          }
        }
      }
      TypeDefinitionKind::Enum(e) => {
        for value in &mut e.values {
          resolve_heads_in_expr(&mut value.value, &ty_ctx, table, errors);
        }
      }
      TypeDefinitionKind::External(_) => {}
    }
    walk_heads_in_types(&mut ty.subtypes, &ty_ctx, table, errors);
  }
}

fn resolve_heads_in_expr(expr: &mut Expression, ctx: &Ctx, table: &SymbolTable, errors: &mut Vec<Diagnostic>) {
  match &mut expr.kind {
    ExpressionKind::ConstantReference(reference) => try_resolve(table, ctx, reference, errors),
    ExpressionKind::FieldReference(fr) => {
      let head = &mut fr.path[0];
      try_resolve(table, ctx, head, errors);
    }
    ExpressionKind::Function { args, .. } => {
      for arg in args {
        resolve_heads_in_expr(arg, ctx, table, errors);
      }
    }
    ExpressionKind::NumericConstant(_) | ExpressionKind::BooleanConstant(_) | ExpressionKind::BuiltinReference(_) => {}
  }
}

// ---- Phase 3: dotted field-path (member access) resolution ----------

/// Resolves `field_reference.path[1..]` by walking each non-terminal
/// element's referent type, which must be a non-array atomic field whose
/// type is a structure.
fn resolve_field_reference_tails(ir: &mut EmbossIr, errors: &mut Vec<Diagnostic>) {
  let snapshot = ir.clone();
  for module in &mut ir.modules {
    for ty in &mut module.types {
      walk_tails_in_type(ty, &snapshot, errors);
    }
  }
}

fn walk_tails_in_type(ty: &mut TypeDefinition, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  if let TypeDefinitionKind::Structure(structure) = &mut ty.kind {
    for field in &mut structure.fields {
      if let Some(cond) = &mut field.existence_condition {
        walk_tails_in_expr(cond, ir, errors);
      }
      match &mut field.kind {
        FieldKind::Physical { location, .. } => {
          walk_tails_in_expr(&mut location.start, ir, errors);
          walk_tails_in_expr(&mut location.size, ir, errors);
        }
        FieldKind::Virtual { read_transform } => walk_tails_in_expr(read_transform, ir, errors),
      }
      if let Some(WriteMethod::Transform { function_body, .. }) = &mut field.write_method {
        walk_tails_in_expr(function_body, ir, errors);
      }
    }
  }
  for sub in &mut ty.subtypes {
    walk_tails_in_type(sub, ir, errors);
  }
}

fn walk_tails_in_expr(expr: &mut Expression, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  match &mut expr.kind {
    ExpressionKind::FieldReference(fr) => resolve_one_field_reference_tail(fr, ir, errors),
    ExpressionKind::Function { args, .. } => {
      for arg in args {
        walk_tails_in_expr(arg, ir, errors);
      }
    }
    _ => {}
  }
}

fn resolve_one_field_reference_tail(fr: &mut FieldReference, ir: &EmbossIr, errors: &mut Vec<Diagnostic>) {
  let Some(head_name) = fr.path[0].canonical_name.clone() else {
    return; // head failed to resolve; suppress cascading tail errors
  };
  let mut current = head_name;
  for i in 1..fr.path.len() {
    let Some(crate::ir::module::Entity::Field(field)) = ir.find(&current) else {
      errors.push(Diagnostic::new(current.module_file.clone(), fr.location, format!("cannot access member of '{}': not a field", current.object_path.join("."))));
      return;
    };
    let struct_name = match field_structure_referent(field, ir) {
      Some(name) => name,
      None => {
        errors.push(Diagnostic::new(current.module_file.clone(), fr.location, "cannot access member of array/noncomposite"));
        return;
      }
    };
    let Some(member_ty) = ir.find_type(&struct_name) else {
      errors.push(Diagnostic::new(current.module_file.clone(), fr.location, format!("unknown type '{}'", struct_name.object_path.join("."))));
      return;
    };
    let Some(component) = fr.path[i].source_name.first() else { return };
    let Some(structure) = member_ty.as_structure() else {
      errors.push(Diagnostic::new(current.module_file.clone(), fr.location, "cannot access member of array/noncomposite"));
      return;
    };
    let Some(matching_field) = structure.fields.iter().find(|f| f.name.name.object_path.last().is_some_and(|n| n.as_str() == component.as_str())) else {
      errors.push(Diagnostic::new(current.module_file.clone(), fr.location, format!("no member named '{}'", component.as_str())));
      return;
    };
    current = matching_field.name.name.clone();
    fr.path[i].canonical_name = Some(current.clone());
  }
}

/// The structure type a non-array atomic field refers to, resolving
/// through virtual field_reference chains as described in §4.B phase 3.
fn field_structure_referent(field: &crate::ir::field::Field, ir: &EmbossIr) -> Option<CanonicalName> {
  match &field.kind {
    FieldKind::Physical { type_ref, .. } => {
      let atomic = type_ref.as_atomic()?;
      atomic.reference.canonical_name.clone()
    }
    FieldKind::Virtual { read_transform } => match &read_transform.kind {
      ExpressionKind::FieldReference(inner) => {
        let inner_target = inner.last().canonical_name.clone()?;
        match ir.find(&inner_target)? {
          crate::ir::module::Entity::Field(inner_field) => field_structure_referent(inner_field, ir),
          _ => None,
        }
      }
      _ => None,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostic::SourceLocation;
  use crate::ir::expr::{Expression, ExpressionKind};
  use crate::ir::field::{Field, FieldKind, FieldLocation};
  use crate::ir::module::Module;
  use crate::ir::names::{FieldReference, NameDefinition};
  use crate::ir::types::{AddressableUnit, AtomicType, Structure, Type, TypeRefKind};

  fn loc() -> SourceLocation {
    SourceLocation::synthetic()
  }

  fn atomic(name: &str) -> Type {
    Type {
      kind: TypeRefKind::Atomic(AtomicType { reference: Reference::new(vec![crate::symbol::intern(name)], loc()), runtime_arguments: vec![] }),
      size_in_bits: Some(Expression::numeric_constant(8, loc())),
      location: loc(),
    }
  }

  /// A field's own expressions (here, a sibling field's `size`) must be
  /// able to name another field of the *same* structure by bare name:
  /// this is the `scope_chain` Local-visibility path the structure's own
  /// member scope contributes, distinct from module-level Searchable
  /// lookup.
  #[test]
  fn sibling_field_name_resolves_within_enclosing_structure() {
    let length_field = Field {
      name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Foo".to_string(), "length".to_string()]), loc()),
      abbreviation: None,
      docs: vec![],
      attributes: vec![],
      existence_condition: None,
      write_method: None,
      kind: FieldKind::Physical {
        location: FieldLocation { start: Expression::numeric_constant(0, loc()), size: Expression::numeric_constant(1, loc()) },
        type_ref: atomic("UInt"),
      },
    };
    let payload_field = Field {
      name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Foo".to_string(), "payload".to_string()]), loc()),
      abbreviation: None,
      docs: vec![],
      attributes: vec![],
      existence_condition: None,
      write_method: None,
      kind: FieldKind::Physical {
        location: FieldLocation {
          start: Expression::numeric_constant(1, loc()),
          size: Expression::new(
            ExpressionKind::FieldReference(FieldReference::new(vec![Reference::new(vec![crate::symbol::intern("length")], loc())], loc())),
            loc(),
          ),
        },
        type_ref: atomic("UInt"),
      },
    };
    let foo = TypeDefinition {
      name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Foo".to_string()]), loc()),
      attributes: vec![],
      docs: vec![],
      subtypes: vec![],
      addressable_unit: AddressableUnit::Byte,
      runtime_parameters: vec![],
      kind: TypeDefinitionKind::Structure(Structure { fields: vec![length_field, payload_field], serialization_order: vec![0, 1] }),
    };
    let mut ir = EmbossIr { modules: vec![Module { attributes: vec![], types: vec![foo], imports: vec![], source_file_name: "foo.emb".to_string() }] };

    run(&mut ir).expect("a field should resolve a bare sibling field name within its own structure");

    let foo = ir.find_type(&CanonicalName::new("foo.emb", vec!["Foo".to_string()])).unwrap();
    let payload = foo.as_structure().unwrap().fields.iter().find(|f| f.name.name.object_path.last().unwrap() == "payload").unwrap();
    let ExpressionKind::FieldReference(fr) = &payload.location().unwrap().size.kind else { panic!("expected a field reference") };
    assert_eq!(fr.head().canonical_name, Some(CanonicalName::new("foo.emb", vec!["Foo".to_string(), "length".to_string()])));
  }

  /// A duplicate top-level type name is reported at table-build time, not
  /// silently shadowed.
  #[test]
  fn duplicate_top_level_type_name_is_rejected() {
    let make = |n: &str| TypeDefinition {
      name: NameDefinition::new(CanonicalName::new("foo.emb", vec![n.to_string()]), loc()),
      attributes: vec![],
      docs: vec![],
      subtypes: vec![],
      addressable_unit: AddressableUnit::Byte,
      runtime_parameters: vec![],
      kind: TypeDefinitionKind::Structure(Structure::default()),
    };
    let mut ir = EmbossIr { modules: vec![Module { attributes: vec![], types: vec![make("Foo"), make("Foo")], imports: vec![], source_file_name: "foo.emb".to_string() }] };
    let errors = run(&mut ir).expect_err("two top-level types with the same name must be rejected");
    assert!(errors.iter().any(|d| d.message.contains("duplicate")));
  }
}
