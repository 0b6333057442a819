//! Modules and the top-level IR (§3 "Module / top-level").

use crate::diagnostic::SourceLocation;
use crate::ir::attr::Attribute;
use crate::ir::field::{Field, RuntimeParameter};
use crate::ir::names::CanonicalName;
use crate::ir::types::{EnumValue, TypeDefinition};

/// `import "file_name.emb" as local_name`. An empty `local_name` denotes
/// the prelude, which is searched implicitly and has no explicit import
/// statement in user source.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Import {
  pub file_name: String,
  pub local_name: String,
  pub location: SourceLocation,
}

impl Import {
  #[must_use] pub fn is_prelude(&self) -> bool {
    self.local_name.is_empty()
  }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Module {
  pub attributes: Vec<Attribute>,
  pub types: Vec<TypeDefinition>,
  pub imports: Vec<Import>,
  pub source_file_name: String,
}

/// The whole-program IR: the main module plus the prelude and every
/// transitively-imported module. By convention `modules[0]` is the main
/// module.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EmbossIr {
  pub modules: Vec<Module>,
}

impl EmbossIr {
  #[must_use] pub fn main_module(&self) -> &Module {
    &self.modules[0]
  }

  #[must_use] pub fn module(&self, file_name: &str) -> Option<&Module> {
    self.modules.iter().find(|m| m.source_file_name == file_name)
  }

  #[must_use] pub fn module_mut(&mut self, file_name: &str) -> Option<&mut Module> {
    self.modules.iter_mut().find(|m| m.source_file_name == file_name)
  }

  /// Looks up a type definition anywhere in the program by its canonical
  /// name. Cross-module/cross-type references are always looked up this
  /// way rather than held as owning pointers (§3 "Lifecycle", §9 "Cyclic
  /// node references").
  #[must_use] pub fn find_type(&self, name: &CanonicalName) -> Option<&TypeDefinition> {
    let module = self.module(&name.module_file)?;
    find_type_by_path(&module.types, &name.object_path)
  }

  #[must_use] pub fn find_type_mut(&mut self, name: &CanonicalName) -> Option<&mut TypeDefinition> {
    let module = self.module_mut(&name.module_file)?;
    find_type_by_path_mut(&mut module.types, &name.object_path)
  }

  /// Looks up any named entity (type, field, enum value, or runtime
  /// parameter) by canonical name. This is the `ir.find(CanonicalName) ->
  /// &Node` helper called for in §9 "Cyclic node references": cross-tree
  /// edges are resolved through it rather than through owning references.
  #[must_use] pub fn find(&self, name: &CanonicalName) -> Option<Entity<'_>> {
    let module = self.module(&name.module_file)?;
    find_entity(&module.types, &name.object_path)
  }
}

/// Any object a [`CanonicalName`] can denote.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
  Type(&'a TypeDefinition),
  Field(&'a Field),
  EnumValue(&'a EnumValue),
  Parameter(&'a RuntimeParameter),
}

impl<'a> Entity<'a> {
  #[must_use] pub fn as_type(self) -> Option<&'a TypeDefinition> {
    match self {
      Entity::Type(t) => Some(t),
      _ => None,
    }
  }

  #[must_use] pub fn as_field(self) -> Option<&'a Field> {
    match self {
      Entity::Field(f) => Some(f),
      _ => None,
    }
  }

  #[must_use] pub fn as_enum_value(self) -> Option<&'a EnumValue> {
    match self {
      Entity::EnumValue(v) => Some(v),
      _ => None,
    }
  }
}

fn last_segment_matches(object_path: &[String], segment: &str) -> bool {
  object_path.last().is_some_and(|n| n == segment)
}

fn find_entity<'a>(types: &'a [TypeDefinition], path: &[String]) -> Option<Entity<'a>> {
  let (head, rest) = path.split_first()?;
  let ty = types.iter().find(|t| last_segment_matches(&t.name.name.object_path, head))?;
  if rest.is_empty() {
    return Some(Entity::Type(ty));
  }
  if rest.len() == 1 {
    let leaf = &rest[0];
    if let Some(structure) = ty.as_structure() {
      if let Some(field) = structure.fields.iter().find(|f| last_segment_matches(&f.name.name.object_path, leaf)) {
        return Some(Entity::Field(field));
      }
    }
    if let Some(e) = ty.as_enum() {
      if let Some(value) = e.values.iter().find(|v| last_segment_matches(&v.name.name.object_path, leaf)) {
        return Some(Entity::EnumValue(value));
      }
    }
    if let Some(param) = ty.runtime_parameters.iter().find(|p| last_segment_matches(&p.name.name.object_path, leaf)) {
      return Some(Entity::Parameter(param));
    }
  }
  find_entity(&ty.subtypes, rest)
}

fn find_type_by_path<'a>(types: &'a [TypeDefinition], path: &[String]) -> Option<&'a TypeDefinition> {
  let (head, rest) = path.split_first()?;
  let ty = types.iter().find(|t| t.name.name.object_path.last().is_some_and(|n| n == head))?;
  if rest.is_empty() { Some(ty) } else { find_type_by_path(&ty.subtypes, rest) }
}

fn find_type_by_path_mut<'a>(types: &'a mut [TypeDefinition], path: &[String]) -> Option<&'a mut TypeDefinition> {
  let (head, rest) = path.split_first()?;
  let ty = types.iter_mut().find(|t| t.name.name.object_path.last().is_some_and(|n| n == head))?;
  if rest.is_empty() { Some(ty) } else { find_type_by_path_mut(&mut ty.subtypes, rest) }
}
