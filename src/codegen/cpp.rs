//! The C++ header generator (§4.H).
//!
//! Structured the way `librustc_mir`'s MIR pretty-printer
//! (`examples/sgtest-megarepo`'s `rustc_mir::util::pretty`) renders a tree
//! to text: a small indent-tracking `Writer` plus `writeln!`-style calls,
//! no templating engine. The teacher (`mmcc`) only emits binary/ELF
//! artifacts, so this module's *shape* is grounded on that pretty-printer
//! instead, per §11.

use std::fmt::Write as _;

use crate::diagnostic::{Diagnostic, SourceLocation};
use crate::ir::attr::Attribute;
use crate::ir::expr::{Builtin, Expression, ExpressionKind, Operator};
use crate::ir::field::{Field, FieldKind, WriteMethod};
use crate::ir::module::{EmbossIr, Entity, Module};
use crate::ir::names::FieldReference;
use crate::ir::types::{Enum, Structure, TypeDefinition, TypeDefinitionKind};
use crate::passes::bounds;

use super::literals;
use super::name_conversion;
use super::CodegenOptions;

const INDENT: &str = "  ";

struct Writer {
  buf: String,
  depth: usize,
}

impl Writer {
  fn new() -> Self {
    Writer { buf: String::new(), depth: 0 }
  }

  fn line(&mut self, text: &str) {
    for _ in 0..self.depth {
      self.buf.push_str(INDENT);
    }
    self.buf.push_str(text);
    self.buf.push('\n');
  }

  fn blank(&mut self) {
    self.buf.push('\n');
  }

  fn indent(&mut self) {
    self.depth += 1;
  }

  fn dedent(&mut self) {
    self.depth -= 1;
  }

  fn finish(self) -> String {
    self.buf
  }
}

fn find_attr<'a>(attrs: &'a [Attribute], back_end: Option<&str>, name: &str) -> Option<&'a Attribute> {
  attrs.iter().find(|a| a.back_end.as_deref() == back_end && a.name == name)
}

fn attr_str(attrs: &[Attribute], name: &str) -> Option<&str> {
  find_attr(attrs, None, name).and_then(|a| a.value.as_str())
}

fn attr_cpp_str(attrs: &[Attribute], name: &str) -> Option<&str> {
  find_attr(attrs, Some("cpp"), name).and_then(|a| a.value.as_str())
}

fn attr_const(attrs: &[Attribute], name: &str, ir: &EmbossIr) -> Option<i128> {
  find_attr(attrs, None, name).and_then(|a| a.value.as_expression()).and_then(|e| bounds::try_constant_fold(e, ir))
}

fn attr_bool(attrs: &[Attribute], name: &str, ir: &EmbossIr) -> Option<bool> {
  find_attr(attrs, None, name).and_then(|a| a.value.as_expression()).map(|e| e.constant_bool().unwrap_or(false) || bounds::try_constant_fold(e, ir) == Some(1))
}

/// Generates a self-contained C++ header for `ir`'s main module.
pub fn generate(ir: &EmbossIr, options: &CodegenOptions) -> Result<String, Diagnostic> {
  let module = ir.main_module();
  let namespace = resolve_namespace(module)?;
  let include_enum_traits = options.include_enum_traits;

  let mut body = Writer::new();
  for ty in &module.types {
    write_top_level_type(&mut body, ty, ir, include_enum_traits);
  }

  let mut out = String::new();
  let guard = name_conversion::header_guard(&module.source_file_name);
  let _ = writeln!(out, "// GENERATED, DO NOT EDIT.");
  let _ = writeln!(out, "#ifndef {guard}");
  let _ = writeln!(out, "#define {guard}");
  let _ = writeln!(out);
  for import in &module.imports {
    if import.is_prelude() {
      let _ = writeln!(out, "#include \"runtime/cpp/emboss_prelude.h\"");
      if include_enum_traits {
        let _ = writeln!(out, "#include \"runtime/cpp/emboss_enum_view.h\"");
        let _ = writeln!(out, "#include \"runtime/cpp/emboss_text_util.h\"");
      }
    } else if !import.file_name.is_empty() {
      let _ = writeln!(out, "#include \"{}.h\"", strip_emb_suffix(&import.file_name));
    }
  }
  let _ = writeln!(out, "#include <algorithm>");
  let _ = writeln!(out, "#include <cstdint>");
  let _ = writeln!(out);
  for (depth, component) in namespace.iter().enumerate() {
    let _ = writeln!(out, "{}namespace {} {{", INDENT.repeat(depth), component);
  }
  out.push_str(&body.finish());
  for (depth, component) in namespace.iter().enumerate().rev() {
    let _ = writeln!(out, "{}}}  // namespace {}", INDENT.repeat(depth), component);
  }
  let _ = writeln!(out);
  let _ = writeln!(out, "#endif  // {guard}");
  Ok(out)
}

fn strip_emb_suffix(file_name: &str) -> &str {
  file_name.strip_suffix(".emb").unwrap_or(file_name)
}

/// Resolves and validates `(cpp) namespace`, defaulting to
/// `emboss_generated_code` when absent (§4.H.1).
fn resolve_namespace(module: &Module) -> Result<Vec<String>, Diagnostic> {
  let namespace_str = attr_cpp_str(&module.attributes, "namespace").unwrap_or("emboss_generated_code");
  name_conversion::split_namespace(namespace_str)
    .map_err(|msg| Diagnostic::new(module.source_file_name.clone(), SourceLocation::synthetic(), msg))
}

fn write_top_level_type(w: &mut Writer, ty: &TypeDefinition, ir: &EmbossIr, enum_traits: bool) {
  match &ty.kind {
    TypeDefinitionKind::Enum(e) => write_enum(w, ty, e, ir, enum_traits),
    TypeDefinitionKind::Structure(s) => write_structure(w, ty, s, ir, enum_traits),
    TypeDefinitionKind::External(_) => {}
  }
  w.blank();
}

fn type_name(ty: &TypeDefinition) -> String {
  ty.name.name.object_path.last().cloned().unwrap_or_default()
}

// --- Enums (§4.H.4) --------------------------------------------------

fn write_enum(w: &mut Writer, ty: &TypeDefinition, e: &Enum, ir: &EmbossIr, enum_traits: bool) {
  let name = type_name(ty);
  let maximum_bits = attr_const(&ty.attributes, "maximum_bits", ir).unwrap_or(64) as u32;
  let is_signed = attr_bool(&ty.attributes, "is_signed", ir).unwrap_or(false);
  let underlying = literals::cpp_integer_type_for_enum(maximum_bits, is_signed);

  w.line(&format!("enum class {name} : {underlying} {{"));
  w.indent();
  for value in &e.values {
    let value_name = value.name.name.object_path.last().cloned().unwrap_or_default();
    let literal = value.value.constant_value().map(literals::render_integer).unwrap_or_else(|| "0".to_string());
    w.line(&format!("{value_name} = {literal},"));
  }
  w.dedent();
  w.line("};");

  if !enum_traits {
    return;
  }
  w.blank();
  w.line(&format!("inline bool EnumIsKnown({name} value) {{"));
  w.indent();
  w.line("switch (value) {");
  for value in &e.values {
    let value_name = value.name.name.object_path.last().cloned().unwrap_or_default();
    w.line(&format!("  case {name}::{value_name}: return true;"));
  }
  w.line("  default: return false;");
  w.line("}");
  w.dedent();
  w.line("}");

  w.blank();
  w.line(&format!("inline bool TryToGetNameFromEnum({name} value, ::std::string *name_out) {{"));
  w.indent();
  w.line("switch (value) {");
  for value in first_named_per_numeric_value(e) {
    let value_name = value.name.name.object_path.last().cloned().unwrap_or_default();
    let rendered_name = enum_case_names(&value.attributes, &ty.attributes, &value_name)[0].clone();
    w.line(&format!("  case {name}::{value_name}: *name_out = \"{rendered_name}\"; return true;"));
  }
  w.line("  default: return false;");
  w.line("}");
  w.dedent();
  w.line("}");

  w.blank();
  w.line(&format!("inline bool TryToGetEnumFromName(::std::string name, {name} *value_out) {{"));
  w.indent();
  for value in &e.values {
    let value_name = value.name.name.object_path.last().cloned().unwrap_or_default();
    for alias in enum_case_names(&value.attributes, &ty.attributes, &value_name) {
      w.line(&format!("if (name == \"{alias}\") {{ *value_out = {name}::{value_name}; return true; }}"));
    }
  }
  w.line("return false;");
  w.dedent();
  w.line("}");
}

fn first_named_per_numeric_value(e: &Enum) -> Vec<&crate::ir::types::EnumValue> {
  let mut seen = std::collections::HashSet::new();
  let mut out = Vec::new();
  for value in &e.values {
    if let Some(v) = value.value.constant_value() {
      if seen.insert(v) {
        out.push(value);
      }
    }
  }
  out
}

/// Every name by which an enum value may be looked up: the declared
/// name itself, plus one conversion per comma-separated `enum_case`
/// (defaulting to the enum's, or the module's, `enum_case`), per §4.H.4.
fn enum_case_names(value_attrs: &[Attribute], enum_attrs: &[Attribute], declared_name: &str) -> Vec<String> {
  let mut names = vec![declared_name.to_string()];
  let cases = attr_cpp_str(value_attrs, "enum_case").or_else(|| attr_cpp_str(enum_attrs, "enum_case"));
  if let Some(cases) = cases {
    for case in cases.split(',').map(str::trim).filter(|s| !s.is_empty()) {
      match case {
        "kCamelCase" => names.push(name_conversion::to_k_camel_case(declared_name)),
        "CamelCase" => names.push(name_conversion::to_camel_case(declared_name)),
        "SHOUTY_CASE" => {}
        _ => {}
      }
    }
  }
  names
}

// --- Structures and bits (§4.H.5) ------------------------------------

fn write_structure(w: &mut Writer, ty: &TypeDefinition, s: &Structure, ir: &EmbossIr, enum_traits: bool) {
  let name = type_name(ty);
  w.line(&format!("template <typename Storage>"));
  w.line(&format!("class {name}View {{"));
  w.line(" public:");
  w.indent();

  write_constructor(w, &name, ty);
  w.blank();

  let (anonymous, named): (Vec<&Field>, Vec<&Field>) = s.fields.iter().partition(|f| f.name.is_anonymous);
  let mut ok_terms: Vec<String> = Vec::new();
  if !anonymous.is_empty() {
    w.dedent();
    w.line(" private:");
    w.indent();
    for field in &anonymous {
      ok_terms.extend(write_field_accessor(w, field, ir));
    }
    w.dedent();
    w.line(" public:");
    w.indent();
  }
  for field in &named {
    ok_terms.extend(write_field_accessor(w, field, ir));
  }

  write_ok(w, ty, &ok_terms, ir);
  write_size_accessors(w, ty, s, ir);
  write_equals(w, s);
  if enum_traits {
    write_text_format(w, s);
  }

  w.dedent();
  w.line("};");

  for sub in &ty.subtypes {
    write_top_level_type(w, sub, ir, enum_traits);
  }
}

fn write_constructor(w: &mut Writer, name: &str, ty: &TypeDefinition) {
  if ty.runtime_parameters.is_empty() {
    w.line(&format!("explicit {name}View(Storage storage) : storage_{{storage}} {{}}"));
    w.line(&format!("{name}View() = default;"));
    return;
  }
  let params: Vec<String> = ty
    .runtime_parameters
    .iter()
    .map(|p| {
      let pname = p.name.name.object_path.last().cloned().unwrap_or_default();
      format!("::std::int64_t {pname}")
    })
    .collect();
  let init: Vec<String> = ty
    .runtime_parameters
    .iter()
    .map(|p| {
      let pname = p.name.name.object_path.last().cloned().unwrap_or_default();
      format!("{pname}_{{{pname}}}")
    })
    .collect();
  w.line(&format!("{name}View(Storage storage, {}) : storage_{{storage}}, {}, parameters_initialized_{{true}} {{}}", params.join(", "), init.join(", ")));
  w.line(&format!("{name}View() = default;"));
}

/// Writes this field's accessor method(s) and returns this field's
/// contribution to the enclosing structure's `Ok()` AND, if any (§4.H.5
/// "`Ok()` returning the AND of all field `Ok()`s"). A field gated by an
/// `existence_condition` contributes a term that is vacuously true when
/// the field is not present, rather than reflecting the raw,
/// not-necessarily-meaningful bytes underneath it.
fn write_field_accessor(w: &mut Writer, field: &Field, ir: &EmbossIr) -> Option<String> {
  let accessor = field_accessor_name(field);
  match field.write_method.as_ref() {
    Some(WriteMethod::Alias(target)) => Some(write_alias_accessor(w, &accessor, target, field, ir)),
    _ => match &field.kind {
      FieldKind::Physical { location, type_ref } => Some(write_physical_accessor(w, &accessor, location, type_ref, field, ir)),
      FieldKind::Virtual { read_transform } => {
        write_virtual_accessor(w, &accessor, read_transform, field, ir);
        None
      }
    },
  }
}

fn field_accessor_name(field: &Field) -> String {
  name_conversion::to_camel_case(field.name.name.object_path.last().map(String::as_str).unwrap_or(""))
}

/// Renders `term`, a field's own (unconditional) `Ok()` expression, gated
/// by `field`'s `existence_condition` if it has one: `!exists || term`,
/// so a non-existent field's contribution to the enclosing `Ok()` is
/// vacuously true (§4.H.5, spec.md scenario 3).
fn existence_gate(field: &Field, ir: &EmbossIr, term: String) -> String {
  match &field.existence_condition {
    Some(cond) => format!("(!({}) || {term})", render_expr(cond, "this", ir)),
    None => term,
  }
}

fn write_physical_accessor(w: &mut Writer, accessor: &str, location: &crate::ir::field::FieldLocation, _type_ref: &crate::ir::types::Type, field: &Field, ir: &EmbossIr) -> String {
  let start = render_expr(&location.start, "this", ir);
  let size = render_expr(&location.size, "this", ir);
  w.line(&format!("auto {accessor}() const {{"));
  w.indent();
  w.line(&format!("return ::emboss::support::OffsetStorageType<Storage>(storage_, {start}, {size});"));
  w.dedent();
  w.line("}");
  // Physical fields are written through their own getter's view (the
  // returned adapter is itself writable); no separate setter is emitted.
  existence_gate(field, ir, format!("{accessor}().Ok()"))
}

fn write_alias_accessor(w: &mut Writer, accessor: &str, target: &FieldReference, field: &Field, ir: &EmbossIr) -> String {
  let chain = field_reference_chain(target);
  w.line(&format!("auto {accessor}() const {{ return {chain}(); }}"));
  existence_gate(field, ir, format!("{accessor}().Ok()"))
}

fn write_virtual_accessor(w: &mut Writer, accessor: &str, read_transform: &Expression, field: &Field, ir: &EmbossIr) {
  let body = render_expr(read_transform, "this", ir);
  let is_const = read_transform.is_constant() && field.existence_condition.as_ref().map_or(true, Expression::is_constant);
  let qualifier = if is_const { "constexpr " } else { "" };
  w.line(&format!("{qualifier}auto {accessor}() const {{"));
  w.indent();
  w.line(&format!("return {body};"));
  w.dedent();
  w.line("}");

  if let Some(WriteMethod::Transform { function_body, destination }) = &field.write_method {
    let destination_chain = field_reference_chain(destination);
    let inverse = render_expr_with_logical_value(function_body, "this", "value", ir);
    let ty = literals::cpp_integer_type_for_value(read_transform.constant_value().unwrap_or(0)).unwrap_or("::std::int64_t");
    w.line(&format!("void Set{accessor}({ty} value) {{"));
    w.indent();
    w.line(&format!("{destination_chain}().Write({inverse});"));
    w.dedent();
    w.line("}");
  }

  if let Some(requires) = find_attr(&field.attributes, None, "requires").and_then(|a| a.value.as_expression()) {
    let predicate = render_expr(requires, "this", ir);
    w.blank();
    w.line(&format!("class {accessor}Validator {{"));
    w.line(" public:");
    w.indent();
    w.line(&format!("static bool ValueIsOk(decltype({accessor}()) emboss_reserved_local_value) {{"));
    w.indent();
    w.line(&format!("return {predicate};"));
    w.dedent();
    w.line("}");
    w.dedent();
    w.line("};");
  }
}

fn field_reference_chain(fr: &FieldReference) -> String {
  let mut out = String::from("this");
  for reference in &fr.path {
    let component = reference.source_name.last().map(|s| s.as_str()).unwrap_or_default();
    let _ = write!(out, "->{}()", name_conversion::to_camel_case(&component));
  }
  out
}

fn write_ok(w: &mut Writer, ty: &TypeDefinition, field_ok_terms: &[String], ir: &EmbossIr) {
  w.blank();
  w.line("bool Ok() const {");
  w.indent();
  let mut terms: Vec<String> = Vec::new();
  if !ty.runtime_parameters.is_empty() {
    terms.push("parameters_initialized_".to_string());
  }
  terms.extend(field_ok_terms.iter().cloned());
  if let Some(requires) = find_attr(&ty.attributes, None, "requires").and_then(|a| a.value.as_expression()) {
    terms.push(render_expr(requires, "this", ir));
  }
  if terms.is_empty() {
    w.line("return true;");
  } else {
    w.line(&format!("return {};", terms.join(" && ")));
  }
  w.dedent();
  w.line("}");
}

/// Renders a field's end offset (`start + size`, in bits) as a plain
/// integer expression, gated by its `existence_condition` when present
/// (a field that doesn't exist contributes no size).
fn field_end_offset_in_bits(field: &Field, location: &crate::ir::field::FieldLocation, unit_bits: u32, ir: &EmbossIr) -> String {
  let start = render_expr(&location.start, "this", ir);
  let size = render_expr(&location.size, "this", ir);
  let end_offset = format!("((({start}) + ({size})) * {unit_bits})");
  match &field.existence_condition {
    Some(cond) => format!("(({}) ? {end_offset} : 0)", render_expr(cond, "this", ir)),
    None => end_offset,
  }
}

/// Computes a structure's size, in bits, as a runtime expression: the
/// maximum end offset among its physical fields, each gated by its own
/// existence condition (spec.md scenario 3: `1 + $max((kind==1?4:0),
/// (kind==2?8:0), 0)` is the `$max`-of-end-offsets form of this, since
/// `kind` itself contributes a constant floor to the max).
fn render_computed_size_in_bits(s: &Structure, unit_bits: u32, ir: &EmbossIr) -> String {
  let terms: Vec<String> = s
    .fields
    .iter()
    .filter_map(|field| match &field.kind {
      FieldKind::Physical { location, .. } => Some(field_end_offset_in_bits(field, location, unit_bits, ir)),
      FieldKind::Virtual { .. } => None,
    })
    .collect();
  match terms.len() {
    0 => "0".to_string(),
    1 => terms.into_iter().next().unwrap(),
    _ => format!("::std::max<::std::int64_t>({{{}}})", terms.join(", ")),
  }
}

fn write_size_accessors(w: &mut Writer, ty: &TypeDefinition, s: &Structure, ir: &EmbossIr) {
  let unit_bits = ty.addressable_unit.bits();
  w.blank();
  if let Some(fixed_bits) = attr_const(&ty.attributes, "fixed_size_in_bits", ir) {
    w.line(&format!("static constexpr ::std::int64_t IntrinsicSizeInBits() {{ return {fixed_bits}; }}"));
    w.line(&format!("static constexpr ::std::int64_t IntrinsicSizeInBytes() {{ return ({fixed_bits} + 7) / 8; }}"));
  } else {
    let computed = render_computed_size_in_bits(s, unit_bits, ir);
    w.line(&format!("::std::int64_t IntrinsicSizeInBits() const {{ return {computed}; }}"));
    w.line(&format!("::std::int64_t IntrinsicSizeInBytes() const {{ return (IntrinsicSizeInBits() + {}) / {unit_bits}; }}", unit_bits - 1));
  }
}

fn write_equals(w: &mut Writer, s: &Structure) {
  let physical: Vec<&Field> = s.fields.iter().filter(|f| matches!(f.kind, FieldKind::Physical { .. })).collect();
  w.blank();
  w.line("template <typename OtherStorage>");
  w.line("bool Equals(const OtherStorage &other) const {");
  w.indent();
  if physical.is_empty() {
    w.line("return true;");
  } else {
    let comparisons: Vec<String> = physical.iter().map(|f| format!("{}() == other.{}()", field_accessor_name(f), field_accessor_name(f))).collect();
    w.line(&format!("return {};", comparisons.join(" && ")));
  }
  w.dedent();
  w.line("}");
  w.line("template <typename OtherStorage>");
  w.line("bool UncheckedEquals(const OtherStorage &other) const { return Equals(other); }");
}

fn write_text_format(w: &mut Writer, s: &Structure) {
  w.blank();
  w.line("template <typename Stream>");
  w.line("bool UpdateFromTextStream(Stream *stream) {");
  w.indent();
  for field in &s.fields {
    if attr_str(&field.attributes, "text_output") == Some("Skip") || !field.write_method.as_ref().is_some_and(WriteMethod::is_writable) {
      continue;
    }
    w.line(&format!("if (!::emboss::support::UpdateFromTextStream(&stream, {}())) return false;", field_accessor_name(field)));
  }
  w.line("return true;");
  w.dedent();
  w.line("}");
  w.blank();
  w.line("template <typename Stream>");
  w.line("void WriteToTextStream(Stream *stream) const {");
  w.indent();
  for field in &s.fields {
    if attr_str(&field.attributes, "text_output") == Some("Skip") {
      continue;
    }
    w.line(&format!("::emboss::support::WriteToTextStream(stream, {}());", field_accessor_name(field)));
  }
  w.dedent();
  w.line("}");
}

// --- Expression rendering (§4.H.5 "Maybe<T>-lifted operations") ------

fn render_expr(expr: &Expression, receiver: &str, ir: &EmbossIr) -> String {
  render_expr_with_logical_value(expr, receiver, "emboss_reserved_local_value", ir)
}

fn render_expr_with_logical_value(expr: &Expression, receiver: &str, logical_value_name: &str, ir: &EmbossIr) -> String {
  match &expr.kind {
    ExpressionKind::NumericConstant(v) => literals::render_integer(*v),
    ExpressionKind::BooleanConstant(b) => b.to_string(),
    ExpressionKind::ConstantReference(reference) => {
      let name = reference.source_name.last().map(|s| s.as_str()).unwrap_or_default();
      name_conversion::to_camel_case(&name)
    }
    ExpressionKind::FieldReference(fr) => format!("{}().Read()", field_reference_chain_with_receiver(fr, receiver)),
    ExpressionKind::BuiltinReference(Builtin::LogicalValue) => logical_value_name.to_string(),
    ExpressionKind::BuiltinReference(Builtin::StaticSizeInBits | Builtin::IsStaticallySized) => {
      expr.constant_value().map(literals::render_integer).unwrap_or_else(|| "0".to_string())
    }
    ExpressionKind::Function { operator, args } => render_function(*operator, args, receiver, logical_value_name, ir),
  }
}

fn field_reference_chain_with_receiver(fr: &FieldReference, receiver: &str) -> String {
  field_reference_chain_with_receiver_upto(fr, receiver, fr.path.len())
}

/// Renders the chain `receiver->a()->b()...` over the first `count`
/// elements of `fr`'s path (`count == fr.path.len()` for the full chain,
/// `count == fr.path.len() - 1` for the chain up to but excluding the
/// last element, e.g. to evaluate something relative to the immediate
/// parent of a dotted field reference's final component).
fn field_reference_chain_with_receiver_upto(fr: &FieldReference, receiver: &str, count: usize) -> String {
  let mut out = receiver.to_string();
  for reference in &fr.path[..count] {
    let component = reference.source_name.last().map(|s| s.as_str()).unwrap_or_default();
    let _ = write!(out, "->{}()", name_conversion::to_camel_case(&component));
  }
  out
}

/// Renders `$has(field)` as the field's own `existence_condition`
/// expression (spec.md:156, scenario 3), not a read-validity check on the
/// field's own bytes: a field's existence is a property of its *parent*
/// structure (e.g. a sibling discriminant), never of the field's own
/// storage.
fn render_has(fr: &FieldReference, receiver: &str, logical_value_name: &str, ir: &EmbossIr) -> String {
  let field = fr.last().canonical_name.as_ref().and_then(|name| ir.find(name)).and_then(Entity::as_field);
  match field.and_then(|f| f.existence_condition.as_ref()) {
    Some(cond) => {
      let parent_receiver = field_reference_chain_with_receiver_upto(fr, receiver, fr.path.len() - 1);
      render_expr_with_logical_value(cond, &parent_receiver, logical_value_name, ir)
    }
    // No existence_condition means "always present" (§3 "Fields").
    None => "true".to_string(),
  }
}

fn render_function(operator: Operator, args: &[Expression], receiver: &str, logical_value_name: &str, ir: &EmbossIr) -> String {
  let rendered: Vec<String> = args.iter().map(|a| render_expr_with_logical_value(a, receiver, logical_value_name, ir)).collect();
  let support = |name: &str| format!("::emboss::support::{name}({})", rendered.join(", "));
  match operator {
    Operator::Add => support("Sum"),
    Operator::Sub => support("Difference"),
    Operator::Mul => support("Product"),
    Operator::Eq => support("Equal"),
    Operator::Ne => support("NotEqual"),
    Operator::Lt => support("LessThan"),
    Operator::Le => format!("!::emboss::support::LessThan({}, {})", rendered[1], rendered[0]),
    Operator::Gt => format!("::emboss::support::LessThan({}, {})", rendered[1], rendered[0]),
    Operator::Ge => format!("!::emboss::support::LessThan({}, {})", rendered[0], rendered[1]),
    Operator::And => support("And"),
    Operator::Or => support("Or"),
    Operator::Choice => format!("::emboss::support::Choice({}, {}, {})", rendered[0], rendered[1], rendered[2]),
    Operator::Max => format!("::emboss::support::Maximum({{{}}})", rendered.join(", ")),
    Operator::Has => match &args[0].kind {
      ExpressionKind::FieldReference(fr) => render_has(fr, receiver, logical_value_name, ir),
      // Unreachable for a validated IR: §4.C requires `$has`'s one argument
      // to be a field reference.
      _ => "true".to_string(),
    },
    Operator::UpperBound | Operator::LowerBound => rendered.into_iter().next().unwrap_or_default(),
  }
}
