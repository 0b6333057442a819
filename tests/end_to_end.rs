//! End-to-end pipeline tests (§8): each test hand-builds an `EmbossIr` the
//! way a parser would have produced it and drives it through
//! [`emboss_core::run_pipeline`] / [`emboss_core::compile_to_cpp`]. There is
//! no parser in this crate (§1), so these trees stand in for `.emb` source.

use emboss_core::codegen::CodegenOptions;
use emboss_core::diagnostic::SourceLocation;
use emboss_core::ir::attr::{Attribute, AttributeValue};
use emboss_core::ir::expr::{Expression, ExpressionKind, Operator};
use emboss_core::ir::field::{Field, FieldKind, FieldLocation, WriteMethod};
use emboss_core::ir::module::{EmbossIr, Module};
use emboss_core::ir::names::{CanonicalName, FieldReference, NameDefinition, Reference};
use emboss_core::ir::types::{AddressableUnit, ArraySize, ArrayType, AtomicType, Structure, Type, TypeDefinition, TypeDefinitionKind, TypeRefKind};
use emboss_core::symbol::intern;

fn loc() -> SourceLocation {
  SourceLocation::synthetic()
}

/// A prelude module declaring `UInt`/`Int`/`Flag` as one-byte-addressable
/// externals, matching the handful of primitives every other fixture here
/// is built against.
fn prelude_module() -> Module {
  let mut types = Vec::new();
  for name in ["UInt", "Int", "Bcd", "Flag"] {
    types.push(TypeDefinition {
      name: NameDefinition::new(CanonicalName::new("", vec![name.to_string()]), loc()),
      attributes: vec![Attribute::new("addressable_unit_size", AttributeValue::Expression(Expression::numeric_constant(1, loc())), loc())],
      docs: vec![],
      subtypes: vec![],
      addressable_unit: AddressableUnit::Bit,
      runtime_parameters: vec![],
      kind: TypeDefinitionKind::External(Default::default()),
    });
  }
  Module { attributes: vec![], types, imports: vec![], source_file_name: String::new() }
}

fn atomic_type_ref(type_name: &str, size_in_bits: Option<i128>) -> Type {
  Type {
    kind: TypeRefKind::Atomic(AtomicType { reference: Reference::new(vec![intern(type_name)], loc()), runtime_arguments: vec![] }),
    size_in_bits: size_in_bits.map(|v| Expression::numeric_constant(v, loc())),
    location: loc(),
  }
}

fn physical_field(struct_name: &str, field_name: &str, start: i128, size: i128, type_name: &str, size_in_bits: i128) -> Field {
  Field {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec![struct_name.to_string(), field_name.to_string()]), loc()),
    abbreviation: None,
    docs: vec![],
    attributes: vec![],
    existence_condition: None,
    write_method: None,
    kind: FieldKind::Physical {
      location: FieldLocation { start: Expression::numeric_constant(start, loc()), size: Expression::numeric_constant(size, loc()) },
      type_ref: atomic_type_ref(type_name, Some(size_in_bits)),
    },
  }
}

/// §8 scenario 1: a fixed-size struct with one `UInt:16` field occupying
/// bytes `[0, 2)`. The struct's `fixed_size_in_bits` attribute must end up
/// as `16`, in *bits*, not `2` (the byte count) -- this is the case the
/// attribute-inference pass previously got wrong.
#[test]
fn fixed_size_struct_infers_byte_correct_size_in_bits() {
  let foo = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Foo".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure {
      fields: vec![physical_field("Foo", "value", 0, 2, "UInt", 16)],
      serialization_order: vec![0],
    }),
  };
  let main = Module { attributes: vec![], types: vec![foo], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  emboss_core::run_pipeline(&mut ir).expect("pipeline should succeed on a well-formed fixed-size struct");

  let foo = ir.find_type(&CanonicalName::new("foo.emb", vec!["Foo".to_string()])).expect("Foo should still resolve");
  let fixed_size = foo
    .attributes
    .iter()
    .find(|a| a.name == "fixed_size_in_bits")
    .and_then(|a| a.value.as_expression())
    .and_then(Expression::constant_value)
    .expect("fixed_size_in_bits should have been inferred");
  assert_eq!(fixed_size, 16, "a 2-byte field must produce a 16-*bit* fixed_size_in_bits, not 2");

  let value = foo.as_structure().unwrap().fields.first().expect("one field");
  assert!(matches!(value.write_method, Some(WriteMethod::Physical)), "a plain physical field writes through directly");

  let header = emboss_core::codegen::generate(&ir, &CodegenOptions::default()).expect("codegen should succeed");
  assert!(header.contains("Foo"));
  assert!(header.contains("16"), "the generated header should surface the 16-bit intrinsic size somewhere");
}

/// §8 scenario 2: a virtual field computed as `physical_field + 1` must
/// have its write transform inverted to `physical_field = logical_value - 1`.
#[test]
fn additive_virtual_field_inverts_to_subtraction() {
  let physical = physical_field("Bar", "raw", 0, 1, "UInt", 8);

  let read_transform = Expression::function(
    Operator::Add,
    vec![
      Expression::new(
        ExpressionKind::FieldReference(FieldReference::new(vec![Reference::new(vec![intern("raw")], loc())], loc())),
        loc(),
      ),
      Expression::numeric_constant(1, loc()),
    ],
    loc(),
  );
  let virtual_field = Field {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Bar".to_string(), "cooked".to_string()]), loc()),
    abbreviation: None,
    docs: vec![],
    attributes: vec![],
    existence_condition: None,
    write_method: None,
    kind: FieldKind::Virtual { read_transform },
  };

  let bar = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Bar".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure { fields: vec![physical, virtual_field], serialization_order: vec![0, 1] }),
  };
  let main = Module { attributes: vec![], types: vec![bar], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  emboss_core::run_pipeline(&mut ir).expect("pipeline should succeed");

  let bar = ir.find_type(&CanonicalName::new("foo.emb", vec!["Bar".to_string()])).unwrap();
  let cooked = bar.as_structure().unwrap().fields.iter().find(|f| f.name.name.object_path.last().unwrap() == "cooked").unwrap();
  match cooked.write_method.as_ref().expect("write method inferred") {
    WriteMethod::Transform { destination, .. } => {
      assert_eq!(destination.last().source_name, vec![intern("raw")]);
    }
    other => panic!("expected an invertible Transform write method, got {other:?}"),
  }
}

/// §8 scenario 3: a field whose presence is gated by another field's value
/// is still type-checked and bounded even though it may not be physically
/// present at runtime.
#[test]
fn conditional_field_is_checked_independent_of_presence() {
  let has_extra = physical_field("Baz", "has_extra", 0, 1, "UInt", 8);
  let mut extra = physical_field("Baz", "extra", 1, 1, "UInt", 8);
  extra.existence_condition = Some(Expression::function(
    Operator::Ne,
    vec![
      Expression::new(
        ExpressionKind::FieldReference(FieldReference::new(vec![Reference::new(vec![intern("has_extra")], loc())], loc())),
        loc(),
      ),
      Expression::numeric_constant(0, loc()),
    ],
    loc(),
  ));

  let baz = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Baz".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure { fields: vec![has_extra, extra], serialization_order: vec![0, 1] }),
  };
  let main = Module { attributes: vec![], types: vec![baz], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  emboss_core::run_pipeline(&mut ir).expect("a conditional field should not by itself fail the pipeline");

  let baz = ir.find_type(&CanonicalName::new("foo.emb", vec!["Baz".to_string()])).unwrap();
  let extra = baz.as_structure().unwrap().fields.iter().find(|f| f.name.name.object_path.last().unwrap() == "extra").unwrap();
  assert!(matches!(extra.write_method, Some(WriteMethod::Physical)));
}

/// §8 scenario 3, continued: codegen for `Baz` exercises the non-constant
/// `IntrinsicSizeInBits()` path (no `fixed_size_in_bits` was inferred, since
/// `extra`'s presence depends on a runtime value) and must render `$has`
/// as the field's own existence condition rather than a read-validity
/// check, and gate `extra`'s contribution to `Ok()` by that same condition.
#[test]
fn conditional_field_struct_compiles_to_gated_accessors() {
  let has_extra = physical_field("Baz", "has_extra", 0, 1, "UInt", 8);
  let mut extra = physical_field("Baz", "extra", 1, 1, "UInt", 8);
  extra.existence_condition = Some(Expression::function(
    Operator::Ne,
    vec![
      Expression::new(
        ExpressionKind::FieldReference(FieldReference::new(vec![Reference::new(vec![intern("has_extra")], loc())], loc())),
        loc(),
      ),
      Expression::numeric_constant(0, loc()),
    ],
    loc(),
  ));

  let baz = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Baz".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure { fields: vec![has_extra, extra], serialization_order: vec![0, 1] }),
  };
  let main = Module { attributes: vec![], types: vec![baz], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  let header = emboss_core::compile_to_cpp(&mut ir, &CodegenOptions::default()).expect("a conditional field must still generate a compilable header");

  assert!(header.contains("std::max"), "a struct without a fixed_size_in_bits must compute IntrinsicSizeInBits() at runtime via $max over gated end offsets");
  assert!(!header.contains("ComputedSizeInBits"), "IntrinsicSizeInBits() must never call an undefined ComputedSizeInBits()");
  assert!(header.contains("!(") && header.contains("Extra().Ok()"), "extra's Ok() contribution must be gated by its existence condition");
}

/// §8 scenario 4: two anonymous imports that both define the same
/// top-level name make any reference to that name ambiguous.
#[test]
fn colliding_anonymous_imports_are_ambiguous() {
  use emboss_core::ir::module::Import;

  let make_external = |file: &str, name: &str| TypeDefinition {
    name: NameDefinition::new(CanonicalName::new(file, vec![name.to_string()]), loc()),
    attributes: vec![Attribute::new("addressable_unit_size", AttributeValue::Expression(Expression::numeric_constant(1, loc())), loc())],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Bit,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::External(Default::default()),
  };

  let a = Module { attributes: vec![], types: vec![make_external("a.emb", "Shared")], imports: vec![], source_file_name: "a.emb".to_string() };
  let b = Module { attributes: vec![], types: vec![make_external("b.emb", "Shared")], imports: vec![], source_file_name: "b.emb".to_string() };

  let bits = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Thing".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure {
      fields: vec![physical_field("Thing", "value", 0, 1, "Shared", 8)],
      serialization_order: vec![0],
    }),
  };
  let main = Module {
    attributes: vec![],
    types: vec![bits],
    imports: vec![
      Import { file_name: "a.emb".to_string(), local_name: String::new(), location: loc() },
      Import { file_name: "b.emb".to_string(), local_name: String::new(), location: loc() },
    ],
    source_file_name: "foo.emb".to_string(),
  };
  let mut ir = EmbossIr { modules: vec![main, a, b, prelude_module()] };

  let result = emboss_core::run_pipeline(&mut ir);
  let errors = result.expect_err("two colliding anonymous imports must be reported as ambiguous");
  assert!(errors.iter().any(|d| d.message.contains("ambiguous")), "expected an ambiguity diagnostic, got {errors:?}");
}

/// §8 scenario 5: an enum value outside its declared backing-type range is
/// rejected by the structural-constraints pass.
#[test]
fn enum_value_out_of_declared_range_is_rejected() {
  use emboss_core::ir::types::{Enum, EnumValue};

  let status = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Status".to_string()]), loc()),
    attributes: vec![Attribute::new("maximum_bits", AttributeValue::Expression(Expression::numeric_constant(2, loc())), loc())],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Enum(Enum {
      values: vec![
        EnumValue { name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Status".to_string(), "OK".to_string()]), loc()), value: Expression::numeric_constant(0, loc()), docs: vec![], attributes: vec![] },
        EnumValue { name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Status".to_string(), "TOO_BIG".to_string()]), loc()), value: Expression::numeric_constant(9000, loc()), docs: vec![], attributes: vec![] },
      ],
    }),
  };
  let main = Module { attributes: vec![], types: vec![status], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  let result = emboss_core::run_pipeline(&mut ir);
  assert!(result.is_err(), "an enum value that cannot fit in its declared maximum_bits must be rejected");
}

/// §8 scenario 6: combining a full-range unsigned 64-bit field with a
/// full-range signed 64-bit field produces a value that fits neither
/// `int64_t` nor `uint64_t`; the 64-bit safety sweep must reject it rather
/// than silently picking one.
#[test]
fn mixed_sign_64_bit_combination_is_rejected() {
  let unsigned = physical_field("Wide", "a", 0, 8, "UInt", 64);
  let signed = physical_field("Wide", "b", 8, 8, "Int", 64);

  let combined = Field {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Wide".to_string(), "combined".to_string()]), loc()),
    abbreviation: None,
    docs: vec![],
    attributes: vec![],
    existence_condition: None,
    write_method: None,
    kind: FieldKind::Virtual {
      read_transform: Expression::function(
        Operator::Max,
        vec![
          Expression::new(ExpressionKind::FieldReference(FieldReference::new(vec![Reference::new(vec![intern("a")], loc())], loc())), loc()),
          Expression::new(ExpressionKind::FieldReference(FieldReference::new(vec![Reference::new(vec![intern("b")], loc())], loc())), loc()),
        ],
        loc(),
      ),
    },
  };

  let ty = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Wide".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure { fields: vec![unsigned, signed, combined], serialization_order: vec![0, 1, 2] }),
  };
  let main = Module { attributes: vec![], types: vec![ty], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  let result = emboss_core::run_pipeline(&mut ir);
  let errors = result.expect_err("a $max of a full-range UInt:64 and a full-range Int:64 fits neither int64_t nor uint64_t");
  assert!(!errors.is_empty());
}

/// The one true entry point used by an out-of-scope CLI driver: running the
/// full pipeline and codegen together on a minimal well-formed program.
#[test]
fn compile_to_cpp_end_to_end() {
  let foo = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Foo".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure {
      fields: vec![physical_field("Foo", "value", 0, 2, "UInt", 16)],
      serialization_order: vec![0],
    }),
  };
  let main = Module { attributes: vec![], types: vec![foo], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  let header = emboss_core::compile_to_cpp(&mut ir, &CodegenOptions::default()).expect("end-to-end compile should succeed");
  assert!(header.contains("class"), "a generated header should define at least one view class");
}

/// An array field whose element size never folds to a constant leaves the
/// containing structure without an inferred `fixed_size_in_bits`, rather
/// than asserting a wrong one (§4.F "fields whose end offset depends on a
/// runtime parameter").
#[test]
fn variable_size_array_field_is_not_assigned_a_fixed_size() {
  let array_field = Field {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Packet".to_string(), "payload".to_string()]), loc()),
    abbreviation: None,
    docs: vec![],
    attributes: vec![],
    existence_condition: None,
    write_method: None,
    kind: FieldKind::Physical {
      location: FieldLocation { start: Expression::numeric_constant(0, loc()), size: Expression::numeric_constant(1, loc()) },
      type_ref: Type {
        kind: TypeRefKind::Array(ArrayType { element: Box::new(atomic_type_ref("UInt", Some(8))), size: ArraySize::Automatic }),
        size_in_bits: None,
        location: loc(),
      },
    },
  };
  let packet = TypeDefinition {
    name: NameDefinition::new(CanonicalName::new("foo.emb", vec!["Packet".to_string()]), loc()),
    attributes: vec![],
    docs: vec![],
    subtypes: vec![],
    addressable_unit: AddressableUnit::Byte,
    runtime_parameters: vec![],
    kind: TypeDefinitionKind::Structure(Structure { fields: vec![array_field], serialization_order: vec![0] }),
  };
  let main = Module { attributes: vec![], types: vec![packet], imports: vec![], source_file_name: "foo.emb".to_string() };
  let mut ir = EmbossIr { modules: vec![main, prelude_module()] };

  emboss_core::run_pipeline(&mut ir).expect("a variable-size array field should not by itself fail the pipeline");

  let packet = ir.find_type(&CanonicalName::new("foo.emb", vec!["Packet".to_string()])).unwrap();
  assert!(packet.attributes.iter().all(|a| a.name != "fixed_size_in_bits"), "a structure with an automatic-size array must not get a guessed fixed size");
}
