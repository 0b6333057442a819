//! The IR data model (§3). Nodes are created by the (external) parser,
//! annotated in place by the passes under `crate::passes`, then read
//! exclusively by the generator under `crate::codegen`. No node is ever
//! deleted; the pipeline is strictly additive (§3 "Lifecycle").

pub mod attr;
pub mod expr;
pub mod field;
pub mod module;
pub mod names;
pub mod types;

pub use attr::{Attribute, AttributeValue};
pub use expr::{Bound, Builtin, Expression, ExpressionKind, ExpressionType, IntegerBounds, Modulus, Operator};
pub use field::{Field, FieldKind, FieldLocation, ParameterType, RuntimeParameter, WriteMethod};
pub use module::{EmbossIr, Entity, Import, Module};
pub use names::{CanonicalName, FieldReference, NameDefinition, Reference};
pub use types::{AddressableUnit, ArraySize, ArrayType, AtomicType, Enum, EnumValue, External, Structure, Type, TypeDefinition, TypeDefinitionKind, TypeRefKind};
