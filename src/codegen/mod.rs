//! The C++ back end (§4.H): turns a validated [`crate::ir::module::EmbossIr`]
//! into a generated header.

pub mod cpp;
pub mod literals;
pub mod name_conversion;

use crate::diagnostic::Diagnostic;
use crate::ir::module::EmbossIr;

/// The one configurable surface the core owns: which back end to
/// validate attributes against and whether the generator emits enum
/// text-format traits, mirroring `mmcc`'s struct-of-flags `Config`
/// style rather than a file-backed configuration format (§10).
#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions {
  /// Emit `TryToGetEnumFromName` / `TryToGetNameFromEnum` / `EnumIsKnown`
  /// and the text-format `UpdateFromTextStream` / `WriteToTextStream`
  /// methods (§4.H.4, §4.H.5).
  pub include_enum_traits: bool,
}

impl Default for CodegenOptions {
  fn default() -> Self {
    CodegenOptions { include_enum_traits: true }
  }
}

/// Generates a self-contained C++ header for `ir`'s main module, or a
/// single diagnostic if generation fails (§4.H "Failure semantics":
/// "a (header, empty-errors) pair or (None, errors)").
pub fn generate(ir: &EmbossIr, options: &CodegenOptions) -> Result<String, Diagnostic> {
  cpp::generate(ir, options)
}
