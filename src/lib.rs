//! The Emboss semantic middle-end: takes a parsed, unresolved [`EmbossIr`]
//! and runs it through the named passes under [`passes`], then hands the
//! validated tree to [`codegen`] to produce a C++ view-code header.
//!
//! The lexer/parser and the CLI driver that reads `.emb` files from disk
//! are out of scope (§1); this crate's entry point is [`run_pipeline`],
//! which takes an already-parsed tree.

pub mod codegen;
pub mod diagnostic;
pub mod ir;
pub mod passes;
pub mod reserved_words;
pub mod symbol;
pub mod traverse;

use ir::module::EmbossIr;
use diagnostic::{Diagnostic, PassResult};

/// Runs every pass in the order [`passes`] requires, aborting at the
/// first pass that reports diagnostics (§5, §7 "Error accumulation vs.
/// early return": diagnostics accumulate *within* a pass, but the driver
/// never runs a later pass against a tree an earlier pass rejected).
pub fn run_pipeline(ir: &mut EmbossIr) -> PassResult<()> {
  run_pass("resolver", passes::resolver::run, ir)?;
  run_pass("attributes", passes::attributes::run, ir)?;
  run_pass("typeck", passes::typeck::run, ir)?;
  run_pass("bounds", passes::bounds::run, ir)?;
  run_pass("constraints", passes::constraints::run, ir)?;
  run_pass("write_methods", passes::write_methods::run, ir)?;
  Ok(())
}

fn run_pass(name: &'static str, pass: fn(&mut EmbossIr) -> PassResult<()>, ir: &mut EmbossIr) -> PassResult<()> {
  let start = std::time::Instant::now();
  let result = pass(ir);
  match &result {
    Ok(()) => log::debug!("pass {name} completed in {:?}", start.elapsed()),
    Err(diagnostics) => log::debug!("pass {name} aborted with {} diagnostic(s)", diagnostics.len()),
  }
  result
}

/// Runs [`run_pipeline`] and, on success, renders the validated tree to a
/// C++ header via [`codegen::generate`]. This is the one function an
/// out-of-scope CLI driver would call end to end.
pub fn compile_to_cpp(ir: &mut EmbossIr, options: &codegen::CodegenOptions) -> Result<String, Vec<Diagnostic>> {
  run_pipeline(ir)?;
  codegen::generate(ir, options).map_err(|d| vec![d])
}
