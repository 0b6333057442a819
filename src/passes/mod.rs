//! The IR-rewriting passes (§4). Each module here is one named pass; the
//! driver runs them symbol resolution, attribute normalization, type
//! checking, expression bounds, structural constraints, then write-method
//! inference.
//!
//! Resolution runs before attribute normalization rather than after, as
//! the summary table's component letters might suggest: normalization's
//! byte-order inference and struct-size reconciliation (`attributes.rs`)
//! both read a referenced atomic type's `canonical_name`, which only
//! `resolver.rs` populates. Running them in letter order would leave
//! those lookups permanently empty. This matches how
//! `compiler/front_end/glue.py` sequences the two passes in the original
//! tool.
//!
//! `run(&mut EmbossIr) -> PassResult<()>` is the contract shared by every
//! pass (§4.A's generic walker drives all of them); [`crate::run_pipeline`]
//! sequences the calls and aborts on the first pass that returns errors.

pub mod attributes;
pub mod bound_arith;
pub mod bounds;
pub mod constraints;
pub mod resolver;
pub mod typeck;
pub mod write_methods;
