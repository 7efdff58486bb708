//! Bytecode primitives (chunk structure, container, validation, disasm, eval).
//!
//! The wire layout lives in [`chunk`] and [`module`]; the remaining modules
//! are tooling conveniences layered on top of the same structures.

/// Chunk representation plus binary roundtrip helpers.
pub mod chunk;
/// KBC container (function table + main chunk).
pub mod module;
pub mod helpers;
pub mod disasm;
pub mod runtime;

pub use chunk::{Chunk, ConstPool, ConstValue, Op};
pub use module::Module;
