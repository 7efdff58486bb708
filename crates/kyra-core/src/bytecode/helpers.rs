//! Helper validations reused by tooling.

use crate::bytecode::chunk::{Chunk, ConstValue, Op};
use crate::bytecode::module::Module;

#[cfg(not(feature = "std"))]
use alloc::{format, string::String};
#[cfg(feature = "std")]
use std::{format, string::String};

use core::fmt;

/// A structural defect found in a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateError {
    /// Which chunk failed, when validating a whole module.
    pub chunk: Option<String>,
    /// Offset of the offending instruction.
    pub pc: usize,
    /// What is wrong with it.
    pub message: String,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chunk {
            Some(chunk) => write!(f, "{chunk}: op {} {}", self.pc, self.message),
            None => write!(f, "op {} {}", self.pc, self.message),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidateError {}

fn err(pc: usize, message: String) -> ValidateError {
    ValidateError { chunk: None, pc, message }
}

/// Basic structural validation of a chunk.
///
/// The checks stay lightweight: every byte must decode to an opcode, every
/// operand must be complete, constant references must be in range (and name
/// references must point at string constants), and branch targets must stay
/// inside the code.
pub fn validate_chunk(chunk: &Chunk) -> Result<(), ValidateError> {
    let const_count = chunk.consts.len() as u32;

    let mut pc = 0usize;
    while pc < chunk.code.len() {
        let byte = chunk.code[pc];
        let Some(op) = Op::from_byte(byte) else {
            return Err(err(pc, format!("is not a known opcode (0x{byte:02X})")));
        };
        if !op.has_operand() {
            pc += 1;
            continue;
        }

        let Some(bytes) = chunk.code.get(pc + 1..pc + 5) else {
            return Err(err(pc, String::from("is missing its operand")));
        };
        let operand = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        if op.reads_const() && operand >= const_count {
            return Err(err(
                pc,
                format!("references const {operand} but pool size is {const_count}"),
            ));
        }
        if matches!(op, Op::Load | Op::Store | Op::GetAttr)
            && !matches!(chunk.consts.get(operand), Some(ConstValue::Str(_)))
        {
            return Err(err(pc, format!("expects const {operand} to be a name")));
        }
        if matches!(op, Op::Jump | Op::JumpIfFalse) && operand as usize > chunk.code.len() {
            return Err(err(
                pc,
                format!("jumps to {operand} but code length is {}", chunk.code.len()),
            ));
        }

        pc += 5;
    }

    Ok(())
}

/// Validate every function chunk of a module, then its main chunk.
pub fn validate_module(module: &Module) -> Result<(), ValidateError> {
    for (id, function) in module.functions.iter().enumerate() {
        validate_chunk(function).map_err(|mut e| {
            e.chunk = Some(format!("fn #{id}"));
            e
        })?;
    }
    validate_chunk(&module.main).map_err(|mut e| {
        e.chunk = Some(String::from("main"));
        e
    })
}

/* ─────────────────────────── Tests ─────────────────────────── */
