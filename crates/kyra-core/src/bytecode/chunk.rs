//! Core bytecode structures plus the compact KBC chunk roundtrip.
//!
//! A chunk is a constant pool followed by a flat byte array of code. Opcodes
//! are single bytes; the ones that take an operand are followed by a `u32`
//! little-endian immediate. Jump operands are absolute byte offsets into the
//! code array.

use crate::{ByteReader, ByteWriter, DecodeError, EncodeError};

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

use core::{
    hash::{Hash, Hasher},
    mem, slice,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const CONST_TAG_STR: u8 = 0x01;
const CONST_TAG_F64: u8 = 0x02;
const CONST_TAG_I32: u8 = 0x03;

/// Values that can live in the constant pool.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstValue {
    /// UTF-8 string constant (also used for variable and attribute names).
    Str(String),
    /// 64-bit floating point number.
    F64(f64),
    /// 32-bit signed integer.
    I32(i32),
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstValue::Str(a), ConstValue::Str(b)) => a == b,
            (ConstValue::F64(a), ConstValue::F64(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::I32(a), ConstValue::I32(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            ConstValue::Str(s) => s.hash(state),
            ConstValue::F64(v) => v.to_bits().hash(state),
            ConstValue::I32(v) => v.hash(state),
        }
    }
}

/// Constant pool with stable indices (0-based, append-only).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstPool {
    values: Vec<ConstValue>,
}

impl ConstPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Number of stored constants.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate as `(index, &ConstValue)`.
    pub fn iter(&self) -> ConstIter<'_> {
        ConstIter { inner: self.values.iter().enumerate() }
    }

    /// Pushes a value and returns its index. Values are never deduplicated;
    /// callers that want sharing keep their own slot map.
    pub fn add(&mut self, value: ConstValue) -> u32 {
        let idx = self.values.len() as u32;
        self.values.push(value);
        idx
    }

    /// Lookup a constant by index.
    pub fn get(&self, idx: u32) -> Option<&ConstValue> {
        self.values.get(idx as usize)
    }

    /// Remove all constants.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Iterator returned by [`ConstPool::iter`].
pub struct ConstIter<'a> {
    inner: core::iter::Enumerate<slice::Iter<'a, ConstValue>>,
}

impl<'a> Iterator for ConstIter<'a> {
    type Item = (u32, &'a ConstValue);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(idx, value)| (idx as u32, value))
    }
}

impl<'a> IntoIterator for &'a ConstPool {
    type Item = (u32, &'a ConstValue);
    type IntoIter = ConstIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Opcodes understood by the evaluator and the disassembler.
///
/// The container itself treats code as an opaque byte blob; this enum is the
/// contract between the emitter and the tooling layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Do nothing.
    Nop = 0x00,
    /// Push constant `pool[operand]` onto the stack.
    Const = 0x01,
    /// Discard the top of the stack.
    Pop = 0x02,
    /// Push the variable named by `pool[operand]` (a string constant).
    Load = 0x10,
    /// Pop into the variable named by `pool[operand]` (a string constant).
    Store = 0x11,
    /// Pop two values, push their sum (string + string concatenates).
    Add = 0x20,
    /// Pop two values, push the difference.
    Sub = 0x21,
    /// Pop two values, push the product.
    Mul = 0x22,
    /// Pop two values, push the quotient.
    Div = 0x23,
    /// Pop two values, push the remainder.
    Mod = 0x24,
    /// Negate the top of the stack.
    Neg = 0x25,
    /// Pop two values, push 1 if equal else 0.
    Eq = 0x30,
    /// Pop two values, push 1 if different else 0.
    Ne = 0x31,
    /// Pop two values, push 1 if `a < b` else 0.
    Lt = 0x32,
    /// Pop two values, push 1 if `a <= b` else 0.
    Le = 0x33,
    /// Pop two values, push 1 if `a > b` else 0.
    Gt = 0x34,
    /// Pop two values, push 1 if `a >= b` else 0.
    Ge = 0x35,
    /// Logical negation of the top of the stack (truthiness based).
    Not = 0x40,
    /// Pop two values, push 1 if both are truthy else 0 (eager).
    And = 0x41,
    /// Pop two values, push 1 if either is truthy else 0 (eager).
    Or = 0x42,
    /// Unconditional jump to the absolute byte offset `operand`.
    Jump = 0x50,
    /// Pop a value; jump to `operand` when it is falsy.
    JumpIfFalse = 0x51,
    /// Call with `operand` stacked arguments (callee below them).
    Call = 0x60,
    /// Replace the top of the stack by its attribute named `pool[operand]`.
    GetAttr = 0x61,
    /// Return from the chunk; yields the top of the stack when present.
    Ret = 0x70,
    /// Stop execution of the whole program.
    Halt = 0x71,
}

impl Op {
    /// Decode a single opcode byte.
    pub const fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Self::Nop,
            0x01 => Self::Const,
            0x02 => Self::Pop,
            0x10 => Self::Load,
            0x11 => Self::Store,
            0x20 => Self::Add,
            0x21 => Self::Sub,
            0x22 => Self::Mul,
            0x23 => Self::Div,
            0x24 => Self::Mod,
            0x25 => Self::Neg,
            0x30 => Self::Eq,
            0x31 => Self::Ne,
            0x32 => Self::Lt,
            0x33 => Self::Le,
            0x34 => Self::Gt,
            0x35 => Self::Ge,
            0x40 => Self::Not,
            0x41 => Self::And,
            0x42 => Self::Or,
            0x50 => Self::Jump,
            0x51 => Self::JumpIfFalse,
            0x60 => Self::Call,
            0x61 => Self::GetAttr,
            0x70 => Self::Ret,
            0x71 => Self::Halt,
            _ => return None,
        })
    }

    /// Whether the opcode is followed by a `u32` little-endian operand.
    pub const fn has_operand(self) -> bool {
        matches!(
            self,
            Self::Const
                | Self::Load
                | Self::Store
                | Self::Jump
                | Self::JumpIfFalse
                | Self::Call
                | Self::GetAttr
        )
    }

    /// Whether the operand indexes the constant pool.
    pub const fn reads_const(self) -> bool {
        matches!(self, Self::Const | Self::Load | Self::Store | Self::GetAttr)
    }

    /// Assembly-style name.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Const => "CONST",
            Self::Pop => "POP",
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Jump => "JUMP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::Call => "CALL",
            Self::GetAttr => "GET_ATTR",
            Self::Ret => "RET",
            Self::Halt => "HALT",
        }
    }
}

/// Bytecode chunk: a constant pool plus a flat code array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    /// Constant pool associated with the chunk.
    pub consts: ConstPool,
    /// Raw code bytes (opcodes and their operands).
    pub code: Vec<u8>,
}

impl Chunk {
    /// Create an empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constant and return its index.
    pub fn add_const(&mut self, value: ConstValue) -> u32 {
        self.consts.add(value)
    }

    /// Current code offset, the target of a jump landing "here".
    pub fn here(&self) -> u32 {
        self.code.len() as u32
    }

    /// Append a bare opcode.
    pub fn emit(&mut self, op: Op) {
        self.code.push(op as u8);
    }

    /// Append a raw `u32` little-endian immediate.
    pub fn emit_u32(&mut self, v: u32) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    /// Append an opcode with its operand.
    pub fn emit_with(&mut self, op: Op, operand: u32) {
        self.emit(op);
        self.emit_u32(operand);
    }

    /// Append a jump with a placeholder target; returns the operand offset
    /// to hand back to [`Chunk::patch_u32`] once the target is known.
    pub fn emit_jump(&mut self, op: Op) -> usize {
        self.emit(op);
        let at = self.code.len();
        self.emit_u32(u32::MAX);
        at
    }

    /// Overwrite a previously emitted `u32` operand.
    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.code[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Encode the chunk into `w` (constant pool, then code).
    pub fn encode_into(&self, w: &mut ByteWriter) -> Result<(), EncodeError> {
        let const_count = u32::try_from(self.consts.len())
            .map_err(|_| EncodeError::TooLarge { what: "constant pool", len: self.consts.len() })?;
        w.write_u32_le(const_count);
        for (_, value) in &self.consts {
            match value {
                ConstValue::Str(s) => {
                    w.write_u8(CONST_TAG_STR);
                    w.write_str(s)?;
                }
                ConstValue::F64(v) => {
                    w.write_u8(CONST_TAG_F64);
                    w.write_f64_le(*v);
                }
                ConstValue::I32(v) => {
                    w.write_u8(CONST_TAG_I32);
                    w.write_i32_le(*v);
                }
            }
        }

        let code_len = u32::try_from(self.code.len())
            .map_err(|_| EncodeError::TooLarge { what: "code", len: self.code.len() })?;
        w.write_u32_le(code_len);
        w.write_bytes(&self.code);
        Ok(())
    }

    /// Decode a chunk written by [`Chunk::encode_into`].
    ///
    /// Unknown constant tags are fatal. The code array is read verbatim and
    /// not validated here; see [`crate::helpers::validate_chunk`].
    pub fn decode_from(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let mut chunk = Chunk::new();

        let const_count = r.read_u32_le()?;
        for _ in 0..const_count {
            let tag = r.read_u8()?;
            let value = match tag {
                CONST_TAG_STR => ConstValue::Str(r.read_str()?),
                CONST_TAG_F64 => ConstValue::F64(r.read_f64_le()?),
                CONST_TAG_I32 => ConstValue::I32(r.read_i32_le()?),
                other => return Err(DecodeError::UnknownConstTag { tag: other }),
            };
            chunk.consts.add(value);
        }

        let code_len = r.read_u32_le()? as usize;
        chunk.code = r.read_bytes(code_len)?.to_vec();
        Ok(chunk)
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(chunk: &Chunk) -> Chunk {
        let mut w = ByteWriter::new();
        chunk.encode_into(&mut w).unwrap();
        let mut r = ByteReader::new(w.as_slice());
        let back = Chunk::decode_from(&mut r).unwrap();
        assert_eq!(r.remaining(), 0);
        back
    }

    #[test]
    fn empty_chunk_layout() {
        let mut w = ByteWriter::new();
        Chunk::new().encode_into(&mut w).unwrap();
        // constCount = 0, codeLen = 0
        assert_eq!(w.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn const_tags_exact_bytes() {
        let mut chunk = Chunk::new();
        chunk.add_const(ConstValue::Str("hi".into()));
        chunk.add_const(ConstValue::F64(1.5));
        chunk.add_const(ConstValue::I32(-7));
        chunk.emit(Op::Nop);

        let mut w = ByteWriter::new();
        chunk.encode_into(&mut w).unwrap();
        let mut expect = vec![3, 0, 0, 0];
        expect.extend_from_slice(&[0x01, 2, 0, 0, 0, b'h', b'i']);
        expect.push(0x02);
        expect.extend_from_slice(&1.5f64.to_le_bytes());
        expect.push(0x03);
        expect.extend_from_slice(&(-7i32).to_le_bytes());
        expect.extend_from_slice(&[1, 0, 0, 0, 0x00]);
        assert_eq!(w.as_slice(), expect.as_slice());
    }

    #[test]
    fn pool_and_code_roundtrip() {
        let mut chunk = Chunk::new();
        let s = chunk.add_const(ConstValue::Str("x".into()));
        let n = chunk.add_const(ConstValue::I32(41));
        chunk.emit_with(Op::Const, n);
        chunk.emit_with(Op::Store, s);
        chunk.emit_with(Op::Load, s);
        chunk.emit(Op::Ret);

        let back = roundtrip(&chunk);
        assert_eq!(back, chunk);
        assert_eq!(back.consts.get(0), Some(&ConstValue::Str("x".into())));
        assert_eq!(back.code, chunk.code);
    }

    #[test]
    fn negative_ints_survive_the_roundtrip() {
        let mut chunk = Chunk::new();
        chunk.add_const(ConstValue::I32(i32::MIN));
        chunk.add_const(ConstValue::I32(-1));
        let back = roundtrip(&chunk);
        assert_eq!(back.consts.get(0), Some(&ConstValue::I32(i32::MIN)));
        assert_eq!(back.consts.get(1), Some(&ConstValue::I32(-1)));
    }

    #[test]
    fn unknown_const_tag_is_fatal() {
        let mut w = ByteWriter::new();
        w.write_u32_le(1);
        w.write_u8(0x07);
        let err = Chunk::decode_from(&mut ByteReader::new(w.as_slice())).unwrap_err();
        assert_eq!(err, DecodeError::UnknownConstTag { tag: 0x07 });
    }

    #[test]
    fn truncated_constant_is_an_eof() {
        let mut w = ByteWriter::new();
        w.write_u32_le(1);
        w.write_u8(0x01); // string tag
        w.write_u32_le(10); // announces 10 bytes
        w.write_bytes(b"abc");
        let err = Chunk::decode_from(&mut ByteReader::new(w.as_slice())).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { needed: 10, .. }));
    }

    #[test]
    fn float_consts_compare_by_bits() {
        assert_eq!(ConstValue::F64(f64::NAN), ConstValue::F64(f64::NAN));
        assert_ne!(ConstValue::F64(0.0), ConstValue::F64(-0.0));
    }

    #[test]
    fn jump_patching() {
        let mut chunk = Chunk::new();
        let at = chunk.emit_jump(Op::JumpIfFalse);
        chunk.emit(Op::Nop);
        let target = chunk.here();
        chunk.patch_u32(at, target);
        chunk.emit(Op::Halt);

        assert_eq!(chunk.code[0], Op::JumpIfFalse as u8);
        assert_eq!(u32::from_le_bytes([chunk.code[1], chunk.code[2], chunk.code[3], chunk.code[4]]), 6);
        assert_eq!(chunk.code[5], Op::Nop as u8);
        assert_eq!(chunk.code[6], Op::Halt as u8);
    }

    #[test]
    fn every_opcode_roundtrips_through_its_byte() {
        let ops = [
            Op::Nop,
            Op::Const,
            Op::Pop,
            Op::Load,
            Op::Store,
            Op::Add,
            Op::Sub,
            Op::Mul,
            Op::Div,
            Op::Mod,
            Op::Neg,
            Op::Eq,
            Op::Ne,
            Op::Lt,
            Op::Le,
            Op::Gt,
            Op::Ge,
            Op::Not,
            Op::And,
            Op::Or,
            Op::Jump,
            Op::JumpIfFalse,
            Op::Call,
            Op::GetAttr,
            Op::Ret,
            Op::Halt,
        ];
        for op in ops {
            assert_eq!(Op::from_byte(op as u8), Some(op), "{}", op.mnemonic());
        }
        assert_eq!(Op::from_byte(0xFF), None);
    }
}
