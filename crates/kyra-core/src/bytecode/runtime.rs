//! A tiny stack interpreter for compiled chunks.
//!
//! This engine covers straight-line code, variables and branches. `STORE`
//! binds the top of stack without popping it, so assignments keep their
//! value as an expression. `CALL` and `GET_ATTR` report
//! [`EvalError::Unsupported`]: the calling convention belongs to the full
//! virtual machine, not to this helper.

use crate::bytecode::chunk::{Chunk, ConstValue, Op};
use crate::bytecode::module::Module;

#[cfg(not(feature = "std"))]
use alloc::{
    collections::BTreeMap,
    string::String,
    vec::Vec,
};
#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, vec::Vec};

use core::fmt;

/* ─────────────────────────── Values ─────────────────────────── */

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// 32-bit signed integer.
    I32(i32),
    /// IEEE-754 double.
    F64(f64),
    /// Immutable string.
    Str(String),
}

impl Value {
    /// `0` and `0.0` are falsy; everything else, strings included, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::I32(i) => *i != 0,
            Value::F64(f) => *f != 0.0,
            Value::Str(_) => true,
        }
    }

    fn from_const(value: &ConstValue) -> Self {
        match value {
            ConstValue::I32(i) => Value::I32(*i),
            ConstValue::F64(f) => Value::F64(*f),
            ConstValue::Str(s) => Value::Str(s.clone()),
        }
    }
}

// Bit-level equality so results containing NaN still compare stable.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(i) => write!(f, "{i}"),
            Value::F64(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/* ─────────────────────────── Errors ─────────────────────────── */

/// Failure modes of the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The code contains a byte that is not an opcode.
    UnknownOpcode {
        /// Offending byte.
        op: u8,
        /// Offset of that byte.
        pc: usize,
    },
    /// The code ends in the middle of an operand.
    TruncatedCode {
        /// Offset of the instruction.
        pc: usize,
    },
    /// An instruction needed more stack values than were available.
    StackUnderflow {
        /// Offset of the instruction.
        pc: usize,
    },
    /// An operand references a constant slot that does not exist.
    BadConst {
        /// Referenced slot.
        slot: u32,
        /// Offset of the instruction.
        pc: usize,
    },
    /// A load/store operand does not reference a string constant.
    BadName {
        /// Referenced slot.
        slot: u32,
        /// Offset of the instruction.
        pc: usize,
    },
    /// A variable was read before being bound.
    UndefinedVar {
        /// Variable name.
        name: String,
    },
    /// A branch target is past the end of the code.
    BadJump {
        /// Requested target.
        target: u32,
        /// Offset of the instruction.
        pc: usize,
    },
    /// Integer division or remainder by zero.
    DivisionByZero {
        /// Offset of the instruction.
        pc: usize,
    },
    /// Operand types do not fit the instruction.
    TypeMismatch {
        /// Mnemonic of the instruction.
        op: &'static str,
        /// Offset of the instruction.
        pc: usize,
    },
    /// The instruction is outside the scope of this engine.
    Unsupported {
        /// What was attempted.
        what: &'static str,
        /// Offset of the instruction.
        pc: usize,
    },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownOpcode { op, pc } => {
                write!(f, "unknown opcode 0x{op:02X} at pc {pc}")
            }
            EvalError::TruncatedCode { pc } => {
                write!(f, "code ends in the middle of an operand at pc {pc}")
            }
            EvalError::StackUnderflow { pc } => write!(f, "stack underflow at pc {pc}"),
            EvalError::BadConst { slot, pc } => {
                write!(f, "op at pc {pc} references const {slot} which does not exist")
            }
            EvalError::BadName { slot, pc } => {
                write!(f, "op at pc {pc} expects const {slot} to be a name")
            }
            EvalError::UndefinedVar { name } => write!(f, "undefined variable `{name}`"),
            EvalError::BadJump { target, pc } => {
                write!(f, "jump to {target} at pc {pc} is out of bounds")
            }
            EvalError::DivisionByZero { pc } => write!(f, "division by zero at pc {pc}"),
            EvalError::TypeMismatch { op, pc } => {
                write!(f, "unsupported operand types for {op} at pc {pc}")
            }
            EvalError::Unsupported { what, pc } => {
                write!(f, "{what} is not supported by the eval engine (pc {pc})")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EvalError {}

/* ─────────────────────────── Interpreter ─────────────────────────── */

/// Execute a chunk and return the value of its `RET`, if any.
///
/// Falling off the end of the code, or hitting `HALT`, yields `None`.
pub fn eval_chunk(chunk: &Chunk) -> Result<Option<Value>, EvalError> {
    let code = &chunk.code;
    let mut stack: Vec<Value> = Vec::new();
    let mut vars: BTreeMap<String, Value> = BTreeMap::new();

    let mut pc = 0usize;
    while pc < code.len() {
        let byte = code[pc];
        let op = Op::from_byte(byte).ok_or(EvalError::UnknownOpcode { op: byte, pc })?;

        let mut next = pc + 1;
        let operand = if op.has_operand() {
            let bytes = code
                .get(pc + 1..pc + 5)
                .ok_or(EvalError::TruncatedCode { pc })?;
            next = pc + 5;
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
        } else {
            0
        };

        match op {
            Op::Nop => {}
            Op::Const => {
                let value = chunk
                    .consts
                    .get(operand)
                    .ok_or(EvalError::BadConst { slot: operand, pc })?;
                stack.push(Value::from_const(value));
            }
            Op::Pop => {
                pop(&mut stack, pc)?;
            }
            Op::Load => {
                let name = const_name(chunk, operand, pc)?;
                let value = vars
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedVar { name: String::from(name) })?;
                stack.push(value);
            }
            Op::Store => {
                let name = const_name(chunk, operand, pc)?;
                let value = stack.last().cloned().ok_or(EvalError::StackUnderflow { pc })?;
                vars.insert(String::from(name), value);
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                let b = pop(&mut stack, pc)?;
                let a = pop(&mut stack, pc)?;
                stack.push(arith(op, a, b, pc)?);
            }
            Op::Eq => {
                let b = pop(&mut stack, pc)?;
                let a = pop(&mut stack, pc)?;
                stack.push(truth(values_eq(&a, &b)));
            }
            Op::Ne => {
                let b = pop(&mut stack, pc)?;
                let a = pop(&mut stack, pc)?;
                stack.push(truth(!values_eq(&a, &b)));
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let b = pop(&mut stack, pc)?;
                let a = pop(&mut stack, pc)?;
                let (Some(x), Some(y)) = (as_f64(&a), as_f64(&b)) else {
                    return Err(EvalError::TypeMismatch { op: op.mnemonic(), pc });
                };
                let holds = match op {
                    Op::Lt => x < y,
                    Op::Le => x <= y,
                    Op::Gt => x > y,
                    _ => x >= y,
                };
                stack.push(truth(holds));
            }
            Op::Not => {
                let value = pop(&mut stack, pc)?;
                stack.push(truth(!value.is_truthy()));
            }
            Op::And => {
                let b = pop(&mut stack, pc)?;
                let a = pop(&mut stack, pc)?;
                stack.push(truth(a.is_truthy() && b.is_truthy()));
            }
            Op::Or => {
                let b = pop(&mut stack, pc)?;
                let a = pop(&mut stack, pc)?;
                stack.push(truth(a.is_truthy() || b.is_truthy()));
            }
            Op::Neg => {
                let value = pop(&mut stack, pc)?;
                stack.push(match value {
                    Value::I32(i) => Value::I32(i.wrapping_neg()),
                    Value::F64(x) => Value::F64(-x),
                    Value::Str(_) => {
                        return Err(EvalError::TypeMismatch { op: op.mnemonic(), pc });
                    }
                });
            }
            Op::Jump => {
                next = jump_target(code.len(), operand, pc)?;
            }
            Op::JumpIfFalse => {
                let cond = pop(&mut stack, pc)?;
                if !cond.is_truthy() {
                    next = jump_target(code.len(), operand, pc)?;
                }
            }
            Op::Call => {
                return Err(EvalError::Unsupported { what: "calling a function", pc });
            }
            Op::GetAttr => {
                return Err(EvalError::Unsupported { what: "member access", pc });
            }
            Op::Ret => return Ok(stack.pop()),
            Op::Halt => return Ok(None),
        }

        pc = next;
    }

    Ok(None)
}

/// Execute the main chunk of a module.
pub fn run_module(module: &Module) -> Result<Option<Value>, EvalError> {
    eval_chunk(&module.main)
}

/* ─────────────────────────── Internals ─────────────────────────── */

fn pop(stack: &mut Vec<Value>, pc: usize) -> Result<Value, EvalError> {
    stack.pop().ok_or(EvalError::StackUnderflow { pc })
}

fn const_name<'c>(chunk: &'c Chunk, slot: u32, pc: usize) -> Result<&'c str, EvalError> {
    match chunk.consts.get(slot) {
        Some(ConstValue::Str(s)) => Ok(s),
        _ => Err(EvalError::BadName { slot, pc }),
    }
}

fn jump_target(code_len: usize, target: u32, pc: usize) -> Result<usize, EvalError> {
    if target as usize > code_len {
        return Err(EvalError::BadJump { target, pc });
    }
    Ok(target as usize)
}

fn truth(holds: bool) -> Value {
    Value::I32(i32::from(holds))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::I32(i) => Some(f64::from(*i)),
        Value::F64(f) => Some(*f),
        Value::Str(_) => None,
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::I32(x), Value::I32(y)) => x == y,
        (Value::F64(x), Value::F64(y)) => x == y,
        (Value::I32(x), Value::F64(y)) | (Value::F64(y), Value::I32(x)) => f64::from(*x) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

fn arith(op: Op, a: Value, b: Value, pc: usize) -> Result<Value, EvalError> {
    match (&a, &b) {
        (Value::I32(x), Value::I32(y)) => {
            let (x, y) = (*x, *y);
            let out = match op {
                Op::Add => x.wrapping_add(y),
                Op::Sub => x.wrapping_sub(y),
                Op::Mul => x.wrapping_mul(y),
                Op::Div => {
                    if y == 0 {
                        return Err(EvalError::DivisionByZero { pc });
                    }
                    x.wrapping_div(y)
                }
                _ => {
                    if y == 0 {
                        return Err(EvalError::DivisionByZero { pc });
                    }
                    x.wrapping_rem(y)
                }
            };
            Ok(Value::I32(out))
        }
        (Value::Str(x), Value::Str(y)) if matches!(op, Op::Add) => {
            let mut s = x.clone();
            s.push_str(y);
            Ok(Value::Str(s))
        }
        _ => {
            let (Some(x), Some(y)) = (as_f64(&a), as_f64(&b)) else {
                return Err(EvalError::TypeMismatch { op: op.mnemonic(), pc });
            };
            let out = match op {
                Op::Add => x + y,
                Op::Sub => x - y,
                Op::Mul => x * y,
                Op::Div => x / y,
                _ => x % y,
            };
            Ok(Value::F64(out))
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
