//! Minimal textual disassembly helpers used by the CLI tooling.
//!
//! The walk never fails: unknown opcode bytes are printed as `??? 0xNN` and
//! a truncated trailing operand stops the listing with a note.

use crate::bytecode::chunk::{Chunk, ConstValue, Op};
use crate::bytecode::module::Module;

#[cfg(not(feature = "std"))]
use alloc::{format, string::String};
#[cfg(feature = "std")]
use std::{format, string::String};

use core::fmt::Write;

/// Produce a multi-line, human readable disassembly with metadata.
pub fn disassemble_full(chunk: &Chunk, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== {title} == (consts={}, code bytes={})",
        chunk.consts.len(),
        chunk.code.len()
    );

    if !chunk.consts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, ";; constants");
        for (idx, value) in chunk.consts.iter() {
            let _ = writeln!(out, "const[{idx:04}] = {}", show_const(value));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, ";; code");
    let mut pc = 0usize;
    while pc < chunk.code.len() {
        let byte = chunk.code[pc];
        let Some(op) = Op::from_byte(byte) else {
            let _ = writeln!(out, "{pc:04} | ??? 0x{byte:02X}");
            pc += 1;
            continue;
        };
        if !op.has_operand() {
            let _ = writeln!(out, "{pc:04} | {}", op.mnemonic());
            pc += 1;
            continue;
        }
        let Some(operand) = read_operand(&chunk.code, pc + 1) else {
            let _ = writeln!(out, "{pc:04} | {} <truncated operand>", op.mnemonic());
            break;
        };
        match preview(chunk, op, operand) {
            Some(p) => {
                let _ = writeln!(out, "{pc:04} | {} {operand} ;; {p}", op.mnemonic());
            }
            None => {
                let _ = writeln!(out, "{pc:04} | {} {operand}", op.mnemonic());
            }
        }
        pc += 5;
    }

    out
}

/// One-line-per-op variant used by quick CLI previews.
pub fn disassemble_compact(chunk: &Chunk) -> String {
    let mut out = String::new();
    let mut pc = 0usize;
    while pc < chunk.code.len() {
        let byte = chunk.code[pc];
        let Some(op) = Op::from_byte(byte) else {
            let _ = writeln!(out, "{pc:04}: ??? 0x{byte:02X}");
            pc += 1;
            continue;
        };
        if !op.has_operand() {
            let _ = writeln!(out, "{pc:04}: {}", op.mnemonic());
            pc += 1;
            continue;
        }
        let Some(operand) = read_operand(&chunk.code, pc + 1) else {
            let _ = writeln!(out, "{pc:04}: {} <truncated operand>", op.mnemonic());
            break;
        };
        let _ = writeln!(out, "{pc:04}: {} {operand}", op.mnemonic());
        pc += 5;
    }
    out
}

/// Disassemble every function chunk, then the main chunk.
pub fn disassemble_module(module: &Module, title: &str) -> String {
    let mut out = String::new();
    for (id, function) in module.functions.iter().enumerate() {
        out.push_str(&disassemble_full(function, &format!("{title}: fn #{id}")));
        out.push('\n');
    }
    out.push_str(&disassemble_full(&module.main, &format!("{title}: main")));
    out
}

fn read_operand(code: &[u8], at: usize) -> Option<u32> {
    let bytes = code.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn preview(chunk: &Chunk, op: Op, operand: u32) -> Option<String> {
    if op.reads_const() {
        chunk.consts.get(operand).map(show_const)
    } else if matches!(op, Op::Jump | Op::JumpIfFalse) {
        Some(format!("-> {operand:04}"))
    } else {
        None
    }
}

fn show_const(value: &ConstValue) -> String {
    match value {
        ConstValue::I32(i) => format!("{i}"),
        ConstValue::F64(f) => format!("{f}"),
        ConstValue::Str(s) => {
            if s.chars().count() <= 64 {
                format!("{s:?}")
            } else {
                let head: String = s.chars().take(64).collect();
                format!("{:?}", head + "…")
            }
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
