// src/lib.rs
//! Kyra Compiler - abaissement AST → bytecode + encodage KBC
//!
//! - Entrée : `kyra_ast::Program` (ou directement un source via [`compile`])
//! - Sortie : un [`Module`] KBC (fonctions + chunk principal)
//! - Registre de fonctions : table dense, vidée à chaque compilation ;
//!   l'indice d'enregistrement est le fnID référencé par le bytecode
//! - Protocole d'émission par fonction : chunk neuf, arguments internés
//!   comme constantes-noms, corps, `RET` final garanti, puis référence
//!   du fnID dans le chunk parent
//!
//! Features :
//! - `std` (par défaut)
//! - `serde` (propage la sérialisation aux crates amont)
//!
//! API principale :
//! ```ignore
//! use kyra_compiler::compile_to_bytes;
//!
//! let bytes = compile_to_bytes("let x = 1\nreturn x\n")?;
//! std::fs::write("out.kbc", bytes)?;
//! ```

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, vec::Vec};

use core::fmt;

use kyra_ast as ast;
use kyra_core::bytecode::{Chunk, ConstValue, Module, Op};
use kyra_core::EncodeError;
use kyra_parser::SyntaxError;

// ─────────────────────────────────────────────────────────────────────────────
/* Erreurs */
// ─────────────────────────────────────────────────────────────────────────────

/// Erreur globale de compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Le source ne passe pas l'analyse lexicale ou syntaxique.
    Syntax(SyntaxError),
    /// Un littéral entier déborde de `i32`.
    IntOutOfRange {
        /// Texte du littéral.
        literal: String,
    },
    /// Un littéral numérique est malformé (AST construit à la main).
    InvalidNumber {
        /// Texte du littéral.
        literal: String,
    },
    /// L'encodage binaire du module a échoué.
    Encode(EncodeError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax(e) => write!(f, "{e}"),
            CompileError::IntOutOfRange { literal } => {
                write!(f, "integer literal `{literal}` does not fit in i32")
            }
            CompileError::InvalidNumber { literal } => {
                write!(f, "malformed number literal `{literal}`")
            }
            CompileError::Encode(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Syntax(e) => Some(e),
            CompileError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyntaxError> for CompileError {
    fn from(e: SyntaxError) -> Self {
        CompileError::Syntax(e)
    }
}

impl From<EncodeError> for CompileError {
    fn from(e: EncodeError) -> Self {
        CompileError::Encode(e)
    }
}

type CompileResult<T> = core::result::Result<T, CompileError>;

// ─────────────────────────────────────────────────────────────────────────────
/* Registre de fonctions */
// ─────────────────────────────────────────────────────────────────────────────

/// Une fonction enregistrée : nom, paramètres, chunk compilé.
#[derive(Debug, Clone)]
pub struct FuncRecord {
    /// Nom déclaré.
    pub name: String,
    /// Noms des paramètres, dans l'ordre de déclaration.
    pub params: Vec<String>,
    /// Corps compilé.
    pub chunk: Chunk,
}

/// Table des fonctions d'une compilation.
///
/// L'indice d'un enregistrement est son fnID : dense, stable, dans l'ordre
/// d'enregistrement. Une fonction imbriquée est enregistrée avant celle qui
/// la contient, puisque son corps est compilé d'abord.
#[derive(Debug, Default)]
pub struct FuncRegistry {
    records: Vec<FuncRecord>,
}

impl FuncRegistry {
    /// Table vide.
    pub fn new() -> Self {
        Self::default()
    }

    /// Vide la table.
    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Enregistre une fonction et retourne son fnID.
    pub fn register(&mut self, record: FuncRecord) -> u32 {
        self.records.push(record);
        (self.records.len() - 1) as u32
    }

    /// Nombre de fonctions enregistrées.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Vrai si la table est vide.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Enregistrement associé à `id`.
    pub fn get(&self, id: u32) -> Option<&FuncRecord> {
        self.records.get(id as usize)
    }

    /// Tous les enregistrements, indexés par fnID.
    pub fn records(&self) -> &[FuncRecord] {
        &self.records
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Émission */
// ─────────────────────────────────────────────────────────────────────────────

/// Chunk en cours d'émission + mémo nom → slot de constante.
struct ChunkBuilder {
    chunk: Chunk,
    names: BTreeMap<String, u32>,
}

impl ChunkBuilder {
    fn new() -> Self {
        Self { chunk: Chunk::new(), names: BTreeMap::new() }
    }

    /// Slot du nom `name`, interné à la première demande.
    fn name_slot(&mut self, name: &str) -> u32 {
        if let Some(&slot) = self.names.get(name) {
            return slot;
        }
        let slot = self.chunk.add_const(ConstValue::Str(String::from(name)));
        self.names.insert(String::from(name), slot);
        slot
    }
}

/// Corps d'une fonction selon sa forme syntaxique.
enum FnBody<'a> {
    Block(&'a [ast::Stmt]),
    Expr(&'a ast::Expr),
}

/// Abaisse les instructions dans un chunk, en enregistrant au passage les
/// fonctions rencontrées.
struct Emitter<'r> {
    registry: &'r mut FuncRegistry,
}

impl Emitter<'_> {
    fn compile_block(&mut self, b: &mut ChunkBuilder, stmts: &[ast::Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.compile_stmt(b, stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, b: &mut ChunkBuilder, stmt: &ast::Stmt) -> CompileResult<()> {
        match stmt {
            // Les imports sont une affaire de front-end, `pass` ne produit rien.
            ast::Stmt::Use(_) | ast::Stmt::Pass => {}
            ast::Stmt::Exit => b.chunk.emit(Op::Halt),
            ast::Stmt::Let { name, value } => {
                self.compile_expr(b, value)?;
                let slot = b.name_slot(name);
                b.chunk.emit_with(Op::Store, slot);
                b.chunk.emit(Op::Pop);
            }
            ast::Stmt::Return(value) => {
                self.compile_expr(b, value)?;
                b.chunk.emit(Op::Ret);
            }
            ast::Stmt::Expr(expr) => {
                self.compile_expr(b, expr)?;
                b.chunk.emit(Op::Pop);
            }
            ast::Stmt::If { condition, then_block, else_block } => {
                self.compile_expr(b, condition)?;
                let to_else = b.chunk.emit_jump(Op::JumpIfFalse);
                self.compile_block(b, then_block)?;
                if let Some(else_stmts) = else_block {
                    let to_end = b.chunk.emit_jump(Op::Jump);
                    let else_at = b.chunk.here();
                    b.chunk.patch_u32(to_else, else_at);
                    self.compile_block(b, else_stmts)?;
                    let end = b.chunk.here();
                    b.chunk.patch_u32(to_end, end);
                } else {
                    let end = b.chunk.here();
                    b.chunk.patch_u32(to_else, end);
                }
            }
            ast::Stmt::While { condition, body } => {
                let top = b.chunk.here();
                self.compile_expr(b, condition)?;
                let to_end = b.chunk.emit_jump(Op::JumpIfFalse);
                self.compile_block(b, body)?;
                b.chunk.emit_with(Op::Jump, top);
                let end = b.chunk.here();
                b.chunk.patch_u32(to_end, end);
            }
            ast::Stmt::For { var, limit, body } => {
                // Compteur initialisé à zéro ; borne réévaluée à chaque tour.
                let zero = b.chunk.add_const(ConstValue::I32(0));
                b.chunk.emit_with(Op::Const, zero);
                let slot = b.name_slot(var);
                b.chunk.emit_with(Op::Store, slot);
                b.chunk.emit(Op::Pop);

                let top = b.chunk.here();
                b.chunk.emit_with(Op::Load, slot);
                self.compile_expr(b, limit)?;
                b.chunk.emit(Op::Lt);
                let to_end = b.chunk.emit_jump(Op::JumpIfFalse);
                self.compile_block(b, body)?;

                b.chunk.emit_with(Op::Load, slot);
                let one = b.chunk.add_const(ConstValue::I32(1));
                b.chunk.emit_with(Op::Const, one);
                b.chunk.emit(Op::Add);
                b.chunk.emit_with(Op::Store, slot);
                b.chunk.emit(Op::Pop);
                b.chunk.emit_with(Op::Jump, top);
                let end = b.chunk.here();
                b.chunk.patch_u32(to_end, end);
            }
            ast::Stmt::DefFunc(decl) | ast::Stmt::BraceFunc(decl) => {
                let id =
                    self.compile_function(&decl.name, &decl.params, FnBody::Block(&decl.body))?;
                push_fn_id(b, id);
            }
            ast::Stmt::OneLinerFunc(decl) => {
                let id =
                    self.compile_function(&decl.name, &decl.params, FnBody::Expr(&decl.expr))?;
                push_fn_id(b, id);
            }
        }
        Ok(())
    }

    /// Compile une fonction dans un chunk neuf et retourne son fnID.
    fn compile_function(
        &mut self,
        name: &str,
        params: &[ast::Param],
        body: FnBody<'_>,
    ) -> CompileResult<u32> {
        let mut b = ChunkBuilder::new();

        // Les arguments deviennent des variables locales nommées.
        let mut args = Vec::new();
        for param in params {
            b.name_slot(&param.name);
            args.push(param.name.clone());
        }

        match body {
            FnBody::Block(stmts) => self.compile_block(&mut b, stmts)?,
            FnBody::Expr(expr) => self.compile_expr(&mut b, expr)?,
        }

        // Retour garanti en fin de chunk.
        b.chunk.emit(Op::Ret);

        Ok(self.registry.register(FuncRecord {
            name: String::from(name),
            params: args,
            chunk: b.chunk,
        }))
    }

    fn compile_expr(&mut self, b: &mut ChunkBuilder, expr: &ast::Expr) -> CompileResult<()> {
        match expr {
            ast::Expr::Ident(name) => {
                let slot = b.name_slot(name);
                b.chunk.emit_with(Op::Load, slot);
            }
            ast::Expr::Number(text) => push_number(b, text, false)?,
            ast::Expr::Str(text) => {
                let slot = b.chunk.add_const(ConstValue::Str(text.clone()));
                b.chunk.emit_with(Op::Const, slot);
            }
            ast::Expr::Bool(value) => {
                let slot = b.chunk.add_const(ConstValue::I32(i32::from(*value)));
                b.chunk.emit_with(Op::Const, slot);
            }
            ast::Expr::Unary { op, expr } => {
                // Replie le signe dans le littéral entier, pour que
                // `-2147483648` reste écrivable.
                if matches!(op, ast::UnaryOp::Neg) {
                    if let ast::Expr::Number(text) = &**expr {
                        if !text.contains('.') {
                            return push_number(b, text, true);
                        }
                    }
                }
                self.compile_expr(b, expr)?;
                b.chunk.emit(match op {
                    ast::UnaryOp::Neg => Op::Neg,
                    ast::UnaryOp::Not => Op::Not,
                });
            }
            ast::Expr::Binary { left, op, right } => {
                self.compile_expr(b, left)?;
                self.compile_expr(b, right)?;
                b.chunk.emit(binary_op(*op));
            }
            ast::Expr::Assign { name, value } => {
                self.compile_expr(b, value)?;
                let slot = b.name_slot(name);
                b.chunk.emit_with(Op::Store, slot);
            }
            ast::Expr::Call { func, args } => {
                self.compile_expr(b, func)?;
                for arg in args {
                    self.compile_expr(b, arg)?;
                }
                b.chunk.emit_with(Op::Call, args.len() as u32);
            }
            ast::Expr::Member { object, name } => {
                self.compile_expr(b, object)?;
                let slot = b.name_slot(name);
                b.chunk.emit_with(Op::GetAttr, slot);
            }
            ast::Expr::Paren(inner) => self.compile_expr(b, inner)?,
        }
        Ok(())
    }
}

/// Référence une fonction fraîchement enregistrée dans le chunk parent.
fn push_fn_id(b: &mut ChunkBuilder, id: u32) {
    let slot = b.chunk.add_const(ConstValue::I32(id as i32));
    b.chunk.emit_with(Op::Const, slot);
}

const fn binary_op(op: ast::BinaryOp) -> Op {
    match op {
        ast::BinaryOp::Add => Op::Add,
        ast::BinaryOp::Sub => Op::Sub,
        ast::BinaryOp::Mul => Op::Mul,
        ast::BinaryOp::Div => Op::Div,
        ast::BinaryOp::Mod => Op::Mod,
        ast::BinaryOp::Eq => Op::Eq,
        ast::BinaryOp::Ne => Op::Ne,
        ast::BinaryOp::Lt => Op::Lt,
        ast::BinaryOp::Le => Op::Le,
        ast::BinaryOp::Gt => Op::Gt,
        ast::BinaryOp::Ge => Op::Ge,
        ast::BinaryOp::And => Op::And,
        ast::BinaryOp::Or => Op::Or,
    }
}

/// Matérialise un littéral numérique.
fn push_number(b: &mut ChunkBuilder, text: &str, negate: bool) -> CompileResult<()> {
    if text.contains('.') {
        let value: f64 = text.parse().map_err(|_| CompileError::InvalidNumber {
            literal: String::from(text),
        })?;
        let slot = b.chunk.add_const(ConstValue::F64(if negate { -value } else { value }));
        b.chunk.emit_with(Op::Const, slot);
        return Ok(());
    }

    let wide = match text.parse::<i64>() {
        Ok(v) => v,
        Err(_) if !text.is_empty() && text.bytes().all(|c| c.is_ascii_digit()) => {
            return Err(CompileError::IntOutOfRange { literal: String::from(text) });
        }
        Err(_) => {
            return Err(CompileError::InvalidNumber { literal: String::from(text) });
        }
    };
    let wide = if negate { -wide } else { wide };
    let value = i32::try_from(wide)
        .map_err(|_| CompileError::IntOutOfRange { literal: String::from(text) })?;
    let slot = b.chunk.add_const(ConstValue::I32(value));
    b.chunk.emit_with(Op::Const, slot);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
/* Compiler façade */
// ─────────────────────────────────────────────────────────────────────────────

/// Le compilateur Kyra : registre de fonctions + émission de chunks.
#[derive(Debug, Default)]
pub struct Compiler {
    registry: FuncRegistry,
}

impl Compiler {
    /// Crée un compilateur.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registre rempli par la dernière compilation.
    pub fn registry(&self) -> &FuncRegistry {
        &self.registry
    }

    /// Compile un programme AST → module KBC.
    ///
    /// Le registre est vidé au début de chaque appel ; les imports du
    /// programme ne produisent aucun code.
    pub fn compile_program(&mut self, program: &ast::Program) -> CompileResult<Module> {
        self.registry.reset();

        let mut main = ChunkBuilder::new();
        {
            let mut emitter = Emitter { registry: &mut self.registry };
            emitter.compile_block(&mut main, &program.body)?;
        }

        let functions = self.registry.records().iter().map(|r| r.chunk.clone()).collect();
        Ok(Module { functions, main: main.chunk })
    }
}

/// Compile un source Kyra en module KBC.
pub fn compile(src: &str) -> CompileResult<Module> {
    let program = kyra_parser::parse(src)?;
    Compiler::new().compile_program(&program)
}

/// Compile un source Kyra directement en octets KBC.
pub fn compile_to_bytes(src: &str) -> CompileResult<Vec<u8>> {
    Ok(compile(src)?.to_bytes()?)
}
