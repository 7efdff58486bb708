//! kyra-parser — parseur du langage Kyra
//!
//! Branches :
//! - `kyra-lexer` pour la tokenisation (jetons `NEWLINE`/`INDENT`/`DEDENT` compris)
//! - `kyra-ast` pour l'AST cible
//!
//! Grammaire (essentiel) :
//! ```text
//! program      := NEWLINE* use_decl* stmt*
//! use_decl     := "use" ("sdt" "/")? ident ("/" ident)*
//! stmt         := "let" ident "=" expr
//!               | "return" expr
//!               | "exit" | "pass"
//!               | "if" expr block ("else" block)?
//!               | "while" expr block
//!               | "for" ident expr block
//!               | "def" ident params ("->" type)? ":" indent_block
//!               | "func" ident params ("->" type)? ("=" expr | brace_block)
//!               | expr
//! block        := ":" indent_block | brace_block
//! indent_block := INDENT stmt* DEDENT
//! brace_block  := "{" stmt* "}"
//! params       := "(" (param ("," param)*)? ")"
//! param        := ident (":" type)?
//! type         := "i32" | "i64" | "f32" | "f64" | "bool" | "string" | "void"
//!
//! expr         := pratt_expression
//! primary      := ident | NUMBER | STRING | "true" | "false" | "(" expr ")"
//! postfix      := primary ( "(" args? ")" | "." ident )*
//! ```
//!
//! Les deux styles de blocs s'imbriquent librement : un corps indenté peut
//! contenir un bloc `{ }` et inversement. Dans un bloc `{ }`, les jetons
//! structurels (`NEWLINE`/`INDENT`/`DEDENT`) sont ignorés; dans un bloc
//! indenté, c'est le `DEDENT` qui ferme.
//!
//! Exemple éclair :
//! ```
//! let prog = kyra_parser::parse("let x = 1 + 2\n").unwrap();
//! assert_eq!(prog.body.len(), 1);
//! ```

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/* ─────────────────────────── Imports / alloc ─────────────────────────── */

#[cfg(not(feature = "std"))]
extern crate alloc;

use core::fmt;

#[cfg(feature = "std")]
use std::{boxed::Box, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
    vec::Vec,
};

use kyra_ast as ast;
use kyra_lexer::{Keyword, LexError, Lexer, Token, TokenKind};

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur de parsing avec numéro de ligne.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Ligne source fautive (1-based).
    pub line: u32,
    /// Message humain.
    pub message: String,
}

impl ParseError {
    fn new(line: u32, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at line {}: {}", self.line, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

/// Erreur de syntaxe : phase lexicale ou grammaticale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// La tokenisation a échoué.
    Lex(LexError),
    /// Le parsing a échoué.
    Parse(ParseError),
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SyntaxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Lex(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<LexError> for SyntaxError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

impl From<ParseError> for SyntaxError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

type PResult<T> = core::result::Result<T, ParseError>;

/* ─────────────────────────── API de commodité ─────────────────────────── */

/// Tokenise puis parse `src` en un module nommé `main`.
pub fn parse(src: &str) -> Result<ast::Program, SyntaxError> {
    let toks = Lexer::new(src).tokenize()?;
    let prog = Parser::new(&toks).parse_program()?;
    Ok(prog)
}

/* ─────────────────────────── Parser ─────────────────────────── */

/// Parser Kyra sur une tranche de jetons.
pub struct Parser<'a> {
    toks: &'a [Token<'a>],
    pos: usize,
    /// Ligne rapportée si on lit au-delà du dernier jeton.
    eof_line: u32,
}

impl<'a> Parser<'a> {
    /// Crée un parser. `toks` provient de [`kyra_lexer::Lexer::tokenize`]
    /// (le dernier jeton est `Eof`).
    pub fn new(toks: &'a [Token<'a>]) -> Self {
        let eof_line = toks.last().map_or(1, |t| t.line);
        Self { toks, pos: 0, eof_line }
    }

    /// Parse un module complet. Les `use` viennent d'abord, puis les
    /// instructions top-level; le module s'appelle `main`.
    pub fn parse_program(&mut self) -> PResult<ast::Program> {
        let mut prog = ast::Program::new("main");
        self.skip_newlines();
        while self.at_kw(Keyword::Use) {
            prog.imports.push(self.parse_use()?);
            self.skip_newlines();
        }
        loop {
            self.skip_newlines();
            if self.at(TokenKind::Eof) {
                break;
            }
            prog.body.push(self.parse_stmt()?);
        }
        Ok(prog)
    }

    /* ─────────── Imports ─────────── */

    fn parse_use(&mut self) -> PResult<ast::UseDecl> {
        self.bump(); // `use`
        let mut first = self.expect_ident()?.to_string();
        let mut is_stdlib = false;
        if first == "sdt" && self.at(TokenKind::Slash) {
            is_stdlib = true;
            self.bump();
            first = self.expect_ident()?.to_string();
        }
        let mut path = Vec::new();
        path.push(first);
        while self.at(TokenKind::Slash) {
            self.bump();
            path.push(self.expect_ident()?.to_string());
        }
        Ok(ast::UseDecl { path, is_stdlib })
    }

    /* ─────────── Instructions ─────────── */

    fn parse_stmt(&mut self) -> PResult<ast::Stmt> {
        match self.peek().kind {
            TokenKind::Kw(Keyword::Let) => self.parse_let(),
            TokenKind::Kw(Keyword::Return) => {
                self.bump();
                Ok(ast::Stmt::Return(self.parse_expr()?))
            }
            TokenKind::Kw(Keyword::Exit) => {
                self.bump();
                Ok(ast::Stmt::Exit)
            }
            TokenKind::Kw(Keyword::Pass) => {
                self.bump();
                Ok(ast::Stmt::Pass)
            }
            TokenKind::Kw(Keyword::If) => self.parse_if(),
            TokenKind::Kw(Keyword::While) => self.parse_while(),
            TokenKind::Kw(Keyword::For) => self.parse_for(),
            TokenKind::Kw(Keyword::Def) => self.parse_def(),
            TokenKind::Kw(Keyword::Func) => self.parse_func(),
            TokenKind::Kw(Keyword::Use) => {
                Err(self.err_here("`use` declarations must appear before any statement"))
            }
            ref k if starts_expr(k) => Ok(ast::Stmt::Expr(self.parse_expr()?)),
            _ => Err(self.err_expected("a statement")),
        }
    }

    fn parse_let(&mut self) -> PResult<ast::Stmt> {
        self.bump(); // `let`
        let name = self.expect_ident()?.to_string();
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(ast::Stmt::Let { name, value })
    }

    fn parse_if(&mut self) -> PResult<ast::Stmt> {
        self.bump(); // `if`
        let condition = self.parse_expr()?;
        let then_block = self.parse_block()?;
        // Le `else` suit immédiatement le bloc, dans l'un ou l'autre style.
        let else_block = if self.at_kw(Keyword::Else) {
            self.bump();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(ast::Stmt::If { condition, then_block, else_block })
    }

    fn parse_while(&mut self) -> PResult<ast::Stmt> {
        self.bump(); // `while`
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(ast::Stmt::While { condition, body })
    }

    fn parse_for(&mut self) -> PResult<ast::Stmt> {
        self.bump(); // `for`
        let var = self.expect_ident()?.to_string();
        let limit = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(ast::Stmt::For { var, limit, body })
    }

    fn parse_def(&mut self) -> PResult<ast::Stmt> {
        self.bump(); // `def`
        let name = self.expect_ident()?.to_string();
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_indented_block()?;
        Ok(ast::Stmt::DefFunc(ast::FuncDecl { name, params, return_type, body }))
    }

    fn parse_func(&mut self) -> PResult<ast::Stmt> {
        self.bump(); // `func`
        let name = self.expect_ident()?.to_string();
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        match self.peek().kind {
            TokenKind::Assign => {
                self.bump();
                let expr = self.parse_expr()?;
                Ok(ast::Stmt::OneLinerFunc(ast::FuncExpr { name, params, return_type, expr }))
            }
            TokenKind::LBrace => {
                let body = self.parse_brace_block()?;
                Ok(ast::Stmt::BraceFunc(ast::FuncDecl { name, params, return_type, body }))
            }
            _ => Err(self.err_expected("`=` or `{`")),
        }
    }

    fn parse_params(&mut self) -> PResult<Vec<ast::Param>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let name = self.expect_ident()?.to_string();
                let ty = if self.at(TokenKind::Colon) {
                    self.bump();
                    Some(self.parse_type()?)
                } else {
                    None
                };
                params.push(ast::Param { name, ty });
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_return_type(&mut self) -> PResult<Option<ast::Type>> {
        if self.at(TokenKind::Arrow) {
            self.bump();
            Ok(Some(self.parse_type()?))
        } else {
            Ok(None)
        }
    }

    fn parse_type(&mut self) -> PResult<ast::Type> {
        let ty = match self.peek().kind {
            TokenKind::Kw(Keyword::I32) => ast::Type::I32,
            TokenKind::Kw(Keyword::I64) => ast::Type::I64,
            TokenKind::Kw(Keyword::F32) => ast::Type::F32,
            TokenKind::Kw(Keyword::F64) => ast::Type::F64,
            TokenKind::Kw(Keyword::Bool) => ast::Type::Bool,
            TokenKind::Kw(Keyword::Str) => ast::Type::Str,
            TokenKind::Kw(Keyword::Void) => ast::Type::Void,
            _ => return Err(self.err_expected("a type")),
        };
        self.bump();
        Ok(ty)
    }

    /* ─────────── Blocs ─────────── */

    /// Corps d'un `if`/`while`/`for`/`else` : `:` + bloc indenté, ou `{ }`.
    fn parse_block(&mut self) -> PResult<Vec<ast::Stmt>> {
        match self.peek().kind {
            TokenKind::Colon => {
                self.bump();
                self.parse_indented_block()
            }
            TokenKind::LBrace => self.parse_brace_block(),
            _ => Err(self.err_expected("`:` or `{`")),
        }
    }

    /// Bloc indenté : consomme le `DEDENT` fermant.
    fn parse_indented_block(&mut self) -> PResult<Vec<ast::Stmt>> {
        self.skip_newlines();
        self.expect(TokenKind::Indent)?;
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek().kind {
                TokenKind::Dedent => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => return Err(self.err_expected("dedent")),
                _ => stmts.push(self.parse_stmt()?),
            }
        }
        Ok(stmts)
    }

    /// Bloc `{ }` : les jetons structurels y sont ignorés, ce qui permet
    /// d'indenter librement le contenu.
    fn parse_brace_block(&mut self) -> PResult<Vec<ast::Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent => {
                    self.bump();
                }
                TokenKind::Eof => return Err(self.err_expected("`}`")),
                _ => stmts.push(self.parse_stmt()?),
            }
        }
        Ok(stmts)
    }

    /* ─────────── Expressions (Pratt) ─────────── */

    fn parse_expr(&mut self) -> PResult<ast::Expr> {
        self.parse_prec(0)
    }

    // Priorités (1..=14) : `=` tout en bas, associatif à droite.
    fn parse_prec(&mut self, min_bp: u8) -> PResult<ast::Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            if self.at(TokenKind::Assign) {
                if ASSIGN_BP.0 < min_bp {
                    break;
                }
                let line = self.bump().line;
                let value = self.parse_prec(ASSIGN_BP.1)?;
                match lhs {
                    ast::Expr::Ident(name) => {
                        lhs = ast::Expr::Assign { name, value: Box::new(value) };
                    }
                    _ => return Err(ParseError::new(line, "invalid assignment target")),
                }
                continue;
            }

            let Some(op) = infix_op(&self.peek().kind) else { break };
            let (lbp, rbp) = precedence(op);
            if lbp < min_bp {
                break;
            }
            self.bump();

            let rhs = self.parse_prec(rbp)?;
            lhs = ast::Expr::Binary { left: Box::new(lhs), op, right: Box::new(rhs) };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<ast::Expr> {
        if self.at(TokenKind::Minus) {
            self.bump();
            let e = self.parse_unary()?;
            return Ok(ast::Expr::Unary { op: ast::UnaryOp::Neg, expr: Box::new(e) });
        }
        if self.at(TokenKind::Bang) {
            self.bump();
            let e = self.parse_unary()?;
            return Ok(ast::Expr::Unary { op: ast::UnaryOp::Not, expr: Box::new(e) });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<ast::Expr> {
        let mut e = self.parse_primary()?;
        loop {
            if self.at(TokenKind::LParen) {
                // appel
                self.bump();
                let mut args = Vec::new();
                if !self.at(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.at(TokenKind::Comma) {
                            self.bump();
                            continue;
                        }
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                e = ast::Expr::Call { func: Box::new(e), args };
                continue;
            }
            if self.at(TokenKind::Dot) {
                self.bump();
                let name = self.expect_ident()?.to_string();
                e = ast::Expr::Member { object: Box::new(e), name };
                continue;
            }
            break;
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> PResult<ast::Expr> {
        let t = self.peek();
        match t.kind {
            TokenKind::Ident(s) => {
                self.bump();
                Ok(ast::Expr::Ident(s.to_string()))
            }
            TokenKind::Number(s) => {
                self.bump();
                Ok(ast::Expr::Number(s.to_string()))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(ast::Expr::Str(s.to_string()))
            }
            TokenKind::Kw(Keyword::True) => {
                self.bump();
                Ok(ast::Expr::Bool(true))
            }
            TokenKind::Kw(Keyword::False) => {
                self.bump();
                Ok(ast::Expr::Bool(false))
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(ast::Expr::Paren(Box::new(e)))
            }
            _ => Err(self.err_expected("an expression")),
        }
    }

    /* ─────────── Utilitaires ─────────── */

    #[inline]
    fn peek(&self) -> Token<'a> {
        self.toks
            .get(self.pos)
            .copied()
            .unwrap_or(Token { kind: TokenKind::Eof, line: self.eof_line })
    }

    #[inline]
    fn bump(&mut self) -> Token<'a> {
        let t = self.peek();
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    #[inline]
    fn at(&self, kind: TokenKind<'static>) -> bool {
        token_eq(&self.peek().kind, &kind)
    }

    #[inline]
    fn at_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek().kind, TokenKind::Kw(k) if k == kw)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.bump();
        }
    }

    fn expect(&mut self, kind: TokenKind<'static>) -> PResult<Token<'a>> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.err_expected(kind))
        }
    }

    fn expect_ident(&mut self) -> PResult<&'a str> {
        if let TokenKind::Ident(s) = self.peek().kind {
            self.bump();
            Ok(s)
        } else {
            Err(self.err_expected("an identifier"))
        }
    }

    fn err_expected(&self, what: impl fmt::Display) -> ParseError {
        let t = self.peek();
        ParseError::new(t.line, format!("expected {what} but got {}", t.kind))
    }

    fn err_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.peek().line, message)
    }
}

/* ─────────────────────────── Opérateurs & helpers ─────────────────────────── */

/// Binding power de `=` (associatif à droite : rbp < lbp).
const ASSIGN_BP: (u8, u8) = (2, 1);

fn infix_op(kind: &TokenKind<'_>) -> Option<ast::BinaryOp> {
    use ast::BinaryOp::*;
    Some(match kind {
        TokenKind::OrOr => Or,
        TokenKind::AndAnd => And,
        TokenKind::EqEq => Eq,
        TokenKind::Ne => Ne,
        TokenKind::Lt => Lt,
        TokenKind::Le => Le,
        TokenKind::Gt => Gt,
        TokenKind::Ge => Ge,
        TokenKind::Plus => Add,
        TokenKind::Minus => Sub,
        TokenKind::Star => Mul,
        TokenKind::Slash => Div,
        TokenKind::Percent => Mod,
        _ => return None,
    })
}

fn precedence(op: ast::BinaryOp) -> (u8, u8) {
    // Pratt binding power (gauche-associatif)
    use ast::BinaryOp::*;
    match op {
        Or => (3, 4),
        And => (5, 6),
        Eq | Ne => (7, 8),
        Lt | Le | Gt | Ge => (9, 10),
        Add | Sub => (11, 12),
        Mul | Div | Mod => (13, 14),
    }
}

fn starts_expr(kind: &TokenKind<'_>) -> bool {
    matches!(
        kind,
        TokenKind::Ident(_)
            | TokenKind::Number(_)
            | TokenKind::Str(_)
            | TokenKind::LParen
            | TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::Kw(Keyword::True | Keyword::False)
    )
}

fn token_eq(a: &TokenKind<'_>, b: &TokenKind<'_>) -> bool {
    use TokenKind::*;
    match (a, b) {
        (Eof, Eof)
        | (Newline, Newline)
        | (Indent, Indent)
        | (Dedent, Dedent)
        | (LParen, LParen)
        | (RParen, RParen)
        | (LBrace, LBrace)
        | (RBrace, RBrace)
        | (Comma, Comma)
        | (Dot, Dot)
        | (Colon, Colon)
        | (Arrow, Arrow)
        | (Plus, Plus)
        | (Minus, Minus)
        | (Star, Star)
        | (Slash, Slash)
        | (Percent, Percent)
        | (Assign, Assign)
        | (EqEq, EqEq)
        | (Ne, Ne)
        | (Lt, Lt)
        | (Le, Le)
        | (Gt, Gt)
        | (Ge, Ge)
        | (AndAnd, AndAnd)
        | (OrOr, OrOr)
        | (Bang, Bang) => true,
        (Kw(ka), Kw(kb)) => ka == kb,
        _ => false,
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(src: &str) -> ast::Program {
        parse(src).expect("parse ok")
    }

    fn expr_stmt(src: &str) -> ast::Expr {
        let mut prog = parse_ok(src);
        assert_eq!(prog.body.len(), 1, "expected a single statement");
        match prog.body.remove(0) {
            ast::Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn empty_module() {
        let prog = parse_ok("");
        assert_eq!(prog.name, "main");
        assert!(prog.imports.is_empty());
        assert!(prog.body.is_empty());
        assert!(parse_ok("\n\n\n").body.is_empty());
    }

    #[test]
    fn use_head() {
        let prog = parse_ok("use sdt/io/file\nuse app/config\n\nlet x = 1\n");
        assert_eq!(prog.imports.len(), 2);
        assert!(prog.imports[0].is_stdlib);
        assert_eq!(prog.imports[0].path, vec!["io", "file"]);
        assert_eq!(prog.imports[0].to_string(), "use sdt/io/file");
        assert!(!prog.imports[1].is_stdlib);
        assert_eq!(prog.imports[1].path, vec!["app", "config"]);
        assert_eq!(prog.body.len(), 1);
    }

    #[test]
    fn use_without_slash_is_plain() {
        let prog = parse_ok("use sdt\n");
        assert!(!prog.imports[0].is_stdlib);
        assert_eq!(prog.imports[0].path, vec!["sdt"]);
    }

    #[test]
    fn use_after_statement_is_rejected() {
        let err = parse("let x = 1\nuse a/b\n").unwrap_err();
        let SyntaxError::Parse(e) = err else { panic!("expected parse error") };
        assert_eq!(e.line, 2);
        assert!(e.message.contains("use"));
    }

    #[test]
    fn let_and_assignment() {
        let prog = parse_ok("let x = 1\nx = x + 2\n");
        assert!(matches!(&prog.body[0], ast::Stmt::Let { name, .. } if name == "x"));
        let ast::Stmt::Expr(ast::Expr::Assign { name, value }) = &prog.body[1] else {
            panic!("expected assignment, got {:?}", prog.body[1]);
        };
        assert_eq!(name, "x");
        assert!(matches!(**value, ast::Expr::Binary { op: ast::BinaryOp::Add, .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let e = expr_stmt("a = b = 1\n");
        let ast::Expr::Assign { name, value } = e else { panic!("expected assignment") };
        assert_eq!(name, "a");
        assert!(matches!(*value, ast::Expr::Assign { .. }));
    }

    #[test]
    fn assignment_target_must_be_an_identifier() {
        let err = parse("1 = 2\n").unwrap_err();
        let SyntaxError::Parse(e) = err else { panic!("expected parse error") };
        assert!(e.message.contains("assignment"));
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        let e = expr_stmt("1 + 2 * 3\n");
        let ast::Expr::Binary { left, op, right } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::Add);
        assert!(matches!(*left, ast::Expr::Number(ref n) if n == "1"));
        assert!(matches!(*right, ast::Expr::Binary { op: ast::BinaryOp::Mul, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let e = expr_stmt("a - b - c\n");
        let ast::Expr::Binary { left, op, .. } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::Sub);
        assert!(matches!(*left, ast::Expr::Binary { op: ast::BinaryOp::Sub, .. }));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let e = expr_stmt("a || b && c\n");
        let ast::Expr::Binary { op, right, .. } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::Or);
        assert!(matches!(*right, ast::Expr::Binary { op: ast::BinaryOp::And, .. }));
    }

    #[test]
    fn comparison_sits_between_arith_and_equality() {
        // a + 1 < b == true  ≡  ((a + 1) < b) == true
        let e = expr_stmt("a + 1 < b == true\n");
        let ast::Expr::Binary { left, op, right } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::Eq);
        assert!(matches!(*right, ast::Expr::Bool(true)));
        assert!(matches!(*left, ast::Expr::Binary { op: ast::BinaryOp::Lt, .. }));
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        let e = expr_stmt("-x * y\n");
        let ast::Expr::Binary { left, op, .. } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::Mul);
        assert!(matches!(*left, ast::Expr::Unary { op: ast::UnaryOp::Neg, .. }));

        let e = expr_stmt("!a && b\n");
        let ast::Expr::Binary { left, op, .. } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::And);
        assert!(matches!(*left, ast::Expr::Unary { op: ast::UnaryOp::Not, .. }));
    }

    #[test]
    fn parens_group() {
        let e = expr_stmt("(1 + 2) * 3\n");
        let ast::Expr::Binary { left, op, .. } = e else { panic!("expected binary") };
        assert_eq!(op, ast::BinaryOp::Mul);
        let ast::Expr::Paren(inner) = *left else { panic!("expected paren") };
        assert!(matches!(*inner, ast::Expr::Binary { op: ast::BinaryOp::Add, .. }));
    }

    #[test]
    fn calls_and_members_chain() {
        let e = expr_stmt("foo.bar(1, 2).baz\n");
        let ast::Expr::Member { object, name } = e else { panic!("expected member") };
        assert_eq!(name, "baz");
        let ast::Expr::Call { func, args } = *object else { panic!("expected call") };
        assert_eq!(args.len(), 2);
        assert!(matches!(*func, ast::Expr::Member { ref name, .. } if name == "bar"));
    }

    #[test]
    fn if_with_indented_then_and_brace_else() {
        let prog = parse_ok("if x > 0:\n    pass\nelse {\n    exit\n}\n");
        let ast::Stmt::If { then_block, else_block, .. } = &prog.body[0] else {
            panic!("expected if");
        };
        assert_eq!(then_block.len(), 1);
        assert!(matches!(then_block[0], ast::Stmt::Pass));
        let els = else_block.as_ref().expect("else block");
        assert!(matches!(els[0], ast::Stmt::Exit));
    }

    #[test]
    fn both_block_styles_build_the_same_ast() {
        let a = parse_ok("while x < 10:\n    x = x + 1\n");
        let b = parse_ok("while x < 10 {\n    x = x + 1\n}\n");
        assert_eq!(a.body, b.body);
    }

    #[test]
    fn if_requires_colon_or_brace() {
        let err = parse("if x\n    pass\n").unwrap_err();
        let SyntaxError::Parse(e) = err else { panic!("expected parse error") };
        assert!(e.message.contains("`:` or `{`"));
        assert_eq!(e.line, 1);
    }

    #[test]
    fn for_loop() {
        let prog = parse_ok("for i 10:\n    pass\n");
        let ast::Stmt::For { var, limit, body } = &prog.body[0] else { panic!("expected for") };
        assert_eq!(var, "i");
        assert!(matches!(limit, ast::Expr::Number(n) if n == "10"));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn def_with_typed_params() {
        let prog = parse_ok("def greet(name: string, times: i32) -> void:\n    pass\n");
        let ast::Stmt::DefFunc(f) = &prog.body[0] else { panic!("expected def") };
        assert_eq!(f.name, "greet");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].ty, Some(ast::Type::Str));
        assert_eq!(f.params[1].ty, Some(ast::Type::I32));
        assert_eq!(f.return_type, Some(ast::Type::Void));
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn func_with_brace_body() {
        let prog = parse_ok("func f(a, b) {\n    return a + b\n}\n");
        let ast::Stmt::BraceFunc(f) = &prog.body[0] else { panic!("expected func") };
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].ty, None);
        assert!(matches!(f.body[0], ast::Stmt::Return(_)));
    }

    #[test]
    fn func_one_liner() {
        let prog = parse_ok("func add(a, b) = a + b\n");
        let ast::Stmt::OneLinerFunc(f) = &prog.body[0] else { panic!("expected one-liner") };
        assert_eq!(f.name, "add");
        assert_eq!(f.params.len(), 2);
        assert!(matches!(f.expr, ast::Expr::Binary { op: ast::BinaryOp::Add, .. }));
    }

    #[test]
    fn func_requires_eq_or_brace() {
        let err = parse("func f()\n").unwrap_err();
        let SyntaxError::Parse(e) = err else { panic!("expected parse error") };
        assert!(e.message.contains("`=` or `{`"));
    }

    #[test]
    fn blocks_nest_across_styles() {
        let prog = parse_ok(
            "while a {\n    if b:\n        while c {\n            pass\n        }\n}\n",
        );
        let ast::Stmt::While { body, .. } = &prog.body[0] else { panic!("expected while") };
        let ast::Stmt::If { then_block, .. } = &body[0] else { panic!("expected if") };
        let ast::Stmt::While { body: inner, .. } = &then_block[0] else {
            panic!("expected inner while");
        };
        assert!(matches!(inner[0], ast::Stmt::Pass));
    }

    #[test]
    fn errors_carry_the_line_number() {
        let err = parse("let x = 1\nlet = 2\n").unwrap_err();
        let SyntaxError::Parse(e) = err else { panic!("expected parse error") };
        assert_eq!(e.line, 2);
        assert!(e.message.contains("identifier"));
        assert_eq!(e.to_string(), format!("parse error at line 2: {}", e.message));
    }

    #[test]
    fn lex_errors_surface_through_parse() {
        let err = parse("let s = \"abc\n").unwrap_err();
        assert!(matches!(err, SyntaxError::Lex(_)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arithmetic_chains_parse(ops in proptest::collection::vec(0usize..5, 1..12)) {
                let syms = ["+", "-", "*", "/", "%"];
                let mut src = String::from("a0");
                for (i, o) in ops.iter().enumerate() {
                    src.push(' ');
                    src.push_str(syms[*o]);
                    src.push_str(&format!(" a{}", i + 1));
                }
                src.push('\n');
                let prog = parse(&src).unwrap();
                prop_assert_eq!(prog.body.len(), 1);
            }
        }
    }
}
