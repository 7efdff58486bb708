//! kyra-lexer — analyse lexicale pour Kyra
//!
//! Faits saillants :
//! - `Lexer` : mots-clés (`def`, `func`, types…), identifiants, nombres
//!   (entiers et flottants), chaînes `"…"` (multi-lignes, sans échappements),
//!   opérateurs et ponctuation.
//! - Jetons **structurels** : `NEWLINE` à chaque fin de ligne logique,
//!   `INDENT` quand la profondeur d'indentation augmente, un `DEDENT` par
//!   niveau déroulé quand elle diminue. C'est ce qui porte la grammaire à
//!   blocs indentés du parseur; les `INDENT`/`DEDENT` sont toujours
//!   équilibrés sur un bloc complet.
//! - Chaque jeton porte son numéro de ligne (1-based) pour les diagnostics.
//! - Les caractères inconnus deviennent des jetons d'un caractère : c'est au
//!   parseur de les rejeter.
//!
//! L'indentation est mesurée en colonnes (espace ou tabulation = une
//! colonne) et suivie globalement, y compris à l'intérieur des blocs `{ }` —
//! le parseur ignore les jetons structurels dans ces blocs, ce qui permet
//! d'imbriquer librement les deux styles. Les lignes blanches n'émettent
//! aucun jeton.
//!
//! Exemple éclair :
//! ```
//! use kyra_lexer::{Lexer, TokenKind};
//!
//! let toks = Lexer::new("let x = 1\n").tokenize().unwrap();
//! assert!(matches!(toks[0].kind, TokenKind::Kw(kyra_lexer::Keyword::Let)));
//! assert!(matches!(toks.last().unwrap().kind, TokenKind::Eof));
//! ```

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{collections::VecDeque, vec::Vec};

#[cfg(feature = "std")]
use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Mots-clés reconnus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Keyword {
    /// `use`
    Use,
    /// `let`
    Let,
    /// `return`
    Return,
    /// `exit`
    Exit,
    /// `pass`
    Pass,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `def`
    Def,
    /// `func`
    Func,
    /// `true`
    True,
    /// `false`
    False,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `bool`
    Bool,
    /// `string`
    Str,
    /// `void`
    Void,
}

impl Keyword {
    /// Texte source du mot-clé.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Use => "use",
            Self::Let => "let",
            Self::Return => "return",
            Self::Exit => "exit",
            Self::Pass => "pass",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::For => "for",
            Self::Def => "def",
            Self::Func => "func",
            Self::True => "true",
            Self::False => "false",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Str => "string",
            Self::Void => "void",
        }
    }
}

/// Genre de jeton lexical.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TokenKind<'a> {
    /// Fin de fichier.
    Eof,
    /// Fin de ligne logique.
    Newline,
    /// La profondeur d'indentation a augmenté.
    Indent,
    /// La profondeur d'indentation a diminué d'un niveau.
    Dedent,
    /// Identifiant.
    Ident(&'a str),
    /// Littéral numérique, texte brut (entier ou flottant).
    Number(&'a str),
    /// Littéral chaîne (contenu entre guillemets, tel quel).
    Str(&'a str),
    /// Mot-clé.
    Kw(Keyword),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `->`
    Arrow,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// Caractère non reconnu, laissé au parseur.
    Unknown(char),
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => write!(f, "end of input"),
            Self::Newline => write!(f, "newline"),
            Self::Indent => write!(f, "indent"),
            Self::Dedent => write!(f, "dedent"),
            Self::Ident(s) => write!(f, "identifier `{s}`"),
            Self::Number(s) => write!(f, "number `{s}`"),
            Self::Str(_) => write!(f, "string literal"),
            Self::Kw(kw) => write!(f, "`{}`", kw.as_str()),
            Self::LParen => write!(f, "`(`"),
            Self::RParen => write!(f, "`)`"),
            Self::LBrace => write!(f, "`{{`"),
            Self::RBrace => write!(f, "`}}`"),
            Self::Comma => write!(f, "`,`"),
            Self::Dot => write!(f, "`.`"),
            Self::Colon => write!(f, "`:`"),
            Self::Arrow => write!(f, "`->`"),
            Self::Plus => write!(f, "`+`"),
            Self::Minus => write!(f, "`-`"),
            Self::Star => write!(f, "`*`"),
            Self::Slash => write!(f, "`/`"),
            Self::Percent => write!(f, "`%`"),
            Self::Assign => write!(f, "`=`"),
            Self::EqEq => write!(f, "`==`"),
            Self::Ne => write!(f, "`!=`"),
            Self::Lt => write!(f, "`<`"),
            Self::Le => write!(f, "`<=`"),
            Self::Gt => write!(f, "`>`"),
            Self::Ge => write!(f, "`>=`"),
            Self::AndAnd => write!(f, "`&&`"),
            Self::OrOr => write!(f, "`||`"),
            Self::Bang => write!(f, "`!`"),
            Self::Unknown(c) => write!(f, "`{c}`"),
        }
    }
}

/// Jeton avec numéro de ligne (1-based).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token<'a> {
    /// Genre du jeton.
    pub kind: TokenKind<'a>,
    /// Ligne source où le jeton commence.
    pub line: u32,
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Genre d'erreur lexicale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LexErrorKind {
    /// Chaîne non terminée (fin de fichier avant le guillemet fermant).
    UnterminatedString,
    /// Désindentation ne retombant sur aucun niveau ouvert.
    InconsistentDedent,
}

/// Erreur lexicale avec numéro de ligne.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LexError {
    /// Ligne source fautive (pour une chaîne, la ligne du guillemet ouvrant).
    pub line: u32,
    /// Genre d'erreur.
    pub kind: LexErrorKind,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LexErrorKind::UnterminatedString => {
                write!(f, "lex error at line {}: unterminated string literal", self.line)
            }
            LexErrorKind::InconsistentDedent => {
                write!(f, "lex error at line {}: unindent does not match any outer indentation level", self.line)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LexError {}

/* ─────────────────────────── Lexer ─────────────────────────── */

/// Analyseur lexical (itératif).
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    /// Position courante en bytes.
    off: usize,
    /// Ligne courante, 1-based.
    line: u32,
    /// Pile des profondeurs d'indentation ouvertes (niveau 0 implicite).
    indents: Vec<u32>,
    /// Vrai tant que la ligne courante n'a produit aucun jeton.
    at_line_start: bool,
    /// Jetons structurels en attente (rafales de DEDENT, fin de fichier).
    queue: VecDeque<Token<'a>>,
    /// Fin de fichier déjà scellée (NEWLINE final + DEDENT restants émis).
    closed: bool,
}

impl<'a> Lexer<'a> {
    /// Crée un lexer sur `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            off: 0,
            line: 1,
            indents: Vec::new(),
            at_line_start: true,
            queue: VecDeque::new(),
            closed: false,
        }
    }

    /// Prochain jeton. `Eof` est émis (et ré-émis) une fois la source épuisée.
    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        if let Some(t) = self.queue.pop_front() {
            return Ok(t);
        }

        if self.at_line_start {
            self.handle_line_start()?;
            if let Some(t) = self.queue.pop_front() {
                return Ok(t);
            }
        }

        self.skip_inline_ws();

        if self.is_eof() {
            self.close();
            return Ok(self.queue.pop_front().unwrap_or(Token { kind: TokenKind::Eof, line: self.line }));
        }

        let line = self.line;
        let start = self.off;
        let c = self.bump_char();

        let kind = match c {
            '\n' => {
                self.line += 1;
                self.at_line_start = true;
                TokenKind::Newline
            }
            ch if is_ident_start(ch) => {
                self.consume_while(is_ident_continue);
                let s = &self.src[start..self.off];
                match keyword_of(s) {
                    Some(kw) => TokenKind::Kw(kw),
                    None => TokenKind::Ident(s),
                }
            }
            ch if ch.is_ascii_digit() => {
                self.consume_while(|c| c.is_ascii_digit());
                if self.peek_char() == Some('.')
                    && self.peek2().is_some_and(|b| b.is_ascii_digit())
                {
                    self.off += 1;
                    self.consume_while(|c| c.is_ascii_digit());
                }
                TokenKind::Number(&self.src[start..self.off])
            }
            '"' => TokenKind::Str(self.lex_string(line)?),

            '-' => {
                if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::Ne
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,

            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,

            other => TokenKind::Unknown(other),
        };

        Ok(Token { kind, line })
    }

    /// Tokenise toute la source (le dernier jeton est toujours `Eof`).
    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>, LexError> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token()?;
            let end = matches!(t.kind, TokenKind::Eof);
            out.push(t);
            if end {
                break;
            }
        }
        Ok(out)
    }

    /* ────────── Indentation ────────── */

    /// En début de ligne : saute les lignes blanches, mesure la profondeur
    /// et met en file les `INDENT`/`DEDENT` qui en découlent.
    fn handle_line_start(&mut self) -> Result<(), LexError> {
        loop {
            let mut depth: u32 = 0;
            while let Some(b) = self.peek() {
                match b {
                    b' ' | b'\t' => {
                        depth += 1;
                        self.off += 1;
                    }
                    b'\r' => self.off += 1,
                    _ => break,
                }
            }
            match self.peek() {
                // Ligne blanche : aucun jeton, on passe à la suivante.
                Some(b'\n') => {
                    self.off += 1;
                    self.line += 1;
                }
                // Fin de fichier : la clôture émet les DEDENT restants.
                None => return Ok(()),
                Some(_) => {
                    self.at_line_start = false;
                    return self.apply_depth(depth);
                }
            }
        }
    }

    fn apply_depth(&mut self, depth: u32) -> Result<(), LexError> {
        let current = self.current_depth();
        if depth > current {
            self.indents.push(depth);
            self.queue.push_back(Token { kind: TokenKind::Indent, line: self.line });
        } else if depth < current {
            while self.current_depth() > depth {
                self.indents.pop();
                self.queue.push_back(Token { kind: TokenKind::Dedent, line: self.line });
            }
            if self.current_depth() != depth {
                return Err(LexError { line: self.line, kind: LexErrorKind::InconsistentDedent });
            }
        }
        Ok(())
    }

    #[inline]
    fn current_depth(&self) -> u32 {
        self.indents.last().copied().unwrap_or(0)
    }

    /// Scelle la fin de fichier : NEWLINE implicite si une ligne était en
    /// cours, puis un DEDENT par niveau encore ouvert, puis `Eof`.
    fn close(&mut self) {
        if self.closed {
            self.queue.push_back(Token { kind: TokenKind::Eof, line: self.line });
            return;
        }
        self.closed = true;
        if !self.at_line_start {
            self.queue.push_back(Token { kind: TokenKind::Newline, line: self.line });
        }
        while self.indents.pop().is_some() {
            self.queue.push_back(Token { kind: TokenKind::Dedent, line: self.line });
        }
        self.queue.push_back(Token { kind: TokenKind::Eof, line: self.line });
    }

    /* ────────── Primitives internes ────────── */

    #[inline]
    fn is_eof(&self) -> bool {
        self.off >= self.bytes.len()
    }
    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.off).copied()
    }
    #[inline]
    fn peek_char(&self) -> Option<char> {
        self.src[self.off..].chars().next()
    }
    #[inline]
    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.off + 1).copied()
    }
    #[inline]
    fn bump_char(&mut self) -> char {
        let c = self.src[self.off..].chars().next().unwrap_or('\0');
        self.off += c.len_utf8();
        c
    }
    #[inline]
    fn eat(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.off += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn consume_while(&mut self, p: impl Fn(char) -> bool) {
        while let Some(c) = self.peek_char() {
            if p(c) {
                self.off += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Espaces et tabulations en milieu de ligne (jamais `\n`).
    fn skip_inline_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\r' {
                self.off += 1;
            } else {
                break;
            }
        }
    }

    /// Corps d'une chaîne, guillemet ouvrant déjà consommé. Les sauts de
    /// ligne sont admis dans la chaîne; il n'y a pas d'échappements.
    fn lex_string(&mut self, open_line: u32) -> Result<&'a str, LexError> {
        let start = self.off;
        loop {
            match self.peek() {
                None => {
                    return Err(LexError { line: open_line, kind: LexErrorKind::UnterminatedString })
                }
                Some(b'"') => {
                    let s = &self.src[start..self.off];
                    self.off += 1;
                    return Ok(s);
                }
                Some(b'\n') => {
                    self.line += 1;
                    self.off += 1;
                }
                Some(_) => {
                    self.bump_char();
                }
            }
        }
    }
}

/* ─────────────────────────── Helpers ─────────────────────────── */

#[inline]
fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[inline]
fn keyword_of(s: &str) -> Option<Keyword> {
    use Keyword::*;
    Some(match s {
        "use" => Use,
        "let" => Let,
        "return" => Return,
        "exit" => Exit,
        "pass" => Pass,
        "if" => If,
        "else" => Else,
        "while" => While,
        "for" => For,
        "def" => Def,
        "func" => Func,
        "true" => True,
        "false" => False,
        "i32" => I32,
        "i64" => I64,
        "f32" => F32,
        "f64" => F64,
        "bool" => Bool,
        "string" => Str,
        "void" => Void,
        _ => return None,
    })
}

/* ─────────────────────────── Tests ─────────────────────────── */
