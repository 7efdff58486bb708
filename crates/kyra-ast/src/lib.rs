// src/lib.rs
//! Kyra AST (Abstract Syntax Tree)
//!
//! Ce crate définit les structures de données représentant un module Kyra
//! après parsing, avant abaissement en bytecode.
//!
//! - Consommé par `kyra-parser` (production) et `kyra-compiler` (lecture)
//! - Les trois formes de fonctions (`def …:`, `func … { }`, `func … = expr`)
//!   sont des variantes distinctes de [`Stmt`] portant la même signature
//! - No_std compatible (optionnel)
//!
//! # Features
//! - `std` (par défaut)
//! - `serde` : sérialisation/désérialisation de l'AST
//!
//! # Exemple
//! ```rust
//! use kyra_ast::{Expr, Stmt};
//!
//! let stmt = Stmt::Let { name: "x".into(), value: Expr::Number("42".into()) };
//! assert!(matches!(stmt, Stmt::Let { .. }));
//! ```

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

// ─── alloc uniquement en no_std ───
#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Un module Kyra complet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program {
    /// Nom du module (par défaut `main`).
    pub name: String,
    /// Imports `use …` en tête de module.
    pub imports: Vec<UseDecl>,
    /// Instructions top-level, dans l'ordre du source.
    pub body: Vec<Stmt>,
}

impl Program {
    /// Construit un module vide portant `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), imports: Vec::new(), body: Vec::new() }
    }
}

/// Import `use a/b/c` ou `use sdt/math`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UseDecl {
    /// Segments du chemin, séparés par `/` dans le source.
    pub path: Vec<String>,
    /// Vrai si le chemin portait le préfixe `sdt/` (bibliothèque standard).
    pub is_stdlib: bool,
}

impl fmt::Display for UseDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("use ")?;
        if self.is_stdlib {
            f.write_str("sdt/")?;
        }
        for (i, seg) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(seg)?;
        }
        Ok(())
    }
}

/// Une instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stmt {
    /// Import (n'apparaît qu'en tête de module).
    Use(UseDecl),
    /// Liaison `let name = expr`.
    Let {
        /// Nom lié.
        name: String,
        /// Valeur initiale.
        value: Expr,
    },
    /// Retour `return expr` (l'expression est obligatoire).
    Return(Expr),
    /// Arrêt du programme (`exit`).
    Exit,
    /// Instruction vide (`pass`).
    Pass,
    /// Expression en position d'instruction.
    Expr(Expr),
    /// Conditionnelle `if … else`.
    If {
        /// Condition évaluée.
        condition: Expr,
        /// Bloc exécuté si la condition est vraie.
        then_block: Vec<Stmt>,
        /// Bloc optionnel exécuté sinon.
        else_block: Option<Vec<Stmt>>,
    },
    /// Boucle `while`.
    While {
        /// Condition évaluée à chaque itération.
        condition: Expr,
        /// Corps de la boucle.
        body: Vec<Stmt>,
    },
    /// Boucle bornée `for i limite`.
    For {
        /// Variable de boucle.
        var: String,
        /// Borne supérieure (exclue).
        limit: Expr,
        /// Corps de la boucle.
        body: Vec<Stmt>,
    },
    /// Forme `def name(args) [-> type]:` + bloc indenté.
    DefFunc(FuncDecl),
    /// Forme `func name(args) [-> type] { … }`.
    BraceFunc(FuncDecl),
    /// Forme `func name(args) [-> type] = expr`.
    OneLinerFunc(FuncExpr),
}

/// Fonction à corps-bloc (formes `def …:` et `func … { }`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FuncDecl {
    /// Nom de la fonction.
    pub name: String,
    /// Paramètres positionnels, dans l'ordre de déclaration.
    pub params: Vec<Param>,
    /// Type de retour annoté (si fourni).
    pub return_type: Option<Type>,
    /// Corps de la fonction.
    pub body: Vec<Stmt>,
}

/// Fonction à expression unique (`func … = expr`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FuncExpr {
    /// Nom de la fonction.
    pub name: String,
    /// Paramètres positionnels, dans l'ordre de déclaration.
    pub params: Vec<Param>,
    /// Type de retour annoté (si fourni).
    pub return_type: Option<Type>,
    /// Expression tenant lieu de corps; sa valeur est le retour implicite.
    pub expr: Expr,
}

/// Paramètre de fonction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Param {
    /// Nom du paramètre.
    pub name: String,
    /// Type annoté (si fourni).
    pub ty: Option<Type>,
}

/// Une expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    /// Référence à une variable.
    Ident(String),
    /// Littéral numérique, texte brut du source (entier ou flottant,
    /// départagé à l'émission).
    Number(String),
    /// Littéral chaîne.
    Str(String),
    /// Littéral booléen.
    Bool(bool),
    /// Opération unaire.
    Unary {
        /// Opérateur appliqué.
        op: UnaryOp,
        /// Expression ciblée.
        expr: Box<Expr>,
    },
    /// Opération binaire.
    Binary {
        /// Opérande gauche.
        left: Box<Expr>,
        /// Opérateur appliqué.
        op: BinaryOp,
        /// Opérande droite.
        right: Box<Expr>,
    },
    /// Affectation `name = expr` (cible identifiant uniquement).
    Assign {
        /// Nom affecté.
        name: String,
        /// Valeur affectée.
        value: Box<Expr>,
    },
    /// Appel `f(args…)`.
    Call {
        /// Expression appelée.
        func: Box<Expr>,
        /// Arguments passés à l'appel.
        args: Vec<Expr>,
    },
    /// Accès membre `objet.nom`.
    Member {
        /// Expression support.
        object: Box<Expr>,
        /// Nom du membre accédé.
        name: String,
    },
    /// Expression parenthésée `(expr)`.
    Paren(Box<Expr>),
}

/// Opérateurs binaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Soustraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Modulo.
    Mod,
    /// Égalité.
    Eq,
    /// Différence.
    Ne,
    /// Inférieur strict.
    Lt,
    /// Inférieur ou égal.
    Le,
    /// Supérieur strict.
    Gt,
    /// Supérieur ou égal.
    Ge,
    /// Conjonction logique.
    And,
    /// Disjonction logique.
    Or,
}

/// Opérateurs unaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    /// Négation arithmétique (`-x`).
    Neg,
    /// Négation logique (`!x`).
    Not,
}

/// Types annotables du langage Kyra.
///
/// Purement déclaratifs : aucune vérification de types n'est faite en aval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// Entier signé 32 bits.
    I32,
    /// Entier signé 64 bits.
    I64,
    /// Flottant 32 bits.
    F32,
    /// Flottant 64 bits.
    F64,
    /// Booléen.
    Bool,
    /// Chaîne UTF-8.
    Str,
    /// Absence de valeur.
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Str => "string",
            Self::Void => "void",
        };
        f.write_str(s)
    }
}

// ─── Tests ───

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_program() -> Program {
        let mut prog = Program::new("main");
        prog.imports.push(UseDecl { path: vec!["math".into()], is_stdlib: true });
        prog.body.push(Stmt::Let {
            name: "x".into(),
            value: Expr::Binary {
                left: Box::new(Expr::Number("1".into())),
                op: BinaryOp::Add,
                right: Box::new(Expr::Number("2".into())),
            },
        });
        prog.body.push(Stmt::OneLinerFunc(FuncExpr {
            name: "twice".into(),
            params: vec![Param { name: "n".into(), ty: Some(Type::I32) }],
            return_type: Some(Type::I32),
            expr: Expr::Binary {
                left: Box::new(Expr::Ident("n".into())),
                op: BinaryOp::Mul,
                right: Box::new(Expr::Number("2".into())),
            },
        }));
        prog.body.push(Stmt::Return(Expr::Ident("x".into())));
        prog
    }

    #[test]
    fn use_decl_displays_its_source_form() {
        let sdt = UseDecl { path: vec!["math".into()], is_stdlib: true };
        assert_eq!(sdt.to_string(), "use sdt/math");

        let local = UseDecl { path: vec!["nested".into(), "tools".into()], is_stdlib: false };
        assert_eq!(local.to_string(), "use nested/tools");
    }

    #[test]
    fn type_names_match_the_surface_syntax() {
        assert_eq!(Type::I32.to_string(), "i32");
        assert_eq!(Type::Str.to_string(), "string");
        assert_eq!(Type::Void.to_string(), "void");
    }

    #[test]
    fn programs_compare_structurally() {
        assert_eq!(sample_program(), sample_program());
        let mut other = sample_program();
        other.body.pop();
        assert_ne!(sample_program(), other);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn programs_roundtrip_through_json() {
        let prog = sample_program();
        let json = serde_json::to_string(&prog).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prog);
    }
}
