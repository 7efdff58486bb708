//! kyra-core — primitives partagées du bytecode Kyra (no_std-ready)
//!
//! Fournit :
//! - Constances KBC (`KBC_MAGIC`, `KBC_VERSION`)
//! - IO mémoire (little-endian) : `ByteWriter`, `ByteReader`
//! - Erreurs `EncodeError` / `DecodeError`
//! - `bytecode` : chunks, pool de constantes, conteneur [`bytecode::Module`],
//!   désassembleur et évaluateur minimal
//!
//! Le conteneur KBC est volontairement simple : un magic de trois octets,
//! un octet de version, une table de fonctions (des chunks), puis le chunk
//! principal. Tout est little-endian, sans padding ni compression.
//!
//! Features :
//! - `std` (par défaut) : impl `std::error::Error`
//! - `serde` : derive (dé)sérialisation sur les erreurs de conteneur et le
//!   pool de constantes

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/* ─────────────────────────── Imports ─────────────────────────── */

use core::fmt;

#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Primitives de bytecode (chunk, conteneur, désassembleur, évaluateur).
pub mod bytecode;

/// Ré-exporte le désassembleur textuel.
pub use bytecode::disasm;
/// Ré-exporte les validations structurelles.
pub use bytecode::helpers;
/// Ré-exporte l'évaluateur minimal.
pub use bytecode::runtime;

/* ─────────────────────────── KBC — Constances ─────────────────────────── */

/// Magic d'un fichier KBC : `b"KBC"`.
pub const KBC_MAGIC: [u8; 3] = *b"KBC";

/// Version actuelle du conteneur KBC.
pub const KBC_VERSION: u8 = 2;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs d'encodage (limites du conteneur).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EncodeError {
    /// Une longueur ne tient pas dans le champ u32 du format.
    TooLarge {
        /// Ce qui déborde (« string », « code », …).
        what: &'static str,
        /// Longueur fautive.
        len: usize,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { what, len } => {
                write!(f, "{what} length {len} does not fit in a u32 field")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// Erreurs de décodage du conteneur KBC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecodeError {
    /// Les trois premiers octets ne sont pas `K`,`B`,`C`.
    BadMagic,
    /// Version de conteneur non gérée.
    UnsupportedVersion {
        /// Octet de version rencontré.
        found: u8,
    },
    /// Fin de buffer inattendue.
    UnexpectedEof {
        /// Nombre d'octets demandés.
        needed: usize,
        /// Offset où la lecture a échoué.
        at: usize,
    },
    /// Tag de constante inconnu.
    UnknownConstTag {
        /// Octet de tag rencontré.
        tag: u8,
    },
    /// Constante chaîne non UTF-8.
    InvalidUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "bad magic: not a KBC module"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported KBC version {found} (expected {KBC_VERSION})")
            }
            Self::UnexpectedEof { needed, at } => {
                write!(f, "unexpected EOF: need {needed} bytes at offset {at}")
            }
            Self::UnknownConstTag { tag } => write!(f, "unknown constant tag 0x{tag:02X}"),
            Self::InvalidUtf8 => write!(f, "string constant is not valid UTF-8"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/* ─────────────────────────── Byte Writer (LE) ─────────────────────────── */

/// Buffer d'écriture (croît automatiquement).
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Crée un writer vide.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }
    /// Accès en lecture au contenu.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
    /// Taille courante.
    pub fn len(&self) -> usize {
        self.buf.len()
    }
    /// Vrai si rien n'a été écrit.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
    /// Récupère le buffer (consomme).
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
    /// Ajoute des octets bruts.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
    /// Écrit un octet.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    /// Écrit un u32 little-endian.
    pub fn write_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    /// Écrit un i32 little-endian.
    pub fn write_i32_le(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    /// Écrit un f64 little-endian (bits IEEE-754).
    pub fn write_f64_le(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    /// Écrit une chaîne préfixée par sa longueur (u32 LE).
    pub fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        let bytes = s.as_bytes();
        let len = u32::try_from(bytes.len())
            .map_err(|_| EncodeError::TooLarge { what: "string", len: bytes.len() })?;
        self.write_u32_le(len);
        self.write_bytes(bytes);
        Ok(())
    }
}

/* ─────────────────────────── Byte Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel sur un slice d'octets (helpers LE).
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    /// Construit un lecteur.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, off: 0 }
    }
    /// Offset courant.
    pub fn offset(&self) -> usize {
        self.off
    }
    /// Taille restante.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.off)
    }

    /// Lit `n` octets (ou erreur si EOF).
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof { needed: n, at: self.off });
        }
        let start = self.off;
        self.off += n;
        Ok(&self.data[start..self.off])
    }

    /// Lit un octet.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.read_bytes(1)?;
        Ok(b[0])
    }

    /// Lit un u32 LE.
    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Lit un i32 LE (signé).
    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Lit un f64 LE (bits IEEE-754).
    pub fn read_f64_le(&mut self) -> Result<f64, DecodeError> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Lit une chaîne préfixée par sa longueur (u32 LE).
    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32_le()? as usize;
        let bytes = self.read_bytes(len)?;
        let s = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(String::from(s))
    }
}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        bytecode::{Chunk, ConstPool, ConstValue, Module, Op},
        ByteReader, ByteWriter, DecodeError, EncodeError, KBC_MAGIC, KBC_VERSION,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */
