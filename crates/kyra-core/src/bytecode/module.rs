//! KBC container: `K`,`B`,`C`, a version byte, a function table, then the
//! main chunk.
//!
//! Function ids are plain indices into the table, in registration order.
//! Decoding stops after the main chunk; trailing bytes are ignored so a
//! consumer can append its own metadata without breaking older readers.

use crate::{
    bytecode::chunk::Chunk, ByteReader, ByteWriter, DecodeError, EncodeError, KBC_MAGIC,
    KBC_VERSION,
};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

/// A compiled Kyra module: every function chunk plus the top-level chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Function chunks, indexed by function id.
    pub functions: Vec<Chunk>,
    /// Top-level code.
    pub main: Chunk,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup a function chunk by id.
    pub fn function(&self, id: u32) -> Option<&Chunk> {
        self.functions.get(id as usize)
    }

    /// Encode the module to its binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = ByteWriter::new();
        w.write_bytes(&KBC_MAGIC);
        w.write_u8(KBC_VERSION);

        let count = u32::try_from(self.functions.len()).map_err(|_| EncodeError::TooLarge {
            what: "function table",
            len: self.functions.len(),
        })?;
        w.write_u32_le(count);
        for function in &self.functions {
            function.encode_into(&mut w)?;
        }
        self.main.encode_into(&mut w)?;
        Ok(w.into_vec())
    }

    /// Decode a module from [`Module::to_bytes`] output.
    ///
    /// The magic and the version byte are checked first; anything after the
    /// main chunk is left unread.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(data);

        let magic = r.read_bytes(3)?;
        if magic != KBC_MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = r.read_u8()?;
        if version != KBC_VERSION {
            return Err(DecodeError::UnsupportedVersion { found: version });
        }

        let count = r.read_u32_le()?;
        let mut functions = Vec::new();
        for _ in 0..count {
            functions.push(Chunk::decode_from(&mut r)?);
        }
        let main = Chunk::decode_from(&mut r)?;
        Ok(Self { functions, main })
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
