//! kyra-kar — Spécification & IO du format d'archive KAR
//!
//! Format :
//! ```text
//! Header: "KAR" (3 bytes) + version u8 (= 1)
//! uint32 fileCount
//! For each file:
//!     uint32 nameLen
//!     bytes  name
//!     uint32 dataLen
//!     bytes  data
//! ```
//!
//! Les entiers sont little-endian ; les octets après la dernière entrée sont
//! ignorés au décodage. L'entrée conventionnelle d'une archive exécutable
//! est [`MAIN_ENTRY`].
//!
//! API :
//! - `Archive::encode()` / `from_bytes()`
//! - `save()`, `load()`, `pack_dir()` (feature std)
//!
//! `pack_dir` compile les sources `.kyra` en entrées `.kbc` et copie le
//! reste tel quel, noms relatifs au dossier avec des `/`.

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

// ─── alloc uniquement en no_std ───
#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
use std::{ffi::OsStr, fs, path::Path, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use core::fmt;

use kyra_compiler::CompileError;
use kyra_core::{ByteReader, ByteWriter, DecodeError, EncodeError};

/// Marqueur d'en-tête d'une archive.
pub const KAR_MAGIC: [u8; 3] = *b"KAR";

/// Version du format d'archive produite et acceptée.
pub const KAR_VERSION: u8 = 1;

/// Nom conventionnel du module principal d'une archive exécutable.
pub const MAIN_ENTRY: &str = "main.kbc";

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de lecture, d'écriture ou d'empaquetage d'une archive.
#[derive(Debug)]
pub enum KarError {
    /// L'en-tête n'est pas celui d'une archive KAR.
    BadMagic,
    /// Version d'archive non supportée.
    UnsupportedVersion {
        /// Version trouvée dans l'en-tête.
        found: u8,
    },
    /// Octets tronqués ou nom invalide.
    Decode(DecodeError),
    /// Une taille ne tient pas dans un champ u32.
    Encode(EncodeError),
    /// Échec de compilation d'une source au moment de l'empaquetage.
    Compile {
        /// Nom de l'entrée en cours de compilation.
        file: String,
        /// Cause.
        error: CompileError,
    },
    /// Erreur d'entrée/sortie.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

impl fmt::Display for KarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KarError::BadMagic => write!(f, "bad magic: not a KAR archive"),
            KarError::UnsupportedVersion { found } => {
                write!(f, "unsupported KAR version {found} (expected {KAR_VERSION})")
            }
            KarError::Decode(e) => write!(f, "{e}"),
            KarError::Encode(e) => write!(f, "{e}"),
            KarError::Compile { file, error } => write!(f, "cannot compile `{file}`: {error}"),
            #[cfg(feature = "std")]
            KarError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KarError::Decode(e) => Some(e),
            KarError::Encode(e) => Some(e),
            KarError::Compile { error, .. } => Some(error),
            KarError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for KarError {
    fn from(e: DecodeError) -> Self {
        KarError::Decode(e)
    }
}

impl From<EncodeError> for KarError {
    fn from(e: EncodeError) -> Self {
        KarError::Encode(e)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for KarError {
    fn from(e: std::io::Error) -> Self {
        KarError::Io(e)
    }
}

/* ─────────────────────────── Archive ─────────────────────────── */

/// Une entrée d'archive : nom + contenu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Nom relatif, séparé par des `/`.
    pub name: String,
    /// Contenu brut.
    pub data: Vec<u8>,
}

/// Une archive KAR en mémoire, entrées dans l'ordre d'ajout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    /// Entrées, dans l'ordre du fichier.
    pub files: Vec<FileEntry>,
}

impl Archive {
    /// Archive vide.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute une entrée.
    pub fn add_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.push(FileEntry { name: name.into(), data });
    }

    /// Contenu de la première entrée nommée `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.iter().find(|f| f.name == name).map(|f| f.data.as_slice())
    }

    /// Sérialise l'archive.
    pub fn encode(&self) -> Result<Vec<u8>, KarError> {
        let mut w = ByteWriter::new();
        w.write_bytes(&KAR_MAGIC);
        w.write_u8(KAR_VERSION);

        let count = u32::try_from(self.files.len()).map_err(|_| EncodeError::TooLarge {
            what: "archive file table",
            len: self.files.len(),
        })?;
        w.write_u32_le(count);

        for file in &self.files {
            w.write_str(&file.name)?;
            let len = u32::try_from(file.data.len()).map_err(|_| EncodeError::TooLarge {
                what: "archive entry",
                len: file.data.len(),
            })?;
            w.write_u32_le(len);
            w.write_bytes(&file.data);
        }
        Ok(w.into_vec())
    }

    /// Reconstruit une archive à partir de [`Archive::encode`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, KarError> {
        let mut r = ByteReader::new(data);

        let magic = r.read_bytes(3)?;
        if magic != KAR_MAGIC {
            return Err(KarError::BadMagic);
        }
        let version = r.read_u8()?;
        if version != KAR_VERSION {
            return Err(KarError::UnsupportedVersion { found: version });
        }

        let count = r.read_u32_le()?;
        let mut files = Vec::new();
        for _ in 0..count {
            let name = r.read_str()?;
            let len = r.read_u32_le()? as usize;
            let data = r.read_bytes(len)?.to_vec();
            files.push(FileEntry { name, data });
        }
        Ok(Self { files })
    }

    /// Écrit l'archive sur disque.
    #[cfg(feature = "std")]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), KarError> {
        let bytes = self.encode()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Lit une archive depuis le disque.
    #[cfg(feature = "std")]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KarError> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Empaquette un dossier, récursivement et en ordre lexical.
    ///
    /// Les sources `.kyra` sont compilées et stockées sous le même nom avec
    /// l'extension `.kbc` ; les autres fichiers sont copiés tels quels.
    #[cfg(feature = "std")]
    pub fn pack_dir<P: AsRef<Path>>(dir: P) -> Result<Self, KarError> {
        let mut archive = Self::new();
        pack_into(&mut archive, dir.as_ref(), Path::new(""))?;
        Ok(archive)
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KAR Archive:")?;
        for file in &self.files {
            writeln!(f, " - {} ({} bytes)", file.name, file.data.len())?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
fn pack_into(archive: &mut Archive, dir: &Path, prefix: &Path) -> Result<(), KarError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let rel = prefix.join(entry.file_name());
        if path.is_dir() {
            pack_into(archive, &path, &rel)?;
            continue;
        }

        if path.extension() == Some(OsStr::new("kyra")) {
            let name = archive_name(&rel.with_extension("kbc"));
            let src = fs::read_to_string(&path)?;
            let bytes = kyra_compiler::compile_to_bytes(&src)
                .map_err(|error| KarError::Compile { file: name.clone(), error })?;
            archive.add_file(name, bytes);
        } else {
            archive.add_file(archive_name(&rel), fs::read(&path)?);
        }
    }
    Ok(())
}

#[cfg(feature = "std")]
fn archive_name(rel: &Path) -> String {
    let parts: Vec<_> = rel.iter().map(|c| c.to_string_lossy()).collect();
    parts.join("/")
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_layout_is_exact() {
        let mut archive = Archive::new();
        archive.add_file("a.kbc", vec![1, 2, 3]);
        assert_eq!(
            archive.encode().unwrap(),
            vec![
                b'K', b'A', b'R', 1, // header
                1, 0, 0, 0, // fileCount
                5, 0, 0, 0, b'a', b'.', b'k', b'b', b'c', // name
                3, 0, 0, 0, 1, 2, 3, // data
            ]
        );
    }

    #[test]
    fn roundtrip() {
        let mut archive = Archive::new();
        archive.add_file("main.kbc", vec![0x4B, 0x42, 0x43, 2]);
        archive.add_file("assets/logo.txt", b"kyra".to_vec());

        let back = Archive::from_bytes(&archive.encode().unwrap()).unwrap();
        assert_eq!(back, archive);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = Archive::new().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(Archive::from_bytes(&bytes), Err(KarError::BadMagic)));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = Archive::new().encode().unwrap();
        bytes[3] = 9;
        assert!(matches!(
            Archive::from_bytes(&bytes),
            Err(KarError::UnsupportedVersion { found: 9 })
        ));
    }

    #[test]
    fn truncated_archive_is_an_eof() {
        let mut archive = Archive::new();
        archive.add_file("main.kbc", vec![1, 2, 3, 4]);
        let bytes = archive.encode().unwrap();
        let err = Archive::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, KarError::Decode(DecodeError::UnexpectedEof { .. })));
    }

    #[test]
    fn get_finds_the_first_match() {
        let mut archive = Archive::new();
        archive.add_file("main.kbc", vec![1]);
        archive.add_file("main.kbc", vec![2]);
        assert_eq!(archive.get("main.kbc"), Some(&[1u8][..]));
        assert_eq!(archive.get("missing.kbc"), None);
    }

    #[test]
    fn listing_shows_names_and_sizes() {
        let mut archive = Archive::new();
        archive.add_file("main.kbc", vec![0; 16]);
        let listing = archive.to_string();
        assert!(listing.contains("KAR Archive:"));
        assert!(listing.contains(" - main.kbc (16 bytes)"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.kar");

        let mut archive = Archive::new();
        archive.add_file("main.kbc", vec![9, 9, 9]);
        archive.save(&path).unwrap();

        assert_eq!(Archive::load(&path).unwrap(), archive);
    }

    #[test]
    fn pack_dir_compiles_sources_and_copies_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.kyra"), "return 41 + 1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"raw").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("extra.txt"), b"deep").unwrap();

        let archive = Archive::pack_dir(dir.path()).unwrap();
        let names: Vec<&str> = archive.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main.kbc", "notes.txt", "sub/extra.txt"]);

        // l'entrée compilée est un module KBC décodable
        let module =
            kyra_core::bytecode::Module::from_bytes(archive.get(MAIN_ENTRY).unwrap()).unwrap();
        assert!(module.functions.is_empty());
        assert_eq!(archive.get("notes.txt"), Some(&b"raw"[..]));
    }

    #[test]
    fn pack_dir_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let first = Archive::pack_dir(dir.path()).unwrap().encode().unwrap();
        let second = Archive::pack_dir(dir.path()).unwrap().encode().unwrap();
        assert_eq!(first, second);

        let names: Vec<String> = Archive::from_bytes(&first)
            .unwrap()
            .files
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn pack_dir_reports_broken_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.kyra"), "let = 1\n").unwrap();

        let err = Archive::pack_dir(dir.path()).unwrap_err();
        match err {
            KarError::Compile { file, .. } => assert_eq!(file, "bad.kbc"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn archives_roundtrip(
                files in proptest::collection::vec(
                    ("[a-z]{1,12}(/[a-z]{1,8})?", proptest::collection::vec(any::<u8>(), 0..64)),
                    0..8,
                )
            ) {
                let mut archive = Archive::new();
                for (name, data) in files {
                    archive.add_file(name, data);
                }
                let back = Archive::from_bytes(&archive.encode().unwrap()).unwrap();
                prop_assert_eq!(back, archive);
            }
        }
    }
}
