//! jsbon — codec binaire auto-décrit pour valeurs structurées
//!
//! Format :
//! ```text
//! stream  := octet0 [ crc32 u32 BE ] tables payload
//! octet0  := bits 0–3 version majeure (=1), bit 6 NOCYCLE, bit 7 CRC32
//! tables  := varint(n) nom{n} varint(m) chaîne{m}    ; UTF-8 NUL-terminé
//! payload := valeur (un item taggé, voir `format::Tag`)
//! ```
//!
//! Propriétés :
//! - primitives, dates et octets bruts émis par valeur, bit-exact (BE)
//! - noms de propriétés et chaînes internés dans deux tables de préfixe
//!   (noms 0-based ; chaînes 1-based, 0 = chaîne vide)
//! - conteneurs à identité : une occurrence par valeur puis back-edges
//!   (`0x07` + position payload), partage et cycles restitués au décodage
//! - comptes en varint base-128 (groupes little-endian, 1–5 octets)
//! - CRC32 optionnel (IEEE 802.3) sur le **payload seul** — les tables ne
//!   sont pas couvertes, un appelant voulant l’intégrité de bout en bout
//!   enveloppe la sortie entière
//!
//! API :
//! - [`encode`] / [`encode_with`] / [`decode`]
//! - [`write_file`], [`read_file`]
//! - feature `json` : conversions `serde_json` explicites
//!
//! Le bas niveau (ByteReader/Writer big-endian, CRC32) vit dans `jsbon-core`.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod format;
pub mod value;

mod decode;
mod encode;
#[cfg(feature = "json")]
mod json;
mod varint;

pub use decode::decode;
pub use encode::{encode, encode_with, EncodeOptions};
pub use error::{Error, Result};
pub use format::{Options, Tag, MAJOR_VERSION};
pub use value::{ToPlain, Value};

use std::fs;
use std::path::Path;

/// Encode `value` et écrit le résultat dans un fichier.
pub fn write_file<P: AsRef<Path>>(path: P, value: &Value, options: &EncodeOptions) -> Result<()> {
    let bytes = encode_with(value, options)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Lit un fichier et décode son contenu.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Value> {
    let bytes = fs::read(path)?;
    decode(&bytes)
}

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use crate::{decode, encode, encode_with, EncodeOptions, Error, Result, ToPlain, Value};
}
