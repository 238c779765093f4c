//! Taxonomie des erreurs du codec.

use jsbon_core::CoreError;
use thiserror::Error;

/// Alias résultat du crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Erreurs levées par `encode`/`decode`.
///
/// Toute erreur interrompt l’appel courant ; aucun résultat partiel n’est
/// renvoyé et aucune tentative de récupération n’est faite.
#[derive(Debug, Error)]
pub enum Error {
    /// Entrée absente ou flux non conforme (varint malformé, UTF-8 invalide…).
    #[error("invalid data: {0}")]
    InvalidData(&'static str),

    /// La version majeure lue dépasse celle supportée.
    #[error("unsupported format version {found}")]
    VersionMismatch {
        /// Version lue dans le nibble bas de l’octet 0.
        found: u8,
    },

    /// CRC32 présent mais différent du recalcul sur le payload.
    #[error("crc32 mismatch: expected=0x{expected:08X}, found=0x{found:08X}")]
    ChecksumMismatch {
        /// CRC32 lu dans l’en-tête.
        expected: u32,
        /// CRC32 recalculé sur le payload.
        found: u32,
    },

    /// Valeur hors de l’univers encodable.
    #[error("unsupported value: {0}")]
    UnsupportedType(&'static str),

    /// Un compte à émettre ne tient pas sur 32 bits non signés.
    #[error("count out of range: {0}")]
    InvalidCount(u64),

    /// Octet de tag hors du jeu défini.
    #[error("unexpected tag 0x{0:02X}")]
    UnexpectedTag(u8),

    /// Index de table ou position de back-edge non enregistré.
    #[error("reference out of bounds: {0}")]
    OutOfBoundsReference(u64),

    /// Le flux se termine au milieu d’un champ requis.
    #[error("truncated stream: need {needed} bytes at offset {at}")]
    Truncated {
        /// Nombre d’octets manquants.
        needed: u64,
        /// Offset où l’erreur s’est produite.
        at: u64,
    },

    /// Erreur d’E/S des helpers fichier.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for Error {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Truncated { needed, at } => Error::Truncated { needed, at },
            CoreError::InvalidUtf8 => Error::InvalidData("invalid utf-8"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map() {
        let e: Error = CoreError::Truncated { needed: 4, at: 9 }.into();
        assert!(matches!(e, Error::Truncated { needed: 4, at: 9 }));

        let e: Error = CoreError::InvalidUtf8.into();
        assert!(matches!(e, Error::InvalidData(_)));
    }

    #[test]
    fn display_is_stable() {
        let e = Error::ChecksumMismatch { expected: 0xDEAD_BEEF, found: 1 };
        assert_eq!(e.to_string(), "crc32 mismatch: expected=0xDEADBEEF, found=0x00000001");
    }
}
