//! Constantes du format : version, bits d’option, tags de valeur.

use bitflags::bitflags;

/// Version majeure du format (nibble bas de l’octet 0).
pub const MAJOR_VERSION: u8 = 1;

/// Masque du nibble de version dans l’octet 0.
pub const VERSION_MASK: u8 = 0x0F;

bitflags! {
    /// Bits d’option du nibble haut de l’octet 0.
    ///
    /// Les bits 4 et 5 sont réservés (zéro à l’écriture, ignorés à la lecture).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u8 {
        /// Aucun back-edge n’a formé de cycle (indication, jamais requise au décodage).
        const NOCYCLE = 0x40;
        /// Un CRC32 big-endian suit l’octet 0, calculé sur le payload seul.
        const CRC32 = 0x80;
    }
}

/// Tag d’une valeur dans le payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Booléen faux.
    False = 0x00,
    /// Booléen vrai.
    True = 0x01,
    /// Entier signé sur 1 octet.
    Int8 = 0x02,
    /// Entier signé sur 2 octets BE.
    Int16 = 0x03,
    /// Entier signé sur 4 octets BE.
    Int32 = 0x04,
    /// Null.
    Null = 0x05,
    /// Undefined.
    Undefined = 0x06,
    /// Back-edge : varint(position payload) d’un conteneur déjà émis.
    Ref = 0x07,
    /// f64 BE (IEEE-754).
    Number = 0x09,
    /// Entier non signé sur 1 octet (accepté au décodage, jamais émis).
    Uint8 = 0x12,
    /// Entier non signé sur 2 octets BE (accepté au décodage, jamais émis).
    Uint16 = 0x13,
    /// Entier non signé sur 4 octets BE (accepté au décodage, jamais émis).
    Uint32 = 0x14,
    /// Chaîne : varint(index table de valeurs, 0 = chaîne vide).
    Str = 0x16,
    /// Date : f64 BE, millisecondes depuis l’epoch Unix.
    Date = 0x20,
    /// Objet : varint(nb propriétés), puis (varint(index nom), valeur)*.
    Object = 0x30,
    /// Tableau : varint(longueur), puis valeurs.
    Array = 0x31,
    /// Octets bruts : varint(longueur), puis octets.
    Bytes = 0x32,
}

impl Tag {
    /// Décode un octet de tag (ou `None` s’il est hors du jeu défini).
    pub const fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::False),
            0x01 => Some(Tag::True),
            0x02 => Some(Tag::Int8),
            0x03 => Some(Tag::Int16),
            0x04 => Some(Tag::Int32),
            0x05 => Some(Tag::Null),
            0x06 => Some(Tag::Undefined),
            0x07 => Some(Tag::Ref),
            0x09 => Some(Tag::Number),
            0x12 => Some(Tag::Uint8),
            0x13 => Some(Tag::Uint16),
            0x14 => Some(Tag::Uint32),
            0x16 => Some(Tag::Str),
            0x20 => Some(Tag::Date),
            0x30 => Some(Tag::Object),
            0x31 => Some(Tag::Array),
            0x32 => Some(Tag::Bytes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for tag in [
            Tag::False,
            Tag::True,
            Tag::Int8,
            Tag::Int16,
            Tag::Int32,
            Tag::Null,
            Tag::Undefined,
            Tag::Ref,
            Tag::Number,
            Tag::Uint8,
            Tag::Uint16,
            Tag::Uint32,
            Tag::Str,
            Tag::Date,
            Tag::Object,
            Tag::Array,
            Tag::Bytes,
        ] {
            assert_eq!(Tag::from_u8(tag as u8), Some(tag));
        }
    }

    #[test]
    fn unknown_tags_rejected() {
        for b in [0x08u8, 0x0A, 0x15, 0x21, 0x33, 0xFF] {
            assert_eq!(Tag::from_u8(b), None);
        }
    }

    #[test]
    fn option_bits() {
        assert_eq!(Options::NOCYCLE.bits(), 0x40);
        assert_eq!(Options::CRC32.bits(), 0x80);
        // Le nibble de version ne recouvre pas les bits d’option.
        assert_eq!(Options::all().bits() & VERSION_MASK, 0);
    }
}
