//! Décodeur : en-tête, tables, vérification CRC, puis lecture récursive
//! avec registre de références pour reconstruire partages et cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use jsbon_core::{crc32_ieee, ByteReader};

use crate::error::{Error, Result};
use crate::format::{Options, Tag, MAJOR_VERSION, VERSION_MASK};
use crate::value::{ObjectRef, Value};
use crate::varint;

/// Garde-fou contre les imbrications hostiles (la récursion suit la
/// profondeur du document).
const MAX_DEPTH: usize = 1024;

/// Décode un buffer produit par l’encodeur.
///
/// Les graphes partagés et cycliques sont restitués à l’identique : les
/// back-edges résolvent vers le conteneur déjà matérialisé (`Rc` partagé).
/// Un graphe cyclique décodé reste donc vivant tant que l’appelant n’a pas
/// cassé le cycle lui-même.
pub fn decode(data: &[u8]) -> Result<Value> {
    if data.is_empty() {
        return Err(Error::InvalidData("empty input"));
    }
    let mut r = ByteReader::new(data);

    let b0 = r.read_u8()?;
    let version = b0 & VERSION_MASK;
    if version > MAJOR_VERSION {
        return Err(Error::VersionMismatch { found: version });
    }
    let options = Options::from_bits_truncate(b0 & !VERSION_MASK);

    // Le CRC est lu tout de suite mais vérifié après les tables : il couvre
    // le payload seul.
    let expected_crc = if options.contains(Options::CRC32) { Some(r.read_u32_be()?) } else { None };

    let names = read_table(&mut r)?;
    let strings = read_table(&mut r)?;

    let offset = r.position();
    if let Some(expected) = expected_crc {
        let found = crc32_ieee(&data[offset..]);
        if found != expected {
            return Err(Error::ChecksumMismatch { expected, found });
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(
        version,
        options = ?options,
        names = names.len(),
        strings = strings.len(),
        payload = data.len() - offset,
        "jsbon decode"
    );

    let mut dec = Decoder { r, names, strings, refs: HashMap::new(), offset, depth: 0 };
    let value = dec.read_value()?;

    #[cfg(feature = "tracing")]
    if dec.r.remaining() > 0 {
        tracing::debug!(trailing = dec.r.remaining(), "trailing bytes after top-level value");
    }

    Ok(value)
}

/// Lit une table de chaînes NUL-terminées, bornée par l’entrée restante.
fn read_table(r: &mut ByteReader<'_>) -> Result<Vec<String>> {
    let count = varint::read_count(r)? as usize;
    // Chaque entrée occupe au moins son octet NUL.
    if count > r.remaining() {
        return Err(Error::Truncated { needed: count as u64, at: r.position() as u64 });
    }
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(r.read_cstr()?.to_owned());
    }
    Ok(entries)
}

struct Decoder<'a> {
    r: ByteReader<'a>,
    names: Vec<String>,
    strings: Vec<String>,
    /// Position (absolue) de l’octet de tag d’un conteneur → conteneur.
    ///
    /// On enregistre toujours, même sous NOCYCLE : des duplications
    /// partagées acycliques émettent aussi des back-edges.
    refs: HashMap<usize, Value>,
    /// Premier octet du payload ; base des positions de back-edge.
    offset: usize,
    depth: usize,
}

impl Decoder<'_> {
    fn read_value(&mut self) -> Result<Value> {
        if self.depth == MAX_DEPTH {
            return Err(Error::InvalidData("nesting too deep"));
        }
        self.depth += 1;
        let out = self.read_value_inner();
        self.depth -= 1;
        out
    }

    fn read_value_inner(&mut self) -> Result<Value> {
        let tag_pos = self.r.position();
        let byte = self.r.read_u8()?;
        let tag = Tag::from_u8(byte).ok_or(Error::UnexpectedTag(byte))?;
        match tag {
            Tag::False => Ok(Value::Bool(false)),
            Tag::True => Ok(Value::Bool(true)),
            Tag::Null => Ok(Value::Null),
            Tag::Undefined => Ok(Value::Undefined),
            Tag::Int8 => Ok(Value::Int(i64::from(self.r.read_i8()?))),
            Tag::Int16 => Ok(Value::Int(i64::from(self.r.read_i16_be()?))),
            Tag::Int32 => Ok(Value::Int(i64::from(self.r.read_i32_be()?))),
            // Jamais émis par cet encodeur, acceptés pour compatibilité.
            Tag::Uint8 => Ok(Value::Int(i64::from(self.r.read_u8()?))),
            Tag::Uint16 => Ok(Value::Int(i64::from(self.r.read_u16_be()?))),
            Tag::Uint32 => Ok(Value::Int(i64::from(self.r.read_u32_be()?))),
            Tag::Number => Ok(Value::Float(self.r.read_f64_be()?)),
            Tag::Date => Ok(Value::Date(self.r.read_f64_be()?)),
            Tag::Str => {
                let ix = varint::read_count(&mut self.r)?;
                if ix == 0 {
                    return Ok(Value::Str(String::new()));
                }
                let s = self
                    .strings
                    .get(ix as usize - 1)
                    .ok_or(Error::OutOfBoundsReference(u64::from(ix)))?;
                Ok(Value::Str(s.clone()))
            }
            Tag::Bytes => {
                let len = varint::read_count(&mut self.r)? as usize;
                Ok(Value::Bytes(self.r.read_bytes(len)?.to_vec()))
            }
            Tag::Array => {
                let items = Rc::new(RefCell::new(Vec::new()));
                self.refs.insert(tag_pos, Value::Array(Rc::clone(&items)));
                let len = varint::read_count(&mut self.r)? as usize;
                // Un élément occupe au moins son octet de tag.
                if len > self.r.remaining() {
                    return Err(Error::Truncated {
                        needed: len as u64,
                        at: self.r.position() as u64,
                    });
                }
                items.borrow_mut().reserve(len);
                for _ in 0..len {
                    let v = self.read_value()?;
                    items.borrow_mut().push(v);
                }
                Ok(Value::Array(items))
            }
            Tag::Object => {
                let map: ObjectRef = Rc::new(RefCell::new(IndexMap::new()));
                self.refs.insert(tag_pos, Value::Object(Rc::clone(&map)));
                let count = varint::read_count(&mut self.r)? as usize;
                // Une propriété occupe au moins index de nom + tag de valeur.
                if count.saturating_mul(2) > self.r.remaining() {
                    return Err(Error::Truncated {
                        needed: count.saturating_mul(2) as u64,
                        at: self.r.position() as u64,
                    });
                }
                for _ in 0..count {
                    let nix = varint::read_count(&mut self.r)? as usize;
                    let name = self
                        .names
                        .get(nix)
                        .ok_or(Error::OutOfBoundsReference(nix as u64))?
                        .clone();
                    let val = self.read_value()?;
                    map.borrow_mut().insert(name, val);
                }
                Ok(Value::Object(map))
            }
            Tag::Ref => {
                let pos = varint::read_count(&mut self.r)? as usize;
                let abs = self.offset + pos;
                self.refs
                    .get(&abs)
                    .cloned()
                    .ok_or(Error::OutOfBoundsReference(pos as u64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_input_is_invalid() {
        assert!(matches!(decode(&[]), Err(Error::InvalidData(_))));
    }

    #[test]
    fn version_gate() {
        // Nibble bas = 2 : au-delà de la version supportée.
        assert!(matches!(
            decode(&[0x42, 0x00, 0x00, 0x01]),
            Err(Error::VersionMismatch { found: 2 })
        ));
        // Nibble bas = 1, bits réservés 4–5 ignorés.
        assert_eq!(decode(&[0x71, 0x00, 0x00, 0x01]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn unsigned_tags_accepted() {
        assert_eq!(decode(&[0x41, 0x00, 0x00, 0x12, 0xFF]).unwrap(), Value::Int(255));
        assert_eq!(
            decode(&[0x41, 0x00, 0x00, 0x13, 0xFF, 0xFF]).unwrap(),
            Value::Int(65_535)
        );
        assert_eq!(
            decode(&[0x41, 0x00, 0x00, 0x14, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            Value::Int(4_294_967_295)
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(matches!(
            decode(&[0x41, 0x00, 0x00, 0x0A]),
            Err(Error::UnexpectedTag(0x0A))
        ));
    }

    #[test]
    fn truncated_value_is_reported() {
        // INT32 annoncé, deux octets présents.
        assert!(matches!(
            decode(&[0x41, 0x00, 0x00, 0x04, 0x01, 0x02]),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn hostile_length_fails_before_allocating() {
        // Bytes annonçant u32::MAX octets sur une entrée de quelques octets.
        let data = [0x41, 0x00, 0x00, 0x32, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        assert!(matches!(decode(&data), Err(Error::Truncated { .. })));

        // Tableau annonçant 2^20 éléments.
        let data = [0x41, 0x00, 0x00, 0x31, 0x80, 0x80, 0x40];
        assert!(matches!(decode(&data), Err(Error::Truncated { .. })));
    }

    #[test]
    fn string_index_out_of_bounds() {
        // Table de valeurs vide, index 1 réclamé.
        let data = [0x41, 0x00, 0x00, 0x16, 0x01];
        assert!(matches!(decode(&data), Err(Error::OutOfBoundsReference(1))));
    }

    #[test]
    fn name_index_out_of_bounds() {
        // Objet d’une propriété, table de noms vide.
        let data = [0x41, 0x00, 0x00, 0x30, 0x01, 0x00, 0x06];
        assert!(matches!(decode(&data), Err(Error::OutOfBoundsReference(0))));
    }

    #[test]
    fn dangling_back_edge() {
        let data = [0x41, 0x00, 0x00, 0x31, 0x01, 0x07, 0x09];
        assert!(matches!(decode(&data), Err(Error::OutOfBoundsReference(9))));
    }

    #[test]
    fn nesting_guard_trips() {
        // Exécuté sur un thread à pile agrandie : en build debug, 1024
        // niveaux de récursion non optimisée dépassent la pile par défaut
        // d’un thread de test avant même que le garde-fou ne se déclenche.
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let mut data = vec![0x41, 0x00, 0x00];
                for _ in 0..(MAX_DEPTH + 8) {
                    data.extend_from_slice(&[0x31, 0x01]);
                }
                data.push(0x05);
                assert!(matches!(decode(&data), Err(Error::InvalidData("nesting too deep"))));
            })
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn self_reference_resolves_inside_own_body() {
        // Tableau @0 contenant un back-edge vers lui-même.
        let data = [0x01, 0x00, 0x00, 0x31, 0x01, 0x07, 0x00];
        let v = decode(&data).unwrap();
        let items = v.as_array().unwrap().borrow();
        assert_eq!(items.len(), 1);
        assert!(items[0].ptr_eq(&v));
    }
}
