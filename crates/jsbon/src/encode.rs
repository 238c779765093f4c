//! Encodeur : marche du graphe en une passe, puis assemblage en-tête+tables.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use jsbon_core::{crc32_ieee, ByteWriter};

use crate::error::{Error, Result};
use crate::format::{Options, Tag, MAJOR_VERSION};
use crate::value::{ArrayRef, ObjectRef, ToPlain, Value};
use crate::varint;

/// Options d’encodage.
///
/// `#[non_exhaustive]` : se construit via [`EncodeOptions::default`] (les
/// champs inconnus d’un appelant futur restent simplement à leur défaut).
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct EncodeOptions {
    /// Ajoute un CRC32 du payload dans l’en-tête.
    pub crc32: bool,
}

impl EncodeOptions {
    /// Options par défaut (sans CRC).
    pub fn new() -> Self { Self::default() }

    /// Active ou non le CRC32.
    #[must_use]
    pub fn with_crc32(mut self, crc32: bool) -> Self {
        self.crc32 = crc32;
        self
    }
}

/// Encode une valeur (sans CRC32).
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    encode_with(value, &EncodeOptions::default())
}

/// Encode une valeur avec options.
pub fn encode_with(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    enc.encode_value(value)?;
    #[cfg(feature = "tracing")]
    let (n_names, n_strings, cycle) = (enc.names.len(), enc.strings.len(), enc.has_cycle);
    let out = enc.finish(options)?;
    #[cfg(feature = "tracing")]
    tracing::trace!(
        bytes = out.len(),
        names = n_names,
        strings = n_strings,
        cycle,
        crc32 = options.crc32,
        "jsbon encode"
    );
    Ok(out)
}

/// État d’une passe d’encodage : payload de travail, tables d’internement,
/// identités déjà émises et pile de marche pour la détection de cycle.
struct Encoder {
    payload: ByteWriter,
    /// Noms de propriétés, index 0-based.
    names: IndexMap<String, u32>,
    /// Chaînes valeurs, index 1-based (0 = chaîne vide, jamais stockée).
    strings: IndexMap<String, u32>,
    /// Conteneur → position de son octet de tag dans le payload.
    seen: HashMap<*const (), u32>,
    /// Conteneurs dont le corps est en cours d’émission.
    active: HashSet<*const ()>,
    has_cycle: bool,
}

impl Encoder {
    fn new() -> Self {
        Self {
            payload: ByteWriter::new(),
            names: IndexMap::new(),
            strings: IndexMap::new(),
            seen: HashMap::new(),
            active: HashSet::new(),
            has_cycle: false,
        }
    }

    fn encode_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Undefined => self.payload.write_u8(Tag::Undefined as u8),
            Value::Null => self.payload.write_u8(Tag::Null as u8),
            Value::Bool(b) => {
                let tag = if *b { Tag::True } else { Tag::False };
                self.payload.write_u8(tag as u8);
            }
            Value::Int(i) => self.write_int(*i),
            Value::Float(x) => self.write_number(*x),
            Value::Str(s) => {
                let ix = self.intern_string(s)?;
                self.payload.write_u8(Tag::Str as u8);
                varint::write_u32(&mut self.payload, ix);
            }
            Value::Date(ms) => {
                self.payload.write_u8(Tag::Date as u8);
                self.payload.write_f64_be(*ms);
            }
            Value::Bytes(b) => {
                self.payload.write_u8(Tag::Bytes as u8);
                varint::write_count(&mut self.payload, b.len())?;
                self.payload.write_bytes(b);
            }
            Value::Array(rc) => self.encode_array(rc)?,
            Value::Object(rc) => self.encode_object(rc)?,
            Value::Custom(rc) => self.encode_custom(rc)?,
        }
        Ok(())
    }

    /// Échelle des tags entiers : le plus étroit qui représente `v`,
    /// f64 au-delà de la plage i32.
    fn write_int(&mut self, v: i64) {
        if (-128..=127).contains(&v) {
            self.payload.write_u8(Tag::Int8 as u8);
            self.payload.write_i8(v as i8);
        } else if (-32_768..=32_767).contains(&v) {
            self.payload.write_u8(Tag::Int16 as u8);
            self.payload.write_i16_be(v as i16);
        } else if (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&v) {
            self.payload.write_u8(Tag::Int32 as u8);
            self.payload.write_i32_be(v as i32);
        } else {
            self.payload.write_u8(Tag::Number as u8);
            self.payload.write_f64_be(v as f64);
        }
    }

    /// Le choix du tag numérique se fait par valeur : un flottant qui vaut
    /// exactement un entier i32 prend l’échelle entière.
    fn write_number(&mut self, x: f64) {
        if x.is_finite()
            && x.fract() == 0.0
            && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&x)
        {
            self.write_int(x as i64);
        } else {
            self.payload.write_u8(Tag::Number as u8);
            self.payload.write_f64_be(x);
        }
    }

    /// Émet un back-edge si le conteneur a déjà été émis. Un back-edge vers
    /// un conteneur encore sur la pile de marche est un vrai cycle.
    fn emit_back_edge(&mut self, key: *const ()) -> bool {
        if let Some(&pos) = self.seen.get(&key) {
            if self.active.contains(&key) {
                self.has_cycle = true;
            }
            self.payload.write_u8(Tag::Ref as u8);
            varint::write_u32(&mut self.payload, pos);
            return true;
        }
        false
    }

    /// Enregistre l’identité du conteneur à la position courante, c’est-à-dire
    /// celle de l’octet de tag qui va suivre.
    fn register(&mut self, key: *const ()) -> Result<()> {
        let pos = u32::try_from(self.payload.position())
            .map_err(|_| Error::InvalidCount(self.payload.position() as u64))?;
        self.seen.insert(key, pos);
        self.active.insert(key);
        Ok(())
    }

    fn encode_array(&mut self, rc: &ArrayRef) -> Result<()> {
        let key = Rc::as_ptr(rc).cast::<()>();
        if self.emit_back_edge(key) {
            return Ok(());
        }
        self.register(key)?;
        self.payload.write_u8(Tag::Array as u8);
        let items = rc.borrow();
        varint::write_count(&mut self.payload, items.len())?;
        for item in items.iter() {
            self.encode_value(item)?;
        }
        drop(items);
        self.active.remove(&key);
        Ok(())
    }

    fn encode_object(&mut self, rc: &ObjectRef) -> Result<()> {
        let key = Rc::as_ptr(rc).cast::<()>();
        if self.emit_back_edge(key) {
            return Ok(());
        }
        self.register(key)?;
        self.payload.write_u8(Tag::Object as u8);
        let map = rc.borrow();
        self.write_entries(&map)?;
        drop(map);
        self.active.remove(&key);
        Ok(())
    }

    /// Un type utilisateur est émis comme objet : son identité est celle du
    /// `Rc` d’origine, son contenu celui de la projection (appelée une fois).
    fn encode_custom(&mut self, rc: &Rc<dyn ToPlain>) -> Result<()> {
        let key = Rc::as_ptr(rc).cast::<()>();
        if self.emit_back_edge(key) {
            return Ok(());
        }
        self.register(key)?;
        self.payload.write_u8(Tag::Object as u8);
        let Value::Object(plain) = rc.to_plain() else {
            return Err(Error::UnsupportedType("projection did not produce an object"));
        };
        let map = plain.borrow();
        self.write_entries(&map)?;
        drop(map);
        self.active.remove(&key);
        Ok(())
    }

    fn write_entries(&mut self, map: &IndexMap<String, Value>) -> Result<()> {
        varint::write_count(&mut self.payload, map.len())?;
        for (name, val) in map {
            let ix = self.intern_name(name)?;
            varint::write_u32(&mut self.payload, ix);
            self.encode_value(val)?;
        }
        Ok(())
    }

    fn intern_name(&mut self, name: &str) -> Result<u32> {
        if let Some(&ix) = self.names.get(name) {
            return Ok(ix);
        }
        if name.as_bytes().contains(&0) {
            return Err(Error::UnsupportedType("property name contains a NUL byte"));
        }
        let ix = u32::try_from(self.names.len())
            .map_err(|_| Error::InvalidCount(self.names.len() as u64))?;
        self.names.insert(name.to_owned(), ix);
        Ok(ix)
    }

    fn intern_string(&mut self, s: &str) -> Result<u32> {
        if s.is_empty() {
            return Ok(0);
        }
        if let Some(&ix) = self.strings.get(s) {
            return Ok(ix);
        }
        if s.as_bytes().contains(&0) {
            return Err(Error::UnsupportedType("string contains a NUL byte"));
        }
        let ix = u32::try_from(self.strings.len() + 1)
            .map_err(|_| Error::InvalidCount(self.strings.len() as u64 + 1))?;
        self.strings.insert(s.to_owned(), ix);
        Ok(ix)
    }

    /// Assemble `en-tête || tables || payload`. Le payload a été émis en
    /// premier pour que les tables soient complètes au moment de l’écrire.
    fn finish(self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let payload = self.payload.into_vec();

        let mut header = ByteWriter::with_capacity(payload.len() / 4 + 16);
        let mut b0 = MAJOR_VERSION;
        if !self.has_cycle {
            b0 |= Options::NOCYCLE.bits();
        }
        if options.crc32 {
            b0 |= Options::CRC32.bits();
        }
        header.write_u8(b0);
        if options.crc32 {
            header.write_u32_be(crc32_ieee(&payload));
        }

        varint::write_count(&mut header, self.names.len())?;
        for name in self.names.keys() {
            header.write_cstr(name);
        }
        varint::write_count(&mut header, self.strings.len())?;
        for s in self.strings.keys() {
            header.write_cstr(s);
        }

        let mut out = header.into_vec();
        out.extend_from_slice(&payload);
        Ok(out)
    }
}
