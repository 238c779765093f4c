//! Modèle de valeurs : l’univers encodable du format.
//!
//! Les conteneurs (`Array`, `Object`) portent une **identité** via `Rc` :
//! deux apparitions du même conteneur dans un graphe sont émises une fois
//! par valeur puis par back-edge, et le décodage restitue le partage
//! (`Rc::ptr_eq`). Les autres variantes sont toujours émises par valeur.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

/// Conteneur tableau partageable.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Conteneur objet partageable (ordre d’insertion des clés préservé).
pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Projection utilisateur vers un objet plat.
///
/// Un type qui veut contrôler sa sérialisation expose cette unique
/// opération ; l’encodeur l’appelle **une seule fois** par première
/// occurrence et exige que le résultat soit un [`Value::Object`].
pub trait ToPlain {
    /// Renvoie la représentation plate à encoder.
    fn to_plain(&self) -> Value;
}

/// Valeur dynamique, univers complet du format.
#[derive(Clone)]
pub enum Value {
    /// Undefined (distinct de null).
    Undefined,
    /// Null.
    Null,
    /// Booléen.
    Bool(bool),
    /// Entier. Canonique dans la plage i32 ; au-delà, émis comme f64.
    Int(i64),
    /// Flottant 64 bits (y compris NaN et ±∞).
    Float(f64),
    /// Chaîne UTF-8 possédée.
    Str(String),
    /// Date : millisecondes depuis l’epoch Unix.
    Date(f64),
    /// Blob binaire opaque.
    Bytes(Vec<u8>),
    /// Tableau ordonné, à identité.
    Array(ArrayRef),
    /// Objet (clés → valeurs, ordre d’insertion), à identité.
    Object(ObjectRef),
    /// Type utilisateur projeté via [`ToPlain`] au moment de l’encodage.
    Custom(Rc<dyn ToPlain>),
}

impl Value {
    /// Construit un tableau à partir d’un itérateur de valeurs.
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Construit un objet à partir d’un itérateur `(clé, valeur)`.
    pub fn object<K: Into<String>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Self {
        Value::Object(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Construit un nombre sous forme canonique : entier exact dans la plage
    /// i32 → [`Value::Int`], sinon [`Value::Float`].
    pub fn number(x: f64) -> Self {
        if x.is_finite() && x.fract() == 0.0 && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&x) {
            Value::Int(x as i64)
        } else {
            Value::Float(x)
        }
    }

    /// Construit une date depuis des millisecondes epoch.
    pub const fn date(millis: f64) -> Self { Value::Date(millis) }

    /// Vrai pour `Undefined`.
    pub const fn is_undefined(&self) -> bool { matches!(self, Value::Undefined) }

    /// Vrai pour `Null`.
    pub const fn is_null(&self) -> bool { matches!(self, Value::Null) }

    /// Booléen, si c’en est un.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Entier, si c’en est un.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Valeur numérique (entier ou flottant).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Chaîne, si c’en est une.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Octets bruts, si c’en est.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Conteneur tableau, si c’en est un.
    pub const fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Conteneur objet, si c’en est un.
    pub const fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Comparaison d’identité : vrai si `self` et `other` sont le **même**
    /// conteneur (même allocation). Toujours faux hors conteneurs.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Custom(a), Value::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Égalité **structurelle** : les conteneurs sont comparés par contenu
/// (les flottants par bits). Diverge sur un graphe cyclique — réservée aux
/// valeurs acycliques ; pour l’identité, voir [`Value::ptr_eq`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Custom(a), Value::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    // Volontairement non récursif : sûr même sur un graphe cyclique.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => {
                if s.len() > 64 {
                    write!(f, "Str(len={})", s.len())
                } else {
                    write!(f, "Str({s:?})")
                }
            }
            Value::Date(ms) => write!(f, "Date({ms}ms)"),
            Value::Bytes(b) => write!(f, "Bytes(len={})", b.len()),
            Value::Array(a) => write!(f, "Array(len={})", a.borrow().len()),
            Value::Object(o) => write!(f, "Object(len={})", o.borrow().len()),
            Value::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/* Conversions conviviales */
impl From<()> for Value {
    fn from(_: ()) -> Self { Value::Null }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(i64::from(v)) }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self { Value::Int(i64::from(v)) }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::number(v) }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_owned()) }
}
impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v) }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Value::Bytes(v) }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self { Value::Array(Rc::new(RefCell::new(v))) }
}
impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self { Value::Object(Rc::new(RefCell::new(v))) }
}
impl From<SystemTime> for Value {
    fn from(t: SystemTime) -> Self {
        let ms = match t.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs_f64() * 1000.0,
            Err(e) => -(e.duration().as_secs_f64() * 1000.0),
        };
        Value::Date(ms)
    }
}
