//! Interop JSON (feature `json`) : conversions explicites, documentées
//! comme partiellement lossy — JSON n’a ni undefined, ni date, ni octets.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::Value;

impl Value {
    /// Convertit une valeur JSON. Sans perte : les nombres entiers en i64
    /// deviennent [`Value::Int`], le reste [`Value::Float`] ; l’ordre des
    /// clés d’objet est conservé.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::array(items.iter().map(Value::from_json)),
            serde_json::Value::Object(map) => {
                Value::object(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))))
            }
        }
    }

    /// Convertit vers JSON. Lossy par nature :
    /// - `Undefined` → null ; flottants non finis → null
    /// - `Date` → nombre (millisecondes epoch)
    /// - `Bytes` → tableau de nombres
    /// - le partage de conteneurs est déplié (dupliqué)
    ///
    /// Refuse un graphe cyclique ([`Error::UnsupportedType`]).
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut active = HashSet::new();
        self.to_json_inner(&mut active)
    }

    fn to_json_inner(&self, active: &mut HashSet<*const ()>) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => (*b).into(),
            Value::Int(i) => (*i).into(),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => s.clone().into(),
            Value::Date(ms) => serde_json::Number::from_f64(*ms)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|&x| x.into()).collect()),
            Value::Array(rc) => {
                let key = Rc::as_ptr(rc).cast::<()>();
                if !active.insert(key) {
                    return Err(Error::UnsupportedType("cyclic value"));
                }
                let out = rc
                    .borrow()
                    .iter()
                    .map(|v| v.to_json_inner(active))
                    .collect::<Result<Vec<_>>>()?;
                active.remove(&key);
                serde_json::Value::Array(out)
            }
            Value::Object(rc) => {
                let key = Rc::as_ptr(rc).cast::<()>();
                if !active.insert(key) {
                    return Err(Error::UnsupportedType("cyclic value"));
                }
                let mut out = serde_json::Map::new();
                for (k, v) in rc.borrow().iter() {
                    out.insert(k.clone(), v.to_json_inner(active)?);
                }
                active.remove(&key);
                serde_json::Value::Object(out)
            }
            Value::Custom(rc) => {
                let key = Rc::as_ptr(rc).cast::<()>();
                if !active.insert(key) {
                    return Err(Error::UnsupportedType("cyclic value"));
                }
                let out = rc.to_plain().to_json_inner(active)?;
                active.remove(&key);
                out
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn from_json_roundtrips_through_codec() {
        let j = json!({
            "name": "o1",
            "count": 42,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": { "ok": true, "nothing": null }
        });
        let v = Value::from_json(&j);
        let v2 = crate::decode(&crate::encode(&v).unwrap()).unwrap();
        assert_eq!(v2, v);
        assert_eq!(v2.to_json().unwrap(), j);
    }

    #[test]
    fn key_order_is_preserved() {
        let j = json!({ "z": 1, "a": 2, "m": 3 });
        let v = Value::from_json(&j);
        let map = v.as_object().unwrap().borrow();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn lossy_mappings() {
        assert_eq!(Value::Undefined.to_json().unwrap(), serde_json::Value::Null);
        assert_eq!(Value::Float(f64::NAN).to_json().unwrap(), serde_json::Value::Null);
        assert_eq!(Value::Date(1000.0).to_json().unwrap(), json!(1000.0));
        assert_eq!(Value::Bytes(vec![1, 2]).to_json().unwrap(), json!([1, 2]));
    }

    #[test]
    fn shared_containers_are_unfolded() {
        let shared = Value::array([Value::Int(1)]);
        let v = Value::object([("x", shared.clone()), ("y", shared)]);
        assert_eq!(v.to_json().unwrap(), json!({ "x": [1], "y": [1] }));
    }

    #[test]
    fn cycles_are_refused() {
        let arr = Value::array([]);
        if let Value::Array(rc) = &arr {
            rc.borrow_mut().push(arr.clone());
        }
        assert!(matches!(arr.to_json(), Err(Error::UnsupportedType(_))));
    }
}
