//! Structural clone across the guest/host boundary.

use std::collections::BTreeMap;

use hb_core::GuestValue;
use rhai::{Array, Dynamic, FnPtr, Map};

use super::types::{
    GuestBigInt, GuestDate, GuestMap, GuestNull, GuestObject, GuestRegExp, GuestSet, GuestSymbol,
};
use crate::assertion::iso_timestamp;

const MAX_DEPTH: usize = 64;
/// Nodes one clone may visit; shared handles are cloned once per path.
const MAX_NODES: usize = 100_000;

/// Clones a guest value into host data. Identity, integrity, collection kind
/// and callability are lost on the way; pre-check metadata carries them.
/// An object reached again through itself becomes `"[Circular]"`.
pub(crate) fn to_guest_value(value: &Dynamic) -> GuestValue {
    Crossing::default().convert(value, 0)
}

#[derive(Default)]
struct Crossing {
    /// Objects on the path from the root to the current node.
    path: Vec<*const ()>,
    visited: usize,
}

impl Crossing {
    fn convert(&mut self, value: &Dynamic, depth: usize) -> GuestValue {
        if depth > MAX_DEPTH {
            return GuestValue::string("[Circular]");
        }
        self.visited += 1;
        if self.visited > MAX_NODES {
            return GuestValue::string("[Truncated]");
        }
        let value = value.flatten_clone();

        if value.is_unit() {
            return GuestValue::Undefined;
        }
        if value.is::<GuestNull>() {
            return GuestValue::Null;
        }
        if let Ok(flag) = value.as_bool() {
            return GuestValue::Bool(flag);
        }
        if let Ok(number) = value.as_int() {
            return GuestValue::Int(number);
        }
        if let Ok(number) = value.as_float() {
            return GuestValue::Float(number);
        }
        if value.is_string() {
            return GuestValue::String(value.to_string());
        }
        if let Ok(ch) = value.as_char() {
            return GuestValue::String(ch.to_string());
        }
        if let Some(items) = value.read_lock::<Array>() {
            return GuestValue::Array(
                items
                    .iter()
                    .map(|item| self.convert(item, depth + 1))
                    .collect(),
            );
        }
        if let Some(map) = value.read_lock::<Map>() {
            return GuestValue::Object(self.convert_entries(&map, depth));
        }
        if let Some(pointer) = value.read_lock::<FnPtr>() {
            return GuestValue::Function {
                name: (!pointer.is_anonymous()).then(|| pointer.fn_name().to_string()),
            };
        }
        if value.is::<GuestSet>() || value.is::<GuestMap>() || value.is::<GuestRegExp>() {
            return GuestValue::Object(BTreeMap::new());
        }
        if let Some(date) = value.read_lock::<GuestDate>() {
            return GuestValue::String(iso_timestamp(date.millis()));
        }
        if let Some(object) = value.read_lock::<GuestObject>() {
            let identity = object.identity();
            if self.path.contains(&identity) {
                return GuestValue::string("[Circular]");
            }
            self.path.push(identity);
            let entries = self.convert_entries(&object.state().entries, depth);
            self.path.pop();
            return GuestValue::Object(entries);
        }
        if let Some(number) = value.read_lock::<GuestBigInt>() {
            return GuestValue::BigInt(number.0.clone());
        }
        if let Some(symbol) = value.read_lock::<GuestSymbol>() {
            return GuestValue::Symbol(symbol.description().to_string());
        }
        GuestValue::String(format!("[object {}]", value.type_name()))
    }

    fn convert_entries(&mut self, map: &Map, depth: usize) -> BTreeMap<String, GuestValue> {
        map.iter()
            .map(|(key, value)| (key.to_string(), self.convert(value, depth + 1)))
            .collect()
    }
}

/// Rebuilds a guest value from host data: `Null` becomes the `NULL`
/// constant, objects become Rhai maps.
pub(crate) fn from_guest_value(value: &GuestValue) -> Dynamic {
    match value {
        GuestValue::Undefined | GuestValue::Function { .. } => Dynamic::UNIT,
        GuestValue::Null => Dynamic::from(GuestNull),
        GuestValue::Bool(flag) => Dynamic::from_bool(*flag),
        GuestValue::Int(number) => Dynamic::from_int(*number),
        GuestValue::Float(number) => Dynamic::from_float(*number),
        GuestValue::BigInt(digits) => Dynamic::from(GuestBigInt(digits.clone())),
        GuestValue::Symbol(description) => {
            Dynamic::from(GuestValue::Symbol(description.clone()).to_js_string())
        }
        GuestValue::String(text) => Dynamic::from(text.clone()),
        GuestValue::Array(items) => Dynamic::from_array(items.iter().map(from_guest_value).collect()),
        GuestValue::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.as_str().into(), from_guest_value(value));
            }
            Dynamic::from_map(map)
        }
    }
}

/// JSON projection of a guest value, for serde-typed setters.
pub(crate) fn to_json(value: &Dynamic) -> serde_json::Value {
    to_guest_value(value).to_json()
}

pub(crate) fn from_json(value: &serde_json::Value) -> Dynamic {
    from_guest_value(&GuestValue::from_json(value))
}

#[cfg(test)]
mod crossing_tests {
    use super::*;

    #[test]
    fn crossing_loses_collection_kind_and_identity() {
        assert_eq!(
            to_guest_value(&Dynamic::from(GuestSet::default())),
            GuestValue::Object(BTreeMap::new())
        );
        assert_eq!(to_guest_value(&Dynamic::UNIT), GuestValue::Undefined);
        assert_eq!(to_guest_value(&Dynamic::from(GuestNull)), GuestValue::Null);
        assert_eq!(
            to_guest_value(&Dynamic::from(GuestBigInt("9".to_string()))),
            GuestValue::BigInt("9".to_string())
        );
    }

    #[test]
    fn json_round_trips_through_rhai_values() {
        let json = serde_json::json!({"a": [1, 2.5, null, "x"], "b": {"c": true}});
        let dynamic = from_json(&json);
        assert!(dynamic.is_map());
        assert_eq!(to_json(&dynamic), json);
    }

    #[test]
    fn nesting_is_capped() {
        let mut value = Dynamic::from_int(0);
        for _ in 0..(MAX_DEPTH + 5) {
            value = Dynamic::from_array(vec![value]);
        }
        let mut crossed = &to_guest_value(&value);
        let mut depth = 0;
        while let GuestValue::Array(items) = crossed {
            crossed = &items[0];
            depth += 1;
        }
        assert_eq!(depth, MAX_DEPTH + 1);
        assert_eq!(crossed, &GuestValue::string("[Circular]"));
    }

    #[test]
    fn self_references_stop_at_the_repeat() {
        let object = GuestObject::new(Map::new());
        let handle = Dynamic::from(object.clone());
        object
            .set("a", handle.clone())
            .expect("write to a fresh object should succeed");
        object
            .set("b", handle.clone())
            .expect("write to a fresh object should succeed");

        let GuestValue::Object(entries) = to_guest_value(&handle) else {
            panic!("object should cross as an object");
        };
        assert_eq!(entries.get("a"), Some(&GuestValue::string("[Circular]")));
        assert_eq!(entries.get("b"), Some(&GuestValue::string("[Circular]")));
    }

    #[test]
    fn shared_handles_are_cloned_on_every_path_up_to_the_node_cap() {
        let mut layer = Dynamic::from(GuestObject::new(Map::new()));
        for _ in 0..40 {
            let next = GuestObject::new(Map::new());
            next.set("left", layer.clone())
                .expect("write to a fresh object should succeed");
            next.set("right", layer.clone())
                .expect("write to a fresh object should succeed");
            layer = Dynamic::from(next);
        }
        let text = to_guest_value(&layer).to_json().to_string();
        assert!(text.contains("[Truncated]"));
        assert!(!text.contains("[Circular]"));
    }
}
