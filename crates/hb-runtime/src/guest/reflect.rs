//! Guest-side reflection: the facts an assertion needs that do not survive
//! crossing the boundary.

use hb_core::{CollectionKind, PreCheckMetadata, SpecialValue};
use rhai::{Array, Dynamic, FnPtr, ImmutableString, Map, FLOAT, INT};

use super::crossing::to_guest_value;
use super::types::{
    GuestBigInt, GuestDate, GuestMap, GuestNull, GuestObject, GuestRegExp, GuestSet, GuestSymbol,
    ERROR_CONSTRUCTORS,
};
use crate::assertion::format_value;

const INHERITED_OBJECT_PROPERTIES: &[&str] = &[
    "constructor",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
    "toString",
    "valueOf",
];

const SET_METHODS: &[&str] = &["add", "has", "delete", "clear", "values"];
const MAP_METHODS: &[&str] = &["set", "get", "has", "delete", "clear", "keys", "values", "entries"];
const DATE_METHODS: &[&str] = &["getTime", "toISOString"];
const REGEXP_METHODS: &[&str] = &["test"];
const OBJECT_METHODS: &[&str] = &["keys", "has", "remove"];
const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "shift", "insert", "remove", "len", "map", "filter", "reduce", "some", "all",
    "index_of", "contains", "sort", "reverse",
];
const STRING_METHODS: &[&str] = &[
    "len", "to_upper", "to_lower", "trim", "contains", "index_of", "sub_string", "split",
    "replace",
];

/// `SameValueZero`: handles compare by identity, Rhai maps and arrays by
/// content.
///
/// Rhai maps and arrays are value types: assignment copies them, so two
/// `#{a: 1}` literals are indistinguishable from one shared map. Guests that
/// need reference semantics build an `object(..)`, `Set(..)` or `Map(..)`
/// handle instead.
pub(crate) fn same_value(left: &Dynamic, right: &Dynamic) -> bool {
    let left = left.flatten_clone();
    let right = right.flatten_clone();

    if left.is_unit() || right.is_unit() {
        return left.is_unit() && right.is_unit();
    }
    if left.is::<GuestNull>() || right.is::<GuestNull>() {
        return left.is::<GuestNull>() && right.is::<GuestNull>();
    }
    if let (Some(a), Some(b)) = (number(&left), number(&right)) {
        return a == b || (a.is_nan() && b.is_nan());
    }
    if let (Ok(a), Ok(b)) = (left.as_bool(), right.as_bool()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (text(&left), text(&right)) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (left.read_lock::<Array>(), right.read_lock::<Array>()) {
        return a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| same_value(x, y));
    }
    if let (Some(a), Some(b)) = (left.read_lock::<Map>(), right.read_lock::<Map>()) {
        return a.len() == b.len()
            && a.iter()
                .all(|(key, value)| b.get(key).is_some_and(|other| same_value(value, other)));
    }
    if let (Some(a), Some(b)) = (left.read_lock::<FnPtr>(), right.read_lock::<FnPtr>()) {
        return a.fn_name() == b.fn_name();
    }
    if let (Some(a), Some(b)) = (left.read_lock::<GuestSet>(), right.read_lock::<GuestSet>()) {
        return a.ptr_eq(&b);
    }
    if let (Some(a), Some(b)) = (left.read_lock::<GuestMap>(), right.read_lock::<GuestMap>()) {
        return a.ptr_eq(&b);
    }
    if let (Some(a), Some(b)) = (left.read_lock::<GuestDate>(), right.read_lock::<GuestDate>()) {
        return a.ptr_eq(&b);
    }
    if let (Some(a), Some(b)) = (
        left.read_lock::<GuestRegExp>(),
        right.read_lock::<GuestRegExp>(),
    ) {
        return a.ptr_eq(&b);
    }
    if let (Some(a), Some(b)) = (
        left.read_lock::<GuestObject>(),
        right.read_lock::<GuestObject>(),
    ) {
        return a.ptr_eq(&b);
    }
    if let (Some(a), Some(b)) = (
        left.read_lock::<GuestBigInt>(),
        right.read_lock::<GuestBigInt>(),
    ) {
        return *a == *b;
    }
    if let (Some(a), Some(b)) = (
        left.read_lock::<GuestSymbol>(),
        right.read_lock::<GuestSymbol>(),
    ) {
        return a.ptr_eq(&b);
    }
    false
}

fn number(value: &Dynamic) -> Option<f64> {
    if let Ok(number) = value.as_int() {
        return Some(number as f64);
    }
    value.as_float().ok()
}

fn text(value: &Dynamic) -> Option<String> {
    if value.is_string() {
        return Some(value.to_string());
    }
    value.as_char().ok().map(String::from)
}

/// Is `value` one of the handle or composite kinds (anything `typeof` would
/// call an object or function)?
pub(crate) fn is_composite(value: &Dynamic) -> bool {
    let value = value.flatten_clone();
    value.is::<Array>()
        || value.is::<Map>()
        || value.is::<FnPtr>()
        || value.is::<GuestSet>()
        || value.is::<GuestMap>()
        || value.is::<GuestDate>()
        || value.is::<GuestRegExp>()
        || value.is::<GuestObject>()
}

/// Lowercase tag: `typeof` with `null`, `array`, `set`, `map`, `date` and
/// `regexp` split out.
pub(crate) fn type_tag(value: &Dynamic) -> &'static str {
    let value = value.flatten_clone();
    if value.is_unit() {
        "undefined"
    } else if value.is::<GuestNull>() {
        "null"
    } else if value.is::<bool>() {
        "boolean"
    } else if value.is::<INT>() || value.is::<FLOAT>() {
        "number"
    } else if value.is_string() || value.is::<char>() {
        "string"
    } else if value.is::<Array>() {
        "array"
    } else if value.is::<FnPtr>() {
        "function"
    } else if value.is::<GuestSet>() {
        "set"
    } else if value.is::<GuestMap>() {
        "map"
    } else if value.is::<GuestDate>() {
        "date"
    } else if value.is::<GuestRegExp>() {
        "regexp"
    } else if value.is::<GuestBigInt>() {
        "bigint"
    } else if value.is::<GuestSymbol>() {
        "symbol"
    } else {
        "object"
    }
}

/// `Object.prototype.toString` tag.
pub(crate) fn object_tag(value: &Dynamic) -> String {
    let tag = match type_tag(value) {
        "undefined" => "Undefined",
        "null" => "Null",
        "boolean" => "Boolean",
        "number" => "Number",
        "string" => "String",
        "array" => "Array",
        "function" => "Function",
        "set" => "Set",
        "map" => "Map",
        "date" => "Date",
        "regexp" => "RegExp",
        "bigint" => "BigInt",
        "symbol" => "Symbol",
        _ if error_name(value).is_some() => "Error",
        _ => "Object",
    };
    format!("[object {tag}]")
}

/// Constructor name of an error map (`Error(..)`, `TypeError(..)`, ...).
pub(crate) fn error_name(value: &Dynamic) -> Option<String> {
    let value = value.flatten_clone();
    let map = value.read_lock::<Map>()?;
    let name = map.get("name")?.to_string();
    (map.contains_key("message") && name.ends_with("Error")).then_some(name)
}

const SHOWN_SET_ITEMS: usize = 10;
const SHOWN_MAP_ENTRIES: usize = 3;

fn constructor_literal(name: &str, parts: Vec<String>) -> String {
    if parts.is_empty() {
        format!("new {name}()")
    } else {
        format!("new {name}([{}])", parts.join(", "))
    }
}

/// Literal shown in messages for values that cross as `{}`. Sets show their
/// first ten items and maps their first three entries.
pub(crate) fn display_literal(value: &Dynamic) -> Option<String> {
    let value = value.flatten_clone();
    if let Some(set) = value.read_lock::<GuestSet>() {
        let items = set
            .items()
            .iter()
            .take(SHOWN_SET_ITEMS)
            .map(|item| format_value(&to_guest_value(item)))
            .collect::<Vec<_>>();
        return Some(constructor_literal("Set", items));
    }
    if let Some(map) = value.read_lock::<GuestMap>() {
        let entries = map
            .entries()
            .iter()
            .take(SHOWN_MAP_ENTRIES)
            .map(|(key, value)| {
                format!(
                    "[{}, {}]",
                    format_value(&to_guest_value(key)),
                    format_value(&to_guest_value(value))
                )
            })
            .collect::<Vec<_>>();
        return Some(constructor_literal("Map", entries));
    }
    if let Some(pattern) = value.read_lock::<GuestRegExp>() {
        return Some(format!("/{}/{}", pattern.source(), pattern.flags()));
    }
    None
}

pub(crate) fn special(value: &Dynamic) -> Option<SpecialValue> {
    let value = value.flatten_clone();
    if let Some(date) = value.read_lock::<GuestDate>() {
        return Some(SpecialValue::Date {
            millis: date.millis(),
        });
    }
    value
        .read_lock::<GuestRegExp>()
        .map(|pattern| SpecialValue::RegExp {
            source: pattern.source().to_string(),
            flags: pattern.flags().to_string(),
        })
}

pub(crate) fn collection(value: &Dynamic) -> Option<(CollectionKind, usize)> {
    let value = value.flatten_clone();
    if let Some(set) = value.read_lock::<GuestSet>() {
        return Some((CollectionKind::Set, set.len()));
    }
    value
        .read_lock::<GuestMap>()
        .map(|map| (CollectionKind::Map, map.len()))
}

/// Set elements, or map values.
fn members(value: &Dynamic) -> Option<Vec<Dynamic>> {
    let value = value.flatten_clone();
    if let Some(set) = value.read_lock::<GuestSet>() {
        return Some(set.items());
    }
    value.read_lock::<GuestMap>().map(|map| {
        map.entries()
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    })
}

/// Map keys, or set elements.
fn keys(value: &Dynamic) -> Option<Vec<Dynamic>> {
    let value = value.flatten_clone();
    if let Some(set) = value.read_lock::<GuestSet>() {
        return Some(set.items());
    }
    value
        .read_lock::<GuestMap>()
        .map(|map| map.entries().into_iter().map(|(key, _)| key).collect())
}

fn length(value: &Dynamic) -> Option<usize> {
    let value = value.flatten_clone();
    if let Some((_, size)) = collection(&value) {
        return Some(size);
    }
    if value.is_string() {
        return Some(value.to_string().chars().count());
    }
    value.read_lock::<Array>().map(|items| items.len())
}

/// `(extensible, sealed, frozen)` as `Object.isExtensible` and friends report
/// them. Primitives are sealed and frozen; Rhai maps and arrays always stay
/// open.
pub(crate) fn integrity(value: &Dynamic) -> (bool, bool, bool) {
    let value = value.flatten_clone();
    if let Some(object) = value.read_lock::<GuestObject>() {
        let state = object.state();
        let closed_and_empty = !state.extensible && state.entries.is_empty();
        return (
            state.extensible,
            state.sealed || closed_and_empty,
            state.frozen || closed_and_empty,
        );
    }
    if is_composite(&value) {
        (true, false, false)
    } else {
        (false, true, true)
    }
}

fn own_keys(value: &Dynamic) -> Vec<String> {
    let value = value.flatten_clone();
    if let Some(object) = value.read_lock::<GuestObject>() {
        return object
            .state()
            .entries
            .keys()
            .map(|key| key.to_string())
            .collect();
    }
    if let Some(map) = value.read_lock::<Map>() {
        return map.keys().map(|key| key.to_string()).collect();
    }
    if let Some(items) = value.read_lock::<Array>() {
        let mut keys = (0..items.len()).map(|index| index.to_string()).collect::<Vec<_>>();
        keys.push("length".to_string());
        return keys;
    }
    if value.is_string() {
        let count = value.to_string().chars().count();
        let mut keys = (0..count).map(|index| index.to_string()).collect::<Vec<_>>();
        keys.push("length".to_string());
        return keys;
    }
    Vec::new()
}

pub(crate) fn own_property(value: &Dynamic, name: &str) -> bool {
    own_keys(value).iter().any(|key| key == name)
}

/// `name in value`: own keys plus what the prototype chain provides.
pub(crate) fn has_property(value: &Dynamic, name: &str) -> bool {
    if own_property(value, name) {
        return true;
    }
    let value = value.flatten_clone();
    if value.is_unit() || value.is::<GuestNull>() {
        return false;
    }
    if collection(&value).is_some() && name == "size" {
        return true;
    }
    INHERITED_OBJECT_PROPERTIES.contains(&name) || methods_of(&value).contains(&name)
}

fn methods_of(value: &Dynamic) -> &'static [&'static str] {
    match type_tag(value) {
        "set" => SET_METHODS,
        "map" => MAP_METHODS,
        "date" => DATE_METHODS,
        "regexp" => REGEXP_METHODS,
        "array" => ARRAY_METHODS,
        "string" => STRING_METHODS,
        _ if value.is::<GuestObject>() => OBJECT_METHODS,
        _ => &[],
    }
}

pub(crate) fn responds_to(value: &Dynamic, method: &str) -> bool {
    let value = value.flatten_clone();
    let callable = |entry: Option<Dynamic>| entry.is_some_and(|entry| entry.flatten_clone().is::<FnPtr>());
    if let Some(map) = value.read_lock::<Map>() {
        if callable(map.get(method).cloned()) {
            return true;
        }
    }
    if let Some(object) = value.read_lock::<GuestObject>() {
        if callable(object.get(method)) {
            return true;
        }
    }
    methods_of(&value).contains(&method)
}

/// Name a constructor argument refers to: a string, or a function pointer
/// such as `Fn("Date")`.
pub(crate) fn constructor_name(constructor: &Dynamic) -> String {
    let constructor = constructor.flatten_clone();
    let name = match constructor.read_lock::<FnPtr>() {
        Some(pointer) => pointer.fn_name().to_string(),
        None => constructor.to_string(),
    };
    name
}

pub(crate) fn instance_of(value: &Dynamic, constructor: &str) -> bool {
    let value = value.flatten_clone();
    match constructor {
        "Object" => is_composite(&value),
        "Array" => value.is::<Array>(),
        "Function" => value.is::<FnPtr>(),
        "Set" => value.is::<GuestSet>(),
        "Map" => value.is::<GuestMap>(),
        "Date" => value.is::<GuestDate>(),
        "RegExp" => value.is::<GuestRegExp>(),
        "Error" => error_name(&value).is_some(),
        name if ERROR_CONSTRUCTORS.contains(&name) => error_name(&value).as_deref() == Some(name),
        name => declared_constructor(&value).as_deref() == Some(name),
    }
}

/// `constructor` field of a map or object used as a user-defined class.
fn declared_constructor(value: &Dynamic) -> Option<String> {
    if let Some(map) = value.read_lock::<Map>() {
        return map.get("constructor").map(constructor_name);
    }
    value
        .read_lock::<GuestObject>()
        .and_then(|object| object.get("constructor"))
        .map(|field| constructor_name(&field))
}

/// Reads `property` from a map, object or array for change assertions.
pub(crate) fn read_property(target: &Dynamic, property: &str) -> Dynamic {
    let target = target.flatten_clone();
    if let Some(object) = target.read_lock::<GuestObject>() {
        return object.get(property).unwrap_or(Dynamic::UNIT);
    }
    if let Some(map) = target.read_lock::<Map>() {
        return map
            .get(property)
            .map(Dynamic::flatten_clone)
            .unwrap_or(Dynamic::UNIT);
    }
    if let Some(items) = target.read_lock::<Array>() {
        if property == "length" {
            return Dynamic::from_int(items.len() as INT);
        }
        return property
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index).cloned())
            .unwrap_or(Dynamic::UNIT);
    }
    Dynamic::UNIT
}

/// Facts every assertion starts from.
pub(crate) fn metadata(value: &Dynamic) -> PreCheckMetadata {
    let (extensible, sealed, frozen) = integrity(value);
    let collection = collection(value);
    PreCheckMetadata {
        type_tag: Some(type_tag(value).to_string()),
        object_tag: Some(object_tag(value)),
        collection: collection.map(|(kind, _)| kind),
        size: collection.map(|(_, size)| size),
        length: length(value),
        display: display_literal(value),
        special: special(value),
        members: members(value).map(|items| items.iter().map(to_guest_value).collect()),
        keys: keys(value).map(|items| items.iter().map(to_guest_value).collect()),
        frozen: Some(frozen),
        sealed: Some(sealed),
        extensible: Some(extensible),
        is_arguments: Some(false),
        ..PreCheckMetadata::default()
    }
}

/// Adds what a comparison against `expected` needs.
pub(crate) fn with_expected(
    mut meta: PreCheckMetadata,
    value: &Dynamic,
    expected: &Dynamic,
) -> PreCheckMetadata {
    if is_composite(value) || is_composite(expected) {
        meta.same_reference = Some(same_value(value, expected));
    }
    meta.expected_display = display_literal(expected);
    meta.expected_special = special(expected);
    meta
}

pub(crate) fn string_argument(value: &Dynamic) -> Option<ImmutableString> {
    let value = value.flatten_clone();
    value.is_string().then(|| value.to_string().into())
}

#[cfg(test)]
mod reflect_tests {
    use super::*;

    fn map(entries: &[(&str, Dynamic)]) -> Dynamic {
        let mut out = Map::new();
        for (key, value) in entries {
            out.insert((*key).into(), value.clone());
        }
        Dynamic::from_map(out)
    }

    #[test]
    fn same_value_uses_identity_for_handles() {
        let set = Dynamic::from(GuestSet::default());
        assert!(same_value(&set, &set.clone()));
        assert!(!same_value(&set, &Dynamic::from(GuestSet::default())));
        assert!(same_value(&Dynamic::from_int(1), &Dynamic::from_float(1.0)));
        assert!(same_value(
            &Dynamic::from_float(f64::NAN),
            &Dynamic::from_float(f64::NAN)
        ));
        assert!(!same_value(&Dynamic::UNIT, &Dynamic::from(GuestNull)));
    }

    #[test]
    fn type_and_object_tags_split_special_kinds() {
        assert_eq!(type_tag(&Dynamic::from(GuestNull)), "null");
        assert_eq!(type_tag(&Dynamic::from_array(vec![])), "array");
        assert_eq!(type_tag(&Dynamic::from(GuestSet::default())), "set");
        assert_eq!(object_tag(&Dynamic::from(GuestMap::default())), "[object Map]");
        let error = map(&[
            ("name", Dynamic::from("TypeError".to_string())),
            ("message", Dynamic::from("bad".to_string())),
        ]);
        assert_eq!(object_tag(&error), "[object Error]");
        assert!(instance_of(&error, "Error"));
        assert!(instance_of(&error, "TypeError"));
        assert!(!instance_of(&error, "RangeError"));
    }

    #[test]
    fn metadata_reports_collection_size_and_display() {
        let meta = metadata(&Dynamic::from(GuestSet::default()));
        assert_eq!(meta.collection, Some(CollectionKind::Set));
        assert_eq!(meta.size, Some(0));
        assert_eq!(meta.display.as_deref(), Some("new Set()"));
        assert_eq!(meta.extensible, Some(true));
        assert_eq!(meta.frozen, Some(false));

        let primitive = metadata(&Dynamic::from_int(3));
        assert_eq!(primitive.frozen, Some(true));
        assert_eq!(primitive.type_tag.as_deref(), Some("number"));
    }

    #[test]
    fn properties_distinguish_own_from_inherited() {
        let value = map(&[("name", Dynamic::from("a".to_string()))]);
        assert!(own_property(&value, "name"));
        assert!(has_property(&value, "toString"));
        assert!(!own_property(&value, "toString"));
        assert!(!has_property(&Dynamic::UNIT, "toString"));
        assert!(has_property(&Dynamic::from_array(vec![]), "length"));
    }

    #[test]
    fn user_classes_match_their_constructor_field() {
        let point = map(&[("constructor", Dynamic::from("Point".to_string()))]);
        assert!(instance_of(&point, "Point"));
        assert!(instance_of(&point, "Object"));
        assert!(!instance_of(&point, "Array"));
    }
}
