//! Reference types the guest gets on top of plain Rhai values.
//!
//! Rhai maps and arrays are values; these are handles. Cloning a handle keeps
//! its identity, which is what reference-equality and integrity checks need.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use regex::Regex;
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, FLOAT, INT};

use super::crossing::to_guest_value;
use super::reflect::{display_literal, same_value};
use crate::assertion::{build_regex, format_value, iso_timestamp};
use crate::errors::{guest_error, GuestResult};

/// The guest's `NULL` constant. Rhai has only `()`, which stands for
/// `undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GuestNull;

#[derive(Debug, Clone, Default)]
pub(crate) struct GuestSet {
    items: Rc<RefCell<Vec<Dynamic>>>,
}

impl GuestSet {
    fn from_items(items: Array) -> Self {
        let set = Self::default();
        for item in items {
            set.add(item);
        }
        set
    }

    pub(crate) fn items(&self) -> Vec<Dynamic> {
        self.items.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    fn add(&self, value: Dynamic) {
        if !self.has(&value) {
            self.items.borrow_mut().push(value);
        }
    }

    fn has(&self, value: &Dynamic) -> bool {
        self.items.borrow().iter().any(|item| same_value(item, value))
    }

    fn delete(&self, value: &Dynamic) -> bool {
        let mut items = self.items.borrow_mut();
        match items.iter().position(|item| same_value(item, value)) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GuestMap {
    entries: Rc<RefCell<Vec<(Dynamic, Dynamic)>>>,
}

impl GuestMap {
    fn from_pairs(pairs: Array) -> GuestResult<Self> {
        let map = Self::default();
        for pair in pairs {
            let pair = pair.flatten_clone();
            let Some(pair) = pair.read_lock::<Array>() else {
                return Err(guest_error("Map entries must be [key, value] arrays"));
            };
            let key = pair.first().cloned().unwrap_or(Dynamic::UNIT);
            let value = pair.get(1).cloned().unwrap_or(Dynamic::UNIT);
            map.set(key, value);
        }
        Ok(map)
    }

    pub(crate) fn entries(&self) -> Vec<(Dynamic, Dynamic)> {
        self.entries.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    fn position(&self, key: &Dynamic) -> Option<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|(existing, _)| same_value(existing, key))
    }

    fn set(&self, key: Dynamic, value: Dynamic) {
        match self.position(&key) {
            Some(index) => self.entries.borrow_mut()[index].1 = value,
            None => self.entries.borrow_mut().push((key, value)),
        }
    }

    fn get(&self, key: &Dynamic) -> Dynamic {
        self.position(key)
            .map(|index| self.entries.borrow()[index].1.clone())
            .unwrap_or(Dynamic::UNIT)
    }

    fn delete(&self, key: &Dynamic) -> bool {
        match self.position(key) {
            Some(index) => {
                self.entries.borrow_mut().remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GuestDate {
    millis: Rc<i64>,
}

impl GuestDate {
    fn new(millis: i64) -> Self {
        Self {
            millis: Rc::new(millis),
        }
    }

    fn parse(text: &str) -> GuestResult<Self> {
        DateTime::parse_from_rfc3339(text)
            .map(|date| Self::new(date.with_timezone(&Utc).timestamp_millis()))
            .map_err(|_| guest_error(format!("Invalid time value: '{text}'")))
    }

    pub(crate) fn millis(&self) -> i64 {
        *self.millis
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.millis, &other.millis)
    }
}

#[derive(Debug)]
struct RegExpInner {
    source: String,
    flags: String,
    compiled: Regex,
}

#[derive(Debug, Clone)]
pub(crate) struct GuestRegExp {
    inner: Rc<RegExpInner>,
}

impl GuestRegExp {
    fn new(source: &str, flags: &str) -> GuestResult<Self> {
        let compiled = build_regex(source, flags).map_err(|error| {
            guest_error(format!("Invalid regular expression: /{source}/: {error}"))
        })?;
        Ok(Self {
            inner: Rc::new(RegExpInner {
                source: source.to_string(),
                flags: flags.to_string(),
                compiled,
            }),
        })
    }

    pub(crate) fn source(&self) -> &str {
        &self.inner.source
    }

    pub(crate) fn flags(&self) -> &str {
        &self.inner.flags
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectState {
    pub(crate) entries: Map,
    pub(crate) extensible: bool,
    pub(crate) sealed: bool,
    pub(crate) frozen: bool,
}

/// A mutable object with identity and integrity levels, built with
/// `object(#{..})`.
#[derive(Debug, Clone)]
pub(crate) struct GuestObject {
    state: Rc<RefCell<ObjectState>>,
}

impl GuestObject {
    pub(crate) fn new(entries: Map) -> Self {
        Self {
            state: Rc::new(RefCell::new(ObjectState {
                entries,
                extensible: true,
                sealed: false,
                frozen: false,
            })),
        }
    }

    pub(crate) fn state(&self) -> ObjectState {
        self.state.borrow().clone()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Dynamic> {
        self.state.borrow().entries.get(key).cloned()
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn identity(&self) -> *const () {
        Rc::as_ptr(&self.state).cast()
    }

    pub(crate) fn set(&self, key: &str, value: Dynamic) -> GuestResult<()> {
        let mut state = self.state.borrow_mut();
        if state.frozen {
            return Err(guest_error(format!(
                "Cannot assign to read only property '{key}' of object"
            )));
        }
        if !state.extensible && !state.entries.contains_key(key) {
            return Err(guest_error(format!(
                "Cannot add property {key}, object is not extensible"
            )));
        }
        state.entries.insert(key.into(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> GuestResult<bool> {
        let mut state = self.state.borrow_mut();
        if state.sealed && state.entries.contains_key(key) {
            return Err(guest_error(format!(
                "Cannot delete property '{key}' of object"
            )));
        }
        Ok(state.entries.remove(key).is_some())
    }

    fn restrict(&self, sealed: bool, frozen: bool) {
        let mut state = self.state.borrow_mut();
        state.extensible = false;
        state.sealed |= sealed;
        state.frozen |= frozen;
    }
}

#[derive(Debug)]
enum TrackedHandle {
    Set(Weak<RefCell<Vec<Dynamic>>>),
    Map(Weak<RefCell<Vec<(Dynamic, Dynamic)>>>),
    Object(Weak<RefCell<ObjectState>>),
}

/// Mutable handles created during one invocation. Scripts can make them
/// reference each other; `release` empties every live one so those cycles
/// are freed with the engine.
#[derive(Debug, Clone, Default)]
pub(crate) struct HandleArena {
    handles: Rc<RefCell<Vec<TrackedHandle>>>,
}

impl HandleArena {
    fn set(&self, set: GuestSet) -> GuestSet {
        self.handles
            .borrow_mut()
            .push(TrackedHandle::Set(Rc::downgrade(&set.items)));
        set
    }

    fn map(&self, map: GuestMap) -> GuestMap {
        self.handles
            .borrow_mut()
            .push(TrackedHandle::Map(Rc::downgrade(&map.entries)));
        map
    }

    fn object(&self, object: GuestObject) -> GuestObject {
        self.handles
            .borrow_mut()
            .push(TrackedHandle::Object(Rc::downgrade(&object.state)));
        object
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.handles.borrow().len()
    }

    pub(crate) fn release(&self) {
        let handles = std::mem::take(&mut *self.handles.borrow_mut());
        for handle in handles {
            match handle {
                TrackedHandle::Set(items) => empty(&items, std::mem::take),
                TrackedHandle::Map(entries) => empty(&entries, std::mem::take),
                TrackedHandle::Object(state) => {
                    empty(&state, |state: &mut ObjectState| std::mem::take(&mut state.entries))
                }
            }
        }
    }
}

/// Takes the contents out of a still-live handle and drops them once the
/// borrow is released.
fn empty<T, U>(cell: &Weak<RefCell<T>>, take: impl FnOnce(&mut T) -> U) {
    let Some(cell) = cell.upgrade() else {
        return;
    };
    let taken = match cell.try_borrow_mut() {
        Ok(mut value) => Some(take(&mut *value)),
        Err(_) => None,
    };
    drop(taken);
}

/// Releases the arena when dropped, on every exit path of an invocation.
pub(crate) struct ReleaseHandles(pub(crate) HandleArena);

impl Drop for ReleaseHandles {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GuestBigInt(pub(crate) String);

#[derive(Debug, Clone)]
pub(crate) struct GuestSymbol {
    description: Rc<str>,
}

impl GuestSymbol {
    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.description, &other.description)
    }
}

pub(crate) const ERROR_CONSTRUCTORS: &[&str] = &[
    "Error",
    "TypeError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
];

/// Error values are plain maps so `try/catch` and `throw` work unchanged.
pub(crate) fn error_value(name: &str, message: &str) -> Dynamic {
    let mut map = Map::new();
    map.insert("name".into(), Dynamic::from(name.to_string()));
    map.insert("message".into(), Dynamic::from(message.to_string()));
    Dynamic::from_map(map)
}

fn big_int_digits(value: &Dynamic) -> GuestResult<String> {
    if let Ok(number) = value.as_int() {
        return Ok(number.to_string());
    }
    let text = value.to_string();
    let digits = text.trim();
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(guest_error(format!("Cannot convert {digits} to a BigInt")));
    }
    Ok(digits.to_string())
}

fn display(value: &Dynamic) -> String {
    display_literal(value).unwrap_or_else(|| format_value(&to_guest_value(value)))
}

/// Registers the handle types, their constructors and their methods. Every
/// mutable handle the script builds is tracked in `arena`.
pub(crate) fn register_types(engine: &mut Engine, arena: &HandleArena) {
    engine.register_type_with_name::<GuestNull>("null");
    engine.register_fn("to_string", |_: &mut GuestNull| "null".to_string());
    engine.register_fn("to_debug", |_: &mut GuestNull| "null".to_string());

    engine.register_type_with_name::<GuestSet>("Set");
    let tracker = arena.clone();
    engine.register_fn("Set", move || tracker.set(GuestSet::default()));
    let tracker = arena.clone();
    engine.register_fn("Set", move |items: Array| tracker.set(GuestSet::from_items(items)));
    engine.register_fn("add", |set: &mut GuestSet, value: Dynamic| {
        set.add(value);
        set.clone()
    });
    engine.register_fn("has", |set: &mut GuestSet, value: Dynamic| set.has(&value));
    engine.register_fn("delete", |set: &mut GuestSet, value: Dynamic| {
        set.delete(&value)
    });
    engine.register_fn("clear", |set: &mut GuestSet| set.items.borrow_mut().clear());
    engine.register_fn("values", |set: &mut GuestSet| set.items());
    engine.register_get("size", |set: &mut GuestSet| set.len() as INT);

    engine.register_type_with_name::<GuestMap>("Map");
    let tracker = arena.clone();
    engine.register_fn("Map", move || tracker.map(GuestMap::default()));
    let tracker = arena.clone();
    engine.register_fn("Map", move |pairs: Array| -> GuestResult<GuestMap> {
        Ok(tracker.map(GuestMap::from_pairs(pairs)?))
    });
    engine.register_fn("set", |map: &mut GuestMap, key: Dynamic, value: Dynamic| {
        map.set(key, value);
        map.clone()
    });
    engine.register_fn("get", |map: &mut GuestMap, key: Dynamic| map.get(&key));
    engine.register_fn("has", |map: &mut GuestMap, key: Dynamic| {
        map.position(&key).is_some()
    });
    engine.register_fn("delete", |map: &mut GuestMap, key: Dynamic| map.delete(&key));
    engine.register_fn("clear", |map: &mut GuestMap| map.entries.borrow_mut().clear());
    engine.register_fn("keys", |map: &mut GuestMap| {
        map.entries().into_iter().map(|(key, _)| key).collect::<Array>()
    });
    engine.register_fn("values", |map: &mut GuestMap| {
        map.entries()
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Array>()
    });
    engine.register_fn("entries", |map: &mut GuestMap| {
        map.entries()
            .into_iter()
            .map(|(key, value)| Dynamic::from_array(vec![key, value]))
            .collect::<Array>()
    });
    engine.register_get("size", |map: &mut GuestMap| map.len() as INT);

    engine.register_type_with_name::<GuestDate>("Date");
    engine.register_fn("Date", || GuestDate::new(Utc::now().timestamp_millis()));
    engine.register_fn("Date", |millis: INT| GuestDate::new(millis));
    engine.register_fn("Date", |millis: FLOAT| GuestDate::new(millis as i64));
    engine.register_fn("Date", |text: ImmutableString| GuestDate::parse(&text));
    engine.register_fn("getTime", |date: &mut GuestDate| date.millis() as INT);
    engine.register_fn("toISOString", |date: &mut GuestDate| {
        iso_timestamp(date.millis())
    });

    engine.register_type_with_name::<GuestRegExp>("RegExp");
    engine.register_fn("RegExp", |source: ImmutableString| {
        GuestRegExp::new(&source, "")
    });
    engine.register_fn(
        "RegExp",
        |source: ImmutableString, flags: ImmutableString| GuestRegExp::new(&source, &flags),
    );
    engine.register_fn("test", |pattern: &mut GuestRegExp, text: ImmutableString| {
        pattern.inner.compiled.is_match(&text)
    });
    engine.register_get("source", |pattern: &mut GuestRegExp| {
        pattern.source().to_string()
    });
    engine.register_get("flags", |pattern: &mut GuestRegExp| {
        pattern.flags().to_string()
    });

    engine.register_type_with_name::<GuestObject>("Object");
    let tracker = arena.clone();
    engine.register_fn("object", move |entries: Map| tracker.object(GuestObject::new(entries)));
    let tracker = arena.clone();
    engine.register_fn("object", move || tracker.object(GuestObject::new(Map::new())));
    engine.register_indexer_get(|object: &mut GuestObject, key: ImmutableString| {
        object.get(&key).unwrap_or(Dynamic::UNIT)
    });
    engine.register_indexer_set(
        |object: &mut GuestObject, key: ImmutableString, value: Dynamic| {
            object.set(&key, value)
        },
    );
    engine.register_fn("keys", |object: &mut GuestObject| {
        object
            .state()
            .entries
            .keys()
            .map(|key| Dynamic::from(key.to_string()))
            .collect::<Array>()
    });
    engine.register_fn("has", |object: &mut GuestObject, key: ImmutableString| {
        object.get(&key).is_some()
    });
    engine.register_fn("remove", |object: &mut GuestObject, key: ImmutableString| {
        object.remove(&key)
    });
    engine.register_fn("freeze", |value: Dynamic| restrict(value, true, true));
    engine.register_fn("seal", |value: Dynamic| restrict(value, true, false));
    engine.register_fn("preventExtensions", |value: Dynamic| {
        restrict(value, false, false)
    });

    engine.register_type_with_name::<GuestBigInt>("BigInt");
    engine.register_fn("BigInt", |value: Dynamic| {
        big_int_digits(&value).map(GuestBigInt)
    });

    engine.register_type_with_name::<GuestSymbol>("Symbol");
    engine.register_fn("Symbol", || GuestSymbol {
        description: Rc::from(""),
    });
    engine.register_fn("Symbol", |description: ImmutableString| GuestSymbol {
        description: Rc::from(description.as_str()),
    });

    for name in ERROR_CONSTRUCTORS {
        engine.register_fn(*name, move || error_value(name, ""));
        engine.register_fn(*name, move |message: ImmutableString| {
            error_value(name, &message)
        });
    }

    engine.register_fn("to_string", |set: &mut GuestSet| display(&Dynamic::from(set.clone())));
    engine.register_fn("to_string", |map: &mut GuestMap| display(&Dynamic::from(map.clone())));
    engine.register_fn("to_string", |date: &mut GuestDate| iso_timestamp(date.millis()));
    engine.register_fn("to_string", |pattern: &mut GuestRegExp| {
        format!("/{}/{}", pattern.source(), pattern.flags())
    });
    engine.register_fn("to_string", |object: &mut GuestObject| {
        display(&Dynamic::from(object.clone()))
    });
    engine.register_fn("to_string", |value: &mut GuestBigInt| value.0.clone());
    engine.register_fn("to_string", |symbol: &mut GuestSymbol| {
        format!("Symbol({})", symbol.description())
    });
}

/// `freeze`, `seal` and `preventExtensions`; values without integrity levels
/// are returned unchanged.
fn restrict(value: Dynamic, sealed: bool, frozen: bool) -> Dynamic {
    if let Some(object) = value.read_lock::<GuestObject>() {
        object.restrict(sealed, frozen);
    }
    value
}
