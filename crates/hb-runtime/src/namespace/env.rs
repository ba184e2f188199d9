//! Environment accessors for the three namespaces.

use hb_core::{EnvScope, GuestValue};
use rhai::{Dynamic, Map, Module};

use crate::context::SharedContext;
use crate::env_state::EnvField;
use crate::errors::{guest_error, GuestResult};
use crate::guest::{from_guest_value, to_guest_value, GuestNull};

/// Parsed `{scope, secret, fallbackToNull}` options map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EnvOptions {
    pub(crate) scope: EnvScope,
    pub(crate) secret: Option<bool>,
    pub(crate) fallback_to_null: bool,
}

impl EnvOptions {
    pub(crate) fn parse(options: &Map) -> GuestResult<Self> {
        let scope = match options.get("scope") {
            None => EnvScope::All,
            Some(raw) => {
                let raw = raw.to_string();
                EnvScope::parse(&raw)
                    .ok_or_else(|| guest_error(format!("Invalid environment scope \"{raw}\"")))?
            }
        };
        let flag = |key: &str| options.get(key).and_then(|value| value.as_bool().ok());
        Ok(Self {
            scope,
            secret: flag("secret"),
            fallback_to_null: flag("fallbackToNull").unwrap_or(false),
        })
    }
}

fn string_key(key: &Dynamic) -> GuestResult<String> {
    if key.is_string() {
        Ok(key.to_string())
    } else {
        Err(guest_error("Expected key to be a string"))
    }
}

fn string_value(value: &Dynamic) -> GuestResult<String> {
    if value.is_string() {
        Ok(value.to_string())
    } else {
        Err(guest_error("Expected value to be a string"))
    }
}

fn text_or_null(value: Option<String>) -> Dynamic {
    value.map_or_else(|| Dynamic::from(GuestNull), Dynamic::from)
}

fn pw_get(
    ctx: &SharedContext,
    key: &Dynamic,
    options: EnvOptions,
    resolved: bool,
) -> GuestResult<Dynamic> {
    let key = string_key(key)?;
    let context = ctx.borrow();
    let value = if resolved {
        context.env.get_resolved(&key, options.scope)
    } else {
        context.env.get(&key, options.scope)
    };
    Ok(match value {
        Some(text) => Dynamic::from(text),
        None if options.fallback_to_null => Dynamic::from(GuestNull),
        None => Dynamic::UNIT,
    })
}

fn pw_set(
    ctx: &SharedContext,
    key: &Dynamic,
    value: &Dynamic,
    options: EnvOptions,
) -> GuestResult<()> {
    let key = string_key(key)?;
    let value = string_value(value)?;
    ctx.borrow_mut().env.set(
        &key,
        GuestValue::String(value),
        options.scope,
        EnvField::Current,
        options.secret,
    );
    Ok(())
}

/// `pw::env`: string-only accessors returning `()` for missing keys.
pub(crate) fn pw_env_module(ctx: &SharedContext) -> Module {
    let mut module = Module::new();

    for (name, resolved) in [("get", false), ("getResolve", true)] {
        let on_get = ctx.clone();
        module.set_native_fn(name, move |key: Dynamic| -> GuestResult<Dynamic> {
            pw_get(&on_get, &key, EnvOptions::default(), resolved)
        });
        let on_get = ctx.clone();
        module.set_native_fn(name, move |key: Dynamic, options: Map| -> GuestResult<Dynamic> {
            pw_get(&on_get, &key, EnvOptions::parse(&options)?, resolved)
        });
    }

    let on_set = ctx.clone();
    module.set_native_fn("set", move |key: Dynamic, value: Dynamic| -> GuestResult<()> {
        pw_set(&on_set, &key, &value, EnvOptions::default())
    });
    let on_set = ctx.clone();
    module.set_native_fn(
        "set",
        move |key: Dynamic, value: Dynamic, options: Map| -> GuestResult<()> {
            pw_set(&on_set, &key, &value, EnvOptions::parse(&options)?)
        },
    );

    let on_unset = ctx.clone();
    module.set_native_fn("unset", move |key: Dynamic| -> GuestResult<()> {
        let key = string_key(&key)?;
        on_unset.borrow_mut().env.unset(&key, EnvScope::All);
        Ok(())
    });
    let on_unset = ctx.clone();
    module.set_native_fn("unset", move |key: Dynamic, options: Map| -> GuestResult<()> {
        let key = string_key(&key)?;
        let options = EnvOptions::parse(&options)?;
        on_unset.borrow_mut().env.unset(&key, options.scope);
        Ok(())
    });

    let on_resolve = ctx.clone();
    module.set_native_fn("resolve", move |template: Dynamic| -> GuestResult<String> {
        let template = string_value(&template)?;
        Ok(on_resolve.borrow().env.resolve(&template))
    });

    module
}

/// One `hopp::env` scope: `get`/`getRaw` return `NULL` for missing keys.
fn hopp_scope_module(ctx: &SharedContext, scope: EnvScope) -> Module {
    let mut module = Module::new();

    let on_get = ctx.clone();
    module.set_native_fn("get", move |key: Dynamic| -> GuestResult<Dynamic> {
        let key = string_key(&key)?;
        Ok(text_or_null(on_get.borrow().env.get_resolved(&key, scope)))
    });
    let on_raw = ctx.clone();
    module.set_native_fn("getRaw", move |key: Dynamic| -> GuestResult<Dynamic> {
        let key = string_key(&key)?;
        Ok(text_or_null(on_raw.borrow().env.get(&key, scope)))
    });
    let on_initial = ctx.clone();
    module.set_native_fn("getInitialRaw", move |key: Dynamic| -> GuestResult<Dynamic> {
        let key = string_key(&key)?;
        Ok(text_or_null(on_initial.borrow().env.get_initial(&key, scope)))
    });

    for (name, field) in [("set", EnvField::Current), ("setInitial", EnvField::Initial)] {
        let on_set = ctx.clone();
        module.set_native_fn(name, move |key: Dynamic, value: Dynamic| -> GuestResult<()> {
            let key = string_key(&key)?;
            let value = string_value(&value)?;
            on_set
                .borrow_mut()
                .env
                .set(&key, GuestValue::String(value), scope, field, None);
            Ok(())
        });
    }

    let on_delete = ctx.clone();
    module.set_native_fn("delete", move |key: Dynamic| -> GuestResult<()> {
        let key = string_key(&key)?;
        on_delete.borrow_mut().env.unset(&key, scope);
        Ok(())
    });
    let on_reset = ctx.clone();
    module.set_native_fn("reset", move |key: Dynamic| -> GuestResult<()> {
        let key = string_key(&key)?;
        on_reset.borrow_mut().env.reset(&key, scope);
        Ok(())
    });

    module
}

/// `hopp::env` with its `active` and `globals` sub-scopes (`global` is a
/// Rhai keyword).
pub(crate) fn hopp_env_module(ctx: &SharedContext) -> Module {
    let mut module = hopp_scope_module(ctx, EnvScope::All);
    module.set_sub_module("active", hopp_scope_module(ctx, EnvScope::Selected));
    module.set_sub_module("globals", hopp_scope_module(ctx, EnvScope::Global));
    module
}

/// `pm::environment`, `pm::globals` and `pm::variables`. Values keep their
/// guest type; `()` and `NULL` are stored as markers.
pub(crate) fn pm_scope_module(ctx: &SharedContext, scope: EnvScope) -> Module {
    let mut module = Module::new();

    let on_get = ctx.clone();
    module.set_native_fn("get", move |key: Dynamic| -> GuestResult<Dynamic> {
        let key = string_key(&key)?;
        Ok(on_get
            .borrow()
            .env
            .get_typed(&key, scope)
            .map_or(Dynamic::UNIT, |value| from_guest_value(&value)))
    });
    let on_set = ctx.clone();
    module.set_native_fn("set", move |key: Dynamic, value: Dynamic| -> GuestResult<()> {
        let key = string_key(&key)?;
        let value = to_guest_value(&value).into_marker();
        on_set
            .borrow_mut()
            .env
            .set(&key, value, scope, EnvField::Current, None);
        Ok(())
    });
    let on_has = ctx.clone();
    module.set_native_fn("has", move |key: Dynamic| -> GuestResult<bool> {
        let key = string_key(&key)?;
        Ok(on_has.borrow().env.find(&key, scope).is_some())
    });
    let on_unset = ctx.clone();
    module.set_native_fn("unset", move |key: Dynamic| -> GuestResult<()> {
        let key = string_key(&key)?;
        on_unset.borrow_mut().env.unset(&key, scope);
        Ok(())
    });
    let on_clear = ctx.clone();
    module.set_native_fn("clear", move || -> GuestResult<()> {
        on_clear.borrow_mut().env.clear(scope);
        Ok(())
    });
    let on_object = ctx.clone();
    module.set_native_fn("toObject", move || -> GuestResult<Dynamic> {
        let entries = on_object.borrow().env.to_object(scope);
        Ok(from_guest_value(&GuestValue::Object(entries)))
    });

    if scope == EnvScope::All {
        let on_replace = ctx.clone();
        module.set_native_fn("replaceIn", move |template: Dynamic| -> GuestResult<String> {
            let template = string_value(&template)?;
            Ok(on_replace.borrow().env.resolve(&template))
        });
    }

    module
}

#[cfg(test)]
mod env_tests {
    use super::*;

    #[test]
    fn options_accept_active_as_selected() {
        let mut options = Map::new();
        options.insert("scope".into(), Dynamic::from("active".to_string()));
        options.insert("secret".into(), Dynamic::from_bool(true));
        let parsed = EnvOptions::parse(&options).expect("options should parse");
        assert_eq!(parsed.scope, EnvScope::Selected);
        assert_eq!(parsed.secret, Some(true));
        assert!(!parsed.fallback_to_null);
    }

    #[test]
    fn unknown_scopes_are_rejected() {
        let mut options = Map::new();
        options.insert("scope".into(), Dynamic::from("team".to_string()));
        let error = EnvOptions::parse(&options).expect_err("scope should be rejected");
        assert!(error.to_string().contains("Invalid environment scope"));
    }

    #[test]
    fn keys_must_be_strings() {
        let error = string_key(&Dynamic::from_int(1)).expect_err("int key should be rejected");
        assert!(error.to_string().contains("Expected key to be a string"));
    }
}
