//! `hopp::request` plus the read-only request facts under `pm`.

use hb_core::{remove_pair, upsert_pair, HookMode, KeyValuePair, RequestAuth, RequestBody};
use rhai::{Dynamic, ImmutableString, Module};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::{ScriptExecutionContext, SharedContext};
use crate::errors::{guest_error, GuestResult};
use crate::guest::{from_json, to_json, GuestNull};

const READ_ONLY: &str = "Request mutation is only available in pre-request scripts";

pub(super) fn project<T: Serialize>(value: &T) -> GuestResult<Dynamic> {
    let json = serde_json::to_value(value).map_err(|error| guest_error(error.to_string()))?;
    Ok(from_json(&json))
}

pub(super) fn parse<T: DeserializeOwned>(value: &Dynamic, message: &str) -> GuestResult<T> {
    serde_json::from_value(to_json(value)).map_err(|_| guest_error(message))
}

pub(super) fn read<R>(ctx: &SharedContext, reader: impl FnOnce(&ScriptExecutionContext) -> R) -> R {
    reader(&ctx.borrow())
}

/// Applies `apply` to the working request; post-request scripts may only
/// look at it.
pub(super) fn mutate(
    ctx: &SharedContext,
    apply: impl FnOnce(&mut ScriptExecutionContext),
) -> GuestResult<()> {
    let mut context = ctx.borrow_mut();
    if context.mode != HookMode::Pre {
        return Err(guest_error(READ_ONLY));
    }
    apply(&mut context);
    Ok(())
}

pub(crate) fn hopp_request_module(ctx: &SharedContext) -> Module {
    let mut module = Module::new();

    let on_url = ctx.clone();
    module.set_native_fn("url", move || -> GuestResult<String> {
        Ok(read(&on_url, |context| context.request.endpoint.clone()))
    });
    let on_method = ctx.clone();
    module.set_native_fn("method", move || -> GuestResult<String> {
        Ok(read(&on_method, |context| context.request.method.clone()))
    });
    let on_params = ctx.clone();
    module.set_native_fn("params", move || -> GuestResult<Dynamic> {
        read(&on_params, |context| project(&context.request.params))
    });
    let on_headers = ctx.clone();
    module.set_native_fn("headers", move || -> GuestResult<Dynamic> {
        read(&on_headers, |context| project(&context.request.headers))
    });
    let on_body = ctx.clone();
    module.set_native_fn("body", move || -> GuestResult<Dynamic> {
        read(&on_body, |context| project(&context.request.body))
    });
    let on_auth = ctx.clone();
    module.set_native_fn("auth", move || -> GuestResult<Dynamic> {
        read(&on_auth, |context| project(&context.request.auth))
    });
    let on_variables = ctx.clone();
    module.set_native_fn("variables", move || -> GuestResult<Dynamic> {
        read(&on_variables, |context| {
            project(&context.request.request_variables)
        })
    });
    let on_variable = ctx.clone();
    module.set_native_fn(
        "getVariable",
        move |key: ImmutableString| -> GuestResult<Dynamic> {
            Ok(read(&on_variable, |context| {
                context
                    .request
                    .request_variables
                    .iter()
                    .find(|pair| pair.key == key.as_str())
                    .map_or_else(
                        || Dynamic::from(GuestNull),
                        |pair| Dynamic::from(pair.value.clone()),
                    )
            }))
        },
    );

    let on_set_url = ctx.clone();
    module.set_native_fn("setUrl", move |url: ImmutableString| -> GuestResult<()> {
        mutate(&on_set_url, |context| {
            context.request.endpoint = url.to_string()
        })
    });
    let on_set_method = ctx.clone();
    module.set_native_fn(
        "setMethod",
        move |method: ImmutableString| -> GuestResult<()> {
            mutate(&on_set_method, |context| {
                context.request.method = method.to_uppercase()
            })
        },
    );

    let on_set_header = ctx.clone();
    module.set_native_fn(
        "setHeader",
        move |key: ImmutableString, value: ImmutableString| -> GuestResult<()> {
            mutate(&on_set_header, |context| {
                upsert_pair(&mut context.request.headers, &key, &value)
            })
        },
    );
    let on_set_headers = ctx.clone();
    module.set_native_fn("setHeaders", move |headers: Dynamic| -> GuestResult<()> {
        let headers: Vec<KeyValuePair> = parse(&headers, "Invalid headers")?;
        mutate(&on_set_headers, |context| context.request.headers = headers)
    });
    let on_remove_header = ctx.clone();
    module.set_native_fn(
        "removeHeader",
        move |key: ImmutableString| -> GuestResult<()> {
            mutate(&on_remove_header, |context| {
                remove_pair(&mut context.request.headers, &key);
            })
        },
    );

    let on_set_param = ctx.clone();
    module.set_native_fn(
        "setParam",
        move |key: ImmutableString, value: ImmutableString| -> GuestResult<()> {
            mutate(&on_set_param, |context| {
                upsert_pair(&mut context.request.params, &key, &value)
            })
        },
    );
    let on_set_params = ctx.clone();
    module.set_native_fn("setParams", move |params: Dynamic| -> GuestResult<()> {
        let params: Vec<KeyValuePair> = parse(&params, "Invalid params")?;
        mutate(&on_set_params, |context| context.request.params = params)
    });
    let on_remove_param = ctx.clone();
    module.set_native_fn(
        "removeParam",
        move |key: ImmutableString| -> GuestResult<()> {
            mutate(&on_remove_param, |context| {
                remove_pair(&mut context.request.params, &key);
            })
        },
    );

    let on_set_body = ctx.clone();
    module.set_native_fn("setBody", move |body: Dynamic| -> GuestResult<()> {
        let body: RequestBody = parse(&body, "Invalid request body")?;
        mutate(&on_set_body, |context| context.request.body = body)
    });
    let on_set_auth = ctx.clone();
    module.set_native_fn("setAuth", move |auth: Dynamic| -> GuestResult<()> {
        let auth: RequestAuth = parse(&auth, "Invalid auth")?;
        mutate(&on_set_auth, |context| context.request.auth = auth)
    });
    let on_set_variable = ctx.clone();
    module.set_native_fn(
        "setVariable",
        move |key: ImmutableString, value: ImmutableString| -> GuestResult<()> {
            mutate(&on_set_variable, |context| {
                upsert_pair(&mut context.request.request_variables, &key, &value)
            })
        },
    );

    module
}

/// `pm::info`: request name and id never change during a run.
pub(crate) fn pm_info_module(ctx: &SharedContext) -> Module {
    let context = ctx.borrow();
    let mut info = Module::new();
    info.set_var("requestName", context.request.name.clone());
    info.set_var("requestId", request_id(&context));
    info
}

pub(super) fn request_id(context: &ScriptExecutionContext) -> Dynamic {
    context
        .request
        .id
        .clone()
        .map_or_else(|| Dynamic::from(GuestNull), Dynamic::from)
}

#[cfg(test)]
mod request_tests {
    use super::*;
    use hb_core::{EnvironmentSnapshot, RequestSnapshot};

    fn context(mode: HookMode) -> SharedContext {
        ScriptExecutionContext::new(
            mode,
            &EnvironmentSnapshot::default(),
            RequestSnapshot::default(),
            None,
            None,
            10,
        )
        .into_shared()
    }

    #[test]
    fn mutation_is_rejected_after_the_request() {
        let ctx = context(HookMode::Post);
        let error = mutate(&ctx, |context| context.request.endpoint = "x".to_string())
            .expect_err("post-request mutation should fail");
        assert!(error.to_string().contains(READ_ONLY));
        assert_eq!(ctx.borrow().request.endpoint, "");
    }

    #[test]
    fn headers_parse_from_guest_arrays() {
        let headers = from_json(&serde_json::json!([{"key": "a", "value": "1"}]));
        let parsed: Vec<KeyValuePair> =
            parse(&headers, "Invalid headers").expect("headers should parse");
        assert_eq!(parsed, vec![KeyValuePair::new("a", "1")]);

        let error = parse::<Vec<KeyValuePair>>(&Dynamic::from_int(1), "Invalid headers")
            .expect_err("int should not parse as headers");
        assert!(error.to_string().contains("Invalid headers"));
    }
}
