//! `hopp::cookies`: per-domain access to the invocation's cookie jar.

use hb_core::{Cookie, CookieJar};
use rhai::{Dynamic, Module};

use crate::context::SharedContext;
use crate::errors::{guest_error, GuestResult};
use crate::guest::{from_json, to_json, GuestNull};

const UNSUPPORTED: &str =
    "Cookies are not supported in the current platform and are exclusive to the Desktop App.";

fn domain_and_name(domain: &Dynamic, name: &Dynamic) -> GuestResult<(String, String)> {
    if domain.is_string() && name.is_string() {
        Ok((domain.to_string(), name.to_string()))
    } else {
        Err(guest_error("Expected domain and cookieName to be strings"))
    }
}

fn domain_only(domain: &Dynamic) -> GuestResult<String> {
    if domain.is_string() {
        Ok(domain.to_string())
    } else {
        Err(guest_error("Expected domain to be a string"))
    }
}

fn with_jar<R>(ctx: &SharedContext, apply: impl FnOnce(&mut CookieJar) -> R) -> GuestResult<R> {
    let mut context = ctx.borrow_mut();
    let jar = context
        .cookies
        .as_mut()
        .ok_or_else(|| guest_error(UNSUPPORTED))?;
    Ok(apply(jar))
}

fn cookie_value(cookie: &Cookie) -> GuestResult<Dynamic> {
    let json = serde_json::to_value(cookie).map_err(|_| guest_error("Invalid cookie"))?;
    Ok(from_json(&json))
}

pub(crate) fn hopp_cookies_module(ctx: &SharedContext) -> Module {
    let mut module = Module::new();

    let on_get = ctx.clone();
    module.set_native_fn(
        "get",
        move |domain: Dynamic, name: Dynamic| -> GuestResult<Dynamic> {
            let (domain, name) = domain_and_name(&domain, &name)?;
            let cookie = with_jar(&on_get, |jar| jar.get(&domain, &name).cloned())?;
            match cookie {
                Some(cookie) => cookie_value(&cookie),
                None => Ok(Dynamic::from(GuestNull)),
            }
        },
    );
    let on_has = ctx.clone();
    module.set_native_fn(
        "has",
        move |domain: Dynamic, name: Dynamic| -> GuestResult<bool> {
            let (domain, name) = domain_and_name(&domain, &name)?;
            with_jar(&on_has, |jar| jar.has(&domain, &name))
        },
    );
    let on_get_all = ctx.clone();
    module.set_native_fn("getAll", move |domain: Dynamic| -> GuestResult<Dynamic> {
        let domain = domain_only(&domain)?;
        let cookies = with_jar(&on_get_all, |jar| jar.get_all(&domain).to_vec())?;
        let items = cookies
            .iter()
            .map(cookie_value)
            .collect::<GuestResult<Vec<_>>>()?;
        Ok(Dynamic::from_array(items))
    });
    let on_set = ctx.clone();
    module.set_native_fn(
        "set",
        move |domain: Dynamic, cookie: Dynamic| -> GuestResult<()> {
            let domain = domain_only(&domain)?;
            let cookie: Cookie = serde_json::from_value(to_json(&cookie))
                .map_err(|_| guest_error("Invalid cookie"))?;
            with_jar(&on_set, |jar| jar.set(&domain, cookie))
        },
    );
    let on_delete = ctx.clone();
    module.set_native_fn(
        "delete",
        move |domain: Dynamic, name: Dynamic| -> GuestResult<()> {
            let (domain, name) = domain_and_name(&domain, &name)?;
            with_jar(&on_delete, |jar| {
                jar.delete(&domain, &name);
            })
        },
    );
    let on_clear = ctx.clone();
    module.set_native_fn("clear", move |domain: Dynamic| -> GuestResult<()> {
        let domain = domain_only(&domain)?;
        with_jar(&on_clear, |jar| jar.clear(&domain))
    });

    module
}

#[cfg(test)]
mod cookies_tests {
    use super::*;
    use crate::context::ScriptExecutionContext;
    use hb_core::{EnvironmentSnapshot, HookMode, RequestSnapshot};

    fn context(cookies: Option<CookieJar>) -> SharedContext {
        ScriptExecutionContext::new(
            HookMode::Pre,
            &EnvironmentSnapshot::default(),
            RequestSnapshot::default(),
            None,
            cookies,
            10,
        )
        .into_shared()
    }

    #[test]
    fn missing_jar_reports_the_platform_limitation() {
        let ctx = context(None);
        let error = with_jar(&ctx, |jar| jar.has("a", "b")).expect_err("jar is absent");
        assert!(error.to_string().contains(UNSUPPORTED));
    }

    #[test]
    fn argument_types_are_checked() {
        let error = domain_and_name(&Dynamic::from_int(1), &Dynamic::from("x".to_string()))
            .expect_err("int domain should be rejected");
        assert!(error
            .to_string()
            .contains("Expected domain and cookieName to be strings"));
        assert!(domain_only(&Dynamic::UNIT).is_err());
    }

    #[test]
    fn cookies_cross_as_camel_case_maps() {
        let mut cookie = Cookie::new("example.com", "session", "abc");
        cookie.http_only = true;
        let value = cookie_value(&cookie).expect("cookie should project");
        let json = to_json(&value);
        assert_eq!(json["httpOnly"], serde_json::json!(true));
        assert_eq!(json["path"], serde_json::json!("/"));
    }
}
