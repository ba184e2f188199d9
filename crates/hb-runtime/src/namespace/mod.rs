//! Host capabilities exposed to scripts as the `pw`, `hopp` and `pm` static
//! modules.

mod cookies;
mod env;
mod pm_request;
mod request;
mod response;
mod tests_api;

use hb_core::{EnvScope, HookMode};
use rhai::{Engine, Module};

use crate::context::SharedContext;
use crate::gate::SharedGate;

/// Registers the namespaces for one invocation. Test, timer and response
/// bindings only exist after the request has run.
pub(crate) fn register_namespaces(engine: &mut Engine, ctx: &SharedContext, gate: &SharedGate) {
    let (mode, response) = {
        let context = ctx.borrow();
        (context.mode, context.response.clone())
    };

    let mut pw = Module::new();
    pw.set_sub_module("env", env::pw_env_module(ctx));

    let mut hopp = Module::new();
    hopp.set_sub_module("env", env::hopp_env_module(ctx));
    hopp.set_sub_module("request", request::hopp_request_module(ctx));
    hopp.set_sub_module("cookies", cookies::hopp_cookies_module(ctx));

    let mut pm = Module::new();
    pm.set_sub_module("environment", env::pm_scope_module(ctx, EnvScope::Selected));
    pm.set_sub_module("globals", env::pm_scope_module(ctx, EnvScope::Global));
    pm.set_sub_module("variables", env::pm_scope_module(ctx, EnvScope::All));
    pm.set_sub_module("info", request::pm_info_module(ctx));
    pm.set_sub_module("request", pm_request::pm_request_module(ctx));

    if mode == HookMode::Post {
        tests_api::add_legacy_test_api(&mut pw, ctx, gate);
        tests_api::add_test_api(&mut hopp, ctx, gate);
        tests_api::add_test_api(&mut pm, ctx, gate);
        if let Some(response) = &response {
            pw.set_sub_module("response", response::pw_response_module(response));
            hopp.set_sub_module("response", response::hopp_response_module(response));
            pm.set_sub_module("response", response::pm_response_module(response));
        }
    }

    for module in [&mut pw, &mut hopp, &mut pm] {
        module.build_index();
    }
    engine.register_static_module("pw", pw.into());
    engine.register_static_module("hopp", hopp.into());
    engine.register_static_module("pm", pm.into());
}
