//! Read-only response surface for post-request scripts.

use hb_core::ResponseSnapshot;
use rhai::{Dynamic, Map, Module, INT};

use crate::errors::{guest_error, GuestResult};
use crate::guest::from_json;

fn headers_map(response: &ResponseSnapshot) -> Dynamic {
    let mut headers = Map::new();
    for header in &response.headers {
        headers.insert(header.key.as_str().into(), Dynamic::from(header.value.clone()));
    }
    Dynamic::from_map(headers)
}

/// Durations past `INT::MAX` milliseconds clamp.
fn response_time(response: &ResponseSnapshot) -> INT {
    INT::try_from(response.duration_ms).unwrap_or(INT::MAX)
}

/// Parsed JSON body when it parses, the raw text otherwise.
fn body_value(response: &ResponseSnapshot) -> Dynamic {
    serde_json::from_str::<serde_json::Value>(&response.body)
        .map(|json| from_json(&json))
        .unwrap_or_else(|_| Dynamic::from(response.body.clone()))
}

fn add_body_readers(module: &mut Module, response: &ResponseSnapshot) {
    let text = response.body.clone();
    module.set_native_fn("text", move || -> GuestResult<String> { Ok(text.clone()) });
    let raw = response.body.clone();
    module.set_native_fn("json", move || -> GuestResult<Dynamic> {
        serde_json::from_str::<serde_json::Value>(&raw)
            .map(|json| from_json(&json))
            .map_err(|_| guest_error("Response body is not valid JSON"))
    });
}

pub(crate) fn hopp_response_module(response: &ResponseSnapshot) -> Module {
    let mut module = Module::new();
    module.set_var("statusCode", INT::from(response.status));
    module.set_var("statusText", response.status_text.clone());
    module.set_var("responseTime", response_time(response));
    module.set_var("headers", headers_map(response));
    module.set_var("body", body_value(response));
    add_body_readers(&mut module, response);
    module
}

/// `pw::response`: the shape older scripts read.
pub(crate) fn pw_response_module(response: &ResponseSnapshot) -> Module {
    let mut module = Module::new();
    module.set_var("status", INT::from(response.status));
    module.set_var("body", body_value(response));
    module.set_var("headers", headers_map(response));
    module.set_var("responseTime", response_time(response));
    module
}

pub(crate) fn pm_response_module(response: &ResponseSnapshot) -> Module {
    let mut module = Module::new();
    module.set_var("code", INT::from(response.status));
    module.set_var("status", response.status_text.clone());
    module.set_var("responseTime", response_time(response));
    module.set_var("headers", headers_map(response));
    add_body_readers(&mut module, response);
    module
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use hb_core::ResponseHeader;

    #[test]
    fn body_falls_back_to_text_when_not_json() {
        let response = ResponseSnapshot {
            status: 200,
            body: "plain".to_string(),
            ..ResponseSnapshot::default()
        };
        assert_eq!(body_value(&response).to_string(), "plain");

        let response = ResponseSnapshot {
            body: r#"{"ok": true}"#.to_string(),
            ..ResponseSnapshot::default()
        };
        assert!(body_value(&response).is_map());
    }

    #[test]
    fn response_time_clamps_instead_of_wrapping() {
        let response = ResponseSnapshot {
            duration_ms: u64::MAX,
            ..ResponseSnapshot::default()
        };
        assert_eq!(response_time(&response), INT::MAX);

        let response = ResponseSnapshot {
            duration_ms: 12,
            ..ResponseSnapshot::default()
        };
        assert_eq!(response_time(&response), 12);
    }

    #[test]
    fn headers_become_a_map() {
        let response = ResponseSnapshot {
            headers: vec![ResponseHeader {
                key: "content-type".to_string(),
                value: "application/json".to_string(),
            }],
            ..ResponseSnapshot::default()
        };
        let headers = headers_map(&response);
        let headers = headers.read_lock::<Map>().expect("headers should be a map");
        assert_eq!(
            headers
                .get("content-type")
                .map(|value| value.to_string()),
            Some("application/json".to_string())
        );
    }
}
