//! `pm::request`: the Postman-style view of the working request. Getters read
//! the live request, so a hook sees its own writes; setters share the
//! pre-request-only rule of `hopp::request`.

use std::sync::OnceLock;

use hb_core::{KeyValuePair, RequestAuth, RequestBody};
use regex::Regex;
use rhai::{Array, Dynamic, ImmutableString, Map, Module, INT};

use super::request::{mutate, parse, project, read, request_id};
use crate::context::SharedContext;
use crate::errors::{guest_error, GuestResult};
use crate::guest::{to_json, GuestNull};

const HEADER_SHAPE: &str = "Header must be an object with 'key' and 'value' properties";
const HEADER_KEY: &str = "Header must have a 'key' property";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^([A-Za-z][A-Za-z0-9+.-]*)://([^/:?#]+)(?::(\d+))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$",
        )
        .expect("url regex must compile")
    })
}

/// An endpoint split the way `pm.request.url` exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UrlParts {
    protocol: String,
    host: Vec<String>,
    port: String,
    path: Vec<String>,
    query: Vec<(String, String)>,
    hash: String,
}

fn default_port(protocol: &str) -> String {
    if protocol == "https" { "443" } else { "80" }.to_string()
}

fn active_params(params: &[KeyValuePair]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|param| param.active)
        .map(|param| (param.key.clone(), param.value.clone()))
        .collect()
}

impl UrlParts {
    /// Query pairs come from the endpoint; when it has none, the active
    /// request params stand in. Unparseable endpoints keep only the params.
    fn parse(endpoint: &str, params: &[KeyValuePair]) -> Self {
        let Some(captures) = url_pattern().captures(endpoint.trim()) else {
            return Self {
                protocol: "https".to_string(),
                host: Vec::new(),
                port: "443".to_string(),
                path: Vec::new(),
                query: active_params(params),
                hash: String::new(),
            };
        };
        let group = |index: usize| captures.get(index).map_or("", |found| found.as_str());

        let protocol = group(1).to_ascii_lowercase();
        let port = match group(3) {
            "" => default_port(&protocol),
            port => port.to_string(),
        };
        let mut query = split_query(group(5));
        if query.is_empty() {
            query = active_params(params);
        }
        Self {
            host: group(2).split('.').map(String::from).collect(),
            port,
            path: split_path(group(4)),
            query,
            hash: group(6).to_string(),
            protocol,
        }
    }

    fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn path_string(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    fn path_with_query(&self) -> String {
        if self.query.is_empty() {
            self.path_string()
        } else {
            format!("{}?{}", self.path_string(), self.query_string())
        }
    }

    fn shows_port(&self) -> bool {
        !self.port.is_empty() && self.port != "443" && self.port != "80"
    }

    fn remote(&self, force_port: bool) -> String {
        let host = self.host.join(".");
        if force_port || self.shows_port() {
            format!("{host}:{}", self.port)
        } else {
            host
        }
    }

    fn render(&self) -> String {
        let protocol = if self.protocol.is_empty() {
            "https"
        } else {
            &self.protocol
        };
        let port = if self.shows_port() {
            format!(":{}", self.port)
        } else {
            String::new()
        };
        let hash = if self.hash.is_empty() {
            String::new()
        } else {
            format!("#{}", self.hash)
        };
        format!(
            "{protocol}://{}{port}{}{hash}",
            self.host.join("."),
            self.path_with_query()
        )
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

fn split_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// `encodeURIComponent`.
fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Form decoding: `+` is a space and malformed escapes stay literal.
fn decode_component(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => out.push(b' '),
            b'%' => {
                let escaped = text
                    .get(index + 1..index + 3)
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = escaped {
                    out.push(byte);
                    index += 3;
                    continue;
                }
                out.push(b'%');
            }
            byte => out.push(byte),
        }
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn url_parts(ctx: &SharedContext) -> UrlParts {
    read(ctx, |context| {
        UrlParts::parse(&context.request.endpoint, &context.request.params)
    })
}

fn rewrite_url(ctx: &SharedContext, edit: impl FnOnce(&mut UrlParts)) -> GuestResult<()> {
    let mut parts = url_parts(ctx);
    edit(&mut parts);
    let endpoint = parts.render();
    mutate(ctx, |context| context.request.endpoint = endpoint)
}

fn string_list(value: &Dynamic, separator: char) -> Vec<String> {
    let value = value.flatten_clone();
    if let Some(items) = value.read_lock::<Array>() {
        return items.iter().map(|item| item.to_string()).collect();
    }
    value
        .to_string()
        .split(separator)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

fn text_array(items: &[String]) -> Array {
    items.iter().cloned().map(Dynamic::from).collect()
}

/// Reads `{key, value}` from a guest map; the value defaults to `""`.
fn key_value_argument(value: &Dynamic, shape: &str) -> GuestResult<(String, String)> {
    let value = value.flatten_clone();
    let Some(map) = value.read_lock::<Map>() else {
        return Err(guest_error(shape));
    };
    let key = map
        .get("key")
        .filter(|key| key.is_string())
        .map(|key| key.to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| guest_error(HEADER_KEY))?;
    let text = map
        .get("value")
        .filter(|text| !text.is_unit() && !text.is::<GuestNull>())
        .map(|text| text.to_string())
        .unwrap_or_default();
    Ok((key, text))
}

fn url_module(ctx: &SharedContext) -> Module {
    let mut module = Module::new();

    let on_string = ctx.clone();
    module.set_native_fn("toString", move || -> GuestResult<String> {
        Ok(read(&on_string, |context| context.request.endpoint.clone()))
    });
    let on_host = ctx.clone();
    module.set_native_fn("getHost", move || -> GuestResult<String> {
        Ok(url_parts(&on_host).host.join("."))
    });
    let on_path = ctx.clone();
    module.set_native_fn("getPath", move || -> GuestResult<String> {
        Ok(url_parts(&on_path).path_string())
    });
    let on_path_query = ctx.clone();
    module.set_native_fn("getPathWithQuery", move || -> GuestResult<String> {
        Ok(url_parts(&on_path_query).path_with_query())
    });
    let on_query = ctx.clone();
    module.set_native_fn("getQueryString", move || -> GuestResult<String> {
        Ok(url_parts(&on_query).query_string())
    });
    let on_remote = ctx.clone();
    module.set_native_fn("getRemote", move || -> GuestResult<String> {
        Ok(url_parts(&on_remote).remote(false))
    });
    let on_remote = ctx.clone();
    module.set_native_fn("getRemote", move |force_port: bool| -> GuestResult<String> {
        Ok(url_parts(&on_remote).remote(force_port))
    });

    let on_protocol = ctx.clone();
    module.set_native_fn("protocol", move || -> GuestResult<String> {
        Ok(url_parts(&on_protocol).protocol)
    });
    let on_set_protocol = ctx.clone();
    module.set_native_fn(
        "setProtocol",
        move |protocol: ImmutableString| -> GuestResult<()> {
            rewrite_url(&on_set_protocol, |parts| {
                parts.protocol = protocol.trim_end_matches(':').to_string()
            })
        },
    );
    let on_host_list = ctx.clone();
    module.set_native_fn("host", move || -> GuestResult<Array> {
        Ok(text_array(&url_parts(&on_host_list).host))
    });
    let on_set_host = ctx.clone();
    module.set_native_fn("setHost", move |host: Dynamic| -> GuestResult<()> {
        let host = string_list(&host, '.');
        rewrite_url(&on_set_host, |parts| parts.host = host)
    });
    let on_port = ctx.clone();
    module.set_native_fn("port", move || -> GuestResult<String> {
        Ok(url_parts(&on_port).port)
    });
    let on_set_port = ctx.clone();
    module.set_native_fn("setPort", move |port: Dynamic| -> GuestResult<()> {
        let port = port.to_string();
        rewrite_url(&on_set_port, |parts| parts.port = port)
    });
    let on_path_list = ctx.clone();
    module.set_native_fn("path", move || -> GuestResult<Array> {
        Ok(text_array(&url_parts(&on_path_list).path))
    });
    let on_set_path = ctx.clone();
    module.set_native_fn("setPath", move |path: Dynamic| -> GuestResult<()> {
        let path = string_list(&path, '/');
        rewrite_url(&on_set_path, |parts| parts.path = path)
    });
    let on_hash = ctx.clone();
    module.set_native_fn("hash", move || -> GuestResult<String> {
        Ok(url_parts(&on_hash).hash)
    });
    let on_set_hash = ctx.clone();
    module.set_native_fn("setHash", move |hash: ImmutableString| -> GuestResult<()> {
        rewrite_url(&on_set_hash, |parts| {
            parts.hash = hash.trim_start_matches('#').to_string()
        })
    });

    let on_update = ctx.clone();
    module.set_native_fn("update", move |url: Dynamic| -> GuestResult<()> {
        if url.is_unit() || url.is::<GuestNull>() {
            return Err(guest_error(
                "URL update requires a string or object with toString() method",
            ));
        }
        let url = url.to_string();
        mutate(&on_update, |context| context.request.endpoint = url)
    });

    let on_add = ctx.clone();
    module.set_native_fn("addQueryParams", move |params: Dynamic| -> GuestResult<()> {
        let params = params.flatten_clone();
        let Some(items) = params.read_lock::<Array>().map(|items| items.clone()) else {
            return Err(guest_error("addQueryParams requires an array of parameters"));
        };
        let added = items
            .iter()
            .filter_map(|item| key_value_argument(item, HEADER_SHAPE).ok())
            .collect::<Vec<_>>();
        rewrite_url(&on_add, |parts| parts.query.extend(added))
    });
    let on_remove = ctx.clone();
    module.set_native_fn("removeQueryParams", move |keys: Dynamic| -> GuestResult<()> {
        let keys = keys.flatten_clone();
        if !keys.is_array() && !keys.is_string() {
            return Err(guest_error(
                "removeQueryParams requires an array of param names or a single param name",
            ));
        }
        let keys = string_list(&keys, '\0');
        let mut parts = url_parts(&on_remove);
        parts.query.retain(|(key, _)| !keys.contains(key));
        let endpoint = parts.render();
        let params = parts
            .query
            .iter()
            .map(|(key, value)| KeyValuePair::new(key.as_str(), value.as_str()))
            .collect::<Vec<_>>();
        mutate(&on_remove, |context| {
            context.request.endpoint = endpoint;
            context.request.params = params;
        })
    });

    module
}

fn find_header<'a>(headers: &'a [KeyValuePair], name: &str) -> Option<&'a KeyValuePair> {
    headers
        .iter()
        .find(|header| header.key.eq_ignore_ascii_case(name))
}

fn headers_module(ctx: &SharedContext) -> Module {
    let mut module = Module::new();

    let on_get = ctx.clone();
    module.set_native_fn("get", move |name: ImmutableString| -> GuestResult<Dynamic> {
        Ok(read(&on_get, |context| {
            find_header(&context.request.headers, &name).map_or_else(
                || Dynamic::from(GuestNull),
                |header| Dynamic::from(header.value.clone()),
            )
        }))
    });
    let on_has = ctx.clone();
    module.set_native_fn("has", move |name: ImmutableString| -> GuestResult<bool> {
        Ok(read(&on_has, |context| {
            find_header(&context.request.headers, &name).is_some()
        }))
    });
    for name in ["all", "toObject"] {
        let on_all = ctx.clone();
        module.set_native_fn(name, move || -> GuestResult<Map> {
            Ok(read(&on_all, |context| {
                let mut all = Map::new();
                for header in &context.request.headers {
                    all.insert(header.key.as_str().into(), Dynamic::from(header.value.clone()));
                }
                all
            }))
        });
    }
    let on_count = ctx.clone();
    module.set_native_fn("count", move || -> GuestResult<INT> {
        Ok(read(&on_count, |context| context.request.headers.len() as INT))
    });

    // Header names match case-insensitively; the newest spelling wins.
    for name in ["add", "upsert", "append"] {
        let on_upsert = ctx.clone();
        module.set_native_fn(name, move |header: Dynamic| -> GuestResult<()> {
            let (key, value) = key_value_argument(&header, HEADER_SHAPE)?;
            mutate(&on_upsert, |context| {
                let headers = &mut context.request.headers;
                headers.retain(|existing| !existing.key.eq_ignore_ascii_case(&key));
                headers.push(KeyValuePair::new(key, value));
            })
        });
    }
    let on_remove = ctx.clone();
    module.set_native_fn("remove", move |name: Dynamic| -> GuestResult<()> {
        if !name.is_string() {
            return Err(guest_error("Header name must be a string"));
        }
        let name = name.to_string();
        mutate(&on_remove, |context| {
            context
                .request
                .headers
                .retain(|existing| !existing.key.eq_ignore_ascii_case(&name));
        })
    });
    let on_clear = ctx.clone();
    module.set_native_fn("clear", move || -> GuestResult<()> {
        mutate(&on_clear, |context| context.request.headers.clear())
    });

    module
}

fn text_body(content_type: &str, body: String) -> RequestBody {
    RequestBody {
        content_type: Some(content_type.to_string()),
        body: Some(body),
    }
}

/// `body.update(spec)`: a string, or `{mode, raw | urlencoded, options}`.
/// Url-encoded pairs are stored as `key: value` lines.
fn body_from_spec(spec: &Dynamic) -> GuestResult<RequestBody> {
    let spec = spec.flatten_clone();
    if spec.is_string() {
        return Ok(text_body("text/plain", spec.to_string()));
    }
    let Some(spec) = spec.read_lock::<Map>().map(|spec| spec.clone()) else {
        return Err(guest_error(
            "Body spec must be a string or object with mode property",
        ));
    };
    let mode = spec
        .get("mode")
        .map(|mode| mode.to_string())
        .unwrap_or_else(|| "raw".to_string());
    match mode.as_str() {
        "raw" => {
            let json = to_json(&Dynamic::from_map(spec.clone()));
            let language = json.pointer("/options/raw/language").and_then(|value| value.as_str());
            let content_type = if language == Some("json") {
                "application/json"
            } else {
                "text/plain"
            };
            let raw = spec.get("raw").map(|raw| raw.to_string()).unwrap_or_default();
            Ok(text_body(content_type, raw))
        }
        "urlencoded" => {
            let pairs = spec
                .get("urlencoded")
                .map(|pairs| parse::<Vec<KeyValuePair>>(pairs, "Invalid urlencoded body"))
                .transpose()?
                .unwrap_or_default();
            let lines = pairs
                .iter()
                .map(|pair| format!("{}: {}", pair.key, pair.value))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(text_body("application/x-www-form-urlencoded", lines))
        }
        other => Err(guest_error(format!(
            "Unsupported body mode: {other}. Supported modes: raw, urlencoded"
        ))),
    }
}

/// `pm::request`. Url, headers and body helpers live in sub-modules beside
/// the getters of the same name.
pub(crate) fn pm_request_module(ctx: &SharedContext) -> Module {
    let mut module = Module::new();
    {
        let context = ctx.borrow();
        module.set_var("name", context.request.name.clone());
        module.set_var("id", request_id(&context));
    }

    let on_url = ctx.clone();
    module.set_native_fn("url", move || -> GuestResult<String> {
        Ok(read(&on_url, |context| context.request.endpoint.clone()))
    });
    let on_set_url = ctx.clone();
    module.set_native_fn("setUrl", move |url: ImmutableString| -> GuestResult<()> {
        let params = url_pattern()
            .captures(url.trim())
            .map(|captures| split_query(captures.get(5).map_or("", |found| found.as_str())))
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| KeyValuePair::new(key, value))
            .collect::<Vec<_>>();
        mutate(&on_set_url, |context| {
            context.request.endpoint = url.to_string();
            context.request.params = params;
        })
    });

    let on_method = ctx.clone();
    module.set_native_fn("method", move || -> GuestResult<String> {
        Ok(read(&on_method, |context| context.request.method.clone()))
    });
    // Case is kept as given.
    let on_set_method = ctx.clone();
    module.set_native_fn("setMethod", move |method: Dynamic| -> GuestResult<()> {
        if !method.is_string() {
            return Err(guest_error(
                "Method must be a string (GET, POST, PUT, DELETE, etc.)",
            ));
        }
        let method = method.to_string();
        mutate(&on_set_method, |context| context.request.method = method)
    });

    let on_headers = ctx.clone();
    module.set_native_fn("headers", move || -> GuestResult<Dynamic> {
        read(&on_headers, |context| project(&context.request.headers))
    });
    let on_body = ctx.clone();
    module.set_native_fn("body", move || -> GuestResult<Dynamic> {
        read(&on_body, |context| project(&context.request.body))
    });
    let on_set_body = ctx.clone();
    module.set_native_fn("setBody", move |body: Dynamic| -> GuestResult<()> {
        let body = body.flatten_clone();
        let body = if body.is_string() {
            text_body("text/plain", body.to_string())
        } else if body.is_map() || body.is_array() {
            text_body("application/json", to_json(&body).to_string())
        } else {
            return Err(guest_error("Body must be a string or object"));
        };
        mutate(&on_set_body, |context| context.request.body = body)
    });
    let on_auth = ctx.clone();
    module.set_native_fn("auth", move || -> GuestResult<Dynamic> {
        read(&on_auth, |context| project(&context.request.auth))
    });
    let on_set_auth = ctx.clone();
    module.set_native_fn("setAuth", move |auth: Dynamic| -> GuestResult<()> {
        let auth = auth.flatten_clone();
        let auth = if auth.is_unit() || auth.is::<GuestNull>() {
            RequestAuth::None
        } else if auth.is_map() {
            parse::<RequestAuth>(&auth, "Invalid auth")?
        } else {
            return Err(guest_error("Auth must be an object or null"));
        };
        mutate(&on_set_auth, |context| context.request.auth = auth)
    });

    let mut body_module = Module::new();
    let on_update = ctx.clone();
    body_module.set_native_fn("update", move |spec: Dynamic| -> GuestResult<()> {
        let body = body_from_spec(&spec)?;
        mutate(&on_update, |context| context.request.body = body)
    });

    module.set_sub_module("url", url_module(ctx));
    module.set_sub_module("headers", headers_module(ctx));
    module.set_sub_module("body", body_module);
    module
}
