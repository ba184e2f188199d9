use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValuePair {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiKeyPlacement {
    #[default]
    Headers,
    QueryParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "authType",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RequestAuth {
    #[default]
    None,
    Inherit,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        value: String,
        #[serde(default)]
        add_to: ApiKeyPlacement,
    },
}

/// The request a hook sees. Pre-request hooks mutate a working copy of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub params: Vec<KeyValuePair>,
    #[serde(default)]
    pub headers: Vec<KeyValuePair>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub auth: RequestAuth,
    #[serde(default)]
    pub request_variables: Vec<KeyValuePair>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Upserts `key` into an ordered key/value list, matching keys case-sensitively.
pub fn upsert_pair(list: &mut Vec<KeyValuePair>, key: &str, value: &str) {
    match list.iter_mut().find(|pair| pair.key == key) {
        Some(pair) => {
            pair.value = value.to_string();
            pair.active = true;
        }
        None => list.push(KeyValuePair::new(key, value)),
    }
}

pub fn remove_pair(list: &mut Vec<KeyValuePair>, key: &str) -> bool {
    let before = list.len();
    list.retain(|pair| pair.key != key);
    before != list.len()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<ResponseHeader>,
    /// Raw body text as received.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ResponseSnapshot {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.key.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn auth_deserializes_tagged_variants() {
        let bearer: RequestAuth =
            serde_json::from_str(r#"{"authType":"bearer","token":"t"}"#).expect("bearer");
        assert_eq!(
            bearer,
            RequestAuth::Bearer {
                token: "t".to_string()
            }
        );
        let api_key: RequestAuth = serde_json::from_str(
            r#"{"authType":"api-key","key":"X-Key","value":"v","addTo":"QUERY_PARAMS"}"#,
        )
        .expect("api key");
        assert!(matches!(
            api_key,
            RequestAuth::ApiKey {
                add_to: ApiKeyPlacement::QueryParams,
                ..
            }
        ));
    }

    #[test]
    fn upsert_pair_updates_in_place_or_appends() {
        let mut list = vec![KeyValuePair::new("a", "1")];
        upsert_pair(&mut list, "a", "2");
        upsert_pair(&mut list, "b", "3");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].value, "2");
        assert!(remove_pair(&mut list, "a"));
        assert!(!remove_pair(&mut list, "a"));
        assert_eq!(list[0].key, "b");
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let response = ResponseSnapshot {
            status: 200,
            headers: vec![ResponseHeader {
                key: "Content-Type".to_string(),
                value: "application/json".to_string(),
            }],
            ..ResponseSnapshot::default()
        };
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn request_defaults_to_get() {
        let request: RequestSnapshot =
            serde_json::from_str(r#"{"endpoint":"https://x.test"}"#).expect("request");
        assert_eq!(request.method, "GET");
        assert_eq!(request.auth, RequestAuth::None);
    }
}
