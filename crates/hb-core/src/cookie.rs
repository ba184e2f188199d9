use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSite,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expires: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: SameSite::default(),
        }
    }
}

/// Cookies grouped by domain. Within a domain names are unique and the list
/// keeps insertion order; a re-set cookie moves to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    domains: BTreeMap<String, Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<&Cookie> {
        self.domains
            .get(domain)
            .and_then(|cookies| cookies.iter().find(|cookie| cookie.name == name))
    }

    pub fn get_all(&self, domain: &str) -> &[Cookie] {
        self.domains
            .get(domain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has(&self, domain: &str, name: &str) -> bool {
        self.get(domain, name).is_some()
    }

    pub fn set(&mut self, domain: &str, mut cookie: Cookie) {
        if cookie.domain.is_empty() {
            cookie.domain = domain.to_string();
        }
        let cookies = self.domains.entry(domain.to_string()).or_default();
        cookies.retain(|existing| existing.name != cookie.name);
        cookies.push(cookie);
    }

    pub fn delete(&mut self, domain: &str, name: &str) -> bool {
        let Some(cookies) = self.domains.get_mut(domain) else {
            return false;
        };
        let before = cookies.len();
        cookies.retain(|cookie| cookie.name != name);
        before != cookies.len()
    }

    pub fn clear(&mut self, domain: &str) {
        self.domains.remove(domain);
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod cookie_tests {
    use super::*;

    #[test]
    fn set_replaces_same_name_and_moves_to_end() {
        let mut jar = CookieJar::new();
        jar.set("example.com", Cookie::new("example.com", "a", "1"));
        jar.set("example.com", Cookie::new("example.com", "b", "2"));
        jar.set("example.com", Cookie::new("example.com", "a", "3"));

        let names = jar
            .get_all("example.com")
            .iter()
            .map(|cookie| (cookie.name.as_str(), cookie.value.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("b", "2"), ("a", "3")]);
    }

    #[test]
    fn set_fills_missing_domain_from_jar_key() {
        let mut jar = CookieJar::new();
        jar.set("api.test", Cookie::new("", "sid", "x"));
        assert_eq!(
            jar.get("api.test", "sid").map(|cookie| cookie.domain.as_str()),
            Some("api.test")
        );
    }

    #[test]
    fn delete_and_clear_report_and_remove() {
        let mut jar = CookieJar::new();
        jar.set("a.test", Cookie::new("a.test", "x", "1"));
        assert!(jar.delete("a.test", "x"));
        assert!(!jar.delete("a.test", "x"));
        assert!(!jar.delete("b.test", "x"));
        jar.set("a.test", Cookie::new("a.test", "y", "1"));
        jar.clear("a.test");
        assert!(jar.get_all("a.test").is_empty());
        assert_eq!(jar.domains().count(), 0);
    }

    #[test]
    fn jar_deserializes_from_domain_map() {
        let jar: CookieJar = serde_json::from_str(
            r#"{"example.com":[{"name":"sid","value":"1","domain":"example.com","httpOnly":true}]}"#,
        )
        .expect("jar should deserialize");
        let cookie = jar.get("example.com", "sid").expect("cookie should exist");
        assert!(cookie.http_only);
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.same_site, SameSite::Lax);
    }
}
