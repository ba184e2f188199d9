use std::collections::BTreeMap;

use hb_core::{EnvScope, EnvironmentSnapshot, EnvironmentVariable, GuestValue};

use crate::template::{expand_template, Expansion};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnvEntry {
    pub(crate) key: String,
    pub(crate) current: GuestValue,
    pub(crate) initial: GuestValue,
    pub(crate) secret: bool,
}

impl EnvEntry {
    fn from_variable(variable: &EnvironmentVariable) -> Self {
        Self {
            key: variable.key.clone(),
            current: GuestValue::string(variable.current_value.as_str()),
            initial: GuestValue::string(variable.initial_value.as_str()),
            secret: variable.secret,
        }
    }

    fn to_variable(&self) -> EnvironmentVariable {
        EnvironmentVariable {
            key: self.key.clone(),
            current_value: self.current.to_display_string(),
            initial_value: self.initial.to_display_string(),
            secret: self.secret,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvField {
    Current,
    Initial,
}

/// Working copy of the environment for one invocation. Values keep their guest
/// type until capture so the any-type setter can round-trip them.
#[derive(Debug, Clone)]
pub(crate) struct EnvironmentState {
    global: Vec<EnvEntry>,
    selected: Vec<EnvEntry>,
    max_expansions: usize,
}

impl EnvironmentState {
    pub(crate) fn from_snapshot(snapshot: &EnvironmentSnapshot, max_expansions: usize) -> Self {
        Self {
            global: snapshot.global.iter().map(EnvEntry::from_variable).collect(),
            selected: snapshot.selected.iter().map(EnvEntry::from_variable).collect(),
            max_expansions,
        }
    }

    pub(crate) fn to_snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            global: self.global.iter().map(EnvEntry::to_variable).collect(),
            selected: self.selected.iter().map(EnvEntry::to_variable).collect(),
        }
    }

    fn lists(&self, scope: EnvScope) -> Vec<&Vec<EnvEntry>> {
        match scope {
            EnvScope::All => vec![&self.selected, &self.global],
            EnvScope::Selected => vec![&self.selected],
            EnvScope::Global => vec![&self.global],
        }
    }

    pub(crate) fn find(&self, key: &str, scope: EnvScope) -> Option<&EnvEntry> {
        self.lists(scope)
            .into_iter()
            .flat_map(|list| list.iter())
            .find(|entry| entry.key == key)
    }

    /// Current value as text, markers left as stored.
    pub(crate) fn get(&self, key: &str, scope: EnvScope) -> Option<String> {
        self.find(key, scope).map(|entry| entry.current.to_js_string())
    }

    /// Current value with `{{var}}` references expanded. Falls back to the raw
    /// value when expansion does not settle.
    pub(crate) fn get_resolved(&self, key: &str, scope: EnvScope) -> Option<String> {
        let raw = self.get(key, scope)?;
        Some(self.resolve(&raw))
    }

    pub(crate) fn get_initial(&self, key: &str, scope: EnvScope) -> Option<String> {
        self.find(key, scope)
            .map(|entry| entry.initial.to_js_string())
    }

    /// Typed current value, markers decoded and string templates expanded.
    pub(crate) fn get_typed(&self, key: &str, scope: EnvScope) -> Option<GuestValue> {
        let value = self.find(key, scope)?.current.clone().resolve_marker();
        Some(match value {
            GuestValue::String(raw) => GuestValue::String(self.resolve(&raw)),
            other => other,
        })
    }

    pub(crate) fn resolve(&self, template: &str) -> String {
        match expand_template(template, self.max_expansions, |name| {
            self.find(name, EnvScope::All)
                .map(|entry| entry.current.to_display_string())
        }) {
            Expansion::Resolved(text) => text,
            Expansion::LimitExceeded => template.to_string(),
        }
    }

    /// Updates the first matching entry, or creates one (in selected unless the
    /// scope is global) with both values set.
    pub(crate) fn set(
        &mut self,
        key: &str,
        value: GuestValue,
        scope: EnvScope,
        field: EnvField,
        secret: Option<bool>,
    ) {
        if let Some(entry) = self.find_mut(key, scope) {
            match field {
                EnvField::Current => entry.current = value,
                EnvField::Initial => entry.initial = value,
            }
            if let Some(secret) = secret {
                entry.secret = secret;
            }
            return;
        }
        let entry = EnvEntry {
            key: key.to_string(),
            current: value.clone(),
            initial: value,
            secret: secret.unwrap_or(false),
        };
        match scope {
            EnvScope::Global => self.global.push(entry),
            EnvScope::All | EnvScope::Selected => self.selected.push(entry),
        }
    }

    pub(crate) fn unset(&mut self, key: &str, scope: EnvScope) -> bool {
        let removed_selected = matches!(scope, EnvScope::All | EnvScope::Selected)
            && remove_key(&mut self.selected, key);
        if removed_selected {
            return true;
        }
        matches!(scope, EnvScope::All | EnvScope::Global) && remove_key(&mut self.global, key)
    }

    pub(crate) fn reset(&mut self, key: &str, scope: EnvScope) -> bool {
        match self.find_mut(key, scope) {
            Some(entry) => {
                entry.current = entry.initial.clone();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self, scope: EnvScope) {
        match scope {
            EnvScope::All => {
                self.selected.clear();
                self.global.clear();
            }
            EnvScope::Selected => self.selected.clear(),
            EnvScope::Global => self.global.clear(),
        }
    }

    /// Typed view of a scope; for `All`, selected entries shadow global ones.
    pub(crate) fn to_object(&self, scope: EnvScope) -> BTreeMap<String, GuestValue> {
        let mut out = BTreeMap::new();
        for list in self.lists(scope).into_iter().rev() {
            for entry in list {
                out.insert(entry.key.clone(), entry.current.clone().resolve_marker());
            }
        }
        out
    }

    fn find_mut(&mut self, key: &str, scope: EnvScope) -> Option<&mut EnvEntry> {
        let lists: Vec<&mut Vec<EnvEntry>> = match scope {
            EnvScope::All => vec![&mut self.selected, &mut self.global],
            EnvScope::Selected => vec![&mut self.selected],
            EnvScope::Global => vec![&mut self.global],
        };
        lists
            .into_iter()
            .flat_map(|list| list.iter_mut())
            .find(|entry| entry.key == key)
    }
}

fn remove_key(list: &mut Vec<EnvEntry>, key: &str) -> bool {
    match list.iter().position(|entry| entry.key == key) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod env_state_tests {
    use super::*;
    use hb_core::{NULL_MARKER, UNDEFINED_MARKER};

    fn state() -> EnvironmentState {
        EnvironmentState::from_snapshot(
            &EnvironmentSnapshot {
                global: vec![
                    EnvironmentVariable::new("host", "global.test"),
                    EnvironmentVariable::new("base", "https://{{host}}"),
                ],
                selected: vec![EnvironmentVariable::new("host", "selected.test")],
            },
            10,
        )
    }

    #[test]
    fn reads_prefer_selected_and_resolve_templates() {
        let env = state();
        assert_eq!(env.get("host", EnvScope::All).as_deref(), Some("selected.test"));
        assert_eq!(env.get("host", EnvScope::Global).as_deref(), Some("global.test"));
        assert_eq!(
            env.get_resolved("base", EnvScope::All).as_deref(),
            Some("https://selected.test")
        );
        assert_eq!(env.get("missing", EnvScope::All), None);
    }

    #[test]
    fn set_reads_back_immediately() {
        let mut env = state();
        env.set("token", "abc".into(), EnvScope::All, EnvField::Current, None);
        assert_eq!(env.get("token", EnvScope::All).as_deref(), Some("abc"));
        assert_eq!(env.get("token", EnvScope::Selected).as_deref(), Some("abc"));
        assert_eq!(env.get_initial("token", EnvScope::All).as_deref(), Some("abc"));

        env.set("token", "def".into(), EnvScope::All, EnvField::Current, Some(true));
        let snapshot = env.to_snapshot();
        let token = snapshot
            .find(EnvScope::Selected, "token")
            .expect("token should be captured");
        assert_eq!(token.current_value, "def");
        assert_eq!(token.initial_value, "abc");
        assert!(token.secret);
    }

    #[test]
    fn set_with_global_scope_appends_to_global() {
        let mut env = state();
        env.set("g", "1".into(), EnvScope::Global, EnvField::Current, None);
        assert!(env.find("g", EnvScope::Selected).is_none());
        assert!(env.find("g", EnvScope::Global).is_some());
    }

    #[test]
    fn unset_removes_selected_before_global() {
        let mut env = state();
        assert!(env.unset("host", EnvScope::All));
        assert_eq!(env.get("host", EnvScope::All).as_deref(), Some("global.test"));
        assert!(env.unset("host", EnvScope::All));
        assert!(!env.unset("host", EnvScope::All));
    }

    #[test]
    fn reset_restores_initial_value() {
        let mut env = state();
        env.set("host", "changed".into(), EnvScope::Selected, EnvField::Current, None);
        assert!(env.reset("host", EnvScope::Selected));
        assert_eq!(env.get("host", EnvScope::Selected).as_deref(), Some("selected.test"));
        assert!(!env.reset("missing", EnvScope::All));
    }

    #[test]
    fn typed_values_survive_until_capture() {
        let mut env = state();
        env.set(
            "count",
            GuestValue::Int(3),
            EnvScope::Selected,
            EnvField::Current,
            None,
        );
        env.set(
            "nothing",
            GuestValue::Null.into_marker(),
            EnvScope::Selected,
            EnvField::Current,
            None,
        );
        env.set(
            "gone",
            GuestValue::Undefined.into_marker(),
            EnvScope::Selected,
            EnvField::Current,
            None,
        );
        assert_eq!(env.get_typed("count", EnvScope::All), Some(GuestValue::Int(3)));
        assert_eq!(env.get_typed("nothing", EnvScope::All), Some(GuestValue::Null));
        assert_eq!(env.get("nothing", EnvScope::All).as_deref(), Some(NULL_MARKER));
        assert_eq!(
            env.get("gone", EnvScope::All).as_deref(),
            Some(UNDEFINED_MARKER)
        );

        let snapshot = env.to_snapshot();
        let values = snapshot
            .selected
            .iter()
            .map(|entry| (entry.key.as_str(), entry.current_value.as_str()))
            .collect::<Vec<_>>();
        assert!(values.contains(&("count", "3")));
        assert!(values.contains(&("nothing", "null")));
        assert!(values.contains(&("gone", "undefined")));
    }

    #[test]
    fn resolve_returns_raw_template_on_loops() {
        let mut env = state();
        env.set("a", "{{a}}x".into(), EnvScope::Selected, EnvField::Current, None);
        assert_eq!(env.resolve("{{a}}"), "{{a}}");
    }

    #[test]
    fn to_object_lets_selected_shadow_global() {
        let env = state();
        let all = env.to_object(EnvScope::All);
        assert_eq!(all.get("host"), Some(&GuestValue::string("selected.test")));
        assert!(all.contains_key("base"));
        assert_eq!(env.to_object(EnvScope::Selected).len(), 1);
    }
}
