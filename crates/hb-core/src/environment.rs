use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub key: String,
    #[serde(default)]
    pub current_value: String,
    #[serde(default)]
    pub initial_value: String,
    #[serde(default)]
    pub secret: bool,
}

impl EnvironmentVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            key: key.into(),
            current_value: value.clone(),
            initial_value: value,
            secret: false,
        }
    }
}

/// The two variable lists visible to a hook. Keys are unique within a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    #[serde(default)]
    pub global: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub selected: Vec<EnvironmentVariable>,
}

impl EnvironmentSnapshot {
    pub fn list(&self, scope: EnvScope) -> Vec<&EnvironmentVariable> {
        match scope {
            EnvScope::Global => self.global.iter().collect(),
            EnvScope::Selected => self.selected.iter().collect(),
            EnvScope::All => self.selected.iter().chain(self.global.iter()).collect(),
        }
    }

    /// Selected shadows global when both define the key.
    pub fn find(&self, scope: EnvScope, key: &str) -> Option<&EnvironmentVariable> {
        self.list(scope).into_iter().find(|entry| entry.key == key)
    }
}

/// Which list a namespace call reads or writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvScope {
    #[default]
    All,
    Selected,
    Global,
}

impl EnvScope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "all" => Some(Self::All),
            "selected" | "active" => Some(Self::Selected),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}
