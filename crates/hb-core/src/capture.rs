use serde::{Deserialize, Serialize};

use crate::cookie::CookieJar;
use crate::environment::EnvironmentSnapshot;
use crate::request::RequestSnapshot;
use crate::test_result::TestDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    Pre,
    Post,
}

impl HookMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreRequestCapture {
    pub request: RequestSnapshot,
    pub env: EnvironmentSnapshot,
    pub cookies: Option<CookieJar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequestCapture {
    pub env: EnvironmentSnapshot,
    pub cookies: Option<CookieJar>,
    pub test_tree: TestDescriptor,
}

/// What a successful invocation hands back to its caller. Every snapshot is a
/// deep copy, independent of the sandbox that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CapturedResult {
    Pre(PreRequestCapture),
    Post(PostRequestCapture),
}

impl CapturedResult {
    pub fn mode(&self) -> HookMode {
        match self {
            Self::Pre(_) => HookMode::Pre,
            Self::Post(_) => HookMode::Post,
        }
    }

    pub fn env(&self) -> &EnvironmentSnapshot {
        match self {
            Self::Pre(capture) => &capture.env,
            Self::Post(capture) => &capture.env,
        }
    }

    pub fn cookies(&self) -> Option<&CookieJar> {
        match self {
            Self::Pre(capture) => capture.cookies.as_ref(),
            Self::Post(capture) => capture.cookies.as_ref(),
        }
    }

    pub fn request(&self) -> Option<&RequestSnapshot> {
        match self {
            Self::Pre(capture) => Some(&capture.request),
            Self::Post(_) => None,
        }
    }

    pub fn test_tree(&self) -> Option<&TestDescriptor> {
        match self {
            Self::Pre(_) => None,
            Self::Post(capture) => Some(&capture.test_tree),
        }
    }
}
