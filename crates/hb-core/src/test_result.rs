use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectStatus {
    Pass,
    Fail,
    Error,
}

impl ExpectStatus {
    pub fn from_outcome(passed: bool) -> Self {
        if passed {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectResult {
    pub status: ExpectStatus,
    pub message: String,
}

impl ExpectResult {
    pub fn new(status: ExpectStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

pub const ROOT_TEST_NAME: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDescriptor {
    pub name: String,
    #[serde(default)]
    pub results: Vec<ExpectResult>,
    #[serde(default)]
    pub children: Vec<TestDescriptor>,
}

impl TestDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_TEST_NAME)
    }

    pub fn child(&self, name: &str) -> Option<&TestDescriptor> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Counts results with `status` in this node and every descendant.
    pub fn count(&self, status: ExpectStatus) -> usize {
        self.results
            .iter()
            .filter(|result| result.status == status)
            .count()
            + self
                .children
                .iter()
                .map(|child| child.count(status))
                .sum::<usize>()
    }
}

#[cfg(test)]
mod test_result_tests {
    use super::*;

    #[test]
    fn count_walks_children() {
        let mut root = TestDescriptor::root();
        let mut child = TestDescriptor::new("a");
        child
            .results
            .push(ExpectResult::new(ExpectStatus::Pass, "ok"));
        child
            .results
            .push(ExpectResult::new(ExpectStatus::Fail, "no"));
        root.children.push(child);
        assert_eq!(root.count(ExpectStatus::Pass), 1);
        assert_eq!(root.count(ExpectStatus::Fail), 1);
        assert_eq!(root.count(ExpectStatus::Error), 0);
        assert!(root.child("a").is_some());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ExpectResult::new(ExpectStatus::Error, "x"))
            .expect("result should serialize");
        assert_eq!(json, r#"{"status":"error","message":"x"}"#);
    }
}
