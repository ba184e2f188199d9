use hb_core::{ExpectResult, ExpectStatus, TestDescriptor};

/// Flat tree of declared tests under a fixed root, plus the pointer that
/// tells assertions where to record.
#[derive(Debug, Clone)]
pub struct TestTreeBuilder {
    root: TestDescriptor,
    current: Option<usize>,
}

impl Default for TestTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTreeBuilder {
    pub fn new() -> Self {
        Self {
            root: TestDescriptor::root(),
            current: None,
        }
    }

    /// Appends a child to the root. Order of declaration is order in the tree.
    pub fn declare_test(&mut self, name: &str) {
        self.root.children.push(TestDescriptor::new(name));
    }

    /// Points at the first declared test called `name`. Returns false, and
    /// clears the pointer, when no such test exists.
    pub fn set_current_test(&mut self, name: &str) -> bool {
        self.current = self
            .root
            .children
            .iter()
            .position(|child| child.name == name);
        self.current.is_some()
    }

    pub fn clear_current_test(&mut self) {
        self.current = None;
    }

    pub fn get_current_test(&self) -> Option<&str> {
        self.current
            .and_then(|index| self.root.children.get(index))
            .map(|child| child.name.as_str())
    }

    /// Records into the current test. Without a current test nothing is
    /// recorded and `false` is returned.
    pub fn push_result(&mut self, status: ExpectStatus, message: impl Into<String>) -> bool {
        match self.current_mut() {
            Some(test) => {
                test.results.push(ExpectResult::new(status, message));
                true
            }
            None => false,
        }
    }

    /// Rewrites the most recent result of the current test in place.
    pub fn update_last_result(&mut self, status: ExpectStatus, message: impl Into<String>) -> bool {
        match self
            .current_mut()
            .and_then(|test| test.results.last_mut())
        {
            Some(last) => {
                last.status = status;
                last.message = message.into();
                true
            }
            None => false,
        }
    }

    pub fn last_result(&self) -> Option<&ExpectResult> {
        self.current
            .and_then(|index| self.root.children.get(index))
            .and_then(|test| test.results.last())
    }

    pub fn root(&self) -> &TestDescriptor {
        &self.root
    }

    /// Deep copy, independent of later mutation.
    pub fn snapshot(&self) -> TestDescriptor {
        self.root.clone()
    }

    fn current_mut(&mut self) -> Option<&mut TestDescriptor> {
        let index = self.current?;
        self.root.children.get_mut(index)
    }
}

#[cfg(test)]
mod test_tree_tests {
    use super::*;

    #[test]
    fn children_follow_declaration_order() {
        let mut tree = TestTreeBuilder::new();
        tree.declare_test("second");
        tree.declare_test("first");
        let names = tree
            .snapshot()
            .children
            .into_iter()
            .map(|child| child.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(tree.root().name, "root");
    }

    #[test]
    fn push_result_requires_current_test() {
        let mut tree = TestTreeBuilder::new();
        tree.declare_test("t");
        assert!(!tree.push_result(ExpectStatus::Pass, "ignored"));
        assert!(tree.set_current_test("t"));
        assert_eq!(tree.get_current_test(), Some("t"));
        assert!(tree.push_result(ExpectStatus::Fail, "recorded"));
        tree.clear_current_test();
        assert_eq!(tree.get_current_test(), None);
        assert!(!tree.push_result(ExpectStatus::Pass, "ignored"));

        let snapshot = tree.snapshot();
        assert_eq!(snapshot.children[0].results.len(), 1);
        assert_eq!(snapshot.children[0].results[0].message, "recorded");
        assert!(snapshot.results.is_empty());
    }

    #[test]
    fn update_last_result_mutates_instead_of_appending() {
        let mut tree = TestTreeBuilder::new();
        tree.declare_test("t");
        tree.set_current_test("t");
        assert!(!tree.update_last_result(ExpectStatus::Pass, "nothing yet"));
        tree.push_result(ExpectStatus::Pass, "provisional");
        assert!(tree.update_last_result(ExpectStatus::Fail, "final"));
        let snapshot = tree.snapshot();
        assert_eq!(snapshot.children[0].results.len(), 1);
        assert_eq!(
            snapshot.children[0].results[0],
            ExpectResult::new(ExpectStatus::Fail, "final")
        );
    }

    #[test]
    fn set_current_test_picks_first_match_and_clears_on_miss() {
        let mut tree = TestTreeBuilder::new();
        tree.declare_test("dup");
        tree.declare_test("dup");
        tree.set_current_test("dup");
        tree.push_result(ExpectStatus::Pass, "a");
        assert!(!tree.set_current_test("missing"));
        assert_eq!(tree.get_current_test(), None);
        let snapshot = tree.snapshot();
        assert_eq!(snapshot.children[0].results.len(), 1);
        assert!(snapshot.children[1].results.is_empty());
    }

    #[test]
    fn snapshot_is_independent_of_live_tree() {
        let mut tree = TestTreeBuilder::new();
        tree.declare_test("t");
        let before = tree.snapshot();
        tree.set_current_test("t");
        tree.push_result(ExpectStatus::Pass, "later");
        assert!(before.children[0].results.is_empty());
    }
}
