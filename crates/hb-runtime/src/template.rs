use std::sync::OnceLock;

use regex::{Captures, Regex};

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("template regex must compile"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Resolved(String),
    /// Still changing after the pass limit (self-referencing variables).
    LimitExceeded,
}

/// Expands `{{name}}` references until a fixed point. Unknown names are left
/// in place verbatim.
pub fn expand_template(
    input: &str,
    max_passes: usize,
    lookup: impl Fn(&str) -> Option<String>,
) -> Expansion {
    let mut current = input.to_string();
    for _ in 0..max_passes {
        let next = expand_once(&current, &lookup);
        if next == current {
            return Expansion::Resolved(current);
        }
        current = next;
    }
    if expand_once(&current, &lookup) == current {
        Expansion::Resolved(current)
    } else {
        Expansion::LimitExceeded
    }
}

fn expand_once(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    template_pattern()
        .replace_all(input, |captures: &Captures<'_>| {
            lookup(captures[1].trim()).unwrap_or_else(|| captures[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod template_tests {
    use super::*;

    fn vars(name: &str) -> Option<String> {
        match name {
            "host" => Some("api.test".to_string()),
            "url" => Some("https://{{host}}/v1".to_string()),
            "loop" => Some("{{loop}}!".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_nested_references() {
        assert_eq!(
            expand_template("{{url}}/users", 10, vars),
            Expansion::Resolved("https://api.test/v1/users".to_string())
        );
    }

    #[test]
    fn keeps_unknown_references_verbatim() {
        assert_eq!(
            expand_template("{{ missing }} and {{host}}", 10, vars),
            Expansion::Resolved("{{ missing }} and api.test".to_string())
        );
    }

    #[test]
    fn reports_self_reference_as_limit_exceeded() {
        assert_eq!(
            expand_template("{{loop}}", 10, vars),
            Expansion::LimitExceeded
        );
    }

    #[test]
    fn plain_text_is_returned_unchanged() {
        assert_eq!(
            expand_template("no refs", 1, vars),
            Expansion::Resolved("no refs".to_string())
        );
    }
}
