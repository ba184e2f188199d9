use hb_core::GuestValue;

use super::compare::deep_equal;

/// Validates `value` against the subset of JSON Schema that hooks use:
/// `type`, `enum`, `required`, `properties`, `items`, numeric and length bounds.
pub fn matches_schema(value: &GuestValue, schema: &GuestValue) -> bool {
    let GuestValue::Object(rules) = schema else {
        return true;
    };

    if let Some(expected) = rules.get("type") {
        let allowed = match expected {
            GuestValue::String(name) => vec![name.as_str()],
            GuestValue::Array(names) => names.iter().filter_map(GuestValue::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|name| has_schema_type(value, name)) {
            return false;
        }
    }

    if let Some(GuestValue::Array(options)) = rules.get("enum") {
        if !options.iter().any(|option| deep_equal(option, value)) {
            return false;
        }
    }

    if let Some(GuestValue::Array(required)) = rules.get("required") {
        let GuestValue::Object(entries) = value else {
            return false;
        };
        if !required
            .iter()
            .filter_map(GuestValue::as_str)
            .all(|key| entries.contains_key(key))
        {
            return false;
        }
    }

    if let (Some(GuestValue::Object(properties)), GuestValue::Object(entries)) =
        (rules.get("properties"), value)
    {
        for (key, property_schema) in properties {
            if let Some(property) = entries.get(key) {
                if !matches_schema(property, property_schema) {
                    return false;
                }
            }
        }
    }

    if let (Some(item_schema), GuestValue::Array(items)) = (rules.get("items"), value) {
        if !items.iter().all(|item| matches_schema(item, item_schema)) {
            return false;
        }
    }

    if let Some(actual) = value.as_f64() {
        if rules
            .get("minimum")
            .and_then(GuestValue::as_f64)
            .is_some_and(|minimum| actual < minimum)
            || rules
                .get("maximum")
                .and_then(GuestValue::as_f64)
                .is_some_and(|maximum| actual > maximum)
        {
            return false;
        }
    }

    if let Some(length) = value.length() {
        let length = length as f64;
        if rules
            .get("minLength")
            .or_else(|| rules.get("minItems"))
            .and_then(GuestValue::as_f64)
            .is_some_and(|minimum| length < minimum)
            || rules
                .get("maxLength")
                .or_else(|| rules.get("maxItems"))
                .and_then(GuestValue::as_f64)
                .is_some_and(|maximum| length > maximum)
        {
            return false;
        }
    }

    true
}

fn has_schema_type(value: &GuestValue, name: &str) -> bool {
    match name {
        "integer" => match value {
            GuestValue::Int(_) => true,
            GuestValue::Float(number) => number.fract() == 0.0,
            _ => false,
        },
        "number" => value.is_number(),
        "null" => matches!(value, GuestValue::Null),
        "array" => matches!(value, GuestValue::Array(_)),
        "object" => matches!(value, GuestValue::Object(_)),
        other => value.type_name() == other,
    }
}

/// Resolves a `$.a.b[0]` style path. `*` fans out over every child.
pub fn resolve_json_path(value: &GuestValue, path: &str) -> Vec<GuestValue> {
    let trimmed = path.trim();
    let trimmed = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);
    let segments = trimmed
        .split(['.', '['])
        .map(|segment| {
            segment
                .trim_end_matches(']')
                .trim_matches(|ch| ch == '\'' || ch == '"')
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();

    let mut current = vec![value.clone()];
    for segment in segments {
        let mut next = Vec::new();
        for node in &current {
            match (node, segment) {
                (GuestValue::Object(entries), "*") => next.extend(entries.values().cloned()),
                (GuestValue::Array(items), "*") => next.extend(items.iter().cloned()),
                (GuestValue::Object(entries), key) => {
                    if let Some(child) = entries.get(key) {
                        next.push(child.clone());
                    }
                }
                (GuestValue::Array(items), index) => {
                    if let Some(child) = index.parse::<usize>().ok().and_then(|at| items.get(at)) {
                        next.push(child.clone());
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod schema_tests {
    use super::*;

    fn json(value: serde_json::Value) -> GuestValue {
        GuestValue::from_json(&value)
    }

    #[test]
    fn schema_checks_type_required_and_properties() {
        let schema = json(serde_json::json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {
                "id": {"type": "integer", "minimum": 1},
                "name": {"type": "string", "minLength": 1},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        }));
        assert!(matches_schema(
            &json(serde_json::json!({"id": 1, "name": "a", "tags": ["x"]})),
            &schema
        ));
        assert!(!matches_schema(&json(serde_json::json!({"id": 1})), &schema));
        assert!(!matches_schema(
            &json(serde_json::json!({"id": 0, "name": "a"})),
            &schema
        ));
        assert!(!matches_schema(
            &json(serde_json::json!({"id": 1, "name": "a", "tags": [1]})),
            &schema
        ));
        assert!(!matches_schema(&json(serde_json::json!([])), &schema));
    }

    #[test]
    fn schema_accepts_type_unions_and_enums() {
        let schema = json(serde_json::json!({"type": ["string", "null"], "enum": ["a", null]}));
        assert!(matches_schema(&GuestValue::Null, &schema));
        assert!(matches_schema(&GuestValue::string("a"), &schema));
        assert!(!matches_schema(&GuestValue::string("b"), &schema));
    }

    #[test]
    fn json_path_walks_keys_indices_and_wildcards() {
        let body = json(serde_json::json!({
            "data": {"users": [{"id": 1}, {"id": 2}]}
        }));
        assert_eq!(
            resolve_json_path(&body, "$.data.users[1].id"),
            vec![GuestValue::Int(2)]
        );
        assert_eq!(
            resolve_json_path(&body, "$.data.users[*].id"),
            vec![GuestValue::Int(1), GuestValue::Int(2)]
        );
        assert!(resolve_json_path(&body, "$.data.missing").is_empty());
        assert_eq!(resolve_json_path(&body, "$").len(), 1);
    }
}
