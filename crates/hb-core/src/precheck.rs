use crate::value::GuestValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Set,
    Map,
}

/// Dates and regexes lose their identity when cloned; this is what survives.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialValue {
    Date { millis: i64 },
    RegExp { source: String, flags: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorCheck {
    pub has_descriptor: bool,
    pub matches_expected: bool,
}

/// Observations from a change/increase/decrease assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeObservation {
    pub property: String,
    pub initial: GuestValue,
    pub final_value: GuestValue,
}

impl ChangeObservation {
    pub fn changed(&self) -> bool {
        self.initial != self.final_value
    }

    /// Numeric difference, when both observations are numbers.
    pub fn delta(&self) -> Option<f64> {
        Some(self.final_value.as_f64()? - self.initial.as_f64()?)
    }
}

/// Outcome of invoking a guest function under `throws`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrowObservation {
    pub threw: bool,
    /// Constructor name of the thrown error (`"Error"`, `"TypeError"`, ...).
    pub error_type: Option<String>,
    pub message: Option<String>,
}

/// Facts computed guest-side, before a value is cloned across the boundary.
/// Every field is optional; the host falls back to the cloned value when a
/// fact is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreCheckMetadata {
    pub type_tag: Option<String>,
    pub object_tag: Option<String>,
    pub same_reference: Option<bool>,
    pub collection: Option<CollectionKind>,
    pub size: Option<usize>,
    pub length: Option<usize>,
    pub display: Option<String>,
    pub expected_display: Option<String>,
    pub special: Option<SpecialValue>,
    pub expected_special: Option<SpecialValue>,
    /// Elements of a set, or values of a map.
    pub members: Option<Vec<GuestValue>>,
    /// Keys of a map, or elements of a set.
    pub keys: Option<Vec<GuestValue>>,
    pub frozen: Option<bool>,
    pub sealed: Option<bool>,
    pub extensible: Option<bool>,
    pub has_property: Option<bool>,
    pub own_property: Option<bool>,
    pub instance_of: Option<bool>,
    pub responds_to: Option<bool>,
    pub is_arguments: Option<bool>,
    pub descriptor: Option<DescriptorCheck>,
    pub satisfied: Option<bool>,
    pub throw_observation: Option<ThrowObservation>,
    pub change: Option<ChangeObservation>,
}

#[cfg(test)]
mod precheck_tests {
    use super::*;

    #[test]
    fn change_observation_reports_delta_for_numbers_only() {
        let numeric = ChangeObservation {
            property: "count".to_string(),
            initial: GuestValue::Int(1),
            final_value: GuestValue::Float(3.5),
        };
        assert!(numeric.changed());
        assert_eq!(numeric.delta(), Some(2.5));

        let textual = ChangeObservation {
            property: "value".to_string(),
            initial: GuestValue::string("a"),
            final_value: GuestValue::string("a"),
        };
        assert!(!textual.changed());
        assert_eq!(textual.delta(), None);
    }
}
