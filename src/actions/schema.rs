//! Action Specification Schema
//!
//! Structural validation of a raw (user-written) action specification:
//! - top level is a list
//! - each item is a mapping with exactly one key
//! - the key is a known action name
//! - the value is a non-negative integer
//!
//! Validation happens before anything is executed, so a bad specification
//! never results in a partially run workload.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, warn};
use serde_json::Value;

use super::model::{ActionEntry, ActionSpec};
use super::registry::ActionRegistry;
use crate::error::ConfigurationError;

/// A single way a raw specification can violate the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    NotAList { found: &'static str },
    NotAMapping { index: usize, found: &'static str },
    KeyCount { index: usize, count: usize },
    UnknownAction { index: usize, name: String },
    NotAnInteger { index: usize, name: String, found: String },
    NegativeCount { index: usize, name: String, value: i64 },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAList { found } => {
                write!(f, "expected a list of {{action: count}} entries, found {}", found)
            }
            Self::NotAMapping { index, found } => {
                write!(f, "entry {}: expected a single-key mapping, found {}", index, found)
            }
            Self::KeyCount { index, count } => {
                write!(f, "entry {}: expected exactly one action name, found {}", index, count)
            }
            Self::UnknownAction { index, name } => {
                write!(f, "entry {}: '{}' is not a valid action", index, name)
            }
            Self::NotAnInteger { index, name, found } => {
                write!(
                    f,
                    "entry {}: count for '{}' must be a non-negative integer, found {}",
                    index, name, found
                )
            }
            Self::NegativeCount { index, name, value } => {
                write!(
                    f,
                    "entry {}: count for '{}' must be a non-negative integer, found {}",
                    index, name, value
                )
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Validates raw specifications against a fixed set of action names.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    known: BTreeSet<String>,
}

impl SchemaValidator {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a validator accepting exactly the names in `registry`.
    pub fn for_registry<R>(registry: &ActionRegistry<R>) -> Self {
        Self::new(registry.names())
    }

    /// Returns every violation found in `spec`. A missing (null)
    /// specification counts as the empty list.
    pub fn violations(&self, spec: &Value) -> Vec<SchemaViolation> {
        let items = match spec {
            Value::Null => return Vec::new(),
            Value::Array(items) => items,
            other => {
                return vec![SchemaViolation::NotAList {
                    found: type_name(other),
                }]
            }
        };

        let mut violations = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Value::Object(map) = item else {
                violations.push(SchemaViolation::NotAMapping {
                    index,
                    found: type_name(item),
                });
                continue;
            };

            if map.len() != 1 {
                violations.push(SchemaViolation::KeyCount {
                    index,
                    count: map.len(),
                });
                continue;
            }

            for (name, count) in map {
                if !self.known.contains(name) {
                    violations.push(SchemaViolation::UnknownAction {
                        index,
                        name: name.clone(),
                    });
                }
                if let Some(violation) = check_count(index, name, count) {
                    violations.push(violation);
                }
            }
        }
        violations
    }

    /// Validates `spec`, describing every violation in the error.
    pub fn validate(&self, spec: &Value) -> Result<(), ConfigurationError> {
        let violations = self.violations(spec);
        if violations.is_empty() {
            debug!("Action specification valid: {}", spec);
            return Ok(());
        }

        let reason = violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        warn!("Rejected action specification {}: {}", spec, reason);

        Err(ConfigurationError::InvalidActions {
            actions: spec.to_string(),
            reason,
        })
    }

    /// Validates `spec` and converts it into an [`ActionSpec`].
    pub fn parse(&self, spec: &Value) -> Result<ActionSpec, ConfigurationError> {
        self.validate(spec)?;

        let entries = spec
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .flat_map(|map| map.iter())
                    .filter_map(|(name, count)| {
                        count
                            .as_u64()
                            .and_then(|c| usize::try_from(c).ok())
                            .map(|c| ActionEntry::new(name.clone(), c))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ActionSpec::from_entries(entries))
    }

    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(|s| s.as_str())
    }
}

fn check_count(index: usize, name: &str, count: &Value) -> Option<SchemaViolation> {
    if let Value::Number(n) = count {
        if let Some(value) = n.as_u64() {
            if usize::try_from(value).is_ok() {
                return None;
            }
        } else if let Some(value) = n.as_i64() {
            return Some(SchemaViolation::NegativeCount {
                index,
                name: name.to_string(),
                value,
            });
        }
    }

    Some(SchemaViolation::NotAnInteger {
        index,
        name: name.to_string(),
        found: match count {
            Value::Number(n) => n.to_string(),
            other => type_name(other).to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::new(["hard_reboot", "stop_start", "soft_reboot"])
    }

    #[test]
    fn test_valid_spec() {
        let spec = json!([{"hard_reboot": 1}, {"stop_start": 2}]);
        assert!(validator().validate(&spec).is_ok());
    }

    #[test]
    fn test_null_and_empty_are_valid() {
        assert!(validator().validate(&Value::Null).is_ok());
        assert!(validator().validate(&json!([])).is_ok());
        assert!(validator().parse(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_action_named_in_error() {
        let spec = json!([{"nonexistent": 1}]);
        let err = validator().validate(&spec).unwrap_err();

        assert!(matches!(err, ConfigurationError::InvalidActions { .. }));
        assert!(err.to_string().contains("\"nonexistent\""));
        assert!(err.to_string().contains("'nonexistent' is not a valid action"));
    }

    #[test]
    fn test_negative_count_rejected() {
        let spec = json!([{"hard_reboot": -1}]);
        let violations = validator().violations(&spec);
        assert!(matches!(
            violations.as_slice(),
            [SchemaViolation::NegativeCount { value: -1, .. }]
        ));
        assert!(validator().validate(&spec).is_err());
    }

    #[test]
    fn test_non_integer_counts_rejected() {
        for count in [json!(1.5), json!("2"), json!(true), json!(null), json!([1])] {
            let spec = json!([{ "stop_start": count }]);
            let violations = validator().violations(&spec);
            assert!(
                matches!(violations.as_slice(), [SchemaViolation::NotAnInteger { .. }]),
                "count {:?} should be rejected",
                count
            );
        }
    }

    #[test]
    fn test_zero_count_allowed() {
        let spec = json!([{"stop_start": 0}]);
        let parsed = validator().parse(&spec).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.total_steps(), 0);
    }

    #[test]
    fn test_shape_violations() {
        let v = validator();

        assert!(matches!(
            v.violations(&json!({"hard_reboot": 1})).as_slice(),
            [SchemaViolation::NotAList { found: "mapping" }]
        ));
        assert!(matches!(
            v.violations(&json!(["hard_reboot"])).as_slice(),
            [SchemaViolation::NotAMapping { index: 0, found: "string" }]
        ));
        assert!(matches!(
            v.violations(&json!([{"hard_reboot": 1, "stop_start": 1}])).as_slice(),
            [SchemaViolation::KeyCount { index: 0, count: 2 }]
        ));
        assert!(matches!(
            v.violations(&json!([{}])).as_slice(),
            [SchemaViolation::KeyCount { index: 0, count: 0 }]
        ));
    }

    #[test]
    fn test_all_violations_reported() {
        let spec = json!([{"hard_reboot": 1}, {"ghost": 1}, {"stop_start": -3}]);
        let err = validator().validate(&spec).unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("entry 1"));
        assert!(msg.contains("entry 2"));
        assert!(!msg.contains("entry 0"));
    }

    #[test]
    fn test_parse_preserves_order() {
        let spec = json!([{"stop_start": 2}, {"hard_reboot": 1}, {"stop_start": 1}]);
        let parsed = validator().parse(&spec).unwrap();

        let names: Vec<&str> = parsed.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["stop_start", "hard_reboot", "stop_start"]);
        assert_eq!(parsed.total_steps(), 4);
    }

    #[test]
    fn test_for_registry_uses_registered_names() {
        use crate::actions::registry::BoundStep;

        let mut registry: ActionRegistry<()> = ActionRegistry::new();
        registry
            .register("custom", |_: &()| BoundStep::new("custom", || Ok(())))
            .unwrap();

        let v = SchemaValidator::for_registry(&registry);
        assert!(v.validate(&json!([{"custom": 3}])).is_ok());
        assert!(v.validate(&json!([{"hard_reboot": 1}])).is_err());
        assert_eq!(v.known_names().collect::<Vec<_>>(), vec!["custom"]);
    }
}
