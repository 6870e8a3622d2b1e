//! Nested representation of an active configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The configuration re-expressed as a nested mapping.
///
/// A compound node whose active child is a leaf collapses to that child's
/// key. Any other composite expands to a map: a compound to a single entry
/// for its active child, a parallel node to one entry per region.
///
/// ```rust
/// use pasture_sentinel::core::StateValue;
///
/// let value: StateValue = serde_json::from_str(
///     r#"{ "Deployed": { "Main": "Going to Safe Area", "Monitoring": "Mission Monitoring" } }"#,
/// ).unwrap();
///
/// assert!(value.matches("Deployed.Main.Going to Safe Area"));
/// assert_eq!(value.main_state(), Some("Deployed"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Leaf(String),
    Nested(BTreeMap<String, StateValue>),
}

/// A [`StateValue`] that does not describe a legal configuration of a
/// definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("State '{parent}' has no child '{key}'")]
    UnknownState { parent: String, key: String },

    #[error("Value for state '{state}' does not match its kind")]
    ShapeMismatch { state: String },

    #[error("Compound state '{state}' must have exactly one active child")]
    AmbiguousChild { state: String },

    #[error("Parallel state '{state}' is missing region '{region}'")]
    MissingRegion { state: String, region: String },
}

impl StateValue {
    pub fn leaf(key: impl Into<String>) -> Self {
        Self::Leaf(key.into())
    }

    /// Whether the dotted `path` is active in this value.
    ///
    /// A path matches when every segment follows an active key from the
    /// top; it may stop at any depth.
    pub fn matches(&self, path: &str) -> bool {
        let mut current = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match current {
                Self::Leaf(key) => return key == segment && segments.peek().is_none(),
                Self::Nested(map) => match map.get(segment) {
                    Some(next) => current = next,
                    None => return false,
                },
            }
        }
        true
    }

    /// Top-level active key.
    pub fn main_state(&self) -> Option<&str> {
        match self {
            Self::Leaf(key) => Some(key.as_str()),
            Self::Nested(map) => map.keys().next().map(String::as_str),
        }
    }

    /// Keys of every active leaf below the top level.
    pub fn substates(&self) -> Vec<&str> {
        fn collect<'a>(value: &'a StateValue, out: &mut Vec<&'a str>) {
            if let StateValue::Nested(map) = value {
                for child in map.values() {
                    match child {
                        StateValue::Leaf(key) => out.push(key),
                        nested => collect(nested, out),
                    }
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    /// Flattened `key` paths for every active leaf, e.g.
    /// `Deployed.Main.Going to Safe Area`.
    pub fn leaf_paths(&self) -> Vec<String> {
        fn walk(value: &StateValue, prefix: &str, out: &mut Vec<String>) {
            let join = |key: &str| {
                if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                }
            };
            match value {
                StateValue::Leaf(key) => out.push(join(key)),
                StateValue::Nested(map) if map.is_empty() => out.push(prefix.to_string()),
                StateValue::Nested(map) => {
                    for (key, child) in map {
                        walk(child, &join(key), out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(self, "", &mut out);
        out
    }
}

impl From<&str> for StateValue {
    fn from(key: &str) -> Self {
        Self::leaf(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployed() -> StateValue {
        serde_json::from_str(
            r#"{"Deployed":{"Main":{"Patrolling":{"Perimeter":"Perimeter watch","Predator":"Predator Monitoring","Sheep":"Sheep Monitoring"}},"Monitoring":"Mission Monitoring"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn leaf_deserializes_from_string() {
        let value: StateValue = serde_json::from_str(r#"{"Undeployed":"Off"}"#).unwrap();
        let expected = StateValue::Nested(BTreeMap::from([(
            "Undeployed".to_string(),
            StateValue::leaf("Off"),
        )]));
        assert_eq!(value, expected);
    }

    #[test]
    fn matches_partial_and_full_paths() {
        let value = deployed();
        assert!(value.matches("Deployed"));
        assert!(value.matches("Deployed.Main.Patrolling"));
        assert!(value.matches("Deployed.Main.Patrolling.Sheep.Sheep Monitoring"));
        assert!(value.matches("Deployed.Monitoring.Mission Monitoring"));
        assert!(!value.matches("Undeployed"));
        assert!(!value.matches("Deployed.Monitoring.Mission Monitoring.Deeper"));
        assert!(!value.matches("Deployed.Main.Predator Detected"));
    }

    #[test]
    fn main_state_and_substates() {
        let value = deployed();
        assert_eq!(value.main_state(), Some("Deployed"));
        let substates = value.substates();
        assert_eq!(substates.len(), 4);
        assert!(substates.contains(&"Perimeter watch"));
        assert!(substates.contains(&"Mission Monitoring"));

        let crashed = StateValue::leaf("Crashed");
        assert_eq!(crashed.main_state(), Some("Crashed"));
        assert!(crashed.substates().is_empty());
    }

    #[test]
    fn leaf_paths_flatten_every_branch() {
        let paths = deployed().leaf_paths();
        assert!(paths.contains(&"Deployed.Main.Patrolling.Perimeter.Perimeter watch".to_string()));
        assert!(paths.contains(&"Deployed.Monitoring.Mission Monitoring".to_string()));
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn json_round_trip_is_identical() {
        let value = deployed();
        let json = serde_json::to_string(&value).unwrap();
        let back: StateValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }
}
