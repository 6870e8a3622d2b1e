//! Declarative transitions, before target resolution.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// An event-triggered transition as written in a definition.
///
/// Targets are unresolved strings:
/// - `#id` or `#id.child.path`: absolute, starting from a node with that id
/// - `.child.path`: a descendant of the declaring state
/// - `Sibling.path`: relative to the declaring state's parent
///
/// A missing target makes the transition internal: its actions run and no
/// state is exited or entered.
///
/// In JSON a transition is either a bare target string or an object:
///
/// ```rust
/// use pasture_sentinel::builder::TransitionSpec;
///
/// let short: TransitionSpec = serde_json::from_str(r#""Configured""#).unwrap();
/// let long: TransitionSpec =
///     serde_json::from_str(r#"{ "target": "Configured", "actions": "onFlightPlanReceived" }"#).unwrap();
///
/// assert_eq!(short, TransitionSpec::to("Configured"));
/// assert_eq!(long, TransitionSpec::to("Configured").action("onFlightPlanReceived"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TransitionRepr")]
pub struct TransitionSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl TransitionSpec {
    /// A transition to `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// A targetless transition that only runs its actions.
    pub fn internal() -> Self {
        Self::default()
    }

    /// Append an action identifier.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Enable this candidate only when the named guard passes.
    pub fn guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TransitionRepr {
    Target(String),
    Full(TransitionFields),
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct TransitionFields {
    target: Option<String>,
    guard: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    actions: Vec<String>,
}

impl From<TransitionRepr> for TransitionSpec {
    fn from(repr: TransitionRepr) -> Self {
        match repr {
            TransitionRepr::Target(target) => TransitionSpec::to(target),
            TransitionRepr::Full(fields) => TransitionSpec {
                target: fields.target,
                guard: fields.guard,
                actions: fields.actions,
            },
        }
    }
}

/// A transition taken automatically `delay` after its state is entered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedSpec {
    /// Delay in milliseconds.
    pub delay_ms: u64,
    pub target: String,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl DelayedSpec {
    /// Delays have millisecond granularity; a fractional millisecond rounds
    /// up, so only a zero `delay` yields `delay_ms == 0`.
    pub fn new(delay: Duration, target: impl Into<String>) -> Self {
        Self {
            delay_ms: u64::try_from(delay.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX),
            target: target.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Accept either a single value or a list of values.
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::deserialize(deserializer).map(OneOrMany::into_vec)
}
