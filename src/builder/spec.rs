//! Nested, declarative state tree specifications.

use super::transition::{one_or_many, DelayedSpec, OneOrMany, TransitionSpec};
use crate::core::{Context, StateKind};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// One state of a nested specification.
///
/// Specs are plain data: they can be written with the fluent methods below
/// or deserialized from JSON using the same keys. When `type` is omitted a
/// state with children is compound and a state without is atomic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSpec {
    /// Explicit id; defaults to the dotted key path from the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<StateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<String>,
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub exit: Vec<String>,
    #[serde(deserialize_with = "transition_table", skip_serializing_if = "IndexMap::is_empty")]
    pub on: IndexMap<String, Vec<TransitionSpec>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<DelayedSpec>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub states: IndexMap<String, StateSpec>,
}

impl StateSpec {
    /// A state whose kind is inferred from its children.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atomic() -> Self {
        Self::of_kind(StateKind::Atomic)
    }

    /// A compound state that starts in `initial`.
    pub fn compound(initial: impl Into<String>) -> Self {
        Self::of_kind(StateKind::Compound).initial(initial)
    }

    pub fn parallel() -> Self {
        Self::of_kind(StateKind::Parallel)
    }

    pub fn final_state() -> Self {
        Self::of_kind(StateKind::Final)
    }

    fn of_kind(kind: StateKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.entry.push(action.into());
        self
    }

    pub fn exit(mut self, action: impl Into<String>) -> Self {
        self.exit.push(action.into());
        self
    }

    /// Add a candidate transition for `event`; later candidates are tried
    /// only when earlier guards fail.
    pub fn on(mut self, event: impl Into<String>, transition: TransitionSpec) -> Self {
        self.on.entry(event.into()).or_default().push(transition);
        self
    }

    /// Transition to `target` once this state has been active for `delay`.
    pub fn after(mut self, delay: Duration, target: impl Into<String>) -> Self {
        self.after.push(DelayedSpec::new(delay, target));
        self
    }

    /// Add a fully specified delayed transition.
    pub fn after_spec(mut self, delayed: DelayedSpec) -> Self {
        self.after.push(delayed);
        self
    }

    /// Add a child state under `key`. Children keep insertion order.
    pub fn state(mut self, key: impl Into<String>, child: StateSpec) -> Self {
        self.states.insert(key.into(), child);
        self
    }

    /// Kind as declared, or inferred from the presence of children.
    pub fn resolved_kind(&self) -> StateKind {
        self.kind.unwrap_or(if self.states.is_empty() {
            StateKind::Atomic
        } else {
            StateKind::Compound
        })
    }
}

/// A complete machine: root state, machine id and initial context.
///
/// ```rust
/// use pasture_sentinel::builder::{MachineSpec, StateSpec, TransitionSpec};
///
/// let definition = MachineSpec::new("door")
///     .initial("closed")
///     .state("closed", StateSpec::atomic().on("open", TransitionSpec::to("opened")))
///     .state("opened", StateSpec::atomic().on("close", TransitionSpec::to("closed")))
///     .build()
///     .unwrap();
///
/// assert_eq!(definition.id(), "door");
/// assert!(definition.lookup("door.opened").is_some());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
    #[serde(flatten)]
    pub root: StateSpec,
}

impl MachineSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: Context::new(),
            root: StateSpec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Make the root parallel instead of compound.
    pub fn parallel(mut self) -> Self {
        self.root.kind = Some(StateKind::Parallel);
        self
    }

    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.root = self.root.initial(key);
        self
    }

    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.root = self.root.entry(action);
        self
    }

    pub fn on(mut self, event: impl Into<String>, transition: TransitionSpec) -> Self {
        self.root = self.root.on(event, transition);
        self
    }

    pub fn state(mut self, key: impl Into<String>, child: StateSpec) -> Self {
        self.root = self.root.state(key, child);
        self
    }
}

fn transition_table<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, Vec<TransitionSpec>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, OneOrMany<TransitionSpec>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(event, candidates)| (event, candidates.into_vec()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_inferred_from_children() {
        assert_eq!(StateSpec::new().resolved_kind(), StateKind::Atomic);
        assert_eq!(
            StateSpec::new()
                .state("a", StateSpec::new())
                .resolved_kind(),
            StateKind::Compound
        );
        assert_eq!(StateSpec::parallel().resolved_kind(), StateKind::Parallel);
    }

    #[test]
    fn on_appends_candidates_in_order() {
        let spec = StateSpec::atomic()
            .on("go", TransitionSpec::to("a").guard("first"))
            .on("go", TransitionSpec::to("b"));

        let candidates = &spec.on["go"];
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].guard.as_deref(), Some("first"));
        assert_eq!(candidates[1].target.as_deref(), Some("b"));
    }

    #[test]
    fn children_keep_declaration_order() {
        let spec = StateSpec::parallel()
            .state("z", StateSpec::atomic())
            .state("a", StateSpec::atomic());
        let keys: Vec<_> = spec.states.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn parses_nested_json() {
        let spec = MachineSpec::from_json(
            r##"{
                "id": "pastureSentinel",
                "initial": "Undeployed",
                "context": { "battery": 100 },
                "states": {
                    "Undeployed": {
                        "initial": "Off",
                        "states": {
                            "Off": {
                                "entry": "logStateEntry",
                                "on": { "Start SOI": { "target": "Unconfigured", "actions": "onStartSOI" } }
                            },
                            "Unconfigured": {
                                "on": { "FlightPlan": "Configured" }
                            },
                            "Configured": {}
                        }
                    },
                    "Crashed": { "type": "final" }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(spec.id, "pastureSentinel");
        assert_eq!(spec.context.get_i64("battery"), Some(100));
        assert_eq!(spec.root.initial.as_deref(), Some("Undeployed"));
        let off = &spec.root.states["Undeployed"].states["Off"];
        assert_eq!(off.entry, vec!["logStateEntry"]);
        assert_eq!(
            off.on["Start SOI"],
            vec![TransitionSpec::to("Unconfigured").action("onStartSOI")]
        );
        assert_eq!(
            spec.root.states["Undeployed"].states["Unconfigured"].on["FlightPlan"],
            vec![TransitionSpec::to("Configured")]
        );
        assert_eq!(spec.root.states["Crashed"].resolved_kind(), StateKind::Final);
    }

    #[test]
    fn json_round_trip_preserves_spec() {
        let spec = MachineSpec::new("m")
            .initial("a")
            .state(
                "a",
                StateSpec::atomic()
                    .entry("enter")
                    .after(Duration::from_millis(500), "b")
                    .on("go", TransitionSpec::to("b").action("act")),
            )
            .state("b", StateSpec::final_state());

        let json = serde_json::to_string(&spec).unwrap();
        let back = MachineSpec::from_json(&json).unwrap();
        assert_eq!(back, spec);
    }
}
