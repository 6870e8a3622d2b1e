//! The pasture sentinel drone mission.
//!
//! Two variants share one state tree. The event-driven variant is the
//! reference: predator tracking is driven entirely by signals. The timed
//! variant escalates from tracking to counteraction on its own after a
//! delay, and reroutes two exits out of the predator states.
//!
//! ```rust
//! use pasture_sentinel::mission::{self, signals};
//!
//! let drone = mission::interpreter(&Default::default()).unwrap();
//! drone.start().unwrap();
//! drone.send(signals::START_SOI).unwrap();
//! assert!(drone.get_snapshot().matches("Undeployed.Unconfigured"));
//! ```

pub mod actions;
pub mod signals;

pub use actions::default_actions;

use crate::builder::{DefinitionError, DelayedSpec, MachineSpec, StateSpec, TransitionSpec};
use crate::config::SentinelConfig;
use crate::core::{Context, MachineDefinition};
use crate::interpreter::{Interpreter, InterpreterOptions};
use actions::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Id of the mission's root state.
pub const MACHINE_ID: &str = "pastureSentinel";

/// Delay before the timed variant escalates to counteraction.
pub const DEFAULT_ESCALATION: Duration = Duration::from_millis(2000);

/// Which flavour of the mission to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum MissionVariant {
    #[default]
    EventDriven,
    TimedEscalation,
}

impl fmt::Display for MissionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventDriven => f.write_str("event_driven"),
            Self::TimedEscalation => f.write_str("timed_escalation"),
        }
    }
}

impl FromStr for MissionVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "event_driven" => Ok(Self::EventDriven),
            "timed_escalation" => Ok(Self::TimedEscalation),
            other => Err(format!("unknown mission variant '{other}'")),
        }
    }
}

/// Context every mission starts with.
pub fn initial_context() -> Context {
    Context::new()
        .with("battery", 100)
        .with("sheepCount", 5)
        .with(PREDATOR_DETECTED_KEY, false)
        .with("connectionStatus", "disconnected")
}

fn step(target: &str, action: &str) -> TransitionSpec {
    TransitionSpec::to(target).action(action)
}

fn watched(initial: &str) -> StateSpec {
    StateSpec::compound(initial).state(initial, StateSpec::atomic().entry(LOG_STATE_ENTRY))
}

fn undeployed() -> StateSpec {
    StateSpec::compound("Off")
        .state(
            "Off",
            StateSpec::atomic()
                .entry(LOG_STATE_ENTRY)
                .on(signals::START_SOI, step("Unconfigured", ON_START_SOI)),
        )
        .state(
            "Unconfigured",
            StateSpec::atomic()
                .entry(LOG_STATE_ENTRY)
                .on(signals::FLIGHT_PLAN, step("Configured", ON_FLIGHT_PLAN_RECEIVED))
                .on(
                    signals::FLIGHT_PLAN_CHECK_FAILED,
                    step("Unconfigured", ON_FLIGHT_PLAN_FAILED),
                ),
        )
        .state(
            "Configured",
            StateSpec::atomic()
                .entry(LOG_STATE_ENTRY)
                .on(signals::READY_FOR_MISSION, step("Ready for Mission", ON_READY_FOR_MISSION)),
        )
        .state(
            "Ready for Mission",
            StateSpec::atomic().entry(LOG_STATE_ENTRY).on(
                signals::START_SHEEP_GUARD_MISSION,
                step("#pastureSentinel.Deployed", ON_MISSION_START),
            ),
        )
}

fn predator_detected(variant: MissionVariant, escalation: Duration) -> StateSpec {
    let mut tracking = StateSpec::atomic().entry(LOG_STATE_ENTRY).on(
        signals::PREDATOR_ENTERING_SAFE_AREA,
        step("Predator counteraction", ON_PREDATOR_ENTERING_SAFE_AREA),
    );
    let mut counteraction = StateSpec::atomic().entry(LOG_STATE_ENTRY);

    match variant {
        MissionVariant::EventDriven => {
            counteraction = counteraction.on(
                signals::PREDATOR_LEAVING_SAFE_AREA,
                step("Predator tracking", ON_PREDATOR_LEAVING_SAFE_AREA),
            );
        }
        MissionVariant::TimedEscalation => {
            tracking = tracking
                .after_spec(
                    DelayedSpec::new(escalation, "Predator counteraction")
                        .action(ON_START_COUNTER_ACTION),
                )
                .on(
                    signals::PREDATOR_LEAVING_TRACKING_PERIMETER,
                    step(
                        "#pastureSentinel.Deployed.Monitoring",
                        ON_PREDATOR_LEAVING_PERIMETER,
                    ),
                );
            counteraction = counteraction.on(
                signals::PREDATOR_LEAVING_SAFE_AREA,
                step(
                    "#pastureSentinel.Deployed.Main.Patrolling",
                    ON_PREDATOR_LEAVING_SAFE_AREA,
                ),
            );
        }
    }

    StateSpec::compound("Predator tracking")
        .entry(LOG_STATE_ENTRY)
        .on(
            signals::PREDATOR_LEAVING_TRACKING_PERIMETER,
            step("Patrolling", ON_PREDATOR_LEAVING_PERIMETER),
        )
        .state("Predator tracking", tracking)
        .state("Predator counteraction", counteraction)
}

fn deployed(variant: MissionVariant, escalation: Duration) -> StateSpec {
    let patrolling = StateSpec::parallel()
        .entry(LOG_STATE_ENTRY)
        .on(signals::PREDATOR_DETECTED, step("Predator Detected", ON_PREDATOR_DETECTED))
        .state("Perimeter", watched("Perimeter watch"))
        .state("Sheep", watched("Sheep Monitoring"))
        .state("Predator", watched("Predator Monitoring"));

    let main = StateSpec::compound("Going to Safe Area")
        .state(
            "Going to Safe Area",
            StateSpec::atomic()
                .entry(LOG_STATE_ENTRY)
                .on(signals::START_PATROLLING, step("Patrolling", ON_START_PATROLLING)),
        )
        .state("Patrolling", patrolling)
        .state("Predator Detected", predator_detected(variant, escalation));

    StateSpec::parallel()
        .entry(ON_DEPLOYED)
        .on(signals::CRASHED_DETECTED, step("Crashed", ON_CRASHED))
        .state("Main", main)
        .state("Monitoring", watched("Mission Monitoring"))
}

/// Declarative state tree of the mission.
pub fn spec(variant: MissionVariant, escalation: Duration) -> MachineSpec {
    MachineSpec::new(MACHINE_ID)
        .context(initial_context())
        .initial("Undeployed")
        .state("Undeployed", undeployed())
        .state("Deployed", deployed(variant, escalation))
        .state("Crashed", StateSpec::final_state().entry(LOG_STATE_ENTRY))
}

/// The reference, purely signal-driven mission.
pub fn event_driven() -> Result<MachineDefinition, DefinitionError> {
    spec(MissionVariant::EventDriven, DEFAULT_ESCALATION).build()
}

/// The mission with automatic escalation after `escalation`.
pub fn timed_escalation(escalation: Duration) -> Result<MachineDefinition, DefinitionError> {
    spec(MissionVariant::TimedEscalation, escalation).build()
}

/// An unstarted interpreter for the mission described by `config`, with
/// the default actions.
pub fn interpreter(config: &SentinelConfig) -> Result<Interpreter, DefinitionError> {
    let definition = spec(config.variant, config.escalation()).build()?;
    info!(variant = %config.variant, "building mission interpreter");
    Interpreter::with_options(
        definition,
        default_actions(),
        InterpreterOptions {
            history_limit: config.history_limit,
        },
    )
}
