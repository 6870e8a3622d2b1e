//! End-to-end scenarios for the pasture sentinel mission.

use parking_lot::Mutex;
use pasture_sentinel::checkpoint::Checkpoint;
use pasture_sentinel::interpreter::InterpreterOptions;
use pasture_sentinel::keyboard::KeyDispatcher;
use pasture_sentinel::mission::{self, signals, MissionVariant};
use pasture_sentinel::transport::decode_inbound;
use pasture_sentinel::{Delivery, Interpreter, SentinelConfig, Snapshot, Status};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn drone(variant: MissionVariant) -> Interpreter {
    let config = SentinelConfig {
        variant,
        ..SentinelConfig::default()
    };
    let drone = mission::interpreter(&config).unwrap();
    drone.start().unwrap();
    drone
}

fn value(drone: &Interpreter) -> Value {
    serde_json::to_value(drone.get_snapshot().value).unwrap()
}

fn send_all(drone: &Interpreter, signals: &[&str]) {
    for signal in signals {
        assert_eq!(drone.send(*signal).unwrap(), Delivery::Processed, "{signal}");
    }
}

fn deploy(drone: &Interpreter) {
    send_all(
        drone,
        &[
            signals::START_SOI,
            signals::FLIGHT_PLAN,
            signals::READY_FOR_MISSION,
            signals::START_SHEEP_GUARD_MISSION,
        ],
    );
}

fn record(drone: &Interpreter) -> Arc<Mutex<Vec<Snapshot>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    drone.subscribe(move |snapshot| sink.lock().push(snapshot));
    seen
}

#[test]
fn starts_undeployed_and_off() {
    for variant in [MissionVariant::EventDriven, MissionVariant::TimedEscalation] {
        let drone = drone(variant);
        assert_eq!(value(&drone), json!({ "Undeployed": "Off" }));
        assert_eq!(drone.status(), Status::Active);
        assert_eq!(drone.get_snapshot().context.get_i64("battery"), Some(100));
    }
}

#[test]
fn preparation_chain_reaches_deployed() {
    let drone = drone(MissionVariant::EventDriven);

    drone.send(signals::START_SOI).unwrap();
    assert_eq!(value(&drone), json!({ "Undeployed": "Unconfigured" }));

    drone.send(signals::FLIGHT_PLAN).unwrap();
    assert_eq!(value(&drone), json!({ "Undeployed": "Configured" }));

    drone.send(signals::READY_FOR_MISSION).unwrap();
    assert_eq!(value(&drone), json!({ "Undeployed": "Ready for Mission" }));

    drone.send(signals::START_SHEEP_GUARD_MISSION).unwrap();
    assert_eq!(
        value(&drone),
        json!({ "Deployed": { "Main": "Going to Safe Area", "Monitoring": "Mission Monitoring" } })
    );
    assert_eq!(drone.get_snapshot().main_state(), Some("Deployed"));
}

#[test]
fn signals_out_of_order_are_ignored() {
    let drone = drone(MissionVariant::EventDriven);
    let seen = record(&drone);

    for signal in [signals::FLIGHT_PLAN, signals::START_PATROLLING, "Take off"] {
        assert_eq!(drone.send(signal).unwrap(), Delivery::Ignored);
    }
    assert_eq!(value(&drone), json!({ "Undeployed": "Off" }));
    assert!(seen.lock().is_empty());
    assert!(drone.history().is_empty());
}

#[test]
fn failed_flight_plan_check_reenters_unconfigured() {
    let drone = drone(MissionVariant::EventDriven);
    drone.send(signals::START_SOI).unwrap();
    let seen = record(&drone);

    assert_eq!(
        drone.send(signals::FLIGHT_PLAN_CHECK_FAILED).unwrap(),
        Delivery::Processed
    );
    assert_eq!(value(&drone), json!({ "Undeployed": "Unconfigured" }));
    assert_eq!(seen.lock().len(), 1);

    let last = drone.history().last().cloned().unwrap();
    assert_eq!(last.event, signals::FLIGHT_PLAN_CHECK_FAILED);
    assert_eq!(last.from, last.to);
}

#[test]
fn patrolling_runs_three_regions_at_once() {
    let drone = drone(MissionVariant::EventDriven);
    deploy(&drone);
    drone.send(signals::START_PATROLLING).unwrap();

    assert_eq!(
        value(&drone),
        json!({
            "Deployed": {
                "Main": {
                    "Patrolling": {
                        "Perimeter": "Perimeter watch",
                        "Sheep": "Sheep Monitoring",
                        "Predator": "Predator Monitoring"
                    }
                },
                "Monitoring": "Mission Monitoring"
            }
        })
    );

    let snapshot = drone.get_snapshot();
    assert!(snapshot.matches("Deployed.Main.Patrolling.Perimeter.Perimeter watch"));
    assert!(snapshot.matches("Deployed.Main.Patrolling.Sheep.Sheep Monitoring"));
    assert!(snapshot.matches("Deployed.Monitoring.Mission Monitoring"));
    let mut substates = snapshot.substates();
    substates.sort_unstable();
    assert_eq!(
        substates,
        vec![
            "Mission Monitoring",
            "Perimeter watch",
            "Predator Monitoring",
            "Sheep Monitoring"
        ]
    );
}

#[test]
fn predator_detection_leaves_monitoring_alone() {
    let drone = drone(MissionVariant::EventDriven);
    deploy(&drone);
    drone.send(signals::START_PATROLLING).unwrap();
    drone.send(signals::PREDATOR_DETECTED).unwrap();

    assert_eq!(
        value(&drone),
        json!({
            "Deployed": {
                "Main": { "Predator Detected": "Predator tracking" },
                "Monitoring": "Mission Monitoring"
            }
        })
    );
    assert_eq!(drone.get_snapshot().context.get_bool("predatorDetected"), Some(true));
}

#[test]
fn event_driven_predator_cycle() {
    let drone = drone(MissionVariant::EventDriven);
    deploy(&drone);
    send_all(
        &drone,
        &[
            signals::START_PATROLLING,
            signals::PREDATOR_DETECTED,
            signals::PREDATOR_ENTERING_SAFE_AREA,
        ],
    );
    assert!(drone
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator counteraction"));

    drone.send(signals::PREDATOR_LEAVING_SAFE_AREA).unwrap();
    assert!(drone
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator tracking"));

    drone.send(signals::PREDATOR_LEAVING_TRACKING_PERIMETER).unwrap();
    let snapshot = drone.get_snapshot();
    assert!(snapshot.matches("Deployed.Main.Patrolling"));
    assert_eq!(snapshot.context.get_bool("predatorDetected"), Some(false));
    assert_eq!(drone.next_deadline(), None);
}

#[test]
fn crash_is_terminal_from_any_deployed_state() {
    let journeys: [&[&str]; 3] = [
        &[],
        &[signals::START_PATROLLING],
        &[
            signals::START_PATROLLING,
            signals::PREDATOR_DETECTED,
            signals::PREDATOR_ENTERING_SAFE_AREA,
        ],
    ];
    for journey in journeys {
        let drone = drone(MissionVariant::EventDriven);
        deploy(&drone);
        send_all(&drone, journey);
        let seen = record(&drone);

        drone.send(signals::CRASHED_DETECTED).unwrap();
        assert_eq!(value(&drone), json!("Crashed"));
        assert_eq!(drone.status(), Status::Done);
        assert!(drone.get_snapshot().is_done());

        for signal in signals::ALL {
            assert_eq!(drone.send(signal).unwrap(), Delivery::Rejected);
        }
        assert_eq!(value(&drone), json!("Crashed"));
        assert_eq!(seen.lock().len(), 1);
    }
}

#[test]
fn timed_variant_escalates_after_delay() {
    let drone = drone(MissionVariant::TimedEscalation);
    deploy(&drone);
    send_all(&drone, &[signals::START_PATROLLING, signals::PREDATOR_DETECTED]);
    assert_eq!(drone.next_deadline(), Some(Duration::from_millis(2000)));

    assert_eq!(drone.advance(Duration::from_millis(1999)).unwrap(), 0);
    assert!(drone
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator tracking"));

    assert_eq!(drone.advance(Duration::from_millis(1)).unwrap(), 1);
    assert!(drone
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator counteraction"));
    assert_eq!(drone.next_deadline(), None);

    drone.send(signals::PREDATOR_LEAVING_SAFE_AREA).unwrap();
    assert!(drone.get_snapshot().matches("Deployed.Main.Patrolling"));
}

#[test]
fn leaving_tracking_cancels_escalation() {
    let drone = drone(MissionVariant::EventDriven);
    deploy(&drone);
    send_all(&drone, &[signals::START_PATROLLING, signals::PREDATOR_DETECTED]);
    assert_eq!(drone.next_deadline(), None);

    let drone = self::drone(MissionVariant::TimedEscalation);
    deploy(&drone);
    send_all(
        &drone,
        &[
            signals::START_PATROLLING,
            signals::PREDATOR_DETECTED,
            signals::PREDATOR_ENTERING_SAFE_AREA,
        ],
    );
    assert_eq!(drone.next_deadline(), None);
    assert_eq!(drone.advance(Duration::from_secs(10)).unwrap(), 0);
    assert!(drone
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator counteraction"));
}

#[test]
fn timed_variant_repoints_monitoring_region() {
    let drone = drone(MissionVariant::TimedEscalation);
    deploy(&drone);
    send_all(&drone, &[signals::START_PATROLLING, signals::PREDATOR_DETECTED]);
    drone.advance(Duration::from_millis(500)).unwrap();

    drone.send(signals::PREDATOR_LEAVING_TRACKING_PERIMETER).unwrap();
    let snapshot = drone.get_snapshot();
    assert_eq!(
        serde_json::to_value(&snapshot.value).unwrap(),
        json!({
            "Deployed": {
                "Main": { "Predator Detected": "Predator tracking" },
                "Monitoring": "Mission Monitoring"
            }
        })
    );
    assert_eq!(snapshot.context.get_bool("predatorDetected"), Some(false));

    // tracking was never exited, so its timer keeps its original deadline
    assert_eq!(drone.next_deadline(), Some(Duration::from_millis(1500)));
    assert_eq!(drone.advance(Duration::from_millis(1500)).unwrap(), 1);
    assert!(drone
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator counteraction"));
}

#[test]
fn keyboard_follows_live_state() {
    let drone = drone(MissionVariant::EventDriven);
    let keys = KeyDispatcher::mission();

    assert_eq!(keys.dispatch(&drone, '5').unwrap(), None);
    assert_eq!(keys.dispatch(&drone, '1').unwrap(), Some(Delivery::Processed));
    assert_eq!(keys.dispatch(&drone, '1').unwrap(), None);
    for key in ['2', '3', '4'] {
        assert_eq!(keys.dispatch(&drone, key).unwrap(), Some(Delivery::Processed));
    }
    assert_eq!(drone.get_snapshot().main_state(), Some("Deployed"));

    assert_eq!(keys.dispatch(&drone, '2').unwrap(), None);
    assert_eq!(keys.dispatch(&drone, '5').unwrap(), Some(Delivery::Processed));
    assert_eq!(keys.dispatch(&drone, '6').unwrap(), Some(Delivery::Processed));
    assert!(drone.get_snapshot().matches("Deployed.Main.Predator Detected"));
}

#[test]
fn transport_frames_drive_the_mission() {
    let drone = drone(MissionVariant::EventDriven);
    let frames = [
        r#"{ "signal": "Start SOI" }"#,
        r#"{ "battery": 12 }"#,
        r#"{ "type": "FlightPlan" }"#,
        "garbage",
        r#""Ready for mission""#,
    ];
    for frame in frames {
        if let Some(signal) = decode_inbound(frame) {
            drone.send(signal).unwrap();
        }
    }
    assert_eq!(value(&drone), json!({ "Undeployed": "Ready for Mission" }));
    assert_eq!(drone.history().len(), 3);
}

#[test]
fn checkpoint_resumes_mid_mission() {
    let original = drone(MissionVariant::TimedEscalation);
    deploy(&original);
    send_all(&original, &[signals::START_PATROLLING, signals::PREDATOR_DETECTED]);

    let json = original.checkpoint().to_json().unwrap();
    let checkpoint = Checkpoint::from_json(&json).unwrap();
    let restored = Interpreter::restore(
        mission::timed_escalation(mission::DEFAULT_ESCALATION).unwrap(),
        mission::default_actions(),
        checkpoint,
        InterpreterOptions::default(),
    )
    .unwrap();

    assert!(restored.is_running());
    assert_eq!(restored.get_snapshot(), original.get_snapshot());
    assert_eq!(restored.history(), original.history());
    assert_eq!(restored.next_deadline(), Some(mission::DEFAULT_ESCALATION));

    restored.advance(mission::DEFAULT_ESCALATION).unwrap();
    assert!(restored
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator counteraction"));
    assert!(original
        .get_snapshot()
        .matches("Deployed.Main.Predator Detected.Predator tracking"));
}

#[test]
fn checkpoint_of_other_variant_shape_still_restores() {
    let original = drone(MissionVariant::EventDriven);
    deploy(&original);
    let checkpoint = original.checkpoint();

    let restored = Interpreter::restore(
        mission::timed_escalation(Duration::from_millis(100)).unwrap(),
        mission::default_actions(),
        checkpoint,
        InterpreterOptions::default(),
    )
    .unwrap();
    assert_eq!(restored.get_snapshot().main_state(), Some("Deployed"));
    assert_eq!(restored.send(signals::START_PATROLLING).unwrap(), Delivery::Processed);
}

#[test]
fn stop_publishes_once_and_detaches() {
    let drone = drone(MissionVariant::EventDriven);
    let seen = record(&drone);
    drone.send(signals::START_SOI).unwrap();

    drone.stop();
    drone.stop();
    assert_eq!(drone.status(), Status::Stopped);
    assert_eq!(drone.subscriber_count(), 0);
    assert_eq!(drone.send(signals::FLIGHT_PLAN).unwrap(), Delivery::Rejected);

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].status, Status::Stopped);
    assert!(seen[1].matches("Undeployed.Unconfigured"));
}
