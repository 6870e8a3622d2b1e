//! Inbound messages from the remote signal transport.
//!
//! The transport itself (socket, retries on the wire) lives with the host.
//! This module decides what an inbound frame means and when to reconnect.

use crate::config::TransportConfig;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Deserialize)]
struct Inbound {
    signal: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<Value>,
}

/// Extract the signal carried by an inbound frame.
///
/// Accepted shapes are `{ "signal": "..." }`, `{ "type": "..." }` (when
/// both are present `signal` wins) and a bare JSON string. Anything else is
/// logged and dropped, and never reaches the interpreter.
///
/// ```rust
/// use pasture_sentinel::transport::decode_inbound;
///
/// assert_eq!(decode_inbound(r#"{ "signal": "Start SOI" }"#).as_deref(), Some("Start SOI"));
/// assert_eq!(decode_inbound(r#"{ "type": "FlightPlan" }"#).as_deref(), Some("FlightPlan"));
/// assert_eq!(decode_inbound(r#"{ "battery": 40 }"#), None);
/// ```
pub fn decode_inbound(frame: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(frame) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, frame, "dropping unparseable transport message");
            return None;
        }
    };

    let signal = match value {
        Value::String(signal) => Some(signal),
        Value::Object(_) => match serde_json::from_value::<Inbound>(value) {
            Ok(inbound) => non_empty(inbound.signal).or_else(|| non_empty(inbound.kind)),
            Err(_) => None,
        },
        _ => None,
    }
    .filter(|signal| !signal.trim().is_empty());

    if signal.is_none() {
        warn!(frame, "dropping transport message without a signal");
    }
    signal
}

fn non_empty(field: Option<Value>) -> Option<String> {
    match field {
        Some(Value::String(signal)) if !signal.trim().is_empty() => Some(signal),
        _ => None,
    }
}

/// Connection status reported to observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// Value stored under `connectionStatus` in the mission context.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

/// Fixed-interval reconnection with a bounded number of attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A connection succeeded; the attempt budget starts over.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    /// The connection closed. Returns the delay before the next attempt, or
    /// `None` once the budget is spent.
    pub fn on_disconnected(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            warn!(max_attempts = self.max_attempts, "max reconnection attempts reached");
            return None;
        }
        self.attempts += 1;
        info!(attempt = self.attempts, max_attempts = self.max_attempts, "reconnecting");
        Some(self.interval)
    }
}

impl From<&TransportConfig> for ReconnectPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_interval_ms),
            config.max_reconnect_attempts,
        )
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_wins_over_type() {
        let frame = r#"{ "type": "FlightPlan", "signal": "Start SOI" }"#;
        assert_eq!(decode_inbound(frame).as_deref(), Some("Start SOI"));
    }

    #[test]
    fn falls_back_to_type_when_signal_is_empty() {
        let frame = r#"{ "signal": "", "type": "Crashed Detected" }"#;
        assert_eq!(decode_inbound(frame).as_deref(), Some("Crashed Detected"));
    }

    #[test]
    fn bare_string_is_a_signal() {
        assert_eq!(decode_inbound(r#""Start Patrolling""#).as_deref(), Some("Start Patrolling"));
    }

    #[test]
    fn malformed_frames_are_dropped() {
        for frame in ["", "not json", "42", "[]", "{}", r#"{ "signal": 7 }"#, r#""  ""#] {
            assert_eq!(decode_inbound(frame), None, "frame {frame:?}");
        }
    }

    #[test]
    fn reconnect_budget_is_bounded_and_resets() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(3000), 2);
        assert_eq!(policy.on_disconnected(), Some(Duration::from_millis(3000)));
        assert_eq!(policy.on_disconnected(), Some(Duration::from_millis(3000)));
        assert_eq!(policy.on_disconnected(), None);
        assert_eq!(policy.attempts(), 2);

        policy.on_connected();
        assert_eq!(policy.attempts(), 0);
        assert!(policy.on_disconnected().is_some());
    }

    #[test]
    fn default_policy_follows_transport_defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy, ReconnectPolicy::new(Duration::from_secs(3), 5));
    }

    #[test]
    fn status_strings() {
        assert_eq!(ConnectionStatus::Connected.as_str(), "connected");
        assert_eq!(ConnectionStatus::Disconnected.as_str(), "disconnected");
    }
}
