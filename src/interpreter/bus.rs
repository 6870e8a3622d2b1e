//! Snapshot observers.

use super::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

pub(crate) type Listener = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Observers in registration order.
///
/// Notification works on a copy of the list taken before the first
/// callback runs, so subscribing or unsubscribing from inside a callback
/// takes effect from the next notification.
#[derive(Default)]
pub(crate) struct SubscriptionBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl SubscriptionBus {
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// Deliver `snapshot` to every listener in order, each with its own copy.
pub(crate) fn notify(listeners: &[Listener], snapshot: &Snapshot) {
    for listener in listeners {
        listener(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Context, StateValue};
    use crate::interpreter::Status;
    use parking_lot::Mutex;

    fn snapshot() -> Snapshot {
        Snapshot {
            value: StateValue::leaf("Off"),
            context: Context::new(),
            status: Status::Active,
        }
    }

    #[test]
    fn notifies_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = SubscriptionBus::default();
        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(Arc::new(move |_: Snapshot| seen.lock().push(name)));
        }

        notify(&bus.listeners(), &snapshot());
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let mut bus = SubscriptionBus::default();
        let a = bus.subscribe(Arc::new(|_: Snapshot| {}));
        let b = bus.subscribe(Arc::new(|_: Snapshot| {}));
        assert_ne!(a, b);

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.len(), 1);
    }
}
