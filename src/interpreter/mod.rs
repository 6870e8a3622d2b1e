//! The statechart runtime.
//!
//! An [`Interpreter`] owns one live configuration of a
//! [`MachineDefinition`]. Signals are processed one macrostep at a time:
//! a `send` that arrives while a step is running (from an action, a
//! subscriber, or another thread) is queued and handled after the current
//! step and its notifications complete.
//!
//! No lock is held while actions or subscribers run, so both may call back
//! into the interpreter freely.
//!
//! # Example
//!
//! ```rust
//! use pasture_sentinel::builder::{MachineSpec, StateSpec, TransitionSpec};
//! use pasture_sentinel::interpreter::{ActionRegistry, Delivery, Interpreter};
//!
//! let definition = MachineSpec::new("door")
//!     .initial("closed")
//!     .state("closed", StateSpec::atomic().on("open", TransitionSpec::to("opened")))
//!     .state("opened", StateSpec::atomic())
//!     .build()
//!     .unwrap();
//!
//! let door = Interpreter::new(definition, ActionRegistry::new()).unwrap();
//! door.start().unwrap();
//!
//! assert_eq!(door.send("open").unwrap(), Delivery::Processed);
//! assert!(door.get_snapshot().matches("opened"));
//! assert_eq!(door.send("knock").unwrap(), Delivery::Ignored);
//! ```

pub mod action;
mod bus;
pub mod error;
pub mod snapshot;
mod step;
mod timers;

pub use action::{ActionContext, ActionFn, ActionRegistry};
pub use bus::SubscriptionId;
pub use error::{ActionError, InterpreterError};
pub use snapshot::{Snapshot, Status};

use crate::builder::DefinitionError;
use crate::core::{Configuration, Context, MachineDefinition, StepHistory, StepRecord};
use bus::{Listener, SubscriptionBus};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use step::Microstep;
use timers::{TimerKey, TimerQueue};
use tracing::{debug, error, info, warn};

/// Event name seen by entry actions run from [`Interpreter::start`].
pub const INIT_EVENT: &str = "init";

/// Tunables for one interpreter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterOptions {
    /// Maximum number of macrosteps kept in the history; `None` keeps all.
    pub history_limit: Option<usize>,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            history_limit: Some(256),
        }
    }
}

/// What happened to a signal passed to [`Interpreter::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// A macrostep ran and a snapshot was published.
    Processed,
    /// No active state handles the signal; nothing changed.
    Ignored,
    /// A step was in progress; the signal will be processed after it.
    Queued,
    /// The interpreter is not running.
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Signal {
    Event(String),
    Timer { key: TimerKey, generation: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    NotStarted,
    Running,
    Done,
    Stopped,
}

impl Lifecycle {
    /// Lifecycle a restored interpreter resumes in.
    pub(crate) fn resumed(status: Status) -> Self {
        match status {
            Status::Active => Lifecycle::Running,
            Status::Done => Lifecycle::Done,
            Status::Stopped => Lifecycle::Stopped,
        }
    }

    fn status(self) -> Status {
        match self {
            Lifecycle::NotStarted | Lifecycle::Running => Status::Active,
            Lifecycle::Done => Status::Done,
            Lifecycle::Stopped => Status::Stopped,
        }
    }
}

struct Runtime {
    lifecycle: Lifecycle,
    configuration: Configuration,
    context: Context,
    history: StepHistory,
    timers: TimerQueue,
    snapshot: Snapshot,
}

/// Final notification of a `stop` that arrived during a step.
type StopNotice = (Vec<Listener>, Snapshot);

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Signal>,
    busy: bool,
    /// Published by the drainer once the current pass has finished.
    pending_stop: Option<StopNotice>,
}

struct Inner {
    definition: Arc<MachineDefinition>,
    registry: ActionRegistry,
    runtime: Mutex<Runtime>,
    mailbox: Mutex<Mailbox>,
    bus: Mutex<SubscriptionBus>,
}

/// State restored from a checkpoint.
pub(crate) struct Resumed {
    pub lifecycle: Lifecycle,
    pub configuration: Configuration,
    pub context: Context,
    pub history: StepHistory,
}

/// A running statechart.
///
/// Cloning an interpreter yields another handle to the same instance.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

impl Interpreter {
    /// Create an interpreter, checking that `registry` provides every action
    /// and guard the definition names.
    pub fn new(
        definition: impl Into<Arc<MachineDefinition>>,
        registry: ActionRegistry,
    ) -> Result<Self, DefinitionError> {
        Self::with_options(definition, registry, InterpreterOptions::default())
    }

    pub fn with_options(
        definition: impl Into<Arc<MachineDefinition>>,
        registry: ActionRegistry,
        options: InterpreterOptions,
    ) -> Result<Self, DefinitionError> {
        let definition = definition.into();
        let configuration = Configuration::initial(&definition);
        let context = definition.initial_context().clone();
        Self::assemble(
            definition,
            registry,
            &options,
            Resumed {
                lifecycle: Lifecycle::NotStarted,
                configuration,
                context,
                history: StepHistory::new(),
            },
        )
    }

    pub(crate) fn assemble(
        definition: Arc<MachineDefinition>,
        registry: ActionRegistry,
        options: &InterpreterOptions,
        resumed: Resumed,
    ) -> Result<Self, DefinitionError> {
        registry.validate(&definition)?;

        let history = match options.history_limit {
            Some(limit) => {
                let mut history = StepHistory::bounded(limit);
                for record in resumed.history.records() {
                    history.push(record.clone());
                }
                history
            }
            None => resumed.history,
        };
        let mut timers = TimerQueue::new();
        if resumed.lifecycle == Lifecycle::Running {
            arm_entered(&definition, &mut timers, resumed.configuration.iter());
        }
        let snapshot = Snapshot {
            value: resumed.configuration.value(&definition),
            context: resumed.context.clone(),
            status: resumed.lifecycle.status(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                definition,
                registry,
                runtime: Mutex::new(Runtime {
                    lifecycle: resumed.lifecycle,
                    configuration: resumed.configuration,
                    context: resumed.context,
                    history,
                    timers,
                    snapshot,
                }),
                mailbox: Mutex::new(Mailbox::default()),
                bus: Mutex::new(SubscriptionBus::default()),
            }),
        })
    }

    pub fn definition(&self) -> &MachineDefinition {
        &self.inner.definition
    }

    /// Enter the initial configuration, run its entry actions and publish
    /// the first snapshot.
    ///
    /// Fails with [`InterpreterError::AlreadyStarted`] on every call after
    /// the first, including after `stop`.
    pub fn start(&self) -> Result<(), InterpreterError> {
        {
            let mut runtime = self.inner.runtime.lock();
            if runtime.lifecycle != Lifecycle::NotStarted {
                return Err(InterpreterError::AlreadyStarted);
            }
            runtime.lifecycle = Lifecycle::Running;
            self.inner.mailbox.lock().busy = true;
        }
        info!(machine = %self.inner.definition.id(), "starting interpreter");

        let definition = &self.inner.definition;
        let entered = step::enter_initial(
            definition,
            &self.inner.registry,
            definition.initial_context(),
            INIT_EVENT,
        );
        let microstep = match entered {
            Ok(microstep) => microstep,
            Err(err) => {
                error!(%err, "initial entry failed");
                let stopped = {
                    let mut runtime = self.inner.runtime.lock();
                    if runtime.lifecycle == Lifecycle::Running {
                        runtime.lifecycle = Lifecycle::NotStarted;
                    }
                    let mut mailbox = self.inner.mailbox.lock();
                    mailbox.queue.clear();
                    mailbox.busy = false;
                    mailbox.pending_stop.take()
                };
                if let Some((listeners, snapshot)) = stopped {
                    bus::notify(&listeners, &snapshot);
                }
                return Err(err);
            }
        };

        if let Some((listeners, snapshot)) = self.commit(INIT_EVENT, microstep, None, false) {
            bus::notify(&listeners, &snapshot);
        }
        self.drain().map(|_| ())
    }

    /// Deliver `event`.
    ///
    /// Signals that no active state handles are ignored without publishing a
    /// snapshot. After `stop` or once the machine is done every signal is
    /// rejected. An action failure aborts the step, leaves the interpreter
    /// as it was, and is returned here.
    pub fn send(&self, event: impl Into<String>) -> Result<Delivery, InterpreterError> {
        self.deliver(Signal::Event(event.into()))
    }

    /// Halt the interpreter: cancel timers and queued signals, publish a
    /// final `stopped` snapshot and detach every subscriber.
    ///
    /// A machine that already reached its final state keeps status `done`;
    /// its subscribers are detached without another notification.
    ///
    /// When called while a step or its notification pass is running, whether
    /// from inside a callback or from another thread, the `stopped` snapshot
    /// is published once that pass completes and is the last one subscribers
    /// see.
    pub fn stop(&self) {
        let (listeners, snapshot) = {
            let mut runtime = self.inner.runtime.lock();
            let previous = runtime.lifecycle;
            if previous == Lifecycle::Stopped {
                return;
            }
            runtime.timers.clear();
            let mut mailbox = self.inner.mailbox.lock();
            mailbox.queue.clear();
            let listeners = {
                let mut bus = self.inner.bus.lock();
                let listeners = bus.listeners();
                bus.clear();
                listeners
            };
            if previous == Lifecycle::Done {
                return;
            }
            runtime.lifecycle = Lifecycle::Stopped;
            runtime.snapshot.status = Status::Stopped;
            info!(machine = %self.inner.definition.id(), "interpreter stopped");
            if mailbox.busy {
                debug!("step in progress; final snapshot deferred");
                mailbox.pending_stop = Some((listeners, runtime.snapshot.clone()));
                return;
            }
            (listeners, runtime.snapshot.clone())
        };
        bus::notify(&listeners, &snapshot);
    }

    /// The most recently published snapshot.
    ///
    /// Before `start` this describes the initial configuration without any
    /// entry actions applied.
    pub fn get_snapshot(&self) -> Snapshot {
        self.inner.runtime.lock().snapshot.clone()
    }

    pub fn status(&self) -> Status {
        self.inner.runtime.lock().snapshot.status
    }

    pub fn is_running(&self) -> bool {
        self.inner.runtime.lock().lifecycle == Lifecycle::Running
    }

    /// Whether sending `event` now would take at least one transition.
    pub fn can(&self, event: &str) -> bool {
        let runtime = self.inner.runtime.lock();
        if runtime.lifecycle != Lifecycle::Running {
            return false;
        }
        !step::select_transitions(
            &self.inner.definition,
            &self.inner.registry,
            &runtime.configuration,
            &runtime.context,
            event,
        )
        .is_empty()
    }

    /// Register a callback for every snapshot published from now on.
    ///
    /// After `stop` nothing is registered.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(Snapshot) + Send + Sync + 'static,
    {
        let runtime = self.inner.runtime.lock();
        let mut bus = self.inner.bus.lock();
        let id = bus.subscribe(Arc::new(listener));
        if runtime.lifecycle == Lifecycle::Stopped {
            bus.unsubscribe(id);
        }
        id
    }

    /// Remove a subscriber; returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.lock().unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.lock().len()
    }

    /// Move the logical clock forward by `by`, taking every delayed
    /// transition that falls due, in deadline order.
    ///
    /// Returns how many timers fired.
    pub fn advance(&self, by: Duration) -> Result<usize, InterpreterError> {
        let until = {
            let runtime = self.inner.runtime.lock();
            if runtime.lifecycle != Lifecycle::Running {
                return Ok(0);
            }
            runtime.timers.now() + by
        };

        let mut fired = 0;
        loop {
            let due = {
                let mut runtime = self.inner.runtime.lock();
                if runtime.lifecycle != Lifecycle::Running {
                    break;
                }
                runtime.timers.pop_due(until)
            };
            let Some((key, generation)) = due else {
                break;
            };
            fired += 1;
            self.deliver(Signal::Timer { key, generation })?;
        }

        self.inner.runtime.lock().timers.settle(until);
        Ok(fired)
    }

    /// Time until the next delayed transition, if one is armed.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.runtime.lock().timers.next_deadline()
    }

    /// Current reading of the logical clock.
    pub fn now(&self) -> Duration {
        self.inner.runtime.lock().timers.now()
    }

    pub fn history(&self) -> StepHistory {
        self.inner.runtime.lock().history.clone()
    }

    pub fn configuration(&self) -> Configuration {
        self.inner.runtime.lock().configuration.clone()
    }

    /// Snapshot and history read under one lock.
    pub(crate) fn capture(&self) -> (Snapshot, StepHistory) {
        let runtime = self.inner.runtime.lock();
        (runtime.snapshot.clone(), runtime.history.clone())
    }

    fn deliver(&self, signal: Signal) -> Result<Delivery, InterpreterError> {
        if !self.is_running() {
            warn!(signal = ?signal, "interpreter is not running; signal rejected");
            return Ok(Delivery::Rejected);
        }
        {
            let mut mailbox = self.inner.mailbox.lock();
            mailbox.queue.push_back(signal);
            if mailbox.busy {
                return Ok(Delivery::Queued);
            }
            mailbox.busy = true;
        }
        self.drain()
    }

    /// Process queued signals until the queue is empty.
    ///
    /// Reports the outcome of the first signal, or the first error.
    fn drain(&self) -> Result<Delivery, InterpreterError> {
        let mut first = None;
        let mut failure = None;
        let mut stopped = None;
        loop {
            let signal = {
                let mut mailbox = self.inner.mailbox.lock();
                match mailbox.queue.pop_front() {
                    Some(signal) => signal,
                    None => {
                        mailbox.busy = false;
                        stopped = mailbox.pending_stop.take();
                        break;
                    }
                }
            };
            match self.process(signal) {
                Ok(delivery) => {
                    first.get_or_insert(delivery);
                }
                Err(err) => {
                    first.get_or_insert(Delivery::Rejected);
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some((listeners, snapshot)) = stopped {
            bus::notify(&listeners, &snapshot);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(first.unwrap_or(Delivery::Ignored)),
        }
    }

    fn process(&self, signal: Signal) -> Result<Delivery, InterpreterError> {
        let definition = &self.inner.definition;
        let (configuration, context) = {
            let runtime = self.inner.runtime.lock();
            if runtime.lifecycle != Lifecycle::Running {
                return Ok(Delivery::Rejected);
            }
            if let Signal::Timer { key, generation } = &signal {
                if !runtime.timers.is_current(*key, *generation) {
                    debug!(state = %definition.node(key.state).id, "stale timer ignored");
                    return Ok(Delivery::Ignored);
                }
            }
            (runtime.configuration.clone(), runtime.context.clone())
        };

        let (event, transitions, fired) = match &signal {
            Signal::Event(name) => {
                let transitions = step::select_transitions(
                    definition,
                    &self.inner.registry,
                    &configuration,
                    &context,
                    name,
                );
                (name.as_str(), transitions, None)
            }
            Signal::Timer { key, generation } => {
                let Some(delayed) = definition.node(key.state).delayed.get(key.index) else {
                    return Ok(Delivery::Ignored);
                };
                let transition = &delayed.transition;
                (transition.event.as_str(), vec![transition], Some((*key, *generation)))
            }
        };

        if transitions.is_empty() {
            debug!(event, "no enabled transition");
            return Ok(Delivery::Ignored);
        }

        let executed = step::execute(
            definition,
            &self.inner.registry,
            &configuration,
            &context,
            &transitions,
            event,
        );
        match executed {
            Ok(microstep) => {
                let fired = fired.map(|(key, _)| key);
                match self.commit(event, microstep, fired, true) {
                    Some((listeners, snapshot)) => {
                        bus::notify(&listeners, &snapshot);
                        Ok(Delivery::Processed)
                    }
                    None => Ok(Delivery::Rejected),
                }
            }
            Err(err) => {
                error!(%err, event, "macrostep aborted");
                if let Some((key, generation)) = fired {
                    self.inner.runtime.lock().timers.rearm_fired(key, generation);
                }
                Err(err)
            }
        }
    }

    /// Apply a successful microstep and return what to notify.
    ///
    /// Nothing is applied if the interpreter was stopped while the step ran.
    fn commit(
        &self,
        event: &str,
        microstep: Microstep,
        fired: Option<TimerKey>,
        record: bool,
    ) -> Option<(Vec<Listener>, Snapshot)> {
        let definition = &self.inner.definition;
        let mut runtime = self.inner.runtime.lock();
        if runtime.lifecycle != Lifecycle::Running {
            debug!(event, "interpreter halted during step; result discarded");
            return None;
        }

        let Microstep {
            configuration,
            context,
            exited,
            entered,
            raised,
        } = microstep;

        if let Some(key) = fired {
            runtime.timers.remove(key);
        }
        for node in exited {
            runtime.timers.disarm_state(node);
        }
        arm_entered(definition, &mut runtime.timers, entered.into_iter());

        let done = configuration.is_in_final(definition, definition.root());
        if done {
            runtime.lifecycle = Lifecycle::Done;
            runtime.timers.clear();
        }

        let value = configuration.value(definition);
        if record {
            let step = StepRecord {
                event: event.to_string(),
                from: runtime.snapshot.value.clone(),
                to: value.clone(),
                timestamp: Utc::now(),
            };
            runtime.history.push(step);
        }
        runtime.configuration = configuration;
        runtime.context = context;
        runtime.snapshot = Snapshot {
            value,
            context: runtime.context.clone(),
            status: runtime.lifecycle.status(),
        };
        info!(event, value = ?runtime.snapshot.value, status = ?runtime.snapshot.status, "macrostep complete");

        if !done && !raised.is_empty() {
            self.inner
                .mailbox
                .lock()
                .queue
                .extend(raised.into_iter().map(Signal::Event));
        }
        let listeners = self.inner.bus.lock().listeners();
        Some((listeners, runtime.snapshot.clone()))
    }
}

fn arm_entered(
    definition: &MachineDefinition,
    timers: &mut TimerQueue,
    entered: impl Iterator<Item = crate::core::NodeId>,
) {
    for node in entered {
        for (index, delayed) in definition.node(node).delayed.iter().enumerate() {
            timers.arm(TimerKey { state: node, index }, delayed.delay);
        }
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("machine", &self.inner.definition.id())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
