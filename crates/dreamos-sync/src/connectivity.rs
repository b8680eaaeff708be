//! # Connectivity Oracle
//!
//! Answers "are we online?" and tells everyone when the answer changes.
//!
//! ## Effective State
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NetworkProbe::has_network()      sync:forced-offline (persisted)      │
//! │   Some(true) / Some(false) /       true / false                         │
//! │   None (unsupported → online)                                           │
//! │            │                                  │                         │
//! │            └──────────────┬───────────────────┘                         │
//! │                           ▼                                             │
//! │            is_online = network AND NOT forced                           │
//! │                                                                         │
//! │   Change sources                        Listeners                       │
//! │   ─────────────                         ─────────                       │
//! │   report_network(reachable) ──┐    ┌──► on_connectivity_change handlers │
//! │                               ├────┤                                    │
//! │   set_forced_offline(flag) ───┘    └──► subscribe() broadcast receivers │
//! │                                         (agent drain trigger)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A forced toggle emits exactly the event a genuine transition would, so
//! listeners cannot tell the two apart.

use dreamos_db::{keys, LocalStore};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

// =============================================================================
// Network Probe
// =============================================================================

/// Source of the runtime's network-reachability signal.
pub trait NetworkProbe: Send + Sync + fmt::Debug {
    /// `None` when the runtime can't tell; treated as online.
    fn has_network(&self) -> Option<bool>;

    /// Records a reachability observation. Probes that measure the signal
    /// themselves ignore it.
    fn observe(&self, _reachable: bool) {}
}

/// Probe whose signal is set from outside (tests, the agent's
/// reachability monitor).
#[derive(Debug)]
pub struct ManualProbe {
    reachable: AtomicBool,
}

impl ManualProbe {
    pub fn new(reachable: bool) -> Self {
        ManualProbe {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl NetworkProbe for ManualProbe {
    fn has_network(&self) -> Option<bool> {
        Some(self.reachable.load(Ordering::SeqCst))
    }

    fn observe(&self, reachable: bool) {
        self.set(reachable);
    }
}

/// Probe for runtimes with no reachability signal at all.
#[derive(Debug, Default)]
pub struct UnsupportedProbe;

impl NetworkProbe for UnsupportedProbe {
    fn has_network(&self) -> Option<bool> {
        None
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    fn from_online(online: bool) -> Self {
        if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        }
    }
}

/// Handle returned by [`ConnectivityOracle::on_connectivity_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(ConnectivityEvent) + Send + Sync>;

// =============================================================================
// Oracle
// =============================================================================

pub struct ConnectivityOracle {
    probe: Arc<dyn NetworkProbe>,
    store: LocalStore,
    forced_offline: AtomicBool,
    /// Effective state as of the last emitted event.
    last_online: AtomicBool,
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_subscription: AtomicU64,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl fmt::Debug for ConnectivityOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityOracle")
            .field("probe", &self.probe)
            .field("forced_offline", &self.forced_offline.load(Ordering::SeqCst))
            .field("online", &self.is_online())
            .finish()
    }
}

impl ConnectivityOracle {
    /// Creates the oracle, restoring the persisted forced-offline flag.
    pub async fn load(store: LocalStore, probe: Arc<dyn NetworkProbe>) -> Self {
        let forced = store.load::<bool>(keys::FORCED_OFFLINE).await.unwrap_or(false);
        let (events, _) = broadcast::channel(32);

        let oracle = ConnectivityOracle {
            probe,
            store,
            forced_offline: AtomicBool::new(forced),
            last_online: AtomicBool::new(false),
            handlers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            events,
        };
        oracle
            .last_online
            .store(oracle.is_online(), Ordering::SeqCst);

        info!(
            online = oracle.is_online(),
            forced_offline = forced,
            "Connectivity oracle ready"
        );
        oracle
    }

    /// True only when the network is reachable and no forced-offline
    /// override is active. Pure read.
    pub fn is_online(&self) -> bool {
        let network = self.probe.has_network().unwrap_or(true);
        network && !self.forced_offline.load(Ordering::SeqCst)
    }

    pub fn is_forced_offline(&self) -> bool {
        self.forced_offline.load(Ordering::SeqCst)
    }

    /// Persists the override and emits the event a genuine transition
    /// would (`Offline` for true, `Online` for false).
    pub async fn set_forced_offline(&self, flag: bool) {
        self.forced_offline.store(flag, Ordering::SeqCst);
        if !self.store.save(keys::FORCED_OFFLINE, &flag).await {
            warn!(flag, "Forced-offline flag not persisted; it will reset on restart");
        }
        info!(flag, "Forced-offline override changed");

        self.last_online.store(self.is_online(), Ordering::SeqCst);
        self.emit(ConnectivityEvent::from_online(!flag));
    }

    /// Lifts the override in memory only, for when storage was just wiped.
    pub fn reset_forced_offline(&self) {
        if self.forced_offline.swap(false, Ordering::SeqCst) {
            info!("Forced-offline override reset");
            self.last_online.store(self.is_online(), Ordering::SeqCst);
            self.emit(ConnectivityEvent::from_online(true));
        }
    }

    /// Records a genuine reachability observation. Emits only when the
    /// effective state changes.
    pub fn report_network(&self, reachable: bool) {
        self.probe.observe(reachable);
        let online = self.is_online();
        let was_online = self.last_online.swap(online, Ordering::SeqCst);
        if online != was_online {
            info!(online, "Connectivity changed");
            self.emit(ConnectivityEvent::from_online(online));
        }
    }

    /// Registers a handler called synchronously on every connectivity event.
    pub fn on_connectivity_change<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(ConnectivityEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        match self.handlers.lock() {
            Ok(mut handlers) => handlers.push((id, Arc::new(handler))),
            Err(_) => warn!("Connectivity handler list poisoned; handler not registered"),
        }
        id
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.handlers.lock() {
            Ok(mut handlers) => {
                let before = handlers.len();
                handlers.retain(|(sid, _)| *sid != id);
                handlers.len() != before
            }
            Err(_) => false,
        }
    }

    /// Async receiver of every connectivity event.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ConnectivityEvent) {
        debug!(?event, "Emitting connectivity event");

        // Handlers run outside the lock so they may (un)subscribe.
        let handlers: Vec<Handler> = match self.handlers.lock() {
            Ok(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            Err(_) => Vec::new(),
        };
        for handler in handlers {
            handler(event);
        }

        // No receivers is fine.
        let _ = self.events.send(event);
    }
}
